//! Fixed preprocessing pipeline for the pre-trained model's input layer.

use anyhow::{Result, bail};
use ndarray::ArrayD;

use crate::graph::{DType, Graph, GraphBuilder, Session, TensorValue};

// Geometry and normalization the pre-trained graph was exported with; not
// configurable by callers.
const INPUT_HEIGHT: i32 = 224;
const INPUT_WIDTH: i32 = 224;
const MEAN: f32 = 117.0;
const SCALE: f32 = 1.0;
const CHANNELS: u32 = 3;

/// Decode and normalize raw JPEG bytes into the `[1, 224, 224, 3]` f32
/// tensor the classifier expects.
///
/// Assembles the pipeline decode -> cast -> expand dims -> bilinear resize
/// -> subtract mean -> divide by scale as a deferred graph and runs it
/// exactly once.
pub fn normalize_image(image_bytes: &[u8]) -> Result<ArrayD<f32>> {
    let mut graph = Graph::new();
    let mut b = GraphBuilder::new(&mut graph);

    let contents = b.constant("input", image_bytes);
    let decoded = b.decode_jpeg(contents, CHANNELS);
    let floats = b.cast(decoded, DType::F32);
    let batch_axis = b.constant("make_batch", 0i32);
    let batched = b.expand_dims(floats, batch_axis);
    let size = b.constant("size", vec![INPUT_HEIGHT, INPUT_WIDTH]);
    let resized = b.resize_bilinear(batched, size);
    let mean = b.constant("mean", MEAN);
    let centered = b.sub(resized, mean);
    let scale = b.constant("scale", SCALE);
    let normalized = b.div(centered, scale);

    let session = Session::new(&graph);
    match session.run(normalized)? {
        TensorValue::F32(tensor) => Ok(tensor),
        other => bail!(
            "preprocessing produced a {:?} tensor instead of f32",
            other.dtype()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_jpeg(width: u32, height: u32, level: u8) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([level, level, level]));
        let mut bytes = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, 100);
        encoder.encode_image(&img).expect("in-memory JPEG encoding");
        bytes
    }

    #[test]
    fn normalizes_to_batched_input_geometry() {
        let tensor = normalize_image(&gray_jpeg(64, 48, 128)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn subtracts_the_fixed_mean() {
        // A uniform gray image survives JPEG compression and bilinear
        // resampling nearly untouched, so every output value sits close to
        // (128 - 117) / 1.
        let tensor = normalize_image(&gray_jpeg(32, 32, 128)).unwrap();
        for &v in tensor.iter() {
            assert!((v - 11.0).abs() < 4.0, "normalized value {v} is off");
        }
    }

    #[test]
    fn rejects_non_jpeg_bytes() {
        assert!(normalize_image(&[0u8; 32]).is_err());
    }
}
