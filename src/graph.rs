//! Deferred computation graph used by the preprocessing pipeline.
//!
//! Building a graph is pure bookkeeping: appending a node performs no
//! decoding and no arithmetic. Work happens when a [`Session`] runs the
//! graph, and every dtype or shape mismatch surfaces there as an error.
//! Node execution delegates to the `image`, `fast_image_resize` and
//! `ndarray` crates.

use anyhow::{Context, Result, bail, ensure};
use fast_image_resize as fir;
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};

/// Element type carried alongside every tensor value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    U8,
    I32,
    F32,
    /// Opaque byte string, e.g. encoded image contents.
    Bytes,
}

/// A concrete value produced by evaluating a graph node.
#[derive(Clone, Debug)]
pub enum TensorValue {
    U8(ArrayD<u8>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    Bytes(Vec<u8>),
}

impl TensorValue {
    pub fn dtype(&self) -> DType {
        match self {
            TensorValue::U8(_) => DType::U8,
            TensorValue::I32(_) => DType::I32,
            TensorValue::F32(_) => DType::F32,
            TensorValue::Bytes(_) => DType::Bytes,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            TensorValue::U8(a) => a.shape(),
            TensorValue::I32(a) => a.shape(),
            TensorValue::F32(a) => a.shape(),
            TensorValue::Bytes(_) => &[],
        }
    }
}

impl From<Vec<u8>> for TensorValue {
    fn from(contents: Vec<u8>) -> Self {
        TensorValue::Bytes(contents)
    }
}

impl From<&[u8]> for TensorValue {
    fn from(contents: &[u8]) -> Self {
        TensorValue::Bytes(contents.to_vec())
    }
}

impl From<i32> for TensorValue {
    fn from(scalar: i32) -> Self {
        TensorValue::I32(ArrayD::from_elem(IxDyn(&[]), scalar))
    }
}

impl From<Vec<i32>> for TensorValue {
    fn from(values: Vec<i32>) -> Self {
        TensorValue::I32(ndarray::Array1::from_vec(values).into_dyn())
    }
}

impl From<f32> for TensorValue {
    fn from(scalar: f32) -> Self {
        TensorValue::F32(ArrayD::from_elem(IxDyn(&[]), scalar))
    }
}

/// Handle to the output edge of a graph node.
#[derive(Clone, Copy, Debug)]
pub struct OutputRef(usize);

enum Op {
    Const { value: TensorValue },
    Cast { input: OutputRef, dst: DType },
    DecodeJpeg { contents: OutputRef, channels: u32 },
    ExpandDims { input: OutputRef, axis: OutputRef },
    ResizeBilinear { images: OutputRef, size: OutputRef },
    Sub { x: OutputRef, y: OutputRef },
    Div { x: OutputRef, y: OutputRef },
}

struct Node {
    name: String,
    op: Op,
}

/// Append-only list of named operation nodes. Nodes only reference the
/// output edges of earlier nodes, so a plain front-to-back pass evaluates
/// every edge before it is consumed.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: impl Into<String>, op: Op) -> OutputRef {
        let id = self.nodes.len();
        self.nodes.push(Node {
            name: name.into(),
            op,
        });
        OutputRef(id)
    }
}

/// Appends named operation nodes to a [`Graph`] and hands back edge handles.
pub struct GraphBuilder<'g> {
    graph: &'g mut Graph,
}

impl<'g> GraphBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    /// Constant node; the dtype is inferred from the Rust value.
    pub fn constant(&mut self, name: &str, value: impl Into<TensorValue>) -> OutputRef {
        self.graph.push(name, Op::Const {
            value: value.into(),
        })
    }

    pub fn cast(&mut self, value: OutputRef, dst: DType) -> OutputRef {
        self.graph.push("Cast", Op::Cast { input: value, dst })
    }

    pub fn decode_jpeg(&mut self, contents: OutputRef, channels: u32) -> OutputRef {
        self.graph
            .push("DecodeJpeg", Op::DecodeJpeg { contents, channels })
    }

    /// Inserts a new axis at the position given by a scalar-i32 edge.
    pub fn expand_dims(&mut self, input: OutputRef, axis: OutputRef) -> OutputRef {
        self.graph.push("ExpandDims", Op::ExpandDims { input, axis })
    }

    /// Resizes a `[1, H, W, 3]` f32 tensor to the `[height, width]` given by
    /// an i32 edge.
    pub fn resize_bilinear(&mut self, images: OutputRef, size: OutputRef) -> OutputRef {
        self.graph
            .push("ResizeBilinear", Op::ResizeBilinear { images, size })
    }

    pub fn sub(&mut self, x: OutputRef, y: OutputRef) -> OutputRef {
        self.graph.push("Sub", Op::Sub { x, y })
    }

    pub fn div(&mut self, x: OutputRef, y: OutputRef) -> OutputRef {
        self.graph.push("Div", Op::Div { x, y })
    }
}

/// Executes a graph once and yields the value of a fetched edge.
pub struct Session<'g> {
    graph: &'g Graph,
}

impl<'g> Session<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    pub fn run(&self, fetch: OutputRef) -> Result<TensorValue> {
        let mut values: Vec<TensorValue> = Vec::with_capacity(self.graph.nodes.len());
        for node in &self.graph.nodes {
            let value = eval(&node.op, &values)
                .with_context(|| format!("while running node \"{}\"", node.name))?;
            values.push(value);
        }
        values
            .get(fetch.0)
            .cloned()
            .context("fetched edge does not belong to this graph")
    }
}

fn edge(values: &[TensorValue], r: OutputRef) -> Result<&TensorValue> {
    values
        .get(r.0)
        .context("operation references an edge that does not belong to this graph")
}

fn eval(op: &Op, values: &[TensorValue]) -> Result<TensorValue> {
    match op {
        Op::Const { value } => Ok(value.clone()),
        Op::Cast { input, dst } => cast(edge(values, *input)?, *dst),
        Op::DecodeJpeg { contents, channels } => decode_jpeg(edge(values, *contents)?, *channels),
        Op::ExpandDims { input, axis } => expand_dims(edge(values, *input)?, edge(values, *axis)?),
        Op::ResizeBilinear { images, size } => {
            resize_bilinear(edge(values, *images)?, edge(values, *size)?)
        }
        Op::Sub { x, y } => binary_f32("Sub", edge(values, *x)?, edge(values, *y)?, sub_arrays),
        Op::Div { x, y } => binary_f32("Div", edge(values, *x)?, edge(values, *y)?, div_arrays),
    }
}

fn cast(value: &TensorValue, dst: DType) -> Result<TensorValue> {
    match (value, dst) {
        (TensorValue::U8(a), DType::F32) => Ok(TensorValue::F32(a.mapv(f32::from))),
        (TensorValue::I32(a), DType::F32) => Ok(TensorValue::F32(a.mapv(|v| v as f32))),
        (TensorValue::F32(a), DType::F32) => Ok(TensorValue::F32(a.clone())),
        (value, dst) => bail!("unsupported cast from {:?} to {dst:?}", value.dtype()),
    }
}

fn decode_jpeg(contents: &TensorValue, channels: u32) -> Result<TensorValue> {
    let TensorValue::Bytes(bytes) = contents else {
        bail!("DecodeJpeg expects byte contents, got {:?}", contents.dtype());
    };
    ensure!(channels == 3, "DecodeJpeg supports 3 channels, got {channels}");
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Jpeg)
        .context("failed to decode JPEG contents")?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixels = ArrayD::from_shape_vec(
        IxDyn(&[height as usize, width as usize, 3]),
        rgb.into_raw(),
    )
    .context("decoded image buffer has an unexpected length")?;
    Ok(TensorValue::U8(pixels))
}

fn expand_dims(input: &TensorValue, axis: &TensorValue) -> Result<TensorValue> {
    let axis = scalar_i32(axis).context("ExpandDims axis must be a scalar i32")?;
    match input {
        TensorValue::U8(a) => Ok(TensorValue::U8(insert_axis(a.clone(), axis)?)),
        TensorValue::I32(a) => Ok(TensorValue::I32(insert_axis(a.clone(), axis)?)),
        TensorValue::F32(a) => Ok(TensorValue::F32(insert_axis(a.clone(), axis)?)),
        TensorValue::Bytes(_) => bail!("ExpandDims does not apply to byte contents"),
    }
}

fn insert_axis<T>(array: ArrayD<T>, axis: i32) -> Result<ArrayD<T>> {
    ensure!(
        axis >= 0 && axis as usize <= array.ndim(),
        "axis {axis} is out of range for a rank-{} tensor",
        array.ndim()
    );
    Ok(array.insert_axis(Axis(axis as usize)))
}

fn resize_bilinear(images: &TensorValue, size: &TensorValue) -> Result<TensorValue> {
    let TensorValue::F32(images) = images else {
        bail!("ResizeBilinear expects f32 images, got {:?}", images.dtype());
    };
    let dims = images.shape();
    ensure!(
        dims.len() == 4 && dims[0] == 1 && dims[3] == 3,
        "ResizeBilinear expects a [1, H, W, 3] tensor, got shape {dims:?}"
    );
    let size = vec_i32(size).context("ResizeBilinear size must be an i32 tensor")?;
    ensure!(
        size.len() == 2 && size.iter().all(|&d| d > 0),
        "ResizeBilinear size must hold two positive values, got {size:?}"
    );
    let (out_height, out_width) = (size[0] as usize, size[1] as usize);
    let (src_height, src_width) = (dims[1], dims[2]);

    // fast_image_resize works on raw byte buffers; shuttle the f32 pixels
    // through their native-endian byte representation.
    let src_pixels: Vec<u8> = images.iter().flat_map(|v| v.to_ne_bytes()).collect();
    let src = fir::images::Image::from_vec_u8(
        src_width as u32,
        src_height as u32,
        src_pixels,
        fir::PixelType::F32x3,
    )
    .context("failed to wrap the image buffer for resizing")?;
    let mut dst = fir::images::Image::new(out_width as u32, out_height as u32, fir::PixelType::F32x3);

    let mut resizer = fir::Resizer::new();
    let options =
        fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::Bilinear));
    resizer
        .resize(&src, &mut dst, Some(&options))
        .context("bilinear resize failed")?;

    let resized: Vec<f32> = dst
        .buffer()
        .chunks_exact(4)
        .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    let resized = ArrayD::from_shape_vec(IxDyn(&[1, out_height, out_width, 3]), resized)
        .context("resized buffer has an unexpected length")?;
    Ok(TensorValue::F32(resized))
}

fn sub_arrays(x: &ArrayD<f32>, y: &ArrayViewD<'_, f32>) -> ArrayD<f32> {
    x - y
}

fn div_arrays(x: &ArrayD<f32>, y: &ArrayViewD<'_, f32>) -> ArrayD<f32> {
    x / y
}

fn binary_f32(
    name: &str,
    x: &TensorValue,
    y: &TensorValue,
    apply: fn(&ArrayD<f32>, &ArrayViewD<'_, f32>) -> ArrayD<f32>,
) -> Result<TensorValue> {
    let (TensorValue::F32(x), TensorValue::F32(y)) = (x, y) else {
        bail!(
            "{name} expects f32 operands, got {:?} and {:?}",
            x.dtype(),
            y.dtype()
        );
    };
    let y = y.broadcast(x.raw_dim()).with_context(|| {
        format!(
            "{name}: cannot broadcast shape {:?} to {:?}",
            y.shape(),
            x.shape()
        )
    })?;
    Ok(TensorValue::F32(apply(x, &y)))
}

fn scalar_i32(value: &TensorValue) -> Result<i32> {
    match value {
        TensorValue::I32(a) if a.ndim() == 0 => Ok(a[IxDyn(&[])]),
        other => bail!(
            "expected a scalar i32 tensor, got {:?} with shape {:?}",
            other.dtype(),
            other.shape()
        ),
    }
}

fn vec_i32(value: &TensorValue) -> Result<Vec<i32>> {
    match value {
        TensorValue::I32(a) => Ok(a.iter().copied().collect()),
        other => bail!("expected an i32 tensor, got {:?}", other.dtype()),
    }
}
