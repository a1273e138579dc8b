//! Classification driver around an ONNX Runtime session.

use anyhow::{Context, Result, ensure};
use ndarray::{ArrayD, Axis, CowArray};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;

/// Graph node the normalized image is fed into.
pub const INPUT_NODE: &str = "input";
/// Graph node holding the per-label probability vector.
pub const OUTPUT_NODE: &str = "output";

pub struct Classifier {
    session: Session,
}

impl Classifier {
    /// Import a serialized pre-trained graph from raw bytes into a fresh
    /// session. The bytes are handed to the runtime unmodified.
    pub fn from_graph_def(graph_def: &[u8]) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_memory(graph_def)
            .context("failed to import the serialized model graph")?;
        Ok(Self { session })
    }

    /// Run the graph on a normalized image tensor and copy out the
    /// single-row probability vector.
    ///
    /// The model must produce a rank-2 `[1, N]` tensor; anything else is a
    /// fatal error.
    pub fn run(&self, image: ArrayD<f32>) -> Result<Vec<f32>> {
        let image = CowArray::from(image);
        let outputs = self
            .session
            .run(ort::inputs![INPUT_NODE => image.view()]?)?;
        let value = outputs
            .get(OUTPUT_NODE)
            .with_context(|| format!("model produced no output named \"{OUTPUT_NODE}\""))?;
        let probabilities = value.try_extract_tensor::<f32>()?.into_owned();
        single_row(&probabilities)
    }
}

/// Validate that the classifier output is a `[1, N]` tensor and copy out
/// its single row.
fn single_row(probabilities: &ArrayD<f32>) -> Result<Vec<f32>> {
    let shape = probabilities.shape();
    ensure!(
        probabilities.ndim() == 2 && shape[0] == 1,
        "expected the model to produce a [1, N] shaped tensor where N is the number of labels, \
         got shape {shape:?}"
    );
    Ok(probabilities.index_axis(Axis(0), 0).iter().copied().collect())
}
