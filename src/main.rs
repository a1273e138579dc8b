use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use label_image::cli::Args;
use label_image::labels::load_labels;
use label_image::model::Classifier;
use label_image::postprocess::max_index;
use label_image::preprocess::normalize_image;

/// Serialized graph definition inside the model directory.
const MODEL_FILE: &str = "inception_v3.onnx";
/// Label list inside the model directory, one label per output index.
const LABELS_FILE: &str = "imagenet_comp_graph_label_strings.txt";

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let model_dir = Path::new(&args.model_dir);
    let graph_def = read_bytes(&model_dir.join(MODEL_FILE))?;
    let labels = load_labels(&model_dir.join(LABELS_FILE))?;
    let image_bytes = read_bytes(Path::new(&args.image))?;

    let image = normalize_image(&image_bytes)?;
    tracing::debug!(shape = ?image.shape(), "image normalized");

    let classifier = Classifier::from_graph_def(&graph_def)?;
    let probabilities = classifier.run(image)?;
    tracing::debug!(count = probabilities.len(), "label probabilities fetched");
    ensure!(
        !probabilities.is_empty(),
        "model produced an empty probability vector"
    );

    let best = max_index(&probabilities);
    let label = labels.get(best).with_context(|| {
        format!(
            "model output index {best} is outside the label list ({} labels)",
            labels.len()
        )
    })?;

    println!("BEST MATCH: {} ({}% likely)", label, probabilities[best] * 100.0);
    Ok(())
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read [{}]", path.display()))
}
