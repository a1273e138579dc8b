pub mod cli;
pub mod graph;
pub mod labels;
pub mod model;
pub mod postprocess;
pub mod preprocess;

pub use crate::cli::Args;
pub use crate::graph::{DType, Graph, GraphBuilder, OutputRef, Session, TensorValue};
pub use crate::labels::load_labels;
pub use crate::model::Classifier;
pub use crate::postprocess::max_index;
pub use crate::preprocess::normalize_image;
