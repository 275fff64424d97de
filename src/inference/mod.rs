pub mod classifier;
pub mod native;
pub mod pipeline;
pub mod runner;
pub mod types;

pub use classifier::{format_report, softmax, top_k, ImageClassifier, LabelTable, Prediction};
pub use native::{NativeStyler, UnavailableNativeStyler};
pub use pipeline::{StatusSender, StylePipeline};
pub use runner::InferenceRunner;
pub use types::{ClassificationOutcome, ProcessStatus, Stage, StyleTransferResult, StylizedImage};
