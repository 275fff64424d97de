pub mod loader;
pub mod preprocessing;
pub mod postprocessing;
pub mod transforms;

pub use loader::ImageLoader;
pub use preprocessing::{Canvas, ImagePreprocessor, ImageTensor};
pub use postprocessing::{OutputDecoder, OutputRange};
pub use transforms::{ImageTransforms, LetterboxGeometry};
