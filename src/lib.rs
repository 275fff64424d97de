pub mod cli;
pub mod config;
pub mod image;
pub mod inference;
pub mod models;
pub mod utils;

// 重新导出主要类型
pub use config::Config;
pub use inference::{StylePipeline, StyleTransferResult};
pub use utils::error::StyleError;

pub type Result<T> = std::result::Result<T, StyleError>;
