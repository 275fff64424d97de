pub mod commands;

use crate::{Config, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub use commands::run;

#[derive(Debug, Parser)]
#[command(name = "onnx-style")]
#[command(version, about = "ONNX-powered neural style transfer and image classification")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Log level
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Model directory path
    #[arg(long, global = true, default_value = "models")]
    pub models_dir: PathBuf,

    /// Class label file (defaults to <models-dir>/computer-vision/imagenet_classes.txt)
    #[arg(long, global = true)]
    pub labels: Option<PathBuf>,

    /// Number of inference threads
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// Enable development mode (progress logging)
    #[arg(long, global = true)]
    pub dev: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply a fast style transfer model
    Stylize {
        /// Input image
        #[arg(short, long)]
        input: PathBuf,

        /// Style model identifier (e.g. udnie, candy, mosaic)
        #[arg(short, long)]
        style: String,

        /// Write the PNG here instead of printing a data URI
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify an image
    Classify {
        #[arg(short, long)]
        input: PathBuf,

        /// Classification model identifier
        #[arg(short, long, default_value = "adv-inception-v3")]
        model: String,

        /// Number of ranked predictions
        #[arg(long)]
        top_k: Option<usize>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Route a style name (onnx_<id> or native) and print the result as JSON
    Process {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        style: String,
    },

    /// List known models and cache statistics
    Models,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Stylize { .. } => "stylize",
            Command::Classify { .. } => "classify",
            Command::Process { .. } => "process",
            Command::Models => "models",
        }
    }
}

impl Cli {
    pub fn config(&self) -> Result<Config> {
        Config::new(
            self.global.models_dir.clone(),
            self.global.labels.clone(),
            self.global.threads,
            self.global.dev,
        )
    }
}
