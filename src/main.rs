use anyhow::Result;
use clap::Parser;
use onnx_style::{
    cli::{self, Cli},
    models::{OrtBootstrap, RuntimeLoader},
    StylePipeline,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志系统，输出到stderr以免混入命令结果
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.global.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Models directory: {}", cli.global.models_dir.display());

    // 创建配置
    let config = cli.config()?;

    // 运行时在首次加载模型时初始化
    let runtime = Arc::new(RuntimeLoader::new(Arc::new(OrtBootstrap::new(
        config.onnx_config.clone(),
    ))));
    let pipeline = StylePipeline::new(config, runtime);

    if let Err(e) = cli::run(&cli, &pipeline, &mut std::io::stdout()).await {
        tracing::error!("{} failed [{}]: {}", cli.command.name(), e.error_code(), e);
        std::process::exit(e.exit_code());
    }

    Ok(())
}
