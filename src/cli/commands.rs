use crate::cli::{Cli, Command};
use crate::inference::{ProcessStatus, StatusSender, StylePipeline};
use crate::utils::error::StyleError;
use crate::Result;
use base64::Engine;
use serde_json::json;
use std::io::Write;
use std::path::Path;
use tokio::sync::mpsc;

/// 执行命令，结果写入`out`
pub async fn run<W: Write>(cli: &Cli, pipeline: &StylePipeline, out: &mut W) -> Result<()> {
    // 开发模式下在后台记录处理进度
    let status_tx = if pipeline.config().dev_mode {
        Some(spawn_progress_logger(cli.command.name()))
    } else {
        None
    };
    let status_tx = status_tx.as_ref();

    match &cli.command {
        Command::Stylize {
            input,
            style,
            output,
        } => {
            let image = pipeline.image_loader().from_path(input)?;
            let result = pipeline.stylize(&image, style, status_tx).await?;

            match output {
                Some(path) => {
                    write_data_uri(&result.data_uri, path).await?;
                    writeln!(
                        out,
                        "Wrote {}x{} image to {} ({} ms)",
                        result.width,
                        result.height,
                        path.display(),
                        result.processing_time_ms
                    )?;
                }
                None => writeln!(out, "{}", result.data_uri)?,
            }
        }

        Command::Classify {
            input,
            model,
            top_k,
            json,
        } => {
            let image = pipeline.image_loader().from_path(input)?;
            let outcome = pipeline.classify(&image, model, *top_k, status_tx).await?;

            if *json {
                writeln!(out, "{}", serde_json::to_string_pretty(&outcome)?)?;
            } else {
                writeln!(out, "{}", outcome.report)?;
            }
        }

        Command::Process { input, style } => {
            let bytes = tokio::fs::read(input).await?;
            let result = pipeline.process_with_status(&bytes, style, status_tx).await;
            writeln!(out, "{}", serde_json::to_string_pretty(&result)?)?;
        }

        Command::Models => {
            let catalog = pipeline.sessions().catalog();
            let models: Vec<_> = catalog
                .known_models()
                .into_iter()
                .map(|descriptor| {
                    let available = descriptor.location.exists();
                    json!({
                        "id": descriptor.id,
                        "kind": descriptor.kind,
                        "location": descriptor.location,
                        "available": available,
                        "default_input_size": descriptor.default_input_size,
                    })
                })
                .collect();

            let info = json!({
                "service": "ONNX Style",
                "version": env!("CARGO_PKG_VERSION"),
                "onnx_prefix": pipeline.config().pipeline_config.onnx_prefix,
                "models": models,
                "stats": pipeline.stats(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&info)?)?;
        }
    }

    Ok(())
}

fn spawn_progress_logger(command: &'static str) -> StatusSender {
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<ProcessStatus>();

    tokio::spawn(async move {
        while let Some(status) = status_rx.recv().await {
            tracing::debug!(
                "Progress [{}]: {:?} - {:.1}% - {}",
                command,
                status.stage,
                status.progress * 100.0,
                status.message
            );
        }
    });

    status_tx
}

/// 解码PNG data URI
pub fn decode_data_uri(data_uri: &str) -> Result<Vec<u8>> {
    let payload = data_uri
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| StyleError::InvalidInput("Expected a PNG data URI".to_string()))?;

    Ok(base64::engine::general_purpose::STANDARD.decode(payload)?)
}

async fn write_data_uri(data_uri: &str, path: &Path) -> Result<()> {
    let bytes = decode_data_uri(data_uri)?;
    tokio::fs::write(path, &bytes).await?;
    tracing::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trip() {
        let uri = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3])
        );
        assert_eq!(decode_data_uri(&uri).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn non_png_data_uri_rejected() {
        assert!(decode_data_uri("data:image/jpeg;base64,AAAA").is_err());
    }
}
