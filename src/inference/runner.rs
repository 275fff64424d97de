use crate::image::preprocessing::{ImageTensor, RGB_CHANNELS};
use crate::models::InferenceSession;
use crate::utils::error::StyleError;
use crate::Result;
use ndarray::ArrayD;
use std::sync::Arc;

/// 推理执行：绑定第一个输入，取回第一个输出
pub struct InferenceRunner;

impl InferenceRunner {
    pub async fn run(session: Arc<dyn InferenceSession>, input: ImageTensor) -> Result<ArrayD<f32>> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != RGB_CHANNELS {
            return Err(StyleError::InvalidInput(format!(
                "Input tensor must be (1, 3, H, W), got {:?}",
                shape
            )));
        }

        let input_name = session
            .input_names()
            .first()
            .cloned()
            .ok_or_else(|| StyleError::InferenceFailed("Model declares no inputs".to_string()))?;
        let output_name = session
            .output_names()
            .first()
            .cloned()
            .ok_or_else(|| StyleError::InferenceFailed("Model declares no outputs".to_string()))?;

        tracing::debug!("Running inference: {} {:?} -> {}", input_name, shape, output_name);

        // 推理为CPU密集型，放到阻塞线程池执行
        let mut outputs = tokio::task::spawn_blocking(move || {
            session.run(vec![(input_name, input.into_dyn())])
        })
        .await
        .map_err(|e| StyleError::InferenceFailed(format!("Inference task failed: {}", e)))?
        .map_err(|e| match e {
            StyleError::InferenceFailed(_) => e,
            other => StyleError::InferenceFailed(other.to_string()),
        })?;

        match outputs.remove(&output_name) {
            Some(output) => Ok(output),
            None => {
                let available: Vec<&String> = outputs.keys().collect();
                Err(StyleError::InferenceFailed(format!(
                    "Output '{}' not found. Available outputs: {:?}",
                    output_name, available
                )))
            }
        }
    }
}
