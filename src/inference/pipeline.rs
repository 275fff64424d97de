use crate::{
    image::{preprocessing::RGB_CHANNELS, ImageLoader, ImagePreprocessor, OutputDecoder},
    inference::{
        classifier::{format_report, ImageClassifier, LabelTable},
        native::{NativeStyler, UnavailableNativeStyler},
        runner::InferenceRunner,
        types::{ClassificationOutcome, ProcessStatus, Stage, StyleTransferResult, StylizedImage},
    },
    models::{LoadedModel, ModelKind, ModelStats, RuntimeLoader, SessionCache},
    utils::error::StyleError,
    Config, Result,
};
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

pub type StatusSender = mpsc::UnboundedSender<ProcessStatus>;

fn send_status(status_tx: Option<&StatusSender>, stage: Stage, progress: f32, message: &str) {
    if let Some(tx) = status_tx {
        let _ = tx.send(ProcessStatus::new(stage, progress, message));
    }
}

/// 风格迁移/分类处理流水线
///
/// 持有自己的会话缓存、图像解码器和分类标签；
/// 不带ONNX前缀的风格交给注入的原生风格模块处理。
pub struct StylePipeline {
    config: Config,
    sessions: SessionCache,
    loader: ImageLoader,
    preprocessor: ImagePreprocessor,
    classifier: ImageClassifier,
    native: Arc<dyn NativeStyler>,
}

impl StylePipeline {
    pub fn new(config: Config, runtime: Arc<RuntimeLoader>) -> Self {
        let labels = LabelTable::load_or_default(config.labels_path());

        Self {
            sessions: SessionCache::new(config.clone(), runtime),
            loader: ImageLoader::new(config.input_config.clone()),
            preprocessor: ImagePreprocessor::new(config.pipeline_config.background),
            classifier: ImageClassifier::new(labels),
            native: Arc::new(UnavailableNativeStyler),
            config,
        }
    }

    pub fn with_native_styler(mut self, native: Arc<dyn NativeStyler>) -> Self {
        self.native = native;
        self
    }

    pub fn with_labels(mut self, labels: LabelTable) -> Self {
        self.classifier = ImageClassifier::new(labels);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionCache {
        &self.sessions
    }

    pub fn image_loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn stats(&self) -> ModelStats {
        self.sessions.stats()
    }

    async fn load_model(
        &self,
        model_id: &str,
        expected: ModelKind,
        status_tx: Option<&StatusSender>,
    ) -> Result<Arc<LoadedModel>> {
        send_status(status_tx, Stage::LoadingModel, 0.1, &format!("Loading model {}", model_id));

        let model = self.sessions.get_session(model_id).await?;
        if model.descriptor.kind != expected {
            return Err(StyleError::InvalidInput(format!(
                "Model '{}' is a {:?} model, expected {:?}",
                model_id, model.descriptor.kind, expected
            )));
        }
        Ok(model)
    }

    /// 执行风格迁移模型，返回PNG data URI
    pub async fn stylize(
        &self,
        image: &DynamicImage,
        model_id: &str,
        status_tx: Option<&StatusSender>,
    ) -> Result<StylizedImage> {
        let start_time = Instant::now();
        let model = self.load_model(model_id, ModelKind::Style, status_tx).await?;
        let (height, width) = model.input_size;

        send_status(status_tx, Stage::Preprocessing, 0.3, "Letterboxing image");
        let (tensor, mut canvas) = self.preprocessor.preprocess(image, width, height)?;

        send_status(status_tx, Stage::Inference, 0.5, "Running style model");
        let output = InferenceRunner::run(Arc::clone(&model.session), tensor).await?;

        send_status(status_tx, Stage::Postprocessing, 0.8, "Decoding output tensor");
        let expected = [1, RGB_CHANNELS, canvas.height() as usize, canvas.width() as usize];
        if output.shape() != expected {
            return Err(StyleError::InferenceFailed(format!(
                "Output tensor must be (1, 3, H, W) = {:?}, got {:?}",
                expected,
                output.shape()
            )));
        }
        let values: Vec<f32> = output.iter().copied().collect();
        let (data_uri, output_range) =
            OutputDecoder::decode(&values, canvas.width(), canvas.height(), &mut canvas)?;

        let elapsed = start_time.elapsed();
        send_status(status_tx, Stage::Completed, 1.0, "Style transfer completed");
        tracing::info!(
            "Style transfer completed: model={}, size={}x{}, range={:?}, time={:.3}s",
            model_id,
            canvas.width(),
            canvas.height(),
            output_range,
            elapsed.as_secs_f32()
        );

        Ok(StylizedImage {
            model_id: model_id.to_string(),
            data_uri,
            width: canvas.width(),
            height: canvas.height(),
            output_range,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }

    /// 执行分类模型，返回排序后的top-K结果
    pub async fn classify(
        &self,
        image: &DynamicImage,
        model_id: &str,
        top_k: Option<usize>,
        status_tx: Option<&StatusSender>,
    ) -> Result<ClassificationOutcome> {
        let start_time = Instant::now();
        let model = self.load_model(model_id, ModelKind::Classifier, status_tx).await?;
        let (height, width) = model.input_size;

        send_status(status_tx, Stage::Preprocessing, 0.3, "Letterboxing image");
        let (tensor, canvas) = self.preprocessor.preprocess(image, width, height)?;

        send_status(status_tx, Stage::Inference, 0.5, "Running classifier");
        let output = InferenceRunner::run(Arc::clone(&model.session), tensor).await?;

        send_status(status_tx, Stage::Postprocessing, 0.8, "Ranking predictions");
        let k = top_k.unwrap_or(self.config.pipeline_config.top_k).max(1);
        let predictions = self.classifier.classify(&output, k)?;
        let report = format_report(&predictions);
        let preview_data_uri = canvas.to_data_uri()?;

        let elapsed = start_time.elapsed();
        send_status(status_tx, Stage::Completed, 1.0, "Classification completed");
        if let Some(top) = predictions.first() {
            tracing::info!(
                "Classification completed: model={}, top={} ({:.2}%), time={:.3}s",
                model_id,
                top.label,
                top.probability * 100.0,
                elapsed.as_secs_f32()
            );
        }

        Ok(ClassificationOutcome {
            model_id: model_id.to_string(),
            predictions,
            report,
            preview_data_uri,
            processing_time_ms: elapsed.as_millis() as u64,
        })
    }

    /// 按风格名路由：ONNX前缀走本地推理，其余交给原生风格模块
    pub async fn process(&self, image_data: &[u8], style: &str) -> StyleTransferResult {
        self.process_with_status(image_data, style, None).await
    }

    pub async fn process_with_status(
        &self,
        image_data: &[u8],
        style: &str,
        status_tx: Option<&StatusSender>,
    ) -> StyleTransferResult {
        let Some(model_id) = style.strip_prefix(self.config.pipeline_config.onnx_prefix.as_str())
        else {
            tracing::debug!("Routing '{}' to native style module", style);
            return self.native.process(image_data, style);
        };

        match self.process_onnx(image_data, style, model_id, status_tx).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Processing '{}' failed: {}", style, e);
                StyleTransferResult::from(&e)
            }
        }
    }

    async fn process_onnx(
        &self,
        image_data: &[u8],
        style: &str,
        model_id: &str,
        status_tx: Option<&StatusSender>,
    ) -> Result<StyleTransferResult> {
        send_status(status_tx, Stage::Decoding, 0.0, "Decoding image");
        let image = self.loader.from_bytes(image_data)?;

        if self.config.is_classifier(model_id) {
            let outcome = self.classify(&image, model_id, None, status_tx).await?;
            Ok(StyleTransferResult::success(
                format!("Successfully classified image with {}", model_id),
                outcome.preview_data_uri,
            )
            .with_classification(outcome.report))
        } else {
            let stylized = self.stylize(&image, model_id, status_tx).await?;
            Ok(StyleTransferResult::success(
                format!("Successfully applied {} style", style),
                stylized.data_uri,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::OutputRange;
    use crate::models::testing::FakeRuntime;
    use image::{ImageFormat, Rgba, RgbaImage};
    use ndarray::{ArrayD, IxDyn};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline(runtime: FakeRuntime) -> StylePipeline {
        let config = Config::new("models", None, Some(1), false).unwrap();
        StylePipeline::new(config, Arc::new(RuntimeLoader::with_runtime(Arc::new(runtime))))
            .with_labels(LabelTable::parse("0: tench\n1: goldfish\n2: great white shark"))
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]))
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn stylize_produces_png_of_model_size() {
        let pipeline = pipeline(FakeRuntime::identity());
        let image = DynamicImage::ImageRgba8(RgbaImage::new(400, 300));

        let result = pipeline.stylize(&image, "udnie", None).await.unwrap();

        assert_eq!((result.width, result.height), (224, 224));
        assert_eq!(result.output_range, OutputRange::UnitInterval);
        assert!(result.data_uri.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn stylize_reports_progress() {
        let pipeline = pipeline(FakeRuntime::identity());
        let image = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));
        let (tx, mut rx) = mpsc::unbounded_channel();

        pipeline.stylize(&image, "candy", Some(&tx)).await.unwrap();
        drop(tx);

        let mut stages = Vec::new();
        while let Some(status) = rx.recv().await {
            stages.push(status.stage);
        }
        assert_eq!(stages.first(), Some(&Stage::LoadingModel));
        assert_eq!(stages.last(), Some(&Stage::Completed));
    }

    #[tokio::test]
    async fn classify_ranks_logits() {
        let runtime = FakeRuntime::with_transform(Arc::new(|_: &ArrayD<f32>| -> Result<ArrayD<f32>> {
            let mut logits = ArrayD::<f32>::zeros(IxDyn(&[1, 1000]));
            logits[[0, 2]] = 4.0;
            logits[[0, 1]] = 2.0;
            Ok(logits)
        }));
        let pipeline = pipeline(runtime);
        let image = DynamicImage::ImageRgba8(RgbaImage::new(50, 20));

        let outcome = pipeline
            .classify(&image, "adv-inception-v3", Some(3), None)
            .await
            .unwrap();

        assert_eq!(outcome.predictions.len(), 3);
        assert_eq!(outcome.predictions[0].label, "great white shark");
        assert_eq!(outcome.predictions[1].label, "goldfish");
        assert_eq!(outcome.predictions[2].label, "tench");
        assert!(outcome.report.starts_with("Top prediction: great white shark ("));
        assert_eq!(outcome.report.lines().count(), 3);
    }

    #[tokio::test]
    async fn stylize_rejects_non_planar_output() {
        // NHWC输出的元素个数与NCHW相同，必须按形状拒绝
        let runtime = FakeRuntime::with_transform(Arc::new(|input: &ArrayD<f32>| -> Result<ArrayD<f32>> {
            let shape = input.shape();
            Ok(ArrayD::from_elem(IxDyn(&[1, shape[2], shape[3], 3]), 0.5))
        }));
        let nhwc = pipeline(runtime.with_dims(vec![Some(1), Some(3), Some(8), Some(6)]));
        let image = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));

        let err = nhwc.stylize(&image, "udnie", None).await.unwrap_err();
        assert!(matches!(err, StyleError::InferenceFailed(_)), "{err:?}");

        let transposed = FakeRuntime::with_transform(Arc::new(|input: &ArrayD<f32>| -> Result<ArrayD<f32>> {
            let shape = input.shape();
            Ok(ArrayD::zeros(IxDyn(&[1, 3, shape[3], shape[2]])))
        }));
        let transposed = pipeline(transposed.with_dims(vec![Some(1), Some(3), Some(8), Some(6)]));
        assert!(transposed.stylize(&image, "udnie", None).await.is_err());
    }

    #[tokio::test]
    async fn stylize_rejects_classifier_model() {
        let pipeline = pipeline(FakeRuntime::identity());
        let image = DynamicImage::ImageRgba8(RgbaImage::new(8, 8));

        let err = pipeline
            .stylize(&image, "adv-inception-v3", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StyleError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn process_routes_by_prefix() {
        struct CountingStyler(AtomicUsize);
        impl NativeStyler for CountingStyler {
            fn process(&self, _image_data: &[u8], style: &str) -> StyleTransferResult {
                self.0.fetch_add(1, Ordering::SeqCst);
                StyleTransferResult::failure(format!("native:{}", style))
            }
        }

        let native = Arc::new(CountingStyler(AtomicUsize::new(0)));
        let pipeline = pipeline(FakeRuntime::identity()).with_native_styler(native.clone());

        let result = pipeline.process(&png(4, 4), "vangogh").await;
        assert_eq!(result.message, "native:vangogh");

        let result = pipeline.process(&png(4, 4), "onnx_mosaic").await;
        assert!(result.success);
        assert_eq!(result.message, "Successfully applied onnx_mosaic style");
        assert_eq!(native.0.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.stats().cached_models, vec!["mosaic".to_string()]);
    }

    #[tokio::test]
    async fn process_reports_failures_as_results() {
        let pipeline = pipeline(FakeRuntime::identity().with_missing("candy"));

        let result = pipeline.process(&png(4, 4), "onnx_candy").await;
        assert!(!result.success);
        assert!(result.message.contains("models/fast-style/candy.onnx"));
        assert!(result.processed_image_data.is_none());

        let result = pipeline.process(b"garbage", "onnx_udnie").await;
        assert!(!result.success);
    }
}
