use crate::models::ExecutionBackend;
use crate::Result;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// 模型文件目录
    pub models_dir: PathBuf,

    /// 分类标签文件（缺省时使用模型目录下的约定位置）
    pub labels_path: Option<PathBuf>,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 输入限制
    pub input_config: InputConfig,

    /// 流水线配置
    pub pipeline_config: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别
    pub optimization_level: i32,

    /// 启用图优化
    pub enable_optimization: bool,

    /// 执行后端，固定为CPU以避免GPU后端初始化失败
    pub backend: ExecutionBackend,
}

#[derive(Debug, Clone)]
pub struct InputConfig {
    /// 最大输入大小（字节）
    pub max_input_size: usize,

    /// 最小图像边长
    pub min_dimension: u32,

    /// 最大图像边长
    pub max_dimension: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// letterbox填充背景色（中性灰）
    pub background: [u8; 3],

    /// 风格模型默认输入尺寸 (height, width)
    pub style_input_size: (usize, usize),

    /// 分类模型默认输入尺寸 (height, width)
    pub classifier_input_size: (usize, usize),

    /// 分类结果返回的条目数
    pub top_k: usize,

    /// 走ONNX路径的风格名前缀
    pub onnx_prefix: String,

    /// 属于分类模型的标识符
    pub classifier_models: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            background: [128, 128, 128],
            style_input_size: (224, 224),
            classifier_input_size: (299, 299),
            top_k: 5,
            onnx_prefix: "onnx_".to_string(),
            classifier_models: vec!["adv-inception-v3".to_string()],
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            max_input_size: 50 * 1024 * 1024, // 50MB
            min_dimension: 1,
            max_dimension: 8192,
        }
    }
}

impl Config {
    pub fn new(
        models_dir: impl Into<PathBuf>,
        labels_path: Option<PathBuf>,
        threads: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let cpu_cores = num_cpus::get();
        let intra_threads = threads.unwrap_or((cpu_cores * 3 / 4).max(1)); // 默认使用75%的CPU核心

        if intra_threads == 0 {
            return Err(crate::StyleError::Config(
                "Thread count must be at least 1".to_string(),
            ));
        }

        let onnx_config = OnnxConfig {
            intra_threads,
            optimization_level: 3,
            enable_optimization: true,
            backend: ExecutionBackend::Cpu,
        };

        Ok(Self {
            models_dir: models_dir.into(),
            labels_path,
            dev_mode,
            onnx_config,
            input_config: InputConfig::default(),
            pipeline_config: PipelineConfig::default(),
        })
    }

    /// 获取风格迁移模型路径
    pub fn style_model_path(&self, model_id: &str) -> PathBuf {
        self.models_dir
            .join("fast-style")
            .join(format!("{}.onnx", model_id))
    }

    /// 获取分类模型路径
    pub fn classifier_model_path(&self, model_id: &str) -> PathBuf {
        self.models_dir
            .join("computer-vision")
            .join(format!("{}.onnx", model_id))
    }

    /// 获取分类标签文件路径
    pub fn labels_path(&self) -> PathBuf {
        self.labels_path.clone().unwrap_or_else(|| {
            self.models_dir
                .join("computer-vision")
                .join("imagenet_classes.txt")
        })
    }

    /// 判断标识符是否为分类模型
    pub fn is_classifier(&self, model_id: &str) -> bool {
        self.pipeline_config
            .classifier_models
            .iter()
            .any(|id| id == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_paths_follow_layout() {
        let config = Config::new("assets", None, Some(2), false).unwrap();

        assert_eq!(
            config.style_model_path("udnie"),
            PathBuf::from("assets/fast-style/udnie.onnx")
        );
        assert_eq!(
            config.classifier_model_path("adv-inception-v3"),
            PathBuf::from("assets/computer-vision/adv-inception-v3.onnx")
        );
        assert_eq!(
            config.labels_path(),
            PathBuf::from("assets/computer-vision/imagenet_classes.txt")
        );
    }

    #[test]
    fn zero_threads_rejected() {
        assert!(Config::new("models", None, Some(0), false).is_err());
    }

    #[test]
    fn classifier_membership() {
        let config = Config::new("models", None, None, false).unwrap();
        assert!(config.is_classifier("adv-inception-v3"));
        assert!(!config.is_classifier("candy"));
        assert!(config.onnx_config.intra_threads >= 1);
    }
}
