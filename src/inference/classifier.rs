use crate::utils::error::StyleError;
use crate::Result;
use ndarray::ArrayD;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

/// 单条分类结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub class_index: usize,
    pub label: String,
    pub probability: f32,
}

/// 类别索引 -> 标签
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    labels: HashMap<usize, String>,
}

impl LabelTable {
    /// 解析 `<index>: <label>` 格式的标签文件，忽略空行和无法解析的行
    pub fn parse(content: &str) -> Self {
        let labels = content
            .lines()
            .filter_map(|line| {
                let (index, label) = line.split_once(':')?;
                let index = index.trim().parse::<usize>().ok()?;
                let label = label.trim();
                (!label.is_empty()).then(|| (index, label.to_string()))
            })
            .collect();

        Self { labels }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let table = Self::parse(&content);
        tracing::info!(
            "Loaded {} class labels from {}",
            table.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    /// 加载标签文件，失败时退化为占位标签
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::from_file(path.as_ref()) {
            Ok(table) => table,
            Err(e) => {
                tracing::warn!(
                    "Class labels unavailable at {} ({}), using placeholder labels",
                    path.as_ref().display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// 缺失的索引返回占位标签
    pub fn label(&self, index: usize) -> String {
        self.labels
            .get(&index)
            .cloned()
            .unwrap_or_else(|| format!("Unknown class {}", index))
    }
}

/// 数值稳定的softmax：先减去最大logit再取指数
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>> {
    if logits.is_empty() {
        return Err(StyleError::InferenceFailed(
            "Cannot apply softmax to an empty logit vector".to_string(),
        ));
    }

    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f64> = logits.iter().map(|&v| f64::from(v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();

    if !sum.is_finite() || sum <= 0.0 {
        return Err(StyleError::InferenceFailed(format!(
            "Logits are not finite (max = {})",
            max
        )));
    }

    Ok(exps.into_iter().map(|e| (e / sum) as f32).collect())
}

/// 按概率降序排列，概率相同时按类别索引升序，返回前k个
pub fn top_k(probabilities: &[f32], k: usize) -> Vec<(usize, f32)> {
    let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    ranked.sort_by(|a, b| match b.1.total_cmp(&a.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    ranked.truncate(k);
    ranked
}

/// 前三名的可读报告，概率保留两位小数
pub fn format_report(predictions: &[Prediction]) -> String {
    const RANKS: [&str; 3] = ["Top prediction", "Second", "Third"];

    RANKS
        .iter()
        .zip(predictions)
        .map(|(rank, p)| format!("{}: {} ({:.2}%)", rank, p.label, p.probability * 100.0))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 分类后处理：logits -> 排序后的带标签预测
pub struct ImageClassifier {
    labels: LabelTable,
}

impl ImageClassifier {
    pub fn new(labels: LabelTable) -> Self {
        Self { labels }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// 输出张量展平后作为logit向量（batch=1）
    pub fn classify(&self, output: &ArrayD<f32>, k: usize) -> Result<Vec<Prediction>> {
        let logits: Vec<f32> = output.iter().copied().collect();
        tracing::debug!("Classifying {} logits, top {}", logits.len(), k);

        let probabilities = softmax(&logits)?;

        Ok(top_k(&probabilities, k)
            .into_iter()
            .map(|(class_index, probability)| Prediction {
                class_index,
                label: self.labels.label(class_index),
                probability,
            })
            .collect())
    }
}
