//! FinBERT sequence classification on candle.
//!
//! Expects a Hugging Face model directory with `config.json`,
//! `tokenizer.json` and either `model.safetensors` or `pytorch_model.bin`,
//! laid out like `BertForSequenceClassification` (`bert.*` encoder weights,
//! `bert.pooler.dense` and a `classifier` head).

use crate::{SentimentClassifier, DEFAULT_BATCH_SIZE, DEFAULT_MAX_TOKENS};
use candle_core::{DType, Device, IndexOp, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stocksent_core::{ModelError, Probabilities, SentimentLabel};
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const SAFETENSORS_FILE: &str = "model.safetensors";
const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Fields of `config.json` the classification head needs beyond what
/// [`BertConfig`] covers.
#[derive(Debug, Deserialize)]
struct HeadConfig {
    hidden_size: usize,
    #[serde(default)]
    id2label: HashMap<String, String>,
}

/// Pick CUDA, then Metal, when compiled in and a device is present; else CPU.
pub fn select_device() -> Result<Device, ModelError> {
    let unusable = |e: candle_core::Error| ModelError::HardwareIncompatible {
        details: e.to_string(),
    };
    if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0).map_err(unusable)
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0).map_err(unusable)
    } else {
        Ok(Device::Cpu)
    }
}

pub struct FinBert {
    bert: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    /// Model output index -> label.
    label_order: [SentimentLabel; 3],
    batch_size: usize,
}

impl FinBert {
    /// Load the model from `model_dir` on the best available device.
    pub fn load(model_dir: &Path, batch_size: usize, max_tokens: usize) -> Result<Self, ModelError> {
        let device = select_device()?;
        Self::load_on(model_dir, batch_size, max_tokens, device)
    }

    pub fn load_on(
        model_dir: &Path,
        batch_size: usize,
        max_tokens: usize,
        device: Device,
    ) -> Result<Self, ModelError> {
        info!(
            model_dir = %model_dir.display(),
            cuda = device.is_cuda(),
            metal = device.is_metal(),
            "Loading FinBERT model"
        );

        let config_path = require_file(model_dir, CONFIG_FILE)?;
        let config_json = std::fs::read_to_string(&config_path).map_err(|e| {
            ModelError::ModelLoadingFailed {
                model_path: config_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        let bert_config: BertConfig =
            serde_json::from_str(&config_json).map_err(|e| ModelError::InvalidModelConfig {
                details: e.to_string(),
            })?;
        let head_config: HeadConfig =
            serde_json::from_str(&config_json).map_err(|e| ModelError::InvalidModelConfig {
                details: e.to_string(),
            })?;
        let label_order = label_order(&head_config.id2label)?;

        let tokenizer = load_tokenizer(&require_file(model_dir, TOKENIZER_FILE)?, max_tokens)?;

        let vb = load_weights(model_dir, &device)?;
        let load_failed = |e: candle_core::Error| ModelError::ModelLoadingFailed {
            model_path: model_dir.display().to_string(),
            reason: e.to_string(),
        };
        let bert = BertModel::load(vb.pp("bert"), &bert_config).map_err(load_failed)?;
        let pooler = linear(
            head_config.hidden_size,
            head_config.hidden_size,
            vb.pp("bert").pp("pooler").pp("dense"),
        )
        .map_err(load_failed)?;
        let classifier = linear(
            head_config.hidden_size,
            SentimentLabel::ALL.len(),
            vb.pp("classifier"),
        )
        .map_err(load_failed)?;

        info!(labels = ?label_order, "FinBERT model ready");

        Ok(Self {
            bert,
            pooler,
            classifier,
            tokenizer,
            device,
            label_order,
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn forward(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ModelError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ModelError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let batch = encodings.len();
        let seq_len = encodings.first().map(|e| e.len()).unwrap_or(0);
        let mut ids = Vec::with_capacity(batch * seq_len);
        let mut type_ids = Vec::with_capacity(batch * seq_len);
        let mut mask = Vec::with_capacity(batch * seq_len);
        for encoding in &encodings {
            if encoding.len() != seq_len {
                return Err(ModelError::TokenizationFailed {
                    reason: format!(
                        "encodings not padded to a common length ({} vs {})",
                        encoding.len(),
                        seq_len
                    ),
                });
            }
            ids.extend_from_slice(encoding.get_ids());
            type_ids.extend_from_slice(encoding.get_type_ids());
            mask.extend_from_slice(encoding.get_attention_mask());
        }

        let input_ids = Tensor::from_vec(ids, (batch, seq_len), &self.device).map_err(inference)?;
        let token_type_ids =
            Tensor::from_vec(type_ids, (batch, seq_len), &self.device).map_err(inference)?;
        let attention_mask =
            Tensor::from_vec(mask, (batch, seq_len), &self.device).map_err(inference)?;

        let hidden = self
            .bert
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(inference)?;
        let cls = hidden.i((.., 0)).map_err(inference)?;
        let pooled = self
            .pooler
            .forward(&cls)
            .and_then(|t| t.tanh())
            .map_err(inference)?;
        let logits = self.classifier.forward(&pooled).map_err(inference)?;
        let probs = candle_nn::ops::softmax(&logits, D::Minus1).map_err(inference)?;

        probs
            .to_dtype(DType::F32)
            .and_then(|t| t.to_vec2::<f32>())
            .map_err(inference)
    }
}

impl SentimentClassifier for FinBert {
    fn classify_chunk(&self, texts: &[&str]) -> Result<Vec<Probabilities>, ModelError> {
        let rows = self.forward(texts)?;
        rows.into_iter()
            .map(|row| reorder(&row, &self.label_order))
            .collect()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }
}

fn inference(e: candle_core::Error) -> ModelError {
    ModelError::InferenceFailed {
        reason: e.to_string(),
    }
}

fn require_file(dir: &Path, name: &str) -> Result<PathBuf, ModelError> {
    let path = dir.join(name);
    if !path.is_file() {
        return Err(ModelError::ModelNotFound {
            model_path: path.display().to_string(),
        });
    }
    Ok(path)
}

fn load_tokenizer(path: &Path, max_tokens: usize) -> Result<Tokenizer, ModelError> {
    let load_failed = |reason: String| ModelError::ModelLoadingFailed {
        model_path: path.display().to_string(),
        reason,
    };

    let mut tokenizer = Tokenizer::from_file(path).map_err(|e| load_failed(e.to_string()))?;
    let max_length = if max_tokens == 0 {
        DEFAULT_MAX_TOKENS
    } else {
        max_tokens
    };
    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| load_failed(e.to_string()))?;
    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        ..Default::default()
    }));
    Ok(tokenizer)
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>, ModelError> {
    let safetensors = model_dir.join(SAFETENSORS_FILE);
    let pytorch = model_dir.join(PYTORCH_FILE);

    if safetensors.is_file() {
        let tensors = candle_core::safetensors::load(&safetensors, device).map_err(|e| {
            ModelError::ModelLoadingFailed {
                model_path: safetensors.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(VarBuilder::from_tensors(tensors, DType::F32, device))
    } else if pytorch.is_file() {
        VarBuilder::from_pth(&pytorch, DType::F32, device).map_err(|e| {
            ModelError::ModelLoadingFailed {
                model_path: pytorch.display().to_string(),
                reason: e.to_string(),
            }
        })
    } else {
        Err(ModelError::ModelNotFound {
            model_path: safetensors.display().to_string(),
        })
    }
}

/// Resolve the model's output order from `id2label`.
///
/// Unparseable label names fall back to negative/neutral/positive; a head
/// with other than three labels cannot be used.
fn label_order(id2label: &HashMap<String, String>) -> Result<[SentimentLabel; 3], ModelError> {
    if id2label.is_empty() {
        return Ok(SentimentLabel::ALL);
    }
    if id2label.len() != SentimentLabel::ALL.len() {
        return Err(ModelError::InvalidModelConfig {
            details: format!(
                "expected {} labels, config declares {}",
                SentimentLabel::ALL.len(),
                id2label.len()
            ),
        });
    }

    let parsed: Option<Vec<SentimentLabel>> = (0..SentimentLabel::ALL.len())
        .map(|i| {
            id2label
                .get(&i.to_string())
                .and_then(|name| name.parse::<SentimentLabel>().ok())
        })
        .collect();

    match parsed {
        Some(labels)
            if SentimentLabel::ALL
                .iter()
                .all(|label| labels.contains(label)) =>
        {
            Ok([labels[0], labels[1], labels[2]])
        }
        _ => {
            warn!(?id2label, "Unrecognised id2label, assuming negative/neutral/positive");
            Ok(SentimentLabel::ALL)
        }
    }
}

/// Move model-ordered probabilities into canonical order.
fn reorder(row: &[f32], order: &[SentimentLabel; 3]) -> Result<Probabilities, ModelError> {
    if row.len() != order.len() {
        return Err(ModelError::InferenceFailed {
            reason: format!("expected {} logits, got {}", order.len(), row.len()),
        });
    }
    let mut probs = [0.0f32; 3];
    for (value, label) in row.iter().zip(order.iter()) {
        probs[label.index()] = *value;
    }
    Ok(Probabilities(probs))
}
