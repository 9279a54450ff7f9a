use crate::{
    errors::ModelErr,
    morph::{tag::MorphTag, PhemTag},
};
use candle_core::{DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Выбор лучшего разбора токена по контексту.
pub mod disambiguator;
pub use disambiguator::Disambiguator;

/// Морфемная разметка слова по буквам.
pub mod segmenter;
pub use segmenter::Segmenter;

/// Метка выхода модели. Классификаторы различаются только словарем выходов:
/// дизамбигуатор предсказывает морфологические теги, разметчик — морфемные.
pub trait Label: Sized + Clone {
    fn parse_label(s: &str) -> Option<Self>;
}

impl Label for MorphTag {
    fn parse_label(s: &str) -> Option<Self> {
        s.parse().ok()
    }
}

impl Label for PhemTag {
    fn parse_label(s: &str) -> Option<Self> {
        PhemTag::from_abbr(s)
    }
}

#[derive(Debug, Serialize, Deserialize)]
/// Сигнатура модели: порядок входных признаков, порядок выходных меток,
/// размеры скрытых слоев. Лежит рядом с весами отдельным json.
pub struct ModelVocab {
    pub input_features: Vec<String>,
    pub output_tags: Vec<String>,
    #[serde(default)]
    pub hidden: Vec<usize>,
}

#[derive(Debug)]
/// Полносвязная сеть поверх safetensors-весов.
///
/// Сеть собирается по сигнатуре: линейные слои `fc0..fcN` с ReLU между
/// ними. Несовпадение форм весов с сигнатурой ловится при загрузке.
pub struct Model<L> {
    layers: Vec<Linear>,
    inputs: Vec<String>,
    labels: Vec<L>,
    device: Device,
}

impl<L: Label> Model<L> {
    pub fn open<P: AsRef<Path>>(weights: P, vocab: P) -> Result<Self, ModelErr> {
        let file = std::fs::File::open(&vocab).map_err(|error| ModelErr::VocabFile {
            file: vocab.as_ref().into(),
            error,
        })?;
        let vocab: ModelVocab = serde_json::from_reader(file)?;

        let device = Device::Cpu;
        // Файл весов после обучения неизменяем.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights.as_ref()], DType::F32, &device)?
        };

        let model = Self::from_varbuilder(vb, vocab)?;
        info!(
            "Model loaded: {} inputs, {} labels",
            model.inputs.len(),
            model.labels.len()
        );
        Ok(model)
    }

    /// Сборка сети по сигнатуре. Общий путь загрузки и тестов.
    pub(crate) fn from_varbuilder(vb: VarBuilder, vocab: ModelVocab) -> Result<Self, ModelErr> {
        if vocab.input_features.is_empty() {
            return Err(ModelErr::VocabMismatch {
                what: "input features",
                expected: 1,
                found: 0,
            });
        }
        if vocab.output_tags.is_empty() {
            return Err(ModelErr::VocabMismatch {
                what: "output tags",
                expected: 1,
                found: 0,
            });
        }

        let labels = vocab
            .output_tags
            .iter()
            .map(|s| L::parse_label(s).ok_or_else(|| ModelErr::BadLabel(s.clone())))
            .collect::<Result<Vec<L>, ModelErr>>()?;

        let mut dims = Vec::with_capacity(vocab.hidden.len() + 2);
        dims.push(vocab.input_features.len());
        dims.extend(vocab.hidden.iter().copied());
        dims.push(labels.len());

        let mut layers = Vec::with_capacity(dims.len() - 1);
        for i in 0..dims.len() - 1 {
            layers.push(candle_nn::linear(
                dims[i],
                dims[i + 1],
                vb.pp(format!("fc{i}")),
            )?);
        }

        Ok(Self {
            layers,
            inputs: vocab.input_features,
            labels,
            device: Device::Cpu,
        })
    }

    pub fn input_dim(&self) -> usize {
        self.inputs.len()
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }

    /// Прямой проход по признакам одной позиции.
    /// Возвращает вектор оценок по словарю выходов.
    pub fn scores(&self, feats: &[f32]) -> Result<Vec<f32>, ModelErr> {
        if feats.len() != self.input_dim() {
            return Err(ModelErr::VocabMismatch {
                what: "input dim",
                expected: self.input_dim(),
                found: feats.len(),
            });
        }

        let mut x = Tensor::from_slice(feats, (1, feats.len()), &self.device)?;
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i + 1 < self.layers.len() {
                x = x.relu()?;
            }
        }

        let out = x.squeeze(0)?.to_vec1::<f32>()?;
        if out.len() != self.labels.len() {
            return Err(ModelErr::VocabMismatch {
                what: "output dim",
                expected: self.labels.len(),
                found: out.len(),
            });
        }
        Ok(out)
    }
}
