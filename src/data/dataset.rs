use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One tokenised, padded training example.
///
/// `labels` uses -100 for positions excluded from the loss. For the
/// encoder-decoder task it holds the target sequence, which may be a
/// different length from `input_ids`. `perm_mask` is a row-major
/// [seq, seq] matrix where `true` forbids position i attending j.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LmSample {
    pub input_ids:      Vec<u32>,
    pub attention_mask: Vec<u32>,
    pub labels:         Vec<i64>,
    #[serde(default)]
    pub perm_mask:      Option<Vec<bool>>,
}

impl LmSample {
    pub fn seq_len(&self) -> usize {
        self.input_ids.len()
    }

    /// Positions that contribute to the loss
    pub fn target_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l != crate::ml::loss::IGNORE_INDEX).count()
    }
}

pub struct LmDataset {
    samples: Vec<LmSample>,
}

impl LmDataset {
    pub fn new(samples: Vec<LmSample>) -> Self { Self { samples } }
}

impl Dataset<LmSample> for LmDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
