// ============================================================
// Layer 4 — LM Batcher
// ============================================================
// Converts a slice of LmSamples into one LmBatch of tensors.
//
// How batching works here:
//   Input:  N samples, each already padded to length S
//   Output: LmBatch with tensors of shape [N, S]
//
//   Every per-token field is flattened into one Vec and then
//   reshaped: [s1_t1, ..., s1_tS, s2_t1, ..., sN_tS] → [N, S]
//
// The batch is the typed form of the "batch mapping" every
// network consumes: input_ids are always present, the other
// fields depend on the task.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::LmSample;

// ─── LmBatch ──────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Token ids: [batch, seq]
    pub input_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding: [batch, seq]
    pub attention_mask: Option<Tensor<B, 2, Int>>,

    /// Segment ids for encoders with token type embeddings: [batch, seq]
    pub token_type_ids: Option<Tensor<B, 2, Int>>,

    /// Targets, -100 = ignored: [batch, seq] or [batch, tgt_seq]
    pub labels: Option<Tensor<B, 2, Int>>,

    /// Explicit decoder inputs for the encoder-decoder task: [batch, tgt_seq]
    pub decoder_input_ids: Option<Tensor<B, 2, Int>>,

    /// true = query i may NOT attend key j: [batch, seq, seq]
    pub perm_mask: Option<Tensor<B, 3, Bool>>,

    /// One-hot prediction positions: [batch, num_predict, seq]
    pub target_mapping: Option<Tensor<B, 3>>,
}

impl<B: Backend> LmBatch<B> {
    pub fn new(input_ids: Tensor<B, 2, Int>) -> Self {
        Self {
            input_ids,
            attention_mask:    None,
            token_type_ids:    None,
            labels:            None,
            decoder_input_ids: None,
            perm_mask:         None,
            target_mapping:    None,
        }
    }

    pub fn with_attention_mask(mut self, mask: Tensor<B, 2, Int>) -> Self {
        self.attention_mask = Some(mask);
        self
    }

    pub fn with_token_type_ids(mut self, ids: Tensor<B, 2, Int>) -> Self {
        self.token_type_ids = Some(ids);
        self
    }

    pub fn with_labels(mut self, labels: Tensor<B, 2, Int>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_decoder_input_ids(mut self, ids: Tensor<B, 2, Int>) -> Self {
        self.decoder_input_ids = Some(ids);
        self
    }

    pub fn with_perm_mask(mut self, mask: Tensor<B, 3, Bool>) -> Self {
        self.perm_mask = Some(mask);
        self
    }

    pub fn with_target_mapping(mut self, mapping: Tensor<B, 3>) -> Self {
        self.target_mapping = Some(mapping);
        self
    }

    /// Padding mask in the form attention layers expect: true = padding
    pub fn padding_mask(&self) -> Option<Tensor<B, 2, Bool>> {
        self.attention_mask.clone().map(|m| m.equal_elem(0))
    }

    pub fn batch_size(&self) -> usize {
        self.input_ids.dims()[0]
    }
}

// ─── LmBatcher ────────────────────────────────────────────────────────────────
/// Stateless: the DataLoader hands over the device with every batch.
#[derive(Clone, Debug, Default)]
pub struct LmBatcher;

impl LmBatcher {
    pub fn new() -> Self {
        Self
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items, device) with each mini-batch.
impl<B: Backend> Batcher<B, LmSample, LmBatch<B>> for LmBatcher {
    /// Stack pre-padded samples into one batch.
    /// `items` must be non-empty and share sequence lengths.
    fn batch(&self, items: Vec<LmSample>, device: &B::Device) -> LmBatch<B> {
        let batch_size = items.len();
        let seq_len    = items[0].input_ids.len();
        let label_len  = items[0].labels.len();

        let input_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.input_ids.iter().map(|&x| x as i32))
            .collect();

        let mask_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.attention_mask.iter().map(|&x| x as i32))
            .collect();

        let label_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.labels.iter().map(|&x| x as i32))
            .collect();

        let input_ids = Tensor::<B, 1, Int>::from_ints(input_flat.as_slice(), device)
            .reshape([batch_size, seq_len]);
        let attention_mask = Tensor::<B, 1, Int>::from_ints(mask_flat.as_slice(), device)
            .reshape([batch_size, seq_len]);

        let mut batch = LmBatch::new(input_ids).with_attention_mask(attention_mask);

        if label_len > 0 {
            let labels = Tensor::<B, 1, Int>::from_ints(label_flat.as_slice(), device)
                .reshape([batch_size, label_len]);
            batch = batch.with_labels(labels);
        }

        // Permutation masks come all-or-nothing per batch
        if items.iter().all(|s| s.perm_mask.is_some()) {
            let perm_flat: Vec<i32> = items
                .iter()
                .flat_map(|s| s.perm_mask.iter().flatten().map(|&b| b as i32))
                .collect();
            let perm_mask = Tensor::<B, 1, Int>::from_ints(perm_flat.as_slice(), device)
                .reshape([batch_size, seq_len, seq_len])
                .equal_elem(1);
            batch = batch.with_perm_mask(perm_mask);
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn sample(ids: &[u32], labels: &[i64]) -> LmSample {
        LmSample {
            input_ids:      ids.to_vec(),
            attention_mask: ids.iter().map(|&i| u32::from(i != 0)).collect(),
            labels:         labels.to_vec(),
            perm_mask:      None,
        }
    }

    fn batch(items: Vec<LmSample>) -> LmBatch<TB> {
        LmBatcher::new().batch(items, &Default::default())
    }

    #[test]
    fn test_batch_shapes() {
        let batch = batch(vec![
            sample(&[5, 6, 7, 0], &[5, 6, 7, -100]),
            sample(&[8, 9, 0, 0], &[8, 9, -100, -100]),
        ]);

        assert_eq!(batch.input_ids.dims(), [2, 4]);
        assert_eq!(batch.labels.as_ref().unwrap().dims(), [2, 4]);
        assert!(batch.perm_mask.is_none());

        let pad: Vec<bool> = batch.padding_mask().unwrap().into_data().to_vec().unwrap();
        assert_eq!(pad, vec![false, false, false, true, false, false, true, true]);
    }

    #[test]
    fn test_labels_may_differ_in_length() {
        let batch = batch(vec![sample(&[5, 6, 7], &[9, 9])]);
        assert_eq!(batch.labels.unwrap().dims(), [1, 2]);
    }

    #[test]
    fn test_perm_mask_is_stacked() {
        let mut s = sample(&[5, 6], &[-100, 6]);
        s.perm_mask = Some(vec![true, false, true, true]);

        let mask = batch(vec![s]).perm_mask.unwrap();
        assert_eq!(mask.dims(), [1, 2, 2]);
        let flat: Vec<bool> = mask.into_data().to_vec().unwrap();
        assert_eq!(flat, vec![true, false, true, true]);
    }
}
