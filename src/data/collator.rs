// ============================================================
// Layer 4 — Task Collator
// ============================================================
// Turns cleaned corpus lines into fixed-length LmSamples, the
// way each task's loss expects them:
//
//   mlm : 15% of real tokens are targets
//           80% → mask token, 10% → random token, 10% unchanged
//         other positions get label -100
//   clm : labels = input ids (the network shifts them itself)
//   cgm : line is "source\ttarget"; input = source ids,
//         labels = target ids
//   plm : random factorisation order over the real tokens; the
//         last sixth of that order are targets. Target inputs are
//         replaced by the mask token, and position i may not attend
//         a target j unless j comes strictly earlier in the order.
//   lm  : labels = input ids (kept for completeness; the plain
//         network has no loss)
//
// Every sample is truncated / padded to max_seq_len. Padding
// positions get attention 0 and label -100.
//
// Reference: Devlin et al. (2019) BERT §3.1
//            Yang et al. (2019) XLNet §2.3

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use tokenizers::Tokenizer;

use crate::data::{dataset::LmSample, preprocessor::Preprocessor};
use crate::domain::task::TaskKind;
use crate::error::{Result, TrainerError};
use crate::infra::tokenizer_store::{encode_ids, mask_token_id, pad_token_id, vocab_size};
use crate::ml::loss::IGNORE_INDEX;

pub const MLM_PROBABILITY: f64 = 0.15;
/// One in this many real tokens is predicted by the permutation task
pub const PLM_SPAN_RATIO: usize = 6;

pub struct Collator {
    task:         TaskKind,
    tokenizer:    Tokenizer,
    preprocessor: Preprocessor,
    max_seq_len:  usize,
    pad_id:       u32,
    mask_id:      Option<u32>,
    vocab_size:   usize,
    rng:          StdRng,
}

impl Collator {
    pub fn new(task: TaskKind, tokenizer: Tokenizer, max_seq_len: usize, seed: u64) -> Result<Self> {
        let mask_id = mask_token_id(&tokenizer);
        if matches!(task, TaskKind::Mlm | TaskKind::Plm) && mask_id.is_none() {
            return Err(TrainerError::Tokenizer(format!(
                "task '{task}' needs a mask token ([MASK] or <mask>) in the tokenizer"
            )));
        }

        Ok(Self {
            task,
            pad_id: pad_token_id(&tokenizer).unwrap_or(0),
            vocab_size: vocab_size(&tokenizer),
            tokenizer,
            preprocessor: Preprocessor::new(),
            max_seq_len: max_seq_len.max(1),
            mask_id,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Collate every usable line; lines that clean or tokenise to nothing are skipped
    pub fn collate(&mut self, lines: &[String]) -> Result<Vec<LmSample>> {
        let mut samples = Vec::with_capacity(lines.len());
        let mut skipped = 0usize;

        for line in lines {
            match self.sample(line)? {
                Some(sample) => samples.push(sample),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!("Skipped {} of {} lines with no usable tokens", skipped, lines.len());
        }
        let targets: usize = samples.iter().map(LmSample::target_count).sum();
        tracing::debug!(
            "Collated {} '{}' samples, {} target positions (max_seq_len={})",
            samples.len(),
            self.task,
            targets,
            self.max_seq_len,
        );
        Ok(samples)
    }

    fn sample(&mut self, line: &str) -> Result<Option<LmSample>> {
        if self.task == TaskKind::Cgm {
            let Some((source, target)) = self.preprocessor.split_pair(line) else {
                return Ok(None);
            };
            let source = self.encode(&source)?;
            let target = self.encode(&target)?;
            if source.is_empty() || target.is_empty() {
                return Ok(None);
            }
            let (input_ids, attention_mask) = self.pad_inputs(&source);
            let labels = self.pad_labels(target.iter().map(|&t| t as i64).collect());
            return Ok(Some(LmSample { input_ids, attention_mask, labels, perm_mask: None }));
        }

        let ids = self.encode(&self.preprocessor.clean(line))?;
        if ids.is_empty() {
            return Ok(None);
        }

        Ok(Some(match self.task {
            TaskKind::Mlm => self.masked(ids),
            TaskKind::Plm => self.permuted(ids),
            _ => {
                let labels = self.pad_labels(ids.iter().map(|&t| t as i64).collect());
                let (input_ids, attention_mask) = self.pad_inputs(&ids);
                LmSample { input_ids, attention_mask, labels, perm_mask: None }
            }
        }))
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = encode_ids(&self.tokenizer, text)?;
        ids.truncate(self.max_seq_len);
        Ok(ids)
    }

    fn pad_inputs(&self, ids: &[u32]) -> (Vec<u32>, Vec<u32>) {
        let mut input_ids = ids.to_vec();
        let mut attention = vec![1u32; ids.len()];
        input_ids.resize(self.max_seq_len, self.pad_id);
        attention.resize(self.max_seq_len, 0);
        (input_ids, attention)
    }

    fn pad_labels(&self, mut labels: Vec<i64>) -> Vec<i64> {
        labels.resize(self.max_seq_len, IGNORE_INDEX);
        labels
    }

    fn masked(&mut self, mut ids: Vec<u32>) -> LmSample {
        let mask_id = self.mask_id.unwrap_or(self.pad_id);
        let mut labels = vec![IGNORE_INDEX; ids.len()];

        for (pos, id) in ids.iter_mut().enumerate() {
            if !self.rng.gen_bool(MLM_PROBABILITY) {
                continue;
            }
            labels[pos] = *id as i64;
            let roll: f64 = self.rng.gen();
            if roll < 0.8 {
                *id = mask_id;
            } else if roll < 0.9 {
                *id = self.rng.gen_range(0..self.vocab_size as u32);
            }
        }

        let (input_ids, attention_mask) = self.pad_inputs(&ids);
        LmSample { input_ids, attention_mask, labels: self.pad_labels(labels), perm_mask: None }
    }

    fn permuted(&mut self, mut ids: Vec<u32>) -> LmSample {
        let mask_id = self.mask_id.unwrap_or(self.pad_id);
        let len = ids.len();
        let seq = self.max_seq_len;

        // rank[p] = place of position p in the factorisation order
        let mut order: Vec<usize> = (0..len).collect();
        order.shuffle(&mut self.rng);
        let mut rank = vec![0usize; len];
        for (r, &p) in order.iter().enumerate() {
            rank[p] = r;
        }

        let num_predict = (len / PLM_SPAN_RATIO).max(1);
        let first_target = len - num_predict;
        let is_target: Vec<bool> = (0..len).map(|p| rank[p] >= first_target).collect();

        let mut labels = vec![IGNORE_INDEX; len];
        for p in (0..len).filter(|&p| is_target[p]) {
            labels[p] = ids[p] as i64;
            ids[p] = mask_id;
        }

        let mut perm_mask = vec![false; seq * seq];
        for i in 0..len {
            for j in (0..len).filter(|&j| is_target[j]) {
                perm_mask[i * seq + j] = rank[j] >= rank[i];
            }
        }

        let (input_ids, attention_mask) = self.pad_inputs(&ids);
        LmSample {
            input_ids,
            attention_mask,
            labels: self.pad_labels(labels),
            perm_mask: Some(perm_mask),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::TokenizerStore;

    const WORDS: &str = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";

    fn tokenizer(dir: &std::path::Path) -> Tokenizer {
        TokenizerStore::new(dir).load_or_build(&[WORDS.to_string()], 100).unwrap()
    }

    fn collator(task: TaskKind, max_seq_len: usize) -> (tempfile::TempDir, Collator) {
        let dir = tempfile::tempdir().unwrap();
        let tok = tokenizer(dir.path());
        let collator = Collator::new(task, tok, max_seq_len, 3).unwrap();
        (dir, collator)
    }

    #[test]
    fn test_clm_labels_copy_inputs_and_ignore_padding() {
        let (_dir, mut c) = collator(TaskKind::Clm, 6);
        let out = c.collate(&["alpha beta gamma".to_string()]).unwrap();
        let s = &out[0];

        assert_eq!(s.seq_len(), 6);
        assert_eq!(s.attention_mask, vec![1, 1, 1, 0, 0, 0]);
        assert_eq!(&s.labels[..3], &s.input_ids[..3].iter().map(|&i| i as i64).collect::<Vec<_>>()[..]);
        assert_eq!(&s.labels[3..], &[IGNORE_INDEX; 3]);
        assert_eq!(&s.input_ids[3..], &[0, 0, 0]);
    }

    #[test]
    fn test_long_lines_are_truncated() {
        let (_dir, mut c) = collator(TaskKind::Clm, 4);
        let out = c.collate(&[WORDS.to_string()]).unwrap();
        assert_eq!(out[0].seq_len(), 4);
        assert_eq!(out[0].attention_mask, vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_mlm_targets_keep_original_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tok = tokenizer(dir.path());
        let originals = encode_ids(&tok, WORDS).unwrap();
        let mut c = Collator::new(TaskKind::Mlm, tok, 12, 11).unwrap();

        let lines = vec![WORDS.to_string(); 200];
        let samples = c.collate(&lines).unwrap();

        let mut targets = 0usize;
        for s in &samples {
            for (pos, &label) in s.labels.iter().enumerate() {
                if label == IGNORE_INDEX {
                    assert_eq!(s.input_ids[pos], originals[pos]);
                } else {
                    assert_eq!(label, originals[pos] as i64);
                    targets += 1;
                }
            }
        }
        // 2400 real tokens at 15%
        let rate = targets as f64 / 2400.0;
        assert!((0.10..0.20).contains(&rate), "rate {rate}");
    }

    #[test]
    fn test_mlm_mostly_uses_mask_token() {
        let dir = tempfile::tempdir().unwrap();
        let tok = tokenizer(dir.path());
        let mask = mask_token_id(&tok).unwrap();
        let mut c = Collator::new(TaskKind::Mlm, tok, 12, 5).unwrap();

        let samples = c.collate(&vec![WORDS.to_string(); 200]).unwrap();
        let (masked, targets) = samples.iter().fold((0usize, 0usize), |(m, t), s| {
            let hits = s.labels.iter().zip(&s.input_ids).filter(|(l, _)| **l != IGNORE_INDEX);
            hits.fold((m, t), |(m, t), (_, &id)| (m + usize::from(id == mask), t + 1))
        });
        assert!(masked as f64 / targets as f64 > 0.6);
    }

    #[test]
    fn test_cgm_splits_source_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let tok = tokenizer(dir.path());
        let src = encode_ids(&tok, "alpha beta").unwrap();
        let tgt = encode_ids(&tok, "gamma delta epsilon").unwrap();
        let mut c = Collator::new(TaskKind::Cgm, tok, 5, 0).unwrap();

        let out = c
            .collate(&["alpha beta\tgamma delta epsilon".to_string(), "no tab here".to_string()])
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(&out[0].input_ids[..2], &src[..]);
        assert_eq!(out[0].attention_mask, vec![1, 1, 0, 0, 0]);
        let expected: Vec<i64> = tgt.iter().map(|&t| t as i64).chain([IGNORE_INDEX; 2]).collect();
        assert_eq!(out[0].labels, expected);
    }

    #[test]
    fn test_plm_targets_are_hidden_from_later_and_equal_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let tok = tokenizer(dir.path());
        let mask = mask_token_id(&tok).unwrap();
        let mut c = Collator::new(TaskKind::Plm, tok, 14, 21).unwrap();

        let s = &c.collate(&[WORDS.to_string()]).unwrap()[0];
        let perm = s.perm_mask.as_ref().unwrap();
        assert_eq!(perm.len(), 14 * 14);

        let targets: Vec<usize> = (0..14).filter(|&p| s.labels[p] != IGNORE_INDEX).collect();
        assert_eq!(targets.len(), 12 / PLM_SPAN_RATIO);
        for &t in &targets {
            assert_eq!(s.input_ids[t], mask);
            // no position sees its own target
            assert!(perm[t * 14 + t]);
        }
        // non-targets and padding are never hidden
        for i in 0..14 {
            for j in (0..14).filter(|j| !targets.contains(j)) {
                assert!(!perm[i * 14 + j]);
            }
        }
    }

    #[test]
    fn test_mask_token_required_for_mlm() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": { "type": "WordLevel", "vocab": { "[UNK]": 0, "a": 1 }, "unk_token": "[UNK]" }
        });
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, json.to_string()).unwrap();
        let tok = Tokenizer::from_file(&path).unwrap();

        assert!(matches!(
            Collator::new(TaskKind::Mlm, tok.clone(), 8, 0),
            Err(TrainerError::Tokenizer(_))
        ));
        assert!(Collator::new(TaskKind::Clm, tok, 8, 0).is_ok());
    }
}
