use burn::{prelude::*, tensor::activation::log_softmax};

/// Label value that marks a position as excluded from the loss
pub const IGNORE_INDEX: i64 = -100;

/// Mean token cross-entropy over positions whose label is not IGNORE_INDEX.
///
/// logits: [batch, seq, vocab], labels: [batch, seq] → scalar loss [1].
/// A batch with every position ignored yields 0.
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
) -> Tensor<B, 1> {
    let [batch, seq, vocab] = logits.dims();
    let n = batch * seq;

    let logits = logits.reshape([n, vocab]);
    let labels = labels.reshape([n]);

    let keep    = labels.clone().equal_elem(IGNORE_INDEX).bool_not().float();
    // Ignored labels still need a valid index for gather; their term is zeroed by `keep`.
    let targets = labels.clamp_min(0).reshape([n, 1]);

    let picked = log_softmax(logits, 1).gather(1, targets).reshape([n]);
    let count  = keep.clone().sum().clamp_min(1.0);

    (picked * keep).sum().neg() / count
}
