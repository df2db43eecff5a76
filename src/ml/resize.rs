// ============================================================
// Layer 5 — Token Embedding Resize
// ============================================================
// When a tokenizer gains tokens (or a pretrained checkpoint was
// saved with a different vocabulary) the vocabulary-indexed
// parameters must follow:
//
//   input embedding  [vocab, hidden]  → rows added / dropped
//   output head      [hidden, vocab]  → columns added / dropped
//
// Existing rows are kept as-is. New rows use the layer's own
// initialiser; new output biases start at zero.
//
// Every resized tensor is rebuilt from its data so the new Param
// is a leaf, which autodiff backends require for tracking.

use burn::{
    module::Param,
    nn::{Embedding, EmbeddingConfig, Linear, LinearConfig},
    prelude::*,
};

pub fn resize_embedding<B: Backend>(embedding: Embedding<B>, new_rows: usize) -> Embedding<B> {
    let weight = embedding.weight.val().detach();
    let [rows, dim] = weight.dims();
    if rows == new_rows {
        return embedding;
    }

    let device  = weight.device();
    let resized = if new_rows < rows {
        weight.slice([0..new_rows, 0..dim])
    } else {
        let fresh = EmbeddingConfig::new(new_rows - rows, dim).init::<B>(&device);
        Tensor::cat(vec![weight, fresh.weight.val().detach()], 0)
    };

    tracing::debug!("Resized token embedding {} → {} rows", rows, new_rows);
    Embedding { weight: leaf_param(resized, &device) }
}

pub fn resize_linear_output<B: Backend>(linear: Linear<B>, new_out: usize) -> Linear<B> {
    let weight = linear.weight.val().detach();
    let [d_in, d_out] = weight.dims();
    if d_out == new_out {
        return linear;
    }

    let device = weight.device();
    let weight = if new_out < d_out {
        weight.slice([0..d_in, 0..new_out])
    } else {
        let fresh = LinearConfig::new(d_in, new_out - d_out).init::<B>(&device);
        Tensor::cat(vec![weight, fresh.weight.val().detach()], 1)
    };

    let bias = linear.bias.map(|bias| {
        let bias = bias.val().detach();
        let bias = if new_out < d_out {
            bias.slice([0..new_out])
        } else {
            Tensor::cat(vec![bias, Tensor::zeros([new_out - d_out], &device)], 0)
        };
        leaf_param(bias, &device)
    });

    Linear { weight: leaf_param(weight, &device), bias }
}

fn leaf_param<B: Backend, const D: usize>(tensor: Tensor<B, D>, device: &B::Device) -> Param<Tensor<B, D>> {
    Param::from_tensor(Tensor::from_data(tensor.into_data(), device))
}
