// ============================================================
// Layer 5 — Task Networks
// ============================================================
// One network per task, all composed from Burn's nn building
// blocks (Embedding, Linear, LayerNorm, TransformerEncoder,
// TransformerDecoder). Nothing here implements attention or
// autograd itself; each network only wires a head onto a
// backbone and picks the masks and loss for its task.
//
//   BaseModel           lm   backbone only, returns hidden states
//   MaskedLmModel       mlm  bidirectional encoder + MLM head
//   CausalLmModel       clm  encoder with autoregressive mask + LM head
//   Seq2SeqLmModel      cgm  encoder-decoder + LM head
//   PermutationLmModel  plm  encoder with permutation mask + LM head
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017), Devlin et al. (2019),
//            Radford et al. (2019), Raffel et al. (2020), Yang et al. (2019)

use burn::{
    nn::{
        attention::generate_autoregressive_mask,
        transformer::{
            TransformerDecoder, TransformerDecoderConfig, TransformerDecoderInput,
            TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput,
        },
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig, Linear,
        LinearConfig,
    },
    prelude::*,
    tensor::activation::gelu,
};

use crate::data::batcher::LmBatch;
use crate::error::{Result, TrainerError};
use crate::ml::config::ArchitectureConfig;
use crate::ml::loss::{masked_cross_entropy, IGNORE_INDEX};
use crate::ml::resize::{resize_embedding, resize_linear_output};

/// What a network returns for a batch: its logits and, when the
/// batch carried labels and the network has a head, the loss.
pub struct NetworkOutput<B: Backend> {
    pub logits: Tensor<B, 3>,
    pub loss:   Option<Tensor<B, 1>>,
}

/// Shared surface of the five task networks
pub trait LanguageNetwork<B: Backend>: Module<B> {
    /// Short name used in logs and errors
    const NAME: &'static str;

    /// Whether forward_batch can produce a loss at all
    const HAS_LOSS_HEAD: bool = true;

    /// Freshly initialised weights for this architecture
    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self;

    /// input_ids [batch, seq] → logits [batch, seq, output_size]
    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3>;

    /// Full forward with the batch's masks, plus loss when labels are present
    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B>;

    fn resize_token_embeddings(self, vocab_size: usize) -> Self;

    /// Row count of the input embedding table
    fn embedding_rows(&self) -> usize;

    /// Trailing dimension of `forward`'s output
    fn output_size(&self) -> usize;
}

// ─── Embeddings ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Embeddings<B: Backend> {
    pub token:      Embedding<B>,
    pub position:   Embedding<B>,
    pub token_type: Option<Embedding<B>>,
    pub norm:       LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> Embeddings<B> {
    pub fn new(config: &ArchitectureConfig, with_token_types: bool, device: &B::Device) -> Self {
        let d = config.hidden_size;
        let token_type = (with_token_types && config.type_vocab_size > 0)
            .then(|| EmbeddingConfig::new(config.type_vocab_size, d).init(device));
        Self {
            token:    EmbeddingConfig::new(config.vocab_size, d).init(device),
            position: EmbeddingConfig::new(config.max_position_embeddings, d).init(device),
            token_type,
            norm:     LayerNormConfig::new(d).init(device),
            dropout:  DropoutConfig::new(config.hidden_dropout_prob).init(),
        }
    }

    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Option<Tensor<B, 2, Int>>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        // Attention is permutation-invariant, so positions are injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let mut x = self.token.forward(input_ids) + self.position.forward(positions);
        if let (Some(table), Some(types)) = (&self.token_type, token_type_ids) {
            x = x + table.forward(types);
        }
        self.dropout.forward(self.norm.forward(x))
    }

    fn rows(&self) -> usize {
        self.token.weight.dims()[0]
    }

    fn resize(mut self, vocab_size: usize) -> Self {
        self.token = resize_embedding(self.token, vocab_size);
        self
    }
}

// ─── Backbone ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Backbone<B: Backend> {
    pub embeddings: Embeddings<B>,
    pub encoder:    TransformerEncoder<B>,
}

impl<B: Backend> Backbone<B> {
    pub fn new(config: &ArchitectureConfig, with_token_types: bool, device: &B::Device) -> Self {
        let encoder = TransformerEncoderConfig::new(
            config.hidden_size,
            config.intermediate_size,
            config.num_attention_heads,
            config.num_hidden_layers,
        )
        .with_dropout(config.hidden_dropout_prob)
        .init(device);
        Self { embeddings: Embeddings::new(config, with_token_types, device), encoder }
    }

    /// → hidden states [batch, seq, hidden]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Option<Tensor<B, 2, Int>>,
        mask_pad:       Option<Tensor<B, 2, Bool>>,
        mask_attn:      Option<Tensor<B, 3, Bool>>,
    ) -> Tensor<B, 3> {
        let x = self.embeddings.forward(input_ids, token_type_ids);
        let mut input = TransformerEncoderInput::new(x);
        if let Some(mask) = mask_pad {
            input = input.mask_pad(mask);
        }
        if let Some(mask) = mask_attn {
            input = input.mask_attn(mask);
        }
        self.encoder.forward(input)
    }

    fn hidden_size(&self) -> usize {
        self.embeddings.token.weight.dims()[1]
    }
}

fn lm_head<B: Backend>(config: &ArchitectureConfig, device: &B::Device) -> Linear<B> {
    LinearConfig::new(config.hidden_size, config.vocab_size).init(device)
}

fn head_size<B: Backend>(head: &Linear<B>) -> usize {
    head.weight.dims()[1]
}

// ─── lm ───────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BaseModel<B: Backend> {
    pub backbone: Backbone<B>,
}

impl<B: Backend> LanguageNetwork<B> for BaseModel<B> {
    const NAME: &'static str = "lm";
    const HAS_LOSS_HEAD: bool = false;

    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self {
        Self { backbone: Backbone::new(config, true, device) }
    }

    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.backbone.forward(input_ids, None, None, None)
    }

    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B> {
        let mask_pad = batch.padding_mask();
        let hidden = self.backbone.forward(batch.input_ids, batch.token_type_ids, mask_pad, None);
        NetworkOutput { logits: hidden, loss: None }
    }

    fn resize_token_embeddings(mut self, vocab_size: usize) -> Self {
        self.backbone.embeddings = self.backbone.embeddings.resize(vocab_size);
        self
    }

    fn embedding_rows(&self) -> usize {
        self.backbone.embeddings.rows()
    }

    fn output_size(&self) -> usize {
        self.backbone.hidden_size()
    }
}

// ─── mlm ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct MaskedLmModel<B: Backend> {
    pub backbone:       Backbone<B>,
    pub transform:      Linear<B>,
    pub transform_norm: LayerNorm<B>,
    pub lm_head:        Linear<B>,
}

impl<B: Backend> MaskedLmModel<B> {
    fn head(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        let x = self.transform_norm.forward(gelu(self.transform.forward(hidden)));
        self.lm_head.forward(x)
    }
}

impl<B: Backend> LanguageNetwork<B> for MaskedLmModel<B> {
    const NAME: &'static str = "mlm";

    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self {
        let d = config.hidden_size;
        Self {
            backbone:       Backbone::new(config, true, device),
            transform:      LinearConfig::new(d, d).init(device),
            transform_norm: LayerNormConfig::new(d).init(device),
            lm_head:        lm_head(config, device),
        }
    }

    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.head(self.backbone.forward(input_ids, None, None, None))
    }

    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B> {
        let mask_pad = batch.padding_mask();
        let hidden = self.backbone.forward(batch.input_ids, batch.token_type_ids, mask_pad, None);
        let logits = self.head(hidden);
        let loss = batch.labels.map(|labels| masked_cross_entropy(logits.clone(), labels));
        NetworkOutput { logits, loss }
    }

    fn resize_token_embeddings(mut self, vocab_size: usize) -> Self {
        self.backbone.embeddings = self.backbone.embeddings.resize(vocab_size);
        self.lm_head = resize_linear_output(self.lm_head, vocab_size);
        self
    }

    fn embedding_rows(&self) -> usize {
        self.backbone.embeddings.rows()
    }

    fn output_size(&self) -> usize {
        head_size(&self.lm_head)
    }
}

// ─── clm ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CausalLmModel<B: Backend> {
    pub backbone: Backbone<B>,
    pub lm_head:  Linear<B>,
}

impl<B: Backend> CausalLmModel<B> {
    fn logits(&self, input_ids: Tensor<B, 2, Int>, mask_pad: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let causal = generate_autoregressive_mask::<B>(batch_size, seq_len, &input_ids.device());
        let hidden = self.backbone.forward(input_ids, None, mask_pad, Some(causal));
        self.lm_head.forward(hidden)
    }
}

/// Next-token loss: logits at t predict labels at t + 1
fn shifted_loss<B: Backend>(logits: Tensor<B, 3>, labels: Tensor<B, 2, Int>) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab] = logits.dims();
    if seq_len < 2 {
        return Tensor::zeros([1], &logits.device());
    }
    let logits = logits.slice([0..batch_size, 0..seq_len - 1, 0..vocab]);
    let labels = labels.slice([0..batch_size, 1..seq_len]);
    masked_cross_entropy(logits, labels)
}

impl<B: Backend> LanguageNetwork<B> for CausalLmModel<B> {
    const NAME: &'static str = "clm";

    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self {
        Self {
            backbone: Backbone::new(config, false, device),
            lm_head:  lm_head(config, device),
        }
    }

    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.logits(input_ids, None)
    }

    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B> {
        let mask_pad = batch.padding_mask();
        let logits = self.logits(batch.input_ids, mask_pad);
        let loss = batch.labels.map(|labels| shifted_loss(logits.clone(), labels));
        NetworkOutput { logits, loss }
    }

    fn resize_token_embeddings(mut self, vocab_size: usize) -> Self {
        self.backbone.embeddings = self.backbone.embeddings.resize(vocab_size);
        self.lm_head = resize_linear_output(self.lm_head, vocab_size);
        self
    }

    fn embedding_rows(&self) -> usize {
        self.backbone.embeddings.rows()
    }

    fn output_size(&self) -> usize {
        head_size(&self.lm_head)
    }
}

// ─── cgm ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct Seq2SeqLmModel<B: Backend> {
    pub encoder_embeddings: Embeddings<B>,
    pub encoder:            TransformerEncoder<B>,
    pub decoder_embeddings: Embeddings<B>,
    pub decoder:            TransformerDecoder<B>,
    pub lm_head:            Linear<B>,
    pub pad_token_id:           usize,
    pub decoder_start_token_id: usize,
}

/// labels [batch, tgt] → decoder inputs [start, l0, ..., l(tgt-2)], with -100 replaced by pad
pub fn shift_tokens_right<B: Backend>(
    labels:   Tensor<B, 2, Int>,
    start_id: usize,
    pad_id:   usize,
) -> Tensor<B, 2, Int> {
    let [batch_size, seq_len] = labels.dims();
    let device = labels.device();
    let ignored = labels.clone().equal_elem(IGNORE_INDEX);
    let labels = labels.mask_fill(ignored, pad_id as i64);
    let start = Tensor::<B, 2, Int>::full([batch_size, 1], start_id as i64, &device);
    if seq_len < 2 {
        return start;
    }
    Tensor::cat(vec![start, labels.slice([0..batch_size, 0..seq_len - 1])], 1)
}

impl<B: Backend> Seq2SeqLmModel<B> {
    fn run(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        encoder_pad:       Option<Tensor<B, 2, Bool>>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let x = self.encoder_embeddings.forward(input_ids, None);
        let mut enc_input = TransformerEncoderInput::new(x);
        if let Some(mask) = encoder_pad.clone() {
            enc_input = enc_input.mask_pad(mask);
        }
        let memory = self.encoder.forward(enc_input);

        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let causal = generate_autoregressive_mask::<B>(batch_size, tgt_len, &memory.device());
        let target = self.decoder_embeddings.forward(decoder_input_ids, None);
        let mut dec_input = TransformerDecoderInput::new(target, memory).target_mask_attn(causal);
        if let Some(mask) = encoder_pad {
            dec_input = dec_input.memory_mask_pad(mask);
        }
        self.lm_head.forward(self.decoder.forward(dec_input))
    }
}

impl<B: Backend> LanguageNetwork<B> for Seq2SeqLmModel<B> {
    const NAME: &'static str = "cgm";

    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self {
        let encoder = TransformerEncoderConfig::new(
            config.hidden_size,
            config.intermediate_size,
            config.num_attention_heads,
            config.num_hidden_layers,
        )
        .with_dropout(config.hidden_dropout_prob)
        .init(device);
        let decoder = TransformerDecoderConfig::new(
            config.hidden_size,
            config.intermediate_size,
            config.num_attention_heads,
            config.num_decoder_layers,
        )
        .with_dropout(config.hidden_dropout_prob)
        .init(device);
        Self {
            encoder_embeddings: Embeddings::new(config, false, device),
            encoder,
            decoder_embeddings: Embeddings::new(config, false, device),
            decoder,
            lm_head: lm_head(config, device),
            pad_token_id:           config.pad_token_id as usize,
            decoder_start_token_id: config.decoder_start_token_id as usize,
        }
    }

    /// Without targets the decoder is teacher-forced on the shifted input itself
    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let decoder_input_ids =
            shift_tokens_right(input_ids.clone(), self.decoder_start_token_id, self.pad_token_id);
        self.run(input_ids, None, decoder_input_ids)
    }

    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B> {
        let encoder_pad = batch.padding_mask();
        let decoder_input_ids = match (batch.decoder_input_ids, &batch.labels) {
            (Some(ids), _) => ids,
            (None, Some(labels)) => shift_tokens_right(
                labels.clone(),
                self.decoder_start_token_id,
                self.pad_token_id,
            ),
            (None, None) => shift_tokens_right(
                batch.input_ids.clone(),
                self.decoder_start_token_id,
                self.pad_token_id,
            ),
        };
        let logits = self.run(batch.input_ids, encoder_pad, decoder_input_ids);
        let loss = batch.labels.map(|labels| masked_cross_entropy(logits.clone(), labels));
        NetworkOutput { logits, loss }
    }

    fn resize_token_embeddings(mut self, vocab_size: usize) -> Self {
        self.encoder_embeddings = self.encoder_embeddings.resize(vocab_size);
        self.decoder_embeddings = self.decoder_embeddings.resize(vocab_size);
        self.lm_head = resize_linear_output(self.lm_head, vocab_size);
        self
    }

    fn embedding_rows(&self) -> usize {
        self.encoder_embeddings.rows()
    }

    fn output_size(&self) -> usize {
        head_size(&self.lm_head)
    }
}

// ─── plm ──────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct PermutationLmModel<B: Backend> {
    pub backbone: Backbone<B>,
    pub lm_head:  Linear<B>,
}

impl<B: Backend> LanguageNetwork<B> for PermutationLmModel<B> {
    const NAME: &'static str = "plm";

    fn init(config: &ArchitectureConfig, device: &B::Device) -> Self {
        Self {
            backbone: Backbone::new(config, true, device),
            lm_head:  lm_head(config, device),
        }
    }

    fn forward(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.lm_head.forward(self.backbone.forward(input_ids, None, None, None))
    }

    fn forward_batch(&self, batch: LmBatch<B>) -> NetworkOutput<B> {
        let mask_pad = batch.padding_mask();
        let mut hidden = self.backbone.forward(
            batch.input_ids,
            batch.token_type_ids,
            mask_pad,
            batch.perm_mask,
        );
        // [batch, num_predict, seq] x [batch, seq, hidden] → [batch, num_predict, hidden]
        if let Some(mapping) = batch.target_mapping {
            hidden = mapping.matmul(hidden);
        }
        let logits = self.lm_head.forward(hidden);
        let loss = batch.labels.map(|labels| masked_cross_entropy(logits.clone(), labels));
        NetworkOutput { logits, loss }
    }

    fn resize_token_embeddings(mut self, vocab_size: usize) -> Self {
        self.backbone.embeddings = self.backbone.embeddings.resize(vocab_size);
        self.lm_head = resize_linear_output(self.lm_head, vocab_size);
        self
    }

    fn embedding_rows(&self) -> usize {
        self.backbone.embeddings.rows()
    }

    fn output_size(&self) -> usize {
        head_size(&self.lm_head)
    }
}

/// Loss from a network output, or the reason there is none
pub fn require_loss<B: Backend, N: LanguageNetwork<B>>(output: &NetworkOutput<B>) -> Result<Tensor<B, 1>> {
    match &output.loss {
        Some(loss) => Ok(loss.clone()),
        None if N::HAS_LOSS_HEAD => Err(TrainerError::MissingLabels(N::NAME)),
        None => Err(TrainerError::NoLossHead(N::NAME)),
    }
}
