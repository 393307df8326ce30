// ============================================================
// Layer 5 — Modular Addition Network
// ============================================================
// A two-layer MLP over a pair of token embeddings:
//
//   emb_a, emb_b = embed_a[a], embed_b[b]            [batch, E]
//   h            = relu(emb_a·W_a + emb_b·W_b)       [batch, H]
//   logits       = (h·W_out)·unembed                 [batch, n]
//
// The architecture switch decides which matrices exist:
//
//   embed_config  untied     → embed_a, embed_b, unembed
//                 input_tied → embed (both slots), unembed
//                 tied       → embed (both slots), unembed = embedᵀ
//   hidden        collapsed  → no W, h = relu(emb_a + emb_b)
//                 tied       → W_a = W_b = hidden
//                 untied     → hidden_a, hidden_b
//   output        collapsed  → logits = h·embedᵀ when tied and E == H,
//                              otherwise logits = h·unembed [H, n]
//
// Parameters are held as bare `Param` matrices rather than
// nn::Linear so the tied variants can reuse one matrix in two
// places and every init is drawn from the run seed.

use anyhow::{anyhow, Result};
use burn::{
    module::Param,
    prelude::*,
    tensor::activation::{log_softmax, relu},
};
use rand::Rng;

use crate::data::batcher::TensorBatch;
use crate::domain::hyper::{EmbedConfig, Hyper};
use crate::ml::init;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct GrokModelConfig {
    pub n_tokens:            usize,
    pub embed_size:          usize,
    pub hidden_size:         usize,
    pub embed_config:        EmbedConfig,
    pub is_collapsed_hidden: bool,
    pub is_tied_hidden:      bool,
    pub is_collapsed_out:    bool,
}

impl From<&Hyper> for GrokModelConfig {
    fn from(h: &Hyper) -> Self {
        GrokModelConfig::new(
            h.n_tokens, h.embed_size, h.hidden_size, h.embed_config,
            h.is_collapsed_hidden, h.is_tied_hidden, h.is_collapsed_out,
        )
    }
}

impl GrokModelConfig {
    /// Width of the ReLU layer.
    pub fn hidden_width(&self) -> usize {
        if self.is_collapsed_hidden { self.embed_size } else { self.hidden_size }
    }

    /// Build the model, drawing every weight from `rng` in declaration order:
    /// embeddings, hidden, out, unembed.
    pub fn init<B: Backend, R: Rng + ?Sized>(&self, rng: &mut R, device: &B::Device) -> GrokModel<B> {
        let n     = self.n_tokens;
        let e     = self.embed_size;
        let width = self.hidden_width();

        let embed   = Param::from_tensor(init::variance_scaling(rng, [n, e], device));
        let embed_b = (self.embed_config == EmbedConfig::Untied)
            .then(|| Param::from_tensor(init::variance_scaling(rng, [n, e], device)));

        let (hidden, hidden_b) = if self.is_collapsed_hidden {
            (None, None)
        } else if self.is_tied_hidden {
            (Some(Param::from_tensor(init::dense(rng, [e, self.hidden_size], device))), None)
        } else {
            let a = Param::from_tensor(init::dense(rng, [e, self.hidden_size], device));
            let b = Param::from_tensor(init::dense(rng, [e, self.hidden_size], device));
            (Some(a), Some(b))
        };

        let (out, unembed) = if self.is_collapsed_out {
            if self.embed_config == EmbedConfig::Tied && self.embed_size == self.hidden_size {
                (None, None)
            } else {
                (None, Some(Param::from_tensor(init::dense(rng, [width, n], device))))
            }
        } else {
            let out = Param::from_tensor(init::dense(rng, [width, e], device));
            let unembed = match self.embed_config {
                EmbedConfig::Tied => None,
                EmbedConfig::Untied | EmbedConfig::InputTied => {
                    Some(Param::from_tensor(init::variance_scaling(rng, [e, n], device)))
                }
            };
            (Some(out), unembed)
        };

        GrokModel { embed, embed_b, hidden, hidden_b, out, unembed }
    }
}

#[derive(Module, Debug)]
pub struct GrokModel<B: Backend> {
    /// `embed` when the inputs share it, `embed_a` otherwise
    pub embed:    Param<Tensor<B, 2>>,
    pub embed_b:  Option<Param<Tensor<B, 2>>>,
    /// `hidden` when tied, `hidden_a` otherwise; absent when collapsed
    pub hidden:   Option<Param<Tensor<B, 2>>>,
    pub hidden_b: Option<Param<Tensor<B, 2>>>,
    pub out:      Option<Param<Tensor<B, 2>>>,
    /// Absent when the output reuses `embedᵀ`
    pub unembed:  Option<Param<Tensor<B, 2>>>,
}

/// Host copy of one parameter matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSnapshot {
    pub slug:   &'static str,
    pub shape:  [usize; 2],
    pub values: Vec<f32>,
}

impl<B: Backend> GrokModel<B> {
    /// tokens: [batch] each → logits: [batch, n_tokens]
    pub fn forward(&self, lhs: Tensor<B, 1, Int>, rhs: Tensor<B, 1, Int>) -> Tensor<B, 2> {
        let embed_a = self.embed.val();
        let embed_b = self.embed_b.as_ref().map_or_else(|| embed_a.clone(), |p| p.val());

        // Row lookup, same result as one_hot(tokens) · embed
        let embedded_a = embed_a.select(0, lhs);
        let embedded_b = embed_b.select(0, rhs);

        let (hidden_a, hidden_b) = match &self.hidden {
            Some(w_a) => {
                let w_a = w_a.val();
                let w_b = self.hidden_b.as_ref().map_or_else(|| w_a.clone(), |p| p.val());
                (embedded_a.matmul(w_a), embedded_b.matmul(w_b))
            }
            None => (embedded_a, embedded_b),
        };

        let activations = relu(hidden_a + hidden_b);

        let projected = match &self.out {
            Some(out) => activations.matmul(out.val()),
            None      => activations,
        };
        projected.matmul(self.unembedding())
    }

    fn unembedding(&self) -> Tensor<B, 2> {
        match &self.unembed {
            Some(unembed) => unembed.val(),
            None          => self.embed.val().transpose(),
        }
    }

    /// Cross-entropy averaged over every (example, class) entry of the logits,
    /// i.e. the usual per-example cross-entropy divided by n_tokens.
    pub fn forward_loss(&self, batch: &TensorBatch<B>) -> Tensor<B, 1> {
        let logits = self.forward(batch.lhs.clone(), batch.rhs.clone());
        let [batch_size, n_tokens] = logits.dims();

        let log_probs = log_softmax(logits, 1);
        let picked    = log_probs.gather(1, batch.targets.clone().reshape([batch_size, 1]));

        picked.sum().neg().div_scalar((batch_size * n_tokens) as f64)
    }

    /// Fraction of examples whose argmax logit is the target.
    pub fn accuracy(&self, batch: &TensorBatch<B>) -> f64 {
        let batch_size = batch.len();
        if batch_size == 0 {
            return 0.0;
        }
        let logits = self.forward(batch.lhs.clone(), batch.rhs.clone());

        // argmax(1) returns shape [batch, 1]
        let predictions = logits.argmax(1).reshape([batch_size]);
        let correct: i64 = predictions
            .equal(batch.targets.clone())
            .int().sum().into_scalar().elem::<i64>();

        correct as f64 / batch_size as f64
    }

    /// Parameters in declaration order, keyed by their on-disk slug.
    pub fn named_params(&self) -> Vec<(&'static str, &Param<Tensor<B, 2>>)> {
        let mut params = Vec::with_capacity(6);

        match &self.embed_b {
            Some(embed_b) => {
                params.push(("_embed_a", &self.embed));
                params.push(("_embed_b", embed_b));
            }
            None => params.push(("_embed", &self.embed)),
        }

        match (&self.hidden, &self.hidden_b) {
            (Some(hidden_a), Some(hidden_b)) => {
                params.push(("hidden_a_w", hidden_a));
                params.push(("hidden_b_w", hidden_b));
            }
            (Some(hidden), None) => params.push(("hidden_w", hidden)),
            _ => {}
        }

        if let Some(out) = &self.out {
            params.push(("out_w", out));
        }
        if let Some(unembed) = &self.unembed {
            // A bare parameter behind the out layer, a dense layer when collapsed
            let slug = if self.out.is_some() { "_unembed" } else { "unembed_w" };
            params.push((slug, unembed));
        }

        params
    }

    /// (Σ|p|, sqrt(Σp²)) over every parameter.
    pub fn norms(&self) -> (f64, f64) {
        let mut l1 = 0.0f64;
        let mut l2 = 0.0f64;
        for (_, param) in self.named_params() {
            let value = param.val();
            l1 += value.clone().abs().sum().into_scalar().elem::<f64>();
            l2 += value.powf_scalar(2.0).sum().into_scalar().elem::<f64>();
        }
        (l1, l2.sqrt())
    }

    /// Copy every parameter to host memory as f32.
    pub fn snapshot(&self) -> Result<Vec<ParamSnapshot>> {
        self.named_params()
            .into_iter()
            .map(|(slug, param)| {
                let value  = param.val();
                let [rows, cols] = value.dims();
                let values = value
                    .into_data()
                    .convert::<f32>()
                    .to_vec::<f32>()
                    .map_err(|e| anyhow!("Cannot read parameter '{slug}': {e:?}"))?;
                Ok(ParamSnapshot { slug, shape: [rows, cols], values })
            })
            .collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::data::dataset::Batch;

    type TestBackend = NdArray;

    fn small_hyper() -> Hyper {
        Hyper { n_tokens: 7, embed_size: 12, hidden_size: 5, ..Hyper::default() }
    }

    fn build(hyper: &Hyper) -> GrokModel<TestBackend> {
        let mut rng = StdRng::seed_from_u64(hyper.seed);
        GrokModelConfig::from(hyper).init(&mut rng, &Default::default())
    }

    fn slugs(model: &GrokModel<TestBackend>) -> Vec<&'static str> {
        model.named_params().into_iter().map(|(s, _)| s).collect()
    }

    fn batch() -> TensorBatch<TestBackend> {
        let inputs  = vec![[0, 1], [2, 3], [6, 6], [4, 5]];
        let targets = inputs.iter().map(|&[a, b]| (a + b) % 7).collect();
        TensorBatch::from_batch(&Batch { inputs, targets }, &Default::default())
    }

    #[test]
    fn test_default_architecture_params() {
        let model = build(&small_hyper());
        assert_eq!(slugs(&model), vec!["_embed", "hidden_w", "out_w"]);
        assert_eq!(model.embed.val().dims(), [7, 12]);
        assert_eq!(model.out.as_ref().unwrap().val().dims(), [5, 12]);
    }

    #[test]
    fn test_untied_architecture_params() {
        let hyper = Hyper {
            embed_config: EmbedConfig::Untied,
            is_tied_hidden: false,
            ..small_hyper()
        };
        let model = build(&hyper);
        assert_eq!(
            slugs(&model),
            vec!["_embed_a", "_embed_b", "hidden_a_w", "hidden_b_w", "out_w", "_unembed"]
        );
        assert_eq!(model.unembed.as_ref().unwrap().val().dims(), [12, 7]);
    }

    #[test]
    fn test_collapsed_out_tied_reuses_embedding() {
        let hyper = Hyper {
            is_collapsed_out: true,
            embed_size: 5,
            hidden_size: 5,
            ..small_hyper()
        };
        let model = build(&hyper);
        assert_eq!(slugs(&model), vec!["_embed", "hidden_w"]);

        // logits = relu(E[a]·W + E[b]·W) · Eᵀ, recomputed on the host
        let snap  = model.snapshot().unwrap();
        let embed = &snap[0].values;
        let w     = &snap[1].values;
        let (n, d) = (7, 5);

        let b = batch();
        let logits = model.forward(b.lhs, b.rhs);
        let values = logits.into_data().convert::<f32>().to_vec::<f32>().unwrap();

        let pairs = [[0usize, 1], [2, 3], [6, 6], [4, 5]];
        for (row, &[a, c]) in values.chunks(n).zip(&pairs) {
            let h: Vec<f64> = (0..d)
                .map(|j| {
                    let pre: f64 = (0..d)
                        .map(|k| (embed[a * d + k] + embed[c * d + k]) as f64 * w[k * d + j] as f64)
                        .sum();
                    pre.max(0.0)
                })
                .collect();
            for (t, &got) in row.iter().enumerate() {
                let expected: f64 = (0..d).map(|j| h[j] * embed[t * d + j] as f64).sum();
                assert!((got as f64 - expected).abs() < 1e-4, "logit[{a},{c}][{t}]: {got} vs {expected}");
            }
        }
    }

    #[test]
    fn test_collapsed_out_with_mismatched_sizes_adds_dense_unembed() {
        let hyper = Hyper { is_collapsed_out: true, ..small_hyper() };
        let model = build(&hyper);
        assert_eq!(slugs(&model), vec!["_embed", "hidden_w", "unembed_w"]);
        assert_eq!(model.unembed.as_ref().unwrap().val().dims(), [5, 7]);
    }

    #[test]
    fn test_collapsed_hidden_uses_embedding_width() {
        let hyper = Hyper {
            is_collapsed_hidden: true,
            embed_config: EmbedConfig::InputTied,
            ..small_hyper()
        };
        let model = build(&hyper);
        assert_eq!(slugs(&model), vec!["_embed", "out_w", "_unembed"]);
        assert_eq!(model.out.as_ref().unwrap().val().dims(), [12, 12]);
    }

    #[test]
    fn test_logits_shape_for_every_variant() {
        for embed_config in [EmbedConfig::Untied, EmbedConfig::Tied, EmbedConfig::InputTied] {
            for (collapsed_hidden, tied_hidden, collapsed_out) in [
                (false, true, false),
                (false, false, false),
                (true, true, false),
                (false, true, true),
                (true, false, true),
            ] {
                let hyper = Hyper {
                    embed_config,
                    is_collapsed_hidden: collapsed_hidden,
                    is_tied_hidden: tied_hidden,
                    is_collapsed_out: collapsed_out,
                    ..small_hyper()
                };
                let model = build(&hyper);
                let b = batch();
                let logits = model.forward(b.lhs, b.rhs);
                assert_eq!(logits.dims(), [4, 7], "{hyper:?}");
            }
        }
    }

    #[test]
    fn test_same_seed_bit_identical_params() {
        let hyper = small_hyper();
        let a = build(&hyper).snapshot().unwrap();
        let b = build(&hyper).snapshot().unwrap();
        assert_eq!(a, b);

        let other = build(&Hyper { seed: 166, ..hyper }).snapshot().unwrap();
        assert_ne!(a[0].values, other[0].values);
    }

    #[test]
    fn test_loss_is_scaled_cross_entropy() {
        let model = build(&small_hyper());
        let b     = batch();

        let loss: f64 = model.forward_loss(&b).into_scalar().elem::<f64>();

        // Reference computed on the host from the logits
        let logits = model.forward(b.lhs.clone(), b.rhs.clone());
        let values = logits.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let targets = [1usize, 5, 5, 2];
        let mut ce = 0.0f64;
        for (row, &t) in values.chunks(7).zip(&targets) {
            let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max) as f64;
            let lse = row.iter().map(|&v| (v as f64 - max).exp()).sum::<f64>().ln() + max;
            ce += lse - row[t] as f64;
        }
        let expected = ce / (4.0 * 7.0);
        assert!((loss - expected).abs() < 1e-5, "{loss} vs {expected}");
    }

    #[test]
    fn test_accuracy_bounds() {
        let model = build(&small_hyper());
        let acc   = model.accuracy(&batch());
        assert!((0.0..=1.0).contains(&acc));
        // Four examples → multiples of a quarter
        assert_eq!((acc * 4.0).fract(), 0.0);
    }

    #[test]
    fn test_norms_match_snapshot() {
        let model = build(&small_hyper());
        let (l1, l2) = model.norms();
        let snap = model.snapshot().unwrap();
        let host_l1: f64 = snap.iter().flat_map(|p| &p.values).map(|&v| v.abs() as f64).sum();
        let host_l2: f64 = snap.iter().flat_map(|p| &p.values).map(|&v| (v as f64).powi(2)).sum::<f64>().sqrt();
        assert!((l1 - host_l1).abs() / host_l1 < 1e-4);
        assert!((l2 - host_l2).abs() / host_l2 < 1e-4);
    }
}
