// ============================================================
// Layer 5 — Optimisers
// ============================================================
// Two regularisation regimes:
//
//   l2  AdamW, decoupled weight decay
//         θ ← θ − lr·(m̂ / (√v̂ + ε) + wd·θ)
//
//   l1  sign penalty folded into the gradient, then plain Adam
//         g ← g + wd·sign(θ)
//         θ ← θ − lr·m̂ / (√v̂ + ε)
//
// burn has no L1 option on its optimisers, so the sign term is
// applied to the GradientsParams between backward() and step().

use burn::{
    optim::{AdamConfig, AdamWConfig, GradientsParams},
    tensor::backend::AutodiffBackend,
};

use crate::domain::hyper::Hyper;
use crate::ml::model::GrokModel;

// Adam ε; burn would otherwise use 1e-5
const ADAM_EPSILON: f32 = 1e-8;

/// AdamW configured from the run's betas and weight decay.
pub fn adamw_config(hyper: &Hyper) -> AdamWConfig {
    AdamWConfig::new()
        .with_beta_1(hyper.b1 as f32)
        .with_beta_2(hyper.b2 as f32)
        .with_weight_decay(hyper.weight_decay as f32)
        .with_epsilon(ADAM_EPSILON)
}

/// Adam without weight decay; the L1 term is added by [`apply_l1`].
pub fn adam_config(hyper: &Hyper) -> AdamConfig {
    AdamConfig::new()
        .with_beta_1(hyper.b1 as f32)
        .with_beta_2(hyper.b2 as f32)
        .with_epsilon(ADAM_EPSILON)
}

/// Add `weight_decay * sign(p)` to the gradient of every parameter of `model`.
pub fn apply_l1<B: AutodiffBackend>(
    model:        &GrokModel<B>,
    mut grads:    GradientsParams,
    weight_decay: f64,
) -> GradientsParams {
    for (_, param) in model.named_params() {
        let id = param.id;
        if let Some(grad) = grads.remove::<B::InnerBackend, 2>(id) {
            let sign = param.val().inner().sign();
            grads.register(id, grad + sign.mul_scalar(weight_decay));
        }
    }
    grads
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{
        backend::{Autodiff, NdArray},
        prelude::*,
    };
    use rand::{rngs::StdRng, SeedableRng};

    use crate::data::{batcher::TensorBatch, dataset::Batch};
    use crate::ml::model::GrokModelConfig;

    type TestBackend = Autodiff<NdArray>;

    fn host(t: Tensor<NdArray, 2>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_both_optimisers_use_small_epsilon() {
        let hyper = Hyper::default();
        for (name, cfg) in [
            ("adamw", serde_json::to_value(adamw_config(&hyper)).unwrap()),
            ("adam",  serde_json::to_value(adam_config(&hyper)).unwrap()),
        ] {
            let eps = cfg["epsilon"].as_f64().unwrap();
            assert!((eps - 1e-8).abs() < 1e-12, "{name} epsilon {eps}");
        }
    }

    #[test]
    fn test_l1_adds_signed_decay() {
        let device = Default::default();
        let hyper  = Hyper { n_tokens: 5, embed_size: 6, hidden_size: 3, ..Hyper::default() };
        let model: GrokModel<TestBackend> =
            GrokModelConfig::from(&hyper).init(&mut StdRng::seed_from_u64(0), &device);

        let inputs  = vec![[0, 1], [2, 4], [3, 3]];
        let targets = inputs.iter().map(|&[a, b]| (a + b) % 5).collect();
        let batch   = TensorBatch::from_batch(&Batch { inputs, targets }, &device);

        // Two forward passes: backward() consumes the graph of its loss
        let mut plain = GradientsParams::from_grads(model.forward_loss(&batch).backward(), &model);
        let mut with_l1 = apply_l1(
            &model,
            GradientsParams::from_grads(model.forward_loss(&batch).backward(), &model),
            0.5,
        );

        for (slug, param) in model.named_params() {
            let g0 = host(plain.remove::<NdArray, 2>(param.id).unwrap());
            let g1 = host(with_l1.remove::<NdArray, 2>(param.id).unwrap());
            let p  = host(param.val().inner());
            for ((a, b), w) in g0.iter().zip(&g1).zip(&p) {
                let expected = a + 0.5 * w.signum();
                assert!((b - expected).abs() < 1e-6, "{slug}: {b} vs {expected}");
            }
        }
    }
}
