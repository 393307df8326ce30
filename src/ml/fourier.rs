// ============================================================
// Layer 5 — Fourier Basis over Token Space
// ============================================================
// A network that has grokked modular addition represents each
// token as a handful of sinusoids of the token index. Projecting
// an embedding matrix onto the discrete Fourier basis shows
// which frequencies it uses.
//
// Rows of the basis (p = number of tokens):
//   0          Const   1/sqrt(p)
//   2i - 1     cos i   cos(2π·k·i/p), unit norm
//   2i         sin i   sin(2π·k·i/p), unit norm
// for i = 1 ..= p/2.
//
// For even p the sine at i = p/2 is zero everywhere and cannot
// be normalised; it is left out so the basis stays p × p.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::f64::consts::PI;

pub struct FourierBasis {
    /// [p, p], one basis vector per row
    basis: Array2<f64>,
    names: Vec<String>,
}

impl FourierBasis {
    pub fn new(p: usize) -> Self {
        let mut rows:  Vec<Array1<f64>> = vec![Array1::from_elem(p, 1.0 / (p as f64).sqrt())];
        let mut names: Vec<String>      = vec!["Const".to_string()];

        for i in 1..=p / 2 {
            let freq = 2.0 * PI * i as f64 / p as f64;
            let cos  = Array1::from_iter((0..p).map(|k| (freq * k as f64).cos()));
            let sin  = Array1::from_iter((0..p).map(|k| (freq * k as f64).sin()));

            rows.push(normalised(cos));
            names.push(format!("cos {i}"));

            if p % 2 == 0 && i == p / 2 {
                continue;
            }
            rows.push(normalised(sin));
            names.push(format!("sin {i}"));
        }

        let mut basis = Array2::zeros((rows.len(), p));
        for (mut dst, src) in basis.axis_iter_mut(Axis(0)).zip(&rows) {
            dst.assign(src);
        }

        Self { basis, names }
    }

    pub fn basis(&self) -> &Array2<f64> {
        &self.basis
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Norm of each basis component of an `[p, E]` embedding, in basis order.
    pub fn frequency_norms(&self, embed: ArrayView2<f32>) -> Vec<(String, f64)> {
        let embed     = embed.mapv(f64::from);
        let projected = self.basis.dot(&embed);
        projected
            .axis_iter(Axis(0))
            .zip(&self.names)
            .map(|(row, name)| (name.clone(), row.dot(&row).sqrt()))
            .collect()
    }

    /// Per-frequency norm (cos and sin combined), sorted by descending norm.
    /// Frequency 0 is the constant component.
    pub fn key_frequencies(&self, embed: ArrayView2<f32>) -> Vec<(usize, f64)> {
        let mut by_freq: Vec<f64> = vec![0.0; self.basis.nrows() / 2 + 1];
        for (idx, (_, norm)) in self.frequency_norms(embed).into_iter().enumerate() {
            // Row 0 is Const; rows 2i-1 and 2i belong to frequency i
            let freq = (idx + 1) / 2;
            by_freq[freq] += norm * norm;
        }

        let mut ranked: Vec<(usize, f64)> = by_freq
            .into_iter()
            .map(f64::sqrt)
            .enumerate()
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

fn normalised(v: Array1<f64>) -> Array1<f64> {
    let norm = v.dot(&v).sqrt();
    v / norm
}
