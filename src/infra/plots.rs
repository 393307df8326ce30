// ============================================================
// Layer 6 — Plots
// ============================================================
// Two static SVG figures per run:
//
//   training.svg   2 × 2 grid
//                  ┌──────────────┬──────────────┐
//                  │ Loss (log y) │ Accuracy     │
//                  ├──────────────┼──────────────┤
//                  │ L1 Norm      │ L2 Norm      │
//                  └──────────────┴──────────────┘
//                  train in red, eval in blue
//
//   weights.svg    one heatmap per parameter on a square grid,
//                  diverging red / white / blue, the colour range
//                  symmetric around zero and shared by all panels

use std::path::Path;

use anyhow::{anyhow, Result};
use plotters::{coord::Shift, prelude::*};

use crate::infra::metrics::MetricsRecord;
use crate::ml::model::ParamSnapshot;

const TRAIN_COLOR: RGBColor = RGBColor(214, 39, 40);
const EVAL_COLOR:  RGBColor = RGBColor(31, 119, 180);
const NORM_COLOR:  RGBColor = RGBColor(44, 160, 44);

type Series = (&'static str, RGBColor, fn(&MetricsRecord) -> f64);

const LOSS_SERIES: [Series; 2] = [
    ("Train Loss", TRAIN_COLOR, |m| m.train_loss),
    ("Eval Loss",  EVAL_COLOR,  |m| m.eval_loss),
];

const ACC_SERIES: [Series; 2] = [
    ("Train Acc", TRAIN_COLOR, |m| m.train_acc),
    ("Eval Acc",  EVAL_COLOR,  |m| m.eval_acc),
];

// Ends of the diverging scale
const NEGATIVE: (f64, f64, f64) = (178.0, 24.0, 43.0);
const POSITIVE: (f64, f64, f64) = (33.0, 102.0, 172.0);

/// Loss, accuracy and norm curves.
pub fn plot_training(metrics: &[MetricsRecord], path: &Path) -> Result<()> {
    if metrics.is_empty() {
        return Err(anyhow!("No metrics to plot"));
    }

    let root = SVGBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));
    let max_step = metrics.iter().map(|m| m.step).max().unwrap_or(0).max(1);

    // ── Loss, log scale ───────────────────────────────────────────────────────
    let losses = metrics.iter().flat_map(|m| [m.train_loss, m.eval_loss]);
    let (lo, hi) = positive_range(losses);
    let mut chart = ChartBuilder::on(&panels[0])
        .caption("Loss", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..max_step, (lo..hi).log_scale())?;
    chart.configure_mesh().y_desc("Loss").draw()?;
    for (name, color, pick) in LOSS_SERIES {
        chart
            .draw_series(LineSeries::new(
                metrics.iter().map(|m| (m.step, pick(m).max(lo))),
                &color,
            ))?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    chart.configure_series_labels().background_style(WHITE.mix(0.8)).border_style(BLACK).draw()?;

    // ── Accuracy ──────────────────────────────────────────────────────────────
    let mut chart = ChartBuilder::on(&panels[1])
        .caption("Accuracy", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0..max_step, 0.0..1.0)?;
    chart.configure_mesh().y_desc("Accuracy").draw()?;
    for (name, color, pick) in ACC_SERIES {
        chart
            .draw_series(LineSeries::new(metrics.iter().map(|m| (m.step, pick(m))), &color))?
            .label(name)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }
    chart.configure_series_labels().background_style(WHITE.mix(0.8)).border_style(BLACK).draw()?;

    // ── Norms ─────────────────────────────────────────────────────────────────
    let norms: [(&str, fn(&MetricsRecord) -> f64); 2] =
        [("L1 norm", |m| m.l1_norm), ("L2 norm", |m| m.l2_norm)];
    for (panel, (title, pick)) in panels[2..].iter().zip(norms) {
        let hi = metrics.iter().map(pick).fold(0.0f64, f64::max);
        let mut chart = ChartBuilder::on(panel)
            .caption(title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(60)
            .build_cartesian_2d(0..max_step, 0.0..hi.max(f64::EPSILON) * 1.05)?;
        chart.configure_mesh().y_desc(title).draw()?;
        chart.draw_series(LineSeries::new(metrics.iter().map(|m| (m.step, pick(m))), &NORM_COLOR))?;
    }

    root.present()?;
    tracing::debug!("Wrote training curves to '{}'", path.display());
    Ok(())
}

/// Heatmaps of every parameter matrix on a shared symmetric colour scale.
pub fn plot_weights(params: &[ParamSnapshot], path: &Path) -> Result<()> {
    if params.is_empty() {
        return Err(anyhow!("No parameters to plot"));
    }

    let zval = params
        .iter()
        .flat_map(|p| p.values.iter())
        .fold(0.0f32, |acc, v| acc.max(v.abs()))
        .max(f32::EPSILON);

    let grid = (params.len() as f64).sqrt().ceil() as usize;
    let side = 400 * grid as u32;

    let root = SVGBackend::new(path, (side, side)).into_drawing_area();
    root.fill(&WHITE)?;
    let cells = root.split_evenly((grid, grid));

    for (param, cell) in params.iter().zip(&cells) {
        draw_heatmap(cell, param, zval)?;
    }

    root.present()?;
    tracing::debug!("Wrote {} heatmaps to '{}'", params.len(), path.display());
    Ok(())
}

fn draw_heatmap(area: &DrawingArea<SVGBackend, Shift>, param: &ParamSnapshot, zval: f32) -> Result<()> {
    let title = format!("{} {}×{}", param.slug, param.shape[0], param.shape[1]);
    let area  = area.margin(8, 8, 8, 8).titled(&title, ("sans-serif", 16))?;

    let [rows, cols] = param.shape;
    let (width, height) = area.dim_in_pixel();
    let cell_w = width  as f64 / cols.max(1) as f64;
    let cell_h = height as f64 / rows.max(1) as f64;

    for (idx, &value) in param.values.iter().enumerate() {
        let (r, c) = (idx / cols, idx % cols);
        let x0 = (c as f64 * cell_w) as i32;
        let y0 = (r as f64 * cell_h) as i32;
        let x1 = ((c + 1) as f64 * cell_w).ceil() as i32;
        let y1 = ((r + 1) as f64 * cell_h).ceil() as i32;
        area.draw(&Rectangle::new([(x0, y0), (x1, y1)], diverging(value / zval).filled()))?;
    }
    Ok(())
}

/// Map t in [-1, 1] to red (negative) → white → blue (positive).
pub fn diverging(t: f32) -> RGBColor {
    let t = t.clamp(-1.0, 1.0) as f64;
    let (end, w) = if t < 0.0 { (NEGATIVE, -t) } else { (POSITIVE, t) };
    let mix = |e: f64| (255.0 + (e - 255.0) * w).round() as u8;
    RGBColor(mix(end.0), mix(end.1), mix(end.2))
}

/// A strictly positive (lo, hi) covering the values, for a log axis.
fn positive_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (lo, hi) = values
        .filter(|v| v.is_finite() && *v > 0.0)
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (1e-8, 1.0);
    }
    let hi = if hi > lo { hi } else { lo * 10.0 };
    (lo * 0.9, hi * 1.1)
}
