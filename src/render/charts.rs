use crate::inference::Prediction;
use crate::render::colormap::Colormap;
use crate::utils::error::DashError;
use crate::Result;
use plotters::prelude::*;

pub const DODGER_BLUE: RGBColor = RGBColor(30, 144, 255);
pub const TOMATO: RGBColor = RGBColor(255, 99, 71);

const BAR_CHART_TITLE: &str = "Top 5 Probabilities";

fn render_err<E: std::fmt::Display>(e: E) -> DashError {
    DashError::Render(e.to_string())
}

/// Horizontal bars, most likely class on top and highlighted.
pub fn bar_chart_svg(predictions: &[Prediction], size: (u32, u32)) -> Result<String> {
    if predictions.is_empty() {
        return Err(DashError::Render("no predictions to chart".to_string()));
    }

    // Row 0 is drawn at the bottom, so the ranking is reversed.
    let rows: Vec<&Prediction> = predictions.iter().rev().collect();
    let top_row = rows.len() - 1;
    let max_probability = predictions
        .iter()
        .map(|p| p.probability as f64)
        .fold(0.0, f64::max);
    let x_max = (max_probability * 1.1).clamp(0.05, 1.0);

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(12)
            .caption(BAR_CHART_TITLE, ("sans-serif", 22.0))
            .set_label_area_size(LabelAreaPosition::Left, 230)
            .set_label_area_size(LabelAreaPosition::Bottom, 30)
            .build_cartesian_2d(0f64..x_max, (0usize..top_row).into_segmented())
            .map_err(render_err)?;

        let label_for = |value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(row) => rows
                .get(*row)
                .map(|p| p.label.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(rows.len())
            .y_label_formatter(&label_for)
            .x_label_formatter(&|v| format!("{:.2}", v))
            .label_style(("sans-serif", 14.0))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(rows.iter().enumerate().map(|(row, prediction)| {
                let color = if row == top_row { TOMATO } else { DODGER_BLUE };
                let mut bar = Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(row)),
                        (prediction.probability as f64, SegmentValue::Exact(row + 1)),
                    ],
                    color.filled(),
                );
                bar.set_margin(6, 6, 0, 0);
                bar
            }))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }

    Ok(svg)
}

/// Vertical colour scale from 0 (bottom) to 1 (top).
pub fn colorbar_svg(colormap: &Colormap, size: (u32, u32)) -> Result<String> {
    const STEPS: usize = 64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .set_label_area_size(LabelAreaPosition::Right, 40)
            .build_cartesian_2d(0f64..1f64, 0f64..1f64)
            .map_err(render_err)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(6)
            .y_label_formatter(&|v| format!("{:.1}", v))
            .label_style(("sans-serif", 12.0))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series((0..STEPS).map(|i| {
                let low = i as f64 / STEPS as f64;
                let high = (i + 1) as f64 / STEPS as f64;
                let [r, g, b] = colormap.map(((low + high) / 2.0) as f32);
                Rectangle::new([(0.0, low), (1.0, high)], RGBColor(r, g, b).filled())
            }))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
    }

    Ok(svg)
}
