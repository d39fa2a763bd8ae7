//! Turns a prediction and its attribution into the dashboard markup.

pub mod charts;
pub mod colormap;
pub mod heatmap;

pub use colormap::Colormap;

use crate::explain::AttributionMap;
use crate::inference::{Prediction, PredictionResult};
use crate::utils::error::DashError;
use crate::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, ImageOutputFormat};
use serde::Serialize;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub struct Presenter {
    pub bar_chart_size: (u32, u32),
    pub colorbar_size: (u32, u32),
    /// Longest side of the embedded original; larger uploads are downscaled.
    pub max_image_side: u32,
    pub outlier_perc: f32,
    pub colormap: Colormap,
}

impl Default for Presenter {
    fn default() -> Self {
        Self {
            bar_chart_size: (960, 260),
            colorbar_size: (70, 320),
            max_image_side: 1024,
            outlier_perc: heatmap::DEFAULT_OUTLIER_PERC,
            colormap: Colormap::blues(),
        }
    }
}

/// Everything one upload displays. Rebuilt from scratch for every request.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub image_png: String,
    pub bar_chart_svg: String,
    pub heatmap_png: String,
    pub colorbar_svg: String,
    pub predictions: Vec<Prediction>,
}

impl Presenter {
    pub fn render(
        &self,
        image: &DynamicImage,
        predictions: &PredictionResult,
        attribution: &AttributionMap,
    ) -> Result<Dashboard> {
        let bar_chart_svg = charts::bar_chart_svg(&predictions.top, self.bar_chart_size)?;

        let normalized = heatmap::normalize_attribution(&attribution.collapsed(), self.outlier_perc);
        let heatmap = heatmap::heatmap_image(&normalized, &self.colormap);
        let heatmap_png = png_data_uri(&DynamicImage::ImageRgb8(heatmap))?;
        let colorbar_svg = charts::colorbar_svg(&self.colormap, self.colorbar_size)?;

        let side = self.max_image_side;
        let (width, height) = (image.width(), image.height());
        let original = if width > side || height > side {
            // Keep at least one pixel on the short side of very thin strips.
            let scale = side as f64 / width.max(height) as f64;
            let thumb_w = ((width as f64 * scale).round() as u32).max(1);
            let thumb_h = ((height as f64 * scale).round() as u32).max(1);
            image.resize_exact(thumb_w, thumb_h, FilterType::Triangle)
        } else {
            image.clone()
        };
        let image_png = png_data_uri(&original)?;

        Ok(Dashboard {
            image_png,
            bar_chart_svg,
            heatmap_png,
            colorbar_svg,
            predictions: predictions.top.clone(),
        })
    }
}

impl Dashboard {
    /// Bar chart across the full width, then original image and heatmap side by side.
    pub fn to_html(&self) -> String {
        let caption = self
            .predictions
            .first()
            .map(|p| format!("Attribution for &quot;{}&quot;", escape_html(&p.label)))
            .unwrap_or_default();

        format!(
            r#"<section class="dashboard">
  <div class="chart-row">{bar_chart}</div>
  <div class="columns">
    <div class="column">
      <img class="original" src="{image}" alt="Uploaded image">
    </div>
    <div class="column">
      <div class="heatmap-row">
        <img class="heatmap" src="{heatmap}" alt="{caption}">
        <div class="colorbar">{colorbar}</div>
      </div>
      <p class="caption">{caption}</p>
    </div>
  </div>
</section>"#,
            bar_chart = self.bar_chart_svg,
            image = self.image_png,
            heatmap = self.heatmap_png,
            colorbar = self.colorbar_svg,
            caption = caption,
        )
    }
}

fn png_data_uri(image: &DynamicImage) -> Result<String> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageOutputFormat::Png)
        .map_err(|e| DashError::Render(format!("PNG encoding failed: {}", e)))?;
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(buffer.into_inner())
    ))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
