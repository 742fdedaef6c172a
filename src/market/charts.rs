//! Chart rendering for HTML embedding
//!
//! Draws a price-trend line chart into an in-memory bitmap and returns it
//! as a base64 PNG data URI. Rendering failures degrade to `None`; the
//! caller omits the image rather than failing the section.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use plotters::prelude::*;
use tracing::{error, warn};

use super::data::PriceSeries;

const CHART_WIDTH: u32 = 800;
const CHART_HEIGHT: u32 = 450;

/// Trait for the chart-rendering collaborator.
pub trait ChartRenderer: Send + Sync {
    /// An embeddable `data:image/png;base64,...` URI, or `None` on failure.
    fn render_line_chart(&self, series: &PriceSeries, title: &str) -> Option<String>;
}

/// Plotters-backed line chart renderer.
pub struct LineChartRenderer {
    width: u32,
    height: u32,
}

impl LineChartRenderer {
    pub fn new() -> Self {
        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
        }
    }
}

impl Default for LineChartRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ChartRenderer for LineChartRenderer {
    fn render_line_chart(&self, series: &PriceSeries, title: &str) -> Option<String> {
        if series.points.len() < 2 {
            warn!(ticker = %series.ticker, "Not enough points for a chart");
            return None;
        }

        match draw_png(series, title, self.width, self.height) {
            Ok(png) => Some(format!("data:image/png;base64,{}", BASE64.encode(png))),
            Err(e) => {
                error!(ticker = %series.ticker, "Failed to render chart: {}", e);
                None
            }
        }
    }
}

fn draw_png(
    series: &PriceSeries,
    title: &str,
    width: u32,
    height: u32,
) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    let closes: Vec<f64> = series.points.iter().map(|p| p.close).collect();
    let lo = closes.iter().cloned().fold(f64::INFINITY, f64::min);
    let hi = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    // Pad the y-range so a flat series still has visible extent.
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.01).max(0.1);
    let y_range = (lo - pad)..(hi + pad);

    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let last_index = series.points.len() as i32 - 1;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(30)
            .y_label_area_size(50)
            .build_cartesian_2d(0i32..last_index, y_range)?;

        chart
            .configure_mesh()
            .x_labels(6)
            .x_label_formatter(&|idx| {
                series
                    .points
                    .get(*idx as usize)
                    .map(|p| p.date.format("%b %d").to_string())
                    .unwrap_or_default()
            })
            .y_desc("Close")
            .draw()?;

        chart.draw_series(LineSeries::new(
            series
                .points
                .iter()
                .enumerate()
                .map(|(i, p)| (i as i32, p.close)),
            &BLUE,
        ))?;

        root.present()?;
    }

    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(&buf, width, height, ExtendedColorType::Rgb8)?;
    Ok(png)
}
