use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::prelude::*;

/// One bar: its category label, length and fill.
#[derive(Debug, Clone)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    pub color: RGBColor,
}

/// One series of a grouped bar chart.
#[derive(Debug, Clone)]
pub struct BarSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub color: RGBColor,
}

/// Axis titles.
#[derive(Debug, Clone, Default)]
pub struct AxisLabels {
    pub x: String,
    pub y: String,
}

/// Horizontal offset between the bars of a pair.
pub const PAIR_OFFSET: f64 = 0.35;

const HORIZONTAL_BAR_THICKNESS: f64 = 0.8;

/// Pixel buffer for a single chart.
///
/// A canvas is created per chart and consumed by [`Canvas::render`]; its
/// buffer is freed when it goes out of scope, whether drawing succeeded or
/// not.
pub struct Canvas {
    buffer: Vec<u8>,
    width: u32,
    height: u32,
    title: String,
}

impl Canvas {
    pub fn new(width: u32, height: u32, title: impl Into<String>) -> Result<Self> {
        if width == 0 || height == 0 {
            anyhow::bail!("Canvas size must be non-zero (got {}x{})", width, height);
        }
        let buffer = vec![0u8; (width * height * 3) as usize];
        Ok(Canvas {
            buffer,
            width,
            height,
            title: title.into(),
        })
    }

    /// Draw one horizontal bar per entry, first entry at the top.
    pub fn draw_horizontal_bars(&mut self, bars: &[Bar], axes: &AxisLabels) -> Result<()> {
        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;

        let n = bars.len().max(1);
        let x_max = value_ceiling(bars.iter().map(|b| b.value));
        let label_width = bars
            .iter()
            .map(|b| b.label.chars().count() as u32)
            .max()
            .unwrap_or(0)
            .clamp(6, 40)
            * 8
            + 30;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(&self.title, ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(label_width)
            .build_cartesian_2d(0.0..x_max, -0.5..(n as f64 - 0.5))
            .context("Failed to build chart")?;

        // Row 0 is drawn at the top of the plot.
        let labels: Vec<String> = bars.iter().rev().map(|b| b.label.clone()).collect();
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(n)
            .y_label_formatter(&|y| category_at(&labels, *y))
            .x_desc(axes.x.as_str())
            .y_desc(axes.y.as_str())
            .draw()
            .context("Failed to draw mesh")?;

        let half = HORIZONTAL_BAR_THICKNESS / 2.0;
        chart
            .draw_series(bars.iter().enumerate().map(|(idx, bar)| {
                let y = (bars.len() - 1 - idx) as f64;
                Rectangle::new([(0.0, y - half), (bar.value, y + half)], bar.color.filled())
            }))
            .context("Failed to draw bars")?;

        root.present().context("Failed to present drawing")?;
        Ok(())
    }

    /// Draw vertical bars grouped per category, one bar per series, each
    /// series shifted by [`PAIR_OFFSET`].
    pub fn draw_grouped_bars(
        &mut self,
        categories: &[String],
        series: &[BarSeries],
        axes: &AxisLabels,
    ) -> Result<()> {
        if series.is_empty() {
            anyhow::bail!("Cannot create grouped bar chart with no series");
        }
        if let Some(bad) = series.iter().find(|s| s.values.len() != categories.len()) {
            anyhow::bail!(
                "Series '{}' has {} values for {} categories",
                bad.name,
                bad.values.len(),
                categories.len()
            );
        }

        let root = BitMapBackend::with_buffer(&mut self.buffer, (self.width, self.height))
            .into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;

        let n = categories.len().max(1);
        let y_max = value_ceiling(series.iter().flat_map(|s| s.values.iter().copied()));

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(&self.title, ("sans-serif", 20))
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_max)
            .context("Failed to build chart")?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n)
            .x_label_formatter(&|x| category_at(categories, *x))
            .x_desc(axes.x.as_str())
            .y_desc(axes.y.as_str())
            .draw()
            .context("Failed to draw mesh")?;

        let width = PAIR_OFFSET;
        let group_width = width * series.len() as f64;
        for (series_idx, s) in series.iter().enumerate() {
            let color = s.color;
            let left = -group_width / 2.0 + series_idx as f64 * width;
            chart
                .draw_series(s.values.iter().enumerate().map(|(cat_idx, &v)| {
                    let x0 = cat_idx as f64 + left;
                    Rectangle::new([(x0, 0.0), (x0 + width, v)], color.filled())
                }))
                .context("Failed to draw bar series")?
                .label(s.name.as_str())
                .legend(move |(x, y)| {
                    Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled())
                });
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .context("Failed to draw legend")?;

        root.present().context("Failed to present drawing")?;
        Ok(())
    }

    /// Finalize and encode the canvas as PNG
    pub fn render(self) -> Result<Vec<u8>> {
        let mut png_bytes = Vec::new();
        {
            let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
            encoder
                .write_image(
                    &self.buffer,
                    self.width,
                    self.height,
                    image::ColorType::Rgb8,
                )
                .context("Failed to encode PNG")?;
        }

        Ok(png_bytes)
    }
}

/// Label for a tick at axis position `pos`, blank between categories.
fn category_at(categories: &[String], pos: f64) -> String {
    let idx = pos.round();
    if (pos - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}

/// Upper bound of the value axis, leaving headroom above the longest bar.
fn value_ceiling(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}
