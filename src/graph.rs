#![cfg(not(tarpaulin_include))]
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

/// Appearance of the report's scatter plot
///
/// The axis labels are placeholders; the report generator replaces them with
/// the names of the plotted columns.
#[derive(Clone, Debug)]
pub struct GraphOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Image size in pixels
    pub width: u32,
    pub height: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            title: "Scatterplot of Top Numeric Columns".to_string(),
            x_label: "x".to_string(),
            y_label: "y".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Render (x, y) points as a PNG scatter plot
///
/// # Arguments
/// * `data` - Points to draw; rows with a missing coordinate are already removed
/// * `options` - Title, axis labels and image size
/// * `path` - Destination PNG, created or overwritten
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Error only when not even the
///   unlabelled plot could be written
///
/// # Implementation Notes
/// * Captions and tick labels need a system font. If drawing text fails the
///   plot is redrawn with markers and axes area only.
/// * Axes whose values exceed `1e9` in magnitude are drawn in units of a power
///   of ten, named in the axis label (`weight (x1e160)`).
pub fn save_scatter_graph(
    data: &[(f64, f64)],
    options: &GraphOptions,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    if data.iter().any(|&(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err("scatter plot needs finite coordinates".into());
    }

    let x_unit = axis_unit(data.iter().map(|&(x, _)| x));
    let y_unit = axis_unit(data.iter().map(|&(_, y)| y));
    let scaled: Vec<(f64, f64)> = data
        .iter()
        .map(|&(x, y)| (x / x_unit.factor, y / y_unit.factor))
        .collect();
    let options = GraphOptions {
        x_label: x_unit.label(&options.x_label),
        y_label: y_unit.label(&options.y_label),
        ..options.clone()
    };

    match draw(&scaled, &options, path, true) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::warn!("labelled scatter plot failed ({}), drawing without text", e);
            draw(&scaled, &options, path, false)
        }
    }
}

/// Values above this magnitude are plotted in units of a power of ten
const PLAIN_AXIS_LIMIT: f64 = 1e9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct AxisUnit {
    exponent: i32,
    factor: f64,
}

impl AxisUnit {
    fn label(&self, name: &str) -> String {
        if self.exponent == 0 {
            name.to_string()
        } else {
            format!("{} (x1e{})", name, self.exponent)
        }
    }
}

fn axis_unit(values: impl Iterator<Item = f64>) -> AxisUnit {
    let largest = values.fold(0.0_f64, |m, v| m.max(v.abs()));
    if largest <= PLAIN_AXIS_LIMIT {
        return AxisUnit {
            exponent: 0,
            factor: 1.0,
        };
    }
    let exponent = largest.log10().floor() as i32;
    AxisUnit {
        exponent,
        factor: 10f64.powi(exponent),
    }
}

fn draw(
    data: &[(f64, f64)],
    options: &GraphOptions,
    path: &Path,
    with_text: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let x_range = axis_range(data.iter().map(|&(x, _)| x));
    let y_range = axis_range(data.iter().map(|&(_, y)| y));

    let area = BitMapBackend::new(path, (options.width, options.height)).into_drawing_area();
    area.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&area);
    builder.margin(15);
    if with_text {
        builder
            .caption(&options.title, ("sans-serif", 28).into_font())
            .x_label_area_size(40)
            .y_label_area_size(55);
    }
    let mut chart = builder.build_cartesian_2d(x_range, y_range)?;

    if with_text {
        chart
            .configure_mesh()
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()?;
    }

    chart.draw_series(
        data.iter()
            .map(|&(x, y)| Circle::new((x, y), 4, BLUE.mix(0.7).filled())),
    )?;

    area.present()?;
    Ok(())
}

/// Padded axis range covering all values; `0..1` when there are none
///
/// The padding is a tenth of the half-width, which stays finite for any pair
/// of finite bounds.
fn axis_range(values: impl Iterator<Item = f64>) -> Range<f64> {
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min.is_finite() || !max.is_finite() {
        return 0.0..1.0;
    }
    let half_width = max / 2.0 - min / 2.0;
    let pad = if half_width > 0.0 { half_width * 0.1 } else { 0.5 };
    (min - pad)..(max + pad)
}
