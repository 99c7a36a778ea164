//! Renders the dashboard charts as SVG files.
use std::error::Error;
use std::path::{Path, PathBuf};

use plotters::coord::Shift;
use plotters::element::Pie;
use plotters::prelude::*;

use crate::error::ChartError;
use crate::view::{Chart, ChartKind, Dashboard};

const RED_LINE: RGBColor = RGBColor(184, 0, 0);
const TYPE_COLORS: [RGBColor; 3] = [RED_LINE, RGBColor(255, 138, 101), RGBColor(255, 193, 7)];
const LINE_COLORS: [RGBColor; 3] = [RGBColor(25, 118, 210), RGBColor(67, 160, 71), RED_LINE];
const TREND_COLORS: [RGBColor; 2] = [RED_LINE, RGBColor(255, 138, 101)];

const SIZE: (u32, u32) = (960, 540);

fn palette(chart: &Chart) -> &'static [RGBColor] {
    match chart.id {
        "chart_line" => &LINE_COLORS,
        "chart_type" | "chart_monthly" => &TYPE_COLORS,
        _ => &TREND_COLORS,
    }
}

/// Writes one SVG per chart of `dashboard` into `out_dir` and returns the written paths.
pub fn render_dashboard(dashboard: &Dashboard, out_dir: &Path) -> Result<Vec<PathBuf>, ChartError> {
    std::fs::create_dir_all(out_dir).map_err(|err| ChartError {
        chart: out_dir.display().to_string(),
        reason: err.to_string(),
    })?;

    let mut written = Vec::with_capacity(dashboard.charts.len());
    for chart in &dashboard.charts {
        let path = out_dir.join(format!("{}.svg", chart.id));
        let root = SVGBackend::new(&path, SIZE).into_drawing_area();
        let drawn = match chart.kind {
            ChartKind::Line => draw_lines(root, chart),
            ChartKind::Doughnut => draw_doughnut(root, chart),
            ChartKind::Bar | ChartKind::StackedBar => draw_bars(root, chart),
        };
        drawn.map_err(|err| ChartError {
            chart: chart.id.to_string(),
            reason: err.to_string(),
        })?;
        log::debug!(target: "redlined::chart", "Rendered '{}'", path.display());
        written.push(path);
    }
    Ok(written)
}

fn value_ceiling(chart: &Chart, stacked: bool) -> f64 {
    let top = (0..chart.labels.len())
        .map(|i| {
            let values = chart.series.iter().map(|s| s.values.get(i).copied().unwrap_or(0.0));
            if stacked {
                values.sum::<f64>()
            } else {
                values.fold(0.0, f64::max)
            }
        })
        .fold(0.0, f64::max);
    if top > 0.0 {
        top * 1.1
    } else {
        1.0
    }
}

fn draw_bars<DB>(root: DrawingArea<DB, Shift>, chart: &Chart) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let colors = palette(chart);
    let slots = chart.labels.len().max(1);
    let stacked = chart.kind == ChartKind::StackedBar;
    let y_max = value_ceiling(chart, stacked);

    root.fill(&WHITE)?;
    let mut plot = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..(slots as f64 - 0.5), 0.0..y_max)?;

    let labels = &chart.labels;
    let label_of = |x: &f64| {
        let rounded = x.round();
        if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
            return String::new();
        }
        labels.get(rounded as usize).cloned().unwrap_or_default()
    };
    plot.configure_mesh()
        .disable_x_mesh()
        .x_labels(slots)
        .x_label_formatter(&label_of)
        .draw()?;

    let mut base = vec![0.0; chart.labels.len()];
    let series_count = chart.series.len().max(1);
    for (s, series) in chart.series.iter().enumerate() {
        let width = if stacked { 0.7 } else { 0.7 / series_count as f64 };
        let bars: Vec<Rectangle<(f64, f64)>> = series
            .values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let color = if chart.series.len() == 1 {
                    colors[i % colors.len()]
                } else {
                    colors[s % colors.len()]
                };
                let left = if stacked {
                    i as f64 - 0.35
                } else {
                    i as f64 - 0.35 + s as f64 * width
                };
                let bottom = if stacked { base[i] } else { 0.0 };
                Rectangle::new([(left, bottom), (left + width, bottom + value)], color.filled())
            })
            .collect();
        if stacked {
            for (i, value) in series.values.iter().enumerate() {
                base[i] += value;
            }
        }
        let legend_color = colors[s % colors.len()];
        plot.draw_series(bars)?
            .label(series.label.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], legend_color.filled()));
    }

    if chart.series.len() > 1 {
        plot.configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()?;
    }
    root.present()?;
    Ok(())
}

fn draw_lines<DB>(root: DrawingArea<DB, Shift>, chart: &Chart) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let colors = palette(chart);
    let slots = chart.labels.len().max(1);
    let y_max = value_ceiling(chart, false);

    root.fill(&WHITE)?;
    let mut plot = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 22))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5..(slots as f64 - 0.5), 0.0..y_max)?;

    let labels = &chart.labels;
    let label_of = |x: &f64| {
        let rounded = x.round();
        if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
            return String::new();
        }
        labels.get(rounded as usize).cloned().unwrap_or_default()
    };
    plot.configure_mesh()
        .x_labels(slots.min(12))
        .x_label_formatter(&label_of)
        .draw()?;

    for (s, series) in chart.series.iter().enumerate() {
        let color = colors[s % colors.len()];
        let points: Vec<(f64, f64)> = series.values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect();
        plot.draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(series.label.clone())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
        if s == 0 {
            plot.draw_series(points.into_iter().map(|p| Circle::new(p, 3, color.filled())))?;
        }
    }

    plot.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Non-empty slices of the first series with their colors and labels.
///
/// Returns `None` when there is nothing to divide the circle by.
fn doughnut_slices(chart: &Chart) -> Option<(Vec<f64>, Vec<RGBColor>, Vec<String>)> {
    let colors = palette(chart);
    let series = chart.series.first()?;
    let mut sizes = Vec::new();
    let mut slice_colors = Vec::new();
    let mut labels = Vec::new();
    for (i, value) in series.values.iter().enumerate() {
        if *value > 0.0 {
            sizes.push(*value);
            slice_colors.push(colors[i % colors.len()]);
            labels.push(chart.labels.get(i).cloned().unwrap_or_default());
        }
    }
    if sizes.is_empty() {
        None
    } else {
        Some((sizes, slice_colors, labels))
    }
}

fn draw_doughnut<DB>(root: DrawingArea<DB, Shift>, chart: &Chart) -> Result<(), Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let area = root.titled(&chart.title, ("sans-serif", 22))?;
    if let Some((sizes, colors, labels)) = doughnut_slices(chart) {
        let (width, height) = area.dim_in_pixel();
        let center = (width as i32 / 2, height as i32 / 2);
        let radius = f64::from(width.min(height)) * 0.38;
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
        pie.start_angle(-90.0);
        pie.donut_hole(radius * 0.55);
        pie.label_style(("sans-serif", 16).into_font().color(&BLACK));
        pie.percentages(("sans-serif", 14).into_font().color(&WHITE));
        area.draw(&pie)?;
    }
    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::ChartSeries;

    fn chart(kind: ChartKind, values: Vec<Vec<f64>>) -> Chart {
        Chart {
            id: "chart_monthly",
            title: String::from("test"),
            kind,
            labels: vec![String::from("a"), String::from("b")],
            series: values
                .into_iter()
                .map(|v| ChartSeries {
                    label: String::from("s"),
                    values: v,
                })
                .collect(),
        }
    }

    #[test]
    fn ceiling_depends_on_stacking() {
        let c = chart(ChartKind::StackedBar, vec![vec![1.0, 4.0], vec![3.0, 2.0]]);
        assert!((value_ceiling(&c, true) - 6.6).abs() < 1e-9);
        assert!((value_ceiling(&c, false) - 4.4).abs() < 1e-9);
        let empty = chart(ChartKind::Bar, vec![vec![0.0, 0.0]]);
        assert_eq!(value_ceiling(&empty, false), 1.0);
    }

    #[test]
    fn doughnut_keeps_only_filled_slices() {
        let mut c = chart(ChartKind::Doughnut, vec![vec![3.0, 0.0]]);
        c.id = "chart_line";
        let (sizes, colors, labels) = doughnut_slices(&c).unwrap();
        assert_eq!(sizes, vec![3.0]);
        assert_eq!(labels, vec![String::from("a")]);
        assert_eq!(colors[0].0, LINE_COLORS[0].0);

        let empty = chart(ChartKind::Doughnut, vec![vec![0.0, 0.0]]);
        assert!(doughnut_slices(&empty).is_none());
    }

    #[test]
    fn palettes_follow_chart_ids() {
        let mut c = chart(ChartKind::Doughnut, vec![]);
        c.id = "chart_line";
        assert_eq!(palette(&c)[0].0, 25);
        c.id = "chart_period";
        assert_eq!(palette(&c).len(), 2);
    }
}
