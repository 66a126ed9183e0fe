use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use ecgview_lib::api::LeadResultRow;
use ecgview_lib::plot::{min_max, Figure, PlotBackend};
use ecgview_lib::summary::round_to;
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

const PANEL_HEIGHT: u32 = 160;

/// Draws a stacked per-lead figure to a PNG file.
pub struct PngBackend {
    path: PathBuf,
    width: u32,
}

impl PngBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            width: 1000,
        }
    }
}

fn padded(range: Option<(f64, f64)>) -> (f64, f64) {
    match range {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((lo, _)) => (lo - 0.5, lo + 0.5),
        None => (0.0, 1.0),
    }
}

fn rgb(color: ecgview_lib::plot::Color) -> RGBColor {
    let (r, g, b) = color.rgb();
    RGBColor(r, g, b)
}

impl PlotBackend for PngBackend {
    fn draw(&mut self, fig: &Figure) -> Result<()> {
        if fig.panels.is_empty() {
            return Err(anyhow!("figure has no panels to draw"));
        }
        let height = PANEL_HEIGHT * fig.panels.len() as u32 + 40;
        let root = BitMapBackend::new(&self.path, (self.width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        let root = root.titled(
            fig.title.as_deref().unwrap_or("ECG"),
            ("sans-serif", 24),
        )?;
        let (x_min, x_max) = padded(fig.x_range());
        let areas = root.split_evenly((fig.panels.len(), 1));
        for (panel, area) in fig.panels.iter().zip(areas.iter()) {
            let (y_min, y_max) = padded(min_max(panel.line.points.iter().map(|p| p[1])));
            let margin = (y_max - y_min) * 0.1;
            let mut chart = ChartBuilder::on(area)
                .margin(6)
                .caption(&panel.title, ("sans-serif", 14))
                .x_label_area_size(20)
                .y_label_area_size(45)
                .build_cartesian_2d(x_min..x_max, (y_min - margin)..(y_max + margin))?;
            chart
                .configure_mesh()
                .x_desc(fig.x.label.clone().unwrap_or_default())
                .y_desc(fig.y.label.clone().unwrap_or_default())
                .draw()?;
            let color = rgb(panel.line.style.color);
            chart.draw_series(LineSeries::new(
                panel.line.points.iter().map(|p| (p[0], p[1])),
                color.stroke_width(panel.line.style.width.round().max(1.0) as u32),
            ))?;
            for marker in &panel.markers {
                let at = (marker.point[0], marker.point[1]);
                let color = rgb(marker.color);
                chart.draw_series(std::iter::once(Circle::new(at, 4, color.filled())))?;
                chart.draw_series(std::iter::once(Text::new(
                    marker.label.clone(),
                    at,
                    ("sans-serif", 12),
                )))?;
            }
        }
        root.present()?;
        Ok(())
    }
}

pub const TABLE_HEADER: [&str; 9] = [
    "Lead",
    "Start Time",
    "End Time",
    "Avg Baseline",
    "Max Beat",
    "Min Beat",
    "Corrected Max Peak",
    "Corrected Min Peak",
    "Lead Vector",
];

/// Peak table as CSV with values rounded to two decimals.
pub fn write_table_csv(path: &Path, rows: &[LeadResultRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(TABLE_HEADER)?;
    for row in rows {
        let values = [
            row.start_time,
            row.end_time,
            row.avg_baseline,
            row.max_beat,
            row.min_beat,
            row.corrected_max_peak,
            row.corrected_min_peak,
            row.lead_vector,
        ];
        let mut record = vec![row.lead.clone()];
        record.extend(values.iter().map(|v| format!("{:.2}", round_to(*v, 2))));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Decode the service's base64 PNG (optionally a `data:` URL) into `path`.
pub fn write_vector_image(path: &Path, image: &str) -> Result<()> {
    let encoded = image
        .split_once("base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(image)
        .trim();
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .context("vector graph image is not valid base64")?;
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn table_rounds_for_display() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("table.csv");
        let row = LeadResultRow {
            lead: "I".into(),
            start_time: 0.2,
            end_time: 0.5,
            avg_baseline: 0.033333,
            max_beat: 0.9,
            min_beat: -0.2,
            corrected_max_peak: 0.866667,
            corrected_min_peak: -0.233333,
            lead_vector: 0.633333,
        };
        write_table_csv(&path, &[row]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Lead,Start Time"));
        assert_eq!(
            lines.next().unwrap(),
            "I,0.20,0.50,0.03,0.90,-0.20,0.87,-0.23,0.63"
        );
    }

    #[test]
    fn decodes_plain_and_data_url_images() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("axis.png");
        write_vector_image(&path, "data:image/png;base64,iVBORw0KGgo=").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"\x89PNG\r\n\x1a\n");
        write_vector_image(&path, "iVBORw0KGgo=").unwrap();
        assert_eq!(fs::read(&path).unwrap().len(), 8);
        assert!(write_vector_image(&path, "not base64!").is_err());
    }

    #[test]
    fn empty_figure_is_rejected() {
        let dir = tempdir().unwrap();
        let mut backend = PngBackend::new(dir.path().join("empty.png"));
        assert!(backend.draw(&Figure::new(None::<String>)).is_err());
    }
}
