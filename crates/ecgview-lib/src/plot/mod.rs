use crate::extract::SegmentMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Axis {
    pub label: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Style {
    pub width: f32,
    pub color: Color,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub fn rgb(&self) -> (u8, u8, u8) {
        (
            ((self.0 >> 16) & 0xFF) as u8,
            ((self.0 >> 8) & 0xFF) as u8,
            (self.0 & 0xFF) as u8,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineSeries {
    pub name: String,
    pub points: Vec<[f64; 2]>,
    pub style: Style,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Marker {
    pub label: String,
    pub point: [f64; 2],
    pub color: Color,
}

/// One stacked panel per lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    pub line: LineSeries,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Figure {
    pub title: Option<String>,
    pub x: Axis,
    pub y: Axis,
    pub panels: Vec<Panel>,
}

impl Figure {
    pub fn new(title: impl Into<Option<String>>) -> Self {
        Self {
            title: title.into(),
            x: Axis {
                label: Some("Time (s)".into()),
            },
            y: Axis {
                label: Some("mV".into()),
            },
            panels: Vec::new(),
        }
    }

    pub fn add_panel(&mut self, panel: Panel) {
        self.panels.push(panel);
    }

    /// Time range covered by all panels.
    pub fn x_range(&self) -> Option<(f64, f64)> {
        let xs = self
            .panels
            .iter()
            .flat_map(|p| p.line.points.iter().map(|pt| pt[0]));
        min_max(xs)
    }
}

pub trait PlotBackend {
    fn draw(&mut self, fig: &Figure) -> anyhow::Result<()>;
}

pub fn min_max(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

pub fn decimate_points(points: &[[f64; 2]], max_points: usize) -> Vec<[f64; 2]> {
    if points.len() <= max_points {
        return points.to_vec();
    }
    let bucket_size = points.len() as f64 / max_points as f64;
    let mut result = Vec::with_capacity(max_points);
    for i in 0..max_points {
        let start = (i as f64 * bucket_size).floor() as usize;
        if start >= points.len() {
            break;
        }
        result.push(points[start]);
    }
    result
}

const TRACE_COLOR: Color = Color(0x1E1E1E);
const PEAK_COLOR: Color = Color(0xD62728);

/// Stacked per-lead figure of selected segments with their max/min marked.
pub fn figure_from_segments(title: &str, segments: &SegmentMap, max_points: usize) -> Figure {
    let mut fig = Figure::new(Some(title.to_string()));
    for segment in segments.values() {
        let points: Vec<[f64; 2]> = segment
            .time
            .iter()
            .zip(&segment.signal)
            .map(|(t, v)| [*t, *v])
            .collect();
        fig.add_panel(Panel {
            title: segment.lead.label(),
            line: LineSeries {
                name: format!("Lead {}", segment.lead),
                points: decimate_points(&points, max_points),
                style: Style {
                    width: 1.5,
                    color: TRACE_COLOR,
                },
            },
            markers: vec![
                Marker {
                    label: format!("Max: {:.2} mV", segment.max),
                    point: [segment.max_time(), segment.max],
                    color: PEAK_COLOR,
                },
                Marker {
                    label: format!("Min: {:.2} mV", segment.min),
                    point: [segment.min_time(), segment.min],
                    color: PEAK_COLOR,
                },
            ],
        });
    }
    fig
}
