use crate::{error::ChartError, prediction::NormalizedPrediction};
use plotters::{
    coord::ranged1d::{IntoSegmentedCoord, SegmentValue},
    prelude::*,
    style::text_anchor::{HPos, Pos, VPos},
};
use std::path::PathBuf;

/// Chart caption.
pub const TITLE: &str = "Respiratory disease prediction";
pub const Y_LABEL: &str = "Probability (%)";
/// Fixed y range, leaving headroom above 100% for the value labels.
pub const Y_RANGE: (f64, f64) = (0.0, 110.0);
pub const CANVAS_SIZE: (u32, u32) = (1000, 600);
const ANNOTATION_OFFSET: f64 = 1.0;

/// Named bar fill colors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BarColor {
    Blue,
    Green,
    Red,
    Orange,
}

/// Bar colors, applied by bar index and repeated past the fourth bar.
pub const PALETTE: [BarColor; 4] = [
    BarColor::Blue,
    BarColor::Green,
    BarColor::Red,
    BarColor::Orange,
];

impl BarColor {
    /// Color of the bar at `idx`, cycling through [`PALETTE`].
    pub fn for_index(idx: usize) -> Self {
        PALETTE[idx % PALETTE.len()]
    }

    pub fn rgb(&self) -> RGBColor {
        match self {
            BarColor::Blue => RGBColor(0, 0, 255),
            BarColor::Green => RGBColor(0, 128, 0),
            BarColor::Red => RGBColor(255, 0, 0),
            BarColor::Orange => RGBColor(255, 165, 0),
        }
    }
}

/// One disease bar.
#[derive(Clone, Debug, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
    /// Text drawn just above the bar, the value with two decimals.
    pub annotation: String,
    pub color: BarColor,
}

/// Everything needed to draw the prediction chart, independent of the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub title: String,
    pub y_label: String,
    pub y_range: (f64, f64),
    pub rotate_x_labels: bool,
    pub size: (u32, u32),
    pub bars: Vec<Bar>,
}

impl ChartSpec {
    /// One bar per class, in prediction order, on the fixed `[0, 110]` axis.
    pub fn from_prediction(prediction: &NormalizedPrediction) -> Self {
        let bars = prediction
            .names
            .iter()
            .zip(&prediction.values)
            .enumerate()
            .map(|(idx, (label, value))| Bar {
                label: label.clone(),
                value: *value,
                annotation: format!("{value:.2}%"),
                color: BarColor::for_index(idx),
            })
            .collect();

        Self {
            title: TITLE.to_string(),
            y_label: Y_LABEL.to_string(),
            y_range: Y_RANGE,
            rotate_x_labels: true,
            size: CANVAS_SIZE,
            bars,
        }
    }
}

/// Turns a [`ChartSpec`] into something displayable.
pub trait ChartRenderer {
    type Output;

    fn render(&mut self, chart: &ChartSpec) -> Result<Self::Output, ChartError>;
}

/// Draws charts as SVG documents, optionally also writing them to a file.
#[derive(Clone, Debug, Default)]
pub struct SvgRenderer {
    output: Option<PathBuf>,
}

impl SvgRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also writes each rendered chart to `path`.
    pub fn with_output(path: impl Into<PathBuf>) -> Self {
        Self {
            output: Some(path.into()),
        }
    }
}

impl ChartRenderer for SvgRenderer {
    type Output = String;

    fn render(&mut self, chart: &ChartSpec) -> Result<String, ChartError> {
        let svg = render_svg(chart)?;
        if let Some(path) = &self.output {
            std::fs::write(path, &svg).map_err(|source| ChartError::Io {
                path: path.clone(),
                source,
            })?;
            log::info!("Chart written to {}", path.display());
        }
        Ok(svg)
    }
}

fn draw_err(err: impl std::fmt::Display) -> ChartError {
    ChartError::Draw(err.to_string())
}

/// Draws `spec` into an in-memory SVG document.
///
/// Fails with [`ChartError::Empty`] when there are no bars.
pub fn render_svg(spec: &ChartSpec) -> Result<String, ChartError> {
    if spec.bars.is_empty() {
        return Err(ChartError::Empty);
    }

    let n = spec.bars.len() as u32;
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, spec.size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(spec.title.as_str(), ("sans-serif", 22))
            .margin(15)
            .x_label_area_size(110)
            .y_label_area_size(60)
            .build_cartesian_2d((0u32..n).into_segmented(), spec.y_range.0..spec.y_range.1)
            .map_err(draw_err)?;

        let label_of = |v: &SegmentValue<u32>| match v {
            SegmentValue::CenterOf(idx) => spec
                .bars
                .get(*idx as usize)
                .map(|bar| bar.label.clone())
                .unwrap_or_default(),
            _ => String::new(),
        };

        let mut label_style = TextStyle::from(("sans-serif", 13).into_font());
        if spec.rotate_x_labels {
            label_style = label_style.transform(FontTransform::Rotate90);
        }

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(spec.bars.len())
            .x_label_formatter(&label_of)
            .x_label_style(label_style)
            .y_desc(spec.y_label.as_str())
            .draw()
            .map_err(draw_err)?;

        chart
            .draw_series(spec.bars.iter().enumerate().map(|(idx, bar)| {
                let idx = idx as u32;
                let mut rect = Rectangle::new(
                    [
                        (SegmentValue::Exact(idx), 0.0),
                        (SegmentValue::Exact(idx + 1), bar.value),
                    ],
                    bar.color.rgb().filled(),
                );
                rect.set_margin(0, 0, 10, 10);
                rect
            }))
            .map_err(draw_err)?;

        let annotation_style = TextStyle::from(("sans-serif", 14).into_font())
            .pos(Pos::new(HPos::Center, VPos::Bottom));
        chart
            .draw_series(spec.bars.iter().enumerate().map(|(idx, bar)| {
                Text::new(
                    bar.annotation.clone(),
                    (
                        SegmentValue::CenterOf(idx as u32),
                        bar.value + ANNOTATION_OFFSET,
                    ),
                    annotation_style.clone(),
                )
            }))
            .map_err(draw_err)?;

        root.present().map_err(draw_err)?;
    }
    Ok(buf)
}
