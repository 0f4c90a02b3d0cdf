use super::escape;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    pub label: String,
    /// `None` leaves a gap, as for an interval inserted by gap filling.
    pub value: Option<f64>,
}

impl ChartPoint {
    pub fn new(label: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChartError {
    #[error("chart backend '{backend}' unavailable: {reason}")]
    Unavailable { backend: String, reason: String },
    #[error("chart '{title}' could not be drawn")]
    Render {
        title: String,
        #[source]
        source: std::fmt::Error,
    },
}

/// Draws coverage charts (values on a 0-100 scale) as embeddable markup.
pub trait ChartRenderer {
    fn bar_chart(&self, title: &str, points: &[ChartPoint]) -> Result<String, ChartError>;
    fn line_chart(&self, title: &str, points: &[ChartPoint]) -> Result<String, ChartError>;
}

/// Inline SVG renderer with no external dependencies.
#[derive(Debug, Clone, Copy)]
pub struct SvgChartRenderer {
    pub width: u32,
    pub height: u32,
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self {
            width: 640,
            height: 280,
        }
    }
}

const MARGIN_LEFT: f64 = 48.0;
const MARGIN_BOTTOM: f64 = 64.0;
const MARGIN_TOP: f64 = 32.0;
const MARGIN_RIGHT: f64 = 16.0;

struct Plot {
    width: f64,
    height: f64,
}

impl Plot {
    fn inner_width(&self) -> f64 {
        self.width - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn inner_height(&self) -> f64 {
        self.height - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn y(&self, value: f64) -> f64 {
        MARGIN_TOP + self.inner_height() * (1.0 - value.clamp(0.0, 100.0) / 100.0)
    }

    fn baseline(&self) -> f64 {
        self.height - MARGIN_BOTTOM
    }
}

impl SvgChartRenderer {
    fn plot(&self) -> Plot {
        Plot {
            width: f64::from(self.width),
            height: f64::from(self.height),
        }
    }

    fn frame(&self, out: &mut String, title: &str, plot: &Plot) -> std::fmt::Result {
        write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" class="chart" width="{w}" height="{h}" viewBox="0 0 {w} {h}" role="img" aria-label="{t}">"#,
            w = self.width,
            h = self.height,
            t = escape(title)
        )?;
        write!(
            out,
            r#"<text x="{x}" y="20" font-size="14" font-weight="bold">{t}</text>"#,
            x = MARGIN_LEFT,
            t = escape(title)
        )?;
        for tick in [0.0, 25.0, 50.0, 75.0, 100.0] {
            let y = plot.y(tick);
            write!(
                out,
                r##"<line x1="{x1}" y1="{y:.1}" x2="{x2}" y2="{y:.1}" stroke="#dddddd"/><text x="{tx}" y="{ty:.1}" font-size="10" text-anchor="end">{tick:.0}%</text>"##,
                x1 = MARGIN_LEFT,
                x2 = plot.width - MARGIN_RIGHT,
                tx = MARGIN_LEFT - 6.0,
                ty = y + 3.0,
            )?;
        }
        Ok(())
    }

    fn axis_label(out: &mut String, x: f64, plot: &Plot, label: &str) -> std::fmt::Result {
        write!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" font-size="10" text-anchor="end" transform="rotate(-35 {x:.1} {y:.1})">{label}</text>"#,
            y = plot.baseline() + 14.0,
            label = escape(label)
        )
    }

    fn empty(out: &mut String, plot: &Plot) -> std::fmt::Result {
        write!(
            out,
            r#"<text x="{x:.1}" y="{y:.1}" font-size="12" text-anchor="middle">No data for this selection</text>"#,
            x = plot.width / 2.0,
            y = plot.height / 2.0
        )
    }

    fn draw_bars(&self, title: &str, points: &[ChartPoint]) -> Result<String, std::fmt::Error> {
        let plot = self.plot();
        let mut out = String::new();
        self.frame(&mut out, title, &plot)?;

        if points.iter().all(|point| point.value.is_none()) {
            Self::empty(&mut out, &plot)?;
        } else {
            let slot = plot.inner_width() / points.len() as f64;
            let bar = (slot * 0.7).max(1.0);
            for (index, point) in points.iter().enumerate() {
                let center = MARGIN_LEFT + slot * (index as f64 + 0.5);
                if let Some(value) = point.value {
                    let top = plot.y(value);
                    write!(
                        out,
                        r##"<rect x="{x:.1}" y="{top:.1}" width="{bar:.1}" height="{h:.1}" fill="{fill}"><title>{label}: {value:.1}%</title></rect>"##,
                        x = center - bar / 2.0,
                        h = plot.baseline() - top,
                        fill = tier_colour(value),
                        label = escape(&point.label),
                    )?;
                }
                Self::axis_label(&mut out, center, &plot, &point.label)?;
            }
        }

        out.push_str("</svg>");
        Ok(out)
    }

    fn draw_line(&self, title: &str, points: &[ChartPoint]) -> Result<String, std::fmt::Error> {
        let plot = self.plot();
        let mut out = String::new();
        self.frame(&mut out, title, &plot)?;

        if points.iter().all(|point| point.value.is_none()) {
            Self::empty(&mut out, &plot)?;
        } else {
            let step = if points.len() > 1 {
                plot.inner_width() / (points.len() - 1) as f64
            } else {
                0.0
            };
            let x_of = |index: usize| {
                if points.len() > 1 {
                    MARGIN_LEFT + step * index as f64
                } else {
                    MARGIN_LEFT + plot.inner_width() / 2.0
                }
            };

            // Each run of consecutive populated points becomes one polyline.
            let mut segment: Vec<(f64, f64)> = Vec::new();
            for (index, point) in points.iter().enumerate() {
                match point.value {
                    Some(value) => segment.push((x_of(index), plot.y(value))),
                    None => flush_segment(&mut out, &mut segment)?,
                }
                Self::axis_label(&mut out, x_of(index), &plot, &point.label)?;
            }
            flush_segment(&mut out, &mut segment)?;

            for (index, point) in points.iter().enumerate() {
                if let Some(value) = point.value {
                    write!(
                        out,
                        r##"<circle cx="{x:.1}" cy="{y:.1}" r="3" fill="#1f5fa8"><title>{label}: {value:.1}%</title></circle>"##,
                        x = x_of(index),
                        y = plot.y(value),
                        label = escape(&point.label),
                    )?;
                }
            }
        }

        out.push_str("</svg>");
        Ok(out)
    }
}

fn flush_segment(out: &mut String, segment: &mut Vec<(f64, f64)>) -> std::fmt::Result {
    if segment.len() > 1 {
        out.push_str(r##"<polyline fill="none" stroke="#1f5fa8" stroke-width="2" points=""##);
        for (index, (x, y)) in segment.iter().enumerate() {
            if index > 0 {
                out.push(' ');
            }
            write!(out, "{x:.1},{y:.1}")?;
        }
        out.push_str(r#""/>"#);
    }
    segment.clear();
    Ok(())
}

fn tier_colour(value: f64) -> &'static str {
    if value >= 90.0 {
        "#2e8b57"
    } else if value >= 75.0 {
        "#e69500"
    } else {
        "#c0392b"
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn bar_chart(&self, title: &str, points: &[ChartPoint]) -> Result<String, ChartError> {
        self.draw_bars(title, points)
            .map_err(|source| ChartError::Render {
                title: title.to_string(),
                source,
            })
    }

    fn line_chart(&self, title: &str, points: &[ChartPoint]) -> Result<String, ChartError> {
        self.draw_line(title, points)
            .map_err(|source| ChartError::Render {
                title: title.to_string(),
                source,
            })
    }
}
