//! Cumulative progress curve

use monitorail_core::{AnalysisResult, CurveBucket, RenderError, Renderer, Schedule};
use svg::node::element::{Circle, Group, Line, Polyline};

use super::{to_string, ChartStyle};

/// Line chart of the cumulative curve, one point per period bucket
#[derive(Clone, Debug)]
pub struct CurveChart {
    /// Width of the plot area in pixels
    pub chart_width: u32,
    /// Height of the plot area in pixels
    pub chart_height: u32,
    /// Space left of the plot for the value axis
    pub axis_width: u32,
    pub style: ChartStyle,
}

impl Default for CurveChart {
    fn default() -> Self {
        Self {
            chart_width: 640,
            chart_height: 320,
            axis_width: 60,
            style: ChartStyle::default(),
        }
    }
}

impl CurveChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.chart_width = width;
        self.chart_height = height;
        self
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    fn left(&self) -> f64 {
        f64::from(self.style.padding + self.axis_width)
    }

    fn top(&self) -> f64 {
        f64::from(self.style.padding) + 40.0
    }

    fn bottom(&self) -> f64 {
        self.top() + f64::from(self.chart_height)
    }

    fn value_axis(&self, max: f64) -> Group {
        let mut group = Group::new().set("class", "grid");
        let right = self.left() + f64::from(self.chart_width);
        for step in 0..=4 {
            let fraction = f64::from(step) / 4.0;
            let y = self.bottom() - fraction * f64::from(self.chart_height);
            group = group
                .add(
                    Line::new()
                        .set("x1", self.left())
                        .set("y1", y)
                        .set("x2", right)
                        .set("y2", y)
                        .set("stroke", self.style.grid_color.as_str())
                        .set("stroke-width", 1),
                )
                .add(
                    self.style
                        .label(format!("{:.0}", max * fraction), self.left() - 6.0, y + 4.0)
                        .set("text-anchor", "end"),
                );
        }
        group
    }
}

impl Renderer for CurveChart {
    type Output = String;

    fn render(&self, schedule: &Schedule, result: &AnalysisResult) -> Result<String, RenderError> {
        let curve = result
            .progress_curve()
            .filter(|c| !c.points.is_empty())
            .ok_or_else(|| RenderError::InvalidData("no progress curve points".into()))?;

        let max = curve
            .points
            .iter()
            .map(|p| p.cumulative)
            .fold(0.0_f64, f64::max);
        let max = if max > 0.0 { max } else { 1.0 };
        let step = if curve.points.len() > 1 {
            f64::from(self.chart_width) / (curve.points.len() - 1) as f64
        } else {
            0.0
        };

        let width = self.style.padding * 2 + self.axis_width + self.chart_width + 20;
        let height = self.style.padding * 2 + 40 + self.chart_height + 30;
        let title = format!(
            "{}: cumulative progress ({})",
            schedule.project_name,
            curve.source.as_str()
        );
        let mut document = self
            .style
            .document(width, height, &title)
            .add(self.value_axis(max));

        let label_every = (curve.points.len() / 12).max(1);
        let mut points = Vec::with_capacity(curve.points.len());
        let mut markers = Group::new().set("class", "points");
        for (i, point) in curve.points.iter().enumerate() {
            let x = self.left() + step * i as f64;
            let y = self.bottom() - point.cumulative / max * f64::from(self.chart_height);
            points.push(format!("{x:.1},{y:.1}"));
            markers = markers.add(
                Circle::new()
                    .set("cx", x)
                    .set("cy", y)
                    .set("r", 3)
                    .set("fill", self.style.curve_color.as_str()),
            );
            if i % label_every == 0 {
                let label = match curve.bucket {
                    CurveBucket::Month => point.period.format("%b %Y"),
                    CurveBucket::Week | CurveBucket::Day => point.period.format("%d/%m/%y"),
                };
                markers = markers.add(
                    self.style
                        .label(label.to_string(), x, self.bottom() + 18.0)
                        .set("text-anchor", "middle"),
                );
            }
        }

        document = document
            .add(
                Polyline::new()
                    .set("class", "curve")
                    .set("points", points.join(" "))
                    .set("fill", "none")
                    .set("stroke", self.style.curve_color.as_str())
                    .set("stroke-width", 2),
            )
            .add(markers);

        to_string(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use monitorail_core::{AnalysisOutput, CurveSource, ProgressCurve};

    fn curve(values: &[(u32, f64)]) -> AnalysisResult {
        let curve = ProgressCurve::from_period_values(
            CurveSource::TimePhased,
            CurveBucket::Month,
            values
                .iter()
                .map(|&(month, v)| (NaiveDate::from_ymd_opt(2025, month, 1).unwrap(), v)),
        );
        let mut result = AnalysisResult::new();
        result.record(AnalysisOutput::ProgressCurve(curve));
        result
    }

    #[test]
    fn one_marker_per_period() {
        let svg = CurveChart::new()
            .render(&Schedule::new("Galleria"), &curve(&[(1, 10.0), (2, 25.0), (3, 5.0)]))
            .unwrap();

        assert!(svg.contains("class=\"curve\""));
        assert_eq!(svg.matches("<circle").count(), 3);
        assert!(svg.contains("Mar 2025"));
        assert!(svg.contains("time-phased"));
    }

    #[test]
    fn single_point_renders() {
        assert!(CurveChart::new()
            .render(&Schedule::new("S"), &curve(&[(4, 0.0)]))
            .is_ok());
    }

    #[test]
    fn missing_curve_is_invalid() {
        assert!(CurveChart::new()
            .render(&Schedule::new("S"), &AnalysisResult::new())
            .is_err());
    }
}
