//! Percent complete bar chart

use std::collections::HashSet;

use monitorail_core::{AnalysisResult, RenderError, Renderer, Schedule};
use svg::node::element::{Group, Line, Rectangle};

use super::{to_string, truncate, ChartStyle};

/// One horizontal bar per activity, 0 to 100 %
#[derive(Clone, Debug)]
pub struct PercentChart {
    /// Width of the bar area in pixels
    pub chart_width: u32,
    /// Width of the label column in pixels
    pub label_width: u32,
    /// Height per activity row in pixels
    pub row_height: u32,
    /// Header height in pixels
    pub header_height: u32,
    pub style: ChartStyle,
}

impl Default for PercentChart {
    fn default() -> Self {
        Self {
            chart_width: 500,
            label_width: 220,
            row_height: 22,
            header_height: 40,
            style: ChartStyle::default(),
        }
    }
}

impl PercentChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chart_width(mut self, width: u32) -> Self {
        self.chart_width = width;
        self
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    fn grid(&self, rows: usize) -> Group {
        let mut group = Group::new().set("class", "grid");
        let left = self.style.padding + self.label_width;
        let top = self.style.padding + self.header_height;
        let bottom = top + rows as u32 * self.row_height;

        for pct in (0..=100).step_by(25) {
            let x = left + self.chart_width * pct / 100;
            group = group
                .add(
                    Line::new()
                        .set("x1", x)
                        .set("y1", top)
                        .set("x2", x)
                        .set("y2", bottom)
                        .set("stroke", self.style.grid_color.as_str())
                        .set("stroke-width", 1),
                )
                .add(
                    self.style
                        .label(format!("{pct}%"), f64::from(x), f64::from(top) - 6.0)
                        .set("text-anchor", "middle"),
                );
        }
        group
    }
}

impl Renderer for PercentChart {
    type Output = String;

    fn render(&self, schedule: &Schedule, result: &AnalysisResult) -> Result<String, RenderError> {
        let table = result
            .percent_complete()
            .filter(|t| !t.rows.is_empty())
            .ok_or_else(|| RenderError::InvalidData("no percent complete values".into()))?;
        let flagged: HashSet<&str> = result
            .criticality()
            .map(|report| report.flagged().map(|r| r.id.as_str()).collect())
            .unwrap_or_default();

        let width = self.style.padding * 2 + self.label_width + self.chart_width + 50;
        let height =
            self.style.padding * 2 + self.header_height + table.rows.len() as u32 * self.row_height;
        let title = format!("{}: percent complete", schedule.project_name);
        let mut document = self.style.document(width, height, &title);
        document = document.add(self.grid(table.rows.len()));

        let left = f64::from(self.style.padding + self.label_width);
        for (i, row) in table.rows.iter().enumerate() {
            let y = f64::from(self.style.padding + self.header_height + i as u32 * self.row_height);
            let bar_height = f64::from(self.row_height) * 0.6;
            let bar_y = y + (f64::from(self.row_height) - bar_height) / 2.0;
            let bar_width =
                f64::from(self.chart_width) * row.percent_complete.clamp(0.0, 100.0) / 100.0;
            let color = if flagged.contains(row.id.as_str()) {
                self.style.critical_color.as_str()
            } else {
                self.style.normal_color.as_str()
            };

            let text_y = y + f64::from(self.row_height) / 2.0 + 4.0;
            let group = Group::new()
                .set("class", "activity")
                .add(self.style.label(
                    truncate(&format!("{} {}", row.id, row.name), 32),
                    f64::from(self.style.padding) + 4.0,
                    text_y,
                ))
                .add(
                    Rectangle::new()
                        .set("x", left)
                        .set("y", bar_y)
                        .set("width", bar_width)
                        .set("height", bar_height)
                        .set("rx", 3)
                        .set("ry", 3)
                        .set("fill", color),
                )
                .add(self.style.label(
                    format!("{:.0}%", row.percent_complete),
                    left + bar_width + 6.0,
                    text_y,
                ));
            document = document.add(group);
        }

        to_string(&document)
    }
}
