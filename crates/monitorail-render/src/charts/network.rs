//! Dependency network diagram
//!
//! Node-link layout: one column per dependency layer, left to right, with
//! critical and sub-critical activities highlighted. Without links every
//! activity sits unconnected in the first column.

use std::collections::HashMap;

use monitorail_core::{AnalysisResult, RenderError, Renderer, Schedule};
use svg::node::element::{Definitions, Group, Line, Marker, Path, Rectangle};

use super::{to_string, truncate, ChartStyle};

#[derive(Clone, Debug)]
pub struct NetworkChart {
    pub node_width: u32,
    pub node_height: u32,
    /// Horizontal gap between layers
    pub column_gap: u32,
    /// Vertical gap between nodes of one layer
    pub row_gap: u32,
    pub style: ChartStyle,
}

impl Default for NetworkChart {
    fn default() -> Self {
        Self {
            node_width: 160,
            node_height: 36,
            column_gap: 60,
            row_gap: 14,
            style: ChartStyle::default(),
        }
    }
}

impl NetworkChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = style;
        self
    }

    fn arrow_head(&self) -> Definitions {
        let marker = Marker::new()
            .set("id", "arrow")
            .set("viewBox", (0, 0, 10, 10))
            .set("refX", 10)
            .set("refY", 5)
            .set("markerWidth", 6)
            .set("markerHeight", 6)
            .set("orient", "auto")
            .add(
                Path::new()
                    .set("d", "M 0 0 L 10 5 L 0 10 z")
                    .set("fill", self.style.text_color.as_str()),
            );
        Definitions::new().add(marker)
    }

    /// Top-left corner of the node at (layer, row)
    fn position(&self, layer: usize, row: usize) -> (f64, f64) {
        let x = self.style.padding + layer as u32 * (self.node_width + self.column_gap);
        let y = self.style.padding + 40 + row as u32 * (self.node_height + self.row_gap);
        (f64::from(x), f64::from(y))
    }
}

impl Renderer for NetworkChart {
    type Output = String;

    fn render(&self, schedule: &Schedule, result: &AnalysisResult) -> Result<String, RenderError> {
        let graph = result
            .dependency_graph()
            .ok_or_else(|| RenderError::InvalidData("no dependency graph".into()))?;
        if graph.nodes.is_empty() {
            return Err(RenderError::InvalidData(
                "dependency graph has no activities".into(),
            ));
        }
        let layers = graph.layers().map_err(|cycle| {
            RenderError::InvalidData(format!(
                "dependency cycle among {} activities",
                cycle.len()
            ))
        })?;

        let mut positions: HashMap<&str, (f64, f64)> = HashMap::new();
        for (layer, ids) in layers.iter().enumerate() {
            for (row, id) in ids.iter().enumerate() {
                positions.insert(*id, self.position(layer, row));
            }
        }

        let tallest = layers.iter().map(Vec::len).max().unwrap_or(1);
        let width = self.style.padding * 2
            + layers.len() as u32 * (self.node_width + self.column_gap)
            - self.column_gap;
        let height =
            self.style.padding * 2 + 40 + tallest as u32 * (self.node_height + self.row_gap);
        let title = format!("{}: dependency network", schedule.project_name);
        let mut document = self
            .style
            .document(width, height, &title)
            .add(self.arrow_head());

        let half = f64::from(self.node_height) / 2.0;
        let mut edges = Group::new().set("class", "edges");
        for edge in &graph.edges {
            let (Some(&(fx, fy)), Some(&(tx, ty))) = (
                positions.get(edge.from.as_str()),
                positions.get(edge.to.as_str()),
            ) else {
                continue;
            };
            edges = edges.add(
                Line::new()
                    .set("x1", fx + f64::from(self.node_width))
                    .set("y1", fy + half)
                    .set("x2", tx)
                    .set("y2", ty + half)
                    .set("stroke", self.style.text_color.as_str())
                    .set("stroke-width", 1)
                    .set("marker-end", "url(#arrow)"),
            );
        }
        document = document.add(edges);

        for node in &graph.nodes {
            let Some(&(x, y)) = positions.get(node.id.as_str()) else {
                continue;
            };
            let color = if node.flagged {
                self.style.critical_color.as_str()
            } else {
                self.style.normal_color.as_str()
            };
            let slack = node
                .total_slack
                .map(|days| format!(" ({days}d)"))
                .unwrap_or_default();
            let group = Group::new()
                .set("class", if node.flagged { "node critical" } else { "node" })
                .add(
                    Rectangle::new()
                        .set("x", x)
                        .set("y", y)
                        .set("width", self.node_width)
                        .set("height", self.node_height)
                        .set("rx", 4)
                        .set("ry", 4)
                        .set("fill", color),
                )
                .add(
                    self.style
                        .label(format!("{}{slack}", node.id), x + 6.0, y + 14.0)
                        .set("fill", "#ffffff")
                        .set("font-weight", "bold"),
                )
                .add(
                    self.style
                        .label(truncate(&node.name, 24), x + 6.0, y + 29.0)
                        .set("fill", "#ffffff"),
                );
            document = document.add(group);
        }

        to_string(&document)
    }
}
