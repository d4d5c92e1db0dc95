//! SVG charts
//!
//! Each chart is a [`Renderer`](monitorail_core::Renderer) producing an SVG
//! document as a `String`. A chart whose input is missing or empty returns
//! `RenderError::InvalidData`; the report assembler turns that into a
//! "chart omitted" warning.

pub mod curve;
pub mod network;
pub mod percent;

pub use curve::CurveChart;
pub use network::NetworkChart;
pub use percent::PercentChart;

use monitorail_core::RenderError;
use svg::node::element::{Rectangle, Text};
use svg::Document;

/// Colors and typography shared by every chart
#[derive(Clone, Debug)]
pub struct ChartStyle {
    /// Padding around the chart
    pub padding: u32,
    /// Color for critical and sub-critical activities
    pub critical_color: String,
    /// Color for everything else
    pub normal_color: String,
    /// Color for the cumulative curve
    pub curve_color: String,
    /// Background color
    pub background_color: String,
    /// Grid line color
    pub grid_color: String,
    /// Text color
    pub text_color: String,
    /// Font family
    pub font_family: String,
    /// Font size in pixels
    pub font_size: u32,
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self {
            padding: 20,
            critical_color: "#e74c3c".into(),
            normal_color: "#3498db".into(),
            curve_color: "#27ae60".into(),
            background_color: "#ffffff".into(),
            grid_color: "#ecf0f1".into(),
            text_color: "#2c3e50".into(),
            font_family: "system-ui, -apple-system, sans-serif".into(),
            font_size: 12,
        }
    }
}

impl ChartStyle {
    /// Empty document with background and title
    fn document(&self, width: u32, height: u32, title: &str) -> Document {
        let background = Rectangle::new()
            .set("width", "100%")
            .set("height", "100%")
            .set("fill", self.background_color.as_str());
        let title = Text::new(title)
            .set("x", self.padding)
            .set("y", self.padding + 15)
            .set("font-family", self.font_family.as_str())
            .set("font-size", self.font_size + 4)
            .set("font-weight", "bold")
            .set("fill", self.text_color.as_str());

        Document::new()
            .set("width", width)
            .set("height", height)
            .set("viewBox", (0, 0, width, height))
            .set("xmlns", "http://www.w3.org/2000/svg")
            .add(background)
            .add(title)
    }

    fn label(&self, text: impl Into<String>, x: f64, y: f64) -> Text {
        Text::new(text.into())
            .set("x", x)
            .set("y", y)
            .set("font-family", self.font_family.as_str())
            .set("font-size", self.font_size)
            .set("fill", self.text_color.as_str())
    }
}

fn to_string(document: &Document) -> Result<String, RenderError> {
    let mut output = Vec::new();
    svg::write(&mut output, document)
        .map_err(|e| RenderError::Format(format!("Failed to write SVG: {}", e)))?;

    String::from_utf8(output).map_err(|e| RenderError::Format(format!("Invalid UTF-8: {}", e)))
}

/// Truncate a string to a maximum number of characters with ellipsis
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
