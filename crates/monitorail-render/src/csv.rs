//! CSV tables
//!
//! UTF-8, comma separated, header row, RFC 4180 quoting. One builder per
//! analysis output plus the row-per-activity export and its reader.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use monitorail_core::{
    Activity, CriticalityReport, DependencyGraph, PercentCompleteTable, ProgressCurve,
    RenderError, ResourceTally, Schedule, VarianceReport,
};
use rust_decimal::Decimal;

/// Date-time layout used in every table
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Separator for list-valued cells (resources, predecessors)
const LIST_SEPARATOR: char = ';';

/// Header plus rows of already formatted cells
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsvTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl CsvTable {
    pub fn new(header: &[&str]) -> Self {
        Self {
            header: header.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv_string(&self) -> String {
        let mut csv = String::new();
        for row in std::iter::once(&self.header).chain(&self.rows) {
            let line = row
                .iter()
                .map(|field| escape_csv(field))
                .collect::<Vec<_>>()
                .join(",");
            csv.push_str(&line);
            csv.push('\n');
        }
        csv
    }
}

fn escape_csv(value: &str) -> String {
    let needs_quotes = value.contains([',', '"', '\n', '\r']);
    if needs_quotes {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

/// Split CSV text into records of fields
pub fn parse_csv(text: &str) -> Result<Vec<Vec<String>>, RenderError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(RenderError::InvalidData("unterminated quoted field".into()));
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

fn datetime(value: Option<NaiveDateTime>) -> String {
    value
        .map(|dt| dt.format(DATETIME_FORMAT).to_string())
        .unwrap_or_default()
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn join(values: &[String]) -> String {
    values.join(&LIST_SEPARATOR.to_string())
}

// ============================================================================
// Tables
// ============================================================================

const ACTIVITY_COLUMNS: &[&str] = &[
    "id",
    "name",
    "wbs",
    "start",
    "finish",
    "percent_complete",
    "total_slack",
    "cost",
    "actual_cost",
    "resources",
    "predecessors",
];

/// Row-per-activity export of a schedule
pub fn activities_table(schedule: &Schedule) -> CsvTable {
    let mut table = CsvTable::new(ACTIVITY_COLUMNS);
    for a in &schedule.activities {
        table.push(vec![
            a.id.clone(),
            a.name.clone(),
            a.wbs.clone().unwrap_or_default(),
            datetime(a.start),
            datetime(a.finish),
            opt(a.percent_complete),
            opt(a.total_slack),
            opt(a.cost),
            opt(a.actual_cost),
            join(&a.resources),
            join(&a.predecessor_ids),
        ]);
    }
    table
}

pub fn criticality_table(report: &CriticalityReport) -> CsvTable {
    let mut table = CsvTable::new(&[
        "id",
        "name",
        "start",
        "finish",
        "total_slack",
        "class",
        "flagged",
    ]);
    for row in &report.rows {
        table.push(vec![
            row.id.clone(),
            row.name.clone(),
            datetime(row.start),
            datetime(row.finish),
            opt(row.total_slack),
            row.class.to_string(),
            row.class.is_flagged().to_string(),
        ]);
    }
    table
}

pub fn resources_table(tally: &ResourceTally) -> CsvTable {
    let mut table = CsvTable::new(&["resource_id", "resource", "count"]);
    for entry in &tally.entries {
        table.push(vec![
            entry.resource_id.clone(),
            entry.label.clone(),
            entry.count.to_string(),
        ]);
    }
    table
}

pub fn percent_table(percent: &PercentCompleteTable) -> CsvTable {
    let mut table = CsvTable::new(&["id", "name", "percent_complete"]);
    for row in &percent.rows {
        table.push(vec![
            row.id.clone(),
            row.name.clone(),
            row.percent_complete.to_string(),
        ]);
    }
    table
}

pub fn curve_table(curve: &ProgressCurve) -> CsvTable {
    let mut table = CsvTable::new(&["period", "value", "cumulative", "source"]);
    for point in &curve.points {
        table.push(vec![
            point.period.format("%Y-%m-%d").to_string(),
            point.value.to_string(),
            point.cumulative.to_string(),
            curve.source.as_str().to_string(),
        ]);
    }
    table
}

pub fn edges_table(graph: &DependencyGraph) -> CsvTable {
    let name = |id: &str| graph.node(id).map(|n| n.name.clone()).unwrap_or_default();
    let mut table = CsvTable::new(&["from", "from_name", "to", "to_name"]);
    for edge in &graph.edges {
        table.push(vec![
            edge.from.clone(),
            name(&edge.from),
            edge.to.clone(),
            name(&edge.to),
        ]);
    }
    table
}

pub fn variance_table(report: &VarianceReport) -> CsvTable {
    let mut table = CsvTable::new(&[
        "id",
        "name",
        "start_variance_days",
        "finish_variance_days",
        "baseline_percent",
        "update_percent",
        "percent_delta",
    ]);
    for row in &report.rows {
        table.push(vec![
            row.id.clone(),
            row.name.clone(),
            opt(row.start_variance_days),
            opt(row.finish_variance_days),
            opt(row.baseline_percent),
            opt(row.update_percent),
            opt(row.percent_delta()),
        ]);
    }
    table
}

// ============================================================================
// Reading back
// ============================================================================

/// Re-read an `activities.csv` export
pub fn read_activities_csv(text: &str) -> Result<Vec<Activity>, RenderError> {
    let mut records = parse_csv(text)?.into_iter();
    let header = records
        .next()
        .ok_or_else(|| RenderError::InvalidData("empty activities table".into()))?;
    let columns: HashMap<&str, usize> = header
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim(), i))
        .collect();

    for required in ["id", "name"] {
        if !columns.contains_key(required) {
            return Err(RenderError::InvalidData(format!(
                "activities table has no '{required}' column"
            )));
        }
    }

    let mut activities = Vec::new();
    for (line, record) in records.enumerate() {
        if record.len() != header.len() {
            return Err(RenderError::InvalidData(format!(
                "row {} has {} fields, expected {}",
                line + 2,
                record.len(),
                header.len()
            )));
        }
        let cell = |column: &str| {
            columns
                .get(column)
                .map(|&i| record[i].as_str())
                .filter(|v| !v.is_empty())
        };
        let invalid = |column: &str| {
            RenderError::InvalidData(format!("row {}: invalid {column}", line + 2))
        };

        let date = |column: &str| {
            cell(column)
                .map(|v| {
                    NaiveDateTime::parse_from_str(v, DATETIME_FORMAT).map_err(|_| invalid(column))
                })
                .transpose()
        };

        let mut activity = Activity::new(
            cell("id").unwrap_or_default(),
            cell("name").unwrap_or_default(),
        );
        activity.wbs = cell("wbs").map(str::to_string);
        activity.start = date("start")?;
        activity.finish = date("finish")?;
        activity.percent_complete = cell("percent_complete")
            .map(|v| v.parse::<f64>().map_err(|_| invalid("percent_complete")))
            .transpose()?;
        activity.total_slack = cell("total_slack")
            .map(|v| v.parse::<i64>().map_err(|_| invalid("total_slack")))
            .transpose()?;
        activity.cost = cell("cost")
            .map(|v| Decimal::from_str(v).map_err(|_| invalid("cost")))
            .transpose()?;
        activity.actual_cost = cell("actual_cost")
            .map(|v| Decimal::from_str(v).map_err(|_| invalid("actual_cost")))
            .transpose()?;
        let list = |column: &str| cell(column).into_iter().flat_map(|v| v.split(LIST_SEPARATOR));
        for resource in list("resources") {
            activity = activity.resource(resource);
        }
        for predecessor in list("predecessors") {
            activity = activity.predecessor(predecessor);
        }
        activities.push(activity);
    }
    Ok(activities)
}
