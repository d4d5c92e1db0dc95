//! Converter JSON ingestion
//!
//! The MPP conversion service answers with a project document of the shape
//! `{projectName, start, finish, tasks[], resources[]}`. The same document
//! saved to disk can be ingested directly.
//!
//! Scalars arrive as strings, numbers or date arrays depending on how the
//! converter serialized them, so every field is read as a loose
//! `serde_json::Value` and turned into text before typed parsing.

use serde::Deserialize;
use serde_json::Value;

use crate::assemble::{RawActivity, RawProject, RawTimephased};
use crate::fields::{split_resource_names, Field};
use crate::FormatError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConvertedProject {
    project_name: Value,
    start: Value,
    finish: Value,
    tasks: Vec<ConvertedTask>,
    resources: Vec<ConvertedResource>,
    /// Present when the converter answered with an error body
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConvertedTask {
    id: Value,
    name: Value,
    wbs: Value,
    start: Value,
    finish: Value,
    baseline_start: Value,
    baseline_finish: Value,
    percent_complete: Value,
    total_slack: Value,
    cost: Value,
    actual_cost: Value,
    baseline_cost: Value,
    timephased: Vec<ConvertedTimephased>,
    predecessors: Vec<ConvertedRelation>,
    /// Resource ids, when the converter exports assignments
    resources: Vec<Value>,
    resource_names: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertedTimephased {
    start: Value,
    finish: Value,
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertedRelation {
    id: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertedResource {
    id: Value,
    name: Value,
}

/// Text form of a loose scalar.
///
/// Numbers keep their JSON spelling (epoch milliseconds stay digits), date
/// arrays `[y, m, d, h?, min?, s?]` become ISO date-times, and objects are
/// searched for a `value`, `amount` or `duration` member.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Array(parts) => date_array(parts),
        Value::Object(map) => ["value", "amount", "duration"]
            .iter()
            .find_map(|key| map.get(*key).and_then(scalar_text)),
        Value::Null | Value::Bool(_) => None,
    }
}

fn date_array(parts: &[Value]) -> Option<String> {
    let numbers: Vec<i64> = parts.iter().map(Value::as_i64).collect::<Option<_>>()?;
    match numbers.as_slice() {
        [y, m, d] => Some(format!("{y:04}-{m:02}-{d:02}")),
        [y, m, d, h, min, rest @ ..] => {
            let s = rest.first().copied().unwrap_or(0);
            Some(format!("{y:04}-{m:02}-{d:02}T{h:02}:{min:02}:{s:02}"))
        }
        _ => None,
    }
}

/// Locate project metadata and task records in converter JSON
pub(crate) fn read_json(bytes: &[u8]) -> Result<RawProject, FormatError> {
    let document: ConvertedProject = serde_json::from_slice(bytes)
        .map_err(|e| FormatError::Unreadable(format!("invalid converter JSON: {e}")))?;

    if document.tasks.is_empty() {
        if let Some(error) = document.error {
            return Err(FormatError::Unreadable(format!(
                "converter reported an error: {error}"
            )));
        }
        return Err(FormatError::NoActivities);
    }

    let mut project = RawProject {
        name: scalar_text(&document.project_name),
        start: scalar_text(&document.start),
        finish: scalar_text(&document.finish),
        ..RawProject::default()
    };

    project.resources = document
        .resources
        .iter()
        .filter_map(|r| Some((scalar_text(&r.id)?, scalar_text(&r.name)?)))
        .collect();

    project.activities = document.tasks.iter().map(read_task).collect();
    Ok(project)
}

fn read_task(task: &ConvertedTask) -> RawActivity {
    let mut raw = RawActivity::default();
    let fields = [
        (Field::Id, &task.id),
        (Field::Name, &task.name),
        (Field::Wbs, &task.wbs),
        (Field::Start, &task.start),
        (Field::Finish, &task.finish),
        (Field::BaselineStart, &task.baseline_start),
        (Field::BaselineFinish, &task.baseline_finish),
        (Field::PercentComplete, &task.percent_complete),
        (Field::TotalSlack, &task.total_slack),
        (Field::Cost, &task.cost),
        (Field::ActualCost, &task.actual_cost),
        (Field::BaselineCost, &task.baseline_cost),
    ];
    for (field, value) in fields {
        if let Some(text) = scalar_text(value) {
            raw.set(field, text);
        }
    }

    raw.predecessors = task
        .predecessors
        .iter()
        .filter_map(|p| scalar_text(&p.id))
        .collect();

    raw.resources = task.resources.iter().filter_map(scalar_text).collect();
    if raw.resources.is_empty() {
        if let Some(names) = scalar_text(&task.resource_names) {
            raw.resources = split_resource_names(&names).map(str::to_string).collect();
        }
    }

    raw.timephased = task
        .timephased
        .iter()
        .map(|segment| RawTimephased {
            start: scalar_text(&segment.start),
            finish: scalar_text(&segment.finish),
            value: scalar_text(&segment.value),
        })
        .collect();

    raw
}
