//! Raw records to validated schedule
//!
//! Format readers only locate values. This module turns the located text
//! into typed activities, applies the id and name rules, and writes the
//! ingestion log.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use monitorail_core::{Activity, Diagnostic, DiagnosticCode, Schedule, TimephasedValue};
use tracing::debug;

use crate::fields::Field;
use crate::values::{parse_datetime, parse_decimal, parse_number, parse_slack_days};
use crate::{FormatError, Ingested};

/// Text values located for one task element
#[derive(Clone, Debug, Default)]
pub(crate) struct RawActivity {
    values: HashMap<Field, String>,
    pub resources: Vec<String>,
    pub predecessors: Vec<String>,
    pub timephased: Vec<RawTimephased>,
}

impl RawActivity {
    /// Store a value unless it is blank
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.values.insert(field, trimmed.to_string());
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        self.values.get(&field).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default)]
pub(crate) struct RawTimephased {
    pub start: Option<String>,
    pub finish: Option<String>,
    pub value: Option<String>,
}

/// Everything a format reader found in one file
#[derive(Clone, Debug, Default)]
pub(crate) struct RawProject {
    pub name: Option<String>,
    pub start: Option<String>,
    pub finish: Option<String>,
    /// (id, display name)
    pub resources: Vec<(String, String)>,
    pub activities: Vec<RawActivity>,
    /// Format-specific log entries, emitted before the assembly log
    pub log: Vec<Diagnostic>,
}

/// Per-field counters accumulated across one file
#[derive(Default)]
struct Tally {
    missing: BTreeMap<&'static str, usize>,
    unparsable: BTreeMap<&'static str, usize>,
    unnamed: usize,
    positional_ids: usize,
    renamed: Vec<String>,
    clamped: usize,
    inverted: Vec<String>,
}

impl Tally {
    fn missing(&mut self, field: Field) {
        *self.missing.entry(field.label()).or_insert(0) += 1;
    }

    fn unparsable(&mut self, label: &'static str) {
        *self.unparsable.entry(label).or_insert(0) += 1;
    }
}

/// Parse an optional field, counting absent and unparsable values
fn typed<T>(
    raw: &RawActivity,
    field: Field,
    tally: &mut Tally,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    match raw.get(field) {
        None => {
            if Field::REPORTED.contains(&field) {
                tally.missing(field);
            }
            None
        }
        Some(text) => {
            let parsed = parse(text);
            if parsed.is_none() {
                tally.unparsable(field.label());
            }
            parsed
        }
    }
}

/// Build the schedule and its ingestion log
pub(crate) fn assemble(raw: RawProject, source_name: &str) -> Result<Ingested, FormatError> {
    if raw.activities.is_empty() {
        return Err(FormatError::NoActivities);
    }

    let element_count = raw.activities.len();
    let mut tally = Tally::default();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut activities = Vec::with_capacity(element_count);

    for (index, record) in raw.activities.iter().enumerate() {
        let Some(name) = record.get(Field::Name) else {
            tally.unnamed += 1;
            continue;
        };

        let id = match record.get(Field::Id) {
            Some(id) => id.to_string(),
            None => {
                tally.positional_ids += 1;
                format!("#{}", index + 1)
            }
        };
        let id = if seen_ids.contains(&id) {
            let mut k = 2;
            while seen_ids.contains(&format!("{id}~{k}")) {
                k += 1;
            }
            let renamed = format!("{id}~{k}");
            tally.renamed.push(format!("{id} -> {renamed}"));
            renamed
        } else {
            id
        };
        seen_ids.insert(id.clone());

        let mut activity = Activity::new(id, name);
        activity.start = typed(record, Field::Start, &mut tally, parse_datetime);
        activity.finish = typed(record, Field::Finish, &mut tally, parse_datetime);
        activity.total_slack = typed(record, Field::TotalSlack, &mut tally, parse_slack_days);
        activity.cost = typed(record, Field::Cost, &mut tally, parse_decimal);
        activity.actual_cost = typed(record, Field::ActualCost, &mut tally, parse_decimal);
        activity.baseline_start = typed(record, Field::BaselineStart, &mut tally, parse_datetime);
        activity.baseline_finish = typed(record, Field::BaselineFinish, &mut tally, parse_datetime);
        activity.baseline_cost = typed(record, Field::BaselineCost, &mut tally, parse_decimal);
        activity.wbs = record.get(Field::Wbs).map(str::to_string);

        activity.percent_complete =
            typed(record, Field::PercentComplete, &mut tally, parse_number).map(|pct| {
                let clamped = pct.clamp(0.0, 100.0);
                if clamped != pct {
                    tally.clamped += 1;
                }
                clamped
            });

        for resource in &record.resources {
            activity = activity.resource(resource.trim());
        }
        for predecessor in &record.predecessors {
            let predecessor = predecessor.trim();
            if !predecessor.is_empty() {
                activity = activity.predecessor(predecessor);
            }
        }
        for segment in &record.timephased {
            match timephased_value(segment) {
                Some(value) => activity = activity.timephased(value),
                None => tally.unparsable("timephased"),
            }
        }

        if activity.has_inverted_dates() {
            tally.inverted.push(activity.id.clone());
        }
        activities.push(activity);
    }

    if activities.is_empty() {
        return Err(FormatError::NoActivities);
    }

    let project_name = raw
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| file_stem(source_name));

    let mut schedule = Schedule::new(project_name)
        .source(source_name)
        .with_activities(activities);
    for (id, name) in raw.resources {
        schedule = schedule.resource_name(id, name);
    }

    let declared_start = raw.start.as_deref().and_then(parse_datetime);
    let declared_finish = raw.finish.as_deref().and_then(parse_datetime);
    let span = schedule.activity_span();
    schedule = schedule.span(
        declared_start.or(span.map(|(s, _)| s)),
        declared_finish.or(span.map(|(_, f)| f)),
    );

    let log = build_log(raw.log, &schedule, element_count, tally);
    debug!(
        activities = schedule.len(),
        elements = element_count,
        "schedule assembled"
    );

    Ok(Ingested { schedule, log })
}

fn timephased_value(segment: &RawTimephased) -> Option<TimephasedValue> {
    let start: NaiveDateTime = segment.start.as_deref().and_then(parse_datetime)?;
    let finish = segment.finish.as_deref().and_then(parse_datetime);
    let value = segment.value.as_deref().and_then(parse_number)?;
    Some(TimephasedValue::new(start, finish, value))
}

fn file_stem(source_name: &str) -> String {
    std::path::Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("Untitled project")
        .to_string()
}

fn build_log(
    mut log: Vec<Diagnostic>,
    schedule: &Schedule,
    element_count: usize,
    tally: Tally,
) -> Vec<Diagnostic> {
    let mut read = Diagnostic::new(
        DiagnosticCode::I001ActivitiesRead,
        format!("total activities read: {}", schedule.len()),
    );
    if element_count != schedule.len() {
        read = read.with_note(format!("{element_count} task elements in the file"));
    }
    log.insert(0, read);

    if tally.unnamed > 0 {
        log.push(Diagnostic::new(
            DiagnosticCode::W003UnnamedActivityDropped,
            format!("{} activities without a name were dropped", tally.unnamed),
        ));
    }
    if tally.positional_ids > 0 {
        log.push(
            Diagnostic::new(
                DiagnosticCode::W001MissingField,
                format!(
                    "{} activities missing field '{}'",
                    tally.positional_ids,
                    Field::Id.label()
                ),
            )
            .with_note("positional ids '#<n>' were assigned"),
        );
    }
    for (field, count) in &tally.missing {
        log.push(Diagnostic::new(
            DiagnosticCode::W001MissingField,
            format!("{count} activities missing field '{field}'"),
        ));
    }
    for (field, count) in &tally.unparsable {
        log.push(Diagnostic::new(
            DiagnosticCode::W002UnparsableField,
            format!("{count} values of field '{field}' could not be parsed and were ignored"),
        ));
    }
    if !tally.renamed.is_empty() {
        let mut d = Diagnostic::new(
            DiagnosticCode::W009DuplicateActivityId,
            format!("{} duplicate activity ids were renamed", tally.renamed.len()),
        );
        for rename in tally.renamed {
            d = d.with_note(rename);
        }
        log.push(d);
    }
    if tally.clamped > 0 {
        log.push(Diagnostic::new(
            DiagnosticCode::W010PercentClamped,
            format!(
                "{} percent complete values outside 0-100 were clamped",
                tally.clamped
            ),
        ));
    }
    if !tally.inverted.is_empty() {
        log.push(
            Diagnostic::new(
                DiagnosticCode::W004FinishBeforeStart,
                format!("{} activities finish before they start", tally.inverted.len()),
            )
            .with_note(format!("ids: {}", tally.inverted.join(", "))),
        );
    }

    log
}
