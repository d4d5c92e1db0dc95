//! Field synonym tables
//!
//! Each activity field is looked up through an ordered list of element
//! paths. The first path that yields a non-empty value wins. Paths are
//! relative to the task element and use `/` to descend.

/// Scalar activity fields read from an export
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Name,
    Start,
    Finish,
    PercentComplete,
    TotalSlack,
    Cost,
    ActualCost,
    Wbs,
    BaselineStart,
    BaselineFinish,
    BaselineCost,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Id,
        Field::Name,
        Field::Start,
        Field::Finish,
        Field::PercentComplete,
        Field::TotalSlack,
        Field::Cost,
        Field::ActualCost,
        Field::Wbs,
        Field::BaselineStart,
        Field::BaselineFinish,
        Field::BaselineCost,
    ];

    /// Fields whose absence is reported per run
    pub const REPORTED: [Field; 4] = [
        Field::Start,
        Field::Finish,
        Field::PercentComplete,
        Field::TotalSlack,
    ];

    /// Name used in log messages
    pub fn label(&self) -> &'static str {
        match self {
            Field::Id => "UID",
            Field::Name => "Name",
            Field::Start => "Start",
            Field::Finish => "Finish",
            Field::PercentComplete => "PercentComplete",
            Field::TotalSlack => "TotalSlack",
            Field::Cost => "Cost",
            Field::ActualCost => "ActualCost",
            Field::Wbs => "WBS",
            Field::BaselineStart => "BaselineStart",
            Field::BaselineFinish => "BaselineFinish",
            Field::BaselineCost => "BaselineCost",
        }
    }

    /// Element paths tried in order for XML exports
    pub fn xml_paths(&self) -> &'static [&'static str] {
        match self {
            Field::Id => &["UID", "ID"],
            Field::Name => &["Name", "TaskName"],
            Field::Start => &["Start", "StartDate"],
            Field::Finish => &["Finish", "FinishDate"],
            Field::PercentComplete => &["PercentComplete", "PercentDone"],
            Field::TotalSlack => &["TotalSlack"],
            Field::Cost => &["Cost"],
            Field::ActualCost => &["ActualCost"],
            Field::Wbs => &["WBS", "OutlineNumber"],
            Field::BaselineStart => &["Baseline/Start", "BaselineStart"],
            Field::BaselineFinish => &["Baseline/Finish", "BaselineFinish"],
            Field::BaselineCost => &["Baseline/Cost", "BaselineCost"],
        }
    }
}

/// Per-task predecessor references
pub const PREDECESSOR_PATHS: &[&str] = &["PredecessorLink/PredecessorUID"];

/// Per-task resource references
pub const RESOURCE_PATHS: &[&str] = &["Assignments/Assignment/ResourceUID"];

/// Free-text resource list, split on `,` and `;`
pub const RESOURCE_NAMES_PATH: &str = "ResourceNames";

/// Project title, read from the root element
pub const PROJECT_NAME_PATHS: &[&str] = &["Name", "Title"];

/// Project span, read from the root element
pub const PROJECT_START_PATHS: &[&str] = &["StartDate", "Start"];
pub const PROJECT_FINISH_PATHS: &[&str] = &["FinishDate", "Finish"];

/// Resource UID meaning "no resource" in MSPDI assignments
pub const UNASSIGNED_RESOURCE_UID: &str = "-65535";

/// Split a `ResourceNames` value into trimmed, non-empty names
pub fn split_resource_names(value: &str) -> impl Iterator<Item = &str> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
