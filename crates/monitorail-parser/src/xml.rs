//! MSPDI-style XML ingestion
//!
//! The document is read into a small element tree with namespace prefixes
//! stripped, then task elements are located with the first container
//! strategy that finds any.

use std::collections::HashMap;

use monitorail_core::{Diagnostic, DiagnosticCode};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::assemble::{RawActivity, RawProject};
use crate::fields::{
    split_resource_names, Field, PREDECESSOR_PATHS, PROJECT_FINISH_PATHS, PROJECT_NAME_PATHS,
    PROJECT_START_PATHS, RESOURCE_NAMES_PATH, RESOURCE_PATHS, UNASSIGNED_RESOURCE_UID,
};
use crate::FormatError;

// ============================================================================
// Element tree
// ============================================================================

#[derive(Clone, Debug, Default)]
pub(crate) struct Element {
    /// Local name, prefix removed
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    fn open(start: &BytesStart<'_>) -> Result<Self, FormatError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| FormatError::Unreadable(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| FormatError::Unreadable(e.to_string()))?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Has at least one leaf child
    pub fn is_record(&self) -> bool {
        self.children.iter().any(Element::is_leaf)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All elements reached by a `/`-separated path of exact local names
    pub fn find_all<'a>(&'a self, path: &str) -> Vec<&'a Element> {
        let mut current = vec![self];
        for segment in path.split('/') {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter().filter(|c| c.name == segment))
                .collect();
        }
        current
    }

    /// Trimmed text of the first non-empty element at `path`. A single-segment
    /// path also matches an attribute of the same name.
    pub fn value(&self, path: &str) -> Option<&str> {
        let from_children = self
            .find_all(path)
            .into_iter()
            .map(|e| e.text.trim())
            .find(|t| !t.is_empty());
        from_children.or_else(|| {
            if path.contains('/') {
                None
            } else {
                self.attribute(path).map(str::trim).filter(|v| !v.is_empty())
            }
        })
    }

    /// Trimmed, non-empty texts of every element at `path`
    pub fn values<'a>(&'a self, path: &str) -> Vec<&'a str> {
        self.find_all(path)
            .into_iter()
            .map(|e| e.text.trim())
            .filter(|t| !t.is_empty())
            .collect()
    }

    fn first_value(&self, paths: &[&str]) -> Option<&str> {
        paths.iter().find_map(|p| self.value(p))
    }

    fn descendants<'a>(&'a self, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            out.push(child);
            child.descendants(out);
        }
    }
}

/// Parse a document into its root element
pub(crate) fn parse_document(text: &str) -> Result<Element, FormatError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => stack.push(Element::open(&start)?),
            Ok(Event::Empty(start)) => {
                let element = Element::open(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FormatError::Unreadable("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Text(text)) => {
                if let Some(top) = stack.last_mut() {
                    let unescaped = text
                        .unescape()
                        .map_err(|e| FormatError::Unreadable(e.to_string()))?;
                    top.text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(data)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(FormatError::Unreadable(format!(
                    "XML error at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if !stack.is_empty() {
        return Err(FormatError::Unreadable(
            "document ends inside an open element".into(),
        ));
    }
    root.ok_or_else(|| FormatError::Unreadable("document has no root element".into()))
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), FormatError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(FormatError::Unreadable("more than one root element".into()))
    }
}

// ============================================================================
// Container strategies
// ============================================================================

/// Ways of locating task elements, tried in order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerStrategy {
    /// Elements named exactly `Task`
    TaskElements,
    /// Elements named exactly `Activity`
    ActivityElements,
    /// `Tasks/Task` in any letter case
    TasksPathAnyCase,
    /// Any record-like element whose name mentions task or activity
    RecordScan,
}

impl ContainerStrategy {
    pub const ORDER: [ContainerStrategy; 4] = [
        ContainerStrategy::TaskElements,
        ContainerStrategy::ActivityElements,
        ContainerStrategy::TasksPathAnyCase,
        ContainerStrategy::RecordScan,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            ContainerStrategy::TaskElements => "<Task> elements",
            ContainerStrategy::ActivityElements => "<Activity> elements",
            ContainerStrategy::TasksPathAnyCase => "Tasks/Task path (case-insensitive)",
            ContainerStrategy::RecordScan => "record scan for task/activity elements",
        }
    }

    pub(crate) fn collect<'a>(&self, root: &'a Element) -> Vec<&'a Element> {
        let mut out = Vec::new();
        match self {
            ContainerStrategy::TaskElements | ContainerStrategy::ActivityElements => {
                let wanted = if *self == ContainerStrategy::TaskElements {
                    "Task"
                } else {
                    "Activity"
                };
                let mut all = Vec::new();
                root.descendants(&mut all);
                out.extend(all.into_iter().filter(|e| e.name == wanted));
            }
            ContainerStrategy::TasksPathAnyCase => collect_tasks_path(root, &mut out),
            ContainerStrategy::RecordScan => collect_records(root, &mut out),
        }
        out
    }
}

fn collect_tasks_path<'a>(parent: &'a Element, out: &mut Vec<&'a Element>) {
    let is_container = parent.name.eq_ignore_ascii_case("tasks");
    for child in &parent.children {
        if is_container && child.name.eq_ignore_ascii_case("task") {
            out.push(child);
        }
        collect_tasks_path(child, out);
    }
}

fn collect_records<'a>(parent: &'a Element, out: &mut Vec<&'a Element>) {
    for child in &parent.children {
        let lower = child.name.to_ascii_lowercase();
        if child.is_record() && (lower.contains("task") || lower.contains("activity")) {
            out.push(child);
        } else {
            collect_records(child, out);
        }
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Decode the raw bytes as UTF-8, dropping a byte-order mark
fn decode(bytes: &[u8]) -> Result<&str, FormatError> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map_err(|e| FormatError::Unreadable(format!("file is not valid UTF-8: {e}")))
}

/// Locate projects, resources and task records in an XML export
pub(crate) fn read_xml(bytes: &[u8]) -> Result<RawProject, FormatError> {
    let root = parse_document(decode(bytes)?)?;
    let mut project = RawProject::default();

    if let Some(namespace) = root.attribute("xmlns") {
        project.log.push(Diagnostic::new(
            DiagnosticCode::I002Namespace,
            format!("file uses namespace {namespace}"),
        ));
    }

    let Some((strategy, elements)) = ContainerStrategy::ORDER.iter().find_map(|s| {
        let found = s.collect(&root);
        (!found.is_empty()).then_some((*s, found))
    }) else {
        return Err(FormatError::NoActivities);
    };

    debug!(strategy = ?strategy, count = elements.len(), "task container located");
    project.log.push(Diagnostic::new(
        DiagnosticCode::I008ContainerStrategy,
        format!(
            "task container: {} ({} elements)",
            strategy.describe(),
            elements.len()
        ),
    ));

    project.name = root.first_value(PROJECT_NAME_PATHS).map(str::to_string);
    project.start = root.first_value(PROJECT_START_PATHS).map(str::to_string);
    project.finish = root.first_value(PROJECT_FINISH_PATHS).map(str::to_string);

    for resource in root.find_all("Resources/Resource") {
        if let (Some(uid), Some(name)) = (
            resource.first_value(&["UID", "ID"]),
            resource.value("Name"),
        ) {
            project.resources.push((uid.to_string(), name.to_string()));
        }
    }

    let assignments = project_assignments(&root);

    project.activities = elements
        .into_iter()
        .map(|element| read_task(element, &assignments))
        .collect();

    Ok(project)
}

/// TaskUID -> ResourceUIDs from the project-level assignment list
fn project_assignments(root: &Element) -> HashMap<String, Vec<String>> {
    let mut map: HashMap<String, Vec<String>> = HashMap::new();
    for assignment in root.find_all("Assignments/Assignment") {
        let (Some(task), Some(resource)) =
            (assignment.value("TaskUID"), assignment.value("ResourceUID"))
        else {
            continue;
        };
        if resource != UNASSIGNED_RESOURCE_UID {
            map.entry(task.to_string())
                .or_default()
                .push(resource.to_string());
        }
    }
    map
}

fn read_task(element: &Element, assignments: &HashMap<String, Vec<String>>) -> RawActivity {
    let mut raw = RawActivity::default();
    for field in Field::ALL {
        if let Some(value) = element.first_value(field.xml_paths()) {
            raw.set(field, value);
        }
    }

    raw.predecessors = PREDECESSOR_PATHS
        .iter()
        .flat_map(|p| element.values(p))
        .map(str::to_string)
        .collect();

    raw.resources = RESOURCE_PATHS
        .iter()
        .flat_map(|p| element.values(p))
        .filter(|r| *r != UNASSIGNED_RESOURCE_UID)
        .map(str::to_string)
        .collect();
    if raw.resources.is_empty() {
        if let Some(names) = element.value(RESOURCE_NAMES_PATH) {
            raw.resources = split_resource_names(names).map(str::to_string).collect();
        }
    }
    if let Some(assigned) = raw.get(Field::Id).and_then(|id| assignments.get(id)) {
        raw.resources.extend(assigned.iter().cloned());
    }

    raw
}
