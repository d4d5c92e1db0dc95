//! Dependency graph construction
//!
//! One node per activity, one edge per resolved predecessor reference,
//! pointing from the predecessor to the activity. References that match no
//! activity in the (possibly filtered) schedule are kept aside and counted.

use std::collections::HashSet;

use monitorail_core::{
    Criticality, DependencyGraph, Diagnostic, DiagnosticCode, GraphEdge, GraphNode, Schedule,
};

/// Build the graph and its log addendum
pub fn build(schedule: &Schedule, threshold: i64) -> (DependencyGraph, Vec<Diagnostic>) {
    let ids: HashSet<&str> = schedule.ids().collect();
    let mut graph = DependencyGraph::default();
    let mut seen_edges: HashSet<(&str, &str)> = HashSet::new();
    let mut log = Vec::new();

    for activity in &schedule.activities {
        graph.nodes.push(GraphNode {
            id: activity.id.clone(),
            name: activity.name.clone(),
            total_slack: activity.total_slack,
            flagged: Criticality::classify(activity.total_slack, threshold).is_flagged(),
        });

        for predecessor in &activity.predecessor_ids {
            if !ids.contains(predecessor.as_str()) {
                graph
                    .unresolved
                    .push((activity.id.clone(), predecessor.clone()));
            } else if seen_edges.insert((predecessor.as_str(), activity.id.as_str())) {
                graph.edges.push(GraphEdge {
                    from: predecessor.clone(),
                    to: activity.id.clone(),
                });
            }
        }
    }

    let has_links = schedule
        .activities
        .iter()
        .any(|a| !a.predecessor_ids.is_empty());
    if !has_links {
        log.push(Diagnostic::new(
            DiagnosticCode::I005NoPredecessorLinks,
            "no predecessor links in the schedule; dependency graph has no edges",
        ));
    }

    if !graph.unresolved.is_empty() {
        let mut d = Diagnostic::new(
            DiagnosticCode::W007UnresolvedPredecessor,
            format!(
                "{} predecessor references match no activity",
                graph.unresolved.len()
            ),
        );
        for (activity, missing) in graph.unresolved.iter().take(10) {
            d = d.with_note(format!("{activity} -> missing {missing}"));
        }
        log.push(d);
    }

    if let Err(cycle) = graph.layers() {
        log.push(
            Diagnostic::new(
                DiagnosticCode::W011DependencyCycle,
                format!("dependency cycle among {} activities", cycle.len()),
            )
            .with_note(format!("ids: {}", cycle.join(", "))),
        );
    }

    (graph, log)
}
