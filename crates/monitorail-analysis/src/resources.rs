//! Resource occurrence tally

use std::collections::HashMap;

use monitorail_core::{ResourceCount, ResourceTally, Schedule};

/// Count how many activities each resource appears on.
///
/// Sorted by descending count; ties keep first-seen order.
pub fn tally(schedule: &Schedule) -> ResourceTally {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut entries: Vec<ResourceCount> = Vec::new();

    for resource in schedule.activities.iter().flat_map(|a| &a.resources) {
        match position.get(resource.as_str()) {
            Some(&i) => entries[i].count += 1,
            None => {
                position.insert(resource, entries.len());
                entries.push(ResourceCount {
                    resource_id: resource.clone(),
                    label: schedule.resource_label(resource).to_string(),
                    count: 1,
                });
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    entries.sort_by(|a, b| b.count.cmp(&a.count));
    ResourceTally { entries }
}
