//! Percent complete table

use monitorail_core::{PercentCompleteRow, PercentCompleteTable, Schedule};

/// One row per activity that carries a percent complete value
pub fn table(schedule: &Schedule) -> PercentCompleteTable {
    let rows = schedule
        .activities
        .iter()
        .filter_map(|a| {
            Some(PercentCompleteRow {
                id: a.id.clone(),
                name: a.name.clone(),
                percent_complete: a.percent_complete?,
            })
        })
        .collect();
    PercentCompleteTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use monitorail_core::Activity;

    #[test]
    fn only_rows_with_values() {
        let schedule = Schedule::new("P").with_activities(vec![
            Activity::new("1", "A").percent_complete(100.0),
            Activity::new("2", "B"),
            Activity::new("3", "C").percent_complete(20.0),
        ]);
        let table = table(&schedule);

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].id, "3");
        assert_eq!(table.mean(), Some(60.0));
    }

    #[test]
    fn empty_without_values() {
        let schedule = Schedule::new("P").with_activities(vec![Activity::new("1", "A")]);
        assert!(table(&schedule).rows.is_empty());
    }
}
