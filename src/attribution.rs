//! Attribution: turning a project's signups into a total and a ranked
//! per-source breakdown.
//!
//! Everything here is pure and recomputed on every read.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_SOURCE, Signup};

/// A record that can be attributed to a source.
pub trait Attributed {
    /// The raw source tag. `None` and `""` both mean the signup came in directly.
    fn source(&self) -> Option<&str>;
    fn created_at(&self) -> Option<DateTime<Utc>>;
}

impl Attributed for Signup {
    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCount {
    pub source: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribution<T> {
    pub total: usize,
    pub breakdown: Vec<SourceCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub most_recent: Option<T>,
}

/// The bucket a record is counted under.
#[must_use]
pub fn normalize_source(source: Option<&str>) -> &str {
    match source {
        Some(s) if !s.is_empty() => s,
        _ => DEFAULT_SOURCE,
    }
}

/// Counts records per source, most popular first. Sources with equal counts
/// keep the order in which they were first seen.
#[must_use]
pub fn breakdown<T: Attributed>(records: &[T]) -> Vec<SourceCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<SourceCount> = Vec::new();

    for record in records {
        let source = normalize_source(record.source());
        match index.get(source) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(source, counts.len());
                counts.push(SourceCount {
                    source: source.to_string(),
                    count: 1,
                });
            }
        }
    }

    // sort_by is stable, which gives the first-seen tie-break.
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// The record with the latest `created_at`. Missing timestamps sort before
/// any real one; among equals the earliest record in input order wins.
#[must_use]
pub fn most_recent<T: Attributed>(records: &[T]) -> Option<&T> {
    records.iter().fold(None, |best: Option<&T>, record| match best {
        Some(b) if record.created_at() <= b.created_at() => Some(b),
        _ => Some(record),
    })
}

#[must_use]
pub fn aggregate<T: Attributed + Clone>(records: &[T]) -> Attribution<T> {
    Attribution {
        total: records.len(),
        breakdown: breakdown(records),
        most_recent: most_recent(records).cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        source: Option<&'static str>,
        created_at: Option<DateTime<Utc>>,
    }

    impl Attributed for Row {
        fn source(&self) -> Option<&str> {
            self.source
        }

        fn created_at(&self) -> Option<DateTime<Utc>> {
            self.created_at
        }
    }

    fn row(id: u32, source: Option<&'static str>) -> Row {
        Row {
            id,
            source,
            created_at: None,
        }
    }

    fn at(id: u32, secs: Option<i64>) -> Row {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Row {
            id,
            source: Some("twitter"),
            created_at: secs.map(|s| base + Duration::seconds(s)),
        }
    }

    fn pairs(counts: &[SourceCount]) -> Vec<(&str, usize)> {
        counts.iter().map(|c| (c.source.as_str(), c.count)).collect()
    }

    #[test]
    fn test_empty_input() {
        let result = aggregate::<Row>(&[]);
        assert_eq!(result.total, 0);
        assert!(result.breakdown.is_empty());
        assert!(result.most_recent.is_none());
    }

    #[test]
    fn test_mixed_sources_scenario() {
        let rows = vec![
            row(1, Some("twitter")),
            row(2, Some("twitter")),
            row(3, Some("")),
            row(4, Some("linkedin")),
        ];
        let result = aggregate(&rows);

        assert_eq!(result.total, 4);
        assert_eq!(
            pairs(&result.breakdown),
            vec![("twitter", 2), ("direct", 1), ("linkedin", 1)]
        );
    }

    #[test]
    fn test_missing_and_empty_source_count_as_direct() {
        let rows = vec![row(1, None), row(2, Some("")), row(3, Some("direct"))];
        assert_eq!(pairs(&breakdown(&rows)), vec![("direct", 3)]);
    }

    #[test]
    fn test_sources_are_case_sensitive() {
        let rows = vec![row(1, Some("Twitter")), row(2, Some("twitter"))];
        assert_eq!(
            pairs(&breakdown(&rows)),
            vec![("Twitter", 1), ("twitter", 1)]
        );
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let rows = vec![
            row(1, Some("newsletter")),
            row(2, Some("producthunt")),
            row(3, Some("linkedin")),
            row(4, Some("linkedin")),
            row(5, Some("producthunt")),
        ];
        assert_eq!(
            pairs(&breakdown(&rows)),
            vec![("producthunt", 2), ("linkedin", 2), ("newsletter", 1)]
        );
    }

    #[test]
    fn test_breakdown_sums_to_total_and_is_sorted() {
        let sources = ["a", "b", "", "c", "a", "b", "a", "", "d"];
        let rows: Vec<Row> = sources
            .iter()
            .enumerate()
            .map(|(i, s)| row(i as u32, Some(*s)))
            .collect();
        let result = aggregate(&rows);

        let sum: usize = result.breakdown.iter().map(|c| c.count).sum();
        assert_eq!(sum, result.total);
        assert_eq!(result.total, rows.len());
        assert!(result.breakdown.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_most_recent_picks_latest_timestamp() {
        let rows = vec![at(1, Some(10)), at(2, Some(30)), at(3, None), at(4, Some(20))];
        assert_eq!(most_recent(&rows).map(|r| r.id), Some(2));
    }

    #[test]
    fn test_most_recent_ignores_null_when_any_timestamp_exists() {
        let rows = vec![at(1, None), at(2, Some(0)), at(3, None)];
        assert_eq!(most_recent(&rows).map(|r| r.id), Some(2));
    }

    #[test]
    fn test_most_recent_ties_resolve_to_first_in_input() {
        let rows = vec![at(1, Some(5)), at(2, Some(5)), at(3, Some(1))];
        assert_eq!(most_recent(&rows).map(|r| r.id), Some(1));

        let all_null = vec![at(7, None), at(8, None)];
        assert_eq!(most_recent(&all_null).map(|r| r.id), Some(7));
    }

    #[test]
    fn test_signup_records_aggregate() {
        let signup = |id: &str, source: &str| Signup {
            id: id.to_string(),
            project_id: "p1".to_string(),
            email: format!("{id}@example.com"),
            source: source.to_string(),
            ip_address: None,
            created_at: Some(Utc::now()),
        };
        let signups = vec![signup("a", "twitter"), signup("b", "")];
        let result = aggregate(&signups);

        assert_eq!(
            pairs(&result.breakdown),
            vec![("twitter", 1), ("direct", 1)]
        );
        assert!(result.most_recent.is_some());
    }
}
