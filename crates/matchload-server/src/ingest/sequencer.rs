//! Grouping and per-match sequence assignment
//!
//! Records are partitioned by (match_id, kind). Inside each partition they are
//! sorted by `inserted_at` and numbered 1..=N. The sort is stable, so records
//! stamped with the same instant keep their parse order.

use std::collections::BTreeMap;

use super::models::{MatchGroup, MatchRecord, RecordKind};

/// Sequenced records split by commit strategy
#[derive(Debug, Default)]
pub struct SequencedRun {
    pub a_groups: Vec<MatchGroup>,
    pub b_groups: Vec<MatchGroup>,
}

impl SequencedRun {
    pub fn record_count(&self) -> usize {
        self.a_groups
            .iter()
            .chain(self.b_groups.iter())
            .map(MatchGroup::len)
            .sum()
    }
}

/// Group records by (match_id, kind) and number each group from 1.
///
/// `records` must be in parse order for the tie-break to hold.
pub fn assign_sequences(records: impl IntoIterator<Item = MatchRecord>) -> SequencedRun {
    let mut partitions: BTreeMap<(String, RecordKind), Vec<MatchRecord>> = BTreeMap::new();

    for record in records {
        partitions
            .entry((record.match_id.clone(), record.kind))
            .or_default()
            .push(record);
    }

    let mut run = SequencedRun::default();

    for ((match_id, kind), mut records) in partitions {
        records.sort_by_key(|r| r.inserted_at);

        for (position, record) in records.iter_mut().enumerate() {
            record.sequence_number = position as u32 + 1;
        }

        let group = MatchGroup {
            match_id,
            kind,
            records,
        };

        match kind {
            RecordKind::A => run.a_groups.push(group),
            RecordKind::B => run.b_groups.push(group),
        }
    }

    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::models::RunId;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(offset_ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 18, 0, 0).unwrap() + Duration::milliseconds(offset_ms)
    }

    fn rec(match_id: &str, outcome: &str, specifiers: Option<&str>, ts: DateTime<Utc>) -> MatchRecord {
        MatchRecord::new(
            match_id,
            1,
            outcome,
            specifiers.map(str::to_string),
            ts,
            RunId::new(1),
        )
    }

    #[test]
    fn test_groups_split_by_match_and_kind() {
        let run = assign_sequences(vec![
            rec("M1", "a", Some("s"), at(0)),
            rec("M1", "b", None, at(1)),
            rec("M2", "c", None, at(2)),
            rec("M1", "d", None, at(3)),
        ]);

        assert_eq!(run.a_groups.len(), 1);
        assert_eq!(run.b_groups.len(), 2);
        assert_eq!(run.record_count(), 4);

        let m1_b = run.b_groups.iter().find(|g| g.match_id == "M1").unwrap();
        assert_eq!(m1_b.kind, RecordKind::B);
        let outcomes: Vec<_> = m1_b.records.iter().map(|r| r.outcome_id.as_str()).collect();
        assert_eq!(outcomes, vec!["b", "d"]);
        let seqs: Vec<_> = m1_b.records.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2]);
    }

    #[test]
    fn test_sorted_by_inserted_at() {
        let run = assign_sequences(vec![
            rec("M1", "late", None, at(30)),
            rec("M1", "early", None, at(10)),
            rec("M1", "middle", None, at(20)),
        ]);

        let group = &run.b_groups[0];
        let order: Vec<_> = group
            .records
            .iter()
            .map(|r| (r.outcome_id.as_str(), r.sequence_number))
            .collect();
        assert_eq!(order, vec![("early", 1), ("middle", 2), ("late", 3)]);
    }

    #[test]
    fn test_equal_timestamps_keep_parse_order() {
        let ts = at(0);
        let records: Vec<_> = (0..50)
            .map(|i| rec("M1", &format!("o{}", i), Some("s"), ts))
            .collect();

        let run = assign_sequences(records);
        let group = &run.a_groups[0];

        for (i, record) in group.records.iter().enumerate() {
            assert_eq!(record.outcome_id, format!("o{}", i));
            assert_eq!(record.sequence_number, i as u32 + 1);
        }
    }

    #[test]
    fn test_numbers_are_contiguous_per_group() {
        let mut records = Vec::new();
        for i in 0..30 {
            let match_id = format!("M{}", i % 3);
            let specifiers = if i % 2 == 0 { Some("s") } else { None };
            records.push(rec(&match_id, &i.to_string(), specifiers, at(i % 7)));
        }

        let run = assign_sequences(records);
        for group in run.a_groups.iter().chain(run.b_groups.iter()) {
            let seqs: Vec<u32> = group.records.iter().map(|r| r.sequence_number).collect();
            let expected: Vec<u32> = (1..=group.len() as u32).collect();
            assert_eq!(seqs, expected);
            assert!(group
                .records
                .windows(2)
                .all(|w| w[0].inserted_at <= w[1].inserted_at));
        }
    }

    #[test]
    fn test_empty_input() {
        let run = assign_sequences(Vec::new());
        assert!(run.a_groups.is_empty());
        assert!(run.b_groups.is_empty());
    }
}
