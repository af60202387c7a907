//! End-to-end ingestion runs against the in-memory repository

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use matchload_server::ingest::{
    GroupStatus, IngestConfig, IngestionPipeline, MemoryMatchRepository, RecordKind, RunCounter,
};

fn config() -> IngestConfig {
    IngestConfig {
        batch_size: 1000,
        batched_concurrency: 2,
        ordered_concurrency: 8,
        ordered_timeout_secs: 30,
        ..IngestConfig::default()
    }
}

fn pipeline_with(repo: Arc<MemoryMatchRepository>, config: IngestConfig) -> IngestionPipeline {
    IngestionPipeline::new(repo, Arc::new(RunCounter::new()), config)
}

fn source(lines: &[String]) -> Cursor<String> {
    let mut text = String::from("MATCH_ID|MARKET_ID|OUTCOME_ID|SPECIFIERS\n");
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    Cursor::new(text)
}

#[tokio::test]
async fn test_one_record_of_each_kind() {
    let repo = Arc::new(MemoryMatchRepository::new());
    let pipeline = pipeline_with(repo.clone(), config());

    let report = pipeline
        .ingest_reader(
            source(&["'M1'|60|'1'|'total=2.5'".to_string(), "'M1'|1|'2'".to_string()]),
            "two-lines",
        )
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.batched.groups_total, 1);
    assert_eq!(report.ordered.groups_total, 1);
    assert_eq!(report.records_committed(), 2);

    let rows = repo.rows();
    assert!(rows.iter().all(|r| r.run_id == report.run_id && r.sequence_number == 1));
    assert!(rows.iter().all(|r| r.match_id == "M1"));

    let stamps = pipeline.get_timestamps(&report.run_id).await.unwrap();
    let (min, max) = (stamps.min_inserted_at.unwrap(), stamps.max_inserted_at.unwrap());
    assert!(min <= max);
    assert!(rows.iter().all(|r| r.inserted_at >= min && r.inserted_at <= max));
}

#[tokio::test]
async fn test_kind_a_batches_of_1000() {
    let repo = Arc::new(MemoryMatchRepository::new());
    let lines: Vec<String> = (0..2500).map(|i| format!("M1|1|o{i}|line={i}")).collect();

    let report = pipeline_with(repo.clone(), config())
        .ingest_reader(source(&lines), "bulk")
        .await
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.batched.inserts, 3);

    let batches = repo.committed_batches();
    let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);

    // Every record exactly once, contiguous per batch
    let sequences = repo.committed_sequence("M1", RecordKind::A);
    assert_eq!(sequences, (1..=2500).collect::<Vec<u32>>());
    assert_eq!(batches[1][0].sequence_number, 1001);
}

#[tokio::test]
async fn test_malformed_line_does_not_shift_numbering() {
    let repo = Arc::new(MemoryMatchRepository::new());
    let lines = vec![
        "M1|1|a".to_string(),
        "garbage".to_string(),
        "M1|1|b".to_string(),
    ];

    let report = pipeline_with(repo.clone(), config())
        .ingest_reader(source(&lines), "malformed")
        .await
        .unwrap();

    assert_eq!(report.lines_read, 3);
    assert_eq!(report.lines_skipped, 1);
    assert_eq!(report.records_parsed, 2);

    let rows = repo.rows();
    let outcome_of = |seq: u32| {
        rows.iter()
            .find(|r| r.sequence_number == seq)
            .map(|r| r.outcome_id.clone())
    };
    assert_eq!(outcome_of(1).as_deref(), Some("a"));
    assert_eq!(outcome_of(2).as_deref(), Some("b"));
}

#[tokio::test]
async fn test_ordered_failure_is_isolated_to_its_match() {
    let repo = Arc::new(
        MemoryMatchRepository::new()
            .failing_when(|r| r.match_id == "M2" && r.sequence_number == 2),
    );
    let mut lines = Vec::new();
    for i in 0..5 {
        lines.push(format!("M1|1|x{i}"));
        lines.push(format!("M2|1|y{i}"));
        lines.push(format!("M3|1|z{i}|s"));
    }

    let report = pipeline_with(repo.clone(), config())
        .ingest_reader(source(&lines), "failing")
        .await
        .unwrap();

    assert!(!report.is_complete());
    assert!(report.batched.is_complete());
    assert_eq!(report.ordered.groups_committed, 1);
    assert_eq!(report.ordered.groups_failed, 1);

    let failed = report.ordered.outcome_for("M2").unwrap();
    assert!(matches!(failed.status, GroupStatus::Failed { at_sequence: 2, .. }));

    assert_eq!(repo.committed_sequence("M2", RecordKind::B), vec![1]);
    assert_eq!(repo.attempted_sequence("M2", RecordKind::B), vec![1, 2]);
    assert_eq!(repo.committed_sequence("M1", RecordKind::B), vec![1, 2, 3, 4, 5]);
    assert_eq!(repo.committed_sequence("M3", RecordKind::A), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_ordered_commits_ascend_under_contention() {
    let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(1)));
    let lines: Vec<String> = (0..40)
        .map(|i| format!("M{}|1|o{}", i % 4, i))
        .collect();

    let report = pipeline_with(repo.clone(), config())
        .ingest_reader(source(&lines), "contention")
        .await
        .unwrap();

    assert!(report.is_complete());
    for m in 0..4 {
        assert_eq!(
            repo.committed_sequence(&format!("M{m}"), RecordKind::B),
            (1..=10).collect::<Vec<u32>>()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_ordered_matches_start_without_waiting_for_each_other() {
    let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(10)));
    let lines: Vec<String> = (0..60).map(|i| format!("M{}|1|o{}", i / 20, i)).collect();
    let config = IngestConfig {
        ordered_concurrency: 4,
        ..config()
    };

    let report = pipeline_with(repo.clone(), config)
        .ingest_reader(source(&lines), "side-by-side")
        .await
        .unwrap();
    assert!(report.is_complete());

    let attempts = repo.attempts();
    let first_m1 = attempts.iter().position(|b| b[0].match_id == "M1").unwrap();
    let m0_before = attempts[..first_m1].iter().filter(|b| b[0].match_id == "M0").count();
    assert!(m0_before < 20, "M1 waited for all of M0");
    assert!(m0_before <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_ordered_timeout_marks_groups_incomplete() {
    let repo = Arc::new(MemoryMatchRepository::new().with_insert_delay(Duration::from_millis(400)));
    let lines: Vec<String> = (0..6).map(|i| format!("M1|1|o{i}")).collect();
    let config = IngestConfig {
        ordered_timeout_secs: 1,
        ..config()
    };

    let report = pipeline_with(repo.clone(), config)
        .ingest_reader(source(&lines), "slow")
        .await
        .unwrap();

    assert_eq!(report.ordered.groups_incomplete, 1);
    let outcome = report.ordered.outcome_for("M1").unwrap();
    assert_eq!(outcome.status, GroupStatus::Incomplete);
    assert_eq!(outcome.committed, 2);
    assert_eq!(repo.row_count(), 2);
}

#[tokio::test]
async fn test_counter_reset_restarts_run_ids() {
    let repo = Arc::new(MemoryMatchRepository::new());
    let pipeline = pipeline_with(repo, config());
    let lines = vec!["M1|1|a".to_string()];

    let first = pipeline.ingest_reader(source(&lines), "a").await.unwrap();
    let second = pipeline.ingest_reader(source(&lines), "b").await.unwrap();
    assert_ne!(first.run_id, second.run_id);

    pipeline.run_counter().reset();
    let third = pipeline.ingest_reader(source(&lines), "c").await.unwrap();
    assert_eq!(third.run_id, "1");
}
