//! Concurrent access to one file-backed store from separate connections.
//!
//! A background run and a polling reader (often in another process) share
//! the database. WAL mode must let readers see consistent rows while the
//! writer moves submissions through their lifecycle.
//!
//! Run with:
//! ```bash
//! cargo test -p ivs-store --test wal_concurrency
//! ```

use std::sync::Arc;

use ivs_models::store_schema::now;
use ivs_models::{
    Analyses, AnalysisResult, AnalystKind, IdeaPayload, Recommendation, Report, StatusUpdate,
    SubmissionStatus, SynthesisResult,
};
use ivs_store::{SqliteStore, SubmissionStore};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn report(submission_id: Uuid) -> Report {
    let analyses: Analyses = AnalystKind::ALL
        .iter()
        .map(|k| (*k, AnalysisResult::default()))
        .collect();
    Report::new(
        submission_id,
        analyses,
        SynthesisResult {
            recommendation: Recommendation::Caution,
            confidence_score: dec!(5.5),
            executive_summary: "Promising but unproven".to_string(),
            strengths: vec![],
            concerns: vec![],
            critical_assumptions: vec![],
            next_steps: vec![],
            potential_pivots: vec![],
            comparable_startups: vec![],
        },
    )
}

/// Drive one submission through analyzing -> completed.
async fn complete_one(store: &SqliteStore, i: usize) -> Uuid {
    let payload = IdeaPayload {
        title: format!("Idea {i}"),
        ..Default::default()
    };
    let created = store.create_submission("stress", &payload).await.unwrap();
    store.begin_analysis(created.id).await.unwrap();
    let claim = store.claim(created.id).await.unwrap();
    store.create_report(&claim, &report(created.id)).await.unwrap();
    store
        .update_status(&claim, StatusUpdate::Completed { completed_at: now() })
        .await
        .unwrap();
    created.id
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_completed_without_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivs.db");
    let path_str = path.to_str().unwrap().to_string();

    let writer = Arc::new(SqliteStore::open(&path_str).unwrap());
    let submissions = 100;

    let writer_task = {
        let writer = Arc::clone(&writer);
        tokio::spawn(async move {
            let mut ids = Vec::with_capacity(submissions);
            for i in 0..submissions {
                ids.push(complete_one(&writer, i).await);
            }
            ids
        })
    };

    let reader_tasks: Vec<_> = (0..3)
        .map(|_| {
            let path_str = path_str.clone();
            tokio::spawn(async move {
                let reader = SqliteStore::open(&path_str).unwrap();
                let mut checked = 0usize;
                for _ in 0..50 {
                    for submission in reader.list_submissions("stress").await.unwrap() {
                        if submission.status == SubmissionStatus::Completed {
                            let report = reader.get_report(submission.id).await.unwrap();
                            assert!(report.is_some(), "completed without report: {}", submission.id);
                            checked += 1;
                        }
                    }
                    tokio::task::yield_now().await;
                }
                checked
            })
        })
        .collect();

    let ids = writer_task.await.unwrap();
    for task in reader_tasks {
        task.await.unwrap();
    }

    assert_eq!(ids.len(), submissions);
    let listed = writer.list_submissions("stress").await.unwrap();
    assert_eq!(listed.len(), submissions);
    assert!(listed
        .iter()
        .all(|s| s.status == SubmissionStatus::Completed));
}

#[tokio::test]
async fn second_connection_cannot_steal_claim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ivs.db");
    let path_str = path.to_str().unwrap();

    let first = SqliteStore::open(path_str).unwrap();
    let second = SqliteStore::open(path_str).unwrap();

    let created = first
        .create_submission("owner", &IdeaPayload::default())
        .await
        .unwrap();
    first.begin_analysis(created.id).await.unwrap();

    let claim = first.claim(created.id).await.unwrap();
    assert!(second.claim(created.id).await.is_err());

    first.create_report(&claim, &report(created.id)).await.unwrap();
    first
        .update_status(&claim, StatusUpdate::Completed { completed_at: now() })
        .await
        .unwrap();

    let seen = second.get_submission(created.id).await.unwrap().unwrap();
    assert_eq!(seen.status, SubmissionStatus::Completed);
    assert_eq!(second.get_report(created.id).await.unwrap().unwrap().id, {
        first.get_report(created.id).await.unwrap().unwrap().id
    });
}
