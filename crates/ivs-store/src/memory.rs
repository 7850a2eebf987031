use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ivs_models::Report;
use moka::future::Cache;
use uuid::Uuid;

/// Cache key: a report is only valid for the completion that produced it.
/// A resubmitted idea completes again with a new timestamp, so stale
/// entries are never served.
pub type ReportKey = (Uuid, DateTime<Utc>);

/// In-memory hot cache of completed reports backed by moka.
///
/// Entries are automatically evicted after TTL.
pub struct ReportCache {
    inner: Cache<ReportKey, Arc<Report>>,
}

impl ReportCache {
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &ReportKey) -> Option<Arc<Report>> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: ReportKey, report: Arc<Report>) {
        self.inner.insert(key, report).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ivs_models::{Analyses, Recommendation, SynthesisResult};
    use rust_decimal_macros::dec;

    fn report(submission_id: Uuid) -> Arc<Report> {
        let synthesis = SynthesisResult {
            recommendation: Recommendation::Reconsider,
            confidence_score: dec!(3),
            executive_summary: "Weak demand signal".to_string(),
            strengths: vec![],
            concerns: vec![],
            critical_assumptions: vec![],
            next_steps: vec![],
            potential_pivots: vec![],
            comparable_startups: vec![],
        };
        Arc::new(Report::new(submission_id, Analyses::new(), synthesis))
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = ReportCache::new(100, Duration::from_secs(60));
        let id = Uuid::new_v4();
        let key = (id, Utc::now());
        cache.insert(key, report(id)).await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(hit.submission_id, id);
    }

    #[tokio::test]
    async fn different_completion_misses() {
        let cache = ReportCache::new(100, Duration::from_secs(60));
        let id = Uuid::new_v4();
        let first = Utc::now();
        cache.insert((id, first), report(id)).await;

        let later = first + chrono::Duration::seconds(1);
        assert!(cache.get(&(id, later)).await.is_none());
    }

    #[tokio::test]
    async fn ttl_expiration() {
        let cache = ReportCache::new(100, Duration::from_millis(50));
        let id = Uuid::new_v4();
        let key = (id, Utc::now());
        cache.insert(key, report(id)).await;

        assert!(cache.get(&key).await.is_some());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(cache.get(&key).await.is_none());
    }
}
