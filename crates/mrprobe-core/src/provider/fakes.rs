//! In-memory providers (testing only)
//!
//! `StaticProvider` answers every call with a fixed result; `StalledProvider`
//! delays another provider to exercise deadlines.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MergeRequest, MergeRequestProvider, ProviderResult};
use crate::error::ProviderError;

/// Build a merge request last updated `age` before `now`.
pub fn merge_request_aged(id: &str, now: DateTime<Utc>, age: Duration) -> MergeRequest {
    let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero());
    let updated_at = now - age;
    MergeRequest {
        id: id.to_string(),
        title: format!("merge request {id}"),
        created_at: updated_at - chrono::Duration::hours(1),
        updated_at,
    }
}

/// Provider returning a canned answer and counting calls.
#[derive(Debug)]
pub struct StaticProvider {
    result: ProviderResult<Vec<MergeRequest>>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn returning(merge_requests: Vec<MergeRequest>) -> Self {
        Self {
            result: Ok(merge_requests),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MergeRequestProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_open_merge_requests(
        &self,
        _project: &str,
        _target_branch: &str,
    ) -> ProviderResult<Vec<MergeRequest>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Provider that sleeps before delegating, to simulate a slow API.
pub struct StalledProvider {
    delay: Duration,
    inner: Arc<dyn MergeRequestProvider>,
}

impl StalledProvider {
    pub fn new(delay: Duration, inner: Arc<dyn MergeRequestProvider>) -> Self {
        Self { delay, inner }
    }
}

#[async_trait]
impl MergeRequestProvider for StalledProvider {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn fetch_open_merge_requests(
        &self,
        project: &str,
        target_branch: &str,
    ) -> ProviderResult<Vec<MergeRequest>> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .fetch_open_merge_requests(project, target_branch)
            .await
    }
}
