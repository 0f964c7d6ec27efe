//! Outbound ports for collaborators outside the engine core.
//!
//! The engine never reaches into ambient global state: the result-fetch queue
//! and the notification channel are injected as trait objects. Both are
//! fire-and-forget from the engine's point of view; the transactional core
//! collects requests and events, and the boundary dispatches them only after
//! the transaction commits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::sync::Arc;

/// A request to fetch one match's result from the external provider.
///
/// A worker outside the core picks these up, calls the provider, and feeds
/// the raw payload back through [`ResultAggregator::ingest_match_result`].
///
/// [`ResultAggregator::ingest_match_result`]: crate::tournament::ResultAggregator::ingest_match_result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub match_id: i64,
    pub lobby_id: i64,
    pub external_match_id: Option<String>,
    pub region: Option<String>,
}

/// Work queue for asynchronous match-result fetches.
#[async_trait]
pub trait ResultFetchQueue: Send + Sync {
    /// Enqueue a fetch request. Must not block on the external provider.
    async fn enqueue(&self, request: &FetchRequest) -> Result<(), sqlx::Error>;
}

/// PostgreSQL-backed fetch queue.
///
/// Inserts one job row per request; the fetch worker polls this table.
pub struct PgFetchQueue {
    pool: Arc<PgPool>,
}

impl PgFetchQueue {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultFetchQueue for PgFetchQueue {
    async fn enqueue(&self, request: &FetchRequest) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO result_fetch_jobs (match_id, lobby_id, external_match_id, region, status)
            VALUES ($1, $2, $3, $4, 'queued')
            ON CONFLICT (match_id) DO NOTHING
            "#,
        )
        .bind(request.match_id)
        .bind(request.lobby_id)
        .bind(&request.external_match_id)
        .bind(&request.region)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}

/// Events published by the engine as rounds progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    RoundStarted {
        tournament_id: i64,
        round_id: i64,
        round_number: i32,
    },
    NextRoundCreated {
        tournament_id: i64,
        round_id: i64,
        round_number: i32,
    },
    PrizeCredited {
        tournament_id: i64,
        user_id: i64,
        rank: u32,
        amount: i64,
    },
    TournamentCompleted {
        tournament_id: i64,
    },
}

/// Topic for events about one tournament.
pub fn tournament_topic(tournament_id: i64) -> String {
    format!("tournament:{tournament_id}")
}

/// Topic for events about one user.
pub fn user_topic(user_id: i64) -> String {
    format!("user:{user_id}")
}

/// Notification channel for interested subscribers.
///
/// Delivery is best-effort and never required for correctness.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn publish(&self, topic: &str, event: &EngineEvent);
}

/// Notifier that only logs, for tests and headless deployments.
pub struct LogNotifier;

#[async_trait]
impl NotificationPort for LogNotifier {
    async fn publish(&self, topic: &str, event: &EngineEvent) {
        log::debug!("notify {}: {:?}", topic, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_formats() {
        assert_eq!(tournament_topic(42), "tournament:42");
        assert_eq!(user_topic(7), "user:7");
    }

    #[test]
    fn test_engine_event_serializes_tagged() {
        let event = EngineEvent::PrizeCredited {
            tournament_id: 1,
            user_id: 2,
            rank: 1,
            amount: 600,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "prize_credited");
        assert_eq!(value["amount"], 600);
    }
}
