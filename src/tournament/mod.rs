//! Tournament progression engine.
//!
//! Runs multi-round elimination, points and checkmate tournaments:
//! - partitions active participants into lobbies and creates one match each,
//! - ingests raw match results and accumulates scores,
//! - decides who advances or is eliminated once a round is fully resolved,
//! - spawns the next round or settles the prize pool.
//!
//! Two inbound triggers drive everything: the time-based
//! [`RoundScheduler::activate_due_rounds`] poll and payload-driven
//! [`ResultAggregator::ingest_match_result`] deliveries. Both run their work
//! in a single database transaction and rely on idempotent transitions
//! instead of locks across processes.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tourney_engine::db::Database;
//! use tourney_engine::ports::{LogNotifier, PgFetchQueue};
//! use tourney_engine::tournament::RoundScheduler;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let pool = db.pool();
//!
//!     let scheduler = RoundScheduler::new(
//!         pool.clone(),
//!         Arc::new(PgFetchQueue::new(pool.clone())),
//!         Arc::new(LogNotifier),
//!     );
//!     scheduler.activate_due_rounds().await?;
//!     Ok(())
//! }
//! ```

mod effects;
mod store;

pub mod errors;
pub mod lobby;
pub mod manager;
pub mod models;
pub mod phase;
pub mod prizes;
pub mod results;
pub mod scheduler;
pub mod settlement;

pub use errors::{EngineError, EngineResult};
pub use manager::TournamentManager;
pub use models::{
    Lobby, LobbyAssignment, Match, MatchResult, MatchResultPayload, MatchStatus, Participant,
    ParticipantResult, PhaseConfig, PhaseRules, PrizeTable, Round, RoundStatus, Tournament,
    TournamentConfig, TournamentId, TournamentStatus,
};
pub use phase::{next_phase_slot, PhaseOutcome};
pub use prizes::{adjust_prize_structure, AdjustedPrizes};
pub use results::{IngestOutcome, ResultAggregator};
pub use scheduler::RoundScheduler;
