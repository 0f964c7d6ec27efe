//! # Tourney Engine
//!
//! A multi-round tournament progression engine: lobby partitioning, match
//! result aggregation, phase resolution and prize settlement over a
//! PostgreSQL store.
//!
//! ## Architecture
//!
//! A tournament is configured as an ordered list of phases, each realized as
//! one or more rounds:
//!
//! - **Elimination**: top `N` by cumulative score advance, the rest are out
//! - **Points**: same cut, but the phase may span several rounds
//! - **Checkmate**: crossing a point threshold arms a participant; an armed
//!   first-place finish ends the tournament on the spot
//!
//! Rounds move `pending -> playing -> completed`, one-directionally. A
//! fixed-interval scheduler activates due rounds and partitions the active
//! field into lobbies; an external worker fetches each match's result and
//! feeds it back through the aggregator; the last result to arrive resolves
//! the round, which either spawns the next one or settles the prize pool.
//! Every transition runs in one database transaction and is idempotent, so
//! both triggers can fire concurrently or repeatedly without corrupting the
//! progression.
//!
//! ## Core Modules
//!
//! - [`tournament`]: the progression engine (scheduler, partitioner,
//!   aggregator, phase resolution, prizes, settlement)
//! - [`ledger`]: wallet/escrow accounting with a double-entry ledger
//! - [`ports`]: injected collaborators (result-fetch queue, notifications)
//! - [`db`]: PostgreSQL pool and configuration

pub mod db;
pub mod ledger;
pub mod ports;
pub mod tournament;

pub use ledger::{LedgerError, LedgerManager, LedgerResult};
pub use ports::{
    EngineEvent, FetchRequest, LogNotifier, NotificationPort, PgFetchQueue, ResultFetchQueue,
};
pub use tournament::{
    EngineError, EngineResult, IngestOutcome, ResultAggregator, RoundScheduler, TournamentManager,
};
