//! Data models for multi-round tournament progression.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tournament ID type
pub type TournamentId = i64;
/// Round ID type
pub type RoundId = i64;
/// Lobby ID type
pub type LobbyId = i64;
/// Match ID type
pub type MatchId = i64;
/// Participant ID type
pub type ParticipantId = i64;

/// Prize table keyed by rank (1 = first place). `BTreeMap` keeps ranks in
/// ascending order, which the allocation walk relies on.
pub type PrizeTable = BTreeMap<u32, i64>;

/// Tournament status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TournamentStatus {
    /// Registration open, round 1 not yet started
    Pending,
    /// Rounds in progress
    Playing,
    /// Settled and closed
    Completed,
}

impl TournamentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Pending => "pending",
            TournamentStatus::Playing => "playing",
            TournamentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "playing" => TournamentStatus::Playing,
            "completed" => TournamentStatus::Completed,
            _ => TournamentStatus::Pending,
        }
    }
}

/// Round status; transitions are one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    Pending,
    Playing,
    Completed,
}

impl RoundStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RoundStatus::Pending => "pending",
            RoundStatus::Playing => "playing",
            RoundStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "playing" => RoundStatus::Playing,
            "completed" => RoundStatus::Completed,
            _ => RoundStatus::Pending,
        }
    }
}

/// How a round's lobbies are drawn from the active participant list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LobbyAssignment {
    /// Uniform Fisher-Yates shuffle
    Random,
    /// Stable sort by cumulative score descending; top scorers cluster in
    /// early lobbies
    Seeded,
}

/// Advancement policy for one phase, tagged by phase type.
///
/// Validated at tournament creation, so an unknown or incomplete phase
/// configuration cannot reach the engine at resolution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhaseRules {
    /// Top `top` by score advance, the rest are eliminated
    Elimination { top: u32 },
    /// Same policy as elimination; the phase may span several rounds before
    /// the cut is applied each round
    Points {
        top: u32,
        total_rounds_in_phase: Option<u32>,
    },
    /// Reaching `points_to_activate` arms a participant; an armed first-place
    /// finish ends the tournament outright
    Checkmate { points_to_activate: i64 },
}

/// Configuration for one phase of a tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseConfig {
    /// Maximum participants per lobby
    pub lobby_size: u32,
    /// Lobby assignment strategy
    pub lobby_assignment: LobbyAssignment,
    /// Advancement policy
    #[serde(flatten)]
    pub rules: PhaseRules,
}

impl PhaseConfig {
    /// Number of rounds this phase occupies.
    pub fn rounds_in_phase(&self) -> u32 {
        match self.rules {
            PhaseRules::Points {
                total_rounds_in_phase: Some(n),
                ..
            } => n.max(1),
            _ => 1,
        }
    }
}

/// Input for creating a tournament.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TournamentConfig {
    pub name: String,
    pub organizer_id: i64,
    /// Entry fee debited from each participant on join
    pub entry_fee: i64,
    /// Host cut of the collected fees, in [0, 1]
    pub host_fee_percent: f64,
    /// Desired prize table; clamped to the actual pool at registration close
    pub prize_structure: PrizeTable,
    /// Phase list, ordered; one entry per phase
    pub phases: Vec<PhaseConfig>,
    /// Scheduled start of round 1
    pub start_time: DateTime<Utc>,
}

/// Tournament record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    pub id: TournamentId,
    pub organizer_id: i64,
    pub name: String,
    pub status: TournamentStatus,
    pub entry_fee: i64,
    pub host_fee_percent: f64,
    pub prize_structure: PrizeTable,
    /// Set once at registration close (round 1 activation)
    pub adjusted_prize_structure: Option<PrizeTable>,
    /// Set once at registration close
    pub actual_participants_count: Option<i32>,
    pub phases: Vec<PhaseConfig>,
    pub rounds_total: i32,
    pub created_at: DateTime<Utc>,
}

impl Tournament {
    /// Phase config for a phase index, if configured.
    pub fn phase(&self, index: usize) -> Option<&PhaseConfig> {
        self.phases.get(index)
    }
}

/// Round record. `config` is a snapshot of the phase config it executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub tournament_id: TournamentId,
    /// 1-based, dense across the tournament
    pub round_number: i32,
    /// Index into the tournament's phase list
    pub phase_index: i32,
    /// 1-based position within a multi-round phase
    pub round_in_phase: i32,
    pub status: RoundStatus,
    pub start_time: DateTime<Utc>,
    pub config: PhaseConfig,
}

/// Lobby record; membership is immutable after partitioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lobby {
    pub id: LobbyId,
    pub round_id: RoundId,
    pub participant_ids: Vec<ParticipantId>,
    pub fetched_result: bool,
}

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Pending,
    Resolved,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "resolved" => MatchStatus::Resolved,
            _ => MatchStatus::Pending,
        }
    }
}

/// Match record; exactly one per lobby.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub lobby_id: LobbyId,
    pub status: MatchStatus,
    pub external_match_id: Option<String>,
    pub region: Option<String>,
    /// Raw provider payload; null until fetched
    pub match_data: Option<serde_json::Value>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One participant's recorded result in one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub id: i64,
    pub match_id: MatchId,
    pub participant_id: ParticipantId,
    /// 1..N, unique within the match
    pub placement: i32,
    pub points: i64,
}

/// Participant record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub tournament_id: TournamentId,
    pub user_id: i64,
    /// Identifier used by the external result provider
    pub game_id: String,
    pub score_total: i64,
    pub eliminated: bool,
    pub checkmate_active: bool,
    pub paid: bool,
}

/// Raw result payload for one match, as delivered by the fetch worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResultPayload {
    pub external_match_id: Option<String>,
    pub results: Vec<ParticipantResult>,
}

/// One participant's entry in a raw result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantResult {
    /// Provider-side participant identifier
    pub game_id: String,
    pub placement: i32,
    pub points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elimination_phase(top: u32) -> PhaseConfig {
        PhaseConfig {
            lobby_size: 8,
            lobby_assignment: LobbyAssignment::Random,
            rules: PhaseRules::Elimination { top },
        }
    }

    #[test]
    fn test_phase_rules_serialize_tagged() {
        let config = elimination_phase(4);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["type"], "elimination");
        assert_eq!(value["top"], 4);
        assert_eq!(value["lobby_size"], 8);
        assert_eq!(value["lobby_assignment"], "random");
    }

    #[test]
    fn test_phase_rules_deserialize_checkmate() {
        let json = r#"{
            "lobby_size": 4,
            "lobby_assignment": "seeded",
            "type": "checkmate",
            "points_to_activate": 50
        }"#;
        let config: PhaseConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.lobby_assignment, LobbyAssignment::Seeded);
        assert_eq!(
            config.rules,
            PhaseRules::Checkmate {
                points_to_activate: 50
            }
        );
    }

    #[test]
    fn test_unknown_phase_type_is_rejected() {
        let json = r#"{
            "lobby_size": 4,
            "lobby_assignment": "random",
            "type": "royal_rumble"
        }"#;
        assert!(serde_json::from_str::<PhaseConfig>(json).is_err());
    }

    #[test]
    fn test_rounds_in_phase() {
        assert_eq!(elimination_phase(4).rounds_in_phase(), 1);

        let multi = PhaseConfig {
            lobby_size: 8,
            lobby_assignment: LobbyAssignment::Seeded,
            rules: PhaseRules::Points {
                top: 16,
                total_rounds_in_phase: Some(3),
            },
        };
        assert_eq!(multi.rounds_in_phase(), 3);

        let single = PhaseConfig {
            lobby_size: 8,
            lobby_assignment: LobbyAssignment::Seeded,
            rules: PhaseRules::Points {
                top: 16,
                total_rounds_in_phase: None,
            },
        };
        assert_eq!(single.rounds_in_phase(), 1);
    }

    #[test]
    fn test_prize_table_json_keys_are_ranks() {
        let mut table = PrizeTable::new();
        table.insert(1, 600);
        table.insert(2, 300);
        table.insert(10, 50);

        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["1"], 600);
        assert_eq!(value["10"], 50);

        let back: PrizeTable = serde_json::from_value(value).unwrap();
        // BTreeMap iterates ranks in ascending numeric order
        let ranks: Vec<u32> = back.keys().copied().collect();
        assert_eq!(ranks, vec![1, 2, 10]);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            TournamentStatus::Pending,
            TournamentStatus::Playing,
            TournamentStatus::Completed,
        ] {
            assert_eq!(TournamentStatus::parse(status.as_str()), status);
        }
        for status in [RoundStatus::Pending, RoundStatus::Playing, RoundStatus::Completed] {
            assert_eq!(RoundStatus::parse(status.as_str()), status);
        }
    }
}
