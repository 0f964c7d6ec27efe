//! Shared row loading and mapping for the engine's managers.
//!
//! Every loader takes the caller's transaction: core operations read and
//! write through one unit of work so partial state is never observable.

use super::{
    errors::{EngineError, EngineResult},
    models::{
        Lobby, LobbyId, Match, MatchId, MatchStatus, Participant, PhaseConfig, PrizeTable, Round,
        RoundId, RoundStatus, Tournament, TournamentId, TournamentStatus,
    },
};
use sqlx::postgres::PgRow;
use sqlx::{Postgres, Row, Transaction};

pub(crate) fn tournament_from_row(row: &PgRow) -> EngineResult<Tournament> {
    let phases: Vec<PhaseConfig> = serde_json::from_value(row.get("phase_configs"))?;
    let prize_structure: PrizeTable = serde_json::from_value(row.get("prize_structure"))?;
    let adjusted_prize_structure: Option<PrizeTable> = row
        .get::<Option<serde_json::Value>, _>("adjusted_prize_structure")
        .map(serde_json::from_value)
        .transpose()?;

    Ok(Tournament {
        id: row.get("id"),
        organizer_id: row.get("organizer_id"),
        name: row.get("name"),
        status: TournamentStatus::parse(&row.get::<String, _>("status")),
        entry_fee: row.get("entry_fee"),
        host_fee_percent: row.get("host_fee_percent"),
        prize_structure,
        adjusted_prize_structure,
        actual_participants_count: row.get("actual_participants_count"),
        phases,
        rounds_total: row.get("rounds_total"),
        created_at: row.get::<chrono::NaiveDateTime, _>("created_at").and_utc(),
    })
}

pub(crate) fn round_from_row(row: &PgRow) -> EngineResult<Round> {
    let config: PhaseConfig = serde_json::from_value(row.get("config"))?;

    Ok(Round {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        round_number: row.get("round_number"),
        phase_index: row.get("phase_index"),
        round_in_phase: row.get("round_in_phase"),
        status: RoundStatus::parse(&row.get::<String, _>("status")),
        start_time: row.get::<chrono::NaiveDateTime, _>("start_time").and_utc(),
        config,
    })
}

pub(crate) fn participant_from_row(row: &PgRow) -> Participant {
    Participant {
        id: row.get("id"),
        tournament_id: row.get("tournament_id"),
        user_id: row.get("user_id"),
        game_id: row.get("game_id"),
        score_total: row.get("score_total"),
        eliminated: row.get("eliminated"),
        checkmate_active: row.get("checkmate_active"),
        paid: row.get("paid"),
    }
}

pub(crate) fn match_from_row(row: &PgRow) -> Match {
    Match {
        id: row.get("id"),
        lobby_id: row.get("lobby_id"),
        status: MatchStatus::parse(&row.get::<String, _>("status")),
        external_match_id: row.get("external_match_id"),
        region: row.get("region"),
        match_data: row.get("match_data"),
        fetched_at: row
            .get::<Option<chrono::NaiveDateTime>, _>("fetched_at")
            .map(|dt| dt.and_utc()),
    }
}

const TOURNAMENT_COLUMNS: &str = "id, organizer_id, name, status, entry_fee, host_fee_percent, \
     prize_structure, adjusted_prize_structure, actual_participants_count, phase_configs, \
     rounds_total, created_at";

pub(crate) async fn load_tournament(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> EngineResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::TournamentNotFound(tournament_id))?;

    tournament_from_row(&row)
}

/// Load a tournament with a row lock, serializing concurrent transitions.
pub(crate) async fn load_tournament_for_update(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> EngineResult<Tournament> {
    let row = sqlx::query(&format!(
        "SELECT {TOURNAMENT_COLUMNS} FROM tournaments WHERE id = $1 FOR UPDATE"
    ))
    .bind(tournament_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::TournamentNotFound(tournament_id))?;

    tournament_from_row(&row)
}

const ROUND_COLUMNS: &str =
    "id, tournament_id, round_number, phase_index, round_in_phase, status, start_time, config";

/// Load a round with a row lock.
///
/// Both triggers (activation and result ingestion) lock the round row first,
/// so two deliveries can never both conclude they are the last one.
pub(crate) async fn load_round_for_update(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
) -> EngineResult<Round> {
    let row = sqlx::query(&format!(
        "SELECT {ROUND_COLUMNS} FROM rounds WHERE id = $1 FOR UPDATE"
    ))
    .bind(round_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::RoundNotFound(round_id))?;

    round_from_row(&row)
}

pub(crate) async fn load_match(
    tx: &mut Transaction<'_, Postgres>,
    match_id: MatchId,
) -> EngineResult<Match> {
    let row = sqlx::query(
        "SELECT id, lobby_id, status, external_match_id, region, match_data, fetched_at
         FROM matches WHERE id = $1",
    )
    .bind(match_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::MatchNotFound(match_id))?;

    Ok(match_from_row(&row))
}

pub(crate) async fn load_lobby(
    tx: &mut Transaction<'_, Postgres>,
    lobby_id: LobbyId,
) -> EngineResult<Lobby> {
    let row = sqlx::query(
        "SELECT id, round_id, participant_ids, fetched_result FROM lobbies WHERE id = $1",
    )
    .bind(lobby_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or(EngineError::LobbyNotFound(lobby_id))?;

    Ok(Lobby {
        id: row.get("id"),
        round_id: row.get("round_id"),
        participant_ids: row.get("participant_ids"),
        fetched_result: row.get("fetched_result"),
    })
}

/// Active (non-eliminated) participants, sorted by cumulative score
/// descending with id as the stable tiebreak.
pub(crate) async fn active_participants(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
) -> EngineResult<Vec<Participant>> {
    let rows = sqlx::query(
        "SELECT id, tournament_id, user_id, game_id, score_total, eliminated, checkmate_active, paid
         FROM participants
         WHERE tournament_id = $1 AND eliminated = FALSE
         ORDER BY score_total DESC, id ASC",
    )
    .bind(tournament_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows.iter().map(participant_from_row).collect())
}

/// Resolve a participant by the external provider's identifier.
pub(crate) async fn find_participant_by_game_id(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    game_id: &str,
) -> EngineResult<Option<Participant>> {
    let row = sqlx::query(
        "SELECT id, tournament_id, user_id, game_id, score_total, eliminated, checkmate_active, paid
         FROM participants
         WHERE tournament_id = $1 AND game_id = $2",
    )
    .bind(tournament_id)
    .bind(game_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row.as_ref().map(participant_from_row))
}

/// Whether every match of the round has fetched data.
pub(crate) async fn round_fully_fetched(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
) -> EngineResult<bool> {
    let row = sqlx::query(
        "SELECT COUNT(*) FILTER (WHERE m.match_data IS NULL) AS missing
         FROM lobbies l
         JOIN matches m ON m.lobby_id = l.id
         WHERE l.round_id = $1",
    )
    .bind(round_id)
    .fetch_one(&mut **tx)
    .await?;

    let missing: i64 = row.get("missing");
    Ok(missing == 0)
}

pub(crate) async fn set_round_status(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
    status: RoundStatus,
) -> EngineResult<()> {
    sqlx::query("UPDATE rounds SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(round_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub(crate) async fn set_tournament_status(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    status: TournamentStatus,
) -> EngineResult<()> {
    sqlx::query("UPDATE tournaments SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(tournament_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Insert a round row and return it.
pub(crate) async fn insert_round(
    tx: &mut Transaction<'_, Postgres>,
    tournament_id: TournamentId,
    round_number: i32,
    phase_index: i32,
    round_in_phase: i32,
    start_time: chrono::DateTime<chrono::Utc>,
    config: &PhaseConfig,
) -> EngineResult<Round> {
    let config_json = serde_json::to_value(config)?;

    let row = sqlx::query(
        r#"
        INSERT INTO rounds (tournament_id, round_number, phase_index, round_in_phase, status, start_time, config)
        VALUES ($1, $2, $3, $4, 'pending', $5, $6)
        RETURNING id
        "#,
    )
    .bind(tournament_id)
    .bind(round_number)
    .bind(phase_index)
    .bind(round_in_phase)
    .bind(start_time.naive_utc())
    .bind(config_json)
    .fetch_one(&mut **tx)
    .await?;

    Ok(Round {
        id: row.get("id"),
        tournament_id,
        round_number,
        phase_index,
        round_in_phase,
        status: RoundStatus::Pending,
        start_time,
        config: config.clone(),
    })
}
