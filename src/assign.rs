use serde::Serialize;
use tracing::debug;

use crate::error::{SeatingError, SeatingResult};
use crate::model::ExamSession;
use crate::repo::SessionRepository;

/// Whether one roll number may occupy several seats of the same session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RollPolicy {
    #[default]
    Lenient,
    Strict,
}

impl RollPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Some(RollPolicy::Lenient),
            "strict" => Some(RollPolicy::Strict),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RollPolicy::Lenient => "lenient",
            RollPolicy::Strict => "strict",
        }
    }
}

/// One reconciliation row, already in 0-based grid coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatUpdate {
    pub row: i64,
    pub col: i64,
    pub roll_no: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    OutOfGrid,
    DuplicateRoll,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUpdate {
    pub index: usize,
    pub row: i64,
    pub col: i64,
    pub reason: SkipReason,
}

#[derive(Debug, Clone)]
pub struct BulkOutcome {
    /// Seats actually written.
    pub updated: usize,
    pub skipped: Vec<SkippedUpdate>,
    pub session: ExamSession,
}

pub fn assign_seat(
    repo: &SessionRepository,
    policy: RollPolicy,
    session_id: &str,
    seat_id: &str,
    roll_no: &str,
    name: Option<&str>,
) -> SeatingResult<ExamSession> {
    let session = repo.modify(session_id, &mut |session| {
        if session.seat_by_id(seat_id).is_none() {
            return Err(SeatingError::SeatNotFound {
                session_id: session_id.to_string(),
                seat_id: seat_id.to_string(),
            });
        }

        if policy == RollPolicy::Strict && !roll_no.trim().is_empty() {
            if let Some(other) = session.seat_holding_roll(roll_no, seat_id) {
                return Err(SeatingError::DuplicateRoll {
                    roll_no: roll_no.to_string(),
                    seat_id: other.id.clone(),
                });
            }
        }

        if let Some(seat) = session.seat_by_id_mut(seat_id) {
            seat.assign(roll_no, name);
        }
        Ok(())
    })?;

    debug!(%session_id, %seat_id, cleared = roll_no.trim().is_empty(), "seat updated");
    Ok(session)
}

/// Overwrites occupancy coordinate by coordinate. Updates outside the grid are
/// skipped and not counted; the rest of the batch still applies.
pub fn bulk_assign(
    repo: &SessionRepository,
    policy: RollPolicy,
    session_id: &str,
    updates: &[SeatUpdate],
) -> SeatingResult<BulkOutcome> {
    let mut updated = 0usize;
    let mut skipped: Vec<SkippedUpdate> = Vec::new();

    let session = repo.modify(session_id, &mut |session| {
        updated = 0;
        skipped.clear();

        for (index, u) in updates.iter().enumerate() {
            let skip = |reason| SkippedUpdate {
                index,
                row: u.row,
                col: u.col,
                reason,
            };

            let Some(seat_id) = session.seat_at(u.row, u.col).map(|s| s.id.clone()) else {
                skipped.push(skip(SkipReason::OutOfGrid));
                continue;
            };

            if policy == RollPolicy::Strict
                && !u.roll_no.trim().is_empty()
                && session.seat_holding_roll(&u.roll_no, &seat_id).is_some()
            {
                skipped.push(skip(SkipReason::DuplicateRoll));
                continue;
            }

            if let Some(seat) = session.seat_at_mut(u.row, u.col) {
                seat.assign(&u.roll_no, u.name.as_deref());
                updated += 1;
            }
        }
        Ok(())
    })?;

    debug!(
        %session_id,
        updated,
        skipped = skipped.len(),
        "bulk seat reconciliation applied"
    );
    Ok(BulkOutcome {
        updated,
        skipped,
        session,
    })
}
