use serde::Serialize;

use crate::error::SeatingResult;
use crate::model::{roll_key, Branch, ExamSession, Seat};
use crate::repo::SessionRepository;

/// Session details shown to a student; owner is omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub subject: String,
    pub date: String,
    pub time: String,
    pub branch: Branch,
    pub room: String,
    pub rows: u32,
    pub cols: u32,
    pub seats: Vec<Seat>,
}

impl From<ExamSession> for SessionSummary {
    fn from(s: ExamSession) -> Self {
        SessionSummary {
            id: s.id,
            subject: s.subject,
            date: s.date,
            time: s.time,
            branch: s.branch,
            room: s.room,
            rows: s.rows,
            cols: s.cols,
            seats: s.seats,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatMatch {
    pub session: SessionSummary,
    pub seat: Seat,
}

/// Every seat in every session assigned to `roll_no` (trimmed, case-insensitive).
/// No match is an empty list.
pub fn find_all_seats_for_roll(
    repo: &SessionRepository,
    roll_no: &str,
) -> SeatingResult<Vec<SeatMatch>> {
    let key = roll_key(roll_no);
    if key.is_empty() {
        return Ok(Vec::new());
    }
    Ok(repo
        .store()
        .seats_for_roll(&key)?
        .into_iter()
        .map(|(session, seat)| SeatMatch {
            session: session.into(),
            seat,
        })
        .collect())
}
