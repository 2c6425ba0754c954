use std::fmt;

use serde::Serialize;

use crate::error::{SeatingError, SeatingResult};

pub const MAX_ROWS: u32 = 20;
pub const MAX_COLS: u32 = 12;
pub const DEFAULT_ROWS: u32 = 8;
pub const DEFAULT_COLS: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Branch {
    #[serde(rename = "COMPUTER SCIENCE AND DESIGN")]
    ComputerScienceAndDesign,
    #[serde(rename = "ARTIFICIAL INTELLIGENCE AND DATA SCIENCE")]
    ArtificialIntelligenceAndDataScience,
    #[serde(rename = "CIVIL")]
    Civil,
    #[serde(rename = "MECHANICS")]
    Mechanics,
    #[serde(rename = "MECHATRONICS")]
    Mechatronics,
    #[serde(rename = "COMPUTER ENGINEERING")]
    ComputerEngineering,
}

impl Branch {
    pub const ALL: [Branch; 6] = [
        Branch::ComputerScienceAndDesign,
        Branch::ArtificialIntelligenceAndDataScience,
        Branch::Civil,
        Branch::Mechanics,
        Branch::Mechatronics,
        Branch::ComputerEngineering,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Branch::ComputerScienceAndDesign => "COMPUTER SCIENCE AND DESIGN",
            Branch::ArtificialIntelligenceAndDataScience => {
                "ARTIFICIAL INTELLIGENCE AND DATA SCIENCE"
            }
            Branch::Civil => "CIVIL",
            Branch::Mechanics => "MECHANICS",
            Branch::Mechatronics => "MECHATRONICS",
            Branch::ComputerEngineering => "COMPUTER ENGINEERING",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        Branch::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(t))
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Faculty,
    Student,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Faculty => "faculty",
            Role::Student => "student",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "faculty" => Some(Role::Faculty),
            "student" => Some(Role::Student),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One grid cell. Occupied iff `student_roll_no` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: String,
    pub row: u32,
    pub col: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_roll_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_name: Option<String>,
}

impl Seat {
    fn empty(session_id: &str, row: u32, col: u32) -> Self {
        Seat {
            id: seat_id(session_id, row, col),
            row,
            col,
            student_roll_no: None,
            student_name: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.student_roll_no.is_none()
    }

    /// Uppercased, trimmed roll number used for matching.
    pub fn roll_key(&self) -> Option<String> {
        self.student_roll_no.as_deref().map(roll_key)
    }

    /// Blank `roll_no` clears the seat. The roll number is kept verbatim.
    pub(crate) fn assign(&mut self, roll_no: &str, name: Option<&str>) {
        if roll_no.trim().is_empty() {
            self.clear();
            return;
        }
        self.student_roll_no = Some(roll_no.to_string());
        self.student_name = name
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.to_string());
    }

    pub(crate) fn clear(&mut self) {
        self.student_roll_no = None;
        self.student_name = None;
    }
}

pub fn roll_key(roll_no: &str) -> String {
    roll_no.trim().to_uppercase()
}

pub fn seat_id(session_id: &str, row: u32, col: u32) -> String {
    format!("{}-r{}-c{}", session_id, row, col)
}

pub fn validate_dimensions(rows: i64, cols: i64) -> SeatingResult<(u32, u32)> {
    if !(1..=MAX_ROWS as i64).contains(&rows) {
        return Err(SeatingError::validation(
            "rows",
            format!("rows must be in 1..={}", MAX_ROWS),
        ));
    }
    if !(1..=MAX_COLS as i64).contains(&cols) {
        return Err(SeatingError::validation(
            "cols",
            format!("cols must be in 1..={}", MAX_COLS),
        ));
    }
    Ok((rows as u32, cols as u32))
}

/// Builds `rows * cols` empty seats in row-major order.
pub fn create_grid(rows: i64, cols: i64, session_id: &str) -> SeatingResult<Vec<Seat>> {
    let (rows, cols) = validate_dimensions(rows, cols)?;
    let mut seats = Vec::with_capacity((rows * cols) as usize);
    for r in 0..rows {
        for c in 0..cols {
            seats.push(Seat::empty(session_id, r, c));
        }
    }
    Ok(seats)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSession {
    pub id: String,
    pub subject: String,
    pub date: String,
    pub time: String,
    pub branch: Branch,
    pub room: String,
    pub rows: u32,
    pub cols: u32,
    pub seats: Vec<Seat>,
    pub created_by: String,
    pub created_at: String,
}

impl ExamSession {
    fn index_of(&self, row: i64, col: i64) -> Option<usize> {
        if row < 0 || col < 0 || row >= self.rows as i64 || col >= self.cols as i64 {
            return None;
        }
        Some((row * self.cols as i64 + col) as usize)
    }

    fn index_of_seat_id(&self, seat_id: &str) -> Option<usize> {
        let rest = seat_id.strip_prefix(self.id.as_str())?.strip_prefix("-r")?;
        let (row, col) = rest.split_once("-c")?;
        let idx = self.index_of(row.parse().ok()?, col.parse().ok()?)?;
        // Guards against ids like "-r01-c1" that parse to the same cell.
        (self.seats.get(idx)?.id == seat_id).then_some(idx)
    }

    pub fn seat_at(&self, row: i64, col: i64) -> Option<&Seat> {
        self.index_of(row, col).and_then(|i| self.seats.get(i))
    }

    pub(crate) fn seat_at_mut(&mut self, row: i64, col: i64) -> Option<&mut Seat> {
        let idx = self.index_of(row, col)?;
        self.seats.get_mut(idx)
    }

    pub fn seat_by_id(&self, seat_id: &str) -> Option<&Seat> {
        self.index_of_seat_id(seat_id).and_then(|i| self.seats.get(i))
    }

    pub(crate) fn seat_by_id_mut(&mut self, seat_id: &str) -> Option<&mut Seat> {
        let idx = self.index_of_seat_id(seat_id)?;
        self.seats.get_mut(idx)
    }

    /// First seat other than `except_seat_id` holding `roll_no` (case-insensitive).
    pub fn seat_holding_roll(&self, roll_no: &str, except_seat_id: &str) -> Option<&Seat> {
        let key = roll_key(roll_no);
        self.seats
            .iter()
            .filter(|s| s.id != except_seat_id)
            .find(|s| s.roll_key().as_deref() == Some(key.as_str()))
    }

    pub fn occupied_count(&self) -> usize {
        self.seats.iter().filter(|s| !s.is_empty()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roll_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
    pub created_at: String,
}
