use tracing::info;

use crate::accounts::{Accounts, SignupRequest};
use crate::error::{SeatingError, SeatingResult};
use crate::model::Role;
use crate::repo::{SessionDraft, SessionRepository};

/// Seeds one faculty, one student and two sessions. A store that already has
/// the demo faculty is left untouched.
pub fn seed(repo: &SessionRepository, accounts: &Accounts) -> SeatingResult<()> {
    let faculty = match accounts.signup(
        Role::Faculty,
        SignupRequest {
            username: "faculty".into(),
            password: "password".into(),
            name: "Dr. Admin".into(),
            ..SignupRequest::default()
        },
    ) {
        Ok(auth) => auth.user,
        Err(SeatingError::DuplicateUser { .. }) => {
            info!("demo data already present");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    match accounts.signup(
        Role::Student,
        SignupRequest {
            username: "student".into(),
            password: "password".into(),
            name: "John Doe".into(),
            roll_no: Some("CSD-001".into()),
            branch: Some("COMPUTER SCIENCE AND DESIGN".into()),
        },
    ) {
        Ok(_) | Err(SeatingError::DuplicateUser { .. }) => {}
        Err(e) => return Err(e),
    }

    for (subject, date, time, branch, room) in [
        (
            "Data Structures",
            "2024-05-10",
            "10:00",
            "COMPUTER SCIENCE AND DESIGN",
            "Hall 101",
        ),
        ("Structural Engineering", "2024-05-12", "14:00", "CIVIL", "Hall 202"),
    ] {
        repo.create(
            SessionDraft {
                subject: subject.into(),
                date: date.into(),
                time: time.into(),
                branch: branch.into(),
                room: room.into(),
                rows: Some(8),
                cols: Some(6),
            },
            &faculty.id,
        )?;
    }

    info!("demo data seeded");
    Ok(())
}
