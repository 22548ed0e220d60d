use crate::database::{DbError, ReportDb, UserDb};
use crate::model::Report;
use actix_identity::Identity;
use log::warn;

/// The signed-in user and the report of this login session, resolved per
/// request.
pub struct SessionContext {
    pub session_id: u64,
    pub user_id: u64,
    pub username: String,
    pub report: Option<Report>,
}

/// The identity cookie holds `<session id>:<username>`.
fn parse_identity(identity: &str) -> Option<(u64, &str)> {
    let (session_id, username) = identity.split_once(':')?;
    Some((session_id.parse().ok()?, username))
}

impl SessionContext {
    /// Returns `None` for anonymous requests.
    pub fn resolve(id: &Identity, db: &sled::Db) -> Result<Option<Self>, DbError> {
        let identity = match id.identity() {
            Some(identity) => identity,
            None => return Ok(None),
        };
        let (session_id, username) = match parse_identity(&identity) {
            Some(parsed) => parsed,
            None => {
                warn!("Malformed identity cookie: {}", identity);
                id.forget();
                return Ok(None);
            }
        };
        let user_id = match db.get_user_by_username(username)? {
            Some((user_id, _)) => user_id,
            None => {
                warn!("Identity cookie names unknown user: {}", username);
                id.forget();
                return Ok(None);
            }
        };
        Ok(Some(SessionContext {
            session_id,
            user_id,
            username: username.to_owned(),
            report: db.current_report(session_id)?,
        }))
    }

    pub fn begin(id: &Identity, db: &sled::Db, username: &str) -> Result<(), DbError> {
        let session_id = db.new_session_id()?;
        id.remember(format!("{}:{}", session_id, username));
        Ok(())
    }

    pub fn end(id: &Identity, db: &sled::Db) -> Result<(), DbError> {
        if let Some((session_id, _)) = id.identity().as_deref().and_then(parse_identity) {
            db.clear_report(session_id)?;
        }
        id.forget();
        Ok(())
    }

    pub fn attach_report(&mut self, db: &sled::Db, report: Report) -> Result<(), DbError> {
        db.store_report(self.session_id, &report)?;
        self.report = Some(report);
        Ok(())
    }
}
