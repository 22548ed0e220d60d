use crate::database::{DbError, TicketDb, UserDb};
use crate::model::Ticket;
use actix_identity::Identity;
use log::warn;

/// Everything a request knows about the signed-in user.
///
/// Built explicitly from the identity cookie and the store for each request.
/// Every login gets its own session id, so the ticket is scoped to one
/// browser and lives until the next booking or that session's logout.
pub struct SessionContext {
    pub session_id: u64,
    pub username: String,
    pub ticket: Option<Ticket>,
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
        if db.get_user(username)?.is_none() {
            warn!("Identity cookie names unknown user: {}", username);
            id.forget();
            return Ok(None);
        }
        Ok(Some(SessionContext {
            session_id,
            username: username.to_owned(),
            ticket: db.current_ticket(session_id)?,
        }))
    }

    pub fn begin(id: &Identity, db: &sled::Db, username: &str) -> Result<(), DbError> {
        let session_id = db.new_session_id()?;
        id.remember(format!("{}:{}", session_id, username));
        Ok(())
    }

    pub fn end(id: &Identity, db: &sled::Db) -> Result<(), DbError> {
        if let Some((session_id, _)) = id.identity().as_deref().and_then(parse_identity) {
            db.clear_ticket(session_id)?;
        }
        id.forget();
        Ok(())
    }

    pub fn attach_ticket(&mut self, db: &sled::Db, ticket: Ticket) -> Result<(), DbError> {
        db.store_ticket(self.session_id, &ticket)?;
        self.ticket = Some(ticket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_format() {
        assert_eq!(parse_identity("12:alice"), Some((12, "alice")));
        assert_eq!(parse_identity("3:a:b"), Some((3, "a:b")));
        assert_eq!(parse_identity("alice"), None);
        assert_eq!(parse_identity("x:alice"), None);
    }
}
