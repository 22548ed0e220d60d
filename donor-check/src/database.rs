use crate::model::*;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::Transactional;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("corrupt index: {0}")]
    Corrupt(&'static str),
}

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64, DbError> {
    id.as_ref()
        .try_into()
        .map(u64::from_le_bytes)
        .map_err(|_| DbError::Corrupt("user id is not 8 bytes"))
}

pub trait UserDb {
    type Error;
    /// Returns `None` without writing anything if the username is taken.
    fn add_user(&self, user: &User) -> Result<Option<u64>, Self::Error>;
    fn get_user(&self, id: u64) -> Result<Option<User>, Self::Error>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, Self::Error>;
    /// Returns `false` if there is no such user.
    fn update_password(&self, username: &str, password_hash: String) -> Result<bool, Self::Error>;
}

/// Reports belong to one login session, not to the account.
pub trait ReportDb {
    type Error;
    fn new_session_id(&self) -> Result<u64, Self::Error>;
    fn store_report(&self, session_id: u64, report: &Report) -> Result<(), Self::Error>;
    fn current_report(&self, session_id: u64) -> Result<Option<Report>, Self::Error>;
    fn clear_report(&self, session_id: u64) -> Result<(), Self::Error>;
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"USERS_USERNAME";
const SESSION_REPORTS: &[u8] = b"session_reports";

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> Result<Option<u64>, DbError> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = self.generate_id()?;
        let key = serialize_id(id);
        let encoded = bincode::serialize(user)?;
        let result = (&users, &users_username).transaction(
            |(users, users_username)| -> ConflictableTransactionResult<(), ()> {
                users.insert(&key[..], encoded.as_slice())?;
                if users_username
                    .insert(user.username.as_bytes(), &key[..])?
                    .is_some()
                {
                    return sled::transaction::abort(());
                }
                Ok(())
            },
        );
        match result {
            Ok(()) => Ok(Some(id)),
            Err(TransactionError::Abort(())) => Ok(None),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn get_user(&self, id: u64) -> Result<Option<User>, DbError> {
        let users = self.open_tree(USERS)?;
        Ok(match users.get(serialize_id(id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<(u64, User)>, DbError> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = match users_username.get(username.as_bytes())? {
            Some(id) => deserialize_id(id)?,
            None => return Ok(None),
        };
        let user = self
            .get_user(id)?
            .ok_or(DbError::Corrupt("username index points to a missing user"))?;
        Ok(Some((id, user)))
    }

    fn update_password(&self, username: &str, password_hash: String) -> Result<bool, DbError> {
        let (id, mut user) = match self.get_user_by_username(username)? {
            Some(found) => found,
            None => return Ok(false),
        };
        user.password_hash = password_hash;
        let users = self.open_tree(USERS)?;
        users.insert(serialize_id(id), bincode::serialize(&user)?)?;
        Ok(true)
    }
}

impl ReportDb for sled::Db {
    type Error = DbError;

    fn new_session_id(&self) -> Result<u64, DbError> {
        Ok(self.generate_id()?)
    }

    fn store_report(&self, session_id: u64, report: &Report) -> Result<(), DbError> {
        let reports = self.open_tree(SESSION_REPORTS)?;
        reports.insert(serialize_id(session_id), bincode::serialize(report)?)?;
        Ok(())
    }

    fn current_report(&self, session_id: u64) -> Result<Option<Report>, DbError> {
        let reports = self.open_tree(SESSION_REPORTS)?;
        Ok(match reports.get(serialize_id(session_id))? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn clear_report(&self, session_id: u64) -> Result<(), DbError> {
        let reports = self.open_tree(SESSION_REPORTS)?;
        reports.remove(serialize_id(session_id))?;
        Ok(())
    }
}
