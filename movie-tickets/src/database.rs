use crate::model::*;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}

pub trait UserDb {
    type Error;
    /// Returns `false` without writing anything if the username is taken.
    fn add_user(&self, user: &User) -> Result<bool, Self::Error>;
    fn get_user(&self, username: &str) -> Result<Option<User>, Self::Error>;
}

#[derive(Debug, PartialEq)]
pub enum InsertOutcome {
    Inserted,
    /// Nothing was written; carries the first seat found to be taken.
    AlreadyBooked(String),
}

pub trait SeatDb {
    type Error;
    fn next_booking_id(&self) -> Result<u64, Self::Error>;
    fn booked_seats(&self, movie: &str) -> Result<Vec<SeatBooking>, Self::Error>;
    fn insert_bookings(&self, bookings: &[SeatBooking]) -> Result<InsertOutcome, Self::Error>;
}

/// Tickets belong to one login session, not to the account.
pub trait TicketDb {
    type Error;
    fn new_session_id(&self) -> Result<u64, Self::Error>;
    fn store_ticket(&self, session_id: u64, ticket: &Ticket) -> Result<(), Self::Error>;
    fn current_ticket(&self, session_id: u64) -> Result<Option<Ticket>, Self::Error>;
    fn clear_ticket(&self, session_id: u64) -> Result<(), Self::Error>;
}

const USERS: &[u8] = b"users";
const SEATS: &[u8] = b"seats";
const SESSION_TICKETS: &[u8] = b"session_tickets";

fn movie_prefix(movie: &str) -> Vec<u8> {
    let mut prefix = movie.as_bytes().to_vec();
    prefix.push(0);
    prefix
}

fn seat_key(movie: &str, seat: &str) -> Vec<u8> {
    let mut key = movie_prefix(movie);
    key.extend_from_slice(seat.as_bytes());
    key
}

impl UserDb for sled::Db {
    type Error = DbError;

    fn add_user(&self, user: &User) -> Result<bool, DbError> {
        let users = self.open_tree(USERS)?;
        let encoded = bincode::serialize(user)?;
        let swapped =
            users.compare_and_swap(user.username.as_bytes(), None as Option<&[u8]>, Some(encoded))?;
        Ok(swapped.is_ok())
    }

    fn get_user(&self, username: &str) -> Result<Option<User>, DbError> {
        let users = self.open_tree(USERS)?;
        Ok(match users.get(username.as_bytes())? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }
}

impl SeatDb for sled::Db {
    type Error = DbError;

    fn next_booking_id(&self) -> Result<u64, DbError> {
        Ok(self.generate_id()?)
    }

    fn booked_seats(&self, movie: &str) -> Result<Vec<SeatBooking>, DbError> {
        let seats = self.open_tree(SEATS)?;
        seats
            .scan_prefix(movie_prefix(movie))
            .values()
            .map(|row| -> Result<SeatBooking, DbError> { Ok(bincode::deserialize(&row?)?) })
            .collect()
    }

    fn insert_bookings(&self, bookings: &[SeatBooking]) -> Result<InsertOutcome, DbError> {
        let seats = self.open_tree(SEATS)?;
        let rows = bookings
            .iter()
            .map(|booking| -> Result<(Vec<u8>, Vec<u8>), DbError> {
                Ok((
                    seat_key(&booking.movie, &booking.seat),
                    bincode::serialize(booking)?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let result = seats.transaction(|seats| -> ConflictableTransactionResult<(), String> {
            for (booking, (key, row)) in bookings.iter().zip(&rows) {
                if seats.insert(key.as_slice(), row.as_slice())?.is_some() {
                    return sled::transaction::abort(booking.seat.clone());
                }
            }
            Ok(())
        });
        match result {
            Ok(()) => Ok(InsertOutcome::Inserted),
            Err(TransactionError::Abort(seat)) => Ok(InsertOutcome::AlreadyBooked(seat)),
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }
}

impl TicketDb for sled::Db {
    type Error = DbError;

    fn new_session_id(&self) -> Result<u64, DbError> {
        Ok(self.generate_id()?)
    }

    fn store_ticket(&self, session_id: u64, ticket: &Ticket) -> Result<(), DbError> {
        let tickets = self.open_tree(SESSION_TICKETS)?;
        tickets.insert(session_id.to_be_bytes(), bincode::serialize(ticket)?)?;
        Ok(())
    }

    fn current_ticket(&self, session_id: u64) -> Result<Option<Ticket>, DbError> {
        let tickets = self.open_tree(SESSION_TICKETS)?;
        Ok(match tickets.get(session_id.to_be_bytes())? {
            Some(data) => Some(bincode::deserialize(&data)?),
            None => None,
        })
    }

    fn clear_ticket(&self, session_id: u64) -> Result<(), DbError> {
        let tickets = self.open_tree(SESSION_TICKETS)?;
        tickets.remove(session_id.to_be_bytes())?;
        Ok(())
    }
}
