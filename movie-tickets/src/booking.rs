use crate::catalog::{self, Movie, SEAT_LAYOUT};
use crate::database::{DbError, InsertOutcome, SeatDb};
use crate::model::{SeatBooking, Ticket};
use log::{info, warn};
use thiserror::Error;

const TIMESTAMP_FORMAT: &str = "%d %b %Y | %I:%M %p";
const PAID: &str = "PAID";

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Unknown movie: {0}")]
    UnknownMovie(String),
    #[error("Select at least one seat")]
    NoSeats,
    #[error("Unknown seat: {0}")]
    UnknownSeat(String),
    #[error("Unknown show time: {0}")]
    UnknownShowTime(String),
    #[error("Seat already booked!")]
    AlreadyBooked(String),
    #[error(transparent)]
    Database(#[from] DbError),
}

#[derive(Debug, Default)]
pub struct BookingRequest {
    pub seats: Vec<String>,
    pub show_time: String,
    pub payment: String,
}

pub struct SeatMap {
    pub available: Vec<&'static str>,
    pub booked: Vec<String>,
}

pub fn seat_map(db: &sled::Db, movie: &Movie) -> Result<SeatMap, DbError> {
    let booked = db
        .booked_seats(movie.key)?
        .into_iter()
        .map(|booking| booking.seat)
        .collect::<Vec<_>>();
    let available = SEAT_LAYOUT
        .iter()
        .copied()
        .filter(|seat| !booked.iter().any(|taken| taken == seat))
        .collect();
    Ok(SeatMap { available, booked })
}

/// Books every requested seat or none of them.
pub fn book(
    db: &sled::Db,
    movie_key: &str,
    request: &BookingRequest,
    username: &str,
) -> Result<Ticket, BookingError> {
    let movie = catalog::find_movie(movie_key)
        .ok_or_else(|| BookingError::UnknownMovie(movie_key.to_owned()))?;
    if !movie.offers_show_time(&request.show_time) {
        return Err(BookingError::UnknownShowTime(request.show_time.clone()));
    }
    let seats = requested_seats(&request.seats)?;

    let booking_id = db.next_booking_id()?;
    let rows = seats
        .iter()
        .map(|seat| SeatBooking {
            booking_id,
            movie: movie.key.to_owned(),
            seat: seat.clone(),
            username: username.to_owned(),
        })
        .collect::<Vec<_>>();
    if let InsertOutcome::AlreadyBooked(seat) = db.insert_bookings(&rows)? {
        warn!("{} tried to book taken seat {} for {}", username, seat, movie.key);
        return Err(BookingError::AlreadyBooked(seat));
    }

    let amount = movie.price_for(seats.len());
    info!(
        "booking {}: {} booked {:?} for {} ({})",
        booking_id, username, seats, movie.key, amount
    );
    Ok(Ticket {
        booking_id,
        username: username.to_owned(),
        movie: movie.key.to_owned(),
        seats,
        amount,
        booked_at: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        show_time: request.show_time.clone(),
        screen: movie.screen.to_owned(),
        payment: request.payment.clone(),
        status: PAID.to_owned(),
    })
}

fn requested_seats(seats: &[String]) -> Result<Vec<String>, BookingError> {
    let mut unique: Vec<String> = Vec::with_capacity(seats.len());
    for seat in seats {
        if !catalog::is_seat(seat) {
            return Err(BookingError::UnknownSeat(seat.clone()));
        }
        if !unique.contains(seat) {
            unique.push(seat.clone());
        }
    }
    if unique.is_empty() {
        return Err(BookingError::NoSeats);
    }
    Ok(unique)
}
