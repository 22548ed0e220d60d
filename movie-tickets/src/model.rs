use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// One booked seat. Every seat of a single booking shares its `booking_id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SeatBooking {
    pub booking_id: u64,
    pub movie: String,
    pub seat: String,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ticket {
    pub booking_id: u64,
    pub username: String,
    pub movie: String,
    pub seats: Vec<String>,
    pub amount: u32,
    pub booked_at: String,
    pub show_time: String,
    pub screen: String,
    pub payment: String,
    pub status: String,
}
