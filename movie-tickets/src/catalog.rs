use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Movie {
    pub key: &'static str,
    pub price: u32,
    pub screen: &'static str,
    pub show_times: [&'static str; 3],
}

impl Movie {
    pub fn offers_show_time(&self, show_time: &str) -> bool {
        self.show_times.contains(&show_time)
    }

    pub fn price_for(&self, seats: usize) -> u32 {
        self.price * seats as u32
    }
}

pub const MOVIES: [Movie; 3] = [
    Movie {
        key: "Avengers",
        price: 200,
        screen: "Screen 1",
        show_times: ["10:00 AM", "2:00 PM", "6:00 PM"],
    },
    Movie {
        key: "Batman",
        price: 180,
        screen: "Screen 2",
        show_times: ["11:00 AM", "3:00 PM", "7:00 PM"],
    },
    Movie {
        key: "Jawan",
        price: 220,
        screen: "Screen 3",
        show_times: ["9:30 AM", "1:30 PM", "5:30 PM"],
    },
];

/// Seats of every screening, in display order.
pub const SEAT_LAYOUT: [&str; 24] = [
    "A1", "A2", "A3", "A4", "A5", //
    "B1", "B2", "B3", "B4", "B5", //
    "C1", "C2", "C3", "C4", "C5", //
    "D1", "D2", "D3", "D4", "D5", //
    "E1", "E2", "E3", "E4",
];

pub fn find_movie(key: &str) -> Option<&'static Movie> {
    MOVIES.iter().find(|movie| movie.key == key)
}

pub fn is_seat(label: &str) -> bool {
    SEAT_LAYOUT.contains(&label)
}
