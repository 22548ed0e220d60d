use crate::booking::BookingError;
use crate::database::DbError;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),

    #[error("Database error")]
    Database(#[from] DbError),
    #[error("Template error")]
    Template(#[from] tera::Error),
    #[error("Verification error")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("Document error")]
    Pdf(#[from] lopdf::Error),
    #[error("File error")]
    Io(#[from] std::io::Error),
    #[error("Worker error")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            debug!("{:?}", self);
            error!("{}", self);
        }
        HttpResponse::build(status)
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::UnknownMovie(_) => AppError::NotFound(message),
            BookingError::NoSeats | BookingError::UnknownSeat(_) | BookingError::UnknownShowTime(_) => {
                AppError::BadRequest(message)
            }
            BookingError::AlreadyBooked(_) => AppError::Conflict(message),
            BookingError::Database(err) => AppError::Database(err),
        }
    }
}
