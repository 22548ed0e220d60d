use crate::database::DbError;
use crate::eligibility::{ModelError, UnknownLabel};
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::{debug, error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Database error")]
    Database(#[from] DbError),
    #[error("Template error")]
    Template(#[from] tera::Error),
    #[error("Verification error")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("Prediction error")]
    Model(#[from] ModelError),
    #[error("Document error")]
    Pdf(#[from] lopdf::Error),
    #[error("File error")]
    Io(#[from] std::io::Error),
    #[error("Worker error")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl From<UnknownLabel> for AppError {
    fn from(err: UnknownLabel) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
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
