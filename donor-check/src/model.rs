use crate::eligibility::Eligibility;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct User {
    pub username: String,
    pub password_hash: String,
}

/// The latest prediction of a signed-in user. Replaced by every submission.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub username: String,
    pub age: u32,
    pub weight: u32,
    pub blood_group: String,
    pub gender: String,
    pub months: u32,
    pub total: u32,
    pub eligibility: Eligibility,
    pub headline: String,
    pub date: String,
}
