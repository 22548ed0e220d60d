use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const FEATURE_COUNT: usize = 6;
const MIN_AGE: u32 = 18;
const MIN_WEIGHT: u32 = 45;

/// `[age, weight, blood group, months since last donation, total donations, gender]`
pub type FeatureVector = [f64; FEATURE_COUNT];

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot read model artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed model artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model: {0}")]
    Invalid(String),
    #[error("classifier returned {0}, expected 0 or 1")]
    UnexpectedOutput(u8),
}

/// A pre-trained binary classifier over donor features.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<u8, ModelError>;
}

#[derive(Error, Debug)]
#[error("Unknown {kind}: {label}")]
pub struct UnknownLabel {
    kind: &'static str,
    label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BloodGroup {
    APositive,
    ANegative,
    BPositive,
    BNegative,
    AbPositive,
    AbNegative,
    OPositive,
    ONegative,
}

const BLOOD_GROUPS: [(&str, BloodGroup); 8] = [
    ("A+", BloodGroup::APositive),
    ("A-", BloodGroup::ANegative),
    ("B+", BloodGroup::BPositive),
    ("B-", BloodGroup::BNegative),
    ("AB+", BloodGroup::AbPositive),
    ("AB-", BloodGroup::AbNegative),
    ("O+", BloodGroup::OPositive),
    ("O-", BloodGroup::ONegative),
];

impl BloodGroup {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        BLOOD_GROUPS[self as usize].0
    }
}

impl FromStr for BloodGroup {
    type Err = UnknownLabel;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        BLOOD_GROUPS
            .iter()
            .find(|(name, _)| *name == label)
            .map(|(_, group)| *group)
            .ok_or_else(|| UnknownLabel {
                kind: "blood group",
                label: label.to_owned(),
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownLabel;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        match label {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            _ => Err(UnknownLabel {
                kind: "gender",
                label: label.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DonorProfile {
    pub age: u32,
    pub weight: u32,
    pub blood_group: BloodGroup,
    pub months_since_last_donation: u32,
    pub total_donations: u32,
    pub gender: Gender,
}

impl DonorProfile {
    pub fn features(&self) -> FeatureVector {
        [
            f64::from(self.age),
            f64::from(self.weight),
            f64::from(self.blood_group.code()),
            f64::from(self.months_since_last_donation),
            f64::from(self.total_donations),
            f64::from(self.gender.code()),
        ]
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    #[serde(rename = "Not Eligible")]
    NotEligible,
}

impl fmt::Display for Eligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Eligibility::Eligible => "Eligible",
            Eligibility::NotEligible => "Not Eligible",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Under age or under weight; the classifier was not consulted.
    AgeWeightRule,
    Model,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assessment {
    pub eligibility: Eligibility,
    pub decided_by: Decision,
}

impl Assessment {
    pub fn headline(&self) -> &'static str {
        match (self.eligibility, self.decided_by) {
            (Eligibility::Eligible, _) => "Eligible Donor",
            (Eligibility::NotEligible, Decision::Model) => "Not Eligible Right Now",
            (Eligibility::NotEligible, Decision::AgeWeightRule) => "Not Eligible",
        }
    }
}

pub fn assess(profile: &DonorProfile, model: &dyn Classifier) -> Result<Assessment, ModelError> {
    if profile.age < MIN_AGE || profile.weight < MIN_WEIGHT {
        return Ok(Assessment {
            eligibility: Eligibility::NotEligible,
            decided_by: Decision::AgeWeightRule,
        });
    }
    let eligibility = match model.predict(&profile.features())? {
        0 => Eligibility::NotEligible,
        1 => Eligibility::Eligible,
        other => return Err(ModelError::UnexpectedOutput(other)),
    };
    Ok(Assessment {
        eligibility,
        decided_by: Decision::Model,
    })
}
