use rust_decimal::Decimal;
use thiserror::Error;

use crate::users::{UserProfile, GENDER_FEMALE, GENDER_MALE};

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("profile field must be positive: {0}")]
    IncompleteProfile(&'static str),

    #[error("unknown gender code: {0}")]
    InvalidProfile(i16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendedIntake {
    pub kcal: Decimal,
    pub carbs: Decimal,
    pub protein: Decimal,
    pub fat: Decimal,
}

/// Daily intake target derived from the user's profile. Pure: the same
/// profile always yields the same target.
pub trait RecommendationEngine: Send + Sync {
    fn compute(&self, profile: &UserProfile) -> Result<RecommendedIntake, ComputeError>;
}

/// Mifflin-St Jeor BMR scaled by a light-activity factor. The kcal budget is
/// split 50/30/20 across carbs/protein/fat at 4/4/9 kcal per gram.
pub struct MifflinStJeor;

impl RecommendationEngine for MifflinStJeor {
    fn compute(&self, profile: &UserProfile) -> Result<RecommendedIntake, ComputeError> {
        if profile.age <= 0 {
            return Err(ComputeError::IncompleteProfile("age"));
        }
        if profile.height <= Decimal::ZERO {
            return Err(ComputeError::IncompleteProfile("height"));
        }
        if profile.weight <= Decimal::ZERO {
            return Err(ComputeError::IncompleteProfile("weight"));
        }
        let offset = match profile.gender {
            GENDER_MALE => Decimal::from(5),
            GENDER_FEMALE => Decimal::from(-161),
            other => return Err(ComputeError::InvalidProfile(other)),
        };

        let bmr = Decimal::from(10) * profile.weight
            + Decimal::new(625, 2) * profile.height
            - Decimal::from(5) * Decimal::from(profile.age)
            + offset;
        let kcal = bmr * Decimal::new(1375, 3);

        Ok(RecommendedIntake {
            kcal,
            carbs: kcal * Decimal::new(50, 2) / Decimal::from(4),
            protein: kcal * Decimal::new(30, 2) / Decimal::from(4),
            fat: kcal * Decimal::new(20, 2) / Decimal::from(9),
        })
    }
}
