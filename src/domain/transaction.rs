use crate::error::ReputationError;
use serde::{Deserialize, Serialize};

/// A 1-5 star rating.
///
/// The newtype makes out-of-range ratings unrepresentable: construction and
/// serde deserialization both go through [`Rating::new`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub fn new(stars: u8) -> Result<Self, ReputationError> {
        if (1..=5).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(ReputationError::MalformedTransaction(format!(
                "rating must be between 1 and 5, got {stars}"
            )))
        }
    }

    pub fn stars(self) -> u8 {
        self.0
    }

    /// Maps 1-5 stars onto the 20-100 score scale.
    pub fn normalized(self) -> f64 {
        f64::from(self.0) * 20.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = ReputationError;

    fn try_from(stars: u8) -> Result<Self, Self::Error> {
        Self::new(stars)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

/// An immutable record of a completed, rated trade.
///
/// Created by the market engine with the rating already populated. The only
/// field this engine ever writes is `reputation_weight`, patched exactly once
/// after the seller's score has been persisted.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct RatedTransaction {
    pub tx_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub rating: Rating,
    /// Anti-collusion weight applied to the rating, recorded for audit.
    /// Absent from incoming events; written by the engine.
    #[serde(default)]
    pub reputation_weight: Option<f64>,
}

impl RatedTransaction {
    /// Rejects events that must not reach the store. Ratings are already
    /// validated by construction.
    pub fn validate(&self) -> Result<(), ReputationError> {
        if self.tx_id.is_empty() {
            return Err(ReputationError::MalformedTransaction(
                "missing transaction id".to_string(),
            ));
        }
        if self.buyer_id.is_empty() {
            return Err(ReputationError::MalformedTransaction(
                "missing buyer id".to_string(),
            ));
        }
        if self.seller_id.is_empty() {
            return Err(ReputationError::MalformedTransaction(
                "missing seller id".to_string(),
            ));
        }
        Ok(())
    }
}
