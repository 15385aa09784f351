//! Error types for the simulation core

use thiserror::Error;

/// Errors raised while validating a simulation request.
///
/// All of these are detected before the first trade is simulated, so a
/// failing request never yields a partial sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// A configuration value is out of range or would make the payoff
    /// arithmetic undefined (e.g. a non-positive average loss)
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The risk sweep range is empty or malformed
    #[error("invalid risk range: {0}")]
    InvalidRiskRange(String),
}

impl SimError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type SimResult<T> = std::result::Result<T, SimError>;
