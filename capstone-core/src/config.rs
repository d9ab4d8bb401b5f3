//! Engine configuration
//!
//! Loaded from environment variables with defaults matching the academic
//! regulations the engine was written for.

use crate::{CapstoneResult, ConfigError};
use serde::{Deserialize, Serialize};

/// Number of lecturers seated on a defense council.
pub const DEFENSE_COUNCIL_SIZE: usize = 4;

/// Number of lecturers seated on a milestone review council.
pub const MILESTONE_COUNCIL_SIZE: usize = 2;

/// Runtime configuration for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Distinct approvals needed before a topic is APPROVED.
    pub required_approvals: u32,

    /// How many times a transaction is re-run after a commit conflict.
    pub max_conflict_retries: u32,

    /// Length of the defense window starting at the semester anchor, in days.
    pub defense_window_days: u32,

    /// Number of defense slots per day (slots are numbered from 1).
    pub slots_per_day: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            required_approvals: 2,
            max_conflict_retries: 3,
            defense_window_days: 5,
            slots_per_day: 5,
        }
    }
}

impl EngineConfig {
    /// Create EngineConfig from environment variables.
    ///
    /// Environment variables:
    /// - `CAPSTONE_REQUIRED_APPROVALS` (default: 2)
    /// - `CAPSTONE_MAX_CONFLICT_RETRIES` (default: 3)
    /// - `CAPSTONE_DEFENSE_WINDOW_DAYS` (default: 5)
    /// - `CAPSTONE_SLOTS_PER_DAY` (default: 5)
    ///
    /// Unparseable values are reported rather than silently replaced.
    pub fn from_env() -> CapstoneResult<Self> {
        let defaults = Self::default();
        let config = Self {
            required_approvals: env_or("CAPSTONE_REQUIRED_APPROVALS", defaults.required_approvals)?,
            max_conflict_retries: env_or(
                "CAPSTONE_MAX_CONFLICT_RETRIES",
                defaults.max_conflict_retries,
            )?,
            defense_window_days: env_or(
                "CAPSTONE_DEFENSE_WINDOW_DAYS",
                defaults.defense_window_days,
            )?,
            slots_per_day: env_or("CAPSTONE_SLOTS_PER_DAY", defaults.slots_per_day)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - required_approvals > 0
    /// - defense_window_days > 0
    /// - slots_per_day > 0
    pub fn validate(&self) -> CapstoneResult<()> {
        if self.required_approvals == 0 {
            return Err(invalid("required_approvals", self.required_approvals, "must be at least 1"));
        }
        if self.defense_window_days == 0 {
            return Err(invalid(
                "defense_window_days",
                self.defense_window_days,
                "must be at least 1",
            ));
        }
        if self.slots_per_day == 0 {
            return Err(invalid("slots_per_day", self.slots_per_day, "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> crate::CapstoneError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> CapstoneResult<T> {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| {
            ConfigError::InvalidValue {
                field: key.to_string(),
                value: raw.clone(),
                reason: "not a valid number".to_string(),
            }
            .into()
        }),
        Err(_) => Ok(default),
    }
}
