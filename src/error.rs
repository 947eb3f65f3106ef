//! Unified error handling for the indoor-tracker library.
//!
//! This module provides a consistent error type for all tracker operations.
//! The taxonomy is deliberately small: validation failures and missing
//! entities reject the request before any mutation; persistence failures
//! surface the backend message.

use std::fmt;

/// Unified error type for tracker operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// A required field is missing or has an invalid value
    Validation { message: String },
    /// The detected or requested room does not exist
    RoomNotFound { room_id: String },
    /// The referenced route does not exist (including dangling references)
    RouteNotFound { route_id: String },
    /// The user has no recorded position yet
    NoPosition { user_id: String },
    /// The user has no route assigned
    NoRouteAssigned { user_id: String },
    /// Store/backend error
    Persistence { message: String },
}

impl TrackerError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        TrackerError::Validation {
            message: message.into(),
        }
    }

    /// Whether this error maps to a missing entity rather than bad input.
    ///
    /// Transport layers use this to pick between 404 and 400.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TrackerError::RoomNotFound { .. }
                | TrackerError::RouteNotFound { .. }
                | TrackerError::NoPosition { .. }
                | TrackerError::NoRouteAssigned { .. }
        )
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Validation { message } => write!(f, "{}", message),
            TrackerError::RoomNotFound { room_id } => {
                write!(f, "room {} not found", room_id)
            }
            TrackerError::RouteNotFound { route_id } => {
                write!(f, "route {} not found", route_id)
            }
            TrackerError::NoPosition { user_id } => {
                write!(f, "user {} has no position yet", user_id)
            }
            TrackerError::NoRouteAssigned { user_id } => {
                write!(f, "no route assigned to user {}", user_id)
            }
            TrackerError::Persistence { message } => {
                write!(f, "persistence error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrackerError {}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::Persistence {
            message: err.to_string(),
        }
    }
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackerError::RoomNotFound {
            room_id: "SALON".to_string(),
        };
        assert_eq!(err.to_string(), "room SALON not found");

        let err = TrackerError::validation("user_id is required");
        assert_eq!(err.to_string(), "user_id is required");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(TrackerError::RouteNotFound {
            route_id: "r1".to_string()
        }
        .is_not_found());
        assert!(!TrackerError::validation("bad").is_not_found());
        assert!(!TrackerError::Persistence {
            message: "io".to_string()
        }
        .is_not_found());
    }
}
