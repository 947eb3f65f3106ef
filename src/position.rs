//! Position update state machine.
//!
//! One detection signal per call, three observable transitions:
//!
//! | Prior state          | Detected room | Transition     |
//! |----------------------|---------------|----------------|
//! | no state row         | R             | `enter`        |
//! | current room == R    | R             | `stay`         |
//! | current room C != R  | R             | `room_changed` |
//!
//! A `stay` mutates neither occupancy nor the event log: counters track
//! distinct transitions, not polling frequency, and the log stays
//! proportional to actual movement. A room change appends exactly two
//! events (exit old, enter new) with one shared timestamp, decrements the
//! old room's occupancy only if it is positive, and increments the new one.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::store::TrackerStore;
use crate::time_utils::now_unix;
use crate::{EventKind, RoomEvent, UserEvent, UserState};

/// An externally resolved room estimate for a user at a point in time.
///
/// The library does not do signal processing; `detected_room` arrives
/// already resolved. `timestamp` defaults to the call's wall-clock time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSignal {
    pub user_id: String,
    pub detected_room: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl DetectionSignal {
    pub fn new(user_id: impl Into<String>, detected_room: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            detected_room: detected_room.into(),
            confidence: None,
            timestamp: None,
        }
    }
}

/// Classification of a detection relative to the user's prior state.
///
/// Serializes to the wire shape the transport returns verbatim:
/// `{"event": "room_changed", "from": ..., "to": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Transition {
    Enter { room: String },
    Stay { room: String },
    RoomChanged { from: String, to: String },
}

/// Apply one detection signal and return the resulting transition.
///
/// Fails with [`TrackerError::Validation`] when `user_id` or
/// `detected_room` is empty, and [`TrackerError::RoomNotFound`] when the
/// detected room has no record; neither failure mutates anything.
pub fn update_position<S: TrackerStore>(
    store: &mut S,
    signal: &DetectionSignal,
) -> Result<Transition> {
    if signal.user_id.is_empty() || signal.detected_room.is_empty() {
        return Err(TrackerError::validation(
            "user_id and detected_room are required",
        ));
    }

    let detected = signal.detected_room.as_str();
    if store.room(detected)?.is_none() {
        return Err(TrackerError::RoomNotFound {
            room_id: detected.to_string(),
        });
    }

    let timestamp = signal.timestamp.unwrap_or_else(now_unix);
    let prior = store.user_state(&signal.user_id)?;

    match prior {
        Some(state) if state.current_room.as_deref() == Some(detected) => {
            let mut state = state;
            state.last_update = timestamp;
            state.confidence = signal.confidence;
            state.last_event = UserEvent::Stay;
            store.put_user_state(state)?;

            debug!("user {} stays in {}", signal.user_id, detected);
            Ok(Transition::Stay {
                room: detected.to_string(),
            })
        }
        Some(UserState {
            current_room: Some(current),
            ..
        }) => {
            store.append_event(RoomEvent {
                user_id: signal.user_id.clone(),
                room_id: current.clone(),
                event: EventKind::Exit,
                timestamp,
                confidence: signal.confidence,
            })?;
            store.append_event(RoomEvent {
                user_id: signal.user_id.clone(),
                room_id: detected.to_string(),
                event: EventKind::Enter,
                timestamp,
                confidence: signal.confidence,
            })?;

            if !store.decrement_occupancy_guarded(&current)? {
                warn!(
                    "occupancy of {} already zero on exit of user {}",
                    current, signal.user_id
                );
            }
            store.increment_occupancy(detected)?;

            store.put_user_state(UserState {
                user_id: signal.user_id.clone(),
                current_room: Some(detected.to_string()),
                last_update: timestamp,
                confidence: signal.confidence,
                last_event: UserEvent::Enter,
                last_room_change: timestamp,
            })?;

            info!(
                "user {} moved from {} to {}",
                signal.user_id, current, detected
            );
            Ok(Transition::RoomChanged {
                from: current,
                to: detected.to_string(),
            })
        }
        // No prior row, or a row with no room yet: a first detection
        _ => {
            store.put_user_state(UserState {
                user_id: signal.user_id.clone(),
                current_room: Some(detected.to_string()),
                last_update: timestamp,
                confidence: signal.confidence,
                last_event: UserEvent::Enter,
                last_room_change: timestamp,
            })?;
            store.append_event(RoomEvent {
                user_id: signal.user_id.clone(),
                room_id: detected.to_string(),
                event: EventKind::Enter,
                timestamp,
                confidence: signal.confidence,
            })?;
            store.increment_occupancy(detected)?;

            info!("user {} entered {}", signal.user_id, detected);
            Ok(Transition::Enter {
                room: detected.to_string(),
            })
        }
    }
}
