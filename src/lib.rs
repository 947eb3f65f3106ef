//! # Indoor Tracker
//!
//! Indoor position tracking, room occupancy, and graph-based route guidance.
//!
//! This library provides:
//! - A per-user position state machine over room detection signals
//!   (enter / stay / room_changed) with occupancy counters and an
//!   append-only event log
//! - Route generation over the room-connectivity graph (BFS/DFS) with
//!   step-by-step progress tracking along an assigned route
//! - A keyed collection-store abstraction with an in-memory backend and an
//!   optional SQLite backend
//!
//! ## Features
//!
//! - **`persistence`** - Enable the SQLite-backed store
//!
//! ## Quick Start
//!
//! ```rust
//! use indoor_tracker::position::{update_position, DetectionSignal, Transition};
//! use indoor_tracker::{routes, seed, Algorithm, MemoryStore};
//!
//! let mut store = MemoryStore::new();
//! seed::seed_rooms(&mut store).unwrap();
//!
//! // First detection for this user: an "enter" transition
//! let signal = DetectionSignal::new("ana", "ENTRADA");
//! let transition = update_position(&mut store, &signal).unwrap();
//! assert!(matches!(transition, Transition::Enter { .. }));
//!
//! // Generate and assign a route starting from the user's current room
//! let route = routes::generate_route(&mut store, Algorithm::Bfs, "ana").unwrap();
//! assert_eq!(route.rooms[0], "ENTRADA");
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrackerError};

// Wall-clock helpers
pub mod time_utils;

// Room connectivity graph and traversals
pub mod graph;
pub use graph::{rooms_to_pois, RoomGraph};

// Keyed collection store (trait + in-memory backend + shared singleton)
pub mod store;
pub use store::{occupancy_map, with_store, MemoryStore, TrackerStore, STORE};

// Position update state machine
pub mod position;
pub use position::{update_position, DetectionSignal, Transition};

// Route generation and progress tracking
pub mod routes;
pub use routes::{
    assign_route, assigned_route, generate_route, next_step, preview_route, reset_user_route,
    update_progress, AssignedRoute, GeneratedRoute, NextStep, ProgressOutcome, RoutePreview,
};

// SQLite-backed store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::SqliteStore;

// Demo floor plan and seeding
pub mod seed;
pub use seed::{demo_rooms, seed_rooms};

// ============================================================================
// Core Types
// ============================================================================

/// A navigable room in the connectivity graph.
///
/// `connections` is the stored adjacency: an ordered list of neighboring
/// room ids, symmetric by convention but not enforced. The occupancy counter
/// is only ever mutated through the position state machine's deltas and can
/// never go negative (`u32` plus a guarded decrement in the store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Unique, stable room identifier
    pub room_id: String,
    pub name: String,
    /// Opaque external point-of-interest identifier
    pub poi_id: String,
    /// Ordered neighbor room ids
    pub connections: Vec<String>,
    pub current_occupancy: u32,
}

impl Room {
    /// Create a room with zero occupancy.
    pub fn new(
        room_id: impl Into<String>,
        name: impl Into<String>,
        poi_id: impl Into<String>,
        connections: Vec<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            name: name.into(),
            poi_id: poi_id.into(),
            connections,
            current_occupancy: 0,
        }
    }
}

/// Event kind recorded in the append-only room event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Enter,
    Exit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Enter => "enter",
            EventKind::Exit => "exit",
        }
    }
}

impl FromStr for EventKind {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enter" => Ok(EventKind::Enter),
            "exit" => Ok(EventKind::Exit),
            other => Err(TrackerError::validation(format!(
                "invalid event kind '{}'",
                other
            ))),
        }
    }
}

/// The last transition recorded on a user's state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserEvent {
    Enter,
    Stay,
}

impl UserEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserEvent::Enter => "enter",
            UserEvent::Stay => "stay",
        }
    }
}

impl FromStr for UserEvent {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enter" => Ok(UserEvent::Enter),
            "stay" => Ok(UserEvent::Stay),
            other => Err(TrackerError::validation(format!(
                "invalid user event '{}'",
                other
            ))),
        }
    }
}

/// Current position state for a user. One row per user, created on the
/// first detection and updated on every subsequent one; never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub user_id: String,
    /// Room of the most recent enter/stay; `None` until the first detection
    pub current_room: Option<String>,
    /// Unix seconds of the last detection for this user
    pub last_update: i64,
    /// Optional signal quality, unconstrained
    pub confidence: Option<f64>,
    pub last_event: UserEvent,
    /// Unix seconds of the last room transition (distinct from `last_update`)
    pub last_room_change: i64,
}

/// Append-only log entry. A room change produces exactly two events
/// (exit old, enter new) sharing one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomEvent {
    pub user_id: String,
    pub room_id: String,
    pub event: EventKind,
    pub timestamp: i64,
    pub confidence: Option<f64>,
}

/// A single step of a route: the room to reach and its display POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStep {
    pub room_id: String,
    pub poi_id: String,
}

/// An ordered sequence of room/POI steps produced by a traversal.
/// Immutable once created, except for deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<RouteStep>,
    pub created_at: i64,
}

/// Per-user progress cursor over an assigned route. One per user; route
/// assignment is an upsert. `route_id` is a reference, not ownership: the
/// route may be deleted independently, leaving a dangling reference that
/// surfaces as a hard not-found at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoute {
    pub user_id: String,
    pub route_id: String,
    /// Index into the route's steps, monotonically non-decreasing
    pub current_step: usize,
    /// True exactly when `current_step == steps.len()`
    pub completed: bool,
    pub assigned_at: i64,
    pub updated_at: i64,
}

/// Traversal algorithm for route generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Bfs,
    Dfs,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Bfs => "bfs",
            Algorithm::Dfs => "dfs",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bfs" => Ok(Algorithm::Bfs),
            "dfs" => Ok(Algorithm::Dfs),
            _ => Err(TrackerError::validation("invalid algorithm")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
