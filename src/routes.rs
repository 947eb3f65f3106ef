//! Route generation and progress tracking.
//!
//! Generation builds a fresh graph snapshot from the room collection, runs
//! the requested traversal from the user's current room, projects the
//! visitation order to POIs, and persists an immutable route plus the
//! user's progress cursor (one per user, upsert).
//!
//! Progress tracking enforces strict in-order traversal: every step must be
//! confirmed in exactly the order the route was generated. A wrong room is
//! reported as a mismatch — a normal outcome with no state change, so the
//! user can retry detection without penalty.

use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TrackerError};
use crate::graph::{rooms_to_pois, RoomGraph};
use crate::store::TrackerStore;
use crate::time_utils::now_unix;
use crate::{Algorithm, Route, RouteStep, UserRoute};

// ============================================================================
// Outcome Types
// ============================================================================

/// A generated-and-assigned route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRoute {
    pub route_id: String,
    pub algorithm: Algorithm,
    pub rooms: Vec<String>,
    pub pois: Vec<String>,
}

/// The same computation as generation, without persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePreview {
    pub algorithm: Algorithm,
    pub rooms: Vec<String>,
    pub pois: Vec<String>,
}

/// Outcome of a progress update.
///
/// Serializes to the wire shape of the progress endpoint:
/// `{"status": "ok", ...}` / `{"status": "mismatch", ...}` /
/// `{"status": "already_completed"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressOutcome {
    /// The expected room was reached and the cursor advanced
    #[serde(rename = "ok")]
    Advanced { current_step: usize, completed: bool },
    /// A different room than expected was reached; nothing changed
    Mismatch {
        expected_room: String,
        reached_room: String,
    },
    /// The route was already finished; terminal and idempotent
    AlreadyCompleted,
}

/// Next expected step of an assigned route, or completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextStep {
    #[serde(rename = "ok")]
    Step {
        next_room: String,
        next_poi: String,
    },
    Completed,
}

/// A user's assigned route together with their progress cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignedRoute {
    pub user_route: UserRoute,
    pub route: Route,
}

// ============================================================================
// Generation
// ============================================================================

/// Generate a route from the user's current room, persist it, and assign it.
///
/// Fails with [`TrackerError::NoPosition`] when the user has no recorded
/// position. The route id is collision-resistant: algorithm and user for
/// provenance, a v4 UUID for uniqueness.
pub fn generate_route<S: TrackerStore>(
    store: &mut S,
    algorithm: Algorithm,
    user_id: &str,
) -> Result<GeneratedRoute> {
    let (rooms, pois, steps) = compute_route(store, algorithm, user_id)?;

    let route_id = new_route_id(algorithm, user_id);
    let now = now_unix();
    let upper = algorithm.as_str().to_uppercase();

    store.insert_route(Route {
        route_id: route_id.clone(),
        name: format!("{} route for {}", upper, user_id),
        description: format!("Automatically generated using {}", upper),
        steps,
        created_at: now,
    })?;
    store.upsert_user_route(UserRoute {
        user_id: user_id.to_string(),
        route_id: route_id.clone(),
        current_step: 0,
        completed: false,
        assigned_at: now,
        updated_at: now,
    })?;

    info!(
        "generated {} route {} for user {} ({} rooms)",
        algorithm,
        route_id,
        user_id,
        rooms.len()
    );
    Ok(GeneratedRoute {
        route_id,
        algorithm,
        rooms,
        pois,
    })
}

/// Compute the route a generation call would produce, persisting nothing.
pub fn preview_route<S: TrackerStore>(
    store: &S,
    algorithm: Algorithm,
    user_id: &str,
) -> Result<RoutePreview> {
    let (rooms, pois, _) = compute_route(store, algorithm, user_id)?;
    Ok(RoutePreview {
        algorithm,
        rooms,
        pois,
    })
}

/// Shared read path of generation and preview: traversal order, POI
/// projection, and the room/POI step pairs.
fn compute_route<S: TrackerStore>(
    store: &S,
    algorithm: Algorithm,
    user_id: &str,
) -> Result<(Vec<String>, Vec<String>, Vec<RouteStep>)> {
    if user_id.is_empty() {
        return Err(TrackerError::validation("user_id is required"));
    }

    let start = match store.user_state(user_id)? {
        Some(state) => state.current_room.ok_or_else(|| TrackerError::NoPosition {
            user_id: user_id.to_string(),
        })?,
        None => {
            return Err(TrackerError::NoPosition {
                user_id: user_id.to_string(),
            })
        }
    };

    let all_rooms = store.rooms()?;
    let graph = RoomGraph::from_rooms(&all_rooms);

    let room_route = match algorithm {
        Algorithm::Bfs => graph.bfs(&start),
        Algorithm::Dfs => graph.dfs(&start),
    };
    let poi_route = rooms_to_pois(&all_rooms, &room_route);

    // Steps pair each visited room with its own POI; rooms without a record
    // are dropped, keeping pairs aligned even when the projection shrinks.
    let steps = room_route
        .iter()
        .filter_map(|room_id| {
            all_rooms
                .iter()
                .find(|r| &r.room_id == room_id)
                .map(|r| RouteStep {
                    room_id: room_id.clone(),
                    poi_id: r.poi_id.clone(),
                })
        })
        .collect();

    Ok((room_route, poi_route, steps))
}

fn new_route_id(algorithm: Algorithm, user_id: &str) -> String {
    format!("{}_{}_{}", algorithm, user_id, Uuid::new_v4().simple())
}

// ============================================================================
// Assignment
// ============================================================================

/// Attach an existing route to a user, resetting their cursor to step 0.
pub fn assign_route<S: TrackerStore>(store: &mut S, user_id: &str, route_id: &str) -> Result<()> {
    if user_id.is_empty() || route_id.is_empty() {
        return Err(TrackerError::validation(
            "user_id and route_id are required",
        ));
    }
    if store.route(route_id)?.is_none() {
        return Err(TrackerError::RouteNotFound {
            route_id: route_id.to_string(),
        });
    }

    let now = now_unix();
    store.upsert_user_route(UserRoute {
        user_id: user_id.to_string(),
        route_id: route_id.to_string(),
        current_step: 0,
        completed: false,
        assigned_at: now,
        updated_at: now,
    })?;

    info!("assigned route {} to user {}", route_id, user_id);
    Ok(())
}

/// Clear a user's route assignment. Returns whether one was removed.
pub fn reset_user_route<S: TrackerStore>(store: &mut S, user_id: &str) -> Result<bool> {
    if user_id.is_empty() {
        return Err(TrackerError::validation("user_id is required"));
    }
    store.delete_user_route(user_id)
}

// ============================================================================
// Progress
// ============================================================================

/// Confirm that the user reached a room and advance their cursor if it is
/// the expected one.
///
/// The cursor only moves forward, one confirmed step at a time; a mismatch
/// changes nothing. A cursor at or past the end is terminal.
pub fn update_progress<S: TrackerStore>(
    store: &mut S,
    user_id: &str,
    reached_room_id: &str,
) -> Result<ProgressOutcome> {
    if user_id.is_empty() || reached_room_id.is_empty() {
        return Err(TrackerError::validation("user_id and room_id are required"));
    }

    let (user_route, route) = assignment(store, user_id)?;

    if user_route.current_step >= route.steps.len() {
        return Ok(ProgressOutcome::AlreadyCompleted);
    }

    let expected_room = &route.steps[user_route.current_step].room_id;
    if expected_room != reached_room_id {
        return Ok(ProgressOutcome::Mismatch {
            expected_room: expected_room.clone(),
            reached_room: reached_room_id.to_string(),
        });
    }

    let current_step = user_route.current_step + 1;
    let completed = current_step == route.steps.len();
    store.advance_user_route(user_id, current_step, completed, now_unix())?;

    if completed {
        info!("user {} completed route {}", user_id, route.route_id);
    }
    Ok(ProgressOutcome::Advanced {
        current_step,
        completed,
    })
}

/// Read-only lookup of the next expected step.
pub fn next_step<S: TrackerStore>(store: &S, user_id: &str) -> Result<NextStep> {
    let (user_route, route) = assignment(store, user_id)?;

    match route.steps.get(user_route.current_step) {
        Some(step) => Ok(NextStep::Step {
            next_room: step.room_id.clone(),
            next_poi: step.poi_id.clone(),
        }),
        None => Ok(NextStep::Completed),
    }
}

/// The user's assigned route together with their progress.
pub fn assigned_route<S: TrackerStore>(store: &S, user_id: &str) -> Result<AssignedRoute> {
    let (user_route, route) = assignment(store, user_id)?;
    Ok(AssignedRoute { user_route, route })
}

/// Resolve the user's cursor and its route. A cursor pointing at a deleted
/// route is a hard not-found, not silently healed.
fn assignment<S: TrackerStore>(store: &S, user_id: &str) -> Result<(UserRoute, Route)> {
    let user_route = store
        .user_route(user_id)?
        .ok_or_else(|| TrackerError::NoRouteAssigned {
            user_id: user_id.to_string(),
        })?;

    let route = store
        .route(&user_route.route_id)?
        .ok_or_else(|| TrackerError::RouteNotFound {
            route_id: user_route.route_id.clone(),
        })?;

    Ok((user_route, route))
}
