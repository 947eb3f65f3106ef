//! Keyed collection store for tracker state.
//!
//! The core never does read-modify-write on shared counters: everything that
//! must stay consistent under concurrent callers is exposed here as a single
//! atomic primitive (guarded decrement, upsert), and each backend implements
//! it as one operation. [`MemoryStore`] is the default backend; the
//! `persistence` feature adds a SQLite one with the same contract.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::Result;
use crate::{Room, RoomEvent, Route, UserRoute, UserState};

// ============================================================================
// Store Contract
// ============================================================================

/// The atomic primitives the tracker core relies on.
///
/// Five collections: rooms, user states, room events (append-only), routes
/// (immutable after creation), and user routes (one per user, upsert target).
/// Listing methods return entries in a stable order (sorted by key) so
/// dumps are deterministic.
pub trait TrackerStore {
    // Rooms
    fn room(&self, room_id: &str) -> Result<Option<Room>>;
    fn rooms(&self) -> Result<Vec<Room>>;
    fn insert_room(&mut self, room: Room) -> Result<()>;

    /// Increment a room's occupancy counter by one.
    fn increment_occupancy(&mut self, room_id: &str) -> Result<()>;

    /// Decrement a room's occupancy counter by one, only if it is positive.
    ///
    /// Returns whether the decrement applied. The at-zero no-op keeps the
    /// counter non-negative under lost, duplicate, or out-of-order signals;
    /// it is not an error.
    fn decrement_occupancy_guarded(&mut self, room_id: &str) -> Result<bool>;

    // User states
    fn user_state(&self, user_id: &str) -> Result<Option<UserState>>;
    fn user_states(&self) -> Result<Vec<UserState>>;
    /// Insert or replace the state row for `state.user_id`.
    fn put_user_state(&mut self, state: UserState) -> Result<()>;

    // Room events
    fn append_event(&mut self, event: RoomEvent) -> Result<()>;
    /// Events in append order, optionally filtered to one user.
    fn events(&self, user_id: Option<&str>) -> Result<Vec<RoomEvent>>;

    // Routes
    fn insert_route(&mut self, route: Route) -> Result<()>;
    fn route(&self, route_id: &str) -> Result<Option<Route>>;
    fn routes(&self) -> Result<Vec<Route>>;
    /// Returns whether a route was deleted.
    fn delete_route(&mut self, route_id: &str) -> Result<bool>;

    // User routes
    /// Set-if-absent-else-update for the user's route cursor.
    fn upsert_user_route(&mut self, user_route: UserRoute) -> Result<()>;
    fn user_route(&self, user_id: &str) -> Result<Option<UserRoute>>;
    /// Persist a progress advance in one operation.
    fn advance_user_route(
        &mut self,
        user_id: &str,
        current_step: usize,
        completed: bool,
        updated_at: i64,
    ) -> Result<()>;
    /// Returns whether an assignment was removed.
    fn delete_user_route(&mut self, user_id: &str) -> Result<bool>;
}

/// Occupancy per room as a sorted map, for the occupancy dump.
pub fn occupancy_map<S: TrackerStore>(store: &S) -> Result<BTreeMap<String, u32>> {
    Ok(store
        .rooms()?
        .into_iter()
        .map(|r| (r.room_id, r.current_occupancy))
        .collect())
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// In-memory store backend.
///
/// Request-scoped compute owns no state; everything lives here. Single
/// ownership of `&mut self` makes every primitive trivially atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rooms: HashMap<String, Room>,
    user_states: HashMap<String, UserState>,
    room_events: Vec<RoomEvent>,
    routes: HashMap<String, Route>,
    user_routes: HashMap<String, UserRoute>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of logged room events.
    pub fn event_count(&self) -> usize {
        self.room_events.len()
    }
}

impl TrackerStore for MemoryStore {
    fn room(&self, room_id: &str) -> Result<Option<Room>> {
        Ok(self.rooms.get(room_id).cloned())
    }

    fn rooms(&self) -> Result<Vec<Room>> {
        let mut rooms: Vec<Room> = self.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(rooms)
    }

    fn insert_room(&mut self, room: Room) -> Result<()> {
        self.rooms.insert(room.room_id.clone(), room);
        Ok(())
    }

    fn increment_occupancy(&mut self, room_id: &str) -> Result<()> {
        if let Some(room) = self.rooms.get_mut(room_id) {
            room.current_occupancy += 1;
        }
        Ok(())
    }

    fn decrement_occupancy_guarded(&mut self, room_id: &str) -> Result<bool> {
        match self.rooms.get_mut(room_id) {
            Some(room) if room.current_occupancy > 0 => {
                room.current_occupancy -= 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn user_state(&self, user_id: &str) -> Result<Option<UserState>> {
        Ok(self.user_states.get(user_id).cloned())
    }

    fn user_states(&self) -> Result<Vec<UserState>> {
        let mut states: Vec<UserState> = self.user_states.values().cloned().collect();
        states.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(states)
    }

    fn put_user_state(&mut self, state: UserState) -> Result<()> {
        self.user_states.insert(state.user_id.clone(), state);
        Ok(())
    }

    fn append_event(&mut self, event: RoomEvent) -> Result<()> {
        self.room_events.push(event);
        Ok(())
    }

    fn events(&self, user_id: Option<&str>) -> Result<Vec<RoomEvent>> {
        Ok(self
            .room_events
            .iter()
            .filter(|e| user_id.map_or(true, |u| e.user_id == u))
            .cloned()
            .collect())
    }

    fn insert_route(&mut self, route: Route) -> Result<()> {
        self.routes.insert(route.route_id.clone(), route);
        Ok(())
    }

    fn route(&self, route_id: &str) -> Result<Option<Route>> {
        Ok(self.routes.get(route_id).cloned())
    }

    fn routes(&self) -> Result<Vec<Route>> {
        let mut routes: Vec<Route> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.route_id.cmp(&b.route_id));
        Ok(routes)
    }

    fn delete_route(&mut self, route_id: &str) -> Result<bool> {
        Ok(self.routes.remove(route_id).is_some())
    }

    fn upsert_user_route(&mut self, user_route: UserRoute) -> Result<()> {
        self.user_routes
            .insert(user_route.user_id.clone(), user_route);
        Ok(())
    }

    fn user_route(&self, user_id: &str) -> Result<Option<UserRoute>> {
        Ok(self.user_routes.get(user_id).cloned())
    }

    fn advance_user_route(
        &mut self,
        user_id: &str,
        current_step: usize,
        completed: bool,
        updated_at: i64,
    ) -> Result<()> {
        if let Some(user_route) = self.user_routes.get_mut(user_id) {
            user_route.current_step = current_step;
            user_route.completed = completed;
            user_route.updated_at = updated_at;
        }
        Ok(())
    }

    fn delete_user_route(&mut self, user_id: &str) -> Result<bool> {
        Ok(self.user_routes.remove(user_id).is_some())
    }
}

// ============================================================================
// Global Singleton
// ============================================================================

/// Global store instance.
///
/// Transport layers that handle each request independently can share this
/// single store without owning any other mutable state.
pub static STORE: Lazy<Mutex<MemoryStore>> = Lazy::new(|| Mutex::new(MemoryStore::new()));

/// Get a lock on the global store.
pub fn with_store<F, R>(f: F) -> R
where
    F: FnOnce(&mut MemoryStore) -> R,
{
    let mut store = STORE.lock().unwrap();
    f(&mut store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, Room};

    fn sample_room(id: &str) -> Room {
        Room::new(id, id, format!("poi_{}", id), vec![])
    }

    #[test]
    fn test_room_insert_and_lookup() {
        let mut store = MemoryStore::new();
        store.insert_room(sample_room("SALON")).unwrap();

        assert!(store.room("SALON").unwrap().is_some());
        assert!(store.room("COCINA").unwrap().is_none());
        assert_eq!(store.rooms().unwrap().len(), 1);
    }

    #[test]
    fn test_rooms_listed_in_stable_order() {
        let mut store = MemoryStore::new();
        for id in ["COCINA", "SALON", "BAN1"] {
            store.insert_room(sample_room(id)).unwrap();
        }

        let ids: Vec<String> = store
            .rooms()
            .unwrap()
            .into_iter()
            .map(|r| r.room_id)
            .collect();
        assert_eq!(ids, vec!["BAN1", "COCINA", "SALON"]);
    }

    #[test]
    fn test_occupancy_counter_never_negative() {
        let mut store = MemoryStore::new();
        store.insert_room(sample_room("SALON")).unwrap();

        // Decrement at zero is a no-op, not an error
        assert!(!store.decrement_occupancy_guarded("SALON").unwrap());
        assert_eq!(store.room("SALON").unwrap().unwrap().current_occupancy, 0);

        store.increment_occupancy("SALON").unwrap();
        assert!(store.decrement_occupancy_guarded("SALON").unwrap());
        assert!(!store.decrement_occupancy_guarded("SALON").unwrap());
        assert_eq!(store.room("SALON").unwrap().unwrap().current_occupancy, 0);
    }

    #[test]
    fn test_occupancy_map() {
        let mut store = MemoryStore::new();
        store.insert_room(sample_room("SALON")).unwrap();
        store.insert_room(sample_room("COCINA")).unwrap();
        store.increment_occupancy("SALON").unwrap();

        let map = occupancy_map(&store).unwrap();
        assert_eq!(map["SALON"], 1);
        assert_eq!(map["COCINA"], 0);
    }

    #[test]
    fn test_event_log_is_append_only_and_filterable() {
        let mut store = MemoryStore::new();
        for (user, room) in [("ana", "SALON"), ("bob", "COCINA"), ("ana", "PASILLO")] {
            store
                .append_event(RoomEvent {
                    user_id: user.to_string(),
                    room_id: room.to_string(),
                    event: EventKind::Enter,
                    timestamp: 100,
                    confidence: None,
                })
                .unwrap();
        }

        assert_eq!(store.events(None).unwrap().len(), 3);
        let ana: Vec<RoomEvent> = store.events(Some("ana")).unwrap();
        assert_eq!(ana.len(), 2);
        assert_eq!(ana[0].room_id, "SALON");
        assert_eq!(ana[1].room_id, "PASILLO");
    }

    #[test]
    fn test_user_route_upsert_replaces() {
        let mut store = MemoryStore::new();
        let cursor = UserRoute {
            user_id: "ana".to_string(),
            route_id: "r1".to_string(),
            current_step: 0,
            completed: false,
            assigned_at: 100,
            updated_at: 100,
        };
        store.upsert_user_route(cursor.clone()).unwrap();
        store
            .upsert_user_route(UserRoute {
                route_id: "r2".to_string(),
                ..cursor
            })
            .unwrap();

        let stored = store.user_route("ana").unwrap().unwrap();
        assert_eq!(stored.route_id, "r2");
        assert_eq!(stored.current_step, 0);
    }

    #[test]
    fn test_delete_route_reports_outcome() {
        let mut store = MemoryStore::new();
        store
            .insert_route(Route {
                route_id: "r1".to_string(),
                name: "r1".to_string(),
                description: String::new(),
                steps: vec![],
                created_at: 100,
            })
            .unwrap();

        assert!(store.delete_route("r1").unwrap());
        assert!(!store.delete_route("r1").unwrap());
    }
}
