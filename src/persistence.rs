//! SQLite-backed store.
//!
//! Same contract as the in-memory store, with every atomic primitive mapped
//! to a single SQL statement: the guarded occupancy decrement is one
//! conditional `UPDATE`, user state and route cursors are `ON CONFLICT`
//! upserts, and the event log is an autoincrement-ordered append-only table.
//! List-valued columns (room connections, route steps) are stored as JSON
//! text.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, TrackerError};
use crate::store::TrackerStore;
use crate::{Room, RoomEvent, Route, RouteStep, UserRoute, UserState};

/// Store backend persisted in a SQLite database.
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Connection::open(db_path)?;
        Self::init_schema(&db)?;
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        Self::new(":memory:")
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS rooms (
                room_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                poi_id TEXT NOT NULL,
                connections TEXT NOT NULL,
                current_occupancy INTEGER NOT NULL DEFAULT 0
            );

            -- One row per user, upserted on every detection
            CREATE TABLE IF NOT EXISTS users_state (
                user_id TEXT PRIMARY KEY,
                current_room TEXT,
                last_update INTEGER NOT NULL,
                confidence REAL,
                last_event TEXT NOT NULL,
                last_room_change INTEGER NOT NULL
            );

            -- Append-only; id preserves insertion order
            CREATE TABLE IF NOT EXISTS room_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                room_id TEXT NOT NULL,
                event TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                confidence REAL
            );
            CREATE INDEX IF NOT EXISTS idx_room_events_user
                ON room_events(user_id);

            CREATE TABLE IF NOT EXISTS routes (
                route_id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                steps TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS user_routes (
                user_id TEXT PRIMARY KEY,
                route_id TEXT NOT NULL,
                current_step INTEGER NOT NULL,
                completed INTEGER NOT NULL,
                assigned_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| TrackerError::Persistence {
        message: e.to_string(),
    })
}

fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| TrackerError::Persistence {
        message: e.to_string(),
    })
}

fn room_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Room, String)> {
    let connections_json: String = row.get(3)?;
    Ok((
        Room {
            room_id: row.get(0)?,
            name: row.get(1)?,
            poi_id: row.get(2)?,
            connections: Vec::new(),
            current_occupancy: row.get::<_, i64>(4)? as u32,
        },
        connections_json,
    ))
}

fn finish_room((mut room, connections_json): (Room, String)) -> Result<Room> {
    room.connections = from_json(&connections_json)?;
    Ok(room)
}

fn user_state_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(UserState, String)> {
    let last_event: String = row.get(4)?;
    Ok((
        UserState {
            user_id: row.get(0)?,
            current_room: row.get(1)?,
            last_update: row.get(2)?,
            confidence: row.get(3)?,
            last_event: crate::UserEvent::Enter,
            last_room_change: row.get(5)?,
        },
        last_event,
    ))
}

fn finish_user_state((mut state, last_event): (UserState, String)) -> Result<UserState> {
    state.last_event = last_event.parse()?;
    Ok(state)
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(RoomEvent, String)> {
    let kind: String = row.get(3)?;
    Ok((
        RoomEvent {
            user_id: row.get(1)?,
            room_id: row.get(2)?,
            event: crate::EventKind::Enter,
            timestamp: row.get(4)?,
            confidence: row.get(5)?,
        },
        kind,
    ))
}

fn route_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Route, String)> {
    let steps_json: String = row.get(3)?;
    Ok((
        Route {
            route_id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            steps: Vec::new(),
            created_at: row.get(4)?,
        },
        steps_json,
    ))
}

fn finish_route((mut route, steps_json): (Route, String)) -> Result<Route> {
    route.steps = from_json::<Vec<RouteStep>>(&steps_json)?;
    Ok(route)
}

fn user_route_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRoute> {
    Ok(UserRoute {
        user_id: row.get(0)?,
        route_id: row.get(1)?,
        current_step: row.get::<_, i64>(2)? as usize,
        completed: row.get::<_, i64>(3)? != 0,
        assigned_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl TrackerStore for SqliteStore {
    fn room(&self, room_id: &str) -> Result<Option<Room>> {
        let found = self
            .db
            .query_row(
                "SELECT room_id, name, poi_id, connections, current_occupancy
                 FROM rooms WHERE room_id = ?1",
                params![room_id],
                room_from_row,
            )
            .optional()?;
        found.map(finish_room).transpose()
    }

    fn rooms(&self) -> Result<Vec<Room>> {
        let mut stmt = self.db.prepare(
            "SELECT room_id, name, poi_id, connections, current_occupancy
             FROM rooms ORDER BY room_id",
        )?;
        let rows = stmt.query_map([], room_from_row)?;

        let mut rooms = Vec::new();
        for row in rows {
            rooms.push(finish_room(row?)?);
        }
        Ok(rooms)
    }

    fn insert_room(&mut self, room: Room) -> Result<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO rooms
                 (room_id, name, poi_id, connections, current_occupancy)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                room.room_id,
                room.name,
                room.poi_id,
                to_json(&room.connections)?,
                room.current_occupancy as i64,
            ],
        )?;
        Ok(())
    }

    fn increment_occupancy(&mut self, room_id: &str) -> Result<()> {
        self.db.execute(
            "UPDATE rooms SET current_occupancy = current_occupancy + 1
             WHERE room_id = ?1",
            params![room_id],
        )?;
        Ok(())
    }

    fn decrement_occupancy_guarded(&mut self, room_id: &str) -> Result<bool> {
        // The WHERE clause makes check-and-decrement one atomic statement
        let changed = self.db.execute(
            "UPDATE rooms SET current_occupancy = current_occupancy - 1
             WHERE room_id = ?1 AND current_occupancy > 0",
            params![room_id],
        )?;
        Ok(changed > 0)
    }

    fn user_state(&self, user_id: &str) -> Result<Option<UserState>> {
        let found = self
            .db
            .query_row(
                "SELECT user_id, current_room, last_update, confidence,
                        last_event, last_room_change
                 FROM users_state WHERE user_id = ?1",
                params![user_id],
                user_state_from_row,
            )
            .optional()?;
        found.map(finish_user_state).transpose()
    }

    fn user_states(&self) -> Result<Vec<UserState>> {
        let mut stmt = self.db.prepare(
            "SELECT user_id, current_room, last_update, confidence,
                    last_event, last_room_change
             FROM users_state ORDER BY user_id",
        )?;
        let rows = stmt.query_map([], user_state_from_row)?;

        let mut states = Vec::new();
        for row in rows {
            states.push(finish_user_state(row?)?);
        }
        Ok(states)
    }

    fn put_user_state(&mut self, state: UserState) -> Result<()> {
        self.db.execute(
            "INSERT INTO users_state
                 (user_id, current_room, last_update, confidence,
                  last_event, last_room_change)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                 current_room = excluded.current_room,
                 last_update = excluded.last_update,
                 confidence = excluded.confidence,
                 last_event = excluded.last_event,
                 last_room_change = excluded.last_room_change",
            params![
                state.user_id,
                state.current_room,
                state.last_update,
                state.confidence,
                state.last_event.as_str(),
                state.last_room_change,
            ],
        )?;
        Ok(())
    }

    fn append_event(&mut self, event: RoomEvent) -> Result<()> {
        self.db.execute(
            "INSERT INTO room_events (user_id, room_id, event, timestamp, confidence)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.user_id,
                event.room_id,
                event.event.as_str(),
                event.timestamp,
                event.confidence,
            ],
        )?;
        Ok(())
    }

    fn events(&self, user_id: Option<&str>) -> Result<Vec<RoomEvent>> {
        let mut stmt = self.db.prepare(
            "SELECT id, user_id, room_id, event, timestamp, confidence
             FROM room_events
             WHERE ?1 IS NULL OR user_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], event_from_row)?;

        let mut events = Vec::new();
        for row in rows {
            let (mut event, kind) = row?;
            event.event = kind.parse()?;
            events.push(event);
        }
        Ok(events)
    }

    fn insert_route(&mut self, route: Route) -> Result<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO routes
                 (route_id, name, description, steps, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                route.route_id,
                route.name,
                route.description,
                to_json(&route.steps)?,
                route.created_at,
            ],
        )?;
        Ok(())
    }

    fn route(&self, route_id: &str) -> Result<Option<Route>> {
        let found = self
            .db
            .query_row(
                "SELECT route_id, name, description, steps, created_at
                 FROM routes WHERE route_id = ?1",
                params![route_id],
                route_from_row,
            )
            .optional()?;
        found.map(finish_route).transpose()
    }

    fn routes(&self) -> Result<Vec<Route>> {
        let mut stmt = self.db.prepare(
            "SELECT route_id, name, description, steps, created_at
             FROM routes ORDER BY route_id",
        )?;
        let rows = stmt.query_map([], route_from_row)?;

        let mut routes = Vec::new();
        for row in rows {
            routes.push(finish_route(row?)?);
        }
        Ok(routes)
    }

    fn delete_route(&mut self, route_id: &str) -> Result<bool> {
        let deleted = self
            .db
            .execute("DELETE FROM routes WHERE route_id = ?1", params![route_id])?;
        Ok(deleted > 0)
    }

    fn upsert_user_route(&mut self, user_route: UserRoute) -> Result<()> {
        self.db.execute(
            "INSERT INTO user_routes
                 (user_id, route_id, current_step, completed, assigned_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                 route_id = excluded.route_id,
                 current_step = excluded.current_step,
                 completed = excluded.completed,
                 assigned_at = excluded.assigned_at,
                 updated_at = excluded.updated_at",
            params![
                user_route.user_id,
                user_route.route_id,
                user_route.current_step as i64,
                user_route.completed as i64,
                user_route.assigned_at,
                user_route.updated_at,
            ],
        )?;
        Ok(())
    }

    fn user_route(&self, user_id: &str) -> Result<Option<UserRoute>> {
        Ok(self
            .db
            .query_row(
                "SELECT user_id, route_id, current_step, completed, assigned_at, updated_at
                 FROM user_routes WHERE user_id = ?1",
                params![user_id],
                user_route_from_row,
            )
            .optional()?)
    }

    fn advance_user_route(
        &mut self,
        user_id: &str,
        current_step: usize,
        completed: bool,
        updated_at: i64,
    ) -> Result<()> {
        self.db.execute(
            "UPDATE user_routes
             SET current_step = ?2, completed = ?3, updated_at = ?4
             WHERE user_id = ?1",
            params![user_id, current_step as i64, completed as i64, updated_at],
        )?;
        Ok(())
    }

    fn delete_user_route(&mut self, user_id: &str) -> Result<bool> {
        let deleted = self.db.execute(
            "DELETE FROM user_routes WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{update_position, DetectionSignal, Transition};
    use crate::routes::{generate_route, update_progress, ProgressOutcome};
    use crate::{seed, Algorithm, EventKind};

    #[test]
    fn test_room_round_trip_preserves_connections() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed::seed_rooms(&mut store).unwrap();

        let corridor = store.room("PASILLO").unwrap().unwrap();
        assert_eq!(corridor.connections.len(), 7);
        assert_eq!(corridor.connections[0], "SALON");
        assert_eq!(store.rooms().unwrap().len(), 9);
    }

    #[test]
    fn test_guarded_decrement_is_a_single_statement() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed::seed_rooms(&mut store).unwrap();

        assert!(!store.decrement_occupancy_guarded("SALON").unwrap());
        store.increment_occupancy("SALON").unwrap();
        assert!(store.decrement_occupancy_guarded("SALON").unwrap());
        assert_eq!(store.room("SALON").unwrap().unwrap().current_occupancy, 0);
    }

    #[test]
    fn test_position_state_machine_on_sqlite() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed::seed_rooms(&mut store).unwrap();

        let enter = update_position(&mut store, &DetectionSignal::new("ana", "ENTRADA")).unwrap();
        assert!(matches!(enter, Transition::Enter { .. }));

        let moved = update_position(&mut store, &DetectionSignal::new("ana", "SALON")).unwrap();
        assert!(matches!(moved, Transition::RoomChanged { .. }));

        assert_eq!(store.room("ENTRADA").unwrap().unwrap().current_occupancy, 0);
        assert_eq!(store.room("SALON").unwrap().unwrap().current_occupancy, 1);

        let state = store.user_state("ana").unwrap().unwrap();
        assert_eq!(state.current_room.as_deref(), Some("SALON"));

        // Room change logged as exit + enter with one timestamp
        let events = store.events(Some("ana")).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].event, EventKind::Exit);
        assert_eq!(events[2].event, EventKind::Enter);
        assert_eq!(events[1].timestamp, events[2].timestamp);
    }

    #[test]
    fn test_event_filter_by_user() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed::seed_rooms(&mut store).unwrap();
        update_position(&mut store, &DetectionSignal::new("ana", "SALON")).unwrap();
        update_position(&mut store, &DetectionSignal::new("bob", "COCINA")).unwrap();

        assert_eq!(store.events(None).unwrap().len(), 2);
        assert_eq!(store.events(Some("ana")).unwrap().len(), 1);
        assert!(store.events(Some("carol")).unwrap().is_empty());
    }

    #[test]
    fn test_route_lifecycle_on_sqlite() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed::seed_rooms(&mut store).unwrap();
        update_position(&mut store, &DetectionSignal::new("ana", "ENTRADA")).unwrap();

        let generated = generate_route(&mut store, Algorithm::Bfs, "ana").unwrap();
        let route = store.route(&generated.route_id).unwrap().unwrap();
        assert_eq!(route.steps.len(), 9);

        let outcome = update_progress(&mut store, "ana", "ENTRADA").unwrap();
        assert_eq!(
            outcome,
            ProgressOutcome::Advanced {
                current_step: 1,
                completed: false
            }
        );
        assert_eq!(store.user_route("ana").unwrap().unwrap().current_step, 1);

        assert!(store.delete_route(&generated.route_id).unwrap());
        assert!(store.route(&generated.route_id).unwrap().is_none());
    }

    #[test]
    fn test_user_route_upsert_replaces_row() {
        let mut store = SqliteStore::in_memory().unwrap();
        let cursor = UserRoute {
            user_id: "ana".to_string(),
            route_id: "r1".to_string(),
            current_step: 2,
            completed: false,
            assigned_at: 100,
            updated_at: 100,
        };
        store.upsert_user_route(cursor.clone()).unwrap();
        store
            .upsert_user_route(UserRoute {
                route_id: "r2".to_string(),
                current_step: 0,
                ..cursor
            })
            .unwrap();

        let stored = store.user_route("ana").unwrap().unwrap();
        assert_eq!(stored.route_id, "r2");
        assert_eq!(stored.current_step, 0);
    }
}
