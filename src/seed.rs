//! Demo floor plan and idempotent seeding.

use log::{debug, info};

use crate::error::Result;
use crate::store::TrackerStore;
use crate::Room;

/// The demo floor plan: an entrance, a living room, and a corridor fanning
/// out to the remaining rooms.
pub fn demo_rooms() -> Vec<Room> {
    let corridor = vec!["PASILLO".to_string()];
    vec![
        Room::new(
            "ENTRADA",
            "Entrada",
            "poi_57fd1fd2-fc14-47fd-b6df-e2f8589a3e7f",
            vec!["SALON".to_string()],
        ),
        Room::new(
            "SALON",
            "Salón",
            "poi_5ab33651-9e9f-444e-8023-c57dce5d276d",
            vec!["ENTRADA".to_string(), "PASILLO".to_string()],
        ),
        Room::new(
            "COCINA",
            "Cocina",
            "poi_fbc620c5-0578-43e1-b04b-9d9a93239d7d",
            corridor.clone(),
        ),
        Room::new(
            "HAB1",
            "Habitación 1",
            "poi_b9f47ce4-59d2-4015-b923-e0d3fab646ea",
            corridor.clone(),
        ),
        Room::new(
            "BAN1",
            "Baño 1",
            "poi_40f8c046-cb76-4dbb-900d-bd1d8590cd50",
            corridor.clone(),
        ),
        Room::new(
            "BAN2",
            "Baño 2",
            "poi_70b24188-a590-4beb-b003-5aa9e7b44b95",
            corridor.clone(),
        ),
        Room::new(
            "HAB2",
            "Habitación 2",
            "poi_bedbfa50-eeca-40a4-8562-78799e66c2b3",
            corridor.clone(),
        ),
        Room::new(
            "HAB3",
            "Habitación 3",
            "poi_f93ff721-4606-45dc-9fcc-bf1d1d00b920",
            corridor,
        ),
        Room::new(
            "PASILLO",
            "Pasillo",
            "poi_089e6886-f194-4c5c-9e49-43b3c18a43e9",
            ["SALON", "COCINA", "HAB1", "BAN1", "BAN2", "HAB2", "HAB3"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
    ]
}

/// Insert the demo rooms that are not already present.
///
/// Existing rooms are skipped, so re-seeding never resets occupancy counters
/// or rewires connections. Returns how many rooms were inserted.
pub fn seed_rooms<S: TrackerStore>(store: &mut S) -> Result<usize> {
    let mut inserted = 0;
    for room in demo_rooms() {
        if store.room(&room.room_id)?.is_some() {
            debug!("room {} already present, skipping", room.room_id);
            continue;
        }
        store.insert_room(room)?;
        inserted += 1;
    }
    info!("seeded {} rooms", inserted);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_seed_inserts_full_floor_plan() {
        let mut store = MemoryStore::new();
        assert_eq!(seed_rooms(&mut store).unwrap(), 9);
        assert_eq!(store.rooms().unwrap().len(), 9);

        let entrance = store.room("ENTRADA").unwrap().unwrap();
        assert_eq!(entrance.connections, vec!["SALON"]);
        assert_eq!(entrance.current_occupancy, 0);
    }

    #[test]
    fn test_reseeding_preserves_existing_state() {
        let mut store = MemoryStore::new();
        seed_rooms(&mut store).unwrap();
        store.increment_occupancy("SALON").unwrap();

        assert_eq!(seed_rooms(&mut store).unwrap(), 0);
        assert_eq!(store.room("SALON").unwrap().unwrap().current_occupancy, 1);
    }

    #[test]
    fn test_connections_are_symmetric() {
        let rooms = demo_rooms();
        for room in &rooms {
            for neighbor_id in &room.connections {
                let neighbor = rooms
                    .iter()
                    .find(|r| &r.room_id == neighbor_id)
                    .unwrap_or_else(|| panic!("unknown neighbor {}", neighbor_id));
                assert!(
                    neighbor.connections.contains(&room.room_id),
                    "{} -> {} is one-way",
                    room.room_id,
                    neighbor_id
                );
            }
        }
    }
}
