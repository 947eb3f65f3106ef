//! Room connectivity graph and traversals.
//!
//! The graph is an adjacency-list snapshot built fresh from the room
//! collection on every route request, so structural changes (new rooms or
//! connections) are reflected immediately without a cache to invalidate.
//! Traversals visit each room at most once and always terminate, including
//! on cyclic graphs, self-loops, and duplicate edges.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::Room;

/// Adjacency-list snapshot of the room connectivity graph.
///
/// # Example
/// ```
/// use indoor_tracker::{Room, RoomGraph};
///
/// let rooms = vec![
///     Room::new("A", "A", "poi_a", vec!["B".to_string()]),
///     Room::new("B", "B", "poi_b", vec!["A".to_string()]),
/// ];
///
/// let graph = RoomGraph::from_rooms(&rooms);
/// assert_eq!(graph.bfs("A"), vec!["A", "B"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoomGraph {
    adjacency: HashMap<String, Vec<String>>,
}

impl RoomGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            adjacency: HashMap::new(),
        }
    }

    /// Build the adjacency snapshot from the full room collection.
    ///
    /// Connections are taken verbatim; a room with no connections gets an
    /// empty neighbor list.
    pub fn from_rooms(rooms: &[Room]) -> Self {
        let mut adjacency = HashMap::with_capacity(rooms.len());
        for room in rooms {
            adjacency.insert(room.room_id.clone(), room.connections.clone());
        }
        Self { adjacency }
    }

    /// Neighbor list for a room, in stored order. Unknown rooms have no
    /// neighbors.
    pub fn neighbors(&self, room_id: &str) -> &[String] {
        self.adjacency.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the room is a node of the graph.
    pub fn contains(&self, room_id: &str) -> bool {
        self.adjacency.contains_key(room_id)
    }

    /// Number of rooms in the graph.
    pub fn len(&self) -> usize {
        self.adjacency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }

    /// Breadth-first visitation order from `start`.
    ///
    /// FIFO frontier; a room is marked visited when enqueued, so it is never
    /// re-enqueued or re-emitted. A `start` missing from the graph still
    /// yields `[start]`.
    pub fn bfs(&self, start: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();

        visited.insert(start.to_string());
        queue.push_back(start.to_string());

        while let Some(room) = queue.pop_front() {
            for neighbor in self.neighbors(&room) {
                if visited.insert(neighbor.clone()) {
                    queue.push_back(neighbor.clone());
                }
            }
            order.push(room);
        }

        order
    }

    /// Depth-first pre-order visitation from `start`, exploring neighbors in
    /// stored list order before backtracking.
    ///
    /// Implemented with an explicit work stack rather than recursion so the
    /// traversal depth is bounded by heap memory, not the call stack.
    /// Neighbors are pushed in reverse so they pop in list order.
    pub fn dfs(&self, start: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![start.to_string()];

        while let Some(room) = stack.pop() {
            if !visited.insert(room.clone()) {
                continue;
            }
            for neighbor in self.neighbors(&room).iter().rev() {
                if !visited.contains(neighbor) {
                    stack.push(neighbor.clone());
                }
            }
            order.push(room);
        }

        order
    }
}

/// Map an ordered room sequence to the POI of each room, preserving order
/// and silently dropping ids with no matching room record. The output is
/// therefore at most as long as the input.
pub fn rooms_to_pois(rooms: &[Room], route: &[String]) -> Vec<String> {
    let by_id: HashMap<&str, &Room> = rooms.iter().map(|r| (r.room_id.as_str(), r)).collect();

    route
        .iter()
        .filter_map(|room_id| by_id.get(room_id.as_str()).map(|r| r.poi_id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn room(id: &str, connections: &[&str]) -> Room {
        Room::new(
            id,
            id,
            format!("poi_{}", id.to_lowercase()),
            connections.iter().map(|c| c.to_string()).collect(),
        )
    }

    /// The demo floor plan used throughout the scenario tests.
    fn floor_plan() -> Vec<Room> {
        vec![
            room("ENTRADA", &["SALON"]),
            room("SALON", &["ENTRADA", "PASILLO"]),
            room("COCINA", &["PASILLO"]),
            room("HAB1", &["PASILLO"]),
            room("BAN1", &["PASILLO"]),
            room("BAN2", &["PASILLO"]),
            room("HAB2", &["PASILLO"]),
            room("HAB3", &["PASILLO"]),
            room(
                "PASILLO",
                &["SALON", "COCINA", "HAB1", "BAN1", "BAN2", "HAB2", "HAB3"],
            ),
        ]
    }

    #[test]
    fn test_bfs_order_from_entrance() {
        let graph = RoomGraph::from_rooms(&floor_plan());
        assert_eq!(
            graph.bfs("ENTRADA"),
            vec![
                "ENTRADA", "SALON", "PASILLO", "COCINA", "HAB1", "BAN1", "BAN2", "HAB2", "HAB3"
            ]
        );
    }

    #[test]
    fn test_dfs_preorder_from_entrance() {
        let graph = RoomGraph::from_rooms(&floor_plan());
        assert_eq!(
            graph.dfs("ENTRADA"),
            vec![
                "ENTRADA", "SALON", "PASILLO", "COCINA", "HAB1", "BAN1", "BAN2", "HAB2", "HAB3"
            ]
        );
    }

    #[test]
    fn test_traversals_visit_each_room_once() {
        let graph = RoomGraph::from_rooms(&floor_plan());

        for order in [graph.bfs("PASILLO"), graph.dfs("PASILLO")] {
            let unique: HashSet<&String> = order.iter().collect();
            assert_eq!(unique.len(), order.len());
            assert_eq!(order.len(), 9);
        }
    }

    #[test]
    fn test_unknown_start_yields_start_only() {
        let graph = RoomGraph::from_rooms(&floor_plan());
        assert_eq!(graph.bfs("SOTANO"), vec!["SOTANO"]);
        assert_eq!(graph.dfs("SOTANO"), vec!["SOTANO"]);
    }

    #[test]
    fn test_disconnected_room() {
        let rooms = vec![room("A", &["B"]), room("B", &["A"]), room("C", &[])];
        let graph = RoomGraph::from_rooms(&rooms);
        assert_eq!(graph.bfs("C"), vec!["C"]);
    }

    #[test]
    fn test_self_loop_terminates() {
        let rooms = vec![room("A", &["A", "B"]), room("B", &["B"])];
        let graph = RoomGraph::from_rooms(&rooms);
        assert_eq!(graph.bfs("A"), vec!["A", "B"]);
        assert_eq!(graph.dfs("A"), vec!["A", "B"]);
    }

    #[test]
    fn test_duplicate_edges_do_not_duplicate_visits() {
        let rooms = vec![room("A", &["B", "B", "B"]), room("B", &["A"])];
        let graph = RoomGraph::from_rooms(&rooms);
        assert_eq!(graph.bfs("A"), vec!["A", "B"]);
        assert_eq!(graph.dfs("A"), vec!["A", "B"]);
    }

    #[test]
    fn test_dfs_explores_branch_before_siblings() {
        // A -> [B, C], B -> [D]; pre-order must reach D before C
        let rooms = vec![
            room("A", &["B", "C"]),
            room("B", &["D"]),
            room("C", &[]),
            room("D", &[]),
        ];
        let graph = RoomGraph::from_rooms(&rooms);
        assert_eq!(graph.dfs("A"), vec!["A", "B", "D", "C"]);
        assert_eq!(graph.bfs("A"), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_rooms_to_pois_drops_unknown_and_preserves_order() {
        let rooms = floor_plan();
        let route = vec![
            "ENTRADA".to_string(),
            "DESVAN".to_string(),
            "SALON".to_string(),
        ];

        let pois = rooms_to_pois(&rooms, &route);
        assert_eq!(pois, vec!["poi_entrada", "poi_salon"]);
        assert!(pois.len() <= route.len());
    }
}
