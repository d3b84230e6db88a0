//! Shortest paths over the hex grid
//!
//! Dijkstra search with a caller-supplied directed edge weight. The search
//! is confined to tiles within a fixed L1 distance of the goal; goals
//! further away than that count as unreachable.

use ahash::AHashMap;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::hex::coord::HexCoord;

/// Travel cost of a single edge
pub type DistanceT = u32;

/// A found path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Tiles to step onto in order, excluding the start and ending
    /// with the goal. Empty if start and goal coincide.
    pub steps: Vec<HexCoord>,
    /// Sum of all edge weights along the steps
    pub cost: u64,
}

impl Path {
    pub fn is_trivial(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Node in the open set
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathNode {
    coord: HexCoord,
    cost: u64,
}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap; ties by coordinate keep the
        // expansion order fully deterministic
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Path search towards a fixed goal
#[derive(Debug, Clone)]
pub struct PathFinder {
    goal: HexCoord,
    max_distance: u32,
}

impl PathFinder {
    pub fn new(goal: HexCoord, max_distance: u32) -> Self {
        Self { goal, max_distance }
    }

    pub fn goal(&self) -> HexCoord {
        self.goal
    }

    fn in_range(&self, c: &HexCoord) -> bool {
        c.distance_l1(&self.goal) <= self.max_distance
    }

    /// Find the cheapest path from `start` to the goal
    ///
    /// `edges(from, to)` returns the cost of stepping between two
    /// neighbouring tiles, or `None` if there is no connection.
    /// Returns `None` if the goal cannot be reached within the search
    /// range; a start equal to the goal yields an empty path.
    pub fn find<F>(&self, start: HexCoord, edges: F) -> Option<Path>
    where
        F: Fn(&HexCoord, &HexCoord) -> Option<DistanceT>,
    {
        if start == self.goal {
            return Some(Path {
                steps: Vec::new(),
                cost: 0,
            });
        }
        if !self.in_range(&start) {
            return None;
        }

        let mut open_set = BinaryHeap::new();
        let mut came_from: AHashMap<HexCoord, HexCoord> = AHashMap::new();
        let mut best: AHashMap<HexCoord, u64> = AHashMap::new();

        best.insert(start, 0);
        open_set.push(PathNode {
            coord: start,
            cost: 0,
        });

        while let Some(current) = open_set.pop() {
            if current.coord == self.goal {
                return Some(Path {
                    steps: reconstruct_steps(&came_from, start, current.coord),
                    cost: current.cost,
                });
            }

            // Stale heap entry
            if best.get(&current.coord).is_some_and(|&c| c < current.cost) {
                continue;
            }

            for neighbour in current.coord.neighbours() {
                if !self.in_range(&neighbour) {
                    continue;
                }
                let Some(weight) = edges(&current.coord, &neighbour) else {
                    continue;
                };

                let tentative = current.cost + u64::from(weight);
                let known = best.get(&neighbour).copied().unwrap_or(u64::MAX);
                if tentative < known {
                    came_from.insert(neighbour, current.coord);
                    best.insert(neighbour, tentative);
                    open_set.push(PathNode {
                        coord: neighbour,
                        cost: tentative,
                    });
                }
            }
        }

        None
    }
}

/// Reconstruct the step list from the came_from map
fn reconstruct_steps(
    came_from: &AHashMap<HexCoord, HexCoord>,
    start: HexCoord,
    mut current: HexCoord,
) -> Vec<HexCoord> {
    let mut steps = Vec::new();
    while current != start {
        steps.push(current);
        match came_from.get(&current) {
            Some(&prev) => current = prev,
            None => break,
        }
    }
    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(dist: DistanceT) -> impl Fn(&HexCoord, &HexCoord) -> Option<DistanceT> {
        move |_, _| Some(dist)
    }

    /// Tiles with x == -1 are impassable
    fn with_wall(dist: DistanceT) -> impl Fn(&HexCoord, &HexCoord) -> Option<DistanceT> {
        move |from, to| {
            if from.x == -1 || to.x == -1 {
                None
            } else {
                Some(dist)
            }
        }
    }

    #[test]
    fn test_same_start_and_goal() {
        let goal = HexCoord::new(5, 5);
        let path = PathFinder::new(goal, 100).find(goal, uniform(1)).unwrap();
        assert!(path.is_trivial());
        assert_eq!(path.cost, 0);
    }

    #[test]
    fn test_straight_line() {
        let goal = HexCoord::new(5, 0);
        let path = PathFinder::new(goal, 100)
            .find(HexCoord::new(0, 0), uniform(2))
            .unwrap();
        assert_eq!(path.steps.len(), 5);
        assert_eq!(path.steps.last(), Some(&goal));
        assert_eq!(path.cost, 10);

        let mut prev = HexCoord::new(0, 0);
        for s in &path.steps {
            assert!(prev.is_neighbour(s));
            prev = *s;
        }
    }

    #[test]
    fn test_around_obstacle() {
        let blocked = HexCoord::new(2, 0);
        let edges = move |_: &HexCoord, to: &HexCoord| {
            if *to == blocked {
                None
            } else {
                Some(1)
            }
        };
        let path = PathFinder::new(HexCoord::new(4, 0), 100)
            .find(HexCoord::new(0, 0), edges)
            .unwrap();
        assert!(!path.steps.contains(&blocked));
        // One detour tile at most on a hex grid
        assert_eq!(path.cost, 5);
    }

    #[test]
    fn test_prefers_cheap_edges() {
        // Direct row is expensive, the row below is cheap
        let edges = |_: &HexCoord, to: &HexCoord| if to.y == 0 { Some(10) } else { Some(1) };
        let path = PathFinder::new(HexCoord::new(6, 0), 100)
            .find(HexCoord::new(0, 0), edges)
            .unwrap();
        assert!(path.cost < 60);
    }

    #[test]
    fn test_unreachable_behind_wall() {
        let path = PathFinder::new(HexCoord::new(-2, 5), 20).find(HexCoord::new(0, 5), with_wall(1));
        assert!(path.is_none());
    }

    #[test]
    fn test_too_far_is_unreachable() {
        let finder = PathFinder::new(HexCoord::new(101, 0), 100);
        assert!(finder.find(HexCoord::new(0, 0), uniform(1)).is_none());
        let finder = PathFinder::new(HexCoord::new(100, 0), 100);
        assert!(finder.find(HexCoord::new(0, 0), uniform(1)).is_some());
    }

    #[test]
    fn test_deterministic_tie_breaking() {
        let finder = PathFinder::new(HexCoord::new(4, 3), 50);
        let a = finder.find(HexCoord::new(0, 0), uniform(1)).unwrap();
        let b = finder.find(HexCoord::new(0, 0), uniform(1)).unwrap();
        assert_eq!(a, b);
    }
}
