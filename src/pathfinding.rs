//! Pathfinding over the tile grid.
//!
//! A*, Dijkstra (A* with a zero heuristic) and breadth-first search, plus a
//! flow-field builder, Bresenham line-of-sight and path smoothing. Repeated
//! searches are served from a bounded LRU cache.

use bevy_ecs::prelude::Resource;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::time::Instant;

use crate::grid::{Grid, TileKind};

/// Search algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    AStar,
    Dijkstra,
    Bfs,
}

/// Heuristic used by A*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heuristic {
    Manhattan,
    Euclidean,
    /// Chebyshev-style diagonal distance.
    Diagonal,
    /// Turns A* into Dijkstra.
    Zero,
}

impl Heuristic {
    fn estimate(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> f32 {
        let dx = (x1 - x2).abs() as f32;
        let dy = (y1 - y2).abs() as f32;
        match self {
            Heuristic::Manhattan => dx + dy,
            Heuristic::Euclidean => (dx * dx + dy * dy).sqrt(),
            Heuristic::Diagonal => {
                dx.max(dy) + (std::f32::consts::SQRT_2 - 1.0) * dx.min(dy)
            }
            Heuristic::Zero => 0.0,
        }
    }
}

/// Constraints applied during neighbor expansion.
pub struct Constraints {
    pub allow_diagonal: bool,
    pub diagonal_cost_multiplier: f32,
    pub max_slope: f32,
    pub can_cross_water: bool,
    /// Required free tiles around the path; 1 means the path tiles themselves.
    pub min_clearance: i32,
    pub max_search_nodes: usize,
    /// Wall-clock budget in seconds; infinite by default so searches stay
    /// deterministic.
    pub max_computation_time: f32,
    pub walkable_filter: Option<Box<dyn Fn(i32, i32) -> bool + Send + Sync>>,
    pub cost_modifier: Option<Box<dyn Fn(i32, i32) -> f32 + Send + Sync>>,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            allow_diagonal: false,
            diagonal_cost_multiplier: std::f32::consts::SQRT_2,
            max_slope: f32::INFINITY,
            can_cross_water: false,
            min_clearance: 1,
            max_search_nodes: 10_000,
            max_computation_time: f32::INFINITY,
            walkable_filter: None,
            cost_modifier: None,
        }
    }
}

impl Constraints {
    fn has_custom_rules(&self) -> bool {
        self.walkable_filter.is_some() || self.cost_modifier.is_some()
    }
}

/// Outcome of one search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathResult {
    pub path: Vec<(i32, i32)>,
    pub cost: f32,
    pub nodes_explored: usize,
    pub computation_time: f32,
    pub algorithm: Option<Algorithm>,
    pub success: bool,
}

impl PathResult {
    fn failure(nodes_explored: usize) -> Self {
        Self {
            cost: f32::INFINITY,
            nodes_explored,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// Convert the grid path into world-space waypoints (tile centres).
    pub fn world_waypoints(&self, grid: &Grid) -> Vec<(f32, f32)> {
        self.path
            .iter()
            .map(|&(x, y)| grid.grid_to_world(x, y))
            .collect()
    }
}

/// Open-set entry; ordered so the heap pops the lowest `(f, h)` first.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OpenNode {
    f_cost: f32,
    h_cost: f32,
    pos: (i32, i32),
}

impl Eq for OpenNode {}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we need the minimum.
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then(other.h_cost.total_cmp(&self.h_cost))
            .then(other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    start: (i32, i32),
    goal: (i32, i32),
    algorithm: Algorithm,
    heuristic: Heuristic,
    allow_diagonal: bool,
}

/// Aggregate search statistics.
#[derive(Debug, Clone, Default)]
pub struct PathStats {
    pub total_searches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub average_nodes_explored: f64,
    pub average_computation_time: f64,
}

impl PathStats {
    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_searches == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_searches as f64
        }
    }
}

/// Pathfinder with a bounded LRU result cache. Grid access goes through the
/// `&Grid` argument so callers keep ownership of the map; the grid must not
/// be mutated from inside a constraint callback.
#[derive(Resource)]
pub struct Pathfinder {
    cache: HashMap<CacheKey, PathResult>,
    lru: VecDeque<CacheKey>,
    cache_enabled: bool,
    cache_capacity: usize,
    pub stats: PathStats,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pathfinder {
    pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            lru: VecDeque::new(),
            cache_enabled: true,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            stats: PathStats::default(),
        }
    }

    /// Find a path between two cells.
    pub fn find_path(
        &mut self,
        grid: &Grid,
        start: (i32, i32),
        goal: (i32, i32),
        algorithm: Algorithm,
        heuristic: Heuristic,
        constraints: &Constraints,
    ) -> PathResult {
        let started = Instant::now();

        if !self.validate_endpoints(grid, start, goal, constraints) {
            let mut result = PathResult::failure(0);
            result.algorithm = Some(algorithm);
            result.computation_time = started.elapsed().as_secs_f32();
            return result;
        }

        // Custom callbacks make results position-dependent in ways the cache
        // key cannot express, so such searches bypass the cache.
        let cacheable = self.cache_enabled && !constraints.has_custom_rules();
        let key = CacheKey {
            start,
            goal,
            algorithm,
            heuristic,
            allow_diagonal: constraints.allow_diagonal,
        };

        if cacheable {
            if let Some(result) = self.cache_get(&key) {
                self.stats.cache_hits += 1;
                return result;
            }
            self.stats.cache_misses += 1;
        }

        let mut result = match algorithm {
            Algorithm::AStar => self.a_star(grid, start, goal, heuristic, constraints),
            Algorithm::Dijkstra => self.a_star(grid, start, goal, Heuristic::Zero, constraints),
            Algorithm::Bfs => self.bfs(grid, start, goal, constraints),
        };
        result.algorithm = Some(algorithm);
        result.computation_time = started.elapsed().as_secs_f32();

        self.update_stats(&result);

        if cacheable && result.success {
            self.cache_put(key, result.clone());
        }
        result
    }

    fn validate_endpoints(
        &self,
        grid: &Grid,
        start: (i32, i32),
        goal: (i32, i32),
        constraints: &Constraints,
    ) -> bool {
        if !grid.in_bounds(start.0, start.1) {
            warn!("pathfinding start out of bounds: {start:?}");
            return false;
        }
        if !grid.in_bounds(goal.0, goal.1) {
            warn!("pathfinding goal out of bounds: {goal:?}");
            return false;
        }
        let goal_walkable = grid.is_walkable(goal.0, goal.1)
            || (constraints.can_cross_water && grid.get_tile(goal.0, goal.1) == TileKind::Water);
        if !goal_walkable {
            warn!("pathfinding goal not walkable: {goal:?}");
            return false;
        }
        true
    }

    // ========================================================================
    // ALGORITHMS
    // ========================================================================

    fn a_star(
        &self,
        grid: &Grid,
        start: (i32, i32),
        goal: (i32, i32),
        heuristic: Heuristic,
        constraints: &Constraints,
    ) -> PathResult {
        let mut open = BinaryHeap::new();
        let mut g_scores: HashMap<(i32, i32), f32> = HashMap::new();
        let mut parents: HashMap<(i32, i32), (i32, i32)> = HashMap::new();

        let h0 = heuristic.estimate(start.0, start.1, goal.0, goal.1);
        open.push(OpenNode {
            f_cost: h0,
            h_cost: h0,
            pos: start,
        });
        g_scores.insert(start, 0.0);

        let mut nodes_explored = 0usize;
        let started = Instant::now();

        while let Some(node) = open.pop() {
            if nodes_explored >= constraints.max_search_nodes {
                return PathResult::failure(nodes_explored);
            }
            // Amortised timeout check.
            if nodes_explored % 64 == 0
                && constraints.max_computation_time.is_finite()
                && started.elapsed().as_secs_f32() > constraints.max_computation_time
            {
                return PathResult::failure(nodes_explored);
            }

            let pos = node.pos;
            let g = g_scores[&pos];
            // Stale heap entry superseded by a better route.
            if node.f_cost - node.h_cost > g + 1e-6 {
                continue;
            }

            if pos == goal {
                return PathResult {
                    path: reconstruct(&parents, start, goal),
                    cost: g,
                    nodes_explored,
                    computation_time: 0.0,
                    algorithm: None,
                    success: true,
                };
            }
            nodes_explored += 1;

            for (nx, ny, move_cost) in self.neighbors(grid, pos.0, pos.1, constraints) {
                let tentative = g + move_cost;
                let known = g_scores.get(&(nx, ny)).copied().unwrap_or(f32::INFINITY);
                if tentative < known {
                    g_scores.insert((nx, ny), tentative);
                    parents.insert((nx, ny), pos);
                    let h = heuristic.estimate(nx, ny, goal.0, goal.1);
                    open.push(OpenNode {
                        f_cost: tentative + h,
                        h_cost: h,
                        pos: (nx, ny),
                    });
                }
            }
        }

        PathResult::failure(nodes_explored)
    }

    fn bfs(
        &self,
        grid: &Grid,
        start: (i32, i32),
        goal: (i32, i32),
        constraints: &Constraints,
    ) -> PathResult {
        let mut queue = VecDeque::new();
        let mut parents: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
        let mut visited: HashMap<(i32, i32), ()> = HashMap::new();

        queue.push_back(start);
        visited.insert(start, ());
        let mut nodes_explored = 0usize;

        while let Some(pos) = queue.pop_front() {
            if nodes_explored >= constraints.max_search_nodes {
                return PathResult::failure(nodes_explored);
            }
            nodes_explored += 1;

            if pos == goal {
                let path = reconstruct(&parents, start, goal);
                return PathResult {
                    cost: (path.len().saturating_sub(1)) as f32,
                    path,
                    nodes_explored,
                    computation_time: 0.0,
                    algorithm: None,
                    success: true,
                };
            }

            for (nx, ny, _) in self.neighbors(grid, pos.0, pos.1, constraints) {
                if !visited.contains_key(&(nx, ny)) {
                    visited.insert((nx, ny), ());
                    parents.insert((nx, ny), pos);
                    queue.push_back((nx, ny));
                }
            }
        }

        PathResult::failure(nodes_explored)
    }

    // ========================================================================
    // NEIGHBOR EXPANSION
    // ========================================================================

    /// Valid moves from a cell with their costs. Orthogonal moves first,
    /// then diagonals when allowed.
    fn neighbors(
        &self,
        grid: &Grid,
        x: i32,
        y: i32,
        constraints: &Constraints,
    ) -> Vec<(i32, i32, f32)> {
        let mut result = Vec::with_capacity(8);

        for (dx, dy) in [(0, 1), (1, 0), (0, -1), (-1, 0)] {
            if let Some(cost) = self.move_cost(grid, x, y, x + dx, y + dy, constraints) {
                result.push((x + dx, y + dy, cost));
            }
        }
        if constraints.allow_diagonal {
            for (dx, dy) in [(1, 1), (1, -1), (-1, 1), (-1, -1)] {
                if let Some(cost) = self.move_cost(grid, x, y, x + dx, y + dy, constraints) {
                    result.push((
                        x + dx,
                        y + dy,
                        cost * constraints.diagonal_cost_multiplier,
                    ));
                }
            }
        }
        result
    }

    /// Cost of stepping onto `(to_x, to_y)`, or None when the move is not
    /// allowed.
    fn move_cost(
        &self,
        grid: &Grid,
        from_x: i32,
        from_y: i32,
        to_x: i32,
        to_y: i32,
        constraints: &Constraints,
    ) -> Option<f32> {
        if !grid.in_bounds(to_x, to_y) {
            return None;
        }

        let walkable = grid.is_walkable(to_x, to_y);
        let fordable = constraints.can_cross_water
            && grid.get_tile(to_x, to_y) == TileKind::Water;
        if !walkable && !fordable {
            return None;
        }

        if let Some(filter) = &constraints.walkable_filter {
            if !filter(to_x, to_y) {
                return None;
            }
        }

        if constraints.max_slope.is_finite() {
            let delta = (grid.properties(to_x, to_y).elevation
                - grid.properties(from_x, from_y).elevation)
                .abs();
            if delta > constraints.max_slope {
                return None;
            }
        }

        // Water carries an infinite terrain cost; crossing it when allowed
        // costs as much as open ground.
        let mut cost = if walkable {
            grid.movement_cost(to_x, to_y)
        } else {
            1.0
        };
        if let Some(modifier) = &constraints.cost_modifier {
            cost *= modifier(to_x, to_y);
        }
        Some(cost)
    }

    // ========================================================================
    // CACHE
    // ========================================================================

    fn cache_get(&mut self, key: &CacheKey) -> Option<PathResult> {
        if let Some(result) = self.cache.get(key) {
            let result = result.clone();
            // Refresh recency.
            if let Some(idx) = self.lru.iter().position(|k| k == key) {
                self.lru.remove(idx);
                self.lru.push_back(key.clone());
            }
            Some(result)
        } else {
            None
        }
    }

    fn cache_put(&mut self, key: CacheKey, result: PathResult) {
        while self.cache.len() >= self.cache_capacity {
            if let Some(oldest) = self.lru.pop_front() {
                self.cache.remove(&oldest);
            } else {
                break;
            }
        }
        self.lru.push_back(key.clone());
        self.cache.insert(key, result);
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.lru.clear();
        debug!("path cache cleared");
    }

    /// Drop every cached result; call after any grid mutation.
    pub fn invalidate_cache(&mut self) {
        self.clear_cache();
    }

    pub fn set_cache_enabled(&mut self, enabled: bool) {
        self.cache_enabled = enabled;
        if !enabled {
            self.clear_cache();
        }
    }

    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache_capacity = capacity.max(1);
        while self.cache.len() > self.cache_capacity {
            if let Some(oldest) = self.lru.pop_front() {
                self.cache.remove(&oldest);
            }
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn update_stats(&mut self, result: &PathResult) {
        self.stats.total_searches += 1;
        let n = self.stats.total_searches as f64;
        self.stats.average_nodes_explored =
            (self.stats.average_nodes_explored * (n - 1.0) + result.nodes_explored as f64) / n;
        self.stats.average_computation_time =
            (self.stats.average_computation_time * (n - 1.0) + result.computation_time as f64) / n;
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Paths from one start to several goals.
    pub fn find_multiple_paths(
        &mut self,
        grid: &Grid,
        start: (i32, i32),
        goals: &[(i32, i32)],
        algorithm: Algorithm,
    ) -> Vec<PathResult> {
        goals
            .iter()
            .map(|&goal| {
                self.find_path(
                    grid,
                    start,
                    goal,
                    algorithm,
                    Heuristic::Manhattan,
                    &Constraints::default(),
                )
            })
            .collect()
    }

    /// Cheapest successful path among several goals, if any.
    pub fn find_nearest_accessible_goal(
        &mut self,
        grid: &Grid,
        start: (i32, i32),
        goals: &[(i32, i32)],
        algorithm: Algorithm,
    ) -> Option<PathResult> {
        self.find_multiple_paths(grid, start, goals, algorithm)
            .into_iter()
            .filter(|r| r.success)
            .min_by(|a, b| a.cost.total_cmp(&b.cost))
    }

    /// Straight-line visibility between two cells (Bresenham over walkable
    /// tiles).
    pub fn line_of_sight(
        &self,
        grid: &Grid,
        start: (i32, i32),
        end: (i32, i32),
        constraints: &Constraints,
    ) -> bool {
        let (mut x, mut y) = start;
        let (x1, y1) = end;
        let dx = (x1 - x).abs();
        let dy = (y1 - y).abs();
        let step_x = if x < x1 { 1 } else { -1 };
        let step_y = if y < y1 { 1 } else { -1 };
        let mut error = dx - dy;

        loop {
            if self.move_cost(grid, x, y, x, y, constraints).is_none() {
                return false;
            }
            if x == x1 && y == y1 {
                break;
            }
            let error2 = 2 * error;
            if error2 > -dy {
                error -= dy;
                x += step_x;
            }
            if error2 < dx {
                error += dx;
                y += step_y;
            }
        }
        true
    }

    /// Greedy smoothing: keep jumping to the farthest waypoint still in
    /// direct sight. Never lengthens a path made of unit steps.
    pub fn smooth_path(
        &self,
        grid: &Grid,
        path: &[(i32, i32)],
        constraints: &Constraints,
    ) -> Vec<(i32, i32)> {
        if path.len() <= 2 {
            return path.to_vec();
        }

        let mut smoothed = vec![path[0]];
        let mut current = 0usize;

        while current < path.len() - 1 {
            let mut farthest = current + 1;
            for i in (current + 2)..path.len() {
                if self.line_of_sight(grid, path[current], path[i], constraints) {
                    farthest = i;
                } else {
                    break;
                }
            }
            smoothed.push(path[farthest]);
            current = farthest;
        }
        smoothed
    }

    /// Build a flow field toward `goal`: for each reachable cell, the grid
    /// step leading one tile closer to the goal. Reverse Dijkstra from the
    /// goal.
    pub fn flow_field(
        &self,
        grid: &Grid,
        goal: (i32, i32),
        constraints: &Constraints,
    ) -> HashMap<(i32, i32), (i32, i32)> {
        let mut distances: HashMap<(i32, i32), f32> = HashMap::new();
        let mut field: HashMap<(i32, i32), (i32, i32)> = HashMap::new();
        let mut open = BinaryHeap::new();

        distances.insert(goal, 0.0);
        open.push(OpenNode {
            f_cost: 0.0,
            h_cost: 0.0,
            pos: goal,
        });

        while let Some(node) = open.pop() {
            let pos = node.pos;
            let dist = distances[&pos];
            if node.f_cost > dist + 1e-6 {
                continue;
            }

            for (nx, ny, move_cost) in self.neighbors(grid, pos.0, pos.1, constraints) {
                let new_dist = dist + move_cost;
                let known = distances.get(&(nx, ny)).copied().unwrap_or(f32::INFINITY);
                if new_dist < known {
                    distances.insert((nx, ny), new_dist);
                    // Point back toward the cell that leads to the goal.
                    field.insert((nx, ny), (pos.0 - nx, pos.1 - ny));
                    open.push(OpenNode {
                        f_cost: new_dist,
                        h_cost: 0.0,
                        pos: (nx, ny),
                    });
                }
            }
        }
        field
    }
}

/// Remove interior waypoints that sit on a straight segment.
pub fn remove_redundant_points(path: &[(i32, i32)]) -> Vec<(i32, i32)> {
    if path.len() <= 2 {
        return path.to_vec();
    }
    let mut optimized = vec![path[0]];
    for i in 1..path.len() - 1 {
        let (x1, y1) = path[i - 1];
        let (x2, y2) = path[i];
        let (x3, y3) = path[i + 1];
        let cross = (y2 - y1) * (x3 - x2) - (y3 - y2) * (x2 - x1);
        if cross != 0 {
            optimized.push(path[i]);
        }
    }
    optimized.push(path[path.len() - 1]);
    optimized
}

fn reconstruct(
    parents: &HashMap<(i32, i32), (i32, i32)>,
    start: (i32, i32),
    goal: (i32, i32),
) -> Vec<(i32, i32)> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parents.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::TileKind;

    fn open_grid(w: i32, h: i32) -> Grid {
        Grid::new(w, h, 32.0)
    }

    fn walled_grid() -> Grid {
        // Vertical wall at x=4 with a gap at y=7.
        let mut grid = open_grid(10, 10);
        for y in 0..10 {
            if y != 7 {
                grid.set_tile(4, y, TileKind::Wall);
            }
        }
        grid
    }

    #[test]
    fn test_straight_path() {
        let grid = open_grid(10, 10);
        let mut pf = Pathfinder::new();
        let result = pf.find_path(
            &grid,
            (0, 0),
            (9, 0),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(result.success);
        assert_eq!(result.path.len(), 10);
        assert!((result.cost - 9.0).abs() < 0.001);
    }

    #[test]
    fn test_path_routes_around_walls() {
        let grid = walled_grid();
        let mut pf = Pathfinder::new();
        let result = pf.find_path(
            &grid,
            (0, 0),
            (9, 0),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(result.success);
        // Must pass through the single gap at (4, 7).
        assert!(result.path.contains(&(4, 7)));
    }

    #[test]
    fn test_no_path_reports_failure() {
        let mut grid = open_grid(8, 8);
        for y in 0..8 {
            grid.set_tile(3, y, TileKind::Wall);
        }
        let mut pf = Pathfinder::new();
        let result = pf.find_path(
            &grid,
            (0, 0),
            (7, 0),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(!result.success);
        assert!(result.nodes_explored > 0);
        assert!(result.path.is_empty());
    }

    #[test]
    fn test_zero_node_budget_fails_immediately() {
        let grid = open_grid(8, 8);
        let mut pf = Pathfinder::new();
        let constraints = Constraints {
            max_search_nodes: 0,
            ..Default::default()
        };
        let result = pf.find_path(
            &grid,
            (0, 0),
            (7, 7),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &constraints,
        );
        assert!(!result.success);
        assert_eq!(result.nodes_explored, 0);
    }

    #[test]
    fn test_astar_matches_dijkstra_on_unit_grid() {
        let grid = walled_grid();
        let mut pf = Pathfinder::new();
        pf.set_cache_enabled(false);
        let a = pf.find_path(
            &grid,
            (0, 0),
            (9, 9),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        let d = pf.find_path(
            &grid,
            (0, 0),
            (9, 9),
            Algorithm::Dijkstra,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(a.success && d.success);
        assert!((a.cost - d.cost).abs() < 0.001);
    }

    #[test]
    fn test_bfs_finds_fewest_steps() {
        let grid = open_grid(6, 6);
        let mut pf = Pathfinder::new();
        let result = pf.find_path(
            &grid,
            (0, 0),
            (5, 5),
            Algorithm::Bfs,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(result.success);
        assert_eq!(result.path.len(), 11);
        assert!((result.cost - 10.0).abs() < 0.001);
    }

    #[test]
    fn test_diagonal_movement_costs_more() {
        let grid = open_grid(6, 6);
        let mut pf = Pathfinder::new();
        let constraints = Constraints {
            allow_diagonal: true,
            ..Default::default()
        };
        let result = pf.find_path(
            &grid,
            (0, 0),
            (5, 5),
            Algorithm::AStar,
            Heuristic::Diagonal,
            &constraints,
        );
        assert!(result.success);
        assert_eq!(result.path.len(), 6);
        assert!((result.cost - 5.0 * std::f32::consts::SQRT_2).abs() < 0.01);
    }

    #[test]
    fn test_water_crossing_gated_by_constraint() {
        let mut grid = open_grid(8, 3);
        for y in 0..3 {
            grid.set_tile(4, y, TileKind::Water);
        }
        let mut pf = Pathfinder::new();

        let blocked = pf.find_path(
            &grid,
            (0, 1),
            (7, 1),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &Constraints::default(),
        );
        assert!(!blocked.success);

        let amphibious = Constraints {
            can_cross_water: true,
            ..Default::default()
        };
        let crossed = pf.find_path(
            &grid,
            (0, 1),
            (7, 1),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &amphibious,
        );
        assert!(crossed.success);
        assert!(crossed.path.contains(&(4, 1)));
    }

    #[test]
    fn test_max_slope_blocks_cliffs() {
        let mut grid = open_grid(4, 1);
        let mut props = grid.properties(2, 0);
        props.elevation = 10.0;
        grid.set_properties(2, 0, props);

        let mut pf = Pathfinder::new();
        let constraints = Constraints {
            max_slope: 1.0,
            ..Default::default()
        };
        let result = pf.find_path(
            &grid,
            (0, 0),
            (3, 0),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &constraints,
        );
        assert!(!result.success);
    }

    #[test]
    fn test_custom_walkable_filter() {
        let grid = open_grid(6, 6);
        let mut pf = Pathfinder::new();
        let constraints = Constraints {
            walkable_filter: Some(Box::new(|x, _| x != 3)),
            ..Default::default()
        };
        let result = pf.find_path(
            &grid,
            (0, 0),
            (5, 0),
            Algorithm::AStar,
            Heuristic::Manhattan,
            &constraints,
        );
        // Column 3 is fully filtered out; no way across.
        assert!(!result.success);
    }

    #[test]
    fn test_cache_hits_and_lru_eviction() {
        let grid = open_grid(10, 10);
        let mut pf = Pathfinder::new();
        pf.set_cache_capacity(2);

        let c = Constraints::default();
        pf.find_path(&grid, (0, 0), (5, 0), Algorithm::AStar, Heuristic::Manhattan, &c);
        assert_eq!(pf.stats.cache_misses, 1);

        pf.find_path(&grid, (0, 0), (5, 0), Algorithm::AStar, Heuristic::Manhattan, &c);
        assert_eq!(pf.stats.cache_hits, 1);
        // A cache hit does not count as a search.
        assert_eq!(pf.stats.total_searches, 1);

        pf.find_path(&grid, (0, 0), (6, 0), Algorithm::AStar, Heuristic::Manhattan, &c);
        pf.find_path(&grid, (0, 0), (7, 0), Algorithm::AStar, Heuristic::Manhattan, &c);
        assert_eq!(pf.cache_len(), 2);

        pf.clear_cache();
        assert_eq!(pf.cache_len(), 0);
    }

    #[test]
    fn test_line_of_sight() {
        let mut grid = open_grid(10, 10);
        let pf = Pathfinder::new();
        let c = Constraints::default();
        assert!(pf.line_of_sight(&grid, (0, 0), (9, 9), &c));

        grid.set_tile(5, 5, TileKind::Wall);
        assert!(!pf.line_of_sight(&grid, (0, 0), (9, 9), &c));
        assert!(pf.line_of_sight(&grid, (0, 0), (9, 0), &c));
    }

    #[test]
    fn test_smoothing_straightens_detours() {
        let grid = open_grid(10, 10);
        let pf = Pathfinder::new();
        let c = Constraints::default();
        // Staircase path from (0,0) to (4,4).
        let path = vec![
            (0, 0),
            (1, 0),
            (1, 1),
            (2, 1),
            (2, 2),
            (3, 2),
            (3, 3),
            (4, 3),
            (4, 4),
        ];
        let smoothed = pf.smooth_path(&grid, &path, &c);
        assert!(smoothed.len() <= path.len());
        assert_eq!(smoothed.first(), Some(&(0, 0)));
        assert_eq!(smoothed.last(), Some(&(4, 4)));
    }

    #[test]
    fn test_remove_redundant_points() {
        let path = vec![(0, 0), (1, 0), (2, 0), (3, 0), (3, 1), (3, 2)];
        let optimized = remove_redundant_points(&path);
        assert_eq!(optimized, vec![(0, 0), (3, 0), (3, 2)]);
    }

    #[test]
    fn test_flow_field_points_toward_goal() {
        let grid = open_grid(6, 6);
        let pf = Pathfinder::new();
        let field = pf.flow_field(&grid, (5, 5), &Constraints::default());

        // Every cell except the goal has a direction.
        assert_eq!(field.len(), 35);
        // Following the field from any cell reaches the goal.
        let mut pos = (0, 0);
        for _ in 0..64 {
            if pos == (5, 5) {
                break;
            }
            let step = field[&pos];
            pos = (pos.0 + step.0, pos.1 + step.1);
        }
        assert_eq!(pos, (5, 5));
    }

    #[test]
    fn test_nearest_accessible_goal() {
        let mut grid = open_grid(10, 10);
        // Wall off (9, 9).
        grid.set_tile(8, 9, TileKind::Wall);
        grid.set_tile(9, 8, TileKind::Wall);
        grid.set_tile(8, 8, TileKind::Wall);

        let mut pf = Pathfinder::new();
        let best = pf
            .find_nearest_accessible_goal(
                &grid,
                (0, 0),
                &[(9, 9), (5, 0), (0, 7)],
                Algorithm::AStar,
            )
            .unwrap();
        assert_eq!(best.path.last(), Some(&(5, 0)));
    }
}
