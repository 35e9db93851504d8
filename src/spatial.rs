//! Spatial partitioning for radius queries over live enemies.
//!
//! Uniform hash over tile-sized cells, rebuilt once per tick. Queries return
//! entries sorted by distance with an ascending-id tiebreak so that targeting
//! is deterministic.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::{EnemyId, EnemyState, Health, Position};

/// Grid-based spatial partitioning structure.
#[derive(Resource, Debug)]
pub struct SpatialGrid {
    /// Cell size in world units.
    pub cell_size: f32,
    cells: HashMap<(i32, i32), Vec<SpatialEntry>>,
    count: usize,
}

/// Entry in a spatial cell.
#[derive(Debug, Clone, Copy)]
pub struct SpatialEntry {
    pub entity: Entity,
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub flying: bool,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self::new(32.0)
    }
}

impl SpatialGrid {
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size,
            cells: HashMap::new(),
            count: 0,
        }
    }

    #[inline]
    pub fn world_to_cell(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Clear all entries before rebuilding for a new tick.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.count = 0;
    }

    pub fn insert(&mut self, entity: Entity, id: u64, x: f32, y: f32, flying: bool) {
        let cell = self.world_to_cell(x, y);
        self.cells.entry(cell).or_default().push(SpatialEntry {
            entity,
            id,
            x,
            y,
            flying,
        });
        self.count += 1;
    }

    /// All entries within `radius` of a point, closest first; equal
    /// distances break on ascending id.
    pub fn query_radius(&self, x: f32, y: f32, radius: f32) -> Vec<SpatialEntry> {
        let radius_sq = radius * radius;
        let cells_to_check = (radius / self.cell_size).ceil() as i32 + 1;
        let centre = self.world_to_cell(x, y);

        let mut results = Vec::new();
        for dx in -cells_to_check..=cells_to_check {
            for dy in -cells_to_check..=cells_to_check {
                if let Some(entries) = self.cells.get(&(centre.0 + dx, centre.1 + dy)) {
                    for entry in entries {
                        let dist_sq = (entry.x - x).powi(2) + (entry.y - y).powi(2);
                        if dist_sq <= radius_sq {
                            results.push(*entry);
                        }
                    }
                }
            }
        }

        results.sort_by(|a, b| {
            let da = (a.x - x).powi(2) + (a.y - y).powi(2);
            let db = (b.x - x).powi(2) + (b.y - y).powi(2);
            da.total_cmp(&db).then(a.id.cmp(&b.id))
        });
        results
    }

    /// Radius query filtered on air/ground.
    pub fn query_radius_filtered(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        flying: Option<bool>,
    ) -> Vec<SpatialEntry> {
        let mut results = self.query_radius(x, y, radius);
        if let Some(flying) = flying {
            results.retain(|e| e.flying == flying);
        }
        results
    }

    /// Nearest entry to a point within `max_radius`, excluding listed ids.
    pub fn nearest_excluding(
        &self,
        x: f32,
        y: f32,
        max_radius: f32,
        exclude: &[u64],
    ) -> Option<SpatialEntry> {
        self.query_radius(x, y, max_radius)
            .into_iter()
            .find(|e| !exclude.contains(&e.id))
    }

    pub fn total_count(&self) -> usize {
        self.count
    }
}

/// System that rebuilds the spatial grid from live enemies each tick.
/// Dying and dead enemies are excluded so nothing can target them.
pub fn spatial_grid_update_system(
    mut grid: ResMut<SpatialGrid>,
    query: Query<(Entity, &EnemyId, &Position, &Health, &EnemyState, &crate::components::EnemyStats)>,
) {
    grid.clear();
    for (entity, id, pos, health, state, stats) in query.iter() {
        if !health.is_alive() || matches!(state, EnemyState::Dying | EnemyState::Dead) {
            continue;
        }
        grid.insert(entity, id.0, pos.x, pos.y, stats.is_flying);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_query() {
        let mut grid = SpatialGrid::new(32.0);
        grid.insert(Entity::from_raw(1), 1, 10.0, 10.0, false);
        grid.insert(Entity::from_raw(2), 2, 40.0, 10.0, false);
        grid.insert(Entity::from_raw(3), 3, 500.0, 500.0, true);

        let near = grid.query_radius(10.0, 10.0, 50.0);
        assert_eq!(near.len(), 2);
        assert_eq!(near[0].id, 1); // closest first

        let tight = grid.query_radius(10.0, 10.0, 5.0);
        assert_eq!(tight.len(), 1);
    }

    #[test]
    fn test_equal_distance_ties_break_on_id() {
        let mut grid = SpatialGrid::new(32.0);
        grid.insert(Entity::from_raw(9), 9, 20.0, 0.0, false);
        grid.insert(Entity::from_raw(4), 4, -20.0, 0.0, false);

        let results = grid.query_radius(0.0, 0.0, 30.0);
        assert_eq!(results[0].id, 4);
        assert_eq!(results[1].id, 9);
    }

    #[test]
    fn test_flying_filter() {
        let mut grid = SpatialGrid::new(32.0);
        grid.insert(Entity::from_raw(1), 1, 0.0, 0.0, false);
        grid.insert(Entity::from_raw(2), 2, 5.0, 0.0, true);

        let flyers = grid.query_radius_filtered(0.0, 0.0, 50.0, Some(true));
        assert_eq!(flyers.len(), 1);
        assert!(flyers[0].flying);

        let all = grid.query_radius_filtered(0.0, 0.0, 50.0, None);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_nearest_excluding() {
        let mut grid = SpatialGrid::new(32.0);
        grid.insert(Entity::from_raw(1), 1, 10.0, 0.0, false);
        grid.insert(Entity::from_raw(2), 2, 20.0, 0.0, false);

        let nearest = grid.nearest_excluding(0.0, 0.0, 100.0, &[1]).unwrap();
        assert_eq!(nearest.id, 2);
        assert!(grid.nearest_excluding(0.0, 0.0, 100.0, &[1, 2]).is_none());
    }
}
