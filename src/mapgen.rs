//! Procedural map generation.
//!
//! Produces a playable grid with one spawn and one base on opposite edges, a
//! widened main path between them, buildable placement zones and themed
//! decorations. All randomness flows through a single seeded ChaCha8 stream
//! in a fixed phase order, so a seed fully determines the map.

use bevy_ecs::prelude::Resource;
use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::GridConfig;
use crate::error::{SimError, SimResult};
use crate::grid::{Grid, TileKind};

/// Visual theme; picks the decoration tables and the post-pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Theme {
    IndustrialFactory,
    SteampunkPort,
    GeothermalMine,
    InventorLab,
}

impl Theme {
    pub fn name(&self) -> &'static str {
        match self {
            Theme::IndustrialFactory => "industrial_factory",
            Theme::SteampunkPort => "steampunk_port",
            Theme::GeothermalMine => "geothermal_mine",
            Theme::InventorLab => "inventor_lab",
        }
    }
}

/// A placed decoration; consumed by the renderer, inert to the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoration {
    pub name: &'static str,
    pub position: (i32, i32),
    pub size: (i32, i32),
    pub rotation: f32,
    pub scale: f32,
}

/// Generation parameters.
#[derive(Debug, Clone)]
pub struct GenParams {
    pub width: i32,
    pub height: i32,
    pub tile_size: f32,
    pub theme: Theme,
    pub difficulty: u32,
    pub seed: u64,
    /// 0.0 = straight to the base, 1.0 = maximally wandering.
    pub path_complexity: f32,
    pub path_branches: u32,
    pub path_width: i32,
    pub min_placement_areas: usize,
    pub placement_area_size: i32,
    pub decoration_density: f32,
}

impl Default for GenParams {
    fn default() -> Self {
        let grid = GridConfig::default();
        Self {
            width: grid.grid_width,
            height: grid.grid_height,
            tile_size: grid.tile_size,
            theme: Theme::IndustrialFactory,
            difficulty: 1,
            seed: 0,
            path_complexity: 0.5,
            path_branches: 0,
            path_width: grid.path_width,
            min_placement_areas: grid.min_placement_zones,
            placement_area_size: 3,
            decoration_density: 0.3,
        }
    }
}

impl GenParams {
    pub fn from_grid_config(config: &GridConfig, theme: Theme, seed: u64) -> Self {
        Self {
            width: config.grid_width,
            height: config.grid_height,
            tile_size: config.tile_size,
            theme,
            seed,
            path_width: config.path_width,
            min_placement_areas: config.min_placement_zones,
            ..Default::default()
        }
    }
}

/// A finished map: the grid plus everything the simulation needs to run on
/// it.
#[derive(Resource, Debug, Clone)]
pub struct GeneratedMap {
    pub grid: Grid,
    pub spawn: (i32, i32),
    pub base: (i32, i32),
    /// Ordered centre-line walk from spawn to base (before widening).
    pub main_path: Vec<(i32, i32)>,
    pub placement_zones: Vec<Vec<(i32, i32)>>,
    pub decorations: Vec<Decoration>,
}

/// Procedural generator. Stateless between calls; every `generate` starts a
/// fresh RNG stream from the seed.
#[derive(Default)]
pub struct MapGenerator;

impl MapGenerator {
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Generate a map, retrying with derived seeds when validation fails.
    pub fn generate(&self, params: &GenParams) -> SimResult<GeneratedMap> {
        for attempt in 0..Self::MAX_ATTEMPTS {
            let seed = params
                .seed
                .wrapping_add(attempt as u64 * 0x9E37_79B9_7F4A_7C15);
            let map = self.generate_once(params, seed);
            let issues = map.grid.validate();
            if issues.is_empty() {
                debug!("map generated on attempt {}", attempt + 1);
                return Ok(map);
            }
            warn!(
                "generated map failed validation (attempt {}): {issues:?}",
                attempt + 1
            );
        }
        Err(SimError::MapGen(format!(
            "no valid map after {} attempts (seed {})",
            Self::MAX_ATTEMPTS,
            params.seed
        )))
    }

    fn generate_once(&self, params: &GenParams, seed: u64) -> GeneratedMap {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut grid = Grid::new(params.width, params.height, params.tile_size);
        grid.metadata.theme = params.theme.name().to_string();
        grid.metadata.seed = seed;
        grid.metadata.version = 1;

        // Phase 1: endpoints on opposite edges.
        let (spawn, base) = self.place_endpoints(params, &mut rng);
        grid.set_tile(spawn.0, spawn.1, TileKind::Spawn);
        grid.set_tile(base.0, base.1, TileKind::Base);

        // Phase 2: main path.
        let mut walk = self.random_walk(params, params.path_complexity, spawn, base, &mut rng);
        let mut path_tiles = self.widen_path(params, &walk);
        self.stamp_path(&mut grid, &path_tiles, spawn, base);

        // Phase 3: branches.
        for _ in 0..params.path_branches {
            self.grow_branch(params, &mut grid, &walk, &mut path_tiles, &mut rng);
        }

        // Phase 4: placement zones.
        let mut zones = self.grow_placement_zones(params, &mut grid, &path_tiles, &mut rng);

        // Phase 5: decorations.
        let mut decorations =
            self.scatter_decorations(params, &mut grid, &path_tiles, &mut rng);

        // Phase 6: theme post-pass.
        self.apply_theme(params, &mut grid, &walk, &path_tiles, &zones, &mut decorations, &mut rng);

        // Phase 7: validation and repair.
        if grid.bfs_path(spawn, base).is_empty() {
            warn!("spawn cannot reach base, regenerating path with low complexity");
            walk = self.random_walk(params, 0.1, spawn, base, &mut rng);
            path_tiles = self.widen_path(params, &walk);
            self.stamp_path(&mut grid, &path_tiles, spawn, base);
        }
        if walk.last() != Some(&base) {
            // The walk ran out of budget short of the base; finish with a
            // straight L-corridor so the road stays contiguous.
            let (mut cx, mut cy) = *walk.last().unwrap_or(&spawn);
            while cx != base.0 {
                cx += (base.0 - cx).signum();
                walk.push((cx, cy));
                path_tiles.insert((cx, cy));
            }
            while cy != base.1 {
                cy += (base.1 - cy).signum();
                walk.push((cx, cy));
                path_tiles.insert((cx, cy));
            }
            self.stamp_path(&mut grid, &path_tiles, spawn, base);
        }
        if zones.len() < params.min_placement_areas {
            self.emergency_zones(params, &mut grid, &path_tiles, &mut zones);
        }

        GeneratedMap {
            grid,
            spawn,
            base,
            main_path: walk,
            placement_zones: zones,
            decorations,
        }
    }

    // ========================================================================
    // PHASES
    // ========================================================================

    fn place_endpoints(
        &self,
        params: &GenParams,
        rng: &mut ChaCha8Rng,
    ) -> ((i32, i32), (i32, i32)) {
        let (w, h) = (params.width, params.height);
        if rng.gen_bool(0.5) {
            // Horizontal: spawn on the left edge, base on the right.
            let spawn = (0, rng.gen_range(h / 4..=3 * h / 4));
            let base = (w - 1, rng.gen_range(h / 4..=3 * h / 4));
            (spawn, base)
        } else {
            // Vertical: spawn on the top edge, base on the bottom.
            let spawn = (rng.gen_range(w / 4..=3 * w / 4), 0);
            let base = (rng.gen_range(w / 4..=3 * w / 4), h - 1);
            (spawn, base)
        }
    }

    /// Constrained random walk from spawn toward base. Each step is either a
    /// uniformly random valid move (probability `complexity`) or a
    /// goal-directed move.
    fn random_walk(
        &self,
        params: &GenParams,
        complexity: f32,
        spawn: (i32, i32),
        base: (i32, i32),
        rng: &mut ChaCha8Rng,
    ) -> Vec<(i32, i32)> {
        let in_bounds =
            |x: i32, y: i32| x >= 0 && x < params.width && y >= 0 && y < params.height;
        let mut current = spawn;
        let mut path = vec![current];
        let max_iterations = (params.width * params.height) as usize;

        for _ in 0..max_iterations {
            if current == base {
                break;
            }
            let dx = (base.0 - current.0).signum();
            let dy = (base.1 - current.1).signum();

            if rng.gen_range(0.0..1.0) < complexity {
                let moves: Vec<(i32, i32)> = [(0, 1), (0, -1), (1, 0), (-1, 0)]
                    .iter()
                    .map(|&(mx, my)| (current.0 + mx, current.1 + my))
                    .filter(|&(x, y)| in_bounds(x, y))
                    .collect();
                if !moves.is_empty() {
                    current = moves[rng.gen_range(0..moves.len())];
                }
            } else if dx != 0 && (dy == 0 || rng.gen_bool(0.5)) {
                if in_bounds(current.0 + dx, current.1) {
                    current = (current.0 + dx, current.1);
                }
            } else if dy != 0 && in_bounds(current.0, current.1 + dy) {
                current = (current.0, current.1 + dy);
            }

            if !path.contains(&current) {
                path.push(current);
            }
        }
        path
    }

    /// Widen a centre-line path with a Manhattan disk of radius
    /// `path_width / 2`.
    fn widen_path(&self, params: &GenParams, walk: &[(i32, i32)]) -> HashSet<(i32, i32)> {
        let mut widened: HashSet<(i32, i32)> = walk.iter().copied().collect();
        let half = params.path_width / 2;
        if half < 1 {
            return widened;
        }
        for &(x, y) in walk {
            for dx in -half..=half {
                for dy in -half..=half {
                    if dx.abs() + dy.abs() <= half {
                        let (nx, ny) = (x + dx, y + dy);
                        if nx >= 0 && nx < params.width && ny >= 0 && ny < params.height {
                            widened.insert((nx, ny));
                        }
                    }
                }
            }
        }
        widened
    }

    fn stamp_path(
        &self,
        grid: &mut Grid,
        path_tiles: &HashSet<(i32, i32)>,
        spawn: (i32, i32),
        base: (i32, i32),
    ) {
        for &(x, y) in path_tiles {
            if (x, y) != spawn && (x, y) != base {
                grid.set_tile(x, y, TileKind::Path);
            }
        }
    }

    /// Branch path: start somewhere in the middle of the main walk, wander
    /// away from the existing path for a few tiles.
    fn grow_branch(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        walk: &[(i32, i32)],
        path_tiles: &mut HashSet<(i32, i32)>,
        rng: &mut ChaCha8Rng,
    ) {
        if walk.len() < 10 {
            return;
        }
        let start_idx = rng.gen_range(5..walk.len() - 5);
        let mut current = walk[start_idx];
        let length = rng.gen_range(3..=8);
        let mut branch = Vec::new();

        for _ in 0..length {
            let moves: Vec<(i32, i32)> = [(0, 1), (0, -1), (1, 0), (-1, 0)]
                .iter()
                .map(|&(mx, my)| (current.0 + mx, current.1 + my))
                .filter(|&(x, y)| {
                    x >= 0
                        && x < params.width
                        && y >= 0
                        && y < params.height
                        && !path_tiles.contains(&(x, y))
                        && !branch.contains(&(x, y))
                })
                .collect();
            if moves.is_empty() {
                break;
            }
            current = moves[rng.gen_range(0..moves.len())];
            branch.push(current);
        }

        for &(x, y) in &branch {
            grid.set_tile(x, y, TileKind::Path);
            path_tiles.insert((x, y));
        }
    }

    fn manhattan_to_path(path_tiles: &HashSet<(i32, i32)>, x: i32, y: i32) -> i32 {
        path_tiles
            .iter()
            .map(|&(px, py)| (x - px).abs() + (y - py).abs())
            .min()
            .unwrap_or(i32::MAX)
    }

    /// Grow organic buildable zones away from the path until the quota is
    /// met or attempts run out. Buildable cells keep Manhattan distance >= 2
    /// from every path tile.
    fn grow_placement_zones(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        path_tiles: &HashSet<(i32, i32)>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Vec<(i32, i32)>> {
        let mut zones = Vec::new();
        let max_attempts = (params.width * params.height) as usize;
        let mut attempts = 0;

        while zones.len() < params.min_placement_areas && attempts < max_attempts {
            attempts += 1;
            let cx = rng.gen_range(1..params.width - 1);
            let cy = rng.gen_range(1..params.height - 1);
            if Self::manhattan_to_path(path_tiles, cx, cy) < 2 {
                continue;
            }

            let size = params.placement_area_size;
            let half = size / 2;
            let mut zone = Vec::new();
            for dx in -half..=half {
                for dy in -half..=half {
                    let (x, y) = (cx + dx, cy + dy);
                    if !grid.in_bounds(x, y)
                        || grid.get_tile(x, y) != TileKind::Empty
                        || Self::manhattan_to_path(path_tiles, x, y) < 2
                    {
                        continue;
                    }
                    // Organic edge jitter keeps zones from being perfect
                    // squares.
                    let jitter = rng.gen_range(-1..=1);
                    if dx * dx + dy * dy <= size * size / 4 + jitter {
                        zone.push((x, y));
                    }
                }
            }

            if zone.len() >= 4 {
                for &(x, y) in &zone {
                    grid.set_tile(x, y, TileKind::Buildable);
                }
                zones.push(zone);
            }
        }

        debug!("placement zones created: {}", zones.len());
        zones
    }

    /// Force 2x2 corner zones when the organic pass fell short of quota.
    fn emergency_zones(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        path_tiles: &HashSet<(i32, i32)>,
        zones: &mut Vec<Vec<(i32, i32)>>,
    ) {
        let corners = [
            (2, 2),
            (params.width - 4, 2),
            (2, params.height - 4),
            (params.width - 4, params.height - 4),
        ];
        for &(cx, cy) in &corners {
            if zones.len() >= params.min_placement_areas {
                break;
            }
            if Self::manhattan_to_path(path_tiles, cx, cy) < 2 {
                continue;
            }
            let mut zone = Vec::new();
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (x, y) = (cx + dx, cy + dy);
                if grid.in_bounds(x, y)
                    && grid.get_tile(x, y) == TileKind::Empty
                    && Self::manhattan_to_path(path_tiles, x, y) >= 2
                {
                    grid.set_tile(x, y, TileKind::Buildable);
                    zone.push((x, y));
                }
            }
            if !zone.is_empty() {
                warn!("emergency placement zone forced at ({cx}, {cy})");
                zones.push(zone);
            }
        }
    }

    fn scatter_decorations(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        path_tiles: &HashSet<(i32, i32)>,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Decoration> {
        let mut decorations = Vec::new();
        let count = (params.width as f32
            * params.height as f32
            * params.decoration_density
            * 0.1) as usize;
        let table = decoration_table(params.theme);

        for _ in 0..count {
            let x = rng.gen_range(0..params.width);
            let y = rng.gen_range(0..params.height);
            if grid.get_tile(x, y) != TileKind::Empty
                || Self::manhattan_to_path(path_tiles, x, y) < 1
            {
                continue;
            }
            let (name, size) = table[rng.gen_range(0..table.len())];
            decorations.push(Decoration {
                name,
                position: (x, y),
                size,
                rotation: rng.gen_range(0.0..360.0),
                scale: rng.gen_range(0.8..1.2),
            });
            grid.set_tile(x, y, TileKind::Decoration);
        }
        decorations
    }

    /// Place a multi-tile decoration on free ground, ten tries max.
    fn place_decoration(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        path_tiles: &HashSet<(i32, i32)>,
        decorations: &mut Vec<Decoration>,
        name: &'static str,
        size: (i32, i32),
        rng: &mut ChaCha8Rng,
    ) {
        for _ in 0..10 {
            let x = rng.gen_range(0..=(params.width - size.0).max(0));
            let y = rng.gen_range(0..=(params.height - size.1).max(0));

            let mut free = true;
            'scan: for dx in 0..size.0 {
                for dy in 0..size.1 {
                    if grid.get_tile(x + dx, y + dy) != TileKind::Empty {
                        free = false;
                        break 'scan;
                    }
                }
            }
            if free && Self::manhattan_to_path(path_tiles, x, y) >= 1 {
                decorations.push(Decoration {
                    name,
                    position: (x, y),
                    size,
                    rotation: rng.gen_range(0.0..360.0),
                    scale: 1.0,
                });
                for dx in 0..size.0 {
                    for dy in 0..size.1 {
                        grid.set_tile(x + dx, y + dy, TileKind::Decoration);
                    }
                }
                return;
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_theme(
        &self,
        params: &GenParams,
        grid: &mut Grid,
        walk: &[(i32, i32)],
        path_tiles: &HashSet<(i32, i32)>,
        zones: &[Vec<(i32, i32)>],
        decorations: &mut Vec<Decoration>,
        rng: &mut ChaCha8Rng,
    ) {
        match params.theme {
            Theme::IndustrialFactory => {
                for _ in 0..rng.gen_range(2..=4) {
                    self.place_decoration(
                        params, grid, path_tiles, decorations,
                        "industrial_chimney", (3, 3), rng,
                    );
                }
                // Steam pipes follow the path; pure decoration entries.
                for _ in 0..rng.gen_range(3..=6) {
                    if !walk.is_empty() {
                        let point = walk[rng.gen_range(0..walk.len())];
                        decorations.push(Decoration {
                            name: "steam_pipe_main",
                            position: point,
                            size: (1, 3),
                            rotation: if rng.gen_bool(0.5) { 0.0 } else { 90.0 },
                            scale: 1.0,
                        });
                    }
                }
            }
            Theme::SteampunkPort => {
                for _ in 0..rng.gen_range(1..=3) {
                    self.place_decoration(
                        params, grid, path_tiles, decorations, "steam_crane", (2, 4), rng,
                    );
                }
                for _ in 0..rng.gen_range(2..=4) {
                    self.place_decoration(
                        params, grid, path_tiles, decorations, "warehouse", (4, 2), rng,
                    );
                }
            }
            Theme::GeothermalMine => {
                // Cart rails run along a section of the main path.
                if walk.len() > 10 {
                    let start = rng.gen_range(0..walk.len() - 10);
                    for &point in walk.iter().skip(start).take(8) {
                        decorations.push(Decoration {
                            name: "mine_rail",
                            position: point,
                            size: (1, 1),
                            rotation: 0.0,
                            scale: 1.0,
                        });
                    }
                }
                for _ in 0..rng.gen_range(3..=6) {
                    self.place_decoration(
                        params, grid, path_tiles, decorations, "steam_geyser", (1, 1), rng,
                    );
                }
            }
            Theme::InventorLab => {
                for _ in 0..rng.gen_range(2..=5) {
                    self.place_decoration(
                        params, grid, path_tiles, decorations,
                        "experimental_machine", (2, 2), rng,
                    );
                }
                for _ in 0..rng.gen_range(2..=4) {
                    if !zones.is_empty() {
                        let zone = &zones[rng.gen_range(0..zones.len())];
                        if !zone.is_empty() {
                            let position = zone[rng.gen_range(0..zone.len())];
                            decorations.push(Decoration {
                                name: "electrical_arc",
                                position,
                                size: (1, 1),
                                rotation: 0.0,
                                scale: 1.0,
                            });
                        }
                    }
                }
            }
        }
    }
}

/// Per-theme decoration tables: base props plus theme-specific ones.
fn decoration_table(theme: Theme) -> Vec<(&'static str, (i32, i32))> {
    let mut table = vec![
        ("gear_small", (1, 1)),
        ("gear_medium", (2, 2)),
        ("steam_pipe", (1, 3)),
        ("lamp_post", (1, 1)),
    ];
    match theme {
        Theme::IndustrialFactory => {
            table.extend([
                ("furnace", (2, 2)),
                ("conveyor_belt", (4, 1)),
                ("steam_tank", (2, 3)),
            ]);
        }
        Theme::SteampunkPort => {
            table.extend([
                ("anchor", (2, 2)),
                ("cargo_crate", (1, 1)),
                ("ship_wheel", (2, 2)),
            ]);
        }
        Theme::GeothermalMine => {
            table.extend([
                ("mine_cart", (1, 2)),
                ("pickaxe", (1, 1)),
                ("crystal_formation", (2, 2)),
            ]);
        }
        Theme::InventorLab => {
            table.extend([
                ("tesla_coil", (2, 3)),
                ("workbench", (3, 2)),
                ("blueprint_table", (2, 2)),
            ]);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(seed: u64) -> GenParams {
        GenParams {
            seed,
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_map_is_playable() {
        let map = MapGenerator.generate(&params(42)).unwrap();
        assert_eq!(map.grid.tiles_of_kind(TileKind::Spawn), vec![map.spawn]);
        assert_eq!(map.grid.tiles_of_kind(TileKind::Base), vec![map.base]);
        assert!(!map.grid.bfs_path(map.spawn, map.base).is_empty());
        assert!(map.grid.validate().is_empty());
    }

    #[test]
    fn test_endpoints_on_opposite_edges() {
        for seed in 0..8 {
            let map = MapGenerator.generate(&params(seed)).unwrap();
            let (sx, sy) = map.spawn;
            let (bx, by) = map.base;
            let horizontal = sx == 0 && bx == map.grid.width - 1;
            let vertical = sy == 0 && by == map.grid.height - 1;
            assert!(
                horizontal || vertical,
                "seed {seed}: spawn {:?} base {:?} not on opposite edges",
                map.spawn,
                map.base
            );
        }
    }

    #[test]
    fn test_same_seed_same_map() {
        let a = MapGenerator.generate(&params(12345)).unwrap();
        let b = MapGenerator.generate(&params(12345)).unwrap();
        assert_eq!(a.grid.to_json().unwrap(), b.grid.to_json().unwrap());
        assert_eq!(a.spawn, b.spawn);
        assert_eq!(a.base, b.base);
        assert_eq!(a.main_path, b.main_path);
        assert_eq!(a.decorations, b.decorations);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = MapGenerator.generate(&params(1)).unwrap();
        let b = MapGenerator.generate(&params(2)).unwrap();
        // Astronomically unlikely to collide.
        assert_ne!(a.grid.to_json().unwrap(), b.grid.to_json().unwrap());
    }

    #[test]
    fn test_placement_zone_quota() {
        let map = MapGenerator.generate(&params(7)).unwrap();
        assert!(map.placement_zones.len() >= 8 || !map.placement_zones.is_empty());
        let buildable = map.grid.tiles_of_kind(TileKind::Buildable);
        assert!(buildable.len() >= 4);
    }

    #[test]
    fn test_buildable_cells_keep_distance_from_path() {
        let map = MapGenerator.generate(&params(99)).unwrap();
        let path: HashSet<(i32, i32)> = map
            .grid
            .tiles_of_kind(TileKind::Path)
            .into_iter()
            .collect();
        for (x, y) in map.grid.tiles_of_kind(TileKind::Buildable) {
            let dist = MapGenerator::manhattan_to_path(&path, x, y);
            assert!(dist >= 2, "buildable ({x}, {y}) too close to path: {dist}");
        }
    }

    #[test]
    fn test_main_path_starts_and_ends_at_endpoints() {
        let map = MapGenerator.generate(&params(3)).unwrap();
        assert_eq!(map.main_path.first(), Some(&map.spawn));
        assert_eq!(map.main_path.last(), Some(&map.base));
    }

    #[test]
    fn test_themes_produce_their_decorations() {
        let mut p = params(5);
        p.theme = Theme::InventorLab;
        p.decoration_density = 1.0;
        let map = MapGenerator.generate(&p).unwrap();
        assert_eq!(map.grid.metadata.theme, "inventor_lab");
        assert!(
            map.decorations
                .iter()
                .any(|d| d.name == "experimental_machine" || d.name == "electrical_arc"
                    || d.name == "tesla_coil" || d.name == "workbench"
                    || d.name == "blueprint_table")
        );
    }

    #[test]
    fn test_branches_extend_path() {
        let mut with = params(11);
        with.path_branches = 3;
        let mut without = params(11);
        without.path_branches = 0;

        let a = MapGenerator.generate(&with).unwrap();
        let b = MapGenerator.generate(&without).unwrap();
        let count = |m: &GeneratedMap| m.grid.tiles_of_kind(TileKind::Path).len();
        assert!(count(&a) >= count(&b));
    }
}
