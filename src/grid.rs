//! Tile grid for the game map.
//!
//! The grid is a row-major array of tiles with derived walkability and
//! buildability flags. Reads outside the bounds behave as walls so callers
//! never need a bounds check before sampling; writes outside the bounds are
//! ignored with a warning.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Kind of a single tile. Discriminants match the original map format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TileKind {
    Empty = 0,
    Path = 1,
    Wall = 2,
    Spawn = 3,
    Base = 4,
    Decoration = 5,
    Buildable = 6,
    Water = 7,
    Bridge = 8,
}

impl Default for TileKind {
    fn default() -> Self {
        Self::Empty
    }
}

/// Full per-tile state. Flags default from the kind but may be overridden.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TileProperties {
    pub kind: TileKind,
    pub is_walkable: bool,
    pub is_buildable: bool,
    /// Infinite for blocked tiles; stored as null in JSON.
    #[serde(with = "blocked_cost")]
    pub movement_cost: f32,
    pub elevation: f32,
    pub rotation: f32,
    pub variant: u8,
}

/// JSON has no infinity; blocked tiles round-trip through null.
mod blocked_cost {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        Ok(Option::<f32>::deserialize(deserializer)?.unwrap_or(f32::INFINITY))
    }
}

impl TileProperties {
    /// Derive default flags from a tile kind.
    pub fn from_kind(kind: TileKind) -> Self {
        let (walkable, buildable, cost) = match kind {
            TileKind::Empty => (true, true, 1.0),
            TileKind::Path => (true, false, 1.0),
            TileKind::Wall => (false, false, f32::INFINITY),
            TileKind::Spawn | TileKind::Base => (true, false, 1.0),
            TileKind::Decoration => (true, false, 1.0),
            TileKind::Buildable => (true, true, 1.0),
            TileKind::Water => (false, false, f32::INFINITY),
            TileKind::Bridge => (true, false, 1.0),
        };
        Self {
            kind,
            is_walkable: walkable,
            is_buildable: buildable,
            movement_cost: cost,
            elevation: 0.0,
            rotation: 0.0,
            variant: 0,
        }
    }

    /// Properties of the implicit wall surrounding the grid.
    pub fn out_of_bounds() -> Self {
        Self::from_kind(TileKind::Wall)
    }
}

impl Default for TileProperties {
    fn default() -> Self {
        Self::from_kind(TileKind::Empty)
    }
}

/// 2D tile grid with world/grid coordinate transforms and spatial queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    /// Size of one tile in world units.
    pub tile_size: f32,
    /// Tiles in row-major order (`y * width + x`).
    cells: Vec<TileProperties>,
    /// Free-form map metadata (theme name, generator version).
    pub metadata: GridMetadata,

    #[serde(skip)]
    walkable_cache: Option<Vec<bool>>,
    #[serde(skip)]
    buildable_cache: Option<Vec<bool>>,
}

/// Metadata attached to a generated grid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GridMetadata {
    pub theme: String,
    pub seed: u64,
    pub version: u32,
}

impl Grid {
    pub fn new(width: i32, height: i32, tile_size: f32) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be positive");
        Self {
            width,
            height,
            tile_size,
            cells: vec![TileProperties::default(); (width * height) as usize],
            metadata: GridMetadata::default(),
            walkable_cache: None,
            buildable_cache: None,
        }
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width && y >= 0 && y < self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    /// Tile kind at a position; out-of-bounds reads as Wall.
    pub fn get_tile(&self, x: i32, y: i32) -> TileKind {
        if self.in_bounds(x, y) {
            self.cells[self.index(x, y)].kind
        } else {
            TileKind::Wall
        }
    }

    /// Set the kind of a tile, resetting its flags to the kind defaults.
    /// Out-of-bounds writes are ignored.
    pub fn set_tile(&mut self, x: i32, y: i32, kind: TileKind) {
        if !self.in_bounds(x, y) {
            warn!("ignored out-of-bounds tile write at ({x}, {y})");
            return;
        }
        let idx = self.index(x, y);
        let elevation = self.cells[idx].elevation;
        let mut props = TileProperties::from_kind(kind);
        props.elevation = elevation;
        self.cells[idx] = props;
        self.invalidate_caches();
    }

    /// Full properties of a tile; out-of-bounds reads as a wall.
    pub fn properties(&self, x: i32, y: i32) -> TileProperties {
        if self.in_bounds(x, y) {
            self.cells[self.index(x, y)]
        } else {
            TileProperties::out_of_bounds()
        }
    }

    /// Overwrite a tile's properties wholesale. Out-of-bounds writes are
    /// ignored.
    pub fn set_properties(&mut self, x: i32, y: i32, props: TileProperties) {
        if !self.in_bounds(x, y) {
            warn!("ignored out-of-bounds property write at ({x}, {y})");
            return;
        }
        let idx = self.index(x, y);
        self.cells[idx] = props;
        self.invalidate_caches();
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.properties(x, y).is_walkable
    }

    pub fn is_buildable(&self, x: i32, y: i32) -> bool {
        self.properties(x, y).is_buildable
    }

    pub fn movement_cost(&self, x: i32, y: i32) -> f32 {
        self.properties(x, y).movement_cost
    }

    // ========================================================================
    // COORDINATE TRANSFORMS
    // ========================================================================

    /// Convert world coordinates to the containing grid cell.
    pub fn world_to_grid(&self, world_x: f32, world_y: f32) -> (i32, i32) {
        (
            (world_x / self.tile_size).floor() as i32,
            (world_y / self.tile_size).floor() as i32,
        )
    }

    /// Convert grid coordinates to the world position of the tile centre.
    pub fn grid_to_world(&self, gx: i32, gy: i32) -> (f32, f32) {
        (
            gx as f32 * self.tile_size + self.tile_size / 2.0,
            gy as f32 * self.tile_size + self.tile_size / 2.0,
        )
    }

    /// Convert grid coordinates to the world position of the tile corner.
    pub fn grid_to_world_corner(&self, gx: i32, gy: i32) -> (f32, f32) {
        (gx as f32 * self.tile_size, gy as f32 * self.tile_size)
    }

    // ========================================================================
    // SPATIAL QUERIES
    // ========================================================================

    /// In-bounds neighbors of a cell, orthogonal first.
    pub fn neighbors(&self, x: i32, y: i32, diagonals: bool) -> Vec<(i32, i32)> {
        let mut dirs: Vec<(i32, i32)> = vec![(0, 1), (1, 0), (0, -1), (-1, 0)];
        if diagonals {
            dirs.extend([(1, 1), (1, -1), (-1, 1), (-1, -1)]);
        }
        dirs.into_iter()
            .map(|(dx, dy)| (x + dx, y + dy))
            .filter(|&(nx, ny)| self.in_bounds(nx, ny))
            .collect()
    }

    /// In-bounds walkable neighbors of a cell.
    pub fn walkable_neighbors(&self, x: i32, y: i32, diagonals: bool) -> Vec<(i32, i32)> {
        self.neighbors(x, y, diagonals)
            .into_iter()
            .filter(|&(nx, ny)| self.is_walkable(nx, ny))
            .collect()
    }

    /// All cells within a Euclidean radius (in tiles) of a centre cell.
    pub fn tiles_in_radius(&self, cx: i32, cy: i32, radius: f32) -> Vec<(i32, i32)> {
        let mut tiles = Vec::new();
        let r = radius.ceil() as i32;
        let min_x = (cx - r).max(0);
        let max_x = (cx + r).min(self.width - 1);
        let min_y = (cy - r).max(0);
        let max_y = (cy + r).min(self.height - 1);
        let radius_sq = radius * radius;

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = (x - cx) as f32;
                let dy = (y - cy) as f32;
                if dx * dx + dy * dy <= radius_sq {
                    tiles.push((x, y));
                }
            }
        }
        tiles
    }

    /// All cells of a given kind, scanned in row-major order.
    pub fn tiles_of_kind(&self, kind: TileKind) -> Vec<(i32, i32)> {
        let mut tiles = Vec::new();
        for y in 0..self.height {
            for x in 0..self.width {
                if self.cells[self.index(x, y)].kind == kind {
                    tiles.push((x, y));
                }
            }
        }
        tiles
    }

    /// Iterative flood fill replacing `target` with `replacement` starting
    /// from a seed cell. Returns the number of tiles changed. A fill with
    /// `target == replacement`, an invalid start, or a mismatched start tile
    /// is a no-op.
    pub fn flood_fill(
        &mut self,
        start_x: i32,
        start_y: i32,
        target: TileKind,
        replacement: TileKind,
    ) -> usize {
        if !self.in_bounds(start_x, start_y)
            || target == replacement
            || self.get_tile(start_x, start_y) != target
        {
            return 0;
        }

        let mut stack = vec![(start_x, start_y)];
        let mut modified = 0usize;

        while let Some((x, y)) = stack.pop() {
            if !self.in_bounds(x, y) || self.get_tile(x, y) != target {
                continue;
            }
            self.set_tile(x, y, replacement);
            modified += 1;
            for neighbor in self.neighbors(x, y, false) {
                stack.push(neighbor);
            }
        }

        debug!("flood fill changed {modified} tiles");
        modified
    }

    /// Shortest walkable path between two cells by breadth-first search.
    /// Returns an empty vector when no path exists.
    pub fn bfs_path(&self, start: (i32, i32), goal: (i32, i32)) -> Vec<(i32, i32)> {
        if !self.in_bounds(start.0, start.1) || !self.in_bounds(goal.0, goal.1) {
            return Vec::new();
        }

        let mut queue = VecDeque::new();
        let mut came_from: Vec<Option<(i32, i32)>> =
            vec![None; (self.width * self.height) as usize];
        let mut visited = vec![false; (self.width * self.height) as usize];

        queue.push_back(start);
        visited[self.index(start.0, start.1)] = true;

        while let Some((x, y)) = queue.pop_front() {
            if (x, y) == goal {
                let mut path = vec![goal];
                let mut current = goal;
                while let Some(prev) = came_from[self.index(current.0, current.1)] {
                    path.push(prev);
                    current = prev;
                }
                path.reverse();
                return path;
            }
            for (nx, ny) in self.walkable_neighbors(x, y, false) {
                let idx = self.index(nx, ny);
                if !visited[idx] {
                    visited[idx] = true;
                    came_from[idx] = Some((x, y));
                    queue.push_back((nx, ny));
                }
            }
        }
        Vec::new()
    }

    // ========================================================================
    // MASKS
    // ========================================================================

    fn invalidate_caches(&mut self) {
        self.walkable_cache = None;
        self.buildable_cache = None;
    }

    fn rebuild_caches(&mut self) {
        let mut walkable = vec![false; self.cells.len()];
        let mut buildable = vec![false; self.cells.len()];
        for (i, cell) in self.cells.iter().enumerate() {
            walkable[i] = cell.is_walkable;
            buildable[i] = cell.is_buildable;
        }
        self.walkable_cache = Some(walkable);
        self.buildable_cache = Some(buildable);
        debug!("grid masks rebuilt");
    }

    /// Row-major walkability mask, rebuilt lazily after mutations.
    pub fn walkable_mask(&mut self) -> &[bool] {
        if self.walkable_cache.is_none() {
            self.rebuild_caches();
        }
        self.walkable_cache.as_deref().unwrap_or(&[])
    }

    /// Row-major buildability mask, rebuilt lazily after mutations.
    pub fn buildable_mask(&mut self) -> &[bool] {
        if self.buildable_cache.is_none() {
            self.rebuild_caches();
        }
        self.buildable_cache.as_deref().unwrap_or(&[])
    }

    // ========================================================================
    // VALIDATION & SERIALIZATION
    // ========================================================================

    /// Diagnostic pass over the grid. Returns human-readable issues; an empty
    /// vector means the grid satisfies the playability invariants.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        let spawns = self.tiles_of_kind(TileKind::Spawn);
        let bases = self.tiles_of_kind(TileKind::Base);
        if spawns.len() != 1 {
            issues.push(format!("expected exactly one spawn, found {}", spawns.len()));
        }
        if bases.len() != 1 {
            issues.push(format!("expected exactly one base, found {}", bases.len()));
        }

        let path_len = self.tiles_of_kind(TileKind::Path).len();
        if path_len == 0 {
            issues.push("no path tiles".into());
        } else if path_len < 10 {
            issues.push(format!("path too short ({path_len} tiles)"));
        }

        let buildable = self
            .cells
            .iter()
            .filter(|c| c.kind == TileKind::Buildable || c.kind == TileKind::Empty)
            .count();
        if buildable < 5 {
            issues.push(format!("too few buildable tiles ({buildable})"));
        }

        if let (Some(&spawn), Some(&base)) = (spawns.first(), bases.first()) {
            if self.bfs_path(spawn, base).is_empty() {
                issues.push("no walkable path from spawn to base".into());
            }
        }

        issues
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
