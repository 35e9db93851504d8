//! Steam Defense - Simulation Core
//!
//! A deterministic, fixed-timestep tower-defense simulation built on
//! `bevy_ecs`. The core owns the tile grid, procedural map generation,
//! pathfinding, enemies, towers, projectiles and the event bus; rendering,
//! audio and device input live outside and talk to it through abstract
//! input actions and per-tick snapshots.

pub mod api;
pub mod components;
pub mod config;
pub mod error;
pub mod events;
pub mod grid;
pub mod input;
pub mod mapgen;
pub mod pathfinding;
pub mod scheduler;
pub mod snapshot;
pub mod spatial;
pub mod systems;

pub use api::{SimCommand, SimWorld};
pub use components::*;
pub use config::{GameConfig, WaveConfig};
pub use error::{SimError, SimResult};
pub use events::{
    EventBus, EventKind, EventPriority, GameEvent, ScopedSubscription, SubscriptionId,
};
pub use grid::{Grid, TileKind, TileProperties};
pub use input::{InputAction, InputActionMap, InputEvent, StateMachine};
pub use mapgen::{GenParams, GeneratedMap, MapGenerator, Theme};
pub use pathfinding::{Algorithm, Constraints, Heuristic, PathResult, Pathfinder};
pub use scheduler::{ScheduledAction, Scheduler};
pub use snapshot::Snapshot;
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
