//! Simulation systems.
//!
//! One tick runs the systems in a fixed, chained order; the ordering is a
//! correctness contract, not an optimization:
//!
//! | # | System | Role |
//! |---|--------|------|
//! | 1 | `spatial_grid_update_system` | rebuild the enemy spatial hash |
//! | 2 | `scheduler_system` | fire due scheduled actions (wave starts, interest) |
//! | 3 | `enemy_spawn_system` | release pending wave enemies onto the path |
//! | 4 | `enemy_status_system` | DoT ticks, timer decay, modifier expiry |
//! | 5 | `enemy_movement_system` | stun gating + waypoint advance |
//! | 6 | `enemy_special_system` | golem regen, survivor resistance reroll |
//! | 7 | `tower_system` | construction, targeting, firing dispatch |
//! | 8 | `mine_layer_system` | proximity detonation for mine fields |
//! | 9 | `projectile_system` | cleanup of spent shots, motion, impact emit |
//! | 10 | `effect_resolver_system` | apply queued attacks/impacts to enemies |
//! | 11 | `effect_aging_system` | expire visual effect instances |
//! | 12 | `enemy_lifecycle_system` | deaths, reach-base, explosion staging |
//! | 13 | `wave_progress_system` | wave completion, bonus, next-wave scheduling |
//! | 14 | `economy_system` | money/lives/score mutation, defeat detection |
//!
//! Enemies move before towers fire, so a tower can never shoot an enemy
//! that died this tick; towers fire before projectiles integrate, so a new
//! shot takes its first motion step in its spawn tick; the event bus drains
//! after all systems so observers see a settled world.

pub mod economy;
pub mod effects;
pub mod enemy;
pub mod projectile;
pub mod tower;

pub use economy::*;
pub use effects::*;
pub use enemy::*;
pub use projectile::*;
pub use tower::*;
