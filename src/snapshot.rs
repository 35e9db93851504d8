//! Frame snapshots.
//!
//! The renderer never touches the ECS world; at the end of each tick the
//! simulation exposes a serializable, read-only projection of everything a
//! client needs to draw the frame. All lists are id-sorted so that equal
//! world states produce byte-identical snapshots.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::systems::effects::{ActiveEffects, EffectInstance};

/// Per-enemy status indicators for the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusFlags {
    pub slowed: bool,
    pub stunned: bool,
    pub burning: bool,
    pub damage_flash: bool,
    pub spawning: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemySnapshot {
    pub id: u64,
    pub kind: EnemyKind,
    pub x: f32,
    pub y: f32,
    pub hp_ratio: f32,
    pub state: EnemyState,
    pub flags: StatusFlags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerSnapshot {
    pub id: u64,
    pub kind: TowerKind,
    pub x: f32,
    pub y: f32,
    pub level: u8,
    pub range: f32,
    pub targeting_mode: TargetingMode,
    pub target: Option<u64>,
    pub cooldown_remaining: f32,
    /// 0.0 freshly placed .. 1.0 operational.
    pub construction_progress: f32,
    pub muzzle_flash: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: u64,
    pub kind: ProjectileKind,
    pub x: f32,
    pub y: f32,
    /// Heading in radians.
    pub heading: f32,
    /// Recent flight positions, oldest first.
    pub history: Vec<(f32, f32)>,
}

/// Complete frame snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub game_time: f64,
    pub state: String,
    pub score: i64,
    pub money: i64,
    pub lives: i32,
    pub wave_index: usize,
    pub speed: f32,
    pub enemies: Vec<EnemySnapshot>,
    pub towers: Vec<TowerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub effects: Vec<EffectInstance>,
    pub camera_hint: Option<(f32, f32)>,
}

impl Snapshot {
    /// Build a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64) -> Self {
        let mut enemies = Vec::new();
        let mut enemy_query = world.query::<(
            &EnemyId,
            &Enemy,
            &Position,
            &Health,
            &EnemyState,
            &StatusEffects,
            &EnemyTimers,
        )>();
        for (id, enemy, pos, health, state, status, timers) in enemy_query.iter(world) {
            enemies.push(EnemySnapshot {
                id: id.0,
                kind: enemy.kind,
                x: pos.x,
                y: pos.y,
                hp_ratio: health.fraction(),
                state: *state,
                flags: StatusFlags {
                    slowed: status.is_slowed(),
                    stunned: status.is_stunned(),
                    burning: status.is_burning(),
                    damage_flash: timers.damage_flash > 0.0,
                    spawning: timers.spawn_anim > 0.0,
                },
            });
        }
        enemies.sort_by_key(|e| e.id);

        let mut towers = Vec::new();
        let mut tower_query =
            world.query::<(&TowerId, &Tower, &Position, &TowerRuntime)>();
        for (id, tower, pos, runtime) in tower_query.iter(world) {
            towers.push(TowerSnapshot {
                id: id.0,
                kind: tower.kind,
                x: pos.x,
                y: pos.y,
                level: runtime.level,
                range: runtime.current.range,
                targeting_mode: runtime.targeting_mode,
                target: runtime.target,
                cooldown_remaining: runtime.cooldown_remaining,
                construction_progress: 1.0
                    - (runtime.construction_remaining / TowerRuntime::CONSTRUCTION_TIME)
                        .clamp(0.0, 1.0),
                muzzle_flash: runtime.muzzle_flash > 0.0,
            });
        }
        towers.sort_by_key(|t| t.id);

        let mut projectiles = Vec::new();
        let mut projectile_query =
            world.query::<(&ProjectileId, &Projectile, &Position, &ProjectileMotion)>();
        for (id, projectile, pos, motion) in projectile_query.iter(world) {
            projectiles.push(ProjectileSnapshot {
                id: id.0,
                kind: projectile.kind,
                x: pos.x,
                y: pos.y,
                heading: motion.heading(),
                history: motion.history.iter().copied().collect(),
            });
        }
        projectiles.sort_by_key(|p| p.id);

        let effects = world
            .get_resource::<ActiveEffects>()
            .map(|e| e.0.clone())
            .unwrap_or_default();

        let state = world.resource::<GameState>();
        Self {
            tick,
            game_time: state.game_time,
            state: state.play_state.name().to_string(),
            score: state.score,
            money: state.money,
            lives: state.lives,
            wave_index: state.wave_index,
            speed: state.speed_multiplier,
            enemies,
            towers,
            projectiles,
            effects,
            camera_hint: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
