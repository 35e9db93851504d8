//! Projectile motion and impact emission.
//!
//! Each motion kind integrates its own way; when a shot lands it pushes an
//! [`Impact`] for the effect resolver (which runs later in the same tick)
//! and is despawned on the following tick. Shots that outlive their travel
//! budget disappear without an impact.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::*;
use crate::events::{EventBus, GameEvent};
use crate::systems::effects::{Impact, ImpactQueue};

/// Linear shots snap-hit within this distance of their target point.
const LINEAR_HIT_RANGE: f32 = 5.0;
/// Ballistic shots hit when they fall below the target within this
/// horizontal window.
const BALLISTIC_HIT_WINDOW: f32 = 20.0;
/// Homing shots hit within this distance of their (live) target.
const HOMING_HIT_RANGE: f32 = 8.0;

/// Moves every projectile, emits impacts, and sweeps spent shots.
pub fn projectile_system(
    mut commands: Commands,
    time: Res<DeltaTime>,
    mut impacts: ResMut<ImpactQueue>,
    mut bus: ResMut<EventBus>,
    enemies: Query<(&EnemyId, &Position, &Health), (With<Enemy>, Without<Projectile>)>,
    mut projectiles: Query<
        (Entity, &Projectile, &mut Position, &mut ProjectileMotion, &CarriedEffects),
        Without<Enemy>,
    >,
) {
    let dt = time.0;
    let enemy_positions: HashMap<u64, (f32, f32)> = enemies
        .iter()
        .filter(|(_, _, health)| health.is_alive())
        .map(|(id, pos, _)| (id.0, (pos.x, pos.y)))
        .collect();

    for (entity, projectile, mut pos, mut motion, carried) in projectiles.iter_mut() {
        // Impacts handed over last tick: the body goes away now.
        if motion.resolved {
            commands.entity(entity).despawn();
            continue;
        }

        // Instant shots arrive pre-hit; emit their impact on the first tick.
        if motion.has_hit {
            emit_impact(projectile.kind, &pos, &motion, carried, &mut impacts, &mut bus);
            motion.resolved = true;
            continue;
        }

        motion.travel_time += dt;
        if motion.travel_time >= motion.max_travel_time {
            // Expired without hitting anything; discarded silently.
            commands.entity(entity).despawn();
            continue;
        }

        motion.record_history((pos.x, pos.y));

        match motion.motion {
            MotionKind::Linear => {
                pos.x += motion.velocity.0 * dt;
                pos.y += motion.velocity.1 * dt;
                let (tx, ty) = motion.target_position;
                let dist = ((pos.x - tx).powi(2) + (pos.y - ty).powi(2)).sqrt();
                if dist < LINEAR_HIT_RANGE {
                    pos.x = tx;
                    pos.y = ty;
                    motion.has_hit = true;
                }
            }
            MotionKind::Ballistic => {
                pos.x += motion.velocity.0 * dt;
                pos.y += motion.velocity.1 * dt;
                motion.velocity.1 -= motion.gravity * dt;
                let (tx, ty) = motion.target_position;
                if pos.y <= ty && (pos.x - tx).abs() < BALLISTIC_HIT_WINDOW {
                    pos.x = tx;
                    pos.y = ty;
                    motion.has_hit = true;
                }
            }
            MotionKind::Homing => {
                // Chase the live target; keep the last known point if it
                // died.
                if let Some(id) = motion.target_enemy {
                    if let Some(&live) = enemy_positions.get(&id) {
                        motion.target_position = live;
                    }
                }

                let current_angle = motion.velocity.1.atan2(motion.velocity.0);
                let (tx, ty) = motion.target_position;
                let target_angle = (ty - pos.y).atan2(tx - pos.x);

                let mut angle_diff = target_angle - current_angle;
                while angle_diff > std::f32::consts::PI {
                    angle_diff -= std::f32::consts::TAU;
                }
                while angle_diff < -std::f32::consts::PI {
                    angle_diff += std::f32::consts::TAU;
                }
                let max_rotation = motion.max_turn_rate * dt;
                angle_diff = angle_diff.clamp(-max_rotation, max_rotation);

                let new_angle = current_angle + angle_diff * motion.homing_strength * dt;
                motion.velocity = (
                    motion.speed * new_angle.cos(),
                    motion.speed * new_angle.sin(),
                );

                pos.x += motion.velocity.0 * dt;
                pos.y += motion.velocity.1 * dt;

                let dist = ((pos.x - tx).powi(2) + (pos.y - ty).powi(2)).sqrt();
                if dist < HOMING_HIT_RANGE {
                    pos.x = tx;
                    pos.y = ty;
                    motion.has_hit = true;
                }
            }
            // Instant is handled above; mines sit until detonated.
            MotionKind::Instant | MotionKind::Static => {}
        }

        if motion.has_hit {
            emit_impact(projectile.kind, &pos, &motion, carried, &mut impacts, &mut bus);
            motion.resolved = true;
        }
    }
}

fn emit_impact(
    kind: ProjectileKind,
    pos: &Position,
    motion: &ProjectileMotion,
    carried: &CarriedEffects,
    impacts: &mut ImpactQueue,
    bus: &mut EventBus,
) {
    // Heading from velocity; instants fall back to source->target.
    let heading = if motion.velocity.0 != 0.0 || motion.velocity.1 != 0.0 {
        motion.velocity
    } else {
        (
            motion.target_position.0 - motion.source.0,
            motion.target_position.1 - motion.source.1,
        )
    };

    impacts
        .0
        .push(Impact::from_projectile((pos.x, pos.y), heading, kind, carried));
    bus.emit(GameEvent::ProjectileImpact {
        position: (pos.x, pos.y),
        kind,
        damage: carried.damage,
        damage_kind: carried.damage_kind,
        area_radius: carried.area_radius,
    });
}
