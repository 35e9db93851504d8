//! Effect resolution: the only place damage and status effects actually
//! land on enemies.
//!
//! Towers and projectiles queue intents and impacts; this module drains the
//! queues, applies resistance/armor-adjusted damage, attaches statuses and
//! records visual effect instances for the snapshot.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::components::*;
use crate::events::{EventBus, GameEvent};
use crate::spatial::SpatialGrid;

/// Single-target impacts hit the closest live enemy within this range.
const IMPACT_SEARCH_RADIUS: f32 = 16.0;
/// Lightning chains hop at most this far between targets.
const CHAIN_HOP_RANGE: f32 = 64.0;
/// Damage decay per chain hop.
const CHAIN_DECAY: f32 = 0.8;
/// Step size when marching a piercing shot forward.
const PIERCE_STEP: f32 = 2.0;
/// How far a piercing shot keeps looking for further victims.
const PIERCE_MAX_MARCH: f32 = 200.0;

const LIGHTNING_EFFECT_TIME: f32 = 0.3;
const FLAME_EFFECT_TIME: f32 = 0.4;
const FROST_EFFECT_TIME: f32 = 0.5;
const EXPLOSION_EFFECT_TIME: f32 = 0.5;
const IMPACT_EFFECT_TIME: f32 = 0.2;

/// An instant attack queued by the tower system.
#[derive(Debug, Clone, PartialEq)]
pub enum AttackIntent {
    /// Lightning: hit the first target, then arc to nearby unhit enemies
    /// with decaying damage.
    Chain {
        origin: (f32, f32),
        first_target: u64,
        damage: f32,
        chain: u32,
        stun_duration: f32,
    },
    /// Flame cone from a tower toward a target.
    Cone {
        origin: (f32, f32),
        toward: (f32, f32),
        radius: f32,
        angle_degrees: f32,
        damage: f32,
        burn_dps: f32,
        burn_duration: f32,
    },
    /// Circular burst (cryo steam, mine detonation).
    Area {
        center: (f32, f32),
        radius: f32,
        damage: f32,
        damage_kind: DamageKind,
        slow_effect: f32,
        slow_duration: f32,
        ground_only: bool,
    },
}

#[derive(Resource, Debug, Default)]
pub struct AttackQueue(pub Vec<AttackIntent>);

/// A projectile impact (or staged enemy explosion) awaiting resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Impact {
    pub position: (f32, f32),
    /// Unit direction of travel at impact; drives pierce marching.
    pub heading: (f32, f32),
    /// None for enemy explosions.
    pub kind: Option<ProjectileKind>,
    pub damage: f32,
    pub damage_kind: DamageKind,
    pub area_radius: f32,
    pub pierce: u32,
    pub slow_effect: f32,
    pub slow_duration: f32,
    pub stun_duration: f32,
    pub burn_dps: f32,
    pub burn_duration: f32,
}

impl Impact {
    pub fn from_projectile(
        position: (f32, f32),
        heading: (f32, f32),
        kind: ProjectileKind,
        carried: &CarriedEffects,
    ) -> Self {
        Self {
            position,
            heading,
            kind: Some(kind),
            damage: carried.damage,
            damage_kind: carried.damage_kind,
            area_radius: carried.area_radius,
            pierce: carried.pierce,
            slow_effect: carried.slow_effect,
            slow_duration: carried.slow_duration,
            stun_duration: carried.stun_duration,
            burn_dps: carried.burn_damage,
            burn_duration: carried.burn_duration,
        }
    }

    /// A dying enemy's explosion: fire-type area damage.
    pub fn explosion(position: (f32, f32), damage: f32, radius: f32) -> Self {
        Self {
            position,
            heading: (0.0, 0.0),
            kind: None,
            damage,
            damage_kind: DamageKind::Fire,
            area_radius: radius,
            pierce: 0,
            slow_effect: 0.0,
            slow_duration: 0.0,
            stun_duration: 0.0,
            burn_dps: 0.0,
            burn_duration: 0.0,
        }
    }
}

#[derive(Resource, Debug, Default)]
pub struct ImpactQueue(pub Vec<Impact>);

/// A visual effect in flight, surfaced through the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectInstance {
    pub kind: String,
    pub position: (f32, f32),
    pub radius: f32,
    /// Extra positions (lightning arc waypoints).
    pub points: Vec<(f32, f32)>,
    pub elapsed: f32,
    pub total: f32,
}

#[derive(Resource, Debug, Default)]
pub struct ActiveEffects(pub Vec<EffectInstance>);

impl ActiveEffects {
    fn push(&mut self, kind: &str, position: (f32, f32), radius: f32, total: f32) {
        self.0.push(EffectInstance {
            kind: kind.to_string(),
            position,
            radius,
            points: Vec::new(),
            elapsed: 0.0,
            total,
        });
    }
}

type EnemyQuery<'w, 's> = Query<
    'w,
    's,
    (
        &'static EnemyId,
        &'static Position,
        &'static mut Health,
        &'static mut StatusEffects,
        &'static EnemyStats,
        &'static mut EnemyTimers,
    ),
    With<Enemy>,
>;

/// Apply one hit to one enemy, including carried statuses.
#[allow(clippy::too_many_arguments)]
fn apply_hit(
    enemies: &mut EnemyQuery,
    entity: Entity,
    raw_damage: f32,
    kind: DamageKind,
    slow: (f32, f32),
    stun: f32,
    burn: (f32, f32),
) -> bool {
    let Ok((_, _, mut health, mut status, stats, mut timers)) = enemies.get_mut(entity) else {
        return false;
    };
    if !health.is_alive() {
        return false;
    }

    if raw_damage > 0.0 {
        health.damage(effective_damage(raw_damage, kind, stats));
        timers.damage_flash = 0.2;
    }
    if slow.0 > 0.0 {
        status.add_slow(slow.0, slow.1, "slow");
    }
    if stun > 0.0 {
        status.stun(stun);
    }
    if burn.0 > 0.0 {
        status.add_burn(burn.0, burn.1);
    }
    true
}

/// Drains attack intents and projectile impacts, applying them to enemies.
pub fn effect_resolver_system(
    mut attacks: ResMut<AttackQueue>,
    mut impacts: ResMut<ImpactQueue>,
    mut effects: ResMut<ActiveEffects>,
    mut bus: ResMut<EventBus>,
    spatial: Res<SpatialGrid>,
    ids: Query<(Entity, &EnemyId, &Position), With<Enemy>>,
    mut enemies: EnemyQuery,
) {
    let by_id: HashMap<u64, (Entity, (f32, f32))> = ids
        .iter()
        .map(|(entity, id, pos)| (id.0, (entity, (pos.x, pos.y))))
        .collect();

    for intent in std::mem::take(&mut attacks.0) {
        match intent {
            AttackIntent::Chain {
                origin,
                first_target,
                damage,
                chain,
                stun_duration,
            } => resolve_chain(
                &mut enemies,
                &by_id,
                &spatial,
                &mut effects,
                &mut bus,
                origin,
                first_target,
                damage,
                chain,
                stun_duration,
            ),
            AttackIntent::Cone {
                origin,
                toward,
                radius,
                angle_degrees,
                damage,
                burn_dps,
                burn_duration,
            } => {
                resolve_cone(
                    &mut enemies,
                    &spatial,
                    origin,
                    toward,
                    radius,
                    angle_degrees,
                    damage,
                    burn_dps,
                    burn_duration,
                );
                bus.emit(GameEvent::FlameEffect {
                    position: origin,
                    target: toward,
                    radius,
                });
                effects.push("flame", origin, radius, FLAME_EFFECT_TIME);
            }
            AttackIntent::Area {
                center,
                radius,
                damage,
                damage_kind,
                slow_effect,
                slow_duration,
                ground_only,
            } => {
                for entry in spatial.query_radius(center.0, center.1, radius) {
                    if ground_only && entry.flying {
                        continue;
                    }
                    apply_hit(
                        &mut enemies,
                        entry.entity,
                        damage,
                        damage_kind,
                        (slow_effect, slow_duration),
                        0.0,
                        (0.0, 0.0),
                    );
                }
                if ground_only {
                    bus.emit(GameEvent::MineExplosion {
                        position: center,
                        radius,
                    });
                    effects.push("mine_explosion", center, radius, EXPLOSION_EFFECT_TIME);
                } else {
                    bus.emit(GameEvent::FrostEffect {
                        position: center,
                        radius,
                    });
                    effects.push("frost", center, radius, FROST_EFFECT_TIME);
                }
            }
        }
    }

    for impact in std::mem::take(&mut impacts.0) {
        if impact.area_radius > 0.0 {
            for entry in
                spatial.query_radius(impact.position.0, impact.position.1, impact.area_radius)
            {
                apply_hit(
                    &mut enemies,
                    entry.entity,
                    impact.damage,
                    impact.damage_kind,
                    (impact.slow_effect, impact.slow_duration),
                    impact.stun_duration,
                    (impact.burn_dps, impact.burn_duration),
                );
            }
            let kind = if impact.kind.is_none() {
                "explosion"
            } else {
                "impact"
            };
            effects.push(kind, impact.position, impact.area_radius, EXPLOSION_EFFECT_TIME);
        } else {
            resolve_single_impact(&mut enemies, &spatial, &mut effects, impact);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_chain(
    enemies: &mut EnemyQuery,
    by_id: &HashMap<u64, (Entity, (f32, f32))>,
    spatial: &SpatialGrid,
    effects: &mut ActiveEffects,
    bus: &mut EventBus,
    origin: (f32, f32),
    first_target: u64,
    damage: f32,
    chain: u32,
    stun_duration: f32,
) {
    let Some(&(first_entity, mut current_pos)) = by_id.get(&first_target) else {
        return;
    };

    let mut hit_ids = vec![first_target];
    let mut positions = vec![current_pos];
    apply_hit(
        enemies,
        first_entity,
        damage,
        DamageKind::Electric,
        (0.0, 0.0),
        stun_duration,
        (0.0, 0.0),
    );

    for hop in 0..chain {
        let Some(next) =
            spatial.nearest_excluding(current_pos.0, current_pos.1, CHAIN_HOP_RANGE, &hit_ids)
        else {
            break;
        };
        let hop_damage = damage * CHAIN_DECAY.powi(hop as i32 + 1);
        apply_hit(
            enemies,
            next.entity,
            hop_damage,
            DamageKind::Electric,
            (0.0, 0.0),
            stun_duration,
            (0.0, 0.0),
        );
        hit_ids.push(next.id);
        current_pos = (next.x, next.y);
        positions.push(current_pos);
    }

    bus.emit(GameEvent::LightningEffect {
        positions: positions.clone(),
    });
    effects.0.push(EffectInstance {
        kind: "lightning".to_string(),
        position: origin,
        radius: 0.0,
        points: positions,
        elapsed: 0.0,
        total: LIGHTNING_EFFECT_TIME,
    });
}

#[allow(clippy::too_many_arguments)]
fn resolve_cone(
    enemies: &mut EnemyQuery,
    spatial: &SpatialGrid,
    origin: (f32, f32),
    toward: (f32, f32),
    radius: f32,
    angle_degrees: f32,
    damage: f32,
    burn_dps: f32,
    burn_duration: f32,
) {
    let axis = (toward.0 - origin.0, toward.1 - origin.1);
    let axis_len = (axis.0 * axis.0 + axis.1 * axis.1).sqrt();
    let half_angle = (angle_degrees / 2.0).to_radians();

    for entry in spatial.query_radius(origin.0, origin.1, radius) {
        let to_enemy = (entry.x - origin.0, entry.y - origin.1);
        let enemy_len = (to_enemy.0 * to_enemy.0 + to_enemy.1 * to_enemy.1).sqrt();
        let inside = if axis_len < 1e-3 || enemy_len < 1e-3 {
            true
        } else {
            let cos = (axis.0 * to_enemy.0 + axis.1 * to_enemy.1) / (axis_len * enemy_len);
            cos.clamp(-1.0, 1.0).acos() <= half_angle
        };
        if inside {
            apply_hit(
                enemies,
                entry.entity,
                damage,
                DamageKind::Fire,
                (0.0, 0.0),
                0.0,
                (burn_dps, burn_duration),
            );
        }
    }
}

/// Single-target impact, with pierce marching for shots that keep going.
fn resolve_single_impact(
    enemies: &mut EnemyQuery,
    spatial: &SpatialGrid,
    effects: &mut ActiveEffects,
    impact: Impact,
) {
    let mut hit_ids: Vec<u64> = Vec::new();

    if let Some(first) = spatial
        .query_radius(impact.position.0, impact.position.1, IMPACT_SEARCH_RADIUS)
        .into_iter()
        .next()
    {
        apply_hit(
            enemies,
            first.entity,
            impact.damage,
            impact.damage_kind,
            (impact.slow_effect, impact.slow_duration),
            impact.stun_duration,
            (impact.burn_dps, impact.burn_duration),
        );
        hit_ids.push(first.id);
    }

    // Pierce: march on along the heading, damaging fresh enemies.
    let heading_len = (impact.heading.0 * impact.heading.0
        + impact.heading.1 * impact.heading.1)
        .sqrt();
    if impact.pierce > 0 && heading_len > 1e-3 {
        let dir = (impact.heading.0 / heading_len, impact.heading.1 / heading_len);
        let mut remaining = impact.pierce;
        let mut marched = 0.0;
        let mut point = impact.position;

        while remaining > 0 && marched < PIERCE_MAX_MARCH {
            point = (point.0 + dir.0 * PIERCE_STEP, point.1 + dir.1 * PIERCE_STEP);
            marched += PIERCE_STEP;
            if let Some(victim) =
                spatial.nearest_excluding(point.0, point.1, IMPACT_SEARCH_RADIUS, &hit_ids)
            {
                apply_hit(
                    enemies,
                    victim.entity,
                    impact.damage,
                    impact.damage_kind,
                    (impact.slow_effect, impact.slow_duration),
                    impact.stun_duration,
                    (impact.burn_dps, impact.burn_duration),
                );
                hit_ids.push(victim.id);
                remaining -= 1;
            }
        }
    }

    effects.push("impact", impact.position, 0.0, IMPACT_EFFECT_TIME);
}

/// Ages visual effects and drops the expired ones.
pub fn effect_aging_system(time: Res<DeltaTime>, mut effects: ResMut<ActiveEffects>) {
    for effect in effects.0.iter_mut() {
        effect.elapsed += time.0;
    }
    effects.0.retain(|e| e.elapsed < e.total);
}
