//! Tower systems: construction, target selection and firing dispatch.
//!
//! Towers never touch enemy components directly. Shots either spawn
//! projectile entities or push attack intents that the effect resolver
//! applies, which keeps the tower -> enemy dependency one-way.

use bevy_ecs::prelude::*;
use std::collections::HashMap;

use crate::components::*;
use crate::events::{EventBus, GameEvent};
use crate::systems::effects::{AttackIntent, AttackQueue};

/// Detection range of an armed mine field.
const MINE_TRIGGER_RANGE: f32 = 48.0;
/// Re-arm delay after a mine detonates.
const MINE_REARM_TIME: f32 = 3.0;

/// Per-enemy data gathered once per tick for target selection.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    id: u64,
    x: f32,
    y: f32,
    hp: f32,
    flying: bool,
    traveled: f32,
}

fn collect_candidates(
    enemies: &Query<
        (&EnemyId, &Position, &Health, &EnemyStats, &PathFollower, &EnemyState),
        With<Enemy>,
    >,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = enemies
        .iter()
        .filter(|(_, _, health, _, _, state)| {
            health.is_alive() && !matches!(state, EnemyState::Dying | EnemyState::Dead)
        })
        .map(|(id, pos, health, stats, follower, _)| Candidate {
            id: id.0,
            x: pos.x,
            y: pos.y,
            hp: health.current,
            flying: stats.is_flying,
            traveled: follower.distance_traveled(*pos),
        })
        .collect();
    candidates.sort_by_key(|c| c.id);
    candidates
}

fn in_range(c: &Candidate, x: f32, y: f32, range: f32) -> bool {
    let dx = c.x - x;
    let dy = c.y - y;
    dx * dx + dy * dy <= range * range
}

fn targetable(c: &Candidate, stats: &TowerStats) -> bool {
    if c.flying {
        stats.can_target_air
    } else {
        stats.can_target_ground
    }
}

/// Pick the best candidate for a targeting mode. Ties break on ascending
/// enemy id, which `candidates` being id-sorted provides for free with
/// strict comparisons.
fn select_target(
    mode: TargetingMode,
    tower_x: f32,
    tower_y: f32,
    candidates: &[Candidate],
) -> Option<u64> {
    if candidates.is_empty() {
        return None;
    }
    let dist = |c: &Candidate| {
        let dx = c.x - tower_x;
        let dy = c.y - tower_y;
        dx * dx + dy * dy
    };

    let pick_max = |key: fn(&Candidate) -> f32, pool: &[Candidate]| {
        pool.iter()
            .fold(None::<&Candidate>, |best, c| match best {
                Some(b) if key(c) <= key(b) => Some(b),
                _ => Some(c),
            })
            .map(|c| c.id)
    };
    let pick_min = |key: &dyn Fn(&Candidate) -> f32, pool: &[Candidate]| {
        pool.iter()
            .fold(None::<&Candidate>, |best, c| match best {
                Some(b) if key(c) >= key(b) => Some(b),
                _ => Some(c),
            })
            .map(|c| c.id)
    };

    match mode {
        TargetingMode::First => pick_max(|c| c.traveled, candidates),
        TargetingMode::Last => pick_min(&|c: &Candidate| c.traveled, candidates),
        TargetingMode::Closest => pick_min(&dist, candidates),
        TargetingMode::Strongest => pick_max(|c| c.hp, candidates),
        TargetingMode::Weakest => pick_min(&|c: &Candidate| c.hp, candidates),
        TargetingMode::FlyingPriority => {
            let flyers: Vec<Candidate> =
                candidates.iter().copied().filter(|c| c.flying).collect();
            if flyers.is_empty() {
                pick_max(|c| c.traveled, candidates)
            } else {
                pick_max(|c| c.traveled, &flyers)
            }
        }
    }
}

/// Construction, cooldowns, targeting and firing for every tower.
pub fn tower_system(
    mut commands: Commands,
    time: Res<DeltaTime>,
    mut ids: ResMut<IdAllocator>,
    mut bus: ResMut<EventBus>,
    mut attacks: ResMut<AttackQueue>,
    mut towers: Query<(&TowerId, &Tower, &Position, &mut TowerRuntime)>,
    enemies: Query<
        (&EnemyId, &Position, &Health, &EnemyStats, &PathFollower, &EnemyState),
        With<Enemy>,
    >,
) {
    let dt = time.0;
    let candidates = collect_candidates(&enemies);
    let by_id: HashMap<u64, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();

    for (_tower_id, tower, pos, mut runtime) in towers.iter_mut() {
        // Construction: the tower does nothing until it finishes.
        if !runtime.is_constructed() {
            runtime.construction_remaining -= dt;
            continue;
        }

        if runtime.muzzle_flash > 0.0 {
            runtime.muzzle_flash -= dt;
        }
        if runtime.cooldown_remaining > 0.0 {
            runtime.cooldown_remaining = (runtime.cooldown_remaining - dt).max(0.0);
        }

        // Mines and support towers do not run the scan/fire loop.
        if tower.kind == TowerKind::MineLayer || runtime.current.attack_speed <= 0.0 {
            continue;
        }

        // Validate the current target every tick; losing it triggers an
        // immediate reacquisition rather than waiting out the scan timer.
        let mut lost_target = false;
        if let Some(target) = runtime.target {
            let still_valid = by_id.get(&target).is_some_and(|c| {
                in_range(c, pos.x, pos.y, runtime.current.range) && targetable(c, &runtime.current)
            });
            if !still_valid {
                runtime.target = None;
                lost_target = true;
            }
        }

        runtime.scan_timer += dt;
        if runtime.target.is_none()
            && (lost_target || runtime.scan_timer >= TowerRuntime::SCAN_INTERVAL)
        {
            runtime.scan_timer = 0.0;
            let eligible: Vec<Candidate> = candidates
                .iter()
                .copied()
                .filter(|c| {
                    in_range(c, pos.x, pos.y, runtime.current.range)
                        && targetable(c, &runtime.current)
                })
                .collect();
            runtime.target = select_target(runtime.targeting_mode, pos.x, pos.y, &eligible);
        }

        // Fire when ready.
        let Some(target_id) = runtime.target else {
            continue;
        };
        if runtime.cooldown_remaining > 0.0 {
            continue;
        }
        let Some(target) = by_id.get(&target_id).copied() else {
            continue;
        };

        fire(
            tower.kind,
            (pos.x, pos.y),
            target,
            &runtime.current,
            &mut commands,
            &mut ids,
            &mut bus,
            &mut attacks,
        );
        runtime.cooldown_remaining = 1.0 / runtime.current.attack_speed;
        runtime.muzzle_flash = 0.2;
    }
}

#[allow(clippy::too_many_arguments)]
fn fire(
    kind: TowerKind,
    origin: (f32, f32),
    target: &Candidate,
    stats: &TowerStats,
    commands: &mut Commands,
    ids: &mut IdAllocator,
    bus: &mut EventBus,
    attacks: &mut AttackQueue,
) {
    let target_pos = (target.x, target.y);
    match kind {
        TowerKind::LightningTower => {
            attacks.0.push(AttackIntent::Chain {
                origin,
                first_target: target.id,
                damage: stats.damage,
                chain: stats.chain,
                stun_duration: stats.stun_duration,
            });
        }
        TowerKind::FlameThrower => {
            attacks.0.push(AttackIntent::Cone {
                origin,
                toward: target_pos,
                radius: stats.area_radius,
                angle_degrees: 60.0,
                damage: stats.damage,
                burn_dps: stats.burn_damage,
                burn_duration: stats.burn_duration,
            });
        }
        TowerKind::CryoSteam => {
            attacks.0.push(AttackIntent::Area {
                center: target_pos,
                radius: stats.area_radius,
                damage: stats.damage,
                damage_kind: DamageKind::Ice,
                slow_effect: stats.slow_effect,
                slow_duration: stats.slow_duration,
                ground_only: false,
            });
        }
        TowerKind::ShieldGenerator | TowerKind::MineLayer => {
            // Shield buffing is a future extension; mines fire elsewhere.
        }
        _ => {
            let projectile_kind = match kind {
                TowerKind::SteamCannon => ProjectileKind::Cannonball,
                TowerKind::AntiAirGun => ProjectileKind::Bullet,
                TowerKind::BronzeMortar => ProjectileKind::MortarShell,
                TowerKind::SniperMecha => ProjectileKind::SniperBullet,
                _ => ProjectileKind::Bullet,
            };
            let id = ids.alloc();
            let carried = CarriedEffects::from_tower(stats, DamageKind::Physical);
            let mut bundle =
                ProjectileBundle::new(id, projectile_kind, origin, target_pos, stats.projectile_speed, carried);
            bundle.motion.target_enemy = Some(target.id);
            commands.spawn(bundle);
            bus.emit(GameEvent::ProjectileFired {
                projectile: id,
                kind: projectile_kind,
            });
        }
    }
}

/// Mine fields detonate when a ground enemy wanders into trigger range,
/// then spend a fixed re-arm delay.
pub fn mine_layer_system(
    mut attacks: ResMut<AttackQueue>,
    mut towers: Query<(&Tower, &Position, &mut TowerRuntime)>,
    enemies: Query<
        (&EnemyId, &Position, &Health, &EnemyStats, &PathFollower, &EnemyState),
        With<Enemy>,
    >,
) {
    let candidates = collect_candidates(&enemies);
    for (tower, pos, mut runtime) in towers.iter_mut() {
        if tower.kind != TowerKind::MineLayer
            || !runtime.is_constructed()
            || runtime.cooldown_remaining > 0.0
        {
            continue;
        }

        let trigger = candidates
            .iter()
            .find(|c| !c.flying && in_range(c, pos.x, pos.y, MINE_TRIGGER_RANGE));
        if let Some(enemy) = trigger {
            attacks.0.push(AttackIntent::Area {
                center: (enemy.x, enemy.y),
                radius: runtime.current.area_radius,
                damage: runtime.current.damage,
                damage_kind: DamageKind::Physical,
                slow_effect: 0.0,
                slow_duration: 0.0,
                ground_only: true,
            });
            runtime.cooldown_remaining = MINE_REARM_TIME;
            runtime.muzzle_flash = 0.2;
        }
    }
}
