//! Enemy systems: wave spawning, status upkeep, path following, special
//! behaviors and lifecycle resolution.

use bevy_ecs::prelude::*;
use log::{debug, warn};
use std::collections::VecDeque;

use crate::components::*;
use crate::config::GameConfig;
use crate::events::{EventBus, GameEvent};
use crate::mapgen::GeneratedMap;
use crate::pathfinding::{Algorithm, Constraints, Heuristic, Pathfinder};
use crate::scheduler::{ScheduledAction, Scheduler};
use crate::systems::economy::{EconomyOp, EconomyQueue};
use crate::systems::effects::{Impact, ImpactQueue};

/// Distance at which an enemy snaps onto its next waypoint.
const WAYPOINT_SNAP: f32 = 2.0;
/// Iron golems heal this much every regeneration period.
const GOLEM_REGEN_AMOUNT: f32 = 5.0;
const GOLEM_REGEN_PERIOD: f32 = 2.0;
/// Cyber survivors reroll resistances on this period.
const CYBER_REROLL_PERIOD: f32 = 5.0;

/// Where the current wave stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavePhase {
    /// Nothing running yet, or between waves.
    Idle,
    /// Spawning and fighting the current wave.
    Active,
    /// All waves cleared.
    Finished,
}

/// Wave bookkeeping resource.
#[derive(Resource, Debug)]
pub struct WaveState {
    pub phase: WavePhase,
    pub pending: VecDeque<EnemyKind>,
    pub level_multiplier: f32,
    pub spawn_timer: f32,
}

impl Default for WaveState {
    fn default() -> Self {
        Self {
            phase: WavePhase::Idle,
            pending: VecDeque::new(),
            level_multiplier: 1.0,
            spawn_timer: 0.0,
        }
    }
}

impl WaveState {
    /// Arm the wave at `wave_index`; the first enemy spawns on the next
    /// spawn tick.
    pub fn begin(&mut self, config: &GameConfig, wave_index: usize) -> bool {
        let Some(wave) = config.waves.get(wave_index) else {
            return false;
        };
        self.pending.clear();
        for &(kind, count) in &wave.enemies {
            for _ in 0..count {
                self.pending.push_back(kind);
            }
        }
        self.level_multiplier = wave.level_multiplier;
        self.spawn_timer = 0.0;
        self.phase = WavePhase::Active;
        true
    }
}

/// Applies due scheduler actions: wave starts, interest payments, deferred
/// event emission.
pub fn scheduler_system(
    mut scheduler: ResMut<Scheduler>,
    mut wave_state: ResMut<WaveState>,
    game_state: Res<GameState>,
    mut bus: ResMut<EventBus>,
    mut economy: ResMut<EconomyQueue>,
    config: Res<GameConfig>,
) {
    for action in scheduler.update(game_state.game_time) {
        match action {
            ScheduledAction::StartNextWave => {
                let index = game_state.wave_index;
                if wave_state.begin(&config, index) {
                    bus.emit(GameEvent::WaveStart { wave_index: index });
                    debug!("wave {index} started");
                }
            }
            ScheduledAction::GrantInterest => {
                let interest =
                    (game_state.money as f64 * config.balance.economy.interest_rate as f64) as i64;
                if interest > 0 {
                    economy.0.push(EconomyOp::Income { amount: interest });
                }
            }
            ScheduledAction::Emit(event) => bus.emit(event),
        }
    }
}

/// Releases pending wave enemies onto the path at the configured interval.
/// Enemies whose spawn tile cannot reach the base are skipped with a
/// warning.
pub fn enemy_spawn_system(
    mut commands: Commands,
    time: Res<DeltaTime>,
    mut wave_state: ResMut<WaveState>,
    map: Res<GeneratedMap>,
    mut pathfinder: ResMut<Pathfinder>,
    mut ids: ResMut<IdAllocator>,
    mut bus: ResMut<EventBus>,
    config: Res<GameConfig>,
) {
    if wave_state.phase != WavePhase::Active || wave_state.pending.is_empty() {
        return;
    }

    // Enemies march on the road, not across open ground: restrict the
    // search to path-family tiles.
    let road: std::collections::HashSet<(i32, i32)> = [
        crate::grid::TileKind::Path,
        crate::grid::TileKind::Spawn,
        crate::grid::TileKind::Base,
        crate::grid::TileKind::Bridge,
    ]
    .iter()
    .flat_map(|&kind| map.grid.tiles_of_kind(kind))
    .collect();
    let constraints = Constraints {
        walkable_filter: Some(Box::new(move |x, y| road.contains(&(x, y)))),
        ..Default::default()
    };

    wave_state.spawn_timer -= time.0;
    while wave_state.spawn_timer <= 0.0 {
        let Some(kind) = wave_state.pending.pop_front() else {
            break;
        };
        wave_state.spawn_timer += config.balance.wave.spawn_interval;

        let route = pathfinder.find_path(
            &map.grid,
            map.spawn,
            map.base,
            Algorithm::AStar,
            Heuristic::Manhattan,
            &constraints,
        );
        if !route.success {
            warn!("no route from spawn to base, skipping {kind:?} spawn");
            continue;
        }

        let id = ids.alloc();
        let mut bundle =
            EnemyBundle::new(id, kind, wave_state.level_multiplier, route.world_waypoints(&map.grid));
        // The route is known, so the unit starts marching immediately.
        bundle.state = EnemyState::Moving;
        commands.spawn(bundle);
        bus.emit(GameEvent::EnemySpawned { enemy: id, kind });
    }
}

/// Per-tick status upkeep: presentation timers, speed-modifier expiry and
/// damage-over-time ticks. DoTs fire once per second of enemy time and
/// respect resistances and armor like any other hit.
pub fn enemy_status_system(
    time: Res<DeltaTime>,
    mut query: Query<
        (&mut StatusEffects, &mut Health, &mut EnemyTimers, &EnemyStats, &EnemyState),
        With<Enemy>,
    >,
) {
    let dt = time.0;
    for (mut status, mut health, mut timers, stats, state) in query.iter_mut() {
        if matches!(state, EnemyState::Dying | EnemyState::Dead) {
            continue;
        }

        if timers.damage_flash > 0.0 {
            timers.damage_flash -= dt;
        }
        if timers.spawn_anim > 0.0 {
            timers.spawn_anim -= dt;
        }

        for modifier in status.speed_modifiers.iter_mut() {
            modifier.remaining -= dt;
        }
        status.speed_modifiers.retain(|m| m.remaining > 0.0);

        let mut flash = false;
        for dot in status.dots.iter_mut() {
            dot.remaining -= dt;
            dot.tick_phase -= dt;
            if dot.tick_phase <= 0.0 {
                dot.tick_phase += 1.0;
                health.damage(effective_damage(dot.dps, dot.kind, stats));
                flash = true;
            }
        }
        status.dots.retain(|d| d.remaining > 0.0);
        if flash {
            timers.damage_flash = 0.2;
        }
    }
}

/// Waypoint-following movement. A stunned enemy burns stun time instead of
/// moving; otherwise it advances at its modified speed and snaps onto each
/// waypoint it comes within two world units of.
pub fn enemy_movement_system(
    time: Res<DeltaTime>,
    mut query: Query<
        (
            &mut Position,
            &mut PathFollower,
            &mut StatusEffects,
            &mut EnemyState,
            &EnemyStats,
            &Health,
        ),
        With<Enemy>,
    >,
) {
    let dt = time.0;
    for (mut pos, mut follower, mut status, mut state, stats, health) in query.iter_mut() {
        if !health.is_alive() || *state != EnemyState::Moving {
            continue;
        }

        if status.stun_remaining > 0.0 {
            status.stun_remaining = (status.stun_remaining - dt).max(0.0);
            continue;
        }

        let speed = stats.base_speed * status.speed_factor();
        let mut budget = speed * dt;

        while budget > 0.0 {
            let Some((tx, ty)) = follower.next_waypoint() else {
                follower.reached_end = true;
                *state = EnemyState::Attacking;
                break;
            };
            let dx = tx - pos.x;
            let dy = ty - pos.y;
            let distance = (dx * dx + dy * dy).sqrt();

            if distance < WAYPOINT_SNAP {
                pos.x = tx;
                pos.y = ty;
                follower.index += 1;
                continue;
            }

            let step = budget.min(distance);
            pos.x += dx / distance * step;
            pos.y += dy / distance * step;
            budget -= step;
        }
    }
}

/// Kind-specific behaviors on the shared behavior timer.
pub fn enemy_special_system(
    time: Res<DeltaTime>,
    mut rng: ResMut<SimRng>,
    mut query: Query<
        (&Enemy, &mut EnemyStats, &mut Health, &mut EnemyTimers, &EnemyState),
        With<Enemy>,
    >,
) {
    let dt = time.0;
    for (enemy, mut stats, mut health, mut timers, state) in query.iter_mut() {
        if !health.is_alive() || matches!(state, EnemyState::Dying | EnemyState::Dead) {
            continue;
        }
        timers.behavior += dt;

        match enemy.kind {
            EnemyKind::IronGolem if stats.can_regenerate => {
                if timers.behavior >= GOLEM_REGEN_PERIOD {
                    health.heal(GOLEM_REGEN_AMOUNT);
                    timers.behavior = 0.0;
                }
            }
            EnemyKind::CyberSurvivor => {
                if timers.behavior >= CYBER_REROLL_PERIOD {
                    stats.reroll_resistances(&mut rng.0);
                    timers.behavior = 0.0;
                }
            }
            _ => {}
        }
    }
}

/// Resolves deaths and base breaches after this tick's damage has been
/// applied.
///
/// A freshly dead enemy spends one tick in `Dying` so its death event and
/// any explosion are visible before removal; the explosion itself is staged
/// into the impact queue and lands next tick, when the effect resolver runs
/// again.
pub fn enemy_lifecycle_system(
    mut commands: Commands,
    mut query: Query<
        (Entity, &EnemyId, &Enemy, &Position, &Health, &EnemyStats, &mut EnemyState),
        With<Enemy>,
    >,
    mut bus: ResMut<EventBus>,
    mut economy: ResMut<EconomyQueue>,
    mut impacts: ResMut<ImpactQueue>,
) {
    for (entity, id, enemy, pos, health, stats, mut state) in query.iter_mut() {
        match *state {
            EnemyState::Dying | EnemyState::Dead => {
                commands.entity(entity).despawn();
                continue;
            }
            EnemyState::Attacking => {
                // Reached the base: one life per breach.
                bus.emit(GameEvent::EnemyReachBase {
                    enemy: id.0,
                    damage: 1,
                });
                economy.0.push(EconomyOp::LifeLoss { amount: 1 });
                commands.entity(entity).despawn();
                continue;
            }
            _ => {}
        }

        if !health.is_alive() {
            *state = EnemyState::Dying;
            bus.emit(GameEvent::EnemyDeath {
                enemy: id.0,
                reward: stats.reward,
                position: (pos.x, pos.y),
            });
            economy.0.push(EconomyOp::Kill {
                reward: stats.reward,
            });

            if enemy.kind == EnemyKind::SteamTank && stats.explosion_damage > 0.0 {
                bus.emit(GameEvent::EnemyExplosion {
                    position: (pos.x, pos.y),
                    damage: stats.explosion_damage,
                    radius: stats.explosion_radius,
                });
                impacts.0.push(Impact::explosion(
                    (pos.x, pos.y),
                    stats.explosion_damage,
                    stats.explosion_radius,
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn world_with_core_resources() -> World {
        let mut world = World::new();
        world.insert_resource(DeltaTime(0.1));
        world.insert_resource(SimRng(ChaCha8Rng::seed_from_u64(1)));
        world.insert_resource(EventBus::new());
        world.insert_resource(EconomyQueue::default());
        world.insert_resource(ImpactQueue::default());
        world
    }

    fn straight_waypoints(tiles: i32) -> Vec<(f32, f32)> {
        (0..tiles).map(|i| (i as f32 * 32.0 + 16.0, 272.0)).collect()
    }

    fn spawn_moving_enemy(world: &mut World, kind: EnemyKind) -> Entity {
        let mut bundle = EnemyBundle::new(1, kind, 1.0, straight_waypoints(10));
        bundle.state = EnemyState::Moving;
        world.spawn(bundle).id()
    }

    #[test]
    fn test_movement_advances_along_path() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_movement_system);
        schedule.run(&mut world);

        // 60 units/s * 0.1s = 6 units of progress.
        let pos = world.get::<Position>(entity).unwrap();
        assert!((pos.x - 22.0).abs() < 0.01);
        assert_eq!(pos.y, 272.0);
    }

    #[test]
    fn test_stun_blocks_movement_and_decays() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);
        world
            .get_mut::<StatusEffects>(entity)
            .unwrap()
            .stun(0.25);

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_movement_system);
        schedule.run(&mut world);
        schedule.run(&mut world);

        let pos = *world.get::<Position>(entity).unwrap();
        assert_eq!(pos.x, 16.0); // two stunned ticks, no motion

        // Stun expired (0.25 - 0.2 left -> third tick moves partially).
        schedule.run(&mut world);
        schedule.run(&mut world);
        let pos = *world.get::<Position>(entity).unwrap();
        assert!(pos.x > 16.0);
    }

    #[test]
    fn test_slow_reduces_speed() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);
        world
            .get_mut::<StatusEffects>(entity)
            .unwrap()
            .add_slow(0.5, 5.0, "test");

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_movement_system);
        schedule.run(&mut world);

        let pos = world.get::<Position>(entity).unwrap();
        assert!((pos.x - 19.0).abs() < 0.01); // half of 6 units
    }

    #[test]
    fn test_reaching_path_end_marks_attacking() {
        let mut world = world_with_core_resources();
        let mut bundle =
            EnemyBundle::new(1, EnemyKind::SteamSoldier, 1.0, vec![(16.0, 16.0), (48.0, 16.0)]);
        bundle.state = EnemyState::Moving;
        let entity = world.spawn(bundle).id();

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_movement_system);
        for _ in 0..20 {
            schedule.run(&mut world);
        }

        assert_eq!(*world.get::<EnemyState>(entity).unwrap(), EnemyState::Attacking);
        assert!(world.get::<PathFollower>(entity).unwrap().reached_end);
    }

    #[test]
    fn test_dot_ticks_once_per_second() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);
        world
            .get_mut::<StatusEffects>(entity)
            .unwrap()
            .add_burn(10.0, 3.0);

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_status_system);
        // 0.9 seconds: no tick yet.
        for _ in 0..9 {
            schedule.run(&mut world);
        }
        assert_eq!(world.get::<Health>(entity).unwrap().current, 100.0);

        // Crossing 1.0s: first tick. Burn 10 fire vs 0.2 resist -> 8, floor
        // pre-armor, then armor 5 -> 3.
        schedule.run(&mut world);
        assert_eq!(world.get::<Health>(entity).unwrap().current, 97.0);
    }

    #[test]
    fn test_golem_regenerates() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::IronGolem);
        world.get_mut::<Health>(entity).unwrap().current = 100.0;

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_special_system);
        for _ in 0..20 {
            schedule.run(&mut world); // 2.0 seconds
        }

        assert_eq!(world.get::<Health>(entity).unwrap().current, 105.0);
    }

    #[test]
    fn test_cyber_survivor_rerolls_on_schedule() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::CyberSurvivor);

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_special_system);
        for _ in 0..50 {
            schedule.run(&mut world); // 5.0 seconds
        }

        let stats = world.get::<EnemyStats>(entity).unwrap();
        let high = stats.resistances.iter().filter(|&&r| r == 0.8).count();
        let low = stats.resistances.iter().filter(|&&r| r == 0.1).count();
        assert_eq!((high, low), (1, 3));
    }

    #[test]
    fn test_death_pays_reward_and_stages_dying() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);
        world.get_mut::<Health>(entity).unwrap().current = 0.0;

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_lifecycle_system);
        schedule.run(&mut world);

        assert_eq!(*world.get::<EnemyState>(entity).unwrap(), EnemyState::Dying);
        let economy = world.resource::<EconomyQueue>();
        assert!(matches!(economy.0[0], EconomyOp::Kill { reward: 10 }));

        // Next tick the body is removed.
        schedule.run(&mut world);
        assert!(world.get_entity(entity).is_err());
    }

    #[test]
    fn test_steam_tank_death_stages_explosion() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamTank);
        world.get_mut::<Health>(entity).unwrap().current = 0.0;

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_lifecycle_system);
        schedule.run(&mut world);

        let impacts = world.resource::<ImpactQueue>();
        assert_eq!(impacts.0.len(), 1);
        assert_eq!(impacts.0[0].area_radius, 64.0);
    }

    #[test]
    fn test_reach_base_costs_a_life() {
        let mut world = world_with_core_resources();
        let entity = spawn_moving_enemy(&mut world, EnemyKind::SteamSoldier);
        *world.get_mut::<EnemyState>(entity).unwrap() = EnemyState::Attacking;

        let mut schedule = Schedule::default();
        schedule.add_systems(enemy_lifecycle_system);
        schedule.run(&mut world);

        let economy = world.resource::<EconomyQueue>();
        assert!(matches!(economy.0[0], EconomyOp::LifeLoss { amount: 1 }));
        assert!(world.get_entity(entity).is_err());
    }

    #[test]
    fn test_zero_hp_enemy_dies_without_moving() {
        let mut world = world_with_core_resources();
        let mut bundle =
            EnemyBundle::new(1, EnemyKind::SteamSoldier, 1.0, straight_waypoints(10));
        bundle.state = EnemyState::Moving;
        bundle.health = Health::new(0.0);
        bundle.stats.max_hp = 0.0;
        let entity = world.spawn(bundle).id();

        let mut schedule = Schedule::default();
        schedule.add_systems((enemy_movement_system, enemy_lifecycle_system).chain());
        schedule.run(&mut world);

        assert_eq!(*world.get::<EnemyState>(entity).unwrap(), EnemyState::Dying);
        assert_eq!(world.get::<Position>(entity).unwrap().x, 16.0);
    }
}
