//! Economy and progression: money, lives, score, wave completion and the
//! win/lose transitions.
//!
//! Money only moves through explicit operations: kill rewards, wave bonuses,
//! interest and the build/upgrade/sell commands applied by the simulation
//! API. Systems queue operations; this module applies them in order.

use bevy_ecs::prelude::*;
use log::info;

use crate::components::{Enemy, GameState, PlayState};
use crate::config::GameConfig;
use crate::events::{EventBus, GameEvent};
use crate::input::StateMachine;
use crate::scheduler::{ScheduledAction, Scheduler};
use crate::systems::enemy::{WavePhase, WaveState};

/// One queued change to the player's resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EconomyOp {
    /// An enemy died; pays its reward and scores it.
    Kill { reward: i64 },
    /// An enemy reached the base.
    LifeLoss { amount: i32 },
    /// Wave bonus, interest or other plain income.
    Income { amount: i64 },
}

#[derive(Resource, Debug, Default)]
pub struct EconomyQueue(pub Vec<EconomyOp>);

/// Flat part of the end-of-wave payout; scales with the wave number.
pub fn wave_bonus(wave_index: usize) -> i64 {
    50 + 25 * wave_index as i64
}

/// Detects the end of the active wave, pays the bonus and interest, and
/// either schedules the next wave or declares victory.
pub fn wave_progress_system(
    mut wave_state: ResMut<WaveState>,
    mut game_state: ResMut<GameState>,
    mut machine: ResMut<StateMachine>,
    mut scheduler: ResMut<Scheduler>,
    mut economy: ResMut<EconomyQueue>,
    mut bus: ResMut<EventBus>,
    config: Res<GameConfig>,
    enemies: Query<(), With<Enemy>>,
) {
    if game_state.play_state != PlayState::Gameplay {
        return;
    }
    if wave_state.phase != WavePhase::Active
        || !wave_state.pending.is_empty()
        || !enemies.is_empty()
    {
        return;
    }

    let index = game_state.wave_index;
    let bonus = wave_bonus(index);
    let interest =
        (game_state.money as f64 * config.balance.economy.interest_rate as f64) as i64;

    economy.0.push(EconomyOp::Income { amount: bonus });
    if interest > 0 {
        economy.0.push(EconomyOp::Income { amount: interest });
    }
    game_state.score += bonus * 10;
    bus.emit(GameEvent::WaveComplete {
        wave_index: index,
        bonus,
    });
    info!("wave {index} complete (bonus {bonus}, interest {interest})");

    game_state.wave_index += 1;
    if game_state.wave_index >= config.waves.len() {
        wave_state.phase = WavePhase::Finished;
        if machine.transition(PlayState::Victory).is_ok() {
            game_state.play_state = PlayState::Victory;
            bus.emit(GameEvent::Victory {
                score: game_state.score,
            });
        }
    } else {
        wave_state.phase = WavePhase::Idle;
        scheduler.schedule(
            "next_wave",
            game_state.game_time,
            config.balance.wave.preparation_time as f64,
            ScheduledAction::StartNextWave,
        );
    }
}

/// Applies queued economy operations and watches for defeat.
pub fn economy_system(
    mut economy: ResMut<EconomyQueue>,
    mut game_state: ResMut<GameState>,
    mut machine: ResMut<StateMachine>,
    mut bus: ResMut<EventBus>,
    config: Res<GameConfig>,
) {
    for op in std::mem::take(&mut economy.0) {
        match op {
            EconomyOp::Kill { reward } => {
                let paid =
                    (reward as f32 * config.balance.economy.kill_bonus_multiplier) as i64;
                game_state.money += paid;
                game_state.score += reward;
                bus.emit(GameEvent::MoneyGained { amount: paid });
            }
            EconomyOp::Income { amount } => {
                game_state.money += amount;
                bus.emit(GameEvent::MoneyGained { amount });
            }
            EconomyOp::LifeLoss { amount } => {
                game_state.lives -= amount;
                bus.emit(GameEvent::LifeLost {
                    remaining: game_state.lives,
                });
            }
        }
    }
    // Money never goes below zero through queued operations.
    game_state.money = game_state.money.max(0);

    if game_state.lives <= 0
        && game_state.play_state == PlayState::Gameplay
        && machine.transition(PlayState::GameOver).is_ok()
    {
        game_state.play_state = PlayState::GameOver;
        bus.emit(GameEvent::GameOver {
            score: game_state.score,
        });
        info!("game over with score {}", game_state.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{EnemyBundle, EnemyKind, EnemyState};

    fn test_world() -> World {
        let mut world = World::new();
        let config = GameConfig::default();
        let mut machine = StateMachine::default();
        machine.transition(PlayState::Gameplay).unwrap();
        let mut game_state = GameState::new(config.balance.starting_money, config.balance.starting_lives);
        game_state.play_state = PlayState::Gameplay;

        world.insert_resource(game_state);
        world.insert_resource(machine);
        world.insert_resource(config);
        world.insert_resource(EconomyQueue::default());
        world.insert_resource(EventBus::new());
        world.insert_resource(Scheduler::default());
        world.insert_resource(WaveState::default());
        world
    }

    fn run_economy(world: &mut World) {
        let mut schedule = Schedule::default();
        schedule.add_systems(economy_system);
        schedule.run(world);
    }

    #[test]
    fn test_kill_pays_reward_and_score() {
        let mut world = test_world();
        world
            .resource_mut::<EconomyQueue>()
            .0
            .push(EconomyOp::Kill { reward: 10 });
        run_economy(&mut world);

        let state = world.resource::<GameState>();
        assert_eq!(state.money, 160);
        assert_eq!(state.score, 10);
    }

    #[test]
    fn test_life_loss_and_game_over() {
        let mut world = test_world();
        world
            .resource_mut::<EconomyQueue>()
            .0
            .push(EconomyOp::LifeLoss { amount: 19 });
        run_economy(&mut world);
        assert_eq!(world.resource::<GameState>().lives, 1);
        assert_eq!(world.resource::<GameState>().play_state, PlayState::Gameplay);

        world
            .resource_mut::<EconomyQueue>()
            .0
            .push(EconomyOp::LifeLoss { amount: 1 });
        run_economy(&mut world);
        let state = world.resource::<GameState>();
        assert_eq!(state.lives, 0);
        assert_eq!(state.play_state, PlayState::GameOver);
    }

    #[test]
    fn test_money_floor_at_zero() {
        let mut world = test_world();
        world.resource_mut::<GameState>().money = 0;
        world
            .resource_mut::<EconomyQueue>()
            .0
            .push(EconomyOp::Income { amount: -50 });
        run_economy(&mut world);
        assert_eq!(world.resource::<GameState>().money, 0);
    }

    #[test]
    fn test_wave_completion_pays_and_schedules_next() {
        let mut world = test_world();
        world.resource_mut::<WaveState>().phase = WavePhase::Active;

        let mut schedule = Schedule::default();
        schedule.add_systems((wave_progress_system, economy_system).chain());
        schedule.run(&mut world);

        let state = world.resource::<GameState>();
        // Bonus 50 + interest 2% of 150 = 3.
        assert_eq!(state.money, 150 + 50 + 3);
        assert_eq!(state.wave_index, 1);
        assert_eq!(state.score, 500);
        assert!(world.resource::<Scheduler>().is_scheduled("next_wave"));
    }

    #[test]
    fn test_wave_not_complete_while_enemies_alive() {
        let mut world = test_world();
        world.resource_mut::<WaveState>().phase = WavePhase::Active;
        let mut bundle =
            EnemyBundle::new(1, EnemyKind::SteamSoldier, 1.0, vec![(0.0, 0.0), (100.0, 0.0)]);
        bundle.state = EnemyState::Moving;
        world.spawn(bundle);

        let mut schedule = Schedule::default();
        schedule.add_systems(wave_progress_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<GameState>().wave_index, 0);
        assert_eq!(world.resource::<WaveState>().phase, WavePhase::Active);
    }

    #[test]
    fn test_clearing_last_wave_is_victory() {
        let mut world = test_world();
        world.resource_mut::<WaveState>().phase = WavePhase::Active;
        let last = world.resource::<GameConfig>().waves.len() - 1;
        world.resource_mut::<GameState>().wave_index = last;

        let mut schedule = Schedule::default();
        schedule.add_systems(wave_progress_system);
        schedule.run(&mut world);

        assert_eq!(world.resource::<GameState>().play_state, PlayState::Victory);
        assert_eq!(world.resource::<WaveState>().phase, WavePhase::Finished);
    }
}
