//! Game-time scheduler.
//!
//! Holds named tasks that fire when game time passes their target, with
//! optional repetition. Tasks carry declarative actions rather than
//! closures, so a replayed run fires exactly the same work in the same
//! order.

use bevy_ecs::prelude::Resource;
use log::debug;

use crate::events::GameEvent;

/// What a task does when it fires.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledAction {
    /// Begin the next wave (ends the preparation pause).
    StartNextWave,
    /// Pay interest on banked money.
    GrantInterest,
    /// Publish an event on the bus.
    Emit(GameEvent),
}

/// One scheduled task.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: String,
    pub action: ScheduledAction,
    pub target_time: f64,
    /// Re-fire period; None for one-shots.
    pub repeat_interval: Option<f64>,
    /// Remaining repeats; -1 repeats forever.
    pub repeat_count: i32,
    active: bool,
}

/// Scheduler resource. Fired actions are returned from [`Scheduler::update`]
/// for the simulation loop to apply in order.
#[derive(Resource, Debug, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    /// Schedule a one-shot task `delay` seconds of game time from `now`.
    pub fn schedule(&mut self, name: &str, now: f64, delay: f64, action: ScheduledAction) {
        self.schedule_repeating(name, now, delay, action, None, 1);
    }

    /// Schedule a task with repetition. `repeat_count` of -1 repeats until
    /// cancelled.
    pub fn schedule_repeating(
        &mut self,
        name: &str,
        now: f64,
        delay: f64,
        action: ScheduledAction,
        repeat_interval: Option<f64>,
        repeat_count: i32,
    ) {
        debug!("scheduled '{name}' in {delay:.2}s");
        self.tasks.push(ScheduledTask {
            name: name.to_string(),
            action,
            target_time: now + delay,
            repeat_interval,
            repeat_count,
            active: true,
        });
    }

    /// Cancel every task with the given name. Returns how many were removed.
    pub fn cancel(&mut self, name: &str) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.name != name);
        before - self.tasks.len()
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.tasks.iter().any(|t| t.active && t.name == name)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Fire every task due at `now`, in schedule order. Repeating tasks are
    /// re-armed; exhausted tasks are dropped.
    pub fn update(&mut self, now: f64) -> Vec<ScheduledAction> {
        let mut fired = Vec::new();

        for task in self.tasks.iter_mut() {
            if !task.active || now < task.target_time {
                continue;
            }
            fired.push(task.action.clone());

            match task.repeat_interval {
                Some(interval) if task.repeat_count != 0 => {
                    task.target_time = now + interval;
                    if task.repeat_count > 0 {
                        task.repeat_count -= 1;
                        if task.repeat_count == 0 {
                            task.active = false;
                        }
                    }
                }
                _ => task.active = false,
            }
        }

        self.tasks.retain(|t| t.active);
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_fires_once() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule("wave", 0.0, 5.0, ScheduledAction::StartNextWave);

        assert!(scheduler.update(4.9).is_empty());
        assert_eq!(scheduler.update(5.0).len(), 1);
        assert!(scheduler.update(100.0).is_empty());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_repeating_task_rearms() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(
            "interest",
            0.0,
            1.0,
            ScheduledAction::GrantInterest,
            Some(1.0),
            -1,
        );

        assert_eq!(scheduler.update(1.0).len(), 1);
        assert_eq!(scheduler.update(2.0).len(), 1);
        assert_eq!(scheduler.update(2.5).len(), 0);
        assert!(scheduler.is_scheduled("interest"));
    }

    #[test]
    fn test_finite_repeats_exhaust() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule_repeating(
            "triple",
            0.0,
            1.0,
            ScheduledAction::StartNextWave,
            Some(1.0),
            3,
        );

        let mut fired = 0;
        for t in 1..10 {
            fired += scheduler.update(t as f64).len();
        }
        assert_eq!(fired, 3);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule("a", 0.0, 1.0, ScheduledAction::StartNextWave);
        scheduler.schedule("a", 0.0, 2.0, ScheduledAction::StartNextWave);
        scheduler.schedule("b", 0.0, 3.0, ScheduledAction::GrantInterest);

        assert_eq!(scheduler.cancel("a"), 2);
        assert!(!scheduler.is_scheduled("a"));
        assert!(scheduler.is_scheduled("b"));
    }
}
