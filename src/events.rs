//! Event bus for cross-subsystem communication.
//!
//! Publish/subscribe with priority-ordered dispatch, optional one-shot
//! handlers and filters, a deferred queue drained once per tick, and a
//! recursion bound for events emitted from inside handlers. Handler panics
//! are contained: they are logged, counted, and the remaining handlers for
//! the event still run.

use bevy_ecs::prelude::*;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::components::{DamageKind, EnemyKind, ProjectileKind, TowerKind};

/// Dispatch priority. Higher priorities run first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventPriority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Default for EventPriority {
    fn default() -> Self {
        Self::Normal
    }
}

/// Every event the simulation produces, with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    WaveStart { wave_index: usize },
    WaveComplete { wave_index: usize, bonus: i64 },
    EnemySpawned { enemy: u64, kind: EnemyKind },
    EnemyDeath { enemy: u64, reward: i64, position: (f32, f32) },
    EnemyReachBase { enemy: u64, damage: i32 },
    EnemyExplosion { position: (f32, f32), damage: f32, radius: f32 },
    TowerBuilt { tower: u64, kind: TowerKind, cost: i64 },
    TowerUpgraded { tower: u64, level: u8, cost: i64 },
    TowerSold { tower: u64, refund: i64 },
    ProjectileFired { projectile: u64, kind: ProjectileKind },
    ProjectileImpact {
        position: (f32, f32),
        kind: ProjectileKind,
        damage: f32,
        damage_kind: DamageKind,
        area_radius: f32,
    },
    LightningEffect { positions: Vec<(f32, f32)> },
    FlameEffect { position: (f32, f32), target: (f32, f32), radius: f32 },
    FrostEffect { position: (f32, f32), radius: f32 },
    MineExplosion { position: (f32, f32), radius: f32 },
    MoneyGained { amount: i64 },
    MoneySpent { amount: i64 },
    LifeLost { remaining: i32 },
    GameOver { score: i64 },
    Victory { score: i64 },
}

/// Fieldless discriminant of [`GameEvent`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    WaveStart,
    WaveComplete,
    EnemySpawned,
    EnemyDeath,
    EnemyReachBase,
    EnemyExplosion,
    TowerBuilt,
    TowerUpgraded,
    TowerSold,
    ProjectileFired,
    ProjectileImpact,
    LightningEffect,
    FlameEffect,
    FrostEffect,
    MineExplosion,
    MoneyGained,
    MoneySpent,
    LifeLost,
    GameOver,
    Victory,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::WaveStart { .. } => EventKind::WaveStart,
            GameEvent::WaveComplete { .. } => EventKind::WaveComplete,
            GameEvent::EnemySpawned { .. } => EventKind::EnemySpawned,
            GameEvent::EnemyDeath { .. } => EventKind::EnemyDeath,
            GameEvent::EnemyReachBase { .. } => EventKind::EnemyReachBase,
            GameEvent::EnemyExplosion { .. } => EventKind::EnemyExplosion,
            GameEvent::TowerBuilt { .. } => EventKind::TowerBuilt,
            GameEvent::TowerUpgraded { .. } => EventKind::TowerUpgraded,
            GameEvent::TowerSold { .. } => EventKind::TowerSold,
            GameEvent::ProjectileFired { .. } => EventKind::ProjectileFired,
            GameEvent::ProjectileImpact { .. } => EventKind::ProjectileImpact,
            GameEvent::LightningEffect { .. } => EventKind::LightningEffect,
            GameEvent::FlameEffect { .. } => EventKind::FlameEffect,
            GameEvent::FrostEffect { .. } => EventKind::FrostEffect,
            GameEvent::MineExplosion { .. } => EventKind::MineExplosion,
            GameEvent::MoneyGained { .. } => EventKind::MoneyGained,
            GameEvent::MoneySpent { .. } => EventKind::MoneySpent,
            GameEvent::LifeLost { .. } => EventKind::LifeLost,
            GameEvent::GameOver { .. } => EventKind::GameOver,
            GameEvent::Victory { .. } => EventKind::Victory,
        }
    }
}

/// An event as delivered to handlers.
#[derive(Debug, Clone)]
pub struct Event {
    pub payload: GameEvent,
    /// Game time at emission.
    pub timestamp: f64,
    pub priority: EventPriority,
    pub source: Option<u64>,
    pub target: Option<u64>,
}

/// Options for [`EventBus::emit_with`].
#[derive(Default, Clone, Copy)]
pub struct EmitOptions {
    pub priority: EventPriority,
    /// Dispatch inline instead of queueing for the end-of-tick drain.
    pub immediate: bool,
    pub source: Option<u64>,
    pub target: Option<u64>,
}

/// Options for [`EventBus::subscribe_with`].
#[derive(Default)]
pub struct SubscribeOptions {
    pub priority: EventPriority,
    /// Remove the handler after its first successful call.
    pub once: bool,
    /// Only deliver events passing this predicate.
    pub filter: Option<Box<dyn Fn(&Event) -> bool + Send + Sync>>,
}

/// Handle returned by subscribe; pass back to [`EventBus::unsubscribe`].
/// Long-lived owners keep the bare id; transient owners should hold a
/// [`ScopedSubscription`] instead so teardown is automatic.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ids whose guards have been dropped, waiting for a lazy sweep.
type RetiredIds = Arc<Mutex<Vec<SubscriptionId>>>;

/// RAII guard for a subscription owned by a transient object: dropping the
/// guard retires the subscription, and the bus sweeps retired ids before
/// its next dispatch. Replaces the weak-callback sweeping of handlers whose
/// owner has gone away.
#[must_use]
#[derive(Debug)]
pub struct ScopedSubscription {
    id: SubscriptionId,
    retired: Option<RetiredIds>,
}

impl ScopedSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Detach the guard, leaving the subscription alive; the caller takes
    /// over the id and unsubscribes manually.
    pub fn forget(mut self) -> SubscriptionId {
        self.retired = None;
        self.id
    }
}

impl Drop for ScopedSubscription {
    fn drop(&mut self) {
        if let Some(retired) = self.retired.take() {
            if let Ok(mut ids) = retired.lock() {
                ids.push(self.id);
            }
        }
    }
}

/// Collects emissions made from inside a handler, so recursive dispatch can
/// be depth-bounded by the bus rather than by the call stack alone.
pub struct Emitter {
    pending: Vec<(Event, bool)>,
}

impl Emitter {
    pub fn emit(&mut self, payload: GameEvent) {
        self.emit_with(payload, EmitOptions::default());
    }

    pub fn emit_with(&mut self, payload: GameEvent, opts: EmitOptions) {
        self.pending.push((
            Event {
                payload,
                timestamp: 0.0, // stamped by the bus on intake
                priority: opts.priority,
                source: opts.source,
                target: opts.target,
            },
            opts.immediate,
        ));
    }
}

type Handler = dyn FnMut(&Event, &mut Emitter) + Send + Sync;

struct Subscription {
    id: SubscriptionId,
    priority: EventPriority,
    once: bool,
    filter: Option<Box<dyn Fn(&Event) -> bool + Send + Sync>>,
    /// Taken out during its own call so a handler is never re-entered.
    handler: Option<Box<Handler>>,
    insertion: u64,
}

/// Dispatch statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventStats {
    pub events_sent: u64,
    pub events_processed: u64,
    pub listeners_called: u64,
    pub failed_calls: u64,
    pub dropped_events: u64,
}

/// The bus itself. Lives as an ECS resource on the simulation world.
#[derive(Resource)]
pub struct EventBus {
    subs: HashMap<SubscriptionId, Subscription>,
    by_kind: HashMap<EventKind, Vec<SubscriptionId>>,
    /// Resolved dispatch order per kind (priority desc, insertion asc).
    order_cache: HashMap<EventKind, Vec<SubscriptionId>>,
    /// Ids retired by dropped [`ScopedSubscription`] guards.
    retired: RetiredIds,
    queue: VecDeque<Event>,
    next_id: u64,
    next_insertion: u64,
    now: f64,
    recursion_depth: u32,
    pub max_recursion_depth: u32,
    pub max_queue_size: usize,
    pub stats: EventStats,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subs: HashMap::new(),
            by_kind: HashMap::new(),
            order_cache: HashMap::new(),
            retired: Arc::new(Mutex::new(Vec::new())),
            queue: VecDeque::new(),
            next_id: 1,
            next_insertion: 0,
            now: 0.0,
            recursion_depth: 0,
            max_recursion_depth: 10,
            max_queue_size: 1000,
            stats: EventStats::default(),
        }
    }

    /// Update the bus clock; emitted events are stamped with this time.
    pub fn set_time(&mut self, game_time: f64) {
        self.now = game_time;
    }

    // ========================================================================
    // SUBSCRIPTION
    // ========================================================================

    pub fn subscribe<F>(&mut self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&Event, &mut Emitter) + Send + Sync + 'static,
    {
        self.subscribe_with(kind, handler, SubscribeOptions::default())
    }

    pub fn subscribe_with<F>(
        &mut self,
        kind: EventKind,
        handler: F,
        opts: SubscribeOptions,
    ) -> SubscriptionId
    where
        F: FnMut(&Event, &mut Emitter) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let sub = Subscription {
            id,
            priority: opts.priority,
            once: opts.once,
            filter: opts.filter,
            handler: Some(Box::new(handler)),
            insertion: self.next_insertion,
        };
        self.next_insertion += 1;
        self.subs.insert(id, sub);
        self.by_kind.entry(kind).or_default().push(id);
        self.order_cache.remove(&kind);
        id
    }

    /// Subscribe with a Drop guard: the subscription lives as long as the
    /// returned [`ScopedSubscription`] does.
    pub fn subscribe_scoped<F>(&mut self, kind: EventKind, handler: F) -> ScopedSubscription
    where
        F: FnMut(&Event, &mut Emitter) + Send + Sync + 'static,
    {
        self.subscribe_scoped_with(kind, handler, SubscribeOptions::default())
    }

    pub fn subscribe_scoped_with<F>(
        &mut self,
        kind: EventKind,
        handler: F,
        opts: SubscribeOptions,
    ) -> ScopedSubscription
    where
        F: FnMut(&Event, &mut Emitter) + Send + Sync + 'static,
    {
        let id = self.subscribe_with(kind, handler, opts);
        ScopedSubscription {
            id,
            retired: Some(self.retired.clone()),
        }
    }

    /// Sweep subscriptions whose guards were dropped since the last call.
    fn sweep_retired(&mut self) {
        let retired: Vec<SubscriptionId> = match self.retired.lock() {
            Ok(mut ids) => std::mem::take(&mut *ids),
            Err(_) => return,
        };
        for id in retired {
            if self.unsubscribe(id) {
                debug!("swept retired subscription {id:?}");
            }
        }
    }

    /// Remove a subscription. Removing an id that is mid-dispatch takes
    /// effect once its current call returns.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        if self.subs.remove(&id).is_none() {
            return false;
        }
        for (kind, ids) in self.by_kind.iter_mut() {
            let before = ids.len();
            ids.retain(|&i| i != id);
            if ids.len() != before {
                self.order_cache.remove(kind);
            }
        }
        true
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.by_kind.get(&kind).map(Vec::len).unwrap_or(0)
    }

    // ========================================================================
    // EMISSION
    // ========================================================================

    pub fn emit(&mut self, payload: GameEvent) {
        self.emit_with(payload, EmitOptions::default());
    }

    pub fn emit_with(&mut self, payload: GameEvent, opts: EmitOptions) {
        self.sweep_retired();
        let event = Event {
            payload,
            timestamp: self.now,
            priority: opts.priority,
            source: opts.source,
            target: opts.target,
        };
        self.stats.events_sent += 1;

        if opts.immediate && self.recursion_depth < self.max_recursion_depth {
            self.dispatch(event);
        } else {
            self.enqueue(event);
        }
    }

    fn enqueue(&mut self, event: Event) {
        if self.queue.len() >= self.max_queue_size {
            self.queue.pop_front();
            self.stats.dropped_events += 1;
            warn!("event queue full, dropping oldest event");
        }
        self.queue.push_back(event);
    }

    /// Drain the deferred queue, including events enqueued while draining.
    pub fn process_events(&mut self) {
        self.sweep_retired();
        while let Some(event) = self.queue.pop_front() {
            self.dispatch(event);
        }
    }

    /// Number of deferred events waiting.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    fn dispatch_order(&mut self, kind: EventKind) -> Vec<SubscriptionId> {
        if let Some(order) = self.order_cache.get(&kind) {
            return order.clone();
        }
        let mut ids: Vec<SubscriptionId> =
            self.by_kind.get(&kind).cloned().unwrap_or_default();
        ids.sort_by(|a, b| {
            let sa = &self.subs[a];
            let sb = &self.subs[b];
            sb.priority
                .cmp(&sa.priority)
                .then(sa.insertion.cmp(&sb.insertion))
        });
        self.order_cache.insert(kind, ids.clone());
        ids
    }

    fn dispatch(&mut self, event: Event) {
        let kind = event.payload.kind();
        self.recursion_depth += 1;

        let order = self.dispatch_order(kind);
        let mut spent_once: Vec<SubscriptionId> = Vec::new();

        for id in order {
            // Filter check (the subscription may have been removed meanwhile).
            let passes = match self.subs.get(&id) {
                Some(sub) => sub
                    .filter
                    .as_ref()
                    .map(|f| f(&event))
                    .unwrap_or(true),
                None => continue,
            };
            if !passes {
                continue;
            }

            // Take the handler out so recursive dispatch cannot re-enter it.
            let mut handler = match self.subs.get_mut(&id).and_then(|s| s.handler.take()) {
                Some(h) => h,
                None => continue,
            };

            let mut emitter = Emitter { pending: Vec::new() };
            let outcome = catch_unwind(AssertUnwindSafe(|| handler(&event, &mut emitter)));

            let succeeded = outcome.is_ok();
            if succeeded {
                self.stats.listeners_called += 1;
            } else {
                self.stats.failed_calls += 1;
                warn!("event handler panicked while handling {kind:?}");
            }

            // Put the handler back (unless the subscription vanished).
            let once = if let Some(sub) = self.subs.get_mut(&id) {
                sub.handler = Some(handler);
                sub.once
            } else {
                false
            };
            if once && succeeded {
                spent_once.push(id);
            }

            // Handle emissions from inside the handler.
            for (mut nested, immediate) in emitter.pending {
                nested.timestamp = self.now;
                self.stats.events_sent += 1;
                if immediate && self.recursion_depth < self.max_recursion_depth {
                    self.dispatch(nested);
                } else {
                    self.enqueue(nested);
                }
            }
        }

        for id in spent_once {
            self.unsubscribe(id);
            debug!("one-shot subscription {id:?} removed");
        }

        self.stats.events_processed += 1;
        self.recursion_depth -= 1;
    }
}
