//! Components and shared resources for the Steam Defense simulation.
//!
//! Components are pure data attached to entities. Each archetype (enemy,
//! tower, projectile) spawns from a fixed bundle, so its component layout is
//! known at compile time. All game logic lives in systems.

use bevy_ecs::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

// ============================================================================
// CORE RESOURCES
// ============================================================================

/// Delta time for the current fixed tick.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Monotonic tick counter.
#[derive(Resource, Default)]
pub struct SimTick(pub u64);

/// The run's seeded random stream. Every in-simulation draw (CyberSurvivor
/// rerolls) comes from here so replays with equal seeds are bit-equal.
#[derive(Resource)]
pub struct SimRng(pub ChaCha8Rng);

/// Allocates stable opaque entity ids; values are never reused within a run.
#[derive(Resource, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn alloc(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}

/// High-level play state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayState {
    MainMenu,
    Gameplay,
    Pause,
    GameOver,
    Victory,
}

impl PlayState {
    pub fn name(&self) -> &'static str {
        match self {
            PlayState::MainMenu => "main_menu",
            PlayState::Gameplay => "gameplay",
            PlayState::Pause => "pause",
            PlayState::GameOver => "game_over",
            PlayState::Victory => "victory",
        }
    }
}

/// Top-level mutable game state: economy, lives, progression, selection.
#[derive(Resource, Debug, Clone)]
pub struct GameState {
    pub money: i64,
    pub lives: i32,
    pub score: i64,
    pub wave_index: usize,
    pub game_time: f64,
    pub speed_multiplier: f32,
    pub paused: bool,
    pub selected_tower: Option<u64>,
    pub placing_tower: Option<TowerKind>,
    pub play_state: PlayState,
    pub debug_overlay: bool,
}

impl GameState {
    pub fn new(money: i64, lives: i32) -> Self {
        Self {
            money,
            lives,
            score: 0,
            wave_index: 0,
            game_time: 0.0,
            speed_multiplier: 1.0,
            paused: false,
            selected_tower: None,
            placing_tower: None,
            play_state: PlayState::MainMenu,
            debug_overlay: false,
        }
    }

    /// Clamp-and-set game speed, 0x..5x.
    pub fn set_speed(&mut self, multiplier: f32) {
        self.speed_multiplier = multiplier.clamp(0.0, 5.0);
    }
}

// ============================================================================
// SPATIAL COMPONENTS
// ============================================================================

/// World position.
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Grid cell a tower occupies.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

// ============================================================================
// IDENTITY COMPONENTS
// ============================================================================

/// Stable opaque id of an enemy.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EnemyId(pub u64);

/// Stable opaque id of a tower.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TowerId(pub u64);

/// Stable opaque id of a projectile.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectileId(pub u64);

/// Free-form tags for grouped lookups ("flying", "enemy", ...).
#[derive(Component, Debug, Clone, Default)]
pub struct Tags(pub Vec<&'static str>);

impl Tags {
    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|t| *t == tag)
    }
}

// ============================================================================
// DAMAGE MODEL
// ============================================================================

/// Damage type; indexes into the enemy resistance array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    Physical,
    Fire,
    Electric,
    Ice,
}

impl DamageKind {
    pub const ALL: [DamageKind; 4] = [
        DamageKind::Physical,
        DamageKind::Fire,
        DamageKind::Electric,
        DamageKind::Ice,
    ];

    #[inline]
    pub fn index(&self) -> usize {
        match self {
            DamageKind::Physical => 0,
            DamageKind::Fire => 1,
            DamageKind::Electric => 2,
            DamageKind::Ice => 3,
        }
    }
}

// ============================================================================
// ENEMY COMPONENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnemyKind {
    SteamSoldier,
    SkyZeppelin,
    SteamTank,
    LightningDrone,
    SteelSpider,
    IronGolem,
    CyberSurvivor,
}

/// Marker + kind for enemy entities.
#[derive(Component, Debug, Clone, Copy)]
pub struct Enemy {
    pub kind: EnemyKind,
}

/// Enemy stat block. Lives on the entity because some enemies mutate their
/// stats at runtime (CyberSurvivor resistances, level scaling).
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyStats {
    pub max_hp: f32,
    pub base_speed: f32,
    pub armor: f32,
    pub reward: i64,
    /// Indexed by [`DamageKind::index`]: physical, fire, electric, ice.
    pub resistances: [f32; 4],
    pub is_flying: bool,
    pub can_regenerate: bool,
    pub explosion_damage: f32,
    pub explosion_radius: f32,
}

impl EnemyStats {
    /// Base stats table, keyed by kind.
    pub fn base(kind: EnemyKind) -> Self {
        match kind {
            EnemyKind::SteamSoldier => Self {
                max_hp: 100.0,
                base_speed: 60.0,
                armor: 5.0,
                reward: 10,
                resistances: [0.0, 0.2, 0.0, 0.0],
                is_flying: false,
                can_regenerate: false,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
            EnemyKind::SkyZeppelin => Self {
                max_hp: 150.0,
                base_speed: 40.0,
                armor: 10.0,
                reward: 25,
                resistances: [0.3, 0.0, 0.1, 0.0],
                is_flying: true,
                can_regenerate: false,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
            EnemyKind::SteamTank => Self {
                max_hp: 400.0,
                base_speed: 25.0,
                armor: 20.0,
                reward: 40,
                resistances: [0.4, 0.1, 0.8, 0.2],
                is_flying: false,
                can_regenerate: false,
                explosion_damage: 80.0,
                explosion_radius: 64.0,
            },
            EnemyKind::LightningDrone => Self {
                max_hp: 75.0,
                base_speed: 80.0,
                armor: 0.0,
                reward: 15,
                resistances: [0.0, 0.0, 0.9, 0.0],
                is_flying: true,
                can_regenerate: false,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
            EnemyKind::SteelSpider => Self {
                max_hp: 120.0,
                base_speed: 90.0,
                armor: 8.0,
                reward: 12,
                resistances: [0.2, 0.8, 0.0, 0.4],
                is_flying: false,
                can_regenerate: false,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
            EnemyKind::IronGolem => Self {
                max_hp: 800.0,
                base_speed: 30.0,
                armor: 25.0,
                reward: 80,
                resistances: [0.5, 0.3, 0.2, 0.0],
                is_flying: false,
                can_regenerate: true,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
            EnemyKind::CyberSurvivor => Self {
                max_hp: 200.0,
                base_speed: 55.0,
                armor: 12.0,
                reward: 30,
                resistances: [0.2, 0.2, 0.2, 0.2],
                is_flying: false,
                can_regenerate: false,
                explosion_damage: 0.0,
                explosion_radius: 0.0,
            },
        }
    }

    /// Stats scaled for a wave's level multiplier: hp and reward linearly,
    /// speed capped at +50%.
    pub fn scaled(kind: EnemyKind, level_multiplier: f32) -> Self {
        let mut stats = Self::base(kind);
        if (level_multiplier - 1.0).abs() > f32::EPSILON {
            stats.max_hp = (stats.max_hp * level_multiplier).floor();
            stats.reward = (stats.reward as f32 * level_multiplier) as i64;
            stats.base_speed *= (1.0 + (level_multiplier - 1.0) * 0.3).min(1.5);
        }
        stats
    }

    pub fn resistance(&self, kind: DamageKind) -> f32 {
        self.resistances[kind.index()]
    }

    /// CyberSurvivor reroll: everything to 0.1, one random resistance to 0.8.
    pub fn reroll_resistances(&mut self, rng: &mut ChaCha8Rng) {
        self.resistances = [0.1; 4];
        let chosen = rng.gen_range(0..4);
        self.resistances[chosen] = 0.8;
    }
}

/// Hit points.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).max(0.0);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).min(self.max);
    }
}

/// Resistance- and armor-adjusted damage. Resistance applies first and the
/// result floors at 1 before armor; armor applies once per hit, flooring the
/// final amount at 1.
pub fn effective_damage(raw: f32, kind: DamageKind, stats: &EnemyStats) -> f32 {
    if raw <= 0.0 {
        return 0.0;
    }
    let resisted = (raw * (1.0 - stats.resistance(kind))).max(1.0);
    (resisted - stats.armor).max(1.0)
}

/// Enemy lifecycle state.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyState {
    Spawning,
    Moving,
    Attacking,
    Dying,
    Dead,
}

/// Waypoint-following movement state. Waypoints are tile centres in world
/// coordinates; `index` points at the waypoint the enemy is standing on or
/// has last passed.
#[derive(Component, Debug, Clone, Default)]
pub struct PathFollower {
    pub waypoints: Vec<(f32, f32)>,
    pub index: usize,
    pub reached_end: bool,
}

impl PathFollower {
    pub fn new(waypoints: Vec<(f32, f32)>) -> Self {
        Self {
            waypoints,
            index: 0,
            reached_end: false,
        }
    }

    /// Next waypoint to move toward, if any.
    pub fn next_waypoint(&self) -> Option<(f32, f32)> {
        self.waypoints.get(self.index + 1).copied()
    }

    /// Distance covered along the path, including partial progress toward
    /// the next waypoint. Used by First/Last targeting.
    pub fn distance_traveled(&self, position: Position) -> f32 {
        if self.waypoints.is_empty() {
            return 0.0;
        }
        let mut total = 0.0;
        for i in 0..self.index.min(self.waypoints.len() - 1) {
            let (x1, y1) = self.waypoints[i];
            let (x2, y2) = self.waypoints[i + 1];
            total += ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        }
        if let Some(&(sx, sy)) = self.waypoints.get(self.index) {
            total += ((position.x - sx).powi(2) + (position.y - sy).powi(2)).sqrt();
        }
        total
    }
}

/// One temporary speed multiplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedModifier {
    pub multiplier: f32,
    pub remaining: f32,
    pub source: &'static str,
}

/// One damage-over-time effect; ticks once per second of enemy time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageOverTime {
    pub dps: f32,
    pub remaining: f32,
    pub tick_phase: f32,
    pub kind: DamageKind,
}

/// Timed status state of an enemy.
#[derive(Component, Debug, Clone, Default)]
pub struct StatusEffects {
    pub speed_modifiers: Vec<SpeedModifier>,
    pub stun_remaining: f32,
    pub dots: Vec<DamageOverTime>,
}

impl StatusEffects {
    /// Slows stack multiplicatively, floored at x0.1 overall.
    pub fn speed_factor(&self) -> f32 {
        let product: f32 = self.speed_modifiers.iter().map(|m| m.multiplier).product();
        product.max(0.1)
    }

    pub fn add_slow(&mut self, multiplier: f32, duration: f32, source: &'static str) {
        self.speed_modifiers.push(SpeedModifier {
            multiplier,
            remaining: duration,
            source,
        });
    }

    /// Stun durations do not stack; the longer one wins.
    pub fn stun(&mut self, duration: f32) {
        self.stun_remaining = self.stun_remaining.max(duration);
    }

    pub fn add_burn(&mut self, dps: f32, duration: f32) {
        self.dots.push(DamageOverTime {
            dps,
            remaining: duration,
            tick_phase: 1.0,
            kind: DamageKind::Fire,
        });
    }

    /// Freeze is a specialised slow.
    pub fn freeze(&mut self, duration: f32) {
        self.add_slow(0.1, duration, "freeze");
    }

    pub fn is_stunned(&self) -> bool {
        self.stun_remaining > 0.0
    }

    pub fn is_slowed(&self) -> bool {
        !self.speed_modifiers.is_empty()
    }

    pub fn is_burning(&self) -> bool {
        !self.dots.is_empty()
    }
}

/// Presentation-facing timers; surfaced as snapshot flags, never rendered
/// here.
#[derive(Component, Debug, Clone, Default)]
pub struct EnemyTimers {
    /// Drives special behaviors (golem regen, survivor reroll).
    pub behavior: f32,
    pub damage_flash: f32,
    pub spawn_anim: f32,
}

/// Bundle for spawning a complete enemy entity.
#[derive(Bundle)]
pub struct EnemyBundle {
    pub id: EnemyId,
    pub enemy: Enemy,
    pub stats: EnemyStats,
    pub health: Health,
    pub position: Position,
    pub follower: PathFollower,
    pub status: StatusEffects,
    pub state: EnemyState,
    pub timers: EnemyTimers,
    pub tags: Tags,
}

impl EnemyBundle {
    pub fn new(
        id: u64,
        kind: EnemyKind,
        level_multiplier: f32,
        waypoints: Vec<(f32, f32)>,
    ) -> Self {
        let stats = EnemyStats::scaled(kind, level_multiplier);
        let position = waypoints
            .first()
            .map(|&(x, y)| Position::new(x, y))
            .unwrap_or_default();
        let mut tags = Tags(vec!["enemy"]);
        if stats.is_flying {
            tags.0.push("flying");
        }
        Self {
            id: EnemyId(id),
            enemy: Enemy { kind },
            health: Health::new(stats.max_hp),
            stats,
            position,
            follower: PathFollower::new(waypoints),
            status: StatusEffects::default(),
            state: EnemyState::Spawning,
            timers: EnemyTimers {
                spawn_anim: 1.0,
                ..Default::default()
            },
            tags,
        }
    }
}

// ============================================================================
// TOWER COMPONENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TowerKind {
    SteamCannon,
    LightningTower,
    FlameThrower,
    AntiAirGun,
    BronzeMortar,
    CryoSteam,
    MineLayer,
    SniperMecha,
    ShieldGenerator,
}

/// How a tower picks its target among enemies in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetingMode {
    /// Furthest along the path.
    First,
    /// Least far along the path.
    Last,
    Closest,
    Strongest,
    Weakest,
    /// Flying enemies first, First-style among them.
    FlyingPriority,
}

impl Default for TargetingMode {
    fn default() -> Self {
        Self::First
    }
}

/// Tower stat block; the runtime's `current` stats are derived from the base
/// block and the tower's level.
#[derive(Component, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TowerStats {
    pub cost: i64,
    pub damage: f32,
    pub range: f32,
    /// Shots per second; cooldown after a shot is `1 / attack_speed`.
    pub attack_speed: f32,
    pub projectile_speed: f32,
    pub area_damage: bool,
    pub area_radius: f32,
    pub pierce: u32,
    pub chain: u32,
    pub can_target_ground: bool,
    pub can_target_air: bool,
    pub slow_effect: f32,
    pub slow_duration: f32,
    pub stun_duration: f32,
    pub burn_damage: f32,
    pub burn_duration: f32,
}

impl TowerStats {
    /// Base stats table, keyed by kind.
    pub fn base(kind: TowerKind) -> Self {
        let default = Self {
            cost: 0,
            damage: 0.0,
            range: 0.0,
            attack_speed: 0.0,
            projectile_speed: 0.0,
            area_damage: false,
            area_radius: 0.0,
            pierce: 0,
            chain: 0,
            can_target_ground: true,
            can_target_air: true,
            slow_effect: 0.0,
            slow_duration: 0.0,
            stun_duration: 0.0,
            burn_damage: 0.0,
            burn_duration: 0.0,
        };
        match kind {
            TowerKind::SteamCannon => Self {
                cost: 50,
                damage: 120.0,
                range: 96.0,
                attack_speed: 0.8,
                projectile_speed: 300.0,
                area_damage: true,
                area_radius: 32.0,
                ..default
            },
            TowerKind::LightningTower => Self {
                cost: 80,
                damage: 80.0,
                range: 80.0,
                attack_speed: 1.2,
                projectile_speed: 1000.0,
                chain: 3,
                stun_duration: 2.0,
                ..default
            },
            TowerKind::FlameThrower => Self {
                cost: 60,
                damage: 60.0,
                range: 64.0,
                attack_speed: 3.0,
                area_damage: true,
                area_radius: 48.0,
                burn_damage: 10.0,
                burn_duration: 5.0,
                can_target_air: false,
                ..default
            },
            TowerKind::AntiAirGun => Self {
                cost: 90,
                damage: 100.0,
                range: 128.0,
                attack_speed: 2.0,
                projectile_speed: 500.0,
                can_target_ground: false,
                ..default
            },
            TowerKind::BronzeMortar => Self {
                cost: 120,
                damage: 250.0,
                range: 160.0,
                attack_speed: 0.4,
                projectile_speed: 200.0,
                area_damage: true,
                area_radius: 48.0,
                ..default
            },
            TowerKind::CryoSteam => Self {
                cost: 70,
                damage: 40.0,
                range: 80.0,
                attack_speed: 1.0,
                area_damage: true,
                area_radius: 64.0,
                slow_effect: 0.5,
                slow_duration: 4.0,
                ..default
            },
            TowerKind::MineLayer => Self {
                cost: 40,
                damage: 300.0,
                range: 0.0,
                area_damage: true,
                area_radius: 32.0,
                can_target_air: false,
                ..default
            },
            TowerKind::SniperMecha => Self {
                cost: 150,
                damage: 400.0,
                range: 200.0,
                attack_speed: 0.6,
                projectile_speed: 800.0,
                pierce: 2,
                ..default
            },
            TowerKind::ShieldGenerator => Self {
                cost: 100,
                damage: 0.0,
                range: 96.0,
                ..default
            },
        }
    }

    /// Derive the stat block for a given level from a base block.
    ///
    /// Per level above 1: +25% damage, +10% range and area radius, +15%
    /// attack rate. Level 3 guarantees pierce >= 1; level 5 guarantees
    /// chain >= 2 and widens the area radius by half.
    pub fn at_level(base: &Self, level: u8) -> Self {
        let l = level.clamp(1, 5) as f32 - 1.0;
        let damage_mult = 1.0 + l * 0.25;
        let range_mult = 1.0 + l * 0.10;
        let speed_mult = 1.0 + l * 0.15;

        let mut stats = base.clone();
        stats.damage = base.damage * damage_mult;
        stats.range = base.range * range_mult;
        stats.attack_speed = base.attack_speed * speed_mult;
        stats.area_radius = base.area_radius * range_mult;
        stats.burn_damage = base.burn_damage * damage_mult;

        if level >= 3 {
            stats.pierce = stats.pierce.max(1);
        }
        if level >= 5 {
            stats.chain = stats.chain.max(2);
            stats.area_radius *= 1.5;
        }
        stats
    }

    /// Upgrade price list: 0.5x/0.75x/1.0x/1.5x of base cost for levels
    /// 2 through 5.
    pub fn upgrade_cost(base: &Self, current_level: u8) -> Option<i64> {
        const FACTORS: [f32; 4] = [0.5, 0.75, 1.0, 1.5];
        FACTORS
            .get(current_level.checked_sub(1)? as usize)
            .map(|f| (base.cost as f32 * f) as i64)
    }
}

/// Marker + kind for tower entities.
#[derive(Component, Debug, Clone, Copy)]
pub struct Tower {
    pub kind: TowerKind,
}

/// Per-tower mutable state.
#[derive(Component, Debug, Clone)]
pub struct TowerRuntime {
    pub level: u8,
    pub current: TowerStats,
    pub cooldown_remaining: f32,
    pub target: Option<u64>,
    pub targeting_mode: TargetingMode,
    pub construction_remaining: f32,
    pub muzzle_flash: f32,
    pub scan_timer: f32,
    /// Money sunk into build + upgrades; basis for the sell refund.
    pub invested: i64,
}

impl TowerRuntime {
    pub const CONSTRUCTION_TIME: f32 = 2.0;
    pub const SCAN_INTERVAL: f32 = 0.1;
    pub const MAX_LEVEL: u8 = 5;

    pub fn new(base: &TowerStats) -> Self {
        Self {
            level: 1,
            current: TowerStats::at_level(base, 1),
            cooldown_remaining: 0.0,
            target: None,
            targeting_mode: TargetingMode::default(),
            construction_remaining: Self::CONSTRUCTION_TIME,
            muzzle_flash: 0.0,
            scan_timer: 0.0,
            invested: base.cost,
        }
    }

    pub fn is_constructed(&self) -> bool {
        self.construction_remaining <= 0.0
    }

    pub fn can_upgrade(&self) -> bool {
        self.level < Self::MAX_LEVEL
    }
}

/// Bundle for spawning a complete tower entity.
#[derive(Bundle)]
pub struct TowerBundle {
    pub id: TowerId,
    pub tower: Tower,
    pub base_stats: TowerStats,
    pub runtime: TowerRuntime,
    pub grid_position: GridPosition,
    pub position: Position,
    pub tags: Tags,
}

impl TowerBundle {
    pub fn new(id: u64, kind: TowerKind, grid_pos: (i32, i32), world_pos: (f32, f32)) -> Self {
        let base = TowerStats::base(kind);
        Self {
            id: TowerId(id),
            tower: Tower { kind },
            runtime: TowerRuntime::new(&base),
            base_stats: base,
            grid_position: GridPosition {
                x: grid_pos.0,
                y: grid_pos.1,
            },
            position: Position::new(world_pos.0, world_pos.1),
            tags: Tags(vec!["tower"]),
        }
    }
}

// ============================================================================
// PROJECTILE COMPONENTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProjectileKind {
    Cannonball,
    LightningBolt,
    FlameBurst,
    Bullet,
    MortarShell,
    IceCrystal,
    SniperBullet,
    Mine,
}

/// How a projectile moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionKind {
    Linear,
    Ballistic,
    Homing,
    Instant,
    Static,
}

impl ProjectileKind {
    pub fn motion(&self) -> MotionKind {
        match self {
            ProjectileKind::Cannonball => MotionKind::Linear,
            ProjectileKind::LightningBolt => MotionKind::Instant,
            ProjectileKind::FlameBurst => MotionKind::Linear,
            ProjectileKind::Bullet => MotionKind::Linear,
            ProjectileKind::MortarShell => MotionKind::Ballistic,
            ProjectileKind::IceCrystal => MotionKind::Homing,
            ProjectileKind::SniperBullet => MotionKind::Linear,
            ProjectileKind::Mine => MotionKind::Static,
        }
    }
}

/// Effects a projectile carries from its tower to the impact point.
#[derive(Component, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarriedEffects {
    pub damage: f32,
    pub damage_kind: DamageKind,
    /// Zero when the impact is single-target.
    pub area_radius: f32,
    pub pierce: u32,
    pub slow_effect: f32,
    pub slow_duration: f32,
    pub stun_duration: f32,
    pub burn_damage: f32,
    pub burn_duration: f32,
}

impl CarriedEffects {
    /// Snapshot the relevant parts of a tower's current stats.
    pub fn from_tower(stats: &TowerStats, damage_kind: DamageKind) -> Self {
        Self {
            damage: stats.damage,
            damage_kind,
            area_radius: if stats.area_damage { stats.area_radius } else { 0.0 },
            pierce: stats.pierce,
            slow_effect: stats.slow_effect,
            slow_duration: stats.slow_duration,
            stun_duration: stats.stun_duration,
            burn_damage: stats.burn_damage,
            burn_duration: stats.burn_duration,
        }
    }
}

/// Marker + kind for projectile entities.
#[derive(Component, Debug, Clone, Copy)]
pub struct Projectile {
    pub kind: ProjectileKind,
}

/// Projectile kinematics and lifetime.
#[derive(Component, Debug, Clone)]
pub struct ProjectileMotion {
    pub motion: MotionKind,
    pub velocity: (f32, f32),
    pub speed: f32,
    pub source: (f32, f32),
    pub target_position: (f32, f32),
    /// For homing projectiles: the enemy to chase.
    pub target_enemy: Option<u64>,
    pub gravity: f32,
    pub homing_strength: f32,
    pub max_turn_rate: f32,
    pub travel_time: f32,
    pub max_travel_time: f32,
    pub has_hit: bool,
    /// Set once the impact has been handed to the effect resolver; the
    /// entity is removed on the following tick.
    pub resolved: bool,
    /// Bounded recent-position ring for trail rendering.
    pub history: VecDeque<(f32, f32)>,
}

impl ProjectileMotion {
    pub const MAX_TRAVEL_TIME: f32 = 10.0;
    pub const HISTORY_LEN: usize = 10;

    pub fn new(kind: ProjectileKind, source: (f32, f32), target: (f32, f32), speed: f32) -> Self {
        let motion = kind.motion();
        let gravity = match kind {
            ProjectileKind::MortarShell => 800.0,
            _ => 500.0,
        };
        let homing_strength = match kind {
            ProjectileKind::IceCrystal => 5.0,
            _ => 3.0,
        };

        let mut this = Self {
            motion,
            velocity: (0.0, 0.0),
            speed,
            source,
            target_position: target,
            target_enemy: None,
            gravity,
            homing_strength,
            max_turn_rate: std::f32::consts::PI,
            travel_time: 0.0,
            max_travel_time: Self::MAX_TRAVEL_TIME,
            has_hit: false,
            resolved: false,
            history: VecDeque::with_capacity(Self::HISTORY_LEN),
        };
        this.setup();
        this
    }

    fn setup(&mut self) {
        let (dx, dy) = (
            self.target_position.0 - self.source.0,
            self.target_position.1 - self.source.1,
        );
        let distance = (dx * dx + dy * dy).sqrt();
        match self.motion {
            MotionKind::Linear | MotionKind::Homing => {
                if distance > 0.0 && self.speed > 0.0 {
                    self.velocity = (dx / distance * self.speed, dy / distance * self.speed);
                }
            }
            MotionKind::Ballistic => {
                if distance > 0.0 && self.speed > 0.0 {
                    let time_of_flight = distance / self.speed;
                    self.velocity = (
                        dx / time_of_flight,
                        dy / time_of_flight + 0.5 * self.gravity * time_of_flight,
                    );
                }
            }
            MotionKind::Instant => {
                self.has_hit = true;
            }
            MotionKind::Static => {}
        }
    }

    pub fn record_history(&mut self, position: (f32, f32)) {
        if self.history.len() >= Self::HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(position);
    }

    /// Heading angle in radians, derived from velocity.
    pub fn heading(&self) -> f32 {
        self.velocity.1.atan2(self.velocity.0)
    }
}

/// Bundle for spawning a complete projectile entity.
#[derive(Bundle)]
pub struct ProjectileBundle {
    pub id: ProjectileId,
    pub projectile: Projectile,
    pub motion: ProjectileMotion,
    pub carried: CarriedEffects,
    pub position: Position,
    pub tags: Tags,
}

impl ProjectileBundle {
    pub fn new(
        id: u64,
        kind: ProjectileKind,
        source: (f32, f32),
        target: (f32, f32),
        speed: f32,
        carried: CarriedEffects,
    ) -> Self {
        let motion = ProjectileMotion::new(kind, source, target, speed);
        let position = if motion.motion == MotionKind::Instant {
            Position::new(target.0, target.1)
        } else {
            Position::new(source.0, source.1)
        };
        Self {
            id: ProjectileId(id),
            projectile: Projectile { kind },
            motion,
            carried,
            position,
            tags: Tags(vec!["projectile"]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_enemy_stats_table() {
        let soldier = EnemyStats::base(EnemyKind::SteamSoldier);
        assert_eq!(soldier.max_hp, 100.0);
        assert_eq!(soldier.base_speed, 60.0);
        assert_eq!(soldier.reward, 10);

        let tank = EnemyStats::base(EnemyKind::SteamTank);
        assert_eq!(tank.explosion_damage, 80.0);
        assert_eq!(tank.explosion_radius, 64.0);
        assert_eq!(tank.resistance(DamageKind::Electric), 0.8);

        assert!(EnemyStats::base(EnemyKind::SkyZeppelin).is_flying);
        assert!(EnemyStats::base(EnemyKind::IronGolem).can_regenerate);
    }

    #[test]
    fn test_level_scaling() {
        let scaled = EnemyStats::scaled(EnemyKind::SteamSoldier, 2.0);
        assert_eq!(scaled.max_hp, 200.0);
        assert_eq!(scaled.reward, 20);
        // Speed multiplier: min(1.5, 1 + 0.3 * (2 - 1)) = 1.3
        assert!((scaled.base_speed - 78.0).abs() < 0.001);

        // Cap kicks in at high multipliers.
        let extreme = EnemyStats::scaled(EnemyKind::SteamSoldier, 4.0);
        assert!((extreme.base_speed - 90.0).abs() < 0.001);
    }

    #[test]
    fn test_effective_damage_resistance_then_armor() {
        let tank = EnemyStats::base(EnemyKind::SteamTank);
        // 100 electric vs 0.8 resistance -> 20, minus 20 armor -> floor 1
        assert_eq!(effective_damage(100.0, DamageKind::Electric, &tank), 1.0);
        // 100 physical vs 0.4 resistance -> 60, minus 20 armor -> 40
        assert_eq!(effective_damage(100.0, DamageKind::Physical, &tank), 40.0);
        // Zero damage stays zero
        assert_eq!(effective_damage(0.0, DamageKind::Physical, &tank), 0.0);
    }

    #[test]
    fn test_cyber_reroll() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut stats = EnemyStats::base(EnemyKind::CyberSurvivor);
        stats.reroll_resistances(&mut rng);
        let high = stats.resistances.iter().filter(|&&r| r == 0.8).count();
        let low = stats.resistances.iter().filter(|&&r| r == 0.1).count();
        assert_eq!(high, 1);
        assert_eq!(low, 3);
    }

    #[test]
    fn test_tower_stats_table() {
        let cannon = TowerStats::base(TowerKind::SteamCannon);
        assert_eq!(cannon.cost, 50);
        assert_eq!(cannon.damage, 120.0);
        assert!(cannon.area_damage);

        let lightning = TowerStats::base(TowerKind::LightningTower);
        assert_eq!(lightning.chain, 3);
        assert_eq!(lightning.stun_duration, 2.0);

        assert!(!TowerStats::base(TowerKind::FlameThrower).can_target_air);
        assert!(!TowerStats::base(TowerKind::AntiAirGun).can_target_ground);
        assert_eq!(TowerStats::base(TowerKind::MineLayer).range, 0.0);
    }

    #[test]
    fn test_tower_level_progression() {
        let base = TowerStats::base(TowerKind::SteamCannon);
        let l3 = TowerStats::at_level(&base, 3);
        assert!((l3.damage - 180.0).abs() < 0.001);
        assert!((l3.range - 115.2).abs() < 0.01);
        assert!((l3.attack_speed - 1.04).abs() < 0.001);
        assert_eq!(l3.pierce, 1);

        let l5 = TowerStats::at_level(&base, 5);
        assert_eq!(l5.chain, 2);
        // area 32 * 1.4 (range mult) * 1.5 (ultimate)
        assert!((l5.area_radius - 32.0 * 1.4 * 1.5).abs() < 0.01);
    }

    #[test]
    fn test_upgrade_costs() {
        let base = TowerStats::base(TowerKind::SteamCannon);
        assert_eq!(TowerStats::upgrade_cost(&base, 1), Some(25));
        assert_eq!(TowerStats::upgrade_cost(&base, 2), Some(37));
        assert_eq!(TowerStats::upgrade_cost(&base, 3), Some(50));
        assert_eq!(TowerStats::upgrade_cost(&base, 4), Some(75));
        assert_eq!(TowerStats::upgrade_cost(&base, 5), None);
    }

    #[test]
    fn test_status_stacking() {
        let mut status = StatusEffects::default();
        status.add_slow(0.5, 2.0, "cryo");
        status.add_slow(0.5, 2.0, "cryo");
        assert!((status.speed_factor() - 0.25).abs() < 0.001);

        // Cap at 0.1
        status.add_slow(0.1, 2.0, "freeze");
        assert!((status.speed_factor() - 0.1).abs() < 0.001);

        status.stun(1.0);
        status.stun(0.5);
        assert_eq!(status.stun_remaining, 1.0);
    }

    #[test]
    fn test_path_follower_distance() {
        let follower = PathFollower::new(vec![(16.0, 16.0), (48.0, 16.0), (80.0, 16.0)]);
        let at_start = Position::new(16.0, 16.0);
        assert_eq!(follower.distance_traveled(at_start), 0.0);

        let mut advanced = follower.clone();
        advanced.index = 1;
        let mid = Position::new(64.0, 16.0);
        assert!((advanced.distance_traveled(mid) - 48.0).abs() < 0.001);
    }

    #[test]
    fn test_projectile_motion_setup() {
        let linear = ProjectileMotion::new(
            ProjectileKind::Cannonball,
            (0.0, 0.0),
            (100.0, 0.0),
            300.0,
        );
        assert_eq!(linear.motion, MotionKind::Linear);
        assert!((linear.velocity.0 - 300.0).abs() < 0.001);
        assert!(!linear.has_hit);

        let instant =
            ProjectileMotion::new(ProjectileKind::LightningBolt, (0.0, 0.0), (50.0, 0.0), 1000.0);
        assert!(instant.has_hit);

        let mortar =
            ProjectileMotion::new(ProjectileKind::MortarShell, (0.0, 0.0), (100.0, 0.0), 200.0);
        assert_eq!(mortar.gravity, 800.0);
        // Vertical launch velocity compensates gravity over the flight time.
        assert!(mortar.velocity.1 > 0.0);

        let mine = ProjectileMotion::new(ProjectileKind::Mine, (5.0, 5.0), (5.0, 5.0), 0.0);
        assert_eq!(mine.motion, MotionKind::Static);
        assert_eq!(mine.velocity, (0.0, 0.0));
    }

    #[test]
    fn test_projectile_history_is_bounded() {
        let mut motion =
            ProjectileMotion::new(ProjectileKind::Bullet, (0.0, 0.0), (100.0, 0.0), 500.0);
        for i in 0..25 {
            motion.record_history((i as f32, 0.0));
        }
        assert_eq!(motion.history.len(), ProjectileMotion::HISTORY_LEN);
        assert_eq!(motion.history.front(), Some(&(15.0, 0.0)));
    }

    #[test]
    fn test_id_allocator_monotonic() {
        let mut alloc = IdAllocator::default();
        let a = alloc.alloc();
        let b = alloc.alloc();
        let c = alloc.alloc();
        assert!(a < b && b < c);
    }
}
