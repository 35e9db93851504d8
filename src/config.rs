//! Game configuration blobs.
//!
//! Mirrors the validated-JSON boundary of the external loader: the core
//! accepts these structs fully formed, validates them once in
//! [`GameConfig::validate`], and refuses to initialize on failure.

use bevy_ecs::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::components::{EnemyKind, TowerKind};
use crate::error::{SimError, SimResult};

/// Window/render parameters. The core never opens a window; these are kept
/// so validation matches the full application config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    pub vsync: bool,
    pub antialiasing: bool,
    pub fullscreen: bool,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            target_fps: 60,
            vsync: true,
            antialiasing: true,
            fullscreen: false,
        }
    }
}

/// Grid geometry and map-generation constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub grid_width: i32,
    pub grid_height: i32,
    pub tile_size: f32,
    pub min_path_length: usize,
    pub max_path_length: usize,
    pub path_width: i32,
    pub min_placement_zones: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_width: 24,
            grid_height: 16,
            tile_size: 32.0,
            min_path_length: 40,
            max_path_length: 60,
            path_width: 2,
            min_placement_zones: 8,
        }
    }
}

/// Wave pacing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveSettings {
    /// Delay between waves, seconds of game time.
    pub preparation_time: f32,
    /// Base interval between spawns inside a wave.
    pub spawn_interval: f32,
    /// Difficulty multiplier applied per wave index.
    pub difficulty_scaling: f32,
    pub max_enemies_per_wave: usize,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            preparation_time: 10.0,
            spawn_interval: 1.0,
            difficulty_scaling: 1.15,
            max_enemies_per_wave: 50,
        }
    }
}

/// Economy tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub kill_bonus_multiplier: f32,
    /// Interest on banked money, paid at wave completion.
    pub interest_rate: f32,
    /// Fraction of total invested cost refunded on sell.
    pub sell_ratio: f32,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            kill_bonus_multiplier: 1.0,
            interest_rate: 0.02,
            sell_ratio: 0.7,
        }
    }
}

/// Gameplay balance: starting resources plus wave/economy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceConfig {
    pub starting_money: i64,
    pub starting_lives: i32,
    pub wave: WaveSettings,
    pub economy: EconomyConfig,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            starting_money: 150,
            starting_lives: 20,
            wave: WaveSettings::default(),
            economy: EconomyConfig::default(),
        }
    }
}

/// One wave: which enemies spawn and how hard they hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveConfig {
    pub enemies: Vec<(EnemyKind, u32)>,
    pub level_multiplier: f32,
}

impl WaveConfig {
    pub fn new(enemies: Vec<(EnemyKind, u32)>, level_multiplier: f32) -> Self {
        Self {
            enemies,
            level_multiplier,
        }
    }

    /// Total number of enemies in this wave.
    pub fn enemy_count(&self) -> usize {
        self.enemies.iter().map(|(_, count)| *count as usize).sum()
    }
}

/// Complete validated configuration for one run.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub screen: ScreenConfig,
    pub grid: GridConfig,
    pub balance: BalanceConfig,
    pub waves: Vec<WaveConfig>,
    /// Seed for map generation and in-run randomness.
    pub seed: u64,
    /// Fixed timestep for the internal update loop.
    pub fixed_timestep: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen: ScreenConfig::default(),
            grid: GridConfig::default(),
            balance: BalanceConfig::default(),
            waves: default_waves(),
            seed: 0,
            fixed_timestep: 1.0 / 60.0,
        }
    }
}

impl GameConfig {
    /// Validate the configuration. Returns the first problem found.
    pub fn validate(&self) -> SimResult<()> {
        if self.screen.width < 800 || self.screen.height < 600 {
            return Err(SimError::Config(format!(
                "resolution too small: {}x{} (minimum 800x600)",
                self.screen.width, self.screen.height
            )));
        }
        let total_tiles = self.grid.grid_width as i64 * self.grid.grid_height as i64;
        if self.grid.grid_width < 4 || self.grid.grid_height < 4 {
            return Err(SimError::Config(format!(
                "grid too small: {}x{}",
                self.grid.grid_width, self.grid.grid_height
            )));
        }
        if total_tiles > 1000 {
            return Err(SimError::Config(format!(
                "grid too large: {total_tiles} tiles (maximum 1000)"
            )));
        }
        if self.grid.tile_size <= 0.0 {
            return Err(SimError::Config("tile_size must be positive".into()));
        }
        if self.balance.starting_lives < 0 || self.balance.starting_money < 0 {
            return Err(SimError::Config("starting resources must be >= 0".into()));
        }
        if self.balance.wave.spawn_interval <= 0.0 {
            return Err(SimError::Config("spawn_interval must be positive".into()));
        }
        if !(self.fixed_timestep > 0.0) {
            return Err(SimError::Config("fixed_timestep must be positive".into()));
        }
        for (i, wave) in self.waves.iter().enumerate() {
            if wave.level_multiplier <= 0.0 {
                return Err(SimError::Config(format!(
                    "wave {i}: level_multiplier must be positive"
                )));
            }
            if wave.enemy_count() > self.balance.wave.max_enemies_per_wave {
                return Err(SimError::Config(format!(
                    "wave {i}: {} enemies exceeds max_enemies_per_wave {}",
                    wave.enemy_count(),
                    self.balance.wave.max_enemies_per_wave
                )));
            }
        }
        Ok(())
    }
}

/// Default campaign used when no wave table is supplied.
pub fn default_waves() -> Vec<WaveConfig> {
    vec![
        WaveConfig::new(vec![(EnemyKind::SteamSoldier, 8)], 1.0),
        WaveConfig::new(
            vec![(EnemyKind::SteamSoldier, 10), (EnemyKind::SteelSpider, 4)],
            1.1,
        ),
        WaveConfig::new(
            vec![(EnemyKind::SteamSoldier, 8), (EnemyKind::SkyZeppelin, 4)],
            1.2,
        ),
        WaveConfig::new(
            vec![
                (EnemyKind::SteelSpider, 8),
                (EnemyKind::LightningDrone, 6),
            ],
            1.3,
        ),
        WaveConfig::new(
            vec![(EnemyKind::SteamTank, 3), (EnemyKind::SteamSoldier, 12)],
            1.4,
        ),
        WaveConfig::new(
            vec![
                (EnemyKind::CyberSurvivor, 6),
                (EnemyKind::SkyZeppelin, 6),
            ],
            1.5,
        ),
        WaveConfig::new(
            vec![(EnemyKind::IronGolem, 2), (EnemyKind::SteamTank, 4)],
            1.6,
        ),
        WaveConfig::new(
            vec![
                (EnemyKind::IronGolem, 3),
                (EnemyKind::CyberSurvivor, 8),
                (EnemyKind::LightningDrone, 8),
            ],
            1.8,
        ),
    ]
}

/// Mapping for the tower-selection input family; kept here so the config,
/// input layer and UI agree on the ordering.
pub fn tower_palette() -> [TowerKind; 9] {
    [
        TowerKind::SteamCannon,
        TowerKind::LightningTower,
        TowerKind::FlameThrower,
        TowerKind::AntiAirGun,
        TowerKind::BronzeMortar,
        TowerKind::CryoSteam,
        TowerKind::MineLayer,
        TowerKind::SniperMecha,
        TowerKind::ShieldGenerator,
    ]
}
