//! Headless demonstration of the Steam Defense simulation core.
//!
//! Run with: cargo run --example basic_demo

use steam_defense_sim::{GameConfig, SimCommand, SimWorld, TowerKind};

fn main() {
    println!("=== Steam Defense - Simulation Demo ===\n");

    let config = GameConfig {
        seed: 12345,
        ..Default::default()
    };
    let mut sim = SimWorld::new(config).expect("map generation failed");

    let map = sim.map();
    println!(
        "Map: {}x{} tiles, spawn {:?} -> base {:?}, {} placement zones",
        map.grid.width,
        map.grid.height,
        map.spawn,
        map.base,
        map.placement_zones.len()
    );

    // Drop a few towers on the first placement cells.
    let spots: Vec<(i32, i32)> = map
        .placement_zones
        .iter()
        .flatten()
        .take(3)
        .copied()
        .collect();
    sim.start_game();
    for (i, &(gx, gy)) in spots.iter().enumerate() {
        let kind = if i % 2 == 0 {
            TowerKind::SteamCannon
        } else {
            TowerKind::LightningTower
        };
        sim.queue_command(SimCommand::BuildTower { kind, gx, gy });
    }

    // Run one minute of game time at 60 fps.
    println!("Running 60 seconds of simulation...\n");
    for frame in 0..3600 {
        sim.step(1.0 / 60.0);

        if (frame + 1) % 600 == 0 {
            let snapshot = sim.snapshot();
            println!(
                "t={:>5.1}s wave={} money={} lives={} score={} enemies={} projectiles={} [{}]",
                snapshot.game_time,
                snapshot.wave_index,
                snapshot.money,
                snapshot.lives,
                snapshot.score,
                snapshot.enemies.len(),
                snapshot.projectiles.len(),
                snapshot.state,
            );
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap());
}
