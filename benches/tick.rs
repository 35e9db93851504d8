//! Full-tick benchmark: steps a populated simulation at a fixed rate.

use criterion::{criterion_group, criterion_main, Criterion};
use steam_defense_sim::{GameConfig, SimCommand, SimWorld, TowerKind};

fn populated_sim() -> SimWorld {
    let config = GameConfig {
        seed: 99,
        ..Default::default()
    };
    let mut sim = SimWorld::new(config).expect("map generation failed");
    sim.start_game();

    let spots: Vec<(i32, i32)> = sim
        .map()
        .placement_zones
        .iter()
        .flatten()
        .take(6)
        .copied()
        .collect();
    for &(gx, gy) in &spots {
        sim.queue_command(SimCommand::BuildTower {
            kind: TowerKind::SteamCannon,
            gx,
            gy,
        });
    }
    // Warm up into the thick of the first wave.
    for _ in 0..300 {
        sim.step(1.0 / 60.0);
    }
    sim
}

fn bench_tick(c: &mut Criterion) {
    let mut sim = populated_sim();
    c.bench_function("simulation_tick", |b| {
        b.iter(|| {
            sim.step(1.0 / 60.0);
        })
    });

    let mut sim = populated_sim();
    c.bench_function("snapshot_build", |b| {
        b.iter(|| {
            sim.step(1.0 / 60.0);
            criterion::black_box(sim.snapshot());
        })
    });
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
