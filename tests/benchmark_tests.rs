//! Performance benchmarks for critical game systems
//!
//! Limits are loose enough for unoptimised test builds; the printed timings
//! are what to watch.

use client::interpolation::{StateEntry, StateInterpolator};
use server::client_manager::ClientManager;
use server::game::GameState;
use shared::collision::{default_colliders, Aabb};
use shared::hitscan::{ray_intersects, resolve_shot};
use shared::items::PRIMARY_ITEM;
use shared::movement::{advance, ActorState, InputIntent};
use shared::protocol::{ServerMessage, SERVER_ID};
use shared::Vec3;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const DT: f32 = 0.05;

fn running_input(rotation_y: f32) -> InputIntent {
    InputIntent {
        forward: true,
        right: true,
        jump: true,
        rotation_y,
        ..InputIntent::default()
    }
}

fn actor_ids(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("actor{:04}", i)).collect()
}

/// A crowded arena: `count` actors on a grid tight enough to collide.
fn crowded_game(count: usize) -> GameState {
    let mut game = GameState::new(default_colliders());
    for (i, id) in actor_ids(count).iter().enumerate() {
        game.register(id);
        let actor = game.actor_mut(id).unwrap();
        actor.position = Vec3::new((i % 8) as f32 * 1.2, 0.0, (i / 8) as f32 * 1.2);
        game.apply_input(id, running_input(i as f32 * 0.3));
    }
    game
}

/// Benchmarks the movement simulator for a single actor
#[test]
fn benchmark_movement_step() {
    let mut state = ActorState::new(Vec3::ZERO);
    let input = running_input(0.7);

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        advance(&mut state, &input, DT);
    }

    let duration = start.elapsed();
    println!(
        "Movement step: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(state.is_finite());
    assert!(duration.as_secs() < 5);
}

/// Benchmarks a full server tick with a crowded arena
#[test]
fn benchmark_server_tick() {
    let mut game = crowded_game(64);

    let ticks = 200;
    let start = Instant::now();

    for tick in 1..=ticks {
        game.step(tick, DT);
    }

    let duration = start.elapsed();
    println!(
        "Server tick with {} actors: {} ticks in {:?} ({:.2} μs/tick)",
        game.len(),
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    for id in actor_ids(64) {
        assert!(game.actor(&id).unwrap().is_finite());
    }
    // A tick must fit comfortably in the 50 ms budget.
    assert!(duration / (ticks as u32) < Duration::from_millis(50));
}

/// Benchmarks per-recipient delta broadcasts
#[test]
fn benchmark_state_broadcast() {
    let mut game = crowded_game(32);
    let mut clients = ClientManager::new(32);
    let mut receivers = Vec::new();
    let addr = "127.0.0.1:9000".parse().unwrap();
    for id in &actor_ids(32) {
        let (tx, rx) = mpsc::unbounded_channel();
        clients.add_client(id, addr, tx);
        receivers.push(rx);
    }

    let ticks = 100;
    let start = Instant::now();
    let mut sent = 0;

    for tick in 1..=ticks {
        game.step(tick, DT);
        sent += clients.broadcast_state(tick, game.snapshots());
        for rx in &mut receivers {
            while rx.try_recv().is_ok() {}
        }
    }

    let duration = start.elapsed();
    println!(
        "State broadcast to {} clients: {} ticks, {} messages in {:?}",
        clients.len(),
        ticks,
        sent,
        duration
    );

    assert!(sent > 0);
    assert!(duration.as_secs() < 10);
}

/// Benchmarks hit-scan against a full arena
#[test]
fn benchmark_hit_scan() {
    let mut actors = BTreeMap::new();
    for i in 0..32 {
        let position = Vec3::new((i % 8) as f32 * 3.0, 0.0, 5.0 + (i / 8) as f32 * 3.0);
        actors.insert(format!("actor{:02}", i), ActorState::new(position));
    }
    for actor in actors.values_mut() {
        actor.health = i32::MAX;
    }
    actors.insert("shooter".to_string(), ActorState::new(Vec3::ZERO));

    let origin = Vec3::new(0.0, 1.6, 0.0);
    let iterations = 10_000;
    let start = Instant::now();
    let mut hits = 0;

    for i in 0..iterations {
        let angle = (i % 100) as f32 * 0.01;
        let direction = Vec3::new(angle.sin(), -0.05, angle.cos());
        if resolve_shot("shooter", origin, direction, PRIMARY_ITEM, &mut actors).is_some() {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Hit scan: {} shots, {} hits in {:?} ({:.2} μs/shot)",
        iterations,
        hits,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(hits > 0);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks the ray-box test on its own
#[test]
fn benchmark_ray_box_test() {
    let aabb = Aabb::new(Vec3::new(0.0, 0.9, 10.0), Vec3::new(0.5, 0.9, 0.5));
    let origin = Vec3::new(0.0, 1.6, 0.0);

    let iterations = 100_000;
    let start = Instant::now();
    let mut hits = 0;

    for i in 0..iterations {
        let offset = (i % 200) as f32 * 0.001 - 0.1;
        let direction = Vec3::new(offset, -0.05, 1.0).normalize();
        if ray_intersects(origin, direction, 100.0, &aabb).is_some() {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Ray-box test: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert!(hits > 0);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks client interpolation at render frame rate
#[test]
fn benchmark_interpolation() {
    let t0 = Instant::now();
    let mut interpolator = StateInterpolator::new();
    for tick in 0..20u64 {
        let entry = StateEntry {
            tick,
            position: Vec3::new(tick as f32 * 0.3, 0.0, 0.0),
            velocity: Vec3::new(6.0, 0.0, 0.0),
            rotation_y: tick as f32 * 0.1,
            correction: None,
        };
        interpolator.add_state_at(entry, t0 + Duration::from_millis(tick * 50));
    }

    let iterations = 100_000;
    let delay = Duration::from_millis(100);
    let start = Instant::now();
    let mut rendered = 0;

    for i in 0..iterations {
        let now = t0 + Duration::from_micros(200_000 + (i % 700) as u64 * 1000);
        if interpolator.interpolated_state_at(now, delay).is_some() {
            rendered += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Interpolation: {} frames in {:?} ({:.2} ns/frame)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(rendered, iterations);
    assert!(duration.as_secs() < 5);
}

/// Benchmarks JSON encoding of a full state message
#[test]
fn benchmark_state_encoding() {
    let game = crowded_game(32);
    let message = ServerMessage::State {
        tick: 1,
        players: game.snapshots(),
    };
    let chat = ServerMessage::Chat {
        player_id: SERVER_ID.to_string(),
        message: "actor0001 has joined the game.".to_string(),
    };

    let iterations = 1_000;
    let start = Instant::now();
    let mut bytes = 0;

    for _ in 0..iterations {
        let text = message.to_json().unwrap();
        bytes += text.len();
        let decoded = ServerMessage::from_json(&text).unwrap();
        assert!(matches!(decoded, ServerMessage::State { .. }));
        bytes += chat.to_json().unwrap().len();
    }

    let duration = start.elapsed();
    println!(
        "State encoding: {} messages, {} bytes in {:?}",
        iterations, bytes, duration
    );

    assert!(duration.as_secs() < 10);
}
