#![no_main]

//! Full game fuzzer.
//!
//! Generates a skirmish from fuzzer-chosen parameters, appends arbitrary
//! orders and runs it to the end, checking invariants after every frame.
//! Catches integration bugs the combat fuzzer misses: orders against
//! captured castles, marches off the map, production on contested tiles.

use arbitrary::Arbitrary;
use bastion::game::{check_invariants, Coord};
use bastion::scenario::{Order, OrderKind};
use bastion::skirmish::{generate, SkirmishParams};
use libfuzzer_sys::fuzz_target;

/// A fuzzer-generated order.
#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzOrder {
    /// Send units out of a castle.
    Dispatch {
        frame: u8,
        castle: u8,
        units: u16,
        x: i8,
        y: i8,
    },
    /// Redirect a starting army.
    March { frame: u8, army: u8, x: i8, y: i8 },
}

/// Structured input for full game fuzzing.
#[derive(Arbitrary, Debug)]
struct GameInput {
    /// Skirmish seed.
    seed: u64,
    /// Factions (folded into 2-8).
    players: u8,
    /// Map side (folded into 4-19).
    size: u8,
    /// Frames to simulate (capped).
    frames: u16,
    /// Fog of war on or off.
    fog: bool,
    /// Castle production on or off.
    production: bool,
    /// Extra orders.
    orders: Vec<FuzzOrder>,
}

fuzz_target!(|input: GameInput| {
    let size = i32::from(input.size % 16) + 4;
    let mut params = SkirmishParams {
        width: size,
        height: size,
        players: input.players % 7 + 2,
        castles_per_player: 1,
        neutral_castles: 2,
        armies_per_player: 2,
        orders: 10,
        frames: u32::from(input.frames % 400) + 1,
        ..SkirmishParams::default()
    };
    params.config.capabilities.fog_of_war = input.fog;
    params.config.capabilities.production = input.production;
    params.config.capabilities.invariant_checks = false;

    let Ok(mut scenario) = generate(input.seed, &params) else {
        return;
    };
    let castles = scenario.castles.len();
    let armies = scenario.armies.len();
    for order in input.orders.iter().take(32) {
        let kind = match *order {
            FuzzOrder::Dispatch {
                castle,
                units,
                x,
                y,
                ..
            } if castles > 0 => OrderKind::Dispatch {
                castle: usize::from(castle) % castles,
                units: u32::from(units),
                destination: Coord::new(i32::from(x), i32::from(y)),
            },
            FuzzOrder::March { army, x, y, .. } if armies > 0 => OrderKind::March {
                army: usize::from(army) % armies,
                destination: Coord::new(i32::from(x), i32::from(y)),
            },
            _ => continue,
        };
        let (FuzzOrder::Dispatch { frame, .. } | FuzzOrder::March { frame, .. }) = *order;
        scenario.orders.push(Order {
            frame: u32::from(frame),
            kind,
        });
    }

    let Ok(mut run) = scenario.start() else {
        return;
    };
    while !run.is_finished() {
        // Indices are in range, so only engine refusals can happen and those are skipped.
        run.step().unwrap();
        let violations = check_invariants(run.state());
        assert!(violations.is_empty(), "{violations:?}");
    }
});
