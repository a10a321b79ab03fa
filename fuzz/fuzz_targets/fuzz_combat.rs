#![no_main]

use arbitrary::Arbitrary;
use bastion::game::{check_invariants, Coord, GameState, Map};
use bastion::{Capabilities, EngineConfig};
use libfuzzer_sys::fuzz_target;

/// An army converging on the contested tile.
#[derive(Arbitrary, Debug, Clone, Copy)]
struct FuzzArmy {
    /// Owning faction (folded into 1-4).
    owner: u8,
    /// Army size.
    units: u16,
    /// Start column.
    x: u8,
    /// Start row.
    y: u8,
    /// Whether the army waits on the target instead of marching to it.
    settled: bool,
}

/// Structured input for combat fuzzing.
#[derive(Arbitrary, Debug)]
struct CombatInput {
    /// Castle garrison on the target, if there is a castle.
    castle: Option<(u8, u16)>,
    /// Armies involved.
    armies: Vec<FuzzArmy>,
    /// Seconds per frame, in hundredths.
    dt: u8,
}

const SIZE: i32 = 12;
const TARGET: Coord = Coord::new(6, 6);

fuzz_target!(|input: CombatInput| {
    let config = EngineConfig {
        capabilities: Capabilities {
            fog_of_war: false,
            production: false,
            invariant_checks: false,
        },
        ..EngineConfig::default()
    };
    let Ok(map) = Map::new(SIZE, SIZE) else {
        return;
    };
    let mut game = GameState::new(map, config);

    if let Some((owner, units)) = input.castle {
        let _ = game.add_castle(TARGET, owner % 5, u32::from(units));
    }
    // Settled armies are placed without contact checks, so they share one faction.
    let mut garrison_owner = None;
    for army in input.armies.iter().take(12) {
        let owner = army.owner % 4 + 1;
        let units = u32::from(army.units).max(1);
        if army.settled && game.castle_at(TARGET).is_none() {
            let owner = *garrison_owner.get_or_insert(owner);
            let _ = game.spawn_settled(owner, units, TARGET);
            continue;
        }
        let from = Coord::new(i32::from(army.x) % SIZE, i32::from(army.y) % SIZE);
        let _ = game.spawn_marching(owner, units, from, TARGET);
    }

    let before: u64 = game.players().into_iter().map(|p| game.strength(p)).sum::<u64>()
        + game.castles().iter().filter(|c| c.owner == 0).map(|c| u64::from(c.units)).sum::<u64>();

    let dt = f32::from(input.dt.max(1)) / 100.0;
    for _ in 0..2_000 {
        game.update(dt);
        let violations = check_invariants(&game);
        assert!(violations.is_empty(), "{violations:?}");
        if game.armies().values().all(|army| army.destination().is_none()) {
            break;
        }
    }

    // Combat only ever destroys units.
    let after: u64 = game.players().into_iter().map(|p| game.strength(p)).sum::<u64>()
        + game.castles().iter().filter(|c| c.owner == 0).map(|c| u64::from(c.units)).sum::<u64>();
    assert!(after <= before, "units grew from {before} to {after}");
});
