//! Randomised checks of the lobby's standing invariants.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use metaserver::prelude::*;
use proptest::prelude::*;

const SLOTS: usize = 6;
const NAMES: [&str; 4] = ["bert", "bert1", "SirVer", "otto"];
const GAMES: [&str; 2] = ["my cool game", "duel"];

#[derive(Debug, Clone)]
enum Op {
    Login { slot: usize, name: usize },
    LoginRegistered { slot: usize },
    Relogin { slot: usize, name: usize },
    Disconnect { slot: usize },
    Pong { slot: usize },
    Open { slot: usize, game: usize, max: u32 },
    Join { slot: usize, game: usize },
    Leave { slot: usize },
    AnswerProbes { alive: bool },
    Advance { secs: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    let slot = 0..SLOTS;
    prop_oneof![
        (slot.clone(), 0..NAMES.len()).prop_map(|(slot, name)| Op::Login { slot, name }),
        slot.clone().prop_map(|slot| Op::LoginRegistered { slot }),
        (slot.clone(), 0..NAMES.len()).prop_map(|(slot, name)| Op::Relogin { slot, name }),
        slot.clone().prop_map(|slot| Op::Disconnect { slot }),
        slot.clone().prop_map(|slot| Op::Pong { slot }),
        (slot.clone(), 0..GAMES.len(), 1..4u32)
            .prop_map(|(slot, game, max)| Op::Open { slot, game, max }),
        (slot.clone(), 0..GAMES.len()).prop_map(|(slot, game)| Op::Join { slot, game }),
        slot.prop_map(|slot| Op::Leave { slot }),
        any::<bool>().prop_map(|alive| Op::AnswerProbes { alive }),
        (1..8u64).prop_map(|secs| Op::Advance { secs }),
    ]
}

/// Drives the engine with connection slots that reconnect on demand.
struct Fuzz {
    engine: MetaServer<ManualClock, MemoryCredentials>,
    clock: ManualClock,
    slots: [Option<ConnectionId>; SLOTS],
    next_conn: u64,
    probes: Vec<GameId>,
}

impl Fuzz {
    fn new() -> Self {
        let mut store = MemoryCredentials::new();
        store.insert("SirVer", "123456", Permission::Superuser);
        let clock = ManualClock::new();
        Self {
            engine: MetaServer::new(ServerConfig::default(), clock.clone(), store),
            clock,
            slots: [None; SLOTS],
            next_conn: 0,
            probes: Vec::new(),
        }
    }

    fn conn(&mut self, slot: usize) -> ConnectionId {
        if let Some(id) = self.slots[slot] {
            return id;
        }
        self.next_conn += 1;
        let id = ConnectionId::new(self.next_conn);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);
        self.engine.connect(id, addr);
        self.slots[slot] = Some(id);
        id
    }

    fn send(&mut self, slot: usize, fields: &[&str]) {
        let id = self.conn(slot);
        let frame = encode_frame(fields.iter().copied()).unwrap();
        self.engine.receive(id, &frame);
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::Login { slot, name } => {
                self.send(slot, &["LOGIN", "0", NAMES[name], "build-17", "false"]);
            }
            Op::LoginRegistered { slot } => {
                self.send(slot, &["LOGIN", "0", "SirVer", "build-16", "true", "123456"]);
            }
            Op::Relogin { slot, name } => {
                self.send(slot, &["RELOGIN", "0", NAMES[name], "build-17", "false"]);
            }
            Op::Disconnect { slot } => {
                if let Some(id) = self.slots[slot] {
                    self.engine.disconnected(id);
                }
            }
            Op::Pong { slot } => self.send(slot, &["PONG"]),
            Op::Open { slot, game, max } => {
                let max = max.to_string();
                self.send(slot, &["GAME_OPEN", GAMES[game], &max]);
            }
            Op::Join { slot, game } => self.send(slot, &["GAME_CONNECT", GAMES[game]]),
            Op::Leave { slot } => self.send(slot, &["GAME_DISCONNECT"]),
            Op::AnswerProbes { alive } => {
                for game in std::mem::take(&mut self.probes) {
                    self.engine.probe_finished(game, alive);
                }
            }
            Op::Advance { secs } => {
                self.clock.advance(Duration::from_secs(secs));
                self.engine.fire_timers();
            }
        }
        self.collect();
    }

    /// Drains effects: remembers probes, frees slots whose connection closed.
    fn collect(&mut self) {
        for effect in self.engine.take_effects() {
            match effect {
                Effect::Probe { game, .. } => self.probes.push(game),
                Effect::Close { conn } => {
                    for slot in self.slots.iter_mut() {
                        if *slot == Some(conn) {
                            *slot = None;
                        }
                    }
                }
                Effect::Send { .. } => {}
            }
        }
    }
}

proptest! {
    #[test]
    fn test_logged_in_names_stay_unique(ops in proptest::collection::vec(op(), 1..80)) {
        let mut fuzz = Fuzz::new();
        for op in ops {
            fuzz.apply(op);
            let names: Vec<&str> = fuzz.engine.clients().iter().map(|c| c.name.as_str()).collect();
            let distinct: HashSet<&str> = names.iter().copied().collect();
            prop_assert_eq!(names.len(), distinct.len(), "duplicate names in {:?}", names);
        }
    }

    #[test]
    fn test_games_never_exceed_capacity(ops in proptest::collection::vec(op(), 1..80)) {
        let mut fuzz = Fuzz::new();
        for op in ops {
            fuzz.apply(op);
            let mut seen = HashSet::new();
            for game in fuzz.engine.games().iter() {
                prop_assert!(game.members.len() <= game.max_players as usize);
                for member in &game.members {
                    prop_assert!(seen.insert(*member), "{} is in two games", member);
                }
            }
        }
    }
}
