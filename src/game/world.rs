//! World state and authoritative tick loop
//!
//! One task drives the world for the life of the process. Each tick takes a
//! copy of the live players, advances them, resolves projectile hits,
//! applies damage and scoring, spawns new projectiles and broadcasts the
//! resulting state to every client in the copy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::WorldSettings;
use crate::util::time::{clamp_dt, remaining_budget, tick_interval, Timer};
use crate::ws::connection::send_if_open;
use crate::ws::protocol::{PlayerHealthMessage, PointsUpdate, ServerMsg};

use super::collision::{CollisionResolver, Hit};
use super::combat::{CombatSystem, WeaponStats};
use super::player::SharedPlayer;
use super::registry::Registry;

/// What one tick did, for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub tick: u64,
    pub players: usize,
    pub hits: usize,
    pub kills: usize,
}

pub struct GameWorld {
    registry: Arc<Registry>,
    settings: WorldSettings,
    weapon: WeaponStats,
    /// Players who disconnected since the last tick. Their projectiles are
    /// already dead and still need one announcement.
    departures: Mutex<Vec<SharedPlayer>>,
    tick: AtomicU64,
}

impl GameWorld {
    pub fn new(registry: Arc<Registry>, settings: WorldSettings) -> Self {
        Self {
            registry,
            settings,
            weapon: WeaponStats::default(),
            departures: Mutex::new(Vec::new()),
            tick: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Number of ticks completed so far
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::Relaxed)
    }

    /// Hand a removed player to the simulation so its dead projectiles are
    /// announced from the tick context
    pub fn queue_departure(&self, player: SharedPlayer) {
        self.departures.lock().push(player);
    }

    /// Run the tick loop forever
    pub async fn run(self: Arc<Self>) {
        let interval = tick_interval(self.settings.tick_rate);
        info!(
            tick_rate = self.settings.tick_rate,
            movement = ?self.settings.movement,
            "World simulation started"
        );

        let mut since_last = Timer::new();
        loop {
            let tick_start = Timer::new();
            let dt = clamp_dt(since_last.lap(), self.settings.max_tick_dt);

            let summary = self.tick(dt);
            if summary.hits > 0 {
                debug!(
                    tick = summary.tick,
                    players = summary.players,
                    hits = summary.hits,
                    kills = summary.kills,
                    "Tick resolved hits"
                );
            }

            let wait = remaining_budget(interval, tick_start.elapsed());
            if wait.is_zero() {
                debug!(tick = summary.tick, "Tick overran its budget");
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(wait).await;
            }
        }
    }

    /// Advance the world by `dt` seconds
    pub fn tick(&self, dt: f32) -> TickSummary {
        self.flush_departures();

        let snapshot = self.registry.all_players();
        let border = &self.settings.border;

        for player in &snapshot {
            let mut player = player.lock();
            if let Err(fault) = player.advance(dt, self.settings.movement, border) {
                warn!(error = %fault, "Resetting faulted player");
                player.recover(border);
            }
        }

        let (bodies, projectiles) = CollisionResolver::bodies(&snapshot);
        let hits = CollisionResolver::resolve(&bodies, &projectiles);
        let (applied, kills) = self.apply_hits(&snapshot, &hits);

        // After collisions, so every projectile goes out as new before it can die
        for player in &snapshot {
            player.lock().try_fire(&self.weapon);
        }

        self.broadcast_state(&snapshot);

        let tick = self.tick.fetch_add(1, Ordering::Relaxed) + 1;
        TickSummary {
            tick,
            players: snapshot.len(),
            hits: applied,
            kills,
        }
    }

    /// Announce the dead projectiles of players who left since the last tick
    fn flush_departures(&self) {
        let departed = std::mem::take(&mut *self.departures.lock());
        if departed.is_empty() {
            return;
        }

        let mut records = Vec::new();
        for player in departed {
            let mut player = player.lock();
            // A shot may have been fired between the close and the removal
            player.kill_all_projectiles();
            records.extend(player.take_projectile_deltas());
        }

        if !records.is_empty() {
            broadcast(&self.registry.all_players(), &ServerMsg::Bullets(records));
        }
    }

    /// Apply hits in resolver order. Returns (hits applied, kills).
    fn apply_hits(&self, snapshot: &[SharedPlayer], hits: &[Hit]) -> (usize, usize) {
        let mut applied = 0;
        let mut kills = 0;

        for hit in hits {
            let shooter = &snapshot[hit.shooter];
            let victim = &snapshot[hit.victim];

            let attacker_name = {
                let mut shooter = shooter.lock();
                // Gone when the shooter was killed earlier this tick
                let live = shooter
                    .projectile(hit.projectile_id)
                    .is_some_and(|p| p.is_alive());
                if !live {
                    continue;
                }
                shooter.kill_projectile(hit.projectile_id);
                shooter.username().to_string()
            };

            let (victim_name, victim_score, killed) = {
                let mut victim = victim.lock();
                if !victim.is_alive() {
                    continue;
                }
                let (health, killed) = victim.take_damage(hit.damage);
                let victim_name = victim.username().to_string();
                victim.send(&ServerMsg::Health(PlayerHealthMessage {
                    username: victim_name.clone(),
                    health,
                    affected_by: attacker_name.clone(),
                }));
                (victim_name, victim.score, killed)
            };
            applied += 1;

            if killed {
                kills += 1;
                self.handle_kill(shooter, victim, &attacker_name, &victim_name, victim_score, snapshot);
            }
        }

        (applied, kills)
    }

    fn handle_kill(
        &self,
        shooter: &SharedPlayer,
        victim: &SharedPlayer,
        attacker_name: &str,
        victim_name: &str,
        victim_score: u32,
        snapshot: &[SharedPlayer],
    ) {
        // No player lock held across registry calls
        if !self.registry.mark_dead(victim) {
            warn!(victim = %victim_name, "Killed player was no longer live");
        }

        {
            let mut shooter = shooter.lock();
            shooter.score += CombatSystem::kill_reward(victim_score);
            let points = ServerMsg::Points(PointsUpdate {
                username: attacker_name.to_string(),
                num_points: shooter.score,
            });
            shooter.send(&points);
        }

        let records = {
            let mut victim = victim.lock();
            victim.kill_all_projectiles();
            victim.take_projectile_deltas()
        };
        if !records.is_empty() {
            broadcast(snapshot, &ServerMsg::Bullets(records));
        }

        info!(attacker = %attacker_name, victim = %victim_name, "Player killed");
    }

    /// Per-tick state broadcast: every player's update, then the projectile delta
    fn broadcast_state(&self, snapshot: &[SharedPlayer]) {
        let mut updates = Vec::with_capacity(snapshot.len());
        let mut bullets = Vec::new();
        for player in snapshot {
            let mut player = player.lock();
            updates.push(player.to_update());
            bullets.extend(player.take_projectile_deltas());
        }

        broadcast(snapshot, &ServerMsg::PlayerUpdates(updates));
        if !bullets.is_empty() {
            broadcast(snapshot, &ServerMsg::Bullets(bullets));
        }
    }
}

/// Encode once and send to every open connection among `players`.
/// Returns how many connections took the message.
pub fn broadcast(players: &[SharedPlayer], msg: &ServerMsg) -> usize {
    let text = match msg.encode() {
        Ok(text) => text,
        Err(e) => {
            warn!(tag = msg.tag(), error = %e, "Failed to encode broadcast");
            return 0;
        }
    };

    players
        .iter()
        .map(|player| player.lock().connection().clone())
        .filter(|connection| send_if_open(connection.as_ref(), &text))
        .count()
}
