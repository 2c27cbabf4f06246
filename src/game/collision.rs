//! Projectile vs player collision resolution

use std::collections::HashSet;

use super::combat::PLAYER_RADIUS;
use super::physics::{Motion, PhysicsSystem};
use super::player::SharedPlayer;

/// A player as the resolver sees it. `index` is its slot in the tick snapshot.
#[derive(Debug, Clone, Copy)]
pub struct PlayerBody {
    pub index: usize,
    pub motion: Motion,
    pub alive: bool,
}

/// A live projectile as the resolver sees it
#[derive(Debug, Clone, Copy)]
pub struct ProjectileBody {
    /// Snapshot slot of the shooter
    pub owner: usize,
    pub id: u32,
    pub motion: Motion,
    pub radius: f32,
    pub damage: u32,
}

/// One projectile striking one player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub shooter: usize,
    pub projectile_id: u32,
    pub victim: usize,
    pub damage: u32,
}

pub struct CollisionResolver;

impl CollisionResolver {
    /// Copy out what collision needs, locking each player only briefly
    pub fn bodies(snapshot: &[SharedPlayer]) -> (Vec<PlayerBody>, Vec<ProjectileBody>) {
        let mut players = Vec::with_capacity(snapshot.len());
        let mut projectiles = Vec::new();

        for (index, player) in snapshot.iter().enumerate() {
            let player = player.lock();
            players.push(PlayerBody {
                index,
                motion: player.motion,
                alive: player.is_alive(),
            });
            projectiles.extend(player.projectiles().filter(|p| p.is_alive()).map(|p| {
                ProjectileBody {
                    owner: index,
                    id: p.id,
                    motion: p.motion,
                    radius: p.radius,
                    damage: p.damage,
                }
            }));
        }

        (players, projectiles)
    }

    /// Pairs every projectile with the first living non-owner it overlaps,
    /// in snapshot order. A projectile appears in at most one hit.
    pub fn resolve(players: &[PlayerBody], projectiles: &[ProjectileBody]) -> Vec<Hit> {
        let mut hits = Vec::new();
        let mut spent: HashSet<(usize, u32)> = HashSet::new();

        for projectile in projectiles {
            if spent.contains(&(projectile.owner, projectile.id)) {
                continue;
            }

            let victim = players.iter().find(|target| {
                target.alive
                    && target.index != projectile.owner
                    && PhysicsSystem::circles_overlap(
                        &projectile.motion,
                        projectile.radius,
                        &target.motion,
                        PLAYER_RADIUS,
                    )
            });

            if let Some(victim) = victim {
                spent.insert((projectile.owner, projectile.id));
                hits.push(Hit {
                    shooter: projectile.owner,
                    projectile_id: projectile.id,
                    victim: victim.index,
                    damage: projectile.damage,
                });
            }
        }

        hits
    }
}
