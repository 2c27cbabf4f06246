//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameWorld, Registry, SessionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<Registry>,
    pub world: Arc<GameWorld>,
    pub session: Arc<SessionService>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let registry = Arc::new(Registry::new());

        // The world loop itself is spawned by main
        let world = Arc::new(GameWorld::new(registry.clone(), config.world.clone()));

        let session = Arc::new(SessionService::new(world.clone()));

        Self {
            config,
            registry,
            world,
            session,
        }
    }
}
