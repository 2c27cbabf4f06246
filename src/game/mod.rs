//! Game simulation modules

pub mod border;
pub mod collision;
pub mod combat;
pub mod physics;
pub mod player;
pub mod registry;
pub mod session;
pub mod world;

pub use registry::Registry;
pub use session::SessionService;
pub use world::GameWorld;
