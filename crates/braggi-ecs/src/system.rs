//! Systems: named update passes over a world.

use crate::world::World;

/// A named update pass. Systems run in registration order on
/// [`World::update`]; a single system can be driven explicitly through
/// [`World::update_system`].
pub trait System: Send + Sync {
    fn name(&self) -> &str;

    /// One update tick. The system receives the world it is registered in;
    /// it must not assume any other system has already run this tick.
    fn update(&mut self, world: &mut World, dt: f64);
}
