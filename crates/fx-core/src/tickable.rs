//! Trait for components that advance by clock ticks.

use crate::Ticks;

/// A component driven by the global clock.
///
/// Compute units and the register wrapper all implement this trait. One call
/// to `tick` is one rising clock edge; a unit with an `N`-cycle latency
/// reaches its done state after exactly `N` ticks, never fewer.
pub trait Tickable {
    /// Advance the component by one clock tick.
    fn tick(&mut self);

    /// Advance the component by multiple ticks.
    ///
    /// Default implementation calls `tick()` in a loop. Components may
    /// override for efficiency, but must produce identical results.
    fn tick_n(&mut self, count: Ticks) {
        for _ in 0..count.get() {
            self.tick();
        }
    }
}
