//! Spike data model: destinations, per-second spikes, and the
//! (observer, AS)-keyed spike store.

pub mod spike;
pub mod store;

// Re-export commonly used types
pub use spike::{Destination, Spike};
pub use store::{ObserverAs, SingleAsSpikes, SpikeStore};
