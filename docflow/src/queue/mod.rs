//! Producer and consumer adapters pairing channels with completion latches.

pub mod input;
pub mod output;

pub use input::InputQueue;
pub use output::OutputQueue;
