//! Utilities for testing docflow stages.
//!
//! [`faulty_channel::FaultyChannel`] injects put failures into a destination, and the helpers in
//! [`wait`] bound every test wait so that a latch that is never signalled fails the test instead
//! of hanging it.

pub mod faulty_channel;
pub mod wait;
