//! Error taxonomy for the simulation core.
//!
//! Fatal errors only exist at startup (configuration, map generation after
//! retries). Everything that happens inside a tick is reported through the
//! event bus or logged; no error crosses the tick boundary.

use thiserror::Error;

/// Top-level error type for fallible simulation operations.
#[derive(Debug, Error)]
pub enum SimError {
    /// Invalid or inconsistent configuration. Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Map generation failed validation after all retries.
    #[error("map generation failed: {0}")]
    MapGen(String),

    /// No path could be found. Callers typically log and skip.
    #[error("pathfinding failed from {from:?} to {to:?}")]
    Path { from: (i32, i32), to: (i32, i32) },

    /// Operation on a destroyed or unknown entity id.
    #[error("unknown entity id {0}")]
    Entity(u64),

    /// An event handler failed; the bus keeps running.
    #[error("event handler error: {0}")]
    Event(String),

    /// A forbidden game-state transition was requested.
    #[error("forbidden state transition: {from} -> {to}")]
    State { from: &'static str, to: &'static str },
}

pub type SimResult<T> = Result<T, SimError>;
