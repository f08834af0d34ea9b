//! Arena fixtures shared by unit, integration and benchmark code.

use reqpool_arena::{Arena, ArenaConfig, ResetCleanup};

/// Block size of a typical request arena.
pub const REQUEST_BLOCK_SIZE: usize = 4096;

/// A request-sized arena with default settings.
pub fn request_arena() -> Arena {
    labeled_arena("test-request")
}

/// A request-sized arena whose span carries `label`.
pub fn labeled_arena(label: &str) -> Arena {
    build(ArenaConfig::new(REQUEST_BLOCK_SIZE).with_label(label))
}

/// An arena that refuses to reserve more than `max_bytes` in total.
pub fn capped_arena(block_size: usize, max_bytes: usize) -> Arena {
    build(ArenaConfig::new(block_size).with_max_bytes(max_bytes))
}

/// A request-sized arena that keeps plain callbacks across resets.
pub fn deferring_arena() -> Arena {
    build(ArenaConfig::new(REQUEST_BLOCK_SIZE).with_reset_cleanup(ResetCleanup::Defer))
}

fn build(config: ArenaConfig) -> Arena {
    match Arena::new(config) {
        Ok(arena) => arena,
        Err(e) => panic!("fixture arena config rejected: {e}"),
    }
}
