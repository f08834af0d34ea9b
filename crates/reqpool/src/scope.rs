//! Request-scoped arena lifetimes.
//!
//! The helpers here create an arena, lend it to a closure and destroy it
//! when the closure returns or unwinds. The closure's result cannot
//! borrow from the arena, so anything that must survive the request has
//! to be copied out inside the closure.

use reqpool_arena::{Arena, ArenaConfig};
use reqpool_core::ArenaError;
use tracing::debug;

/// Run `f` with a fresh arena built from `config`, then destroy it.
///
/// Cleanups registered on the arena run (LIFO) before this returns, and
/// also while unwinding if `f` panics.
///
/// # Errors
///
/// Returns `InvalidConfig` or an allocation error if the arena cannot be
/// created; `f` is not called in that case.
pub fn with_request_arena<R>(
    config: ArenaConfig,
    f: impl FnOnce(&Arena) -> R,
) -> Result<R, ArenaError> {
    with_request_arena_mut(config, |arena| f(arena))
}

/// Like [`with_request_arena`], but lends the arena mutably so the
/// closure can [`reset`](Arena::reset) it between phases.
pub fn with_request_arena_mut<R>(
    config: ArenaConfig,
    f: impl FnOnce(&mut Arena) -> R,
) -> Result<R, ArenaError> {
    let mut arena = Arena::new(config)?;
    let result = {
        let _entered = arena.span().clone().entered();
        f(&mut arena)
    };
    debug!(parent: arena.span(), allocated = arena.allocated_bytes(), "request scope closed");
    arena.destroy();
    Ok(result)
}
