//! Native stack growth for deeply recursive evaluation.
//!
//! The recursion limit bounds Lamina-level calls, but each call costs several
//! native frames, and hosts may raise the limit far beyond the default. Every
//! `execute`/`eval` step runs through [`ensure_sufficient_stack`] so the host
//! thread grows its stack instead of overflowing it.

/// If less than this remains, grow the stack.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
