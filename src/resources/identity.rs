//! Process-wide identities for command sequences and effect materials.
//!
//! Both are compared by identity rather than content: two sequences with the
//! same operations are still different submissions, and a material rebuilt
//! from the same WGSL is a different pipeline. Sequences and materials draw
//! from one counter, so an id never names both.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Returns an id never handed out before in this process. Never `0`.
pub(crate) fn next_identity() -> u64 {
    NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}
