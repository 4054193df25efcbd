//! Stack growth for the recursive walks.
//!
//! Lowering, decoding, encoding, unparsing and checking recurse once per
//! nesting level. Each level runs behind [`guarded`], which continues the walk
//! on a fresh heap segment when the thread's stack runs low, so a tree inside
//! the configured nesting limit never depends on how large the calling
//! thread's stack happens to be.

/// Space that must remain before a level is entered.
const RED_ZONE: usize = 512 * 1024;
/// Size of each segment allocated once the red zone is reached.
const SEGMENT: usize = 8 * 1024 * 1024;
/// Headroom for third-party walks (JSON text, schema evaluation) whose
/// recursion cannot be guarded level by level.
const DEEP: usize = 64 * 1024 * 1024;

#[inline]
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}

/// Runs `f` with at least [`DEEP`] bytes of stack available.
pub(crate) fn with_deep_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(DEEP, DEEP, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: usize) -> usize {
        if n == 0 {
            0
        } else {
            guarded(|| depth(n - 1) + 1)
        }
    }

    #[test]
    fn guarded_recursion_outgrows_a_small_thread() {
        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(|| depth(100_000))
            .unwrap();
        assert_eq!(handle.join().unwrap(), 100_000);
    }

    #[test]
    fn deep_stack_has_the_promised_headroom() {
        let remaining = with_deep_stack(stacker::remaining_stack);
        assert!(remaining.unwrap_or(DEEP) >= DEEP / 2);
    }
}
