//! The scheduler's view of a filter: a type-erased unit of work with a
//! name (for diagnostics/error reporting) and a single `process` step.
//!
//! Ported from `hvylya::pipelines::async::Block` / `filters::IFilter`. The
//! reference additionally exposes per-channel `InputState`/`OutputState`
//! (history, delay, required/suggested/provided size, padding,
//! `mayConsumeNothing`) so the scheduler can decide *whether* a block is
//! worth running before calling `process()`. Here that decision is folded
//! into `process()` itself: a block inspects its own buffers' `available()`
//! counts and returns [`ProcessResult::Stalled`] if it doesn't yet have
//! enough input, which is simpler in Rust (no separate contract object to
//! keep in sync) at the cost of the scheduler not being able to skip a
//! block cheaply without calling into it -- acceptable given block counts
//! here are in the tens, not thousands.

/// Outcome of a single `Block::process()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessResult {
    /// Consumed input and/or produced output; the scheduler should keep
    /// scheduling this block and its downstream neighbors.
    Progressed,
    /// Not enough input (or output room) was available; try again once an
    /// upstream/downstream neighbor has progressed.
    Stalled,
    /// This block has permanently finished (its input reached EOF and it
    /// drained everything it could); the scheduler retires it.
    Done,
}

/// A single node in the dataflow graph. Implementors hold `Arc<CircularBuffer<T>>`
/// handles (reader and/or writer ends) for their concretely typed edges
/// internally; the trait itself only needs enough to be driven generically.
pub trait Block: Send {
    /// Name used in scheduler diagnostics and `PipelineError::BlockFailed`.
    fn name(&self) -> &str;

    /// Resets internal filter state (equalizer taps, PLL phase, RDS sync
    /// state, ...) to its initial value. Only legal while the owning
    /// pipeline is `Paused`.
    fn reset(&mut self);

    /// Attempts to consume available input and produce output. Must not
    /// block; if there isn't enough input/output room it returns
    /// `Stalled` immediately so the scheduler can move on to other work.
    fn process(&mut self) -> ProcessResult;
}
