//! Generic dataflow pipeline: circular buffers, the `Block` contract, and a
//! worker-thread scheduler that drives a graph of blocks to completion.
//!
//! Ported from `hvylya::pipelines::async` (`circular_buffer.{h,cpp}`,
//! `block.h`, `pipeline.h`). The reference expresses per-edge type safety
//! through a compile-time type-list / `static_assert` at `connect()` time;
//! Rust has no direct equivalent of that template machinery, so here each
//! [`buffer::CircularBuffer<T>`] is concretely typed (the type check happens
//! at the call site, for free, instead of in a custom `connect!()` macro),
//! while the [`block::Block`] trait that the scheduler drives is type-erased
//! -- exactly mirroring the reference's `IFilter::process(UntypedSlice[],
//! UntypedSlice[])` boundary. [`filters`] wraps a handful of the real
//! `dsp` filters as `Block`s so this module is driven by more than its own
//! unit tests.

pub mod block;
pub mod buffer;
pub mod filters;
pub mod scheduler;

pub use block::{Block, ProcessResult};
pub use buffer::CircularBuffer;
pub use filters::{CmaBlock, FirBlock, SinkBlock, SourceBlock};
pub use scheduler::Pipeline;
