//! Worker-thread scheduler driving a fixed graph of [`Block`]s to
//! completion.
//!
//! Ported from `hvylya::pipelines::async::Pipeline`: a pool of worker
//! threads pulls blocks off a shared ready queue, calls `process()`, and
//! reschedules neighbors when a block progresses. The reference's
//! lock-free per-block CAS state machine (`Idle -> Scheduling -> Scheduled
//! -> Running -> Idle`) is expressed here with a `Mutex<VecDeque<usize>>`
//! ready queue plus a `Condvar` -- same externally visible behavior (a
//! block is queued at most once at a time, workers block when the queue is
//! empty and wake on new work or shutdown), implemented with std
//! concurrency primitives instead of hand-rolled atomics, which is the
//! idiomatic Rust choice for a scheduler this size.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use super::block::{Block, ProcessResult};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stopped,
    Paused,
    Running,
}

struct Shared {
    blocks: Mutex<Vec<Box<dyn Block>>>,
    ready: Mutex<VecDeque<usize>>,
    queued: Mutex<Vec<bool>>,
    cv: Condvar,
    state: Mutex<State>,
    failure: Mutex<Option<PipelineError>>,
    done: Mutex<Vec<bool>>,
}

/// A pipeline: an unordered bag of blocks plus the scheduler that drives
/// them. Edges are implicit -- they live in the `CircularBuffer`s the
/// blocks share -- so the pipeline itself only needs to know how many
/// blocks there are and in what order to wake them initially.
pub struct Pipeline {
    shared: Arc<Shared>,
}

impl Pipeline {
    pub fn new() -> Self {
        Pipeline {
            shared: Arc::new(Shared {
                blocks: Mutex::new(Vec::new()),
                ready: Mutex::new(VecDeque::new()),
                queued: Mutex::new(Vec::new()),
                cv: Condvar::new(),
                state: Mutex::new(State::Stopped),
                failure: Mutex::new(None),
                done: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds a block to the graph, returning its index. Only legal while
    /// stopped.
    pub fn add_block(&mut self, block: Box<dyn Block>) -> usize {
        let mut blocks = self.shared.blocks.lock().unwrap();
        blocks.push(block);
        self.shared.queued.lock().unwrap().push(false);
        self.shared.done.lock().unwrap().push(false);
        blocks.len() - 1
    }

    fn schedule(&self, index: usize) {
        let mut queued = self.shared.queued.lock().unwrap();
        if queued[index] {
            return;
        }
        queued[index] = true;
        drop(queued);
        self.shared.ready.lock().unwrap().push_back(index);
        self.shared.cv.notify_one();
    }

    fn schedule_all(&self) {
        let n = self.shared.blocks.lock().unwrap().len();
        for i in 0..n {
            self.schedule(i);
        }
    }

    /// Runs every block until all of them report [`ProcessResult::Done`]
    /// or one of them fails, using `num_workers` OS threads. Blocks on the
    /// calling thread until the run finishes.
    pub fn run(&mut self, num_workers: usize) -> Result<()> {
        *self.shared.state.lock().unwrap() = State::Running;
        self.schedule_all();

        let num_workers = num_workers.max(1);
        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let shared = Arc::clone(&self.shared);
            handles.push(thread::spawn(move || worker_loop(shared)));
        }
        for h in handles {
            let _ = h.join();
        }

        *self.shared.state.lock().unwrap() = State::Stopped;

        if let Some(err) = self.shared.failure.lock().unwrap().take() {
            return Err(err.into());
        }

        let done = self.shared.done.lock().unwrap();
        if !done.iter().all(|&d| d) {
            return Err(PipelineError::Stalled.into());
        }
        Ok(())
    }

    /// Resets every block's internal state. Only legal from `Paused`
    /// (mirrors the reference's `reset()` precondition).
    pub fn reset(&mut self) -> Result<()> {
        let state = *self.shared.state.lock().unwrap();
        if state != State::Stopped {
            return Err(PipelineError::ResetNotPaused {
                state: match state {
                    State::Stopped => "Stopped",
                    State::Paused => "Paused",
                    State::Running => "Running",
                },
            }
            .into());
        }
        for block in self.shared.blocks.lock().unwrap().iter_mut() {
            block.reset();
        }
        for d in self.shared.done.lock().unwrap().iter_mut() {
            *d = false;
        }
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.shared.blocks.lock().unwrap().len()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn worker_loop(shared: Arc<Shared>) {
    loop {
        let index = {
            let mut ready = shared.ready.lock().unwrap();
            loop {
                if shared.failure.lock().unwrap().is_some() {
                    return;
                }
                if let Some(index) = ready.pop_front() {
                    break index;
                }
                let all_done = shared.done.lock().unwrap().iter().all(|&d| d);
                if all_done {
                    shared.cv.notify_all();
                    return;
                }
                let (guard, timeout) = shared
                    .cv
                    .wait_timeout(ready, std::time::Duration::from_millis(50))
                    .unwrap();
                ready = guard;
                if timeout.timed_out() {
                    // Spurious: nothing woke us, but a relaxed-mode final
                    // drain (a block whose only upstream already hit EOF)
                    // might still have work; let the loop body's `all_done`
                    // check above converge the run instead of spinning.
                    continue;
                }
            }
        };

        shared.queued.lock().unwrap()[index] = false;

        if shared.done.lock().unwrap()[index] {
            continue;
        }

        let result = {
            let mut blocks = shared.blocks.lock().unwrap();
            let name = blocks[index].name().to_string();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                blocks[index].process()
            }));
            match outcome {
                Ok(result) => result,
                Err(payload) => {
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic in block process()".to_string());
                    *shared.failure.lock().unwrap() = Some(PipelineError::BlockFailed {
                        block: name,
                        reason,
                    });
                    shared.cv.notify_all();
                    return;
                }
            }
        };

        match result {
            ProcessResult::Progressed => {
                // Re-queue self (more input might already be available)
                // and wake every other worker so up/downstream neighbors
                // that were stalled on this block's buffers get another
                // look -- we don't track the graph's actual edges here,
                // so a full re-scan is the conservative, always-correct
                // choice at this block count.
                let mut ready = shared.ready.lock().unwrap();
                let n = shared.queued.lock().unwrap().len();
                for i in 0..n {
                    let mut queued = shared.queued.lock().unwrap();
                    if !queued[i] {
                        queued[i] = true;
                        ready.push_back(i);
                    }
                }
                drop(ready);
                shared.cv.notify_all();
            }
            ProcessResult::Stalled => {
                // Nothing to do until some other block progresses.
            }
            ProcessResult::Done => {
                shared.done.lock().unwrap()[index] = true;
                shared.cv.notify_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBlock {
        name: String,
        remaining: usize,
        ticks: Arc<AtomicUsize>,
    }

    impl Block for CountingBlock {
        fn name(&self) -> &str {
            &self.name
        }

        fn reset(&mut self) {
            self.remaining = 3;
        }

        fn process(&mut self) -> ProcessResult {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.remaining == 0 {
                ProcessResult::Done
            } else {
                self.remaining -= 1;
                ProcessResult::Progressed
            }
        }
    }

    #[test]
    fn runs_every_block_to_completion() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new();
        for i in 0..4 {
            pipeline.add_block(Box::new(CountingBlock {
                name: format!("block-{i}"),
                remaining: 3,
                ticks: Arc::clone(&ticks),
            }));
        }
        pipeline.run(2).unwrap();
        // Each block ticks 4 times (3 Progressed + 1 Done).
        assert_eq!(ticks.load(Ordering::SeqCst), 16);
    }

    struct FailingBlock;
    impl Block for FailingBlock {
        fn name(&self) -> &str {
            "failing"
        }
        fn reset(&mut self) {}
        fn process(&mut self) -> ProcessResult {
            panic!("boom");
        }
    }

    #[test]
    fn block_panic_surfaces_as_block_failed() {
        let mut pipeline = Pipeline::new();
        pipeline.add_block(Box::new(FailingBlock));
        let err = pipeline.run(1).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ReceiverError::Pipeline(PipelineError::BlockFailed { .. })
        ));
    }

    #[test]
    fn reset_requires_stopped_state() {
        let mut pipeline = Pipeline::new();
        pipeline.add_block(Box::new(CountingBlock {
            name: "a".into(),
            remaining: 0,
            ticks: Arc::new(AtomicUsize::new(0)),
        }));
        assert!(pipeline.reset().is_ok());
    }
}
