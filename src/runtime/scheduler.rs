//! Cooperative threads over explicit frame chains.
//! A thread owns a queue of roots and the frame chain of the root it is
//! running; the scheduler rotates ready threads through a timeslice.

use crate::runtime::{
    error::RuntimeResult,
    frame::{ExecContext, Frame, Root, Step},
};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadState {
    Stopped,
    Runnable,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every root ran to completion.
    Finished,
    /// The timeslice ran out; the thread is rescheduled.
    Expired,
    /// The debugger stopped the thread before an instruction.
    Suspended,
}

#[derive(Debug)]
pub struct Thread {
    id: usize,
    state: ThreadState,
    todo: VecDeque<Root>,
    frame: Option<Box<Frame>>,
}

impl Thread {
    pub fn new(id: usize, roots: impl IntoIterator<Item = Root>) -> Self {
        Self {
            id,
            state: ThreadState::Runnable,
            todo: roots.into_iter().collect(),
            frame: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Innermost frame of the running root.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.frame.is_none() && self.todo.is_empty()
    }

    /// Runs up to `timeslice` instructions; 0 runs until the thread finishes
    /// or is suspended.
    pub fn run(&mut self, timeslice: usize, cx: &mut ExecContext<'_>) -> RuntimeResult<RunOutcome> {
        self.state = ThreadState::Running;
        let mut budget = timeslice;
        loop {
            if self.frame.is_none() {
                let Some(root) = self.todo.pop_front() else {
                    self.state = ThreadState::Stopped;
                    return Ok(RunOutcome::Finished);
                };
                tracing::debug!(thread = self.id, ?root, "starting root");
                let mut frame = Box::new(Frame::new());
                frame.init(root, cx)?;
                self.frame = Some(frame);
                continue;
            }
            if timeslice > 0 {
                if budget == 0 {
                    self.state = ThreadState::Runnable;
                    return Ok(RunOutcome::Expired);
                }
                budget -= 1;
            }
            let Some(frame) = self.frame.as_mut() else {
                continue;
            };
            match frame.step(cx)? {
                Step::Continue => {}
                Step::Yield => {
                    self.state = ThreadState::Runnable;
                    return Ok(RunOutcome::Suspended);
                }
                Step::Call(mut child) => {
                    child.parent = self.frame.take();
                    self.frame = Some(child);
                }
                Step::Retired(value) => {
                    self.frame = self.frame.take().and_then(|mut done| done.parent.take());
                    match (self.frame.as_mut(), value) {
                        (Some(caller), Some(value)) => caller.receive(value),
                        (None, _) => tracing::debug!(thread = self.id, "root finished"),
                        _ => {}
                    }
                }
            }
        }
    }
}

/// Round-robin scheduler. The thread at the front of the queue is the
/// current one; a suspended or failed thread stays current.
#[derive(Debug, Default)]
pub struct Scheduler {
    ready: VecDeque<Thread>,
    timeslice: usize,
    next_id: usize,
}

impl Scheduler {
    pub fn new(timeslice: usize) -> Self {
        Self {
            timeslice,
            ..Self::default()
        }
    }

    pub fn timeslice(&self) -> usize {
        self.timeslice
    }

    pub fn spawn(&mut self, roots: impl IntoIterator<Item = Root>) -> usize {
        self.next_id += 1;
        self.ready.push_back(Thread::new(self.next_id, roots));
        self.next_id
    }

    pub fn clear(&mut self) {
        self.ready.clear();
    }

    pub fn is_idle(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.ready.iter()
    }

    pub fn current(&self) -> Option<&Thread> {
        self.ready.front()
    }

    pub fn current_frame(&self) -> Option<&Frame> {
        self.current().and_then(Thread::frame)
    }

    pub(crate) fn current_frame_mut(&mut self) -> Option<&mut Frame> {
        self.ready.front_mut().and_then(|thread| thread.frame.as_deref_mut())
    }

    /// Runs threads until all have finished or one is suspended.
    pub fn run(&mut self, cx: &mut ExecContext<'_>) -> RuntimeResult<RunOutcome> {
        while let Some(mut thread) = self.ready.pop_front() {
            let outcome = thread.run(self.timeslice, cx);
            match outcome {
                Ok(RunOutcome::Finished) => {
                    tracing::debug!(thread = thread.id(), "thread finished");
                }
                Ok(RunOutcome::Expired) => self.ready.push_back(thread),
                Ok(RunOutcome::Suspended) => {
                    self.ready.push_front(thread);
                    return Ok(RunOutcome::Suspended);
                }
                Err(err) => {
                    self.ready.push_front(thread);
                    return Err(err);
                }
            }
        }
        Ok(RunOutcome::Finished)
    }

    /// Runs at most `budget` instructions of the current thread without
    /// rotating. A finished thread is removed.
    pub fn run_current(&mut self, budget: usize, cx: &mut ExecContext<'_>) -> RuntimeResult<RunOutcome> {
        let Some(mut thread) = self.ready.pop_front() else {
            return Ok(RunOutcome::Finished);
        };
        let outcome = thread.run(budget.max(1), cx);
        if !matches!(outcome, Ok(RunOutcome::Finished)) {
            self.ready.push_front(thread);
        }
        outcome
    }
}
