// SPDX-License-Identifier: GPL-3.0-or-later

//! The [`Hsp`] driver loop, per §4.9: a stack of frames, a transition
//! hook run between states, and the `advance`/`abort` intent recorded
//! by the state function currently executing.

use archi_core::status::Status;
use archi_core::Pointer;
use tracing::{debug, trace};

use crate::state::{Frame, State};
use crate::transition::Transition;

/// A request recorded by `advance`, to be applied once the current
/// state function returns.
#[derive(Debug, Clone)]
pub(crate) struct AdvanceRequest {
    pub pop_frames: usize,
    pub push_frame: Frame,
}

/// Stack-of-frames cooperative scheduler (component J).
///
/// `Hsp` is inert outside of [`Hsp::execute`]: `advance`/`abort` calls
/// made outside a currently-running state function are no-ops, per the
/// specification's invariant.
pub struct Hsp {
    frames: Vec<Frame>,
    abort_code: Option<Status>,
    advance_request: Option<AdvanceRequest>,
    executing: bool,
    /// The state currently being dispatched, if any — already removed
    /// from `frames` by the time its function runs, so it's tracked
    /// here for [`Hsp::current_state`] to find.
    active: Option<State>,
    /// Whether the frame the currently-dispatched state came from was
    /// already removed from the stack (it emptied when the state was
    /// taken, or the state was transitional and nothing was taken at
    /// all). `pop_frames == 1` is a no-op when this is `true`: the
    /// "remainder of the current frame" it would discard is already
    /// gone.
    current_frame_consumed: bool,
}

impl Hsp {
    fn new() -> Hsp {
        Hsp {
            frames: Vec::new(),
            abort_code: None,
            advance_request: None,
            executing: false,
            active: None,
            current_frame_consumed: true,
        }
    }

    /// Run the processor to completion starting from `entry_state`,
    /// calling `transition` between every pair of dispatched states.
    ///
    /// A `None` `entry_state` exits immediately with [`Status::OK`].
    pub fn execute(entry_state: Option<State>, transition: Option<&dyn Transition>) -> Status {
        let Some(entry_state) = entry_state else {
            return Status::OK;
        };

        let mut hsp = Hsp::new();
        hsp.frames.push(Frame::of(None, vec![entry_state]));
        Hsp::drive(hsp, transition)
    }

    /// Drive an already-seeded `Hsp` to completion. Split out of
    /// [`Hsp::execute`] so tests can seed an arbitrary starting stack.
    fn drive(mut hsp: Hsp, transition: Option<&dyn Transition>) -> Status {
        let mut prev_state: Option<State> = None;

        loop {
            let transitional = transition.and_then(|transition| {
                let next_state = hsp.top_state().cloned();
                transition.transition(prev_state.as_ref(), next_state.as_ref())
            });

            let current = if let Some(state) = transitional {
                hsp.current_frame_consumed = true;
                state
            } else if hsp.frames.is_empty() {
                debug!("stack empty and no transitional state, exiting normally");
                return Status::OK;
            } else {
                let (state, consumed) = hsp.pop_one();
                hsp.current_frame_consumed = consumed;
                state
            };

            hsp.advance_request = None;
            hsp.abort_code = None;
            hsp.executing = true;
            hsp.active = Some(current.clone());

            let function = current.function();
            function.run(&mut hsp);

            hsp.executing = false;
            hsp.active = None;

            if let Some(code) = hsp.abort_code {
                trace!(%code, "hsp aborted");
                hsp.frames.clear();
                return code;
            }

            let request = hsp.advance_request.take().unwrap_or(AdvanceRequest {
                pop_frames: 0,
                push_frame: Frame::empty(),
            });
            hsp.apply_advance(request);

            prev_state = Some(current);
        }
    }

    /// The state currently being dispatched (valid only while its
    /// state function runs), or `None` outside of execution.
    #[must_use]
    pub fn current_state(&self) -> Option<&State> {
        self.active.as_ref()
    }

    /// The number of live frames on the stack.
    #[must_use]
    pub fn stack_frames(&self) -> usize {
        self.frames.len()
    }

    /// Record an advance request: pop `pop_frames` frames (per the
    /// `0`/`1`/`k>=2` semantics), then push `frame` (empty states are
    /// skipped, states with no metadata inherit the frame's default).
    ///
    /// No-op unless called from a state function of a currently
    /// executing `Hsp`.
    pub fn advance(&mut self, pop_frames: usize, frame: Frame) {
        if !self.executing {
            return;
        }
        self.advance_request = Some(AdvanceRequest { pop_frames, push_frame: frame });
    }

    /// Pop all remaining frames without pushing anything: the normal
    /// way a state function ends hierarchical execution entirely.
    pub fn finish(&mut self, pop_frames: usize) {
        self.advance(pop_frames, Frame::empty());
    }

    /// Record an abort with the given non-zero status; the driver
    /// tears down all frames and returns `code` from [`Hsp::execute`].
    ///
    /// No-op if `code` is [`Status::OK`], or outside a currently
    /// executing state function.
    pub fn abort(&mut self, code: Status) {
        if !self.executing || code == Status::OK {
            return;
        }
        self.abort_code = Some(code);
    }

    fn top_state(&self) -> Option<&State> {
        self.frames.last().and_then(Frame::front)
    }

    /// Pop the next state to dispatch from the top frame. Returns
    /// whether that frame was left empty (and so already removed from
    /// the stack) by taking it.
    fn pop_one(&mut self) -> (State, bool) {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                unreachable!("pop_one called with an empty stack");
            };
            if let Some(state) = frame.pop_front() {
                let emptied = frame.is_empty();
                if emptied {
                    self.frames.pop();
                }
                return (state, emptied);
            }
            self.frames.pop();
        }
    }

    fn apply_advance(&mut self, request: AdvanceRequest) {
        // `0` pops nothing; `1` discards the remainder of the current
        // frame (a no-op if it was already emptied/removed when its
        // state was taken); `k >= 2` additionally discards `k - 1`
        // whole frames below it.
        if request.pop_frames > 0 {
            if !self.current_frame_consumed {
                self.frames.pop();
            }
            for _ in 0..request.pop_frames - 1 {
                self.frames.pop();
            }
        }

        if !request.push_frame.is_empty() {
            self.frames.push(request.push_frame);
        }
    }
}

/// Build a [`Frame`] whose states with no metadata of their own inherit
/// `default_metadata` — a small helper around [`Frame::of`], handy when
/// assembling a `push_frame` argument for [`Hsp::advance`].
#[must_use]
pub fn frame(default_metadata: Option<Pointer>, states: Vec<State>) -> Frame {
    Frame::of(default_metadata, states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn single_state_with_no_advance_call_finishes_normally() {
        let entry = State::new(Arc::new(|_: &mut Hsp| {}), None, None);
        assert_eq!(Hsp::execute(Some(entry), None), Status::OK);
    }

    #[test]
    fn null_entry_state_is_immediately_ok() {
        assert_eq!(Hsp::execute(None, None), Status::OK);
    }

    #[test]
    fn finish_with_zero_pops_still_drains_a_single_state_frame() {
        let entry = State::new(
            Arc::new(|hsp: &mut Hsp| {
                hsp.finish(0);
            }),
            None,
            None,
        );
        assert_eq!(Hsp::execute(Some(entry), None), Status::OK);
    }

    #[test]
    fn advance_and_abort_outside_a_running_state_are_no_ops() {
        let mut hsp = Hsp::new();
        hsp.advance(1, Frame::empty());
        assert!(hsp.advance_request.is_none());
        hsp.abort(Status(-1));
        assert!(hsp.abort_code.is_none());
    }

    #[test]
    fn pop_frames_two_discards_remainder_and_one_whole_frame_below() {
        let log = Arc::new(std::sync::Mutex::new(Vec::<&'static str>::new()));

        let tail = {
            let log = log.clone();
            State::new(
                Arc::new(move |_: &mut Hsp| {
                    log.lock().unwrap().push("tail");
                }),
                None,
                None,
            )
        };
        let never_runs = {
            let log = log.clone();
            State::new(
                Arc::new(move |_: &mut Hsp| {
                    log.lock().unwrap().push("never");
                }),
                None,
                None,
            )
        };
        let popper = {
            let log = log.clone();
            State::new(
                Arc::new(move |hsp: &mut Hsp| {
                    log.lock().unwrap().push("popper");
                    hsp.advance(2, Frame::empty());
                }),
                None,
                None,
            )
        };

        // Build a stack of three frames: [popper] on top of [never_runs]
        // on top of [tail]. `popper` requests pop_frames=2, which should
        // discard its own (already-consumed, single-state) frame plus
        // the whole `never_runs` frame below it, leaving `tail` to run
        // next.
        let entry = State::new(
            Arc::new(move |hsp: &mut Hsp| {
                hsp.advance(0, Frame::of(None, vec![popper.clone()]));
            }),
            None,
            None,
        );

        let mut hsp = Hsp::new();
        hsp.frames.push(Frame::of(None, vec![tail]));
        hsp.frames.push(Frame::of(None, vec![never_runs]));
        hsp.frames.push(Frame::of(None, vec![entry]));

        let status = Hsp::drive(hsp, None);

        assert_eq!(status, Status::OK);
        assert_eq!(*log.lock().unwrap(), vec!["popper", "tail"]);
    }
}
