// SPDX-License-Identifier: GPL-3.0-or-later

//! States, frames and the function signature they dispatch through
//! (component J), per §4.9 of the workspace specification.

use std::fmt;
use std::sync::Arc;

use archi_core::Pointer;

/// A state function: runs on the calling thread, reads/writes `data`
/// through the [`crate::Hsp`] handle it's given, and never suspends.
///
/// Reified from the original's `ARCHI_HSP_STATE_FUNCTION` macro
/// signature convention — a function pointer plus an opaque execution
/// handle.
pub trait StateFunction: Send + Sync {
    /// Run this state. Read `hsp.current_state()` for this state's own
    /// data, and mutate `hsp`'s pending advance/abort request to steer
    /// what runs next; returning without doing so is equivalent to an
    /// empty `advance(0)`, i.e. "fall off the end of this frame".
    fn run(&self, hsp: &mut crate::Hsp);
}

impl<F> StateFunction for F
where
    F: Fn(&mut crate::Hsp) + Send + Sync,
{
    fn run(&self, hsp: &mut crate::Hsp) {
        self(hsp);
    }
}

/// A single state: a function plus its data, plus metadata consumed
/// only by the transition function (never by the state itself).
#[derive(Clone)]
pub struct State {
    function: Arc<dyn StateFunction>,
    data: Option<Pointer>,
    metadata: Option<Pointer>,
}

impl State {
    /// Build a state from a function, its data, and transition metadata.
    #[must_use]
    pub fn new(function: Arc<dyn StateFunction>, data: Option<Pointer>, metadata: Option<Pointer>) -> State {
        State { function, data, metadata }
    }

    /// This state's data, handed to the state function on dispatch.
    #[must_use]
    pub const fn data(&self) -> Option<&Pointer> {
        self.data.as_ref()
    }

    /// This state's metadata, read only by a transition function.
    #[must_use]
    pub const fn metadata(&self) -> Option<&Pointer> {
        self.metadata.as_ref()
    }

    /// Replace this state's metadata, used when a frame's default
    /// metadata fills in for a state pushed with none.
    pub fn set_metadata(&mut self, metadata: Pointer) {
        self.metadata = Some(metadata);
    }

    pub(crate) fn function(&self) -> Arc<dyn StateFunction> {
        self.function.clone()
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("data", &self.data.is_some())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

/// A contiguous sequence of states pushed and popped as a unit, sharing
/// a default metadata pointer: any state pushed without its own
/// metadata inherits the frame's.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    default_metadata: Option<Pointer>,
    states: Vec<State>,
}

impl Frame {
    /// Build a frame from its default metadata and its states (in
    /// execution order, i.e. first to run is first in the vector).
    /// `None` entries are skipped (the original's "null states within
    /// the frame are skipped"); states with no metadata of their own
    /// inherit `default_metadata`.
    #[must_use]
    pub fn new(default_metadata: Option<Pointer>, states: Vec<Option<State>>) -> Frame {
        let states = states
            .into_iter()
            .flatten()
            .map(|mut state| {
                if state.metadata.is_none() {
                    if let Some(meta) = &default_metadata {
                        state.metadata = Some(meta.clone());
                    }
                }
                state
            })
            .collect();
        Frame { default_metadata, states }
    }

    /// Build a frame from states that are all known to be present —
    /// convenience for the common case with no null-state gaps.
    #[must_use]
    pub fn of(default_metadata: Option<Pointer>, states: Vec<State>) -> Frame {
        Frame::new(default_metadata, states.into_iter().map(Some).collect())
    }

    /// An empty frame with no states and no default metadata.
    #[must_use]
    pub fn empty() -> Frame {
        Frame::default()
    }

    /// The frame's default metadata.
    #[must_use]
    pub const fn default_metadata(&self) -> Option<&Pointer> {
        self.default_metadata.as_ref()
    }

    /// Number of states remaining in the frame.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the frame has no states left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Pop the next state to execute (the front of the sequence).
    pub fn pop_front(&mut self) -> Option<State> {
        if self.states.is_empty() {
            None
        } else {
            Some(self.states.remove(0))
        }
    }

    /// The state that would run next, without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&State> {
        self.states.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn noop_state(data: usize) -> State {
        State::new(Arc::new(|_: &mut crate::Hsp| {}), Some(Pointer::from_usize(data)), None)
    }

    #[test]
    fn null_states_are_skipped_on_construction() {
        let frame = Frame::new(None, vec![Some(noop_state(1)), None, Some(noop_state(2))]);
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn states_without_metadata_inherit_the_frame_default() {
        let default_meta = Pointer::from_usize(7);
        let frame = Frame::new(Some(default_meta.clone()), vec![Some(noop_state(1))]);

        let front = frame.front().unwrap();
        assert_eq!(front.metadata().and_then(Pointer::as_usize), default_meta.as_usize());
    }

    #[test]
    fn a_states_own_metadata_is_not_overridden_by_the_frame_default() {
        let mut own = noop_state(1);
        own.set_metadata(Pointer::from_usize(99));
        let frame = Frame::new(Some(Pointer::from_usize(7)), vec![Some(own)]);

        assert_eq!(frame.front().unwrap().metadata().and_then(Pointer::as_usize), Some(99));
    }

    #[test]
    fn pop_front_drains_states_in_order() {
        let mut frame = Frame::of(None, vec![noop_state(1), noop_state(2)]);
        assert_eq!(frame.pop_front().unwrap().data().and_then(Pointer::as_usize), Some(1));
        assert_eq!(frame.pop_front().unwrap().data().and_then(Pointer::as_usize), Some(2));
        assert!(frame.pop_front().is_none());
    }
}
