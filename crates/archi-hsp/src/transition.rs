// SPDX-License-Identifier: GPL-3.0-or-later

//! The transition hook fired between every pair of dispatched states,
//! per §4.9, plus the built-in `attachments_handler` transition.

use archi_core::Pointer;

use crate::state::State;

/// Runs between every pair of dispatched states. May redirect execution
/// by returning a *transitional* state: the driver uses it as the next
/// state for this iteration without popping anything from the stack.
pub trait Transition: Send + Sync {
    /// `prev`: the state just finished (`None` on the very first
    /// iteration). `next`: the state the driver is about to dispatch
    /// (the current top-of-top-frame, or `None` if the stack just went
    /// empty).
    fn transition(&self, prev: Option<&State>, next: Option<&State>) -> Option<State>;
}

impl<F> Transition for F
where
    F: Fn(Option<&State>, Option<&State>) -> Option<State> + Send + Sync,
{
    fn transition(&self, prev: Option<&State>, next: Option<&State>) -> Option<State> {
        self(prev, next)
    }
}

/// An attachment: `pre`/`post` hooks fired around a state (or, for the
/// global attachment, around the whole run and at every frame
/// boundary).
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// Fired before the state it's attached to runs.
    pub pre: Option<Pointer>,
    /// Fired after the state it's attached to runs.
    pub post: Option<Pointer>,
}

/// The built-in transition described in §4.9's last paragraph: reads a
/// `pre`/`post` [`Attachment`] out of each state's metadata (decoded
/// via the caller-supplied `read`), fires the previous state's `post`
/// before the next state's `pre`, and at stack ends fires the global
/// "overall" attachment's `pre`/`post` as frame entry/exit hooks.
///
/// Firing an attachment's hook is delegated to `fire`, since what a
/// `pre`/`post` pointer means (a function to call, a log line, ...) is
/// a decision for the host, not this crate.
pub struct AttachmentsHandler<F, R> {
    overall: Attachment,
    read_metadata: R,
    fire: F,
}

impl<F, R> AttachmentsHandler<F, R>
where
    R: Fn(&Pointer) -> Attachment + Send + Sync,
    F: Fn(&Pointer) + Send + Sync,
{
    /// Build the handler from the global "overall" attachment, a
    /// decoder for per-state metadata, and a hook-firing callback.
    pub fn new(overall: Attachment, read_metadata: R, fire: F) -> AttachmentsHandler<F, R> {
        AttachmentsHandler { overall, read_metadata, fire }
    }

    fn attachment_of(&self, state: Option<&State>) -> Attachment {
        state
            .and_then(State::metadata)
            .map(|meta| (self.read_metadata)(meta))
            .unwrap_or_default()
    }
}

impl<F, R> Transition for AttachmentsHandler<F, R>
where
    R: Fn(&Pointer) -> Attachment + Send + Sync,
    F: Fn(&Pointer) + Send + Sync,
{
    fn transition(&self, prev: Option<&State>, next: Option<&State>) -> Option<State> {
        if prev.is_none() {
            if let Some(pre) = &self.overall.pre {
                (self.fire)(pre);
            }
        }

        if let Some(post) = self.attachment_of(prev).post {
            (self.fire)(&post);
        }

        if next.is_none() {
            if let Some(post) = &self.overall.post {
                (self.fire)(post);
            }
        } else if let Some(pre) = self.attachment_of(next).pre {
            (self.fire)(&pre);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn metadata(pre: usize, post: usize) -> Pointer {
        Pointer::from_usize(pre * 100 + post)
    }

    fn decode(meta: &Pointer) -> Attachment {
        let v = meta.as_usize().unwrap();
        let (pre, post) = (v / 100, v % 100);
        Attachment {
            pre: (pre > 0).then(|| Pointer::from_usize(pre)),
            post: (post > 0).then(|| Pointer::from_usize(post)),
        }
    }

    fn state_with_metadata(meta: Pointer) -> State {
        State::new(Arc::new(|_: &mut crate::Hsp| {}), None, Some(meta))
    }

    #[test]
    fn fires_overall_entry_post_then_pre_and_overall_exit_in_order() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = fired.clone();
        let overall = Attachment { pre: Some(Pointer::from_usize(9)), post: Some(Pointer::from_usize(8)) };
        let handler = AttachmentsHandler::new(overall, decode, move |p: &Pointer| {
            log.lock().unwrap().push(p.as_usize().unwrap());
        });

        let state1 = state_with_metadata(metadata(1, 2));
        let state2 = state_with_metadata(metadata(3, 4));

        assert!(handler.transition(None, Some(&state1)).is_none());
        assert!(handler.transition(Some(&state1), Some(&state2)).is_none());
        assert!(handler.transition(Some(&state2), None).is_none());

        assert_eq!(*fired.lock().unwrap(), vec![9, 1, 2, 3, 4, 8]);
    }

    #[test]
    fn states_without_metadata_fire_nothing() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let log = fired.clone();
        let handler = AttachmentsHandler::new(Attachment::default(), decode, move |p: &Pointer| {
            log.lock().unwrap().push(p.as_usize().unwrap());
        });

        let bare = State::new(Arc::new(|_: &mut crate::Hsp| {}), None, None);
        assert!(handler.transition(None, Some(&bare)).is_none());
        assert!(handler.transition(Some(&bare), None).is_none());
        assert!(fired.lock().unwrap().is_empty());
    }
}
