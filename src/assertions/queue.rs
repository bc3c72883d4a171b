//! Assertion queues
//!
//! A queue holds two kinds of assertions. *Queued* assertions form a FIFO:
//! each trigger (a report of the queue's channel, or the end of a cycle)
//! removes and evaluates the head. *Permanent* assertions are evaluated on
//! every trigger until they are cleared explicitly.

use super::{Assertion, AssertionEntry};
use crate::hid::ChannelKind;
use std::collections::VecDeque;

/// Queued and permanent assertions for one trigger
#[derive(Debug, Default)]
pub struct AssertionQueue {
    queued: VecDeque<AssertionEntry>,
    permanent: Vec<AssertionEntry>,
}

impl AssertionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a one-shot assertion.
    pub fn push_queued(&mut self, assertion: impl Assertion + 'static) -> &mut Self {
        self.queued.push_back(AssertionEntry::from(assertion));
        self
    }

    /// Register an assertion evaluated on every trigger.
    pub fn push_permanent(&mut self, assertion: impl Assertion + 'static) -> &mut Self {
        self.permanent.push(AssertionEntry::from(assertion));
        self
    }

    /// Append several one-shot assertions in order.
    pub fn extend_queued<I>(&mut self, assertions: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn Assertion>>,
    {
        self.queued
            .extend(assertions.into_iter().map(AssertionEntry::new));
        self
    }

    /// Remove and return the head of the one-shot FIFO.
    pub fn drain_queued_head(&mut self) -> Option<AssertionEntry> {
        self.queued.pop_front()
    }

    pub fn permanent_entries(&self) -> &[AssertionEntry] {
        &self.permanent
    }

    pub fn permanent_entries_mut(&mut self) -> &mut [AssertionEntry] {
        &mut self.permanent
    }

    pub fn queued_entries(&self) -> impl Iterator<Item = &AssertionEntry> {
        self.queued.iter()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn permanent_len(&self) -> usize {
        self.permanent.len()
    }

    /// True only if both the FIFO and the permanent set are empty.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.permanent.is_empty()
    }

    pub fn clear_queued(&mut self) {
        self.queued.clear();
    }

    pub fn clear_permanent(&mut self) {
        self.permanent.clear();
    }

    pub fn clear(&mut self) {
        self.clear_queued();
        self.clear_permanent();
    }

    /// Descriptions of everything still registered, queued entries first
    pub fn describe_contents(&self) -> Vec<String> {
        let queued = self
            .queued
            .iter()
            .map(|entry| format!("queued: {}", entry.describe()));
        let permanent = self
            .permanent
            .iter()
            .map(|entry| format!("permanent: {}", entry.describe()));
        queued.chain(permanent).collect()
    }
}

/// One [`AssertionQueue`] per report channel
#[derive(Debug, Default)]
pub struct AssertionQueueBundle {
    queues: [AssertionQueue; 3],
}

impl AssertionQueueBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The queue of a channel
    pub fn bundle_for(&mut self, channel: ChannelKind) -> &mut AssertionQueue {
        &mut self.queues[channel.index()]
    }

    pub fn queue(&self, channel: ChannelKind) -> &AssertionQueue {
        &self.queues[channel.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(AssertionQueue::is_empty)
    }

    /// Channels whose queue still holds assertions
    pub fn non_empty_channels(&self) -> Vec<ChannelKind> {
        ChannelKind::ALL
            .into_iter()
            .filter(|channel| !self.queue(*channel).is_empty())
            .collect()
    }

    pub fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }
}
