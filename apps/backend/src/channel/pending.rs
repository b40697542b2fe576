//! Correlation table: continuations waiting for a reply, plus their expiry.
//!
//! The reply timeout is fixed per channel, so deadlines are pushed in
//! nondecreasing order and a FIFO queue is an exact min-heap.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use super::Continuation;

pub struct PendingReplies {
    next_id: u64,
    timeout: Duration,
    waiting: HashMap<u64, Continuation>,
    expiries: VecDeque<(Instant, u64)>,
}

impl PendingReplies {
    pub fn new(timeout: Duration) -> Self {
        Self {
            next_id: 0,
            timeout,
            waiting: HashMap::new(),
            expiries: VecDeque::new(),
        }
    }

    /// Store a continuation and return its fresh correlation id.
    pub fn insert(&mut self, now: Instant, continuation: Continuation) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.waiting.insert(id, continuation);
        self.expiries.push_back((now + self.timeout, id));
        id
    }

    /// Detach the continuation for `id`. Each id can be taken at most once.
    pub fn take(&mut self, id: u64) -> Option<Continuation> {
        self.waiting.remove(&id)
    }

    /// Drop every continuation whose deadline has passed; returns how many
    /// were still waiting.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut evicted = 0;
        while let Some(&(deadline, id)) = self.expiries.front() {
            if deadline > now {
                break;
            }
            self.expiries.pop_front();
            if self.waiting.remove(&id).is_some() {
                evicted += 1;
            }
        }
        evicted
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.expiries.front().map(|&(deadline, _)| deadline)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    pub fn clear(&mut self) {
        self.waiting.clear();
        self.expiries.clear();
    }
}
