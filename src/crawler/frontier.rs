//! Frontier management for a single scan session
//!
//! This module tracks:
//! - The FIFO queue of pages awaiting a fetch (breadth-first order)
//! - Pages already dequeued and processed
//! - Assets already scheduled for a check
//!
//! A frontier is owned by exactly one session and never shared.

use std::collections::{HashSet, VecDeque};
use url::Url;

#[derive(Debug, Default)]
pub struct Frontier {
    /// Pages awaiting a fetch, oldest first
    queue: VecDeque<Url>,

    /// Mirror of `queue` for membership checks
    queued: HashSet<Url>,

    /// Pages already dequeued
    visited: HashSet<Url>,

    /// Assets already probed or synthesized
    seen_resources: HashSet<Url>,
}

impl Frontier {
    /// Creates a frontier seeded with the start URL
    pub fn new(seed: Url) -> Self {
        let mut frontier = Self::default();
        frontier.push(seed);
        frontier
    }

    /// Queues a page unless it is already queued or visited
    ///
    /// Returns true if the URL was added.
    pub fn push(&mut self, url: Url) -> bool {
        if self.is_known(&url) {
            return false;
        }
        self.queued.insert(url.clone());
        self.queue.push_back(url);
        true
    }

    /// Queues newly discovered pages while `findings + queued` stays below `budget`
    ///
    /// Returns the number of URLs added.
    pub fn enqueue_bounded<I>(&mut self, urls: I, findings: usize, budget: usize) -> usize
    where
        I: IntoIterator<Item = Url>,
    {
        let mut added = 0;
        for url in urls {
            if findings + self.queue.len() >= budget {
                break;
            }
            if self.push(url) {
                added += 1;
            }
        }
        added
    }

    /// Takes the next page to process and marks it visited
    ///
    /// Pages visited since they were queued are skipped.
    pub fn next_page(&mut self) -> Option<Url> {
        while let Some(url) = self.queue.pop_front() {
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                return Some(url);
            }
        }
        None
    }

    /// Returns true if the page is queued or was already processed
    pub fn is_known(&self, url: &Url) -> bool {
        self.queued.contains(url) || self.visited.contains(url)
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url)
    }

    /// Claims an asset for checking; false if it was already claimed this session
    pub fn claim_asset(&mut self, url: &Url) -> bool {
        !self.seen_resources.contains(url) && self.seen_resources.insert(url.clone())
    }

    /// Number of pages waiting in the queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}
