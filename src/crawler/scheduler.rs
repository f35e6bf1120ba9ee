//! Frontier ordering and politeness throttling
//!
//! This module handles:
//! - Breadth-first frontier: every depth-`d` URL pops before any depth-`d+1` URL
//! - The in-run claim set that keeps a URL from being queued twice
//! - The politeness delay, applied globally or per host, raised by robots
//!   crawl-delay

use crate::config::ThrottleScope;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};
use url::Url;

/// Where a frontier entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOrigin {
    /// Seed passed to `crawl` or `add_url`
    Root,
    /// Result injected from the search layer
    Search,
    /// Link found on a fetched page
    Link,
}

/// A URL queued for fetching
#[derive(Debug, Clone)]
pub struct QueuedUrl {
    /// The normalized URL to fetch
    pub url: Url,

    /// Link distance from the root that reached it
    pub depth: u32,

    pub origin: SeedOrigin,

    /// Host links from this page must stay on, when same-host following is on
    pub scope_host: Option<String>,

    /// Insertion counter; FIFO within a depth
    seq: u64,
}

// Lower depth pops first, then lower sequence number
impl Ord for QueuedUrl {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .depth
            .cmp(&self.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedUrl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth && self.seq == other.seq
    }
}

impl Eq for QueuedUrl {}

/// Breadth-first queue with in-run claims
///
/// A URL is claimed when first pushed. Pushing it again is refused unless the
/// new depth is shallower, in which case the stale deeper entry is skipped
/// when it surfaces.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<QueuedUrl>,
    claimed: HashMap<String, u32>,
    next_seq: u64,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a URL unless already claimed at the same or a shallower depth
    ///
    /// # Returns
    ///
    /// `true` if the URL was queued
    pub fn push(
        &mut self,
        url: Url,
        depth: u32,
        origin: SeedOrigin,
        scope_host: Option<String>,
    ) -> bool {
        match self.claimed.get(url.as_str()) {
            Some(&claimed_depth) if claimed_depth <= depth => return false,
            _ => {}
        }

        self.claimed.insert(url.as_str().to_string(), depth);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedUrl {
            url,
            depth,
            origin,
            scope_host,
            seq,
        });
        true
    }

    /// Pops the shallowest, oldest entry
    pub fn pop(&mut self) -> Option<QueuedUrl> {
        while let Some(queued) = self.heap.pop() {
            let current = self.claimed.get(queued.url.as_str()).copied();
            if current == Some(queued.depth) {
                return Some(queued);
            }
            tracing::trace!("Dropping superseded entry {} at depth {}", queued.url, queued.depth);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Politeness delay between consecutive fetches
#[derive(Debug)]
pub struct Throttle {
    delay: Duration,
    scope: ThrottleScope,
    last_global: Option<Instant>,
    last_per_host: HashMap<String, Instant>,
    host_delays: HashMap<String, Duration>,
}

impl Throttle {
    pub fn new(delay: Duration, scope: ThrottleScope) -> Self {
        Self {
            delay,
            scope,
            last_global: None,
            last_per_host: HashMap::new(),
            host_delays: HashMap::new(),
        }
    }

    /// Raises the delay for one host (robots.txt crawl-delay)
    pub fn set_host_delay(&mut self, host: &str, delay: Duration) {
        let entry = self.host_delays.entry(host.to_string()).or_default();
        *entry = (*entry).max(delay);
    }

    /// Effective delay before a request to `host`
    pub fn delay_for(&self, host: &str) -> Duration {
        self.host_delays
            .get(host)
            .map_or(self.delay, |d| (*d).max(self.delay))
    }

    /// How long a request to `host` must still wait at `now`
    pub fn wait_time(&self, host: &str, now: Instant) -> Duration {
        let last = match self.scope {
            ThrottleScope::Global => self.last_global,
            ThrottleScope::PerHost => self.last_per_host.get(host).copied(),
        };

        match last {
            Some(last) => self
                .delay_for(host)
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    /// Records a request to `host` made at `now`
    pub fn record(&mut self, host: &str, now: Instant) {
        self.last_global = Some(now);
        self.last_per_host.insert(host.to_string(), now);
    }

    /// Sleeps until a request to `host` is allowed, then records it
    pub async fn wait(&mut self, host: &str) {
        let wait = self.wait_time(host, Instant::now());
        if !wait.is_zero() {
            tracing::trace!("Throttling {} for {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
        self.record(host, Instant::now());
    }
}
