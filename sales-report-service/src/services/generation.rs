//! Per-session search generations.
//!
//! Every search started for a session bumps that session's counter. When the
//! fetch completes, the search only publishes its result if no newer search
//! has started in the meantime.
//!
//! Session ids come straight from a request header, so the table is bounded:
//! once it is full, idle sessions are dropped first, then the least recently
//! used ones.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug)]
struct Session {
    counter: Arc<AtomicU64>,
    last_used: Instant,
}

#[derive(Debug, Clone)]
pub struct SearchGenerations {
    sessions: Arc<DashMap<String, Session>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    counter: Option<Arc<AtomicU64>>,
}

impl Default for SearchGenerations {
    fn default() -> Self {
        Self::with_limits(DEFAULT_IDLE_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SearchGenerations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            idle_ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Start a search. Requests without a session id cannot be superseded.
    pub fn begin(&self, session: Option<&str>) -> SearchTicket {
        self.begin_at(session, Instant::now())
    }

    fn begin_at(&self, session: Option<&str>, now: Instant) -> SearchTicket {
        let Some(session) = session.map(str::trim).filter(|s| !s.is_empty()) else {
            return SearchTicket {
                generation: 0,
                counter: None,
            };
        };

        if !self.sessions.contains_key(session) && self.sessions.len() >= self.max_sessions {
            self.prune(now);
        }

        let counter = {
            let mut entry = self
                .sessions
                .entry(session.to_string())
                .or_insert_with(|| Session {
                    counter: Arc::new(AtomicU64::new(0)),
                    last_used: now,
                });
            entry.last_used = now;
            entry.counter.clone()
        };
        let generation = counter.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(session = %session, generation, "Search started");

        SearchTicket {
            generation,
            counter: Some(counter),
        }
    }

    /// Drop idle sessions. If the table is still full, evict the least
    /// recently used half.
    fn prune(&self, now: Instant) {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| now.saturating_duration_since(s.last_used) < self.idle_ttl);

        if self.sessions.len() >= self.max_sessions {
            let mut by_age: Vec<(String, Instant)> = self
                .sessions
                .iter()
                .map(|entry| (entry.key().clone(), entry.value().last_used))
                .collect();
            by_age.sort_by_key(|(_, last_used)| *last_used);
            let excess = by_age.len() - self.max_sessions / 2;
            for (key, _) in by_age.into_iter().take(excess) {
                self.sessions.remove(&key);
            }
        }

        tracing::debug!(
            before,
            after = self.sessions.len(),
            "Pruned search sessions"
        );
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl SearchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        match &self.counter {
            Some(counter) => counter.load(Ordering::SeqCst) == self.generation,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_search_supersedes_older() {
        let generations = SearchGenerations::new();
        let first = generations.begin(Some("tab-1"));
        let second = generations.begin(Some("tab-1"));

        assert_eq!(first.generation(), 1);
        assert_eq!(second.generation(), 2);
        assert!(!first.is_current());
        assert!(second.is_current());
    }

    #[test]
    fn test_sessions_are_independent() {
        let generations = SearchGenerations::new();
        let a = generations.begin(Some("tab-1"));
        let b = generations.begin(Some("tab-2"));

        assert!(a.is_current());
        assert!(b.is_current());
        assert_eq!(generations.session_count(), 2);
    }

    #[test]
    fn test_anonymous_searches_are_always_current() {
        let generations = SearchGenerations::new();
        let first = generations.begin(None);
        let _second = generations.begin(Some("  "));

        assert!(first.is_current());
        assert_eq!(generations.session_count(), 0);
    }

    #[test]
    fn test_idle_sessions_are_dropped_when_full() {
        let generations = SearchGenerations::with_limits(Duration::from_secs(60), 3);
        let start = Instant::now();
        for session in ["a", "b", "c"] {
            generations.begin_at(Some(session), start);
        }
        assert_eq!(generations.session_count(), 3);

        // A known session never triggers pruning.
        generations.begin_at(Some("a"), start + Duration::from_secs(120));
        assert_eq!(generations.session_count(), 3);

        generations.begin_at(Some("d"), start + Duration::from_secs(150));
        assert_eq!(generations.session_count(), 2);
        assert_eq!(generations.begin(Some("a")).generation(), 3);
        assert_eq!(generations.begin(Some("b")).generation(), 1);
    }

    #[test]
    fn test_least_recently_used_sessions_are_evicted() {
        let generations = SearchGenerations::with_limits(Duration::from_secs(3600), 4);
        let start = Instant::now();
        for (offset, session) in ["a", "b", "c", "d"].into_iter().enumerate() {
            generations.begin_at(Some(session), start + Duration::from_secs(offset as u64));
        }

        let ticket = generations.begin_at(Some("e"), start + Duration::from_secs(10));
        assert!(ticket.is_current());
        assert_eq!(generations.session_count(), 3);
        assert_eq!(
            generations
                .begin_at(Some("d"), start + Duration::from_secs(11))
                .generation(),
            2
        );
        assert_eq!(
            generations
                .begin_at(Some("a"), start + Duration::from_secs(12))
                .generation(),
            1
        );
    }

    #[test]
    fn test_distinct_session_ids_stay_bounded() {
        let generations = SearchGenerations::new();
        for i in 0..100_000 {
            generations.begin(Some(&format!("s-{}", i)));
        }
        assert!(generations.session_count() <= DEFAULT_MAX_SESSIONS);
    }
}
