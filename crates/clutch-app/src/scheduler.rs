// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Once { deadline: Instant },
    Every { next: Instant, period: Duration },
}

impl Timer {
    fn due_at(self) -> Instant {
        match self {
            Self::Once { deadline } => deadline,
            Self::Every { next, .. } => next,
        }
    }
}

/// Named timers driven by an externally supplied clock. Keys identify the
/// task; the owner decides what running a key means.
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    timers: HashMap<K, Timer>,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Self {
            timers: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Scheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trailing-edge debounce: `key` fires once, `delay` after the most recent
    /// call. Each call resets the deadline. Returns false and leaves the timer
    /// alone when `key` is periodic.
    pub fn debounce(&mut self, key: K, delay: Duration, now: Instant) -> bool {
        if let Some(Timer::Every { .. }) = self.timers.get(&key) {
            return false;
        }
        self.timers.insert(
            key,
            Timer::Once {
                deadline: now + delay,
            },
        );
        true
    }

    /// Runs `key` at `now` and then every `period`. Returns false when the key
    /// is already scheduled; cancel first to change the period.
    pub fn schedule_periodic(&mut self, key: K, period: Duration, now: Instant) -> bool {
        if self.timers.contains_key(&key) {
            return false;
        }
        self.timers.insert(key, Timer::Every { next: now, period });
        true
    }

    pub fn cancel(&mut self, key: K) -> bool {
        self.timers.remove(&key).is_some()
    }

    pub fn cancel_periodic(&mut self, key: K) -> bool {
        match self.timers.get(&key) {
            Some(Timer::Every { .. }) => self.timers.remove(&key).is_some(),
            _ => false,
        }
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_scheduled(&self, key: K) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|timer| timer.due_at()).min()
    }

    /// Keys whose time has come, earliest first. One-shot timers are removed;
    /// periodic timers move to their next tick after `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, K)> = Vec::new();
        self.timers.retain(|key, timer| match timer {
            Timer::Once { deadline } => {
                if *deadline <= now {
                    due.push((*deadline, *key));
                    false
                } else {
                    true
                }
            }
            Timer::Every { next, period } => {
                if *next <= now {
                    due.push((*next, *key));
                    *next = now + *period;
                }
                true
            }
        });
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, key)| key).collect()
    }
}
