// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Single-flight coalescing for concurrent lookups of the same specifier
//! (spec.md §3.2, §9 "Single-flight without condition variables").
//!
//! First entrant for a key registers a rendezvous [`tokio::sync::watch`]
//! channel in the pending table and proceeds with the real work; later
//! entrants for the same key subscribe to that channel and then re-enter
//! the caller's lookup, which by then finds either a populated state entry
//! or (on failure) an empty one to retry itself. A `watch` channel, unlike
//! `Notify::notify_waiters`, can't lose a wakeup: a follower's `changed()`
//! observes a `send()` that already happened before it started waiting,
//! so there's no window where the winner finishes between a follower's
//! `enter()` and its wait call.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::{watch, Mutex};

pub struct SingleFlight<K> {
    pending: Mutex<HashMap<K, watch::Sender<()>>>,
}

impl<K: Eq + Hash + Clone> Default for SingleFlight<K> {
    fn default() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }
}

pub enum Lease {
    /// This caller is first; it must do the work and call [`SingleFlight::finish`].
    Winner,
    /// Another caller is already in flight; wait on this before retrying.
    Follower(watch::Receiver<()>),
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to become the winner for `key`. Returns [`Lease::Follower`] if
    /// someone else already holds it.
    pub async fn enter(&self, key: K) -> Lease {
        let mut pending = self.pending.lock().await;
        if let Some(sender) = pending.get(&key) {
            Lease::Follower(sender.subscribe())
        } else {
            let (sender, _receiver) = watch::channel(());
            pending.insert(key, sender);
            Lease::Winner
        }
    }

    /// The winner calls this when its work (success or failure) is done,
    /// waking every follower that queued up behind it.
    pub async fn finish(&self, key: &K) {
        let sender = self.pending.lock().await.remove(key);
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}
