// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The callback + queue pattern (spec.md §5, §9): every asynchronous
//! operation completes by posting a closure to a caller-supplied
//! [`Executor`] rather than by returning a bare future. Modeling the target
//! queue as an interface — not a language-builtin future/task handle — keeps
//! the repository manager and plugin runner able to honor a caller's
//! threading discipline (e.g. "finish on the UI thread") without depending
//! on any one executor's concrete type.

use std::future::Future;
use std::pin::Pin;

use tokio::runtime::Handle;

/// A target for posting completions to. `post` takes ownership of a boxed
/// closure and is responsible for eventually running it; it does not return
/// a future itself, so callers never have to choose between awaiting the
/// operation and awaiting its delivery.
pub trait Executor: Send + Sync {
    fn post(&self, job: Box<dyn FnOnce() + Send>);
}

/// An [`Executor`] that posts onto the ambient tokio runtime via
/// `spawn_blocking`-free `spawn`, the way `moss::runtime` hands work to the
/// active `Handle`. Suitable as the default executor for library callers
/// that don't need a specific dispatch thread.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn current() -> Self {
        Self::new(Handle::current())
    }
}

impl Executor for TokioExecutor {
    fn post(&self, job: Box<dyn FnOnce() + Send>) {
        self.handle.spawn_blocking(job);
    }
}

/// An [`Executor`] that runs its job inline, synchronously, as soon as it's
/// posted. Used by the synchronous test-convenience wrappers the spec
/// requires to delegate to the async path (spec.md §5 "Suspension points").
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateExecutor;

impl Executor for ImmediateExecutor {
    fn post(&self, job: Box<dyn FnOnce() + Send>) {
        job();
    }
}

/// Run `future` to completion and post its result to `executor`, bridging an
/// async producer to the callback-based public API.
pub async fn complete_on<T, E>(
    future: Pin<Box<dyn Future<Output = T> + Send>>,
    executor: &E,
    completion: impl FnOnce(T) + Send + 'static,
) where
    T: Send + 'static,
    E: Executor + ?Sized,
{
    let result = future.await;
    executor.post(Box::new(move || completion(result)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn immediate_executor_runs_job_synchronously() {
        let ran = Arc::new(AtomicBool::new(false));
        let ran_clone = ran.clone();
        ImmediateExecutor.post(Box::new(move || ran_clone.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn tokio_executor_posts_to_the_runtime() {
        let executor = TokioExecutor::current();
        let (tx, rx) = tokio::sync::oneshot::channel();
        executor.post(Box::new(move || {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn complete_on_delivers_future_output() {
        let executor = TokioExecutor::current();
        let (tx, rx) = tokio::sync::oneshot::channel();
        complete_on(Box::pin(async { 7 }), &executor, move |value| {
            let _ = tx.send(value);
        })
        .await;
        assert_eq!(rx.await.unwrap(), 7);
    }
}
