//! Continuation primitive for chaining asynchronous operations.
//!
//! A [`Promise`] is a boxed future that resolves to `Result<T, E>`. It can be
//! composed with [`then`](Promise::then), [`fail`](Promise::fail) and
//! [`finally`](Promise::finally), or simply `.await`ed. Nothing here blocks a
//! thread: a pending promise parks on the tokio reactor until the I/O it
//! waits for is ready.
//!
//! ```text
//! read_exact ──then──> decode ──then──> dispatch ──fail──> report / tear down
//!                                                 └─finally─> release resources
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::FutureExt;
use futures_util::future::{self, BoxFuture};

/// A deferred outcome of type `T` that may fail with `E`.
///
/// The lifetime `'a` lets a promise borrow the resource it operates on (for
/// example the socket inside a transport); promises handed to the runtime
/// use `'static`.
#[must_use = "promises do nothing unless polled or awaited"]
pub struct Promise<'a, T, E> {
    inner: BoxFuture<'a, Result<T, E>>,
}

impl<'a, T, E> Promise<'a, T, E>
where
    T: Send + 'a,
    E: Send + 'a,
{
    /// Wraps an arbitrary future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// An already resolved promise.
    pub fn resolve(value: T) -> Self {
        Self::new(future::ready(Ok(value)))
    }

    /// An already rejected promise.
    pub fn reject(error: E) -> Self {
        Self::new(future::ready(Err(error)))
    }

    /// Chains `f` after a successful outcome. The promise returned by `f` is
    /// flattened into the result, so chains never nest.
    pub fn then<U, F>(self, f: F) -> Promise<'a, U, E>
    where
        U: Send + 'a,
        F: FnOnce(T) -> Promise<'a, U, E> + Send + 'a,
    {
        Promise::new(async move {
            match self.inner.await {
                Ok(value) => f(value).await,
                Err(e) => Err(e),
            }
        })
    }

    /// Maps a successful value without starting another asynchronous step.
    pub fn map<U, F>(self, f: F) -> Promise<'a, U, E>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        Promise::new(async move { self.inner.await.map(f) })
    }

    /// Runs `f` only when the chain rejects. `f` decides whether to recover
    /// (resolve) or to keep the failure (reject).
    pub fn fail<F>(self, f: F) -> Self
    where
        F: FnOnce(E) -> Promise<'a, T, E> + Send + 'a,
    {
        Promise::new(async move {
            match self.inner.await {
                Ok(value) => Ok(value),
                Err(e) => f(e).await,
            }
        })
    }

    /// Runs `f` once the chain settles, whatever the outcome, and passes the
    /// outcome through unchanged.
    ///
    /// Anything `f` captures lives until the chain completes, which is how
    /// buffers and guards are kept alive across an in-flight operation.
    pub fn finally<F>(self, f: F) -> Self
    where
        F: FnOnce() + Send + 'a,
    {
        Promise::new(async move {
            let outcome = self.inner.await;
            f();
            outcome
        })
    }
}

impl<T, E> Future for Promise<'_, T, E> {
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T, E> std::fmt::Debug for Promise<'_, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_resolve_and_reject() {
        assert_eq!(Promise::<_, ()>::resolve(7).await, Ok(7));
        assert_eq!(Promise::<(), _>::reject("boom").await, Err("boom"));
    }

    #[tokio::test]
    async fn test_then_flattens() {
        let result = Promise::<_, String>::resolve(2)
            .then(|n| Promise::resolve(n * 10))
            .then(|n| Promise::new(async move { Ok(n + 1) }))
            .await;
        assert_eq!(result, Ok(21));
    }

    #[tokio::test]
    async fn test_then_skipped_on_reject() {
        let called = Arc::new(AtomicUsize::new(0));
        let seen = called.clone();
        let result = Promise::<i32, _>::reject("bad")
            .then(move |n| {
                seen.fetch_add(1, Ordering::SeqCst);
                Promise::resolve(n)
            })
            .await;
        assert_eq!(result, Err("bad"));
        assert_eq!(called.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fail_recovers() {
        let result = Promise::<i32, _>::reject("bad")
            .fail(|_| Promise::resolve(0))
            .map(|n| n + 1)
            .await;
        assert_eq!(result, Ok::<_, &str>(1));
    }

    #[tokio::test]
    async fn test_fail_not_called_on_success() {
        let result = Promise::<_, &str>::resolve(5)
            .fail(|_| Promise::resolve(0))
            .await;
        assert_eq!(result, Ok(5));
    }

    #[tokio::test]
    async fn test_finally_runs_on_both_outcomes() {
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let ok = Promise::<_, &str>::resolve(1)
            .finally(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(ok, Ok(1));

        let c = count.clone();
        let err = Promise::<i32, _>::reject("bad")
            .finally(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(err, Err("bad"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_finally_keeps_capture_alive_until_settled() {
        let buffer = Arc::new(vec![1u8, 2, 3]);
        let weak = Arc::downgrade(&buffer);
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let pending = Promise::<_, ()>::new(async move {
            let _ = rx.await;
            Ok(())
        })
        .finally(move || drop(buffer));

        let handle = tokio::spawn(pending);
        tokio::task::yield_now().await;
        assert!(weak.upgrade().is_some());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(weak.upgrade().is_none());
    }
}
