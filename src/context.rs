//! Request-scoped correlation id.
//!
//! One id per unit of work. The scope is a tokio task-local (or a
//! synchronous scope for blocking code), so concurrently running requests
//! never observe each other's id and nothing outlives the scope.

use std::cell::RefCell;
use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static REQUEST_ID: RefCell<Option<String>>;
}

/// Longest correlation id accepted from callers or inbound headers.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Access to the correlation id of the active unit of work.
pub struct CorrelationContext;

impl CorrelationContext {
    /// Id established for the active scope, if any.
    pub fn current() -> Option<String> {
        REQUEST_ID
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    /// Resolve the id to use: a valid `explicit` id wins, then the scope's
    /// id, then a freshly generated one which becomes the scope's id.
    ///
    /// Outside any scope the generated id is returned but not remembered.
    pub fn ensure(explicit: Option<&str>) -> String {
        if let Some(id) = explicit.and_then(Self::normalize) {
            return id;
        }
        if let Some(id) = Self::current() {
            return id;
        }
        let id = Self::generate();
        let _ = REQUEST_ID.try_with(|cell| {
            *cell.borrow_mut() = Some(id.clone());
        });
        id
    }

    /// Run `fut` with its own correlation scope. An invalid or missing `id`
    /// leaves the scope empty until the first [`ensure`](Self::ensure).
    pub async fn scope<F>(id: Option<String>, fut: F) -> F::Output
    where
        F: Future,
    {
        let id = id.as_deref().and_then(Self::normalize);
        REQUEST_ID.scope(RefCell::new(id), fut).await
    }

    /// Synchronous counterpart of [`scope`](Self::scope) for blocking code.
    pub fn sync_scope<R>(id: Option<String>, f: impl FnOnce() -> R) -> R {
        let id = id.as_deref().and_then(Self::normalize);
        REQUEST_ID.sync_scope(RefCell::new(id), f)
    }

    /// Trimmed id, or `None` if empty, oversized, or not printable ASCII.
    pub fn normalize(id: &str) -> Option<String> {
        let id = id.trim();
        let valid = !id.is_empty()
            && id.len() <= MAX_REQUEST_ID_LEN
            && id.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| id.to_string())
    }

    pub fn generate() -> String {
        Uuid::new_v4().to_string()
    }
}
