//! Fixed-point render loop
//!
//! Re-invokes a render function as long as any participant contributed a
//! pending settle future during the pass, bounded by a single whole-operation
//! timeout. Only a pass with zero pending rerenders produces the final
//! output; earlier outputs are discarded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use std::future::Future;
use tracing::{debug, warn};

use crate::hub::types::HubError;

type SettleFuture = BoxFuture<'static, Result<(), HubError>>;

/// Resets the session when the render call resolves, rejects, or is
/// cancelled by dropping its future.
struct SessionGuard<'a> {
    session: &'a Mutex<RenderSession>,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock().unwrap_or_else(PoisonError::into_inner);
        *session = RenderSession::default();
    }
}

/// Ephemeral per-render-call state
#[derive(Default)]
struct RenderSession {
    /// A render_until_completed call is in flight
    active: bool,
    /// The render function is currently executing
    in_pass: bool,
    /// Render pass counter for diagnostics
    pass: u64,
    /// Settle futures contributed during the current pass
    pending: Vec<SettleFuture>,
}

/// Drives render passes until output stabilizes
///
/// Share via `Arc` so capability instances handed to participants can call
/// [`rerender_after`](Self::rerender_after) during a pass. One orchestrator
/// serves one render operation at a time.
pub struct RenderOrchestrator {
    timeout: Option<Duration>,
    warned_unbounded: AtomicBool,
    session: Mutex<RenderSession>,
}

impl RenderOrchestrator {
    /// Orchestrator without a timeout; the operation may run unbounded.
    pub fn new() -> Self {
        Self {
            timeout: None,
            warned_unbounded: AtomicBool::new(false),
            session: Mutex::new(RenderSession::default()),
        }
    }

    /// Orchestrator whose whole multi-pass operation is bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new()
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Contribute a settle future to the current render pass.
    ///
    /// Only meaningful while the render function is executing; a call outside
    /// an active pass is dropped with a warning. All contributions of a pass
    /// are honored, in any order.
    pub fn rerender_after<F>(&self, settle: F)
    where
        F: Future<Output = Result<(), HubError>> + Send + 'static,
    {
        let mut session = self.lock_session();
        if !session.in_pass {
            warn!("rerender_after called outside an active render pass, ignoring");
            return;
        }
        session.pending.push(settle.boxed());
    }

    /// Invoke `render_fn` repeatedly until a pass contributes no pending
    /// settle futures, then resolve with that pass's output.
    ///
    /// A synchronous error from `render_fn` or a failing settle future is
    /// fatal to the whole operation, fail-fast and without retry. When a
    /// timeout is configured it races the entire multi-pass operation; on
    /// elapse, in-flight settle futures are abandoned, not aborted.
    pub async fn render_until_completed<F>(&self, render_fn: F) -> Result<String, HubError>
    where
        F: FnMut() -> Result<String, HubError>,
    {
        {
            let mut session = self.lock_session();
            if session.active {
                return Err(HubError::RenderInProgress);
            }
            *session = RenderSession {
                active: true,
                ..RenderSession::default()
            };
        }
        // The session must also be released when the caller drops this
        // future mid-await
        let _guard = SessionGuard {
            session: &self.session,
        };

        if self.timeout.is_none() && !self.warned_unbounded.swap(true, Ordering::Relaxed) {
            warn!("No render timeout configured, render operations may wait indefinitely");
        }

        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, self.render_loop(render_fn)).await {
                Ok(result) => result,
                Err(_) => Err(HubError::RenderTimeout(limit)),
            },
            None => self.render_loop(render_fn).await,
        }
    }

    async fn render_loop<F>(&self, mut render_fn: F) -> Result<String, HubError>
    where
        F: FnMut() -> Result<String, HubError>,
    {
        loop {
            let pass = {
                let mut session = self.lock_session();
                session.pass += 1;
                session.in_pass = true;
                session.pass
            };
            debug!("Starting render pass {}", pass);

            // The session lock is not held across the render function so
            // participants can contribute via rerender_after
            let output = render_fn();

            let pending = {
                let mut session = self.lock_session();
                session.in_pass = false;
                std::mem::take(&mut session.pending)
            };

            let output = output?;

            if pending.is_empty() {
                debug!("Render settled after {} passes", pass);
                return Ok(output);
            }

            debug!(
                "Render pass {} contributed {} pending rerenders, settling",
                pass,
                pending.len()
            );
            try_join_all(pending).await?;
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, RenderSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RenderOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}
