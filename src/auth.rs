//! Debounced handling of expired sessions.
//!
//! Every failed attempt is shown to the [`AuthExpiryDebouncer`] before the retry decision. A 401
//! opens a suppression window and fires the re-authentication trigger once; further 401s inside
//! the window are dropped (not queued, not replayed). The window closes on its own once the
//! configured duration has elapsed on the injected [`Clock`].
//!
//! ```text
//! Idle ──401──▶ Active ──window elapsed──▶ Idle
//!                 │ ▲
//!                 └─┘ 401 (no-op)
//! ```
//!
//! The window is a single atomic timestamp. Opening it is a compare-and-swap, so under any
//! number of concurrent 401s exactly one observer wins and runs the trigger.

use crate::clock::{Clock, MonotonicClock};
use crate::error::{RequestError, UNAUTHORIZED};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default suppression window.
pub const DEFAULT_AUTH_WINDOW: Duration = Duration::from_secs(3);

const IDLE: u64 = u64::MAX;

type ReauthTrigger = Arc<dyn Fn() + Send + Sync>;

/// State of the suppression window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// The next 401 fires the trigger.
    Idle,
    /// 401s are dropped until the window elapses.
    Active,
}

/// What [`AuthExpiryDebouncer::observe`] did with a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthObservation {
    /// Not an unauthorized failure.
    Ignored,
    /// Opened a window and fired the trigger.
    Triggered,
    /// A window was already open; nothing happened.
    Suppressed,
}

struct DebounceInner {
    opened_at_millis: AtomicU64,
    window_millis: u64,
    clock: Arc<dyn Clock>,
    trigger: ReauthTrigger,
}

/// Process-wide single-flight suppression of re-authentication triggers.
///
/// Clones share the same window, so one debouncer can be handed to several clients.
#[derive(Clone)]
pub struct AuthExpiryDebouncer {
    inner: Arc<DebounceInner>,
}

impl std::fmt::Debug for AuthExpiryDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthExpiryDebouncer")
            .field("window_millis", &self.inner.window_millis)
            .field("state", &self.state())
            .field("clock", &self.inner.clock)
            .field("trigger", &"<trigger>")
            .finish()
    }
}

impl Default for AuthExpiryDebouncer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AuthExpiryDebouncer {
    pub fn builder() -> AuthExpiryDebouncerBuilder {
        AuthExpiryDebouncerBuilder::new()
    }

    /// Length of the suppression window.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.inner.window_millis)
    }

    /// Observe a failed attempt. Never alters the failure.
    pub fn observe(&self, failure: &RequestError) -> AuthObservation {
        match failure.status() {
            Some(status) => self.observe_status(status),
            None => AuthObservation::Ignored,
        }
    }

    /// Observe a response status directly.
    pub fn observe_status(&self, status: u16) -> AuthObservation {
        if status != UNAUTHORIZED {
            return AuthObservation::Ignored;
        }

        let now = self.inner.clock.now_millis().min(IDLE - 1);
        let mut opened = self.inner.opened_at_millis.load(Ordering::Acquire);
        loop {
            if opened != IDLE && now.saturating_sub(opened) < self.inner.window_millis {
                debug!(
                    target: "tollgate::auth",
                    remaining_ms = self.inner.window_millis - now.saturating_sub(opened),
                    "auth expiry suppressed; window active"
                );
                return AuthObservation::Suppressed;
            }
            match self.inner.opened_at_millis.compare_exchange(
                opened,
                now,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(current) => opened = current,
            }
        }

        info!(
            target: "tollgate::auth",
            window_ms = self.inner.window_millis,
            "auth expiry observed; triggering re-authentication"
        );
        (self.inner.trigger)();
        AuthObservation::Triggered
    }

    /// Current window state.
    pub fn state(&self) -> DebounceState {
        let opened = self.inner.opened_at_millis.load(Ordering::Acquire);
        if opened == IDLE {
            return DebounceState::Idle;
        }
        let now = self.inner.clock.now_millis();
        if now.saturating_sub(opened) < self.inner.window_millis {
            DebounceState::Active
        } else {
            DebounceState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == DebounceState::Active
    }
}

/// Builder for [`AuthExpiryDebouncer`].
pub struct AuthExpiryDebouncerBuilder {
    window: Duration,
    clock: Arc<dyn Clock>,
    trigger: ReauthTrigger,
}

impl AuthExpiryDebouncerBuilder {
    /// Defaults: 3 second window, monotonic clock, a trigger that logs a warning.
    pub fn new() -> Self {
        Self {
            window: DEFAULT_AUTH_WINDOW,
            clock: Arc::new(MonotonicClock::default()),
            trigger: Arc::new(|| {
                warn!(target: "tollgate::auth", "session expired; re-authentication requested");
            }),
        }
    }

    /// Set the suppression window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Override the clock (useful for deterministic tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Action run once per window, e.g. kicking off a token refresh.
    pub fn on_reauth<F>(mut self, trigger: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.trigger = Arc::new(trigger);
        self
    }

    /// Finish the debouncer. A zero window is clamped to 1ms here; `ClientConfig::validate`
    /// rejects a zero `auth_window_ms` before it gets this far.
    pub fn build(self) -> AuthExpiryDebouncer {
        let window_millis = u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX).max(1);
        AuthExpiryDebouncer {
            inner: Arc::new(DebounceInner {
                opened_at_millis: AtomicU64::new(IDLE),
                window_millis,
                clock: self.clock,
                trigger: self.trigger,
            }),
        }
    }
}

impl Default for AuthExpiryDebouncerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
