//! External services the engine consults: audit logging, permission checks
//! and rate limiting.
//!
//! Each collaborator is injected explicitly. When one is absent the engine
//! runs permissively: nothing is audited, every permission is granted and no
//! actor is throttled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use stockforge_auth::{AuthzError, Permission, Principal, authorize, explain_authorization};
use stockforge_core::UserId;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Rejected(String),
}

/// One activity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor: UserId,
    /// Order number, ASN number or inventory id the action was about.
    pub subject: String,
    pub outcome: AuditOutcome,
    pub at: DateTime<Utc>,
}

/// Fire-and-forget activity logger.
pub trait AuditLogger: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Writes audit events as structured `tracing` events under target `audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditLogger;

impl AuditLogger for TracingAuditLogger {
    fn record(&self, event: AuditEvent) {
        match &event.outcome {
            AuditOutcome::Success => info!(
                target: "audit",
                action = %event.action,
                actor = %event.actor,
                subject = %event.subject,
                "action succeeded"
            ),
            AuditOutcome::Rejected(reason) => info!(
                target: "audit",
                action = %event.action,
                actor = %event.actor,
                subject = %event.subject,
                reason = %reason,
                "action rejected"
            ),
        }
    }
}

/// Keeps audit events in memory (tests, diagnostics).
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditLogger for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Role-based permission check.
pub trait PermissionChecker: Send + Sync {
    fn check(&self, principal: &Principal, permission: &Permission) -> Result<(), AuthzError>;
}

/// Checks permissions against the principal's roles and direct grants.
#[derive(Debug, Default, Clone, Copy)]
pub struct RbacPermissionChecker;

impl PermissionChecker for RbacPermissionChecker {
    fn check(&self, principal: &Principal, permission: &Permission) -> Result<(), AuthzError> {
        authorize(principal, permission).inspect_err(|_| {
            let explanation = explain_authorization(principal, permission);
            debug!(
                principal = %principal.principal_id,
                permission = %permission,
                granting_roles = ?explanation.granting_roles,
                "permission denied"
            );
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limiter unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

/// Bounds how often an actor may invoke an action.
pub trait RateLimiter: Send + Sync {
    fn check(&self, actor: UserId, action: &str) -> Result<RateDecision, RateLimitError>;
}

/// What to do when the rate limiter itself fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitPolicy {
    #[default]
    FailOpen,
    FailClosed,
}

impl core::str::FromStr for RateLimitPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail_open" | "open" => Ok(RateLimitPolicy::FailOpen),
            "fail_closed" | "closed" => Ok(RateLimitPolicy::FailClosed),
            other => Err(format!(
                "unknown rate limit policy '{other}' (expected fail_open or fail_closed)"
            )),
        }
    }
}

/// Fixed-window counter per (actor, action). Lapsed windows are dropped on
/// every check.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<(UserId, String), (Instant, u32)>>,
}

impl FixedWindowRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn open_windows(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check(&self, actor: UserId, action: &str) -> Result<RateDecision, RateLimitError> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| RateLimitError::Unavailable("lock poisoned".to_string()))?;

        let now = Instant::now();
        windows.retain(|_, (started, _)| now.duration_since(*started) < self.window);
        let slot = windows
            .entry((actor, action.to_string()))
            .or_insert((now, 0));

        if slot.1 >= self.max_per_window {
            let retry_after = self.window.saturating_sub(now.duration_since(slot.0));
            return Ok(RateDecision::Limited { retry_after });
        }

        slot.1 += 1;
        Ok(RateDecision::Allowed)
    }
}

/// The set of collaborators handed to the engine.
#[derive(Clone, Default)]
pub struct Collaborators {
    audit: Option<Arc<dyn AuditLogger>>,
    permissions: Option<Arc<dyn PermissionChecker>>,
    rate_limiter: Option<Arc<dyn RateLimiter>>,
    rate_limit_policy: RateLimitPolicy,
}

impl core::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collaborators")
            .field("audit", &self.audit.is_some())
            .field("permissions", &self.permissions.is_some())
            .field("rate_limiter", &self.rate_limiter.is_some())
            .field("rate_limit_policy", &self.rate_limit_policy)
            .finish()
    }
}

impl Collaborators {
    /// No collaborators: permissive.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_permissions(mut self, checker: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = Some(checker);
        self
    }

    pub fn with_rate_limiter(
        mut self,
        limiter: Arc<dyn RateLimiter>,
        policy: RateLimitPolicy,
    ) -> Self {
        self.rate_limiter = Some(limiter);
        self.rate_limit_policy = policy;
        self
    }

    pub fn authorize(
        &self,
        principal: &Principal,
        permission: &Permission,
    ) -> Result<(), EngineError> {
        match &self.permissions {
            Some(checker) => checker.check(principal, permission).map_err(EngineError::from),
            None => Ok(()),
        }
    }

    /// Consult the rate limiter for `action`. The system principal is never throttled.
    pub fn throttle(&self, principal: &Principal, action: &str) -> Result<(), EngineError> {
        let Some(limiter) = &self.rate_limiter else {
            return Ok(());
        };
        if principal.principal_id.is_system() {
            return Ok(());
        }

        match limiter.check(principal.principal_id, action) {
            Ok(RateDecision::Allowed) => Ok(()),
            Ok(RateDecision::Limited { retry_after }) => Err(EngineError::RateLimited(format!(
                "{action} limit reached, retry in {}s",
                retry_after.as_secs().max(1)
            ))),
            Err(e) => match self.rate_limit_policy {
                RateLimitPolicy::FailOpen => {
                    warn!(error = %e, action, "rate limiter failed; allowing (fail open)");
                    Ok(())
                }
                RateLimitPolicy::FailClosed => {
                    warn!(error = %e, action, "rate limiter failed; rejecting (fail closed)");
                    Err(EngineError::RateLimited(format!("{action} temporarily unavailable")))
                }
            },
        }
    }

    pub fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event);
        }
    }
}
