//! Redirecting guard for protected pages.
//!
//! Blocks a page until the session is known, then either lets it through or
//! sends the visitor elsewhere with a notice.

use crate::access::role::{level_of, Role};
use crate::access::session::SessionSnapshot;

pub const DEFAULT_SIGN_IN_PATH: &str = "/auth/signin";
pub const DEFAULT_UNAUTHORIZED_PATH: &str = "/unauthorized";

pub const SIGN_IN_NOTICE: &str = "Please sign in to access this page";
pub const FORBIDDEN_NOTICE: &str = "You don't have permission to access this page";

/// Client-side navigation.
pub trait Navigator {
    fn navigate(&self, path: &str);
}

/// Transient user-visible notices.
pub trait Notifier {
    fn error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Unauthenticated,
    InsufficientRole {
        required: Role,
        actual: Option<Role>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub reason: DenyReason,
    pub redirect_to: String,
    pub notice: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session still loading; show a placeholder.
    Pending,
    Denied(Denial),
    Allowed,
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allowed)
    }
}

#[derive(Debug, Clone)]
pub struct RedirectGuard {
    required_role: Option<Role>,
    sign_in_path: String,
    unauthorized_path: String,
    last_seen: Option<SessionSnapshot>,
}

impl Default for RedirectGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl RedirectGuard {
    /// Guard that only requires a signed-in user.
    pub fn new() -> Self {
        Self {
            required_role: None,
            sign_in_path: DEFAULT_SIGN_IN_PATH.to_string(),
            unauthorized_path: DEFAULT_UNAUTHORIZED_PATH.to_string(),
            last_seen: None,
        }
    }

    pub fn require_role(mut self, role: Role) -> Self {
        self.required_role = Some(role);
        self
    }

    pub fn sign_in_path(mut self, path: impl Into<String>) -> Self {
        self.sign_in_path = path.into();
        self
    }

    pub fn unauthorized_path(mut self, path: impl Into<String>) -> Self {
        self.unauthorized_path = path.into();
        self
    }

    /// Pure decision for `session`, no side effects.
    pub fn evaluate(&self, session: &SessionSnapshot) -> GuardDecision {
        if session.loading {
            return GuardDecision::Pending;
        }

        if !session.is_authenticated() {
            return GuardDecision::Denied(Denial {
                reason: DenyReason::Unauthenticated,
                redirect_to: self.sign_in_path.clone(),
                notice: SIGN_IN_NOTICE,
            });
        }

        if let Some(required) = self.required_role {
            let actual = session.role();

            // An exact match passes outright; otherwise only a lower level fails.
            if actual != Some(required) && level_of(actual) < required.level() {
                return GuardDecision::Denied(Denial {
                    reason: DenyReason::InsufficientRole { required, actual },
                    redirect_to: self.unauthorized_path.clone(),
                    notice: FORBIDDEN_NOTICE,
                });
            }
        }

        GuardDecision::Allowed
    }

    /// Evaluates `session` and performs the redirect for a denial.
    ///
    /// Effects run once per distinct snapshot: re-evaluating an unchanged
    /// session returns the same decision without notifying or navigating
    /// again.
    pub fn enforce<N, T>(
        &mut self,
        session: &SessionSnapshot,
        navigator: &N,
        notifier: &T,
    ) -> GuardDecision
    where
        N: Navigator + ?Sized,
        T: Notifier + ?Sized,
    {
        let decision = self.evaluate(session);

        if self.last_seen.as_ref() == Some(session) {
            return decision;
        }
        self.last_seen = Some(session.clone());

        if let GuardDecision::Denied(denial) = &decision {
            tracing::debug!(
                reason = ?denial.reason,
                redirect_to = %denial.redirect_to,
                "Access denied, redirecting"
            );
            notifier.error(denial.notice);
            navigator.navigate(&denial.redirect_to);
        }

        decision
    }
}
