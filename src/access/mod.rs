//! Role-based access guards.
//!
//! Two independent checks over a [`SessionSnapshot`]:
//!
//! - [`RedirectGuard`] gates whole pages. It waits while the session loads,
//!   then allows, or denies with a notice and a navigation target. The role
//!   check is hierarchical.
//! - [`VisibilityGuard`] gates fragments. It never navigates and matches
//!   roles by exact set membership.
//!
//! Rendering is left to the caller; both guards return plain decisions.

pub mod redirect;
pub mod role;
pub mod session;
pub mod visibility;

pub use redirect::{Denial, DenyReason, GuardDecision, Navigator, Notifier, RedirectGuard};
pub use role::{level_of, Role, UnknownRole};
pub use session::{Identity, Profile, SessionSnapshot};
pub use visibility::{PermissionNotice, Rendered, RoleView, VisibilityGuard};
