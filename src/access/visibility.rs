//! Non-redirecting guard and role queries.

use std::fmt;

use crate::access::role::Role;
use crate::access::session::SessionSnapshot;

/// Inline notice shown in place of content the viewer may not see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionNotice {
    pub allowed_roles: Vec<Role>,
}

impl fmt::Display for PermissionNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles: Vec<&str> = self.allowed_roles.iter().map(|role| role.as_str()).collect();
        write!(
            f,
            "You don't have permission to view this content. Required roles: {}",
            roles.join(", ")
        )
    }
}

/// What to show in place of the guarded content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<T> {
    Nothing,
    Content(T),
    Fallback(T),
    Denied(PermissionNotice),
}

/// Shows content only to members of an explicit role set.
///
/// Membership is exact: listing `Admin` does not admit `SuperAdmin`.
#[derive(Debug, Clone)]
pub struct VisibilityGuard {
    allowed_roles: Vec<Role>,
    show_error: bool,
}

impl VisibilityGuard {
    pub fn new(allowed_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed_roles: allowed_roles.into_iter().collect(),
            show_error: true,
        }
    }

    /// Whether to show a [`PermissionNotice`] when no fallback is given.
    pub fn show_error(mut self, show: bool) -> Self {
        self.show_error = show;
        self
    }

    pub fn allowed_roles(&self) -> &[Role] {
        &self.allowed_roles
    }

    pub fn render<T>(&self, session: &SessionSnapshot, content: T, fallback: Option<T>) -> Rendered<T> {
        if session.loading {
            return Rendered::Nothing;
        }

        let Some(profile) = session.profile.as_ref() else {
            return Rendered::Nothing;
        };

        let permitted = profile
            .role
            .is_some_and(|role| self.allowed_roles.contains(&role));

        if permitted {
            return Rendered::Content(content);
        }

        match fallback {
            Some(fallback) => Rendered::Fallback(fallback),
            None if self.show_error => Rendered::Denied(PermissionNotice {
                allowed_roles: self.allowed_roles.clone(),
            }),
            None => Rendered::Nothing,
        }
    }
}

/// Derived role checks over a session snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleView {
    role: Option<Role>,
}

impl RoleView {
    pub fn of(session: &SessionSnapshot) -> Self {
        Self {
            role: session.role(),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.role == Some(role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        self.role.is_some_and(|role| roles.contains(&role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_any_role(&[Role::Admin, Role::SuperAdmin])
    }

    pub fn is_super_admin(&self) -> bool {
        self.has_role(Role::SuperAdmin)
    }

    pub fn is_instructor(&self) -> bool {
        self.has_role(Role::Instructor) || self.is_admin()
    }
}
