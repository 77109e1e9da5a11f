use campus_edge::access::{
    Identity, PermissionNotice, Profile, Rendered, Role, RoleView, SessionSnapshot,
    VisibilityGuard,
};

fn signed_in_as(role: Role) -> SessionSnapshot {
    SessionSnapshot::signed_in(
        Identity {
            id: "user-7".to_string(),
            email: None,
        },
        Some(Profile::with_role(role)),
    )
}

fn staff_only() -> VisibilityGuard {
    VisibilityGuard::new([Role::Instructor, Role::Admin])
}

#[test]
fn test_member_sees_content() {
    let rendered = staff_only().render(&signed_in_as(Role::Instructor), "grades", Some("fallback"));
    assert_eq!(rendered, Rendered::Content("grades"));
}

#[test]
fn test_non_member_gets_fallback_when_given() {
    let rendered = staff_only().render(&signed_in_as(Role::Student), "grades", Some("upgrade"));
    assert_eq!(rendered, Rendered::Fallback("upgrade"));
}

#[test]
fn test_non_member_gets_notice_listing_roles() {
    let rendered = staff_only().render(&signed_in_as(Role::Student), "grades", None);

    let notice = match rendered {
        Rendered::Denied(notice) => notice,
        other => panic!("expected a permission notice, got {:?}", other),
    };
    assert_eq!(notice.allowed_roles, vec![Role::Instructor, Role::Admin]);
    assert_eq!(
        notice.to_string(),
        "You don't have permission to view this content. Required roles: instructor, admin"
    );
}

#[test]
fn test_non_member_sees_nothing_when_errors_hidden() {
    let rendered = staff_only()
        .show_error(false)
        .render(&signed_in_as(Role::Student), "grades", None);
    assert_eq!(rendered, Rendered::Nothing);
}

#[test]
fn test_membership_is_exact_not_hierarchical() {
    let rendered = staff_only().render(&signed_in_as(Role::SuperAdmin), "grades", None);
    assert!(matches!(rendered, Rendered::Denied(PermissionNotice { .. })));
}

#[test]
fn test_loading_or_missing_profile_renders_nothing() {
    let mut loading = signed_in_as(Role::Admin);
    loading.loading = true;

    let no_profile = SessionSnapshot::signed_in(
        Identity {
            id: "user-8".to_string(),
            email: None,
        },
        None,
    );

    for session in [loading, no_profile, SessionSnapshot::signed_out()] {
        assert_eq!(
            staff_only().render(&session, "grades", Some("fallback")),
            Rendered::Nothing
        );
    }
}

#[test]
fn test_unknown_role_from_profile_json_is_not_a_member() {
    let profile: Profile = serde_json::from_str(r#"{"role":"teaching_assistant"}"#).unwrap();
    assert_eq!(profile.role, None);

    let session = SessionSnapshot::signed_in(
        Identity {
            id: "user-9".to_string(),
            email: None,
        },
        Some(profile),
    );

    assert_eq!(
        staff_only().render(&session, "grades", Some("fallback")),
        Rendered::Fallback("fallback")
    );
}

#[test]
fn test_is_instructor() {
    assert!(!RoleView::of(&signed_in_as(Role::Student)).is_instructor());
    assert!(RoleView::of(&signed_in_as(Role::Instructor)).is_instructor());
    assert!(RoleView::of(&signed_in_as(Role::Admin)).is_instructor());
    assert!(RoleView::of(&signed_in_as(Role::SuperAdmin)).is_instructor());
    assert!(!RoleView::of(&SessionSnapshot::signed_out()).is_instructor());
}

#[test]
fn test_admin_queries() {
    let admin = RoleView::of(&signed_in_as(Role::Admin));
    let super_admin = RoleView::of(&signed_in_as(Role::SuperAdmin));
    let instructor = RoleView::of(&signed_in_as(Role::Instructor));

    assert!(admin.is_admin());
    assert!(!admin.is_super_admin());
    assert!(super_admin.is_admin());
    assert!(super_admin.is_super_admin());
    assert!(!instructor.is_admin());
}

#[test]
fn test_role_membership_queries() {
    let view = RoleView::of(&signed_in_as(Role::Instructor));

    assert_eq!(view.role(), Some(Role::Instructor));
    assert!(view.has_role(Role::Instructor));
    assert!(!view.has_role(Role::Admin));
    assert!(view.has_any_role(&[Role::Student, Role::Instructor]));
    assert!(!view.has_any_role(&[Role::Admin, Role::SuperAdmin]));
    assert!(!view.has_any_role(&[]));
}
