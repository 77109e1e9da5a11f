use campus_edge::access::{
    DenyReason, GuardDecision, Identity, Navigator, Notifier, Profile, RedirectGuard, Role,
    SessionSnapshot,
};
use std::cell::RefCell;

#[derive(Default)]
struct RecordingNavigator {
    visits: RefCell<Vec<String>>,
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        self.visits.borrow_mut().push(path.to_string());
    }
}

#[derive(Default)]
struct RecordingNotifier {
    messages: RefCell<Vec<String>>,
}

impl Notifier for RecordingNotifier {
    fn error(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}

fn identity() -> Identity {
    Identity {
        id: "user-1".to_string(),
        email: Some("learner@example.com".to_string()),
    }
}

fn signed_in_as(role: Role) -> SessionSnapshot {
    SessionSnapshot::signed_in(identity(), Some(Profile::with_role(role)))
}

#[test]
fn test_loading_never_navigates() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();

    let mut loading_states = vec![SessionSnapshot::loading()];
    let mut with_user = signed_in_as(Role::Student);
    with_user.loading = true;
    loading_states.push(with_user);

    for session in loading_states {
        let mut guard = RedirectGuard::new().require_role(Role::SuperAdmin);
        assert_eq!(guard.enforce(&session, &nav, &notes), GuardDecision::Pending);
    }

    assert!(nav.visits.borrow().is_empty());
    assert!(notes.messages.borrow().is_empty());
}

#[test]
fn test_unauthenticated_goes_to_default_sign_in_once() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();
    let mut guard = RedirectGuard::new();

    let session = SessionSnapshot::signed_out();
    let decision = guard.enforce(&session, &nav, &notes);
    // re-render with the same inputs
    guard.enforce(&session, &nav, &notes);

    match decision {
        GuardDecision::Denied(denial) => {
            assert_eq!(denial.reason, DenyReason::Unauthenticated);
            assert_eq!(denial.redirect_to, "/auth/signin");
        }
        other => panic!("expected denial, got {:?}", other),
    }
    assert_eq!(*nav.visits.borrow(), vec!["/auth/signin".to_string()]);
    assert_eq!(
        *notes.messages.borrow(),
        vec!["Please sign in to access this page".to_string()]
    );
}

#[test]
fn test_custom_sign_in_path() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();
    let mut guard = RedirectGuard::new().sign_in_path("/login?next=/admin");

    guard.enforce(&SessionSnapshot::signed_out(), &nav, &notes);

    assert_eq!(*nav.visits.borrow(), vec!["/login?next=/admin".to_string()]);
}

#[test]
fn test_loading_then_signed_out_redirects_after_load() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();
    let mut guard = RedirectGuard::new();

    guard.enforce(&SessionSnapshot::loading(), &nav, &notes);
    assert!(nav.visits.borrow().is_empty());

    guard.enforce(&SessionSnapshot::signed_out(), &nav, &notes);
    assert_eq!(nav.visits.borrow().len(), 1);
}

#[test]
fn test_student_is_sent_to_unauthorized_for_admin_page() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();
    let mut guard = RedirectGuard::new().require_role(Role::Admin);

    let decision = guard.enforce(&signed_in_as(Role::Student), &nav, &notes);

    assert_eq!(
        decision,
        GuardDecision::Denied(campus_edge::access::Denial {
            reason: DenyReason::InsufficientRole {
                required: Role::Admin,
                actual: Some(Role::Student),
            },
            redirect_to: "/unauthorized".to_string(),
            notice: "You don't have permission to access this page",
        })
    );
    assert_eq!(*nav.visits.borrow(), vec!["/unauthorized".to_string()]);
    assert_eq!(notes.messages.borrow().len(), 1);
}

#[test]
fn test_higher_role_passes_through_hierarchy() {
    let guard = RedirectGuard::new().require_role(Role::Admin);

    assert!(guard.evaluate(&signed_in_as(Role::Admin)).is_allowed());
    assert!(guard.evaluate(&signed_in_as(Role::SuperAdmin)).is_allowed());
    assert!(!guard.evaluate(&signed_in_as(Role::Instructor)).is_allowed());
}

#[test]
fn test_missing_role_counts_as_student() {
    let no_profile = SessionSnapshot::signed_in(identity(), None);
    let unknown_role = SessionSnapshot::signed_in(identity(), Some(Profile::default()));

    let student_page = RedirectGuard::new().require_role(Role::Student);
    let instructor_page = RedirectGuard::new().require_role(Role::Instructor);

    assert!(student_page.evaluate(&no_profile).is_allowed());
    assert!(student_page.evaluate(&unknown_role).is_allowed());
    assert!(!instructor_page.evaluate(&no_profile).is_allowed());
    assert!(!instructor_page.evaluate(&unknown_role).is_allowed());
}

#[test]
fn test_no_required_role_admits_any_signed_in_user() {
    let guard = RedirectGuard::new();
    for role in Role::ALL {
        assert!(guard.evaluate(&signed_in_as(role)).is_allowed());
    }
}

#[test]
fn test_changed_session_triggers_new_redirect() {
    let nav = RecordingNavigator::default();
    let notes = RecordingNotifier::default();
    let mut guard = RedirectGuard::new()
        .require_role(Role::Admin)
        .unauthorized_path("/403");

    guard.enforce(&signed_in_as(Role::Student), &nav, &notes);
    guard.enforce(&signed_in_as(Role::Student), &nav, &notes);
    guard.enforce(&signed_in_as(Role::Instructor), &nav, &notes);
    guard.enforce(&signed_in_as(Role::Admin), &nav, &notes);

    assert_eq!(*nav.visits.borrow(), vec!["/403".to_string(), "/403".to_string()]);
    assert_eq!(notes.messages.borrow().len(), 2);
}
