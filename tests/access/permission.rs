//! Role-order and account-management properties.

use tollgate::permission::{require_role, require_manage};
use tollgate::{Error, Principal, Role, can_manage_user, has_required_role};

fn with_role(role: Role) -> Principal {
    Principal::new("acting-user", role)
}

/// `has_required_role(r1, r2) == ordinal(r1) >= ordinal(r2)` for every pair.
#[test]
fn required_role_is_the_total_order() {
    for held in Role::ALL {
        for required in Role::ALL {
            assert_eq!(
                has_required_role(Some(&with_role(held)), required),
                held.ordinal() >= required.ordinal()
            );
        }
    }
}

#[test]
fn absent_principal_satisfies_nothing() {
    for role in Role::ALL {
        assert!(!has_required_role(None, role));
        assert!(!can_manage_user(None, role));
    }
}

#[test]
fn management_matrix() {
    let expected = [
        // (acting, target, allowed)
        (Role::Admin, Role::Admin, true),
        (Role::Admin, Role::Manager, true),
        (Role::Admin, Role::Member, true),
        (Role::Manager, Role::Admin, false),
        (Role::Manager, Role::Manager, true),
        (Role::Manager, Role::Member, true),
        (Role::Member, Role::Admin, false),
        (Role::Member, Role::Manager, false),
        (Role::Member, Role::Member, false),
    ];
    for (acting, target, allowed) in expected {
        assert_eq!(
            can_manage_user(Some(&with_role(acting)), target),
            allowed,
            "{acting} managing {target}"
        );
    }
}

/// A manager asking for an admin-only operation is forbidden, not
/// unauthenticated.
#[test]
fn manager_requiring_admin_is_forbidden() {
    let err = require_role(Some(with_role(Role::Manager)), Role::Admin).unwrap_err();
    assert!(matches!(err, Error::Forbidden { required: Role::Admin }));
    assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);
}

#[test]
fn missing_principal_is_unauthenticated() {
    for role in Role::ALL {
        let err = require_role(None, role).unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(err.status_code(), hyper::StatusCode::UNAUTHORIZED);
    }
}

#[test]
fn escalation_is_forbidden_with_its_own_message() {
    let err = require_manage(&with_role(Role::Manager), Role::Admin).unwrap_err();
    assert_eq!(err.status_code(), hyper::StatusCode::FORBIDDEN);
    assert!(err.to_string().contains("cannot manage admin accounts"));
}

#[test]
fn repeated_evaluation_is_stable() {
    let principal = with_role(Role::Manager);
    let first: Vec<bool> = Role::ALL
        .iter()
        .map(|r| can_manage_user(Some(&principal), *r))
        .collect();
    for _ in 0..3 {
        let again: Vec<bool> = Role::ALL
            .iter()
            .map(|r| can_manage_user(Some(&principal), *r))
            .collect();
        assert_eq!(first, again);
    }
}
