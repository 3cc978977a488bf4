//! Error information-disclosure tests.
//!
//! Client errors carry their message; server errors are replaced by a
//! generic body so internals never reach the caller.

use http_body_util::BodyExt;
use tollgate::{Error, Role};

fn body_of(err: Error) -> (u16, String) {
    let resp = err.into_response();
    let status = resp.status().as_u16();
    let bytes = tokio_test::block_on(resp.into_body().collect())
        .unwrap()
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[test]
fn internal_error_hides_sql() {
    let (status, body) =
        body_of(Error::Internal("Failed to query SELECT * FROM users WHERE id = 'x'".into()));
    assert_eq!(status, 500);
    assert!(!body.contains("SELECT"), "SQL fragment leaked: {body}");
    assert!(body.contains("Internal server error"));
}

#[test]
fn session_failure_hides_cause() {
    let (status, body) = body_of(Error::Session("redis://10.0.0.4:6379 refused".into()));
    assert_eq!(status, 500);
    assert!(!body.contains("redis"), "Session store address leaked: {body}");
}

#[test]
fn forbidden_names_the_required_role() {
    let (status, body) = body_of(Error::Forbidden {
        required: Role::Admin,
    });
    assert_eq!(status, 403);
    assert_eq!(body, r#"{"error":"Forbidden: admin role required"}"#);
}

#[test]
fn unauthorized_is_plain() {
    let (status, body) = body_of(Error::Unauthorized);
    assert_eq!(status, 401);
    assert_eq!(body, r#"{"error":"Unauthorized"}"#);
}
