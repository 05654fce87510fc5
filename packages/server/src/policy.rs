//! Access rules.
//!
//! Every rule is a pure function of the request method, the requester (if
//! any) and, for authored content, the author's id.

use axum::http::Method;

use crate::entity::role::Role;

/// Identity and tier of an authenticated caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requester {
    pub user_id: i32,
    pub role: Role,
}

/// Methods without side effects.
pub fn is_safe_method(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Categories, genres and titles: everyone reads, admins write.
pub fn admin_or_read_only(method: &Method, requester: Option<Requester>) -> bool {
    is_safe_method(method) || requester.is_some_and(|r| r.role.is_admin())
}

/// An existing review or comment: everyone reads; the author, moderators
/// and admins modify.
pub fn author_or_staff_or_read_only(
    method: &Method,
    requester: Option<Requester>,
    author_id: i32,
) -> bool {
    is_safe_method(method)
        || requester.is_some_and(|r| r.user_id == author_id || r.role.is_staff())
}

/// The `/users` collection and other users' accounts, reads included.
pub fn manage_users(requester: Option<Requester>) -> bool {
    requester.is_some_and(|r| r.role.is_admin())
}
