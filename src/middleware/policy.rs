//! Per-route authorization.
//!
//! Every route picks exactly one [`Policy`]. Evaluation is pure: it looks
//! at the verified identity (if any) and the route's `:username` parameter
//! and returns a [`Decision`]. The route-layer functions at the bottom turn
//! a denial into a 401 before the handler runs.

use axum::{
    extract::{Path, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;

use super::auth::CurrentUser;
use crate::auth::Identity;
use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Anyone, with or without a token.
    Public,
    /// Any verified identity.
    Authenticated,
    /// A verified identity with the admin flag.
    AdminRequired,
    /// An admin, or the user named by the route.
    SelfOrAdmin,
}

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denied(&'static str);

impl Denied {
    pub fn reason(&self) -> &'static str {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(Denied),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn into_result(self) -> Result<(), Denied> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(denied) => Err(denied),
        }
    }
}

impl Policy {
    pub fn evaluate(self, identity: Option<&Identity>, route_username: Option<&str>) -> Decision {
        match (self, identity) {
            (Policy::Public, _) => Decision::Allowed,
            (Policy::Authenticated, Some(_)) => Decision::Allowed,
            (Policy::Authenticated, None) => Decision::Denied(Denied("Unauthorized")),
            (Policy::AdminRequired, Some(id)) if id.is_admin => Decision::Allowed,
            (Policy::AdminRequired, _) => Decision::Denied(Denied("Admin access required.")),
            (Policy::SelfOrAdmin, Some(id))
                if id.is_admin || route_username == Some(id.username.as_str()) =>
            {
                Decision::Allowed
            }
            (Policy::SelfOrAdmin, _) => Decision::Denied(Denied("Unauthorized")),
        }
    }
}

async fn enforce(
    policy: Policy,
    current: &CurrentUser,
    route_username: Option<&str>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(denied) = policy.evaluate(current.identity(), route_username).into_result() {
        tracing::warn!(
            "{:?} denied {} {} for {}",
            policy,
            request.method(),
            request.uri().path(),
            current.identity().map(|i| i.username.as_str()).unwrap_or("anonymous")
        );
        return Err(denied.into());
    }
    Ok(next.run(request).await)
}

/// Route layer: any verified identity.
pub async fn ensure_logged_in(
    current: CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(Policy::Authenticated, &current, None, request, next).await
}

/// Route layer: admins only.
pub async fn admin_required(
    current: CurrentUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    enforce(Policy::AdminRequired, &current, None, request, next).await
}

/// Route layer: admins, or the user named by `:username`.
pub async fn ensure_correct_user_or_admin(
    current: CurrentUser,
    params: Option<Path<HashMap<String, String>>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route_username = params.as_ref().and_then(|Path(p)| p.get("username")).cloned();
    enforce(
        Policy::SelfOrAdmin,
        &current,
        route_username.as_deref(),
        request,
        next,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(username: &str, is_admin: bool) -> Identity {
        Identity {
            username: username.to_string(),
            is_admin,
        }
    }

    #[test]
    fn public_always_allows() {
        assert!(Policy::Public.evaluate(None, None).is_allowed());
        assert!(Policy::Public.evaluate(Some(&user("u1", false)), Some("u2")).is_allowed());
    }

    #[test]
    fn authenticated_needs_identity() {
        assert_eq!(
            Policy::Authenticated.evaluate(None, None),
            Decision::Denied(Denied("Unauthorized"))
        );
        assert!(Policy::Authenticated.evaluate(Some(&user("u1", false)), None).is_allowed());
    }

    #[test]
    fn admin_required_checks_flag() {
        assert!(Policy::AdminRequired.evaluate(Some(&user("admin", true)), None).is_allowed());
        assert!(!Policy::AdminRequired.evaluate(Some(&user("u1", false)), None).is_allowed());
        assert!(!Policy::AdminRequired.evaluate(None, None).is_allowed());
        // The route's username grants nothing here.
        assert!(!Policy::AdminRequired.evaluate(Some(&user("u1", false)), Some("u1")).is_allowed());
    }

    #[test]
    fn self_or_admin_allows_same_user() {
        assert!(Policy::SelfOrAdmin.evaluate(Some(&user("u1", false)), Some("u1")).is_allowed());
    }

    #[test]
    fn self_or_admin_allows_admin_for_anyone() {
        assert!(Policy::SelfOrAdmin.evaluate(Some(&user("admin", true)), Some("u1")).is_allowed());
        assert!(Policy::SelfOrAdmin.evaluate(Some(&user("admin", true)), None).is_allowed());
    }

    #[test]
    fn self_or_admin_denies_others() {
        assert!(!Policy::SelfOrAdmin.evaluate(Some(&user("u2", false)), Some("u1")).is_allowed());
        assert!(!Policy::SelfOrAdmin.evaluate(Some(&user("u1", false)), None).is_allowed());
        assert!(!Policy::SelfOrAdmin.evaluate(None, Some("u1")).is_allowed());
    }

    #[test]
    fn denial_becomes_unauthorized() {
        let err: ApiError = Policy::AdminRequired
            .evaluate(None, None)
            .into_result()
            .unwrap_err()
            .into();
        assert_eq!(err, ApiError::unauthorized("Admin access required."));
    }
}
