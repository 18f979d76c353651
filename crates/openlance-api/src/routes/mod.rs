// SPDX-License-Identifier: BUSL-1.1
//! HTTP route handlers, grouped by resource.
//!
//! Read endpoints and the webhook are public; every mutation sits behind the
//! bearer-token middleware. Handlers validate and translate; all business
//! rules live in [`crate::service::DisputeLifecycleService`] and the domain
//! crates.

pub mod disputes;
pub mod escrow;
pub mod jobs;

use openlance_core::UserId;

use crate::auth::{CallerIdentity, Role};
use crate::error::AppError;
use crate::service::DisputeLifecycleService;
use crate::state::AppState;

/// Build the lifecycle service for a request.
pub(crate) fn service(state: &AppState) -> DisputeLifecycleService {
    DisputeLifecycleService::new(state.store.clone(), state.config.min_votes)
}

/// Decide which user a mutation acts as.
///
/// Bound tokens always act as their own user; a request naming someone else
/// is rejected. Unbound admin tokens (legacy secrets, service tokens) must
/// name the actor in the request body.
pub(crate) fn resolve_actor(
    identity: &CallerIdentity,
    requested: Option<UserId>,
) -> Result<UserId, AppError> {
    match (identity.user_id, requested) {
        (Some(bound), Some(named)) if bound != named => Err(AppError::Forbidden(format!(
            "token is bound to {bound}, not {named}"
        ))),
        (Some(bound), _) => Ok(bound),
        (None, Some(named)) if identity.has_role(Role::Admin) => Ok(named),
        (None, Some(_)) => Err(AppError::Forbidden(
            "token carries no user identity".to_string(),
        )),
        (None, None) => Err(AppError::Forbidden(
            "no acting user: bind the token or name the user in the request".to_string(),
        )),
    }
}
