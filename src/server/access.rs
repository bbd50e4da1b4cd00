//! The authorization engine: every capability and ownership check in the
//! API goes through this module so the decision logic has a single point
//! of audit.

use crate::server::response::{ApiError, StoreResultExt};
use crate::store::Store;
use crate::types::{Capability, Document, Permission};

/// Decides whether `actor_id` may exercise `capability` on `document`,
/// given the actor's explicit permission row (if any).
///
/// Ownership is checked first and grants every capability unconditionally,
/// regardless of what any explicit row says. Non-owners fall back to the
/// explicit grant; no grant means deny. Capabilities never imply each other.
#[must_use]
pub fn decide(
    document: &Document,
    grant: Option<&Permission>,
    actor_id: &str,
    capability: Capability,
) -> bool {
    if document.owner_id == actor_id {
        return true;
    }

    grant.is_some_and(|g| g.allows(capability))
}

/// Returns true if the actor holds the capability, consulting the
/// permission ledger only when the actor is not the owner.
pub fn check_capability(
    store: &dyn Store,
    document: &Document,
    actor_id: &str,
    capability: Capability,
) -> Result<bool, ApiError> {
    if document.owner_id == actor_id {
        return Ok(true);
    }

    let grant = store
        .get_permission(&document.id, actor_id)
        .api_err("Failed to check permission")?;

    Ok(decide(document, grant.as_ref(), actor_id, capability))
}

/// Check that the actor holds the capability, returning forbidden if not.
pub fn require_capability(
    store: &dyn Store,
    document: &Document,
    actor_id: &str,
    capability: Capability,
) -> Result<(), ApiError> {
    if !check_capability(store, document, actor_id, capability)? {
        return Err(ApiError::forbidden("Insufficient document permissions"));
    }
    Ok(())
}

/// Ownership-management operations (permission rows, download link
/// enumeration and revocation) are reserved for the owner.
pub fn require_owner(document: &Document, actor_id: &str) -> Result<(), ApiError> {
    if document.owner_id != actor_id {
        return Err(ApiError::forbidden("Only the document owner may do this"));
    }
    Ok(())
}
