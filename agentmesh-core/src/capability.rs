//! Capability identifiers.

use crate::error::{Error, Result};

const MAX_CAPABILITY_LEN: usize = 256;

/// Validates a capability name per the registration rules: a non-empty
/// string within a sane length bound. Unlike a strict slug format, any
/// printable string is accepted — the mesh does not constrain how
/// operators name capabilities.
///
/// # Errors
///
/// Returns [`Error::InvalidCapability`] if `capability` is empty, all
/// whitespace, or unreasonably long.
pub fn validate_capability(capability: &str) -> Result<()> {
    if capability.trim().is_empty() {
        return Err(Error::InvalidCapability {
            capability: capability.to_owned(),
            reason: "capability must be a non-empty string".into(),
        });
    }

    if capability.len() > MAX_CAPABILITY_LEN {
        return Err(Error::InvalidCapability {
            capability: capability.to_owned(),
            reason: format!("capability length must be <= {MAX_CAPABILITY_LEN}"),
        });
    }

    Ok(())
}
