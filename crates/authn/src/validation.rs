//! Token algorithm policy.
//!
//! Tokens are signed with Ed25519 only. Any header naming a different
//! algorithm is rejected before a key is even loaded, which rules out
//! algorithm substitution (`none`) and key confusion (HMAC keyed with the
//! public key).

use crate::error::AuthError;

/// Algorithms that are never accepted.
///
/// - `none`: carries no signature at all
/// - `HS256`, `HS384`, `HS512`: symmetric, so the "key" would be the public component
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none", "HS256", "HS384", "HS512"];

/// Algorithms the token service signs and verifies with.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["EdDSA"];

/// Checks a token header's `alg` against the policy.
///
/// Forbidden algorithms are reported separately from merely unsupported ones
/// so that logs show attack attempts distinctly.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if `alg` is forbidden or not
/// in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use keygate_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("EdDSA").is_ok());
/// assert!(validate_algorithm("HS256").is_err());
/// assert!(validate_algorithm("ES256").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    if FORBIDDEN_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not allowed for security reasons"
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::UnsupportedAlgorithm(format!(
            "Algorithm '{alg}' is not in accepted list (only EdDSA is supported)"
        )));
    }

    Ok(())
}
