//! Resolves a portal session token to a stable user identity.

use uuid::Uuid;

/// Maps an opaque session token to the user it belongs to.
///
/// Returning `None` means the token is missing, expired, or otherwise not
/// a valid session; the caller treats that as unauthenticated.
pub trait SessionVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Option<Uuid>;
}

/// Verifier backed by the care portal's session scheme.
///
/// The portal issues opaque tokens; the same token always resolves to the
/// same user id, and distinct tokens resolve to distinct ids.
pub struct PortalSessionVerifier;

impl SessionVerifier for PortalSessionVerifier {
    fn verify(&self, token: &str) -> Option<Uuid> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        Some(Uuid::new_v5(&Uuid::NAMESPACE_URL, token.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_token_resolves_to_same_identity() {
        let verifier = PortalSessionVerifier;
        let first = verifier.verify("session-abc").unwrap();
        let second = verifier.verify("session-abc").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distinct_tokens_resolve_to_distinct_identities() {
        let verifier = PortalSessionVerifier;
        let alice = verifier.verify("session-alice").unwrap();
        let bob = verifier.verify("session-bob").unwrap();
        assert_ne!(alice, bob);
    }

    #[test]
    fn blank_token_is_rejected() {
        let verifier = PortalSessionVerifier;
        assert!(verifier.verify("").is_none());
        assert!(verifier.verify("   ").is_none());
    }
}
