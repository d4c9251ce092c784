//! MAC-based connection identification (spec.md §4.7): the client and
//! server derive an HMAC over a role tag from a shared session key and
//! compare it during the `Identifying` state.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use utils::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Computes the MAC a peer sends to prove it holds the session key.
pub fn compute_mac(session_key: &[u8], role_tag: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(session_key).expect("HMAC accepts any key length");
    mac.update(role_tag);
    mac.finalize().into_bytes().to_vec()
}

/// Verifies a peer-supplied MAC against the locally computed one
/// (spec.md §7 `mac_verification_failed`).
pub fn verify_mac(session_key: &[u8], role_tag: &[u8], supplied: &[u8]) -> CoreResult<()> {
    let mut mac = HmacSha256::new_from_slice(session_key).expect("HMAC accepts any key length");
    mac.update(role_tag);
    mac.verify_slice(supplied).map_err(|_| CoreError::MacVerificationFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_and_role_verifies() {
        let key = b"session-secret";
        let role = b"render-client";
        let mac = compute_mac(key, role);
        assert!(verify_mac(key, role, &mac).is_ok());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let mac = compute_mac(b"correct-key", b"render-client");
        let err = verify_mac(b"wrong-key", b"render-client", &mac).unwrap_err();
        assert!(matches!(err, CoreError::MacVerificationFailed));
    }

    #[test]
    fn wrong_role_tag_fails_verification() {
        let mac = compute_mac(b"key", b"render-client");
        let err = verify_mac(b"key", b"render-server", &mac).unwrap_err();
        assert!(matches!(err, CoreError::MacVerificationFailed));
    }
}
