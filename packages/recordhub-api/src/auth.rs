//! The login collaborator's seams (§1, §9): password verification and
//! token issuance stay outside the core on purpose. These are
//! intentionally minimal default implementations — a real deployment
//! swaps in bcrypt and signed JWTs.

/// Verifies a supplied password against the value stored on the record.
pub trait PasswordVerifier: Send + Sync {
    fn verify(&self, stored: &str, supplied: &str) -> bool;
}

/// Default verifier: plain equality. Never use this against a
/// production password column — it exists so the login flow can be
/// exercised end to end without pulling a hashing crate into the core.
pub struct PlaintextVerifier;

impl PasswordVerifier for PlaintextVerifier {
    fn verify(&self, stored: &str, supplied: &str) -> bool {
        stored == supplied
    }
}

/// A stand-in for JWT issuance (§6: `POST /api/auth/login` returns
/// `{token, user}`). Encodes no claims and is not cryptographically
/// signed — real token issuance is named out of scope in §1.
pub fn issue_token(user_id: &str) -> String {
    format!("session.{user_id}")
}
