//! The row-level authorization seam (§1: "out of scope... the
//! row-level authorization predicates"). The engine calls through this
//! trait before every mutation; the glue that actually evaluates rules
//! against a caller's identity lives outside this crate.

use recordhub_core::Record;

/// What the engine asks an authorization collaborator to judge.
pub struct AuthContext<'a> {
    pub collection: &'a str,
    pub id: &'a str,
    /// The record as it will exist after the mutation (`None` for delete,
    /// where it is the record being removed).
    pub record: &'a Record,
}

/// Seam for per-collection row-level authorization. The default
/// (`AllowAll`) is deliberately permissive — a real deployment swaps in
/// a hook that consults the caller's identity, which is itself out of
/// scope here (§1).
pub trait AuthHook: Send + Sync {
    fn authorize(&self, ctx: &AuthContext<'_>) -> Result<(), String>;
}

pub struct AllowAll;

impl AuthHook for AllowAll {
    fn authorize(&self, _ctx: &AuthContext<'_>) -> Result<(), String> {
        Ok(())
    }
}
