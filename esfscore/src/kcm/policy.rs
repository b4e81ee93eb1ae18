//! Access-permission hook (Secure Core, C8).
//!
//! Currently a no-op stub: `delete` consults it only after a file is
//! known well-formed, and today it always allows the operation. Kept
//! as a free function (not a trait) because there is exactly one call
//! site and nothing to swap out yet — a real policy engine would
//! change this signature, not extend it.

use crate::file::error::EsfsResult;

pub fn allow_access(_name: &[u8]) -> EsfsResult<()> {
    Ok(())
}
