//! Optional integer-return-code shim for non-Rust callers.
//!
//! Not built by default (`--features capi`). Translates [`EsfsError`]
//! into the stable integer codes the engine's return-code table assigns,
//! the same codes [`EsfsError::code`] already returns, plus a `SUCCESS`
//! constant for the `Ok` case the error enum itself has no variant for.

use crate::file::error::EsfsError;

/// The stable success code: no error, operation completed.
pub const SUCCESS: i32 = 0;

/// Collapse an engine result into the stable integer code a C caller
/// would switch on, without exposing `EsfsError` across the boundary.
pub fn result_code<T>(result: Result<T, EsfsError>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(err) => err.code() as i32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_maps_to_success() {
        assert_eq!(result_code(Ok(())), SUCCESS);
    }

    #[test]
    fn error_maps_to_its_stable_code() {
        assert_eq!(result_code(Err::<(), _>(EsfsError::NotExists)), EsfsError::NotExists.code() as i32);
    }
}
