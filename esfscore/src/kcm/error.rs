//! KCM's public error taxonomy.
//!
//! A caller of the KCM shim never sees an [`EsfsError`] directly; this
//! is the thin translation layer in front of it, plus one status
//! ([`KcmStatus::InsufficientBuffer`]) the engine itself has no
//! concept of, since buffer sizing is a KCM-level convenience.

use crate::file::error::EsfsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KcmStatus {
    InvalidArgument,
    InternalError,
    InsufficientBuffer,
    IoError,
    Exists,
    NotExists,
    HashConflict,
    InvalidFileVersion,
    CmacMismatch,
}

impl From<EsfsError> for KcmStatus {
    fn from(err: EsfsError) -> Self {
        match err {
            EsfsError::InvalidArgument => KcmStatus::InvalidArgument,
            EsfsError::InternalError => KcmStatus::InternalError,
            EsfsError::BufferTooSmall => KcmStatus::InsufficientBuffer,
            EsfsError::IoError => KcmStatus::IoError,
            EsfsError::Exists => KcmStatus::Exists,
            EsfsError::NotExists => KcmStatus::NotExists,
            EsfsError::HashConflict => KcmStatus::HashConflict,
            // Caller-contract violations never reach KCM's callers in
            // correct usage; collapse them to InternalError rather than
            // growing the public taxonomy for programmer errors.
            EsfsError::FileOpenForRead | EsfsError::FileOpenForWrite => KcmStatus::InternalError,
            EsfsError::InvalidFileVersion => KcmStatus::InvalidFileVersion,
            EsfsError::CmacMismatch => KcmStatus::CmacMismatch,
        }
    }
}

pub type KcmResult<T> = Result<T, KcmStatus>;
