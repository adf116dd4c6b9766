//! Storage-level error type shared by every backend.
//!
//! Backend errors are flattened to their message so the error stays
//! `Clone + Eq` and can travel inside the lifecycle and consensus errors.

use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StorageError {
    /// Underlying RocksDB error.
    RocksDb(String),
    /// Required column family was not found.
    MissingColumnFamily(&'static str),
    /// Corrupted or malformed metadata (e.g. a context id with the wrong
    /// length).
    CorruptedMeta(&'static str),
    Encode(String),
    /// A stored record could not be decoded.
    Decode(String),
    /// The backend refused the operation.
    Unavailable(String),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e.to_string())
    }
}

impl From<bincode::error::EncodeError> for StorageError {
    fn from(e: bincode::error::EncodeError) -> Self {
        StorageError::Encode(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for StorageError {
    fn from(e: bincode::error::DecodeError) -> Self {
        StorageError::Decode(e.to_string())
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::RocksDb(e) => write!(f, "rocksdb: {e}"),
            StorageError::MissingColumnFamily(name) => {
                write!(f, "missing column family '{name}'")
            }
            StorageError::CorruptedMeta(what) => write!(f, "corrupted metadata: {what}"),
            StorageError::Encode(e) => write!(f, "encode: {e}"),
            StorageError::Decode(e) => write!(f, "decode: {e}"),
            StorageError::Unavailable(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for StorageError {}
