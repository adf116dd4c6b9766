//! RocksDB-backed state store.
//!
//! Contexts, facts and metadata live in dedicated column families:
//!
//! - `"contexts"`: `ContextId` (8 bytes, big-endian) -> context record,
//! - `"facts"`:    `FactKey` (32 bytes) -> fact record,
//! - `"meta"`:     phase pointers under `"pointers"`, the highest
//!   allocated context id under `"latest_context_id"` and the node's last
//!   processed block under `"last_block"`.
//!
//! Records are encoded with bincode 2 through serde. A [`StateDelta`] is
//! written as one `WriteBatch`, so either all of it lands or none does.

use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::consensus::store::{
    ContextPointers, ContextStore, FactStore, StateDelta, StateStore,
};
use crate::types::{BlockNumber, ContextId, ContextRecord, FactKey, FactRecord};

use super::error::StorageError;

const CF_CONTEXTS: &str = "contexts";
const CF_FACTS: &str = "facts";
const CF_META: &str = "meta";

const META_POINTERS: &[u8] = b"pointers";
const META_LATEST: &[u8] = b"latest_context_id";
const META_LAST_BLOCK: &[u8] = b"last_block";

/// Configuration for [`RocksDbStateStore`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDbConfig {
    /// Filesystem path to the RocksDB database directory.
    pub path: String,
    /// Whether to create the database and missing column families if they
    /// do not yet exist.
    pub create_if_missing: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/coprocessor-db".to_string(),
            create_if_missing: true,
        }
    }
}

/// RocksDB-backed implementation of [`StateStore`].
pub struct RocksDbStateStore {
    db: DB,
}

impl RocksDbStateStore {
    /// Opens (or creates) a store at `cfg.path`.
    ///
    /// The `"default"` column family is opened alongside ours to keep
    /// RocksDB happy but is not used.
    pub fn open(cfg: &RocksDbConfig) -> Result<Self, StorageError> {
        let path = Path::new(&cfg.path);

        let mut opts = Options::default();
        opts.create_if_missing(cfg.create_if_missing);
        opts.create_missing_column_families(cfg.create_if_missing);

        let cfs = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(CF_CONTEXTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_FACTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self { db })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or(StorageError::MissingColumnFamily(name))
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
        let cfg = bincode::config::standard();
        Ok(bincode::serde::encode_to_vec(value, cfg)?)
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
        let cfg = bincode::config::standard();
        let (value, _): (T, usize) = bincode::serde::decode_from_slice(bytes, cfg)?;
        Ok(value)
    }

    fn load<T: DeserializeOwned>(
        &self,
        cf_name: &'static str,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            None => Ok(None),
            Some(bytes) => Self::decode(&bytes).map(Some),
        }
    }

    /// Loads a context record.
    pub fn try_get_context(&self, id: ContextId) -> Result<Option<ContextRecord>, StorageError> {
        self.load(CF_CONTEXTS, &id.to_be_bytes())
    }

    /// Loads a fact record.
    pub fn try_get_fact(&self, key: &FactKey) -> Result<Option<FactRecord>, StorageError> {
        self.load(CF_FACTS, key.as_bytes())
    }

    /// Loads the phase pointers, defaulting to all-empty on a fresh
    /// database.
    pub fn try_pointers(&self) -> Result<ContextPointers, StorageError> {
        Ok(self.load(CF_META, META_POINTERS)?.unwrap_or_default())
    }

    fn load_u64(&self, key: &[u8], what: &'static str) -> Result<Option<u64>, StorageError> {
        let cf_meta = self.cf(CF_META)?;
        match self.db.get_cf(cf_meta, key)? {
            None => Ok(None),
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StorageError::CorruptedMeta(what))?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
        }
    }

    /// Loads the highest allocated context id.
    pub fn try_latest_context_id(&self) -> Result<ContextId, StorageError> {
        Ok(self
            .load_u64(META_LATEST, "latest context id length")?
            .map_or(ContextId::NONE, ContextId))
    }

    /// Last block the node finished processing, 0 on a fresh database.
    pub fn last_block(&self) -> Result<BlockNumber, StorageError> {
        Ok(self
            .load_u64(META_LAST_BLOCK, "last block length")?
            .unwrap_or(0))
    }

    /// Records `block` as processed.
    pub fn record_block(&self, block: BlockNumber) -> Result<(), StorageError> {
        let cf_meta = self.cf(CF_META)?;
        self.db.put_cf(cf_meta, META_LAST_BLOCK, block.to_be_bytes())?;
        Ok(())
    }

    /// Writes `delta` as a single batch.
    pub fn try_commit(&self, delta: &StateDelta) -> Result<(), StorageError> {
        let cf_contexts = self.cf(CF_CONTEXTS)?;
        let cf_facts = self.cf(CF_FACTS)?;
        let cf_meta = self.cf(CF_META)?;

        let mut batch = WriteBatch::default();
        for record in &delta.contexts {
            batch.put_cf(cf_contexts, record.id().to_be_bytes(), Self::encode(record)?);
        }
        for record in &delta.facts {
            batch.put_cf(cf_facts, record.fact_key.as_bytes(), Self::encode(record)?);
        }
        if let Some(pointers) = &delta.pointers {
            batch.put_cf(cf_meta, META_POINTERS, Self::encode(pointers)?);
        }
        if let Some(max) = delta.max_context_id() {
            let latest = self.try_latest_context_id()?;
            if max > latest {
                batch.put_cf(cf_meta, META_LATEST, max.to_be_bytes());
            }
        }

        self.db.write(batch)?;
        Ok(())
    }
}

impl ContextStore for RocksDbStateStore {
    fn get_context(&self, id: ContextId) -> Result<Option<ContextRecord>, StorageError> {
        self.try_get_context(id)
    }

    fn pointers(&self) -> Result<ContextPointers, StorageError> {
        self.try_pointers()
    }

    fn latest_context_id(&self) -> Result<ContextId, StorageError> {
        self.try_latest_context_id()
    }
}

impl FactStore for RocksDbStateStore {
    fn get_fact(&self, key: &FactKey) -> Result<Option<FactRecord>, StorageError> {
        self.try_get_fact(key)
    }
}

impl StateStore for RocksDbStateStore {
    fn commit(&mut self, delta: StateDelta) -> Result<(), StorageError> {
        self.try_commit(&delta).inspect_err(|e| {
            tracing::error!(
                contexts = delta.contexts.len(),
                facts = delta.facts.len(),
                error = %e,
                "RocksDbStateStore::commit failed"
            );
        })
    }
}
