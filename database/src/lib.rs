use std::{borrow::Cow, path::Path, sync::Arc};

use anyhow::Result;
use bytesize::ByteSize;
use im::OrdMap;
use libmdbx::{DatabaseFlags, Environment, Geometry, WriteFlags};
use parking_lot::Mutex;
use snap::raw::{Decoder, Encoder};
use thiserror::Error;
use tracing::info;

const GROWTH_STEP: ByteSize = ByteSize::mib(256);
const MAX_NAMED_DATABASES: usize = 4;

/// Narrow key-value store. Values are compressed with Snappy in both kinds.
pub struct Database(DatabaseKind);

impl Database {
    pub fn persistent(name: &str, directory: impl AsRef<Path>, max_size: ByteSize) -> Result<Self> {
        let directory = directory.as_ref();

        fs_err::create_dir_all(directory)?;

        let environment = Environment::builder()
            .set_max_dbs(MAX_NAMED_DATABASES)
            .set_geometry(Geometry {
                size: Some(..usize::try_from(max_size.as_u64())?),
                growth_step: Some(isize::try_from(GROWTH_STEP.as_u64())?),
                shrink_threshold: None,
                page_size: None,
            })
            .open(directory)?;

        let transaction = environment.begin_rw_txn()?;
        transaction.create_db(Some(name), DatabaseFlags::default())?;
        transaction.commit()?;

        info!(name, directory = %directory.display(), "opened persistent database");

        Ok(Self(DatabaseKind::Persistent {
            database_name: name.to_owned(),
            environment,
        }))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self(DatabaseKind::InMemory {
            map: Mutex::default(),
        })
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> Result<bool> {
        let contains_key = match &self.0 {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_ro_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                transaction
                    .get::<()>(database.dbi(), key.as_ref())?
                    .is_some()
            }
            DatabaseKind::InMemory { map } => map.lock().contains_key(key.as_ref()),
        };

        Ok(contains_key)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        match &self.0 {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_ro_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                transaction
                    .get::<Cow<_>>(database.dbi(), key.as_ref())?
                    .map(|compressed| decompress(&compressed))
            }
            DatabaseKind::InMemory { map } => map
                .lock()
                .get(key.as_ref())
                .map(|compressed| decompress(compressed)),
        }
        .transpose()
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        self.put_batch(core::iter::once((key, value)))
    }

    /// Writes all pairs in a single transaction.
    pub fn put_batch(
        &self,
        pairs: impl IntoIterator<Item = (impl AsRef<[u8]>, impl AsRef<[u8]>)>,
    ) -> Result<()> {
        match &self.0 {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_rw_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                for (key, value) in pairs {
                    let compressed = compress(value.as_ref())?;
                    transaction.put(
                        database.dbi(),
                        key.as_ref(),
                        compressed,
                        WriteFlags::default(),
                    )?;
                }

                transaction.commit()?;
            }
            DatabaseKind::InMemory { map } => {
                // Compress everything before touching the map so a failure leaves it unchanged.
                let compressed_pairs = pairs
                    .into_iter()
                    .map(|(key, value)| {
                        let compressed = compress(value.as_ref())?;
                        Ok((Arc::from(key.as_ref()), Arc::from(compressed)))
                    })
                    .collect::<Result<Vec<(Arc<[u8]>, Arc<[u8]>)>>>()?;

                map.lock().extend(compressed_pairs);
            }
        }

        Ok(())
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        match &self.0 {
            DatabaseKind::Persistent {
                database_name,
                environment,
            } => {
                let transaction = environment.begin_rw_txn()?;
                let database = transaction.open_db(Some(database_name))?;

                if transaction.del(database.dbi(), key.as_ref(), None)? {
                    transaction.commit()?;
                }
            }
            DatabaseKind::InMemory { map } => {
                map.lock().remove(key.as_ref());
            }
        }

        Ok(())
    }
}

enum DatabaseKind {
    Persistent {
        database_name: String,
        environment: Environment,
    },
    InMemory {
        map: Mutex<OrdMap<Arc<[u8]>, Arc<[u8]>>>,
    },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to decompress value: {0}")]
    Decompression(#[from] snap::Error),
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    Encoder::new().compress_vec(data).map_err(Into::into)
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    Decoder::new()
        .decompress_vec(data)
        .map_err(Error::Decompression)
        .map_err(Into::into)
}
