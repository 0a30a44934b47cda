use std::fs;
use std::io::{self, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::codec::{self, FlatRecord};
use crate::booking::repository::{Record, Repository, RepositoryError};

/// One flat file per entity. Each write rewrites the whole file through a sibling
/// temporary file and an atomic rename, so a crash leaves either the old or the new file.
#[derive(Debug)]
pub struct FlatFileStore<T> {
    path: PathBuf,
    file_lock: Mutex<()>,
    _record: PhantomData<fn() -> T>,
}

impl<T> FlatFileStore<T>
where
    T: Record + FlatRecord,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Serializes access to the file only; the file itself is never left half-written.
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.file_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn io_error(&self, source: io::Error) -> RepositoryError {
        RepositoryError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn load(&self) -> Result<Vec<T>, RepositoryError> {
        match fs::File::open(&self.path) {
            Ok(file) => Ok(codec::decode(io::BufReader::new(file))?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn store(&self, records: &[T]) -> Result<(), RepositoryError> {
        let bytes = codec::encode(records)?;

        if let Some(parent) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| self.io_error(err))?;
        }

        let staging = self.path.with_extension("tmp");
        let mut file = fs::File::create(&staging).map_err(|err| self.io_error(err))?;
        file.write_all(&bytes).map_err(|err| self.io_error(err))?;
        file.sync_all().map_err(|err| self.io_error(err))?;
        drop(file);
        fs::rename(&staging, &self.path).map_err(|err| self.io_error(err))?;

        debug!(path = %self.path.display(), records = records.len(), "flat file rewritten");
        Ok(())
    }
}

impl<T> Repository<T> for FlatFileStore<T>
where
    T: Record + FlatRecord,
{
    fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        let _guard = self.lock();
        Ok(self.load()?.into_iter().find(|record| record.id() == id))
    }

    fn save(&self, record: T) -> Result<(), RepositoryError> {
        let _guard = self.lock();
        let mut records = self.load()?;
        match records.iter_mut().find(|existing| existing.id() == record.id()) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        self.store(&records)
    }

    fn delete(&self, id: &T::Id) -> Result<bool, RepositoryError> {
        let _guard = self.lock();
        let mut records = self.load()?;
        let before = records.len();
        records.retain(|record| record.id() != id);
        if records.len() == before {
            return Ok(false);
        }
        self.store(&records)?;
        Ok(true)
    }

    fn all(&self) -> Result<Vec<T>, RepositoryError> {
        let _guard = self.lock();
        self.load()
    }
}
