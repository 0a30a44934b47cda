use std::sync::{Arc, Mutex, MutexGuard};

use crate::booking::repository::{Record, Repository, RepositoryError};

/// Insertion-ordered store used by tests, the demo and the in-process service.
#[derive(Debug)]
pub struct MemoryStore<T> {
    records: Arc<Mutex<Vec<T>>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, Vec<T>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl<T: Record> Repository<T> for MemoryStore<T> {
    fn find_by_id(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        let guard = self.guard()?;
        Ok(guard.iter().find(|record| record.id() == id).cloned())
    }

    fn save(&self, record: T) -> Result<(), RepositoryError> {
        let mut guard = self.guard()?;
        match guard.iter_mut().find(|existing| existing.id() == record.id()) {
            Some(existing) => *existing = record,
            None => guard.push(record),
        }
        Ok(())
    }

    fn delete(&self, id: &T::Id) -> Result<bool, RepositoryError> {
        let mut guard = self.guard()?;
        let before = guard.len();
        guard.retain(|record| record.id() != id);
        Ok(guard.len() != before)
    }

    fn all(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.guard()?.clone())
    }
}
