use std::sync::Arc;

use super::domain::{Apply, ApplyForm, FormKey, Locker, LockerChoice, LockerName, StudentId};
use super::storage::{Storage, StorageError};

/// Resolves the locker an allocation path will bind.
///
/// Both retrieval modes treat "already allocated" as scoped to the given
/// form: rollover to a new form frees every locker implicitly. The
/// requester's own current binding never blocks them, so re-assignment can
/// land on the same locker.
pub struct LockerSelector<S> {
    storage: Arc<S>,
}

impl<S> LockerSelector<S>
where
    S: Storage + 'static,
{
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Exact lookup by name, rejecting broken lockers and lockers bound to
    /// another student within the form.
    pub fn locker_by_name(
        &self,
        name: &LockerName,
        form: &ApplyForm,
        requester: StudentId,
    ) -> Result<Locker, SelectionError> {
        let locker = self.storage.locker(name)?.ok_or(SelectionError::NotFound)?;
        if locker.broken {
            return Err(SelectionError::Broken);
        }
        let own = self.own_locker(requester, form.key)?;
        if self.blocked(name, form.key, own.as_ref())? {
            return Err(SelectionError::AlreadyAllocated);
        }
        Ok(locker)
    }

    /// Preference-ordered pick for an application: first choice, then second
    /// choice, then the remaining pool, each phase scanning lockers in
    /// ascending name order. Deterministic; never returns a broken locker or
    /// one bound to another student.
    pub fn random_locker(&self, apply: &Apply) -> Result<Locker, SelectionError> {
        let pool = self.storage.lockers()?;
        let own = self.own_locker(apply.student, apply.form)?;
        for choice in [apply.first_choice, apply.second_choice].into_iter().flatten() {
            if let Some(locker) = self.scan(&pool, apply, own.as_ref(), Some(&choice))? {
                return Ok(locker);
            }
        }
        self.scan(&pool, apply, own.as_ref(), None)?
            .ok_or(SelectionError::PoolExhausted)
    }

    fn scan(
        &self,
        pool: &[Locker],
        apply: &Apply,
        own: Option<&LockerName>,
        choice: Option<&LockerChoice>,
    ) -> Result<Option<Locker>, SelectionError> {
        for locker in pool {
            if locker.broken {
                continue;
            }
            if let Some(choice) = choice {
                if !choice.matches(locker) {
                    continue;
                }
            }
            if self.blocked(&locker.name, apply.form, own)? {
                continue;
            }
            return Ok(Some(locker.clone()));
        }
        Ok(None)
    }

    fn own_locker(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<Option<LockerName>, SelectionError> {
        Ok(self
            .storage
            .allocation_for(student, form)?
            .map(|allocation| allocation.locker))
    }

    fn blocked(
        &self,
        name: &LockerName,
        form: FormKey,
        own: Option<&LockerName>,
    ) -> Result<bool, SelectionError> {
        if own == Some(name) {
            return Ok(false);
        }
        Ok(self.storage.locker_bound(name, form)?)
    }
}

/// Error raised while resolving a locker.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("no locker with that name exists")]
    NotFound,
    #[error("locker is marked broken")]
    Broken,
    #[error("locker is already bound within the active form")]
    AlreadyAllocated,
    #[error("no eligible locker remains in the pool")]
    PoolExhausted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl SelectionError {
    pub fn code(&self) -> &'static str {
        match self {
            SelectionError::NotFound => "LOCKER_NOT_FOUND",
            SelectionError::Broken => "LOCKER_BROKEN",
            SelectionError::AlreadyAllocated => "LOCKER_ALREADY_ALLOCATED",
            SelectionError::PoolExhausted => "LOCKER_POOL_EXHAUSTED",
            SelectionError::Storage(err) => err.code(),
        }
    }
}
