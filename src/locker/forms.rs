use std::sync::Arc;
use std::time::Duration;

use super::domain::{ApplyForm, ApplyFormUpdate, FormKey, FormStatus, NewApplyForm};
use super::storage::{CommitGate, Storage, StorageError};

/// Administrative and gate-keeping operations over apply forms.
///
/// Activation runs under the commit gate so the single-ACTIVE invariant
/// holds even when two administrators race.
pub struct ApplyFormService<S> {
    storage: Arc<S>,
    gate: Arc<CommitGate>,
    gate_budget: Duration,
}

impl<S> Clone for ApplyFormService<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            gate: self.gate.clone(),
            gate_budget: self.gate_budget,
        }
    }
}

impl<S> ApplyFormService<S>
where
    S: Storage + 'static,
{
    pub fn new(storage: Arc<S>, gate: Arc<CommitGate>, gate_budget: Duration) -> Self {
        Self {
            storage,
            gate,
            gate_budget,
        }
    }

    /// Create a new form for its (year, semester) cycle, initially inactive.
    pub fn create_form(&self, form: NewApplyForm) -> Result<ApplyForm, FormError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        if self.storage.form(form.key)?.is_some() {
            return Err(FormError::Duplicated);
        }
        let created = self.storage.insert_form(form.into_form())?;
        tracing::info!(form = %created.key, "created apply form");
        Ok(created)
    }

    /// Replace the period windows of an existing form.
    pub fn update_form(
        &self,
        key: FormKey,
        update: ApplyFormUpdate,
    ) -> Result<ApplyForm, FormError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let mut form = self.storage.form(key)?.ok_or(FormError::NotFound)?;
        form.primary = update.primary;
        form.additional = update.additional;
        form.replacement = update.replacement;
        self.storage.update_form(form.clone())?;
        Ok(form)
    }

    /// Delete a form; the store cascades its applies, reports, and
    /// allocations.
    pub fn delete_form(&self, key: FormKey) -> Result<(), FormError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        match self.storage.remove_form(key) {
            Ok(()) => {
                tracing::info!(form = %key, "deleted apply form");
                Ok(())
            }
            Err(StorageError::NotFound) => Err(FormError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a form ACTIVE; fails while another form is ACTIVE.
    pub fn activate(&self, key: FormKey) -> Result<ApplyForm, FormError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        if let Some(active) = self.storage.active_form()? {
            if active.key != key {
                return Err(FormError::Duplicated);
            }
        }
        let mut form = self.storage.form(key)?.ok_or(FormError::NotFound)?;
        form.status = FormStatus::Active;
        self.storage.update_form(form.clone())?;
        tracing::info!(form = %key, "activated apply form");
        Ok(form)
    }

    pub fn deactivate(&self, key: FormKey) -> Result<ApplyForm, FormError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let mut form = self.storage.form(key)?.ok_or(FormError::NotFound)?;
        form.status = FormStatus::Inactive;
        self.storage.update_form(form.clone())?;
        Ok(form)
    }

    /// The unique ACTIVE form, if any.
    pub fn active_form(&self) -> Result<ApplyForm, FormError> {
        self.storage.active_form()?.ok_or(FormError::NotFound)
    }

    pub fn form(&self, key: FormKey) -> Result<ApplyForm, FormError> {
        self.storage.form(key)?.ok_or(FormError::NotFound)
    }

    pub fn forms(&self) -> Result<Vec<ApplyForm>, FormError> {
        Ok(self.storage.forms()?)
    }
}

/// Error raised by form operations.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("no apply form matches the request")]
    NotFound,
    #[error("an apply form for that cycle already exists or another form is active")]
    Duplicated,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FormError {
    pub fn code(&self) -> &'static str {
        match self {
            FormError::NotFound => "APPLY_FORM_NOT_FOUND",
            FormError::Duplicated => "APPLY_FORM_DUPLICATED",
            FormError::Storage(err) => err.code(),
        }
    }
}
