pub mod weight;

use std::sync::Arc;
use std::time::Duration;

use super::domain::{
    Allocation, AllocationView, Apply, ApplyForm, ApplyId, ApplyStatus, Locker, LockerName,
    Student,
};
use super::forms::{ApplyFormService, FormError};
use super::selection::{LockerSelector, SelectionError};
use super::storage::{
    CommitGate, DirectoryError, DuesLedger, NewAllocation, Storage, StorageError,
    StudentDirectory,
};
use weight::{DuesWeight, WeightPolicy};

/// Orchestrates locker binding: single, random, report-driven, and bulk
/// weighted allocation.
///
/// Every path runs its read-check-write sequence under one commit-gate
/// permit: resolve the authorizing application, pick the locker, retire any
/// prior allocation for the student, insert the new binding, and flip the
/// application to approved. Validation and selection precede the first
/// write, so a failing call leaves nothing behind.
pub struct AllocationEngine<S, D, U> {
    storage: Arc<S>,
    directory: Arc<D>,
    dues: Arc<U>,
    forms: ApplyFormService<S>,
    selector: LockerSelector<S>,
    weights: Arc<dyn WeightPolicy>,
    gate: Arc<CommitGate>,
    gate_budget: Duration,
}

impl<S, D, U> AllocationEngine<S, D, U>
where
    S: Storage + 'static,
    D: StudentDirectory + 'static,
    U: DuesLedger + 'static,
{
    pub fn new(
        storage: Arc<S>,
        directory: Arc<D>,
        dues: Arc<U>,
        gate: Arc<CommitGate>,
        gate_budget: Duration,
    ) -> Self {
        let forms = ApplyFormService::new(storage.clone(), gate.clone(), gate_budget);
        let selector = LockerSelector::new(storage.clone());
        Self {
            storage,
            directory,
            dues,
            forms,
            selector,
            weights: Arc::new(DuesWeight::default()),
            gate,
            gate_budget,
        }
    }

    /// Swap in a different bulk-allocation weight rule.
    pub fn with_weight_policy(mut self, policy: Arc<dyn WeightPolicy>) -> Self {
        self.weights = policy;
        self
    }

    /// Bind a student's pending application to an explicitly named locker.
    pub fn allocate_by_locker_name(
        &self,
        student_number: &str,
        locker_name: &LockerName,
    ) -> Result<AllocationView, EngineError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let student = self.resolve_student(student_number)?;
        let form = self.forms.active_form()?;
        let apply = self.pending_apply(&student, &form)?;
        let locker = self.selector.locker_by_name(locker_name, &form, student.id)?;
        self.bind(student, apply, &form, locker)
    }

    /// Bind a student's pending application to the best eligible locker per
    /// their declared choices.
    pub fn allocate_random(&self, student_number: &str) -> Result<AllocationView, EngineError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let student = self.resolve_student(student_number)?;
        let form = self.forms.active_form()?;
        let apply = self.pending_apply(&student, &form)?;
        let locker = self.selector.random_locker(&apply)?;
        self.bind(student, apply, &form, locker)
    }

    /// Bind a replacement locker for a breakage application.
    ///
    /// By workflow convention the claim has already been approved through
    /// report resolution; this path resolves the application by id and binds
    /// whatever it references.
    pub fn allocate_for_report(&self, apply_id: ApplyId) -> Result<AllocationView, EngineError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let apply = self
            .storage
            .apply(apply_id)?
            .ok_or(EngineError::ApplyNotFound)?;
        let student = self
            .directory
            .find_by_id(apply.student)?
            .ok_or(EngineError::StudentNotFound)?;
        let form = self.forms.active_form()?;
        let locker = self.selector.random_locker(&apply)?;
        self.bind(student, apply, &form, locker)
    }

    /// Allocate every pending application of the active form, highest weight
    /// first.
    ///
    /// All-or-none per applicant, best-effort across the batch: the first
    /// pool exhaustion aborts the remaining iterations and surfaces to the
    /// caller, while bindings committed earlier in the run stay in effect.
    pub fn allocate_all(&self) -> Result<Vec<AllocationView>, EngineError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let form = self.forms.active_form()?;

        let pending = self
            .storage
            .applies_with_status(form.key, ApplyStatus::Apply)?;
        if pending.is_empty() {
            return Err(EngineError::ApplyNotFound);
        }

        let mut weighted: Vec<(Apply, i32)> = Vec::with_capacity(pending.len());
        for apply in pending {
            let paid_dues = self.dues.is_dues(apply.student)?;
            let weight = self.weights.weight(&apply, paid_dues);
            weighted.push((apply, weight));
        }
        // Stable sort keeps retrieval order as the tie-break.
        weighted.sort_by(|a, b| b.1.cmp(&a.1));

        let mut views = Vec::with_capacity(weighted.len());
        for (apply, weight) in weighted {
            let student = self
                .directory
                .find_by_id(apply.student)?
                .ok_or(EngineError::StudentNotFound)?;
            match self.selector.random_locker(&apply) {
                Ok(locker) => {
                    tracing::debug!(
                        student = %student.number,
                        weight,
                        "bulk allocation slot"
                    );
                    let view = self.bind(student, apply, &form, locker)?;
                    views.push(view);
                }
                Err(SelectionError::PoolExhausted) => {
                    tracing::warn!(
                        committed = views.len(),
                        form = %form.key,
                        "bulk allocation aborted: locker pool exhausted"
                    );
                    return Err(SelectionError::PoolExhausted.into());
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(views)
    }

    /// Read view of a student's current allocation within the active form.
    pub fn current_allocation(
        &self,
        student_number: &str,
    ) -> Result<AllocationView, EngineError> {
        let student = self.resolve_student(student_number)?;
        let form = self.forms.active_form()?;
        let allocation = self
            .storage
            .allocation_for(student.id, form.key)?
            .ok_or(EngineError::AllocateNotFound)?;
        let locker = self.locker_of(&allocation)?;
        Ok(AllocationView {
            student,
            apply_id: allocation.apply,
            form: form.key,
            locker,
        })
    }

    /// Administrative release of a student's allocation.
    pub fn revoke(&self, student_number: &str) -> Result<(), EngineError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let student = self.resolve_student(student_number)?;
        let form = self.forms.active_form()?;
        if self
            .storage
            .allocation_for(student.id, form.key)?
            .is_none()
        {
            return Err(EngineError::AllocateNotFound);
        }
        self.storage.remove_allocation_for(student.id, form.key)?;
        tracing::info!(student = %student.number, form = %form.key, "revoked allocation");
        Ok(())
    }

    /// Steps shared by every allocation path once the target locker is
    /// known. Caller holds the commit gate; nothing before this point has
    /// written.
    fn bind(
        &self,
        student: Student,
        mut apply: Apply,
        form: &ApplyForm,
        locker: Locker,
    ) -> Result<AllocationView, EngineError> {
        // Re-assignment overwrites, it does not stack.
        self.storage.remove_allocation_for(student.id, form.key)?;
        self.storage.insert_allocation(NewAllocation {
            form: form.key,
            student: student.id,
            apply: apply.id,
            locker: locker.name.clone(),
        })?;
        apply.status = ApplyStatus::Approve;
        self.storage.update_apply(apply.clone())?;
        tracing::info!(
            student = %student.number,
            locker = %locker.name,
            form = %form.key,
            "bound locker to student"
        );
        Ok(AllocationView {
            student,
            apply_id: apply.id,
            form: form.key,
            locker,
        })
    }

    fn resolve_student(&self, number: &str) -> Result<Student, EngineError> {
        self.directory
            .find_by_number(number)?
            .ok_or(EngineError::StudentNotFound)
    }

    /// The application authorizing a direct or random allocation: the
    /// pending row in status `Apply`, or the already-approved row when the
    /// caller is re-assigning an existing holder. Replacement rows never
    /// authorize these paths; they go through report resolution.
    fn pending_apply(
        &self,
        student: &Student,
        form: &ApplyForm,
    ) -> Result<Apply, EngineError> {
        if let Some(apply) =
            self.storage
                .apply_with_status(student.id, form.key, ApplyStatus::Apply)?
        {
            return Ok(apply);
        }
        self.storage
            .apply_with_status(student.id, form.key, ApplyStatus::Approve)?
            .ok_or(EngineError::ApplyNotFound)
    }

    fn locker_of(&self, allocation: &Allocation) -> Result<Locker, EngineError> {
        self.storage.locker(&allocation.locker)?.ok_or_else(|| {
            EngineError::Storage(StorageError::Unavailable(
                "allocation references a missing locker".to_string(),
            ))
        })
    }
}

/// Error raised by the allocation engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no student matches the supplied identity")]
    StudentNotFound,
    #[error("no pending application authorizes this allocation")]
    ApplyNotFound,
    #[error("student holds no allocation within the active form")]
    AllocateNotFound,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::StudentNotFound => "STUDENT_NOT_FOUND",
            EngineError::ApplyNotFound => "APPLY_NOT_FOUND",
            EngineError::AllocateNotFound => "ALLOCATE_NOT_FOUND",
            EngineError::Form(err) => err.code(),
            EngineError::Selection(err) => err.code(),
            EngineError::Storage(err) => err.code(),
            EngineError::Directory(err) => err.code(),
        }
    }
}
