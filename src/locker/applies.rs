use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::domain::{
    Apply, ApplyForm, ApplyId, ApplyPeriod, ApplyStatus, FormKey, LockerChoice, ReportedApply,
    Student,
};
use super::forms::{ApplyFormService, FormError};
use super::storage::{
    CommitGate, DirectoryError, NewApply, NewReport, Storage, StorageError, StudentDirectory,
};

/// Student-facing submission payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySubmission {
    pub student_name: String,
    pub student_number: String,
    pub first_choice: Option<LockerChoice>,
    pub second_choice: Option<LockerChoice>,
}

/// Replacement submission: the application plus a breakage description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementSubmission {
    pub apply: ApplySubmission,
    pub description: String,
}

/// Administrative resolution of a breakage claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDecision {
    pub apply_id: ApplyId,
    pub approved: bool,
}

/// Choice corrections for an existing application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyUpdate {
    pub first_choice: Option<LockerChoice>,
    pub second_choice: Option<LockerChoice>,
}

/// Submission state machine and administrative apply maintenance.
pub struct ApplyService<S, D> {
    storage: Arc<S>,
    directory: Arc<D>,
    forms: ApplyFormService<S>,
    gate: Arc<CommitGate>,
    gate_budget: Duration,
}

impl<S, D> ApplyService<S, D>
where
    S: Storage + 'static,
    D: StudentDirectory + 'static,
{
    pub fn new(
        storage: Arc<S>,
        directory: Arc<D>,
        gate: Arc<CommitGate>,
        gate_budget: Duration,
    ) -> Self {
        let forms = ApplyFormService::new(storage.clone(), gate.clone(), gate_budget);
        Self {
            storage,
            directory,
            forms,
            gate,
            gate_budget,
        }
    }

    /// Submit during the PRIMARY window; lands in `Apply` status.
    pub fn submit_primary(&self, submission: ApplySubmission) -> Result<Apply, ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        self.process(submission, ApplyPeriod::Primary)
    }

    /// Submit during the ADDITIONAL window; lands in `Apply` status.
    pub fn submit_additional(&self, submission: ApplySubmission) -> Result<Apply, ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        self.process(submission, ApplyPeriod::Additional)
    }

    /// Submit during the REPLACEMENT window; lands in `BrokenApply` status
    /// with the breakage report attached in the same gated operation.
    pub fn submit_replacement(
        &self,
        submission: ReplacementSubmission,
    ) -> Result<ReportedApply, ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let apply = self.process(submission.apply, ApplyPeriod::Replacement)?;
        let report = self.storage.insert_report(NewReport {
            apply: apply.id,
            content: submission.description,
        })?;
        Ok(ReportedApply { apply, report })
    }

    /// Shared submission pipeline. Caller holds the commit gate.
    fn process(
        &self,
        submission: ApplySubmission,
        period: ApplyPeriod,
    ) -> Result<Apply, ApplyError> {
        let form = self.forms.active_form()?;

        let now = Utc::now().naive_utc();
        if !form.is_within_period(period, now) {
            return Err(ApplyError::InvalidPeriod);
        }

        let student = self
            .directory
            .find_by_name_and_number(&submission.student_name, &submission.student_number)?
            .ok_or(ApplyError::StudentNotFound)?;

        let status = period.target_status();
        // Equal-status check only: an APPLY row does not block a BROKEN_APPLY
        // row for the same (student, form), and vice versa.
        if self
            .storage
            .apply_with_status(student.id, form.key, status)?
            .is_some()
        {
            return Err(ApplyError::Duplicated);
        }

        let holds_locker = self
            .storage
            .allocation_for(student.id, form.key)?
            .is_some();
        if period == ApplyPeriod::Replacement && !holds_locker {
            return Err(ApplyError::AllocateNotFound);
        }
        if period != ApplyPeriod::Replacement && holds_locker {
            return Err(ApplyError::AlreadyAllocated);
        }

        let apply = self.storage.insert_apply(NewApply {
            student: student.id,
            form: form.key,
            first_choice: submission.first_choice,
            second_choice: submission.second_choice,
            period,
            status,
        })?;
        tracing::info!(
            student = %student.number,
            form = %form.key,
            period = period.label(),
            "recorded locker application"
        );
        Ok(apply)
    }

    /// Administrative resolution of a breakage claim: flips the pending
    /// `BrokenApply` to `Approve` or `Reject`. Approval alone does not bind
    /// a locker; the engine's report path does that afterwards.
    pub fn resolve_report(&self, decision: ReportDecision) -> Result<ApplyStatus, ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let mut apply = self
            .storage
            .apply(decision.apply_id)?
            .ok_or(ApplyError::NotFound)?;
        if apply.status != ApplyStatus::BrokenApply {
            return Err(ApplyError::NotFound);
        }
        apply.status = if decision.approved {
            ApplyStatus::Approve
        } else {
            ApplyStatus::Reject
        };
        self.storage.update_apply(apply.clone())?;
        tracing::info!(
            apply = %apply.id,
            status = apply.status.label(),
            "resolved breakage report"
        );
        Ok(apply.status)
    }

    /// The unique pending `Apply`-status row for (student, form).
    pub fn pending_apply(
        &self,
        student: &Student,
        form: &ApplyForm,
    ) -> Result<Apply, ApplyError> {
        self.storage
            .apply_with_status(student.id, form.key, ApplyStatus::Apply)?
            .ok_or(ApplyError::NotFound)
    }

    pub fn apply_by_id(&self, id: ApplyId) -> Result<Apply, ApplyError> {
        self.storage.apply(id)?.ok_or(ApplyError::NotFound)
    }

    /// A student's application within the active form, regardless of status.
    pub fn apply_for_student(&self, student_number: &str) -> Result<Apply, ApplyError> {
        let student = self
            .directory
            .find_by_number(student_number)?
            .ok_or(ApplyError::StudentNotFound)?;
        let form = self.forms.active_form()?;
        self.storage
            .apply_for(student.id, form.key)?
            .ok_or(ApplyError::NotFound)
    }

    pub fn applies_now(&self) -> Result<Vec<Apply>, ApplyError> {
        let form = self.forms.active_form()?;
        Ok(self.storage.applies_for_form(form.key)?)
    }

    pub fn applies_for(&self, key: FormKey) -> Result<Vec<Apply>, ApplyError> {
        let form = self.forms.form(key)?;
        Ok(self.storage.applies_for_form(form.key)?)
    }

    pub fn applies_now_with_status(
        &self,
        status: ApplyStatus,
    ) -> Result<Vec<Apply>, ApplyError> {
        let form = self.forms.active_form()?;
        Ok(self.storage.applies_with_status(form.key, status)?)
    }

    pub fn applies_with_status(
        &self,
        key: FormKey,
        status: ApplyStatus,
    ) -> Result<Vec<Apply>, ApplyError> {
        let form = self.forms.form(key)?;
        Ok(self.storage.applies_with_status(form.key, status)?)
    }

    /// Replacement applications joined with their breakage reports.
    pub fn applies_and_reports_now(&self) -> Result<Vec<ReportedApply>, ApplyError> {
        let form = self.forms.active_form()?;
        self.reported_applies(form.key)
    }

    pub fn applies_and_reports_for(
        &self,
        key: FormKey,
    ) -> Result<Vec<ReportedApply>, ApplyError> {
        let form = self.forms.form(key)?;
        self.reported_applies(form.key)
    }

    fn reported_applies(&self, key: FormKey) -> Result<Vec<ReportedApply>, ApplyError> {
        let applies = self
            .storage
            .applies_with_status(key, ApplyStatus::BrokenApply)?;
        let mut joined = Vec::with_capacity(applies.len());
        for apply in applies {
            let report = self
                .storage
                .report_for_apply(apply.id)?
                .ok_or(ApplyError::ReportNotFound)?;
            joined.push(ReportedApply { apply, report });
        }
        Ok(joined)
    }

    /// Correct the requested choices on an existing application.
    pub fn update_choices(
        &self,
        id: ApplyId,
        update: ApplyUpdate,
    ) -> Result<Apply, ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        let mut apply = self.storage.apply(id)?.ok_or(ApplyError::NotFound)?;
        apply.first_choice = update.first_choice;
        apply.second_choice = update.second_choice;
        self.storage.update_apply(apply.clone())?;
        Ok(apply)
    }

    /// Explicit administrative delete; applications are never removed
    /// implicitly.
    pub fn delete_apply(&self, id: ApplyId) -> Result<(), ApplyError> {
        let _permit = self.gate.acquire(self.gate_budget)?;
        match self.storage.remove_apply(id) {
            Ok(()) => Ok(()),
            Err(StorageError::NotFound) => Err(ApplyError::NotFound),
            Err(err) => Err(err.into()),
        }
    }
}

/// Error raised by submission and apply maintenance.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("no student matches the supplied identity")]
    StudentNotFound,
    #[error("an application with the same status already exists for this form")]
    Duplicated,
    #[error("submission falls outside the requested period window")]
    InvalidPeriod,
    #[error("no application matches the request")]
    NotFound,
    #[error("a replacement request requires a currently held locker")]
    AllocateNotFound,
    #[error("student already holds a locker for this form")]
    AlreadyAllocated,
    #[error("no breakage report is attached to the application")]
    ReportNotFound,
    #[error(transparent)]
    Form(#[from] FormError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ApplyError {
    pub fn code(&self) -> &'static str {
        match self {
            ApplyError::StudentNotFound => "STUDENT_NOT_FOUND",
            ApplyError::Duplicated => "APPLY_DUPLICATED",
            ApplyError::InvalidPeriod => "INVALID_APPLY_PERIOD",
            ApplyError::NotFound => "APPLY_NOT_FOUND",
            ApplyError::AllocateNotFound => "ALLOCATE_NOT_FOUND",
            ApplyError::AlreadyAllocated => "ALREADY_ALLOCATED",
            ApplyError::ReportNotFound => "REPORT_NOT_FOUND",
            ApplyError::Form(err) => err.code(),
            ApplyError::Storage(err) => err.code(),
            ApplyError::Directory(err) => err.code(),
        }
    }
}
