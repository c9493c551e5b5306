use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use super::domain::{
    Allocation, AllocationId, Apply, ApplyForm, ApplyId, ApplyPeriod, ApplyStatus, FormKey,
    FormStatus, Locker, LockerChoice, LockerName, Report, ReportId, Student, StudentId,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("commit gate contended beyond the wait budget")]
    Contended,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Conflict => "STORAGE_CONFLICT",
            StorageError::NotFound => "STORAGE_NOT_FOUND",
            StorageError::Contended => "TRANSACTION_CONTENDED",
            StorageError::Unavailable(_) => "STORAGE_UNAVAILABLE",
        }
    }
}

/// Apply-form persistence. `remove_form` cascades the form's applies,
/// reports, and allocations.
pub trait FormStore: Send + Sync {
    fn insert_form(&self, form: ApplyForm) -> Result<ApplyForm, StorageError>;
    fn update_form(&self, form: ApplyForm) -> Result<(), StorageError>;
    fn remove_form(&self, key: FormKey) -> Result<(), StorageError>;
    fn form(&self, key: FormKey) -> Result<Option<ApplyForm>, StorageError>;
    fn active_form(&self) -> Result<Option<ApplyForm>, StorageError>;
    fn forms(&self) -> Result<Vec<ApplyForm>, StorageError>;
}

/// Payload for a new application row; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApply {
    pub student: StudentId,
    pub form: FormKey,
    pub first_choice: Option<LockerChoice>,
    pub second_choice: Option<LockerChoice>,
    pub period: ApplyPeriod,
    pub status: ApplyStatus,
}

pub trait ApplyStore: Send + Sync {
    fn insert_apply(&self, apply: NewApply) -> Result<Apply, StorageError>;
    fn update_apply(&self, apply: Apply) -> Result<(), StorageError>;
    fn remove_apply(&self, id: ApplyId) -> Result<(), StorageError>;
    fn apply(&self, id: ApplyId) -> Result<Option<Apply>, StorageError>;
    fn apply_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<Option<Apply>, StorageError>;
    fn apply_with_status(
        &self,
        student: StudentId,
        form: FormKey,
        status: ApplyStatus,
    ) -> Result<Option<Apply>, StorageError>;
    /// All applies for a form in ascending id order.
    fn applies_for_form(&self, form: FormKey) -> Result<Vec<Apply>, StorageError>;
    /// Status-filtered applies for a form in ascending id order.
    fn applies_with_status(
        &self,
        form: FormKey,
        status: ApplyStatus,
    ) -> Result<Vec<Apply>, StorageError>;
}

/// Payload for a new breakage report; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub apply: ApplyId,
    pub content: String,
}

pub trait ReportStore: Send + Sync {
    fn insert_report(&self, report: NewReport) -> Result<Report, StorageError>;
    fn report_for_apply(&self, apply: ApplyId) -> Result<Option<Report>, StorageError>;
}

/// Payload for a new allocation row; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAllocation {
    pub form: FormKey,
    pub student: StudentId,
    pub apply: ApplyId,
    pub locker: LockerName,
}

pub trait AllocationStore: Send + Sync {
    fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<Allocation, StorageError>;
    fn allocation_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<Option<Allocation>, StorageError>;
    /// Idempotent: removing an absent row is not an error.
    fn remove_allocation_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<(), StorageError>;
    /// Whether any allocation in `form` binds `locker`.
    fn locker_bound(&self, locker: &LockerName, form: FormKey) -> Result<bool, StorageError>;
    fn allocations_for_form(&self, form: FormKey) -> Result<Vec<Allocation>, StorageError>;
}

pub trait LockerStore: Send + Sync {
    fn insert_locker(&self, locker: Locker) -> Result<(), StorageError>;
    fn locker(&self, name: &LockerName) -> Result<Option<Locker>, StorageError>;
    /// The whole pool in ascending name order.
    fn lockers(&self) -> Result<Vec<Locker>, StorageError>;
    /// Maintenance hook; the broken flag is owned by an external collaborator.
    fn set_broken(&self, name: &LockerName, broken: bool) -> Result<(), StorageError>;
}

/// Everything the services need from one consistent data store.
pub trait Storage:
    FormStore + ApplyStore + ReportStore + AllocationStore + LockerStore
{
}

impl<T> Storage for T where
    T: FormStore + ApplyStore + ReportStore + AllocationStore + LockerStore
{
}

/// Student resolution contract (identity lives outside the core).
pub trait StudentDirectory: Send + Sync {
    fn find_by_number(&self, number: &str) -> Result<Option<Student>, DirectoryError>;
    fn find_by_name_and_number(
        &self,
        name: &str,
        number: &str,
    ) -> Result<Option<Student>, DirectoryError>;
    fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, DirectoryError>;
}

/// Fee-payment signal, consumed only as an allocation-priority weight.
pub trait DuesLedger: Send + Sync {
    fn is_dues(&self, student: StudentId) -> Result<bool, DirectoryError>;
}

/// Collaborator transport error.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

impl DirectoryError {
    pub fn code(&self) -> &'static str {
        match self {
            DirectoryError::Unavailable(_) => "DIRECTORY_UNAVAILABLE",
        }
    }
}

const GATE_POLL: Duration = Duration::from_micros(250);

/// Coarse serializable gate protecting read-check-write sequences.
///
/// Every mutating service call holds a permit for its whole critical section,
/// so two concurrent calls can never interleave between their checks and
/// their writes. Acquisition is bounded: a caller that cannot get the permit
/// within its budget fails with [`StorageError::Contended`] instead of
/// blocking indefinitely.
#[derive(Debug, Default)]
pub struct CommitGate {
    inner: Mutex<()>,
}

/// Held proof of exclusive access; releases the gate on drop.
#[derive(Debug)]
pub struct CommitPermit<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, budget: Duration) -> Result<CommitPermit<'_>, StorageError> {
        let deadline = Instant::now() + budget;
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(CommitPermit { _guard: guard }),
                Err(TryLockError::WouldBlock) => {
                    if Instant::now() >= deadline {
                        return Err(StorageError::Contended);
                    }
                    thread::sleep(GATE_POLL);
                }
                Err(TryLockError::Poisoned(_)) => {
                    return Err(StorageError::Unavailable(
                        "commit gate poisoned".to_string(),
                    ));
                }
            }
        }
    }
}

#[derive(Default)]
struct MemoryState {
    forms: BTreeMap<FormKey, ApplyForm>,
    applies: BTreeMap<ApplyId, Apply>,
    reports: BTreeMap<ReportId, Report>,
    allocations: BTreeMap<AllocationId, Allocation>,
    lockers: BTreeMap<LockerName, Locker>,
    next_apply: u64,
    next_report: u64,
    next_allocation: u64,
}

/// In-memory store backing tests and single-process deployments.
///
/// Individual operations are atomic (one mutex over the whole state); the
/// [`CommitGate`] supplies isolation across multi-step sequences.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl FormStore for MemoryStore {
    fn insert_form(&self, form: ApplyForm) -> Result<ApplyForm, StorageError> {
        let mut state = self.state()?;
        if state.forms.contains_key(&form.key) {
            return Err(StorageError::Conflict);
        }
        state.forms.insert(form.key, form.clone());
        Ok(form)
    }

    fn update_form(&self, form: ApplyForm) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if !state.forms.contains_key(&form.key) {
            return Err(StorageError::NotFound);
        }
        state.forms.insert(form.key, form);
        Ok(())
    }

    fn remove_form(&self, key: FormKey) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if state.forms.remove(&key).is_none() {
            return Err(StorageError::NotFound);
        }
        let orphaned: Vec<ApplyId> = state
            .applies
            .values()
            .filter(|apply| apply.form == key)
            .map(|apply| apply.id)
            .collect();
        for id in &orphaned {
            state.applies.remove(id);
        }
        state
            .reports
            .retain(|_, report| !orphaned.contains(&report.apply));
        state.allocations.retain(|_, allocation| allocation.form != key);
        Ok(())
    }

    fn form(&self, key: FormKey) -> Result<Option<ApplyForm>, StorageError> {
        Ok(self.state()?.forms.get(&key).cloned())
    }

    fn active_form(&self) -> Result<Option<ApplyForm>, StorageError> {
        Ok(self
            .state()?
            .forms
            .values()
            .find(|form| form.status == FormStatus::Active)
            .cloned())
    }

    fn forms(&self) -> Result<Vec<ApplyForm>, StorageError> {
        Ok(self.state()?.forms.values().cloned().collect())
    }
}

impl ApplyStore for MemoryStore {
    fn insert_apply(&self, apply: NewApply) -> Result<Apply, StorageError> {
        let mut state = self.state()?;
        state.next_apply += 1;
        let row = Apply {
            id: ApplyId(state.next_apply),
            student: apply.student,
            form: apply.form,
            first_choice: apply.first_choice,
            second_choice: apply.second_choice,
            period: apply.period,
            status: apply.status,
        };
        state.applies.insert(row.id, row.clone());
        Ok(row)
    }

    fn update_apply(&self, apply: Apply) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if !state.applies.contains_key(&apply.id) {
            return Err(StorageError::NotFound);
        }
        state.applies.insert(apply.id, apply);
        Ok(())
    }

    fn remove_apply(&self, id: ApplyId) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if state.applies.remove(&id).is_none() {
            return Err(StorageError::NotFound);
        }
        state.reports.retain(|_, report| report.apply != id);
        Ok(())
    }

    fn apply(&self, id: ApplyId) -> Result<Option<Apply>, StorageError> {
        Ok(self.state()?.applies.get(&id).cloned())
    }

    fn apply_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<Option<Apply>, StorageError> {
        Ok(self
            .state()?
            .applies
            .values()
            .find(|apply| apply.student == student && apply.form == form)
            .cloned())
    }

    fn apply_with_status(
        &self,
        student: StudentId,
        form: FormKey,
        status: ApplyStatus,
    ) -> Result<Option<Apply>, StorageError> {
        Ok(self
            .state()?
            .applies
            .values()
            .find(|apply| {
                apply.student == student && apply.form == form && apply.status == status
            })
            .cloned())
    }

    fn applies_for_form(&self, form: FormKey) -> Result<Vec<Apply>, StorageError> {
        Ok(self
            .state()?
            .applies
            .values()
            .filter(|apply| apply.form == form)
            .cloned()
            .collect())
    }

    fn applies_with_status(
        &self,
        form: FormKey,
        status: ApplyStatus,
    ) -> Result<Vec<Apply>, StorageError> {
        Ok(self
            .state()?
            .applies
            .values()
            .filter(|apply| apply.form == form && apply.status == status)
            .cloned()
            .collect())
    }
}

impl ReportStore for MemoryStore {
    fn insert_report(&self, report: NewReport) -> Result<Report, StorageError> {
        let mut state = self.state()?;
        state.next_report += 1;
        let row = Report {
            id: ReportId(state.next_report),
            apply: report.apply,
            content: report.content,
        };
        state.reports.insert(row.id, row.clone());
        Ok(row)
    }

    fn report_for_apply(&self, apply: ApplyId) -> Result<Option<Report>, StorageError> {
        Ok(self
            .state()?
            .reports
            .values()
            .find(|report| report.apply == apply)
            .cloned())
    }
}

impl AllocationStore for MemoryStore {
    fn insert_allocation(
        &self,
        allocation: NewAllocation,
    ) -> Result<Allocation, StorageError> {
        let mut state = self.state()?;
        if state
            .allocations
            .values()
            .any(|row| row.student == allocation.student && row.form == allocation.form)
        {
            return Err(StorageError::Conflict);
        }
        state.next_allocation += 1;
        let row = Allocation {
            id: AllocationId(state.next_allocation),
            form: allocation.form,
            student: allocation.student,
            apply: allocation.apply,
            locker: allocation.locker,
        };
        state.allocations.insert(row.id, row.clone());
        Ok(row)
    }

    fn allocation_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<Option<Allocation>, StorageError> {
        Ok(self
            .state()?
            .allocations
            .values()
            .find(|row| row.student == student && row.form == form)
            .cloned())
    }

    fn remove_allocation_for(
        &self,
        student: StudentId,
        form: FormKey,
    ) -> Result<(), StorageError> {
        let mut state = self.state()?;
        state
            .allocations
            .retain(|_, row| !(row.student == student && row.form == form));
        Ok(())
    }

    fn locker_bound(&self, locker: &LockerName, form: FormKey) -> Result<bool, StorageError> {
        Ok(self
            .state()?
            .allocations
            .values()
            .any(|row| row.form == form && &row.locker == locker))
    }

    fn allocations_for_form(&self, form: FormKey) -> Result<Vec<Allocation>, StorageError> {
        Ok(self
            .state()?
            .allocations
            .values()
            .filter(|row| row.form == form)
            .cloned()
            .collect())
    }
}

impl LockerStore for MemoryStore {
    fn insert_locker(&self, locker: Locker) -> Result<(), StorageError> {
        let mut state = self.state()?;
        if state.lockers.contains_key(&locker.name) {
            return Err(StorageError::Conflict);
        }
        state.lockers.insert(locker.name.clone(), locker);
        Ok(())
    }

    fn locker(&self, name: &LockerName) -> Result<Option<Locker>, StorageError> {
        Ok(self.state()?.lockers.get(name).cloned())
    }

    fn lockers(&self) -> Result<Vec<Locker>, StorageError> {
        Ok(self.state()?.lockers.values().cloned().collect())
    }

    fn set_broken(&self, name: &LockerName, broken: bool) -> Result<(), StorageError> {
        let mut state = self.state()?;
        match state.lockers.get_mut(name) {
            Some(locker) => {
                locker.broken = broken;
                Ok(())
            }
            None => Err(StorageError::NotFound),
        }
    }
}
