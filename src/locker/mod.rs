//! Locker application and allocation core.
//!
//! Leaf-first: `domain` holds the value model, `storage` the store and
//! collaborator contracts, `forms`/`applies`/`selection` the per-aggregate
//! services, and `engine` the allocation orchestration on top of them.

pub mod applies;
pub mod domain;
pub mod engine;
pub mod forms;
pub mod selection;
pub mod storage;

#[cfg(test)]
mod tests;

pub use applies::{
    ApplyError, ApplyService, ApplySubmission, ApplyUpdate, ReplacementSubmission,
    ReportDecision,
};
pub use domain::{
    Allocation, AllocationId, AllocationView, Apply, ApplyForm, ApplyFormUpdate, ApplyId,
    ApplyPeriod, ApplyStatus, FormKey, FormStatus, Locker, LockerChoice, LockerFloor,
    LockerName, NewApplyForm, PeriodWindow, Report, ReportId, ReportedApply, Student,
    StudentId,
};
pub use engine::weight::{DuesWeight, WeightPolicy, DUES_BONUS};
pub use engine::{AllocationEngine, EngineError};
pub use forms::{ApplyFormService, FormError};
pub use selection::{LockerSelector, SelectionError};
pub use storage::{
    AllocationStore, ApplyStore, CommitGate, CommitPermit, DirectoryError, DuesLedger,
    FormStore, LockerStore, MemoryStore, NewAllocation, NewApply, NewReport, ReportStore,
    Storage, StorageError, StudentDirectory,
};
