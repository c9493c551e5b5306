//! Core services managing student locker applications and allocation.
//!
//! One apply form per year/semester cycle opens three submission windows
//! (primary, additional, replacement). Students apply against the active
//! form, and the allocation engine binds approved applications to lockers:
//! one locker per student per form, never a broken or already-bound unit.
//! All mutating flows run behind a serializable commit gate so concurrent
//! requests cannot double-book a locker or double-allocate a student.

pub mod config;
pub mod error;
pub mod locker;
pub mod telemetry;

pub use error::AppError;
