use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for students resolved through the directory.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct StudentId(pub u64);

/// Directory snapshot of a student, as much identity as the core ever needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub number: String,
}

/// Unique physical locker name, e.g. `"A-101"`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct LockerName(pub String);

impl fmt::Display for LockerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discrete floor levels carrying locker columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum LockerFloor {
    First,
    Second,
    Third,
    Fourth,
}

impl LockerFloor {
    pub const fn label(self) -> &'static str {
        match self {
            LockerFloor::First => "1",
            LockerFloor::Second => "2",
            LockerFloor::Third => "3",
            LockerFloor::Fourth => "4",
        }
    }
}

/// One physical locker. Immutable after creation except for the broken flag,
/// which facility maintenance toggles through the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locker {
    pub name: LockerName,
    pub floor: LockerFloor,
    /// Tier within a floor column, counted from the bottom.
    pub height: u8,
    /// 4-digit access code handed to the holder.
    pub access_code: String,
    pub broken: bool,
}

/// Identity of one allocation cycle: a (year, semester) pair.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FormKey {
    pub year: i32,
    pub semester: u8,
}

impl fmt::Display for FormKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year, self.semester)
    }
}

/// Whether a form currently accepts submissions and allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormStatus {
    Inactive,
    Active,
}

impl FormStatus {
    pub const fn label(self) -> &'static str {
        match self {
            FormStatus::Inactive => "inactive",
            FormStatus::Active => "active",
        }
    }
}

/// Closed interval during which a period accepts submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodWindow {
    pub opens_at: NaiveDateTime,
    pub closes_at: NaiveDateTime,
}

impl PeriodWindow {
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.opens_at <= now && now <= self.closes_at
    }
}

/// Ordered submission windows within one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplyPeriod {
    Primary,
    Additional,
    Replacement,
}

impl ApplyPeriod {
    /// Status a fresh submission lands in for this period.
    pub const fn target_status(self) -> ApplyStatus {
        match self {
            ApplyPeriod::Primary | ApplyPeriod::Additional => ApplyStatus::Apply,
            ApplyPeriod::Replacement => ApplyStatus::BrokenApply,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ApplyPeriod::Primary => "primary",
            ApplyPeriod::Additional => "additional",
            ApplyPeriod::Replacement => "replacement",
        }
    }
}

/// One year/semester allocation cycle with its period windows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyForm {
    pub key: FormKey,
    pub status: FormStatus,
    pub primary: PeriodWindow,
    pub additional: PeriodWindow,
    pub replacement: PeriodWindow,
}

impl ApplyForm {
    pub fn window(&self, period: ApplyPeriod) -> &PeriodWindow {
        match period {
            ApplyPeriod::Primary => &self.primary,
            ApplyPeriod::Additional => &self.additional,
            ApplyPeriod::Replacement => &self.replacement,
        }
    }

    /// Pure predicate, no side effects: does `now` fall inside the stored
    /// window for `period`?
    pub fn is_within_period(&self, period: ApplyPeriod, now: NaiveDateTime) -> bool {
        self.window(period).contains(now)
    }

    pub fn is_active(&self) -> bool {
        self.status == FormStatus::Active
    }
}

/// Request payload for a new form; forms always start out inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplyForm {
    pub key: FormKey,
    pub primary: PeriodWindow,
    pub additional: PeriodWindow,
    pub replacement: PeriodWindow,
}

impl NewApplyForm {
    pub fn into_form(self) -> ApplyForm {
        ApplyForm {
            key: self.key,
            status: FormStatus::Inactive,
            primary: self.primary,
            additional: self.additional,
            replacement: self.replacement,
        }
    }
}

/// Replacement period windows for an existing form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFormUpdate {
    pub primary: PeriodWindow,
    pub additional: PeriodWindow,
    pub replacement: PeriodWindow,
}

/// Identifier wrapper for submitted applications.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ApplyId(pub u64);

impl fmt::Display for ApplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a single application.
///
/// `Apply` and `BrokenApply` are the two pending states; `Approve` and
/// `Reject` are terminal for the row. A new cycle needs a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyStatus {
    Apply,
    BrokenApply,
    Approve,
    Reject,
}

impl ApplyStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplyStatus::Apply => "apply",
            ApplyStatus::BrokenApply => "broken_apply",
            ApplyStatus::Approve => "approve",
            ApplyStatus::Reject => "reject",
        }
    }

    pub const fn is_pending(self) -> bool {
        matches!(self, ApplyStatus::Apply | ApplyStatus::BrokenApply)
    }
}

/// A requested (floor, height) position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockerChoice {
    pub floor: LockerFloor,
    pub height: u8,
}

impl LockerChoice {
    pub fn matches(&self, locker: &Locker) -> bool {
        locker.floor == self.floor && locker.height == self.height
    }
}

/// One student's request within a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Apply {
    pub id: ApplyId,
    pub student: StudentId,
    pub form: FormKey,
    pub first_choice: Option<LockerChoice>,
    pub second_choice: Option<LockerChoice>,
    pub period: ApplyPeriod,
    pub status: ApplyStatus,
}

/// Identifier wrapper for breakage reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ReportId(pub u64);

/// Free-text breakage description attached to a replacement application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub apply: ApplyId,
    pub content: String,
}

/// Identifier wrapper for allocation rows.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AllocationId(pub u64);

/// Binding of one approved application to one locker within one form.
/// At most one row exists per (student, form) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub id: AllocationId,
    pub form: FormKey,
    pub student: StudentId,
    pub apply: ApplyId,
    pub locker: LockerName,
}

/// Read view returned by allocation paths, joining the entities a caller
/// needs to notify the student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub student: Student,
    pub apply_id: ApplyId,
    pub form: FormKey,
    pub locker: Locker,
}

/// A replacement application joined with its breakage report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedApply {
    pub apply: Apply,
    pub report: Report,
}
