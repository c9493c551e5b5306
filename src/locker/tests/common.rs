use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, Utc};

use crate::locker::applies::{ApplyService, ApplySubmission};
use crate::locker::domain::{
    ApplyForm, FormKey, FormStatus, Locker, LockerChoice, LockerFloor, LockerName,
    PeriodWindow, Student, StudentId,
};
use crate::locker::engine::AllocationEngine;
use crate::locker::forms::ApplyFormService;
use crate::locker::selection::LockerSelector;
use crate::locker::storage::{
    CommitGate, DirectoryError, DuesLedger, FormStore, LockerStore, MemoryStore,
    StudentDirectory,
};

pub(super) const GATE_BUDGET: Duration = Duration::from_millis(250);

pub(super) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(super) fn open_window() -> PeriodWindow {
    PeriodWindow {
        opens_at: now() - chrono::Duration::hours(1),
        closes_at: now() + chrono::Duration::hours(1),
    }
}

pub(super) fn closed_window() -> PeriodWindow {
    PeriodWindow {
        opens_at: now() - chrono::Duration::hours(3),
        closes_at: now() - chrono::Duration::hours(2),
    }
}

pub(super) fn form_key() -> FormKey {
    FormKey {
        year: 2024,
        semester: 2,
    }
}

/// Active form with every period window currently open.
pub(super) fn open_form() -> ApplyForm {
    ApplyForm {
        key: form_key(),
        status: FormStatus::Active,
        primary: open_window(),
        additional: open_window(),
        replacement: open_window(),
    }
}

pub(super) fn locker(name: &str, floor: LockerFloor, height: u8) -> Locker {
    Locker {
        name: LockerName(name.to_string()),
        floor,
        height,
        access_code: "1234".to_string(),
        broken: false,
    }
}

pub(super) fn choice(floor: LockerFloor, height: u8) -> LockerChoice {
    LockerChoice { floor, height }
}

pub(super) fn student(id: u64, name: &str, number: &str) -> Student {
    Student {
        id: StudentId(id),
        name: name.to_string(),
        number: number.to_string(),
    }
}

pub(super) fn default_students() -> Vec<Student> {
    vec![
        student(1, "Alice Kim", "2024-0001"),
        student(2, "Bora Lee", "2024-0002"),
        student(3, "Chan-woo Jung", "2024-0003"),
    ]
}

pub(super) fn submission(who: &Student, first: Option<LockerChoice>) -> ApplySubmission {
    ApplySubmission {
        student_name: who.name.clone(),
        student_number: who.number.clone(),
        first_choice: first,
        second_choice: None,
    }
}

pub(super) struct FixedDirectory {
    students: Vec<Student>,
}

impl FixedDirectory {
    pub(super) fn with_students(students: Vec<Student>) -> Self {
        Self { students }
    }
}

impl StudentDirectory for FixedDirectory {
    fn find_by_number(&self, number: &str) -> Result<Option<Student>, DirectoryError> {
        Ok(self
            .students
            .iter()
            .find(|student| student.number == number)
            .cloned())
    }

    fn find_by_name_and_number(
        &self,
        name: &str,
        number: &str,
    ) -> Result<Option<Student>, DirectoryError> {
        Ok(self
            .students
            .iter()
            .find(|student| student.name == name && student.number == number)
            .cloned())
    }

    fn find_by_id(&self, id: StudentId) -> Result<Option<Student>, DirectoryError> {
        Ok(self.students.iter().find(|student| student.id == id).cloned())
    }
}

pub(super) struct FixedLedger {
    paying: HashSet<StudentId>,
}

impl FixedLedger {
    pub(super) fn paying(ids: impl IntoIterator<Item = StudentId>) -> Self {
        Self {
            paying: ids.into_iter().collect(),
        }
    }

    pub(super) fn nobody() -> Self {
        Self::paying([])
    }
}

impl DuesLedger for FixedLedger {
    fn is_dues(&self, student: StudentId) -> Result<bool, DirectoryError> {
        Ok(self.paying.contains(&student))
    }
}

/// One wired set of collaborators over a shared in-memory store.
pub(super) struct Stack {
    pub(super) store: Arc<MemoryStore>,
    pub(super) directory: Arc<FixedDirectory>,
    pub(super) ledger: Arc<FixedLedger>,
    pub(super) gate: Arc<CommitGate>,
}

impl Stack {
    pub(super) fn forms(&self) -> ApplyFormService<MemoryStore> {
        ApplyFormService::new(self.store.clone(), self.gate.clone(), GATE_BUDGET)
    }

    pub(super) fn applies(&self) -> ApplyService<MemoryStore, FixedDirectory> {
        ApplyService::new(
            self.store.clone(),
            self.directory.clone(),
            self.gate.clone(),
            GATE_BUDGET,
        )
    }

    pub(super) fn selector(&self) -> LockerSelector<MemoryStore> {
        LockerSelector::new(self.store.clone())
    }

    pub(super) fn engine(&self) -> AllocationEngine<MemoryStore, FixedDirectory, FixedLedger> {
        self.engine_with_budget(GATE_BUDGET)
    }

    pub(super) fn engine_with_budget(
        &self,
        budget: Duration,
    ) -> AllocationEngine<MemoryStore, FixedDirectory, FixedLedger> {
        AllocationEngine::new(
            self.store.clone(),
            self.directory.clone(),
            self.ledger.clone(),
            self.gate.clone(),
            budget,
        )
    }
}

pub(super) fn stack_with(students: Vec<Student>, ledger: FixedLedger) -> Stack {
    Stack {
        store: Arc::new(MemoryStore::new()),
        directory: Arc::new(FixedDirectory::with_students(students)),
        ledger: Arc::new(ledger),
        gate: Arc::new(CommitGate::new()),
    }
}

/// Default students, nobody paying dues, active form with open windows.
pub(super) fn seeded_stack() -> Stack {
    let stack = stack_with(default_students(), FixedLedger::nobody());
    stack
        .store
        .insert_form(open_form())
        .expect("seed active form");
    stack
}

pub(super) fn seed_lockers(stack: &Stack, lockers: impl IntoIterator<Item = Locker>) {
    for locker in lockers {
        stack.store.insert_locker(locker).expect("seed locker");
    }
}
