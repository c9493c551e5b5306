use super::common::*;
use crate::locker::domain::{Apply, ApplyId, ApplyPeriod, ApplyStatus, LockerFloor, LockerName};
use crate::locker::selection::SelectionError;
use crate::locker::storage::{AllocationStore, LockerStore, NewAllocation};

fn pending_apply(
    first: Option<crate::locker::domain::LockerChoice>,
    second: Option<crate::locker::domain::LockerChoice>,
) -> Apply {
    Apply {
        id: ApplyId(1),
        student: default_students()[0].id,
        form: form_key(),
        first_choice: first,
        second_choice: second,
        period: ApplyPeriod::Primary,
        status: ApplyStatus::Apply,
    }
}

fn bind(stack: &Stack, name: &str) {
    stack
        .store
        .insert_allocation(NewAllocation {
            form: form_key(),
            student: default_students()[2].id,
            apply: ApplyId(77),
            locker: LockerName(name.to_string()),
        })
        .expect("bind locker");
}

#[test]
fn named_lookup_fails_for_unknown_locker() {
    let stack = seeded_stack();
    match stack
        .selector()
        .locker_by_name(&LockerName("Z-9".to_string()), &open_form(), default_students()[0].id)
    {
        Err(SelectionError::NotFound) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn named_lookup_rejects_broken_locker() {
    let stack = seeded_stack();
    seed_lockers(&stack, [locker("A-1", LockerFloor::First, 1)]);
    stack
        .store
        .set_broken(&LockerName("A-1".to_string()), true)
        .expect("mark broken");

    match stack
        .selector()
        .locker_by_name(&LockerName("A-1".to_string()), &open_form(), default_students()[0].id)
    {
        Err(SelectionError::Broken) => {}
        other => panic!("expected broken, got {other:?}"),
    }
}

#[test]
fn named_lookup_rejects_bound_locker() {
    let stack = seeded_stack();
    seed_lockers(&stack, [locker("A-1", LockerFloor::First, 1)]);
    bind(&stack, "A-1");

    match stack
        .selector()
        .locker_by_name(&LockerName("A-1".to_string()), &open_form(), default_students()[0].id)
    {
        Err(SelectionError::AlreadyAllocated) => {}
        other => panic!("expected already allocated, got {other:?}"),
    }
}

#[test]
fn random_prefers_first_choice() {
    let stack = seeded_stack();
    seed_lockers(
        &stack,
        [
            locker("A-1", LockerFloor::First, 1),
            locker("B-1", LockerFloor::Second, 1),
            locker("C-1", LockerFloor::Third, 1),
        ],
    );

    let apply = pending_apply(
        Some(choice(LockerFloor::Third, 1)),
        Some(choice(LockerFloor::Second, 1)),
    );
    let picked = stack.selector().random_locker(&apply).expect("pick");
    assert_eq!(picked.name, LockerName("C-1".to_string()));
}

#[test]
fn random_falls_back_to_second_choice() {
    let stack = seeded_stack();
    seed_lockers(
        &stack,
        [
            locker("A-1", LockerFloor::First, 1),
            locker("B-1", LockerFloor::Second, 1),
        ],
    );
    bind(&stack, "B-1");

    let apply = pending_apply(
        Some(choice(LockerFloor::Second, 1)),
        Some(choice(LockerFloor::First, 1)),
    );
    let picked = stack.selector().random_locker(&apply).expect("pick");
    assert_eq!(picked.name, LockerName("A-1".to_string()));
}

#[test]
fn random_falls_back_to_pool_in_name_order() {
    let stack = seeded_stack();
    seed_lockers(
        &stack,
        [
            locker("C-2", LockerFloor::Third, 2),
            locker("A-9", LockerFloor::First, 9),
            locker("B-5", LockerFloor::Second, 5),
        ],
    );

    // Neither choice matches anything in the pool.
    let apply = pending_apply(
        Some(choice(LockerFloor::Fourth, 1)),
        Some(choice(LockerFloor::Fourth, 2)),
    );
    let picked = stack.selector().random_locker(&apply).expect("pick");
    assert_eq!(picked.name, LockerName("A-9".to_string()));
}

#[test]
fn random_never_returns_broken_or_bound_lockers() {
    let stack = seeded_stack();
    seed_lockers(
        &stack,
        [
            locker("A-1", LockerFloor::First, 1),
            locker("A-2", LockerFloor::First, 1),
            locker("A-3", LockerFloor::First, 1),
        ],
    );
    stack
        .store
        .set_broken(&LockerName("A-1".to_string()), true)
        .expect("mark broken");
    bind(&stack, "A-2");

    let apply = pending_apply(Some(choice(LockerFloor::First, 1)), None);
    let picked = stack.selector().random_locker(&apply).expect("pick");
    assert_eq!(picked.name, LockerName("A-3".to_string()));
}

#[test]
fn random_fails_pool_exhausted_when_nothing_eligible() {
    let stack = seeded_stack();
    seed_lockers(
        &stack,
        [
            locker("A-1", LockerFloor::First, 1),
            locker("A-2", LockerFloor::First, 2),
        ],
    );
    stack
        .store
        .set_broken(&LockerName("A-1".to_string()), true)
        .expect("mark broken");
    bind(&stack, "A-2");

    let apply = pending_apply(None, None);
    match stack.selector().random_locker(&apply) {
        Err(SelectionError::PoolExhausted) => {}
        other => panic!("expected pool exhausted, got {other:?}"),
    }
}

#[test]
fn own_binding_never_blocks_reselection() {
    let stack = seeded_stack();
    seed_lockers(&stack, [locker("A-1", LockerFloor::First, 1)]);
    let who = &default_students()[0];
    stack
        .store
        .insert_allocation(NewAllocation {
            form: form_key(),
            student: who.id,
            apply: ApplyId(10),
            locker: LockerName("A-1".to_string()),
        })
        .expect("own binding");

    let picked = stack
        .selector()
        .locker_by_name(&LockerName("A-1".to_string()), &open_form(), who.id)
        .expect("own locker stays selectable");
    assert_eq!(picked.name, LockerName("A-1".to_string()));

    let mut apply = pending_apply(Some(choice(LockerFloor::First, 1)), None);
    apply.student = who.id;
    let picked = stack.selector().random_locker(&apply).expect("pick");
    assert_eq!(picked.name, LockerName("A-1".to_string()));
}

#[test]
fn bound_check_is_scoped_to_the_form() {
    let stack = seeded_stack();
    seed_lockers(&stack, [locker("A-1", LockerFloor::First, 1)]);

    // Binding in an older cycle does not occupy the locker now.
    stack
        .store
        .insert_allocation(NewAllocation {
            form: crate::locker::domain::FormKey {
                year: 2023,
                semester: 2,
            },
            student: default_students()[2].id,
            apply: ApplyId(50),
            locker: LockerName("A-1".to_string()),
        })
        .expect("old binding");

    let picked = stack
        .selector()
        .locker_by_name(&LockerName("A-1".to_string()), &open_form(), default_students()[0].id)
        .expect("still selectable this cycle");
    assert_eq!(picked.name, LockerName("A-1".to_string()));
}
