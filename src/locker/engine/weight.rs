use crate::locker::domain::Apply;

/// Bulk-allocation priority weight for the dues signal.
pub const DUES_BONUS: i32 = 100;

/// Priority weight assigned to a pending application during a bulk run.
/// Higher weights allocate first; ties keep retrieval order.
pub trait WeightPolicy: Send + Sync {
    fn weight(&self, apply: &Apply, paid_dues: bool) -> i32;
}

/// Default rule: dues payers get a flat bonus, everyone else weighs zero.
#[derive(Debug, Clone)]
pub struct DuesWeight {
    pub dues_bonus: i32,
}

impl Default for DuesWeight {
    fn default() -> Self {
        Self {
            dues_bonus: DUES_BONUS,
        }
    }
}

impl WeightPolicy for DuesWeight {
    fn weight(&self, _apply: &Apply, paid_dues: bool) -> i32 {
        if paid_dues {
            self.dues_bonus
        } else {
            0
        }
    }
}
