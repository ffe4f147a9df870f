//! Integer percent arithmetic.
//!
//! Every percent-typed value uses `100` as unity. All operations truncate
//! toward zero, matching the game's integer semantics, so the order in which
//! factors are composed matters and is part of each formula.
//!
//! Operands are accepted as anything convertible into `Option<i64>`. A `None`
//! operand means "absent" and defaults to unity (or to zero for
//! [`accumulate`], whose operands are reductions rather than multipliers).
//!
//! # Examples
//!
//! ```rust
//! use towerstat::percent;
//!
//! assert_eq!(percent::multiply([150, 133]), 199);
//! assert_eq!(percent::sum([110, 120]), 130);
//! assert_eq!(percent::accumulate([50, 50]), 75);
//! assert_eq!(percent::divide(300, 150), Some(200));
//! ```

use serde::{Deserialize, Serialize};

/// The neutral percent (×1.0).
pub const UNITY: i64 = 100;

/// Compose percents multiplicatively: pairwise `trunc(a * b / 100)`, folded left.
///
/// With a single operand the operand itself is returned; with none, unity.
pub fn multiply<I, V>(values: I) -> i64
where
    I: IntoIterator<Item = V>,
    V: Into<Option<i64>>,
{
    values
        .into_iter()
        .map(|v| v.into().unwrap_or(UNITY))
        .fold(UNITY, |acc, v| acc * v / UNITY)
}

/// Stack percents additively: each operand contributes `v - 100`.
///
/// Three +10% bonuses give 130, not 133.
pub fn sum<I, V>(values: I) -> i64
where
    I: IntoIterator<Item = V>,
    V: Into<Option<i64>>,
{
    values
        .into_iter()
        .map(|v| v.into().unwrap_or(UNITY))
        .fold(UNITY, |acc, v| acc + (v - UNITY))
}

/// The larger of mutually exclusive percents, absent operands counting as unity.
pub fn max<I, V>(values: I) -> i64
where
    I: IntoIterator<Item = V>,
    V: Into<Option<i64>>,
{
    values
        .into_iter()
        .map(|v| v.into().unwrap_or(UNITY))
        .max()
        .unwrap_or(UNITY)
}

/// The smaller of mutually exclusive percents, absent operands counting as unity.
pub fn min<I, V>(values: I) -> i64
where
    I: IntoIterator<Item = V>,
    V: Into<Option<i64>>,
{
    values
        .into_iter()
        .map(|v| v.into().unwrap_or(UNITY))
        .min()
        .unwrap_or(UNITY)
}

/// `trunc(v1 * 100 / v2)`. Both operands default to unity.
///
/// Returns `None` when dividing by zero.
pub fn divide(v1: impl Into<Option<i64>>, v2: impl Into<Option<i64>>) -> Option<i64> {
    let v1 = v1.into().unwrap_or(UNITY);
    let v2 = v2.into().unwrap_or(UNITY);
    if v2 == 0 {
        return None;
    }
    Some(v1 * UNITY / v2)
}

/// Diminishing-returns stacking of reductions (damage cuts, evasion).
///
/// Equivalent to folding `100 - multiply(100 - a, 100 - b)`; absent operands
/// count as 0%. Two independent 50% cuts give 75%.
pub fn accumulate<I, V>(values: I) -> i64
where
    I: IntoIterator<Item = V>,
    V: Into<Option<i64>>,
{
    let remaining = values
        .into_iter()
        .map(|v| UNITY - v.into().unwrap_or(0))
        .fold(UNITY, |acc, v| acc * v / UNITY);
    UNITY - remaining
}

/// Combine two optional operands, keeping `None` only when both are absent.
pub(crate) fn merge_with(
    a: Option<i64>,
    b: Option<i64>,
    combine: impl FnOnce(Option<i64>, Option<i64>) -> i64,
) -> Option<i64> {
    match (a, b) {
        (None, None) => None,
        _ => Some(combine(a, b)),
    }
}

/// Counts attack ticks that fit into an elapsed time window.
///
/// Used by damage-over-time style static damage: `time / interval` full
/// cycles, plus one more tick if the remainder reaches the attack motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accumulation {
    /// Frames from the start of a cycle until the hit lands.
    pub attack_speed: i64,
    /// Frames per full attack cycle.
    pub interval: i64,
    /// Elapsed frames.
    pub time: i64,
}

impl Accumulation {
    /// Number of ticks landing within `time`.
    pub fn calculate(&self) -> i64 {
        if self.interval <= 0 {
            return 0;
        }
        let extra = if self.time % self.interval >= self.attack_speed {
            1
        } else {
            0
        };
        self.time / self.interval + extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiply_truncates() {
        assert_eq!(multiply([150, 133]), 199);
        assert_eq!(multiply([1075, 120]), 1290);
        assert_eq!(multiply([-150, 133]), -199);
    }

    #[test]
    fn test_multiply_defaults() {
        let none: [Option<i64>; 0] = [];
        assert_eq!(multiply(none), 100);
        assert_eq!(multiply([Some(120), None]), 120);
        assert_eq!(multiply([None, Some(80), Some(50)]), 40);
    }

    #[test]
    fn test_multiply_order_sensitive() {
        // trunc(trunc(33 * 150 / 100) * 150 / 100) = trunc(49 * 1.5) = 73
        assert_eq!(multiply([33, 150, 150]), 73);
        assert_eq!(multiply([150, 150, 33]), 74);
    }

    #[test]
    fn test_sum() {
        assert_eq!(sum([100, 100]), 100);
        assert_eq!(sum([110, 120]), 130);
        assert_eq!(sum([110, 110, 110]), 130);
        assert_eq!(sum([Some(80), None, Some(130)]), 110);
    }

    #[test]
    fn test_max_min() {
        assert_eq!(max([Some(90), None]), 100);
        assert_eq!(max([120, 130]), 130);
        assert_eq!(min([Some(90), None]), 90);
    }

    #[test]
    fn test_divide() {
        assert_eq!(divide(300, 150), Some(200));
        assert_eq!(divide(None, None), Some(100));
        assert_eq!(divide(100, 0), None);
        assert_eq!(divide(100, 130), Some(76));
    }

    #[test]
    fn test_accumulate() {
        assert_eq!(accumulate([50, 50]), 75);
        assert_eq!(accumulate([Some(30), None]), 30);
        assert_eq!(accumulate([100, 20]), 100);
    }

    #[test]
    fn test_merge_with() {
        assert_eq!(merge_with(None, None, |a, b| sum([a, b])), None);
        assert_eq!(merge_with(Some(120), None, |a, b| sum([a, b])), Some(120));
    }

    #[test]
    fn test_accumulation_ticks() {
        let acc = Accumulation {
            attack_speed: 20,
            interval: 60,
            time: 150,
        };
        // two full cycles, remainder 30 >= 20
        assert_eq!(acc.calculate(), 3);

        let acc = Accumulation {
            attack_speed: 40,
            interval: 60,
            time: 150,
        };
        assert_eq!(acc.calculate(), 2);

        let acc = Accumulation {
            attack_speed: 10,
            interval: 0,
            time: 150,
        };
        assert_eq!(acc.calculate(), 0);
    }
}
