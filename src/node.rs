//! Computation nodes.
//!
//! A [`StatNode`] is the cache half of a derived stat: one [`Memo`] per
//! accessor (value, sort key, text, item, color, styles, factors), each keyed
//! independently on the `Setting` reference. The calculation half is a
//! [`Calculator`], a small borrowed view (e.g. "attack of this situation at
//! the In-Battle stage") that knows how to compute the value from the owning
//! unit or situation. [`Stat`] pairs the two.
//!
//! Nodes live inside the [`Unit`](crate::unit::Unit) or
//! [`Situation`](crate::situation::Situation) that owns them and are reused
//! across renders.

use crate::memo::Memo;
use crate::setting::Setting;
use crate::value::{NodeValue, SortKey};
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// Color classification of a stat cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    Positive,
    Negative,
    WeakPositive,
    WeakNegative,
    StrongPositive,
    StrongNegative,
    Warning,
    Info,
}

/// Style flags handed to the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Styles {
    pub color: Option<Color>,
    /// The stat does not apply to this unit.
    pub inapplicable: bool,
}

/// Display payload of a stat cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Item {
    Text { text: String },
    /// Text plus the serialized factor record, for tooltips.
    Breakdown {
        text: String,
        factors: serde_json::Value,
    },
}

/// How a stat is computed.
///
/// Only [`calculate`](Calculator::calculate) is required. Every method must be
/// a pure function of the calculator's captured data and the setting.
pub trait Calculator {
    type Value: NodeValue;
    type Factors: Clone + Serialize;

    fn calculate(&self, setting: &Rc<Setting>) -> Option<Self::Value>;

    fn factors(&self, _setting: &Rc<Setting>) -> Option<Self::Factors> {
        None
    }

    /// Lower-is-better column.
    fn is_reversed(&self) -> bool {
        false
    }

    fn color(&self, _setting: &Rc<Setting>, _value: Option<&Self::Value>) -> Option<Color> {
        None
    }

    fn text(&self, _setting: &Rc<Setting>, value: Option<&Self::Value>) -> Option<String> {
        value.map(NodeValue::to_text)
    }
}

/// Per-accessor caches of one derived stat.
pub struct StatNode<V, F> {
    value: Memo<Option<V>>,
    factors: Memo<Option<F>>,
    sort_key: Memo<Option<SortKey>>,
    text: Memo<Option<String>>,
    item: Memo<Option<Item>>,
    color: Memo<Option<Color>>,
    styles: Memo<Styles>,
}

impl<V: NodeValue, F: Clone + Serialize> StatNode<V, F> {
    pub fn new() -> Self {
        Self {
            value: Memo::new(),
            factors: Memo::new(),
            sort_key: Memo::new(),
            text: Memo::new(),
            item: Memo::new(),
            color: Memo::new(),
            styles: Memo::new(),
        }
    }

    /// View this node through `calc`.
    pub fn with<C>(&self, calc: C) -> Stat<'_, C>
    where
        C: Calculator<Value = V, Factors = F>,
    {
        Stat { node: self, calc }
    }

    /// Drop every cached accessor.
    pub fn invalidate(&self) {
        self.value.invalidate();
        self.factors.invalidate();
        self.sort_key.invalidate();
        self.text.invalidate();
        self.item.invalidate();
        self.color.invalidate();
        self.styles.invalidate();
    }
}

impl<V: NodeValue, F: Clone + Serialize> Default for StatNode<V, F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, F> fmt::Debug for StatNode<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatNode")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// A node viewed through its calculator.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use towerstat::node::{Calculator, StatNode};
/// use towerstat::Setting;
///
/// struct Doubled(i64);
///
/// impl Calculator for Doubled {
///     type Value = i64;
///     type Factors = ();
///
///     fn calculate(&self, _setting: &Rc<Setting>) -> Option<i64> {
///         Some(self.0 * 2)
///     }
/// }
///
/// let node = StatNode::new();
/// let stat = node.with(Doubled(21));
/// let setting = Rc::new(Setting::default());
/// assert_eq!(stat.value(&setting), Some(42));
/// assert_eq!(stat.text(&setting).as_deref(), Some("42"));
/// ```
pub struct Stat<'a, C: Calculator> {
    node: &'a StatNode<C::Value, C::Factors>,
    calc: C,
}

impl<C: Calculator> Stat<'_, C> {
    /// The stat value, or `None` when it does not apply.
    pub fn value(&self, setting: &Rc<Setting>) -> Option<C::Value> {
        self.node
            .value
            .get_or_compute(setting, || self.calc.calculate(setting))
    }

    /// The factor record the value was derived from.
    pub fn factors(&self, setting: &Rc<Setting>) -> Option<C::Factors> {
        self.node
            .factors
            .get_or_compute(setting, || self.calc.factors(setting))
    }

    /// Numbers sort by magnitude (negated for lower-is-better columns), labels verbatim.
    pub fn sort_order(&self, setting: &Rc<Setting>) -> Option<SortKey> {
        self.node.sort_key.get_or_compute(setting, || {
            self.value(setting)
                .map(|v| v.sort_key(self.calc.is_reversed()))
        })
    }

    /// Display text of the value.
    pub fn text(&self, setting: &Rc<Setting>) -> Option<String> {
        self.node.text.get_or_compute(setting, || {
            let value = self.value(setting);
            self.calc.text(setting, value.as_ref())
        })
    }

    /// Display text plus the serialized factors, when the stat has any.
    pub fn item(&self, setting: &Rc<Setting>) -> Option<Item> {
        self.node.item.get_or_compute(setting, || {
            let text = self.text(setting)?;
            let factors = self
                .factors(setting)
                .and_then(|f| serde_json::to_value(f).ok());
            Some(match factors {
                Some(factors) => Item::Breakdown { text, factors },
                None => Item::Text { text },
            })
        })
    }

    /// Color class relative to the previous stage.
    pub fn color(&self, setting: &Rc<Setting>) -> Option<Color> {
        self.node.color.get_or_compute(setting, || {
            let value = self.value(setting);
            self.calc.color(setting, value.as_ref())
        })
    }

    /// Color and applicability, for the renderer.
    pub fn styles(&self, setting: &Rc<Setting>) -> Styles {
        self.node.styles.get_or_compute(setting, || Styles {
            color: self.color(setting),
            inapplicable: self.value(setting).is_none(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Counting<'a> {
        calls: &'a Cell<u32>,
        value: Option<i64>,
        reversed: bool,
    }

    impl Calculator for Counting<'_> {
        type Value = i64;
        type Factors = Vec<i64>;

        fn calculate(&self, _setting: &Rc<Setting>) -> Option<i64> {
            self.calls.set(self.calls.get() + 1);
            self.value
        }

        fn factors(&self, _setting: &Rc<Setting>) -> Option<Vec<i64>> {
            self.value.map(|v| vec![v, 100])
        }

        fn is_reversed(&self) -> bool {
            self.reversed
        }

        fn color(&self, _setting: &Rc<Setting>, value: Option<&i64>) -> Option<Color> {
            value.filter(|v| **v > 100).map(|_| Color::Positive)
        }
    }

    fn counting(calls: &Cell<u32>, value: Option<i64>) -> Counting<'_> {
        Counting {
            calls,
            value,
            reversed: false,
        }
    }

    #[test]
    fn test_value_memoized_by_reference() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(counting(&calls, Some(120)));
        let setting = Rc::new(Setting::default());

        assert_eq!(stat.value(&setting), Some(120));
        assert_eq!(stat.value(&setting), Some(120));
        assert_eq!(calls.get(), 1);

        let equal = Rc::new((*setting).clone());
        assert_eq!(stat.value(&equal), Some(120));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_derived_accessors_share_value() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(counting(&calls, Some(150)));
        let setting = Rc::new(Setting::default());

        assert_eq!(stat.text(&setting).as_deref(), Some("150"));
        assert_eq!(stat.sort_order(&setting), Some(SortKey::Number(150.0)));
        assert_eq!(stat.color(&setting), Some(Color::Positive));
        assert_eq!(
            stat.styles(&setting),
            Styles {
                color: Some(Color::Positive),
                inapplicable: false
            }
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_item_carries_factors() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(counting(&calls, Some(7)));
        let setting = Rc::new(Setting::default());

        match stat.item(&setting) {
            Some(Item::Breakdown { text, factors }) => {
                assert_eq!(text, "7");
                assert_eq!(factors, serde_json::json!([7, 100]));
            }
            other => panic!("expected breakdown, got {:?}", other),
        }
    }

    #[test]
    fn test_inapplicable_stat() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(counting(&calls, None));
        let setting = Rc::new(Setting::default());

        assert_eq!(stat.value(&setting), None);
        assert_eq!(stat.text(&setting), None);
        assert_eq!(stat.item(&setting), None);
        assert!(stat.styles(&setting).inapplicable);
    }

    #[test]
    fn test_reversed_sort_order() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(Counting {
            calls: &calls,
            value: Some(30),
            reversed: true,
        });
        let setting = Rc::new(Setting::default());
        assert_eq!(stat.sort_order(&setting), Some(SortKey::Number(-30.0)));
    }

    #[test]
    fn test_invalidate() {
        let calls = Cell::new(0);
        let node = StatNode::new();
        let stat = node.with(counting(&calls, Some(1)));
        let setting = Rc::new(Setting::default());

        stat.value(&setting);
        node.invalidate();
        stat.value(&setting);
        assert_eq!(calls.get(), 2);
    }
}
