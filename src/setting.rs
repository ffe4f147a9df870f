//! User configuration.
//!
//! [`Setting`] is a flat value object holding every knob the engine reads.
//! It is shared as `Rc<Setting>` and is also the cache key of every memoized
//! stat, by pointer identity. Never mutate a shared setting in place; build a
//! new one with [`Setting::update`].

use crate::data::Element;
use crate::stat_key::{CoreStat, DPS_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;

/// How much of an optional upgrade (potentials, weapon) is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    All,
    Partial,
    None,
}

/// The engine configuration.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use towerstat::setting::{Mode, Setting};
///
/// let setting = Rc::new(Setting::default());
/// assert_eq!(setting.potential, Mode::Partial);
///
/// let next = Setting::update(&setting, |s| s.potential = Mode::All);
/// assert!(!Rc::ptr_eq(&setting, &next));
/// assert_eq!(next.potential, Mode::All);
/// assert_eq!(setting.potential, Mode::Partial);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Setting {
    pub potential: Mode,
    pub weapon: Mode,
    pub subskill1: Option<u32>,
    pub subskill2: Option<u32>,
    /// Units whose formation buffs are active.
    pub formation_buffs: Vec<u32>,
    pub formation_hp: i64,
    pub formation_attack: i64,
    pub formation_defense: i64,
    pub formation_resist: i64,
    pub formation_cost: i64,
    pub environment_hp: i64,
    pub environment_attack: i64,
    pub environment_defense: i64,
    pub environment_resist: i64,
    pub beast_formation: Option<u32>,
    pub beast_possession: Option<u32>,
    pub type_bonus_element: Option<Element>,
    pub type_bonus_hp: i64,
    pub type_bonus_attack: i64,
    pub type_bonus_defense: i64,
    pub type_bonus_resist: i64,
    pub field_element: Option<Element>,
    pub field_element_bonus: i64,
    /// Same-element panel toggles.
    pub panel_elements: BTreeSet<Element>,
    pub panel_hp_mul: i64,
    pub panel_attack_mul: i64,
    pub panel_defense_mul: i64,
    pub panel_resist_mul: i64,
    pub panel_hp_add: i64,
    pub panel_attack_add: i64,
    pub panel_defense_add: i64,
    pub panel_resist_add: i64,
    pub panel_damage_factor: i64,
    pub limit_break_damage: i64,
    /// Enemy defense per DPS column.
    pub dps_defense: [i64; DPS_COLUMNS],
    /// Enemy resist per DPS column.
    pub dps_resist: [i64; DPS_COLUMNS],
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            potential: Mode::Partial,
            weapon: Mode::All,
            subskill1: None,
            subskill2: None,
            formation_buffs: Vec::new(),
            formation_hp: 100,
            formation_attack: 100,
            formation_defense: 100,
            formation_resist: 100,
            formation_cost: 100,
            environment_hp: 100,
            environment_attack: 100,
            environment_defense: 100,
            environment_resist: 100,
            beast_formation: None,
            beast_possession: None,
            type_bonus_element: None,
            type_bonus_hp: 100,
            type_bonus_attack: 100,
            type_bonus_defense: 100,
            type_bonus_resist: 100,
            field_element: None,
            field_element_bonus: 120,
            panel_elements: BTreeSet::new(),
            panel_hp_mul: 100,
            panel_attack_mul: 100,
            panel_defense_mul: 100,
            panel_resist_mul: 100,
            panel_hp_add: 0,
            panel_attack_add: 0,
            panel_defense_add: 0,
            panel_resist_add: 0,
            panel_damage_factor: 100,
            limit_break_damage: 100,
            dps_defense: [0, 500, 1000, 1500, 2000],
            dps_resist: [0, 20, 40, 60, 80],
        }
    }
}

impl Setting {
    /// Publish a modified copy of `setting` under a new reference.
    pub fn update(setting: &Rc<Setting>, change: impl FnOnce(&mut Setting)) -> Rc<Setting> {
        let mut next = (**setting).clone();
        change(&mut next);
        Rc::new(next)
    }

    /// Whether potential bonuses (including feature `potential_bonus`) apply in full.
    pub fn is_potential_applied(&self) -> bool {
        self.potential == Mode::All
    }

    /// Equipped subskill ids, slot order.
    pub fn subskills(&self) -> impl Iterator<Item = u32> + '_ {
        self.subskill1.into_iter().chain(self.subskill2)
    }

    /// Manual formation percent for a core stat.
    pub fn formation(&self, stat: CoreStat) -> i64 {
        match stat {
            CoreStat::Hp => self.formation_hp,
            CoreStat::Attack => self.formation_attack,
            CoreStat::Defense => self.formation_defense,
            CoreStat::Resist => self.formation_resist,
        }
    }

    /// Stage environment percent for a core stat.
    pub fn environment(&self, stat: CoreStat) -> i64 {
        match stat {
            CoreStat::Hp => self.environment_hp,
            CoreStat::Attack => self.environment_attack,
            CoreStat::Defense => self.environment_defense,
            CoreStat::Resist => self.environment_resist,
        }
    }

    /// Type bonus percent, applied to units of `type_bonus_element`.
    pub fn type_bonus(&self, stat: CoreStat) -> i64 {
        match stat {
            CoreStat::Hp => self.type_bonus_hp,
            CoreStat::Attack => self.type_bonus_attack,
            CoreStat::Defense => self.type_bonus_defense,
            CoreStat::Resist => self.type_bonus_resist,
        }
    }

    /// In-battle panel percent for a core stat.
    pub fn panel_mul(&self, stat: CoreStat) -> i64 {
        match stat {
            CoreStat::Hp => self.panel_hp_mul,
            CoreStat::Attack => self.panel_attack_mul,
            CoreStat::Defense => self.panel_defense_mul,
            CoreStat::Resist => self.panel_resist_mul,
        }
    }

    /// In-battle flat panel addition for a core stat.
    pub fn panel_add(&self, stat: CoreStat) -> i64 {
        match stat {
            CoreStat::Hp => self.panel_hp_add,
            CoreStat::Attack => self.panel_attack_add,
            CoreStat::Defense => self.panel_defense_add,
            CoreStat::Resist => self.panel_resist_add,
        }
    }

    /// Field elements the setting itself declares active.
    pub fn field_elements(&self) -> BTreeSet<Element> {
        let mut elements = self.panel_elements.clone();
        elements.extend(self.field_element);
        elements
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let setting = Setting::default();
        assert_eq!(setting.potential, Mode::Partial);
        assert_eq!(setting.weapon, Mode::All);
        assert_eq!(setting.formation(CoreStat::Attack), 100);
        assert_eq!(setting.panel_add(CoreStat::Hp), 0);
        assert_eq!(setting.dps_defense[2], 1000);
        assert!(!setting.is_potential_applied());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let setting: Setting =
            serde_json::from_str(r#"{ "potential": "all", "subskill2": 4 }"#).unwrap();
        assert!(setting.is_potential_applied());
        assert_eq!(setting.subskills().collect::<Vec<_>>(), vec![4]);
        assert_eq!(setting.field_element_bonus, 120);
    }

    #[test]
    fn test_update_publishes_new_reference() {
        let setting = Rc::new(Setting::default());
        let next = Setting::update(&setting, |s| s.field_element = Some(Element::Fire));
        assert!(!Rc::ptr_eq(&setting, &next));
        assert!(setting.field_elements().is_empty());
        assert!(next.field_elements().contains(&Element::Fire));
    }
}
