//! Stat identifiers.
//!
//! Stats are a closed set, so they are an enum rather than interned strings.
//! [`StatKey`] names a column, [`Stage`] names a step of the pipeline, and a
//! [`StatRef`] pairs the two so features can refer to "the in-battle HP" of
//! the unit they are attached to.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of enemy-defense columns a DPS stat can be computed for.
pub const DPS_COLUMNS: usize = 5;

/// The four core stats that run through the full Base → Actual pipeline.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CoreStat {
    Hp,
    Attack,
    Defense,
    Resist,
}

impl CoreStat {
    pub const ALL: [CoreStat; 4] = [
        CoreStat::Hp,
        CoreStat::Attack,
        CoreStat::Defense,
        CoreStat::Resist,
    ];

    /// The column of this core stat.
    pub fn key(self) -> StatKey {
        match self {
            CoreStat::Hp => StatKey::Hp,
            CoreStat::Attack => StatKey::Attack,
            CoreStat::Defense => StatKey::Defense,
            CoreStat::Resist => StatKey::Resist,
        }
    }
}

/// A stat column.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatKey {
    Hp,
    Attack,
    Defense,
    Resist,
    Cost,
    Range,
    Delay,
    AttackSpeed,
    Interval,
    Block,
    Target,
    Rounds,
    Hits,
    CriticalChance,
    CriticalDamage,
    CriticalAttack,
    Penetration,
    Cooldown,
    InitialTime,
    Duration,
    MoveSpeed,
    PhysicalDamageCut,
    MagicalDamageCut,
    PhysicalEvasion,
    MagicalEvasion,
    /// Damage per second against the enemy in DPS column `n`.
    Dps(u8),
}

impl StatKey {
    /// Stats a [`Unit`](crate::unit::Unit) resolves through Base, Barrack and Deployment.
    pub const UNIT_KEYS: [StatKey; 10] = [
        StatKey::Hp,
        StatKey::Attack,
        StatKey::Defense,
        StatKey::Resist,
        StatKey::Cost,
        StatKey::Range,
        StatKey::Delay,
        StatKey::AttackSpeed,
        StatKey::Block,
        StatKey::MoveSpeed,
    ];

    /// Every column a [`Situation`](crate::situation::Situation) exposes.
    pub fn situation_keys() -> Vec<StatKey> {
        let mut keys = vec![
            StatKey::Hp,
            StatKey::Attack,
            StatKey::Defense,
            StatKey::Resist,
            StatKey::Cost,
            StatKey::Range,
            StatKey::Delay,
            StatKey::AttackSpeed,
            StatKey::Interval,
            StatKey::Block,
            StatKey::Target,
            StatKey::Rounds,
            StatKey::Hits,
            StatKey::CriticalChance,
            StatKey::CriticalDamage,
            StatKey::CriticalAttack,
            StatKey::Penetration,
            StatKey::Cooldown,
            StatKey::InitialTime,
            StatKey::Duration,
            StatKey::MoveSpeed,
            StatKey::PhysicalDamageCut,
            StatKey::MagicalDamageCut,
            StatKey::PhysicalEvasion,
            StatKey::MagicalEvasion,
        ];
        keys.extend((0..DPS_COLUMNS as u8).map(StatKey::Dps));
        keys
    }

    /// The core stat behind this column, if it is one.
    pub fn core(self) -> Option<CoreStat> {
        match self {
            StatKey::Hp => Some(CoreStat::Hp),
            StatKey::Attack => Some(CoreStat::Attack),
            StatKey::Defense => Some(CoreStat::Defense),
            StatKey::Resist => Some(CoreStat::Resist),
            _ => None,
        }
    }

    /// Lower-is-better columns.
    pub fn is_reversed(self) -> bool {
        matches!(
            self,
            StatKey::Cost
                | StatKey::Delay
                | StatKey::AttackSpeed
                | StatKey::Interval
                | StatKey::Cooldown
                | StatKey::InitialTime
        )
    }

    /// The last stage this stat is resolved to when shown as a column.
    pub fn final_stage(self) -> Stage {
        match self {
            StatKey::Attack | StatKey::CriticalAttack | StatKey::Dps(_) => Stage::Actual,
            _ => Stage::InBattle,
        }
    }

    /// Human-readable column name.
    pub fn label(self) -> &'static str {
        match self {
            StatKey::Hp => "HP",
            StatKey::Attack => "Attack",
            StatKey::Defense => "Defense",
            StatKey::Resist => "Resist",
            StatKey::Cost => "Cost",
            StatKey::Range => "Range",
            StatKey::Delay => "Delay",
            StatKey::AttackSpeed => "Attack Speed",
            StatKey::Interval => "Interval",
            StatKey::Block => "Block",
            StatKey::Target => "Target",
            StatKey::Rounds => "Rounds",
            StatKey::Hits => "Hits",
            StatKey::CriticalChance => "Critical Chance",
            StatKey::CriticalDamage => "Critical Damage",
            StatKey::CriticalAttack => "Critical Attack",
            StatKey::Penetration => "Penetration",
            StatKey::Cooldown => "Cooldown",
            StatKey::InitialTime => "Initial Time",
            StatKey::Duration => "Duration",
            StatKey::MoveSpeed => "Move Speed",
            StatKey::PhysicalDamageCut => "Physical Damage Cut",
            StatKey::MagicalDamageCut => "Magical Damage Cut",
            StatKey::PhysicalEvasion => "Physical Evasion",
            StatKey::MagicalEvasion => "Magical Evasion",
            StatKey::Dps(_) => "DPS",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKey::Dps(column) => write!(f, "DPS{}", column),
            key => f.write_str(key.label()),
        }
    }
}

/// A step of the stat pipeline, in resolution order.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Base,
    Barrack,
    Deployment,
    InBattle,
    Actual,
}

impl Stage {
    /// Stages resolved by a unit alone, without a chosen skill or features.
    pub fn is_unit_stage(self) -> bool {
        self <= Stage::Deployment
    }
}

/// A stat at a given stage.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatRef {
    pub key: StatKey,
    pub stage: Stage,
}

impl StatRef {
    /// A stat at one stage.
    pub fn new(key: StatKey, stage: Stage) -> Self {
        Self { key, stage }
    }
}

impl fmt::Display for StatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.key, self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_round_trip() {
        for core in CoreStat::ALL {
            assert_eq!(core.key().core(), Some(core));
        }
        assert_eq!(StatKey::Range.core(), None);
    }

    #[test]
    fn test_stage_ordering() {
        assert!(Stage::Base < Stage::Barrack);
        assert!(Stage::Deployment.is_unit_stage());
        assert!(!Stage::InBattle.is_unit_stage());
    }

    #[test]
    fn test_display() {
        assert_eq!(StatKey::AttackSpeed.to_string(), "Attack Speed");
        assert_eq!(StatKey::Dps(2).to_string(), "DPS2");
        assert_eq!(
            StatRef::new(StatKey::Hp, Stage::InBattle).to_string(),
            "HP@InBattle"
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&StatKey::AttackSpeed).unwrap();
        assert_eq!(json, "\"attackSpeed\"");
        let key: StatKey = serde_json::from_str("{\"dps\":3}").unwrap();
        assert_eq!(key, StatKey::Dps(3));
    }

    #[test]
    fn test_situation_keys_cover_dps_columns() {
        let keys = StatKey::situation_keys();
        assert!(keys.contains(&StatKey::Dps(0)));
        assert!(keys.contains(&StatKey::Dps(DPS_COLUMNS as u8 - 1)));
        assert!(StatKey::Interval.is_reversed());
    }
}
