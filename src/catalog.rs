//! Catalog resolvers.
//!
//! Turns static catalog entries (classes, subskills, beasts, formation buffs,
//! potentials, weapons) into the modifier inputs the pipeline consumes, keyed
//! by a unit's type tags and the current [`Setting`].

use crate::data::{
    ClassData, CoreValues, FormationBuff, GameData, Potential, PotentialTier, UnitData, UnitId,
    Weapon,
};
use crate::feature::{Feature, Rule};
use crate::percent;
use crate::setting::{Mode, Setting};
use crate::stat_key::CoreStat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

/// Keys of subskill and beast factor tables.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FactorKey {
    HpMul,
    AttackMul,
    DefenseMul,
    ResistMul,
    HpAdd,
    AttackAdd,
    DefenseAdd,
    ResistAdd,
    CostAdd,
    RangeAdd,
    RangeMul,
    BattleHpMul,
    BattleAttackMul,
    BattleDefenseMul,
    BattleResistMul,
    DamageFactor,
    CriticalChanceAdd,
    CriticalDamageAdd,
    DelayMul,
    AttackSpeedMul,
    CooldownMul,
    InitialTimeMul,
    DurationMul,
    PhysicalDamageCut,
    MagicalDamageCut,
    PhysicalEvasion,
    MagicalEvasion,
    BlockAdd,
    MoveSpeedMul,
}

/// Which direction of a factor helps the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Benefit {
    High,
    Low,
}

impl FactorKey {
    /// How two stackable entries combine.
    pub fn rule(self) -> Rule {
        use FactorKey::*;
        match self {
            HpMul | AttackMul | DefenseMul | ResistMul | RangeMul | BattleHpMul
            | BattleAttackMul | BattleDefenseMul | BattleResistMul | AttackSpeedMul
            | DurationMul | MoveSpeedMul => Rule::Sum,
            DamageFactor | DelayMul | CooldownMul | InitialTimeMul => Rule::Multiply,
            PhysicalDamageCut | MagicalDamageCut | PhysicalEvasion | MagicalEvasion => {
                Rule::Accumulate
            }
            HpAdd | AttackAdd | DefenseAdd | ResistAdd | CostAdd | RangeAdd
            | CriticalChanceAdd | CriticalDamageAdd | BlockAdd => Rule::Add,
        }
    }

    /// Whether a larger or a smaller value helps; picks the winner of non-stackable pairs.
    pub fn benefit(self) -> Benefit {
        use FactorKey::*;
        match self {
            CostAdd | DelayMul | CooldownMul | InitialTimeMul => Benefit::Low,
            _ => Benefit::High,
        }
    }

    /// Barrack multiplier key of a core stat.
    pub fn mul(stat: CoreStat) -> Self {
        match stat {
            CoreStat::Hp => FactorKey::HpMul,
            CoreStat::Attack => FactorKey::AttackMul,
            CoreStat::Defense => FactorKey::DefenseMul,
            CoreStat::Resist => FactorKey::ResistMul,
        }
    }

    /// Flat add key of a core stat.
    pub fn add(stat: CoreStat) -> Self {
        match stat {
            CoreStat::Hp => FactorKey::HpAdd,
            CoreStat::Attack => FactorKey::AttackAdd,
            CoreStat::Defense => FactorKey::DefenseAdd,
            CoreStat::Resist => FactorKey::ResistAdd,
        }
    }

    /// In-battle multiplier key of a core stat.
    pub fn battle_mul(stat: CoreStat) -> Self {
        match stat {
            CoreStat::Hp => FactorKey::BattleHpMul,
            CoreStat::Attack => FactorKey::BattleAttackMul,
            CoreStat::Defense => FactorKey::BattleDefenseMul,
            CoreStat::Resist => FactorKey::BattleResistMul,
        }
    }
}

pub type FactorTable = BTreeMap<FactorKey, i64>;

/// A type-tag-gated replacement for some entries of a base table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorOverride {
    pub require: Vec<String>,
    pub exclude: Vec<String>,
    pub factors: FactorTable,
}

/// Whether `tags` satisfy a `require`/`exclude` pair.
pub fn tags_match(require: &[String], exclude: &[String], tags: &BTreeSet<String>) -> bool {
    require.iter().all(|tag| tags.contains(tag)) && !exclude.iter().any(|tag| tags.contains(tag))
}

/// A base factor table with ordered conditional overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalTable {
    pub base: FactorTable,
    pub overrides: Vec<FactorOverride>,
}

impl ConditionalTable {
    /// The first matching override's value for `key`, else the base value.
    pub fn resolve(&self, key: FactorKey, tags: &BTreeSet<String>) -> Option<i64> {
        self.overrides
            .iter()
            .filter(|o| tags_match(&o.require, &o.exclude, tags))
            .find_map(|o| o.factors.get(&key).copied())
            .or_else(|| self.base.get(&key).copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Subskill {
    pub id: u32,
    pub name: String,
    /// Class the subskill is limited to; it has no effect on other units.
    pub class_restriction: Option<String>,
    pub factors: ConditionalTable,
}

impl Subskill {
    /// Whether a unit with `tags` satisfies the class restriction.
    pub fn applies_to(&self, tags: &BTreeSet<String>) -> bool {
        self.class_restriction
            .as_ref()
            .map_or(true, |class| tags.contains(class))
    }

    /// Same id, or the same class restriction.
    pub fn is_stackable_with(&self, other: &Subskill) -> bool {
        if self.id == other.id {
            return false;
        }
        match (&self.class_restriction, &other.class_restriction) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        }
    }
}

/// A beast: formation bonuses plus possession bonuses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Beast {
    pub id: u32,
    pub name: String,
    /// `*Mul` keys multiply; `ResistAdd` and `CostAdd` add.
    pub formation: ConditionalTable,
    /// `*Mul` keys are the level percents, `*Add` keys the amount adds.
    pub possession: ConditionalTable,
}

/// Combine the values of one key from every equipped entry.
fn combine(key: FactorKey, values: &[i64], stackable: bool) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    if !stackable {
        return match key.benefit() {
            Benefit::High => values.iter().copied().max(),
            Benefit::Low => values.iter().copied().min(),
        };
    }
    Some(match key.rule() {
        Rule::Multiply => percent::multiply(values.iter().copied()),
        Rule::Accumulate => percent::accumulate(values.iter().copied()),
        Rule::Add => values.iter().sum(),
        _ => percent::sum(values.iter().copied()),
    })
}

/// Factors resolved from the equipped subskills for one set of type tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubskillFactors {
    pub names: Vec<String>,
    factors: FactorTable,
}

impl SubskillFactors {
    /// Combined value of `key`, or `None` when no equipped subskill sets it.
    pub fn get(&self, key: FactorKey) -> Option<i64> {
        self.factors.get(&key).copied()
    }
}

/// Immutable lookup tables shared by every unit.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    classes: HashMap<String, ClassData>,
    subskills: HashMap<u32, Subskill>,
    beasts: HashMap<u32, Beast>,
    common_features: Vec<Feature>,
    formation_buffs: BTreeMap<UnitId, Vec<FormationBuff>>,
}

impl Catalog {
    /// Index the catalog parts of `data` by name and id.
    ///
    /// Formation buffs are collected from every unit that declares some.
    pub fn new(data: &GameData) -> Self {
        Self {
            classes: data
                .classes
                .iter()
                .map(|c| (c.name.clone(), c.clone()))
                .collect(),
            subskills: data.subskills.iter().map(|s| (s.id, s.clone())).collect(),
            beasts: data.beasts.iter().map(|b| (b.id, b.clone())).collect(),
            common_features: data.common_features.clone(),
            formation_buffs: data
                .units
                .iter()
                .filter(|u| !u.formation_buffs.is_empty())
                .map(|u| (u.id, u.formation_buffs.clone()))
                .collect(),
        }
    }

    /// Class defaults by class name.
    pub fn class(&self, name: &str) -> Option<&ClassData> {
        self.classes.get(name)
    }

    /// Features every unit is eligible for, in catalog order.
    pub fn common_features(&self) -> &[Feature] {
        &self.common_features
    }

    /// Subskill by id. Unknown ids are logged and ignored.
    pub fn subskill(&self, id: u32) -> Option<&Subskill> {
        let subskill = self.subskills.get(&id);
        if subskill.is_none() {
            warn!(id, "unknown subskill id ignored");
        }
        subskill
    }

    /// Beast by id. Unknown ids are logged and ignored.
    pub fn beast(&self, id: u32) -> Option<&Beast> {
        let beast = self.beasts.get(&id);
        if beast.is_none() {
            warn!(id, "unknown beast id ignored");
        }
        beast
    }

    /// Resolve the equipped subskills against `tags`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::collections::BTreeSet;
    /// use towerstat::catalog::{Catalog, FactorKey, Subskill};
    /// use towerstat::data::GameData;
    /// use towerstat::Setting;
    ///
    /// let mut subskill = Subskill { id: 1, name: "Might".into(), ..Subskill::default() };
    /// subskill.factors.base.insert(FactorKey::AttackMul, 110);
    /// let data = GameData { subskills: vec![subskill], ..GameData::default() };
    /// let catalog = Catalog::new(&data);
    ///
    /// let setting = Setting { subskill1: Some(1), ..Setting::default() };
    /// let resolved = catalog.subskills(&setting, &BTreeSet::new());
    /// assert_eq!(resolved.get(FactorKey::AttackMul), Some(110));
    /// ```
    pub fn subskills(&self, setting: &Setting, tags: &BTreeSet<String>) -> SubskillFactors {
        let equipped: Vec<&Subskill> = setting
            .subskills()
            .filter_map(|id| self.subskill(id))
            .filter(|s| s.applies_to(tags))
            .collect();

        let stackable = match equipped.as_slice() {
            [a, b] => a.is_stackable_with(b),
            _ => true,
        };

        let keys: BTreeSet<FactorKey> = equipped
            .iter()
            .flat_map(|s| {
                s.factors
                    .base
                    .keys()
                    .chain(s.factors.overrides.iter().flat_map(|o| o.factors.keys()))
                    .copied()
            })
            .collect();

        let mut factors = FactorTable::new();
        for key in keys {
            let values: Vec<i64> = equipped
                .iter()
                .filter_map(|s| s.factors.resolve(key, tags))
                .collect();
            if let Some(value) = combine(key, &values, stackable) {
                factors.insert(key, value);
            }
        }

        SubskillFactors {
            names: equipped.iter().map(|s| s.name.clone()).collect(),
            factors,
        }
    }

    /// Active formation buffs matching `tags`.
    pub fn formation_buffs<'a>(
        &'a self,
        setting: &Setting,
        tags: &BTreeSet<String>,
    ) -> Vec<&'a FormationBuff> {
        setting
            .formation_buffs
            .iter()
            .filter_map(|id| self.formation_buffs.get(id))
            .flatten()
            .filter(|buff| tags_match(&buff.require, &buff.exclude, tags))
            .collect()
    }

    /// Formation percent for a core stat: the manual percent times every matching buff.
    pub fn formation(&self, stat: CoreStat, setting: &Setting, tags: &BTreeSet<String>) -> i64 {
        let buffs = self.formation_buffs(setting, tags);
        percent::multiply(
            std::iter::once(Some(setting.formation(stat)))
                .chain(buffs.iter().map(|buff| buff.values.get(stat))),
        )
    }

    /// Formation percent for cost, stacking additively.
    pub fn formation_cost(&self, setting: &Setting, tags: &BTreeSet<String>) -> i64 {
        let buffs = self.formation_buffs(setting, tags);
        percent::sum(
            std::iter::once(Some(setting.formation_cost)).chain(buffs.iter().map(|buff| buff.cost)),
        )
    }
}

/// Totals of the potentials applied under a mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PotentialBonus {
    pub add: CoreValues,
    pub mul: CoreValues,
    pub cost: Option<i64>,
    pub range: Option<i64>,
    pub names: BTreeSet<String>,
}

fn add_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    percent::merge_with(a, b, |a, b| a.unwrap_or(0) + b.unwrap_or(0))
}

fn sum_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    percent::merge_with(a, b, |a, b| percent::sum([a, b]))
}

/// Partial applies basic potentials, All every potential, None nothing.
pub fn potential_bonus(unit: &UnitData, mode: Mode) -> PotentialBonus {
    let applied = unit.potentials.iter().filter(|p| match mode {
        Mode::All => true,
        Mode::Partial => p.tier == PotentialTier::Basic,
        Mode::None => false,
    });

    applied.fold(PotentialBonus::default(), |mut acc, p: &Potential| {
        acc.add.hp = add_opt(acc.add.hp, p.add.hp);
        acc.add.attack = add_opt(acc.add.attack, p.add.attack);
        acc.add.defense = add_opt(acc.add.defense, p.add.defense);
        acc.add.resist = add_opt(acc.add.resist, p.add.resist);
        acc.mul.hp = sum_opt(acc.mul.hp, p.mul.hp);
        acc.mul.attack = sum_opt(acc.mul.attack, p.mul.attack);
        acc.mul.defense = sum_opt(acc.mul.defense, p.mul.defense);
        acc.mul.resist = sum_opt(acc.mul.resist, p.mul.resist);
        acc.cost = add_opt(acc.cost, p.cost);
        acc.range = add_opt(acc.range, p.range);
        acc.names.insert(p.name.clone());
        acc
    })
}

/// The weapon, unless the weapon mode ignores it.
pub fn weapon(unit: &UnitData, mode: Mode) -> Option<&Weapon> {
    match mode {
        Mode::None => None,
        _ => unit.weapon.as_ref(),
    }
}

/// Flat upgrade bonus, split across the core stats the weapon defines.
pub fn weapon_upgrade(weapon: &Weapon, stat: CoreStat, mode: Mode) -> Option<i64> {
    if mode != Mode::All || weapon.base.get(stat).is_none() {
        return None;
    }
    let total = match stat {
        CoreStat::Hp => 2400,
        _ => 240,
    };
    Some(total / weapon.base.defined_count())
}
