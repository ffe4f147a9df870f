//! Features: sparse, gated modifier descriptors.
//!
//! A [`Feature`] carries gating flags (who and when it applies) and a set of
//! [`FeatureEffects`]. Every effect field is declared once in the
//! `feature_effects!` table together with its [`Rule`], which decides how the
//! field folds when several features are aggregated:
//!
//! | Rule | Fold |
//! |---|---|
//! | `Set` | last present value wins |
//! | `Sum` | [`percent::sum`] |
//! | `Multiply` | [`percent::multiply`] |
//! | `Accumulate` | [`percent::accumulate`] (diminishing returns) |
//! | `Add` | plain addition |
//! | `Union` | set union |
//! | `Concat` | list concatenation, order preserved |
//!
//! Adding a modifier field is one table line; no merge code changes.

use crate::data::{DamageType, Element, Target};
use crate::percent;
use crate::stat_key::{CoreStat, Stage, StatKey, StatRef};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How a field combines across features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Set,
    Sum,
    Multiply,
    Accumulate,
    Add,
    Union,
    Concat,
}

/// Combination behavior of one rule for one field type.
pub trait Combine<T> {
    fn combine(acc: &mut T, next: &T);
}

/// Zero-sized rule implementations, named after [`Rule`] variants.
pub mod rules {
    use super::Combine;
    use crate::percent;
    use std::collections::BTreeSet;

    pub struct Set;
    pub struct Sum;
    pub struct Multiply;
    pub struct Accumulate;
    pub struct Add;
    pub struct Union;
    pub struct Concat;

    impl<T: Clone> Combine<Option<T>> for Set {
        fn combine(acc: &mut Option<T>, next: &Option<T>) {
            if next.is_some() {
                *acc = next.clone();
            }
        }
    }

    impl Combine<Option<i64>> for Sum {
        fn combine(acc: &mut Option<i64>, next: &Option<i64>) {
            *acc = percent::merge_with(*acc, *next, |a, b| percent::sum([a, b]));
        }
    }

    impl Combine<Option<i64>> for Multiply {
        fn combine(acc: &mut Option<i64>, next: &Option<i64>) {
            *acc = percent::merge_with(*acc, *next, |a, b| percent::multiply([a, b]));
        }
    }

    impl Combine<Option<i64>> for Accumulate {
        fn combine(acc: &mut Option<i64>, next: &Option<i64>) {
            *acc = percent::merge_with(*acc, *next, |a, b| percent::accumulate([a, b]));
        }
    }

    impl Combine<Option<i64>> for Add {
        fn combine(acc: &mut Option<i64>, next: &Option<i64>) {
            *acc = percent::merge_with(*acc, *next, |a, b| a.unwrap_or(0) + b.unwrap_or(0));
        }
    }

    impl<T: Ord + Clone> Combine<BTreeSet<T>> for Union {
        fn combine(acc: &mut BTreeSet<T>, next: &BTreeSet<T>) {
            acc.extend(next.iter().cloned());
        }
    }

    impl<T: Clone> Combine<Vec<T>> for Concat {
        fn combine(acc: &mut Vec<T>, next: &Vec<T>) {
            acc.extend(next.iter().cloned());
        }
    }
}

/// Shallow "bonus wins" overlay and presence checks for effect fields.
pub trait Slot {
    fn is_present(&self) -> bool;
    fn overlay(&mut self, bonus: &Self);
}

impl<T: Clone> Slot for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }

    fn overlay(&mut self, bonus: &Self) {
        if bonus.is_some() {
            *self = bonus.clone();
        }
    }
}

impl<T: Clone> Slot for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }

    fn overlay(&mut self, bonus: &Self) {
        if !bonus.is_empty() {
            *self = bonus.clone();
        }
    }
}

impl<T: Ord + Clone> Slot for BTreeSet<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }

    fn overlay(&mut self, bonus: &Self) {
        if !bonus.is_empty() {
            *self = bonus.clone();
        }
    }
}

macro_rules! feature_effects {
    ($( $(#[$doc:meta])* $field:ident : $ty:ty => $variant:ident, $rule:ident; )*) => {
        /// The modifier half of a feature. All fields are optional.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct FeatureEffects {
            $( $(#[$doc])* pub $field: $ty, )*
        }

        /// Identifies one [`FeatureEffects`] field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FieldId {
            $( $variant, )*
        }

        impl FieldId {
            pub const ALL: &'static [FieldId] = &[ $( FieldId::$variant, )* ];

            /// The combination rule of this field.
            pub fn rule(self) -> Rule {
                match self {
                    $( FieldId::$variant => Rule::$rule, )*
                }
            }
        }

        impl FeatureEffects {
            /// Fold `next` into `self`, field by field.
            pub fn merge(&mut self, next: &FeatureEffects) {
                $( <rules::$rule as Combine<$ty>>::combine(&mut self.$field, &next.$field); )*
            }

            /// Overlay `bonus` on top of `self`: every present bonus field replaces ours.
            pub fn overlay(&mut self, bonus: &FeatureEffects) {
                $( self.$field.overlay(&bonus.$field); )*
            }

            /// Whether the field holds a value.
            pub fn has(&self, field: FieldId) -> bool {
                match field {
                    $( FieldId::$variant => self.$field.is_present(), )*
                }
            }
        }
    };
}

feature_effects! {
    target: Option<Target> => Target, Set;
    damage_type: Option<DamageType> => DamageType, Set;
    duration: Option<i64> => Duration, Set;
    rounds: Option<i64> => Rounds, Set;
    /// Hits per round.
    hits: Option<i64> => Hits, Set;
    /// Current HP as a percent of maximum.
    current_hp: Option<i64> => CurrentHp, Set;
    static_damage: Option<StaticDamage> => StaticDamage, Set;

    hp_mul: Option<i64> => HpMul, Sum;
    attack_mul: Option<i64> => AttackMul, Sum;
    defense_mul: Option<i64> => DefenseMul, Sum;
    resist_mul: Option<i64> => ResistMul, Sum;
    range_mul: Option<i64> => RangeMul, Sum;
    move_speed_mul: Option<i64> => MoveSpeedMul, Sum;
    attack_speed_mul: Option<i64> => AttackSpeedMul, Sum;

    damage_factor: Option<i64> => DamageFactor, Multiply;
    delay_mul: Option<i64> => DelayMul, Multiply;
    cooldown_mul: Option<i64> => CooldownMul, Multiply;
    initial_time_mul: Option<i64> => InitialTimeMul, Multiply;

    damage_cut: Option<i64> => DamageCut, Accumulate;
    physical_damage_cut: Option<i64> => PhysicalDamageCut, Accumulate;
    magical_damage_cut: Option<i64> => MagicalDamageCut, Accumulate;
    physical_evasion: Option<i64> => PhysicalEvasion, Accumulate;
    magical_evasion: Option<i64> => MagicalEvasion, Accumulate;
    /// Share of attack that ignores defense and resist.
    penetration: Option<i64> => Penetration, Accumulate;

    critical_chance_add: Option<i64> => CriticalChanceAdd, Add;
    critical_damage_add: Option<i64> => CriticalDamageAdd, Add;
    range_add: Option<i64> => RangeAdd, Add;
    block_add: Option<i64> => BlockAdd, Add;
    move_speed_add: Option<i64> => MoveSpeedAdd, Add;

    field_elements: BTreeSet<Element> => FieldElements, Union;
    supplements: BTreeSet<String> => Supplements, Union;
    delete_supplements: BTreeSet<String> => DeleteSupplements, Union;

    conditions: Vec<String> => Conditions, Concat;
    annotations: Vec<String> => Annotations, Concat;
    delete_annotations: Vec<String> => DeleteAnnotations, Concat;
    hp_adds: Vec<StatAdd> => HpAdds, Concat;
    attack_adds: Vec<StatAdd> => AttackAdds, Concat;
    defense_adds: Vec<StatAdd> => DefenseAdds, Concat;
    resist_adds: Vec<StatAdd> => ResistAdds, Concat;
}

/// A flat in-battle addition, possibly a percent of another stat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatAdd {
    Flat(i64),
    Ratio { of: StatRef, percent: i64 },
}

/// A damage value that replaces the computed attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StaticDamage {
    Flat(i64),
    Ratio { of: StatRef, percent: i64 },
    /// `base` per attack tick landing within `time` frames.
    Accumulated { base: i64, time: i64 },
}

impl FeatureEffects {
    /// In-battle multiplier for a core stat.
    pub fn core_mul(&self, stat: CoreStat) -> Option<i64> {
        match stat {
            CoreStat::Hp => self.hp_mul,
            CoreStat::Attack => self.attack_mul,
            CoreStat::Defense => self.defense_mul,
            CoreStat::Resist => self.resist_mul,
        }
    }

    /// In-battle additions for a core stat, in fold order.
    pub fn core_adds(&self, stat: CoreStat) -> &[StatAdd] {
        match stat {
            CoreStat::Hp => &self.hp_adds,
            CoreStat::Attack => &self.attack_adds,
            CoreStat::Defense => &self.defense_adds,
            CoreStat::Resist => &self.resist_adds,
        }
    }

    /// Whether any field that feeds `key` is present.
    pub fn touches(&self, key: StatKey) -> bool {
        fields_for(key).iter().any(|field| self.has(*field))
    }

    /// `(dependent, dependency)` pairs for every stat reference in these effects.
    ///
    /// Flat adds feed the in-battle stage; static damage feeds the actual stage
    /// of both attack columns.
    pub fn references(&self) -> Vec<(StatRef, StatRef)> {
        let mut refs = Vec::new();
        for stat in CoreStat::ALL {
            for add in self.core_adds(stat) {
                if let StatAdd::Ratio { of, .. } = add {
                    refs.push((StatRef::new(stat.key(), Stage::InBattle), *of));
                }
            }
        }
        if let Some(StaticDamage::Ratio { of, .. }) = &self.static_damage {
            refs.push((StatRef::new(StatKey::Attack, Stage::Actual), *of));
            refs.push((StatRef::new(StatKey::CriticalAttack, Stage::Actual), *of));
        }
        refs
    }

    /// Drop deleted annotations and supplements. Applied once after a fold.
    fn finish(&mut self) {
        let deleted = &self.delete_annotations;
        self.annotations.retain(|a| !deleted.contains(a));
        let deleted = &self.delete_supplements;
        self.supplements.retain(|s| !deleted.contains(s));
    }
}

/// Effect fields that feed a stat column.
fn fields_for(key: StatKey) -> &'static [FieldId] {
    match key {
        StatKey::Hp => &[FieldId::HpMul, FieldId::HpAdds, FieldId::CurrentHp],
        StatKey::Attack => &[
            FieldId::AttackMul,
            FieldId::AttackAdds,
            FieldId::DamageFactor,
            FieldId::StaticDamage,
        ],
        StatKey::Defense => &[FieldId::DefenseMul, FieldId::DefenseAdds],
        StatKey::Resist => &[FieldId::ResistMul, FieldId::ResistAdds],
        StatKey::Range => &[FieldId::RangeMul, FieldId::RangeAdd],
        StatKey::Delay => &[FieldId::DelayMul],
        StatKey::AttackSpeed => &[FieldId::AttackSpeedMul],
        StatKey::Interval => &[FieldId::DelayMul, FieldId::AttackSpeedMul],
        StatKey::Block => &[FieldId::BlockAdd],
        StatKey::Target => &[FieldId::Target],
        StatKey::Rounds => &[FieldId::Rounds],
        StatKey::Hits => &[FieldId::Hits],
        StatKey::CriticalChance => &[FieldId::CriticalChanceAdd],
        StatKey::CriticalDamage => &[FieldId::CriticalDamageAdd],
        StatKey::CriticalAttack => &[
            FieldId::AttackMul,
            FieldId::AttackAdds,
            FieldId::CriticalDamageAdd,
            FieldId::DamageFactor,
        ],
        StatKey::Penetration => &[FieldId::Penetration],
        StatKey::Cooldown => &[FieldId::CooldownMul],
        StatKey::InitialTime => &[FieldId::InitialTimeMul],
        StatKey::Duration => &[FieldId::Duration],
        StatKey::MoveSpeed => &[FieldId::MoveSpeedMul, FieldId::MoveSpeedAdd],
        StatKey::PhysicalDamageCut => &[FieldId::DamageCut, FieldId::PhysicalDamageCut],
        StatKey::MagicalDamageCut => &[FieldId::DamageCut, FieldId::MagicalDamageCut],
        StatKey::PhysicalEvasion => &[FieldId::PhysicalEvasion],
        StatKey::MagicalEvasion => &[FieldId::MagicalEvasion],
        StatKey::Cost => &[],
        StatKey::Dps(_) => &[
            FieldId::AttackMul,
            FieldId::AttackAdds,
            FieldId::DamageFactor,
            FieldId::StaticDamage,
            FieldId::CriticalChanceAdd,
            FieldId::Penetration,
            FieldId::DelayMul,
            FieldId::AttackSpeedMul,
        ],
    }
}

/// A modifier descriptor attached to a unit, its class, or the common pool.
///
/// # Examples
///
/// ```rust
/// use towerstat::feature::Feature;
///
/// let feature: Feature = serde_json::from_str(
///     r#"{ "name": "Enraged", "attack_mul": 130, "potential_bonus": { "attack_mul": 150 } }"#,
/// ).unwrap();
/// assert_eq!(feature.effects.attack_mul, Some(130));
/// assert_eq!(feature.resolved(true).attack_mul, Some(150));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feature {
    /// Selector name; unnamed features are always eligible.
    pub name: Option<String>,
    /// Skill slot gate. Negative means "only while no skill is active".
    pub skill: Option<i8>,
    pub require_weapon: bool,
    pub require_skill: bool,
    pub require_potentials: Vec<String>,
    pub require_field_elements: Vec<Element>,
    pub is_ability: bool,
    pub is_not_ability: bool,
    pub is_action: bool,
    pub is_phase: bool,
    pub is_conditional_buff: bool,
    pub is_conditional_debuff: bool,
    pub is_conditional_skill_buff: bool,
    pub is_buff_skill: bool,
    /// Replacement values used while potentials are applied.
    pub potential_bonus: Option<FeatureEffects>,
    #[serde(flatten)]
    pub effects: FeatureEffects,
}

impl Feature {
    /// Whether the feature only holds under a battle condition (action, phase or conditional buff).
    pub fn is_conditional(&self) -> bool {
        self.is_action
            || self.is_phase
            || self.is_conditional_buff
            || self.is_conditional_debuff
            || self.is_conditional_skill_buff
    }

    /// Effects with the potential bonus overlaid when potentials apply.
    pub fn resolved(&self, potential_applied: bool) -> FeatureEffects {
        let mut effects = self.effects.clone();
        if potential_applied {
            if let Some(bonus) = &self.potential_bonus {
                effects.overlay(bonus);
            }
        }
        effects
    }
}

/// Whether a skill slot selection means "a skill is active".
pub fn is_skill_active(skill: Option<i8>) -> bool {
    matches!(skill, Some(slot) if slot >= 0)
}

/// Inputs to feature gating for one situation and setting.
#[derive(Debug, Clone)]
pub struct Activation<'a> {
    /// Feature names chosen by the situation.
    pub selected: &'a BTreeSet<String>,
    pub skill: Option<i8>,
    /// The unit has a weapon and the setting applies it.
    pub has_weapon: bool,
    /// Names of the potentials the setting applies.
    pub potentials: &'a BTreeSet<String>,
    /// Field elements declared by the setting.
    pub setting_elements: BTreeSet<Element>,
}

impl Activation<'_> {
    fn admits(&self, feature: &Feature) -> bool {
        if let Some(name) = &feature.name {
            if !self.selected.contains(name) {
                return false;
            }
        }
        if let Some(slot) = feature.skill {
            let matches = if slot < 0 {
                !is_skill_active(self.skill)
            } else {
                self.skill == Some(slot)
            };
            if !matches {
                return false;
            }
        }
        if feature.require_weapon && !self.has_weapon {
            return false;
        }
        if feature.require_skill && !is_skill_active(self.skill) {
            return false;
        }
        feature
            .require_potentials
            .iter()
            .all(|name| self.potentials.contains(name))
    }

    /// Filter `features` (already in class, common, unit order) down to the active ones.
    pub fn filter<'f, I>(&self, features: I) -> Vec<&'f Feature>
    where
        I: IntoIterator<Item = &'f Feature>,
    {
        let admitted: Vec<&Feature> = features.into_iter().filter(|f| self.admits(f)).collect();

        let mut elements = self.setting_elements.clone();
        for feature in &admitted {
            elements.extend(feature.effects.field_elements.iter().copied());
        }
        let admitted: Vec<&Feature> = admitted
            .into_iter()
            .filter(|f| {
                f.require_field_elements
                    .iter()
                    .all(|element| elements.contains(element))
            })
            .collect();

        if admitted.iter().any(|f| f.is_not_ability) {
            admitted.into_iter().filter(|f| !f.is_ability).collect()
        } else {
            admitted
        }
    }
}

/// Fold features left to right into one descriptor.
pub fn aggregate<'f, I>(features: I, potential_applied: bool) -> FeatureEffects
where
    I: IntoIterator<Item = &'f Feature>,
{
    let mut combined = FeatureEffects::default();
    for feature in features {
        combined.merge(&feature.resolved(potential_applied));
    }
    combined.finish();
    combined
}

/// The full aggregate of a situation plus its derived sub-aggregates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureAggregate {
    pub effects: FeatureEffects,
    /// Fold over conditional features only.
    pub cond: FeatureEffects,
    /// Fold over buff-skill features only.
    pub skill_buffs: FeatureEffects,
    /// Names of the active features, in order, for display.
    pub active: Vec<String>,
}

impl FeatureAggregate {
    /// Fold `active` (already gated) into the full, conditional and skill-buff aggregates.
    pub fn build(active: &[&Feature], potential_applied: bool) -> Self {
        Self {
            effects: aggregate(active.iter().copied(), potential_applied),
            cond: aggregate(
                active.iter().copied().filter(|f| f.is_conditional()),
                potential_applied,
            ),
            skill_buffs: aggregate(
                active.iter().copied().filter(|f| f.is_buff_skill),
                potential_applied,
            ),
            active: active.iter().filter_map(|f| f.name.clone()).collect(),
        }
    }
}
