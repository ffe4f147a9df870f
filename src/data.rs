//! Static game data records.
//!
//! These are the parsed, immutable inputs of the engine: units, classes,
//! subskills, beasts and common features. They are plain serde records;
//! reading files is left to the caller, which hands the text (or already
//! built records) to [`GameData`].

use crate::catalog::{Beast, Subskill};
use crate::error::EngineError;
use crate::feature::{Feature, FeatureEffects};
use crate::stat_key::CoreStat;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Unit identifier.
pub type UnitId = u32;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Element {
    Fire,
    Water,
    Wind,
    Earth,
    Light,
    Dark,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rarity {
    Iron,
    Bronze,
    Silver,
    Gold,
    Platinum,
    Sapphire,
    Black,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageType {
    Physical,
    Magical,
    /// Ignores both defense and resist.
    True,
    /// Heals allies; has no DPS.
    Heal,
}

/// Number of targets hit per attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    Count(i64),
    All,
}

/// One optional value per core stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreValues {
    pub hp: Option<i64>,
    pub attack: Option<i64>,
    pub defense: Option<i64>,
    pub resist: Option<i64>,
}

impl CoreValues {
    /// Value for one core stat.
    pub fn get(&self, stat: CoreStat) -> Option<i64> {
        match stat {
            CoreStat::Hp => self.hp,
            CoreStat::Attack => self.attack,
            CoreStat::Defense => self.defense,
            CoreStat::Resist => self.resist,
        }
    }

    /// How many of the four stats are present.
    pub fn defined_count(&self) -> i64 {
        CoreStat::ALL
            .iter()
            .filter(|stat| self.get(**stat).is_some())
            .count() as i64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PotentialTier {
    Basic,
    Advanced,
}

/// A potential (unlockable permanent bonus) of a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Potential {
    pub name: String,
    pub tier: PotentialTier,
    /// Flat adds applied to the base value, inside the base buff.
    #[serde(default)]
    pub add: CoreValues,
    /// Base buff percents.
    #[serde(default)]
    pub mul: CoreValues,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub range: Option<i64>,
}

/// A unit's exclusive weapon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    pub name: String,
    /// Flat adds applied last in the barrack stage.
    pub base: CoreValues,
    /// Percents stacking with the subskill multiplier.
    pub buff: CoreValues,
    /// Percents stacking with the potential multiplier.
    pub potential_buff: CoreValues,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Skill {
    pub name: String,
    pub cooldown: Option<i64>,
    pub duration: Option<i64>,
    pub initial_time: Option<i64>,
    pub effects: FeatureEffects,
}

/// A formation buff a unit grants to every deployed unit matching its tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationBuff {
    pub require: Vec<String>,
    pub exclude: Vec<String>,
    pub values: CoreValues,
    pub cost: Option<i64>,
}

/// A declared build of a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SituationData {
    pub skill: Option<i8>,
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitData {
    pub id: UnitId,
    pub name: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub element: Option<Element>,
    #[serde(default)]
    pub species: Vec<String>,
    /// Owning unit, for tokens.
    #[serde(default)]
    pub parent: Option<UnitId>,
    #[serde(default)]
    pub hp: Option<i64>,
    #[serde(default)]
    pub attack: Option<i64>,
    #[serde(default)]
    pub defense: Option<i64>,
    #[serde(default)]
    pub resist: Option<i64>,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub range: Option<i64>,
    #[serde(default)]
    pub delay: Option<i64>,
    #[serde(default)]
    pub attack_speed: Option<i64>,
    #[serde(default)]
    pub block: Option<i64>,
    #[serde(default)]
    pub target: Option<Target>,
    #[serde(default)]
    pub rounds: Option<i64>,
    #[serde(default)]
    pub move_speed: Option<i64>,
    #[serde(default)]
    pub critical_chance: Option<i64>,
    #[serde(default)]
    pub critical_damage: Option<i64>,
    #[serde(default)]
    pub damage_type: Option<DamageType>,
    /// Flat adds applied after the base buff.
    #[serde(default)]
    pub bonus: CoreValues,
    #[serde(default)]
    pub potentials: Vec<Potential>,
    #[serde(default)]
    pub weapon: Option<Weapon>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub formation_buffs: Vec<FormationBuff>,
    #[serde(default)]
    pub situations: Vec<SituationData>,
}

impl UnitData {
    /// A bare unit record, mostly useful for building data in code.
    pub fn new(id: UnitId, name: impl Into<String>, rarity: Rarity) -> Self {
        Self {
            id,
            name: name.into(),
            rarity,
            class_name: None,
            element: None,
            species: Vec::new(),
            parent: None,
            hp: None,
            attack: None,
            defense: None,
            resist: None,
            cost: None,
            range: None,
            delay: None,
            attack_speed: None,
            block: None,
            target: None,
            rounds: None,
            move_speed: None,
            critical_chance: None,
            critical_damage: None,
            damage_type: None,
            bonus: CoreValues::default(),
            potentials: Vec::new(),
            weapon: None,
            skills: Vec::new(),
            features: Vec::new(),
            formation_buffs: Vec::new(),
            situations: Vec::new(),
        }
    }

    /// Base value of a core stat.
    pub fn core(&self, stat: CoreStat) -> Option<i64> {
        match stat {
            CoreStat::Hp => self.hp,
            CoreStat::Attack => self.attack,
            CoreStat::Defense => self.defense,
            CoreStat::Resist => self.resist,
        }
    }

    /// Whether this unit is summoned by a parent unit.
    pub fn is_token(&self) -> bool {
        self.parent.is_some()
    }

    /// Type tags used by `require`/`exclude` lists.
    pub fn type_tags(&self, class: Option<&ClassData>) -> BTreeSet<String> {
        let mut tags = BTreeSet::new();
        if let Some(class) = class {
            tags.insert(class.name.clone());
            if let Some(base) = &class.base_class {
                tags.insert(base.clone());
            }
        } else if let Some(name) = &self.class_name {
            tags.insert(name.clone());
        }
        if let Some(element) = self.element {
            tags.insert(element.to_string());
        }
        tags.extend(self.species.iter().cloned());
        tags.insert(self.rarity.to_string());
        if self.is_token() {
            tags.insert(TOKEN_TAG.to_string());
        }
        tags
    }
}

pub const TOKEN_TAG: &str = "token";
pub const SKILL_TAG: &str = "skill";
pub const NON_SKILL_TAG: &str = "non-skill";

/// Class defaults and class-wide features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassData {
    pub name: String,
    pub base_class: Option<String>,
    pub features: Vec<Feature>,
    pub range: Option<i64>,
    pub delay: Option<i64>,
    pub attack_speed: Option<i64>,
    pub block: Option<i64>,
    pub target: Option<Target>,
    pub damage_type: Option<DamageType>,
    pub critical_chance: Option<i64>,
    pub critical_damage: Option<i64>,
}

/// The complete static input of a [`Database`](crate::database::Database).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameData {
    pub units: Vec<UnitData>,
    pub classes: Vec<ClassData>,
    pub subskills: Vec<Subskill>,
    pub beasts: Vec<Beast>,
    pub common_features: Vec<Feature>,
}

impl GameData {
    /// Parse game data from JSON text.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use towerstat::data::GameData;
    ///
    /// let data = GameData::from_json_str(
    ///     r#"{ "units": [{ "id": 1, "name": "Knight", "rarity": "gold", "hp": 1200 }] }"#,
    /// ).unwrap();
    /// assert_eq!(data.units[0].hp, Some(1200));
    /// ```
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(text)?)
    }
}
