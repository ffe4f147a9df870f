//! Units: the static half of a stat row.
//!
//! A [`Unit`] owns one node per stat per unit stage (Base, Barrack,
//! Deployment). Those stages depend only on the unit's data and the
//! [`Setting`]; skills and features are layered on by a
//! [`Situation`](crate::situation::Situation).

use crate::catalog::{self, Catalog, FactorKey, SubskillFactors};
use crate::data::{ClassData, Element, UnitData, UnitId};
use crate::feature::Feature;
use crate::memo::Memo;
use crate::node::{Calculator, Color, Stat, StatNode};
use crate::percent;
use crate::pipeline::{self, BarrackFactors, DeploymentFactors, Factors, ScaledFactors};
use crate::setting::Setting;
use crate::stat_key::{CoreStat, Stage, StatKey, StatRef};
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Node type shared by units and situations.
pub type Node = StatNode<Value, Factors>;

const UNIT_STAGES: [Stage; 3] = [Stage::Base, Stage::Barrack, Stage::Deployment];

pub struct Unit {
    data: UnitData,
    catalog: Rc<Catalog>,
    parent: Option<Rc<Unit>>,
    tags: BTreeSet<String>,
    nodes: HashMap<StatRef, Node>,
    subskills: Memo<Rc<SubskillFactors>>,
}

impl Unit {
    /// Build a unit. A token's parent must be built first.
    pub fn new(data: UnitData, catalog: Rc<Catalog>, parent: Option<Rc<Unit>>) -> Self {
        let tags = data.type_tags(data.class_name.as_deref().and_then(|n| catalog.class(n)));
        let nodes = StatKey::UNIT_KEYS
            .iter()
            .flat_map(|key| UNIT_STAGES.iter().map(move |stage| StatRef::new(*key, *stage)))
            .map(|stat| (stat, Node::new()))
            .collect();
        Self {
            data,
            catalog,
            parent,
            tags,
            nodes,
            subskills: Memo::new(),
        }
    }

    /// The unit's catalog id.
    pub fn id(&self) -> UnitId {
        self.data.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// The static record this unit was built from.
    pub fn data(&self) -> &UnitData {
        &self.data
    }

    /// Shared lookup tables.
    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }

    /// The parent unit, for tokens.
    pub fn parent(&self) -> Option<&Rc<Unit>> {
        self.parent.as_ref()
    }

    /// Whether this unit is a token with a parent.
    pub fn is_token(&self) -> bool {
        self.data.is_token()
    }

    /// Class defaults, if the class is in the catalog.
    pub fn class(&self) -> Option<&ClassData> {
        self.data
            .class_name
            .as_deref()
            .and_then(|name| self.catalog.class(name))
    }

    /// The unit's element, used by field-element and type bonuses.
    pub fn element(&self) -> Option<Element> {
        self.data.element
    }

    /// Type tags matched by formation buffs, beasts and subskill overrides.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Every feature that may apply: class features, then common, then the unit's own.
    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.class()
            .into_iter()
            .flat_map(|class| class.features.iter())
            .chain(self.catalog.common_features())
            .chain(&self.data.features)
    }

    /// A unit-stage stat, or `None` for keys and stages a unit does not resolve.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use towerstat::catalog::Catalog;
    /// use towerstat::data::{Rarity, UnitData};
    /// use towerstat::stat_key::{Stage, StatKey};
    /// use towerstat::unit::Unit;
    /// use towerstat::value::Value;
    /// use towerstat::Setting;
    ///
    /// let mut data = UnitData::new(1, "Knight", Rarity::Gold);
    /// data.hp = Some(1200);
    /// let unit = Unit::new(data, Rc::new(Catalog::default()), None);
    /// let setting = Rc::new(Setting::default());
    ///
    /// let hp = unit.stat(StatKey::Hp, Stage::Deployment).unwrap();
    /// assert_eq!(hp.value(&setting), Some(Value::Int(1200)));
    /// ```
    pub fn stat(&self, key: StatKey, stage: Stage) -> Option<Stat<'_, UnitStat<'_>>> {
        self.nodes
            .get(&StatRef::new(key, stage))
            .map(|node| node.with(UnitStat {
                unit: self,
                key,
                stage,
            }))
    }

    /// Integer value of a unit-stage stat.
    pub fn value(&self, key: StatKey, stage: Stage, setting: &Rc<Setting>) -> Option<i64> {
        self.stat(key, stage)?.value(setting)?.as_int()
    }

    /// Whether the unit's own data (or its class) defines `key`.
    pub fn defines(&self, key: StatKey) -> bool {
        let class = self.class();
        match key {
            StatKey::Target => self.data.target.or(class.and_then(|c| c.target)).is_some(),
            StatKey::Rounds => self.data.rounds.is_some(),
            StatKey::CriticalChance => self
                .data
                .critical_chance
                .or(class.and_then(|c| c.critical_chance))
                .is_some(),
            StatKey::CriticalDamage => self
                .data
                .critical_damage
                .or(class.and_then(|c| c.critical_damage))
                .is_some(),
            StatKey::CriticalAttack | StatKey::Dps(_) => self.defines(StatKey::Attack),
            StatKey::Interval => self.defines(StatKey::AttackSpeed),
            StatKey::Cooldown | StatKey::InitialTime | StatKey::Duration => {
                !self.data.skills.is_empty()
            }
            key if StatKey::UNIT_KEYS.contains(&key) => self.base(key).is_some(),
            _ => true,
        }
    }

    /// Equipped subskills resolved against the unit's own tags.
    pub fn subskills(&self, setting: &Rc<Setting>) -> Rc<SubskillFactors> {
        self.subskills.get_or_compute(setting, || {
            debug!(unit = self.data.id, "resolving unit subskills");
            Rc::new(self.catalog.subskills(setting, &self.tags))
        })
    }

    pub(crate) fn base(&self, key: StatKey) -> Option<i64> {
        let class = self.class();
        match key {
            StatKey::Hp | StatKey::Attack | StatKey::Defense | StatKey::Resist => {
                key.core().and_then(|core| self.data.core(core))
            }
            StatKey::Cost => self.data.cost,
            StatKey::Range => self.data.range.or(class.and_then(|c| c.range)),
            StatKey::Delay => self.data.delay.or(class.and_then(|c| c.delay)),
            StatKey::AttackSpeed => self
                .data
                .attack_speed
                .or(class.and_then(|c| c.attack_speed)),
            StatKey::Block => self.data.block.or(class.and_then(|c| c.block)),
            StatKey::MoveSpeed => self.data.move_speed,
            _ => None,
        }
    }

    fn barrack(&self, key: StatKey, setting: &Rc<Setting>) -> Option<Factors> {
        let base = self.base(key)?;
        let potential = catalog::potential_bonus(&self.data, setting.potential);

        if let Some(stat) = key.core() {
            let subskills = self.subskills(setting);
            let weapon = catalog::weapon(&self.data, setting.weapon);
            let mut factors = BarrackFactors::new(base);
            factors.potential_add = potential.add.get(stat).unwrap_or(0);
            factors.base_buff = percent::sum([
                potential.mul.get(stat),
                weapon.and_then(|w| w.potential_buff.get(stat)),
            ]);
            factors.bonus = self.data.bonus.get(stat).unwrap_or(0);
            factors.multiplier = percent::sum([
                subskills.get(FactorKey::mul(stat)),
                weapon.and_then(|w| w.buff.get(stat)),
            ]);
            factors.subskill_add = subskills.get(FactorKey::add(stat)).unwrap_or(0);
            factors.weapon_base = weapon.and_then(|w| w.base.get(stat)).unwrap_or(0);
            factors.weapon_upgrade = weapon
                .and_then(|w| catalog::weapon_upgrade(w, stat, setting.weapon))
                .unwrap_or(0);
            return Some(Factors::Barrack(factors.resolve()));
        }

        let addition = match key {
            StatKey::Cost => {
                let subskills = self.subskills(setting);
                potential.cost.unwrap_or(0) + subskills.get(FactorKey::CostAdd).unwrap_or(0)
            }
            StatKey::Range => potential.range.unwrap_or(0),
            _ => return None,
        };
        Some(Factors::Scaled(ScaledFactors::resolve(base, 100, addition)))
    }

    fn deployment(&self, key: StatKey, setting: &Rc<Setting>) -> Option<Factors> {
        let barrack = self.value(key, Stage::Barrack, setting)?;
        let mut factors = DeploymentFactors::new(barrack, self.is_token());
        let formation_beast = setting.beast_formation.and_then(|id| self.catalog.beast(id));
        let possession_beast = setting.beast_possession.and_then(|id| self.catalog.beast(id));

        match key {
            StatKey::Cost => {
                factors.formation = self.catalog.formation_cost(setting, &self.tags);
                factors.beast_add = formation_beast
                    .and_then(|b| b.formation.resolve(FactorKey::CostAdd, &self.tags))
                    .unwrap_or(0);
            }
            key => {
                let stat = key.core()?;
                factors.formation = self.catalog.formation(stat, setting, &self.tags);
                factors.environment = setting.environment(stat);
                if let Some(beast) = formation_beast {
                    if stat == CoreStat::Resist {
                        factors.beast_add = beast
                            .formation
                            .resolve(FactorKey::ResistAdd, &self.tags)
                            .unwrap_or(0);
                    } else {
                        factors.beast_mul = beast
                            .formation
                            .resolve(FactorKey::mul(stat), &self.tags)
                            .unwrap_or(100);
                    }
                }
                if let Some(beast) = possession_beast {
                    factors.possession_level = beast
                        .possession
                        .resolve(FactorKey::mul(stat), &self.tags)
                        .unwrap_or(100);
                    factors.possession_amount = beast
                        .possession
                        .resolve(FactorKey::add(stat), &self.tags)
                        .unwrap_or(0);
                }
                if self.data.element.is_some() && setting.type_bonus_element == self.data.element
                {
                    factors.type_bonus = setting.type_bonus(stat);
                }
            }
        }
        Some(Factors::Deployment(factors.resolve()))
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.data.id)
            .field("name", &self.data.name)
            .field("parent", &self.data.parent)
            .finish_non_exhaustive()
    }
}

/// Calculator of a unit-stage stat.
#[derive(Clone, Copy)]
pub struct UnitStat<'a> {
    pub unit: &'a Unit,
    pub key: StatKey,
    pub stage: Stage,
}

impl UnitStat<'_> {
    fn previous(&self) -> Option<Stage> {
        match self.stage {
            Stage::Barrack => Some(Stage::Base),
            Stage::Deployment => Some(Stage::Barrack),
            _ => None,
        }
    }
}

impl Calculator for UnitStat<'_> {
    type Value = Value;
    type Factors = Factors;

    fn calculate(&self, setting: &Rc<Setting>) -> Option<Value> {
        match self.stage {
            Stage::Base => self.unit.base(self.key).map(Value::Int),
            stage => {
                let factors = self.unit.stat(self.key, stage)?.factors(setting);
                match (factors, self.previous()) {
                    (Some(factors), _) => Some(factors.result()),
                    (None, Some(previous)) => self.unit.stat(self.key, previous)?.value(setting),
                    (None, None) => None,
                }
            }
        }
    }

    fn factors(&self, setting: &Rc<Setting>) -> Option<Factors> {
        match self.stage {
            Stage::Barrack => self.unit.barrack(self.key, setting),
            Stage::Deployment => self.unit.deployment(self.key, setting),
            _ => None,
        }
    }

    fn is_reversed(&self) -> bool {
        self.key.is_reversed()
    }

    fn color(&self, setting: &Rc<Setting>, value: Option<&Value>) -> Option<Color> {
        let previous = self.previous()?;
        let before = self.unit.value(self.key, previous, setting);
        pipeline::compare_color(
            before,
            value.and_then(Value::as_int),
            self.key.is_reversed(),
            true,
            false,
            false,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Beast, Subskill};
    use crate::data::{CoreValues, GameData, Potential, PotentialTier, Rarity, Weapon};
    use crate::setting::Mode;

    fn knight() -> UnitData {
        let mut data = UnitData::new(1, "Knight", Rarity::Gold);
        data.hp = Some(2000);
        data.attack = Some(1000);
        data.defense = Some(300);
        data.resist = Some(20);
        data.cost = Some(15);
        data.delay = Some(40);
        data.element = Some(Element::Fire);
        data.potentials = vec![Potential {
            name: "Attack Up".into(),
            tier: PotentialTier::Basic,
            add: CoreValues {
                attack: Some(75),
                ..CoreValues::default()
            },
            mul: CoreValues::default(),
            cost: Some(-2),
            range: None,
        }];
        data
    }

    fn unit_with(data: UnitData, game: GameData) -> Unit {
        Unit::new(data, Rc::new(Catalog::new(&game)), None)
    }

    #[test]
    fn test_barrack_applies_basic_potential() {
        let unit = unit_with(knight(), GameData::default());
        let setting = Rc::new(Setting::default());
        assert_eq!(unit.value(StatKey::Attack, Stage::Barrack, &setting), Some(1075));
        assert_eq!(unit.value(StatKey::Cost, Stage::Barrack, &setting), Some(13));
        assert_eq!(unit.value(StatKey::Hp, Stage::Barrack, &setting), Some(2000));
    }

    #[test]
    fn test_stat_without_factors_passes_through() {
        let unit = unit_with(knight(), GameData::default());
        let setting = Rc::new(Setting::default());
        assert_eq!(unit.value(StatKey::Delay, Stage::Deployment, &setting), Some(40));
        assert_eq!(unit.value(StatKey::Range, Stage::Deployment, &setting), None);
        assert!(unit.stat(StatKey::Target, Stage::Base).is_none());
    }

    #[test]
    fn test_weapon_modes() {
        let mut data = knight();
        data.weapon = Some(Weapon {
            name: "Blade".into(),
            base: CoreValues {
                attack: Some(50),
                defense: Some(20),
                ..CoreValues::default()
            },
            buff: CoreValues {
                attack: Some(110),
                ..CoreValues::default()
            },
            potential_buff: CoreValues::default(),
        });
        let unit = unit_with(data, GameData::default());

        let all = Rc::new(Setting::default());
        // 1075 × 1.1 + 50 + 240 / 2
        assert_eq!(unit.value(StatKey::Attack, Stage::Barrack, &all), Some(1352));

        let partial = Setting::update(&all, |s| s.weapon = Mode::Partial);
        assert_eq!(unit.value(StatKey::Attack, Stage::Barrack, &partial), Some(1232));

        let none = Setting::update(&all, |s| s.weapon = Mode::None);
        assert_eq!(unit.value(StatKey::Attack, Stage::Barrack, &none), Some(1075));
    }

    #[test]
    fn test_subskill_barrack() {
        let mut subskill = Subskill {
            id: 3,
            name: "Fortify".into(),
            ..Subskill::default()
        };
        subskill.factors.base.insert(FactorKey::DefenseMul, 120);
        subskill.factors.base.insert(FactorKey::DefenseAdd, 15);
        subskill.factors.base.insert(FactorKey::CostAdd, -1);
        let unit = unit_with(
            knight(),
            GameData {
                subskills: vec![subskill],
                ..GameData::default()
            },
        );
        let setting = Rc::new(Setting {
            subskill1: Some(3),
            ..Setting::default()
        });
        assert_eq!(unit.value(StatKey::Defense, Stage::Barrack, &setting), Some(375));
        assert_eq!(unit.value(StatKey::Cost, Stage::Barrack, &setting), Some(12));
    }

    #[test]
    fn test_deployment_buffs() {
        let mut beast = Beast {
            id: 9,
            name: "Phoenix".into(),
            ..Beast::default()
        };
        beast.formation.base.insert(FactorKey::HpMul, 110);
        beast.formation.base.insert(FactorKey::ResistAdd, 5);
        beast.possession.base.insert(FactorKey::HpAdd, 100);
        let unit = unit_with(
            knight(),
            GameData {
                beasts: vec![beast],
                ..GameData::default()
            },
        );
        let setting = Rc::new(Setting {
            beast_formation: Some(9),
            beast_possession: Some(9),
            environment_hp: 90,
            type_bonus_element: Some(Element::Fire),
            type_bonus_hp: 110,
            ..Setting::default()
        });

        // 2000 → 1800 → 1980 → 2080 → 2288
        assert_eq!(unit.value(StatKey::Hp, Stage::Deployment, &setting), Some(2288));
        assert_eq!(unit.value(StatKey::Resist, Stage::Deployment, &setting), Some(25));

        let hp = unit.stat(StatKey::Hp, Stage::Deployment).unwrap();
        assert_eq!(hp.color(&setting), Some(Color::WeakPositive));
    }

    #[test]
    fn test_token_skips_deployment() {
        let parent = Rc::new(unit_with(knight(), GameData::default()));
        let mut data = UnitData::new(2, "Familiar", Rarity::Silver);
        data.parent = Some(1);
        data.hp = Some(500);
        let token = Unit::new(data, Rc::clone(parent.catalog()), Some(parent));
        let setting = Rc::new(Setting {
            formation_hp: 150,
            ..Setting::default()
        });

        assert_eq!(token.value(StatKey::Hp, Stage::Deployment, &setting), Some(500));
        assert!(token.tags().contains("token"));
        assert!(!token.defines(StatKey::Range));
        assert!(token.defines(StatKey::Hp));
    }

    #[test]
    fn test_unit_stats_are_memoized() {
        let unit = unit_with(knight(), GameData::default());
        let setting = Rc::new(Setting::default());
        let stat = unit.stat(StatKey::Attack, Stage::Barrack).unwrap();
        let first = stat.factors(&setting);
        let second = stat.factors(&setting);
        assert_eq!(first, second);
        assert!(matches!(first, Some(Factors::Barrack(_))));
        assert_eq!(stat.text(&setting).as_deref(), Some("1075"));
    }
}
