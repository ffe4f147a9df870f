//! Situations: a unit with a chosen skill slot and feature subset.
//!
//! A [`Situation`] layers skill, feature, subskill, field-element and panel
//! modifiers on top of its unit's Deployment stats to produce the In-Battle
//! and Actual stages, and derives DPS from them.
//!
//! Tokens (summoned sub-units) delegate every stat they do not define to a
//! Situation synthesized over their parent unit, with the same feature names
//! and the matching skill slot.

use crate::catalog::{self, FactorKey, SubskillFactors};
use crate::data::{DamageType, Skill, SituationData, Target, NON_SKILL_TAG, SKILL_TAG};
use crate::feature::{
    is_skill_active, Activation, FeatureAggregate, FeatureEffects, StatAdd, StaticDamage,
};
use crate::graph::DependencyGraph;
use crate::memo::Memo;
use crate::node::{Calculator, Color, Stat};
use crate::percent::{self, Accumulation};
use crate::pipeline::{self, ActualFactors, DpsInputs, Factors, InBattleFactors, ScaledFactors};
use crate::setting::Setting;
use crate::stat_key::{CoreStat, Stage, StatKey, StatRef};
use crate::unit::{Node, Unit};
use crate::value::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

const SITUATION_STAGES: [Stage; 2] = [Stage::InBattle, Stage::Actual];

pub struct Situation {
    unit: Rc<Unit>,
    skill: Option<i8>,
    features: BTreeSet<String>,
    nodes: HashMap<StatRef, Node>,
    aggregate: Memo<Rc<FeatureAggregate>>,
    subskills: Memo<Rc<SubskillFactors>>,
    cycles: Memo<Rc<HashMap<StatRef, usize>>>,
    parent: Memo<Option<Rc<Situation>>>,
}

impl Situation {
    /// # Examples
    ///
    /// ```rust
    /// use std::rc::Rc;
    /// use towerstat::catalog::Catalog;
    /// use towerstat::data::{Rarity, UnitData};
    /// use towerstat::situation::Situation;
    /// use towerstat::stat_key::{Stage, StatKey};
    /// use towerstat::unit::Unit;
    /// use towerstat::Setting;
    ///
    /// let mut data = UnitData::new(1, "Knight", Rarity::Gold);
    /// data.attack = Some(1000);
    /// let unit = Rc::new(Unit::new(data, Rc::new(Catalog::default()), None));
    /// let situation = Situation::new(unit, None, Vec::<String>::new());
    ///
    /// let setting = Rc::new(Setting::default());
    /// assert_eq!(situation.int(StatKey::Attack, Stage::Actual, &setting), Some(1000));
    /// ```
    pub fn new<I, S>(unit: Rc<Unit>, skill: Option<i8>, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes = StatKey::situation_keys()
            .into_iter()
            .flat_map(|key| {
                SITUATION_STAGES
                    .iter()
                    .map(move |stage| StatRef::new(key, *stage))
            })
            .map(|stat| (stat, Node::new()))
            .collect();
        Self {
            unit,
            skill,
            features: features.into_iter().map(Into::into).collect(),
            nodes,
            aggregate: Memo::new(),
            subskills: Memo::new(),
            cycles: Memo::new(),
            parent: Memo::new(),
        }
    }

    /// A situation from a declared build.
    pub fn from_data(unit: Rc<Unit>, data: &SituationData) -> Self {
        Self::new(unit, data.skill, data.features.iter().cloned())
    }

    /// The unit this situation builds on.
    pub fn unit(&self) -> &Rc<Unit> {
        &self.unit
    }

    /// Chosen skill slot; negative or `None` means no skill.
    pub fn skill_slot(&self) -> Option<i8> {
        self.skill
    }

    /// Names of the selected features.
    pub fn features(&self) -> &BTreeSet<String> {
        &self.features
    }

    /// The active skill, if a valid slot is chosen.
    pub fn skill(&self) -> Option<&Skill> {
        if !is_skill_active(self.skill) {
            return None;
        }
        let slot = usize::try_from(self.skill?).ok()?;
        self.unit.data().skills.get(slot)
    }

    /// The skill whose timings are shown: the active one, else the first.
    fn shown_skill(&self) -> Option<&Skill> {
        self.skill().or_else(|| self.unit.data().skills.first())
    }

    fn skill_effects(&self) -> Option<&FeatureEffects> {
        self.skill().map(|skill| &skill.effects)
    }

    /// A stat of this situation at the In-Battle or Actual stage.
    pub fn stat(&self, key: StatKey, stage: Stage) -> Option<Stat<'_, SituationStat<'_>>> {
        self.nodes.get(&StatRef::new(key, stage)).map(|node| {
            node.with(SituationStat {
                situation: self,
                key,
                stage,
            })
        })
    }

    /// A stat at the stage it is displayed at.
    pub fn column(&self, key: StatKey) -> Option<Stat<'_, SituationStat<'_>>> {
        self.stat(key, key.final_stage())
    }

    /// Value at any stage; unit stages are read from the unit.
    pub fn value(&self, key: StatKey, stage: Stage, setting: &Rc<Setting>) -> Option<Value> {
        if stage.is_unit_stage() {
            return self.unit.stat(key, stage)?.value(setting);
        }
        self.stat(key, stage)?.value(setting)
    }

    /// Integer value at any stage; `None` for labels, DPS and inapplicable stats.
    pub fn int(&self, key: StatKey, stage: Stage, setting: &Rc<Setting>) -> Option<i64> {
        self.value(key, stage, setting)?.as_int()
    }

    /// The feature aggregate of this situation.
    pub fn aggregate(&self, setting: &Rc<Setting>) -> Rc<FeatureAggregate> {
        self.aggregate.get_or_compute(setting, || {
            let data = self.unit.data();
            let potentials = catalog::potential_bonus(data, setting.potential).names;
            let activation = Activation {
                selected: &self.features,
                skill: self.skill,
                has_weapon: catalog::weapon(data, setting.weapon).is_some(),
                potentials: &potentials,
                setting_elements: setting.field_elements(),
            };
            let active = activation.filter(self.unit.features());
            debug!(
                unit = data.id,
                active = active.len(),
                "aggregating situation features"
            );
            Rc::new(FeatureAggregate::build(&active, setting.is_potential_applied()))
        })
    }

    /// The fold over buff-skill features.
    pub fn skill_buffs(&self, setting: &Rc<Setting>) -> FeatureEffects {
        self.aggregate(setting).skill_buffs.clone()
    }

    /// Unit tags plus the skill state and every aggregated condition.
    pub fn tags(&self, setting: &Rc<Setting>) -> BTreeSet<String> {
        let mut tags = self.unit.tags().clone();
        let state = if is_skill_active(self.skill) {
            SKILL_TAG
        } else {
            NON_SKILL_TAG
        };
        tags.insert(state.to_string());
        tags.extend(self.aggregate(setting).effects.conditions.iter().cloned());
        tags
    }

    /// Equipped subskills resolved against this situation's tags.
    pub fn subskills(&self, setting: &Rc<Setting>) -> Rc<SubskillFactors> {
        self.subskills.get_or_compute(setting, || {
            let tags = self.tags(setting);
            Rc::new(self.unit.catalog().subskills(setting, &tags))
        })
    }

    /// The situation over a token's parent unit, if this unit is a token.
    pub fn parent_situation(&self, setting: &Rc<Setting>) -> Option<Rc<Situation>> {
        let parent = self.unit.parent()?;
        self.parent.get_or_compute(setting, || {
            let skill = self.skill.filter(|slot| {
                usize::try_from(*slot).map_or(true, |slot| slot < parent.data().skills.len())
            });
            debug!(
                token = self.unit.id(),
                parent = parent.id(),
                "synthesizing parent situation"
            );
            Some(Rc::new(Situation::new(
                Rc::clone(parent),
                skill,
                self.features.iter().cloned(),
            )))
        })
    }

    /// The parent situation to read `key` from, when this token does not define it.
    fn delegate(&self, key: StatKey, setting: &Rc<Setting>) -> Option<Rc<Situation>> {
        if self.unit.is_token() && !self.unit.defines(key) {
            self.parent_situation(setting)
        } else {
            None
        }
    }

    /// Cycle index of every stat reference on a cycle, including the stage plumbing.
    fn cycles(&self, setting: &Rc<Setting>) -> Rc<HashMap<StatRef, usize>> {
        self.cycles.get_or_compute(setting, || {
            let aggregate = self.aggregate(setting);
            let mut graph = DependencyGraph::new();
            for (dependent, dependency) in intrinsic_edges() {
                graph.add_edge(dependent, dependency);
            }
            let references = aggregate
                .effects
                .references()
                .into_iter()
                .chain(self.skill_effects().into_iter().flat_map(|e| e.references()));
            for (dependent, dependency) in references {
                if !dependency.stage.is_unit_stage() {
                    graph.add_edge(dependent, dependency);
                }
            }
            Rc::new(graph.cycle_components())
        })
    }

    /// Resolve a percent-of-another-stat reference, unless it closes a cycle.
    fn reference(
        &self,
        dependent: StatRef,
        of: StatRef,
        percent: i64,
        setting: &Rc<Setting>,
    ) -> Option<i64> {
        let cycles = self.cycles(setting);
        if DependencyGraph::on_same_cycle(&cycles, &dependent, &of) {
            warn!(
                unit = self.unit.id(),
                %dependent,
                dependency = %of,
                "dropping cyclic stat reference"
            );
            return None;
        }
        let value = self.int(of.key, of.stage, setting)?;
        Some(percent::multiply([value, percent]))
    }

    fn additions(&self, stat: CoreStat, feature: &FeatureEffects, setting: &Rc<Setting>) -> i64 {
        let dependent = StatRef::new(stat.key(), Stage::InBattle);
        self.skill_effects()
            .into_iter()
            .flat_map(|e| e.core_adds(stat))
            .chain(feature.core_adds(stat))
            .map(|add| match add {
                StatAdd::Flat(value) => *value,
                StatAdd::Ratio { of, percent } => self
                    .reference(dependent, *of, *percent, setting)
                    .unwrap_or(0),
            })
            .sum()
    }

    fn field_element_mul(&self, feature: &FeatureEffects, setting: &Setting) -> Option<i64> {
        let element = self.unit.element()?;
        let mut active = setting.field_elements();
        active.extend(feature.field_elements.iter().copied());
        active
            .contains(&element)
            .then_some(setting.field_element_bonus)
    }

    fn static_damage(&self, key: StatKey, setting: &Rc<Setting>) -> Option<i64> {
        let aggregate = self.aggregate(setting);
        let skill = self.skill_effects();
        let damage = aggregate
            .effects
            .static_damage
            .as_ref()
            .or(skill.and_then(|s| s.static_damage.as_ref()))?;
        match damage {
            StaticDamage::Flat(value) => Some(*value),
            StaticDamage::Ratio { of, percent } => {
                self.reference(StatRef::new(key, Stage::Actual), *of, *percent, setting)
            }
            StaticDamage::Accumulated { base, time } => {
                let ticks = Accumulation {
                    attack_speed: self.int(StatKey::AttackSpeed, Stage::InBattle, setting)?,
                    interval: self.int(StatKey::Interval, Stage::InBattle, setting)?,
                    time: *time,
                }
                .calculate();
                Some(base * ticks)
            }
        }
    }

    fn damage_type(&self, setting: &Rc<Setting>) -> DamageType {
        let class = self.unit.class();
        self.aggregate(setting)
            .effects
            .damage_type
            .or(self.skill_effects().and_then(|s| s.damage_type))
            .or(self.unit.data().damage_type)
            .or(class.and_then(|c| c.damage_type))
            .unwrap_or(DamageType::Physical)
    }

    fn in_battle_core(&self, stat: CoreStat, setting: &Rc<Setting>) -> Option<Factors> {
        let deployment = self.unit.value(stat.key(), Stage::Deployment, setting)?;
        let aggregate = self.aggregate(setting);
        let feature = &aggregate.effects;
        let skill = self.skill_effects();
        let subskills = self.subskills(setting);

        let mut factors = InBattleFactors::new(deployment);
        factors.skill_mul = skill.and_then(|s| s.core_mul(stat));
        factors.feature_mul = feature.core_mul(stat);
        factors.field_element_mul = self.field_element_mul(feature, setting);
        factors.subskill_mul = subskills.get(FactorKey::battle_mul(stat));
        factors.panel_mul = Some(setting.panel_mul(stat));
        factors.addition = self.additions(stat, feature, setting) + setting.panel_add(stat);
        if stat == CoreStat::Hp {
            factors.current_ratio = feature
                .current_hp
                .or(skill.and_then(|s| s.current_hp))
                .unwrap_or(percent::UNITY);
        }
        Some(Factors::InBattle(factors.resolve()))
    }

    fn actual_damage(&self, key: StatKey, setting: &Rc<Setting>) -> Option<Factors> {
        let in_battle = self.int(key, Stage::InBattle, setting)?;
        let aggregate = self.aggregate(setting);
        let subskills = self.subskills(setting);

        let mut factors = ActualFactors::new(in_battle);
        factors.skill_factor = self.skill_effects().and_then(|s| s.damage_factor);
        factors.feature_factor = aggregate.effects.damage_factor;
        factors.subskill_factor = subskills.get(FactorKey::DamageFactor);
        factors.limit_break = setting.limit_break_damage;
        factors.panel_factor = setting.panel_damage_factor;
        factors.static_damage = self.static_damage(key, setting);
        Some(Factors::Actual(factors.resolve()))
    }

    fn dps(&self, column: u8, setting: &Rc<Setting>) -> Option<Factors> {
        let int = |key| self.int(key, Stage::InBattle, setting);
        let inputs = DpsInputs {
            attack: self.int(StatKey::Attack, Stage::Actual, setting)?,
            critical_attack: self.int(StatKey::CriticalAttack, Stage::Actual, setting)?,
            damage_type: self.damage_type(setting),
            penetration: int(StatKey::Penetration).unwrap_or(0),
            critical_chance: int(StatKey::CriticalChance).unwrap_or(0),
            rounds: int(StatKey::Rounds).unwrap_or(1),
            hits: int(StatKey::Hits).unwrap_or(1),
            interval: int(StatKey::Interval)?,
        };
        let column = usize::from(column);
        let defense = *setting.dps_defense.get(column)?;
        let resist = *setting.dps_resist.get(column)?;
        pipeline::dps(inputs, defense, resist).map(Factors::Dps)
    }

    fn has_factors(key: StatKey, stage: Stage) -> bool {
        match stage {
            Stage::InBattle => matches!(
                key,
                StatKey::Hp
                    | StatKey::Attack
                    | StatKey::Defense
                    | StatKey::Resist
                    | StatKey::CriticalAttack
                    | StatKey::Range
                    | StatKey::Delay
                    | StatKey::AttackSpeed
                    | StatKey::MoveSpeed
            ),
            Stage::Actual => matches!(
                key,
                StatKey::Attack | StatKey::CriticalAttack | StatKey::Dps(_)
            ),
            _ => false,
        }
    }

    fn factors_of(&self, key: StatKey, stage: Stage, setting: &Rc<Setting>) -> Option<Factors> {
        if !Self::has_factors(key, stage) {
            return None;
        }
        if stage == Stage::Actual {
            return match key {
                StatKey::Dps(column) => self.dps(column, setting),
                key => self.actual_damage(key, setting),
            };
        }
        if let Some(stat) = key.core() {
            return self.in_battle_core(stat, setting);
        }

        let aggregate = self.aggregate(setting);
        let feature = &aggregate.effects;
        let skill = self.skill_effects();
        let sk = |field: fn(&FeatureEffects) -> Option<i64>| skill.and_then(field);
        let subskills = self.subskills(setting);
        let deployment = |key| self.unit.value(key, Stage::Deployment, setting);

        let factors = match key {
            StatKey::CriticalAttack => ScaledFactors::resolve(
                self.int(StatKey::Attack, Stage::InBattle, setting)?,
                self.int(StatKey::CriticalDamage, Stage::InBattle, setting)?,
                0,
            ),
            StatKey::Range => ScaledFactors::resolve(
                deployment(key)?,
                percent::sum([
                    sk(|e| e.range_mul),
                    feature.range_mul,
                    subskills.get(FactorKey::RangeMul),
                ]),
                add_all([
                    sk(|e| e.range_add),
                    feature.range_add,
                    subskills.get(FactorKey::RangeAdd),
                ]),
            ),
            StatKey::Delay => ScaledFactors::resolve(
                deployment(key)?,
                percent::multiply([
                    sk(|e| e.delay_mul),
                    feature.delay_mul,
                    subskills.get(FactorKey::DelayMul),
                ]),
                0,
            ),
            StatKey::AttackSpeed => ScaledFactors::divided(
                deployment(key)?,
                percent::sum([
                    sk(|e| e.attack_speed_mul),
                    feature.attack_speed_mul,
                    subskills.get(FactorKey::AttackSpeedMul),
                ]),
            )?,
            StatKey::MoveSpeed => ScaledFactors::resolve(
                deployment(key)?,
                percent::sum([
                    sk(|e| e.move_speed_mul),
                    feature.move_speed_mul,
                    subskills.get(FactorKey::MoveSpeedMul),
                ]),
                add_all([sk(|e| e.move_speed_add), feature.move_speed_add]),
            ),
            _ => return None,
        };
        Some(Factors::Scaled(factors))
    }

    /// Stats without a factor record.
    fn direct(&self, key: StatKey, stage: Stage, setting: &Rc<Setting>) -> Option<Value> {
        match (key, stage) {
            (StatKey::Dps(_), Stage::InBattle) => return self.value(key, Stage::Actual, setting),
            (_, Stage::Actual) => return self.value(key, Stage::InBattle, setting),
            _ => {}
        }

        let aggregate = self.aggregate(setting);
        let feature = &aggregate.effects;
        let skill = self.skill_effects();
        let sk = |field: fn(&FeatureEffects) -> Option<i64>| skill.and_then(field);
        let subskills = self.subskills(setting);
        let data = self.unit.data();
        let class = self.unit.class();

        let value = match key {
            StatKey::Cost => self.unit.value(key, Stage::Deployment, setting)?,
            StatKey::Interval => {
                self.int(StatKey::AttackSpeed, Stage::InBattle, setting)?
                    + self.int(StatKey::Delay, Stage::InBattle, setting)?
            }
            StatKey::Block => {
                self.unit.value(key, Stage::Deployment, setting)?
                    + add_all([
                        sk(|e| e.block_add),
                        feature.block_add,
                        subskills.get(FactorKey::BlockAdd),
                    ])
            }
            StatKey::Target => {
                let target = feature
                    .target
                    .or(skill.and_then(|s| s.target))
                    .or(data.target)
                    .or(class.and_then(|c| c.target))
                    .unwrap_or(Target::Count(1));
                return Some(match target {
                    Target::Count(count) => Value::Int(count),
                    Target::All => Value::Text("All".to_string()),
                });
            }
            StatKey::Rounds => feature
                .rounds
                .or(sk(|e| e.rounds))
                .or(data.rounds)
                .unwrap_or(1),
            StatKey::Hits => feature.hits.or(sk(|e| e.hits)).unwrap_or(1),
            StatKey::CriticalChance => {
                let base = data
                    .critical_chance
                    .or(class.and_then(|c| c.critical_chance))
                    .unwrap_or(0);
                (base
                    + add_all([
                        sk(|e| e.critical_chance_add),
                        feature.critical_chance_add,
                        subskills.get(FactorKey::CriticalChanceAdd),
                    ]))
                .clamp(0, percent::UNITY)
            }
            StatKey::CriticalDamage => {
                let base = data
                    .critical_damage
                    .or(class.and_then(|c| c.critical_damage))
                    .unwrap_or(150);
                base + add_all([
                    sk(|e| e.critical_damage_add),
                    feature.critical_damage_add,
                    subskills.get(FactorKey::CriticalDamageAdd),
                ])
            }
            StatKey::Penetration => {
                percent::accumulate([sk(|e| e.penetration), feature.penetration])
            }
            StatKey::Cooldown => percent::multiply([
                self.shown_skill()?.cooldown?,
                percent::multiply([feature.cooldown_mul, subskills.get(FactorKey::CooldownMul)]),
            ]),
            StatKey::InitialTime => {
                let shown = self.shown_skill()?;
                percent::multiply([
                    shown.initial_time.or(shown.cooldown)?,
                    percent::multiply([
                        feature.initial_time_mul,
                        subskills.get(FactorKey::InitialTimeMul),
                    ]),
                ])
            }
            StatKey::Duration => {
                let duration = feature
                    .duration
                    .or(sk(|e| e.duration))
                    .or(self.shown_skill().and_then(|s| s.duration))?;
                percent::multiply([duration, percent::sum([subskills.get(FactorKey::DurationMul)])])
            }
            StatKey::PhysicalDamageCut => percent::accumulate([
                sk(|e| e.damage_cut),
                sk(|e| e.physical_damage_cut),
                feature.damage_cut,
                feature.physical_damage_cut,
                subskills.get(FactorKey::PhysicalDamageCut),
            ]),
            StatKey::MagicalDamageCut => percent::accumulate([
                sk(|e| e.damage_cut),
                sk(|e| e.magical_damage_cut),
                feature.damage_cut,
                feature.magical_damage_cut,
                subskills.get(FactorKey::MagicalDamageCut),
            ]),
            StatKey::PhysicalEvasion => percent::accumulate([
                sk(|e| e.physical_evasion),
                feature.physical_evasion,
                subskills.get(FactorKey::PhysicalEvasion),
            ]),
            StatKey::MagicalEvasion => percent::accumulate([
                sk(|e| e.magical_evasion),
                feature.magical_evasion,
                subskills.get(FactorKey::MagicalEvasion),
            ]),
            _ => return None,
        };
        Some(Value::Int(value))
    }

    /// Whether the in-battle stage feeding this column hit a damage limit.
    fn is_clamped(&self, key: StatKey, setting: &Rc<Setting>) -> bool {
        let source = match key {
            StatKey::CriticalAttack | StatKey::Dps(_) => StatKey::Attack,
            key => key,
        };
        source.core().is_some()
            && self
                .stat(source, Stage::InBattle)
                .and_then(|stat| stat.factors(setting))
                .map_or(false, |factors| factors.is_clamped())
    }
}

impl fmt::Debug for Situation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Situation")
            .field("unit", &self.unit.id())
            .field("skill", &self.skill)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

fn add_all<const N: usize>(values: [Option<i64>; N]) -> i64 {
    values.into_iter().flatten().sum()
}

/// Dependencies every situation has regardless of its features.
fn intrinsic_edges() -> Vec<(StatRef, StatRef)> {
    let at = StatRef::new;
    let mut edges = vec![
        (
            at(StatKey::CriticalAttack, Stage::InBattle),
            at(StatKey::Attack, Stage::InBattle),
        ),
        (
            at(StatKey::CriticalAttack, Stage::InBattle),
            at(StatKey::CriticalDamage, Stage::InBattle),
        ),
        (
            at(StatKey::Interval, Stage::InBattle),
            at(StatKey::Delay, Stage::InBattle),
        ),
        (
            at(StatKey::Interval, Stage::InBattle),
            at(StatKey::AttackSpeed, Stage::InBattle),
        ),
    ];
    for damage in [StatKey::Attack, StatKey::CriticalAttack] {
        for timing in [StatKey::AttackSpeed, StatKey::Interval] {
            edges.push((at(damage, Stage::Actual), at(timing, Stage::InBattle)));
        }
    }
    for key in StatKey::situation_keys() {
        match key {
            StatKey::Dps(_) => {
                edges.push((at(key, Stage::InBattle), at(key, Stage::Actual)));
                for input in [StatKey::Attack, StatKey::CriticalAttack] {
                    edges.push((at(key, Stage::Actual), at(input, Stage::Actual)));
                }
                for input in [
                    StatKey::Penetration,
                    StatKey::CriticalChance,
                    StatKey::Rounds,
                    StatKey::Hits,
                    StatKey::Interval,
                ] {
                    edges.push((at(key, Stage::Actual), at(input, Stage::InBattle)));
                }
            }
            key => edges.push((at(key, Stage::Actual), at(key, Stage::InBattle))),
        }
    }
    edges
}

/// Calculator of a situation stat.
#[derive(Clone, Copy)]
pub struct SituationStat<'a> {
    pub situation: &'a Situation,
    pub key: StatKey,
    pub stage: Stage,
}

impl Calculator for SituationStat<'_> {
    type Value = Value;
    type Factors = Factors;

    fn calculate(&self, setting: &Rc<Setting>) -> Option<Value> {
        let situation = self.situation;
        if let Some(parent) = situation.delegate(self.key, setting) {
            return parent.stat(self.key, self.stage)?.value(setting);
        }
        if Situation::has_factors(self.key, self.stage) {
            let factors = situation.stat(self.key, self.stage)?.factors(setting)?;
            return Some(factors.result());
        }
        situation.direct(self.key, self.stage, setting)
    }

    fn factors(&self, setting: &Rc<Setting>) -> Option<Factors> {
        match self.situation.delegate(self.key, setting) {
            Some(parent) => parent.stat(self.key, self.stage)?.factors(setting),
            None => self.situation.factors_of(self.key, self.stage, setting),
        }
    }

    fn is_reversed(&self) -> bool {
        self.key.is_reversed()
    }

    fn text(&self, setting: &Rc<Setting>, value: Option<&Value>) -> Option<String> {
        match self.situation.delegate(self.key, setting) {
            Some(parent) => parent.stat(self.key, self.stage)?.text(setting),
            None => value.map(ToString::to_string),
        }
    }

    fn color(&self, setting: &Rc<Setting>, value: Option<&Value>) -> Option<Color> {
        let situation = self.situation;
        if let Some(parent) = situation.delegate(self.key, setting) {
            return parent.stat(self.key, self.stage)?.color(setting);
        }
        let previous = if StatKey::UNIT_KEYS.contains(&self.key) {
            situation.unit.value(self.key, Stage::Deployment, setting)
        } else {
            None
        };
        let conditional = situation.aggregate(setting).cond.touches(self.key);
        pipeline::compare_color(
            previous,
            value.and_then(Value::as_int),
            self.key.is_reversed(),
            false,
            conditional,
            situation.is_clamped(self.key, setting),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::data::{Element, GameData, Rarity, UnitData};
    use crate::feature::Feature;

    fn unit(data: UnitData) -> Rc<Unit> {
        Rc::new(Unit::new(data, Rc::new(Catalog::default()), None))
    }

    fn archer() -> UnitData {
        let mut data = UnitData::new(1, "Archer", Rarity::Gold);
        data.hp = Some(1000);
        data.attack = Some(500);
        data.defense = Some(100);
        data.resist = Some(10);
        data.range = Some(200);
        data.delay = Some(30);
        data.attack_speed = Some(20);
        data
    }

    fn with_feature(mut data: UnitData, feature: Feature) -> UnitData {
        data.features.push(feature);
        data
    }

    #[test]
    fn test_defaults_pass_through() {
        let situation = Situation::new(unit(archer()), None, Vec::<String>::new());
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Hp, Stage::InBattle, &setting), Some(1000));
        assert_eq!(situation.int(StatKey::Attack, Stage::Actual, &setting), Some(500));
        assert_eq!(situation.int(StatKey::Interval, Stage::InBattle, &setting), Some(50));
        assert_eq!(situation.int(StatKey::Target, Stage::InBattle, &setting), Some(1));
        assert_eq!(situation.int(StatKey::CriticalDamage, Stage::InBattle, &setting), Some(150));
        assert_eq!(situation.int(StatKey::CriticalAttack, Stage::Actual, &setting), Some(750));
        assert_eq!(situation.int(StatKey::Cooldown, Stage::InBattle, &setting), None);
    }

    #[test]
    fn test_named_feature_applies_only_when_selected() {
        let mut feature = Feature {
            name: Some("Focus".into()),
            ..Feature::default()
        };
        feature.effects.attack_mul = Some(120);
        let unit = unit(with_feature(archer(), feature));
        let setting = Rc::new(Setting::default());

        let plain = Situation::new(Rc::clone(&unit), None, Vec::<String>::new());
        assert_eq!(plain.int(StatKey::Attack, Stage::InBattle, &setting), Some(500));

        let focused = Situation::new(unit, None, ["Focus"]);
        assert_eq!(focused.int(StatKey::Attack, Stage::InBattle, &setting), Some(600));
        let attack = focused.stat(StatKey::Attack, Stage::InBattle).unwrap();
        assert_eq!(attack.color(&setting), Some(Color::Positive));
    }

    #[test]
    fn test_skill_layer() {
        let mut data = archer();
        let mut skill = Skill {
            name: "Volley".into(),
            cooldown: Some(1800),
            duration: Some(600),
            ..Skill::default()
        };
        skill.effects.attack_mul = Some(150);
        skill.effects.target = Some(Target::All);
        data.skills = vec![skill];
        let unit = unit(data);
        let setting = Rc::new(Setting::default());

        let idle = Situation::new(Rc::clone(&unit), Some(-1), Vec::<String>::new());
        assert_eq!(idle.int(StatKey::Attack, Stage::InBattle, &setting), Some(500));
        assert_eq!(idle.int(StatKey::Cooldown, Stage::InBattle, &setting), Some(1800));

        let active = Situation::new(unit, Some(0), Vec::<String>::new());
        assert_eq!(active.int(StatKey::Attack, Stage::InBattle, &setting), Some(750));
        let target = active.stat(StatKey::Target, Stage::InBattle).unwrap();
        assert_eq!(target.text(&setting).as_deref(), Some("All"));
        assert_eq!(active.int(StatKey::InitialTime, Stage::InBattle, &setting), Some(1800));
        assert_eq!(active.int(StatKey::Duration, Stage::InBattle, &setting), Some(600));
    }

    #[test]
    fn test_field_element_bonus() {
        let mut data = archer();
        data.element = Some(Element::Water);
        let situation = Situation::new(unit(data), None, Vec::<String>::new());

        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Defense, Stage::InBattle, &setting), Some(100));

        let watery = Setting::update(&setting, |s| s.field_element = Some(Element::Water));
        assert_eq!(situation.int(StatKey::Defense, Stage::InBattle, &watery), Some(120));
    }

    #[test]
    fn test_ratio_add() {
        let mut feature = Feature::default();
        feature.effects.attack_adds = vec![StatAdd::Ratio {
            of: StatRef::new(StatKey::Hp, Stage::InBattle),
            percent: 10,
        }];
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Attack, Stage::InBattle, &setting), Some(600));
    }

    #[test]
    fn test_cyclic_references_are_dropped() {
        let mut feature = Feature::default();
        feature.effects.attack_adds = vec![StatAdd::Ratio {
            of: StatRef::new(StatKey::Defense, Stage::InBattle),
            percent: 100,
        }];
        feature.effects.defense_adds = vec![
            StatAdd::Ratio {
                of: StatRef::new(StatKey::Attack, Stage::InBattle),
                percent: 100,
            },
            StatAdd::Flat(5),
        ];
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Attack, Stage::InBattle, &setting), Some(500));
        assert_eq!(situation.int(StatKey::Defense, Stage::InBattle, &setting), Some(105));
    }

    #[test]
    fn test_reference_between_separate_cycles_is_kept() {
        let ratio = |key, percent| StatAdd::Ratio {
            of: StatRef::new(key, Stage::InBattle),
            percent,
        };
        let mut feature = Feature::default();
        feature.effects.attack_adds = vec![ratio(StatKey::Defense, 100)];
        feature.effects.defense_adds = vec![ratio(StatKey::Attack, 100)];
        feature.effects.resist_adds = vec![ratio(StatKey::Hp, 100)];
        // hp reads attack, but attack never reads hp
        feature.effects.hp_adds = vec![ratio(StatKey::Resist, 100), ratio(StatKey::Attack, 100)];
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Attack, Stage::InBattle, &setting), Some(500));
        assert_eq!(situation.int(StatKey::Resist, Stage::InBattle, &setting), Some(10));
        assert_eq!(situation.int(StatKey::Hp, Stage::InBattle, &setting), Some(1500));
    }

    #[test]
    fn test_critical_chance_is_clamped() {
        let mut data = archer();
        data.critical_chance = Some(80);
        data.features = vec![
            Feature {
                name: Some("Keen".into()),
                effects: FeatureEffects {
                    critical_chance_add: Some(50),
                    ..FeatureEffects::default()
                },
                ..Feature::default()
            },
            Feature {
                name: Some("Dazed".into()),
                effects: FeatureEffects {
                    critical_chance_add: Some(-200),
                    ..FeatureEffects::default()
                },
                ..Feature::default()
            },
        ];
        let unit = unit(data);
        let setting = Rc::new(Setting::default());

        let keen = Situation::new(Rc::clone(&unit), None, ["Keen"]);
        assert_eq!(keen.int(StatKey::CriticalChance, Stage::InBattle, &setting), Some(100));
        let dazed = Situation::new(unit, None, ["Dazed"]);
        assert_eq!(dazed.int(StatKey::CriticalChance, Stage::InBattle, &setting), Some(0));
    }

    #[test]
    fn test_rounds_and_hits_multiply_dps() {
        let mut data = archer();
        data.rounds = Some(4);
        let mut feature = Feature::default();
        feature.effects.rounds = Some(2);
        feature.effects.hits = Some(3);
        let situation = Situation::new(
            unit(with_feature(data, feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Rounds, Stage::InBattle, &setting), Some(2));
        assert_eq!(situation.int(StatKey::Hits, Stage::InBattle, &setting), Some(3));
        // 500 per hit, 2 rounds of 3 hits every 50 frames
        let dps = situation.value(StatKey::Dps(0), Stage::Actual, &setting);
        assert_eq!(dps, Some(Value::Real(3600.0)));
    }

    #[test]
    fn test_rounds_fall_back_to_unit() {
        let mut data = archer();
        data.rounds = Some(4);
        let situation = Situation::new(unit(data), None, Vec::<String>::new());
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Rounds, Stage::InBattle, &setting), Some(4));
        assert_eq!(situation.int(StatKey::Hits, Stage::InBattle, &setting), Some(1));
    }

    #[test]
    fn test_static_damage_replaces_critical_attack() {
        let mut feature = Feature::default();
        feature.effects.static_damage = Some(StaticDamage::Flat(200));
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        let critical = |stage| situation.int(StatKey::CriticalAttack, stage, &setting);
        assert_eq!(critical(Stage::InBattle), Some(750));
        assert_eq!(critical(Stage::Actual), Some(200));
        assert_eq!(situation.int(StatKey::Attack, Stage::Actual, &setting), Some(200));
    }

    #[test]
    fn test_static_damage_of_own_attack() {
        let mut feature = Feature::default();
        feature.effects.static_damage = Some(StaticDamage::Ratio {
            of: StatRef::new(StatKey::Attack, Stage::InBattle),
            percent: 150,
        });
        feature.effects.damage_factor = Some(200);
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.int(StatKey::Attack, Stage::Actual, &setting), Some(750));
    }

    #[test]
    fn test_accumulated_static_damage() {
        let mut feature = Feature::default();
        feature.effects.static_damage = Some(StaticDamage::Accumulated {
            base: 100,
            time: 120,
        });
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        // interval 50, attack speed 20: 2 full cycles plus a hit at frame 20 of the third
        assert_eq!(situation.int(StatKey::Attack, Stage::Actual, &setting), Some(300));
    }

    #[test]
    fn test_dps_columns() {
        let situation = Situation::new(unit(archer()), None, Vec::<String>::new());
        let setting = Rc::new(Setting::default());
        // 500 attack, no crit, 60 / 50 frames
        let dps = situation.column(StatKey::Dps(0)).unwrap();
        assert_eq!(dps.value(&setting), Some(Value::Real(600.0)));
        // defense 500 floors at 50 per hit
        let floored = situation.value(StatKey::Dps(1), Stage::InBattle, &setting);
        assert_eq!(floored, Some(Value::Real(60.0)));
    }

    #[test]
    fn test_conditional_color() {
        let mut feature = Feature {
            is_conditional_buff: true,
            ..Feature::default()
        };
        feature.effects.range_add = Some(50);
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        let range = situation.stat(StatKey::Range, Stage::InBattle).unwrap();
        assert_eq!(range.value(&setting), Some(Value::Int(250)));
        assert_eq!(range.color(&setting), Some(Color::StrongPositive));
    }

    #[test]
    fn test_clamp_warning_color() {
        let mut feature = Feature::default();
        feature.effects.attack_mul = Some(2000);
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            None,
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        let attack = situation.stat(StatKey::Attack, Stage::InBattle).unwrap();
        assert_eq!(attack.value(&setting), Some(Value::Int(5000)));
        assert_eq!(attack.color(&setting), Some(Color::Warning));
    }

    #[test]
    fn test_skill_buffs_and_tags() {
        let feature = Feature {
            is_buff_skill: true,
            effects: FeatureEffects {
                hp_mul: Some(110),
                conditions: vec!["HP50%".into()],
                ..FeatureEffects::default()
            },
            ..Feature::default()
        };
        let situation = Situation::new(
            unit(with_feature(archer(), feature)),
            Some(-1),
            Vec::<String>::new(),
        );
        let setting = Rc::new(Setting::default());
        assert_eq!(situation.skill_buffs(&setting).hp_mul, Some(110));
        let tags = situation.tags(&setting);
        assert!(tags.contains(NON_SKILL_TAG));
        assert!(tags.contains("HP50%"));
    }

    #[test]
    fn test_aggregate_is_memoized() {
        let situation = Situation::new(unit(archer()), None, Vec::<String>::new());
        let setting = Rc::new(Setting::default());
        let first = situation.aggregate(&setting);
        let second = situation.aggregate(&setting);
        assert!(Rc::ptr_eq(&first, &second));

        let next = Setting::update(&setting, |_| {});
        assert!(!Rc::ptr_eq(&first, &situation.aggregate(&next)));
    }

    #[test]
    fn test_subskills_see_situation_tags() {
        let mut subskill = crate::catalog::Subskill {
            id: 4,
            name: "Ambush".into(),
            ..Default::default()
        };
        subskill.factors.overrides.push(crate::catalog::FactorOverride {
            require: vec![SKILL_TAG.to_string()],
            exclude: vec![],
            factors: [(FactorKey::BattleAttackMul, 120)].into_iter().collect(),
        });
        let mut data = archer();
        data.skills = vec![Skill::default()];
        let catalog = Rc::new(Catalog::new(&GameData {
            subskills: vec![subskill],
            ..GameData::default()
        }));
        let unit = Rc::new(Unit::new(data, catalog, None));
        let setting = Rc::new(Setting {
            subskill1: Some(4),
            ..Setting::default()
        });

        let idle = Situation::new(Rc::clone(&unit), None, Vec::<String>::new());
        assert_eq!(idle.int(StatKey::Attack, Stage::InBattle, &setting), Some(500));
        let active = Situation::new(unit, Some(0), Vec::<String>::new());
        assert_eq!(active.int(StatKey::Attack, Stage::InBattle, &setting), Some(600));
    }
}
