//! Stage formulas of the stat pipeline.
//!
//! Each stage is a factor record built from its inputs; `resolve` fills in
//! the result. The records are kept whole so a renderer can show the full
//! equation behind every number. Composition order follows the game's
//! integer semantics and must not be rearranged: every `percent::multiply`
//! truncates.

use crate::data::DamageType;
use crate::node::Color;
use crate::percent::{self, UNITY};
use crate::value::Value;
use serde::Serialize;

/// Barrack stage of a core stat.
///
/// ```text
/// inner   = multiply(base + potential_add, base_buff)
/// outer   = multiply(inner + bonus, multiplier)
/// result  = outer + subskill_add + weapon_base + weapon_upgrade
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarrackFactors {
    pub base: i64,
    pub potential_add: i64,
    /// `sum(potential mul, weapon potential buff)`.
    pub base_buff: i64,
    pub bonus: i64,
    /// `sum(subskill mul, weapon buff)`.
    pub multiplier: i64,
    pub subskill_add: i64,
    pub weapon_base: i64,
    pub weapon_upgrade: i64,
    pub result: i64,
}

impl BarrackFactors {
    /// Neutral factors over `base`.
    pub fn new(base: i64) -> Self {
        Self {
            base,
            potential_add: 0,
            base_buff: UNITY,
            bonus: 0,
            multiplier: UNITY,
            subskill_add: 0,
            weapon_base: 0,
            weapon_upgrade: 0,
            result: base,
        }
    }

    /// Apply every factor and store the barrack value in `result`.
    pub fn resolve(mut self) -> Self {
        let inner = percent::multiply([self.base + self.potential_add, self.base_buff]);
        let outer = percent::multiply([inner + self.bonus, self.multiplier]);
        self.result = outer + self.subskill_add + self.weapon_base + self.weapon_upgrade;
        self
    }
}

/// Deployment stage: battlefield-wide buffs applied to the barrack value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentFactors {
    pub barrack: i64,
    /// Tokens skip every deployment buff.
    pub is_token: bool,
    pub formation: i64,
    pub environment: i64,
    pub beast_mul: i64,
    pub beast_add: i64,
    pub possession_level: i64,
    pub possession_amount: i64,
    pub type_bonus: i64,
    pub result: i64,
}

impl DeploymentFactors {
    /// Neutral factors over the barrack value. Tokens are never modified.
    pub fn new(barrack: i64, is_token: bool) -> Self {
        Self {
            barrack,
            is_token,
            formation: UNITY,
            environment: UNITY,
            beast_mul: UNITY,
            beast_add: 0,
            possession_level: UNITY,
            possession_amount: 0,
            type_bonus: UNITY,
            result: barrack,
        }
    }

    /// Apply every factor; tokens keep the barrack value.
    pub fn resolve(mut self) -> Self {
        if self.is_token {
            self.result = self.barrack;
            return self;
        }
        let formed = percent::multiply([self.barrack, self.formation]);
        let environed = percent::multiply([formed, self.environment]);
        let beast = percent::multiply([environed, self.beast_mul]) + self.beast_add;
        let possessed = percent::multiply([beast, self.possession_level]) + self.possession_amount;
        self.result = percent::multiply([possessed, self.type_bonus]);
        self
    }
}

/// In-battle stage: skill and feature layers with the damage limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InBattleFactors {
    pub deployment: i64,
    pub skill_mul: Option<i64>,
    pub feature_mul: Option<i64>,
    pub field_element_mul: Option<i64>,
    pub subskill_mul: Option<i64>,
    pub panel_mul: Option<i64>,
    /// `sum` of the five multipliers above.
    pub multiplier: i64,
    pub addition: i64,
    /// Result before the limits apply.
    pub raw: i64,
    pub upper_limit: i64,
    pub lower_limit: i64,
    pub is_max_damage: bool,
    pub is_min_damage: bool,
    /// Current value as a percent of the maximum (current HP).
    pub current_ratio: i64,
    pub result: i64,
}

impl InBattleFactors {
    /// Neutral factors over the deployment value, with its limits.
    pub fn new(deployment: i64) -> Self {
        Self {
            deployment,
            skill_mul: None,
            feature_mul: None,
            field_element_mul: None,
            subskill_mul: None,
            panel_mul: None,
            multiplier: UNITY,
            addition: 0,
            raw: deployment,
            upper_limit: deployment * 10,
            lower_limit: deployment / 2,
            is_max_damage: false,
            is_min_damage: false,
            current_ratio: UNITY,
            result: deployment,
        }
    }

    /// Clamp to `[deployment / 2, deployment × 10]`, unless the raw result is 0.
    ///
    /// ```rust
    /// use towerstat::pipeline::InBattleFactors;
    ///
    /// let mut factors = InBattleFactors::new(1000);
    /// factors.feature_mul = Some(1200);
    /// let factors = factors.resolve();
    /// assert_eq!(factors.result, 10000);
    /// assert!(factors.is_max_damage);
    /// ```
    pub fn resolve(mut self) -> Self {
        self.multiplier = percent::sum([
            self.skill_mul,
            self.feature_mul,
            self.field_element_mul,
            self.subskill_mul,
            self.panel_mul,
        ]);
        self.raw = percent::multiply([self.deployment, self.multiplier]) + self.addition;

        let mut clamped = self.raw;
        self.is_max_damage = false;
        self.is_min_damage = false;
        if self.raw != 0 {
            if self.raw > self.upper_limit {
                clamped = self.upper_limit;
                self.is_max_damage = true;
            } else if self.raw < self.lower_limit {
                clamped = self.lower_limit;
                self.is_min_damage = true;
            }
        }
        self.result = percent::multiply([clamped, self.current_ratio]);
        self
    }

    /// Whether either damage limit was hit.
    pub fn is_clamped(&self) -> bool {
        self.is_max_damage || self.is_min_damage
    }
}

/// Actual stage of damage: the damage factor chain or a static override.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActualFactors {
    pub in_battle: i64,
    pub skill_factor: Option<i64>,
    pub feature_factor: Option<i64>,
    pub subskill_factor: Option<i64>,
    pub limit_break: i64,
    pub panel_factor: i64,
    /// `multiply` of the five factors above.
    pub damage_factor: i64,
    pub static_damage: Option<i64>,
    pub result: i64,
}

impl ActualFactors {
    /// Neutral factors over the in-battle value.
    pub fn new(in_battle: i64) -> Self {
        Self {
            in_battle,
            skill_factor: None,
            feature_factor: None,
            subskill_factor: None,
            limit_break: UNITY,
            panel_factor: UNITY,
            damage_factor: UNITY,
            static_damage: None,
            result: in_battle,
        }
    }

    /// Fold static damage and the damage factor into `result`.
    pub fn resolve(mut self) -> Self {
        self.damage_factor = percent::multiply([
            self.skill_factor,
            self.feature_factor,
            self.subskill_factor,
            Some(self.limit_break),
            Some(self.panel_factor),
        ]);
        self.result = match self.static_damage {
            Some(damage) => damage,
            None => percent::multiply([self.in_battle, self.damage_factor]),
        };
        self
    }
}

/// A value scaled by one percent plus a flat addition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledFactors {
    pub base: i64,
    pub percent: i64,
    pub addition: i64,
    pub result: i64,
}

impl ScaledFactors {
    /// `base * ratio / 100 + addition`, for ratio-scaled references.
    pub fn resolve(base: i64, ratio: i64, addition: i64) -> Self {
        Self {
            base,
            percent: ratio,
            addition,
            result: percent::multiply([base, ratio]) + addition,
        }
    }

    /// `divide(base, ratio)`: a speed-up percent shortens a duration.
    pub fn divided(base: i64, ratio: i64) -> Option<Self> {
        Some(Self {
            base,
            percent: ratio,
            addition: 0,
            result: percent::divide(base, ratio)?,
        })
    }
}

/// Per-hit damage against one enemy, with the penetration split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HitDamage {
    pub damage: i64,
    /// The physical floor (a tenth of the attack) was hit.
    pub is_min_damage: bool,
}

/// Damage of one hit of `attack` after defense or resist.
pub fn hit_damage(
    attack: i64,
    damage_type: DamageType,
    penetration: i64,
    defense: i64,
    resist: i64,
) -> HitDamage {
    let pierced = percent::multiply([attack, penetration]);
    let rest = attack - pierced;
    match damage_type {
        DamageType::Physical => {
            let floor = rest / 10;
            let reduced = rest - defense;
            HitDamage {
                damage: pierced + floor.max(reduced),
                is_min_damage: floor > reduced,
            }
        }
        DamageType::Magical => HitDamage {
            damage: pierced + percent::multiply([rest, UNITY - resist]).max(0),
            is_min_damage: resist >= UNITY,
        },
        DamageType::True | DamageType::Heal => HitDamage {
            damage: attack,
            is_min_damage: false,
        },
    }
}

/// Damage per second against one DPS column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DpsFactors {
    pub attack: i64,
    pub critical_attack: i64,
    pub damage_type: DamageType,
    pub penetration: i64,
    pub enemy_defense: i64,
    pub enemy_resist: i64,
    pub normal: HitDamage,
    pub critical: HitDamage,
    pub critical_chance: i64,
    pub rounds: i64,
    pub hits: i64,
    pub interval: i64,
    pub result: f64,
}

/// Inputs of [`dps`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DpsInputs {
    pub attack: i64,
    pub critical_attack: i64,
    pub damage_type: DamageType,
    pub penetration: i64,
    pub critical_chance: i64,
    pub rounds: i64,
    pub hits: i64,
    pub interval: i64,
}

/// `(normal × (100 − cc) + critical × cc) / 100 × rounds × hits × 60 / interval`.
///
/// Healers and units without a positive interval have no DPS.
pub fn dps(inputs: DpsInputs, enemy_defense: i64, enemy_resist: i64) -> Option<DpsFactors> {
    if inputs.damage_type == DamageType::Heal || inputs.interval <= 0 {
        return None;
    }
    let hit = |attack| {
        hit_damage(
            attack,
            inputs.damage_type,
            inputs.penetration,
            enemy_defense,
            enemy_resist,
        )
    };
    let normal = hit(inputs.attack);
    let critical = hit(inputs.critical_attack);
    let cc = inputs.critical_chance.clamp(0, UNITY);

    let per_round =
        (normal.damage * (UNITY - cc) + critical.damage * cc) as f64 / UNITY as f64;
    let result =
        per_round * (inputs.rounds * inputs.hits) as f64 * 60.0 / inputs.interval as f64;

    Some(DpsFactors {
        attack: inputs.attack,
        critical_attack: inputs.critical_attack,
        damage_type: inputs.damage_type,
        penetration: inputs.penetration,
        enemy_defense,
        enemy_resist,
        normal,
        critical,
        critical_chance: cc,
        rounds: inputs.rounds,
        hits: inputs.hits,
        interval: inputs.interval,
        result,
    })
}

/// The factor record of any stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "stage")]
pub enum Factors {
    Barrack(BarrackFactors),
    Deployment(DeploymentFactors),
    InBattle(InBattleFactors),
    Actual(ActualFactors),
    Scaled(ScaledFactors),
    Dps(DpsFactors),
}

impl Factors {
    /// The value the record resolves to.
    pub fn result(&self) -> Value {
        match self {
            Factors::Barrack(f) => Value::Int(f.result),
            Factors::Deployment(f) => Value::Int(f.result),
            Factors::InBattle(f) => Value::Int(f.result),
            Factors::Actual(f) => Value::Int(f.result),
            Factors::Scaled(f) => Value::Int(f.result),
            Factors::Dps(f) => Value::Real(f.result),
        }
    }

    /// Whether an in-battle limit was hit.
    pub fn is_clamped(&self) -> bool {
        matches!(self, Factors::InBattle(f) if f.is_clamped())
    }
}

/// Color of a value compared with the stage it was derived from.
///
/// Clamped values are a warning. Otherwise the direction of change picks
/// positive or negative (inverted for lower-is-better columns); `weak` picks
/// the weak palette, `conditional` the strong one, and a conditional stat
/// that did not move is informational.
pub fn compare_color(
    previous: Option<i64>,
    current: Option<i64>,
    reversed: bool,
    weak: bool,
    conditional: bool,
    clamped: bool,
) -> Option<Color> {
    if clamped {
        return Some(Color::Warning);
    }
    let ordering = match (previous, current) {
        (Some(previous), Some(current)) => current.cmp(&previous),
        _ => std::cmp::Ordering::Equal,
    };
    let better = match ordering {
        std::cmp::Ordering::Equal => {
            return conditional.then_some(Color::Info);
        }
        std::cmp::Ordering::Greater => !reversed,
        std::cmp::Ordering::Less => reversed,
    };
    Some(match (better, weak, conditional) {
        (true, _, true) => Color::StrongPositive,
        (false, _, true) => Color::StrongNegative,
        (true, true, false) => Color::WeakPositive,
        (false, true, false) => Color::WeakNegative,
        (true, false, false) => Color::Positive,
        (false, false, false) => Color::Negative,
    })
}
