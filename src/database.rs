//! The unit database.
//!
//! A [`Database`] is built once from [`GameData`]: units are constructed
//! parents-first so every token holds its parent, then one [`Situation`] is
//! created per declared build (or a plain one for units that declare none).

use crate::catalog::Catalog;
use crate::data::{GameData, UnitData, UnitId};
use crate::error::EngineError;
use crate::graph::DependencyGraph;
use crate::situation::Situation;
use crate::unit::Unit;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// Every unit and situation of a catalog.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use towerstat::{Database, Setting, Stage, StatKey};
///
/// let db = Database::from_json_str(
///     r#"{ "units": [
///         { "id": 1, "name": "Knight", "rarity": "gold", "hp": 1200, "attack": 300 },
///         { "id": 2, "name": "Squire", "rarity": "iron", "parent": 1, "hp": 400 }
///     ] }"#,
/// ).unwrap();
///
/// let setting = Rc::new(Setting::default());
/// let squire = &db.situations_of(2)[0];
/// assert_eq!(squire.int(StatKey::Hp, Stage::InBattle, &setting), Some(400));
/// // the token does not define attack, so it reads its parent's
/// assert_eq!(squire.int(StatKey::Attack, Stage::Actual, &setting), Some(300));
/// ```
#[derive(Debug)]
pub struct Database {
    catalog: Rc<Catalog>,
    units: BTreeMap<UnitId, Rc<Unit>>,
    situations: Vec<Rc<Situation>>,
}

impl Database {
    /// Build every unit and situation of `data`.
    ///
    /// # Arguments
    ///
    /// * `data` - The parsed catalog
    ///
    /// # Returns
    ///
    /// * `Ok(Database)` - Units built parents-first, with their situations
    /// * `Err(EngineError::DuplicateUnit)` - Two units share an id
    /// * `Err(EngineError::UnknownParent)` - A token names a missing parent
    /// * `Err(EngineError::Cycle)` - Parents form a loop
    pub fn new(data: GameData) -> Result<Self, EngineError> {
        let catalog = Rc::new(Catalog::new(&data));

        let mut records: BTreeMap<UnitId, UnitData> = BTreeMap::new();
        for unit in &data.units {
            if records.insert(unit.id, unit.clone()).is_some() {
                return Err(EngineError::DuplicateUnit(unit.id));
            }
        }

        let mut graph = DependencyGraph::new();
        for unit in records.values() {
            graph.add_node(unit.id);
            if let Some(parent) = unit.parent {
                if !records.contains_key(&parent) {
                    return Err(EngineError::UnknownParent {
                        unit: unit.id,
                        parent,
                    });
                }
                graph.add_edge(unit.id, parent);
            }
        }

        let mut units: BTreeMap<UnitId, Rc<Unit>> = BTreeMap::new();
        for id in graph.topological_sort()? {
            let Some(record) = records.remove(&id) else {
                continue;
            };
            let parent = record.parent.and_then(|p| units.get(&p)).cloned();
            units.insert(id, Rc::new(Unit::new(record, Rc::clone(&catalog), parent)));
        }

        let situations: Vec<Rc<Situation>> = units
            .values()
            .flat_map(|unit| {
                let declared = &unit.data().situations;
                if declared.is_empty() {
                    vec![Rc::new(Situation::new(
                        Rc::clone(unit),
                        None,
                        Vec::<String>::new(),
                    ))]
                } else {
                    declared
                        .iter()
                        .map(|s| Rc::new(Situation::from_data(Rc::clone(unit), s)))
                        .collect()
                }
            })
            .collect();

        debug!(
            units = units.len(),
            situations = situations.len(),
            "built unit database"
        );
        Ok(Self {
            catalog,
            units,
            situations,
        })
    }

    /// Parse and build in one step.
    pub fn from_json_str(text: &str) -> Result<Self, EngineError> {
        Self::new(GameData::from_json_str(text)?)
    }

    /// The lookup tables shared by every unit.
    pub fn catalog(&self) -> &Rc<Catalog> {
        &self.catalog
    }

    /// Unit by id.
    pub fn unit(&self, id: UnitId) -> Option<&Rc<Unit>> {
        self.units.get(&id)
    }

    /// Units in id order.
    pub fn units(&self) -> impl Iterator<Item = &Rc<Unit>> {
        self.units.values()
    }

    /// Every situation, grouped by unit in id order.
    pub fn situations(&self) -> &[Rc<Situation>] {
        &self.situations
    }

    /// Situations of one unit, in declaration order.
    pub fn situations_of(&self, id: UnitId) -> Vec<Rc<Situation>> {
        self.situations
            .iter()
            .filter(|s| s.unit().id() == id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Rarity, SituationData};

    fn unit(id: UnitId, parent: Option<UnitId>) -> UnitData {
        let mut data = UnitData::new(id, format!("Unit {}", id), Rarity::Silver);
        data.parent = parent;
        data.hp = Some(100);
        data
    }

    #[test]
    fn test_tokens_hold_their_parent() {
        // token listed before its parent
        let data = GameData {
            units: vec![unit(2, Some(1)), unit(1, None)],
            ..GameData::default()
        };
        let db = Database::new(data).unwrap();
        let token = db.unit(2).unwrap();
        assert_eq!(token.parent().map(|p| p.id()), Some(1));
        assert_eq!(db.units().count(), 2);
    }

    #[test]
    fn test_declared_situations() {
        let mut knight = unit(1, None);
        knight.situations = vec![
            SituationData::default(),
            SituationData {
                skill: Some(0),
                features: vec!["Guard".into()],
            },
        ];
        let data = GameData {
            units: vec![knight, unit(2, None)],
            ..GameData::default()
        };
        let db = Database::new(data).unwrap();
        assert_eq!(db.situations().len(), 3);
        let builds = db.situations_of(1);
        assert_eq!(builds[1].skill_slot(), Some(0));
        assert!(builds[1].features().contains("Guard"));
    }

    #[test]
    fn test_duplicate_unit() {
        let data = GameData {
            units: vec![unit(1, None), unit(1, None)],
            ..GameData::default()
        };
        assert!(matches!(
            Database::new(data),
            Err(EngineError::DuplicateUnit(1))
        ));
    }

    #[test]
    fn test_unknown_parent() {
        let data = GameData {
            units: vec![unit(3, Some(9))],
            ..GameData::default()
        };
        assert!(matches!(
            Database::new(data),
            Err(EngineError::UnknownParent { unit: 3, parent: 9 })
        ));
    }

    #[test]
    fn test_parent_cycle() {
        let data = GameData {
            units: vec![unit(1, Some(2)), unit(2, Some(1))],
            ..GameData::default()
        };
        match Database::new(data) {
            Err(EngineError::Cycle { path }) => assert_eq!(path.first(), path.last()),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
    }
}
