use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::dsl::instruction::{Operand, Value};
use crate::model::{Light, SortedLightSet};

/// The sorted names a traversal walks.
enum Scope<'a> {
    Lights(&'a BTreeMap<String, Light>),
    Sets(&'a BTreeMap<String, BTreeSet<String>>),
    Members(&'a BTreeSet<String>),
    Empty,
}

fn after<'a, V>(map: &'a BTreeMap<String, V>, cur: &str) -> Option<&'a String> {
    map.range::<str, _>((Bound::Excluded(cur), Bound::Unbounded))
        .next()
        .map(|(k, _)| k)
}

fn before<'a, V>(map: &'a BTreeMap<String, V>, cur: &str) -> Option<&'a String> {
    map.range::<str, _>((Bound::Unbounded, Bound::Excluded(cur)))
        .next_back()
        .map(|(k, _)| k)
}

impl<'a> Scope<'a> {
    /// `operand` selects lights or sets; `target` is `All` or the name of
    /// the group or location whose members are walked. An absent group or
    /// location is walked as empty.
    fn resolve(lights: &'a SortedLightSet, operand: Operand, target: &Value) -> Self {
        let sets = match operand {
            Operand::Light
            | Operand::MzLight
            | Operand::Matrix
            | Operand::MatrixTop
            | Operand::All => {
                return Scope::Lights(lights.lights());
            }
            Operand::Group => lights.groups(),
            Operand::Location => lights.locations(),
            Operand::Null => return Scope::Empty,
        };
        match target {
            Value::Operand(Operand::All) => Scope::Sets(sets),
            Value::Str(name) => sets.get(name).map_or(Scope::Empty, Scope::Members),
            _ => Scope::Empty,
        }
    }

    fn first(&self) -> Option<&'a String> {
        match self {
            Scope::Lights(map) => map.keys().next(),
            Scope::Sets(map) => map.keys().next(),
            Scope::Members(set) => set.first(),
            Scope::Empty => None,
        }
    }

    fn last(&self) -> Option<&'a String> {
        match self {
            Scope::Lights(map) => map.keys().next_back(),
            Scope::Sets(map) => map.keys().next_back(),
            Scope::Members(set) => set.last(),
            Scope::Empty => None,
        }
    }

    fn next(&self, cur: &str) -> Option<&'a String> {
        match self {
            Scope::Lights(map) => after(map, cur),
            Scope::Sets(map) => after(map, cur),
            Scope::Members(set) => set
                .range::<str, _>((Bound::Excluded(cur), Bound::Unbounded))
                .next(),
            Scope::Empty => None,
        }
    }

    fn prev(&self, cur: &str) -> Option<&'a String> {
        match self {
            Scope::Lights(map) => before(map, cur),
            Scope::Sets(map) => before(map, cur),
            Scope::Members(set) => set
                .range::<str, _>((Bound::Unbounded, Bound::Excluded(cur)))
                .next_back(),
            Scope::Empty => None,
        }
    }
}

fn found(name: Option<&String>) -> Value {
    name.map_or(Value::NULL, |n| Value::Str(n.clone()))
}

/// First name in the scope, or NULL.
pub fn disc(lights: &SortedLightSet, operand: Operand, target: &Value) -> Value {
    found(Scope::resolve(lights, operand, target).first())
}

pub fn disc_last(lights: &SortedLightSet, operand: Operand, target: &Value) -> Value {
    found(Scope::resolve(lights, operand, target).last())
}

/// Name following `current`. A non-string `current` ends the walk.
pub fn disc_next(
    lights: &SortedLightSet,
    operand: Operand,
    current: &Value,
    target: &Value,
) -> Value {
    let Value::Str(cur) = current else {
        return Value::NULL;
    };
    found(Scope::resolve(lights, operand, target).next(cur))
}

pub fn disc_prev(
    lights: &SortedLightSet,
    operand: Operand,
    current: &Value,
    target: &Value,
) -> Value {
    let Value::Str(cur) = current else {
        return Value::NULL;
    };
    found(Scope::resolve(lights, operand, target).prev(cur))
}
