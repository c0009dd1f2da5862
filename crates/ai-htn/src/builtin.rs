//! Stock preconditions and operators.

use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use ai_core::{BbValue, Blackboard, Effects};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::operator::{Operator, OperatorPlan, OperatorStatus, Precondition};

/// A plain value that can be written to and compared against a blackboard entry.
///
/// Stored on the blackboard as `bool`, `i64`, `f64` or `String`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn to_value(&self) -> BbValue {
        match self {
            Literal::Bool(v) => Rc::new(*v),
            Literal::Int(v) => Rc::new(*v),
            Literal::Float(v) => Rc::new(*v),
            Literal::Str(v) => Rc::new(v.clone()),
        }
    }

    /// Whether `value` holds this literal. Values of another type never match.
    pub fn matches(&self, value: &BbValue) -> bool {
        match self {
            Literal::Bool(v) => value.downcast_ref::<bool>() == Some(v),
            Literal::Int(v) => value.downcast_ref::<i64>() == Some(v),
            Literal::Float(v) => value.downcast_ref::<f64>() == Some(v),
            Literal::Str(v) => value.downcast_ref::<String>() == Some(v),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::Str(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Literal::Str(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyExists(pub Cow<'static, str>);

impl KeyExists {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }
}

impl Precondition for KeyExists {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        blackboard.contains_name(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMissing(pub Cow<'static, str>);

impl KeyMissing {
    pub fn new(key: impl Into<Cow<'static, str>>) -> Self {
        Self(key.into())
    }
}

impl Precondition for KeyMissing {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        !blackboard.contains_name(&self.0)
    }
}

/// Met when `key` is present and holds `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyEquals {
    pub key: Cow<'static, str>,
    pub value: Literal,
}

impl KeyEquals {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Literal>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Precondition for KeyEquals {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        blackboard
            .get_value(&self.key)
            .is_some_and(|value| self.value.matches(value))
    }
}

pub struct Not(pub Rc<dyn Precondition>);

impl Not {
    pub fn new(inner: impl Precondition + 'static) -> Self {
        Self(Rc::new(inner))
    }
}

impl Precondition for Not {
    fn is_met(&self, blackboard: &Blackboard) -> bool {
        !self.0.is_met(blackboard)
    }
}

/// Writes `key = value`, both as a planning effect and when run. Finishes on its first update.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperator {
    pub key: Cow<'static, str>,
    pub value: Literal,
}

impl SetOperator {
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Literal>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Operator for SetOperator {
    fn name(&self) -> &str {
        "set"
    }

    fn plan(&self, _blackboard: &Blackboard, _cancel: &CancellationToken) -> OperatorPlan {
        let mut effects = Effects::new();
        effects.insert(self.key.clone(), self.value.to_value());
        OperatorPlan::with_effects(effects)
    }

    fn update(&self, blackboard: &mut Blackboard, _dt: f32) -> OperatorStatus {
        match blackboard.set_value(self.key.clone(), self.value.to_value()) {
            Ok(()) => OperatorStatus::Finished,
            Err(err) => {
                tracing::warn!(key = %self.key, %err, "set operator failed");
                OperatorStatus::Failed
            }
        }
    }
}

/// Runs for `duration` seconds. The time left lives on the blackboard under `key` (an `f32`),
/// so one operator can serve any number of agents.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOperator {
    pub duration: f32,
    pub key: Cow<'static, str>,
}

impl WaitOperator {
    pub fn new(duration: f32, key: impl Into<Cow<'static, str>>) -> Self {
        Self {
            duration: duration.max(0.0),
            key: key.into(),
        }
    }
}

impl Operator for WaitOperator {
    fn name(&self) -> &str {
        "wait"
    }

    fn startup(&self, blackboard: &mut Blackboard) {
        let _ = blackboard.set_value(self.key.clone(), Rc::new(self.duration));
    }

    fn update(&self, blackboard: &mut Blackboard, dt: f32) -> OperatorStatus {
        let Some(remaining) = blackboard
            .get_value(&self.key)
            .and_then(|value| value.downcast_ref::<f32>())
            .copied()
        else {
            return OperatorStatus::Failed;
        };

        let remaining = remaining - dt;
        if remaining <= 0.0 {
            return OperatorStatus::Finished;
        }
        match blackboard.set_value(self.key.clone(), Rc::new(remaining)) {
            Ok(()) => OperatorStatus::Continuing,
            Err(_) => OperatorStatus::Failed,
        }
    }

    fn shutdown(&self, blackboard: &mut Blackboard, _status: OperatorStatus) {
        let _ = blackboard.remove_value(&self.key);
    }
}
