use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;

use thiserror::Error;

/// A stored blackboard value. Cloning shares the value; it is never deep-copied.
pub type BbValue = Rc<dyn Any>;

/// Key/value writes captured while planning a single step.
pub type Effects = BTreeMap<Cow<'static, str>, BbValue>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("blackboard is read-only (write to key `{key}`)")]
    ReadOnly { key: String },
    #[error("blackboard type mismatch for key `{key}` (stored type differs from requested)")]
    TypeMismatch { key: String },
}

/// Typed name of a blackboard entry.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BbKey<T: 'static> {
    name: &'static str,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Copy for BbKey<T> {}

impl<T: 'static> Clone for BbKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> BbKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn name(self) -> &'static str {
        self.name
    }
}

/// Per-agent working memory.
///
/// Keys are strings, values are heterogeneous. `clone` is shallow: the map is copied, the
/// values are shared, so a planning job can mutate its copy without touching the original.
/// While `read_only` is set every write fails with [`BlackboardError::ReadOnly`].
#[derive(Default)]
pub struct Blackboard {
    values: BTreeMap<Cow<'static, str>, BbValue>,
    read_only: bool,
}

impl Clone for Blackboard {
    fn clone(&self) -> Self {
        Self {
            values: self.values.clone(),
            read_only: false,
        }
    }
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn contains<T: 'static>(&self, key: BbKey<T>) -> bool {
        self.values.contains_key(key.name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set<T: 'static>(&mut self, key: BbKey<T>, value: T) -> Result<(), BlackboardError> {
        self.set_value(key.name, Rc::new(value))
    }

    pub fn set_value(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: BbValue,
    ) -> Result<(), BlackboardError> {
        let name = name.into();
        if self.read_only {
            return Err(BlackboardError::ReadOnly {
                key: name.into_owned(),
            });
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Write every entry of `effects`, stopping at the first failure.
    pub fn apply(&mut self, effects: &Effects) -> Result<(), BlackboardError> {
        for (name, value) in effects {
            self.set_value(name.clone(), value.clone())?;
        }
        Ok(())
    }

    pub fn get<T: 'static>(&self, key: BbKey<T>) -> Option<&T> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    pub fn try_get<T: 'static>(&self, key: BbKey<T>) -> Result<Option<&T>, BlackboardError> {
        let Some(value) = self.values.get(key.name) else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .map(Some)
            .ok_or_else(|| BlackboardError::TypeMismatch {
                key: key.name.to_string(),
            })
    }

    pub fn get_value(&self, name: &str) -> Option<&BbValue> {
        self.values.get(name)
    }

    pub fn remove<T: 'static>(&mut self, key: BbKey<T>) -> Result<Option<BbValue>, BlackboardError> {
        self.remove_value(key.name)
    }

    pub fn remove_value(&mut self, name: &str) -> Result<Option<BbValue>, BlackboardError> {
        if self.read_only {
            return Err(BlackboardError::ReadOnly {
                key: name.to_string(),
            });
        }
        Ok(self.values.remove(name))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_ref())
    }
}
