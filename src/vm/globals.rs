use std::rc::Rc;
use crate::value::Value;

/// Top-level bindings in first-assignment order. Lookup is a linear scan by
/// exact name; programs only ever hold a handful of globals.
#[derive(Debug, Clone, Default)]
pub struct GlobalTable {
    slots: Vec<(Rc<str>, Value)>,
}

impl GlobalTable {
    pub fn new() -> Self {
        GlobalTable::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|(n, _)| &**n == name)
    }

    /// Nil for names never assigned.
    pub fn get(&self, name: &str) -> Value {
        self.position(name)
            .map(|i| self.slots[i].1.clone())
            .unwrap_or(Value::Nil)
    }

    /// Overwrites an existing slot in place, otherwise appends a new one.
    pub fn set(&mut self, name: &Rc<str>, value: Value) {
        match self.position(name) {
            Some(i) => self.slots[i].1 = value,
            None => self.slots.push((Rc::clone(name), value)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.slots.iter().map(|(n, v)| (&**n, v))
    }
}
