//! Resolved objects of a document.

use crate::model::objects::{ObjectKey, Value};
use crate::parser::FramingFlags;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// Map from key to resolved value.
///
/// Filled lazily by the resolver and overwritten by callers that replace
/// objects. Values are shared, so a later `set` never changes a value a
/// caller already holds.
#[derive(Debug, Default)]
pub struct ObjectBody {
    objects: RefCell<FxHashMap<ObjectKey, Rc<Value>>>,
    framing: RefCell<FxHashMap<ObjectKey, FramingFlags>>,
}

impl ObjectBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: ObjectKey) -> Option<Rc<Value>> {
        self.objects.borrow().get(&key).cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: ObjectKey, value: impl Into<Rc<Value>>) -> Option<Rc<Value>> {
        self.objects.borrow_mut().insert(key, value.into())
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.borrow().contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    /// Keys in number order.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<_> = self.objects.borrow().keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    pub fn max_number(&self) -> Option<u64> {
        self.objects.borrow().keys().map(|k| k.number).max()
    }

    /// Framing observed when `key` was parsed from the file.
    pub fn framing(&self, key: ObjectKey) -> Option<FramingFlags> {
        self.framing.borrow().get(&key).copied()
    }

    pub(crate) fn set_framing(&self, key: ObjectKey, flags: FramingFlags) {
        self.framing.borrow_mut().insert(key, flags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_without_touching_held_values() {
        let body = ObjectBody::new();
        let key = ObjectKey::new(4, 0);
        assert!(body.set(key, Value::Int(1)).is_none());
        let held = body.get(key).unwrap();
        let old = body.set(key, Value::Int(2)).unwrap();
        assert_eq!(*old, Value::Int(1));
        assert_eq!(*held, Value::Int(1));
        assert_eq!(body.get(key).as_deref(), Some(&Value::Int(2)));
    }

    #[test]
    fn keys_are_sorted() {
        let body = ObjectBody::new();
        body.set(ObjectKey::new(9, 0), Value::Null);
        body.set(ObjectKey::new(2, 1), Value::Null);
        body.set(ObjectKey::new(2, 0), Value::Null);
        assert_eq!(
            body.keys(),
            [ObjectKey::new(2, 0), ObjectKey::new(2, 1), ObjectKey::new(9, 0)]
        );
        assert_eq!(body.max_number(), Some(9));
        assert!(body.framing(ObjectKey::new(9, 0)).is_none());
    }
}
