//! Core collection objects: lists, maps and sets
//!
//! Each collection remembers the reified type it was created with, so
//! `runtime_type` and `is` checks see `List<int>` rather than a bare `List`.
//! Maps and sets preserve insertion order.

use crate::context::Runtime;
use crate::error::{check_index, check_length, RtResult, RuntimeError};
use crate::value::{Value, ValueKey};
use parking_lot::RwLock;
use reify_types::TypeId;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Whether a list may change length or contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Growability {
    /// `add`, `remove` and `length=` allowed
    Growable,
    /// Elements may be replaced, length is fixed
    FixedLength,
    /// No mutation at all
    Unmodifiable,
}

/// A list instance
#[derive(Debug)]
pub struct ListObject {
    ty: TypeId,
    elem: TypeId,
    growability: Growability,
    items: RwLock<Vec<Value>>,
}

/// Shared list reference
pub type ListRef = Arc<ListObject>;

impl ListObject {
    /// Reified `List<E>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Element type `E`
    pub fn elem(&self) -> TypeId {
        self.elem
    }

    /// Mutability of this list
    pub fn growability(&self) -> Growability {
        self.growability
    }

    /// Current length
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Whether the list has no elements
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Copy of the current elements
    pub fn snapshot(&self) -> Vec<Value> {
        self.items.read().clone()
    }

    /// Element at `index`
    pub fn get(&self, index: i64) -> RtResult<Value> {
        let items = self.items.read();
        let index = check_index(index, items.len())?;
        Ok(items[index].clone())
    }

    /// Replace the element at `index`
    pub fn set(&self, index: i64, value: Value) -> RtResult<()> {
        if self.growability == Growability::Unmodifiable {
            return Err(RuntimeError::Unsupported(
                "Cannot modify an unmodifiable list".to_string(),
            ));
        }
        let mut items = self.items.write();
        let index = check_index(index, items.len())?;
        items[index] = value;
        Ok(())
    }

    fn ensure_growable(&self, action: &str) -> RtResult<()> {
        match self.growability {
            Growability::Growable => Ok(()),
            Growability::FixedLength => Err(RuntimeError::Unsupported(format!(
                "Cannot {} a fixed-length list",
                action
            ))),
            Growability::Unmodifiable => Err(RuntimeError::Unsupported(format!(
                "Cannot {} an unmodifiable list",
                action
            ))),
        }
    }

    /// Append an element
    pub fn push(&self, value: Value) -> RtResult<()> {
        self.ensure_growable("add to")?;
        self.items.write().push(value);
        Ok(())
    }

    /// Insert at `index` (which may equal the length)
    pub fn insert(&self, index: i64, value: Value) -> RtResult<()> {
        self.ensure_growable("add to")?;
        let mut items = self.items.write();
        let len = items.len();
        let index = check_index(index, len + 1)?;
        items.insert(index, value);
        Ok(())
    }

    /// Remove and return the element at `index`
    pub fn remove_at(&self, index: i64) -> RtResult<Value> {
        self.ensure_growable("remove from")?;
        let mut items = self.items.write();
        let index = check_index(index, items.len())?;
        Ok(items.remove(index))
    }

    /// Remove and return the last element
    pub fn pop(&self) -> RtResult<Value> {
        self.ensure_growable("remove from")?;
        self.items
            .write()
            .pop()
            .ok_or_else(|| RuntimeError::Range("Valid value range is empty: -1".to_string()))
    }

    /// Change the length, padding with null
    pub fn set_len(&self, len: i64) -> RtResult<()> {
        self.ensure_growable("change the length of")?;
        let len = check_length(Some(len), "List")?;
        self.items.write().resize(len, Value::Null);
        Ok(())
    }

    /// Remove every element
    pub fn clear(&self) -> RtResult<()> {
        self.ensure_growable("clear")?;
        self.items.write().clear();
        Ok(())
    }
}

/// Insertion-ordered hash table keyed by [`ValueKey`]
#[derive(Debug, Default, Clone)]
pub struct OrderedTable {
    entries: Vec<(Value, Value)>,
    index: FxHashMap<ValueKey, usize>,
}

impl OrderedTable {
    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the value for `key`
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.index.get(&key.key()).map(|&i| &self.entries[i].1)
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &Value) -> bool {
        self.index.contains_key(&key.key())
    }

    /// Insert or replace; returns the previous value. Existing keys keep
    /// their position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let k = key.key();
        if let Some(&i) = self.index.get(&k) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(k, self.entries.len());
        self.entries.push((key, value));
        None
    }

    /// Remove `key`, returning its value
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        let i = self.index.remove(&key.key())?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }
}

/// A map instance
#[derive(Debug)]
pub struct MapObject {
    ty: TypeId,
    key_ty: TypeId,
    value_ty: TypeId,
    table: RwLock<OrderedTable>,
}

/// Shared map reference
pub type MapRef = Arc<MapObject>;

impl MapObject {
    /// Reified `Map<K, V>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Key type `K`
    pub fn key_ty(&self) -> TypeId {
        self.key_ty
    }

    /// Value type `V`
    pub fn value_ty(&self) -> TypeId {
        self.value_ty
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Value stored under `key`
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.table.read().get(key).cloned()
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &Value) -> bool {
        self.table.read().contains(key)
    }

    /// Store `value` under `key`
    pub fn insert(&self, key: Value, value: Value) -> Option<Value> {
        self.table.write().insert(key, value)
    }

    /// Remove `key`
    pub fn remove(&self, key: &Value) -> Option<Value> {
        self.table.write().remove(key)
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.table.write().clear();
    }

    /// Copy of the entries in insertion order
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.table.read().entries().to_vec()
    }
}

/// A set instance
#[derive(Debug)]
pub struct SetObject {
    ty: TypeId,
    elem: TypeId,
    table: RwLock<OrderedTable>,
}

/// Shared set reference
pub type SetRef = Arc<SetObject>;

impl SetObject {
    /// Reified `Set<E>` type
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Element type `E`
    pub fn elem(&self) -> TypeId {
        self.elem
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Whether `value` is a member
    pub fn contains(&self, value: &Value) -> bool {
        self.table.read().contains(value)
    }

    /// Add `value`; returns true if it was not already present
    pub fn add(&self, value: Value) -> bool {
        self.table.write().insert(value, Value::Null).is_none()
    }

    /// Remove `value`; returns true if it was present
    pub fn remove(&self, value: &Value) -> bool {
        self.table.write().remove(value).is_some()
    }

    /// Remove every element
    pub fn clear(&self) {
        self.table.write().clear();
    }

    /// Copy of the elements in insertion order
    pub fn snapshot(&self) -> Vec<Value> {
        self.table.read().entries().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl Runtime {
    /// `List<E>` type
    pub fn list_type(&self, elem: TypeId) -> RtResult<TypeId> {
        self.instantiate(&self.core().list, &[elem])
    }

    /// `Map<K, V>` type
    pub fn map_type(&self, key: TypeId, value: TypeId) -> RtResult<TypeId> {
        self.instantiate(&self.core().map, &[key, value])
    }

    /// `Set<E>` type
    pub fn set_type(&self, elem: TypeId) -> RtResult<TypeId> {
        self.instantiate(&self.core().set, &[elem])
    }

    /// Create a growable `List<E>`
    pub fn new_list(&self, elem: TypeId, items: Vec<Value>) -> RtResult<Value> {
        self.new_list_with(elem, items, Growability::Growable)
    }

    /// Create a list with explicit mutability
    pub fn new_list_with(&self, elem: TypeId, items: Vec<Value>, growability: Growability) -> RtResult<Value> {
        let items = items
            .into_iter()
            .map(|item| self.check(item, elem))
            .collect::<RtResult<Vec<_>>>()?;
        Ok(Value::List(Arc::new(ListObject {
            ty: self.list_type(elem)?,
            elem,
            growability,
            items: RwLock::new(items),
        })))
    }

    /// Create a `Map<K, V>` from entries (later duplicates win)
    pub fn new_map(&self, key_ty: TypeId, value_ty: TypeId, entries: Vec<(Value, Value)>) -> RtResult<Value> {
        let mut table = OrderedTable::default();
        for (k, v) in entries {
            table.insert(self.check(k, key_ty)?, self.check(v, value_ty)?);
        }
        Ok(Value::Map(Arc::new(MapObject {
            ty: self.map_type(key_ty, value_ty)?,
            key_ty,
            value_ty,
            table: RwLock::new(table),
        })))
    }

    /// Create a `Set<E>` from elements
    pub fn new_set(&self, elem: TypeId, items: Vec<Value>) -> RtResult<Value> {
        let mut table = OrderedTable::default();
        for item in items {
            table.insert(self.check(item, elem)?, Value::Null);
        }
        Ok(Value::Set(Arc::new(SetObject {
            ty: self.set_type(elem)?,
            elem,
            table: RwLock::new(table),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_table_keeps_insertion_order() {
        let mut table = OrderedTable::default();
        table.insert(Value::string("b"), Value::int(1));
        table.insert(Value::string("a"), Value::int(2));
        table.insert(Value::string("b"), Value::int(3));

        let keys: Vec<String> = table.entries().iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(table.get(&Value::string("b")), Some(&Value::int(3)));
    }

    #[test]
    fn test_ordered_table_remove_reindexes() {
        let mut table = OrderedTable::default();
        for i in 0..4 {
            table.insert(Value::int(i), Value::int(i * 10));
        }
        assert_eq!(table.remove(&Value::int(1)), Some(Value::int(10)));
        assert_eq!(table.get(&Value::int(3)), Some(&Value::int(30)));
        assert_eq!(table.len(), 3);
        assert!(table.remove(&Value::int(1)).is_none());
    }

    #[test]
    fn test_list_growability() {
        let rt = Runtime::new();
        let Value::List(fixed) = rt
            .new_list_with(TypeId::INT, vec![Value::int(1)], Growability::FixedLength)
            .unwrap()
        else {
            panic!("expected list");
        };
        assert!(matches!(fixed.push(Value::int(2)), Err(RuntimeError::Unsupported(_))));
        fixed.set(0, Value::int(5)).unwrap();
        assert_eq!(fixed.get(0).unwrap(), Value::int(5));

        let Value::List(frozen) = rt
            .new_list_with(TypeId::INT, vec![Value::int(1)], Growability::Unmodifiable)
            .unwrap()
        else {
            panic!("expected list");
        };
        assert!(matches!(frozen.set(0, Value::int(2)), Err(RuntimeError::Unsupported(_))));
    }

    #[test]
    fn test_list_bounds() {
        let rt = Runtime::new();
        let Value::List(list) = rt.new_list(TypeId::INT, vec![Value::int(1), Value::int(2)]).unwrap() else {
            panic!("expected list");
        };
        assert!(matches!(list.get(2), Err(RuntimeError::Range(_))));
        list.insert(2, Value::int(3)).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(list.pop().unwrap(), Value::int(3));
        list.set_len(4).unwrap();
        assert_eq!(list.get(3).unwrap(), Value::Null);
    }

    #[test]
    fn test_set_len_rejects_oversized_length() {
        let rt = Runtime::new();
        let Value::List(list) = rt.new_list(TypeId::INT, vec![Value::int(1)]).unwrap() else {
            panic!("expected list");
        };
        assert!(matches!(list.set_len(i64::MAX), Err(RuntimeError::Range(_))));
        assert!(matches!(list.set_len(-1), Err(RuntimeError::Range(_))));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_new_list_checks_elements() {
        let rt = Runtime::new();
        let err = rt.new_list(TypeId::INT, vec![Value::string("x")]).unwrap_err();
        assert!(matches!(err, RuntimeError::Type { .. }));
    }
}
