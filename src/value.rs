//! The typed expression graph (spec §3): a tagged `Value` variant, plus the
//! `Block`/`Array` container operations spec §3's invariants describe.
//!
//! Ownership follows spec §9's "owned shared-handles with the parent held as
//! a weak handle" option: `Value` is a cheap-to-clone handle around
//! `Rc<RefCell<ValueData>>`, and every child's `context` back-pointer is a
//! `Weak` reference to its container, so container↔child cycles never keep
//! memory alive. This is the Rust analogue of the ownership discipline in
//! the teacher-family `logicaffeine-data` crate ("WASM-safe data
//! structures... NO IO" — owned values, weak back-references, no cycles).

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::thread_local;

use indexmap::IndexMap;

use crate::error::{RsdError, RsdResult};
use crate::macro_invocation::MacroInvocation;
use crate::reference::Reference;
use crate::span::Position;
use crate::typename::TypeName;

#[derive(Clone)]
pub enum ValueKind {
    Invalid,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Reference(Reference),
    Macro(MacroInvocation),
    Array(Vec<Value>),
    Block(BlockData),
}

impl ValueKind {
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Invalid => "Invalid",
            ValueKind::Boolean(_) => "Boolean",
            ValueKind::Integer(_) => "Integer",
            ValueKind::Float(_) => "Float",
            ValueKind::String(_) => "String",
            ValueKind::Reference(_) => "Reference",
            ValueKind::Macro(_) => "Macro",
            ValueKind::Array(_) => "Array",
            ValueKind::Block(_) => "Block",
        }
    }
}

/// A `Block`'s entries plus its optional inherited-block reference (spec §3,
/// item 4 of the per-`Value` metadata list).
#[derive(Clone, Default)]
pub struct BlockData {
    entries: IndexMap<String, Value>,
    inherits: Option<Value>,
    /// Loader-only: the document's environment fallback block (spec §4.3).
    /// Not one of the four per-`Value` metadata items in spec §3 — only a
    /// document's root `Block` ever has this set, by
    /// [`crate::loader::Document`].
    environment: Option<Value>,
}

pub(crate) struct ValueData {
    pub(crate) kind: ValueKind,
    pub(crate) type_name: TypeName,
    pub(crate) provenance: Option<Position>,
    pub(crate) context: Weak<RefCell<ValueData>>,
}

/// A handle to a node in the expression graph. Cloning a `Value` clones the
/// handle (an `Rc` bump), not the underlying data — exactly one logical
/// value is shared by every clone, matching spec §5's reference-counting
/// model.
#[derive(Clone)]
pub struct Value(pub(crate) Rc<RefCell<ValueData>>);

thread_local! {
    static NULL: Value = Value::new_raw(ValueKind::Invalid);
}

impl Value {
    fn new_raw(kind: ValueKind) -> Self {
        Value(Rc::new(RefCell::new(ValueData {
            kind,
            type_name: TypeName::empty(),
            provenance: None,
            context: Weak::new(),
        })))
    }

    /// The canonical shared null value (spec §3: "there is exactly one
    /// canonical shared null").
    pub fn null() -> Self {
        NULL.with(|v| v.clone())
    }

    fn is_null_singleton(&self) -> bool {
        NULL.with(|v| Rc::ptr_eq(&self.0, &v.0))
    }

    pub fn boolean(value: bool) -> Self {
        Value::new_raw(ValueKind::Boolean(value))
    }

    pub fn integer(value: i64) -> Self {
        Value::new_raw(ValueKind::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Value::new_raw(ValueKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::new_raw(ValueKind::String(value.into()))
    }

    pub fn reference(reference: Reference) -> Self {
        Value::new_raw(ValueKind::Reference(reference))
    }

    pub fn macro_invocation(invocation: MacroInvocation) -> Self {
        Value::new_raw(ValueKind::Macro(invocation))
    }

    pub fn array(items: Vec<Value>) -> Self {
        let v = Value::new_raw(ValueKind::Array(Vec::new()));
        {
            let mut data = v.0.borrow_mut();
            if let ValueKind::Array(vec) = &mut data.kind {
                *vec = items;
            }
        }
        v.reparent_children();
        v
    }

    pub fn block() -> Self {
        Value::new_raw(ValueKind::Block(BlockData::default()))
    }

    fn reparent_children(&self) {
        let data = self.0.borrow();
        match &data.kind {
            ValueKind::Array(items) => {
                for item in items {
                    item.attach_context(self);
                }
            }
            ValueKind::Block(block) => {
                for (_, item) in block.entries.iter() {
                    item.attach_context(self);
                }
            }
            _ => {}
        }
    }

    /// Points this value's context back-pointer at `parent`. Used both when
    /// a value is inserted into a container and (by the resolver) to root a
    /// transient reference at an evaluation context it was never stored in.
    pub(crate) fn attach_context(&self, parent: &Value) {
        self.0.borrow_mut().context = Rc::downgrade(&parent.0);
    }

    /// The nearest `Block`/`Array` ancestor (spec §3, metadata item 3).
    pub fn context(&self) -> Option<Value> {
        self.0.borrow().context.upgrade().map(Value)
    }

    pub fn kind_name(&self) -> &'static str {
        // SAFETY-free: the borrow ends before the &'static str escapes since
        // `name()` returns a value, not a borrow of the data.
        self.0.borrow().kind.name()
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Invalid)
    }
    pub fn is_boolean(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Boolean(_))
    }
    pub fn is_integer(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Integer(_))
    }
    pub fn is_float(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Float(_))
    }
    pub fn is_string(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::String(_))
    }
    pub fn is_reference(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Reference(_))
    }
    pub fn is_macro(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Macro(_))
    }
    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Array(_))
    }
    pub fn is_block(&self) -> bool {
        matches!(self.0.borrow().kind, ValueKind::Block(_))
    }

    pub fn is_include(&self) -> bool {
        self.is_block() && self.type_name().is_include()
    }

    pub fn type_name(&self) -> TypeName {
        self.0.borrow().type_name.clone()
    }

    pub fn set_type_name(&self, type_name: TypeName) {
        assert!(!self.is_null_singleton(), "the shared null value must not be mutated");
        self.0.borrow_mut().type_name = type_name;
    }

    pub fn provenance(&self) -> Option<Position> {
        self.0.borrow().provenance
    }

    pub fn set_provenance(&self, position: Position) {
        assert!(!self.is_null_singleton(), "the shared null value must not be mutated");
        self.0.borrow_mut().provenance = Some(position);
    }

    /// Reads the raw boolean payload without resolving. Returns `None` if
    /// this value is not already a `Boolean` leaf.
    pub fn raw_boolean(&self) -> Option<bool> {
        match self.0.borrow().kind {
            ValueKind::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn raw_integer(&self) -> Option<i64> {
        match self.0.borrow().kind {
            ValueKind::Integer(i) => Some(i),
            _ => None,
        }
    }

    pub fn raw_float(&self) -> Option<f64> {
        match self.0.borrow().kind {
            ValueKind::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn raw_string(&self) -> Option<String> {
        match &self.0.borrow().kind {
            ValueKind::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match &self.0.borrow().kind {
            ValueKind::Reference(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn as_macro_invocation(&self) -> Option<MacroInvocation> {
        match &self.0.borrow().kind {
            ValueKind::Macro(m) => Some(m.clone()),
            _ => None,
        }
    }

    // ---- Array operations ----

    pub fn array_len(&self) -> RsdResult<usize> {
        match &self.0.borrow().kind {
            ValueKind::Array(items) => Ok(items.len()),
            other => Err(RsdError::value(format!("expected Array, found {}", other.kind.name()))),
        }
    }

    pub fn array_get(&self, index: usize) -> Option<Value> {
        match &self.0.borrow().kind {
            ValueKind::Array(items) => items.get(index).cloned(),
            _ => None,
        }
    }

    pub fn array_iter(&self) -> RsdResult<Vec<Value>> {
        match &self.0.borrow().kind {
            ValueKind::Array(items) => Ok(items.clone()),
            other => Err(RsdError::value(format!("expected Array, found {}", other.kind.name()))),
        }
    }

    pub fn push(&self, value: Value) -> RsdResult<()> {
        value.attach_context(self);
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Array(items) => {
                items.push(value);
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Array, found {}", other.name()))),
        }
    }

    /// Inserts before position `index`. Valid for `0 <= index <= len`
    /// (spec §9's resolution of the source's ambiguous `insertValue`).
    pub fn insert_at(&self, index: usize, value: Value) -> RsdResult<()> {
        value.attach_context(self);
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Array(items) => {
                if index > items.len() {
                    return Err(RsdError::value(format!(
                        "insert index {index} out of bounds (len {})",
                        items.len()
                    )));
                }
                items.insert(index, value);
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Array, found {}", other.name()))),
        }
    }

    pub fn remove_at(&self, index: usize) -> RsdResult<Value> {
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Array(items) => {
                if index >= items.len() {
                    return Err(RsdError::value(format!(
                        "remove index {index} out of bounds (len {})",
                        items.len()
                    )));
                }
                Ok(items.remove(index))
            }
            other => Err(RsdError::value(format!("expected Array, found {}", other.name()))),
        }
    }

    // ---- Block operations ----

    pub fn block_len(&self) -> RsdResult<usize> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => Ok(b.entries.len()),
            other => Err(RsdError::value(format!("expected Block, found {}", other.kind.name()))),
        }
    }

    pub fn get_named(&self, name: &str) -> Option<Value> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => b.entries.get(name).cloned(),
            _ => None,
        }
    }

    pub fn get_at(&self, index: usize) -> Option<Value> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => b.entries.get_index(index).map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn names(&self) -> RsdResult<Vec<String>> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => Ok(b.entries.keys().cloned().collect()),
            other => Err(RsdError::value(format!("expected Block, found {}", other.kind.name()))),
        }
    }

    pub fn block_entries(&self) -> RsdResult<Vec<(String, Value)>> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => Ok(b.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            other => Err(RsdError::value(format!("expected Block, found {}", other.kind.name()))),
        }
    }

    pub fn inherits(&self) -> Option<Value> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => b.inherits.clone(),
            _ => None,
        }
    }

    /// Sets the inherited-block reference. Lookup of this reference starts
    /// from `self`'s own context (its surrounding block/array), not from
    /// inside `self` — see [`crate::resolver`] for how that's threaded
    /// through without needing this reference to carry its own context.
    pub fn set_inherits(&self, inherits: Option<Value>) -> RsdResult<()> {
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Block(b) => {
                b.inherits = inherits;
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Block, found {}", other.name()))),
        }
    }

    /// The document-level environment fallback block, if this `Block` is a
    /// document root that one was attached to (spec §4.3).
    pub fn environment(&self) -> Option<Value> {
        match &self.0.borrow().kind {
            ValueKind::Block(b) => b.environment.clone(),
            _ => None,
        }
    }

    pub fn set_environment(&self, environment: Option<Value>) -> RsdResult<()> {
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Block(b) => {
                b.environment = environment;
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Block, found {}", other.name()))),
        }
    }

    /// Inserts or overwrites `name` (spec's `setValue`). Preserves the
    /// existing position on overwrite, appends on insert.
    pub fn set_named(&self, name: impl Into<String>, value: Value) -> RsdResult<()> {
        value.attach_context(self);
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Block(b) => {
                b.entries.insert(name.into(), value);
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Block, found {}", other.name()))),
        }
    }

    /// Inserts `name`, failing if it already exists (spec's `appendValue`,
    /// preserving the "Block names are unique" invariant).
    pub fn append_named(&self, name: impl Into<String>, value: Value) -> RsdResult<()> {
        let name = name.into();
        value.attach_context(self);
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Block(b) => {
                if b.entries.contains_key(&name) {
                    return Err(RsdError::value(format!("duplicate block member name '{name}'")));
                }
                b.entries.insert(name, value);
                Ok(())
            }
            other => Err(RsdError::value(format!("expected Block, found {}", other.name()))),
        }
    }

    pub fn remove_named(&self, name: &str) -> RsdResult<Value> {
        let mut data = self.0.borrow_mut();
        match &mut data.kind {
            ValueKind::Block(b) => b
                .entries
                .shift_remove(name)
                .ok_or_else(|| RsdError::value(format!("no such block member '{name}'"))),
            other => Err(RsdError::value(format!("expected Block, found {}", other.name()))),
        }
    }

    /// Structural equality: same kind, same (non-structural-leaf) payload,
    /// recursively equal children. Ignores provenance, context, and (for
    /// `Macro`) keyword-argument order, matching spec §8's round-trip
    /// property.
    pub fn structurally_eq(&self, other: &Value) -> bool {
        if Rc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let a = self.0.borrow();
        let b = other.0.borrow();
        if a.type_name != b.type_name {
            return false;
        }
        match (&a.kind, &b.kind) {
            (ValueKind::Invalid, ValueKind::Invalid) => true,
            (ValueKind::Boolean(x), ValueKind::Boolean(y)) => x == y,
            (ValueKind::Integer(x), ValueKind::Integer(y)) => x == y,
            (ValueKind::Float(x), ValueKind::Float(y)) => x == y,
            (ValueKind::String(x), ValueKind::String(y)) => x == y,
            (ValueKind::Reference(x), ValueKind::Reference(y)) => x.to_string() == y.to_string(),
            (ValueKind::Macro(x), ValueKind::Macro(y)) => {
                if x.name() != y.name() || x.args().len() != y.args().len() {
                    return false;
                }
                x.args().iter().all(|(k, v)| y.args().get(k).is_some_and(|w| v.structurally_eq(w)))
            }
            (ValueKind::Array(x), ValueKind::Array(y)) => {
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(p, q)| p.structurally_eq(q))
            }
            (ValueKind::Block(x), ValueKind::Block(y)) => {
                let inherits_eq = match (&x.inherits, &y.inherits) {
                    (None, None) => true,
                    (Some(p), Some(q)) => p.structurally_eq(q),
                    _ => false,
                };
                inherits_eq
                    && x.entries.len() == y.entries.len()
                    && x.entries.iter().zip(y.entries.iter()).all(|((kn, vn), (ko, vo))| {
                        kn == ko && vn.structurally_eq(vo)
                    })
            }
            _ => false,
        }
    }
}

/// Renders a float the way a reader expects a decimal literal to round-trip:
/// whole values keep a trailing `.0` rather than looking like an integer.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}, @{})", self.kind_name(), self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_children_get_context_back_pointer() {
        let array = Value::array(vec![Value::integer(1), Value::integer(2)]);
        let first = array.array_get(0).unwrap();
        let ctx = first.context().unwrap();
        assert!(Rc::ptr_eq(&ctx.0, &array.0));
    }

    #[test]
    fn pushing_sets_context() {
        let block = Value::block();
        block.set_named("x", Value::integer(5)).unwrap();
        let x = block.get_named("x").unwrap();
        assert!(Rc::ptr_eq(&x.context().unwrap().0, &block.0));
    }

    #[test]
    fn append_named_rejects_duplicate_names() {
        let block = Value::block();
        block.append_named("x", Value::integer(1)).unwrap();
        let err = block.append_named("x", Value::integer(2)).unwrap_err();
        assert!(matches!(err, RsdError::Value { .. }));
    }

    #[test]
    fn remove_named_updates_block() {
        let block = Value::block();
        block.set_named("x", Value::integer(1)).unwrap();
        let removed = block.remove_named("x").unwrap();
        assert_eq!(removed.raw_integer(), Some(1));
        assert_eq!(block.block_len().unwrap(), 0);
    }

    #[test]
    fn insert_at_bounds() {
        let array = Value::array(vec![Value::integer(1), Value::integer(3)]);
        array.insert_at(1, Value::integer(2)).unwrap();
        assert_eq!(array.array_get(0).unwrap().raw_integer(), Some(1));
        assert_eq!(array.array_get(1).unwrap().raw_integer(), Some(2));
        assert_eq!(array.array_get(2).unwrap().raw_integer(), Some(3));
        assert!(array.insert_at(10, Value::integer(4)).is_err());
    }

    #[test]
    fn null_is_a_shared_singleton() {
        let a = Value::null();
        let b = Value::null();
        assert!(Rc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    #[should_panic(expected = "must not be mutated")]
    fn mutating_null_panics() {
        Value::null().set_type_name(TypeName::from_segments(["x"]));
    }

    #[test]
    fn structural_equality_ignores_macro_arg_order() {
        let mut a_args = IndexMap::new();
        a_args.insert("a".to_string(), Value::integer(1));
        a_args.insert("b".to_string(), Value::integer(2));
        let mut b_args = IndexMap::new();
        b_args.insert("b".to_string(), Value::integer(2));
        b_args.insert("a".to_string(), Value::integer(1));

        let m1 = Value::macro_invocation(MacroInvocation::new("f", a_args));
        let m2 = Value::macro_invocation(MacroInvocation::new("f", b_args));
        assert!(m1.structurally_eq(&m2));
    }

    #[test]
    fn structural_equality_rejects_different_block_entries() {
        let b1 = Value::block();
        b1.set_named("x", Value::integer(1)).unwrap();
        let b2 = Value::block();
        b2.set_named("x", Value::integer(2)).unwrap();
        assert!(!b1.structurally_eq(&b2));
    }
}
