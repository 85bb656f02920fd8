//! `Value::resolve`, `Value::find`, and the typed `as_<T>` accessors
//! (spec §4.4, §4.5).
//!
//! Resolution is a pure function of `(value, evaluation context, macro
//! registry)` with no caching (spec §9: "lazy resolution, no memoization").
//! The one departure from the source's behavior is the explicit re-entrancy
//! guard threaded through every recursive call: spec §5 notes the reference
//! implementation relies on the host stack overflowing to bound a cyclic
//! inheritance/macro graph, and recommends a re-implementation add an
//! explicit guard instead. `visited` tracks the `Rc` addresses currently
//! being searched along the *current* identifier-lookup chain; hitting one
//! again means "already searching here" and the lookup fails soft rather
//! than recursing forever.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::{RsdError, RsdResult};
use crate::macro_invocation::MacroInvocation;
use crate::reference::{Reference, ReferencePart};
use crate::registry::{self, MacroRegistry};
use crate::value::{format_float, Value, ValueKind};

fn ptr_key(v: &Value) -> usize {
    Rc::as_ptr(&v.0) as usize
}

impl Value {
    /// Evaluates this value against the process-wide macro registry.
    pub fn resolve(&self) -> RsdResult<(Value, bool)> {
        self.resolve_with(registry::global_registry())
    }

    /// Evaluates this value against a caller-supplied registry (tests and
    /// embedders that want isolation from the process-wide one).
    pub fn resolve_with(&self, registry: &dyn MacroRegistry) -> RsdResult<(Value, bool)> {
        let mut visited = HashSet::new();
        self.resolve_inner(registry, &mut visited)
    }

    fn resolve_inner(&self, registry: &dyn MacroRegistry, visited: &mut HashSet<usize>) -> RsdResult<(Value, bool)> {
        enum Dispatch {
            Atom,
            Str(String),
            Ref(Reference),
            Mac(MacroInvocation),
        }
        let dispatch = {
            let data = self.0.borrow();
            match &data.kind {
                ValueKind::String(s) => Dispatch::Str(s.clone()),
                ValueKind::Reference(r) => Dispatch::Ref(r.clone()),
                ValueKind::Macro(m) => Dispatch::Mac(m.clone()),
                _ => Dispatch::Atom,
            }
        };
        match dispatch {
            Dispatch::Atom => Ok((self.clone(), true)),
            Dispatch::Str(s) => self.resolve_string(&s, registry, visited),
            Dispatch::Ref(r) => self.resolve_reference(&r, registry, visited),
            Dispatch::Mac(m) => self.resolve_macro(&m, registry, visited),
        }
    }

    fn evaluation_context(&self) -> Option<Value> {
        if self.is_block() || self.is_array() {
            Some(self.clone())
        } else {
            self.context()
        }
    }

    /// Scans for `${...}` expansions, splicing in each resolved reference's
    /// string form and re-emitting the original text verbatim for anything
    /// that fails to resolve or fails to parse (spec §4.5, §7: "swallowed").
    fn resolve_string(&self, s: &str, registry: &dyn MacroRegistry, visited: &mut HashSet<usize>) -> RsdResult<(Value, bool)> {
        let ctx = self.evaluation_context();
        let mut out = String::new();
        let mut any = false;
        let mut all_ok = true;

        let bytes = s.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'$' && bytes.get(i + 1) == Some(&b'{') {
                if let Some(end_rel) = s[i + 2..].find('}') {
                    any = true;
                    let end = i + 2 + end_rel;
                    let inner = &s[i + 2..end];
                    match Self::expand_reference_expr(inner, ctx.as_ref(), registry, visited) {
                        Some(text) => out.push_str(&text),
                        None => {
                            all_ok = false;
                            out.push_str(&s[i..=end]);
                        }
                    }
                    i = end + 1;
                    continue;
                }
            }
            let ch = s[i..].chars().next().expect("i < bytes.len() implies a scalar remains");
            out.push(ch);
            i += ch.len_utf8();
        }

        if !any {
            Ok((self.clone(), true))
        } else {
            Ok((Value::string(out), all_ok))
        }
    }

    fn expand_reference_expr(
        inner: &str,
        ctx: Option<&Value>,
        registry: &dyn MacroRegistry,
        visited: &mut HashSet<usize>,
    ) -> Option<String> {
        let ctx = ctx?;
        let reference = crate::parser::parse_reference(inner, 0, "<string-expansion>").ok()?;
        let transient = Value::reference(reference);
        transient.attach_context(ctx);
        let (resolved, fully_resolved) = transient.resolve_inner(registry, visited).ok()?;
        if !fully_resolved {
            return None;
        }
        resolved.stringify().ok()
    }

    /// Looks the reference up from this value's own evaluation context,
    /// walking outward through ancestor contexts on a miss, and finally
    /// falling back to the document environment at the true root (spec
    /// §4.4's "a miss at a document root falls back to the document's
    /// environment", applied here since `${...}` expansion and bare
    /// reference resolution share this same algorithm).
    fn resolve_reference(&self, r: &Reference, registry: &dyn MacroRegistry, visited: &mut HashSet<usize>) -> RsdResult<(Value, bool)> {
        resolve_reference_from(self.evaluation_context(), r, registry, visited).unwrap_or_else(|| Ok((self.clone(), false)))
    }

    fn resolve_macro(&self, m: &MacroInvocation, registry: &dyn MacroRegistry, visited: &mut HashSet<usize>) -> RsdResult<(Value, bool)> {
        let ctx = self.evaluation_context();
        match registry.invoke(m.name(), ctx, m.args()) {
            Ok(Some(result)) => result.resolve_inner(registry, visited),
            Ok(None) => Ok((self.clone(), false)),
            Err(_) => Ok((self.clone(), false)),
        }
    }

    /// String conversion semantics shared by direct calls and `${...}`
    /// splicing (spec §4.5). Booleans, integers, floats, and strings
    /// convert; containers do not.
    pub fn stringify(&self) -> RsdResult<String> {
        let data = self.0.borrow();
        match &data.kind {
            ValueKind::Boolean(b) => Ok(b.to_string()),
            ValueKind::Integer(i) => Ok(i.to_string()),
            ValueKind::Float(f) => Ok(format_float(*f)),
            ValueKind::String(s) => Ok(s.clone()),
            other => Err(RsdError::conversion(format!("cannot convert {} to a string", other.name()))),
        }
    }

    pub fn as_boolean(&self) -> RsdResult<bool> {
        let (resolved, _) = self.resolve()?;
        resolved
            .raw_boolean()
            .ok_or_else(|| RsdError::conversion(format!("expected Boolean, found {}", resolved.kind_name())))
    }

    /// Requires an exact `Integer` (spec §4.5: "asInteger() requires exact Integer").
    pub fn as_integer(&self) -> RsdResult<i64> {
        let (resolved, _) = self.resolve()?;
        resolved
            .raw_integer()
            .ok_or_else(|| RsdError::conversion(format!("expected Integer, found {}", resolved.kind_name())))
    }

    /// Widens `Integer` to `f64` (spec §4.5: "asFloat() accepts Integer (widened) and Float").
    pub fn as_float(&self) -> RsdResult<f64> {
        let (resolved, _) = self.resolve()?;
        if let Some(i) = resolved.raw_integer() {
            return Ok(i as f64);
        }
        resolved
            .raw_float()
            .ok_or_else(|| RsdError::conversion(format!("expected Float, found {}", resolved.kind_name())))
    }

    pub fn as_string(&self) -> RsdResult<String> {
        let (resolved, _) = self.resolve()?;
        resolved.stringify()
    }

    /// Starts from `self` after resolving it (so `find` may be called on a
    /// reference-typed value, which dereferences first), and requires the
    /// result to be a `Block` or `Array` (spec §4.4). A miss falls back to
    /// the document's environment block, if any, at the true document root.
    pub fn find(&self, reference: &Reference) -> Option<Value> {
        self.find_with(reference, registry::global_registry())
    }

    pub fn find_with(&self, reference: &Reference, registry: &dyn MacroRegistry) -> Option<Value> {
        let mut visited = HashSet::new();
        let (resolved, _) = self.resolve_inner(registry, &mut visited).ok()?;
        if !(resolved.is_block() || resolved.is_array()) {
            return None;
        }
        if let Some(hit) = find_from_container(&resolved, reference.parts(), registry, &mut visited) {
            return Some(hit);
        }
        // A miss at the document root falls back to the document's
        // environment (spec §4.4), the same fallback `resolve_reference_from`
        // already applies when resolving a bare `Reference`-kind value.
        let env = root_of(&resolved).environment()?;
        find_from_container(&env, reference.parts(), registry, &mut visited)
    }

    /// `find`, parsing `text` with the reference grammar first (spec §4.4:
    /// "`find(parse_reference(s))` equals `find(s)`").
    pub fn find_str(&self, text: &str) -> RsdResult<Option<Value>> {
        let reference = crate::parser::parse_reference(text, 0, "<reference>")?;
        Ok(self.find(&reference))
    }
}

/// Walks outward from `start` looking for `r`, falling back to the document
/// environment at the true root on a total miss (spec §4.4/§4.5). Returns
/// `None` only when nothing was found anywhere — the caller supplies the
/// "stay as-is, unresolved" fallback, since a bare reference and an
/// inherited-block reference disagree on what "as-is" means.
fn resolve_reference_from(
    start: Option<Value>,
    r: &Reference,
    registry: &dyn MacroRegistry,
    visited: &mut HashSet<usize>,
) -> Option<RsdResult<(Value, bool)>> {
    let mut ctx = start.clone();
    while let Some(c) = ctx {
        if let Some(hit) = find_from_container(&c, r.parts(), registry, visited) {
            return Some(hit.resolve_inner(registry, visited));
        }
        ctx = c.context();
    }

    let root = root_of(&start?);
    let env = root.environment()?;
    let hit = find_from_container(&env, r.parts(), registry, visited)?;
    Some(hit.resolve_inner(registry, visited))
}

fn root_of(v: &Value) -> Value {
    let mut current = v.clone();
    while let Some(parent) = current.context() {
        current = parent;
    }
    current
}

fn find_from_container(
    container: &Value,
    parts: &[ReferencePart],
    registry: &dyn MacroRegistry,
    visited: &mut HashSet<usize>,
) -> Option<Value> {
    let mut current = container.clone();
    for part in parts {
        let next = match part {
            ReferencePart::Identifier(name) => lookup_identifier(&current, name, registry, visited),
            ReferencePart::Subscript(expr) => {
                let (resolved_expr, _) = expr.resolve_inner(registry, visited).ok()?;
                lookup_subscript(&current, &resolved_expr)
            }
        }?;
        let (resolved_next, _) = next.resolve_inner(registry, visited).ok()?;
        current = resolved_next;
    }
    Some(current)
}

/// Identifier lookup, including the include-child and inherited-block
/// fallbacks (spec §4.4). `visited` both guards against inheritance cycles
/// and prevents re-entering the same block along one lookup chain.
fn lookup_identifier(container: &Value, name: &str, registry: &dyn MacroRegistry, visited: &mut HashSet<usize>) -> Option<Value> {
    if !container.is_block() {
        return None;
    }
    let key = ptr_key(container);
    if !visited.insert(key) {
        return None;
    }
    let result = (|| {
        if let Some(v) = container.get_named(name) {
            return Some(v);
        }
        if let Ok(entries) = container.block_entries() {
            for (_, child) in entries {
                if child.is_include() {
                    if let Some(found) = lookup_identifier(&child, name, registry, visited) {
                        return Some(found);
                    }
                }
            }
        }
        if let Some(inherited_ref) = container.inherits() {
            if let Some(reference) = inherited_ref.as_reference() {
                let start = container.context();
                if let Some(Ok((resolved, _))) = resolve_reference_from(start, &reference, registry, visited) {
                    if resolved.is_block() {
                        return lookup_identifier(&resolved, name, registry, visited);
                    }
                }
            }
        }
        None
    })();
    visited.remove(&key);
    result
}

/// Subscript lookup: an already-resolved `Integer` indexes by position
/// (blocks count `include` placeholders, per spec §9); a `String` looks up
/// by name in a `Block`. Anything else misses.
fn lookup_subscript(container: &Value, index_value: &Value) -> Option<Value> {
    if let Some(i) = index_value.raw_integer() {
        if i < 0 {
            return None;
        }
        let i = i as usize;
        if container.is_array() {
            return container.array_get(i);
        }
        if container.is_block() {
            return container.get_at(i);
        }
        return None;
    }
    if let Some(name) = index_value.raw_string() {
        if container.is_block() {
            return container.get_named(&name);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    #[test]
    fn string_substitution_splices_resolved_value() {
        let root = parse_document("x = 3; y = \"${x}\";", 0, "test.rsd").unwrap();
        let y = root.get_named("y").unwrap();
        let (resolved, ok) = y.resolve().unwrap();
        assert!(ok);
        assert_eq!(resolved.raw_string().as_deref(), Some("3"));
    }

    #[test]
    fn array_subscript_substitution() {
        let root = parse_document("a = [1, 2, 3]; b = \"${a[1]}\";", 0, "test.rsd").unwrap();
        let b = root.get_named("b").unwrap();
        let (resolved, _) = b.resolve().unwrap();
        assert_eq!(resolved.raw_string().as_deref(), Some("2"));
    }

    #[test]
    fn block_inheritance_follows_parent_lookup() {
        let root = parse_document(r#"p = { n = "hi"; }; q : p { extra = 1; };"#, 0, "test.rsd").unwrap();
        let q = root.get_named("q").unwrap();
        let found = q.find_str("n").unwrap().unwrap();
        assert_eq!(found.raw_string().as_deref(), Some("hi"));
        let extra = q.find_str("extra").unwrap().unwrap();
        assert_eq!(extra.raw_integer(), Some(1));
    }

    #[test]
    fn find_falls_back_to_document_environment_at_root() {
        let root = parse_document("x = 1;", 0, "test.rsd").unwrap();
        let env = Value::block();
        env.set_named("HOME", Value::string("/home/rsd")).unwrap();
        root.set_environment(Some(env)).unwrap();

        assert!(root.find_str("x").unwrap().is_some());
        let home = root.find_str("HOME").unwrap().unwrap();
        assert_eq!(home.raw_string().as_deref(), Some("/home/rsd"));
        assert!(root.find_str("NOT_IN_EITHER").unwrap().is_none());
    }

    #[test]
    fn missing_reference_in_string_is_re_emitted_verbatim() {
        let root = parse_document(r#"y = "${missing}";"#, 0, "test.rsd").unwrap();
        let y = root.get_named("y").unwrap();
        let (resolved, ok) = y.resolve().unwrap();
        assert!(!ok);
        assert_eq!(resolved.raw_string().as_deref(), Some("${missing}"));
    }

    #[test]
    fn unregistered_macro_resolves_fail_soft() {
        let root = parse_document(r#"p = greeting(who: "world");"#, 0, "test.rsd").unwrap();
        let p = root.get_named("p").unwrap();
        let (resolved, ok) = p.resolve().unwrap();
        assert!(!ok);
        assert!(resolved.is_macro());
    }

    #[test]
    fn registered_macro_resolves_via_local_registry() {
        let registry = crate::registry::DefaultRegistry::default();
        registry.register("greeting", |_ctx, args| {
            let who = args.get("who").and_then(|v| v.raw_string()).unwrap_or_default();
            Ok(Value::string(format!("hello, {who}")))
        });
        let root = parse_document(r#"p = greeting(who: "world");"#, 0, "test.rsd").unwrap();
        let p = root.get_named("p").unwrap();
        let (resolved, ok) = p.resolve_with(&registry).unwrap();
        assert!(ok);
        assert_eq!(resolved.raw_string().as_deref(), Some("hello, world"));
    }

    #[test]
    fn macro_execution_failure_is_swallowed() {
        let registry = crate::registry::DefaultRegistry::default();
        registry.register("boom", |_ctx, _args| Err(RsdError::value("deliberate failure")));
        let root = parse_document("p = boom();", 0, "test.rsd").unwrap();
        let p = root.get_named("p").unwrap();
        let (resolved, ok) = p.resolve_with(&registry).unwrap();
        assert!(!ok);
        assert!(resolved.is_macro());
    }

    #[test]
    fn integer_widens_to_float() {
        let v = Value::integer(4);
        assert_eq!(v.as_float().unwrap(), 4.0);
    }

    #[test]
    fn float_stringifies_with_trailing_point_zero_when_exact() {
        let v = Value::float(5.0);
        assert_eq!(v.as_string().unwrap(), "5.0");
    }

    #[test]
    fn array_cannot_be_stringified() {
        let v = Value::array(vec![Value::integer(1)]);
        let err = v.as_string().unwrap_err();
        assert!(matches!(err, RsdError::Conversion { .. }));
    }

    #[test]
    fn cyclic_inheritance_does_not_overflow_the_stack() {
        let a = Value::block();
        let b = Value::block();
        a.set_inherits(Some(Value::reference(crate::reference::Reference::new(vec![
            crate::reference::ReferencePart::Identifier("b".to_string()),
        ]))))
        .unwrap();
        b.set_inherits(Some(Value::reference(crate::reference::Reference::new(vec![
            crate::reference::ReferencePart::Identifier("a".to_string()),
        ]))))
        .unwrap();
        let root = Value::block();
        root.set_named("a", a).unwrap();
        root.set_named("b", b).unwrap();
        let a = root.get_named("a").unwrap();
        assert!(a.find_str("nonexistent").unwrap().is_none());
    }
}
