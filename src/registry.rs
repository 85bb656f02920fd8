//! The macro registry (spec §4.6, §9): a process-wide name→callable table,
//! factored behind a trait so tests can swap in an isolated registry instead
//! of mutating global state (spec §9's resolution of that open question).

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use indexmap::IndexMap;

use crate::error::RsdResult;
use crate::value::Value;

/// A macro's executable body: given the invocation's evaluation context and
/// its resolved keyword arguments, produce a replacement `Value`.
///
/// Grounded on `examples/original_source/include/Rsd/Macro.h`'s
/// `execute(context, keywordArgValues)` signature; `context` here is the
/// `Value`'s nearest `Block`/`Array` ancestor rather than a bespoke
/// `EvaluationContext` type, since that's what spec §3's `context` metadata
/// already models.
pub type MacroFn = dyn Fn(Option<Value>, &IndexMap<String, Value>) -> RsdResult<Value> + Send + Sync;

/// A table of macro implementations keyed by name.
///
/// The default implementation (`DefaultRegistry`) is process-wide and
/// shared through [`global_registry`]; call sites that want isolation
/// (tests, embedders running multiple independent documents) can implement
/// this trait themselves instead.
pub trait MacroRegistry {
    /// Runs `name`'s macro body if registered. `Ok(None)` means "no macro
    /// registered under this name"; the resolver treats that the same as
    /// the macro body itself failing — a fail-soft `(value, false)` rather
    /// than a hard error (spec §8 scenario 5; the original's
    /// `MacroInvocation::execute` throwing is caught by `Value::resolve`'s
    /// `try/catch` and falls through to the same unresolved result either
    /// way).
    fn invoke(
        &self,
        name: &str,
        context: Option<Value>,
        args: &IndexMap<String, Value>,
    ) -> RsdResult<Option<Value>>;

    fn is_registered(&self, name: &str) -> bool;
}

/// The process-wide registry: a `RwLock<HashMap<...>>` behind a `OnceLock`,
/// matching spec §5's "a single read-write lock suffices" sizing note —
/// macro registration is rare (usually once, at startup) and invocation is
/// read-mostly.
#[derive(Default)]
pub struct DefaultRegistry {
    functions: RwLock<HashMap<String, Box<MacroFn>>>,
}

fn global() -> &'static DefaultRegistry {
    static REGISTRY: OnceLock<DefaultRegistry> = OnceLock::new();
    REGISTRY.get_or_init(DefaultRegistry::default)
}

impl DefaultRegistry {
    /// Registers a macro under `name`, replacing any previous registration.
    pub fn register(&self, name: impl Into<String>, f: impl Fn(Option<Value>, &IndexMap<String, Value>) -> RsdResult<Value> + Send + Sync + 'static) {
        let mut functions = self.functions.write().expect("macro registry lock poisoned");
        functions.insert(name.into(), Box::new(f));
    }

    pub fn unregister(&self, name: &str) {
        let mut functions = self.functions.write().expect("macro registry lock poisoned");
        functions.remove(name);
    }
}

impl MacroRegistry for DefaultRegistry {
    fn invoke(
        &self,
        name: &str,
        context: Option<Value>,
        args: &IndexMap<String, Value>,
    ) -> RsdResult<Option<Value>> {
        let functions = self.functions.read().expect("macro registry lock poisoned");
        match functions.get(name) {
            Some(f) => f(context, args).map(Some),
            None => Ok(None),
        }
    }

    fn is_registered(&self, name: &str) -> bool {
        let functions = self.functions.read().expect("macro registry lock poisoned");
        functions.contains_key(name)
    }
}

/// The shared process-wide registry used when resolving without an explicit
/// registry argument.
pub fn global_registry() -> &'static DefaultRegistry {
    global()
}

/// Registers a macro implementation in the process-wide registry.
pub fn register(name: impl Into<String>, f: impl Fn(Option<Value>, &IndexMap<String, Value>) -> RsdResult<Value> + Send + Sync + 'static) {
    global().register(name, f);
}

pub fn unregister(name: &str) {
    global().unregister(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_registry_reports_unregistered_names() {
        let registry = DefaultRegistry::default();
        assert!(!registry.is_registered("vec3"));
        let result = registry.invoke("vec3", None, &IndexMap::new()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn local_registry_invokes_registered_macro() {
        let registry = DefaultRegistry::default();
        registry.register("double", |_ctx, args| {
            let n = args.get("n").and_then(|v| v.raw_integer()).unwrap_or(0);
            Ok(Value::integer(n * 2))
        });
        let mut args = IndexMap::new();
        args.insert("n".to_string(), Value::integer(21));
        let result = registry.invoke("double", None, &args).unwrap().unwrap();
        assert_eq!(result.raw_integer(), Some(42));
    }

    #[test]
    fn local_registry_can_unregister() {
        let registry = DefaultRegistry::default();
        registry.register("noop", |_ctx, _args| Ok(Value::null()));
        assert!(registry.is_registered("noop"));
        registry.unregister("noop");
        assert!(!registry.is_registered("noop"));
    }
}
