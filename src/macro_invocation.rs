//! `MacroInvocation` — a name plus keyword arguments (spec §3, §4.6).
//!
//! Grounded on `examples/original_source/include/Rsd/Macro.h`'s
//! `execute(context, keywordArgValues)` contract.

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Clone)]
pub struct MacroInvocation {
    name: String,
    args: IndexMap<String, Value>,
}

impl MacroInvocation {
    pub fn new(name: impl Into<String>, args: IndexMap<String, Value>) -> Self {
        MacroInvocation { name: name.into(), args }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &IndexMap<String, Value> {
        &self.args
    }
}
