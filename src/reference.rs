//! `Reference` — a parsed path expression (spec §3 "Reference").

use std::fmt;

use crate::value::Value;

/// One segment of a reference path: a bare name, or a subscript expression
/// that resolves to an integer index or a string name (spec §3).
#[derive(Debug, Clone)]
pub enum ReferencePart {
    Identifier(String),
    Subscript(Value),
}

/// A reference is a sequence of parts. `a.b[3].c` parses to
/// `[Identifier(a), Identifier(b), Subscript(3), Identifier(c)]` — an
/// identifier and a trailing run of subscripts form one "complex identifier"
/// (spec §4.2 grammar), but once parsed the distinction doesn't matter for
/// lookup, which walks parts one at a time (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct Reference {
    parts: Vec<ReferencePart>,
}

impl Reference {
    pub fn new(parts: Vec<ReferencePart>) -> Self {
        Reference { parts }
    }

    pub fn parts(&self) -> &[ReferencePart] {
        &self.parts
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            match part {
                ReferencePart::Identifier(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                ReferencePart::Subscript(v) => {
                    write!(f, "[{}]", v.to_rsd_string(false, true, 0))?;
                }
            }
        }
        Ok(())
    }
}
