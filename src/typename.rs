//! `TypeName` — a dotted namespace path attached as an annotation to any
//! `Value` (spec §3.1, §4.1 `type`/`typeSequence` production).
//!
//! The core never interprets a `TypeName` beyond the reserved `include`
//! marker (spec §3.1); everything else is informational, consumed by
//! external validators the spec deliberately keeps out of scope (spec §1).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default, Hash)]
pub struct TypeName {
    segments: Vec<String>,
}

impl TypeName {
    pub fn empty() -> Self {
        TypeName { segments: Vec::new() }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeName { segments: segments.into_iter().map(Into::into).collect() }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// A type annotation whose single segment is `include` marks an include
    /// node (spec §3.1).
    pub fn is_include(&self) -> bool {
        self.segments.len() == 1 && self.segments[0] == "include"
    }

    pub fn include() -> Self {
        TypeName { segments: vec!["include".to_string()] }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_dotted_path() {
        let t = TypeName::from_segments(["geo", "Point"]);
        assert_eq!(t.to_string(), "geo.Point");
    }

    #[test]
    fn recognizes_include_marker() {
        assert!(TypeName::include().is_include());
        assert!(!TypeName::from_segments(["include", "extra"]).is_include());
        assert!(!TypeName::empty().is_include());
    }
}
