//! The document loader (spec §4.3): parses a file or buffer, follows
//! `include` directives relative to the including document's directory,
//! accumulates a file-index map for source positions, and optionally
//! attaches a process-environment fallback block.
//!
//! Grounded on `examples/original_source/src/File.cpp`'s
//! `File::File(filename, openIncludes)` shape (read, parse, walk includes,
//! recurse with the including file's directory as the new base) — with
//! `Path::join` in place of the original's forward-slash-only
//! concatenation, per spec §9's resolution of that open question.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{RsdError, RsdResult};
use crate::parser;
use crate::value::Value;

/// A loaded document: its (possibly include-expanded) root `Block`, plus
/// the file-index map source positions in that tree refer to.
pub struct Document {
    root: Value,
    files: Vec<String>,
}

impl Document {
    /// Parses `path` and, if `follow_includes` is set, recursively inlines
    /// every `include` directive reachable from it.
    pub fn load(path: impl AsRef<Path>, follow_includes: bool) -> RsdResult<Document> {
        let mut files = Vec::new();
        let root = load_path(path.as_ref(), follow_includes, &mut files)?;
        Ok(Document { root, files })
    }

    /// As [`Document::load`], but from an in-memory buffer with an explicit
    /// logical name and base path (the directory relative includes resolve
    /// against).
    pub fn load_buffer(
        text: &str,
        name: impl Into<String>,
        base_path: impl AsRef<Path>,
        follow_includes: bool,
    ) -> RsdResult<Document> {
        let mut files = Vec::new();
        let name = name.into();
        let root = load_text(text, &name, base_path.as_ref(), follow_includes, &mut files)?;
        Ok(Document { root, files })
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Populates the document's environment fallback block from the
    /// process's environment variables as name→string pairs (spec §4.3,
    /// §6). The core never does this implicitly — callers opt in.
    pub fn with_process_environment(self) -> Document {
        let env = Value::block();
        let mut count = 0;
        for (key, value) in std::env::vars() {
            if env.set_named(key, Value::string(value)).is_ok() {
                count += 1;
            }
        }
        log::debug!("populated environment block with {count} process variables");
        let _ = self.root.set_environment(Some(env));
        self
    }
}

fn io_error(path: &Path, op: &'static str, err: std::io::Error) -> RsdError {
    RsdError::Io { path: path.display().to_string(), op, message: err.to_string() }
}

fn load_path(path: &Path, follow_includes: bool, files: &mut Vec<String>) -> RsdResult<Value> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, "opened", e))?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let name = path.display().to_string();
    load_text(&text, &name, &base, follow_includes, files)
}

fn load_text(text: &str, name: &str, base: &Path, follow_includes: bool, files: &mut Vec<String>) -> RsdResult<Value> {
    let file_index = files.len();
    files.push(name.to_string());
    let root = parser::parse_document(text, file_index, name)?;
    log::trace!("parsed document {name} as file index {file_index}");
    if follow_includes {
        walk_and_resolve(&root, base, files)?;
    }
    Ok(root)
}

/// Depth-first walk over every `Block`/`Array`, replacing each `include`
/// placeholder in place with the parsed (and itself recursively resolved)
/// contents of the referenced file, preserving the slot's key (spec §4.3,
/// point 2). `include` nodes only ever occur as named `Block` members —
/// the grammar has no array-element form of `include` — so the array arm
/// below only needs to recurse, never to replace.
fn walk_and_resolve(value: &Value, base: &Path, files: &mut Vec<String>) -> RsdResult<()> {
    if value.is_block() {
        for name in value.names()? {
            let child = match value.get_named(&name) {
                Some(child) => child,
                None => continue,
            };
            if child.is_include() {
                let include_path = base.join(&name);
                log::debug!("including {} as '{}'", include_path.display(), name);
                let replacement = load_path(&include_path, true, files)?;
                // The replacement keeps the `include` annotation so lookups
                // still treat this slot as an include child (spec §4.4's
                // include-child fallback search), matching the original
                // loader's `setTypeName` carry-over on substitution.
                replacement.set_type_name(child.type_name());
                value.set_named(name, replacement)?;
            } else if child.is_block() || child.is_array() {
                walk_and_resolve(&child, base, files)?;
            }
        }
    } else if value.is_array() {
        for i in 0..value.array_len()? {
            if let Some(child) = value.array_get(i) {
                if child.is_block() || child.is_array() {
                    walk_and_resolve(&child, base, files)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_buffer_without_includes_leaves_placeholder_empty() {
        let doc = Document::load_buffer(r#"include "foo.rsd"; z = "${k}";"#, "main.rsd", ".", false).unwrap();
        let include = doc.root().get_named("foo.rsd").unwrap();
        assert!(include.is_include());
        assert_eq!(include.block_len().unwrap(), 0);
    }

    #[test]
    fn load_buffer_with_includes_inlines_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("foo.rsd")).unwrap();
        writeln!(f, "k = 7;").unwrap();

        let doc = Document::load_buffer(
            r#"include "foo.rsd"; z = "${k}";"#,
            "main.rsd",
            dir.path(),
            true,
        )
        .unwrap();

        let k = doc.root().get_named("foo.rsd").unwrap().get_named("k").unwrap();
        assert_eq!(k.raw_integer(), Some(7));

        let z = doc.root().get_named("z").unwrap();
        let (resolved, ok) = z.resolve().unwrap();
        assert!(ok);
        assert_eq!(resolved.raw_string().as_deref(), Some("7"));
    }

    #[test]
    fn missing_include_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::load_buffer(r#"include "missing.rsd";"#, "main.rsd", dir.path(), true).unwrap_err();
        assert!(matches!(err, RsdError::Io { .. }));
    }

    #[test]
    fn load_populates_file_index() {
        let doc = Document::load_buffer("x = 1;", "main.rsd", ".", false).unwrap();
        assert_eq!(doc.files(), &["main.rsd".to_string()]);
    }

    #[test]
    fn with_process_environment_enables_fallback_lookup() {
        std::env::set_var("RSD_LOADER_TEST_VAR", "hello");
        let doc = Document::load_buffer("x = 1;", "main.rsd", ".", false)
            .unwrap()
            .with_process_environment();
        let found = doc.root().find_str("RSD_LOADER_TEST_VAR").unwrap().unwrap();
        assert_eq!(found.raw_string().as_deref(), Some("hello"));
        std::env::remove_var("RSD_LOADER_TEST_VAR");
    }
}
