//! One-pass `#include` expansion for shader files.
//!
//! Directives are replaced with the verbatim contents of the referenced file.
//! The inserted text is not scanned again, so includes inside an included file
//! stay in the output untouched. Relative paths are resolved against the
//! directory of the entry file.

use crate::error::{FrameError, FrameResult};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

static INCLUDE_REGEX: OnceLock<Regex> = OnceLock::new();

fn include_regex() -> &'static Regex {
    INCLUDE_REGEX.get_or_init(|| {
        Regex::new(r#"(?imR)^#include[ \t]+"(.*)"$"#).expect("Invalid include Regex")
    })
}

/// Reads `path` and expands every `#include "..."` line it contains.
pub fn resolve_includes(path: impl AsRef<Path>) -> FrameResult<String> {
    let path = path.as_ref();
    let source = read_source(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    expand_includes(&source, base_dir)
}

/// Expands the include lines of an in-memory source, resolving relative
/// names against `base_dir`.
pub fn expand_includes(source: &str, base_dir: &Path) -> FrameResult<String> {
    let mut output = String::with_capacity(source.len());
    let mut last = 0;

    for caps in include_regex().captures_iter(source) {
        let directive = caps.get(0).expect("capture 0 is always present");
        output.push_str(&source[last..directive.start()]);
        last = directive.end();

        let Some(target) = include_target(&caps[1], base_dir) else {
            debug!("Dropping #include with empty file name");
            continue;
        };

        debug!("Inlining {:?}", target);
        output.push_str(&read_source(&target)?);
    }

    output.push_str(&source[last..]);
    Ok(output)
}

/// Resolves the quoted name of a directive to a path, or `None` when empty.
fn include_target(raw: &str, base_dir: &Path) -> Option<PathBuf> {
    if raw.is_empty() {
        return None;
    }

    let name = raw.replacen(r"\\", r"\", 1).replacen(r#"\""#, "\"", 1);
    let name = PathBuf::from(name);
    if name.is_absolute() {
        Some(name)
    } else {
        Some(base_dir.join(name))
    }
}

fn read_source(path: &Path) -> FrameResult<String> {
    fs::read_to_string(path).map_err(|source| FrameError::SourceResolution {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn file_without_includes_is_returned_unchanged() {
        let temp = tempfile::tempdir().unwrap();
        let source = "void main() {\n    gl_FragColor = vec4(1.0);\n}\n";
        let entry = write(temp.path(), "plain.frag", source);

        assert_eq!(resolve_includes(&entry).unwrap(), source);
    }

    #[test]
    fn include_line_is_replaced_by_file_contents() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "b.glsl", "float x = 1.0;");
        let entry = write(temp.path(), "a.frag", "#include \"b.glsl\"");

        assert_eq!(resolve_includes(&entry).unwrap(), "float x = 1.0;");
    }

    #[test]
    fn surrounding_lines_are_preserved() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "noise.glsl", "float noise(vec2 p);");
        let entry = write(
            temp.path(),
            "main.frag",
            "precision mediump float;\n#include \"noise.glsl\"\nvoid main() {}\n",
        );

        assert_eq!(
            resolve_includes(&entry).unwrap(),
            "precision mediump float;\nfloat noise(vec2 p);\nvoid main() {}\n"
        );
    }

    #[test]
    fn nested_includes_are_not_expanded() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "c.glsl", "float c = 3.0;");
        write(temp.path(), "b.glsl", "#include \"c.glsl\"\nfloat b = 2.0;");
        let entry = write(temp.path(), "a.frag", "#include \"b.glsl\"\n");

        let resolved = resolve_includes(&entry).unwrap();
        assert_eq!(resolved, "#include \"c.glsl\"\nfloat b = 2.0;\n");
        assert!(!resolved.contains("float c"));
    }

    #[test]
    fn keyword_is_case_insensitive() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "lib.glsl", "// lib");
        let entry = write(temp.path(), "a.frag", "#INCLUDE \"lib.glsl\"\n");

        assert_eq!(resolve_includes(&entry).unwrap(), "// lib\n");
    }

    #[test]
    fn empty_file_name_removes_the_directive() {
        let temp = tempfile::tempdir().unwrap();
        let entry = write(temp.path(), "a.frag", "before\n#include \"\"\nafter\n");

        assert_eq!(resolve_includes(&entry).unwrap(), "before\n\nafter\n");
    }

    #[test]
    fn indented_directive_is_left_alone() {
        let temp = tempfile::tempdir().unwrap();
        let source = "  #include \"missing.glsl\"\n";
        let entry = write(temp.path(), "a.frag", source);

        assert_eq!(resolve_includes(&entry).unwrap(), source);
    }

    #[test]
    fn relative_names_resolve_against_entry_directory() {
        let temp = tempfile::tempdir().unwrap();
        let shaders = temp.path().join("shaders");
        let common = shaders.join("common");
        fs::create_dir_all(&common).unwrap();
        write(&common, "palette.glsl", "vec3 palette(float t);");
        let entry = write(&shaders, "scene.frag", "#include \"common/palette.glsl\"");

        assert_eq!(resolve_includes(&entry).unwrap(), "vec3 palette(float t);");
    }

    #[test]
    fn absolute_names_are_used_as_is() {
        let temp = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let lib = write(elsewhere.path(), "lib.glsl", "float lib;");
        let entry = write(
            temp.path(),
            "a.frag",
            &format!("#include \"{}\"", lib.display()),
        );

        assert_eq!(resolve_includes(&entry).unwrap(), "float lib;");
    }

    #[test]
    fn escaped_quote_in_name_is_unescaped() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "we\"ird.glsl", "float weird;");

        let expanded = expand_includes("#include \"we\\\"ird.glsl\"", temp.path()).unwrap();
        assert_eq!(expanded, "float weird;");
    }

    #[test]
    fn crlf_lines_are_matched() {
        let temp = tempfile::tempdir().unwrap();
        write(temp.path(), "b.glsl", "float b;");
        let entry = write(temp.path(), "a.frag", "#include \"b.glsl\"\r\nvoid main() {}\r\n");

        assert_eq!(
            resolve_includes(&entry).unwrap(),
            "float b;\r\nvoid main() {}\r\n"
        );
    }

    #[test]
    fn missing_include_fails_the_whole_resolve() {
        let temp = tempfile::tempdir().unwrap();
        let entry = write(temp.path(), "a.frag", "#include \"nope.glsl\"\nvoid main() {}\n");

        match resolve_includes(&entry) {
            Err(FrameError::SourceResolution { path, .. }) => {
                assert_eq!(path, temp.path().join("nope.glsl"));
            }
            other => panic!("expected SourceResolution, got {:?}", other),
        }
    }

    #[test]
    fn missing_entry_file_fails() {
        let temp = tempfile::tempdir().unwrap();
        let result = resolve_includes(temp.path().join("absent.frag"));
        assert!(matches!(result, Err(FrameError::SourceResolution { .. })));
    }
}
