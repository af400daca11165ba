//! Adapts WebGL-style GLSL to the GLSL 450 dialect understood by naga.
//!
//! Shader authors write against four loose uniforms (`resolution`, `time`,
//! `totalElapsedTime`, `speed`), a `position` attribute and `gl_FragColor`.
//! The wrappers below replace those with a uniform block, an explicit vertex
//! input and an explicit color output. `varying` declarations become located
//! stage outputs and inputs, numbered in declaration order, so a vertex and
//! fragment pair that declares its varyings in the same order links up.

use crate::error::{FrameError, FrameResult, ShaderStage};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Vertex program used when no vertex source is supplied.
///
/// Passes the quad position straight through as a clip-space vertex.
pub const DEFAULT_VERTEX_SHADER: &str = r"
attribute vec2 position;
void main(void) {
    gl_Position = vec4(position, 0.0, 1.0);
}
";

/// Uniform block shared by both stages. The layout must match
/// [`crate::frame::FrameUniforms`].
const UNIFORM_BLOCK: &str = r"layout(std140, set = 0, binding = 0) uniform FrameParams {
    vec2 frame_resolution;
    float frame_time;
    float frame_total_elapsed_time;
    float frame_speed;
} frame_params;

#define resolution frame_params.frame_resolution
#define time frame_params.frame_time
#define totalElapsedTime frame_params.frame_total_elapsed_time
#define speed frame_params.frame_speed
";

const FRAGMENT_OUTPUT: &str = "layout(location = 0) out vec4 frame_color;\n";

const VERTEX_INPUT: &str = "layout(location = 0) in vec2 position;\n";

/// Runs the user's vertex entry point, then mirrors Y so the surface keeps a
/// bottom-left origin like a GL default framebuffer.
const VERTEX_EPILOGUE: &str = r"
void main() {
    frame_user_main();
    gl_Position = vec4(gl_Position.x, -gl_Position.y, gl_Position.z, gl_Position.w);
}
";

static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
static PRECISION_REGEX: OnceLock<Regex> = OnceLock::new();
static UNIFORM_REGEX: OnceLock<Regex> = OnceLock::new();
static POSITION_REGEX: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE_REGEX: OnceLock<Regex> = OnceLock::new();
static VARYING_REGEX: OnceLock<Regex> = OnceLock::new();
static FRAG_COLOR_REGEX: OnceLock<Regex> = OnceLock::new();
static MAIN_REGEX: OnceLock<Regex> = OnceLock::new();

fn version_regex() -> &'static Regex {
    VERSION_REGEX
        .get_or_init(|| Regex::new(r"(?m)^[ \t]*#version[^\n]*\n?").expect("Invalid version Regex"))
}

fn precision_regex() -> &'static Regex {
    PRECISION_REGEX.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*precision[ \t]+\w+[ \t]+\w+[ \t]*;[ \t]*\r?\n?")
            .expect("Invalid precision Regex")
    })
}

/// Names of the uniforms the prelude provides.
const FRAME_UNIFORMS: [&str; 4] = ["resolution", "time", "totalElapsedTime", "speed"];

fn uniform_regex() -> &'static Regex {
    UNIFORM_REGEX.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<indent>[ \t]*)uniform[ \t]+(?P<ty>(?:(?:highp|mediump|lowp)[ \t]+)?\w+)[ \t]+(?P<names>\w+(?:[ \t]*,[ \t]*\w+)*)[ \t]*;[ \t]*(?P<eol>\r?\n)?",
        )
        .expect("Invalid uniform Regex")
    })
}

fn position_regex() -> &'static Regex {
    POSITION_REGEX.get_or_init(|| {
        Regex::new(
            r"(?m)^[ \t]*(?:layout[ \t]*\([^)]*\)[ \t]*)?(?:attribute|in)[ \t]+(?:(?:highp|mediump|lowp)[ \t]+)?vec2[ \t]+position[ \t]*;[ \t]*\r?\n?",
        )
        .expect("Invalid position Regex")
    })
}

fn attribute_regex() -> &'static Regex {
    ATTRIBUTE_REGEX.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*attribute[ \t]+[^;]*;").expect("Invalid attribute Regex")
    })
}

fn varying_regex() -> &'static Regex {
    VARYING_REGEX.get_or_init(|| {
        Regex::new(
            r"(?m)^(?P<indent>[ \t]*)varying[ \t]+(?:(?:highp|mediump|lowp)[ \t]+)?(?P<ty>\w+)[ \t]+(?P<names>\w+(?:[ \t]*,[ \t]*\w+)*)[ \t]*;",
        )
        .expect("Invalid varying Regex")
    })
}

fn frag_color_regex() -> &'static Regex {
    FRAG_COLOR_REGEX
        .get_or_init(|| Regex::new(r"\bgl_FragColor\b").expect("Invalid gl_FragColor Regex"))
}

fn main_regex() -> &'static Regex {
    MAIN_REGEX
        .get_or_init(|| Regex::new(r"\bvoid[ \t]+main[ \t]*\([ \t]*(?:void[ \t]*)?\)").expect("Invalid main Regex"))
}

/// Strips declarations the prelude provides itself.
fn sanitize(source: &str) -> String {
    let source = version_regex().replace_all(source, "");
    let source = precision_regex().replace_all(&source, "");
    uniform_regex().replace_all(&source, strip_frame_uniforms).into_owned()
}

/// Drops the frame uniforms from one `uniform` declaration, keeping any
/// other names it lists.
fn strip_frame_uniforms(caps: &Captures) -> String {
    let names: Vec<&str> = caps["names"].split(',').map(str::trim).collect();
    let kept: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !FRAME_UNIFORMS.contains(name))
        .collect();

    if kept.len() == names.len() {
        return caps[0].to_string();
    }
    if kept.is_empty() {
        return String::new();
    }
    let eol = caps.name("eol").map_or("", |m| m.as_str());
    format!("{}uniform {} {};{}", &caps["indent"], &caps["ty"], kept.join(", "), eol)
}

/// Rewrites `varying` declarations as `layout(location = N) <qualifier>`
/// declarations, one per name, numbering from 0 in source order.
fn locate_varyings(source: &str, qualifier: &str) -> String {
    let mut next_location = 0u32;
    varying_regex()
        .replace_all(source, |caps: &Captures| {
            let ty = &caps["ty"];
            caps["names"]
                .split(',')
                .map(str::trim)
                .map(|name| {
                    let declaration = format!(
                        "{}layout(location = {}) {} {} {};",
                        &caps["indent"], next_location, qualifier, ty, name
                    );
                    next_location += 1;
                    declaration
                })
                .collect::<Vec<_>>()
                .join("\n")
        })
        .into_owned()
}

/// Wraps a fragment program so it compiles as GLSL 450.
///
/// `gl_FragColor` writes are redirected to an explicit output at location 0.
/// Sources that declare their own output are left to do so.
pub fn wrap_fragment(source: &str) -> String {
    let sanitized = locate_varyings(&sanitize(source), "in");
    let sanitized = main_regex().replace_all(&sanitized, "void main()");
    let uses_frag_color = frag_color_regex().is_match(&sanitized);
    let body = frag_color_regex().replace_all(&sanitized, "frame_color");

    let mut wrapped = String::with_capacity(body.len() + UNIFORM_BLOCK.len() + 64);
    wrapped.push_str("#version 450\n");
    wrapped.push_str(UNIFORM_BLOCK);
    if uses_frag_color {
        wrapped.push_str(FRAGMENT_OUTPUT);
    }
    wrapped.push('\n');
    wrapped.push_str(&body);
    wrapped
}

/// Wraps a vertex program so it compiles as GLSL 450 and renders into a
/// bottom-left origin surface.
///
/// The quad only feeds `position`, so any other `attribute` is rejected.
pub fn wrap_vertex(source: &str) -> FrameResult<String> {
    let sanitized = sanitize(source);
    let sanitized = position_regex().replace_all(&sanitized, "");
    if let Some(extra) = attribute_regex().find(&sanitized) {
        return Err(FrameError::compilation(
            ShaderStage::Vertex,
            format!(
                "`{}`: only `attribute vec2 position;` is supplied to the vertex stage",
                extra.as_str().trim()
            ),
        ));
    }
    let sanitized = locate_varyings(&sanitized, "out");
    let body = main_regex().replace_all(&sanitized, "void frame_user_main()");

    let mut wrapped = String::with_capacity(body.len() + UNIFORM_BLOCK.len() + 256);
    wrapped.push_str("#version 450\n");
    wrapped.push_str(UNIFORM_BLOCK);
    wrapped.push_str(VERTEX_INPUT);
    wrapped.push('\n');
    wrapped.push_str(&body);
    wrapped.push_str(VERTEX_EPILOGUE);
    Ok(wrapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBGL_FRAGMENT: &str = r"#version 100
#ifdef GL_ES
precision mediump float;
#endif
uniform vec2 resolution;
uniform float time;
uniform highp float totalElapsedTime;
uniform float speed;

void main() {
    vec2 uv = gl_FragCoord.xy / resolution;
    gl_FragColor = vec4(uv, sin(time), 1.0);
}
";

    #[test]
    fn fragment_uniform_declarations_are_replaced_by_block() {
        let wrapped = wrap_fragment(WEBGL_FRAGMENT);

        assert!(wrapped.starts_with("#version 450\n"));
        assert_eq!(wrapped.matches("#version").count(), 1);
        assert!(!wrapped.contains("uniform vec2 resolution"));
        assert!(!wrapped.contains("uniform float time"));
        assert!(!wrapped.contains("totalElapsedTime;\n"));
        assert!(!wrapped.contains("precision mediump"));
        assert!(wrapped.contains("uniform FrameParams"));
        assert!(wrapped.contains("#define time frame_params.frame_time"));
    }

    #[test]
    fn gl_frag_color_is_redirected() {
        let wrapped = wrap_fragment(WEBGL_FRAGMENT);

        assert!(!wrapped.contains("gl_FragColor"));
        assert!(wrapped.contains("layout(location = 0) out vec4 frame_color;"));
        assert!(wrapped.contains("frame_color = vec4(uv, sin(time), 1.0);"));
    }

    #[test]
    fn explicit_outputs_are_left_alone() {
        let source = "layout(location = 0) out vec4 color;\nvoid main() { color = vec4(1.0); }\n";
        let wrapped = wrap_fragment(source);

        assert!(!wrapped.contains("frame_color"));
        assert!(wrapped.contains("out vec4 color;"));
    }

    #[test]
    fn unrelated_uniforms_survive() {
        let source = "uniform float timeline;\nuniform float time;\nvoid main() {}\n";
        let wrapped = wrap_fragment(source);

        assert!(wrapped.contains("uniform float timeline;"));
        assert!(!wrapped.contains("uniform float time;"));
    }

    #[test]
    fn default_vertex_shader_is_wrapped_with_flip() {
        let wrapped = wrap_vertex(DEFAULT_VERTEX_SHADER).unwrap();

        assert!(!wrapped.contains("attribute vec2 position"));
        assert!(wrapped.contains("layout(location = 0) in vec2 position;"));
        assert!(wrapped.contains("void frame_user_main() {"));
        assert!(wrapped.contains("frame_user_main();"));
        assert!(wrapped.contains("-gl_Position.y"));
    }

    #[test]
    fn void_parameter_list_is_normalized() {
        let wrapped = wrap_fragment("void main(void) { gl_FragColor = vec4(0.0); }\n");
        assert!(wrapped.contains("void main() {"));
        assert!(!wrapped.contains("main(void)"));
    }

    #[test]
    fn vertex_in_declaration_is_replaced() {
        let source = "#version 450\nlayout(location = 0) in vec2 position;\nvoid main() { gl_Position = vec4(position, 0.0, 1.0); }\n";
        let wrapped = wrap_vertex(source).unwrap();

        assert_eq!(wrapped.matches("in vec2 position;").count(), 1);
        assert_eq!(wrapped.matches("#version").count(), 1);
    }

    #[test]
    fn varyings_become_located_outputs_and_inputs() {
        let vertex = "attribute vec2 position;\nvarying vec2 uv;\nvarying highp float shade, glow;\nvoid main() { uv = position; shade = 1.0; glow = 0.0; gl_Position = vec4(position, 0.0, 1.0); }\n";
        let fragment = "precision mediump float;\nvarying vec2 uv;\nvarying float shade, glow;\nvoid main() { gl_FragColor = vec4(uv, shade, glow); }\n";

        let vertex = wrap_vertex(vertex).unwrap();
        assert!(!vertex.contains("varying"));
        assert!(vertex.contains("layout(location = 0) out vec2 uv;"));
        assert!(vertex.contains("layout(location = 1) out float shade;"));
        assert!(vertex.contains("layout(location = 2) out float glow;"));

        let fragment = wrap_fragment(fragment);
        assert!(!fragment.contains("varying"));
        assert!(fragment.contains("layout(location = 0) in vec2 uv;"));
        assert!(fragment.contains("layout(location = 1) in float shade;"));
        assert!(fragment.contains("layout(location = 2) in float glow;"));
    }

    #[test]
    fn extra_attributes_are_rejected() {
        let source = "attribute vec2 position;\nattribute vec3 normal;\nvoid main() { gl_Position = vec4(position, normal.z, 1.0); }\n";
        match wrap_vertex(source) {
            Err(FrameError::Compilation { stage, message }) => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(message.contains("attribute vec3 normal;"));
            }
            other => panic!("expected compilation error, got {:?}", other),
        }
    }

    #[test]
    fn uniform_lists_keep_only_foreign_names() {
        let source = "uniform float time, speed;\nuniform float fade, time, level;\n  uniform vec2 resolution , offset;\nvoid main() {}\n";
        let wrapped = wrap_fragment(source);

        assert!(!wrapped.contains("uniform float time"));
        assert!(wrapped.contains("uniform float fade, level;\n"));
        assert!(wrapped.contains("  uniform vec2 offset;\n"));
        assert!(!wrapped.contains("uniform vec2 resolution"));
    }
}
