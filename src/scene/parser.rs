//! Scene description parser
//!
//! One directive per line, `#` comments and blank lines ignored:
//!
//! ```text
//! camera  px py pz  dx dy dz  fov_deg  [focus_dist] [aperture]
//! p_light px py pz  r g b  emission  radius
//! scene   relative/path/to/mesh.obj
//! cubemap path/to/cross.hdr | 0xRRGGBB
//! ```
//!
//! Malformed lines are reported and skipped; scene loading continues with
//! whatever parsed.

use std::fs;
use std::path::Path;
use std::str::SplitWhitespace;

use cgmath::{InnerSpace, Vector3};
use log::warn;
use thiserror::Error;

use super::data::{Camera, LightProp};

/// Environment map source, resolved in order: absent -> default color,
/// `0x`-prefixed hex literal -> uniform color, anything else -> file path.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CubemapSource {
    #[default]
    Default,
    Color(u32),
    Path(String),
}

/// Host-side result of parsing a scene file.
#[derive(Debug, Clone, Default)]
pub struct ParsedScene {
    pub camera: Option<Camera>,
    pub lights: Vec<LightProp>,
    /// Geometry file reference, relative to the scene file's directory.
    pub geometry: Option<String>,
    pub cubemap: CubemapSource,
}

impl ParsedScene {
    /// The parsed camera, or the documented default when the file had no
    /// (valid) `camera` directive.
    pub fn camera_or_default(&self) -> Camera {
        self.camera.unwrap_or_default()
    }
}

/// A single unparseable directive. Recoverable: the offending line is
/// skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{directive}: {reason}")]
pub struct LineError {
    pub directive: String,
    pub reason: String,
}

impl LineError {
    fn new(directive: &str, reason: impl Into<String>) -> Self {
        Self {
            directive: directive.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parses a scene file from disk. Only I/O failures are fatal; bad lines
/// are logged with their location and skipped.
pub fn parse_scene_file(path: &Path) -> std::io::Result<ParsedScene> {
    let text = fs::read_to_string(path)?;
    Ok(parse_scene_text(&text, &path.display().to_string()))
}

/// Parses scene text. `origin` is used for diagnostics only.
pub fn parse_scene_text(text: &str, origin: &str) -> ParsedScene {
    let mut parsed = ParsedScene::default();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = parse_line(line, &mut parsed) {
            warn!("{}:{}: skipping directive: {}", origin, number + 1, e);
        }
    }

    parsed
}

fn parse_line(line: &str, out: &mut ParsedScene) -> Result<(), LineError> {
    let mut tokens = line.split_whitespace();
    let keyword = tokens.next().unwrap_or_default();

    match keyword {
        "camera" => out.camera = Some(parse_camera(&mut tokens)?),
        "p_light" => out.lights.push(parse_light(&mut tokens)?),
        "scene" => {
            let path = tokens
                .next()
                .ok_or_else(|| LineError::new("scene", "missing geometry file name"))?;
            out.geometry = Some(path.to_string());
        }
        "cubemap" => {
            let value = tokens
                .next()
                .ok_or_else(|| LineError::new("cubemap", "missing path or color"))?;
            out.cubemap = match parse_hex_color(value) {
                Some(color) => CubemapSource::Color(color),
                None => CubemapSource::Path(value.to_string()),
            };
        }
        other => return Err(LineError::new(other, "unknown directive")),
    }

    Ok(())
}

fn parse_camera(tokens: &mut SplitWhitespace) -> Result<Camera, LineError> {
    let mut cam = Camera::default();

    cam.position = parse_vec3(tokens, "camera", "position")?;
    cam.dir = parse_vec3(tokens, "camera", "direction")?.normalize();
    cam.fov_x = parse_f32(tokens, "camera", "fov")?.to_radians();

    // Optional trailing fields.
    cam.focus_dist = parse_f32_or(tokens, Camera::DEFAULT_FOCUS_DIST)?;
    cam.aperture = parse_f32_or(tokens, Camera::DEFAULT_APERTURE)?;
    cam.speed = Camera::DEFAULT_SPEED;

    Ok(cam)
}

fn parse_light(tokens: &mut SplitWhitespace) -> Result<LightProp, LineError> {
    let position = parse_vec3(tokens, "p_light", "position")?;
    let color = parse_vec3(tokens, "p_light", "color")?;
    let emission = parse_f32(tokens, "p_light", "emission")?;
    let radius = parse_f32(tokens, "p_light", "radius")?;

    Ok(LightProp {
        position: position.into(),
        emission,
        color: color.into(),
        radius,
    })
}

fn parse_f32(tokens: &mut SplitWhitespace, directive: &str, what: &str) -> Result<f32, LineError> {
    let token = tokens
        .next()
        .ok_or_else(|| LineError::new(directive, format!("missing {}", what)))?;
    token
        .parse()
        .map_err(|_| LineError::new(directive, format!("bad {} '{}'", what, token)))
}

fn parse_f32_or(tokens: &mut SplitWhitespace, default: f32) -> Result<f32, LineError> {
    match tokens.next() {
        None => Ok(default),
        Some(token) => token
            .parse()
            .map_err(|_| LineError::new("camera", format!("bad value '{}'", token))),
    }
}

fn parse_vec3(
    tokens: &mut SplitWhitespace,
    directive: &str,
    what: &str,
) -> Result<Vector3<f32>, LineError> {
    let x = parse_f32(tokens, directive, what)?;
    let y = parse_f32(tokens, directive, what)?;
    let z = parse_f32(tokens, directive, what)?;
    Ok(Vector3::new(x, y, z))
}

/// Recognizes `0x`-prefixed hex color literals such as `0x05070A`.
pub fn parse_hex_color(s: &str) -> Option<u32> {
    let digits = s.strip_prefix("0x")?;
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).magnitude() < 1e-6
    }

    #[test]
    fn camera_defaults_for_omitted_fields() {
        let parsed = parse_scene_text("camera 0 1 2  0 0 -4  90", "test");
        let cam = parsed.camera.unwrap();

        assert_eq!(cam.position, Vector3::new(0.0, 1.0, 2.0));
        // Direction comes back normalized.
        assert!(close(cam.dir, Vector3::new(0.0, 0.0, -1.0)));
        assert!((cam.fov_x - std::f32::consts::FRAC_PI_2).abs() < 1e-6);
        assert_eq!(cam.focus_dist, Camera::DEFAULT_FOCUS_DIST);
        assert_eq!(cam.aperture, Camera::DEFAULT_APERTURE);
    }

    #[test]
    fn camera_optional_fields_parsed_when_present() {
        let parsed = parse_scene_text("camera 0 0 0  1 0 0  60  3.5 0.25", "test");
        let cam = parsed.camera.unwrap();
        assert_eq!(cam.focus_dist, 3.5);
        assert_eq!(cam.aperture, 0.25);
    }

    #[test]
    fn lights_are_collected_in_order() {
        let text = "p_light 0 5 0  1 1 1  10 0.5\np_light 2 2 2  1 0 0  3 0.1\n";
        let parsed = parse_scene_text(text, "test");

        assert_eq!(parsed.lights.len(), 2);
        assert_eq!(parsed.lights[0].position, [0.0, 5.0, 0.0]);
        assert_eq!(parsed.lights[0].emission, 10.0);
        assert_eq!(parsed.lights[1].color, [1.0, 0.0, 0.0]);
        assert_eq!(parsed.lights[1].radius, 0.1);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let text = "\
# comment
p_light 0 0
bogus directive
scene meshes/room.obj
p_light 1 1 1  1 1 1  5 0.2
";
        let parsed = parse_scene_text(text, "test");
        assert_eq!(parsed.lights.len(), 1);
        assert_eq!(parsed.geometry.as_deref(), Some("meshes/room.obj"));
    }

    #[test]
    fn missing_camera_yields_default() {
        let parsed = parse_scene_text("scene a.obj", "test");
        assert_eq!(parsed.camera, None);

        let cam = parsed.camera_or_default();
        assert_eq!(cam.position, Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(cam.dir, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn cubemap_hex_literal_and_path() {
        let parsed = parse_scene_text("cubemap 0x05070A", "test");
        assert_eq!(parsed.cubemap, CubemapSource::Color(0x05070A));

        let parsed = parse_scene_text("cubemap env/night.hdr", "test");
        assert_eq!(parsed.cubemap, CubemapSource::Path("env/night.hdr".into()));

        let parsed = parse_scene_text("scene a.obj", "test");
        assert_eq!(parsed.cubemap, CubemapSource::Default);
    }

    #[test]
    fn hex_color_rejects_non_hex() {
        assert_eq!(parse_hex_color("0x"), None);
        assert_eq!(parse_hex_color("night.hdr"), None);
        assert_eq!(parse_hex_color("0xZZZZZZ"), None);
        assert_eq!(parse_hex_color("0xff00ff"), Some(0xFF00FF));
    }
}
