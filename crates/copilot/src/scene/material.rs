use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::files::write_text_atomic;

pub const DEFAULT_SHADER: &str = "Standard";
pub const DEFAULT_MATERIAL_NAME: &str = "Default-Material";
const MATERIAL_EXTENSION: &str = "mat";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    fn from_bytes(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
            f32::from(a) / 255.0,
        )
    }

    /// Parses `#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA` or a named colour.
    pub fn parse_html(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Some(hex) = trimmed.strip_prefix('#') {
            return parse_hex(hex);
        }
        named_color(trimmed)
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |index: usize| u8::from_str_radix(&hex[index..=index], 16).ok();
    let byte = |index: usize| u8::from_str_radix(&hex[index..index + 2], 16).ok();
    match hex.len() {
        3 | 4 => {
            let mut channels = [0xffu8; 4];
            for (index, channel) in channels.iter_mut().enumerate().take(hex.len()) {
                let value = nibble(index)?;
                *channel = value * 16 + value;
            }
            Some(Color::from_bytes(
                channels[0],
                channels[1],
                channels[2],
                channels[3],
            ))
        }
        6 | 8 => {
            let mut channels = [0xffu8; 4];
            for (index, channel) in channels.iter_mut().enumerate().take(hex.len() / 2) {
                *channel = byte(index * 2)?;
            }
            Some(Color::from_bytes(
                channels[0],
                channels[1],
                channels[2],
                channels[3],
            ))
        }
        _ => None,
    }
}

fn named_color(name: &str) -> Option<Color> {
    let (r, g, b) = match name.to_ascii_lowercase().as_str() {
        "red" => (0xff, 0x00, 0x00),
        "cyan" | "aqua" => (0x00, 0xff, 0xff),
        "blue" => (0x00, 0x00, 0xff),
        "darkblue" => (0x00, 0x00, 0xa0),
        "lightblue" => (0xad, 0xd8, 0xe6),
        "purple" => (0x80, 0x00, 0x80),
        "yellow" => (0xff, 0xff, 0x00),
        "lime" => (0x00, 0xff, 0x00),
        "fuchsia" | "magenta" => (0xff, 0x00, 0xff),
        "white" => (0xff, 0xff, 0xff),
        "silver" => (0xc0, 0xc0, 0xc0),
        "grey" | "gray" => (0x80, 0x80, 0x80),
        "black" => (0x00, 0x00, 0x00),
        "orange" => (0xff, 0xa5, 0x00),
        "brown" => (0xa5, 0x2a, 0x2a),
        "maroon" => (0x80, 0x00, 0x00),
        "green" => (0x00, 0x80, 0x00),
        "olive" => (0x80, 0x80, 0x00),
        "navy" => (0x00, 0x00, 0x80),
        "teal" => (0x00, 0x80, 0x80),
        _ => return None,
    };
    Some(Color::from_bytes(r, g, b, 0xff))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub shader: String,
    pub color: Color,
    pub asset_path: Option<PathBuf>,
}

impl Material {
    pub fn standard(name: impl Into<String>, color: Color) -> Self {
        Self {
            name: name.into(),
            shader: DEFAULT_SHADER.to_string(),
            color,
            asset_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialMode {
    /// One shared built-in default material, loaded once.
    Editor,
    /// A freshly constructed default material per request.
    Runtime,
}

#[derive(Debug, Error)]
#[error("failed to persist material asset {path}: {source}")]
pub struct MaterialAssetError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[derive(Serialize)]
struct MaterialAsset<'a> {
    name: &'a str,
    shader: &'a str,
    color: [f32; 4],
}

#[derive(Debug)]
pub struct MaterialLibrary {
    mode: MaterialMode,
    shared_default: Option<Material>,
    builtin_loads: u32,
}

impl MaterialLibrary {
    pub fn new(mode: MaterialMode) -> Self {
        Self {
            mode,
            shared_default: None,
            builtin_loads: 0,
        }
    }

    pub fn mode(&self) -> MaterialMode {
        self.mode
    }

    pub fn builtin_loads(&self) -> u32 {
        self.builtin_loads
    }

    pub fn default_material(&mut self) -> Material {
        match self.mode {
            MaterialMode::Editor => {
                if self.shared_default.is_none() {
                    self.builtin_loads += 1;
                    self.shared_default =
                        Some(Material::standard(DEFAULT_MATERIAL_NAME, Color::WHITE));
                }
                self.shared_default
                    .clone()
                    .unwrap_or_else(|| Material::standard(DEFAULT_MATERIAL_NAME, Color::WHITE))
            }
            MaterialMode::Runtime => Material::standard(DEFAULT_MATERIAL_NAME, Color::WHITE),
        }
    }

    /// Builds a coloured material and saves it under `assets_dir` at a path no
    /// other asset uses yet.
    pub fn create_colored_asset(
        &mut self,
        base_name: &str,
        color: Color,
        assets_dir: &Path,
    ) -> Result<Material, MaterialAssetError> {
        let path = unique_asset_path(assets_dir, &sanitize_file_stem(base_name));
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(base_name)
            .to_string();
        let mut material = Material::standard(stem, color);

        let asset = MaterialAsset {
            name: &material.name,
            shader: &material.shader,
            color: [color.r, color.g, color.b, color.a],
        };
        let text = serde_json::to_string_pretty(&asset).map_err(|error| MaterialAssetError {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, error),
        })?;
        write_text_atomic(&path, &text).map_err(|source| MaterialAssetError {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "copilot_material_asset_created");

        material.asset_path = Some(path);
        Ok(material)
    }
}

fn sanitize_file_stem(raw: &str) -> String {
    let cleaned = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Material".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `Name.mat`, then `Name 1.mat`, `Name 2.mat`, ...
fn unique_asset_path(dir: &Path, stem: &str) -> PathBuf {
    let first = dir.join(format!("{stem}.{MATERIAL_EXTENSION}"));
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| dir.join(format!("{stem} {n}.{MATERIAL_EXTENSION}")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}
