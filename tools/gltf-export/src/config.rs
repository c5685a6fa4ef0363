//! Export configuration
//!
//! Loaded from an optional TOML file; the CLI overrides individual fields.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// How the document and its resources are written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One `.gltf` with buffers, images and shaders inlined as data URIs
    #[default]
    Embedded,
    /// `.gltf` plus sidecar `.bin`, image and shader files
    Separate,
    /// One `.glb` container; images and shaders as sidecars
    Glb,
}

impl OutputMode {
    /// Whether resources are inlined as data URIs
    pub fn embeds_resources(self) -> bool {
        self == OutputMode::Embedded
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputMode::Embedded => "embedded",
            OutputMode::Separate => "separate",
            OutputMode::Glb => "glb",
        })
    }
}

impl FromStr for OutputMode {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "embedded" => Ok(OutputMode::Embedded),
            "separate" => Ok(OutputMode::Separate),
            "glb" => Ok(OutputMode::Glb),
            other => Err(ExportError::Config(format!(
                "unknown output mode '{other}' (use embedded, separate or glb)"
            ))),
        }
    }
}

/// File extensions, without the leading dot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Extensions {
    pub gltf: String,
    pub glb: String,
    pub bin: String,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            gltf: "gltf".to_string(),
            glb: "glb".to_string(),
            bin: "bin".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Base name of the written document
    pub scene_name: String,
    pub output_folder: PathBuf,
    pub mode: OutputMode,
    pub force_32bit_indices: bool,
    pub extensions: Extensions,
    /// Also dump the pretty JSON here; `-` is stdout
    pub dump_gltf: Option<PathBuf>,
    pub generator: String,
    pub copyright: Option<String>,
    /// Multiplies every material's alpha
    pub opacity_factor: f32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scene_name: "scene".to_string(),
            output_folder: PathBuf::from("."),
            mode: OutputMode::default(),
            force_32bit_indices: false,
            extensions: Extensions::default(),
            dump_gltf: None,
            generator: concat!("gltf-export ", env!("CARGO_PKG_VERSION")).to_string(),
            copyright: None,
            opacity_factor: 1.0,
        }
    }
}

impl ExportConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ExportError::io(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ExportError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scene_name.is_empty() {
            return Err(ExportError::Config("scene_name must not be empty".to_string()));
        }
        if self.scene_name.contains(['/', '\\']) || self.scene_name == ".." {
            return Err(ExportError::Config(format!(
                "scene_name '{}' must be a plain file name",
                self.scene_name
            )));
        }
        if !(0.0..=1.0).contains(&self.opacity_factor) {
            return Err(ExportError::Config(format!(
                "opacity_factor {} is outside [0, 1]",
                self.opacity_factor
            )));
        }
        Ok(())
    }

    /// Path of the main document for the configured mode
    pub fn document_path(&self) -> PathBuf {
        let ext = match self.mode {
            OutputMode::Glb => &self.extensions.glb,
            OutputMode::Embedded | OutputMode::Separate => &self.extensions.gltf,
        };
        self.output_folder.join(format!("{}.{}", self.scene_name, ext))
    }

    /// Relative URI of the sidecar binary buffer
    pub fn buffer_uri(&self) -> String {
        format!("{}.{}", self.scene_name, self.extensions.bin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExportConfig::default();
        assert_eq!(config.mode, OutputMode::Embedded);
        assert!(!config.force_32bit_indices);
        assert_eq!(config.opacity_factor, 1.0);
        assert_eq!(config.document_path(), PathBuf::from("./scene.gltf"));
        assert_eq!(config.buffer_uri(), "scene.bin");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ExportConfig::from_toml(
            r#"
            scene_name = "level"
            mode = "glb"

            [extensions]
            glb = "vrm"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, OutputMode::Glb);
        assert_eq!(config.extensions.glb, "vrm");
        assert_eq!(config.extensions.bin, "bin");
        assert_eq!(config.document_path(), PathBuf::from("./level.vrm"));
    }

    #[test]
    fn test_bad_mode_is_config_error() {
        let err = ExportConfig::from_toml(r#"mode = "zip""#).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn test_opacity_out_of_range() {
        let err = ExportConfig::from_toml("opacity_factor = 2.0").unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
    }

    #[test]
    fn test_scene_name_cannot_leave_output_folder() {
        let err = ExportConfig::from_toml(r#"scene_name = "../outside""#).unwrap_err();
        assert!(matches!(err, ExportError::Config(_)));
        assert!(ExportConfig::from_toml(r#"scene_name = "level.v2""#).is_ok());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("GLB".parse::<OutputMode>().unwrap(), OutputMode::Glb);
        assert!("zip".parse::<OutputMode>().is_err());
    }
}
