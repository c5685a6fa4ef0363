//! Material translation
//!
//! Legacy shading models are folded into glTF metallic-roughness; `pbr`
//! materials pass their parameters through. Texture references are image
//! indices; the asset creates exactly one texture per image, so they double as
//! texture indices.

use gltf_json as json;
use gltf_json::validation::Checked::Valid;
use serde::{Deserialize, Serialize};

/// Scene material
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: MaterialKind,
}

/// Closed set of supported shading models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MaterialKind {
    Lambert(Surface),
    Phong(Surface),
    Blinn(Surface),
    Pbr(PbrMaterial),
}

/// Parameters shared by the legacy shading models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Surface {
    pub color: [f32; 3],
    pub diffuse: f32,
    pub transparency: f32,
    pub color_texture: Option<u32>,
    pub normal_texture: Option<u32>,
    pub normal_scale: f32,
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            color: [0.5, 0.5, 0.5],
            diffuse: 0.8,
            transparency: 0.0,
            color_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
        }
    }
}

/// Metallic-roughness parameters as authored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbrMaterial {
    pub base_color: [f32; 4],
    pub base_color_texture: Option<u32>,
    pub metallic: f32,
    pub roughness: f32,
    pub metallic_roughness_texture: Option<u32>,
    pub normal_texture: Option<u32>,
    pub normal_scale: f32,
    pub occlusion_texture: Option<u32>,
    pub occlusion_strength: f32,
    pub emissive: [f32; 3],
    pub emissive_texture: Option<u32>,
    pub transparent: bool,
    pub double_sided: bool,
}

impl Default for PbrMaterial {
    fn default() -> Self {
        Self {
            base_color: [1.0; 4],
            base_color_texture: None,
            metallic: 0.5,
            roughness: 0.5,
            metallic_roughness_texture: None,
            normal_texture: None,
            normal_scale: 1.0,
            occlusion_texture: None,
            occlusion_strength: 1.0,
            emissive: [0.0; 3],
            emissive_texture: None,
            transparent: false,
            double_sided: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Blend,
}

/// Metallic-roughness parameters every material kind produces
#[derive(Debug, Clone, PartialEq)]
pub struct PbrParameters {
    pub base_color: [f32; 4],
    pub base_color_texture: Option<u32>,
    pub metallic: f32,
    pub roughness: f32,
    pub metallic_roughness_texture: Option<u32>,
    pub normal_texture: Option<(u32, f32)>,
    pub occlusion_texture: Option<(u32, f32)>,
    pub emissive: [f32; 3],
    pub emissive_texture: Option<u32>,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl MaterialKind {
    /// Translate to metallic-roughness; `opacity_factor` scales the final alpha
    pub fn pbr(&self, opacity_factor: f32) -> PbrParameters {
        match self {
            MaterialKind::Lambert(surface) | MaterialKind::Phong(surface) | MaterialKind::Blinn(surface) => {
                surface.pbr(opacity_factor)
            }
            MaterialKind::Pbr(pbr) => pbr.pbr(opacity_factor),
        }
    }

    /// Image indices referenced by this material
    pub fn textures(&self) -> Vec<u32> {
        let p = self.pbr(1.0);
        [
            p.base_color_texture,
            p.metallic_roughness_texture,
            p.normal_texture.map(|(i, _)| i),
            p.occlusion_texture.map(|(i, _)| i),
            p.emissive_texture,
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

impl Surface {
    fn pbr(&self, opacity_factor: f32) -> PbrParameters {
        // A color texture replaces the flat color
        let color = if self.color_texture.is_some() {
            [1.0; 3]
        } else {
            self.color
        };
        let opacity = (1.0 - self.transparency) * opacity_factor;

        PbrParameters {
            base_color: [
                color[0] * self.diffuse,
                color[1] * self.diffuse,
                color[2] * self.diffuse,
                opacity,
            ],
            base_color_texture: self.color_texture,
            metallic: 0.0,
            roughness: 1.0,
            metallic_roughness_texture: None,
            normal_texture: self.normal_texture.map(|i| (i, self.normal_scale)),
            occlusion_texture: None,
            emissive: [0.0; 3],
            emissive_texture: None,
            alpha_mode: if opacity < 1.0 {
                AlphaMode::Blend
            } else {
                AlphaMode::Opaque
            },
            double_sided: false,
        }
    }
}

impl PbrMaterial {
    fn pbr(&self, opacity_factor: f32) -> PbrParameters {
        let mut base_color = self.base_color;
        base_color[3] *= opacity_factor;

        PbrParameters {
            base_color,
            base_color_texture: self.base_color_texture,
            metallic: self.metallic,
            roughness: self.roughness,
            metallic_roughness_texture: self.metallic_roughness_texture,
            normal_texture: self.normal_texture.map(|i| (i, self.normal_scale)),
            occlusion_texture: self.occlusion_texture.map(|i| (i, self.occlusion_strength)),
            emissive: self.emissive,
            emissive_texture: self.emissive_texture,
            alpha_mode: if self.transparent || base_color[3] < 1.0 {
                AlphaMode::Blend
            } else {
                AlphaMode::Opaque
            },
            double_sided: self.double_sided,
        }
    }
}

impl Material {
    pub fn to_json(&self, opacity_factor: f32) -> json::Material {
        let p = self.kind.pbr(opacity_factor);

        json::Material {
            alpha_cutoff: None,
            alpha_mode: Valid(match p.alpha_mode {
                AlphaMode::Opaque => json::material::AlphaMode::Opaque,
                AlphaMode::Blend => json::material::AlphaMode::Blend,
            }),
            double_sided: p.double_sided,
            name: self.name.clone(),
            pbr_metallic_roughness: json::material::PbrMetallicRoughness {
                base_color_factor: json::material::PbrBaseColorFactor(p.base_color),
                base_color_texture: p.base_color_texture.map(texture_info),
                metallic_factor: json::material::StrengthFactor(p.metallic),
                roughness_factor: json::material::StrengthFactor(p.roughness),
                metallic_roughness_texture: p.metallic_roughness_texture.map(texture_info),
                extensions: None,
                extras: Default::default(),
            },
            normal_texture: p.normal_texture.map(|(index, scale)| json::material::NormalTexture {
                index: json::Index::new(index),
                scale,
                tex_coord: 0,
                extensions: None,
                extras: Default::default(),
            }),
            occlusion_texture: p
                .occlusion_texture
                .map(|(index, strength)| json::material::OcclusionTexture {
                    index: json::Index::new(index),
                    strength: json::material::StrengthFactor(strength),
                    tex_coord: 0,
                    extensions: None,
                    extras: Default::default(),
                }),
            emissive_texture: p.emissive_texture.map(texture_info),
            emissive_factor: json::material::EmissiveFactor(p.emissive),
            extensions: None,
            extras: Default::default(),
        }
    }
}

fn texture_info(index: u32) -> json::texture::Info {
    json::texture::Info {
        index: json::Index::new(index),
        tex_coord: 0,
        extensions: None,
        extras: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lambert_folds_diffuse_into_base_color() {
        let kind = MaterialKind::Lambert(Surface {
            color: [1.0, 0.5, 0.0],
            diffuse: 0.5,
            ..Default::default()
        });
        let p = kind.pbr(1.0);

        assert_eq!(p.base_color, [0.5, 0.25, 0.0, 1.0]);
        assert_eq!(p.metallic, 0.0);
        assert_eq!(p.roughness, 1.0);
        assert_eq!(p.alpha_mode, AlphaMode::Opaque);
    }

    #[test]
    fn test_transparency_and_opacity_factor_blend() {
        let kind = MaterialKind::Phong(Surface {
            transparency: 0.5,
            ..Default::default()
        });
        let p = kind.pbr(0.5);

        assert_eq!(p.base_color[3], 0.25);
        assert_eq!(p.alpha_mode, AlphaMode::Blend);
    }

    #[test]
    fn test_color_texture_replaces_color() {
        let kind = MaterialKind::Blinn(Surface {
            color: [0.1, 0.2, 0.3],
            diffuse: 1.0,
            color_texture: Some(2),
            ..Default::default()
        });
        let p = kind.pbr(1.0);
        assert_eq!(p.base_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(kind.textures(), vec![2]);
    }

    #[test]
    fn test_pbr_passes_through() {
        let material: Material = serde_json::from_str(
            r#"{ "name": "metal", "kind": "pbr", "metallic": 1.0, "roughness": 0.2, "occlusion_texture": 3 }"#,
        )
        .unwrap();
        let json = material.to_json(1.0);

        assert_eq!(json.name.as_deref(), Some("metal"));
        assert_eq!(json.pbr_metallic_roughness.metallic_factor.0, 1.0);
        assert_eq!(json.pbr_metallic_roughness.roughness_factor.0, 0.2);
        assert_eq!(json.occlusion_texture.map(|t| t.index.value()), Some(3));
        assert_eq!(json.alpha_mode, Valid(json::material::AlphaMode::Opaque));
    }

    #[test]
    fn test_kind_tag_parses_lowercase() {
        let material: Material = serde_json::from_str(r#"{ "kind": "lambert", "color": [1, 0, 0] }"#).unwrap();
        assert!(matches!(material.kind, MaterialKind::Lambert(_)));
        assert!(material.name.is_none());
    }
}
