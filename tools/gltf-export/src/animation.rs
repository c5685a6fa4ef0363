//! Pre-sampled node animation
//!
//! Clips arrive already sampled (the traversal owns curve evaluation); this
//! module validates them and packs keyframes into accessors.

use gltf_json as json;
use gltf_json::validation::Checked::Valid;
use serde::{Deserialize, Serialize};

use crate::accessor::{AccessorArena, AccessorId, ElementType};
use crate::error::{ExportError, Result};

/// Animated node property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelPath {
    Translation,
    Rotation,
    Scale,
    Weights,
}

impl ChannelPath {
    fn to_json(self) -> json::animation::Property {
        match self {
            ChannelPath::Translation => json::animation::Property::Translation,
            ChannelPath::Rotation => json::animation::Property::Rotation,
            ChannelPath::Scale => json::animation::Property::Scale,
            ChannelPath::Weights => json::animation::Property::MorphTargetWeights,
        }
    }
}

/// One sampled property track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub node: usize,
    pub path: ChannelPath,
    /// Keyframe times in seconds, strictly increasing
    pub times: Vec<f32>,
    /// Flat keyframe values, `times.len()` elements
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationClip {
    pub name: Option<String>,
    pub channels: Vec<AnimationChannel>,
}

#[derive(Debug, Clone, Copy)]
struct PackedChannel {
    node: usize,
    path: ChannelPath,
    input: AccessorId,
    output: AccessorId,
}

/// An animation clip with its keyframes packed
#[derive(Debug, Clone)]
pub struct ExportableAnimation {
    name: Option<String>,
    arena: AccessorArena,
    channels: Vec<PackedChannel>,
}

impl ExportableAnimation {
    /// `morph_weights(node)` yields the morph target count of the node's mesh
    pub fn build(
        clip: &AnimationClip,
        node_count: usize,
        morph_weights: impl Fn(usize) -> usize,
    ) -> Result<Self> {
        let context = || format!("animation '{}'", clip.name.as_deref().unwrap_or("<unnamed>"));
        let mut arena = AccessorArena::new();
        let mut channels = Vec::with_capacity(clip.channels.len());

        for (i, channel) in clip.channels.iter().enumerate() {
            if channel.node >= node_count {
                return Err(ExportError::invalid(
                    context(),
                    format!("channel {i} targets node {} of {node_count}", channel.node),
                ));
            }
            if channel.times.is_empty() {
                return Err(ExportError::invalid(context(), format!("channel {i} has no keyframes")));
            }
            if channel.times.windows(2).any(|w| w[0] >= w[1]) {
                return Err(ExportError::invalid(
                    context(),
                    format!("channel {i} keyframe times are not strictly increasing"),
                ));
            }

            let (element_type, width) = match channel.path {
                ChannelPath::Translation | ChannelPath::Scale => (ElementType::Vec3, 3),
                ChannelPath::Rotation => (ElementType::Vec4, 4),
                ChannelPath::Weights => (ElementType::Scalar, morph_weights(channel.node)),
            };
            if width == 0 || channel.values.len() != channel.times.len() * width {
                return Err(ExportError::invalid(
                    context(),
                    format!(
                        "channel {i} has {} values for {} keyframes of width {width}",
                        channel.values.len(),
                        channel.times.len()
                    ),
                ));
            }

            let input = arena.push_floats(ElementType::Scalar, &channel.times, None, true)?;
            let output = arena.push_floats(element_type, &channel.values, None, false)?;
            channels.push(PackedChannel {
                node: channel.node,
                path: channel.path,
                input,
                output,
            });
        }

        Ok(Self {
            name: clip.name.clone(),
            arena,
            channels,
        })
    }

    pub fn arena(&self) -> &AccessorArena {
        &self.arena
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// JSON animation with one linear sampler per channel
    pub fn to_json(&self, resolve: impl Fn(AccessorId) -> json::Index<json::Accessor>) -> json::Animation {
        let mut samplers = Vec::with_capacity(self.channels.len());
        let mut channels = Vec::with_capacity(self.channels.len());

        for (i, channel) in self.channels.iter().enumerate() {
            samplers.push(json::animation::Sampler {
                input: resolve(channel.input),
                output: resolve(channel.output),
                interpolation: Valid(json::animation::Interpolation::Linear),
                extensions: None,
                extras: Default::default(),
            });

            channels.push(json::animation::Channel {
                sampler: json::Index::new(i as u32),
                target: json::animation::Target {
                    node: json::Index::new(channel.node as u32),
                    path: Valid(channel.path.to_json()),
                    extensions: None,
                    extras: Default::default(),
                },
                extensions: None,
                extras: Default::default(),
            });
        }

        json::Animation {
            name: self.name.clone(),
            channels,
            samplers,
            extensions: None,
            extras: Default::default(),
        }
    }
}
