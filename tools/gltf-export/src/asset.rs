//! Asset aggregation
//!
//! [`AssetBuilder`] collects meshes, materials, resources, nodes and
//! animations; every cross-reference is an index into one of those arenas.
//! [`Asset::pack_accessors`] then concatenates all accessor bytes into the
//! single binary blob and materializes the glTF document exactly once.

use std::path::{Component, Path};

use gltf_json as json;

use crate::accessor::{AccessorArena, AccessorId, align_buffer};
use crate::animation::ExportableAnimation;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::input::{NodeInput, SceneInput};
use crate::material::Material;
use crate::mesh::ExportableMesh;

/// Document metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMeta {
    pub generator: String,
    pub copyright: Option<String>,
}

/// A loose resource: image or shader source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: Option<String>,
    /// Relative URI used when the resource is not embedded
    pub uri: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Collects everything that goes into one document
#[derive(Debug, Clone)]
pub struct AssetBuilder {
    meta: AssetMeta,
    opacity_factor: f32,
    meshes: Vec<ExportableMesh>,
    materials: Vec<Material>,
    images: Vec<Resource>,
    shaders: Vec<Resource>,
    nodes: Vec<NodeInput>,
    animations: Vec<ExportableAnimation>,
}

impl AssetBuilder {
    pub fn new(meta: AssetMeta) -> Self {
        Self {
            meta,
            opacity_factor: 1.0,
            meshes: Vec::new(),
            materials: Vec::new(),
            images: Vec::new(),
            shaders: Vec::new(),
            nodes: Vec::new(),
            animations: Vec::new(),
        }
    }

    /// Build every part of `scene`; resource files are read relative to `base_dir`
    pub fn from_scene(scene: &SceneInput, base_dir: &Path, config: &ExportConfig) -> Result<Self> {
        let mut builder = Self::new(AssetMeta {
            generator: config.generator.clone(),
            copyright: config.copyright.clone(),
        })
        .with_opacity_factor(config.opacity_factor);

        for mesh in &scene.meshes {
            builder.add_mesh(ExportableMesh::build(mesh, config.force_32bit_indices)?);
        }
        for material in &scene.materials {
            builder.add_material(material.clone());
        }
        for image in &scene.images {
            check_relative_uri("image", &image.uri)?;
            builder.add_image(Resource {
                name: image.name.clone(),
                uri: image.uri.clone(),
                mime_type: image
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| guess_image_mime(&image.uri).to_string()),
                data: image.load(base_dir)?,
            });
        }
        for shader in &scene.shaders {
            check_relative_uri("shader", &shader.uri)?;
            builder.add_shader(Resource {
                name: None,
                uri: shader.uri.clone(),
                mime_type: "text/plain".to_string(),
                data: shader.source.clone().into_bytes(),
            });
        }
        for node in &scene.nodes {
            builder.add_node(node.clone());
        }

        let node_count = builder.node_count();
        for clip in &scene.animations {
            let animation = ExportableAnimation::build(clip, node_count, |node| {
                builder.morph_weight_count(node)
            })?;
            builder.add_animation(animation);
        }

        Ok(builder)
    }

    pub fn with_opacity_factor(mut self, opacity_factor: f32) -> Self {
        self.opacity_factor = opacity_factor;
        self
    }

    pub fn add_mesh(&mut self, mesh: ExportableMesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_image(&mut self, image: Resource) -> usize {
        self.images.push(image);
        self.images.len() - 1
    }

    pub fn add_shader(&mut self, shader: Resource) -> usize {
        self.shaders.push(shader);
        self.shaders.len() - 1
    }

    pub fn add_node(&mut self, node: NodeInput) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_animation(&mut self, animation: ExportableAnimation) -> usize {
        self.animations.push(animation);
        self.animations.len() - 1
    }

    /// Nodes the document will contain (one per mesh when none were added)
    pub fn node_count(&self) -> usize {
        if self.nodes.is_empty() {
            self.meshes.len()
        } else {
            self.nodes.len()
        }
    }

    fn morph_weight_count(&self, node: usize) -> usize {
        let mesh = if self.nodes.is_empty() {
            Some(node)
        } else {
            self.nodes.get(node).and_then(|n| n.mesh)
        };
        mesh.and_then(|m| self.meshes.get(m))
            .map_or(0, |mesh| mesh.weights.len())
    }

    /// Check every cross-reference and freeze the asset
    pub fn build(mut self) -> Result<Asset> {
        if self.nodes.is_empty() {
            self.nodes = (0..self.meshes.len())
                .map(|mesh| NodeInput {
                    name: Some(self.meshes[mesh].name.clone()),
                    mesh: Some(mesh),
                    ..Default::default()
                })
                .collect();
        }

        for mesh in &self.meshes {
            for (_, material) in &mesh.primitives {
                if let Some(material) = material
                    && *material >= self.materials.len()
                {
                    return Err(ExportError::invalid(
                        format!("mesh '{}'", mesh.name),
                        format!("material {material} of {}", self.materials.len()),
                    ));
                }
            }
        }

        for (i, material) in self.materials.iter().enumerate() {
            if let Some(&image) = material
                .kind
                .textures()
                .iter()
                .find(|&&image| image as usize >= self.images.len())
            {
                return Err(ExportError::invalid(
                    format!("material {i}"),
                    format!("texture image {image} of {}", self.images.len()),
                ));
            }
        }

        let roots = scene_roots(&self.nodes, self.meshes.len())?;

        Ok(Asset {
            meta: self.meta,
            opacity_factor: self.opacity_factor,
            meshes: self.meshes,
            materials: self.materials,
            images: self.images,
            shaders: self.shaders,
            nodes: self.nodes,
            roots,
            animations: self.animations,
            packed: None,
        })
    }
}

/// Resource URIs become file names under the output folder
fn check_relative_uri(context: &str, uri: &str) -> Result<()> {
    let path = Path::new(uri);
    let inside = !uri.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if inside {
        Ok(())
    } else {
        Err(ExportError::invalid(
            format!("{context} '{uri}'"),
            "URI must be a relative path inside the output folder",
        ))
    }
}

fn guess_image_mime(uri: &str) -> &'static str {
    let lower = uri.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "image/png"
    }
}

/// Root nodes in declaration order; rejects dangling, shared or cyclic children
fn scene_roots(nodes: &[NodeInput], mesh_count: usize) -> Result<Vec<usize>> {
    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];

    for (i, node) in nodes.iter().enumerate() {
        if let Some(mesh) = node.mesh
            && mesh >= mesh_count
        {
            return Err(ExportError::invalid(
                format!("node {i}"),
                format!("mesh {mesh} of {mesh_count}"),
            ));
        }

        for &child in &node.children {
            let Some(slot) = parent.get_mut(child) else {
                return Err(ExportError::invalid(
                    format!("node {i}"),
                    format!("child {child} of {}", nodes.len()),
                ));
            };
            if slot.is_some() || child == i {
                return Err(ExportError::invalid(
                    format!("node {i}"),
                    format!("node {child} cannot be attached here"),
                ));
            }
            *slot = Some(i);
        }
    }

    let roots: Vec<usize> = (0..nodes.len()).filter(|&i| parent[i].is_none()).collect();

    // Anything unreachable from a root sits on a cycle
    let mut reached = vec![false; nodes.len()];
    let mut stack = roots.clone();
    while let Some(node) = stack.pop() {
        reached[node] = true;
        stack.extend(&nodes[node].children);
    }
    if let Some(node) = reached.iter().position(|r| !r) {
        return Err(ExportError::invalid(format!("node {node}"), "node hierarchy contains a cycle"));
    }

    Ok(roots)
}

/// Output of [`Asset::pack_accessors`]
#[derive(Debug, Clone)]
pub struct PackedDocument {
    pub root: json::Root,
    pub blob: Vec<u8>,
}

/// A complete asset; immutable apart from the one-shot packing step
#[derive(Debug, Clone)]
pub struct Asset {
    meta: AssetMeta,
    opacity_factor: f32,
    meshes: Vec<ExportableMesh>,
    materials: Vec<Material>,
    images: Vec<Resource>,
    shaders: Vec<Resource>,
    nodes: Vec<NodeInput>,
    roots: Vec<usize>,
    animations: Vec<ExportableAnimation>,
    packed: Option<PackedDocument>,
}

/// Concatenates arenas into one blob, one buffer view per accessor
#[derive(Default)]
struct Packer {
    blob: Vec<u8>,
    views: Vec<json::buffer::View>,
    accessors: Vec<json::Accessor>,
}

impl Packer {
    /// Append every accessor of `arena`; returns the packed index of its first accessor
    fn pack(&mut self, arena: &AccessorArena) -> u32 {
        let base = self.accessors.len() as u32;
        for accessor in arena.accessors() {
            let offset = self.blob.len();
            self.blob.extend_from_slice(arena.bytes_of(accessor));
            align_buffer(&mut self.blob);

            let view = json::Index::new(self.views.len() as u32);
            self.views.push(accessor.view_json(offset));
            self.accessors.push(accessor.to_json(view));
        }
        base
    }
}

fn resolver(base: u32) -> impl Fn(AccessorId) -> json::Index<json::Accessor> {
    move |id| json::Index::new(base + id.0)
}

impl Asset {
    pub fn meta(&self) -> &AssetMeta {
        &self.meta
    }

    pub fn meshes(&self) -> &[ExportableMesh] {
        &self.meshes
    }

    pub fn images(&self) -> &[Resource] {
        &self.images
    }

    pub fn shaders(&self) -> &[Resource] {
        &self.shaders
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    /// Document produced by [`Asset::pack_accessors`], if it ran
    pub fn packed(&self) -> Option<&PackedDocument> {
        self.packed.as_ref()
    }

    /// Concatenate every accessor (meshes, then primitives, then slots, then
    /// animations) into one blob and build the glTF document around it.
    ///
    /// May only run once per asset.
    pub fn pack_accessors(&mut self) -> Result<&PackedDocument> {
        if self.packed.is_some() {
            return Err(ExportError::AlreadyPacked);
        }

        let mut packer = Packer::default();
        let mut root = json::Root::default();

        for mesh in &self.meshes {
            let primitives = mesh
                .primitives
                .iter()
                .map(|(primitive, material)| {
                    let base = packer.pack(primitive.arena());
                    primitive.to_json(
                        material.map(|m| json::Index::new(m as u32)),
                        resolver(base),
                    )
                })
                .collect();

            root.meshes.push(json::Mesh {
                extensions: Default::default(),
                extras: Default::default(),
                name: Some(mesh.name.clone()),
                primitives,
                weights: (!mesh.weights.is_empty()).then(|| mesh.weights.clone()),
            });
        }

        for (i, animation) in self.animations.iter().enumerate() {
            tracing::debug!("Animation {}: {} channel(s)", i, animation.channel_count());
            let base = packer.pack(animation.arena());
            root.animations.push(animation.to_json(resolver(base)));
        }

        root.materials = self
            .materials
            .iter()
            .map(|m| m.to_json(self.opacity_factor))
            .collect();

        for (i, image) in self.images.iter().enumerate() {
            root.images.push(json::Image {
                buffer_view: None,
                mime_type: Some(json::image::MimeType(image.mime_type.clone())),
                name: image.name.clone(),
                uri: Some(image.uri.clone()),
                extensions: None,
                extras: Default::default(),
            });
            root.textures.push(json::Texture {
                name: None,
                sampler: None,
                source: json::Index::new(i as u32),
                extensions: None,
                extras: Default::default(),
            });
        }

        root.nodes = self.nodes.iter().map(node_json).collect();
        root.scenes.push(json::Scene {
            extensions: Default::default(),
            extras: Default::default(),
            name: None,
            nodes: self.roots.iter().map(|&n| json::Index::new(n as u32)).collect(),
        });
        root.scene = Some(json::Index::new(0));

        if !packer.blob.is_empty() {
            root.buffers.push(json::Buffer {
                byte_length: packer.blob.len().into(),
                extensions: Default::default(),
                extras: Default::default(),
                name: None,
                uri: None,
            });
        }
        root.buffer_views = packer.views;
        root.accessors = packer.accessors;

        root.asset = json::Asset {
            copyright: self.meta.copyright.clone(),
            extensions: Default::default(),
            extras: Default::default(),
            generator: Some(self.meta.generator.clone()),
            min_version: None,
            version: "2.0".to_string(),
        };

        tracing::debug!(
            "Packed {} accessors into {} bytes",
            root.accessors.len(),
            packer.blob.len()
        );

        Ok(&*self.packed.insert(PackedDocument {
            root,
            blob: packer.blob,
        }))
    }
}

fn node_json(node: &NodeInput) -> json::Node {
    json::Node {
        camera: None,
        children: (!node.children.is_empty())
            .then(|| node.children.iter().map(|&c| json::Index::new(c as u32)).collect()),
        extensions: Default::default(),
        extras: Default::default(),
        matrix: None,
        mesh: node.mesh.map(|m| json::Index::new(m as u32)),
        name: node.name.clone(),
        rotation: node.rotation.map(json::scene::UnitQuaternion),
        scale: node.scale,
        skin: None,
        translation: node.translation,
        weights: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{CornerIndices, MeshInput, ShapeElements};

    fn triangle(name: &str) -> MeshInput {
        MeshInput {
            name: name.to_string(),
            shapes: vec![ShapeElements {
                positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
                normals: vec![0.0, 0.0, 1.0],
                ..Default::default()
            }],
            indices: CornerIndices {
                positions: vec![Some(0), Some(1), Some(2)],
                normals: vec![Some(0); 3],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn meta() -> AssetMeta {
        AssetMeta {
            generator: "test".to_string(),
            copyright: Some("(c) nobody".to_string()),
        }
    }

    fn asset_with(meshes: &[MeshInput]) -> Asset {
        let mut builder = AssetBuilder::new(meta());
        for mesh in meshes {
            builder.add_mesh(ExportableMesh::build(mesh, false).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_pack_concatenates_in_creation_order() {
        let mut asset = asset_with(&[triangle("a"), triangle("b")]);
        let packed = asset.pack_accessors().unwrap();

        // indices (6 -> 8 bytes) + POSITION (36) + NORMAL (36) per mesh
        assert_eq!(packed.blob.len(), 2 * (8 + 36 + 36));
        assert_eq!(packed.root.accessors.len(), 6);
        assert_eq!(packed.root.buffer_views.len(), 6);

        let offsets: Vec<u64> = packed
            .root
            .buffer_views
            .iter()
            .map(|v| v.byte_offset.map_or(0, |o| o.0))
            .collect();
        assert_eq!(offsets, vec![0, 8, 44, 80, 88, 124]);
        assert!(offsets.iter().all(|o| o % 4 == 0));

        assert_eq!(packed.root.buffers[0].byte_length.0, 160);
        assert_eq!(packed.root.meshes[1].primitives[0].indices, Some(json::Index::new(3)));
    }

    #[test]
    fn test_second_pack_is_rejected() {
        let mut asset = asset_with(&[triangle("a")]);
        let first = asset.pack_accessors().unwrap().blob.clone();

        let err = asset.pack_accessors().unwrap_err();
        assert!(matches!(err, ExportError::AlreadyPacked));
        assert_eq!(asset.packed().unwrap().blob, first);
    }

    #[test]
    fn test_meshes_without_nodes_become_roots() {
        let mut asset = asset_with(&[triangle("a"), triangle("b")]);
        assert_eq!(asset.roots(), &[0, 1]);

        let root = &asset.pack_accessors().unwrap().root;
        assert_eq!(root.nodes.len(), 2);
        assert_eq!(root.nodes[1].mesh, Some(json::Index::new(1)));
        assert_eq!(root.scenes[0].nodes.len(), 2);
        assert_eq!(root.asset.generator.as_deref(), Some("test"));
        assert_eq!(root.asset.version, "2.0");
    }

    #[test]
    fn test_node_hierarchy_roots() {
        let mut builder = AssetBuilder::new(meta());
        builder.add_node(NodeInput {
            children: vec![2],
            ..Default::default()
        });
        builder.add_node(NodeInput::default());
        builder.add_node(NodeInput::default());
        let asset = builder.build().unwrap();
        assert_eq!(asset.roots(), &[0, 1]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut builder = AssetBuilder::new(meta());
        builder.add_node(NodeInput {
            children: vec![1],
            ..Default::default()
        });
        builder.add_node(NodeInput {
            children: vec![0],
            ..Default::default()
        });
        assert!(builder.build().is_err());
    }

    #[test]
    fn test_missing_material_is_rejected() {
        let mut mesh = triangle("a");
        mesh.triangle_shaders = vec![Some(0)];
        mesh.shaders = vec![5];

        let mut builder = AssetBuilder::new(meta());
        builder.add_mesh(ExportableMesh::build(&mesh, false).unwrap());
        let err = builder.build().unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
    }

    #[test]
    fn test_resource_uris_stay_in_output_folder() {
        assert!(check_relative_uri("image", "textures/checker.png").is_ok());
        assert!(check_relative_uri("image", "./checker.png").is_ok());
        assert!(check_relative_uri("image", "../checker.png").is_err());
        assert!(check_relative_uri("image", "textures/../../checker.png").is_err());
        assert!(check_relative_uri("shader", "/tmp/unlit.glsl").is_err());
        assert!(check_relative_uri("shader", "").is_err());
    }

    #[test]
    fn test_scene_with_escaping_shader_uri_is_rejected() {
        let scene = SceneInput::from_json(r#"{ "shaders": [{ "uri": "../unlit.glsl", "source": "" }] }"#)
            .unwrap();
        let err = AssetBuilder::from_scene(&scene, Path::new("."), &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, ExportError::InvalidInput { .. }));
    }

    #[test]
    fn test_empty_asset_has_no_buffer() {
        let mut asset = AssetBuilder::new(meta()).build().unwrap();
        let packed = asset.pack_accessors().unwrap();
        assert!(packed.blob.is_empty());
        assert!(packed.root.buffers.is_empty());
    }
}
