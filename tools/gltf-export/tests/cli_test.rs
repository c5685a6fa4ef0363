//! Tests for the gltf-export binary


use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn write_scene(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("scene.json");
    let scene = scene_fixture::quad_scene(true, None);
    std::fs::write(&path, scene.to_string()).expect("Failed to write scene");
    path
}

#[test]
fn test_cli_export_glb() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = write_scene(dir.path());
    let out = dir.path().join("out");

    let status = Command::new(env!("CARGO_BIN_EXE_gltf-export"))
        .args([
            "export",
            scene.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--name",
            "level",
            "--mode",
            "glb",
        ])
        .status()
        .expect("Failed to run gltf-export");
    assert!(status.success());

    let glb = out.join("level.glb");
    let gltf = gltf::Gltf::open(&glb).expect("Failed to parse exported GLB");
    assert_eq!(gltf.document.meshes().count(), 1);
    assert!(gltf.blob.is_some());
}

#[test]
fn test_cli_config_file_and_overrides() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path());
    let out = dir.path().join("out");
    let config = dir.path().join("export.toml");
    std::fs::write(
        &config,
        format!(
            "scene_name = \"from_config\"\nmode = \"separate\"\noutput_folder = {:?}\n",
            out.to_str().unwrap()
        ),
    )
    .unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_gltf-export"))
        .args([
            "export",
            scene.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--force-32bit-indices",
        ])
        .status()
        .unwrap();
    assert!(status.success());

    assert!(out.join("from_config.gltf").exists());
    assert!(out.join("from_config.bin").exists());

    let gltf = gltf::Gltf::open(out.join("from_config.gltf")).unwrap();
    let primitive = gltf.document.meshes().next().unwrap().primitives().next().unwrap();
    assert!(matches!(
        primitive.indices().unwrap().data_type(),
        gltf::accessor::DataType::U32
    ));
}

#[test]
fn test_cli_check_prints_statistics() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path());

    let output = Command::new(env!("CARGO_BIN_EXE_gltf-export"))
        .args(["check", scene.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("quad: 6 corners, 4 vertices, 1 primitive(s), 1 morph target(s)"));
    assert!(!dir.path().join("scene.gltf").exists());
}

#[test]
fn test_cli_rejects_invalid_scene() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{ "meshes": [{ "name": "empty" }] }"#).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_gltf-export"))
        .args(["export", path.to_str().unwrap(), "-o", dir.path().to_str().unwrap()])
        .status()
        .unwrap();
    assert!(!status.success());
}
