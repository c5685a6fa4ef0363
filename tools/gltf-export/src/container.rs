//! Document writers: embedded `.gltf`, `.gltf` with sidecars, and `.glb`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::Engine;
use gltf_json as json;

use crate::asset::Asset;
use crate::config::{ExportConfig, OutputMode};
use crate::error::{ExportError, Result};

/// `glTF` file magic
pub const GLB_MAGIC: [u8; 4] = *b"glTF";
pub const GLB_VERSION: u32 = 2;
/// "JSON" chunk type
pub const CHUNK_JSON: u32 = 0x4E4F_534A;
/// "BIN\0" chunk type
pub const CHUNK_BIN: u32 = 0x004E_4942;

const FILE_HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;

/// Bytes needed to bring `len` to a multiple of 4
pub const fn padding(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn chunk_length(payload: usize) -> Result<u32> {
    u32::try_from(payload + padding(payload))
        .map_err(|_| ExportError::invalid("glb", format!("chunk of {payload} bytes exceeds 4 GiB")))
}

/// Assemble a two-chunk GLB container.
///
/// The BIN chunk is always present, even when `bin` is empty.
pub fn assemble_glb(json: &[u8], bin: &[u8]) -> Result<Vec<u8>> {
    let json_chunk_length = chunk_length(json.len())?;
    let bin_chunk_length = chunk_length(bin.len())?;

    let total_length = FILE_HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_chunk_length as usize
        + CHUNK_HEADER_LEN
        + bin_chunk_length as usize;
    let total_length_field = u32::try_from(total_length)
        .map_err(|_| ExportError::invalid("glb", format!("{total_length} bytes exceeds 4 GiB")))?;

    let mut glb = Vec::with_capacity(total_length);

    // File header
    glb.extend_from_slice(&GLB_MAGIC);
    glb.extend_from_slice(&GLB_VERSION.to_le_bytes());
    glb.extend_from_slice(&total_length_field.to_le_bytes());

    // JSON chunk, space padded
    glb.extend_from_slice(&json_chunk_length.to_le_bytes());
    glb.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    glb.extend_from_slice(json);
    glb.resize(glb.len() + padding(json.len()), b' ');

    // BIN chunk, zero padded
    glb.extend_from_slice(&bin_chunk_length.to_le_bytes());
    glb.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    glb.extend_from_slice(bin);
    glb.resize(glb.len() + padding(bin.len()), 0);

    debug_assert_eq!(glb.len(), total_length);
    Ok(glb)
}

/// `data:` URI holding `data` base64 encoded
pub fn data_uri(mime_type: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// Re-indent `raw` JSON with two spaces and a trailing newline.
///
/// Unparsable input is returned unchanged (plus the newline).
pub fn pretty_json(raw: &str) -> String {
    let pretty = serde_json::from_str::<serde_json::Value>(raw)
        .and_then(|value| serde_json::to_string_pretty(&value));

    match pretty {
        Ok(mut text) => {
            text.push('\n');
            text
        }
        Err(e) => {
            tracing::warn!("Failed to reformat glTF JSON, outputting raw JSON: {e}");
            format!("{raw}\n")
        }
    }
}

/// What a write produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    pub document: PathBuf,
    /// Sidecar files written
    pub sidecars: Vec<PathBuf>,
    /// URIs referenced by the document whose data was empty and not written
    pub missing: Vec<String>,
}

struct Sidecar<'a> {
    uri: String,
    data: &'a [u8],
}

/// Write a packed asset according to `config`
pub fn write_asset(asset: &Asset, config: &ExportConfig) -> Result<WriteReport> {
    let Some(packed) = asset.packed() else {
        return Err(ExportError::invalid("asset", "accessors have not been packed"));
    };

    let folder = &config.output_folder;
    fs::create_dir_all(folder).map_err(|e| ExportError::io(folder, e))?;

    let mut root = packed.root.clone();
    let mut sidecars: Vec<Sidecar<'_>> = Vec::new();
    let embed = config.mode.embeds_resources();

    if let Some(buffer) = root.buffers.first_mut() {
        buffer.uri = match config.mode {
            OutputMode::Embedded => Some(data_uri("application/octet-stream", &packed.blob)),
            OutputMode::Separate => {
                let uri = config.buffer_uri();
                sidecars.push(Sidecar {
                    uri: uri.clone(),
                    data: &packed.blob,
                });
                Some(uri)
            }
            OutputMode::Glb => None,
        };
    }

    for (json_image, image) in root.images.iter_mut().zip(asset.images()) {
        if embed {
            json_image.uri = Some(data_uri(&image.mime_type, &image.data));
        } else {
            sidecars.push(Sidecar {
                uri: image.uri.clone(),
                data: &image.data,
            });
        }
    }

    let shader_uris: Vec<String> = asset
        .shaders()
        .iter()
        .map(|shader| {
            if embed {
                data_uri(&shader.mime_type, &shader.data)
            } else {
                sidecars.push(Sidecar {
                    uri: shader.uri.clone(),
                    data: &shader.data,
                });
                shader.uri.clone()
            }
        })
        .collect();

    let raw = document_json(&root, &shader_uris)?;
    let document = config.document_path();
    tracing::info!("Writing glTF file to {:?}", document);

    let bytes = match config.mode {
        OutputMode::Glb => assemble_glb(raw.as_bytes(), &packed.blob)?,
        OutputMode::Embedded | OutputMode::Separate => pretty_json(&raw).into_bytes(),
    };
    fs::write(&document, bytes).map_err(|e| ExportError::io(&document, e))?;

    let mut report = WriteReport {
        document,
        ..Default::default()
    };
    let mut failed = write_sidecars(folder, &sidecars, &mut report);

    if let Some(target) = &config.dump_gltf
        && let Err(e) = dump(target, &pretty_json(&raw))
    {
        tracing::error!("Failed to dump glTF JSON to {:?}: {e}", target);
        failed.push(target.clone());
    }

    if failed.is_empty() {
        Ok(report)
    } else {
        Err(ExportError::ArtifactWrites { failed })
    }
}

/// Serialize `root`, listing loose shaders under top-level `extras.shaders`
fn document_json(root: &json::Root, shader_uris: &[String]) -> Result<String> {
    let mut value = serde_json::to_value(root)?;
    if !shader_uris.is_empty()
        && let Some(object) = value.as_object_mut()
    {
        object.insert(
            "extras".to_string(),
            serde_json::json!({ "shaders": shader_uris }),
        );
    }
    Ok(serde_json::to_string(&value)?)
}

fn dump(target: &Path, text: &str) -> Result<()> {
    let content = format!("glTF dump:\n{text}");
    if target == Path::new("-") {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(content.as_bytes())
            .map_err(|e| ExportError::io(target, e))
    } else {
        fs::write(target, content).map_err(|e| ExportError::io(target, e))
    }
}

/// Write every sidecar, attempting all of them; returns the paths that failed
fn write_sidecars(folder: &Path, sidecars: &[Sidecar<'_>], report: &mut WriteReport) -> Vec<PathBuf> {
    let mut failed = Vec::new();

    for sidecar in sidecars {
        if sidecar.data.is_empty() {
            tracing::warn!(
                "No data for '{}'; the document references a file that will be missing",
                sidecar.uri
            );
            report.missing.push(sidecar.uri.clone());
            continue;
        }

        let path = folder.join(&sidecar.uri);
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(&path, sidecar.data));

        match written {
            Ok(()) => {
                tracing::debug!("Wrote {} bytes to {:?}", sidecar.data.len(), path);
                report.sidecars.push(path);
            }
            Err(e) => {
                tracing::error!("Failed to write {:?}: {e}", path);
                failed.push(path);
            }
        }
    }

    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_padding() {
        assert_eq!(padding(7), 1);
        assert_eq!(padding(8), 0);
        assert_eq!(padding(5), 3);
        assert_eq!(padding(0), 0);
    }

    #[test]
    fn test_glb_layout() {
        let json = br#"{"a":1}"#; // 7 bytes
        let bin = [1u8, 2, 3, 4, 5];
        let glb = assemble_glb(json, &bin).unwrap();

        assert_eq!(&glb[0..4], b"glTF");
        assert_eq!(read_u32(&glb, 4), 2);
        assert_eq!(read_u32(&glb, 8) as usize, glb.len());
        assert_eq!(glb.len(), 12 + 8 + 8 + 8 + 8);

        assert_eq!(read_u32(&glb, 12), 8);
        assert_eq!(read_u32(&glb, 16), CHUNK_JSON);
        assert_eq!(glb[20 + 7], b' ');

        assert_eq!(read_u32(&glb, 28), 8);
        assert_eq!(read_u32(&glb, 32), CHUNK_BIN);
        assert_eq!(&glb[36..44], &[1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn test_glb_keeps_empty_bin_chunk() {
        let glb = assemble_glb(b"{}  ", &[]).unwrap();
        assert_eq!(glb.len(), 12 + 8 + 4 + 8);
        assert_eq!(read_u32(&glb, 24), 0);
        assert_eq!(read_u32(&glb, 28), CHUNK_BIN);
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(
            data_uri("application/octet-stream", b"glTF"),
            "data:application/octet-stream;base64,Z2xURg=="
        );
    }

    #[test]
    fn test_pretty_json_indents_with_two_spaces() {
        let pretty = pretty_json(r#"{"asset":{"version":"2.0"}}"#);
        assert_eq!(pretty, "{\n  \"asset\": {\n    \"version\": \"2.0\"\n  }\n}\n");
    }

    #[test]
    fn test_pretty_json_falls_back_to_raw() {
        assert_eq!(pretty_json("{not json"), "{not json\n");
    }
}
