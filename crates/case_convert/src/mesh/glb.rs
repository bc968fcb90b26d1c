//! Minimal glTF 2.0 binary (GLB) writer.
//!
//! One buffer, two buffer views (indices, positions), one primitive.
//! Enough for the viewer template's GLTF loader; no materials, normals are
//! recomputed in the browser.

use serde_json::json;

use super::TriMesh;

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_F32: u32 = 5126;
const COMPONENT_U32: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;

fn pad_to_4(buf: &mut Vec<u8>, fill: u8) {
  while buf.len() % 4 != 0 {
    buf.push(fill);
  }
}

/// Encode a mesh as a self-contained GLB byte blob.
pub fn encode(mesh: &TriMesh) -> Vec<u8> {
  // Binary chunk: indices first, then positions (both 4-byte aligned)
  let mut bin = Vec::with_capacity(mesh.indices.len() * 12 + mesh.positions.len() * 12);
  for tri in &mesh.indices {
    for &i in tri {
      bin.extend_from_slice(&i.to_le_bytes());
    }
  }
  let index_bytes = bin.len();
  let mut min = [f64::INFINITY; 3];
  let mut max = [f64::NEG_INFINITY; 3];
  for p in &mesh.positions {
    let arr = p.to_array();
    for axis in 0..3 {
      min[axis] = min[axis].min(arr[axis]);
      max[axis] = max[axis].max(arr[axis]);
    }
    bin.extend_from_slice(&(arr[0] as f32).to_le_bytes());
    bin.extend_from_slice(&(arr[1] as f32).to_le_bytes());
    bin.extend_from_slice(&(arr[2] as f32).to_le_bytes());
  }
  pad_to_4(&mut bin, 0);

  let min_f32: Vec<f32> = min.iter().map(|&v| v as f32).collect();
  let max_f32: Vec<f32> = max.iter().map(|&v| v as f32).collect();

  let document = json!({
    "asset": { "version": "2.0", "generator": "case_convert" },
    "scene": 0,
    "scenes": [{ "nodes": [0] }],
    "nodes": [{ "mesh": 0 }],
    "meshes": [{
      "primitives": [{
        "attributes": { "POSITION": 1 },
        "indices": 0,
        "mode": 4
      }]
    }],
    "accessors": [
      {
        "bufferView": 0,
        "componentType": COMPONENT_U32,
        "count": mesh.indices.len() * 3,
        "type": "SCALAR"
      },
      {
        "bufferView": 1,
        "componentType": COMPONENT_F32,
        "count": mesh.positions.len(),
        "type": "VEC3",
        "min": min_f32,
        "max": max_f32
      }
    ],
    "bufferViews": [
      {
        "buffer": 0,
        "byteOffset": 0,
        "byteLength": index_bytes,
        "target": TARGET_ELEMENT_ARRAY_BUFFER
      },
      {
        "buffer": 0,
        "byteOffset": index_bytes,
        "byteLength": mesh.positions.len() * 12,
        "target": TARGET_ARRAY_BUFFER
      }
    ],
    "buffers": [{ "byteLength": bin.len() }]
  });

  let mut json_chunk = serde_json::to_vec(&document).expect("glb json serialization");
  pad_to_4(&mut json_chunk, b' ');

  let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
  let mut out = Vec::with_capacity(total);
  out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
  out.extend_from_slice(&GLB_VERSION.to_le_bytes());
  out.extend_from_slice(&(total as u32).to_le_bytes());
  out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
  out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
  out.extend_from_slice(&json_chunk);
  out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
  out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
  out.extend_from_slice(&bin);
  out
}

#[cfg(test)]
#[path = "glb_test.rs"]
mod glb_test;
