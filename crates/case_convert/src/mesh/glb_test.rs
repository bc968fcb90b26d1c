use glam::DVec3;

use super::*;

fn triangle() -> TriMesh {
  TriMesh {
    positions: vec![
      DVec3::new(0.0, 0.0, 0.0),
      DVec3::new(1.0, 0.0, 0.0),
      DVec3::new(0.0, 1.0, 0.0),
    ],
    indices: vec![[0, 1, 2]],
  }
}

#[test]
fn test_glb_magic_and_length() {
  let glb = encode(&triangle());
  assert_eq!(&glb[0..4], b"glTF");
  assert_eq!(u32::from_le_bytes(glb[4..8].try_into().unwrap()), 2);
  let total = u32::from_le_bytes(glb[8..12].try_into().unwrap()) as usize;
  assert_eq!(total, glb.len());
}

#[test]
fn test_glb_chunks_are_aligned() {
  let glb = encode(&triangle());
  let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
  assert_eq!(json_len % 4, 0);
  assert_eq!(&glb[16..20], b"JSON");

  let bin_header = 12 + 8 + json_len;
  let bin_len =
    u32::from_le_bytes(glb[bin_header..bin_header + 4].try_into().unwrap()) as usize;
  assert_eq!(bin_len % 4, 0);
  assert_eq!(&glb[bin_header + 4..bin_header + 8], b"BIN\0");
  assert_eq!(bin_header + 8 + bin_len, glb.len());
}

#[test]
fn test_glb_json_describes_geometry() {
  let mesh = triangle();
  let glb = encode(&mesh);
  let json_len = u32::from_le_bytes(glb[12..16].try_into().unwrap()) as usize;
  let doc: serde_json::Value = serde_json::from_slice(&glb[20..20 + json_len]).unwrap();

  assert_eq!(doc["asset"]["version"], "2.0");
  assert_eq!(doc["accessors"][0]["count"], 3); // indices
  assert_eq!(doc["accessors"][1]["count"], 3); // positions
  assert_eq!(doc["accessors"][1]["type"], "VEC3");
  assert_eq!(
    doc["buffers"][0]["byteLength"].as_u64().unwrap() as usize % 4,
    0
  );
}
