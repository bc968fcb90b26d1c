//! STL codec: binary and ASCII read, binary write.
//!
//! STL carries a raw triangle soup; readers return unwelded geometry and
//! callers weld when they need connectivity.

use glam::DVec3;

use super::TriMesh;

const BINARY_HEADER: usize = 80;
const TRIANGLE_RECORD: usize = 50;

/// Read an STL file from bytes. ASCII files start with `solid` and must
/// also parse as text; everything else is treated as binary.
pub fn read(bytes: &[u8]) -> std::result::Result<TriMesh, String> {
  if looks_ascii(bytes) {
    read_ascii(bytes)
  } else {
    read_binary(bytes)
  }
}

/// `solid` prefixes also appear in binary headers written by sloppy
/// exporters, so the record count has to disagree before we trust ASCII.
fn looks_ascii(bytes: &[u8]) -> bool {
  if !bytes.starts_with(b"solid") {
    return false;
  }
  if bytes.len() < BINARY_HEADER + 4 {
    return true;
  }
  let count = u32::from_le_bytes([
    bytes[BINARY_HEADER],
    bytes[BINARY_HEADER + 1],
    bytes[BINARY_HEADER + 2],
    bytes[BINARY_HEADER + 3],
  ]) as usize;
  bytes.len() != BINARY_HEADER + 4 + count * TRIANGLE_RECORD
}

fn read_binary(bytes: &[u8]) -> std::result::Result<TriMesh, String> {
  if bytes.len() < BINARY_HEADER + 4 {
    return Err("binary stl truncated before count".into());
  }
  let count = u32::from_le_bytes([
    bytes[BINARY_HEADER],
    bytes[BINARY_HEADER + 1],
    bytes[BINARY_HEADER + 2],
    bytes[BINARY_HEADER + 3],
  ]) as usize;
  let need = BINARY_HEADER + 4 + count * TRIANGLE_RECORD;
  if bytes.len() < need {
    return Err(format!(
      "binary stl truncated: {} bytes for {} triangles",
      bytes.len(),
      count
    ));
  }

  let mut mesh = TriMesh::new();
  mesh.positions.reserve(count * 3);
  mesh.indices.reserve(count);

  let mut offset = BINARY_HEADER + 4;
  for _ in 0..count {
    // 12 bytes normal (ignored), then 3 vertices
    let mut vertex_off = offset + 12;
    let base = mesh.positions.len() as u32;
    for _ in 0..3 {
      mesh.positions.push(read_vec3_f32(bytes, vertex_off));
      vertex_off += 12;
    }
    mesh.indices.push([base, base + 1, base + 2]);
    offset += TRIANGLE_RECORD;
  }
  Ok(mesh)
}

fn read_vec3_f32(bytes: &[u8], offset: usize) -> DVec3 {
  let f = |o: usize| {
    f32::from_le_bytes([bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]) as f64
  };
  DVec3::new(f(offset), f(offset + 4), f(offset + 8))
}

fn read_ascii(bytes: &[u8]) -> std::result::Result<TriMesh, String> {
  let text = std::str::from_utf8(bytes).map_err(|_| "ascii stl is not utf-8".to_string())?;
  let mut mesh = TriMesh::new();
  let mut pending: Vec<DVec3> = Vec::with_capacity(3);

  for line in text.lines() {
    let mut tokens = line.split_whitespace();
    if tokens.next() != Some("vertex") {
      continue;
    }
    let mut coords = [0.0f64; 3];
    for c in &mut coords {
      *c = tokens
        .next()
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| format!("bad vertex line: {line}"))?;
    }
    pending.push(DVec3::from_array(coords));
    if pending.len() == 3 {
      let base = mesh.positions.len() as u32;
      mesh.positions.extend_from_slice(&pending);
      mesh.indices.push([base, base + 1, base + 2]);
      pending.clear();
    }
  }

  if !pending.is_empty() {
    return Err("ascii stl ends mid-facet".into());
  }
  Ok(mesh)
}

/// Serialize as binary STL with recomputed facet normals.
pub fn write(mesh: &TriMesh) -> Vec<u8> {
  let count = mesh.triangle_count();
  let mut out = Vec::with_capacity(BINARY_HEADER + 4 + count * TRIANGLE_RECORD);
  out.extend_from_slice(&[0u8; BINARY_HEADER]);
  out.extend_from_slice(&(count as u32).to_le_bytes());

  for face in 0..count {
    let normal = mesh.face_normal(face).normalize_or_zero();
    push_vec3_f32(&mut out, normal);
    for corner in mesh.triangle(face) {
      push_vec3_f32(&mut out, corner);
    }
    out.extend_from_slice(&0u16.to_le_bytes()); // attribute byte count
  }
  out
}

fn push_vec3_f32(out: &mut Vec<u8>, v: DVec3) {
  out.extend_from_slice(&(v.x as f32).to_le_bytes());
  out.extend_from_slice(&(v.y as f32).to_le_bytes());
  out.extend_from_slice(&(v.z as f32).to_le_bytes());
}
