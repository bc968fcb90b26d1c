//! PLY codec: header-driven ascii / binary_little_endian read, binary write.
//!
//! Only `x`/`y`/`z` vertex properties and the face index list are kept;
//! extra per-vertex properties (normals, colors, quality) are skipped with
//! correct sizes so scanner output from either vendor loads.

use glam::DVec3;

use super::TriMesh;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
  Ascii,
  BinaryLittleEndian,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scalar {
  I8,
  U8,
  I16,
  U16,
  I32,
  U32,
  F32,
  F64,
}

impl Scalar {
  fn parse(token: &str) -> Option<Scalar> {
    Some(match token {
      "char" | "int8" => Scalar::I8,
      "uchar" | "uint8" => Scalar::U8,
      "short" | "int16" => Scalar::I16,
      "ushort" | "uint16" => Scalar::U16,
      "int" | "int32" => Scalar::I32,
      "uint" | "uint32" => Scalar::U32,
      "float" | "float32" => Scalar::F32,
      "double" | "float64" => Scalar::F64,
      _ => return None,
    })
  }

  fn size(self) -> usize {
    match self {
      Scalar::I8 | Scalar::U8 => 1,
      Scalar::I16 | Scalar::U16 => 2,
      Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
      Scalar::F64 => 8,
    }
  }

  fn read_f64(self, bytes: &[u8]) -> f64 {
    match self {
      Scalar::I8 => bytes[0] as i8 as f64,
      Scalar::U8 => bytes[0] as f64,
      Scalar::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
      Scalar::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
      Scalar::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
      Scalar::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
      Scalar::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
      Scalar::F64 => f64::from_le_bytes([
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
      ]),
    }
  }
}

#[derive(Clone, Debug)]
enum Property {
  Scalar { name: String, ty: Scalar },
  List { count_ty: Scalar, item_ty: Scalar },
}

#[derive(Clone, Debug)]
struct Element {
  name: String,
  count: usize,
  properties: Vec<Property>,
}

struct Header {
  format: Format,
  elements: Vec<Element>,
  body_offset: usize,
}

fn parse_header(bytes: &[u8]) -> std::result::Result<Header, String> {
  let end = find_header_end(bytes).ok_or("missing end_header")?;
  let text =
    std::str::from_utf8(&bytes[..end.0]).map_err(|_| "ply header is not utf-8".to_string())?;

  let mut lines = text.lines();
  if lines.next().map(str::trim) != Some("ply") {
    return Err("missing ply magic".into());
  }

  let mut format = None;
  let mut elements: Vec<Element> = Vec::new();

  for line in lines {
    let mut tokens = line.split_whitespace();
    match tokens.next() {
      Some("format") => {
        format = Some(match tokens.next() {
          Some("ascii") => Format::Ascii,
          Some("binary_little_endian") => Format::BinaryLittleEndian,
          other => return Err(format!("unsupported ply format {other:?}")),
        });
      }
      Some("element") => {
        let name = tokens.next().ok_or("element without name")?.to_string();
        let count: usize = tokens
          .next()
          .and_then(|t| t.parse().ok())
          .ok_or("element without count")?;
        elements.push(Element {
          name,
          count,
          properties: Vec::new(),
        });
      }
      Some("property") => {
        let element = elements.last_mut().ok_or("property before element")?;
        let first = tokens.next().ok_or("property without type")?;
        if first == "list" {
          let count_ty = Scalar::parse(tokens.next().ok_or("list without count type")?)
            .ok_or("bad list count type")?;
          let item_ty = Scalar::parse(tokens.next().ok_or("list without item type")?)
            .ok_or("bad list item type")?;
          element.properties.push(Property::List { count_ty, item_ty });
        } else {
          let ty = Scalar::parse(first).ok_or_else(|| format!("bad scalar type {first}"))?;
          let name = tokens.next().ok_or("property without name")?.to_string();
          element.properties.push(Property::Scalar { name, ty });
        }
      }
      _ => {} // comment, obj_info, end_header handled by find_header_end
    }
  }

  Ok(Header {
    format: format.ok_or("missing format line")?,
    elements,
    body_offset: end.1,
  })
}

/// Locate `end_header` and return (offset of its line start, offset just
/// past its newline).
fn find_header_end(bytes: &[u8]) -> Option<(usize, usize)> {
  let needle = b"end_header";
  let limit = bytes.len().min(64 * 1024);
  for i in 0..limit.saturating_sub(needle.len()) {
    if &bytes[i..i + needle.len()] == needle {
      let mut j = i + needle.len();
      while j < bytes.len() && bytes[j] != b'\n' {
        j += 1;
      }
      return Some((i, (j + 1).min(bytes.len())));
    }
  }
  None
}

pub fn read(bytes: &[u8]) -> std::result::Result<TriMesh, String> {
  let header = parse_header(bytes)?;
  match header.format {
    Format::Ascii => read_ascii(bytes, &header),
    Format::BinaryLittleEndian => read_binary(bytes, &header),
  }
}

fn xyz_slots(element: &Element) -> std::result::Result<[usize; 3], String> {
  let mut slots = [usize::MAX; 3];
  for (i, prop) in element.properties.iter().enumerate() {
    if let Property::Scalar { name, .. } = prop {
      match name.as_str() {
        "x" => slots[0] = i,
        "y" => slots[1] = i,
        "z" => slots[2] = i,
        _ => {}
      }
    }
  }
  if slots.contains(&usize::MAX) {
    return Err("vertex element lacks x/y/z".into());
  }
  Ok(slots)
}

fn read_binary(bytes: &[u8], header: &Header) -> std::result::Result<TriMesh, String> {
  let mut mesh = TriMesh::new();
  let mut offset = header.body_offset;

  for element in &header.elements {
    if element.name == "vertex" {
      let slots = xyz_slots(element)?;
      mesh.positions.reserve(element.count);
      for _ in 0..element.count {
        let mut coords = [0.0f64; 3];
        for (i, prop) in element.properties.iter().enumerate() {
          match prop {
            Property::Scalar { ty, .. } => {
              let size = ty.size();
              if offset + size > bytes.len() {
                return Err("ply vertex data truncated".into());
              }
              let value = ty.read_f64(&bytes[offset..]);
              if let Some(axis) = slots.iter().position(|&s| s == i) {
                coords[axis] = value;
              }
              offset += size;
            }
            Property::List { count_ty, item_ty } => {
              // Unusual but legal: skip a list property on vertices
              if offset + count_ty.size() > bytes.len() {
                return Err("ply vertex data truncated".into());
              }
              let n = count_ty.read_f64(&bytes[offset..]) as usize;
              offset += count_ty.size() + n * item_ty.size();
            }
          }
        }
        mesh.positions.push(DVec3::from_array(coords));
      }
    } else if element.name == "face" {
      for _ in 0..element.count {
        for prop in &element.properties {
          match prop {
            Property::List { count_ty, item_ty } => {
              if offset + count_ty.size() > bytes.len() {
                return Err("ply face data truncated".into());
              }
              let n = count_ty.read_f64(&bytes[offset..]) as usize;
              offset += count_ty.size();
              let mut poly = Vec::with_capacity(n);
              for _ in 0..n {
                if offset + item_ty.size() > bytes.len() {
                  return Err("ply face data truncated".into());
                }
                poly.push(item_ty.read_f64(&bytes[offset..]) as u32);
                offset += item_ty.size();
              }
              push_fan(&mut mesh, &poly);
            }
            Property::Scalar { ty, .. } => {
              offset += ty.size();
            }
          }
        }
      }
    } else {
      // Skip unknown fixed-size elements; bail on lists we cannot size
      for _ in 0..element.count {
        for prop in &element.properties {
          match prop {
            Property::Scalar { ty, .. } => offset += ty.size(),
            Property::List { count_ty, item_ty } => {
              if offset + count_ty.size() > bytes.len() {
                return Err("ply element data truncated".into());
              }
              let n = count_ty.read_f64(&bytes[offset..]) as usize;
              offset += count_ty.size() + n * item_ty.size();
            }
          }
        }
      }
    }
  }
  Ok(mesh)
}

fn read_ascii(bytes: &[u8], header: &Header) -> std::result::Result<TriMesh, String> {
  let text = std::str::from_utf8(&bytes[header.body_offset..])
    .map_err(|_| "ascii ply body is not utf-8".to_string())?;
  let mut tokens = text.split_whitespace();
  let mut next_f64 = |what: &str| -> std::result::Result<f64, String> {
    tokens
      .next()
      .and_then(|t| t.parse().ok())
      .ok_or_else(|| format!("ply body ended while reading {what}"))
  };

  let mut mesh = TriMesh::new();
  for element in &header.elements {
    if element.name == "vertex" {
      let slots = xyz_slots(element)?;
      for _ in 0..element.count {
        let mut coords = [0.0f64; 3];
        for (i, prop) in element.properties.iter().enumerate() {
          match prop {
            Property::Scalar { .. } => {
              let value = next_f64("vertex")?;
              if let Some(axis) = slots.iter().position(|&s| s == i) {
                coords[axis] = value;
              }
            }
            Property::List { .. } => {
              let n = next_f64("vertex list")? as usize;
              for _ in 0..n {
                next_f64("vertex list item")?;
              }
            }
          }
        }
        mesh.positions.push(DVec3::from_array(coords));
      }
    } else {
      for _ in 0..element.count {
        for prop in &element.properties {
          match prop {
            Property::Scalar { .. } => {
              next_f64("scalar")?;
            }
            Property::List { .. } => {
              let n = next_f64("list count")? as usize;
              let mut poly = Vec::with_capacity(n);
              for _ in 0..n {
                poly.push(next_f64("list item")? as u32);
              }
              if element.name == "face" {
                push_fan(&mut mesh, &poly);
              }
            }
          }
        }
      }
    }
  }
  Ok(mesh)
}

/// Triangulate a polygon index list as a fan.
fn push_fan(mesh: &mut TriMesh, poly: &[u32]) {
  for i in 1..poly.len().saturating_sub(1) {
    mesh.indices.push([poly[0], poly[i], poly[i + 1]]);
  }
}

/// Serialize as binary_little_endian PLY with float positions.
pub fn write(mesh: &TriMesh) -> Vec<u8> {
  let header = format!(
    "ply\nformat binary_little_endian 1.0\nelement vertex {}\n\
     property float x\nproperty float y\nproperty float z\n\
     element face {}\nproperty list uchar int vertex_indices\nend_header\n",
    mesh.vertex_count(),
    mesh.triangle_count()
  );

  let mut out = header.into_bytes();
  out.reserve(mesh.vertex_count() * 12 + mesh.triangle_count() * 13);
  for p in &mesh.positions {
    out.extend_from_slice(&(p.x as f32).to_le_bytes());
    out.extend_from_slice(&(p.y as f32).to_le_bytes());
    out.extend_from_slice(&(p.z as f32).to_le_bytes());
  }
  for t in &mesh.indices {
    out.push(3u8);
    for &i in t {
      out.extend_from_slice(&(i as i32).to_le_bytes());
    }
  }
  out
}
