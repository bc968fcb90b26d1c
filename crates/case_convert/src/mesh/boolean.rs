//! Cross-arch surface intersection ("bite" synthesis).
//!
//! Each side is merged and welded, then every triangle is classified
//! against the opposite side: a triangle whose centroid lies inside the
//! other surface (parity ray cast), or within `tolerance` of it, belongs
//! to the contact region. The union of kept triangles from both sides is
//! the bite surface. An empty result is a legitimate no-contact outcome.

use std::path::{Path, PathBuf};

use glam::DVec3;
use rayon::prelude::*;
use tracing::{debug, warn};

use super::{merge_files, write_mesh, TriMesh};

/// Output filename; downstream group maps key on the `_reduced` alias.
pub const BITE_FILENAME: &str = "BITE_reduced.stl";

const MAX_LEAF_TRIANGLES: usize = 8;

#[derive(Clone, Copy, Debug)]
struct Aabb {
  min: DVec3,
  max: DVec3,
}

impl Aabb {
  fn empty() -> Aabb {
    Aabb {
      min: DVec3::splat(f64::INFINITY),
      max: DVec3::splat(f64::NEG_INFINITY),
    }
  }

  fn grow(&mut self, p: DVec3) {
    self.min = self.min.min(p);
    self.max = self.max.max(p);
  }

  fn merge(&mut self, other: &Aabb) {
    self.min = self.min.min(other.min);
    self.max = self.max.max(other.max);
  }

  fn dist_sq(&self, p: DVec3) -> f64 {
    let clamped = p.clamp(self.min, self.max);
    (p - clamped).length_squared()
  }

  /// Slab test for a ray `origin + t * dir`, t >= 0.
  fn hit_by_ray(&self, origin: DVec3, inv_dir: DVec3) -> bool {
    let t0 = (self.min - origin) * inv_dir;
    let t1 = (self.max - origin) * inv_dir;
    let t_min = t0.min(t1);
    let t_max = t0.max(t1);
    let enter = t_min.x.max(t_min.y).max(t_min.z);
    let exit = t_max.x.min(t_max.y).min(t_max.z);
    exit >= enter.max(0.0)
  }
}

enum BvhNode {
  Leaf {
    bounds: Aabb,
    triangles: Vec<u32>,
  },
  Inner {
    bounds: Aabb,
    left: Box<BvhNode>,
    right: Box<BvhNode>,
  },
}

impl BvhNode {
  fn bounds(&self) -> &Aabb {
    match self {
      BvhNode::Leaf { bounds, .. } => bounds,
      BvhNode::Inner { bounds, .. } => bounds,
    }
  }
}

/// Median-split AABB tree over mesh triangles.
struct Bvh<'a> {
  mesh: &'a TriMesh,
  root: BvhNode,
}

impl<'a> Bvh<'a> {
  fn build(mesh: &'a TriMesh) -> Bvh<'a> {
    let mut items: Vec<(u32, DVec3)> = (0..mesh.triangle_count() as u32)
      .map(|f| {
        let [a, b, c] = mesh.triangle(f as usize);
        (f, (a + b + c) / 3.0)
      })
      .collect();
    let root = Self::build_node(mesh, &mut items);
    Bvh { mesh, root }
  }

  fn node_bounds(mesh: &TriMesh, items: &[(u32, DVec3)]) -> Aabb {
    let mut bounds = Aabb::empty();
    for &(f, _) in items {
      for corner in mesh.triangle(f as usize) {
        bounds.grow(corner);
      }
    }
    bounds
  }

  fn build_node(mesh: &TriMesh, items: &mut [(u32, DVec3)]) -> BvhNode {
    let bounds = Self::node_bounds(mesh, items);
    if items.len() <= MAX_LEAF_TRIANGLES {
      return BvhNode::Leaf {
        bounds,
        triangles: items.iter().map(|&(f, _)| f).collect(),
      };
    }

    let extent = bounds.max - bounds.min;
    let axis = if extent.x >= extent.y && extent.x >= extent.z {
      0
    } else if extent.y >= extent.z {
      1
    } else {
      2
    };
    let mid = items.len() / 2;
    items.select_nth_unstable_by(mid, |a, b| a.1[axis].total_cmp(&b.1[axis]));
    let (left_items, right_items) = items.split_at_mut(mid);

    let left = Box::new(Self::build_node(mesh, left_items));
    let right = Box::new(Self::build_node(mesh, right_items));
    let mut bounds = *left.bounds();
    bounds.merge(right.bounds());
    BvhNode::Inner {
      bounds,
      left,
      right,
    }
  }

  /// Count ray crossings (parity containment).
  fn count_hits(&self, origin: DVec3, dir: DVec3) -> usize {
    let inv_dir = DVec3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
    let mut stack = vec![&self.root];
    let mut hits = 0;
    while let Some(node) = stack.pop() {
      if !node.bounds().hit_by_ray(origin, inv_dir) {
        continue;
      }
      match node {
        BvhNode::Leaf { triangles, .. } => {
          for &f in triangles {
            let corners = self.mesh.triangle(f as usize);
            if ray_hits_triangle(origin, dir, corners) {
              hits += 1;
            }
          }
        }
        BvhNode::Inner { left, right, .. } => {
          stack.push(left);
          stack.push(right);
        }
      }
    }
    hits
  }

  /// Squared distance from a point to the surface, pruned by node bounds.
  fn dist_sq(&self, p: DVec3) -> f64 {
    let mut best = f64::INFINITY;
    let mut stack = vec![&self.root];
    while let Some(node) = stack.pop() {
      if node.bounds().dist_sq(p) >= best {
        continue;
      }
      match node {
        BvhNode::Leaf { triangles, .. } => {
          for &f in triangles {
            let d = point_triangle_dist_sq(p, self.mesh.triangle(f as usize));
            best = best.min(d);
          }
        }
        BvhNode::Inner { left, right, .. } => {
          // Visit the nearer child first for tighter pruning
          let dl = left.bounds().dist_sq(p);
          let dr = right.bounds().dist_sq(p);
          if dl <= dr {
            stack.push(right);
            stack.push(left);
          } else {
            stack.push(left);
            stack.push(right);
          }
        }
      }
    }
    best
  }

  /// Inside test with a surface-distance slack.
  fn contains(&self, p: DVec3, tolerance: f64) -> bool {
    if self.dist_sq(p) <= tolerance * tolerance {
      return true;
    }
    // Skewed fixed direction dodges axis-aligned edge grazing
    let dir = DVec3::new(0.285_714_3, 0.428_571_4, 0.857_142_9).normalize();
    self.count_hits(p, dir) % 2 == 1
  }
}

/// Möller-Trumbore with a small epsilon; grazing hits count once.
fn ray_hits_triangle(origin: DVec3, dir: DVec3, [a, b, c]: [DVec3; 3]) -> bool {
  const EPS: f64 = 1e-12;
  let e1 = b - a;
  let e2 = c - a;
  let pvec = dir.cross(e2);
  let det = e1.dot(pvec);
  if det.abs() < EPS {
    return false;
  }
  let inv_det = 1.0 / det;
  let tvec = origin - a;
  let u = tvec.dot(pvec) * inv_det;
  if !(0.0..=1.0).contains(&u) {
    return false;
  }
  let qvec = tvec.cross(e1);
  let v = dir.dot(qvec) * inv_det;
  if v < 0.0 || u + v > 1.0 {
    return false;
  }
  e2.dot(qvec) * inv_det > EPS
}

fn point_triangle_dist_sq(p: DVec3, [a, b, c]: [DVec3; 3]) -> f64 {
  // Ericson, Real-Time Collision Detection 5.1.5
  let ab = b - a;
  let ac = c - a;
  let ap = p - a;
  let d1 = ab.dot(ap);
  let d2 = ac.dot(ap);
  if d1 <= 0.0 && d2 <= 0.0 {
    return ap.length_squared();
  }

  let bp = p - b;
  let d3 = ab.dot(bp);
  let d4 = ac.dot(bp);
  if d3 >= 0.0 && d4 <= d3 {
    return bp.length_squared();
  }

  let vc = d1 * d4 - d3 * d2;
  if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
    let v = d1 / (d1 - d3);
    return (ap - ab * v).length_squared();
  }

  let cp = p - c;
  let d5 = ab.dot(cp);
  let d6 = ac.dot(cp);
  if d6 >= 0.0 && d5 <= d6 {
    return cp.length_squared();
  }

  let vb = d5 * d2 - d1 * d6;
  if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
    let w = d2 / (d2 - d6);
    return (ap - ac * w).length_squared();
  }

  let va = d3 * d6 - d5 * d4;
  if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
    let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
    return (bp - (c - b) * w).length_squared();
  }

  let denom = 1.0 / (va + vb + vc);
  let v = vb * denom;
  let w = vc * denom;
  (ap - ab * v - ac * w).length_squared()
}

/// Triangles of `mesh` whose centroid lies inside `other`.
fn contact_triangles(mesh: &TriMesh, other: &Bvh, tolerance: f64) -> TriMesh {
  let kept: Vec<[DVec3; 3]> = (0..mesh.triangle_count())
    .into_par_iter()
    .filter_map(|f| {
      let corners = mesh.triangle(f);
      let centroid = (corners[0] + corners[1] + corners[2]) / 3.0;
      other.contains(centroid, tolerance).then_some(corners)
    })
    .collect();

  let mut out = TriMesh::new();
  for corners in kept {
    let base = out.positions.len() as u32;
    out.positions.extend_from_slice(&corners);
    out.indices.push([base, base + 1, base + 2]);
  }
  out
}

/// Compute the contact surface between two mesh sets and write it as
/// binary STL. `None` means no contact (or a locally-recovered failure).
pub fn intersect(
  set_a: &[PathBuf],
  set_b: &[PathBuf],
  out_dir: &Path,
  tolerance: f64,
) -> Option<PathBuf> {
  let a = merge_files(set_a)?;
  let b = merge_files(set_b)?;

  let contact = intersect_meshes(&a, &b, tolerance);
  if contact.is_empty() {
    debug!("no cross-arch contact found");
    return None;
  }

  let out_path = out_dir.join(BITE_FILENAME);
  match write_mesh(&out_path, &contact.weld()) {
    Ok(()) => Some(out_path),
    Err(err) => {
      warn!(%err, "failed to write bite mesh");
      None
    }
  }
}

/// Pure-mesh variant of `intersect` for direct use and tests.
pub fn intersect_meshes(a: &TriMesh, b: &TriMesh, tolerance: f64) -> TriMesh {
  let bvh_a = Bvh::build(a);
  let bvh_b = Bvh::build(b);

  let mut contact = contact_triangles(a, &bvh_b, tolerance);
  let from_b = contact_triangles(b, &bvh_a, tolerance);
  contact.append(&from_b);
  contact
}

#[cfg(test)]
#[path = "boolean_test.rs"]
mod boolean_test;
