//! Quadric error metric decimation (Garland-Heckbert edge collapse).
//!
//! Per-vertex quadrics accumulate squared plane distances of incident
//! faces; edges collapse cheapest-first through a lazy-deletion binary
//! heap. Collapses that would flip a surviving face normal are rejected.
//! The face target is a hint: the loop stops early when no legal collapse
//! remains.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use glam::DVec3;

use super::TriMesh;

/// Symmetric 4x4 quadric, upper triangle storage.
#[derive(Clone, Copy, Debug, Default)]
struct Quadric {
  m: [f64; 10],
}

impl Quadric {
  /// Quadric of the plane through a triangle (normalized normal, offset d).
  fn from_plane(n: DVec3, d: f64) -> Quadric {
    let (a, b, c) = (n.x, n.y, n.z);
    Quadric {
      m: [
        a * a,
        a * b,
        a * c,
        a * d,
        b * b,
        b * c,
        b * d,
        c * c,
        c * d,
        d * d,
      ],
    }
  }

  fn add(&mut self, other: &Quadric) {
    for i in 0..10 {
      self.m[i] += other.m[i];
    }
  }

  /// Squared-distance error of a candidate position.
  fn error(&self, p: DVec3) -> f64 {
    let (x, y, z) = (p.x, p.y, p.z);
    let m = &self.m;
    m[0] * x * x
      + 2.0 * m[1] * x * y
      + 2.0 * m[2] * x * z
      + 2.0 * m[3] * x
      + m[4] * y * y
      + 2.0 * m[5] * y * z
      + 2.0 * m[6] * y
      + m[7] * z * z
      + 2.0 * m[8] * z
      + m[9]
  }
}

/// Heap entry; min-cost first via reversed Ord.
struct Candidate {
  cost: f64,
  u: u32,
  v: u32,
  position: DVec3,
  versions: (u32, u32),
}

impl PartialEq for Candidate {
  fn eq(&self, other: &Self) -> bool {
    self.cost == other.cost
  }
}
impl Eq for Candidate {}
impl PartialOrd for Candidate {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
impl Ord for Candidate {
  fn cmp(&self, other: &Self) -> Ordering {
    // Reversed for a min-heap
    other.cost.total_cmp(&self.cost)
  }
}

struct Collapser {
  positions: Vec<DVec3>,
  faces: Vec<[u32; 3]>,
  face_alive: Vec<bool>,
  vertex_faces: Vec<Vec<u32>>,
  quadrics: Vec<Quadric>,
  versions: Vec<u32>,
  live_faces: usize,
  heap: BinaryHeap<Candidate>,
}

impl Collapser {
  fn new(mesh: &TriMesh) -> Collapser {
    let vertex_count = mesh.positions.len();
    let mut vertex_faces = vec![Vec::new(); vertex_count];
    let mut quadrics = vec![Quadric::default(); vertex_count];

    for (f, tri) in mesh.indices.iter().enumerate() {
      let [a, b, c] = *tri;
      let pa = mesh.positions[a as usize];
      let pb = mesh.positions[b as usize];
      let pc = mesh.positions[c as usize];
      let n = (pb - pa).cross(pc - pa);
      let len = n.length();
      if len > 1e-12 {
        let n = n / len;
        let q = Quadric::from_plane(n, -n.dot(pa));
        quadrics[a as usize].add(&q);
        quadrics[b as usize].add(&q);
        quadrics[c as usize].add(&q);
      }
      for &v in tri {
        vertex_faces[v as usize].push(f as u32);
      }
    }

    let live_faces = mesh.indices.len();
    let mut collapser = Collapser {
      positions: mesh.positions.clone(),
      faces: mesh.indices.clone(),
      face_alive: vec![true; live_faces],
      vertex_faces,
      quadrics,
      versions: vec![0; vertex_count],
      live_faces,
      heap: BinaryHeap::new(),
    };

    let mut seen = HashSet::new();
    for tri in mesh.indices.iter() {
      for (u, v) in [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])] {
        let key = (u.min(v), u.max(v));
        if seen.insert(key) {
          collapser.push_candidate(key.0, key.1);
        }
      }
    }
    collapser
  }

  fn push_candidate(&mut self, u: u32, v: u32) {
    let mut q = self.quadrics[u as usize];
    q.add(&self.quadrics[v as usize]);
    let pu = self.positions[u as usize];
    let pv = self.positions[v as usize];
    let mid = (pu + pv) * 0.5;

    let mut best = pu;
    let mut best_cost = q.error(pu);
    for candidate in [pv, mid] {
      let cost = q.error(candidate);
      if cost < best_cost {
        best_cost = cost;
        best = candidate;
      }
    }

    self.heap.push(Candidate {
      cost: best_cost,
      u,
      v,
      position: best,
      versions: (self.versions[u as usize], self.versions[v as usize]),
    });
  }

  /// True when moving `moved` to `position` flips any surviving face not
  /// incident to the collapsing edge itself.
  fn would_flip(&self, moved: u32, other: u32, position: DVec3) -> bool {
    for &f in &self.vertex_faces[moved as usize] {
      if !self.face_alive[f as usize] {
        continue;
      }
      let tri = self.faces[f as usize];
      if tri.contains(&other) {
        continue; // face dies with the collapse
      }
      let corners = tri.map(|i| self.positions[i as usize]);
      let before = (corners[1] - corners[0]).cross(corners[2] - corners[0]);
      let moved_corners = tri.map(|i| {
        if i == moved {
          position
        } else {
          self.positions[i as usize]
        }
      });
      let after =
        (moved_corners[1] - moved_corners[0]).cross(moved_corners[2] - moved_corners[0]);
      if before.dot(after) <= 1e-12 {
        return true;
      }
    }
    false
  }

  fn collapse(&mut self, cand: &Candidate) -> bool {
    let (u, v) = (cand.u, cand.v);
    if self.would_flip(u, v, cand.position) || self.would_flip(v, u, cand.position) {
      return false;
    }

    // v folds into u at the chosen position
    self.positions[u as usize] = cand.position;
    let q_v = self.quadrics[v as usize];
    self.quadrics[u as usize].add(&q_v);

    let v_faces = std::mem::take(&mut self.vertex_faces[v as usize]);
    for f in v_faces {
      if !self.face_alive[f as usize] {
        continue;
      }
      let tri = &mut self.faces[f as usize];
      if tri.contains(&u) {
        self.face_alive[f as usize] = false;
        self.live_faces -= 1;
      } else {
        for i in tri.iter_mut() {
          if *i == v {
            *i = u;
          }
        }
        self.vertex_faces[u as usize].push(f);
      }
    }

    self.versions[u as usize] += 1;
    self.versions[v as usize] += 1;

    // Refresh candidates around the merged vertex
    let mut neighbors = HashSet::new();
    for &f in &self.vertex_faces[u as usize] {
      if self.face_alive[f as usize] {
        for &i in &self.faces[f as usize] {
          if i != u {
            neighbors.insert(i);
          }
        }
      }
    }
    for n in neighbors {
      self.push_candidate(u, n);
    }
    true
  }

  fn run(&mut self, target_faces: usize) {
    while self.live_faces > target_faces {
      let Some(cand) = self.heap.pop() else {
        break;
      };
      if self.versions[cand.u as usize] != cand.versions.0
        || self.versions[cand.v as usize] != cand.versions.1
      {
        continue; // stale entry
      }
      self.collapse(&cand);
    }
  }

  fn into_mesh(self) -> TriMesh {
    let mut remap = vec![u32::MAX; self.positions.len()];
    let mut out = TriMesh::new();
    for (f, tri) in self.faces.iter().enumerate() {
      if !self.face_alive[f] {
        continue;
      }
      let mut mapped = [0u32; 3];
      for (slot, &i) in mapped.iter_mut().zip(tri) {
        if remap[i as usize] == u32::MAX {
          remap[i as usize] = out.positions.len() as u32;
          out.positions.push(self.positions[i as usize]);
        }
        *slot = remap[i as usize];
      }
      out.indices.push(mapped);
    }
    out
  }
}

/// Decimate a welded mesh down to roughly `target_faces` triangles.
///
/// Returns the input unchanged when it is already at or below the target.
pub fn decimate(mesh: &TriMesh, target_faces: usize) -> TriMesh {
  if mesh.triangle_count() <= target_faces || mesh.is_empty() {
    return mesh.clone();
  }
  let mut collapser = Collapser::new(mesh);
  collapser.run(target_faces);
  collapser.into_mesh()
}

#[cfg(test)]
#[path = "decimate_test.rs"]
mod decimate_test;
