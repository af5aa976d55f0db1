//! Test utilities for pipeline tests.
//!
//! Mesh fixtures built through the indexed-buffer adapter, so shared source
//! vertices carry identical attributes the way a real mesh does.

use glam::{Affine3A, Vec3, Vec4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::frustum::Frustum;
use crate::source::triangles_from_buffers;
use crate::subdivide::SubdivisionContext;
use crate::types::{SubdivisionConfig, Triangle};

// =============================================================================
// Mesh fixtures
// =============================================================================

/// Flat indexed grid buffers: `n x n` unit quads on the z = 0 plane.
pub fn grid_buffers(n: u32) -> (Vec<Vec3>, Vec<Vec3>, Vec<Vec4>, Vec<u32>) {
  let side = n + 1;
  let mut positions = Vec::with_capacity((side * side) as usize);
  let mut colors = Vec::with_capacity((side * side) as usize);
  for y in 0..side {
    for x in 0..side {
      positions.push(Vec3::new(x as f32, y as f32, 0.0));
      colors.push(Vec4::new(x as f32 / n.max(1) as f32, y as f32 / n.max(1) as f32, 0.5, 1.0));
    }
  }
  let normals = vec![Vec3::Z; positions.len()];

  let mut indices = Vec::with_capacity((n * n * 6) as usize);
  for y in 0..n {
    for x in 0..n {
      let i = y * side + x;
      indices.extend_from_slice(&[i, i + 1, i + side + 1, i, i + side + 1, i + side]);
    }
  }

  (positions, normals, colors, indices)
}

/// Source triangles of [`grid_buffers`].
pub fn grid_triangles(n: u32) -> Vec<Triangle> {
  let (positions, normals, colors, indices) = grid_buffers(n);
  triangles_from_buffers(&positions, &normals, &colors, &indices).unwrap()
}

/// Grid with random heights and colors. Vertices stay shared.
pub fn jittered_grid(n: u32, seed: u64) -> Vec<Triangle> {
  let mut rng = StdRng::seed_from_u64(seed);
  let (mut positions, normals, mut colors, indices) = grid_buffers(n);
  for (p, c) in positions.iter_mut().zip(colors.iter_mut()) {
    p.z = rng.random_range(-0.5..0.5);
    *c = Vec4::new(rng.random(), rng.random(), rng.random(), 1.0);
  }
  triangles_from_buffers(&positions, &normals, &colors, &indices).unwrap()
}

/// One right triangle with distinct corner colors.
pub fn single_triangle() -> Triangle {
  Triangle::new(
    [Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
    [Vec3::Z; 3],
    [Vec4::new(1.0, 0.0, 0.0, 1.0), Vec4::new(0.0, 1.0, 0.0, 1.0), Vec4::new(0.0, 0.0, 1.0, 1.0)],
  )
}

// =============================================================================
// Contexts
// =============================================================================

/// Context with no culling and an identity transform.
pub fn open_context(target: Vec3, config: &SubdivisionConfig) -> SubdivisionContext {
  SubdivisionContext::new(target, Affine3A::IDENTITY, Frustum::everything(), config)
}

/// Frustum keeping only points with `x >= min_x`.
pub fn half_space_frustum(min_x: f32) -> Frustum {
  let mut planes = Frustum::everything().planes;
  planes[0] = Vec4::new(1.0, 0.0, 0.0, -min_x);
  Frustum::new(planes)
}
