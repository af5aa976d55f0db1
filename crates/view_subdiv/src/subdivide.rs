//! Recursive edge-midpoint subdivision of a single triangle.
//!
//! # Decision rule
//!
//! For every triangle reached (starting at depth 0):
//!
//! 1. Compute the squared world-space distance from the centroid to the
//!    target.
//! 2. If `depth == max_depth`, or the distance exceeds the subdivision range
//!    (and the triangle is not in the near field), emit it as a leaf.
//! 3. Otherwise split it into four children and continue with each at
//!    `depth + 1`.
//!
//! The frustum test only gates the source triangle: [`process_triangle`]
//! skips it for near-field triangles and emits rejected triangles unsplit.
//! Geometry is never dropped.
//!
//! Recursion is unrolled onto an explicit stack bounded by
//! `3 * max_depth + 1` entries; leaves come out in depth-first order
//! (child 0's subtree first).

use glam::{Affine3A, Vec3};
use smallvec::SmallVec;

use crate::frustum::Frustum;
use crate::types::{SubdivisionConfig, Triangle};

/// Read-only inputs shared by every work item of one run.
#[derive(Clone, Copy, Debug)]
pub struct SubdivisionContext {
  /// World-space point subdivision concentrates around.
  pub target: Vec3,
  /// Squared subdivision range.
  pub subdivision_range_sq: f32,
  /// Squared near-field distance.
  pub near_field_distance_sq: f32,
  /// Maximum number of splits.
  pub max_depth: u32,
  /// World-space frustum.
  pub frustum: Frustum,
  /// Transform from mesh (object) space to world space.
  pub object_to_world: Affine3A,
}

impl SubdivisionContext {
  /// Build a context from a target, transform, frustum and config.
  pub fn new(
    target: Vec3,
    object_to_world: Affine3A,
    frustum: Frustum,
    config: &SubdivisionConfig,
  ) -> Self {
    Self {
      target,
      subdivision_range_sq: config.subdivision_range_sq(),
      near_field_distance_sq: config.near_field_distance_sq(),
      max_depth: config.max_depth,
      frustum,
      object_to_world,
    }
  }

  /// Squared world distance from the triangle's centroid to the target.
  #[inline]
  pub fn distance_sq(&self, triangle: &Triangle) -> f32 {
    self
      .object_to_world
      .transform_point3(triangle.centroid())
      .distance_squared(self.target)
  }

  /// Triangle corners in world space.
  #[inline]
  pub fn world_vertices(&self, triangle: &Triangle) -> [Vec3; 3] {
    triangle
      .positions
      .map(|p| self.object_to_world.transform_point3(p))
  }

  #[inline]
  fn is_near_field(&self, distance_sq: f32) -> bool {
    distance_sq < self.near_field_distance_sq
  }

  #[inline]
  fn should_split(&self, depth: u32, distance_sq: f32) -> bool {
    depth < self.max_depth
      && (distance_sq <= self.subdivision_range_sq || self.is_near_field(distance_sq))
  }
}

/// How the subdivide pass treated a source triangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
  /// Within the near field: cull test skipped, subdivided.
  NearField,
  /// Passed the frustum test and went through the subdivider.
  Visible,
  /// Rejected by a frustum plane: emitted unsplit.
  Culled,
}

/// Result of processing one source triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriangleOutcome {
  pub classification: Classification,
  /// Squared world distance from the source centroid to the target.
  pub distance_sq: f32,
}

/// Cull-test a source triangle and subdivide it if it may be visible.
///
/// `emit` receives every leaf with the number of splits that produced it.
pub fn process_triangle<F>(triangle: &Triangle, context: &SubdivisionContext, mut emit: F) -> TriangleOutcome
where
  F: FnMut(Triangle, u32),
{
  let distance_sq = context.distance_sq(triangle);

  let classification = if context.is_near_field(distance_sq) {
    Classification::NearField
  } else if context
    .frustum
    .is_triangle_visible(&context.world_vertices(triangle))
  {
    Classification::Visible
  } else {
    Classification::Culled
  };

  match classification {
    Classification::Culled => emit(*triangle, 0),
    _ => subdivide_triangle(triangle, context, &mut emit),
  }

  TriangleOutcome {
    classification,
    distance_sq,
  }
}

/// Subdivide a triangle without a frustum test.
pub fn subdivide_triangle<F>(triangle: &Triangle, context: &SubdivisionContext, emit: &mut F)
where
  F: FnMut(Triangle, u32),
{
  let mut stack: SmallVec<[(Triangle, u32); 16]> = SmallVec::new();
  stack.push((*triangle, 0));

  while let Some((current, depth)) = stack.pop() {
    let distance_sq = context.distance_sq(&current);
    if !context.should_split(depth, distance_sq) {
      emit(current, depth);
      continue;
    }

    // Reverse push so child 0 is processed first
    for child in current.split().into_iter().rev() {
      stack.push((child, depth + 1));
    }
  }
}

#[cfg(test)]
#[path = "subdivide_test.rs"]
mod subdivide_test;
