//! Six-plane frustum visibility test.
//!
//! Planes are stored as `Vec4(nx, ny, nz, d)`; a point `p` lies on the
//! positive (inside) side when `dot(n, p) + d >= 0`.
//!
//! The test is conservative: a triangle is only reported invisible when a
//! single plane rejects all three of its corners. No clipping is performed,
//! so triangles that straddle two planes outside a frustum corner still pass.

use glam::{Mat4, Vec3, Vec4};

/// Frustum plane: xyz normal pointing inward, w offset.
pub type Plane = Vec4;

/// Six world-space frustum planes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
  pub planes: [Plane; 6],
}

impl Frustum {
  pub fn new(planes: [Plane; 6]) -> Self {
    Self { planes }
  }

  /// Frustum that accepts every point.
  pub fn everything() -> Self {
    Self {
      planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
    }
  }

  /// Extract normalized planes from a view-projection matrix, in the order
  /// left, right, bottom, top, near, far.
  ///
  /// Expects a clip space with depth in `[0, 1]`, as produced by glam's
  /// `Mat4::perspective_rh` / `perspective_lh`. Pass `projection * view` to
  /// get world-space planes.
  pub fn from_view_projection(clip: Mat4) -> Self {
    let r0 = clip.row(0);
    let r1 = clip.row(1);
    let r2 = clip.row(2);
    let r3 = clip.row(3);

    let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r2, r3 - r2].map(normalize_plane);
    Self { planes }
  }

  /// True if `point` lies on the negative side of `plane`.
  #[inline]
  pub fn plane_rejects(plane: Plane, point: Vec3) -> bool {
    plane.truncate().dot(point) + plane.w < 0.0
  }

  /// Conservative triangle visibility.
  ///
  /// Returns false only when some plane rejects all three vertices.
  #[inline]
  pub fn is_triangle_visible(&self, vertices: &[Vec3; 3]) -> bool {
    self.planes.iter().all(|&plane| {
      vertices
        .iter()
        .any(|&vertex| !Self::plane_rejects(plane, vertex))
    })
  }

  /// Point visibility (inside or on every plane).
  #[inline]
  pub fn contains_point(&self, point: Vec3) -> bool {
    self
      .planes
      .iter()
      .all(|&plane| !Self::plane_rejects(plane, point))
  }
}

impl Default for Frustum {
  fn default() -> Self {
    Self::everything()
  }
}

fn normalize_plane(plane: Plane) -> Plane {
  let length = plane.truncate().length();
  if length > 0.0 {
    plane / length
  } else {
    plane
  }
}

#[cfg(test)]
#[path = "frustum_test.rs"]
mod frustum_test;
