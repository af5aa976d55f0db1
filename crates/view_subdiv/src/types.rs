//! Core data types for view-dependent subdivision.

use glam::{Vec3, Vec4};

use crate::error::PipelineError;

/// Deepest subdivision accepted by [`SubdivisionConfig::validate`].
///
/// One source triangle can produce up to 4^depth leaves.
pub const MAX_SUBDIVISION_DEPTH: u32 = 12;

/// Default dedup key scale factor.
pub const DEFAULT_KEY_SCALE: f32 = 0.001;

// =============================================================================
// Triangle
// =============================================================================

/// Triangle with per-corner attributes.
///
/// Corners carry their own normal and color; sharing between triangles is
/// only discovered by the dedup pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
  pub positions: [Vec3; 3],
  pub normals: [Vec3; 3],
  pub colors: [Vec4; 3],
}

impl Triangle {
  pub fn new(positions: [Vec3; 3], normals: [Vec3; 3], colors: [Vec4; 3]) -> Self {
    Self {
      positions,
      normals,
      colors,
    }
  }

  /// Triangle with a flat face normal on every corner and white corners.
  pub fn from_positions(positions: [Vec3; 3]) -> Self {
    let [a, b, c] = positions;
    let normal = (b - a).cross(c - a).normalize_or_zero();
    Self::new(positions, [normal; 3], [Vec4::ONE; 3])
  }

  /// Object-space centroid.
  #[inline]
  pub fn centroid(&self) -> Vec3 {
    (self.positions[0] + self.positions[1] + self.positions[2]) / 3.0
  }

  /// Edge-midpoint split into four children.
  ///
  /// ```text
  ///            a
  ///           /\
  ///          / 0\
  ///     ab  /____\  ca
  ///        /\ 3  /\
  ///       / 1\  / 2\
  ///      /____\/____\
  ///     b     bc     c
  /// ```
  ///
  /// Children 0-2 keep one original corner each, child 3 is the center
  /// triangle. All children keep the parent's winding.
  pub fn split(&self) -> [Triangle; 4] {
    let a = self.corner(0);
    let b = self.corner(1);
    let c = self.corner(2);
    let ab = Corner::midpoint(&a, &b);
    let bc = Corner::midpoint(&b, &c);
    let ca = Corner::midpoint(&c, &a);

    [
      Corner::triangle(&a, &ab, &ca),
      Corner::triangle(&ab, &b, &bc),
      Corner::triangle(&ca, &bc, &c),
      Corner::triangle(&ab, &bc, &ca),
    ]
  }

  #[inline]
  fn corner(&self, i: usize) -> Corner {
    Corner {
      position: self.positions[i],
      normal: self.normals[i],
      color: self.colors[i],
    }
  }
}

/// One triangle corner, used while splitting.
#[derive(Clone, Copy)]
struct Corner {
  position: Vec3,
  normal: Vec3,
  color: Vec4,
}

impl Corner {
  /// Linear midpoint of two corners. Symmetric in its arguments, so a shared
  /// edge yields the same bits from either neighbor.
  #[inline]
  fn midpoint(a: &Corner, b: &Corner) -> Corner {
    Corner {
      position: (a.position + b.position) * 0.5,
      normal: ((a.normal + b.normal) * 0.5).normalize_or_zero(),
      color: (a.color + b.color) * 0.5,
    }
  }

  #[inline]
  fn triangle(a: &Corner, b: &Corner, c: &Corner) -> Triangle {
    Triangle {
      positions: [a.position, b.position, c.position],
      normals: [a.normal, b.normal, c.normal],
      colors: [a.color, b.color, c.color],
    }
  }
}

// =============================================================================
// Vertex keys
// =============================================================================

/// Quantization key used to test positional equality during dedup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexKey(pub [u64; 3]);

/// Tag for grid coordinates that do not fit an `i32` cell index.
const WIDE_CELL_TAG: u64 = 1 << 32;

/// How a vertex position is turned into a [`VertexKey`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VertexKeyMode {
  /// Multiply the position by a factor and key on the resulting bits.
  ///
  /// Scaling only changes numeric range. Apart from rounding of the product,
  /// which can merge positions an ulp apart, no snapping takes place.
  Scaled(f32),

  /// Round `position / cell_size` to the nearest integer cell.
  ///
  /// Merges positions closer than half a cell. Corners merged this way may
  /// carry slightly different attributes; the reconstruction pass keeps one
  /// of them. Cells outside the `i32` range and non-finite coordinates are
  /// keyed on their exact bits instead, so they only merge with themselves.
  Grid {
    cell_size: f32,
  },
}

impl Default for VertexKeyMode {
  fn default() -> Self {
    VertexKeyMode::Scaled(DEFAULT_KEY_SCALE)
  }
}

impl VertexKeyMode {
  /// Derive the dedup key for a position.
  #[inline]
  pub fn key(&self, position: Vec3) -> VertexKey {
    match *self {
      VertexKeyMode::Scaled(factor) => {
        let scaled = position * factor;
        // -0.0 and +0.0 compare equal, so they share a key
        VertexKey(scaled.to_array().map(|v| if v == 0.0 { 0 } else { v.to_bits() as u64 }))
      }
      VertexKeyMode::Grid { cell_size } => {
        let cell = (position / cell_size).round();
        VertexKey(cell.to_array().map(|v| {
          if v >= i32::MIN as f32 && v < i32::MAX as f32 {
            v as i32 as u32 as u64
          } else {
            WIDE_CELL_TAG | v.to_bits() as u64
          }
        }))
      }
    }
  }

  fn validate(&self) -> Result<(), PipelineError> {
    let value = match *self {
      VertexKeyMode::Scaled(factor) => factor,
      VertexKeyMode::Grid { cell_size } => cell_size,
    };
    if !value.is_finite() || value <= 0.0 {
      return Err(PipelineError::InvalidConfig(format!(
        "vertex key mode {:?} needs a finite positive factor",
        self
      )));
    }
    Ok(())
  }
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for one subdivision run.
#[derive(Clone, Debug, PartialEq)]
pub struct SubdivisionConfig {
  /// Maximum number of recursive splits of a source triangle.
  pub max_depth: u32,

  /// World-space distance from the target within which triangles split.
  pub subdivision_range: f32,

  /// Distance below which the frustum test is skipped and a triangle always
  /// splits.
  pub near_field_distance: f32,

  /// Dedup key derivation.
  pub key_mode: VertexKeyMode,

  /// Minimum number of items per worker job.
  pub batch_size: usize,

  /// Number of gather zones (atomic output lanes).
  pub zone_count: usize,
}

impl Default for SubdivisionConfig {
  fn default() -> Self {
    Self {
      max_depth: 4,
      subdivision_range: 10.0,
      near_field_distance: 0.1,
      key_mode: VertexKeyMode::default(),
      batch_size: 64,
      zone_count: 64,
    }
  }
}

impl SubdivisionConfig {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_max_depth(mut self, depth: u32) -> Self {
    self.max_depth = depth;
    self
  }

  pub fn with_subdivision_range(mut self, range: f32) -> Self {
    self.subdivision_range = range;
    self
  }

  pub fn with_near_field_distance(mut self, distance: f32) -> Self {
    self.near_field_distance = distance;
    self
  }

  pub fn with_key_mode(mut self, mode: VertexKeyMode) -> Self {
    self.key_mode = mode;
    self
  }

  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size;
    self
  }

  pub fn with_zone_count(mut self, zone_count: usize) -> Self {
    self.zone_count = zone_count;
    self
  }

  /// Squared subdivision range, as compared against centroid distances.
  #[inline]
  pub fn subdivision_range_sq(&self) -> f32 {
    self.subdivision_range * self.subdivision_range
  }

  /// Squared near-field distance.
  #[inline]
  pub fn near_field_distance_sq(&self) -> f32 {
    self.near_field_distance * self.near_field_distance
  }

  /// Reject configurations the pipeline cannot run.
  pub fn validate(&self) -> Result<(), PipelineError> {
    if self.max_depth > MAX_SUBDIVISION_DEPTH {
      return Err(PipelineError::InvalidConfig(format!(
        "max_depth {} exceeds {}",
        self.max_depth, MAX_SUBDIVISION_DEPTH
      )));
    }
    if !self.subdivision_range.is_finite() || self.subdivision_range < 0.0 {
      return Err(PipelineError::InvalidConfig(format!(
        "subdivision_range {} must be finite and non-negative",
        self.subdivision_range
      )));
    }
    if !self.near_field_distance.is_finite() || self.near_field_distance < 0.0 {
      return Err(PipelineError::InvalidConfig(format!(
        "near_field_distance {} must be finite and non-negative",
        self.near_field_distance
      )));
    }
    if self.batch_size == 0 {
      return Err(PipelineError::InvalidConfig("batch_size must be at least 1".into()));
    }
    if self.zone_count == 0 {
      return Err(PipelineError::InvalidConfig("zone_count must be at least 1".into()));
    }
    self.key_mode.validate()
  }
}

// =============================================================================
// Output
// =============================================================================

/// Statistics gathered during one run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStats {
  /// Triangles in the source mesh.
  pub source_triangles: u64,
  /// Leaf triangles emitted by the subdivide pass.
  pub leaf_triangles: u64,
  /// Distinct vertices after dedup.
  pub unique_vertices: u64,
  /// Source triangles rejected by the frustum and emitted unsplit.
  pub culled_triangles: u64,
  /// Source triangles that took the near-field shortcut.
  pub near_field_triangles: u64,
  /// Deepest split performed on any leaf.
  pub deepest_split: u32,
  /// Smallest squared world distance from the target to a source centroid.
  pub closest_distance_sq: f32,
}

impl Default for RunStats {
  fn default() -> Self {
    Self {
      source_triangles: 0,
      leaf_triangles: 0,
      unique_vertices: 0,
      culled_triangles: 0,
      near_field_triangles: 0,
      deepest_split: 0,
      closest_distance_sq: f32::INFINITY,
    }
  }
}

/// Wall-clock time per stage in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageTimings {
  pub subdivide_us: u64,
  pub dedup_us: u64,
  pub reconstruct_us: u64,
  pub gather_us: u64,
  pub total_us: u64,
}

/// Deduplicated, renderable output mesh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubdividedMesh {
  /// Vertex positions, one per unique vertex key.
  pub positions: Vec<Vec3>,
  /// Vertex normals (parallel to positions).
  pub normals: Vec<Vec3>,
  /// Vertex colors (parallel to positions).
  pub colors: Vec<Vec4>,
  /// Triangle indices (3 indices per triangle).
  pub indices: Vec<u32>,
  /// Statistics of the run that produced this mesh.
  pub stats: RunStats,
}

impl SubdividedMesh {
  /// Returns true if no geometry was generated.
  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }

  pub fn vertex_count(&self) -> usize {
    self.positions.len()
  }

  /// Number of triangles in the mesh.
  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  /// Iterate index triples.
  pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
    self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
  }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
