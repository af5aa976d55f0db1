//! Building the source triangle array from indexed mesh buffers.

use glam::{Vec3, Vec4};

use crate::error::PipelineError;
use crate::types::Triangle;

/// Expand an indexed mesh into per-corner triangles.
///
/// # Arguments
/// * `positions` - Vertex positions
/// * `normals` - Vertex normals (same length as positions)
/// * `colors` - Vertex colors (same length as positions)
/// * `indices` - Triangle list, 3 indices per triangle
///
/// # Errors
/// `MalformedIndexBuffer` if `indices` is not a whole number of triangles,
/// `AttributeLengthMismatch` if an attribute array is shorter or longer than
/// `positions`, `IndexOutOfRange` for an index past the vertex arrays.
pub fn triangles_from_buffers(
  positions: &[Vec3],
  normals: &[Vec3],
  colors: &[Vec4],
  indices: &[u32],
) -> Result<Vec<Triangle>, PipelineError> {
  if indices.len() % 3 != 0 {
    return Err(PipelineError::MalformedIndexBuffer { len: indices.len() });
  }
  check_attribute("normals", positions.len(), normals.len())?;
  check_attribute("colors", positions.len(), colors.len())?;

  let vertex_count = positions.len();
  if let Some((position, &index)) = indices
    .iter()
    .enumerate()
    .find(|(_, &index)| index as usize >= vertex_count)
  {
    return Err(PipelineError::IndexOutOfRange {
      position,
      index,
      vertex_count,
    });
  }

  let triangles = indices
    .chunks_exact(3)
    .map(|tri| {
      let corners = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
      Triangle::new(
        corners.map(|i| positions[i]),
        corners.map(|i| normals[i]),
        corners.map(|i| colors[i]),
      )
    })
    .collect();

  Ok(triangles)
}

fn check_attribute(attribute: &'static str, expected: usize, actual: usize) -> Result<(), PipelineError> {
  if expected != actual {
    return Err(PipelineError::AttributeLengthMismatch {
      attribute,
      expected,
      actual,
    });
  }
  Ok(())
}
