//! Pipeline Orchestrator
//!
//! Runs subdivide → dedup → reconstruct → gather on the rayon pool. Each stage
//! joins before the next one starts and hands its owned output forward.
//!
//! # Usage
//!
//! ```ignore
//! let triangles = triangles_from_buffers(&positions, &normals, &colors, &indices)?;
//! let config = SubdivisionConfig::default().with_max_depth(5);
//! let context = SubdivisionContext::new(camera_pos, object_to_world, frustum, &config);
//!
//! let mesh = subdivide_mesh(&triangles, &context, &config)?;
//! // Upload mesh.positions / mesh.normals / mesh.colors / mesh.indices
//! ```

use web_time::Instant;

use super::context::RunContext;
use super::dedup::dedup_pass;
use super::gather::gather_pass;
use super::reconstruct::reconstruct_pass;
use super::subdivide_pass::subdivide_pass;
use crate::error::PipelineError;
use crate::subdivide::SubdivisionContext;
use crate::types::{StageTimings, SubdividedMesh, SubdivisionConfig, Triangle};

/// Subdivide a triangle set around the context's target.
///
/// Synchronous; uses rayon internally for the parallel stages.
///
/// # Arguments
///
/// * `triangles` - Source triangles in object space
/// * `context` - Target, transform, frustum and split thresholds
/// * `config` - Validated before the run; its depth and distances must equal
///   the ones `context` was built with
///
/// # Returns
///
/// Deduplicated vertex arrays and a triangle index list, plus run statistics.
/// An empty input yields an empty mesh.
pub fn subdivide_mesh(
  triangles: &[Triangle],
  context: &SubdivisionContext,
  config: &SubdivisionConfig,
) -> Result<SubdividedMesh, PipelineError> {
  subdivide_mesh_timed(triangles, context, config).map(|(mesh, _)| mesh)
}

/// Same as [`subdivide_mesh`] but also returns per-stage timings.
pub fn subdivide_mesh_timed(
  triangles: &[Triangle],
  context: &SubdivisionContext,
  config: &SubdivisionConfig,
) -> Result<(SubdividedMesh, StageTimings), PipelineError> {
  let mut run = RunContext::new(config);
  run_pipeline(&mut run, triangles, context, config)
}

/// Run all four stages with caller-owned per-run state.
///
/// `run` is reset on entry, so one context can serve any number of
/// consecutive runs.
#[cfg_attr(feature = "tracing", tracing::instrument(skip_all, name = "pipeline::run_pipeline"))]
pub fn run_pipeline(
  run: &mut RunContext,
  triangles: &[Triangle],
  context: &SubdivisionContext,
  config: &SubdivisionConfig,
) -> Result<(SubdividedMesh, StageTimings), PipelineError> {
  if let Err(err) = validate_inputs(context, config) {
    #[cfg(feature = "tracing")]
    tracing::warn!(%err, "rejected subdivision config");
    return Err(err);
  }

  run.reset(config);

  let total_start = Instant::now();
  let partitions = triangles.len();
  let mut timings = StageTimings::default();

  // Stage 1: subdivide into stream A
  let leaves = {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("subdivide_stage").entered();

    let start = Instant::now();
    let stream = subdivide_pass(triangles, context, &run.stats, config.batch_size)?;
    timings.subdivide_us = start.elapsed().as_micros() as u64;
    stream
  };

  // Stage 2: dedup keys in first-seen order
  let index_map = {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("dedup_stage").entered();

    let start = Instant::now();
    let map = dedup_pass(&leaves, partitions, config.key_mode)?;
    timings.dedup_us = start.elapsed().as_micros() as u64;
    map
  };

  // Stage 3: vertex buffers + stream B
  let reconstruction = {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("reconstruct_stage").entered();

    let start = Instant::now();
    let out = reconstruct_pass(&leaves, partitions, &index_map, config.batch_size)?;
    timings.reconstruct_us = start.elapsed().as_micros() as u64;
    out
  };
  drop(leaves);

  // Stage 4: flatten stream B
  let indices = {
    #[cfg(feature = "tracing")]
    let _span = tracing::info_span!("gather_stage").entered();

    let start = Instant::now();
    let indices = gather_pass(&reconstruction.triangles, partitions, &run.zones)?;
    timings.gather_us = start.elapsed().as_micros() as u64;
    indices
  };

  timings.total_us = total_start.elapsed().as_micros() as u64;

  let mut stats = run.stats.snapshot();
  stats.source_triangles = partitions as u64;
  stats.unique_vertices = index_map.unique_count() as u64;

  #[cfg(feature = "tracing")]
  tracing::debug!(
    source = stats.source_triangles,
    leaves = stats.leaf_triangles,
    vertices = stats.unique_vertices,
    culled = stats.culled_triangles,
    near_field = stats.near_field_triangles,
    deepest = stats.deepest_split,
    total_us = timings.total_us,
    "subdivision finished"
  );

  let vertices = reconstruction.vertices;
  let mesh = SubdividedMesh {
    positions: vertices.positions,
    normals: vertices.normals,
    colors: vertices.colors,
    indices,
    stats,
  };

  Ok((mesh, timings))
}

/// The context carries its own copy of the split thresholds; it must have been
/// built from a config with the same values as the one driving the run.
fn validate_inputs(context: &SubdivisionContext, config: &SubdivisionConfig) -> Result<(), PipelineError> {
  config.validate()?;

  let mismatch = |field: &str, context_value: String, config_value: String| {
    Err(PipelineError::InvalidConfig(format!(
      "context {} {} does not match config value {}",
      field, context_value, config_value
    )))
  };
  if context.max_depth != config.max_depth {
    return mismatch("max_depth", context.max_depth.to_string(), config.max_depth.to_string());
  }
  if context.subdivision_range_sq != config.subdivision_range_sq() {
    return mismatch(
      "subdivision_range_sq",
      context.subdivision_range_sq.to_string(),
      config.subdivision_range_sq().to_string(),
    );
  }
  if context.near_field_distance_sq != config.near_field_distance_sq() {
    return mismatch(
      "near_field_distance_sq",
      context.near_field_distance_sq.to_string(),
      config.near_field_distance_sq().to_string(),
    );
  }
  Ok(())
}
