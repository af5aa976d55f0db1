//! view_subdiv - View-dependent parallel adaptive triangle subdivision
//!
//! Given a triangle mesh, a world-space target point (usually the camera) and
//! a view frustum, this crate refines the mesh where it matters: triangles
//! whose centroid lies within a configurable range of the target are split
//! recursively at their edge midpoints, everything else stays coarse. The
//! refined triangles are welded back into a compact indexed mesh.
//!
//! # Features
//!
//! - **Adaptive subdivision**: Distance-driven 1→4 midpoint splits, bounded by
//!   a maximum depth
//! - **Conservative culling**: Source triangles outside the frustum pass
//!   through unsplit; nothing is ever dropped
//! - **Deterministic output**: Same input, same vertex and index buffers, no
//!   matter how the worker pool schedules the passes
//! - **Lock-free building blocks**: [`AtomicCell`] and [`PartitionedStream`]
//!
//! # Example
//!
//! ```ignore
//! use view_subdiv::{subdivide_mesh, triangles_from_buffers, Frustum, SubdivisionConfig, SubdivisionContext};
//!
//! let triangles = triangles_from_buffers(&positions, &normals, &colors, &indices)?;
//! let config = SubdivisionConfig::default().with_max_depth(5).with_subdivision_range(8.0);
//! let frustum = Frustum::from_view_projection(projection * view);
//! let context = SubdivisionContext::new(camera_pos, object_to_world, frustum, &config);
//!
//! let mesh = subdivide_mesh(&triangles, &context, &config)?;
//! println!("{} vertices, {} triangles", mesh.vertex_count(), mesh.triangle_count());
//! ```

pub mod atomic_cell;
pub mod error;
pub mod stream;
pub mod types;

// Re-export commonly used items
pub use atomic_cell::{AtomicCell, AtomicScalar};
pub use error::PipelineError;
pub use stream::{PartitionWriter, PartitionedStream, StreamReader};
pub use types::{
  RunStats, StageTimings, SubdividedMesh, SubdivisionConfig, Triangle, VertexKey, VertexKeyMode,
  DEFAULT_KEY_SCALE, MAX_SUBDIVISION_DEPTH,
};

// Visibility
pub mod frustum;
pub use frustum::{Frustum, Plane};

// Per-triangle subdivision
pub mod subdivide;
pub use subdivide::{process_triangle, subdivide_triangle, Classification, SubdivisionContext, TriangleOutcome};

// Indexed mesh input
pub mod source;
pub use source::triangles_from_buffers;

// Parallel stages and orchestrator
pub mod pipeline;
pub use pipeline::{subdivide_mesh, subdivide_mesh_timed, AsyncSubdivider, RunContext, SubdivisionRequest};

// Timing history (feature `metrics`)
pub mod metrics;
