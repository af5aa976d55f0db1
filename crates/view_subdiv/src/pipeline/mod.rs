//! Subdivision Pipeline
//!
//! Four data-parallel stages run back to back on rayon. Each stage joins
//! before the next starts and passes its owned output forward.
//!
//! ```text
//! ┌───────────┐     ┌───────┐     ┌─────────────┐     ┌────────┐
//! │ Subdivide ├────►│ Dedup ├────►│ Reconstruct ├────►│ Gather │
//! └───────────┘     └───────┘     └─────────────┘     └────────┘
//!       │               │                 │                │
//!   stream A      VertexIndexMap   VertexBuffers +     Vec<u32>
//!  (leaves per     (key → index)      stream B       (index list)
//!   source tri)                   (triples per tri)
//! ```
//!
//! # Pipeline Stages
//!
//! 1. **Subdivide**: cull-test and recursively split each source triangle
//!    (parallel, one partition per source triangle)
//! 2. **Dedup**: assign dense indices to vertex keys in first-seen order
//!    (sequential)
//! 3. **Reconstruct**: write vertex attributes and per-leaf index triples
//!    (parallel)
//! 4. **Gather**: concatenate index triples through zone counters
//!    (parallel over zones)
//!
//! Per-run shared state (statistics and zone counters) lives in
//! [`RunContext`].

pub mod context;

// Stage implementations
pub mod dedup;
pub mod gather;
pub mod reconstruct;
pub mod subdivide_pass;

pub mod async_process;
pub mod process;

// Test utilities
#[cfg(test)]
pub mod test_utils;

// Property tests
#[cfg(test)]
#[path = "properties_test.rs"]
mod properties_test;

pub use context::{RunContext, StatCells, ZoneCounters, ZONE_UNUSED};
pub use dedup::{dedup_pass, VertexIndexMap};
pub use gather::{gather_pass, ZoneLayout};
pub use reconstruct::{reconstruct_pass, Reconstruction, VertexBuffers};
pub use subdivide_pass::subdivide_pass;

// Synchronous entry points
pub use process::{run_pipeline, subdivide_mesh, subdivide_mesh_timed};

// Async entry point (non-blocking)
pub use async_process::{AsyncSubdivider, SubdivisionRequest, SubdivisionResult};
