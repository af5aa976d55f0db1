//! C ABI bridge for view_subdiv.
//!
//! The engine side passes flat vertex/index buffers plus view parameters, Rust
//! runs the whole subdivision pipeline and keeps the resulting buffers alive
//! under an integer handle until the engine destroys it.
//!
//! # Lifecycle
//!
//! ```text
//! Engine (C / C#)                        Rust (view_subdiv_ffi)
//! ┌─────────────────────┐                ┌──────────────────────────┐
//! │ fill input buffers  │ view_subdiv_   │ copy buffers             │
//! │ + view parameters ──┼──run()───────► │ subdivide_mesh_timed()   │
//! │                     │ ◄── handle ────│ retain result (handle)   │
//! │                     │                │                          │
//! │ upload mesh ◄───────┼─result_get()── │ pointers into retained   │
//! │                     │                │ buffers                  │
//! │ done with mesh ─────┼─result_        │ free buffers             │
//! │                     │  destroy()───► │                          │
//! └─────────────────────┘                └──────────────────────────┘
//! ```
//!
//! # Status codes
//!
//! - 0: success
//! - -1: null pointer argument
//! - -2: pipeline error (invalid buffers or config) or poisoned lock
//! - -3: unknown handle
//! - -4: metrics feature not enabled (metrics query only)

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

use glam::{Affine3A, Mat4, Vec3, Vec4};

use view_subdiv::{
    subdivide_mesh_timed, triangles_from_buffers, Frustum, PipelineError, RunStats, SubdivisionConfig,
    SubdivisionContext, VertexKeyMode,
};

// =============================================================================
// FFI Types
// =============================================================================

/// Key mode selector for [`FfiSubdivisionInput::key_mode`].
pub const KEY_MODE_SCALED: u8 = 0;
/// Key mode selector for [`FfiSubdivisionInput::key_mode`].
pub const KEY_MODE_GRID: u8 = 1;

/// Input mesh and view parameters for one run.
///
/// All matrices are column-major.
#[repr(C)]
pub struct FfiSubdivisionInput {
    /// xyz per vertex
    pub positions: *const f32,
    /// xyz per vertex
    pub normals: *const f32,
    /// rgba per vertex
    pub colors: *const f32,
    pub vertex_count: u32,
    /// 3 per triangle
    pub indices: *const u32,
    pub index_count: u32,
    /// Mesh space to world space
    pub object_to_world: [f32; 16],
    /// Camera view-projection, used for frustum culling when `cull != 0`
    pub view_projection: [f32; 16],
    /// World-space subdivision target
    pub target: [f32; 3],
    pub max_depth: u32,
    pub subdivision_range: f32,
    pub near_field_distance: f32,
    /// Non-zero enables frustum culling
    pub cull: u8,
    /// `KEY_MODE_SCALED` or `KEY_MODE_GRID`
    pub key_mode: u8,
    pub _pad: [u8; 2],
    /// Scale factor (scaled mode) or cell size (grid mode); 0 = default
    pub key_param: f32,
}

/// Run statistics.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FfiRunStats {
    pub source_triangles: u64,
    pub leaf_triangles: u64,
    pub unique_vertices: u64,
    pub culled_triangles: u64,
    pub near_field_triangles: u64,
    pub deepest_split: u32,
    pub closest_distance_sq: f32,
}

impl From<RunStats> for FfiRunStats {
    fn from(stats: RunStats) -> Self {
        Self {
            source_triangles: stats.source_triangles,
            leaf_triangles: stats.leaf_triangles,
            unique_vertices: stats.unique_vertices,
            culled_triangles: stats.culled_triangles,
            near_field_triangles: stats.near_field_triangles,
            deepest_split: stats.deepest_split,
            closest_distance_sq: stats.closest_distance_sq,
        }
    }
}

/// View of a retained result.
/// Pointers are valid until `view_subdiv_result_destroy` is called on the handle.
#[repr(C)]
pub struct FfiSubdividedMesh {
    /// xyz per vertex
    pub positions: *const f32,
    /// xyz per vertex
    pub normals: *const f32,
    /// rgba per vertex
    pub colors: *const f32,
    pub vertex_count: u32,
    pub indices: *const u32,
    pub index_count: u32,
    pub stats: FfiRunStats,
}

impl FfiSubdividedMesh {
    fn empty() -> Self {
        Self {
            positions: std::ptr::null(),
            normals: std::ptr::null(),
            colors: std::ptr::null(),
            vertex_count: 0,
            indices: std::ptr::null(),
            index_count: 0,
            stats: FfiRunStats::default(),
        }
    }
}

// =============================================================================
// FFI Metrics Types
// =============================================================================

/// Timing histogram stats (from RollingWindow).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FfiTimingStats {
    /// Most recent sample in microseconds.
    pub last_us: u64,
    /// Mean of window in microseconds.
    pub avg_us: u64,
    /// Minimum in window in microseconds.
    pub min_us: u64,
    /// Maximum in window in microseconds.
    pub max_us: u64,
    /// Number of samples in window (up to 128).
    pub sample_count: u32,
    /// Padding for alignment.
    pub _pad: u32,
}

/// Rust-side metrics snapshot for FFI export.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct FfiMetricsSnapshot {
    pub subdivide: FfiTimingStats,
    pub dedup: FfiTimingStats,
    pub reconstruct: FfiTimingStats,
    pub gather: FfiTimingStats,
    /// Whole-run timing.
    pub frame: FfiTimingStats,
    /// Runs completed this session.
    pub total_runs: u64,
    /// Leaf triangles produced this session.
    pub total_leaf_triangles: u64,
    pub last_stats: FfiRunStats,
}

// =============================================================================
// Retained Results
// =============================================================================

/// Result buffers kept alive for pointer validity across the FFI boundary.
struct RetainedResult {
    positions: Vec<f32>,
    normals: Vec<f32>,
    colors: Vec<f32>,
    indices: Vec<u32>,
    stats: RunStats,
}

impl RetainedResult {
    fn view(&self) -> FfiSubdividedMesh {
        fn ptr_or_null<T>(items: &[T]) -> *const T {
            if items.is_empty() {
                std::ptr::null()
            } else {
                items.as_ptr()
            }
        }

        FfiSubdividedMesh {
            positions: ptr_or_null(&self.positions),
            normals: ptr_or_null(&self.normals),
            colors: ptr_or_null(&self.colors),
            vertex_count: (self.positions.len() / 3) as u32,
            indices: ptr_or_null(&self.indices),
            index_count: self.indices.len() as u32,
            stats: self.stats.into(),
        }
    }
}

/// Global result storage with thread-safe access.
static RESULTS: Mutex<Option<HashMap<i32, RetainedResult>>> = Mutex::new(None);
static NEXT_HANDLE: AtomicI32 = AtomicI32::new(1);

#[cfg(feature = "metrics")]
static METRICS: Mutex<Option<view_subdiv::metrics::PipelineMetrics>> = Mutex::new(None);

// =============================================================================
// Input conversion
// =============================================================================

/// Borrow `len` items at `ptr`. Null is accepted only when `len` is zero.
unsafe fn slice_from<'a, T>(ptr: *const T, len: usize) -> Option<&'a [T]> {
    if len == 0 {
        Some(&[])
    } else if ptr.is_null() {
        None
    } else {
        Some(std::slice::from_raw_parts(ptr, len))
    }
}

fn key_mode_from(input: &FfiSubdivisionInput) -> VertexKeyMode {
    match (input.key_mode, input.key_param) {
        (KEY_MODE_GRID, cell_size) if cell_size != 0.0 => VertexKeyMode::Grid { cell_size },
        (KEY_MODE_GRID, _) => VertexKeyMode::Grid { cell_size: 1e-4 },
        (_, factor) if factor != 0.0 => VertexKeyMode::Scaled(factor),
        _ => VertexKeyMode::default(),
    }
}

/// Copy the caller's buffers and run the pipeline.
fn run(input: &FfiSubdivisionInput, positions: &[f32], normals: &[f32], colors: &[f32], indices: &[u32]) -> Result<RetainedResult, PipelineError> {
    let positions: Vec<Vec3> = positions.chunks_exact(3).map(Vec3::from_slice).collect();
    let normals: Vec<Vec3> = normals.chunks_exact(3).map(Vec3::from_slice).collect();
    let colors: Vec<Vec4> = colors.chunks_exact(4).map(Vec4::from_slice).collect();
    let triangles = triangles_from_buffers(&positions, &normals, &colors, indices)?;

    let config = SubdivisionConfig::default()
        .with_max_depth(input.max_depth)
        .with_subdivision_range(input.subdivision_range)
        .with_near_field_distance(input.near_field_distance)
        .with_key_mode(key_mode_from(input));

    let frustum = if input.cull != 0 {
        Frustum::from_view_projection(Mat4::from_cols_array(&input.view_projection))
    } else {
        Frustum::everything()
    };
    let object_to_world = Affine3A::from_mat4(Mat4::from_cols_array(&input.object_to_world));
    let context = SubdivisionContext::new(Vec3::from_array(input.target), object_to_world, frustum, &config);

    let (mesh, _timings) = subdivide_mesh_timed(&triangles, &context, &config)?;

    #[cfg(feature = "metrics")]
    if let Ok(mut guard) = METRICS.lock() {
        guard
            .get_or_insert_with(view_subdiv::metrics::PipelineMetrics::new)
            .record_run(&_timings, &mesh.stats);
    }

    Ok(RetainedResult {
        positions: mesh.positions.iter().flat_map(|p| p.to_array()).collect(),
        normals: mesh.normals.iter().flat_map(|n| n.to_array()).collect(),
        colors: mesh.colors.iter().flat_map(|c| c.to_array()).collect(),
        indices: mesh.indices,
        stats: mesh.stats,
    })
}

// =============================================================================
// FFI Functions
// =============================================================================

/// Returns the library version as a packed u32: 0xMMmmpp (major.minor.patch).
#[no_mangle]
pub extern "C" fn view_subdiv_version() -> u32 {
    0x000100 // v0.1.0
}

/// Subdivide a mesh and retain the result.
///
/// # Safety
/// - `input` must point to a valid FfiSubdivisionInput whose buffers hold
///   `vertex_count` vertices and `index_count` indices.
/// - `out_handle` must point to writable memory for one i32.
///
/// # Returns
/// - 0 on success, with the result handle written to `out_handle`
/// - -1 if a pointer is null
/// - -2 if the pipeline rejected the input or a lock was poisoned
#[no_mangle]
pub unsafe extern "C" fn view_subdiv_run(input: *const FfiSubdivisionInput, out_handle: *mut i32) -> i32 {
    if input.is_null() || out_handle.is_null() {
        return -1;
    }

    let input = &*input;
    let vertex_count = input.vertex_count as usize;
    let (Some(positions), Some(normals), Some(colors), Some(indices)) = (
        slice_from(input.positions, vertex_count * 3),
        slice_from(input.normals, vertex_count * 3),
        slice_from(input.colors, vertex_count * 4),
        slice_from(input.indices, input.index_count as usize),
    ) else {
        return -1;
    };

    let Ok(result) = run(input, positions, normals, colors, indices) else {
        return -2;
    };

    let Ok(mut guard) = RESULTS.lock() else {
        return -2;
    };

    let handle = NEXT_HANDLE.fetch_add(1, Ordering::SeqCst);
    guard.get_or_insert_with(HashMap::new).insert(handle, result);
    *out_handle = handle;

    0
}

/// Fill `out` with pointers into a retained result.
///
/// # Safety
/// - `out` must point to a valid FfiSubdividedMesh struct.
///
/// # Returns
/// - 0 on success
/// - -1 if out is null
/// - -2 if failed to acquire lock
/// - -3 if handle not found
#[no_mangle]
pub unsafe extern "C" fn view_subdiv_result_get(handle: i32, out: *mut FfiSubdividedMesh) -> i32 {
    if out.is_null() {
        return -1;
    }

    let Ok(guard) = RESULTS.lock() else {
        return -2;
    };

    let Some(result) = guard.as_ref().and_then(|results| results.get(&handle)) else {
        (*out) = FfiSubdividedMesh::empty();
        return -3;
    };

    (*out) = result.view();
    0
}

/// Free a retained result. Pointers obtained from it become invalid.
///
/// # Returns
/// - 0 on success
/// - -2 if failed to acquire lock
/// - -3 if handle not found
#[no_mangle]
pub extern "C" fn view_subdiv_result_destroy(handle: i32) -> i32 {
    let Ok(mut guard) = RESULTS.lock() else {
        return -2;
    };

    let Some(ref mut results) = *guard else {
        return -3;
    };

    if results.remove(&handle).is_some() {
        0
    } else {
        -3
    }
}

/// Get timing statistics across all runs of this process.
///
/// Stats are computed from a 128-sample rolling window.
///
/// # Safety
/// - `out` must point to a valid FfiMetricsSnapshot struct.
///
/// # Returns
/// - 0 on success
/// - -1 if out is null
/// - -2 if failed to acquire lock
/// - -4 if metrics feature not enabled (compile-time)
#[no_mangle]
pub unsafe extern "C" fn view_subdiv_get_metrics(out: *mut FfiMetricsSnapshot) -> i32 {
    #[cfg(not(feature = "metrics"))]
    {
        let _ = out;
        return -4; // Metrics not enabled
    }

    #[cfg(feature = "metrics")]
    {
        use view_subdiv::metrics::RollingWindow;

        if out.is_null() {
            return -1;
        }

        let Ok(guard) = METRICS.lock() else {
            return -2;
        };

        let Some(metrics) = guard.as_ref() else {
            (*out) = FfiMetricsSnapshot::default();
            return 0;
        };

        let timing = |window: &RollingWindow<u64>| {
            let summary = window.summary();
            FfiTimingStats {
                last_us: summary.last_us,
                avg_us: summary.mean_us.round() as u64,
                min_us: summary.min_us,
                max_us: summary.max_us,
                sample_count: summary.samples as u32,
                _pad: 0,
            }
        };

        (*out) = FfiMetricsSnapshot {
            subdivide: timing(&metrics.subdivide_timings),
            dedup: timing(&metrics.dedup_timings),
            reconstruct: timing(&metrics.reconstruct_timings),
            gather: timing(&metrics.gather_timings),
            frame: timing(&metrics.frame_timings),
            total_runs: metrics.total_runs,
            total_leaf_triangles: metrics.total_leaf_triangles,
            last_stats: metrics.last_stats.into(),
        };

        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    struct QuadBuffers {
        positions: Vec<f32>,
        normals: Vec<f32>,
        colors: Vec<f32>,
        indices: Vec<u32>,
    }

    fn quad() -> QuadBuffers {
        QuadBuffers {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            normals: [0.0f32, 0.0, 1.0].repeat(4),
            colors: vec![1.0; 16],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    fn input(buffers: &QuadBuffers, max_depth: u32) -> FfiSubdivisionInput {
        FfiSubdivisionInput {
            positions: buffers.positions.as_ptr(),
            normals: buffers.normals.as_ptr(),
            colors: buffers.colors.as_ptr(),
            vertex_count: 4,
            indices: buffers.indices.as_ptr(),
            index_count: buffers.indices.len() as u32,
            object_to_world: IDENTITY,
            view_projection: IDENTITY,
            target: [0.5, 0.5, 0.0],
            max_depth,
            subdivision_range: 10.0,
            near_field_distance: 0.0,
            cull: 0,
            key_mode: KEY_MODE_SCALED,
            _pad: [0; 2],
            key_param: 0.0,
        }
    }

    #[test]
    fn test_version() {
        assert_eq!(view_subdiv_version(), 0x000100);
    }

    #[test]
    fn test_result_lifecycle() {
        let buffers = quad();
        let input = input(&buffers, 1);

        unsafe {
            let mut handle = 0;
            assert_eq!(view_subdiv_run(&input, &mut handle), 0);
            assert!(handle > 0, "Expected positive handle, got {}", handle);

            let mut mesh = FfiSubdividedMesh::empty();
            assert_eq!(view_subdiv_result_get(handle, &mut mesh), 0);
            assert_eq!(mesh.index_count, 8 * 3);
            assert_eq!(mesh.vertex_count, 9);
            assert_eq!(mesh.stats.leaf_triangles, 8);
            assert!(!mesh.positions.is_null());

            let indices = std::slice::from_raw_parts(mesh.indices, mesh.index_count as usize);
            assert!(indices.iter().all(|&i| i < mesh.vertex_count));

            assert_eq!(view_subdiv_result_destroy(handle), 0);
            assert_eq!(view_subdiv_result_destroy(handle), -3, "Double destroy should return -3");
            assert_eq!(view_subdiv_result_get(handle, &mut mesh), -3);
            assert!(mesh.indices.is_null());
        }
    }

    /// View-projection of a 90° camera at `eye` looking at `center`.
    fn camera(eye: Vec3, center: Vec3) -> [f32; 16] {
        let projection = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, 0.1, 100.0);
        (projection * Mat4::look_at_rh(eye, center, Vec3::Y)).to_cols_array()
    }

    #[test]
    fn test_culled_and_grid_keyed_lifecycle() {
        let buffers = quad();
        let eye = Vec3::new(0.5, 0.5, 5.0);

        unsafe {
            // Camera looking away: both source triangles pass through unsplit
            let mut culled = input(&buffers, 1);
            culled.cull = 1;
            culled.view_projection = camera(eye, Vec3::new(0.5, 0.5, 10.0));

            let mut handle = 0;
            assert_eq!(view_subdiv_run(&culled, &mut handle), 0);
            let mut mesh = FfiSubdividedMesh::empty();
            assert_eq!(view_subdiv_result_get(handle, &mut mesh), 0);
            assert_eq!(mesh.stats.culled_triangles, 2);
            assert_eq!(mesh.stats.leaf_triangles, 2);
            assert_eq!(mesh.index_count, 6);
            assert_eq!(mesh.vertex_count, 4);
            assert_eq!(view_subdiv_result_destroy(handle), 0);

            // Camera facing the quad, welded on a quarter-unit grid
            let mut visible = input(&buffers, 1);
            visible.cull = 1;
            visible.view_projection = camera(eye, Vec3::new(0.5, 0.5, 0.0));
            visible.key_mode = KEY_MODE_GRID;
            visible.key_param = 0.25;

            assert_eq!(view_subdiv_run(&visible, &mut handle), 0);
            assert_eq!(view_subdiv_result_get(handle, &mut mesh), 0);
            assert_eq!(mesh.stats.culled_triangles, 0);
            assert_eq!(mesh.stats.leaf_triangles, 8);
            assert_eq!(mesh.index_count, 8 * 3);
            assert_eq!(mesh.vertex_count, 9);

            let positions = std::slice::from_raw_parts(mesh.positions, mesh.vertex_count as usize * 3);
            assert!(positions.iter().all(|&c| c == 0.0 || c == 0.5 || c == 1.0));
            assert_eq!(view_subdiv_result_destroy(handle), 0);
        }
    }

    #[test]
    fn test_null_arguments() {
        let buffers = quad();
        let mut bad = input(&buffers, 1);
        bad.normals = std::ptr::null();

        unsafe {
            let mut handle = 0;
            assert_eq!(view_subdiv_run(std::ptr::null(), &mut handle), -1);
            assert_eq!(view_subdiv_run(&bad, &mut handle), -1);
            assert_eq!(view_subdiv_result_get(1, std::ptr::null_mut()), -1);
            assert_eq!(view_subdiv_get_metrics(std::ptr::null_mut()), -1);
        }
    }

    #[test]
    fn test_pipeline_errors_map_to_status() {
        let mut buffers = quad();
        buffers.indices[5] = 9;
        let mut handle = 0;

        unsafe {
            assert_eq!(view_subdiv_run(&input(&buffers, 1), &mut handle), -2);

            let buffers = quad();
            assert_eq!(view_subdiv_run(&input(&buffers, 99), &mut handle), -2);
        }
    }

    #[test]
    fn test_metrics_snapshot() {
        let buffers = quad();
        unsafe {
            let mut handle = 0;
            assert_eq!(view_subdiv_run(&input(&buffers, 2), &mut handle), 0);
            view_subdiv_result_destroy(handle);

            let mut snapshot = FfiMetricsSnapshot::default();
            assert_eq!(view_subdiv_get_metrics(&mut snapshot), 0);
            assert!(snapshot.total_runs >= 1);
            assert!(snapshot.frame.sample_count >= 1);
            assert!(snapshot.total_leaf_triangles >= 32);
        }
    }

    #[test]
    fn test_key_mode_selection() {
        let buffers = quad();
        let mut input = input(&buffers, 0);
        assert_eq!(key_mode_from(&input), VertexKeyMode::default());

        input.key_mode = KEY_MODE_GRID;
        input.key_param = 0.5;
        assert_eq!(key_mode_from(&input), VertexKeyMode::Grid { cell_size: 0.5 });

        input.key_mode = KEY_MODE_SCALED;
        assert_eq!(key_mode_from(&input), VertexKeyMode::Scaled(0.5));
    }
}
