//! Cross-stage properties of the full pipeline.

use std::collections::HashSet;

use glam::{Affine3A, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::process::subdivide_mesh;
use super::test_utils::{grid_triangles, half_space_frustum, jittered_grid, open_context, single_triangle};
use crate::subdivide::SubdivisionContext;
use crate::types::{SubdividedMesh, SubdivisionConfig, Triangle, VertexKeyMode};

fn bits(mesh: &SubdividedMesh) -> (Vec<[u32; 3]>, Vec<[u32; 3]>, Vec<[u32; 4]>) {
  (
    mesh.positions.iter().map(|p| p.to_array().map(f32::to_bits)).collect(),
    mesh.normals.iter().map(|n| n.to_array().map(f32::to_bits)).collect(),
    mesh.colors.iter().map(|c| c.to_array().map(f32::to_bits)).collect(),
  )
}

fn random_case(seed: u64) -> (Vec<Triangle>, SubdivisionContext, SubdivisionConfig) {
  let mut rng = StdRng::seed_from_u64(seed);
  let n = rng.random_range(2..8u32);
  let triangles = jittered_grid(n, seed);
  let config = SubdivisionConfig::default()
    .with_max_depth(rng.random_range(0..=4))
    .with_subdivision_range(rng.random_range(0.5..4.0))
    .with_near_field_distance(0.0);
  let target = Vec3::new(
    rng.random_range(0.0..n as f32),
    rng.random_range(0.0..n as f32),
    rng.random_range(-1.0..1.0),
  );
  let context = open_context(target, &config);
  (triangles, context, config)
}

fn area(positions: [Vec3; 3]) -> f32 {
  let [a, b, c] = positions;
  (b - a).cross(c - a).length() * 0.5
}

// =============================================================================
// Invariants
// =============================================================================

#[test]
fn test_output_is_bit_identical_across_runs() {
  for seed in 0..6 {
    let (triangles, context, config) = random_case(seed);
    let first = subdivide_mesh(&triangles, &context, &config).unwrap();
    let second = subdivide_mesh(&triangles, &context, &config).unwrap();
    assert_eq!(bits(&first), bits(&second), "seed {}", seed);
    assert_eq!(first.indices, second.indices, "seed {}", seed);
  }
}

#[test]
fn test_output_independent_of_scheduling_parameters() {
  let (triangles, context, config) = random_case(42);
  let reference = subdivide_mesh(&triangles, &context, &config.clone().with_zone_count(1).with_batch_size(1)).unwrap();

  for (zones, batch) in [(2, 1), (7, 3), (64, 64), (1024, 16)] {
    let config = config.clone().with_zone_count(zones).with_batch_size(batch);
    let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();
    assert_eq!(mesh.indices, reference.indices, "zones {} batch {}", zones, batch);
    assert_eq!(bits(&mesh), bits(&reference));
  }
}

#[test]
fn test_indices_are_dense() {
  for seed in 0..6 {
    let (triangles, context, config) = random_case(seed);
    let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();

    let used: HashSet<u32> = mesh.indices.iter().copied().collect();
    let expected: HashSet<u32> = (0..mesh.vertex_count() as u32).collect();
    assert_eq!(used, expected, "seed {}", seed);
  }
}

#[test]
fn test_vertex_keys_are_unique() {
  let key_mode = VertexKeyMode::default();
  for seed in 0..6 {
    let (triangles, context, config) = random_case(seed);
    let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();

    let keys: HashSet<_> = mesh.positions.iter().map(|&p| key_mode.key(p)).collect();
    assert_eq!(keys.len(), mesh.vertex_count(), "seed {}", seed);
  }
}

#[test]
fn test_triples_are_whole_and_in_range() {
  for seed in 0..6 {
    let (triangles, context, config) = random_case(seed);
    let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();

    assert_eq!(mesh.indices.len() % 3, 0);
    assert_eq!(mesh.triangle_count() as u64, mesh.stats.leaf_triangles);
    assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
  }
}

#[test]
fn test_depth_bound_and_area_preserved() {
  for seed in 0..6 {
    let (triangles, context, config) = random_case(seed);
    let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();

    assert!(mesh.stats.deepest_split <= config.max_depth);
    let bound = triangles.len() as u64 * 4u64.pow(config.max_depth);
    assert!(mesh.stats.leaf_triangles <= bound);

    let source_area: f32 = triangles.iter().map(|t| area(t.positions)).sum();
    let leaf_area: f32 = mesh
      .triangles()
      .map(|[a, b, c]| {
        area([
          mesh.positions[a as usize],
          mesh.positions[b as usize],
          mesh.positions[c as usize],
        ])
      })
      .sum();
    assert!((source_area - leaf_area).abs() < source_area * 1e-3, "seed {}", seed);
  }
}

// =============================================================================
// Culling
// =============================================================================

#[test]
fn test_culled_triangles_emitted_once_unsplit() {
  // 4x4 grid; columns x in [0, 2] lie entirely outside x >= 2.5
  let triangles = grid_triangles(4);
  let config = SubdivisionConfig::default()
    .with_max_depth(3)
    .with_subdivision_range(100.0)
    .with_near_field_distance(0.0);
  let context = SubdivisionContext::new(Vec3::new(3.5, 2.0, 0.0), Affine3A::IDENTITY, half_space_frustum(2.5), &config);

  let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();
  assert_eq!(mesh.stats.culled_triangles, 16);
  assert_eq!(mesh.stats.near_field_triangles, 0);
  assert_eq!(mesh.stats.leaf_triangles, 16 + 16 * 64);

  // Culled triangles keep their source corners
  let output: Vec<[Vec3; 3]> = mesh
    .triangles()
    .map(|tri| tri.map(|i| mesh.positions[i as usize]))
    .collect();
  for source in triangles.iter().filter(|t| t.positions.iter().all(|p| p.x < 2.5)) {
    assert!(output.contains(&source.positions), "culled triangle {:?} missing", source.positions);
  }
}

#[test]
fn test_near_field_ignores_frustum() {
  let triangles = grid_triangles(4);
  let config = SubdivisionConfig::default()
    .with_max_depth(3)
    .with_subdivision_range(0.0)
    .with_near_field_distance(100.0);
  let context = SubdivisionContext::new(Vec3::new(2.0, 2.0, 0.0), Affine3A::IDENTITY, half_space_frustum(100.0), &config);

  let mesh = subdivide_mesh(&triangles, &context, &config).unwrap();
  assert_eq!(mesh.stats.culled_triangles, 0);
  assert_eq!(mesh.stats.near_field_triangles, triangles.len() as u64);
  assert_eq!(mesh.stats.leaf_triangles, triangles.len() as u64 * 64);
  assert_eq!(mesh.stats.deepest_split, 3);
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_depth_zero_returns_source_mesh() {
  let triangles = grid_triangles(5);
  let config = SubdivisionConfig::default().with_max_depth(0);
  let mesh = subdivide_mesh(&triangles, &open_context(Vec3::new(2.0, 2.0, 0.0), &config), &config).unwrap();

  assert_eq!(mesh.triangle_count(), triangles.len());
  assert_eq!(mesh.vertex_count(), 36);
  for (source, tri) in triangles.iter().zip(mesh.triangles()) {
    assert_eq!(tri.map(|i| mesh.positions[i as usize]), source.positions);
    assert_eq!(tri.map(|i| mesh.colors[i as usize]), source.colors);
  }
}

#[test]
fn test_far_target_leaves_triangle_count_unchanged() {
  let triangles = jittered_grid(6, 7);
  let config = SubdivisionConfig::default().with_max_depth(4).with_subdivision_range(5.0);
  let mesh = subdivide_mesh(&triangles, &open_context(Vec3::splat(10_000.0), &config), &config).unwrap();

  assert_eq!(mesh.triangle_count(), triangles.len());
  assert_eq!(mesh.stats.deepest_split, 0);
}

#[test]
fn test_single_triangle_midpoint_attributes() {
  let tri = single_triangle();
  let config = SubdivisionConfig::default().with_max_depth(1).with_subdivision_range(100.0);
  let mesh = subdivide_mesh(&[tri], &open_context(tri.centroid(), &config), &config).unwrap();

  // Center child is the last leaf: [ab, bc, ca]
  let center: Vec<u32> = mesh.triangles().last().unwrap().to_vec();
  let [a, b, c] = tri.colors;
  assert_eq!(mesh.colors[center[0] as usize], (a + b) * 0.5);
  assert_eq!(mesh.colors[center[1] as usize], (b + c) * 0.5);
  assert_eq!(mesh.colors[center[2] as usize], (c + a) * 0.5);
}

#[test]
fn test_grid_key_mode_welds_near_duplicates() {
  // Two triangles whose shared edge is off by less than a cell
  let a = Triangle::from_positions([Vec3::ZERO, Vec3::X, Vec3::Y]);
  let b = Triangle::from_positions([Vec3::new(1.00001, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 1.00001, 0.0)]);
  let base = SubdivisionConfig::default().with_max_depth(0);
  let context = open_context(Vec3::ZERO, &base);

  let exact = subdivide_mesh(&[a, b], &context, &base).unwrap();
  assert_eq!(exact.vertex_count(), 6);

  let welded_config = base.with_key_mode(VertexKeyMode::Grid { cell_size: 0.001 });
  let welded = subdivide_mesh(&[a, b], &context, &welded_config).unwrap();
  assert_eq!(welded.vertex_count(), 4);
  assert_eq!(welded.indices, vec![0, 1, 2, 1, 3, 2]);
}
