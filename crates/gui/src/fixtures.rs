//! Factory functions for ready-made mesh providers.
//!
//! The "domain" and "image" meshes share one topology, so element ids line
//! up between the two views the way an engine's parameter domain and its
//! mapped image do.

use glam::Vec3;
use shared::DebugGroup;

use crate::provider::{MeshDataProvider, StaticMeshProvider};
use crate::viewport::mesh::{self, MeshData};

pub const FACE_COLOR: [f32; 3] = [0.62, 0.66, 0.72];
pub const EDGE_COLOR: [f32; 3] = [0.12, 0.12, 0.14];

/// Side length of the fixture grids in world units
pub const GRID_EXTENT: f32 = 3.0;

/// Flat `n x n` grid centred on the origin
pub fn domain_mesh(n: u32) -> MeshData {
    let n = n.max(1);
    mesh::grid(n, n, GRID_EXTENT / n as f32)
}

/// `domain_mesh` pushed through a smooth in-plane warp (same topology)
pub fn image_mesh(n: u32) -> MeshData {
    domain_mesh(n).warped(|p| {
        let k = std::f32::consts::FRAC_PI_2;
        Vec3::new(
            p.x + 0.15 * (p.y * k).sin(),
            p.y + 0.15 * (p.x * k).sin(),
            p.z,
        )
    })
}

pub fn domain_provider(n: u32) -> StaticMeshProvider {
    StaticMeshProvider::new(domain_mesh(n), FACE_COLOR, EDGE_COLOR)
        .with_debug_group(DebugGroup::new("map").with("kind", "identity").with("resolution", n))
}

pub fn image_provider(n: u32) -> StaticMeshProvider {
    StaticMeshProvider::new(image_mesh(n), FACE_COLOR, EDGE_COLOR)
        .with_debug_group(DebugGroup::new("map").with("kind", "sine warp").with("resolution", n))
}

pub fn cube_provider(size: f32) -> StaticMeshProvider {
    StaticMeshProvider::new(mesh::cube(size, size, size), FACE_COLOR, EDGE_COLOR)
}

/// Box a provider for a viewport
pub fn boxed(provider: StaticMeshProvider) -> Box<dyn MeshDataProvider> {
    Box::new(provider)
}
