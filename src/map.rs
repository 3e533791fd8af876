use std::path::Path;

use glam::Vec3;

use crate::collision::{PhysicsWorld, PrimitiveHandle};
use crate::config::{MAP_UNIT_SCALE, SPAWN_LIFT};
use crate::error::MapError;

/// Collision triangles read from a GLB, in world centimeters.
pub struct CollisionMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    pub bounds_min: Vec3,
    pub bounds_max: Vec3,
}

impl CollisionMesh {
    /// Center of the map, slightly above its highest point.
    pub fn spawn_point(&self) -> Vec3 {
        let center = (self.bounds_min + self.bounds_max) / 2.0;
        Vec3::new(center.x, self.bounds_max.y + SPAWN_LIFT, center.z)
    }

    /// Build a world holding the whole map as one static primitive.
    pub fn into_world(self) -> Result<(PhysicsWorld, PrimitiveHandle), MapError> {
        let mut world = PhysicsWorld::new();
        let handle = world
            .add_static_mesh(&self.vertices, &self.indices)
            .ok_or(MapError::InvalidMesh)?;
        Ok((world, handle))
    }
}

pub fn load_collision_from_path(path: &Path) -> Result<CollisionMesh, MapError> {
    let (document, buffers, _images) = gltf::import(path)?;
    collect_collision(&document, &buffers)
}

pub fn load_collision_from_bytes(data: &[u8]) -> Result<CollisionMesh, MapError> {
    let (document, buffers, _images) = gltf::import_slice(data)?;
    collect_collision(&document, &buffers)
}

fn collect_collision(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
) -> Result<CollisionMesh, MapError> {
    let mut vertices: Vec<Vec3> = Vec::new();
    let mut indices: Vec<[u32; 3]> = Vec::new();
    let mut dropped = 0usize;

    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|b| &b.0[..]));

            let positions: Vec<[f32; 3]> = reader
                .read_positions()
                .map(|iter| iter.collect())
                .unwrap_or_default();
            if positions.is_empty() {
                continue;
            }

            let count = positions.len() as u32;
            let flat: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_else(|| (0..count).collect());

            let base = vertices.len() as u32;
            vertices.extend(positions.iter().map(|p| Vec3::from_array(*p) * MAP_UNIT_SCALE));

            for tri in flat.chunks_exact(3) {
                if tri.iter().any(|&i| i >= count) {
                    dropped += 1;
                    continue;
                }
                indices.push([base + tri[0], base + tri[1], base + tri[2]]);
            }
        }
    }

    if dropped > 0 {
        log::warn!("Dropped {dropped} collision triangles with out-of-range indices");
    }
    if indices.is_empty() {
        return Err(MapError::Empty);
    }

    let (bounds_min, bounds_max) = vertices.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(lo, hi), v| (lo.min(*v), hi.max(*v)),
    );

    log::info!("Map bounds: min={:?}, max={:?}", bounds_min, bounds_max);
    log::info!(
        "Loaded collision: {} vertices, {} triangles",
        vertices.len(),
        indices.len()
    );

    Ok(CollisionMesh {
        vertices,
        indices,
        bounds_min,
        bounds_max,
    })
}
