use std::collections::BTreeMap;

use glam::{Quat, Vec3};
use parry3d::math::{Pose3, Vector};
use parry3d::query::{Ray, RayCast};
use parry3d::shape::TriMesh;
use serde::{Deserialize, Serialize};

use crate::channel::{CollisionProfile, TraceFilter};

/// Opaque, non-owning reference to a world primitive.
///
/// Holding a handle keeps nothing alive; resolve it through
/// [`WorldQuery::is_alive`] before every use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrimitiveHandle(u64);

impl PrimitiveHandle {
    /// For hosts that implement [`WorldQuery`] over their own scene ids.
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

/// Nearest blocking hit of a ray.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHit {
    pub distance: f32,
    pub point: Vec3,
    /// Surface normal, facing back along the ray.
    pub normal: Vec3,
    pub primitive: PrimitiveHandle,
}

/// World/collision queries the mantling pipeline depends on.
pub trait WorldQuery {
    /// Cast a ray and return the nearest hit accepted by `filter`.
    /// `dir` does not need to be normalized.
    fn cast_ray(&self, origin: Vec3, dir: Vec3, max_dist: f32, filter: &TraceFilter)
    -> Option<TraceHit>;

    fn is_alive(&self, primitive: PrimitiveHandle) -> bool;

    /// `None` once the primitive is gone.
    fn primitive_velocity(&self, primitive: PrimitiveHandle) -> Option<Vec3>;

    /// `None` once the primitive is gone.
    fn primitive_location(&self, primitive: PrimitiveHandle) -> Option<Vec3>;
}

struct Primitive {
    /// Vertices relative to `location`.
    local_vertices: Vec<Vec3>,
    indices: Vec<[u32; 3]>,
    trimesh: TriMesh,
    profile: CollisionProfile,
    location: Vec3,
    velocity: Vec3,
}

impl Primitive {
    fn build_trimesh(local_vertices: &[Vec3], indices: &[[u32; 3]], location: Vec3) -> Option<TriMesh> {
        let vertices: Vec<Vector> = local_vertices
            .iter()
            .map(|v| {
                let w = *v + location;
                Vector::new(w.x, w.y, w.z)
            })
            .collect();
        TriMesh::new(vertices, indices.to_vec()).ok()
    }
}

/// Triangle-mesh world. Every primitive is baked into world space, so all
/// queries run with the identity pose.
#[derive(Default)]
pub struct PhysicsWorld {
    primitives: BTreeMap<PrimitiveHandle, Primitive>,
    next_id: u64,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh whose vertices are given relative to `location`.
    /// Returns `None` for empty or degenerate meshes.
    pub fn add_mesh(
        &mut self,
        location: Vec3,
        vertices: &[Vec3],
        indices: &[[u32; 3]],
        profile: CollisionProfile,
    ) -> Option<PrimitiveHandle> {
        if vertices.is_empty() || indices.is_empty() {
            return None;
        }
        let trimesh = Primitive::build_trimesh(vertices, indices, location)?;

        let handle = PrimitiveHandle(self.next_id);
        self.next_id += 1;
        self.primitives.insert(
            handle,
            Primitive {
                local_vertices: vertices.to_vec(),
                indices: indices.to_vec(),
                trimesh,
                profile,
                location,
                velocity: Vec3::ZERO,
            },
        );
        Some(handle)
    }

    /// Static level geometry already in world space.
    pub fn add_static_mesh(&mut self, vertices: &[Vec3], indices: &[[u32; 3]]) -> Option<PrimitiveHandle> {
        self.add_mesh(Vec3::ZERO, vertices, indices, CollisionProfile::world_static())
    }

    pub fn add_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        profile: CollisionProfile,
    ) -> Option<PrimitiveHandle> {
        self.add_oriented_box(center, half_extents, Quat::IDENTITY, profile)
    }

    pub fn add_oriented_box(
        &mut self,
        center: Vec3,
        half_extents: Vec3,
        rotation: Quat,
        profile: CollisionProfile,
    ) -> Option<PrimitiveHandle> {
        let (vertices, indices) = box_mesh(half_extents, rotation);
        self.add_mesh(center, &vertices, &indices, profile)
    }

    pub fn remove(&mut self, primitive: PrimitiveHandle) -> bool {
        self.primitives.remove(&primitive).is_some()
    }

    pub fn set_velocity(&mut self, primitive: PrimitiveHandle, velocity: Vec3) -> bool {
        match self.primitives.get_mut(&primitive) {
            Some(p) => {
                p.velocity = velocity;
                true
            }
            None => false,
        }
    }

    /// Move a primitive and rebake its mesh.
    pub fn translate(&mut self, primitive: PrimitiveHandle, delta: Vec3) -> bool {
        let Some(p) = self.primitives.get_mut(&primitive) else {
            return false;
        };
        let location = p.location + delta;
        match Primitive::build_trimesh(&p.local_vertices, &p.indices, location) {
            Some(trimesh) => {
                p.trimesh = trimesh;
                p.location = location;
                true
            }
            None => false,
        }
    }

    /// Advance every moving primitive by its velocity.
    pub fn step(&mut self, dt: f32) {
        let moving: Vec<(PrimitiveHandle, Vec3)> = self
            .primitives
            .iter()
            .filter(|(_, p)| p.velocity != Vec3::ZERO)
            .map(|(h, p)| (*h, p.velocity * dt))
            .collect();
        for (handle, delta) in moving {
            self.translate(handle, delta);
        }
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }
}

impl WorldQuery for PhysicsWorld {
    fn cast_ray(
        &self,
        origin: Vec3,
        dir: Vec3,
        max_dist: f32,
        filter: &TraceFilter,
    ) -> Option<TraceHit> {
        let dir = dir.normalize_or_zero();
        if dir == Vec3::ZERO || max_dist <= 0.0 {
            return None;
        }
        let ray = Ray::new(
            Vector::new(origin.x, origin.y, origin.z),
            Vector::new(dir.x, dir.y, dir.z),
        );

        let mut best: Option<TraceHit> = None;
        for (handle, primitive) in &self.primitives {
            if !filter.accepts(&primitive.profile) {
                continue;
            }
            let Some(hit) =
                primitive
                    .trimesh
                    .cast_ray_and_get_normal(&Pose3::IDENTITY, &ray, max_dist, true)
            else {
                continue;
            };
            if best.is_some_and(|b| b.distance <= hit.time_of_impact) {
                continue;
            }

            let mut normal = Vec3::new(hit.normal.x, hit.normal.y, hit.normal.z).normalize_or_zero();
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            best = Some(TraceHit {
                distance: hit.time_of_impact,
                point: origin + dir * hit.time_of_impact,
                normal,
                primitive: *handle,
            });
        }
        best
    }

    fn is_alive(&self, primitive: PrimitiveHandle) -> bool {
        self.primitives.contains_key(&primitive)
    }

    fn primitive_velocity(&self, primitive: PrimitiveHandle) -> Option<Vec3> {
        self.primitives.get(&primitive).map(|p| p.velocity)
    }

    fn primitive_location(&self, primitive: PrimitiveHandle) -> Option<Vec3> {
        self.primitives.get(&primitive).map(|p| p.location)
    }
}

/// Twelve-triangle box centred on the origin.
pub fn box_mesh(half_extents: Vec3, rotation: Quat) -> (Vec<Vec3>, Vec<[u32; 3]>) {
    let h = half_extents.abs();
    let vertices = [
        Vec3::new(-h.x, -h.y, -h.z),
        Vec3::new(h.x, -h.y, -h.z),
        Vec3::new(h.x, h.y, -h.z),
        Vec3::new(-h.x, h.y, -h.z),
        Vec3::new(-h.x, -h.y, h.z),
        Vec3::new(h.x, -h.y, h.z),
        Vec3::new(h.x, h.y, h.z),
        Vec3::new(-h.x, h.y, h.z),
    ]
    .iter()
    .map(|v| rotation * *v)
    .collect();

    let indices = vec![
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 6, 2],
        [3, 7, 6],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ];
    (vertices, indices)
}
