//! Geometry uploader
//!
//! Flattens decoded OBJ shapes into self-contained [`Face`] records and
//! uploads one face buffer per shape, then the mesh table itself. Faces
//! trade memory for intersection-time cache behavior: no index chasing on
//! the device.

use log::{debug, warn};

use crate::device::{DeviceArena, DeviceBackend, DeviceBuffer, DeviceError, RawBuffer};

use super::data::{Face, MeshRecord, NO_TEXTURE};

/// Uploads every model as a mesh record owning a contiguous face buffer.
///
/// Empty shapes are kept in the mesh table with an empty face buffer so
/// shape indices stay stable. The whole mesh table is a single copy.
pub fn upload_meshes<B: DeviceBackend>(
    backend: &B,
    arena: &mut DeviceArena<B>,
    models: &[tobj::Model],
) -> Result<DeviceBuffer<MeshRecord>, DeviceError> {
    let mut records = Vec::with_capacity(models.len());

    for (i, model) in models.iter().enumerate() {
        let faces = build_faces(&model.mesh);
        if faces.is_empty() {
            warn!("geometry: shape '{}' has no faces, skipping upload", model.name);
            records.push(MeshRecord {
                faces: RawBuffer::EMPTY,
            });
            continue;
        }

        let label = format!("scene.mesh[{}].faces", i);
        let buffer = arena.upload(backend, &label, &faces)?;
        debug!(
            "geometry: shape '{}': {} faces uploaded",
            model.name,
            faces.len()
        );
        records.push(MeshRecord { faces: buffer.raw() });
    }

    arena.upload(backend, "scene.meshes", &records)
}

/// Assembles the host-side face array for one triangulated mesh.
///
/// Missing normal/texcoord attributes are zero-filled rather than treated
/// as a decode failure.
pub fn build_faces(mesh: &tobj::Mesh) -> Vec<Face> {
    let nb_faces = mesh.indices.len() / 3;
    let mut faces = Vec::with_capacity(nb_faces);

    let material_id = mesh
        .material_id
        .map(|id| id as i32)
        .unwrap_or(NO_TEXTURE);

    for triangle in mesh.indices.chunks_exact(3) {
        let mut vertices = [[0.0f32; 3]; 3];
        let mut normals = [[0.0f32; 3]; 3];
        let mut texcoords = [[0.0f32; 2]; 3];

        for (v, &index) in triangle.iter().enumerate() {
            let index = index as usize;
            vertices[v] = vec3_at(&mesh.positions, index);
            normals[v] = vec3_at(&mesh.normals, index);
            texcoords[v] = vec2_at(&mesh.texcoords, index);
        }

        faces.push(Face {
            vertices,
            normals,
            texcoords,
            tangent: face_tangent(&vertices, &texcoords),
            material_id,
        });
    }

    faces
}

/// Single per-face tangent from edge vectors and texcoord deltas.
///
/// Pure function of the three (vertex, texcoord) pairs. Not normalized; a
/// zero-area UV parameterization makes the denominator vanish and the
/// result non-finite. Callers get deterministic NaN/inf, not a panic.
pub fn face_tangent(vertices: &[[f32; 3]; 3], texcoords: &[[f32; 2]; 3]) -> [f32; 3] {
    let edge1 = [
        vertices[1][0] - vertices[0][0],
        vertices[1][1] - vertices[0][1],
        vertices[1][2] - vertices[0][2],
    ];
    let edge2 = [
        vertices[2][0] - vertices[0][0],
        vertices[2][1] - vertices[0][1],
        vertices[2][2] - vertices[0][2],
    ];
    let duv1 = [
        texcoords[1][0] - texcoords[0][0],
        texcoords[1][1] - texcoords[0][1],
    ];
    let duv2 = [
        texcoords[2][0] - texcoords[0][0],
        texcoords[2][1] - texcoords[0][1],
    ];

    let f = 1.0 / (duv1[0] * duv2[1] - duv2[0] * duv1[1]);

    [
        f * (duv2[1] * edge1[0] - duv1[1] * edge2[0]),
        f * (duv2[1] * edge1[1] - duv1[1] * edge2[1]),
        f * (duv2[1] * edge1[2] - duv1[1] * edge2[2]),
    ]
}

fn vec3_at(data: &[f32], index: usize) -> [f32; 3] {
    match data.get(3 * index..3 * index + 3) {
        Some(v) => [v[0], v[1], v[2]],
        None => [0.0; 3],
    }
}

fn vec2_at(data: &[f32], index: usize) -> [f32; 2] {
    match data.get(2 * index..2 * index + 2) {
        Some(v) => [v[0], v[1]],
        None => [0.0; 2],
    }
}
