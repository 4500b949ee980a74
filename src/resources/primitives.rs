//! Built-in geometry used by the renderer's internal passes.
//!
//! - [`screen_quad`]: NDC quad for full-screen passes and post-process materials
//! - [`unit_cube`]: cube used for cubemap capture passes
//! - [`uv_sphere`]: light volumes, irradiance probe volumes, debug spheres

use std::f32::consts::PI;

use super::mesh::{MeshData, Topology};

/// Full-screen quad in normalized device coordinates, drawn as a strip.
#[must_use]
pub fn screen_quad() -> MeshData {
    MeshData {
        label: "Screen Quad",
        topology: Topology::TriangleStrip,
        positions: vec![
            [-1.0, 1.0, 0.0],
            [-1.0, -1.0, 0.0],
            [1.0, 1.0, 0.0],
            [1.0, -1.0, 0.0],
        ],
        normals: vec![[0.0, 0.0, 1.0]; 4],
        uvs: vec![[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]],
        indices: None,
    }
}

/// Unit cube spanning [-1, 1] on every axis, 24 vertices with face normals.
#[must_use]
pub fn unit_cube() -> MeshData {
    // (normal, tangent u, tangent v)
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];

    let mut data = MeshData {
        label: "Unit Cube",
        topology: Topology::Triangles,
        ..Default::default()
    };
    let mut indices = Vec::with_capacity(36);

    for (n, u, v) in faces {
        let base = data.positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            data.positions.push([
                n[0] + u[0] * su + v[0] * sv,
                n[1] + u[1] * su + v[1] * sv,
                n[2] + u[2] * su + v[2] * sv,
            ]);
            data.normals.push(n);
            data.uvs.push([(su + 1.0) * 0.5, (sv + 1.0) * 0.5]);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    data.indices = Some(indices);
    data
}

/// Unit-radius UV sphere.
#[must_use]
pub fn uv_sphere(width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);

    let mut data = MeshData {
        label: "UV Sphere",
        topology: Topology::Triangles,
        ..Default::default()
    };

    for y in 0..=height_segments {
        let v_ratio = y as f32 / height_segments as f32;
        let theta = v_ratio * PI;
        let py = -theta.cos();
        let ring_radius = theta.sin();

        for x in 0..=width_segments {
            let u_ratio = x as f32 / width_segments as f32;
            let phi = u_ratio * 2.0 * PI;

            let p = [-ring_radius * phi.cos(), py, ring_radius * phi.sin()];
            data.positions.push(p);
            data.normals.push(p);
            data.uvs.push([u_ratio, 1.0 - v_ratio]);
        }
    }

    let stride = width_segments + 1;
    let mut indices = Vec::with_capacity((width_segments * height_segments * 6) as usize);
    for y in 0..height_segments {
        for x in 0..width_segments {
            let v0 = y * stride + x;
            let v1 = v0 + 1;
            let v2 = (y + 1) * stride + x;
            let v3 = v2 + 1;
            indices.extend_from_slice(&[v0, v1, v2, v1, v3, v2]);
        }
    }

    data.indices = Some(indices);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_vertices_lie_on_unit_radius() {
        let sphere = uv_sphere(16, 16);
        for p in &sphere.positions {
            let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-5);
        }
        assert_eq!(sphere.element_count(), 16 * 16 * 6);
    }

    #[test]
    fn cube_has_six_quads() {
        let cube = unit_cube();
        assert_eq!(cube.vertex_count(), 24);
        assert_eq!(cube.element_count(), 36);
    }
}
