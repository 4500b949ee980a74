//! Mesh handles.
//!
//! Vertex and index buffers live in the backend. A [`Mesh`] is a small
//! copyable description of such an upload; render commands carry it by value
//! and never own the underlying buffers.

/// Opaque handle to uploaded vertex/index buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u32);

/// Primitive assembly mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    #[default]
    Triangles,
    TriangleStrip,
}

/// A drawable mesh as seen by the render core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Mesh {
    pub id: MeshId,
    pub topology: Topology,
    /// Number of indices when `indexed`, otherwise number of vertices.
    pub element_count: u32,
    pub indexed: bool,
}

/// CPU-side vertex data handed to the backend for upload.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub label: &'static str,
    pub topology: Topology,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub indices: Option<Vec<u32>>,
}

impl MeshData {
    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.positions.len() as u32
    }

    /// The count a draw of this mesh submits.
    #[must_use]
    pub fn element_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertex_count(),
        }
    }
}
