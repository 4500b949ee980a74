use glam::{Mat4, Vec3, Vec4};

/// Perspective camera as consumed by the renderer.
///
/// Scene code owns the camera and hands a copy to the renderer each frame via
/// [`Renderer::set_camera`](crate::renderer::Renderer::set_camera). The cached
/// matrices and frustum are refreshed by every mutator, so the renderer only
/// ever reads them.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub forward: Vec3,
    pub up: Vec3,

    // === Projection ===
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,

    // Cached matrices, read-only for the renderer
    pub(crate) view_matrix: Mat4,
    pub(crate) projection_matrix: Mat4,
    pub(crate) frustum: Frustum,
}

impl Camera {
    /// `fov` is given in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            position: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            up: Vec3::Y,
            fov: fov.to_radians(),
            aspect,
            near,
            far,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.update_view_matrix();
        cam.update_projection_matrix();
        cam
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far);
        self.frustum = Frustum::from_matrix(self.view_projection());
    }

    fn update_view_matrix(&mut self) {
        self.view_matrix = Mat4::look_to_rh(self.position, self.forward, self.up);
        self.frustum = Frustum::from_matrix(self.view_projection());
    }

    /// Places the camera at `position` looking along `forward`.
    pub fn look_to(&mut self, position: Vec3, forward: Vec3, up: Vec3) {
        self.position = position;
        self.forward = forward.normalize_or(Vec3::NEG_Z);
        self.up = up;
        self.update_view_matrix();
    }

    pub fn look_at(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.look_to(position, target - position, up);
    }

    pub fn set_perspective(&mut self, fov_radians: f32, aspect: f32, near: f32, far: f32) {
        self.fov = fov_radians;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self.update_projection_matrix();
    }

    /// A copy of this camera re-targeted to a different aspect ratio.
    #[must_use]
    pub fn with_aspect(&self, aspect: f32) -> Self {
        let mut cam = self.clone();
        cam.aspect = aspect;
        cam.update_projection_matrix();
        cam
    }

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix * self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }
}

/// A plane in Hessian normal form: `dot(normal, p) + distance = 0`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Normalises a raw `(a, b, c, d)` plane so that `normal` has unit length.
    #[must_use]
    pub fn from_vec4(v: Vec4) -> Self {
        let normal = v.truncate();
        let length = normal.length();
        if length <= f32::EPSILON {
            return Self::default();
        }
        Self {
            normal: normal / length,
            distance: v.w / length,
        }
    }

    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Plane; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a `[0, 1]` depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        Self {
            planes: [
                Plane::from_vec4(rows[3] + rows[0]), // Left
                Plane::from_vec4(rows[3] - rows[0]), // Right
                Plane::from_vec4(rows[3] + rows[1]), // Bottom
                Plane::from_vec4(rows[3] - rows[1]), // Top
                Plane::from_vec4(rows[2]),           // Near
                Plane::from_vec4(rows[3] - rows[2]), // Far
            ],
        }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.signed_distance(center) >= -radius)
    }

    /// Conservative AABB test: per plane, only the corner furthest along the
    /// plane normal is checked. Never rejects a visible box; may accept a box
    /// that lies outside near a frustum edge.
    pub fn intersects_box(&self, min: Vec3, max: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let positive = Vec3::select(plane.normal.cmpge(Vec3::ZERO), max, min);
            plane.signed_distance(positive) >= 0.0
        })
    }
}
