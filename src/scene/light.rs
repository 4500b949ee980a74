use glam::Vec3;

/// Sun-style light shining along `direction`.
///
/// Pushed into the renderer once per frame; only the first four are written
/// into the global uniform block, and at most four of those with
/// `cast_shadows` receive a shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadows: bool,
}

impl DirectionalLight {
    #[must_use]
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or(Vec3::NEG_Y),
            color,
            intensity,
            cast_shadows: true,
        }
    }

    /// Colour premultiplied by intensity, as the lighting shaders expect.
    #[inline]
    #[must_use]
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(Vec3::new(0.2, -1.0, 0.25), Vec3::ONE, 1.0)
    }
}

/// Omni light with a finite influence radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    /// Whether the light's debug mesh is drawn when light rendering is on.
    pub visible: bool,
}

impl PointLight {
    #[must_use]
    pub fn new(position: Vec3, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            radius,
            visible: true,
        }
    }

    #[inline]
    #[must_use]
    pub fn radiance(&self) -> Vec3 {
        self.color * self.intensity
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE, 1.0, 1.0)
    }
}
