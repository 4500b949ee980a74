//! Scene-side collaborators of the renderer.
//!
//! - Camera: view/projection state and frustum
//! - Light: directional and point lights pushed per frame
//! - SceneNode: renderable hierarchy traversed by `Renderer::push_node`

pub mod camera;
pub mod light;
pub mod node;

pub use camera::{Camera, Frustum, Plane};
pub use light::{DirectionalLight, PointLight};
pub use node::{SceneNode, transform_aabb};
