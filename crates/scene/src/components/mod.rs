mod camera;
mod light;
mod material;
mod model;
mod transform;

pub use camera::{Camera, MIN_Z_NEAR, Projection};
pub use light::{
    AmbientLight, DirectionalLight, Light, LightKind, PointLight, SPOT_COS_EPSILON, SpotLight,
};
pub use material::Material;
pub use model::Model;
pub use transform::Transform;
