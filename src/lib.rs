pub mod app;
pub mod camera;
pub mod model;
pub mod rasterizer;
pub mod sampler;
pub mod shader;
pub mod util;
