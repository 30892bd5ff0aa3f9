use na::Vector3;
use nalgebra as na;

use crate::model::Model;
use crate::sampler::cubemap_sample;
use crate::shader::{ClipVertex, Payload, Shader, Uniforms};
use crate::util::to_hom_point;

/// Samples the environment cubemap through the interpolated cube position.
/// The skybox model is drawn without clipping or culling, and the driver
/// zeroes the view translation so the cube stays glued to the camera.
#[derive(Default)]
pub struct SkyboxShader {
    pub uniforms: Uniforms,
    pub payload: Payload,
}

impl SkyboxShader {
    pub fn new() -> SkyboxShader {
        return SkyboxShader::default();
    }
}

impl Shader for SkyboxShader {
    fn uniforms(&self) -> &Uniforms {
        return &self.uniforms;
    }

    fn uniforms_mut(&mut self) -> &mut Uniforms {
        return &mut self.uniforms;
    }

    fn payload(&self) -> &Payload {
        return &self.payload;
    }

    fn payload_mut(&mut self) -> &mut Payload {
        return &mut self.payload;
    }

    fn vertex_shader(&mut self, model: &Model, face: usize, vert: usize) {
        let position = model.vertex(face, vert);
        self.payload.polygon[vert] = ClipVertex {
            clip_pos: self.uniforms.mvp_matrix * to_hom_point(position),
            // The raw cube corner doubles as the sampling direction.
            world_pos: position,
            normal: model.normal(face, vert),
            uv: model.uv(face, vert),
        };
    }

    fn fragment_shader(&self, model: &Model, alpha: f32, beta: f32, gamma: f32) -> Vector3<f32> {
        let direction = self
            .payload
            .interpolate_world_pos(alpha, beta, gamma)
            .normalize();
        let color = match &model.environment_map {
            Some(environment) => cubemap_sample(direction, environment),
            None => Vector3::zeros(),
        };
        return color * 255.0;
    }
}
