use na::Vector3;
use nalgebra as na;

use crate::model::Model;
use crate::shader::{transform_vertex, Payload, Shader, Uniforms};

const AMBIENT: f32 = 0.35;
const DIFFUSE: f32 = 0.9;
const SPECULAR: f32 = 0.15;
const SPECULAR_EXPONENT: f32 = 150.0;

/// Blinn-Phong shading off the diffuse map alone. Cheap compared to the PBR
/// shader, handy as a preview mode.
#[derive(Default)]
pub struct PhongShader {
    pub uniforms: Uniforms,
    pub payload: Payload,
}

impl PhongShader {
    pub fn new() -> PhongShader {
        return PhongShader::default();
    }
}

impl Shader for PhongShader {
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
        transform_vertex(&self.uniforms, &mut self.payload, model, face, vert);
    }

    fn fragment_shader(&self, model: &Model, alpha: f32, beta: f32, gamma: f32) -> Vector3<f32> {
        let uv = self.payload.interpolate_uv(alpha, beta, gamma);
        let world_pos = self.payload.interpolate_world_pos(alpha, beta, gamma);
        let normal = self.payload.interpolate_normal(alpha, beta, gamma).normalize();

        let albedo = model.diffuse(uv);
        let light = self.uniforms.light;

        let light_dir = (light.position - world_pos).normalize();
        let view_dir = (self.uniforms.eye - world_pos).normalize();
        let half_dir = (light_dir + view_dir).normalize();

        let diffuse = DIFFUSE * normal.dot(&light_dir).max(0.0);
        let specular = SPECULAR * normal.dot(&half_dir).max(0.0).powf(SPECULAR_EXPONENT);

        let color = albedo.component_mul(&light.intensity) * (AMBIENT + diffuse)
            + light.intensity * specular;
        return color * 255.0;
    }
}
