use std::f32::consts::PI;

use na::{vector, Vector2, Vector3};
use nalgebra as na;

use crate::model::Model;
use crate::shader::{transform_vertex, Payload, Shader, Uniforms};

/// Cook-Torrance shading with a single point light plus image-based ambient
/// lighting when the baked maps are available. Falls back to a small constant
/// ambient term otherwise, so an unbaked scene still renders.
#[derive(Default)]
pub struct PbrShader {
    pub uniforms: Uniforms,
    pub payload: Payload,
}

impl PbrShader {
    pub fn new() -> PbrShader {
        return PbrShader::default();
    }
}

impl Shader for PbrShader {
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
        let geometric_normal = self.payload.interpolate_normal(alpha, beta, gamma).normalize();

        let albedo = model.diffuse(uv);
        let roughness = model.roughness(uv);
        let metalness = model.metalness(uv);
        let occlusion = model.occlusion(uv);
        let emission = model.emission(uv);

        let normal = match model.normal_at(uv) {
            Some(tangent_normal) => {
                perturb_normal(&self.payload, geometric_normal, tangent_normal)
            }
            None => geometric_normal,
        };

        let light = self.uniforms.light;
        let view_dir = (self.uniforms.eye - world_pos).normalize();
        let light_dir = (light.position - world_pos).normalize();
        let half_dir = (view_dir + light_dir).normalize();

        let n_dot_v = normal.dot(&view_dir).max(0.0);
        let n_dot_l = normal.dot(&light_dir).max(0.0);

        // Dielectrics reflect about 4% at normal incidence; metals tint the
        // reflection with their albedo.
        let f0 = Vector3::from_element(0.04).lerp(&albedo, metalness);

        let mut lo = Vector3::zeros();
        if n_dot_l > 0.0 {
            let d = distribution_ggx(normal, half_dir, roughness);
            let g = geometry_smith_direct(n_dot_v, n_dot_l, roughness);
            let f = fresnel_schlick(half_dir.dot(&view_dir).max(0.0), f0);

            let specular = d * g * f / (4.0 * n_dot_v * n_dot_l + 0.001);
            let k_d = (Vector3::from_element(1.0) - f) * (1.0 - metalness);

            lo = (k_d.component_mul(&albedo) / PI + specular)
                .component_mul(&light.intensity)
                * n_dot_l;
        }

        let ambient = match self.ambient_ibl(model, normal, view_dir, n_dot_v, albedo, roughness, metalness) {
            Some(ambient) => ambient * occlusion,
            None => 0.03 * albedo * occlusion,
        };

        let mut color = lo + ambient + emission;
        color = vector![
            float_aces(color.x),
            float_aces(color.y),
            float_aces(color.z)
        ];
        return color * 255.0;
    }
}

impl PbrShader {
    /// Split-sum ambient term. None unless the irradiance map, the prefilter
    /// chain and the BRDF lookup table are all loaded.
    fn ambient_ibl(
        &self,
        model: &Model,
        normal: Vector3<f32>,
        view_dir: Vector3<f32>,
        n_dot_v: f32,
        albedo: Vector3<f32>,
        roughness: f32,
        metalness: f32,
    ) -> Option<Vector3<f32>> {
        let irradiance = model.irradiance(normal)?;
        let reflected = 2.0 * normal.dot(&view_dir) * normal - view_dir;
        let prefiltered = model.prefiltered(reflected, roughness)?;
        let (scale, bias) = model.brdf(n_dot_v, roughness)?;

        let f = fresnel_schlick_roughness(n_dot_v, f0_of(albedo, metalness), roughness);
        let k_d = (Vector3::from_element(1.0) - f) * (1.0 - metalness);

        let diffuse = irradiance.component_mul(&albedo);
        let specular = prefiltered.component_mul(&(f * scale + Vector3::from_element(bias)));
        return Some(k_d.component_mul(&diffuse) + specular);
    }
}

fn f0_of(albedo: Vector3<f32>, metalness: f32) -> Vector3<f32> {
    return Vector3::from_element(0.04).lerp(&albedo, metalness);
}

/// GGX normal distribution, the D term.
fn distribution_ggx(n: Vector3<f32>, h: Vector3<f32>, roughness: f32) -> f32 {
    let a2 = roughness * roughness * roughness * roughness;
    let n_dot_h = n.dot(&h).max(0.0);
    let denom = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * denom * denom);
}

/// Schlick-GGX with the direct-lighting remap k = (r + 1)^2 / 8. The baked
/// maps use the IBL remap instead, which lives next to them in the sampler.
fn geometry_schlick_direct(n_dot_x: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = r * r / 8.0;
    return n_dot_x / (n_dot_x * (1.0 - k) + k);
}

fn geometry_smith_direct(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    return geometry_schlick_direct(n_dot_v, roughness)
        * geometry_schlick_direct(n_dot_l, roughness);
}

fn fresnel_schlick(cos_theta: f32, f0: Vector3<f32>) -> Vector3<f32> {
    return f0 + (Vector3::from_element(1.0) - f0) * (1.0 - cos_theta).powi(5);
}

/// Roughness-aware Fresnel for the ambient term; rough surfaces cap the
/// grazing reflectance below 1.
fn fresnel_schlick_roughness(cos_theta: f32, f0: Vector3<f32>, roughness: f32) -> Vector3<f32> {
    let max_reflectance = Vector3::from_element(1.0 - roughness).sup(&f0);
    return f0 + (max_reflectance - f0) * (1.0 - cos_theta).powi(5);
}

/// ACES filmic tone map followed by gamma 2.2 encoding, per channel.
fn float_aces(value: f32) -> f32 {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    let mapped = (value * (a * value + b)) / (value * (c * value + d) + e);
    return mapped.clamp(0.0, 1.0).powf(1.0 / 2.2);
}

/// Bends the interpolated normal by the tangent-space sample from the normal
/// map. The tangent frame comes from the active triangle's world-space edges
/// and uv edges, orthogonalised against the surface normal.
fn perturb_normal(
    payload: &Payload,
    normal: Vector3<f32>,
    tangent_normal: Vector3<f32>,
) -> Vector3<f32> {
    let edge1 = payload.triangle[1].world_pos - payload.triangle[0].world_pos;
    let edge2 = payload.triangle[2].world_pos - payload.triangle[0].world_pos;
    let delta_uv1: Vector2<f32> = payload.triangle[1].uv - payload.triangle[0].uv;
    let delta_uv2: Vector2<f32> = payload.triangle[2].uv - payload.triangle[0].uv;

    let determinant = delta_uv1.x * delta_uv2.y - delta_uv2.x * delta_uv1.y;
    if determinant.abs() < 1.0e-8 {
        // Degenerate uv mapping, no tangent frame to build.
        return normal;
    }

    let tangent = (delta_uv2.y * edge1 - delta_uv1.y * edge2) / determinant;
    let tangent = (tangent - tangent.dot(&normal) * normal).normalize();
    let bitangent = normal.cross(&tangent);

    return (tangent * tangent_normal.x + bitangent * tangent_normal.y + normal * tangent_normal.z)
        .normalize();
}
