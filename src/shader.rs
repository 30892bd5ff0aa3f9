pub mod phong;
pub mod pbr;
pub mod skybox;

use na::{vector, Matrix4, Vector2, Vector3, Vector4};
use nalgebra as na;

use crate::model::Model;
use crate::util::{from_hom_point, from_hom_vector, to_hom_point, to_hom_vector};

/// Upper bound on the vertex count of a clipped polygon: 3 input vertices
/// plus at most one new vertex per clip plane.
pub const MAX_CLIP_VERTICES: usize = 10;

/// One vertex worth of attributes travelling through the pipeline.
/// Produced by the vertex stage, consumed by clipping and interpolation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipVertex {
    pub clip_pos: Vector4<f32>,  // Homogenous clip-space position.
    pub world_pos: Vector3<f32>, // Position before view and projection.
    pub normal: Vector3<f32>,
    pub uv: Vector2<f32>,
}

impl ClipVertex {
    /// Linear interpolation of the full attribute set, used when a polygon
    /// edge crosses a clip plane.
    pub fn lerp(a: &ClipVertex, b: &ClipVertex, t: f32) -> ClipVertex {
        return ClipVertex {
            clip_pos: a.clip_pos + (b.clip_pos - a.clip_pos) * t,
            world_pos: a.world_pos + (b.world_pos - a.world_pos) * t,
            normal: a.normal + (b.normal - a.normal) * t,
            uv: a.uv + (b.uv - a.uv) * t,
        };
    }
}

/// Point light description shared by all lit shaders.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub position: Vector3<f32>,
    pub intensity: Vector3<f32>,
}

impl Default for Light {
    fn default() -> Self {
        return Self {
            position: vector![0.0, 0.0, 1.0],
            intensity: vector![1.0, 1.0, 1.0],
        };
    }
}

/// Frame constants owned by a shader, mutated once per frame before draw.
pub struct Uniforms {
    pub model_matrix: Matrix4<f32>,
    pub view_matrix: Matrix4<f32>,
    pub projection_matrix: Matrix4<f32>,
    pub mvp_matrix: Matrix4<f32>,
    pub it_model_matrix: Matrix4<f32>, // Inverse-transpose, applied to normals.
    pub light: Light,
    pub eye: Vector3<f32>,
}

impl Default for Uniforms {
    fn default() -> Self {
        return Self {
            model_matrix: Matrix4::identity(),
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
            mvp_matrix: Matrix4::identity(),
            it_model_matrix: Matrix4::identity(),
            light: Light::default(),
            eye: Vector3::zeros(),
        };
    }
}

impl Uniforms {
    /// Refreshes all derived matrices from the model/view/projection triple.
    pub fn update_matrices(
        &mut self,
        model: Matrix4<f32>,
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
    ) {
        self.model_matrix = model;
        self.view_matrix = view;
        self.projection_matrix = projection;
        self.mvp_matrix = projection * view * model;
        // A singular model matrix collapses the geometry anyway, so falling
        // back to identity just keeps the normals finite.
        self.it_model_matrix = model
            .try_inverse()
            .unwrap_or_else(Matrix4::identity)
            .transpose();
    }
}

/// Per-primitive scratch storage. The vertex stage fills the first 3 polygon
/// slots, the clipper may grow the polygon, and `select_triangle` picks the
/// active fan triangle consumed by the fragment stage. Overwritten each face.
#[derive(Default)]
pub struct Payload {
    pub polygon: [ClipVertex; MAX_CLIP_VERTICES],
    pub polygon_len: usize,
    pub triangle: [ClipVertex; 3],
}

impl Payload {
    /// Copies three polygon vertices into the active triangle slots.
    pub fn select_triangle(&mut self, i0: usize, i1: usize, i2: usize) {
        self.triangle[0] = self.polygon[i0];
        self.triangle[1] = self.polygon[i1];
        self.triangle[2] = self.polygon[i2];
    }

    /// Perspective-correct interpolation factor Z = 1 / (alpha/w0 + beta/w1 + gamma/w2).
    pub fn correction_factor(&self, alpha: f32, beta: f32, gamma: f32) -> f32 {
        return 1.0
            / (alpha / self.triangle[0].clip_pos.w
                + beta / self.triangle[1].clip_pos.w
                + gamma / self.triangle[2].clip_pos.w);
    }

    pub fn interpolate_world_pos(&self, alpha: f32, beta: f32, gamma: f32) -> Vector3<f32> {
        let z = self.correction_factor(alpha, beta, gamma);
        return (alpha * self.triangle[0].world_pos / self.triangle[0].clip_pos.w
            + beta * self.triangle[1].world_pos / self.triangle[1].clip_pos.w
            + gamma * self.triangle[2].world_pos / self.triangle[2].clip_pos.w)
            * z;
    }

    pub fn interpolate_normal(&self, alpha: f32, beta: f32, gamma: f32) -> Vector3<f32> {
        let z = self.correction_factor(alpha, beta, gamma);
        return (alpha * self.triangle[0].normal / self.triangle[0].clip_pos.w
            + beta * self.triangle[1].normal / self.triangle[1].clip_pos.w
            + gamma * self.triangle[2].normal / self.triangle[2].clip_pos.w)
            * z;
    }

    pub fn interpolate_uv(&self, alpha: f32, beta: f32, gamma: f32) -> Vector2<f32> {
        let z = self.correction_factor(alpha, beta, gamma);
        return (alpha * self.triangle[0].uv / self.triangle[0].clip_pos.w
            + beta * self.triangle[1].uv / self.triangle[1].clip_pos.w
            + gamma * self.triangle[2].uv / self.triangle[2].clip_pos.w)
            * z;
    }
}

/// Capability set the rasterizer depends on. The three concrete shaders
/// (Phong, PBR, skybox) differ only in fragment logic; swapping one for
/// another is a pure substitution and the rasterizer never branches on
/// variant identity.
pub trait Shader {
    fn uniforms(&self) -> &Uniforms;
    fn uniforms_mut(&mut self) -> &mut Uniforms;
    fn payload(&self) -> &Payload;
    fn payload_mut(&mut self) -> &mut Payload;

    /// Pulls position/normal/uv of one vertex from the model, applies the
    /// MVP transform and writes the result into the payload polygon.
    fn vertex_shader(&mut self, model: &Model, face: usize, vert: usize);

    /// Computes the color of a fragment from the final barycentric weights.
    /// Weights follow vertex order: alpha for vertex 0, beta for 1, gamma for 2.
    /// Returned components are in display range [0, 255] before clamping.
    fn fragment_shader(&self, model: &Model, alpha: f32, beta: f32, gamma: f32) -> Vector3<f32>;
}

/// Vertex stage shared by the lit shaders: world position through the model
/// matrix, normal through its inverse-transpose, clip position through mvp.
pub fn transform_vertex(uniforms: &Uniforms, payload: &mut Payload, model: &Model, face: usize, vert: usize) {
    let position = model.vertex(face, vert);
    let normal = model.normal(face, vert);

    payload.polygon[vert] = ClipVertex {
        clip_pos: uniforms.mvp_matrix * to_hom_point(position),
        world_pos: from_hom_point(uniforms.model_matrix * to_hom_point(position)),
        normal: from_hom_vector(uniforms.it_model_matrix * to_hom_vector(normal)),
        uv: model.uv(face, vert),
    };
}
