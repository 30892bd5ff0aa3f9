use std::sync::Arc;

use image::{Rgb, RgbImage};
use nalgebra::{vector, Matrix4, Vector3};

use tiny_pbr::model::Model;
use tiny_pbr::sampler::Cubemap;
use tiny_pbr::shader::skybox::SkyboxShader;
use tiny_pbr::shader::{ClipVertex, Payload, Shader, Uniforms};

fn vertex_at(clip_w: f32, world_pos: Vector3<f32>, uv: [f32; 2]) -> ClipVertex {
    return ClipVertex {
        clip_pos: vector![0.0, 0.0, 0.0, clip_w],
        world_pos,
        normal: vector![0.0, 0.0, 1.0],
        uv: vector![uv[0], uv[1]],
    };
}

#[test]
fn interpolation_with_unit_w_is_affine() {
    let mut payload = Payload::default();
    payload.triangle = [
        vertex_at(1.0, vector![0.0, 0.0, 0.0], [0.0, 0.0]),
        vertex_at(1.0, vector![2.0, 0.0, 0.0], [1.0, 0.0]),
        vertex_at(1.0, vector![0.0, 2.0, 0.0], [0.0, 1.0]),
    ];

    assert!((payload.correction_factor(0.2, 0.3, 0.5) - 1.0).abs() < 1.0e-6);

    let uv = payload.interpolate_uv(0.25, 0.5, 0.25);
    assert!((uv.x - 0.5).abs() < 1.0e-6);
    assert!((uv.y - 0.25).abs() < 1.0e-6);

    let world = payload.interpolate_world_pos(1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0);
    assert!((world - vector![2.0 / 3.0, 2.0 / 3.0, 0.0]).norm() < 1.0e-6);
}

#[test]
fn interpolation_weights_attributes_by_inverse_w() {
    // Screen-space midpoint of an edge whose endpoints differ in w: the
    // attribute must lean towards the vertex with the smaller w.
    let mut payload = Payload::default();
    payload.triangle = [
        vertex_at(1.0, vector![0.0, 0.0, 0.0], [0.0, 0.0]),
        vertex_at(3.0, vector![1.0, 0.0, 0.0], [1.0, 0.0]),
        vertex_at(1.0, vector![0.0, 1.0, 0.0], [0.0, 1.0]),
    ];

    let uv = payload.interpolate_uv(0.5, 0.5, 0.0);
    // 1 / (0.5/1 + 0.5/3) = 1.5; u = 1.5 * (0.5 * 0 + 0.5 * 1/3) = 0.25.
    assert!((uv.x - 0.25).abs() < 1.0e-6);
    assert!(uv.x < 0.5);
}

#[test]
fn update_matrices_composes_mvp() {
    let mut uniforms = Uniforms::default();
    let model = Matrix4::new_scaling(2.0);
    let view = Matrix4::new_translation(&vector![0.0, 0.0, -5.0]);
    let projection = Matrix4::new_scaling(0.5);

    uniforms.update_matrices(model, view, projection);

    assert_eq!(uniforms.mvp_matrix, projection * view * model);
    // Inverse-transpose of a pure scale is its inverse on the linear part.
    assert!((uniforms.it_model_matrix[(0, 0)] - 0.5).abs() < 1.0e-6);
}

#[test]
fn skybox_fragment_samples_environment() {
    let faces = [
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])),
        RgbImage::from_pixel(4, 4, Rgb([0, 255, 0])),
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])),
        RgbImage::from_pixel(4, 4, Rgb([255, 255, 0])),
        RgbImage::from_pixel(4, 4, Rgb([0, 255, 255])),
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 255])),
    ];
    let mut model = Model::from_geometry(vec![], vec![], vec![], vec![]);
    model.environment_map = Some(Arc::new(Cubemap::from_faces(faces)));

    let mut shader = SkyboxShader::new();
    // A triangle looking straight down +x, all vertices at w = 1.
    shader.payload_mut().triangle = [
        vertex_at(1.0, vector![1.0, 0.0, 0.0], [0.0, 0.0]),
        vertex_at(1.0, vector![1.0, 0.1, 0.0], [1.0, 0.0]),
        vertex_at(1.0, vector![1.0, 0.0, 0.1], [0.0, 1.0]),
    ];

    let color = shader.fragment_shader(&model, 1.0, 0.0, 0.0);
    assert_eq!(color, vector![255.0, 0.0, 0.0]);
}

#[test]
fn skybox_without_environment_is_black() {
    let model = Model::from_geometry(vec![], vec![], vec![], vec![]);
    let mut shader = SkyboxShader::new();
    shader.payload_mut().triangle = [
        vertex_at(1.0, vector![0.0, 1.0, 0.0], [0.0, 0.0]),
        vertex_at(1.0, vector![0.0, 1.0, 0.1], [1.0, 0.0]),
        vertex_at(1.0, vector![0.1, 1.0, 0.0], [0.0, 1.0]),
    ];

    let color = shader.fragment_shader(&model, 1.0, 0.0, 0.0);
    assert_eq!(color, Vector3::zeros());
}
