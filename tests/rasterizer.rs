use nalgebra::{vector, Matrix4, Perspective3, Vector3};
use std::f32::consts::PI;

use tiny_pbr::model::Model;
use tiny_pbr::rasterizer::{ClearTargets, Rasterizer};
use tiny_pbr::shader::{transform_vertex, Payload, Shader, Uniforms};

/// Minimal shader painting every covered fragment solid white, so coverage
/// and depth behavior can be checked without any lighting in the way.
#[derive(Default)]
struct FlatShader {
    uniforms: Uniforms,
    payload: Payload,
}

impl Shader for FlatShader {
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

    fn fragment_shader(&self, _model: &Model, _alpha: f32, _beta: f32, _gamma: f32) -> Vector3<f32> {
        return vector![255.0, 255.0, 255.0];
    }
}

fn single_triangle(positions: [[f32; 3]; 3]) -> Model {
    let normals = vec![[0.0, 0.0, 1.0]; 3];
    let uvs = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
    return Model::from_geometry(positions.to_vec(), normals, uvs, vec![0, 1, 2]);
}

/// Reads back one rgb pixel at buffer coordinates with y up, undoing the
/// vertical flip applied when the frame is stored.
fn pixel(rasterizer: &Rasterizer, x: u32, y: u32) -> [u8; 3] {
    let flipped_y = rasterizer.height - 1 - y;
    let index = (3 * (x + flipped_y * rasterizer.width)) as usize;
    let data = rasterizer.as_render_data();
    return [data[index], data[index + 1], data[index + 2]];
}

#[test]
fn flat_triangle_covers_expected_pixels() {
    let mut rasterizer = Rasterizer::new(4, 4);
    let mut shader = FlatShader::default();
    // Counter-clockwise triangle spanning the full NDC square; with the
    // identity transform its window vertices are (0,0), (4,0) and (2,4).
    let model = single_triangle([[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [0.0, 1.0, 0.0]]);

    rasterizer.draw(&model, &mut shader);

    let expected_covered = [
        (0, 0), (1, 0), (2, 0), (3, 0),
        (1, 1), (2, 1), (3, 1),
        (1, 2), (2, 2), (3, 2),
        (2, 3),
    ];
    for y in 0..4 {
        for x in 0..4 {
            let expected = expected_covered.contains(&(x, y));
            let white = pixel(&rasterizer, x, y) == [255, 255, 255];
            assert_eq!(white, expected, "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn back_facing_triangle_is_culled() {
    let mut rasterizer = Rasterizer::new(4, 4);
    let mut shader = FlatShader::default();
    // Same triangle with clockwise winding.
    let model = single_triangle([[-1.0, -1.0, 0.0], [0.0, 1.0, 0.0], [1.0, -1.0, 0.0]]);

    rasterizer.draw(&model, &mut shader);

    assert!(rasterizer.as_render_data().iter().all(|&byte| byte == 0));
}

#[test]
fn redraw_is_idempotent() {
    let mut rasterizer = Rasterizer::new(8, 8);
    let mut shader = FlatShader::default();
    let model = single_triangle([[-0.8, -0.8, 0.0], [0.8, -0.8, 0.0], [0.0, 0.8, 0.0]]);

    rasterizer.draw(&model, &mut shader);
    let first_color = rasterizer.as_render_data().to_vec();
    let first_depth = rasterizer.depth_buffer().to_vec();

    // A second draw at identical depth must lose against the stored values
    // and leave both buffers untouched.
    rasterizer.draw(&model, &mut shader);

    assert_eq!(rasterizer.as_render_data(), &first_color[..]);
    assert_eq!(rasterizer.depth_buffer(), &first_depth[..]);
}

#[test]
fn clear_targets_respect_selection() {
    let mut rasterizer = Rasterizer::new(8, 8);
    let mut shader = FlatShader::default();
    let model = single_triangle([[-0.8, -0.8, 0.0], [0.8, -0.8, 0.0], [0.0, 0.8, 0.0]]);
    rasterizer.draw(&model, &mut shader);

    rasterizer.clear(ClearTargets::Color);
    assert!(rasterizer.as_render_data().iter().all(|&byte| byte == 0));
    assert!(rasterizer.depth_buffer().iter().any(|&d| d.is_finite()));

    rasterizer.clear(ClearTargets::Depth);
    assert!(rasterizer.depth_buffer().iter().all(|&d| d == f32::INFINITY));
}

#[test]
fn nearer_triangle_wins_depth_test() {
    let mut rasterizer = Rasterizer::new(8, 8);
    let projection = Perspective3::new(1.0, PI / 2.0, 1.0, 10.0).to_homogeneous();
    rasterizer.set_projection(projection);

    // Far triangle first, then a nearer one on top; both cover the center.
    struct ColorShader {
        uniforms: Uniforms,
        payload: Payload,
        color: Vector3<f32>,
    }
    impl Shader for ColorShader {
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
        fn fragment_shader(&self, _: &Model, _: f32, _: f32, _: f32) -> Vector3<f32> {
            return self.color;
        }
    }

    let far = single_triangle([[-2.0, -2.0, -6.0], [2.0, -2.0, -6.0], [0.0, 2.0, -6.0]]);
    let near = single_triangle([[-1.0, -1.0, -3.0], [1.0, -1.0, -3.0], [0.0, 1.0, -3.0]]);

    let mut red = ColorShader {
        uniforms: Uniforms::default(),
        payload: Payload::default(),
        color: vector![255.0, 0.0, 0.0],
    };
    let mut green = ColorShader {
        uniforms: Uniforms::default(),
        payload: Payload::default(),
        color: vector![0.0, 255.0, 0.0],
    };

    rasterizer.draw(&far, &mut red);
    rasterizer.draw(&near, &mut green);

    assert_eq!(pixel(&rasterizer, 4, 4), [0, 255, 0]);

    // Drawing the far triangle again must not overwrite the near one.
    rasterizer.draw(&far, &mut red);
    assert_eq!(pixel(&rasterizer, 4, 4), [0, 255, 0]);
}

#[test]
fn stored_depth_matches_analytic_plane_depth() {
    let size = 64u32;
    let mut rasterizer = Rasterizer::new(size, size);
    let projection = Perspective3::new(1.0, PI / 2.0, 1.0, 10.0);
    rasterizer.set_projection(projection.to_homogeneous());

    // A plane slanted in depth; perspective-correct interpolation must
    // reproduce the NDC depth of the ray-plane intersection at every pixel.
    let a = vector![-1.0f32, -1.0, -2.0];
    let b = vector![1.0f32, -1.0, -4.0];
    let c = vector![0.0f32, 1.0, -3.0];
    let model = single_triangle([[a.x, a.y, a.z], [b.x, b.y, b.z], [c.x, c.y, c.z]]);
    let mut shader = FlatShader::default();

    rasterizer.draw(&model, &mut shader);

    let plane_normal = (b - a).cross(&(c - a));
    let plane_offset = plane_normal.dot(&a);

    let mut checked = 0;
    for y in 0..size {
        for x in 0..size {
            let depth = rasterizer.depth_buffer()[(y * size + x) as usize];
            if !depth.is_finite() {
                continue;
            }

            // Pixel center back to NDC, then the view-space ray through it:
            // p(t) = (x_ndc * t, y_ndc * t, -t) for a 90 degree fov.
            let x_ndc = 2.0 * x as f32 / size as f32 - 1.0;
            let y_ndc = 2.0 * y as f32 / size as f32 - 1.0;
            let denominator =
                plane_normal.x * x_ndc + plane_normal.y * y_ndc - plane_normal.z;
            let t = plane_offset / denominator;
            let view_point = vector![x_ndc * t, y_ndc * t, -t];

            let clip = projection.to_homogeneous()
                * vector![view_point.x, view_point.y, view_point.z, 1.0];
            let expected = clip.z / clip.w;

            assert!(
                (depth - expected).abs() < 1.0e-3,
                "pixel ({}, {}): stored {} expected {}",
                x,
                y,
                depth,
                expected
            );
            checked += 1;
        }
    }
    // The triangle covers a substantial part of the frame.
    assert!(checked > 150, "only {} covered pixels", checked);
}

#[test]
fn skybox_skips_clipping_and_culling() {
    let mut rasterizer = Rasterizer::new(8, 8);
    let mut shader = FlatShader::default();
    // Clockwise winding, which the regular path would cull.
    let mut model =
        single_triangle([[-1.0, -1.0, 0.0], [0.0, 1.0, 0.0], [1.0, -1.0, 0.0]]);
    model.is_skybox = true;

    rasterizer.draw(&model, &mut shader);

    assert!(rasterizer.as_render_data().iter().any(|&byte| byte == 255));
}

#[test]
fn partially_behind_camera_triangle_still_draws() {
    let size = 16u32;
    let mut rasterizer = Rasterizer::new(size, size);
    let projection = Perspective3::new(1.0, PI / 2.0, 1.0, 10.0).to_homogeneous();
    rasterizer.set_projection(projection);
    rasterizer.set_view(Matrix4::identity());

    // One vertex behind the near plane; without clipping this would wrap
    // through infinity, with clipping the visible part still renders.
    let model = single_triangle([[-1.0, -1.0, -3.0], [1.0, -1.0, -3.0], [0.0, 1.0, 0.5]]);
    let mut shader = FlatShader::default();

    rasterizer.draw(&model, &mut shader);

    assert!(rasterizer.as_render_data().iter().any(|&byte| byte == 255));
}
