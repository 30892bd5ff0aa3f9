pub mod clip;

use na::{vector, Matrix4, Vector2, Vector3};
use nalgebra as na;

use crate::model::Model;
use crate::rasterizer::clip::{Clipper, CLIP_EPSILON};
use crate::shader::Shader;
use crate::util::clamp_color;

/// Which buffers a `clear` call resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearTargets {
    Color,
    Depth,
    ColorAndDepth,
}

impl ClearTargets {
    fn has_color(self) -> bool {
        return self != ClearTargets::Depth;
    }

    fn has_depth(self) -> bool {
        return self != ClearTargets::Color;
    }
}

/// Software rasterizer owning the color and depth buffers.
///
/// The color buffer is a flat row-major rgb8 array whose row 0 is the top
/// image row; `set_pixel` flips y so that NDC (-1, -1) lands in the bottom
/// left of the presented image. The depth buffer is indexed without the
/// flip (y * width + x), stores smaller-is-nearer values and is cleared to
/// +infinity so every first write passes the test.
pub struct Rasterizer {
    pub width: u32,
    pub height: u32,
    color_buf: Vec<u8>,
    depth_buf: Vec<f32>,
    clipper: Clipper,
    model_matrix: Matrix4<f32>,
    view_matrix: Matrix4<f32>,
    projection_matrix: Matrix4<f32>,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Rasterizer {
        let n_pixels = (width * height) as usize;
        return Rasterizer {
            width,
            height,
            color_buf: vec![0; 3 * n_pixels],
            depth_buf: vec![f32::INFINITY; n_pixels],
            clipper: Clipper::new(),
            model_matrix: Matrix4::identity(),
            view_matrix: Matrix4::identity(),
            projection_matrix: Matrix4::identity(),
        };
    }

    pub fn set_model(&mut self, m: Matrix4<f32>) {
        self.model_matrix = m;
    }

    pub fn set_view(&mut self, v: Matrix4<f32>) {
        self.view_matrix = v;
    }

    pub fn set_projection(&mut self, p: Matrix4<f32>) {
        self.projection_matrix = p;
    }

    /// Get the rendered frame as a flat slice of rgb8 samples for the
    /// display layer to blit.
    pub fn as_render_data(&self) -> &[u8] {
        return &self.color_buf[..];
    }

    /// Raw depth values, mainly for inspection and tests.
    pub fn depth_buffer(&self) -> &[f32] {
        return &self.depth_buf[..];
    }

    pub fn clear(&mut self, targets: ClearTargets) {
        if targets.has_color() {
            self.color_buf.fill(0);
        }
        if targets.has_depth() {
            self.depth_buf.fill(f32::INFINITY);
        }
    }

    /// Runs the full per-triangle pipeline for every face of the model:
    /// vertex stage, homogenous clipping (skipped for skybox geometry),
    /// fan triangulation of the clipped polygon and rasterization.
    pub fn draw(&mut self, model: &Model, shader: &mut dyn Shader) {
        shader.uniforms_mut().update_matrices(
            self.model_matrix,
            self.view_matrix,
            self.projection_matrix,
        );

        for face in 0..model.nfaces() {
            for vert in 0..3 {
                shader.vertex_shader(model, face, vert);
            }
            shader.payload_mut().polygon_len = 3;

            // The skybox cube is intentionally drawn unclipped; everything
            // else goes through the view volume planes.
            let num_vertices = if model.is_skybox {
                3
            } else {
                self.clipper.clip(shader.payload_mut())
            };
            if num_vertices < 3 {
                continue;
            }

            // Fan triangulation: vertex 0 stays fixed, consecutive pairs
            // complete each triangle.
            for k in 0..num_vertices - 2 {
                shader.payload_mut().select_triangle(0, k + 1, k + 2);
                self.rasterize_triangle(model, shader);
            }
        }
    }

    fn rasterize_triangle(&mut self, model: &Model, shader: &mut dyn Shader) {
        let triangle = shader.payload().triangle;

        // Perspective divide into normalized device coordinates. A w this
        // close to zero should have been clipped; dropping the triangle here
        // beats producing NaN coordinates for the unclipped skybox path.
        let mut ndc_pos = [Vector3::zeros(); 3];
        for i in 0..3 {
            let w = triangle[i].clip_pos.w;
            if w.abs() < CLIP_EPSILON {
                return;
            }
            ndc_pos[i] = vector![
                triangle[i].clip_pos.x / w,
                triangle[i].clip_pos.y / w,
                triangle[i].clip_pos.z / w
            ];
        }

        if !model.is_skybox && is_back_facing(&ndc_pos) {
            return;
        }

        // Viewport transformation of NDC x, y into window pixel coordinates.
        let mut window_pos = [Vector2::zeros(); 3];
        for i in 0..3 {
            window_pos[i] = vector![
                0.5 * self.width as f32 * (ndc_pos[i].x + 1.0),
                0.5 * self.height as f32 * (ndc_pos[i].y + 1.0)
            ];
        }

        // Integer bounding box clamped to the buffer extents. One inclusive
        // convention (0..=width - 1) is used for every pixel write.
        let x_min = window_pos
            .iter()
            .fold(f32::MAX, |acc, p| acc.min(p.x))
            .floor()
            .max(0.0) as i32;
        let x_max = window_pos
            .iter()
            .fold(f32::MIN, |acc, p| acc.max(p.x))
            .ceil()
            .min((self.width - 1) as f32) as i32;
        let y_min = window_pos
            .iter()
            .fold(f32::MAX, |acc, p| acc.min(p.y))
            .floor()
            .max(0.0) as i32;
        let y_max = window_pos
            .iter()
            .fold(f32::MIN, |acc, p| acc.max(p.y))
            .ceil()
            .min((self.height - 1) as f32) as i32;

        for x in x_min..=x_max {
            for y in y_min..=y_max {
                if !inside_triangle(x as f32, y as f32, &window_pos) {
                    continue;
                }
                let (alpha, beta, gamma) =
                    match barycentric_2d(x as f32, y as f32, &window_pos) {
                        Some(weights) => weights,
                        None => continue, // Degenerate triangle, nothing to shade.
                    };

                // NDC z is already divided by w, which makes it affine in
                // window space; plain screen barycentrics interpolate it
                // exactly. Only the shader attributes need the 1/w weighting.
                let depth = alpha * ndc_pos[0].z
                    + beta * ndc_pos[1].z
                    + gamma * ndc_pos[2].z;

                let index = (y as u32 * self.width + x as u32) as usize;
                if depth < self.depth_buf[index] {
                    self.depth_buf[index] = depth;
                    let color = shader.fragment_shader(model, alpha, beta, gamma);
                    self.set_pixel(x, y, clamp_color(color));
                }
            }
        }
    }

    /// Writes one rgb8 pixel, flipping y so the presented image has its
    /// origin in the bottom left. Out-of-bounds coordinates are skipped.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Vector3<f32>) {
        if x < 0 || x > self.width as i32 - 1 || y < 0 || y > self.height as i32 - 1 {
            return;
        }
        let index = (3 * (x + (self.height as i32 - 1 - y) * self.width as i32)) as usize;
        self.color_buf[index + 0] = color.x as u8;
        self.color_buf[index + 1] = color.y as u8;
        self.color_buf[index + 2] = color.z as u8;
    }
}

/// Back-face test on the projected triangle: the signed area of the 2-D
/// polygon is non-positive for faces wound away from the camera.
fn is_back_facing(ndc_pos: &[Vector3<f32>; 3]) -> bool {
    let a = ndc_pos[0];
    let b = ndc_pos[1];
    let c = ndc_pos[2];
    let signed_area =
        a.x * b.y - a.y * b.x + b.x * c.y - b.y * c.x + c.x * a.y - c.y * a.x;
    return signed_area <= 0.0;
}

/// Edge-inclusive point-in-triangle test: the pixel is covered when the 2-D
/// cross products against all three edges agree in sign (zero counts as
/// agreement, so pixels exactly on an edge are shaded).
fn inside_triangle(x: f32, y: f32, window_pos: &[Vector2<f32>; 3]) -> bool {
    let pa = vector![x - window_pos[0].x, y - window_pos[0].y];
    let pb = vector![x - window_pos[1].x, y - window_pos[1].y];
    let pc = vector![x - window_pos[2].x, y - window_pos[2].y];

    let a = pa.x * pb.y - pa.y * pb.x;
    let b = pb.x * pc.y - pb.y * pc.x;
    let c = pc.x * pa.y - pc.y * pa.x;

    return a * b >= 0.0 && a * c >= 0.0 && b * c >= 0.0;
}

/// Barycentric weights of a window-space point via the area-ratio formula.
/// Returns None when a denominator degenerates, which happens for zero-area
/// triangles; the caller drops the pixel instead of propagating NaN.
fn barycentric_2d(x: f32, y: f32, v: &[Vector2<f32>; 3]) -> Option<(f32, f32, f32)> {
    let d0 = v[0].x * (v[1].y - v[2].y) + (v[2].x - v[1].x) * v[0].y + v[1].x * v[2].y
        - v[2].x * v[1].y;
    let d1 = v[1].x * (v[2].y - v[0].y) + (v[0].x - v[2].x) * v[1].y + v[2].x * v[0].y
        - v[0].x * v[2].y;
    let d2 = v[2].x * (v[0].y - v[1].y) + (v[1].x - v[0].x) * v[2].y + v[0].x * v[1].y
        - v[1].x * v[0].y;
    if d0.abs() < f32::EPSILON || d1.abs() < f32::EPSILON || d2.abs() < f32::EPSILON {
        return None;
    }

    let alpha =
        (x * (v[1].y - v[2].y) + (v[2].x - v[1].x) * y + v[1].x * v[2].y - v[2].x * v[1].y) / d0;
    let beta =
        (x * (v[2].y - v[0].y) + (v[0].x - v[2].x) * y + v[2].x * v[0].y - v[0].x * v[2].y) / d1;
    let gamma =
        (x * (v[0].y - v[1].y) + (v[1].x - v[0].x) * y + v[0].x * v[1].y - v[1].x * v[0].y) / d2;
    return Some((alpha, beta, gamma));
}
