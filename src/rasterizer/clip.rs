use nalgebra as na;
use na::Vector4;

use crate::shader::{ClipVertex, Payload, MAX_CLIP_VERTICES};

/// Lower bound on w, keeping the later perspective divide away from zero.
pub const CLIP_EPSILON: f32 = 1.0e-5;

/// The seven half-spaces whose intersection is the view volume in clip
/// space: w > epsilon plus the six faces of the -w..w cube.
#[derive(Debug, Clone, Copy)]
enum ClipPlane {
    W,
    Right,  // x <= w
    Left,   // x >= -w
    Top,    // y <= w
    Bottom, // y >= -w
    Far,    // z <= w
    Near,   // z >= -w
}

const CLIP_PLANES: [ClipPlane; 7] = [
    ClipPlane::W,
    ClipPlane::Right,
    ClipPlane::Left,
    ClipPlane::Top,
    ClipPlane::Bottom,
    ClipPlane::Far,
    ClipPlane::Near,
];

/// Signed distance of a clip-space position to a plane, positive inside.
fn signed_distance(plane: ClipPlane, v: &Vector4<f32>) -> f32 {
    return match plane {
        ClipPlane::W => v.w - CLIP_EPSILON,
        ClipPlane::Right => v.w - v.x,
        ClipPlane::Left => v.w + v.x,
        ClipPlane::Top => v.w - v.y,
        ClipPlane::Bottom => v.w + v.y,
        ClipPlane::Far => v.w - v.z,
        ClipPlane::Near => v.w + v.z,
    };
}

/// Sutherland-Hodgman clipping of a triangle against the view volume,
/// performed in homogenous clip space before the perspective divide.
///
/// Two explicitly named vertex buffers play the current/next roles and swap
/// after every plane pass, so a pass never reads the list it is writing.
pub struct Clipper {
    current: [ClipVertex; MAX_CLIP_VERTICES],
    next: [ClipVertex; MAX_CLIP_VERTICES],
    current_len: usize,
}

impl Clipper {
    pub fn new() -> Self {
        return Self {
            current: [ClipVertex::default(); MAX_CLIP_VERTICES],
            next: [ClipVertex::default(); MAX_CLIP_VERTICES],
            current_len: 0,
        };
    }

    /// Clips the payload's input triangle against all planes and writes the
    /// resulting convex polygon back into the payload. Returns the vertex
    /// count; anything below 3 means the triangle is entirely culled and
    /// the caller must skip rasterization.
    pub fn clip(&mut self, payload: &mut Payload) -> usize {
        self.current[..3].copy_from_slice(&payload.polygon[..3]);
        self.current_len = 3;

        for plane in CLIP_PLANES {
            let mut next_len = 0;
            for i in 0..self.current_len {
                let curr = self.current[i];
                let prev = self.current[(i + self.current_len - 1) % self.current_len];
                let d_curr = signed_distance(plane, &curr.clip_pos);
                let d_prev = signed_distance(plane, &prev.clip_pos);

                // Edge crosses the plane: emit the intersection vertex with
                // all attributes interpolated at the crossing ratio.
                if (d_prev >= 0.0) != (d_curr >= 0.0) {
                    let denominator = d_prev - d_curr;
                    // Equal distances with different signs cannot really
                    // happen, but a zero denominator must not become a NaN
                    // vertex, so the midpoint stands in.
                    let t = if denominator.abs() < f32::EPSILON {
                        0.5
                    } else {
                        d_prev / denominator
                    };
                    self.next[next_len] = ClipVertex::lerp(&prev, &curr, t);
                    next_len += 1;
                }
                if d_curr >= 0.0 {
                    self.next[next_len] = curr;
                    next_len += 1;
                }
            }

            std::mem::swap(&mut self.current, &mut self.next);
            self.current_len = next_len;
            if self.current_len == 0 {
                break;
            }
        }

        debug_assert!(self.current_len <= MAX_CLIP_VERTICES);
        payload.polygon[..self.current_len].copy_from_slice(&self.current[..self.current_len]);
        payload.polygon_len = self.current_len;
        return self.current_len;
    }
}

impl Default for Clipper {
    fn default() -> Self {
        return Self::new();
    }
}
