use nalgebra::vector;

use tiny_pbr::rasterizer::clip::Clipper;
use tiny_pbr::shader::{ClipVertex, Payload, MAX_CLIP_VERTICES};

fn triangle_payload(positions: [[f32; 4]; 3]) -> Payload {
    let mut payload = Payload::default();
    for (i, p) in positions.iter().enumerate() {
        payload.polygon[i] = ClipVertex {
            clip_pos: vector![p[0], p[1], p[2], p[3]],
            ..ClipVertex::default()
        };
    }
    payload.polygon_len = 3;
    return payload;
}

#[test]
fn triangle_inside_volume_passes_unchanged() {
    let positions = [
        [-0.5, -0.5, 0.0, 1.0],
        [0.5, -0.5, 0.0, 1.0],
        [0.0, 0.5, 0.0, 1.0],
    ];
    let mut payload = triangle_payload(positions);

    let count = Clipper::new().clip(&mut payload);

    assert_eq!(count, 3);
    assert_eq!(payload.polygon_len, 3);
    for (vertex, p) in payload.polygon[..3].iter().zip(positions.iter()) {
        assert_eq!(vertex.clip_pos, vector![p[0], p[1], p[2], p[3]]);
    }
}

#[test]
fn triangle_outside_one_plane_is_culled() {
    // Entirely to the right of the x = w plane.
    let mut payload = triangle_payload([
        [2.0, -0.5, 0.0, 1.0],
        [3.0, -0.5, 0.0, 1.0],
        [2.5, 0.5, 0.0, 1.0],
    ]);

    let count = Clipper::new().clip(&mut payload);

    assert_eq!(count, 0);
    assert_eq!(payload.polygon_len, 0);
}

#[test]
fn triangle_behind_camera_is_culled() {
    // All three vertices have non-positive w.
    let mut payload = triangle_payload([
        [0.0, 0.0, 0.0, -1.0],
        [1.0, 0.0, 0.0, -2.0],
        [0.0, 1.0, 0.0, -1.5],
    ]);

    let count = Clipper::new().clip(&mut payload);

    assert_eq!(count, 0);
}

#[test]
fn crossing_triangle_yields_polygon_inside_volume() {
    // Two vertices inside, one far beyond the x = w plane.
    let mut payload = triangle_payload([
        [-0.5, -0.5, 0.0, 1.0],
        [3.0, 0.0, 0.0, 1.0],
        [-0.5, 0.5, 0.0, 1.0],
    ]);

    let count = Clipper::new().clip(&mut payload);

    assert!(count >= 3);
    assert!(count <= MAX_CLIP_VERTICES);
    assert_eq!(payload.polygon_len, count);
    for vertex in &payload.polygon[..count] {
        let p = vertex.clip_pos;
        let tolerance = 1.0e-4;
        assert!(p.w > 0.0);
        assert!(p.x.abs() <= p.w + tolerance);
        assert!(p.y.abs() <= p.w + tolerance);
        assert!(p.z.abs() <= p.w + tolerance);
    }
}

#[test]
fn interpolated_vertex_sits_on_the_plane() {
    // One vertex outside the x = w plane; the two new vertices must land on it.
    let mut payload = triangle_payload([
        [0.0, 0.0, 0.0, 1.0],
        [2.0, 0.0, 0.0, 1.0],
        [0.0, 1.0, 0.0, 1.0],
    ]);

    let count = Clipper::new().clip(&mut payload);

    assert!(count >= 3);
    let on_plane = payload.polygon[..count]
        .iter()
        .filter(|v| (v.clip_pos.x - v.clip_pos.w).abs() < 1.0e-4)
        .count();
    assert_eq!(on_plane, 2);
}

#[test]
fn clipper_reuse_does_not_leak_previous_polygon() {
    let mut clipper = Clipper::new();

    let mut crossing = triangle_payload([
        [-0.5, -0.5, 0.0, 1.0],
        [3.0, 0.0, 0.0, 1.0],
        [-0.5, 0.5, 0.0, 1.0],
    ]);
    assert!(clipper.clip(&mut crossing) > 3);

    let mut inside = triangle_payload([
        [-0.5, -0.5, 0.0, 1.0],
        [0.5, -0.5, 0.0, 1.0],
        [0.0, 0.5, 0.0, 1.0],
    ]);
    assert_eq!(clipper.clip(&mut inside), 3);
}
