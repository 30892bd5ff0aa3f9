use image::{Rgb, RgbImage};
use nalgebra::vector;

use tiny_pbr::model::Model;
use tiny_pbr::sampler::Cubemap;

fn empty_model() -> Model {
    return Model::from_geometry(vec![], vec![], vec![], vec![]);
}

fn solid_cubemap(color: [u8; 3]) -> Cubemap {
    let face = RgbImage::from_pixel(2, 2, Rgb(color));
    return Cubemap::from_faces([
        face.clone(),
        face.clone(),
        face.clone(),
        face.clone(),
        face.clone(),
        face,
    ]);
}

#[test]
fn missing_maps_fall_back_to_documented_defaults() {
    let model = empty_model();
    let uv = vector![0.3, 0.7];

    assert_eq!(model.diffuse(uv), vector![1.0, 1.0, 1.0]);
    assert_eq!(model.roughness(uv), 1.0);
    assert_eq!(model.metalness(uv), 0.0);
    assert_eq!(model.occlusion(uv), 1.0);
    assert_eq!(model.emission(uv), vector![0.0, 0.0, 0.0]);
    assert!(model.normal_at(uv).is_none());
    assert!(model.irradiance(vector![0.0, 1.0, 0.0]).is_none());
    assert!(model.prefiltered(vector![0.0, 1.0, 0.0], 0.5).is_none());
    assert!(model.brdf(0.5, 0.5).is_none());
}

#[test]
fn geometry_accessors_follow_the_index_buffer() {
    let model = Model::from_geometry(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
        vec![[0.0, 0.0, 1.0]; 4],
        vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]],
        vec![0, 1, 2, 2, 1, 3],
    );

    assert_eq!(model.nfaces(), 2);
    assert_eq!(model.vertex(0, 0), vector![0.0, 0.0, 0.0]);
    assert_eq!(model.vertex(1, 2), vector![1.0, 1.0, 0.0]);
    assert_eq!(model.uv(1, 0), vector![0.0, 1.0]);
    assert_eq!(model.normal(0, 1), vector![0.0, 0.0, 1.0]);
}

#[test]
fn brdf_lookup_clamps_at_the_table_edges() {
    // Column 0 (grazing angles) red, everything else green. A head-on
    // lookup at n_dot_v = 1 must read the right edge of the table, not
    // wrap around to column 0.
    let mut lut = RgbImage::from_pixel(4, 4, Rgb([0, 255, 0]));
    for y in 0..4 {
        lut.put_pixel(0, y, Rgb([255, 0, 0]));
    }
    let mut model = empty_model();
    model.brdf_lut = Some(lut);

    assert_eq!(model.brdf(1.0, 0.5), Some((0.0, 1.0)));
    // Full roughness, the default when no roughness map is loaded, sits on
    // the other table edge and must clamp the same way.
    assert_eq!(model.brdf(1.0, 1.0), Some((0.0, 1.0)));
    // The grazing column itself is still reachable.
    assert_eq!(model.brdf(0.0, 0.5), Some((1.0, 0.0)));
}

#[test]
fn roughness_picks_the_prefilter_level() {
    let mut model = empty_model();
    model.prefilter_maps.push(solid_cubemap([255, 0, 0]));
    model.prefilter_maps.push(solid_cubemap([0, 255, 0]));

    // Roughness 0 maps to level 0, anything past the chain end clamps to
    // the last level actually loaded.
    let mirror = model.prefiltered(vector![0.0, 1.0, 0.0], 0.0);
    assert_eq!(mirror, Some(vector![1.0, 0.0, 0.0]));

    let rough = model.prefiltered(vector![0.0, 1.0, 0.0], 1.0);
    assert_eq!(rough, Some(vector![0.0, 1.0, 0.0]));
}
