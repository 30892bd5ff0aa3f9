use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use image::{imageops, RgbImage};
use na::{vector, Vector2, Vector3};
use nalgebra as na;
use obj::{load_obj, Obj, TexturedVertex};

use crate::sampler::{
    cubemap_sample, texture_sample, texture_sample_clamp, Cubemap, PREFILTER_MIP_LEVELS,
};

/// Geometry plus material source for the shaders. Owns its vertex buffers
/// and all maps; nothing here is mutated during a draw call.
///
/// Maps are optional. Missing ones degrade to documented defaults instead
/// of failing: diffuse white, roughness 1, metalness 0, occlusion 1,
/// emission black, no normal perturbation.
pub struct Model {
    positions: Vec<Vector3<f32>>,
    normals: Vec<Vector3<f32>>,
    uvs: Vec<Vector2<f32>>,
    indices: Vec<u32>,

    pub is_skybox: bool,

    pub diffuse_map: Option<RgbImage>,
    pub normal_map: Option<RgbImage>,
    pub roughness_map: Option<RgbImage>,
    pub metalness_map: Option<RgbImage>,
    pub occlusion_map: Option<RgbImage>,
    pub emission_map: Option<RgbImage>,

    pub environment_map: Option<Arc<Cubemap>>,
    pub irradiance_map: Option<Cubemap>,
    pub prefilter_maps: Vec<Cubemap>, // Mip chain, index is the level.
    pub brdf_lut: Option<RgbImage>,
}

impl Model {
    /// Builds a model from in-memory buffers. `indices` are triples of
    /// indices into the three attribute arrays, one triple per face.
    pub fn from_geometry(
        positions: Vec<[f32; 3]>,
        normals: Vec<[f32; 3]>,
        uvs: Vec<[f32; 2]>,
        indices: Vec<u32>,
    ) -> Model {
        return Model {
            positions: positions.iter().map(|p| vector![p[0], p[1], p[2]]).collect(),
            normals: normals.iter().map(|n| vector![n[0], n[1], n[2]]).collect(),
            uvs: uvs.iter().map(|t| vector![t[0], t[1]]).collect(),
            indices,
            is_skybox: false,
            diffuse_map: None,
            normal_map: None,
            roughness_map: None,
            metalness_map: None,
            occlusion_map: None,
            emission_map: None,
            environment_map: None,
            irradiance_map: None,
            prefilter_maps: Vec::new(),
            brdf_lut: None,
        };
    }

    /// Loads an OBJ file plus whatever material maps sit next to it
    /// (`<stem>_diffuse.tga`, `_normal`, `_roughness`, `_metalness`,
    /// `_occlusion`, `_emission`).
    pub fn load(path: &str) -> Result<Model, Box<dyn Error>> {
        let obj: Obj<TexturedVertex, u32> = load_obj(BufReader::new(File::open(path)?))?;

        let mut positions = Vec::with_capacity(obj.vertices.len());
        let mut normals = Vec::with_capacity(obj.vertices.len());
        let mut uvs = Vec::with_capacity(obj.vertices.len());
        for vertex in &obj.vertices {
            positions.push(vertex.position);
            normals.push(vertex.normal);
            uvs.push([vertex.texture[0], vertex.texture[1]]);
        }

        let mut model = Model::from_geometry(positions, normals, uvs, obj.indices);

        let stem = match path.rfind('.') {
            Some(dot) => &path[..dot],
            None => path,
        };
        model.diffuse_map = try_load_map(stem, "_diffuse.tga");
        model.normal_map = try_load_map(stem, "_normal.tga");
        model.roughness_map = try_load_map(stem, "_roughness.tga");
        model.metalness_map = try_load_map(stem, "_metalness.tga");
        model.occlusion_map = try_load_map(stem, "_occlusion.tga");
        model.emission_map = try_load_map(stem, "_emission.tga");

        return Ok(model);
    }

    /// A cube drawn around the camera and sampled from the environment
    /// cubemap. Marked as skybox so the rasterizer skips clipping and
    /// back-face culling for it.
    pub fn skybox(env_prefix: &str) -> Result<Model, Box<dyn Error>> {
        let mut model = Model::cube();
        model.is_skybox = true;
        model.environment_map = Some(Arc::new(Cubemap::load(env_prefix)?));
        return Ok(model);
    }

    /// Loads precomputed IBL artifacts (`i_px.tga` .., `m<level>_px.tga` ..,
    /// `brdf_lut.tga`) from a bake output directory. Missing artifacts stay
    /// None and the PBR shader falls back to its constant ambient term.
    pub fn load_ibl_maps(&mut self, dir: &str) {
        self.irradiance_map = Cubemap::load_named(dir, "i").ok();
        self.prefilter_maps.clear();
        for level in 0..PREFILTER_MIP_LEVELS {
            match Cubemap::load_named(dir, &format!("m{}", level)) {
                Ok(cubemap) => self.prefilter_maps.push(cubemap),
                Err(_) => break,
            }
        }
        self.brdf_lut = image::open(format!("{}/brdf_lut.tga", dir))
            .ok()
            .map(|img| img.to_rgb8());
    }

    pub fn nfaces(&self) -> usize {
        return self.indices.len() / 3;
    }

    fn attribute_index(&self, face: usize, vert: usize) -> usize {
        return self.indices[3 * face + vert] as usize;
    }

    pub fn vertex(&self, face: usize, vert: usize) -> Vector3<f32> {
        return self.positions[self.attribute_index(face, vert)];
    }

    pub fn normal(&self, face: usize, vert: usize) -> Vector3<f32> {
        return self.normals[self.attribute_index(face, vert)];
    }

    pub fn uv(&self, face: usize, vert: usize) -> Vector2<f32> {
        return self.uvs[self.attribute_index(face, vert)];
    }

    /// Albedo at a uv, channels in [0, 1].
    pub fn diffuse(&self, uv: Vector2<f32>) -> Vector3<f32> {
        return match &self.diffuse_map {
            Some(map) => texture_sample(uv, map),
            None => vector![1.0, 1.0, 1.0],
        };
    }

    /// Tangent-space normal from the normal map, remapped to [-1, 1].
    pub fn normal_at(&self, uv: Vector2<f32>) -> Option<Vector3<f32>> {
        let sample = texture_sample(uv, self.normal_map.as_ref()?);
        return Some(sample * 2.0 - vector![1.0, 1.0, 1.0]);
    }

    pub fn roughness(&self, uv: Vector2<f32>) -> f32 {
        return match &self.roughness_map {
            Some(map) => texture_sample(uv, map).x,
            None => 1.0,
        };
    }

    pub fn metalness(&self, uv: Vector2<f32>) -> f32 {
        return match &self.metalness_map {
            Some(map) => texture_sample(uv, map).x,
            None => 0.0,
        };
    }

    pub fn occlusion(&self, uv: Vector2<f32>) -> f32 {
        return match &self.occlusion_map {
            Some(map) => texture_sample(uv, map).x,
            None => 1.0,
        };
    }

    pub fn emission(&self, uv: Vector2<f32>) -> Vector3<f32> {
        return match &self.emission_map {
            Some(map) => texture_sample(uv, map),
            None => Vector3::zeros(),
        };
    }

    /// Baked diffuse irradiance along a normal, if an irradiance map is loaded.
    pub fn irradiance(&self, normal: Vector3<f32>) -> Option<Vector3<f32>> {
        return Some(cubemap_sample(normal, self.irradiance_map.as_ref()?));
    }

    /// Prefiltered specular radiance along a reflection direction, picking
    /// the mip level that stands for the given roughness.
    pub fn prefiltered(&self, reflected: Vector3<f32>, roughness: f32) -> Option<Vector3<f32>> {
        if self.prefilter_maps.is_empty() {
            return None;
        }
        let level = (roughness * (PREFILTER_MIP_LEVELS - 1) as f32).round() as usize;
        let level = level.min(self.prefilter_maps.len() - 1);
        return Some(cubemap_sample(reflected, &self.prefilter_maps[level]));
    }

    /// Split-sum BRDF response (scale, bias) from the lookup table. The
    /// table is read with edge clamping: head-on fragments hit n_dot_v = 1
    /// exactly, and wrapping would send them to the grazing-angle column.
    pub fn brdf(&self, n_dot_v: f32, roughness: f32) -> Option<(f32, f32)> {
        let sample = texture_sample_clamp(vector![n_dot_v, roughness], self.brdf_lut.as_ref()?);
        return Some((sample.x, sample.y));
    }

    /// Unit cube as 12 triangles with outward normals and per-face uvs.
    fn cube() -> Model {
        let face_positions: [[[f32; 3]; 4]; 6] = [
            // front (+z), back (-z), top (+y), bottom (-y), right (+x), left (-x)
            [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]],
            [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]],
            [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]],
            [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]],
            [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]],
            [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]],
        ];
        let face_normals: [[f32; 3]; 6] = [
            [0.0, 0.0, 1.0],
            [0.0, 0.0, -1.0],
            [0.0, 1.0, 0.0],
            [0.0, -1.0, 0.0],
            [1.0, 0.0, 0.0],
            [-1.0, 0.0, 0.0],
        ];
        let corner_uvs: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for face in 0..6 {
            let base = (4 * face) as u32;
            for corner in 0..4 {
                positions.push(face_positions[face][corner]);
                normals.push(face_normals[face]);
                uvs.push(corner_uvs[corner]);
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        return Model::from_geometry(positions, normals, uvs, indices);
    }
}

/// Opens `<stem><suffix>` as rgb8, flipped vertically so the uv origin sits
/// in the bottom left. None when the file does not exist.
fn try_load_map(stem: &str, suffix: &str) -> Option<RgbImage> {
    let image = image::open(format!("{}{}", stem, suffix)).ok()?;
    return Some(imageops::flip_vertical(&image.to_rgb8()));
}
