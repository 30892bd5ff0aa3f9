use std::error::Error;
use std::f32::consts::PI;
use std::sync::mpsc;
use std::sync::Arc;

use image::{imageops, Rgb, RgbImage};
use na::{vector, Vector2, Vector3};
use nalgebra as na;
use threadpool::ThreadPool;

/// Face order of every cubemap in the crate: +x, -x, +y, -y, +z, -z.
pub const FACE_NAMES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

/// Suffixes of the six environment images, matching the face order above.
const ENV_SUFFIXES: [&str; 6] = [
    "_right.tga",
    "_left.tga",
    "_top.tga",
    "_bottom.tga",
    "_back.tga",
    "_front.tga",
];

pub const IRRADIANCE_SIZE: u32 = 256;
pub const PREFILTER_BASE_SIZE: u32 = 512;
pub const PREFILTER_FLOOR: u32 = 64;
pub const PREFILTER_MIP_LEVELS: usize = 10;
pub const BRDF_LUT_SIZE: u32 = 256;
const GGX_SAMPLE_COUNT: u32 = 1024;
const IRRADIANCE_SAMPLE_DELTA: f32 = 0.025;

/// Six direction-indexed face images forming an environment.
pub struct Cubemap {
    pub faces: [RgbImage; 6],
}

impl Cubemap {
    pub fn from_faces(faces: [RgbImage; 6]) -> Cubemap {
        return Cubemap { faces };
    }

    /// Loads `<prefix>_right.tga` .. `<prefix>_front.tga`.
    pub fn load(prefix: &str) -> Result<Cubemap, Box<dyn Error>> {
        let mut faces = Vec::with_capacity(6);
        for suffix in ENV_SUFFIXES {
            let path = format!("{}{}", prefix, suffix);
            faces.push(image::open(&path)?.to_rgb8());
        }
        // Length is known to be 6, so the conversion cannot fail.
        let faces: [RgbImage; 6] = faces.try_into().map_err(|_| "cubemap face count")?;
        return Ok(Cubemap { faces });
    }

    /// Loads a baked cubemap `<dir>/<name>_px.tga` .. `<dir>/<name>_nz.tga`,
    /// undoing the vertical flip applied when the faces were written.
    pub fn load_named(dir: &str, name: &str) -> Result<Cubemap, Box<dyn Error>> {
        let mut faces = Vec::with_capacity(6);
        for face_name in FACE_NAMES {
            let path = format!("{}/{}_{}.tga", dir, name, face_name);
            faces.push(imageops::flip_vertical(&image::open(&path)?.to_rgb8()));
        }
        let faces: [RgbImage; 6] = faces.try_into().map_err(|_| "cubemap face count")?;
        return Ok(Cubemap { faces });
    }
}

/// Nearest sample of an image at a [0, 1]^2 uv, with wrap-around. rem_euclid
/// rather than a plain remainder, so negative uvs wrap instead of indexing
/// out of bounds. Returned channels are in [0, 1].
pub fn texture_sample(uv: Vector2<f32>, image: &RgbImage) -> Vector3<f32> {
    let u = uv.x.rem_euclid(1.0);
    let v = uv.y.rem_euclid(1.0);
    return texel(image, u, v);
}

/// Nearest sample with the uv clamped to the image edges instead of wrapped.
/// Lookup tables are read exactly at their borders (uv 0 and 1), where
/// wrapping would jump to the opposite edge of the table.
pub fn texture_sample_clamp(uv: Vector2<f32>, image: &RgbImage) -> Vector3<f32> {
    let u = uv.x.clamp(0.0, 1.0);
    let v = uv.y.clamp(0.0, 1.0);
    return texel(image, u, v);
}

fn texel(image: &RgbImage, u: f32, v: f32) -> Vector3<f32> {
    let x = ((u * image.width() as f32) as u32).min(image.width() - 1);
    let y = ((v * image.height() as f32) as u32).min(image.height() - 1);
    let pixel = image.get_pixel(x, y);
    return vector![
        pixel.0[0] as f32 / 255.0,
        pixel.0[1] as f32 / 255.0,
        pixel.0[2] as f32 / 255.0
    ];
}

/// Selects the cubemap face hit by a direction and the uv inside that face.
/// The dominant axis of the direction picks the face; the remaining two
/// components, divided by the dominant magnitude, map to [0, 1]^2.
pub fn cal_cubemap_uv(direction: Vector3<f32>) -> (usize, Vector2<f32>) {
    let abs_x = direction.x.abs();
    let abs_y = direction.y.abs();
    let abs_z = direction.z.abs();

    let (face_index, ma, sc, tc) = if abs_x > abs_y && abs_x > abs_z {
        if direction.x > 0.0 {
            (0, abs_x, direction.z, direction.y)
        } else {
            (1, abs_x, -direction.z, direction.y)
        }
    } else if abs_y > abs_z {
        if direction.y > 0.0 {
            (2, abs_y, direction.x, direction.z)
        } else {
            (3, abs_y, direction.x, -direction.z)
        }
    } else {
        if direction.z > 0.0 {
            (4, abs_z, -direction.x, direction.y)
        } else {
            (5, abs_z, direction.x, direction.y)
        }
    };

    let uv = vector![(sc / ma + 1.0) / 2.0, (tc / ma + 1.0) / 2.0];
    return (face_index, uv);
}

/// Samples the environment along a direction (need not be normalized).
pub fn cubemap_sample(direction: Vector3<f32>, cubemap: &Cubemap) -> Vector3<f32> {
    let (face_index, uv) = cal_cubemap_uv(direction);
    return texture_sample(uv, &cubemap.faces[face_index]);
}

/// Van der Corput radical inverse, the second component of the Hammersley
/// low-discrepancy sequence.
fn radical_inverse_vdc(mut bits: u32) -> f32 {
    bits = (bits << 16) | (bits >> 16);
    bits = ((bits & 0x5555_5555) << 1) | ((bits & 0xAAAA_AAAA) >> 1);
    bits = ((bits & 0x3333_3333) << 2) | ((bits & 0xCCCC_CCCC) >> 2);
    bits = ((bits & 0x0F0F_0F0F) << 4) | ((bits & 0xF0F0_F0F0) >> 4);
    bits = ((bits & 0x00FF_00FF) << 8) | ((bits & 0xFF00_FF00) >> 8);
    return bits as f32 * 2.328_306_4e-10; // 1 / 0x1_0000_0000
}

pub fn hammersley_2d(i: u32, n: u32) -> Vector2<f32> {
    return vector![i as f32 / n as f32, radical_inverse_vdc(i)];
}

/// Importance sample of the GGX normal distribution: a half-vector around
/// the normal, biased towards the specular lobe of the given roughness.
pub fn importance_sample_ggx(xi: Vector2<f32>, n: Vector3<f32>, roughness: f32) -> Vector3<f32> {
    let a = roughness * roughness;

    let phi = 2.0 * PI * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

    // Spherical to cartesian, in tangent space around the normal.
    let h = vector![phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta];

    let up = if n.z.abs() < 0.999 {
        vector![0.0, 0.0, 1.0]
    } else {
        vector![1.0, 0.0, 0.0]
    };
    let tangent = up.cross(&n).normalize();
    let bitangent = n.cross(&tangent);

    return (tangent * h.x + bitangent * h.y + n * h.z).normalize();
}

/// Schlick-GGX occlusion for one direction with the IBL remapping k = a^2 / 2.
fn schlick_ggx_geometry(n_dot_v: f32, roughness: f32) -> f32 {
    let k = roughness * roughness / 2.0;
    return n_dot_v / (n_dot_v * (1.0 - k) + k);
}

fn geometry_smith(n_dot_v: f32, n_dot_l: f32, roughness: f32) -> f32 {
    return schlick_ggx_geometry(n_dot_v, roughness) * schlick_ggx_geometry(n_dot_l, roughness);
}

/// Outward direction through the texel (x, y) of a cubemap face, on a cube
/// of half-extent 0.5. `length` is the texel coordinate span (size - 1).
pub fn face_direction(face_id: usize, x: u32, y: u32, length: f32) -> Vector3<f32> {
    let s = x as f32 / length;
    let t = y as f32 / length;
    return match face_id {
        0 => vector![0.5, -0.5 + t, -0.5 + s],  // +x, right
        1 => vector![-0.5, -0.5 + t, 0.5 - s],  // -x, left
        2 => vector![-0.5 + s, 0.5, -0.5 + t],  // +y, top
        3 => vector![-0.5 + s, -0.5, 0.5 - t],  // -y, bottom
        4 => vector![0.5 - s, -0.5 + t, 0.5],   // +z, back
        _ => vector![-0.5 + s, -0.5 + t, -0.5], // -z, front
    };
}

/// Fans a per-texel integration job out over the pool in disjoint row
/// chunks and reassembles the finished rows into one image. Workers share
/// nothing mutable; each owns its rows and reports them over a channel.
fn integrate_rows(
    width: u32,
    height: u32,
    pool: &ThreadPool,
    texel: Arc<dyn Fn(u32, u32) -> Vector3<f32> + Send + Sync>,
) -> RgbImage {
    let workers = pool.max_count().max(1) as u32;
    let rows_per_job = (height + workers - 1) / workers;
    let (sender, receiver) = mpsc::channel::<(u32, Vec<u8>)>();

    let mut row_start = 0;
    while row_start < height {
        let row_end = (row_start + rows_per_job).min(height);
        let sender = sender.clone();
        let texel = Arc::clone(&texel);
        pool.execute(move || {
            for y in row_start..row_end {
                let mut row = vec![0u8; (3 * width) as usize];
                for x in 0..width {
                    let color = texel(x, y);
                    row[(3 * x) as usize] = (color.x * 255.0).min(255.0) as u8;
                    row[(3 * x + 1) as usize] = (color.y * 255.0).min(255.0) as u8;
                    row[(3 * x + 2) as usize] = (color.z * 255.0).min(255.0) as u8;
                }
                // The receiver outlives the pool jobs, a send cannot fail
                // until the output image below is fully assembled.
                let _ = sender.send((y, row));
            }
        });
        row_start = row_end;
    }
    drop(sender);

    let mut output = RgbImage::new(width, height);
    for (y, row) in receiver {
        for x in 0..width {
            let i = (3 * x) as usize;
            output.put_pixel(x, y, Rgb([row[i], row[i + 1], row[i + 2]]));
        }
    }
    return output;
}

/// Convolves the environment into diffuse irradiance for one output face.
/// Every output direction is treated as a surface normal and the incoming
/// radiance is integrated over its hemisphere with fixed angular steps,
/// weighted by cos(theta) sin(theta).
pub fn generate_irradiance_map(
    face_id: usize,
    environment: Arc<Cubemap>,
    pool: &ThreadPool,
    size: u32,
) -> RgbImage {
    let length = (size - 1) as f32;
    let texel = move |x: u32, y: u32| -> Vector3<f32> {
        let normal = face_direction(face_id, x, y, length).normalize();
        let up = if normal.y.abs() < 0.999 {
            vector![0.0, 1.0, 0.0]
        } else {
            vector![0.0, 0.0, 1.0]
        };
        let right = up.cross(&normal).normalize();
        let up = normal.cross(&right);

        let mut irradiance = Vector3::zeros();
        let mut num_samples = 0;
        let mut phi = 0.0f32;
        while phi < 2.0 * PI {
            let mut theta = 0.0f32;
            while theta < 0.5 * PI {
                // Spherical to cartesian in tangent space, then to world.
                let tangent_sample =
                    vector![theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()];
                let sample_dir =
                    (right * tangent_sample.x + up * tangent_sample.y + normal * tangent_sample.z)
                        .normalize();
                irradiance += cubemap_sample(sample_dir, &environment) * theta.sin() * theta.cos();
                num_samples += 1;
                theta += IRRADIANCE_SAMPLE_DELTA;
            }
            phi += IRRADIANCE_SAMPLE_DELTA;
        }

        return irradiance * PI / num_samples as f32;
    };

    return integrate_rows(size, size, pool, Arc::new(texel));
}

/// Resolution of a prefiltered mip level: halved per level down to a floor.
pub fn prefilter_size(mip_level: usize, base_size: u32) -> u32 {
    let floor = PREFILTER_FLOOR.min(base_size);
    return (base_size >> mip_level).max(floor);
}

/// Roughness value a mip level of the prefiltered chain stands for.
pub fn prefilter_roughness(mip_level: usize) -> f32 {
    return mip_level as f32 / (PREFILTER_MIP_LEVELS - 1) as f32;
}

/// Prefilters the environment for one face of one specular mip level by
/// GGX importance sampling around the reflection direction, accumulating
/// radiance weighted by n_dot_l.
pub fn generate_prefilter_map(
    face_id: usize,
    mip_level: usize,
    environment: Arc<Cubemap>,
    pool: &ThreadPool,
    base_size: u32,
) -> RgbImage {
    let size = prefilter_size(mip_level, base_size);
    let roughness = prefilter_roughness(mip_level);
    let length = (size - 1) as f32;

    let texel = move |x: u32, y: u32| -> Vector3<f32> {
        let normal = face_direction(face_id, x, y, length).normalize();
        // Split-sum simplification: view and reflection collapse onto the
        // normal direction.
        let v = normal;

        let mut prefiltered = Vector3::zeros();
        let mut total_weight = 0.0f32;
        for i in 0..GGX_SAMPLE_COUNT {
            let xi = hammersley_2d(i, GGX_SAMPLE_COUNT);
            let h = importance_sample_ggx(xi, normal, roughness);
            let l = (2.0 * v.dot(&h) * h - v).normalize();

            let n_dot_l = normal.dot(&l).max(0.0);
            if n_dot_l > 0.0 {
                prefiltered += cubemap_sample(l, &environment) * n_dot_l;
                total_weight += n_dot_l;
            }
        }

        if total_weight <= 0.0 {
            return Vector3::zeros();
        }
        return prefiltered / total_weight;
    };

    return integrate_rows(size, size, pool, Arc::new(texel));
}

/// Split-sum BRDF response: scale (x) and bias (y) applied to F0 for a
/// given view angle and roughness. The z component is unused padding so the
/// result drops straight into an rgb texel.
pub fn integrate_brdf(n_dot_v: f32, roughness: f32) -> Vector3<f32> {
    // The integrand is isotropic, any view vector with this polar angle works.
    let v = vector![0.0, (1.0 - n_dot_v * n_dot_v).sqrt(), n_dot_v];
    let n = vector![0.0, 0.0, 1.0];

    let mut a = 0.0f32;
    let mut b = 0.0f32;
    for i in 0..GGX_SAMPLE_COUNT {
        let xi = hammersley_2d(i, GGX_SAMPLE_COUNT);
        let h = importance_sample_ggx(xi, n, roughness);
        let l = (2.0 * v.dot(&h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(&h).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_smith(n_dot_v.max(0.0), n_dot_l, roughness);
            let g_vis = g * v_dot_h / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powi(5);

            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }

    return vector![a, b, 0.0] / GGX_SAMPLE_COUNT as f32;
}

/// Tabulates `integrate_brdf` over a (n_dot_v, roughness) grid. The first
/// column uses n_dot_v = 0.002 instead of zero to keep the geometry term
/// finite.
pub fn generate_brdf_lut(pool: &ThreadPool, size: u32) -> RgbImage {
    let texel = move |x: u32, y: u32| -> Vector3<f32> {
        let n_dot_v = if x == 0 { 0.002 } else { x as f32 / size as f32 };
        let roughness = y as f32 / size as f32;
        return integrate_brdf(n_dot_v, roughness);
    };
    return integrate_rows(size, size, pool, Arc::new(texel));
}

/// Offline IBL pass: writes the irradiance cubemap (`i_px.tga` ..), the
/// prefiltered specular mip chain (`m<level>_px.tga` ..) and the BRDF
/// lookup table (`brdf_lut.tga`) into `out_dir`. Jobs always run to
/// completion, there is no cancellation.
pub fn bake_ibl(
    environment: Arc<Cubemap>,
    out_dir: &str,
    workers: usize,
) -> Result<(), Box<dyn Error>> {
    let pool = ThreadPool::new(workers);

    for (face_id, face_name) in FACE_NAMES.iter().enumerate() {
        let map = generate_irradiance_map(face_id, Arc::clone(&environment), &pool, IRRADIANCE_SIZE);
        // Flipped vertically to place the origin in the bottom left corner.
        let map = imageops::flip_vertical(&map);
        map.save(format!("{}/i_{}.tga", out_dir, face_name))?;
        println!("irradiance face {} done", face_name);
    }

    for mip_level in 0..PREFILTER_MIP_LEVELS {
        for (face_id, face_name) in FACE_NAMES.iter().enumerate() {
            let map = generate_prefilter_map(
                face_id,
                mip_level,
                Arc::clone(&environment),
                &pool,
                PREFILTER_BASE_SIZE,
            );
            let map = imageops::flip_vertical(&map);
            map.save(format!("{}/m{}_{}.tga", out_dir, mip_level, face_name))?;
        }
        println!("prefilter mip {} done", mip_level);
    }

    let lut = generate_brdf_lut(&pool, BRDF_LUT_SIZE);
    lut.save(format!("{}/brdf_lut.tga", out_dir))?;
    println!("brdf lut done");

    return Ok(());
}
