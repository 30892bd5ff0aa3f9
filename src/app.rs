use std::error::Error;
use std::f32::consts::PI;
use std::time;

use na::{vector, Matrix4, Perspective3};
use nalgebra as na;
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};

use crate::camera::{Camera, InputState};
use crate::model::Model;
use crate::rasterizer::{ClearTargets, Rasterizer};
use crate::shader::pbr::PbrShader;
use crate::shader::phong::PhongShader;
use crate::shader::skybox::SkyboxShader;
use crate::shader::Shader;

const FOV_Y: f32 = PI / 3.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 100.0;
const CAMERA_DISTANCE: f32 = 3.0;

pub struct Params {
    pub width: u32,
    pub height: u32,
    pub print_fps: bool,
    pub asset_path: String,
    pub shader_name: String,
    pub env_prefix: Option<String>,
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: &event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape)
            && event.input.state.is_released()
        {
            return true;
        }
    }

    return false;
}

/// Tracks held keys so the camera can move smoothly across frames.
fn apply_key_event(input: &mut InputState, window_event: &event::WindowEvent) {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        let pressed = event.input.state.is_pressed();
        match event.input.key_code {
            Some(event::VirtualKeyCode::Left) | Some(event::VirtualKeyCode::A) => {
                input.orbit_left = pressed;
            }
            Some(event::VirtualKeyCode::Right) | Some(event::VirtualKeyCode::D) => {
                input.orbit_right = pressed;
            }
            Some(event::VirtualKeyCode::Up) | Some(event::VirtualKeyCode::W) => {
                input.orbit_up = pressed;
            }
            Some(event::VirtualKeyCode::Down) | Some(event::VirtualKeyCode::S) => {
                input.orbit_down = pressed;
            }
            Some(event::VirtualKeyCode::E) => {
                input.zoom_in = pressed;
            }
            Some(event::VirtualKeyCode::Q) => {
                input.zoom_out = pressed;
            }
            _ => (),
        }
    }
}

fn make_shader(name: &str) -> Box<dyn Shader> {
    return match name {
        "phong" => Box::new(PhongShader::new()),
        _ => Box::new(PbrShader::new()),
    };
}

/// Same view matrix with the translation dropped, so the skybox never gets
/// closer no matter where the camera goes.
fn strip_translation(view: Matrix4<f32>) -> Matrix4<f32> {
    let mut rotation_only = view;
    rotation_only[(0, 3)] = 0.0;
    rotation_only[(1, 3)] = 0.0;
    rotation_only[(2, 3)] = 0.0;
    return rotation_only;
}

/// Actually launches the window, rendering frames until Escape is pressed.
/// Takes struct, defining execution context.
pub fn run(params: Params) -> Result<(), Box<dyn Error>> {
    let mut rasterizer = Rasterizer::new(params.width, params.height);

    let mut model = Model::load(&format!("{}.obj", params.asset_path))?;
    println!("Loaded model with {} faces", model.nfaces());

    let skybox = match &params.env_prefix {
        Some(prefix) => {
            // Baked lighting artifacts live next to the environment faces.
            let ibl_dir = match prefix.rsplit_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => String::from("."),
            };
            model.load_ibl_maps(&ibl_dir);
            let skybox = Model::skybox(prefix)?;
            model.environment_map = skybox.environment_map.clone();
            Some(skybox)
        }
        None => None,
    };

    let mut shader = make_shader(&params.shader_name);
    let mut skybox_shader = SkyboxShader::new();

    let aspect = params.width as f32 / params.height as f32;
    let mut camera = Camera::new(na::Vector3::zeros(), CAMERA_DISTANCE);
    let projection = Perspective3::new(aspect, FOV_Y, Z_NEAR, Z_FAR).to_homogeneous();
    rasterizer.set_projection(projection);
    rasterizer.set_model(Matrix4::identity());

    shader.uniforms_mut().light.position = vector![2.0, 2.0, 2.0];
    shader.uniforms_mut().light.intensity = vector![3.0, 3.0, 3.0];

    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width, params.height]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut input = InputState::default();
    let mut exit = false;
    let mut last_frame = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        // Unloading all the garbage from event channel, that has piled up,
        // looking for exit and key state changes.
        for window_event in event_channel.try_iter() {
            if is_exit_event(&window_event) {
                exit = true;
            }
            apply_key_event(&mut input, &window_event);
        }

        let now = time::Instant::now();
        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        camera.update(&input, dt);

        let view = camera.view_matrix();
        rasterizer.clear(ClearTargets::ColorAndDepth);

        if let Some(skybox) = &skybox {
            rasterizer.set_view(strip_translation(view));
            rasterizer.draw(skybox, &mut skybox_shader);
        }

        rasterizer.set_view(view);
        shader.uniforms_mut().eye = camera.eye();
        rasterizer.draw(&model, shader.as_mut());

        let image_data = ImageView::new(
            ImageInfo::rgb8(params.width, params.height),
            rasterizer.as_render_data(),
        );
        window.set_image("image", image_data)?;

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            if time::Instant::now()
                .duration_since(frame_counter_time_begin)
                .as_secs_f32()
                > 1.0
            {
                println!("FPS --- {}", frame_counter);
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
