use std::env;
use std::sync::Arc;

use tiny_pbr::app;
use tiny_pbr::sampler::{bake_ibl, Cubemap};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 800;
const BAKE_WORKERS: usize = 4;

#[show_image::main]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Default values.
    let mut asset_path = String::from("assets/helmet");
    let mut shader_name = String::from("pbr");
    let mut env_prefix: Option<String> = None;
    let mut out_dir = String::from("output");
    let mut print_fps = false;
    let mut bake = false;

    let args: Vec<String> = env::args().collect();
    for i in 1..args.len() {
        match args[i].as_str() {
            "-p" => { asset_path = args[i + 1].clone(); }
            "-s" => { shader_name = args[i + 1].clone(); }
            "-e" => { env_prefix = Some(args[i + 1].clone()); }
            "--out" => { out_dir = args[i + 1].clone(); }
            "--fps" => { print_fps = true; }
            "--bake-ibl" => { bake = true; }
            _ => ()
        }
    }

    if bake {
        let prefix = env_prefix.ok_or("baking needs an environment prefix, pass -e")?;
        let environment = Arc::new(Cubemap::load(&prefix)?);
        bake_ibl(environment, &out_dir, BAKE_WORKERS)?;
        return Ok(());
    }

    let params = app::Params {
        width: WIDTH,
        height: HEIGHT,
        print_fps,
        asset_path,
        shader_name,
        env_prefix,
    };

    app::run(params)?;

    return Ok(());
}
