use na::{vector, Matrix4, Point3, Vector3};
use nalgebra as na;

const ORBIT_SPEED: f32 = 1.2; // Radians per second.
const ZOOM_SPEED: f32 = 2.0;
const MIN_DISTANCE: f32 = 0.5;
const MAX_DISTANCE: f32 = 20.0;
const MAX_PITCH: f32 = 1.5;

/// Keys held down this frame, polled from the window event channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    pub orbit_left: bool,
    pub orbit_right: bool,
    pub orbit_up: bool,
    pub orbit_down: bool,
    pub zoom_in: bool,
    pub zoom_out: bool,
}

/// Orbit camera circling a fixed target. Spherical offsets (yaw, pitch,
/// distance) are the source of truth; eye position is derived from them.
pub struct Camera {
    pub target: Vector3<f32>,
    pub up: Vector3<f32>,
    yaw: f32,
    pitch: f32,
    distance: f32,
}

impl Camera {
    pub fn new(target: Vector3<f32>, distance: f32) -> Camera {
        return Camera {
            target,
            up: vector![0.0, 1.0, 0.0],
            yaw: 0.0,
            pitch: 0.0,
            distance,
        };
    }

    pub fn eye(&self) -> Vector3<f32> {
        let offset = vector![
            self.distance * self.pitch.cos() * self.yaw.sin(),
            self.distance * self.pitch.sin(),
            self.distance * self.pitch.cos() * self.yaw.cos()
        ];
        return self.target + offset;
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = self.eye();
        return Matrix4::look_at_rh(
            &Point3::from(eye),
            &Point3::from(self.target),
            &self.up,
        );
    }

    /// Advances the orbit by the keys held over a frame of `dt` seconds.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        if input.orbit_left {
            self.yaw -= ORBIT_SPEED * dt;
        }
        if input.orbit_right {
            self.yaw += ORBIT_SPEED * dt;
        }
        if input.orbit_up {
            self.pitch += ORBIT_SPEED * dt;
        }
        if input.orbit_down {
            self.pitch -= ORBIT_SPEED * dt;
        }
        self.pitch = self.pitch.clamp(-MAX_PITCH, MAX_PITCH);

        if input.zoom_in {
            self.distance -= ZOOM_SPEED * dt;
        }
        if input.zoom_out {
            self.distance += ZOOM_SPEED * dt;
        }
        self.distance = self.distance.clamp(MIN_DISTANCE, MAX_DISTANCE);
    }
}
