use glam::{Mat4, Vec3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// Orbit camera over a Y-up world in meters, standing in for the tracked
/// device pose.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    /// The point the camera orbits around.
    pub target: Vec3,
    /// Distance from the camera to the target (meters).
    pub radius_m: f32,
    /// Rotation around the world Y axis (radians).
    pub azimuth_rad: f32,
    /// Angle above the XZ plane (radians).
    pub elevation_rad: f32,

    pub fov_y_rad: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl OrbitCamera {
    pub fn new(target: Vec3, radius_m: f32, aspect: f32) -> Self {
        Self {
            target,
            radius_m,
            azimuth_rad: 30f32.to_radians(),
            elevation_rad: 25f32.to_radians(),
            fov_y_rad: 60f32.to_radians(),
            aspect,
            z_near: 0.05,
            z_far: 100.0,
        }
    }

    /// Camera position in world space.
    pub fn eye(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth_rad.sin_cos();
        let (sin_el, cos_el) = self.elevation_rad.sin_cos();
        self.target
            + self.radius_m * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.target, Vec3::Y)
    }

    /// wgpu clip space (depth in [0, 1]).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_rad, self.aspect, self.z_near, self.z_far)
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }
}

pub struct CameraController {
    mouse_down: bool,
    last_mouse: Option<(f64, f64)>,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    /// Creates a new controller with default state.
    pub fn new() -> Self {
        Self {
            mouse_down: false,
            last_mouse: None,
        }
    }

    /// Handles window events and updates the camera.
    pub fn handle_event(&mut self, event: &WindowEvent, camera: &mut OrbitCamera) {
        match event {
            WindowEvent::MouseInput { button, state, .. } => {
                if *button == MouseButton::Left {
                    self.mouse_down = *state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.handle_cursor_orbit((position.x, position.y), camera);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 120.0,
                };

                self.handle_scroll(scroll, camera);
            }
            _ => {}
        }
    }

    /// Adjusts orbit radius; positive delta zooms in.
    fn handle_scroll(&mut self, delta: f32, camera: &mut OrbitCamera) {
        let zoom = 1.1_f32.powf(-delta);
        camera.radius_m = (camera.radius_m * zoom).clamp(0.5, 50.0);
    }

    /// Rotates the camera around the target while the left mouse button is held.
    fn handle_cursor_orbit(&mut self, xy: (f64, f64), camera: &mut OrbitCamera) {
        if let Some(last) = self.last_mouse {
            if self.mouse_down {
                let dx = ((xy.0 - last.0) * 0.005) as f32;
                let dy = ((last.1 - xy.1) * 0.005) as f32;

                camera.azimuth_rad -= dx;
                camera.elevation_rad -= dy;

                // Stay off the poles so look_at keeps a valid up vector.
                camera.elevation_rad = camera
                    .elevation_rad
                    .clamp(-85f32.to_radians(), 85f32.to_radians());
            }
        }
        self.last_mouse = Some(xy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eye_sits_at_radius_from_target() {
        let cam = OrbitCamera::new(Vec3::new(1.0, 0.0, -1.0), 4.0, 1.0);
        assert!((cam.eye().distance(cam.target) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let cam = OrbitCamera::new(Vec3::ZERO, 3.0, 16.0 / 9.0);
        let clip = cam.projection() * cam.view() * cam.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-5 && ndc.y.abs() < 1e-5);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 3.0, 1.0);
        let mut ctl = CameraController::new();
        for _ in 0..200 {
            ctl.handle_scroll(5.0, &mut cam);
        }
        assert_eq!(cam.radius_m, 0.5);
    }

    #[test]
    fn orbit_requires_button_and_clamps_elevation() {
        let mut cam = OrbitCamera::new(Vec3::ZERO, 3.0, 1.0);
        let mut ctl = CameraController::new();
        let before = cam.azimuth_rad;
        ctl.handle_cursor_orbit((0.0, 0.0), &mut cam);
        ctl.handle_cursor_orbit((100.0, 0.0), &mut cam);
        assert_eq!(cam.azimuth_rad, before);

        ctl.mouse_down = true;
        ctl.handle_cursor_orbit((100.0, 10_000.0), &mut cam);
        assert_eq!(cam.elevation_rad, 85f32.to_radians());
    }
}
