//! Orbit camera around the composed scene.
//!
//! The camera is parameterised by azimuth, polar angle and distance from a
//! look-at target that starts at the origin. Every operation re-clamps to the
//! configured limits, so no sequence of inputs can leave the presentable arc,
//! look from below the floor or clip into the vehicle.

use cgmath::{Deg, InnerSpace, Matrix4, Point3, Rad, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

use crate::config::CameraConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButtonState {
    Left,
    Right,
    None,
}

#[derive(Clone, Debug)]
pub struct CameraController {
    config: CameraConfig,
    azimuth: f32,
    polar: f32,
    distance: f32,
    target: Vector3<f32>,
    pressed: MouseButtonState,
    cursor: Option<(f64, f64)>,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let mut camera = Self {
            azimuth: config.default_azimuth,
            polar: config.default_polar,
            distance: config.default_distance,
            target: Vector3::new(0.0, 0.0, 0.0),
            pressed: MouseButtonState::None,
            cursor: None,
            config,
        };
        camera.clamp();
        camera
    }

    pub fn azimuth(&self) -> Deg<f32> {
        Deg(self.azimuth)
    }

    pub fn polar(&self) -> Deg<f32> {
        Deg(self.polar)
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn target(&self) -> Point3<f32> {
        Point3::new(self.target.x, self.target.y, self.target.z)
    }

    fn clamp(&mut self) {
        let c = &self.config;
        self.azimuth = self.azimuth.clamp(c.min_azimuth, c.max_azimuth);
        self.polar = self.polar.clamp(c.min_polar, c.max_polar);
        self.distance = self.distance.clamp(c.min_distance, c.max_distance);
        if self.target.magnitude() > c.max_pan {
            self.target = self.target.normalize_to(c.max_pan);
        }
    }

    /// Rotates by the given angles in degrees.
    pub fn orbit(&mut self, d_azimuth: f32, d_polar: f32) {
        self.azimuth += d_azimuth;
        self.polar += d_polar;
        self.clamp();
    }

    /// Moves the look-at target within the camera's screen plane.
    pub fn pan(&mut self, right: f32, up: f32) {
        let forward = (self.target() - self.eye()).normalize();
        let right_axis = forward.cross(Vector3::unit_y()).normalize();
        let up_axis = right_axis.cross(forward);
        self.target += right_axis * right + up_axis * up;
        self.clamp();
    }

    pub fn zoom_in(&mut self) {
        self.distance *= self.config.zoom_step;
        self.clamp();
    }

    pub fn zoom_out(&mut self) {
        self.distance /= self.config.zoom_step;
        self.clamp();
    }

    pub fn reset(&mut self) {
        self.azimuth = self.config.default_azimuth;
        self.polar = self.config.default_polar;
        self.distance = self.config.default_distance;
        self.target = Vector3::new(0.0, 0.0, 0.0);
        self.clamp();
    }

    /// Camera position in world space.
    pub fn eye(&self) -> Point3<f32> {
        let (sin_polar, cos_polar) = Rad::from(Deg(self.polar)).0.sin_cos();
        let (sin_az, cos_az) = Rad::from(Deg(self.azimuth)).0.sin_cos();
        let offset = Vector3::new(sin_polar * sin_az, cos_polar, sin_polar * cos_az) * self.distance;
        self.target() + offset
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye(), self.target(), Vector3::unit_y())
    }

    /// Feeds a window event into the controller. Returns whether the pose changed.
    pub fn handle_window_events(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32,
                };
                if scroll > 0.0 {
                    self.zoom_in();
                } else if scroll < 0.0 {
                    self.zoom_out();
                }
                scroll != 0.0
            }
            WindowEvent::MouseInput { state, button, .. } => {
                self.pressed = match (button, state) {
                    (MouseButton::Left, ElementState::Pressed) => MouseButtonState::Left,
                    (MouseButton::Right, ElementState::Pressed) => MouseButtonState::Right,
                    (_, ElementState::Released) => MouseButtonState::None,
                    _ => self.pressed,
                };
                false
            }
            WindowEvent::CursorMoved { position, .. } => {
                let previous = self.cursor.replace((position.x, position.y));
                let Some((x, y)) = previous else {
                    return false;
                };
                let (dx, dy) = ((position.x - x) as f32, (position.y - y) as f32);
                match self.pressed {
                    MouseButtonState::Left => {
                        let speed = self.config.rotate_speed;
                        self.orbit(-dx * speed, -dy * speed);
                        true
                    }
                    MouseButtonState::Right => {
                        let speed = self.config.pan_speed * self.distance;
                        self.pan(-dx * speed, dy * speed);
                        true
                    }
                    MouseButtonState::None => false,
                }
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.pressed = MouseButtonState::None;
                false
            }
            _ => false,
        }
    }
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}
