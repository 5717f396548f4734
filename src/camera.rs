//! Camera, projection and the orbit controller used outside of immersive sessions.
//!
//! While an XR session is running the platform supplies view and projection
//! matrices per frame; [`Camera::set_xr_view`] overrides the look-at camera with
//! them until the session ends.

use cgmath::{InnerSpace, Matrix4, Point3, Rad, SquareMatrix, Vector3, perspective};

use crate::xr::XrView;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Projection {
    aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    pub projection: Projection,
    xr_view: Option<XrView>,
}

impl Camera {
    pub fn new(position: Point3<f32>, target: Point3<f32>, projection: Projection) -> Self {
        Self {
            position,
            target,
            up: Vector3::unit_y(),
            projection,
            xr_view: None,
        }
    }

    pub fn set_xr_view(&mut self, view: Option<XrView>) {
        self.xr_view = view;
    }

    pub fn xr_view(&self) -> Option<&XrView> {
        self.xr_view.as_ref()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.projection.resize(width, height);
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        match &self.xr_view {
            Some(xr) => xr.view,
            None => Matrix4::look_at_rh(self.position, self.target, self.up),
        }
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        match &self.xr_view {
            Some(xr) => OPENGL_TO_WGPU_MATRIX * xr.projection,
            None => self.projection.calc_matrix(),
        }
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    /// Position of the eye in world space.
    pub fn eye(&self) -> Point3<f32> {
        match self.xr_view.and_then(|xr| xr.view.invert()) {
            Some(pose) => Point3::new(pose.w.x, pose.w.y, pose.w.z),
            None => self.position,
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    view_position: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        let eye = camera.eye();
        self.view_position = [eye.x, eye.y, eye.z, 1.0];
        self.view_proj = camera.view_proj().into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Orbits the camera around its target with damped mouse input.
#[derive(Debug)]
pub struct OrbitController {
    rotate_speed: f32,
    zoom_speed: f32,
    /// Fraction of the remaining motion dropped every update.
    pub damping_factor: f32,
    yaw_velocity: f32,
    pitch_velocity: f32,
    zoom_velocity: f32,
    dragging: bool,
}

impl OrbitController {
    const MIN_PITCH: f32 = -1.5;
    const MAX_PITCH: f32 = 1.5;

    pub fn new(rotate_speed: f32, zoom_speed: f32) -> Self {
        Self {
            rotate_speed,
            zoom_speed,
            damping_factor: 0.05,
            yaw_velocity: 0.0,
            pitch_velocity: 0.0,
            zoom_velocity: 0.0,
            dragging: false,
        }
    }

    /// Starts or stops a drag. Pointer motion only orbits while dragging.
    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Pointer movement in pixels; ignored unless a drag is in progress.
    pub fn handle_drag(&mut self, dx: f64, dy: f64) {
        if self.dragging {
            self.handle_mouse(dx, dy);
        }
    }

    /// Mouse movement in pixels while the orbit button is held.
    pub fn handle_mouse(&mut self, dx: f64, dy: f64) {
        self.yaw_velocity -= dx as f32 * self.rotate_speed;
        self.pitch_velocity += dy as f32 * self.rotate_speed;
    }

    pub fn handle_scroll(&mut self, lines: f32) {
        self.zoom_velocity -= lines * self.zoom_speed;
    }

    /// Converts a DOM `WheelEvent` delta into scroll lines, positive away from the user.
    pub fn wheel_lines(delta_y: f64, delta_mode: u32) -> f32 {
        let lines = match delta_mode {
            // DOM_DELTA_PIXEL
            0 => delta_y / 50.0,
            // DOM_DELTA_LINE
            1 => delta_y,
            // DOM_DELTA_PAGE
            _ => delta_y * 10.0,
        };
        -lines as f32
    }

    pub fn is_moving(&self) -> bool {
        [self.yaw_velocity, self.pitch_velocity, self.zoom_velocity]
            .iter()
            .any(|v| v.abs() > 1e-5)
    }

    pub fn update(&mut self, camera: &mut Camera) {
        let offset = camera.position - camera.target;
        let radius = offset.magnitude();
        if radius <= f32::EPSILON {
            return;
        }
        let mut yaw = offset.x.atan2(offset.z);
        let mut pitch = (offset.y / radius).asin();

        yaw += self.yaw_velocity * self.damping_factor;
        pitch = (pitch + self.pitch_velocity * self.damping_factor)
            .clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        let radius = (radius * (1.0 + self.zoom_velocity * self.damping_factor)).max(0.1);

        let offset = Vector3::new(
            radius * pitch.cos() * yaw.sin(),
            radius * pitch.sin(),
            radius * pitch.cos() * yaw.cos(),
        );
        camera.position = camera.target + offset;

        let keep = 1.0 - self.damping_factor;
        self.yaw_velocity *= keep;
        self.pitch_velocity *= keep;
        self.zoom_velocity *= keep;
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, EuclideanSpace, assert_relative_eq};

    use super::*;

    fn camera() -> Camera {
        Camera::new(
            Point3::new(0.0, 0.0, 3.0),
            Point3::origin(),
            Projection::new(800, 600, Deg(70.0), 0.01, 40.0),
        )
    }

    #[test]
    fn resize_updates_aspect() {
        let mut camera = camera();
        camera.resize(1000, 500);
        assert_eq!(camera.projection.aspect(), 2.0);
        // A zero height does not produce an infinite aspect.
        camera.resize(10, 0);
        assert_eq!(camera.projection.aspect(), 10.0);
    }

    #[test]
    fn xr_view_overrides_look_at() {
        let mut camera = camera();
        let view = Matrix4::from_translation(Vector3::new(0.0, -1.6, 0.0));
        camera.set_xr_view(Some(XrView {
            view,
            projection: Matrix4::identity(),
        }));
        assert_eq!(camera.view_matrix(), view);
        assert_relative_eq!(camera.eye(), Point3::new(0.0, 1.6, 0.0), epsilon = 1e-6);
        camera.set_xr_view(None);
        assert_eq!(camera.eye(), Point3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn orbit_keeps_distance_and_settles() {
        let mut camera = camera();
        let mut controller = OrbitController::new(0.01, 0.1);
        controller.handle_mouse(100.0, 0.0);
        for _ in 0..500 {
            controller.update(&mut camera);
        }
        assert!(!controller.is_moving());
        let distance = (camera.position - camera.target).magnitude();
        assert_relative_eq!(distance, 3.0, epsilon = 1e-4);
        assert!(camera.position.x.abs() > 0.1);
    }

    #[test]
    fn pointer_motion_only_orbits_while_dragging() {
        let mut camera = camera();
        let mut controller = OrbitController::new(0.01, 0.1);

        controller.handle_drag(120.0, 40.0);
        assert!(!controller.is_moving());
        controller.update(&mut camera);
        assert_eq!(camera.position, Point3::new(0.0, 0.0, 3.0));

        controller.set_dragging(true);
        controller.handle_drag(120.0, 40.0);
        assert!(controller.is_moving());
        controller.update(&mut camera);
        assert!(camera.position.x.abs() > 1e-3);

        controller.set_dragging(false);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn wheel_down_zooms_out() {
        let mut camera = camera();
        let mut controller = OrbitController::new(0.01, 0.1);
        let lines = OrbitController::wheel_lines(100.0, 0);
        assert_eq!(lines, -2.0);
        assert_eq!(OrbitController::wheel_lines(-3.0, 1), 3.0);

        controller.handle_scroll(lines);
        controller.update(&mut camera);
        assert!((camera.position - camera.target).magnitude() > 3.0);
    }
}
