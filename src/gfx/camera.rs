//! Camera
//!
//! The renderer only consumes view, inverse-view and projection matrices; how
//! they are derived is up to the [`Camera`] implementation.

use cgmath::*;

/// Remaps OpenGL clip depth (-1..1) to wgpu's 0..1. `Matrix4::new` takes
/// columns, so the 0.5 offset sits in the last column.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Matrix provider consumed by the renderer once per frame.
pub trait Camera {
    /// Advances host-driven motion by `dt` seconds.
    fn update(&mut self, dt: f32);

    /// Rebuilds the view and inverse-view matrices from the current pose.
    fn recompute_view(&mut self);

    fn view(&self) -> Matrix4<f32>;

    fn view_inverse(&self) -> Matrix4<f32>;

    fn projection(&self) -> Matrix4<f32>;

    fn origin(&self) -> Point3<f32>;

    /// Rebuilds the projection for a surface of the given width / height ratio.
    fn set_aspect(&mut self, aspect: f32);

    /// Sets the motion `update` integrates. Cameras without host control ignore it.
    fn steer(&mut self, _velocity: Vector3<f32>, _turn_rate: Rad<f32>) {}
}

/// Free-flying perspective camera. Yaw zero looks down +Z.
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveCamera {
    pub origin: Point3<f32>,
    pub yaw: Rad<f32>,
    pub fovy: Rad<f32>,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
    /// Movement in camera space (x right, y up, z forward), units per second.
    pub velocity: Vector3<f32>,
    /// Yaw change per second.
    pub turn_rate: Rad<f32>,
    view: Matrix4<f32>,
    view_inverse: Matrix4<f32>,
    projection: Matrix4<f32>,
}

impl PerspectiveCamera {
    pub fn new(origin: Vector3<f32>, fovy: impl Into<Rad<f32>>, aspect: f32) -> Self {
        let fovy = fovy.into();
        let mut camera = Self {
            origin: Point3::from_vec(origin),
            yaw: Rad(0.0),
            fovy,
            aspect,
            znear: 0.1,
            zfar: 1000.0,
            velocity: Vector3::zero(),
            turn_rate: Rad(0.0),
            view: Matrix4::identity(),
            view_inverse: Matrix4::identity(),
            projection: Matrix4::identity(),
        };
        camera.set_aspect(aspect);
        camera.recompute_view();
        camera
    }

    pub fn forward(&self) -> Vector3<f32> {
        Vector3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn right(&self) -> Vector3<f32> {
        // Right-handed with +Y up: forward x up
        self.forward().cross(Vector3::unit_y())
    }

    pub fn set_velocity(&mut self, velocity: Vector3<f32>) {
        self.velocity = velocity;
    }

    pub fn set_turn_rate(&mut self, turn_rate: Rad<f32>) {
        self.turn_rate = turn_rate;
    }
}

impl Camera for PerspectiveCamera {
    fn update(&mut self, dt: f32) {
        self.yaw += self.turn_rate * dt;
        let motion = self.right() * self.velocity.x
            + Vector3::unit_y() * self.velocity.y
            + self.forward() * self.velocity.z;
        self.origin += motion * dt;
    }

    fn recompute_view(&mut self) {
        self.view = Matrix4::look_to_rh(self.origin, self.forward(), Vector3::unit_y());
        self.view_inverse = self.view.invert().unwrap_or_else(Matrix4::identity);
    }

    fn view(&self) -> Matrix4<f32> {
        self.view
    }

    fn view_inverse(&self) -> Matrix4<f32> {
        self.view_inverse
    }

    fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    fn origin(&self) -> Point3<f32> {
        self.origin
    }

    fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection =
            OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, aspect, self.znear, self.zfar);
    }

    fn steer(&mut self, velocity: Vector3<f32>, turn_rate: Rad<f32>) {
        self.set_velocity(velocity);
        self.set_turn_rate(turn_rate);
    }
}
