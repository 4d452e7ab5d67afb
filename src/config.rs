//! Renderer configuration
//!
//! Plain builder-style structs, resolved once by the host at startup and passed
//! down. Nothing in the core reads build flags or the environment directly.

use cgmath::Vector3;

/// Device and presentation settings.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Requested present mode. Falls back to `Mailbox`, then `Fifo`, when the
    /// surface does not support it.
    pub present_mode: wgpu::PresentMode,
    pub power_preference: wgpu::PowerPreference,
    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,
    /// Frames the presentation engine may queue ahead.
    pub desired_maximum_frame_latency: u32,
    pub required_limits: wgpu::Limits,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            present_mode: wgpu::PresentMode::Immediate, // No sync wait on present
            power_preference: wgpu::PowerPreference::HighPerformance,
            prefer_srgb: true,
            desired_maximum_frame_latency: 1,
            required_limits: wgpu::Limits::downlevel_defaults(),
        }
    }
}

impl DeviceConfig {
    pub fn with_present_mode(mut self, present_mode: wgpu::PresentMode) -> Self {
        self.present_mode = present_mode;
        self
    }

    pub fn with_power_preference(mut self, power_preference: wgpu::PowerPreference) -> Self {
        self.power_preference = power_preference;
        self
    }

    pub fn with_frame_latency(mut self, frames: u32) -> Self {
        self.desired_maximum_frame_latency = frames.max(1);
        self
    }
}

/// Shader compilation switches for effect loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectCompileConfig {
    /// Attach the effect path to every GPU object created for it.
    pub debug_labels: bool,
    /// Run the full naga validator before handing the module to wgpu, so that
    /// validation failures carry source-annotated diagnostics.
    pub strict_validation: bool,
}

impl Default for EffectCompileConfig {
    fn default() -> Self {
        Self {
            debug_labels: false,
            strict_validation: true,
        }
    }
}

impl EffectCompileConfig {
    /// Debug builds get labelled GPU objects; validation is on in both profiles.
    pub fn from_build_profile() -> Self {
        Self {
            debug_labels: cfg!(debug_assertions),
            strict_validation: true,
        }
    }

    pub fn with_debug_labels(mut self, enabled: bool) -> Self {
        self.debug_labels = enabled;
        self
    }

    pub fn with_strict_validation(mut self, enabled: bool) -> Self {
        self.strict_validation = enabled;
        self
    }
}

/// Top-level configuration of the frame orchestrator.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Background color the color target is cleared to (RGB).
    pub clear_color: [f32; 3],
    /// Mesh spin rate around the up axis, degrees per second.
    pub rotation_speed_degrees: f32,
    pub camera_origin: Vector3<f32>,
    pub field_of_view_degrees: f32,
    pub device: DeviceConfig,
    pub effects: EffectCompileConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.0, 0.0, 0.3],
            rotation_speed_degrees: 45.0,
            camera_origin: Vector3::new(0.0, 0.0, -10.0),
            field_of_view_degrees: 45.0,
            device: DeviceConfig::default(),
            effects: EffectCompileConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_clear_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.clear_color = [r, g, b];
        self
    }

    pub fn with_rotation_speed(mut self, degrees_per_second: f32) -> Self {
        self.rotation_speed_degrees = degrees_per_second;
        self
    }

    pub fn with_camera(mut self, origin: Vector3<f32>, field_of_view_degrees: f32) -> Self {
        self.camera_origin = origin;
        self.field_of_view_degrees = field_of_view_degrees;
        self
    }

    pub fn with_device(mut self, device: DeviceConfig) -> Self {
        self.device = device;
        self
    }

    pub fn with_effects(mut self, effects: EffectCompileConfig) -> Self {
        self.effects = effects;
        self
    }
}
