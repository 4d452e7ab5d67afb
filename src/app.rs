use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use cgmath::{Deg, Rad, Vector3};
use log::{error, info, warn};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowAttributes, WindowId},
};

use crate::config::RendererConfig;
use crate::gfx::{GraphicsDevice, Renderer, RendererState, SceneDescription};

/// Camera speed while an arrow key is held, in units per second.
const MOVE_SPEED: f32 = 10.0;
/// Camera turn rate while an arrow key is held.
const TURN_SPEED: Deg<f32> = Deg(60.0);

/// Fixed offset of the reference scene from the camera origin.
const SCENE_OFFSET: Vector3<f32> = Vector3::new(0.0, 0.0, 50.0);

pub struct FlintApp {
    event_loop: Option<EventLoop<()>>,
    app_state: AppState,
}

struct AppState {
    window: Option<Arc<Window>>,
    renderer: Renderer<GraphicsDevice>,
    asset_root: PathBuf,
    last_frame: Instant,
    steering: Steering,
    fatal: Option<anyhow::Error>,
}

/// Arrow keys currently held.
#[derive(Debug, Default, Clone, Copy)]
struct Steering {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
}

impl Steering {
    /// Records a key transition. Returns false for keys that do not steer.
    fn press(&mut self, key: KeyCode, pressed: bool) -> bool {
        let flag = match key {
            KeyCode::ArrowUp => &mut self.forward,
            KeyCode::ArrowDown => &mut self.back,
            KeyCode::ArrowLeft => &mut self.left,
            KeyCode::ArrowRight => &mut self.right,
            _ => return false,
        };
        *flag = pressed;
        true
    }

    fn velocity(&self) -> Vector3<f32> {
        let axis = self.forward as i8 - self.back as i8;
        Vector3::new(0.0, 0.0, axis as f32 * MOVE_SPEED)
    }

    fn turn_rate(&self) -> Rad<f32> {
        // Positive yaw turns towards +X, which is to the left
        let axis = self.left as i8 - self.right as i8;
        Rad::from(TURN_SPEED) * axis as f32
    }
}

impl FlintApp {
    /// Create a new application that renders the reference scene from `asset_root`
    pub fn new(config: RendererConfig, asset_root: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let event_loop =
            EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {}", err))?;

        Ok(Self {
            event_loop: Some(event_loop),
            app_state: AppState {
                window: None,
                renderer: Renderer::new(config),
                asset_root: asset_root.into(),
                last_frame: Instant::now(),
                steering: Steering::default(),
                fatal: None,
            },
        })
    }

    /// Run the application (consumes self and starts the event loop)
    ///
    /// Returns the error that stopped the loop, if any.
    pub fn run(mut self) -> anyhow::Result<()> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or_else(|| anyhow!("event loop already consumed"))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        event_loop
            .run_app(&mut self.app_state)
            .map_err(|err| anyhow!("event loop terminated abnormally: {}", err))?;

        match self.app_state.fatal.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AppState {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{:#}", err);
        self.fatal = Some(err);
        event_loop.exit();
    }

    fn start_renderer(&mut self, window: Arc<Window>) -> anyhow::Result<()> {
        let size = window.inner_size();
        let state = self
            .renderer
            .initialize(size.width, size.height, |width, height, config| {
                GraphicsDevice::new(window, width, height, config)
            });

        if state != RendererState::Ready {
            let reason = self
                .renderer
                .init_error()
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("renderer left in {:?} state", state));
            return Err(anyhow!("graphics initialization failed: {}", reason));
        }

        let placement = self.renderer.config().camera_origin + SCENE_OFFSET;
        let scene = SceneDescription::vehicle_and_fire(&self.asset_root, placement);
        self.renderer
            .load_scene(&scene)
            .map_err(|err| anyhow::Error::new(err).context("failed to load the scene"))?;

        info!("press F2 to cycle techniques, arrow keys to move, Escape to quit");
        Ok(())
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.renderer.update(dt);
        match self.renderer.render() {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {}
            Err(err) => self.fail(event_loop, anyhow::Error::new(err).context("frame failed")),
        }
    }

    fn key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        let PhysicalKey::Code(key_code) = event.physical_key else {
            return;
        };
        let pressed = event.state == ElementState::Pressed;

        match key_code {
            KeyCode::Escape if pressed => event_loop.exit(),
            KeyCode::F2 if pressed && !event.repeat => self.renderer.switch_technique(),
            _ => {
                if self.steering.press(key_code, pressed) {
                    let (velocity, turn_rate) = (self.steering.velocity(), self.steering.turn_rate());
                    self.renderer.camera_mut().steer(velocity, turn_rate);
                }
            }
        }
    }
}

impl ApplicationHandler for AppState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = WindowAttributes::default()
            .with_title("Flint")
            .with_inner_size(winit::dpi::LogicalSize::new(800, 600))
            .with_resizable(false);
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                self.fail(event_loop, anyhow!("failed to create window: {}", err));
                return;
            }
        };
        self.window = Some(window.clone());

        if let Err(err) = self.start_renderer(window) {
            self.fail(event_loop, err);
            return;
        }
        self.last_frame = Instant::now();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.key(event_loop, &event),
            WindowEvent::Resized(size) => {
                warn!("window resized to {}x{}; the surface keeps its initial size", size.width, size.height);
            }
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            _ => (),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(ref window) = self.window {
            window.request_redraw();
        }
    }
}
