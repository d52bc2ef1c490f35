//! Windowed host and event loop.
//!
//! [`run`] opens a window, creates a [`WgpuContext`] for it, initialises the
//! [`Scene`] and then drives one frame per redraw:
//! 1. Collect window/device events (held keys, mouse motion)
//! 2. Move the camera and light via [`InputController::update`]
//! 3. Record the frame with [`Scene::render`]
//! 4. Submit and present with [`WgpuContext::present`]

use std::{collections::HashSet, sync::Arc};

use cgmath::{Vector2, Zero};
use instant::Instant;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window},
};

use crate::{
    backend::WgpuContext,
    config::InputConfig,
    input::{InputController, Key},
    scene::Scene,
};

pub const WINDOW_WIDTH: u32 = 1600;
pub const WINDOW_HEIGHT: u32 = 1200;

fn map_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyE => Key::E,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyJ => Key::J,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyU => Key::U,
        KeyCode::KeyO => Key::O,
        _ => return None,
    })
}

/// Everything that only exists once the window is up.
struct AppState {
    window: Arc<Window>,
    ctx: WgpuContext,
    scene: Scene,
}

impl AppState {
    async fn new(window: Arc<Window>, mut scene: Scene) -> anyhow::Result<Self> {
        let mut ctx = WgpuContext::new(window.clone()).await?;
        let (width, height) = ctx.size();
        scene.init_gl(&mut ctx, width, height)?;
        Ok(Self { window, ctx, scene })
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        let (width, height) = self.ctx.size();
        self.scene.resize(&mut self.ctx, width, height);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (width, height) = self.ctx.size();
        self.scene.render(&mut self.ctx, width, height);
        self.ctx.present()
    }

    fn set_cursor_grab(&self, grab: bool) {
        let result = if grab {
            self.window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        } else {
            self.window.set_cursor_grab(CursorGrabMode::None)
        };
        match result {
            Ok(()) => self.window.set_cursor_visible(!grab),
            Err(e) => log::warn!("Could not change the cursor grab: {e}"),
        }
    }
}

pub struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    state: Option<AppState>,
    // Consumed when the window is created.
    scene: Option<Scene>,
    controller: InputController,
    keys: HashSet<Key>,
    mouse_delta: Vector2<f32>,
    grabbed: bool,
    last_time: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(scene: Scene, input: InputConfig) -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            state: None,
            scene: Some(scene),
            controller: InputController::new(input),
            keys: HashSet::new(),
            mouse_delta: Vector2::zero(),
            grabbed: false,
            last_time: Instant::now(),
            error: None,
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:#}");
        self.error = Some(error);
        event_loop.exit();
    }

    fn set_grabbed(&mut self, grabbed: bool) {
        if self.grabbed == grabbed {
            return;
        }
        self.grabbed = grabbed;
        if let Some(state) = &self.state {
            state.set_cursor_grab(grabbed);
        }
    }

    fn redraw(&mut self) {
        let dt = self.last_time.elapsed().as_secs_f32();
        self.last_time = Instant::now();
        let Some(state) = &mut self.state else {
            return;
        };

        let mouse_delta = std::mem::replace(&mut self.mouse_delta, Vector2::zero());
        self.controller.update(
            &mut state.scene.camera,
            &mut state.scene.light,
            &self.keys,
            mouse_delta,
            dt,
        );

        match state.render() {
            Ok(()) => {}
            // Reconfigure the surface if it's lost or outdated
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let PhysicalSize { width, height } = state.window.inner_size();
                state.resize(width, height);
                state.ctx.reconfigure();
            }
            Err(e) => log::error!("Unable to render {e}"),
        }
        state.window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(scene) = self.scene.take() else {
            return;
        };
        let window_attributes = Window::default_attributes()
            .with_title("shadow-ngin")
            .with_inner_size(PhysicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT))
            .with_resizable(false);
        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => return self.fail(event_loop, e.into()),
        };

        #[cfg(not(target_arch = "wasm32"))]
        let state = self.async_runtime.block_on(AppState::new(window, scene));
        #[cfg(target_arch = "wasm32")]
        let state = futures::executor::block_on(AppState::new(window, scene));

        match state {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
                self.last_time = Instant::now();
            }
            Err(e) => self.fail(event_loop, e.context("failed to set up the renderer")),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            if self.grabbed {
                self.mouse_delta += Vector2::new(dx as f32, dy as f32);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        if self.state.is_none() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && key_state == ElementState::Pressed {
                    self.set_grabbed(false);
                } else if let Some(key) = map_key(code) {
                    match key_state {
                        ElementState::Pressed => self.keys.insert(key),
                        ElementState::Released => self.keys.remove(&key),
                    };
                }
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => self.set_grabbed(!self.grabbed),
            WindowEvent::Focused(false) => {
                self.keys.clear();
                self.set_grabbed(false);
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Opens the window and renders `scene` until it is closed.
pub fn run(scene: Scene) -> anyhow::Result<()> {
    run_with_input(scene, InputConfig::default())
}

pub fn run_with_input(scene: Scene, input: InputConfig) -> anyhow::Result<()> {
    if let Err(e) = env_logger::try_init() {
        println!("Warning: Could not initialize logger: {}", e);
    };

    let event_loop = EventLoop::new()?;
    let mut app = App::new(scene, input)?;
    event_loop.run_app(&mut app)?;
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
