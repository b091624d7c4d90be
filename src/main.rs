use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{error, info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use tutorial_scenes::{
    builtin_names, builtin_scene, show_panel, AssetLoader, ControlValue, HeadlessTarget,
    OverlayFrame, Renderer, SceneContext, SceneDescription, SceneState, Viewport,
};

const USAGE: &str = "Usage: tutorial-scenes <scene-name|scene.xml> [--summary-only] [--frames N] [--set LABEL=VALUE]... [--list]";

/// Fixed step used when no display drives the loop.
const HEADLESS_DT: Duration = Duration::from_nanos(16_666_667);
const HEADLESS_VIEWPORT: (u32, u32) = (1280, 720);
const ASSET_TIMEOUT: Duration = Duration::from_secs(10);
/// Pixels of trackpad scroll counted as one wheel line.
const PIXELS_PER_LINE: f32 = 40.0;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    if options.list {
        for name in builtin_names() {
            println!("{name}");
        }
        return Ok(());
    }

    let (description, asset_root) = load_description(&options.scene)?;
    println!(
        "Loaded scene '{}' with {} objects ({} lights, {} controls)",
        description.name,
        description.objects.len(),
        description.light_count(),
        description.controls.len()
    );
    for object in &description.objects {
        println!(" - {} ({})", object.name, object.kind.as_str());
    }

    if options.summary_only {
        return run_headless(description, asset_root, &options);
    }

    match run_interactive(description.clone(), asset_root.clone(), &options) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
            );
            run_headless(description, asset_root, &options)
        }
        Err(err) => Err(err),
    }
}

/// Resolves a built-in scene name or an XML path, returning the description
/// and the directory its model paths are relative to.
fn load_description(scene: &str) -> Result<(SceneDescription, PathBuf)> {
    if let Some(xml) = builtin_scene(scene) {
        let description = SceneDescription::from_xml(xml)
            .with_context(|| format!("built-in scene {scene} is invalid"))?;
        return Ok((description, PathBuf::from(env!("CARGO_MANIFEST_DIR"))));
    }

    let path = Path::new(scene);
    if !path.exists() {
        return Err(anyhow!(
            "unknown scene {scene}; expected an XML file or one of: {}",
            builtin_names().collect::<Vec<_>>().join(", ")
        ));
    }
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    let description = SceneDescription::from_xml(&xml)
        .with_context(|| format!("failed to parse scene {}", path.display()))?;
    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((description, root))
}

fn run_headless(description: SceneDescription, asset_root: PathBuf, options: &CliOptions) -> Result<()> {
    let viewport = Viewport::new(HEADLESS_VIEWPORT.0, HEADLESS_VIEWPORT.1);
    let mut target = HeadlessTarget::new(viewport);
    let mut context = SceneContext::assemble(description, viewport, AssetLoader::new(asset_root))
        .context("failed to assemble scene")?;
    let unfinished = context.settle_assets(ASSET_TIMEOUT);
    if unfinished > 0 {
        warn!("{unfinished} asset(s) still loading; rendering without them");
    }
    apply_cli_edits(&mut context, &options.edits)?;

    for _ in 0..options.frames {
        context.frame(HEADLESS_DT, &mut target)?;
    }
    println!(
        "Rendered {} frame(s), {} draw(s) in the last frame",
        target.frames(),
        target.last_draw_count()
    );
    println!("fps={}", context.fps().fps());
    print_final_state(context.state());
    Ok(())
}

fn apply_cli_edits(context: &mut SceneContext, edits: &[(String, String)]) -> Result<()> {
    for (label, text) in edits {
        let value = ControlValue::parse(text)
            .ok_or_else(|| anyhow!("invalid value {text:?} for control {label:?}"))?;
        let applied = context
            .apply_edit(label, value)
            .with_context(|| format!("failed to set {label}"))?;
        println!("Set {label} = {applied}");
    }
    Ok(())
}

fn print_final_state(state: &SceneState) {
    println!("Final object states:");
    for object in state.objects() {
        print!(
            " - {} pos=({:.2}, {:.2}, {:.2}) color=({:.2}, {:.2}, {:.2})",
            object.name,
            object.position.x,
            object.position.y,
            object.position.z,
            object.color.x,
            object.color.y,
            object.color.z
        );
        if object.kind.is_light() {
            print!(" intensity={:.2}", object.intensity);
        }
        println!();
    }
}

fn run_interactive(description: SceneDescription, asset_root: PathBuf, options: &CliOptions) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = WindowedApp {
        description: Some(description),
        asset_root,
        edits: options.edits.clone(),
        session: None,
        error: None,
    };
    event_loop
        .run_app(&mut app)
        .context("event loop terminated with an error")?;

    if let Some(session) = &app.session {
        print_final_state(session.context.state());
    }
    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Session {
    window: Arc<Window>,
    renderer: Renderer,
    context: SceneContext,
    egui: egui_winit::State,
    last_frame: Instant,
}

struct WindowedApp {
    description: Option<SceneDescription>,
    asset_root: PathBuf,
    edits: Vec<(String, String)>,
    session: Option<Session>,
    error: Option<anyhow::Error>,
}

impl WindowedApp {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<Session> {
        let description = self
            .description
            .take()
            .ok_or_else(|| anyhow!("scene was already started"))?;
        let attributes = Window::default_attributes()
            .with_title(format!("tutorial-scenes - {}", description.name))
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::from_error("window", err))?,
        );

        let renderer = block_on(Renderer::new(Arc::clone(&window)))
            .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;
        let size = window.inner_size();
        let loader = AssetLoader::new(self.asset_root.clone());
        let mut context =
            SceneContext::assemble(description, Viewport::new(size.width, size.height), loader)
                .context("failed to assemble scene")?;
        apply_cli_edits(&mut context, &self.edits)?;

        let egui = egui_winit::State::new(
            egui::Context::default(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Ok(Session {
            window,
            renderer,
            context,
            egui,
            last_frame: Instant::now(),
        })
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for WindowedApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.is_some() {
            return;
        }
        match self.start(event_loop) {
            Ok(session) => {
                info!("started scene {}", session.context.name());
                self.session = Some(session);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if window_id != session.renderer.window_id() {
            return;
        }
        let consumed = session.egui.on_window_event(&session.window, &event).consumed;

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                session
                    .context
                    .resize(size.width, size.height, &mut session.renderer);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                let pressed = state == ElementState::Pressed;
                session.context.orbit_mut().set_dragging(pressed && !consumed);
            }
            WindowEvent::CursorMoved { position, .. } => {
                session
                    .context
                    .orbit_mut()
                    .pointer_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseWheel { delta, .. } if !consumed => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(offset) => offset.y as f32 / PIXELS_PER_LINE,
                };
                session.context.orbit_mut().scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = session.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &self.session {
            session.window.request_redraw();
        }
    }
}

impl Session {
    /// Runs the panel UI, applies its edits and renders one frame.
    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;

        let ctx = self.egui.egui_ctx().clone();
        let raw_input = self.egui.take_egui_input(&self.window);
        let title = self.context.name().to_string();
        let panel = self.context.panel();
        let mut edits = Vec::new();
        let output = ctx.run(raw_input, |ctx| {
            edits = show_panel(ctx, &title, panel);
        });
        self.egui
            .handle_platform_output(&self.window, output.platform_output);

        for (label, value) in edits {
            if let Err(err) = self.context.apply_edit(&label, value) {
                warn!("ignoring panel edit: {err}");
            }
        }

        let size = self.window.inner_size();
        let paint_jobs = ctx.tessellate(output.shapes, output.pixels_per_point);
        self.renderer.set_overlay(OverlayFrame {
            paint_jobs,
            textures_delta: output.textures_delta,
            screen: egui_wgpu::ScreenDescriptor {
                size_in_pixels: [size.width.max(1), size.height.max(1)],
                pixels_per_point: output.pixels_per_point,
            },
        });

        self.context.frame(dt, &mut self.renderer)?;
        Ok(())
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    scene: String,
    summary_only: bool,
    frames: u32,
    edits: Vec<(String, String)>,
    list: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut scene = None;
        let mut summary_only = false;
        let mut frames = 120;
        let mut edits = Vec::new();
        let mut list = false;

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--list" => list = true,
                "--frames" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a value. {USAGE}"))?;
                    frames = value
                        .parse()
                        .with_context(|| format!("invalid frame count {value:?}"))?;
                }
                "--set" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--set needs LABEL=VALUE. {USAGE}"))?;
                    let (label, text) = value
                        .split_once('=')
                        .ok_or_else(|| anyhow!("expected LABEL=VALUE, got {value:?}"))?;
                    edits.push((label.trim().to_string(), text.trim().to_string()));
                }
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                other if scene.is_none() => scene = Some(other.to_string()),
                other => return Err(anyhow!("Unexpected argument: {other}. {USAGE}")),
            }
        }

        let scene = match scene {
            Some(scene) => scene,
            None if list => String::new(),
            None => return Err(anyhow!(USAGE)),
        };
        Ok(Self {
            scene,
            summary_only,
            frames,
            edits,
            list,
        })
    }
}
