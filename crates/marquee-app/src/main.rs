mod api;
mod app;
mod gpu;
mod media;
mod player;
mod settings;
mod ui;

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowAttributes, WindowId};

use api::{ApiClient, ItemDetails};
use app::App;
use settings::SettingsConfig;

struct MarqueeApp {
    app: Option<App>,
    window: Option<Arc<Window>>,
    client: ApiClient,
    item: Option<ItemDetails>,
}

impl MarqueeApp {
    fn new(client: ApiClient, item: ItemDetails) -> Self {
        Self {
            app: None,
            window: None,
            client,
            item: Some(item),
        }
    }
}

impl ApplicationHandler for MarqueeApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let Some(item) = self.item.take() else {
            return;
        };

        let attrs = WindowAttributes::default()
            .with_title("Marquee")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(attrs).expect("Failed to create window"));
        self.window = Some(window.clone());

        match App::new(window, &self.client, item) {
            Ok(app) => {
                self.app = Some(app);
                log::info!("Marquee initialized");
            }
            Err(e) => {
                log::error!("Failed to initialize app: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(app) = self.app.as_mut() else {
            return;
        };

        let egui_consumed = app.egui_overlay.handle_event(&app.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                app.player.close();
            }
            WindowEvent::Resized(size) => {
                app.resize(size.width, size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !egui_consumed || !app.egui_overlay.wants_keyboard() => {
                app.handle_key(key);
            }
            WindowEvent::RedrawRequested => {
                app.update();
                app.draw_ui();

                match app.render() {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let w = app.gpu.surface_config.width;
                        let h = app.gpu.surface_config.height;
                        app.resize(w, h);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {e}");
                    }
                }

                app.window.request_redraw();
            }
            _ => {}
        }

        if app.is_closed() {
            event_loop.exit();
        }
    }
}

/// Play one item from a media server.
#[derive(Parser, Debug)]
#[command(name = "marquee")]
#[command(version)]
struct Args {
    /// Id of the item to play
    item_id: String,

    /// Server base URL, saved for later runs
    #[arg(long)]
    server: Option<String>,

    /// Access token, saved for later runs
    #[arg(long)]
    token: Option<String>,

    /// User id, saved for later runs
    #[arg(long)]
    user: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    let mut settings = SettingsConfig::load();
    if settings.merge(args.server, args.token, args.user) {
        settings.save();
    }
    let session = match settings.session() {
        Ok(session) => session,
        Err(missing) => bail!("no {missing} configured; see marquee --help"),
    };

    let client = ApiClient::new(session);
    let item = client.fetch_item(&args.item_id)?;
    log::info!("Loaded '{}' ({})", item.name, item.id);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(winit::event_loop::ControlFlow::Poll);

    let mut app = MarqueeApp::new(client, item);
    event_loop.run_app(&mut app)?;

    Ok(())
}
