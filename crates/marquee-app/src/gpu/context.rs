use std::sync::Arc;

use anyhow::{Result, anyhow};
use wgpu::{
    Color, CommandEncoder, CompositeAlphaMode, Device, DeviceDescriptor, ExperimentalFeatures,
    Instance, InstanceDescriptor, MemoryHints, PowerPreference, PresentMode, Queue,
    RequestAdapterOptions, Surface, SurfaceCapabilities, SurfaceConfiguration, TextureFormat,
    TextureUsages, TextureView, Trace,
};
use winit::window::Window;

/// Letterbox colour behind the video.
const BACKDROP: Color = Color::BLACK;

/// Device, queue and the window surface. The player draws nothing but the
/// backdrop and the UI pass, so a low-power adapter is enough.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub surface: Surface<'static>,
    pub surface_config: SurfaceConfiguration,
    pub format: TextureFormat,
}

impl GpuContext {
    pub fn new(window: Arc<Window>) -> Result<Self> {
        let instance = Instance::new(&InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;

        let adapter = pollster::block_on(instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))?;
        let info = adapter.get_info();

        let (device, queue) = pollster::block_on(adapter.request_device(&DeviceDescriptor {
            label: Some("marquee-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            experimental_features: ExperimentalFeatures::default(),
            memory_hints: MemoryHints::MemoryUsage,
            trace: Trace::Off,
        }))?;

        let capabilities = surface.get_capabilities(&adapter);
        let format = pick_format(&capabilities)?;
        let size = window.inner_size();
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: PresentMode::AutoVsync,
            desired_maximum_frame_latency: 2,
            alpha_mode: capabilities
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        log::info!("GPU initialized: {} ({:?}), {format:?}", info.name, info.backend);

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            format,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Clear `view` to the backdrop colour; the UI pass draws on top.
    pub fn clear(&self, encoder: &mut CommandEncoder, view: &TextureView) {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("backdrop-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(BACKDROP),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}

/// First sRGB format the surface offers, else its first format.
fn pick_format(capabilities: &SurfaceCapabilities) -> Result<TextureFormat> {
    capabilities
        .formats
        .iter()
        .find(|f| f.is_srgb())
        .or_else(|| capabilities.formats.first())
        .copied()
        .ok_or_else(|| anyhow!("surface reports no texture formats"))
}
