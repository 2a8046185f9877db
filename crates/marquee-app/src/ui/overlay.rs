use egui::Context;
use egui_wgpu::ScreenDescriptor;
use winit::event::WindowEvent;
use winit::window::Window;

use super::theme;

/// Tessellated output of the last UI run, waiting for the render pass.
#[derive(Default)]
struct PaintJob {
    primitives: Vec<egui::ClippedPrimitive>,
    textures: egui::TexturesDelta,
}

/// egui on top of the window surface: winit input in, one wgpu pass out.
pub struct EguiOverlay {
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
    screen: ScreenDescriptor,
    pending: PaintJob,
}

impl EguiOverlay {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, window: &Window) -> Self {
        let ctx = Context::default();
        theme::apply(&ctx);
        let viewport = ctx.viewport_id();
        let state = egui_winit::State::new(ctx, viewport, window, None, None, None);
        let renderer = egui_wgpu::Renderer::new(
            device,
            format,
            egui_wgpu::RendererOptions {
                msaa_samples: 1,
                ..Default::default()
            },
        );
        let size = window.inner_size();
        Self {
            state,
            renderer,
            screen: ScreenDescriptor {
                size_in_pixels: [size.width, size.height],
                pixels_per_point: window.scale_factor() as f32,
            },
            pending: PaintJob::default(),
        }
    }

    /// Feed a window event to egui. True when egui used it.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn wants_keyboard(&self) -> bool {
        self.state.egui_ctx().wants_keyboard_input()
    }

    pub fn context(&self) -> Context {
        self.state.egui_ctx().clone()
    }

    pub fn resize(&mut self, width: u32, height: u32, pixels_per_point: f32) {
        self.screen = ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point,
        };
    }

    /// Run one UI pass with this frame's input and keep its output for
    /// [`render`](Self::render).
    pub fn run(&mut self, window: &Window, build: impl FnMut(&Context)) {
        let input = self.state.take_egui_input(window);
        let ctx = self.state.egui_ctx().clone();
        let output = ctx.run(input, build);
        self.state
            .handle_platform_output(window, output.platform_output);

        let primitives = ctx.tessellate(output.shapes, output.pixels_per_point);
        // Frees from a run that was never rendered still have to happen
        let mut textures = std::mem::take(&mut self.pending.textures);
        textures.append(output.textures_delta);
        self.pending = PaintJob {
            primitives,
            textures,
        };
    }

    /// Draw the pending UI over whatever `target` already holds.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        let PaintJob {
            primitives,
            textures,
        } = std::mem::take(&mut self.pending);

        for (id, delta) in &textures.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
        self.renderer
            .update_buffers(device, queue, encoder, &primitives, &self.screen);

        let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ui-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.renderer
            .render(&mut pass.forget_lifetime(), &primitives, &self.screen);

        for id in &textures.free {
            self.renderer.free_texture(id);
        }
    }
}
