use crate::{
    camera::{CameraController, OrbitCamera},
    config::ViewerArgs,
    error::FrameError,
    renderer::{
        context::GfxContext, shaders::ShaderSources, wgpu_backend::WgpuBackend,
        PointCloudRenderer,
    },
};
use anyhow::Result;
use glam::Vec3;
use std::sync::Arc;
use tracking::{PointSource, SimulatedTracker};
use winit::{event::WindowEvent, window::Window};

const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.03,
    a: 1.0,
};

pub struct App {
    pub gfx: GfxContext,
    pub renderer: PointCloudRenderer<WgpuBackend>,
    pub tracker: SimulatedTracker,
    pub camera: OrbitCamera,
    pub camera_controller: CameraController,
}

impl App {
    pub async fn new(window: Arc<Window>, args: &ViewerArgs) -> Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let size = gfx.size;

        let config = args.renderer_config()?;
        let shaders = match &args.shader_dir {
            Some(dir) => ShaderSources::load(dir)?,
            None => ShaderSources::embedded(),
        };

        let backend = WgpuBackend::new(gfx.device.clone(), gfx.queue.clone(), gfx.config.format);
        let renderer = PointCloudRenderer::initialize(backend, &shaders, config)?;

        let tracker = SimulatedTracker::new(args.tracker_config());

        let mut camera = OrbitCamera::new(Vec3::ZERO, 6.0, 1.0);
        camera.set_viewport(size.width, size.height);

        Ok(Self {
            gfx,
            renderer,
            tracker,
            camera,
            camera_controller: CameraController::new(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.camera.set_viewport(new_size.width, new_size.height);
        }
    }

    /// Returns `true` if the event was consumed.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        self.camera_controller.handle_event(event, &mut self.camera);

        if let WindowEvent::Resized(physical_size) = event {
            self.resize(*physical_size);
        }

        false
    }

    /// Clears the frame, streams the current tracker batch and draws it.
    pub fn render(&mut self) -> Result<(), FrameError> {
        let frame = self.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Background Encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Background Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(BACKGROUND),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.gfx.queue.submit(std::iter::once(encoder.finish()));

        let batch = self.tracker.acquire();
        self.renderer.update(&batch)?;

        self.renderer
            .backend_mut()
            .begin_frame(swap_view, self.gfx.size);
        let drawn = self
            .renderer
            .draw(&self.camera.view(), &self.camera.projection());
        self.renderer.backend_mut().end_frame();
        drawn?;

        frame.present();
        Ok(())
    }
}
