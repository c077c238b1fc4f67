use super::backend::{site, PointCloudBackend};
use super::shaders::{ShaderSources, FRAGMENT_ENTRY_POINT, VERTEX_ENTRY_POINT};
use crate::data::{PointUniformStd140, PointUniforms, QUAD_CORNERS};
use crate::error::GraphicsApiError;
use parking_lot::Mutex;
use std::borrow::Cow;
use std::sync::Arc;
use tracking::BYTES_PER_POINT;
use wgpu::util::DeviceExt;

/// Render target of the frame being drawn.
struct FrameTarget {
    view: wgpu::TextureView,
    size: [f32; 2],
}

/// Compiled point pipeline plus its parameter bindings.
pub struct WgpuPointPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    quad_vb: wgpu::Buffer,
}

/// [`PointCloudBackend`] on a wgpu device.
///
/// Each operation runs inside Validation and OutOfMemory error scopes;
/// anything else the device reports is held until the next `check_error`.
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    color_format: wgpu::TextureFormat,
    uncaptured: Arc<Mutex<Option<String>>>,
    frame: Option<FrameTarget>,
}

impl WgpuBackend {
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        color_format: wgpu::TextureFormat,
    ) -> Self {
        let uncaptured = Arc::new(Mutex::new(None));
        let sink = uncaptured.clone();
        device.on_uncaptured_error(Box::new(move |err: wgpu::Error| {
            log::error!("Uncaptured wgpu error: {}", err);
            // Keep the first error; later ones are usually fallout.
            sink.lock().get_or_insert_with(|| err.to_string());
        }));

        Self {
            device,
            queue,
            color_format,
            uncaptured,
            frame: None,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Directs subsequent draws at `view` until [`WgpuBackend::end_frame`].
    pub fn begin_frame(&mut self, view: wgpu::TextureView, size: winit::dpi::PhysicalSize<u32>) {
        self.frame = Some(FrameTarget {
            view,
            size: [size.width.max(1) as f32, size.height.max(1) as f32],
        });
    }

    /// Releases the frame target so the surface texture can be presented.
    pub fn end_frame(&mut self) {
        self.frame = None;
    }

    /// Runs `op` inside error scopes and maps a captured error to `site`.
    fn scoped<T>(
        &self,
        site: &'static str,
        op: impl FnOnce(&wgpu::Device, &wgpu::Queue) -> T,
    ) -> Result<T, GraphicsApiError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let out = op(&self.device, &self.queue);

        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());
        match validation.or(oom) {
            Some(err) => Err(GraphicsApiError::new(site, err.to_string())),
            None => Ok(out),
        }
    }
}

impl PointCloudBackend for WgpuBackend {
    type Buffer = wgpu::Buffer;
    type Pipeline = WgpuPointPipeline;

    fn check_error(&mut self, site: &'static str) -> Result<(), GraphicsApiError> {
        match self.uncaptured.lock().take() {
            Some(message) => Err(GraphicsApiError::new(site, message)),
            None => Ok(()),
        }
    }

    fn create_point_buffer(
        &mut self,
        site: &'static str,
        size_bytes: u64,
    ) -> Result<wgpu::Buffer, GraphicsApiError> {
        self.scoped(site, |device, _| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Point Cloud VB"),
                size: size_bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        })
    }

    fn write_points(
        &mut self,
        site: &'static str,
        buffer: &wgpu::Buffer,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), GraphicsApiError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.scoped(site, |_, queue| queue.write_buffer(buffer, offset, bytes))
    }

    fn create_point_pipeline(
        &mut self,
        shaders: &ShaderSources,
    ) -> Result<WgpuPointPipeline, GraphicsApiError> {
        let color_format = self.color_format;

        let (pipeline, uniform_layout) = self.scoped(site::PROGRAM, |device, _| {
            let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("shaders/point_cloud_vertex.wgsl"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shaders.vertex.as_ref())),
            });
            let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("shaders/passthrough_fragment.wgsl"),
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shaders.fragment.as_ref())),
            });

            let uniform_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("Point Uniform Layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(
                                std::mem::size_of::<PointUniformStd140>() as u64,
                            ),
                        },
                        count: None,
                    }],
                });

            // Quad corners per vertex, one point record per instance.
            let vbuf_layouts = [
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[wgpu::VertexAttribute {
                        shader_location: 0,
                        offset: 0,
                        format: wgpu::VertexFormat::Float32x2,
                    }],
                },
                wgpu::VertexBufferLayout {
                    array_stride: BYTES_PER_POINT as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &[
                        // a_position: x, y, z, confidence
                        wgpu::VertexAttribute {
                            shader_location: 1,
                            offset: 0,
                            format: wgpu::VertexFormat::Float32x4,
                        },
                    ],
                },
            ];

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Point Cloud PipelineLayout"),
                bind_group_layouts: &[&uniform_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Point Cloud Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: VERTEX_ENTRY_POINT,
                    buffers: &vbuf_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    ..Default::default()
                },
                depth_stencil: None,
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: FRAGMENT_ENTRY_POINT,
                    targets: &[Some(wgpu::ColorTargetState {
                        format: color_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

            (pipeline, uniform_layout)
        })?;

        let (uniform_buffer, bind_group, quad_vb) =
            self.scoped(site::PROGRAM_PARAMS, |device, _| {
                let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Point Uniform Buffer"),
                    size: std::mem::size_of::<PointUniformStd140>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });

                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Point Uniform BindGroup"),
                    layout: &uniform_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    }],
                });

                let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Point Quad VB"),
                    contents: bytemuck::cast_slice(&QUAD_CORNERS),
                    usage: wgpu::BufferUsages::VERTEX,
                });

                (uniform_buffer, bind_group, quad_vb)
            })?;

        Ok(WgpuPointPipeline {
            pipeline,
            uniform_buffer,
            bind_group,
            quad_vb,
        })
    }

    fn draw_points(
        &mut self,
        site: &'static str,
        pipeline: &WgpuPointPipeline,
        buffer: &wgpu::Buffer,
        uniforms: &PointUniforms,
        count: u32,
    ) -> Result<(), GraphicsApiError> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| GraphicsApiError::new(site, "no frame target; call begin_frame first"))?;
        let block = PointUniformStd140::new(uniforms, frame.size);

        self.scoped(site, |device, queue| {
            queue.write_buffer(&pipeline.uniform_buffer, 0, bytemuck::bytes_of(&block));

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Point Cloud Encoder"),
            });

            // The pass owns every binding; they end with it.
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Point Cloud Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
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

                pass.set_pipeline(&pipeline.pipeline);
                pass.set_bind_group(0, &pipeline.bind_group, &[]);
                pass.set_vertex_buffer(0, pipeline.quad_vb.slice(..));
                pass.set_vertex_buffer(1, buffer.slice(..));
                pass.draw(0..QUAD_CORNERS.len() as u32, 0..count);
            }

            queue.submit(std::iter::once(encoder.finish()));
        })
    }
}
