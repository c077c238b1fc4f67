//! Point cloud renderer: one growable vertex buffer, one pipeline, and the
//! per-frame upload/draw protocol on top of a [`PointCloudBackend`].

pub mod backend;
pub mod buffer;
pub mod context;
pub mod recording;
pub mod shaders;
pub mod wgpu_backend;

use self::{
    backend::{site, PointCloudBackend},
    buffer::{PointBuffer, Sizing},
    shaders::ShaderSources,
};
use crate::{config::RendererConfig, data::PointUniforms, error::GraphicsApiError};
use glam::Mat4;
use tracking::{BatchId, PointBatch, BYTES_PER_POINT};

/// Streams point batches to the GPU and draws them.
///
/// Only exists once initialized; `update` and `draw` may then be called in
/// any order, any number of times, from the thread that owns the backend.
pub struct PointCloudRenderer<B: PointCloudBackend> {
    backend: B,
    config: RendererConfig,
    buffer: PointBuffer<B::Buffer>,
    pipeline: B::Pipeline,
    // Identity of the batch currently in `buffer`; never owns the batch.
    last_batch: Option<BatchId>,
}

impl<B: PointCloudBackend> PointCloudRenderer<B> {
    /// Allocates the point buffer and builds the pipeline.
    pub fn initialize(
        mut backend: B,
        shaders: &ShaderSources,
        config: RendererConfig,
    ) -> Result<Self, GraphicsApiError> {
        backend.check_error(site::BEFORE_CREATE)?;

        let capacity_bytes =
            u64::from(config.initial_capacity_points.max(1)) * BYTES_PER_POINT as u64;
        let handle = backend.create_point_buffer(site::BUFFER_ALLOC, capacity_bytes)?;
        let pipeline = backend.create_point_pipeline(shaders)?;

        log::info!(
            "Point cloud renderer ready: capacity={} points, growth x{}, size={}px",
            config.initial_capacity_points.max(1),
            config.growth_factor,
            config.point_size
        );

        Ok(Self {
            backend,
            buffer: PointBuffer::new(handle, capacity_bytes),
            pipeline,
            config,
            last_batch: None,
        })
    }

    /// Uploads `batch` unless it is the batch already uploaded.
    ///
    /// Grows the buffer by the configured factor until the batch fits; the
    /// grown buffer is not seeded with old contents since the whole live
    /// region is rewritten right after. If the upload fails, no batch counts
    /// as uploaded and the next `update` retries.
    pub fn update(&mut self, batch: &PointBatch) -> Result<(), GraphicsApiError> {
        if self.last_batch == Some(batch.id()) {
            log::trace!("Batch {} already uploaded; skipping", batch.id().get());
            return Ok(());
        }

        self.backend.check_error(site::BEFORE_UPDATE)?;

        let points = u32::try_from(batch.len_points()).map_err(|_| {
            GraphicsApiError::new(
                site::BEFORE_UPDATE,
                format!("batch of {} points exceeds u32 range", batch.len_points()),
            )
        })?;

        // Until the write lands the resident contents belong to no batch.
        self.last_batch = None;

        if let Sizing::Grow(capacity_bytes) =
            self.buffer.sizing_for(points, self.config.growth_factor)
        {
            let handle = self
                .backend
                .create_point_buffer(site::AFTER_UPDATE, capacity_bytes)?;
            log::debug!(
                "Point buffer grown: {} -> {} points (batch of {})",
                self.buffer.capacity_points(),
                capacity_bytes / BYTES_PER_POINT as u64,
                points
            );
            self.buffer.replace(handle, capacity_bytes);
        }

        self.backend
            .write_points(site::AFTER_UPDATE, self.buffer.handle(), 0, batch.as_bytes())?;
        self.buffer.set_len_points(points);
        self.last_batch = Some(batch.id());
        Ok(())
    }

    /// Draws the uploaded points with `projection * view`.
    pub fn draw(&mut self, view: &Mat4, projection: &Mat4) -> Result<(), GraphicsApiError> {
        let uniforms = PointUniforms {
            model_view_projection: *projection * *view,
            color: self.config.point_color,
            point_size: self.config.point_size,
        };

        self.backend.check_error(site::BEFORE_DRAW)?;
        self.backend.draw_points(
            site::DRAW,
            &self.pipeline,
            self.buffer.handle(),
            &uniforms,
            self.buffer.len_points(),
        )?;
        log::trace!("Drew {} points", self.buffer.len_points());
        Ok(())
    }

    /// Points drawn by the next `draw`.
    pub fn point_count(&self) -> u32 {
        self.buffer.len_points()
    }

    pub fn capacity_points(&self) -> u64 {
        self.buffer.capacity_points()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.buffer.capacity_bytes()
    }

    pub fn last_batch(&self) -> Option<BatchId> {
        self.last_batch
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::recording::{Operation, RecordingBackend};
    use super::*;

    fn renderer() -> PointCloudRenderer<RecordingBackend> {
        PointCloudRenderer::initialize(
            RecordingBackend::new(),
            &ShaderSources::embedded(),
            RendererConfig::default(),
        )
        .unwrap()
    }

    fn batch(points: usize) -> PointBatch {
        PointBatch::new(0, vec![0.5f32; points * 4])
    }

    #[test]
    fn initialize_allocates_default_capacity() {
        let r = renderer();
        assert_eq!(r.capacity_points(), 1000);
        assert_eq!(r.backend().allocations(), vec![16_000]);
        assert_eq!(r.point_count(), 0);
    }

    #[test]
    fn same_batch_twice_uploads_once() {
        let mut r = renderer();
        let b = batch(10);
        r.update(&b).unwrap();
        r.update(&b.clone()).unwrap();
        assert_eq!(r.backend().upload_count(), 1);
        assert_eq!(r.last_batch(), Some(b.id()));
    }

    #[test]
    fn equal_contents_with_new_identity_uploads_again() {
        let mut r = renderer();
        r.update(&batch(10)).unwrap();
        r.update(&batch(10)).unwrap();
        assert_eq!(r.backend().upload_count(), 2);
    }

    #[test]
    fn grows_by_doubling() {
        let mut r = renderer();
        r.update(&batch(2500)).unwrap();
        assert_eq!(r.capacity_points(), 4000);
        assert_eq!(r.backend().allocations(), vec![16_000, 64_000]);
        assert_eq!(r.point_count(), 2500);
    }

    #[test]
    fn capacity_never_shrinks() {
        let mut r = renderer();
        r.update(&batch(2500)).unwrap();
        r.update(&batch(3)).unwrap();
        assert_eq!(r.capacity_points(), 4000);
        assert_eq!(r.point_count(), 3);
    }

    #[test]
    fn draw_before_update_draws_nothing() {
        let mut r = renderer();
        r.draw(&Mat4::IDENTITY, &Mat4::IDENTITY).unwrap();
        assert_eq!(r.backend().drawn_counts(), vec![0]);
    }

    #[test]
    fn draw_composes_projection_times_view() {
        let mut r = renderer();
        let view = Mat4::from_translation(glam::Vec3::new(0.0, 0.0, -2.0));
        let proj = Mat4::perspective_rh(1.0, 1.5, 0.1, 100.0);
        r.draw(&view, &proj).unwrap();

        let (_, uniforms) = r.backend().draws().next().unwrap();
        assert_eq!(uniforms.model_view_projection, proj * view);
        assert_eq!(uniforms.color, crate::config::DEFAULT_POINT_COLOR);
        assert_eq!(uniforms.point_size, 5.0);
    }

    #[test]
    fn failed_upload_keeps_batch_pending() {
        let mut r = renderer();
        let b = batch(4);
        r.backend_mut().fail_at(site::AFTER_UPDATE);
        assert!(r.update(&b).is_err());
        assert_eq!(r.last_batch(), None);

        r.update(&b).unwrap();
        assert_eq!(r.backend().upload_count(), 1);
        assert_eq!(r.point_count(), 4);
    }

    #[test]
    fn failed_write_after_grow_forgets_resident_batch() {
        let mut r = renderer();
        let small = batch(800);
        r.update(&small).unwrap();

        r.backend_mut()
            .fail_op_at(Operation::WriteBuffer, site::AFTER_UPDATE);
        assert!(r.update(&batch(5000)).is_err());
        assert_eq!(r.capacity_points(), 8000);
        assert_eq!(r.point_count(), 0);
        assert_eq!(r.last_batch(), None);

        r.update(&small).unwrap();
        assert_eq!(r.point_count(), 800);
        assert_eq!(r.last_batch(), Some(small.id()));
    }
}
