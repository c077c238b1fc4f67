//! Headless backend that records what the renderer asks of the GPU.
//!
//! Nothing is drawn. Buffers are plain byte vectors, bind and attribute state
//! is modeled the way a GL-style context tracks it, and faults can be
//! injected at any call site. Used by the tests and handy for tracing the
//! renderer without a device.

use super::backend::{site, PointCloudBackend};
use super::shaders::ShaderSources;
use crate::data::PointUniforms;
use crate::error::GraphicsApiError;
use std::collections::HashMap;
use tracking::BYTES_PER_POINT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub id: u32,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedPipeline {
    pub id: u32,
}

/// Context state that must not leak between calls.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BindState {
    pub array_buffer: Option<u32>,
    pub position_attribute_enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer {
        buffer: u32,
        size_bytes: u64,
    },
    WriteBuffer {
        buffer: u32,
        offset: u64,
        len: u64,
    },
    CreatePipeline {
        pipeline: u32,
    },
    Draw {
        pipeline: u32,
        buffer: u32,
        count: u32,
        uniforms: PointUniforms,
        /// Bind state observed while the draw was issued.
        state: BindState,
    },
}

/// Backend operation an injected fault can be aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CheckError,
    CreateBuffer,
    WriteBuffer,
    CreatePipeline,
    Draw,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    next_id: u32,
    commands: Vec<Command>,
    contents: HashMap<u32, Vec<u8>>,
    state: BindState,
    faults: Vec<(&'static str, Option<Operation>)>,
    pending_error: Option<String>,
}

/// Binds a buffer for the lifetime of the guard; dropping it unbinds the
/// buffer and disables the position attribute.
struct Binding<'a> {
    state: &'a mut BindState,
}

impl<'a> Binding<'a> {
    fn bind(state: &'a mut BindState, buffer: u32) -> Self {
        state.array_buffer = Some(buffer);
        Self { state }
    }

    fn enable_position_attribute(&mut self) {
        self.state.position_attribute_enabled = true;
    }

    fn snapshot(&self) -> BindState {
        *self.state
    }
}

impl Drop for Binding<'_> {
    fn drop(&mut self) {
        self.state.position_attribute_enabled = false;
        self.state.array_buffer = None;
    }
}

fn take_fault(
    faults: &mut Vec<(&'static str, Option<Operation>)>,
    site: &'static str,
    op: Operation,
) -> Result<(), GraphicsApiError> {
    let hit = faults
        .iter()
        .position(|(at, target)| *at == site && target.map_or(true, |t| t == op));
    match hit {
        Some(i) => {
            faults.remove(i);
            Err(GraphicsApiError::new(site, "injected fault"))
        }
        None => Ok(()),
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next operation checked at `site` fail.
    pub fn fail_at(&mut self, site: &'static str) {
        self.faults.push((site, None));
    }

    /// Makes the next `op` checked at `site` fail. Other operations sharing
    /// the tag go through.
    pub fn fail_op_at(&mut self, op: Operation, site: &'static str) {
        self.faults.push((site, Some(op)));
    }

    /// Records a driver error that the next `check_error` reports.
    pub fn raise(&mut self, message: impl Into<String>) {
        self.pending_error = Some(message.into());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn bind_state(&self) -> BindState {
        self.state
    }

    /// Sizes of every buffer allocation, in order.
    pub fn allocations(&self) -> Vec<u64> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::CreateBuffer { size_bytes, .. } => Some(*size_bytes),
                _ => None,
            })
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::WriteBuffer { .. }))
            .count()
    }

    /// Point counts of every draw, in order.
    pub fn drawn_counts(&self) -> Vec<u32> {
        self.draws().map(|(count, _)| count).collect()
    }

    pub fn draws(&self) -> impl Iterator<Item = (u32, &PointUniforms)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            Command::Draw {
                count, uniforms, ..
            } => Some((*count, uniforms)),
            _ => None,
        })
    }

    pub fn buffer_contents(&self, buffer: &RecordedBuffer) -> Option<&[u8]> {
        self.contents.get(&buffer.id).map(Vec::as_slice)
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl PointCloudBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Pipeline = RecordedPipeline;

    fn check_error(&mut self, site: &'static str) -> Result<(), GraphicsApiError> {
        take_fault(&mut self.faults, site, Operation::CheckError)?;
        match self.pending_error.take() {
            Some(message) => Err(GraphicsApiError::new(site, message)),
            None => Ok(()),
        }
    }

    fn create_point_buffer(
        &mut self,
        site: &'static str,
        size_bytes: u64,
    ) -> Result<RecordedBuffer, GraphicsApiError> {
        let id = self.allocate_id();
        let _binding = Binding::bind(&mut self.state, id);
        take_fault(&mut self.faults, site, Operation::CreateBuffer)?;

        let len = usize::try_from(size_bytes)
            .map_err(|_| GraphicsApiError::new(site, "out of memory"))?;
        self.contents.insert(id, vec![0; len]);
        self.commands.push(Command::CreateBuffer {
            buffer: id,
            size_bytes,
        });
        Ok(RecordedBuffer { id, size_bytes })
    }

    fn write_points(
        &mut self,
        site: &'static str,
        buffer: &RecordedBuffer,
        offset: u64,
        bytes: &[u8],
    ) -> Result<(), GraphicsApiError> {
        let _binding = Binding::bind(&mut self.state, buffer.id);
        take_fault(&mut self.faults, site, Operation::WriteBuffer)?;

        let storage = self
            .contents
            .get_mut(&buffer.id)
            .ok_or_else(|| GraphicsApiError::new(site, "invalid buffer"))?;
        let end = offset + bytes.len() as u64;
        if end > storage.len() as u64 {
            return Err(GraphicsApiError::new(
                site,
                format!(
                    "write of {} bytes at {} exceeds buffer of {} bytes",
                    bytes.len(),
                    offset,
                    storage.len()
                ),
            ));
        }
        storage[offset as usize..end as usize].copy_from_slice(bytes);

        self.commands.push(Command::WriteBuffer {
            buffer: buffer.id,
            offset,
            len: bytes.len() as u64,
        });
        Ok(())
    }

    fn create_point_pipeline(
        &mut self,
        shaders: &ShaderSources,
    ) -> Result<RecordedPipeline, GraphicsApiError> {
        take_fault(&mut self.faults, site::PROGRAM, Operation::CreatePipeline)?;
        if shaders.vertex.trim().is_empty() || shaders.fragment.trim().is_empty() {
            return Err(GraphicsApiError::new(site::PROGRAM, "empty shader source"));
        }
        take_fault(&mut self.faults, site::PROGRAM_PARAMS, Operation::CreatePipeline)?;

        let id = self.allocate_id();
        self.commands.push(Command::CreatePipeline { pipeline: id });
        Ok(RecordedPipeline { id })
    }

    fn draw_points(
        &mut self,
        site: &'static str,
        pipeline: &RecordedPipeline,
        buffer: &RecordedBuffer,
        uniforms: &PointUniforms,
        count: u32,
    ) -> Result<(), GraphicsApiError> {
        let mut binding = Binding::bind(&mut self.state, buffer.id);
        binding.enable_position_attribute();
        take_fault(&mut self.faults, site, Operation::Draw)?;

        let read = u64::from(count) * BYTES_PER_POINT as u64;
        if read > buffer.size_bytes {
            return Err(GraphicsApiError::new(
                site,
                format!(
                    "draw of {count} points reads past buffer of {} bytes",
                    buffer.size_bytes
                ),
            ));
        }

        let state = binding.snapshot();
        drop(binding);
        self.commands.push(Command::Draw {
            pipeline: pipeline.id,
            buffer: buffer.id,
            count,
            uniforms: *uniforms,
            state,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    fn uniforms() -> PointUniforms {
        PointUniforms {
            model_view_projection: Mat4::IDENTITY,
            color: [1.0; 4],
            point_size: 1.0,
        }
    }

    #[test]
    fn binding_is_released_after_each_call() {
        let mut gpu = RecordingBackend::new();
        let buf = gpu.create_point_buffer(site::BUFFER_ALLOC, 64).unwrap();
        gpu.write_points(site::AFTER_UPDATE, &buf, 0, &[1; 32]).unwrap();
        let pipe = gpu.create_point_pipeline(&ShaderSources::embedded()).unwrap();
        gpu.draw_points(site::DRAW, &pipe, &buf, &uniforms(), 2).unwrap();

        assert_eq!(gpu.bind_state(), BindState::default());
        match gpu.commands().last() {
            Some(Command::Draw { state, .. }) => {
                assert_eq!(state.array_buffer, Some(buf.id));
                assert!(state.position_attribute_enabled);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn out_of_range_write_fails_and_unbinds() {
        let mut gpu = RecordingBackend::new();
        let buf = gpu.create_point_buffer(site::BUFFER_ALLOC, 16).unwrap();
        let err = gpu
            .write_points(site::AFTER_UPDATE, &buf, 0, &[0; 32])
            .unwrap_err();
        assert_eq!(err.site, site::AFTER_UPDATE);
        assert_eq!(gpu.bind_state(), BindState::default());
    }

    #[test]
    fn injected_fault_fires_once() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_at(site::BEFORE_DRAW);
        assert!(gpu.check_error(site::BEFORE_DRAW).is_err());
        assert!(gpu.check_error(site::BEFORE_DRAW).is_ok());
    }

    #[test]
    fn targeted_fault_skips_other_operations_at_same_site() {
        let mut gpu = RecordingBackend::new();
        gpu.fail_op_at(Operation::WriteBuffer, site::AFTER_UPDATE);

        let buf = gpu.create_point_buffer(site::AFTER_UPDATE, 16).unwrap();
        let err = gpu
            .write_points(site::AFTER_UPDATE, &buf, 0, &[1; 16])
            .unwrap_err();
        assert_eq!(err.site, site::AFTER_UPDATE);
        assert_eq!(gpu.upload_count(), 0);

        gpu.write_points(site::AFTER_UPDATE, &buf, 0, &[1; 16]).unwrap();
        assert_eq!(gpu.upload_count(), 1);
    }

    #[test]
    fn raised_error_reported_at_next_check() {
        let mut gpu = RecordingBackend::new();
        gpu.raise("device lost");
        let err = gpu.check_error(site::BEFORE_UPDATE).unwrap_err();
        assert_eq!(err, GraphicsApiError::new(site::BEFORE_UPDATE, "device lost"));
        assert!(gpu.check_error(site::BEFORE_UPDATE).is_ok());
    }

    #[test]
    fn writes_land_in_buffer_contents() {
        let mut gpu = RecordingBackend::new();
        let buf = gpu.create_point_buffer(site::BUFFER_ALLOC, 8).unwrap();
        gpu.write_points(site::AFTER_UPDATE, &buf, 4, &[7, 7, 7, 7]).unwrap();
        assert_eq!(gpu.buffer_contents(&buf), Some(&[0, 0, 0, 0, 7, 7, 7, 7][..]));
    }
}
