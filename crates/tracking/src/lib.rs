//! Feature-point batches as produced by an AR tracking session.
//!
//! - A batch is one frame of tracked points, shared read-only with consumers.
//! - Each point is four little-endian `f32`: x, y, z (meters, world space) and
//!   a confidence in `[0, 1]`.
//! - Batches carry an identity token. A tracker hands out the *same* batch
//!   (same token) until it has new data, so consumers can skip redundant work
//!   by comparing tokens instead of contents.
//!
//! Record layout (16 bytes per point):
//!   00 : f32 x
//!   04 : f32 y
//!   08 : f32 z
//!   0C : f32 confidence

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const FLOATS_PER_POINT: usize = 4;
pub const BYTES_PER_POINT: usize = FLOATS_PER_POINT * std::mem::size_of::<f32>();

/// One tracked point. Matches the vertex layout consumed by the renderer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PointRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Tracker confidence, 0 (unreliable) to 1.
    pub confidence: f32,
}

const _: [(); BYTES_PER_POINT] = [(); std::mem::size_of::<PointRecord>()];

/// Identity token of a batch. Equal tokens mean "the same frame of data".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u64);

impl BatchId {
    /// Allocates a process-unique token.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A frame of tracked points. Cloning is cheap and keeps the identity.
#[derive(Debug, Clone)]
pub struct PointBatch {
    id: BatchId,
    timestamp_ns: i64,
    values: Arc<[f32]>,
}

impl PointBatch {
    /// Wraps a flat `[x, y, z, confidence, ...]` buffer under a fresh identity.
    pub fn new(timestamp_ns: i64, values: impl Into<Arc<[f32]>>) -> Self {
        Self {
            id: BatchId::next(),
            timestamp_ns,
            values: values.into(),
        }
    }

    pub fn from_records(timestamp_ns: i64, records: &[PointRecord]) -> Self {
        Self::new(timestamp_ns, bytemuck::cast_slice::<PointRecord, f32>(records))
    }

    #[inline]
    pub fn id(&self) -> BatchId {
        self.id
    }

    #[inline]
    pub fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    /// The raw float buffer, including any trailing partial record.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Number of complete points; a trailing partial record is ignored.
    #[inline]
    pub fn len_points(&self) -> usize {
        self.values.len() / FLOATS_PER_POINT
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len_points() == 0
    }

    pub fn records(&self) -> &[PointRecord] {
        bytemuck::cast_slice(&self.values[..self.len_points() * FLOATS_PER_POINT])
    }

    /// Bytes of the complete records, ready for upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.records())
    }
}

/// Producer side of the tracking contract.
pub trait PointSource {
    /// Returns the current batch. Returns the same batch (same [`BatchId`])
    /// when nothing new has been tracked since the last call.
    fn acquire(&mut self) -> PointBatch;
}

#[derive(Debug, Clone)]
pub struct SimulatedTrackerConfig {
    /// Upper bound on points per batch.
    pub max_points: usize,
    /// Points discovered per new batch.
    pub points_per_update: usize,
    /// Acquisitions that share one batch before a new one is produced.
    pub frames_per_update: u32,
    pub seed: u64,
}

impl Default for SimulatedTrackerConfig {
    fn default() -> Self {
        Self {
            max_points: 6000,
            points_per_update: 250,
            frames_per_update: 3,
            seed: 0x5eed,
        }
    }
}

/// Deterministic stand-in for a tracking session: a room with a floor and two
/// walls whose feature points are discovered gradually.
pub struct SimulatedTracker {
    config: SimulatedTrackerConfig,
    rng: StdRng,
    points: Vec<PointRecord>,
    // Next slot to overwrite once `max_points` is reached.
    cursor: usize,
    current: Option<PointBatch>,
    frames_since_update: u32,
    frame: i64,
}

const FRAME_INTERVAL_NS: i64 = 33_333_333;
const ROOM_HALF_EXTENT_M: f32 = 3.0;
const FLOOR_Y_M: f32 = -1.2;
const CEILING_Y_M: f32 = 1.5;
const SURFACE_NOISE_M: f32 = 0.01;

impl SimulatedTracker {
    pub fn new(config: SimulatedTrackerConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            points: Vec::with_capacity(config.max_points),
            config,
            rng,
            cursor: 0,
            current: None,
            frames_since_update: 0,
            frame: 0,
        }
    }

    pub fn config(&self) -> &SimulatedTrackerConfig {
        &self.config
    }

    fn sample_point(&mut self) -> PointRecord {
        let e = ROOM_HALF_EXTENT_M;
        let a = self.rng.gen_range(-e..=e);
        let noise = self.rng.gen_range(-SURFACE_NOISE_M..=SURFACE_NOISE_M);
        let height = self.rng.gen_range(FLOOR_Y_M..=CEILING_Y_M);
        let (x, y, z) = match self.rng.gen_range(0..3u8) {
            0 => (a, FLOOR_Y_M + noise, self.rng.gen_range(-e..=e)),
            1 => (a, height, -e + noise),
            _ => (-e + noise, height, a),
        };
        PointRecord {
            x,
            y,
            z,
            confidence: self.rng.gen_range(0.0..=1.0),
        }
    }

    fn capture(&mut self) -> PointBatch {
        for _ in 0..self.config.points_per_update {
            if self.config.max_points == 0 {
                break;
            }
            let p = self.sample_point();
            if self.points.len() < self.config.max_points {
                self.points.push(p);
            } else {
                self.points[self.cursor] = p;
                self.cursor = (self.cursor + 1) % self.config.max_points;
            }
        }

        let batch = PointBatch::from_records(self.frame * FRAME_INTERVAL_NS, &self.points);
        log::trace!(
            "tracker: batch {} with {} points",
            batch.id().get(),
            batch.len_points()
        );
        batch
    }
}

impl PointSource for SimulatedTracker {
    fn acquire(&mut self) -> PointBatch {
        self.frame += 1;
        let frames_per_update = self.config.frames_per_update.max(1);

        match &self.current {
            Some(batch) if self.frames_since_update < frames_per_update => {
                self.frames_since_update += 1;
                batch.clone()
            }
            _ => {
                let batch = self.capture();
                self.current = Some(batch.clone());
                self.frames_since_update = 1;
                batch
            }
        }
    }
}
