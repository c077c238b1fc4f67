//! Growable GPU point buffer.

use tracking::BYTES_PER_POINT;

/// Smallest `current * factor^k` (k >= 0) that holds `required` bytes.
pub fn grown_capacity(current: u64, required: u64, factor: u32) -> u64 {
    let factor = u64::from(factor.max(2));
    let mut capacity = current.max(1);
    while required > capacity {
        capacity = capacity.saturating_mul(factor);
    }
    capacity
}

/// A backend buffer handle plus its capacity and live point count.
///
/// Capacity only grows. When [`PointBuffer::sizing_for`] asks for a grow,
/// [`PointBuffer::replace`] swaps in the larger handle and empties it.
#[derive(Debug)]
pub struct PointBuffer<H> {
    handle: H,
    capacity_bytes: u64,
    len_points: u32,
}

/// Outcome of sizing the buffer for a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    Fits,
    /// The buffer must be reallocated at this many bytes.
    Grow(u64),
}

impl<H> PointBuffer<H> {
    pub fn new(handle: H, capacity_bytes: u64) -> Self {
        Self {
            handle,
            capacity_bytes,
            len_points: 0,
        }
    }

    #[inline]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    #[inline]
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    #[inline]
    pub fn capacity_points(&self) -> u64 {
        self.capacity_bytes / BYTES_PER_POINT as u64
    }

    #[inline]
    pub fn len_points(&self) -> u32 {
        self.len_points
    }

    /// Decides whether `points` records fit at the current capacity.
    pub fn sizing_for(&self, points: u32, growth_factor: u32) -> Sizing {
        let required = u64::from(points) * BYTES_PER_POINT as u64;
        if required <= self.capacity_bytes {
            Sizing::Fits
        } else {
            Sizing::Grow(grown_capacity(self.capacity_bytes, required, growth_factor))
        }
    }

    /// Swaps in a freshly allocated handle. Old contents are discarded, so
    /// the live count drops to zero until the next write.
    pub fn replace(&mut self, handle: H, capacity_bytes: u64) {
        debug_assert!(capacity_bytes >= self.capacity_bytes);
        self.handle = handle;
        self.capacity_bytes = capacity_bytes;
        self.len_points = 0;
    }

    pub fn set_len_points(&mut self, points: u32) {
        debug_assert!(u64::from(points) * BYTES_PER_POINT as u64 <= self.capacity_bytes);
        self.len_points = points;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BPP: u64 = BYTES_PER_POINT as u64;

    #[test]
    fn doubling_overshoots_to_next_power() {
        assert_eq!(grown_capacity(1000 * BPP, 2500 * BPP, 2), 4000 * BPP);
    }

    #[test]
    fn exact_fit_does_not_grow() {
        assert_eq!(grown_capacity(1000 * BPP, 1000 * BPP, 2), 1000 * BPP);
        assert_eq!(grown_capacity(1000 * BPP, 0, 2), 1000 * BPP);
    }

    #[test]
    fn other_factors() {
        assert_eq!(grown_capacity(100, 1000, 3), 2700);
        assert_eq!(grown_capacity(100, 101, 10), 1000);
    }

    #[test]
    fn degenerate_factor_still_grows() {
        assert_eq!(grown_capacity(10, 30, 1), 40);
    }

    #[test]
    fn sizing_reports_growth_only_when_needed() {
        let buf = PointBuffer::new((), 1000 * BPP);
        assert_eq!(buf.sizing_for(1000, 2), Sizing::Fits);
        assert_eq!(buf.sizing_for(1001, 2), Sizing::Grow(2000 * BPP));
        assert_eq!(buf.capacity_points(), 1000);
    }
}
