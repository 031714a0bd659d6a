use super::WheelError;

/// Screen angle of the pointer, in degrees. 0° points right and angles grow clockwise.
pub const POINTER_ANGLE: f64 = 270.0;
/// Full turns the wheel makes before settling on the winner.
pub const EXTRA_TURNS: u32 = 3;

/// Rotation schedule for one spin animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpinPlan {
    pub slices: usize,
    pub winner: usize,
    pub frame_count: usize,
    pub duration_secs: f64,
}

impl SpinPlan {
    pub fn new(
        slices: usize,
        winner: usize,
        frame_count: usize,
        duration_secs: f64,
    ) -> Result<Self, WheelError> {
        if slices < 2 {
            return Err(WheelError::InvalidInput(format!(
                "a wheel needs at least 2 slices, got {slices}"
            )));
        }
        if winner >= slices {
            return Err(WheelError::InvalidInput(format!(
                "winner index {winner} is out of range for {slices} slices"
            )));
        }
        if frame_count < 2 {
            return Err(WheelError::InvalidInput(format!(
                "an animation needs at least 2 frames, got {frame_count}"
            )));
        }
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return Err(WheelError::InvalidInput(format!(
                "duration must be positive, got {duration_secs}"
            )));
        }
        Ok(Self {
            slices,
            winner,
            frame_count,
            duration_secs,
        })
    }

    pub fn sector_angle(&self) -> f64 {
        360.0 / self.slices as f64
    }

    /// Screen angle of the middle of `slice` when the wheel is rotated by `offset`.
    /// Not normalized, so it keeps counting past 360°.
    pub fn midpoint(&self, slice: usize, offset: f64) -> f64 {
        (slice as f64 + 0.5) * self.sector_angle() + offset
    }

    /// Total rotation at the last frame. Always at least `EXTRA_TURNS` full turns.
    pub fn final_offset(&self) -> f64 {
        let delta = (POINTER_ANGLE - self.midpoint(self.winner, 0.0)).rem_euclid(360.0);
        f64::from(EXTRA_TURNS) * 360.0 + delta
    }

    /// Rotation for `frame`, linear from 0 at the first frame to `final_offset` at the last.
    pub fn offset_at(&self, frame: usize) -> f64 {
        let t = frame as f64 / (self.frame_count - 1) as f64;
        t * self.final_offset()
    }

    /// Slice covering the screen angle `angle` when the wheel is rotated by `offset`.
    pub fn slice_at(&self, angle: f64, offset: f64) -> usize {
        let index = ((angle - offset).rem_euclid(360.0) / self.sector_angle()).floor() as usize;
        index.min(self.slices - 1)
    }

    /// Per-frame delays in GIF centiseconds.
    ///
    /// Each delay is the difference of rounded cumulative timestamps, so the
    /// total stays within one centisecond of `duration_secs`.
    pub fn frame_delays_cs(&self) -> Vec<u32> {
        let stamp = |k: usize| {
            (k as f64 * self.duration_secs * 100.0 / self.frame_count as f64).round() as u32
        };
        (0..self.frame_count)
            .map(|i| stamp(i + 1) - stamp(i))
            .collect()
    }
}
