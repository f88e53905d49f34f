//! Progress reporting for FFmpeg operations.

/// Progress information from a running FFmpeg process.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProgress {
    /// Output time in microseconds. FFmpeg reports both `out_time_us` and
    /// `out_time_ms` in microseconds (the latter is misnamed upstream);
    /// both keys land here unscaled.
    pub out_time_us: i64,
    /// Current frame number
    pub frame: u64,
    /// Processing speed (1.0 = realtime)
    pub speed: f64,
    /// Whether processing is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output time in seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_us as f64 / 1_000_000.0
    }

    /// Percentage complete given a known duration, clamped to 0..=100.
    pub fn percent_of(&self, duration_secs: f64) -> f64 {
        if duration_secs <= 0.0 {
            return 0.0;
        }
        (self.out_time_secs() / duration_secs * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback invoked with progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_time_secs_from_microseconds() {
        let progress = FfmpegProgress {
            out_time_us: 5_000_000,
            ..Default::default()
        };
        assert!((progress.out_time_secs() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_of() {
        let progress = FfmpegProgress {
            out_time_us: 5_000_000,
            ..Default::default()
        };
        assert!((progress.percent_of(10.0) - 50.0).abs() < 0.01);
        assert_eq!(progress.percent_of(0.0), 0.0);

        let over = FfmpegProgress {
            out_time_us: 20_000_000,
            ..Default::default()
        };
        assert_eq!(over.percent_of(10.0), 100.0);
    }
}
