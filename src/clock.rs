use std::time::Duration;

pub const DEFAULT_FRAME_RATE: f64 = 24.0;

// One tick per rendered frame. A bogus rate (0, negative, NaN) would spin or
// panic in Duration::from_secs_f64, so it falls back to the default.
pub fn tick_interval(frame_rate: f64) -> Duration {
    let fps = if frame_rate.is_finite() && frame_rate > 0.0 {
        frame_rate
    } else {
        DEFAULT_FRAME_RATE
    };
    Duration::from_secs_f64(1.0 / fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_one_frame() {
        assert_eq!(tick_interval(25.0), Duration::from_millis(40));
        assert_eq!(tick_interval(1.0), Duration::from_secs(1));
    }

    #[test]
    fn invalid_rates_fall_back() {
        let fallback = tick_interval(DEFAULT_FRAME_RATE);
        assert_eq!(tick_interval(0.0), fallback);
        assert_eq!(tick_interval(-30.0), fallback);
        assert_eq!(tick_interval(f64::NAN), fallback);
        assert_eq!(tick_interval(f64::INFINITY), fallback);
    }
}
