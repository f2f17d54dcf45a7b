//! Conversions between WASAPI reference time (100 ns units) and frames.

/// 100-nanosecond units per second.
pub const HNS_PER_SECOND: i64 = 10_000_000;

/// Lowest sample rate accepted by the auto-converting shared-mode stream.
pub const MIN_SAMPLE_RATE: u32 = 8000;
/// Highest sample rate accepted by the auto-converting shared-mode stream.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

pub fn is_supported_rate(sample_rate: u32) -> bool {
    (MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate)
}

/// Frames covered by `period_hns` at `sample_rate`, rounded up, at least 1.
pub fn frames_for_period(period_hns: i64, sample_rate: u32) -> usize {
    let period_hns = period_hns.max(0) as u128;
    let frames = (period_hns * sample_rate as u128).div_ceil(HNS_PER_SECOND as u128);
    (frames as usize).max(1)
}

/// Duration of `frames` at `sample_rate` in 100 ns units, rounded up.
pub fn hns_for_frames(frames: usize, sample_rate: u32) -> i64 {
    if sample_rate == 0 {
        return 0;
    }
    let hns = (frames as u128 * HNS_PER_SECOND as u128).div_ceil(sample_rate as u128);
    hns.min(i64::MAX as u128) as i64
}
