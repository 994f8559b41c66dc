/// Formats seconds as `HH:MM:SS.mmm`. Hours widen past 99.
pub fn time_str(sec: f64) -> String {
    let total_ms = if sec.is_finite() && sec > 0.0 {
        (sec * 1000f64).round() as u64
    } else {
        0
    };
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let seconds = (total_ms % 60_000) / 1000;
    let milliseconds = total_ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Duration of `frames` at `rate` frames per second.
pub fn frames_to_time_str(frames: u64, rate: f64) -> String {
    if rate > 0.0 {
        time_str(frames as f64 / rate)
    } else {
        time_str(0.0)
    }
}

#[test]
fn format_durations() {
    assert_eq!(time_str(0.0), "00:00:00.000");
    assert_eq!(time_str(61.5), "00:01:01.500");
    assert_eq!(time_str(3600.0 * 123.0 + 0.25), "123:00:00.250");
    assert_eq!(time_str(f64::NAN), "00:00:00.000");
    assert_eq!(frames_to_time_str(750, 25.0), "00:00:30.000");
    assert_eq!(frames_to_time_str(750, 0.0), "00:00:00.000");
}
