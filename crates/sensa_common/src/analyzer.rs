//! Accelerometer anomaly analyzer.
//!
//! Pure function over the last readings of a sensor. Tracks the signed
//! maximum of each axis and raises an alert when any axis of any valid
//! reading leaves the [-3, 3] band. Maxima are signed on purpose: a window of
//! strongly negative readings reports negative maxima while still alerting.

use crate::types::{AccelVector, SensorReading};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Readings considered per analysis
pub const WINDOW_SIZE: usize = 10;

/// Absolute axis value above which a reading is abnormal
pub const ABNORMAL_THRESHOLD: f64 = 3.0;

/// Summary of one analysis window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Signed maximum per axis across valid readings
    pub max_per_axis: AccelVector,
    pub abnormal: bool,
    /// Readings in the window, valid or not
    pub reading_count: usize,
    pub valid_readings: usize,
}

/// Why a window produced no result
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("No sensor data found for the last 10 readings.")]
    NoData,

    #[error("No valid accelerometer data found in the last 10 readings.")]
    NoValidReadings,
}

/// Analyze the last [`WINDOW_SIZE`] readings of `readings`.
pub fn analyze(readings: &[SensorReading]) -> Result<AnalysisResult, AnalysisError> {
    let window = &readings[readings.len().saturating_sub(WINDOW_SIZE)..];
    if window.is_empty() {
        return Err(AnalysisError::NoData);
    }

    let mut max = [f64::NEG_INFINITY; 3];
    let mut abnormal = false;
    let mut valid = 0usize;

    for vector in window.iter().filter_map(parse_accel) {
        valid += 1;
        for (slot, value) in max.iter_mut().zip(vector.axes()) {
            if value > *slot {
                *slot = value;
            }
            if value.abs() > ABNORMAL_THRESHOLD {
                abnormal = true;
            }
        }
    }

    if valid == 0 {
        return Err(AnalysisError::NoValidReadings);
    }

    Ok(AnalysisResult {
        max_per_axis: AccelVector::new(max[0], max[1], max[2]),
        abnormal,
        reading_count: window.len(),
        valid_readings: valid,
    })
}

/// Parse a reading's accelerometer vector; `None` if absent or any axis is not numeric
pub fn parse_accel(reading: &SensorReading) -> Option<AccelVector> {
    let accel = reading.accel()?;
    let x = parse_axis(accel.get("x")?)?;
    let y = parse_axis(accel.get("y")?)?;
    let z = parse_axis(accel.get("z")?)?;
    Some(AccelVector::new(x, y, z))
}

fn parse_axis(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    parsed.is_finite().then_some(parsed)
}

/// Render the fixed-format report for a successful analysis
pub fn render_report(result: &AnalysisResult) -> String {
    let max = &result.max_per_axis;
    let mut report = String::from("**Last 10 Readings Analysis:**\n\n");
    report.push_str("Maximum Accelerometer Values:\n");
    report.push_str(&format!("  X-axis: {:.2}\n", max.x));
    report.push_str(&format!("  Y-axis: {:.2}\n", max.y));
    report.push_str(&format!("  Z-axis: {:.2}\n\n", max.z));

    if result.abnormal {
        report.push_str(
            "⚠️ **ALERT:** Something isn't normal! Detected abnormal accelerometer readings \
             (values exceeding ±3). This could indicate excessive vibration, impact, or \
             movement that requires attention.",
        );
    } else {
        report.push_str("✓ All accelerometer readings are within normal range (±3).");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reading(accel: Value) -> SensorReading {
        serde_json::from_value(json!({ "data": { "accel": accel } })).unwrap()
    }

    #[test]
    fn test_empty_window_is_no_data() {
        assert_eq!(analyze(&[]), Err(AnalysisError::NoData));
    }

    #[test]
    fn test_unparseable_window_is_distinct_from_no_data() {
        let window = vec![reading(json!({"x": "a", "y": "b", "z": "c"}))];
        assert_eq!(analyze(&window), Err(AnalysisError::NoValidReadings));
        assert_ne!(AnalysisError::NoData, AnalysisError::NoValidReadings);
    }

    #[test]
    fn test_abnormal_window_tracks_signed_max() {
        let window = vec![
            reading(json!({"x": 1, "y": 2, "z": 1})),
            reading(json!({"x": 4, "y": 0, "z": 0})),
        ];
        let result = analyze(&window).unwrap();
        assert!(result.abnormal);
        assert_eq!(result.max_per_axis, AccelVector::new(4.0, 2.0, 1.0));
        assert_eq!(result.reading_count, 2);
        assert_eq!(result.valid_readings, 2);
    }

    #[test]
    fn test_negative_values_alert_but_keep_signed_max() {
        let window = vec![
            reading(json!({"x": -5, "y": -1, "z": -2})),
            reading(json!({"x": -4, "y": -0.5, "z": -3})),
        ];
        let result = analyze(&window).unwrap();
        assert!(result.abnormal);
        assert_eq!(result.max_per_axis, AccelVector::new(-4.0, -0.5, -2.0));
    }

    #[test]
    fn test_boundary_values_are_normal() {
        let window = vec![
            reading(json!({"x": 3, "y": -3, "z": 0})),
            reading(json!({"x": "2.5", "y": "-2.99", "z": 3.0})),
        ];
        let result = analyze(&window).unwrap();
        assert!(!result.abnormal);
        assert_eq!(result.max_per_axis, AccelVector::new(3.0, -2.99, 3.0));
    }

    #[test]
    fn test_partial_invalid_reading_is_skipped_whole() {
        let window = vec![
            reading(json!({"x": 10, "y": "oops", "z": 0})),
            reading(json!({"x": 1, "y": 1, "z": 1})),
            SensorReading::default(),
        ];
        let result = analyze(&window).unwrap();
        assert!(!result.abnormal);
        assert_eq!(result.max_per_axis, AccelVector::new(1.0, 1.0, 1.0));
        assert_eq!(result.reading_count, 3);
        assert_eq!(result.valid_readings, 1);
    }

    #[test]
    fn test_only_last_ten_readings_count() {
        let mut window = vec![reading(json!({"x": 9, "y": 9, "z": 9}))];
        for _ in 0..WINDOW_SIZE {
            window.push(reading(json!({"x": 0.1, "y": 0.2, "z": 0.3})));
        }
        let result = analyze(&window).unwrap();
        assert!(!result.abnormal);
        assert_eq!(result.reading_count, WINDOW_SIZE);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let window = vec![
            reading(json!({"x": 0.5, "y": "1.25", "z": -0.75})),
            reading(json!({"x": 2, "y": 3.5, "z": 1})),
        ];
        assert_eq!(analyze(&window), analyze(&window));
    }

    #[test]
    fn test_report_format() {
        let result = AnalysisResult {
            max_per_axis: AccelVector::new(4.0, 2.0, 1.0),
            abnormal: true,
            reading_count: 2,
            valid_readings: 2,
        };
        let report = render_report(&result);
        assert!(report.starts_with("**Last 10 Readings Analysis:**"));
        assert!(report.contains("  X-axis: 4.00\n"));
        assert!(report.contains("  Y-axis: 2.00\n"));
        assert!(report.contains("  Z-axis: 1.00\n"));
        assert!(report.contains("**ALERT:**"));

        let calm = AnalysisResult {
            abnormal: false,
            ..result
        };
        assert!(render_report(&calm).contains("within normal range (±3)"));
    }
}
