//! Sweep command implementation.

use crate::utils::{create_progress_bar, format_size};
use lzscope_lzma2::{Container, ParameterSet, SweepAxis, SweepPoint, sweep};
use serde::Serialize;

/// Options for the sweep command.
pub struct SweepOptions<'a> {
    pub base: ParameterSet,
    pub container: Container,
    pub axis: SweepAxis,
    /// Axis name shown to the user.
    pub label: &'a str,
    /// Library units per value given on the command line.
    pub scale: u32,
    pub values: &'a [u32],
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct PointJson {
    value: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    compressed_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compression_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_secs: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SweepJson<'a> {
    axis: &'a str,
    original_size: usize,
    container: &'static str,
    points: Vec<PointJson>,
}

/// Values `from..=to` in steps of `step`.
pub fn range_values(from: u32, to: u32, step: u32) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    if step == 0 {
        return Err("--step must be at least 1".into());
    }
    if from > to {
        return Err(format!("--from {} is greater than --to {}", from, to).into());
    }
    Ok((from..=to).step_by(step as usize).collect())
}

/// Convert command-line values into library units.
pub fn scale_values(values: &[u32], scale: u32) -> Result<Vec<u32>, Box<dyn std::error::Error>> {
    let mut scaled = Vec::with_capacity(values.len());
    for &value in values {
        let Some(v) = value.checked_mul(scale) else {
            return Err(format!("value {} is too large", value).into());
        };
        scaled.push(v);
    }
    Ok(scaled)
}

pub fn cmd_sweep(data: &[u8], options: &SweepOptions) -> Result<(), Box<dyn std::error::Error>> {
    let values = scale_values(options.values, options.scale)?;
    let pb = create_progress_bar(values.len() as u64, !options.json);
    pb.set_message(format!("sweeping {}", options.label));

    let mut points = sweep(
        options.base,
        options.container,
        options.axis,
        &values,
        data,
        |_| pb.inc(1),
    );
    pb.finish_and_clear();
    for point in &mut points {
        point.value /= options.scale;
    }

    if options.json {
        let output = SweepJson {
            axis: options.label,
            original_size: data.len(),
            container: options.container.name(),
            points: points.iter().map(point_json).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "Sweep of {} over {} ({} container)",
        options.label,
        format_size(data.len() as u64),
        options.container.name()
    );
    println!();
    println!(
        "{:>12} {:>12} {:>8} {:>8} {:>10}",
        options.label,
        "Compressed",
        "Ratio",
        "Saved",
        "MiB/s"
    );
    println!("{}", "-".repeat(54));
    for point in &points {
        match &point.outcome {
            Ok(report) => {
                let speed = report
                    .throughput_mib_s()
                    .map_or_else(|| "-".to_string(), |s| format!("{:.2}", s));
                println!(
                    "{:>12} {:>12} {:>8.4} {:>7.1}% {:>10}",
                    point.value,
                    report.compressed_size,
                    report.compression_ratio(),
                    report.space_savings(),
                    speed
                );
            }
            Err(e) => println!("{:>12}  skipped: {}", point.value, e),
        }
    }

    if points.iter().all(|p| p.outcome.is_err()) {
        return Err(format!("no valid {} value in the sweep", options.label).into());
    }

    Ok(())
}

fn point_json(point: &SweepPoint) -> PointJson {
    match &point.outcome {
        Ok(report) => PointJson {
            value: point.value,
            compressed_size: Some(report.compressed_size),
            compression_ratio: Some(report.compression_ratio()),
            elapsed_secs: Some(report.elapsed.as_secs_f64()),
            error: None,
        },
        Err(e) => PointJson {
            value: point.value,
            compressed_size: None,
            compression_ratio: None,
            elapsed_secs: None,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_values() {
        assert_eq!(range_values(0, 9, 3).unwrap(), vec![0, 3, 6, 9]);
        assert_eq!(range_values(2, 2, 1).unwrap(), vec![2]);
        assert!(range_values(0, 4, 0).is_err());
        assert!(range_values(5, 4, 1).is_err());
    }

    #[test]
    fn test_scale_values() {
        assert_eq!(scale_values(&[4, 64], 1024).unwrap(), vec![4096, 65536]);
        assert_eq!(scale_values(&[7], 1).unwrap(), vec![7]);
        assert!(scale_values(&[u32::MAX], 1024).is_err());
    }

    #[test]
    fn test_point_json_error() {
        let data = b"sweep sample text ".repeat(50);
        let points = sweep(
            ParameterSet::default(),
            Container::Raw,
            SweepAxis::Lp,
            &[0, 4],
            &data,
            |_| {},
        );
        let ok = serde_json::to_value(point_json(&points[0])).unwrap();
        assert!(ok["compressed_size"].is_number());
        assert!(ok.get("error").is_none());
        let failed = serde_json::to_value(point_json(&points[1])).unwrap();
        assert!(failed["error"].as_str().unwrap().contains("lc+lp"));
        assert!(failed.get("compressed_size").is_none());
    }
}
