//! Measurements and parameter sweeps.
//!
//! [`measure`] runs one session over a buffer and returns its output and
//! [`CompressionReport`]. [`sweep`] repeats that along one parameter axis,
//! producing the series a ratio/speed chart is drawn from. With the
//! `parallel` feature the sessions of a sweep run on the rayon pool.

use crate::compressor::{CompressionReport, Compressor, Container};
use crate::params::ParameterSet;
use lzscope_core::error::{LzScopeError, Result};
use lzscope_core::traits::StreamCompressor;
use std::fmt;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Output and totals of one session.
#[derive(Debug, Clone)]
pub struct Measurement {
    /// Compressed stream.
    pub output: Vec<u8>,
    /// Session totals.
    pub report: CompressionReport,
}

/// Compress `data` with one session.
///
/// With `increment`, input is fed in slices of at most that many bytes;
/// the output does not depend on it.
pub fn measure(
    params: ParameterSet,
    container: Container,
    data: &[u8],
    increment: Option<usize>,
) -> Result<Measurement> {
    let mut compressor = Compressor::with_container(params, container)?;
    let output = match increment {
        Some(increment) => compressor.compress_in_increments(data, increment)?,
        None => compressor.compress_all(data)?,
    };
    Ok(Measurement {
        output,
        report: compressor.report(),
    })
}

/// A parameter varied by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAxis {
    /// Preset level; every other field follows the preset.
    Level,
    /// Dictionary size in bytes.
    DictSize,
    /// Literal context bits.
    Lc,
    /// Literal position bits.
    Lp,
    /// Position bits.
    Pb,
    /// Nice match length.
    NiceLen,
    /// Match finder depth (0 = automatic).
    Depth,
}

impl SweepAxis {
    /// All axes.
    pub const ALL: [Self; 7] = [
        Self::Level,
        Self::DictSize,
        Self::Lc,
        Self::Lp,
        Self::Pb,
        Self::NiceLen,
        Self::Depth,
    ];

    /// Short name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::DictSize => "dict-size",
            Self::Lc => "lc",
            Self::Lp => "lp",
            Self::Pb => "pb",
            Self::NiceLen => "nice-len",
            Self::Depth => "depth",
        }
    }

    /// `base` with this axis set to `value`.
    pub fn apply(self, base: ParameterSet, value: u32) -> Result<ParameterSet> {
        Ok(match self {
            Self::Level => {
                let level = u8::try_from(value).map_err(|_| {
                    LzScopeError::invalid_parameters("level", format!("level {} out of range", value))
                })?;
                ParameterSet::preset(level)?
            }
            Self::DictSize => base.dict_size(value),
            Self::Lc => base.lc(value),
            Self::Lp => base.lp(value),
            Self::Pb => base.pb(value),
            Self::NiceLen => base.nice_len(value),
            Self::Depth => base.depth(value),
        })
    }
}

impl fmt::Display for SweepAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One measured point of a sweep.
#[derive(Debug)]
pub struct SweepPoint {
    /// Axis value.
    pub value: u32,
    /// Totals, or the reason the point could not be measured.
    pub outcome: Result<CompressionReport>,
}

fn sweep_point(
    base: ParameterSet,
    container: Container,
    axis: SweepAxis,
    value: u32,
    data: &[u8],
) -> SweepPoint {
    let outcome = axis
        .apply(base, value)
        .and_then(|params| measure(params, container, data, None))
        .map(|m| m.report);
    if let Err(err) = &outcome {
        log::debug!("sweep {}={} skipped: {}", axis, value, err);
    }
    SweepPoint { value, outcome }
}

/// Measure `data` for each value of one axis.
///
/// Points come back in the order of `values`; `on_point` sees each one as
/// it completes. Invalid combinations become failed points rather than
/// aborting the sweep.
pub fn sweep<F>(
    base: ParameterSet,
    container: Container,
    axis: SweepAxis,
    values: &[u32],
    data: &[u8],
    on_point: F,
) -> Vec<SweepPoint>
where
    F: Fn(&SweepPoint) + Sync,
{
    #[cfg(feature = "parallel")]
    let points: Vec<SweepPoint> = values
        .par_iter()
        .map(|&value| {
            let point = sweep_point(base, container, axis, value, data);
            on_point(&point);
            point
        })
        .collect();

    #[cfg(not(feature = "parallel"))]
    let points: Vec<SweepPoint> = values
        .iter()
        .map(|&value| {
            let point = sweep_point(base, container, axis, value, data);
            on_point(&point);
            point
        })
        .collect();

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample() -> Vec<u8> {
        b"The quick brown fox jumps over the lazy dog. ".repeat(200)
    }

    #[test]
    fn test_measure_increment_independent() {
        let data = sample();
        let whole = measure(ParameterSet::default(), Container::Raw, &data, None).unwrap();
        let pieces = measure(ParameterSet::default(), Container::Raw, &data, Some(7)).unwrap();
        assert_eq!(whole.output, pieces.output);
        assert_eq!(whole.report.original_size, data.len() as u64);
        assert_eq!(whole.report.compressed_size, whole.output.len() as u64);
    }

    #[test]
    fn test_axis_apply() {
        let base = ParameterSet::default();
        assert_eq!(SweepAxis::Lc.apply(base, 1).unwrap().lc, 1);
        assert_eq!(SweepAxis::DictSize.apply(base, 1 << 16).unwrap().dict_size, 1 << 16);
        assert_eq!(SweepAxis::Level.apply(base, 1).unwrap(), ParameterSet::preset(1).unwrap());
        assert!(SweepAxis::Level.apply(base, 300).is_err());
    }

    #[test]
    fn test_sweep_reports_every_point() {
        let data = sample();
        let seen = AtomicUsize::new(0);
        let points = sweep(
            ParameterSet::default(),
            Container::Raw,
            SweepAxis::Lp,
            &[0, 1, 2],
            &data,
            |_| {
                seen.fetch_add(1, Ordering::Relaxed);
            },
        );
        assert_eq!(seen.load(Ordering::Relaxed), 3);
        assert_eq!(points.iter().map(|p| p.value).collect::<Vec<_>>(), [0, 1, 2]);
        assert!(points[0].outcome.is_ok());
        // lc 3 + lp 2 exceeds the limit.
        assert!(matches!(
            points[2].outcome,
            Err(LzScopeError::InvalidParameters { .. })
        ));
    }

    #[test]
    fn test_level_sweep_extremes() {
        let data = sample();
        let points = sweep(
            ParameterSet::default(),
            Container::Raw,
            SweepAxis::Level,
            &[0, 9],
            &data,
            |_| {},
        );
        let fast = points[0].outcome.as_ref().unwrap();
        let best = points[1].outcome.as_ref().unwrap();
        assert!(fast.compression_ratio() < 0.2);
        assert!(best.compression_ratio() < 0.2);
    }
}
