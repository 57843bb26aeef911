//! Parser for the per-camera log written by the offline vision executable.
//!
//! The executable prints one `;`-separated record per processed frame. Records
//! of interest carry a `ratio=<float>` field (lateral lane position) and a
//! `CSA=<float>` field (current steering angle), e.g.
//!
//! ```text
//! frame=12;ratio=0.482;lines=3;CSA=89.70
//! ```
//!
//! A run is summarised by the mean of every ratio and every CSA value in the
//! file, rounded to 3 and 2 decimals respectively.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::math::{mean, round_to};
use crate::types::MeasurementSample;

const RATIO_KEY: &str = "ratio";
const CSA_KEY: &str = "CSA";

/// Quantity extracted from a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Ratio,
    SteeringAngle,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Ratio => f.write_str("ratio"),
            Metric::SteeringAngle => f.write_str("CSA"),
        }
    }
}

#[derive(Debug, Error)]
pub enum LogParseError {
    #[error("log file {0} not found")]
    LogFileNotFound(PathBuf),
    #[error("failed to read log file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no {metric} samples in log")]
    MeasurementUnavailable { metric: Metric },
    #[error("line {line}: cannot read a finite value from field `{field}`")]
    InvalidValue { line: usize, field: String },
}

/// Read and summarise a log file.
pub fn parse_log_file(path: &Path) -> Result<MeasurementSample, LogParseError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            LogParseError::LogFileNotFound(path.to_path_buf())
        } else {
            LogParseError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let sample = parse_log_str(&text)?;
    debug!(
        "{}: ratio={:.3} csa={:.2}",
        path.display(),
        sample.ratio,
        sample.steering_angle
    );
    Ok(sample)
}

/// Summarise log text already in memory.
pub fn parse_log_str(text: &str) -> Result<MeasurementSample, LogParseError> {
    let mut ratios = Vec::new();
    let mut angles = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        if !line.contains(';') {
            continue;
        }
        if line.contains(RATIO_KEY) {
            ratios.push(field_value(line, RATIO_KEY, idx + 1)?);
        }
        if line.contains(CSA_KEY) {
            angles.push(field_value(line, CSA_KEY, idx + 1)?);
        }
    }

    let ratio = mean(&ratios).ok_or(LogParseError::MeasurementUnavailable {
        metric: Metric::Ratio,
    })?;
    let steering_angle = mean(&angles).ok_or(LogParseError::MeasurementUnavailable {
        metric: Metric::SteeringAngle,
    })?;

    Ok(MeasurementSample {
        ratio: round_to(ratio, 3),
        steering_angle: round_to(steering_angle, 2),
    })
}

/// Value of the first `;`-field of `line` containing `key`, read as `key=<float>`.
fn field_value(line: &str, key: &str, line_no: usize) -> Result<f64, LogParseError> {
    let invalid = |field: &str| LogParseError::InvalidValue {
        line: line_no,
        field: field.trim().to_string(),
    };

    let field = line
        .split(';')
        .find(|f| f.contains(key))
        .ok_or_else(|| invalid(line))?;
    let value = field
        .split('=')
        .nth(1)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(field))?;
    Ok(value)
}
