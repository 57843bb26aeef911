//! Acceptance bands and pass/fail verdicts.
//!
//! Two gates are applied during a calibration run:
//!
//! - after the baseline pass, the raw ratio and steering angle must lie in a
//!   wide band, otherwise the camera is physically mis-mounted
//!   ([`mounting_verdict`]);
//! - after the verification pass, the corrected values must lie in a narrow
//!   band around the target ([`offset_verdict`]).
//!
//! Both bounds of a band are inclusive.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::CameraRole;

/// Inclusive `[min, max]` acceptance band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// Acceptance bands for both gates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Baseline ratio band (camera tilt).
    pub ratio_without_offset: Bounds,
    /// Baseline steering-angle band (camera rotation).
    pub csa_without_offset: Bounds,
    /// Verified ratio band after offsets are applied.
    pub ratio_with_offset: Bounds,
    /// Verified steering-angle band after offsets are applied.
    pub csa_with_offset: Bounds,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ratio_without_offset: Bounds::new(0.40, 0.60),
            csa_without_offset: Bounds::new(80.0, 100.0),
            ratio_with_offset: Bounds::new(0.48, 0.52),
            csa_with_offset: Bounds::new(88.0, 92.0),
        }
    }
}

impl Thresholds {
    /// Name of the first malformed band, if any.
    pub fn invalid_band(&self) -> Option<&'static str> {
        [
            ("ratio_without_offset", &self.ratio_without_offset),
            ("csa_without_offset", &self.csa_without_offset),
            ("ratio_with_offset", &self.ratio_with_offset),
            ("csa_with_offset", &self.csa_with_offset),
        ]
        .into_iter()
        .find(|(_, b)| !b.is_valid())
        .map(|(name, _)| name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Pass => f.write_str("PASS"),
            Verdict::Fail => f.write_str("FAIL"),
        }
    }
}

/// Which side of a band a value fell out on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Violation {
    BelowMin,
    AboveMax,
}

/// Range check, inclusive on both ends.
pub fn evaluate(value: f64, bounds: &Bounds) -> Verdict {
    if bounds.contains(value) {
        Verdict::Pass
    } else {
        Verdict::Fail
    }
}

/// Side of the band `value` violates, `None` when it passes.
///
/// A non-finite value is reported as below the band.
pub fn violation(value: f64, bounds: &Bounds) -> Option<Violation> {
    if bounds.contains(value) {
        None
    } else if value > bounds.max {
        Some(Violation::AboveMax)
    } else {
        Some(Violation::BelowMin)
    }
}

/// Physical adjustment advised to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Adjustment {
    MoveDownwards,
    MoveUpwards,
    RotateClockwise,
    RotateAnticlockwise,
}

impl Adjustment {
    fn for_ratio(violation: Violation) -> Self {
        match violation {
            Violation::BelowMin => Adjustment::MoveDownwards,
            Violation::AboveMax => Adjustment::MoveUpwards,
        }
    }

    fn for_steering(violation: Violation) -> Self {
        match violation {
            Violation::BelowMin => Adjustment::RotateClockwise,
            Violation::AboveMax => Adjustment::RotateAnticlockwise,
        }
    }
}

/// Directional instruction for one camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub role: CameraRole,
    pub adjustment: Adjustment,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = self.role;
        match self.adjustment {
            Adjustment::MoveDownwards => write!(f, "tilt {role} camera downwards"),
            Adjustment::MoveUpwards => write!(f, "tilt {role} camera upwards"),
            Adjustment::RotateClockwise => write!(f, "rotate {role} camera clockwise"),
            Adjustment::RotateAnticlockwise => write!(f, "rotate {role} camera anticlockwise"),
        }
    }
}

/// Baseline mounting check for one camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountingVerdict {
    pub role: CameraRole,
    /// Ratio check: fails when the camera tilt is wrong.
    pub vertical_pos: Verdict,
    /// Steering check: fails when the camera is rotated on its mount.
    pub rotated_pos: Verdict,
    pub instructions: Vec<Instruction>,
}

impl MountingVerdict {
    pub fn passed(&self) -> bool {
        self.vertical_pos.is_pass() && self.rotated_pos.is_pass()
    }
}

/// Check baseline (no offset) values against the mounting bands.
pub fn mounting_verdict(
    role: CameraRole,
    ratio_without_offset: f64,
    steering_without_offset: f64,
    ratio_bounds: &Bounds,
    steering_bounds: &Bounds,
) -> MountingVerdict {
    let ratio_violation = violation(ratio_without_offset, ratio_bounds);
    let steering_violation = violation(steering_without_offset, steering_bounds);
    MountingVerdict {
        role,
        vertical_pos: evaluate(ratio_without_offset, ratio_bounds),
        rotated_pos: evaluate(steering_without_offset, steering_bounds),
        instructions: instructions(role, ratio_violation, steering_violation),
    }
}

/// Verification check for one camera after offsets are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffsetVerdict {
    pub role: CameraRole,
    /// `None` for the front camera, which carries no ratio offset.
    pub ratio: Option<Verdict>,
    pub steering: Verdict,
    pub instructions: Vec<Instruction>,
}

impl OffsetVerdict {
    pub fn passed(&self) -> bool {
        self.ratio.is_none_or(Verdict::is_pass) && self.steering.is_pass()
    }
}

/// Check verified (with offset) values against the narrow bands.
pub fn offset_verdict(
    role: CameraRole,
    ratio_with_offset: f64,
    steering_with_offset: f64,
    thresholds: &Thresholds,
) -> OffsetVerdict {
    let gated_ratio = role.has_ratio_offset();
    let ratio_violation = if gated_ratio {
        violation(ratio_with_offset, &thresholds.ratio_with_offset)
    } else {
        None
    };
    let steering_violation = violation(steering_with_offset, &thresholds.csa_with_offset);
    OffsetVerdict {
        role,
        ratio: gated_ratio.then(|| evaluate(ratio_with_offset, &thresholds.ratio_with_offset)),
        steering: evaluate(steering_with_offset, &thresholds.csa_with_offset),
        instructions: instructions(role, ratio_violation, steering_violation),
    }
}

fn instructions(
    role: CameraRole,
    ratio: Option<Violation>,
    steering: Option<Violation>,
) -> Vec<Instruction> {
    ratio
        .map(Adjustment::for_ratio)
        .into_iter()
        .chain(steering.map(Adjustment::for_steering))
        .map(|adjustment| Instruction { role, adjustment })
        .collect()
}
