//! Plain-text tables for the operator.
//!
//! Cells are laid out from their plain text; PASS and FAIL are coloured on
//! output, so padding stays correct with or without colour.

use colored::{ColoredString, Colorize};
use lanecal_core::{CalibrationResultStore, MountingVerdict, Verdict};

use crate::sequencer::CalibrationOutcome;

/// Baseline mounting check, one row per camera, followed by instructions.
pub fn mounting_table(verdicts: &[MountingVerdict], results: &CalibrationResultStore) -> String {
    let header = ["Camera", "Ratio", "CSA", "Tilt", "Rotation"];
    let rows: Vec<Vec<String>> = verdicts
        .iter()
        .map(|v| {
            let r = results.result(v.role);
            vec![
                v.role.to_string(),
                value(r.ratio_without_offset, 3),
                value(r.steering_angle_without_offset, 2),
                v.vertical_pos.to_string(),
                v.rotated_pos.to_string(),
            ]
        })
        .collect();

    let mut out = render(&header, &rows);
    for instruction in verdicts.iter().flat_map(|v| v.instructions.iter()) {
        out.push_str(&format!("  -> {instruction}\n"));
    }
    out
}

/// Every value and offset of the run, with the final verdict when there is one.
pub fn result_table(results: &CalibrationResultStore, outcome: Option<&CalibrationOutcome>) -> String {
    let header = [
        "Camera",
        "CameraId",
        "RatioWithoutOffset",
        "CsaWithoutOffset",
        "RatioOffset",
        "CsaOffset",
        "RatioWithOffset",
        "CsaWithOffset",
        "Ratio",
        "CSA",
    ];
    let rows: Vec<Vec<String>> = results
        .connected_roles()
        .map(|role| {
            let r = results.result(role);
            let verdict = outcome.and_then(|o| o.verdicts.iter().find(|v| v.role == role));
            vec![
                role.to_string(),
                results.camera_id(role).unwrap_or("-").to_string(),
                value(r.ratio_without_offset, 3),
                value(r.steering_angle_without_offset, 2),
                value(r.ratio_offset, 2),
                value(r.steering_offset, 2),
                value(r.ratio_with_offset, 3),
                value(r.steering_angle_with_offset, 2),
                verdict
                    .and_then(|v| v.ratio)
                    .map_or_else(|| "-".to_string(), |v| v.to_string()),
                verdict.map_or_else(|| "-".to_string(), |v| v.steering.to_string()),
            ]
        })
        .collect();

    let mut out = render(&header, &rows);
    if let Some(outcome) = outcome {
        for instruction in outcome.verdicts.iter().flat_map(|v| v.instructions.iter()) {
            out.push_str(&format!("  -> {instruction}\n"));
        }
        let summary = if outcome.passed {
            "CALIBRATION PASSED".green().bold()
        } else {
            "CALIBRATION FAILED".red().bold()
        };
        out.push_str(&format!("{summary}\n"));
    }
    out
}

fn value(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}

fn paint(cell: &str) -> ColoredString {
    if cell == Verdict::Pass.to_string() {
        cell.green()
    } else if cell == Verdict::Fail.to_string() {
        cell.red()
    } else {
        cell.normal()
    }
}

fn render(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let rule: String = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let rule = format!("+{rule}+\n");

    let mut out = rule.clone();
    let cells: Vec<String> = header
        .iter()
        .zip(&widths)
        .map(|(h, &w)| format!(" {h:<w$} "))
        .collect();
    out.push_str(&format!("|{}|\n", cells.join("|")));
    out.push_str(&rule);
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!(" {:<w$} ", paint(cell)))
            .collect();
        out.push_str(&format!("|{}|\n", cells.join("|")));
    }
    out.push_str(&rule);
    out
}
