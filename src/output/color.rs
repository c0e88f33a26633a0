// src/output/color.rs

//! Stable per-project colours for prefixed output.

use colored::{Color, Colorize};

pub const PALETTE: [Color; 10] = [
    Color::Green,
    Color::BrightGreen,
    Color::Red,
    Color::BrightRed,
    Color::Cyan,
    Color::BrightCyan,
    Color::Yellow,
    Color::BrightYellow,
    Color::Magenta,
    Color::BrightMagenta,
];

/// Sum of the UTF-16 code units of `project`, modulo the palette size.
pub fn color_for_project(project: &str) -> Color {
    let sum: u64 = project.encode_utf16().map(u64::from).sum();
    PALETTE[(sum % PALETTE.len() as u64) as usize]
}

/// `project:` in the project's colour, bold when `bold` is set.
pub fn project_prefix(project: &str, bold: bool) -> String {
    let label = format!("{project}:").color(color_for_project(project));
    if bold {
        label.bold().to_string()
    } else {
        label.to_string()
    }
}
