// src/gcode.rs - Formatting for the handful of commands sent to the firmware
use crate::path::Point;

pub const HOME: &str = "G28";
pub const ABSOLUTE: &str = "G90";
pub const RELATIVE: &str = "G91";
pub const WAIT_FOR_MOVES: &str = "M400";

/// Absolute move at the modal feedrate.
pub fn linear_move(point: Point) -> String {
    format!("G1 X{:.2} Y{:.2}", point.x, point.y)
}

pub fn linear_move_at(point: Point, feedrate: u32) -> String {
    format!("G1 X{:.2} Y{:.2} F{}", point.x, point.y, feedrate)
}

/// Offset move; only meaningful after `G91`.
pub fn relative_move(dx: f64, dy: f64, feedrate: u32) -> String {
    format!("G1 X{:.3} Y{:.3} F{}", dx, dy, feedrate)
}

/// Whether the command homes axes (and so needs a long settle time).
pub fn is_home(command: &str) -> bool {
    command
        .split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case(HOME))
}
