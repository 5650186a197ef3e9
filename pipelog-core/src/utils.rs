use std::{sync::LazyLock, time::Instant};

use chrono::Local;

static PROCESS_START: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Pins the reference point of [`clock`]. Called when a pipeline is created;
/// call it earlier, e.g. first thing in `main`, to measure from process start.
pub fn start_clock() {
    LazyLock::force(&PROCESS_START);
}

/// Local date as `MM/DD/YY`.
pub fn date() -> String {
    Local::now().format("%m/%d/%y").to_string()
}

/// Local time of day as `HH:MM:SS`.
pub fn time() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Time elapsed since [`start_clock`] was first called (at the latest, when the
/// first pipeline was created), as `HH:MM:SS:mmm`.
pub fn clock() -> String {
    let elapsed = PROCESS_START.elapsed();
    let millis = u64::from(elapsed.subsec_millis());
    let secs = elapsed.as_secs();
    let (hrs, mins, secs) = (secs / 3600, (secs / 60) % 60, secs % 60);
    format!(
        "{}:{}:{}:{}",
        format_radix(hrs, 10, 2),
        format_radix(mins, 10, 2),
        format_radix(secs, 10, 2),
        format_radix(millis, 10, 3)
    )
}

/// Formats `value` in `base` (2..=36, lowercase digits), left-padded with
/// zeros to at least `width` characters. Out-of-range bases fall back to 10.
pub fn format_radix(mut value: u64, base: u32, width: usize) -> String {
    let base = if (2..=36).contains(&base) { base } else { 10 };
    let mut digits = Vec::new();
    loop {
        let digit = (value % u64::from(base)) as u32;
        digits.push(char::from_digit(digit, base).unwrap_or('?'));
        value /= u64::from(base);
        if value == 0 {
            break;
        }
    }
    while digits.len() < width {
        digits.push('0');
    }
    digits.iter().rev().collect()
}

/// Bytes as two-digit lowercase hexadecimal pairs.
pub fn hex_pairs(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format_radix(u64::from(*b), 16, 2)).collect()
}

/// Timestamped log file name, e.g. `app_10-16-26_14-03-59.log` for prefix `app_`.
pub fn log_file_name(prefix: &str) -> String {
    format!("{prefix}{}.log", Local::now().format("%m-%d-%y_%H-%M-%S"))
}
