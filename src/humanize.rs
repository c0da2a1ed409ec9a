const UNITS: [&str; 5] = [" B", "kB", "MB", "GB", "TB"];

/// Formats a byte count with one decimal and a base-1024 unit.
///
/// The unit is picked from the number of decimal digits (every three digits
/// move up one unit), so 1000 to 1023 bytes already show as `kB`. Counts of
/// a petabyte and more stay in `TB`. Zero is `0.0  B`.
pub fn format_bytes(bytes: u64) -> String {
    let step = bytes
        .checked_ilog10()
        .map_or(0, |digits| digits as usize / 3)
        .min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(step as i32);
    format!("{:.1} {}", value, UNITS[step])
}
