//! English renderings of byte counts and durations

const BYTES_PER_KIB: i64 = 1 << 10;
const BYTES_PER_MIB: i64 = 1 << 20;

/// Units from smallest to largest; the last one has no upper bound
const DURATIONS: [(i64, &str); 6] = [
    (1000, "millisecond"),
    (60, "second"),
    (60, "minute"),
    (24, "hour"),
    (365, "day"),
    (-1, "year"),
];

const COMPONENTS_TO_DISPLAY: usize = 2;

/// `512B`, `1.5KiB`, `2.0MiB`
pub fn format_bytes(bytes: i64) -> String {
    if bytes < BYTES_PER_KIB {
        format!("{}B", bytes)
    } else if bytes < BYTES_PER_MIB {
        format!("{:.1}KiB", bytes as f64 / BYTES_PER_KIB as f64)
    } else {
        format!("{:.1}MiB", bytes as f64 / BYTES_PER_MIB as f64)
    }
}

/// The two largest non-zero units, e.g. `1 minute 5 seconds`
pub fn format_time_duration(milliseconds: i64) -> String {
    if milliseconds == 0 {
        return "0 seconds".to_string();
    }

    let mut components = Vec::new();
    let mut remaining = milliseconds;
    for (quantity, name) in DURATIONS {
        if remaining <= 0 {
            break;
        }
        let mut value = remaining;
        if quantity > 0 {
            remaining /= quantity;
            value %= quantity;
        } else {
            remaining = 0;
        }
        if value == 0 {
            continue;
        }
        let plural = if value != 1 { "s" } else { "" };
        components.push(format!("{} {}{}", value, name, plural));
    }

    components.reverse();
    components.truncate(COMPONENTS_TO_DISPLAY);
    components.join(" ")
}

/// `round(100 * min(n, d) / d)`, 0 when `d` is 0
pub fn percentage(numerator: i64, denominator: i64) -> i64 {
    if denominator <= 0 {
        return 0;
    }
    let numerator = numerator.clamp(0, denominator);
    ((100.0 * numerator as f64) / denominator as f64).round() as i64
}
