//! Rendering of the summary label shown next to the month grids.

/// Placeholder replaced by the value of the day.
pub const PLACEHOLDER: &str = "%1";

pub const NO_SOURCES_LABEL: &str = "No data sources available";
pub const NO_DATA_TODAY_LABEL: &str = "No data for today";

/// Integral values are printed without a fractional part, so 100.0 becomes "100".
pub fn format_value(value: f64) -> String {
    if value == 0. {
        // Also covers -0.0.
        "0".to_string()
    } else if value.is_finite() && value.fract() == 0. && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Substitutes the placeholder of `template` with `value`. A template without a placeholder is
/// returned as is.
pub fn render_label(template: &str, value: f64) -> String {
    template.replacen(PLACEHOLDER, &format_value(value), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(100.), "100");
        assert_eq!(format_value(0.), "0");
        assert_eq!(format_value(-0.), "0");
        assert_eq!(render_label("%1 left", -0.), "0 left");
        assert_eq!(format_value(-3.), "-3");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(f64::NAN), "NaN");
    }

    #[test]
    fn test_render_label() {
        assert_eq!(render_label("test format string %1", 100.), "test format string 100");
        assert_eq!(render_label("%1 km walked", 1.25), "1.25 km walked");
        assert_eq!(render_label("no placeholder", 1.), "no placeholder");
    }
}
