//! HbA1c estimation from blood glucose
//!
//! Uses the ADAG estimated-average-glucose relation
//! `eAG (mg/dL) = 28.7 × HbA1c − 46.7`, inverted to
//! `HbA1c = (eAG + 46.7) / 28.7`. A single glucose sample stands in for the
//! average, so the result is only an estimate.
//!
//! Values are not clamped to a physiological range: a glucose of 10 mg/dL
//! still yields a (meaningless) HbA1c.

const EAG_SLOPE: f64 = 28.7;
const EAG_INTERCEPT: f64 = 46.7;

/// Estimated HbA1c (%) rounded to one decimal place.
///
/// Returns `None` ("unavailable") for zero, negative or non-finite input; the
/// caller treats this as an invalid form rather than an error.
pub fn estimate_hba1c(blood_glucose: f64) -> Option<f64> {
    if !blood_glucose.is_finite() || blood_glucose <= 0.0 {
        return None;
    }

    Some(round1((blood_glucose + EAG_INTERCEPT) / EAG_SLOPE))
}

/// Same as [`estimate_hba1c`] for raw form text; empty or non-numeric input
/// is unavailable.
pub fn estimate_hba1c_from_input(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().and_then(estimate_hba1c)
}

/// Forward eAG formula: average glucose (mg/dL) for an HbA1c percentage
pub fn estimated_average_glucose(hba1c: f64) -> f64 {
    EAG_SLOPE * hba1c - EAG_INTERCEPT
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        assert_eq!(estimate_hba1c(140.0), Some(6.5));
    }

    #[test]
    fn test_matches_formula() {
        for g in [54.0, 90.5, 126.0, 180.0, 250.0, 399.9] {
            let expected = ((g + 46.7) / 28.7 * 10.0_f64).round() / 10.0;
            assert_eq!(estimate_hba1c(g), Some(expected), "glucose {}", g);
        }
    }

    #[test]
    fn test_unavailable_inputs() {
        assert_eq!(estimate_hba1c(0.0), None);
        assert_eq!(estimate_hba1c(-5.0), None);
        assert_eq!(estimate_hba1c(f64::NAN), None);
        assert_eq!(estimate_hba1c(f64::INFINITY), None);
    }

    #[test]
    fn test_no_clamping() {
        // 10 mg/dL is not physiological but the formula still applies
        assert_eq!(estimate_hba1c(10.0), Some(2.0));
        assert_eq!(estimate_hba1c(1000.0), Some(36.5));
    }

    #[test]
    fn test_from_input() {
        assert_eq!(estimate_hba1c_from_input(" 140 "), Some(6.5));
        assert_eq!(estimate_hba1c_from_input(""), None);
        assert_eq!(estimate_hba1c_from_input("abc"), None);
        assert_eq!(estimate_hba1c_from_input("0"), None);
    }

    #[test]
    fn test_forward_formula_roundtrip() {
        let hba1c = estimate_hba1c(154.2).unwrap();
        assert!((estimated_average_glucose(hba1c) - 154.2).abs() < 2.0);
    }
}
