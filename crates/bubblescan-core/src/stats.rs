//! Small descriptive statistics used by the scorers and filters.
//!
//! Standard deviations are population deviations (divide by `n`).

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    Some((sum / values.len() as f64) as f32)
}

/// Population standard deviation; `None` for an empty slice.
pub fn std_dev(values: &[f32]) -> Option<f32> {
    let m = mean(values)? as f64;
    let var: f64 = values
        .iter()
        .map(|&v| {
            let d = v as f64 - m;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    Some(var.sqrt() as f32)
}

/// `max(0, 1 - std/mean)`, the "consistency" of a set of positive measurements.
///
/// Returns `None` for an empty slice or a non-positive mean.
pub fn coefficient_consistency(values: &[f32]) -> Option<f32> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    let s = std_dev(values)?;
    Some((1.0 - s / m).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn population_std_dev() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&v).unwrap(), 5.0);
        assert_relative_eq!(std_dev(&v).unwrap(), 2.0);
    }

    #[test]
    fn consistency_of_equal_values_is_one() {
        assert_relative_eq!(coefficient_consistency(&[3.0, 3.0, 3.0]).unwrap(), 1.0);
        assert!(coefficient_consistency(&[]).is_none());
        assert!(coefficient_consistency(&[0.0, 0.0]).is_none());
    }

    #[test]
    fn consistency_never_negative() {
        assert!(coefficient_consistency(&[1.0, 100.0, 1.0, 1.0]).unwrap() >= 0.0);
        // std 4.95 over mean 5.05 stays just below one.
        assert_relative_eq!(
            coefficient_consistency(&[0.1, 10.0]).unwrap(),
            0.019_802,
            epsilon = 1e-4
        );
        // std 4.33 over mean 2.5 would go negative.
        assert_eq!(coefficient_consistency(&[0.0, 0.0, 0.0, 10.0]).unwrap(), 0.0);
    }
}
