//! Interpolation and grid utilities shared by the photometry types.
//!
//! Throughput curves and SEDs arrive on whatever wavelength sampling their
//! source files used. Everything that multiplies two curves together first
//! moves one of them onto the other's grid with the helpers in this module:
//!
//! - **Grid resampling**: [`resample_zero_fill`] moves a whole curve onto a new grid,
//!   treating the curve as zero outside its tabulated range
//! - **Grid checks**: [`validate_ascending`] and [`uniform_step`]

use thiserror::Error;

/// Errors that can occur during interpolation operations.
#[derive(Error, Debug, PartialEq)]
pub enum InterpError {
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length")]
    MismatchedLengths,
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
    #[error("Target range [{0}, {1}] does not overlap source range [{2}, {3}]")]
    NoOverlap(f64, f64, f64, f64),
}

/// Check that `xs` has at least two samples and is strictly increasing.
pub fn validate_ascending(xs: &[f64]) -> Result<(), InterpError> {
    if xs.len() < 2 {
        return Err(InterpError::InsufficientData);
    }
    if xs.iter().any(|x| !x.is_finite()) || xs.windows(2).any(|w| w[1] <= w[0]) {
        return Err(InterpError::UnsortedData);
    }
    Ok(())
}

/// Linear interpolation by binary search on validated data. `x` must lie inside `xs`.
fn interp_within(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let idx = xs.partition_point(|&probe| probe < x);
    if idx < xs.len() && xs[idx] == x {
        return ys[idx];
    }

    let i1 = idx - 1;
    let i2 = idx;

    let t = (x - xs[i1]) / (xs[i2] - xs[i1]);
    ys[i1] + t * (ys[i2] - ys[i1])
}

/// Resample a tabulated curve onto `new_xs`.
///
/// Samples of `new_xs` outside `[xs[0], xs[n-1]]` are set to zero, matching
/// how a throughput or flux is treated beyond its measured range. A target grid
/// that does not overlap the source range at all is an error, since the result
/// would be identically zero.
pub fn resample_zero_fill(xs: &[f64], ys: &[f64], new_xs: &[f64]) -> Result<Vec<f64>, InterpError> {
    if xs.len() != ys.len() {
        return Err(InterpError::MismatchedLengths);
    }
    validate_ascending(xs)?;
    validate_ascending(new_xs)?;

    let (min_x, max_x) = (xs[0], xs[xs.len() - 1]);
    let (new_min, new_max) = (new_xs[0], new_xs[new_xs.len() - 1]);
    if new_max < min_x || new_min > max_x {
        return Err(InterpError::NoOverlap(new_min, new_max, min_x, max_x));
    }

    Ok(new_xs
        .iter()
        .map(|&x| {
            if x < min_x || x > max_x {
                0.0
            } else {
                interp_within(x, xs, ys)
            }
        })
        .collect())
}

/// Return the step of a uniformly sampled grid, or `None` if the spacing varies
/// by more than `rel_tol` of the first step.
pub fn uniform_step(xs: &[f64], rel_tol: f64) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let step = xs[1] - xs[0];
    if step <= 0.0 {
        return None;
    }
    let uniform = xs
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= rel_tol * step);
    uniform.then_some(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_hits_exact_samples() {
        let xs = vec![1.0, 2.0, 3.0, 4.0];
        let ys = vec![10.0, 20.0, 30.0, 40.0];
        assert_eq!(resample_zero_fill(&xs, &ys, &[2.0, 4.0]).unwrap(), vec![20.0, 40.0]);
    }

    #[test]
    fn test_resample_interpolates_linearly() {
        let xs = vec![1.0, 2.0, 3.0];
        let ys = vec![10.0, 20.0, 30.0];
        assert_eq!(resample_zero_fill(&xs, &ys, &[1.5, 2.5]).unwrap(), vec![15.0, 25.0]);
    }

    #[test]
    fn test_unsorted_data() {
        let xs = vec![2.0, 1.0, 3.0];
        let ys = vec![20.0, 10.0, 30.0];
        assert_eq!(
            resample_zero_fill(&xs, &ys, &[1.5, 2.5]),
            Err(InterpError::UnsortedData)
        );
        assert_eq!(
            resample_zero_fill(&[1.0, 2.0], &[1.0], &[1.5, 1.6]),
            Err(InterpError::MismatchedLengths)
        );
    }

    #[test]
    fn test_resample_zero_fills_outside_range() {
        let xs = vec![10.0, 20.0, 30.0];
        let ys = vec![1.0, 2.0, 3.0];
        let out = resample_zero_fill(&xs, &ys, &[5.0, 10.0, 15.0, 30.0, 35.0]).unwrap();
        assert_eq!(out, vec![0.0, 1.0, 1.5, 3.0, 0.0]);
    }

    #[test]
    fn test_resample_without_overlap_fails() {
        let xs = vec![10.0, 20.0];
        let ys = vec![1.0, 1.0];
        assert!(matches!(
            resample_zero_fill(&xs, &ys, &[30.0, 40.0]),
            Err(InterpError::NoOverlap(..))
        ));
    }

    #[test]
    fn test_uniform_step() {
        assert_eq!(uniform_step(&[1.0, 2.0, 3.0], 1e-9), Some(1.0));
        assert_eq!(uniform_step(&[1.0, 2.0, 4.0], 1e-9), None);
        assert_eq!(uniform_step(&[1.0], 1e-9), None);
    }
}
