use ndarray::Array1;

/// Added to denominators and radicands to keep them away from zero.
pub const SMALL_CONSTANT: f64 = 1e-16;

pub fn safe_divide(numerator: f64, denominator: f64) -> f64 {
    safe_divide_with(numerator, denominator, SMALL_CONSTANT)
}

pub fn safe_divide_with(numerator: f64, denominator: f64, small_constant: f64) -> f64 {
    numerator / (denominator + small_constant)
}

pub fn safe_sqrt(x: f64) -> f64 {
    safe_sqrt_with(x, SMALL_CONSTANT)
}

pub fn safe_sqrt_with(x: f64, small_constant: f64) -> f64 {
    (x + small_constant).sqrt()
}

/// Element-wise `safe_divide`.
pub fn safe_divide_arr(numerator: &Array1<f64>, denominator: &Array1<f64>) -> Array1<f64> {
    let mut res = numerator.clone();
    res.zip_mut_with(denominator, |n, &d| *n = safe_divide(*n, d));
    res
}

/// Element-wise `safe_sqrt`.
pub fn safe_sqrt_arr(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(safe_sqrt)
}

/// Kinetic energy `0.5 * v.v` of a set of momenta, summed over all parameters.
pub fn kinetic_energy<'a, I>(momenta: I) -> f64
where
    I: IntoIterator<Item = &'a Array1<f64>>,
{
    0.5 * momenta.into_iter().map(|v| v.dot(v)).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;
    use proptest::prelude::*;

    #[test]
    fn test_safe_divide() {
        assert_eq!(safe_divide(3., 0.), 3. / 1e-16);
        assert!(safe_divide(-2.5, 0.).is_finite());
        assert_abs_diff_eq!(safe_divide(1., 4.), 0.25, epsilon = 1e-15);
        assert_eq!(safe_divide_with(1., 0., 0.5), 2.);
    }

    #[test]
    fn test_safe_sqrt() {
        assert_abs_diff_eq!(safe_sqrt(0.), 1e-8, epsilon = 1e-20);
        assert_eq!(safe_sqrt(-1e-16), 0.);
        assert_abs_diff_eq!(safe_sqrt(4.), 2., epsilon = 1e-15);
        assert_eq!(safe_sqrt_with(3., 1.), 2.);
    }

    #[test]
    fn test_array_variants() {
        let res = safe_divide_arr(&arr1(&[1., 2., 3.]), &arr1(&[2., 0., 3.]));
        assert_abs_diff_eq!(res[0], 0.5, epsilon = 1e-15);
        assert_eq!(res[1], 2. / 1e-16);
        assert_abs_diff_eq!(res[2], 1., epsilon = 1e-15);
        let roots = safe_sqrt_arr(&arr1(&[0., 9.]));
        assert_abs_diff_eq!(roots[0], 1e-8, epsilon = 1e-20);
        assert_abs_diff_eq!(roots[1], 3., epsilon = 1e-15);
    }

    #[test]
    fn test_kinetic_energy() {
        let momenta = vec![arr1(&[1., 2.]), arr1(&[3.])];
        assert_abs_diff_eq!(kinetic_energy(&momenta), 7., epsilon = 1e-15);
        assert_eq!(kinetic_energy(&Vec::<Array1<f64>>::new()), 0.);
    }

    proptest! {
        #[test]
        fn prop_safe_divide_by_zero_is_finite(a in -1e100f64..1e100) {
            let res = safe_divide(a, 0.);
            prop_assert!(res.is_finite());
            prop_assert_eq!(res, a / 1e-16);
        }

        #[test]
        fn prop_safe_sqrt_is_finite_and_non_negative(x in -1e-16f64..1e300) {
            let res = safe_sqrt(x);
            prop_assert!(res.is_finite());
            prop_assert!(res >= 0.);
        }
    }
}
