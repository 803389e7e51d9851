//! Scalar special functions used by the window library.

/// Modified Bessel function of the first kind, order zero.
///
/// Polynomial approximation from Abramowitz & Stegun 9.8.1/9.8.2, accurate to
/// roughly 1e-7 relative error over the real line. This is the kernel the
/// Kaiser window evaluates per sample, so it stays branch-light.
pub fn bessel_i0(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 3.75 {
        let mut y = x / 3.75;
        y *= y;
        1.0 + y
            * (3.5156229
                + y * (3.0899424
                    + y * (1.2067492 + y * (0.2659732 + y * (0.0360768 + y * 0.0045813)))))
    } else {
        let y = 3.75 / ax;
        (ax.exp() / ax.sqrt())
            * (0.39894228
                + y * (0.01328592
                    + y * (0.00225319
                        + y * (-0.00157565
                            + y * (0.00916281
                                + y * (-0.02057706
                                    + y * (0.02635537
                                        + y * (-0.01647633 + y * 0.00392377))))))))
    }
}
