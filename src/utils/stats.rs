//! Statistics used to turn per-read qualities into a family-level confidence.
//!
//! A Phred score is -10·log10(p). Fisher's method sums -2·ln(p) over independent
//! reads; that sum is chi-squared with 2n degrees of freedom, whose survival
//! function is the regularized upper incomplete gamma Q(n, x/2).

use std::f64::consts::LN_10;

use statrs::function::gamma::gamma_ur;

use crate::config::defs::PHRED_OFFSET;

/// ln(10) / 5: multiplying a -10·log10(p) score by this gives -2·ln(p).
pub const PHRED_TO_CHI2: f64 = LN_10 / 5.0;

/// Converts a Phred+33 quality byte into its -2·ln(p) contribution.
#[inline]
pub fn qual_to_chi2(qual: u8) -> f64 {
    f64::from(qual.saturating_sub(PHRED_OFFSET)) * PHRED_TO_CHI2
}

/// Combined p-value for `num_pvalues` independent tests with Fisher statistic `x`.
///
/// Non-positive statistics carry no evidence and yield 1.0.
pub fn igamc_pvalue(num_pvalues: u32, x: f64) -> f64 {
    if num_pvalues == 0 || x.is_nan() || x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    gamma_ur(f64::from(num_pvalues), x / 2.0)
}

/// Phred-scales a p-value, rounding to the nearest integer.
/// Underflowed p-values are floored at the smallest positive double.
pub fn pvalue_to_phred(pvalue: f64) -> u32 {
    let p = pvalue.clamp(f64::MIN_POSITIVE, 1.0);
    (-10.0 * p.log10()).round().max(0.0) as u32
}
