//! Numeric helpers shared by the decode and filter stages.

/// Logistic function evaluated without overflow for large `|x|`.
#[inline]
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x > 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (e + 1.0)
    }
}

/// Index of the largest value; the first occurrence wins on ties.
///
/// NaN values are never selected over a finite value. Returns `None` for an
/// empty slice.
pub(crate) fn argmax_first(values: &[f32]) -> Option<usize> {
    let mut iter = values.iter().enumerate();
    let (mut best_idx, mut best) = iter.next().map(|(idx, &v)| (idx, v))?;
    for (idx, &value) in iter {
        if value > best || (best.is_nan() && !value.is_nan()) {
            best = value;
            best_idx = idx;
        }
    }
    Some(best_idx)
}
