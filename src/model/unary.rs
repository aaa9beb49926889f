//! Unary (thermometer) encoding of bounded integers.
//!
//! A value `v` with bound `n` becomes `n` bits whose first `v` are set. Bit `k` may only
//! be set when bit `k - 1` is, so every valid bit string decodes to exactly one value.

/// Encodes `value` in `width` bits, or `None` if it does not fit
pub fn expand(value: u32, width: u32) -> Option<Vec<bool>> {
    if value > width {
        return None;
    }
    Some((0..width).map(|k| k < value).collect())
}

/// Decodes a bit string, or `None` if a set bit follows an unset one
pub fn collapse(bits: &[bool]) -> Option<u32> {
    match first_disorder(bits) {
        Some(_) => None,
        None => Some(bits.iter().filter(|&&b| b).count() as u32),
    }
}

/// The position of the first set bit that follows an unset one
pub fn first_disorder(bits: &[bool]) -> Option<usize> {
    bits.windows(2).position(|w| !w[0] && w[1]).map(|k| k + 1)
}
