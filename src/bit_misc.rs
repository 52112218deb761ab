/// All-ones value of `bits` width. `bits` must be in 1..=128.
#[inline]
pub fn mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::max_value()
    } else {
        (1u128 << bits).wrapping_sub(1)
    }
}

/// Interprets the low `bits` of `value` as signed.
#[inline]
pub fn to_signed(value: u128, bits: u32) -> i128 {
    let shift = 128 - bits.min(128);
    ((value << shift) as i128) >> shift
}

#[inline]
pub fn sign_extend(value: u128, from: u32, to: u32) -> u128 {
    (to_signed(value, from) as u128) & mask(to)
}

#[inline]
pub fn msb(value: u128, bits: u32) -> bool {
    (value >> (bits - 1)) & 1 != 0
}
