use crate::types::{Amount, Bps, BPS_U128};
use crate::{TaiError, Result};

pub fn add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or(TaiError::Overflow("u128 overflow in add"))
}

pub fn sub(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_sub(b).ok_or(TaiError::Overflow("u128 underflow in sub"))
}

pub fn mul(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_mul(b).ok_or(TaiError::Overflow("u128 overflow in mul"))
}

pub fn add_u64(a: u64, b: u64) -> Result<u64> {
    a.checked_add(b).ok_or(TaiError::Overflow("u64 overflow in add"))
}

/// `floor(a * b / denom)`, failing on overflow or a zero denominator.
pub fn mul_div_floor(a: Amount, b: Amount, denom: Amount) -> Result<Amount> {
    if denom == 0 {
        return Err(TaiError::Overflow("division by zero"));
    }
    Ok(mul(a, b)? / denom)
}

/// `ceil(a * b / denom)`.
pub fn mul_div_ceil(a: Amount, b: Amount, denom: Amount) -> Result<Amount> {
    if denom == 0 {
        return Err(TaiError::Overflow("division by zero"));
    }
    let product = mul(a, b)?;
    Ok(product / denom + Amount::from(product % denom != 0))
}

pub fn floor_bps(amount: Amount, bps: Bps) -> Result<Amount> {
    mul_div_floor(amount, bps.as_u128(), BPS_U128)
}

/// Sum of a sequence of amounts, failing on overflow.
pub fn sum<I: IntoIterator<Item = Amount>>(items: I) -> Result<Amount> {
    items.into_iter().try_fold(0, add)
}

/// `current * 10_000 >= previous * (10_000 + min_bps)`: price rose by at least `min_bps`.
pub fn inflation_met(current: Amount, previous: Amount, min_bps: u32) -> Result<bool> {
    let lhs = mul(current, BPS_U128)?;
    let rhs = mul(previous, add(BPS_U128, min_bps as Amount)?)?;
    Ok(lhs >= rhs)
}

/// Relative drop from `prev` to `now` in bps; 0 when the price did not fall.
pub fn drop_bps(now: Amount, prev: Amount) -> Result<Amount> {
    if prev == 0 || now >= prev {
        return Ok(0);
    }
    mul_div_floor(prev - now, BPS_U128, prev)
}

/// Absolute deviation of `sample` from `reference` in bps of the reference.
pub fn deviation_bps(sample: Amount, reference: Amount) -> Result<Amount> {
    if reference == 0 {
        return Ok(if sample == 0 { 0 } else { Amount::MAX });
    }
    mul_div_floor(sample.abs_diff(reference), BPS_U128, reference)
}
