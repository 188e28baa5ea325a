// Copyright (C) 2025 Farlink Project
//
// MIT License

//! Bit-packing helpers shared by the SWD and JTAG engines.
//!
//! All wire sequences in this crate are LSB-first: bit `n` of a word or of
//! byte `n / 8` travels on clock cycle `n`.

/// Odd parity - `true` for an odd number of set bits.
#[inline]
pub fn odd_parity<T>(value: T) -> bool
where
    T: Into<u64>,
{
    (value.into().count_ones() % 2) == 1
}

/// Returns bit `index` of an LSB-first byte buffer.
#[inline]
pub fn get_bit(buf: &[u8], index: usize) -> bool {
    buf[index >> 3] & (1 << (index & 7)) != 0
}

/// Sets bit `index` of an LSB-first byte buffer.
#[inline]
pub fn set_bit(buf: &mut [u8], index: usize) {
    buf[index >> 3] |= 1 << (index & 7);
}

/// Number of bytes needed to carry `bits` bits.
#[inline]
pub fn byte_count(bits: usize) -> usize {
    bits.div_ceil(8)
}
