//! Sub-byte integer packing.
//!
//! Bits are laid out MSB-first across the stream: the first bit of a field
//! lands in the highest free bit of the current byte. A field may start at
//! any bit offset and straddle any number of bytes.

use crate::bits::BitSize;
use crate::error::{CodecError, Result};

const BYTE_BITS: usize = 8;

/// Integer-like values that may be declared as packed fields.
pub trait Packable: Sized {
    /// Whether truncated values are sign-extended on decode.
    const SIGNED: bool;
    const NAME: &'static str;

    /// Two's-complement bit pattern of the value.
    fn to_bits(&self) -> i64;

    fn from_bits(raw: i64) -> Result<Self>;
}

/// Inclusive value range representable in `width` bits.
pub fn packed_range(width: u32, signed: bool) -> (i128, i128) {
    if signed {
        let half = 1i128 << (width - 1);
        (-half, half - 1)
    } else {
        (0, (1i128 << width) - 1)
    }
}

fn check_width(width: u32) -> Result<()> {
    if width == 0 || width > 64 {
        return Err(CodecError::InvalidPackedWidth { width });
    }
    Ok(())
}

fn overflow(rep: i64, width: u32, signed: bool) -> CodecError {
    let (min, max) = packed_range(width, signed);
    let value = if signed {
        i128::from(rep)
    } else {
        i128::from(rep as u64)
    };
    CodecError::PackedOverflow {
        value,
        width,
        min,
        max,
    }
}

/// Re-derive `rep` from its truncated pattern; fails if information was lost.
fn fit(rep: i64, width: u32, signed: bool) -> Result<i64> {
    let mask: i64 = if width == 64 { -1 } else { (1i64 << width) - 1 };
    let negative = signed && (rep >> (width - 1)) & 1 == 1;
    let expanded = if negative { rep | !mask } else { rep & mask };
    if expanded != rep {
        return Err(overflow(rep, width, signed));
    }
    Ok(expanded)
}

fn check_bounds(buf_len: usize, end: BitSize) -> Result<()> {
    if end.bytes() > buf_len {
        return Err(CodecError::BufferOverrun {
            needed: end.bytes(),
            available: buf_len,
        });
    }
    Ok(())
}

/// Write the low `width` bits of `rep` at `cursor` and advance it.
///
/// Destination bits are cleared before writing; neighbouring bits are kept.
pub fn pack_bits(
    buf: &mut [u8],
    cursor: &mut BitSize,
    rep: i64,
    width: u32,
    signed: bool,
) -> Result<()> {
    check_width(width)?;
    let value = fit(rep, width, signed)? as u64;
    let end = *cursor + BitSize::from_bits(width as usize);
    check_bounds(buf.len(), end)?;

    let mut pos = cursor.bits();
    let mut remaining = width as usize;
    while remaining > 0 {
        let to_fill = BYTE_BITS - pos % BYTE_BITS;
        let to_place = remaining.min(to_fill);
        let shift = to_fill - to_place;
        let mask = (1u16 << to_place) - 1;
        let chunk = ((value >> (remaining - to_place)) & u64::from(mask)) as u8;

        let byte = &mut buf[pos / BYTE_BITS];
        *byte &= !((mask << shift) as u8);
        *byte |= chunk << shift;

        pos += to_place;
        remaining -= to_place;
    }
    *cursor = end;
    Ok(())
}

/// Read `width` bits at `cursor`, sign-extending when `signed` and the top bit is set.
pub fn unpack_bits(buf: &[u8], cursor: &mut BitSize, width: u32, signed: bool) -> Result<i64> {
    check_width(width)?;
    let end = *cursor + BitSize::from_bits(width as usize);
    check_bounds(buf.len(), end)?;

    let mut acc = 0u64;
    let mut pos = cursor.bits();
    let mut remaining = width as usize;
    while remaining > 0 {
        let to_fill = BYTE_BITS - pos % BYTE_BITS;
        let to_place = remaining.min(to_fill);
        let shift = to_fill - to_place;
        let mask = (1u16 << to_place) - 1;
        let chunk = u64::from((u16::from(buf[pos / BYTE_BITS]) >> shift) & mask);

        pos += to_place;
        remaining -= to_place;
        acc |= chunk << remaining;
    }
    *cursor = end;

    let mut value = acc as i64;
    if signed && width < 64 && (acc >> (width - 1)) & 1 == 1 {
        value |= !((1i64 << width) - 1);
    }
    Ok(value)
}

/// Pack a typed value into `width` bits.
pub fn pack_field<T: Packable>(
    buf: &mut [u8],
    cursor: &mut BitSize,
    value: &T,
    width: u32,
) -> Result<()> {
    pack_bits(buf, cursor, value.to_bits(), width, T::SIGNED)
}

/// Unpack a typed value from `width` bits.
pub fn unpack_field<T: Packable>(buf: &[u8], cursor: &mut BitSize, width: u32) -> Result<T> {
    let raw = unpack_bits(buf, cursor, width, T::SIGNED)?;
    T::from_bits(raw)
}

macro_rules! impl_packable {
    ($($ty:ty => $signed:expr),* $(,)?) => {$(
        impl Packable for $ty {
            const SIGNED: bool = $signed;
            const NAME: &'static str = stringify!($ty);

            fn to_bits(&self) -> i64 {
                *self as i64
            }

            fn from_bits(raw: i64) -> Result<Self> {
                <$ty>::try_from(raw)
                    .map_err(|_| overflow(raw, <$ty>::BITS, $signed))
            }
        }
    )*};
}

impl_packable! {
    u8 => false,
    i8 => true,
    u16 => false,
    i16 => true,
    u32 => false,
    i32 => true,
    i64 => true,
}

impl Packable for u64 {
    const SIGNED: bool = false;
    const NAME: &'static str = "u64";

    fn to_bits(&self) -> i64 {
        *self as i64
    }

    fn from_bits(raw: i64) -> Result<Self> {
        Ok(raw as u64)
    }
}

impl Packable for bool {
    const SIGNED: bool = false;
    const NAME: &'static str = "bool";

    fn to_bits(&self) -> i64 {
        i64::from(*self)
    }

    fn from_bits(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(overflow(raw, 1, false)),
        }
    }
}
