use crate::bits::BitSize;
use crate::buffer::LIST_LENGTH_SIZE;
use crate::error::{CodecError, Result};
use crate::layout::{layout_of, static_size_of, Layout, TypeDesc};

/// A value with a Compost wire representation.
///
/// Implemented for primitives, `char`, `String`, `Vec<T>` and `()`; records
/// and enums get an implementation from [`compost_struct!`](crate::compost_struct)
/// and [`compost_enum!`](crate::compost_enum).
pub trait Compost: Sized + Send + Sync + 'static {
    fn describe() -> TypeDesc;

    /// Advance `cursor` over this value exactly as [`Compost::serialize`] would.
    fn measure(&self, cursor: &mut BitSize);

    fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()>;

    fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self>;

    /// Encoded size of this value from a byte-aligned start.
    fn instance_size(&self) -> BitSize {
        let mut cursor = BitSize::ZERO;
        self.measure(&mut cursor);
        cursor
    }
}

fn write_natural(buf: &mut [u8], cursor: &mut BitSize, bytes: &[u8]) -> Result<()> {
    let start = cursor.bytes();
    let end = start + bytes.len();
    let available = buf.len();
    let dst = buf.get_mut(start..end).ok_or(CodecError::BufferOverrun {
        needed: end,
        available,
    })?;
    dst.copy_from_slice(bytes);
    *cursor = BitSize::from_bytes(end);
    Ok(())
}

fn read_natural<const N: usize>(buf: &[u8], cursor: &mut BitSize) -> Result<[u8; N]> {
    let start = cursor.bytes();
    let end = start + N;
    let src = buf.get(start..end).ok_or(CodecError::BufferOverrun {
        needed: end,
        available: buf.len(),
    })?;
    let mut out = [0u8; N];
    out.copy_from_slice(src);
    *cursor = BitSize::from_bytes(end);
    Ok(out)
}

fn advance_natural(cursor: &mut BitSize, bytes: usize) {
    *cursor = cursor.align_to_bytes() + BitSize::from_bytes(bytes);
}

fn length_prefix(length: usize) -> Result<u16> {
    u16::try_from(length).map_err(|_| CodecError::ListTooLong { length })
}

macro_rules! impl_number {
    ($($ty:ty),* $(,)?) => {$(
        impl Compost for $ty {
            fn describe() -> TypeDesc {
                TypeDesc::Primitive {
                    name: stringify!($ty),
                    size: BitSize::from_bytes(std::mem::size_of::<$ty>()),
                }
            }

            fn measure(&self, cursor: &mut BitSize) {
                advance_natural(cursor, std::mem::size_of::<$ty>());
            }

            fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
                write_natural(buf, cursor, &self.to_le_bytes())
            }

            fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
                Ok(<$ty>::from_le_bytes(read_natural(buf, cursor)?))
            }
        }
    )*};
}

impl_number!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Compost for bool {
    fn describe() -> TypeDesc {
        TypeDesc::Primitive {
            name: "bool",
            size: BitSize::BYTE,
        }
    }

    fn measure(&self, cursor: &mut BitSize) {
        advance_natural(cursor, 1);
    }

    fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
        write_natural(buf, cursor, &[u8::from(*self)])
    }

    fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
        let [byte] = read_natural::<1>(buf, cursor)?;
        Ok(byte != 0)
    }
}

/// One byte per character; only U+0000..=U+00FF are representable.
impl Compost for char {
    fn describe() -> TypeDesc {
        TypeDesc::Primitive {
            name: "char",
            size: BitSize::BYTE,
        }
    }

    fn measure(&self, cursor: &mut BitSize) {
        advance_natural(cursor, 1);
    }

    fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
        let byte = u8::try_from(*self).map_err(|_| CodecError::InvalidChar(*self))?;
        write_natural(buf, cursor, &[byte])
    }

    fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
        let [byte] = read_natural::<1>(buf, cursor)?;
        Ok(char::from(byte))
    }
}

impl Compost for () {
    fn describe() -> TypeDesc {
        TypeDesc::Unit
    }

    fn measure(&self, _cursor: &mut BitSize) {}

    fn serialize(&self, _buf: &mut [u8], _cursor: &mut BitSize) -> Result<()> {
        Ok(())
    }

    fn deserialize(_buf: &[u8], _cursor: &mut BitSize) -> Result<Self> {
        Ok(())
    }
}

/// Length prefix counts characters; each character is one byte like [`char`].
impl Compost for String {
    fn describe() -> TypeDesc {
        TypeDesc::Str
    }

    fn measure(&self, cursor: &mut BitSize) {
        advance_natural(cursor, LIST_LENGTH_SIZE.bytes() + self.chars().count());
    }

    fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
        let bytes = self
            .chars()
            .map(|c| u8::try_from(c).map_err(|_| CodecError::InvalidChar(c)))
            .collect::<Result<Vec<u8>>>()?;
        length_prefix(bytes.len())?.serialize(buf, cursor)?;
        write_natural(buf, cursor, &bytes)
    }

    fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
        let len = usize::from(u16::deserialize(buf, cursor)?);
        let start = cursor.bytes();
        let end = start + len;
        let bytes = buf.get(start..end).ok_or(CodecError::BufferOverrun {
            needed: end,
            available: buf.len(),
        })?;
        let text = bytes.iter().copied().map(char::from).collect();
        *cursor = BitSize::from_bytes(end);
        Ok(text)
    }
}

/// Lists carry the byte length of their elements, not the element count.
///
/// Decoding divides that length by the element's static size, so only
/// fixed-layout element types can travel in a list.
impl<T: Compost> Compost for Vec<T> {
    fn describe() -> TypeDesc {
        TypeDesc::List(Box::new(T::describe()))
    }

    fn measure(&self, cursor: &mut BitSize) {
        advance_natural(cursor, LIST_LENGTH_SIZE.bytes());
        for item in self {
            item.measure(cursor);
        }
    }

    fn serialize(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
        let elem = element_size::<T>()?;
        length_prefix(self.len() * elem)?.serialize(buf, cursor)?;
        for item in self {
            item.serialize(buf, cursor)?;
        }
        Ok(())
    }

    fn deserialize(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
        let elem = element_size::<T>()?;
        let count = usize::from(u16::deserialize(buf, cursor)?) / elem;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(T::deserialize(buf, cursor)?);
        }
        Ok(items)
    }
}

fn element_size<T: Compost>() -> Result<usize> {
    if let Layout::Dynamic = layout_of::<T>() {
        return Err(CodecError::UnsupportedType {
            name: T::describe().name(),
        });
    }
    match static_size_of::<T>()?.bytes() {
        0 => Err(CodecError::UnsupportedType {
            name: T::describe().name(),
        }),
        bytes => Ok(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<T: Compost>(value: &T) -> Vec<u8> {
        let mut buf = vec![0u8; value.instance_size().bytes()];
        let mut cursor = BitSize::ZERO;
        value.serialize(&mut buf, &mut cursor).expect("value should encode");
        assert_eq!(cursor, value.instance_size());
        buf
    }

    fn decode<T: Compost>(buf: &[u8]) -> T {
        let mut cursor = BitSize::ZERO;
        T::deserialize(buf, &mut cursor).expect("value should decode")
    }

    #[test]
    fn test_numbers_are_little_endian() {
        assert_eq!(encode(&0x1234u16), [0x34, 0x12]);
        assert_eq!(encode(&0xDEADBEEFu32), [0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(encode(&-2i16), [0xFE, 0xFF]);
        assert_eq!(encode(&1.0f32), 1.0f32.to_le_bytes());
        assert_eq!(decode::<u64>(&[1, 0, 0, 0, 0, 0, 0, 0x80]), 0x8000_0000_0000_0001);
    }

    #[test]
    fn test_natural_values_start_on_byte_boundary() {
        let mut buf = [0u8; 3];
        let mut cursor = BitSize::from_bits(3);
        0xABCDu16.serialize(&mut buf, &mut cursor).unwrap();
        assert_eq!(buf, [0, 0xCD, 0xAB]);
        assert_eq!(cursor, BitSize::from_bytes(3));
    }

    #[test]
    fn test_bool_and_char() {
        assert_eq!(encode(&true), [1]);
        assert!(decode::<bool>(&[7]));
        assert_eq!(encode(&'é'), [0xE9]);
        assert_eq!(decode::<char>(&[0xE9]), 'é');

        let mut buf = [0u8; 1];
        let err = 'ř'.serialize(&mut buf, &mut BitSize::default()).unwrap_err();
        assert!(matches!(err, CodecError::InvalidChar('ř')));
    }

    #[test]
    fn test_string_layout() {
        let text = String::from("hello");
        assert_eq!(text.instance_size(), BitSize::from_bytes(7));
        assert_eq!(encode(&text), [5, 0, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(decode::<String>(&[2, 0, b'o', b'k']), "ok");
    }

    #[test]
    fn test_string_is_one_byte_per_char() {
        let text = String::from("café");
        assert_eq!(text.instance_size(), BitSize::from_bytes(6));
        assert_eq!(encode(&text), [4, 0, b'c', b'a', b'f', 0xE9]);
        assert_eq!(decode::<String>(&[4, 0, b'c', b'a', b'f', 0xE9]), "café");
        assert_eq!(decode::<String>(&[1, 0, 0xFF]), "\u{ff}");

        let mut buf = [0u8; 8];
        let err = String::from("ř")
            .serialize(&mut buf, &mut BitSize::default())
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidChar('ř')));
    }

    #[test]
    fn test_list_prefix_is_byte_length() {
        let list = vec![1u32, 2, 3];
        assert_eq!(list.instance_size(), BitSize::from_bytes(14));
        let buf = encode(&list);
        assert_eq!(&buf[..2], &[12, 0]);
        assert_eq!(decode::<Vec<u32>>(&buf), list);
    }

    #[test]
    fn test_empty_list() {
        let list: Vec<u16> = Vec::new();
        assert_eq!(list.instance_size(), LIST_LENGTH_SIZE);
        assert_eq!(encode(&list), [0, 0]);
        assert!(decode::<Vec<u16>>(&[0, 0]).is_empty());
    }

    #[test]
    fn test_list_of_dynamic_elements_is_unsupported() {
        let list = vec![String::from("a")];
        let mut buf = vec![0u8; 16];
        let err = list.serialize(&mut buf, &mut BitSize::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));

        let err = Vec::<String>::deserialize(&buf, &mut BitSize::default()).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType { .. }));
    }

    #[test]
    fn test_truncated_input_is_an_overrun() {
        let err = u32::deserialize(&[1, 2, 3], &mut BitSize::default()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::BufferOverrun {
                needed: 4,
                available: 3
            }
        ));

        let err = String::deserialize(&[9, 0, b'x'], &mut BitSize::default()).unwrap_err();
        assert!(matches!(err, CodecError::BufferOverrun { .. }));
    }
}
