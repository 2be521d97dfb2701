/// Declare a record type with a Compost wire representation.
///
/// Fields are encoded in declaration order. A field marked `#[bits(N)]`
/// is packed into exactly `N` bits at the current bit position; its type
/// must implement [`Packable`](crate::Packable).
///
/// ```
/// use compost_codec::{compost_struct, Compost};
///
/// compost_struct! {
///     #[derive(Debug, Clone, PartialEq)]
///     pub struct Reading {
///         #[bits(4)]
///         pub channel: u8,
///         #[bits(12)]
///         pub raw: i16,
///         pub label: String,
///     }
/// }
///
/// let reading = Reading { channel: 3, raw: -5, label: "t0".into() };
/// assert_eq!(reading.instance_size().bytes(), 6);
/// ```
#[macro_export]
macro_rules! compost_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[doc = $doc:literal])*
                $(#[bits($bits:literal)])?
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[doc = $doc])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Compost for $name {
            fn describe() -> $crate::TypeDesc {
                $crate::TypeDesc::Record {
                    name: stringify!($name),
                    fields: vec![$(
                        $crate::FieldDesc {
                            name: stringify!($field),
                            ty: <$ty as $crate::Compost>::describe(),
                            bits: $crate::compost_struct!(@bits $($bits)?),
                        }
                    ),*],
                }
            }

            #[allow(unused_variables)]
            fn measure(&self, cursor: &mut $crate::BitSize) {
                $( $crate::compost_struct!(@measure self.$field, cursor $(, $bits)?); )*
            }

            #[allow(unused_variables)]
            fn serialize(
                &self,
                buf: &mut [u8],
                cursor: &mut $crate::BitSize,
            ) -> $crate::Result<()> {
                $( $crate::compost_struct!(@ser self.$field, buf, cursor $(, $bits)?)?; )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn deserialize(buf: &[u8], cursor: &mut $crate::BitSize) -> $crate::Result<Self> {
                $( let $field = $crate::compost_struct!(@de $ty, buf, cursor $(, $bits)?)?; )*
                Ok(Self { $($field),* })
            }
        }
    };

    (@bits) => { None };
    (@bits $bits:literal) => { Some($bits) };

    (@measure $value:expr, $cursor:ident) => {
        $crate::Compost::measure(&$value, $cursor)
    };
    (@measure $value:expr, $cursor:ident, $bits:literal) => {
        *$cursor += $crate::BitSize::from_bits($bits)
    };

    (@ser $value:expr, $buf:ident, $cursor:ident) => {
        $crate::Compost::serialize(&$value, $buf, $cursor)
    };
    (@ser $value:expr, $buf:ident, $cursor:ident, $bits:literal) => {
        $crate::packing::pack_field($buf, $cursor, &$value, $bits)
    };

    (@de $ty:ty, $buf:ident, $cursor:ident) => {
        <$ty as $crate::Compost>::deserialize($buf, $cursor)
    };
    (@de $ty:ty, $buf:ident, $cursor:ident, $bits:literal) => {
        $crate::packing::unpack_field::<$ty>($buf, $cursor, $bits)
    };
}

/// Declare an enumeration carried on the wire as its underlying integer.
///
/// The generated type is also [`Packable`](crate::Packable), so it can be
/// used in `#[bits(N)]` record fields.
#[macro_export]
macro_rules! compost_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $(
                $(#[doc = $doc:literal])*
                $variant:ident = $value:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        $vis enum $name {
            $(
                $(#[doc = $doc])*
                $variant = $value,
            )*
        }

        impl $name {
            /// Underlying integer value.
            pub fn to_repr(&self) -> $repr {
                match self {
                    $( Self::$variant => $value, )*
                }
            }

            pub fn from_repr(value: $repr) -> Option<Self> {
                $( if value == $value { return Some(Self::$variant); } )*
                None
            }

            fn invalid(value: i64) -> $crate::CodecError {
                $crate::CodecError::InvalidEnumValue {
                    name: stringify!($name),
                    value,
                }
            }
        }

        impl $crate::Compost for $name {
            fn describe() -> $crate::TypeDesc {
                $crate::TypeDesc::Enum {
                    name: stringify!($name),
                    size: $crate::BitSize::from_bytes(std::mem::size_of::<$repr>()),
                }
            }

            fn measure(&self, cursor: &mut $crate::BitSize) {
                $crate::Compost::measure(&self.to_repr(), cursor)
            }

            fn serialize(
                &self,
                buf: &mut [u8],
                cursor: &mut $crate::BitSize,
            ) -> $crate::Result<()> {
                $crate::Compost::serialize(&self.to_repr(), buf, cursor)
            }

            fn deserialize(buf: &[u8], cursor: &mut $crate::BitSize) -> $crate::Result<Self> {
                let value = <$repr as $crate::Compost>::deserialize(buf, cursor)?;
                Self::from_repr(value).ok_or_else(|| Self::invalid(value as i64))
            }
        }

        impl $crate::Packable for $name {
            const SIGNED: bool = <$repr as $crate::Packable>::SIGNED;
            const NAME: &'static str = stringify!($name);

            fn to_bits(&self) -> i64 {
                $crate::Packable::to_bits(&self.to_repr())
            }

            fn from_bits(raw: i64) -> $crate::Result<Self> {
                let value = <$repr as $crate::Packable>::from_bits(raw)?;
                Self::from_repr(value).ok_or_else(|| Self::invalid(raw))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::{BitSize, CodecError, Compost, Layout};

    compost_enum! {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Status: u8 {
            Ok = 0,
            Warn = 1,
            Fail = 255,
        }
    }

    compost_struct! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct Packed {
            #[bits(3)]
            pub small: u8,
            /// Signed, straddles the first byte boundary.
            #[bits(7)]
            pub signed: i8,
            #[bits(4)]
            pub status: Status,
            pub tail: u16,
        }
    }

    compost_struct! {
        #[derive(Debug, Clone, PartialEq)]
        pub struct BadStatus {
            #[bits(4)]
            pub status: Status,
        }
    }

    fn roundtrip<T: Compost>(value: &T) -> (Vec<u8>, T) {
        let size = value.instance_size();
        let mut buf = vec![0u8; size.bytes()];
        let mut cursor = BitSize::ZERO;
        value.serialize(&mut buf, &mut cursor).expect("record should encode");
        assert_eq!(cursor, size);

        let mut cursor = BitSize::ZERO;
        let decoded = T::deserialize(&buf, &mut cursor).expect("record should decode");
        assert_eq!(cursor, size);
        (buf, decoded)
    }

    #[test]
    fn packed_fields_share_bytes() {
        let value = Packed {
            small: 5,
            signed: -3,
            status: Status::Warn,
            tail: 0x0102,
        };
        // 3 + 7 + 4 = 14 packed bits, then the u16 at byte 2.
        assert_eq!(crate::layout_of::<Packed>(), Layout::Fixed(BitSize::from_bytes(4)));

        let (buf, decoded) = roundtrip(&value);
        // 101 | 1111101 | 0001 | 00
        assert_eq!(buf, [0b1011_1111, 0b0100_0100, 0x02, 0x01]);
        assert_eq!(decoded, value);
    }

    #[test]
    fn enum_round_trips_as_repr() {
        let (buf, decoded) = roundtrip(&Status::Fail);
        assert_eq!(buf, [255]);
        assert_eq!(decoded, Status::Fail);
        assert_eq!(Status::from_repr(1), Some(Status::Warn));
        assert_eq!(Status::from_repr(2), None);
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let err = Status::deserialize(&[7], &mut BitSize::default()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidEnumValue {
                name: "Status",
                value: 7
            }
        ));
    }

    #[test]
    fn packed_enum_overflows_its_width() {
        let ok = BadStatus {
            status: Status::Warn,
        };
        let (_, decoded) = roundtrip(&ok);
        assert_eq!(decoded, ok);

        let fail = BadStatus {
            status: Status::Fail,
        };
        let mut buf = vec![0u8; 1];
        let err = fail.serialize(&mut buf, &mut BitSize::default()).unwrap_err();
        assert!(matches!(err, CodecError::PackedOverflow { width: 4, .. }));
    }
}
