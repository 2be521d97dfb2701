//! Static layout classification.
//!
//! Every encodable type describes itself as a [`TypeDesc`]. A type is fixed
//! when no string or list is reachable from it outside a packed field; fixed
//! types have a size that does not depend on the value. Results are cached
//! per `TypeId` for the lifetime of the process.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use parking_lot::RwLock;
use tracing::trace;

use crate::bits::BitSize;
use crate::error::{CodecError, Result};
use crate::wire::Compost;

/// Structural description of an encodable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeDesc {
    /// Zero-sized placeholder, used for calls without a return value.
    Unit,
    /// Natural-width scalar.
    Primitive { name: &'static str, size: BitSize },
    /// Enumeration carried as its underlying integer.
    Enum { name: &'static str, size: BitSize },
    Str,
    List(Box<TypeDesc>),
    Record {
        name: &'static str,
        fields: Vec<FieldDesc>,
    },
}

/// One record field, optionally packed into `bits` bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: &'static str,
    pub ty: TypeDesc,
    pub bits: Option<u32>,
}

/// Size classification of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Fixed(BitSize),
    Dynamic,
}

impl Layout {
    pub fn is_fixed(self) -> bool {
        matches!(self, Layout::Fixed(_))
    }
}

impl TypeDesc {
    pub fn name(&self) -> &'static str {
        match self {
            TypeDesc::Unit => "()",
            TypeDesc::Primitive { name, .. }
            | TypeDesc::Enum { name, .. }
            | TypeDesc::Record { name, .. } => name,
            TypeDesc::Str => "String",
            TypeDesc::List(_) => "Vec",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        match self {
            TypeDesc::Str | TypeDesc::List(_) => true,
            TypeDesc::Record { fields, .. } => fields
                .iter()
                .any(|field| field.bits.is_none() && field.ty.is_dynamic()),
            TypeDesc::Unit | TypeDesc::Primitive { .. } | TypeDesc::Enum { .. } => false,
        }
    }

    /// Advance `cursor` over a value of this type, the way the encoder would.
    ///
    /// Natural-width values start on the next byte boundary; packed fields
    /// continue at the current bit.
    pub fn advance(&self, cursor: &mut BitSize) -> Result<()> {
        match self {
            TypeDesc::Unit => {}
            TypeDesc::Primitive { size, .. } | TypeDesc::Enum { size, .. } => {
                *cursor = cursor.align_to_bytes() + *size;
            }
            TypeDesc::Record { fields, .. } => {
                for field in fields {
                    match field.bits {
                        Some(bits) => *cursor += BitSize::from_bits(bits as usize),
                        None => field.ty.advance(cursor)?,
                    }
                }
            }
            TypeDesc::Str | TypeDesc::List(_) => {
                return Err(CodecError::DynamicSize { name: self.name() });
            }
        }
        Ok(())
    }

    /// Classify this description, measuring from a byte-aligned start.
    pub fn layout(&self) -> Layout {
        if self.is_dynamic() {
            return Layout::Dynamic;
        }
        let mut cursor = BitSize::ZERO;
        match self.advance(&mut cursor) {
            Ok(()) => Layout::Fixed(cursor),
            Err(_) => Layout::Dynamic,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::List(inner) => write!(f, "Vec<{inner}>"),
            other => f.write_str(other.name()),
        }
    }
}

fn cache() -> &'static RwLock<HashMap<TypeId, Layout>> {
    static LAYOUTS: OnceLock<RwLock<HashMap<TypeId, Layout>>> = OnceLock::new();
    LAYOUTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Cached layout of `T`.
pub fn layout_of<T: Compost>() -> Layout {
    let id = TypeId::of::<T>();
    if let Some(layout) = cache().read().get(&id) {
        return *layout;
    }
    let desc = T::describe();
    let layout = desc.layout();
    trace!(ty = %desc, ?layout, "classified type");
    *cache().write().entry(id).or_insert(layout)
}

/// Static size of `T`; fails for dynamic types.
pub fn static_size_of<T: Compost>() -> Result<BitSize> {
    match layout_of::<T>() {
        Layout::Fixed(size) => Ok(size),
        Layout::Dynamic => Err(CodecError::DynamicSize {
            name: T::describe().name(),
        }),
    }
}
