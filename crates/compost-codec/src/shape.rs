use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::bits::BitSize;
use crate::error::Result;
use crate::layout::TypeDesc;
use crate::wire::Compost;

/// An ordered group of values forming one frame payload.
///
/// Implemented for `()` and tuples of up to eight [`Compost`] values.
pub trait Message: Sized + Send + Sync + 'static {
    fn describe_all() -> Vec<TypeDesc>;

    fn measure_all(&self, cursor: &mut BitSize);

    fn serialize_all(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()>;

    fn deserialize_all(buf: &[u8], cursor: &mut BitSize) -> Result<Self>;

    fn instance_size(&self) -> BitSize {
        let mut cursor = BitSize::ZERO;
        self.measure_all(&mut cursor);
        cursor
    }
}

impl Message for () {
    fn describe_all() -> Vec<TypeDesc> {
        Vec::new()
    }

    fn measure_all(&self, _cursor: &mut BitSize) {}

    fn serialize_all(&self, _buf: &mut [u8], _cursor: &mut BitSize) -> Result<()> {
        Ok(())
    }

    fn deserialize_all(_buf: &[u8], _cursor: &mut BitSize) -> Result<Self> {
        Ok(())
    }
}

macro_rules! impl_message {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Compost),+> Message for ($($name,)+) {
            fn describe_all() -> Vec<TypeDesc> {
                vec![$($name::describe()),+]
            }

            fn measure_all(&self, cursor: &mut BitSize) {
                $( self.$idx.measure(cursor); )+
            }

            fn serialize_all(&self, buf: &mut [u8], cursor: &mut BitSize) -> Result<()> {
                $( self.$idx.serialize(buf, cursor)?; )+
                Ok(())
            }

            fn deserialize_all(buf: &[u8], cursor: &mut BitSize) -> Result<Self> {
                Ok(($($name::deserialize(buf, cursor)?,)+))
            }
        }
    };
}

impl_message!(A 0);
impl_message!(A 0, B 1);
impl_message!(A 0, B 1, C 2);
impl_message!(A 0, B 1, C 2, D 3);
impl_message!(A 0, B 1, C 2, D 3, E 4);
impl_message!(A 0, B 1, C 2, D 3, E 4, F 5);
impl_message!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_message!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Memoized description of a message signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    items: Vec<TypeDesc>,
    fixed_size: Option<BitSize>,
}

impl Shape {
    /// Build a shape from item descriptions.
    pub fn new(items: Vec<TypeDesc>) -> Self {
        let fixed_size = if items.iter().any(TypeDesc::is_dynamic) {
            None
        } else {
            let mut cursor = BitSize::ZERO;
            items
                .iter()
                .try_for_each(|item| item.advance(&mut cursor))
                .ok()
                .map(|()| cursor)
        };
        Self { items, fixed_size }
    }

    /// Shape of `M`, computed once per process.
    pub fn of<M: Message>() -> Arc<Shape> {
        static SHAPES: OnceLock<RwLock<HashMap<TypeId, Arc<Shape>>>> = OnceLock::new();
        let shapes = SHAPES.get_or_init(|| RwLock::new(HashMap::new()));

        let id = TypeId::of::<M>();
        if let Some(shape) = shapes.read().get(&id) {
            return Arc::clone(shape);
        }
        let shape = Arc::new(Shape::new(M::describe_all()));
        Arc::clone(shapes.write().entry(id).or_insert(shape))
    }

    pub fn items(&self) -> &[TypeDesc] {
        &self.items
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_size.is_some()
    }

    pub fn fixed_size(&self) -> Option<BitSize> {
        self.fixed_size
    }

    /// Payload size of `message`: the fixed size when known, else its instance size.
    pub fn payload_size<M: Message>(&self, message: &M) -> BitSize {
        self.fixed_size
            .unwrap_or_else(|| message.instance_size())
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        f.write_str(")")
    }
}
