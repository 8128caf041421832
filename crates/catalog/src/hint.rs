//! Declared parameter types.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};

/// The kind of a sequence type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequenceKind {
    List,
    Set,
    Tuple,
}

/// The declared type of a host function parameter.
///
/// This is the input side of schema compilation: it describes what the host
/// function accepts, not what the backend sees. See [`crate::ParamSchema`] for
/// the compiled form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHint {
    Integer,
    Float,
    Complex,
    Boolean,
    String,
    Null,
    /// Nullable wrapper. Contributes no type of its own.
    Optional(Box<TypeHint>),
    Sequence(SequenceKind, Box<TypeHint>),
    Mapping(Box<TypeHint>, Box<TypeHint>),
    /// A host type with no JSON counterpart (e.g. a domain model).
    Other(String),
}

impl TypeHint {
    pub fn optional(inner: TypeHint) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(item: TypeHint) -> Self {
        Self::Sequence(SequenceKind::List, Box::new(item))
    }

    pub fn set(item: TypeHint) -> Self {
        Self::Sequence(SequenceKind::Set, Box::new(item))
    }

    pub fn tuple(item: TypeHint) -> Self {
        Self::Sequence(SequenceKind::Tuple, Box::new(item))
    }

    pub fn mapping(key: TypeHint, value: TypeHint) -> Self {
        Self::Mapping(Box::new(key), Box::new(value))
    }

    pub fn other(name: impl Into<String>) -> Self {
        Self::Other(name.into())
    }

    /// Whether the outermost type is a nullable wrapper.
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Strip any number of nullable wrappers.
    pub fn unwrap_optional(&self) -> &TypeHint {
        match self {
            Self::Optional(inner) => inner.unwrap_optional(),
            other => other,
        }
    }
}

/// Rust types that can describe themselves as a [`TypeHint`].
///
/// Lets tool signatures be declared from the Rust types the tool function
/// actually decodes, e.g. `.param::<Vec<String>>("tags")`.
pub trait ParamType {
    fn type_hint() -> TypeHint;
}

macro_rules! impl_param_type {
    ($hint:expr => $($ty:ty),+ $(,)?) => {
        $(
            impl ParamType for $ty {
                fn type_hint() -> TypeHint {
                    $hint
                }
            }
        )+
    };
}

impl_param_type!(
    TypeHint::Integer => i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize
);
impl_param_type!(TypeHint::Float => f32, f64);
impl_param_type!(TypeHint::Boolean => bool);
impl_param_type!(TypeHint::String => String, str, char);
impl_param_type!(TypeHint::Null => ());
impl_param_type!(TypeHint::other("Value") => serde_json::Value);

impl<T: ParamType + ?Sized> ParamType for &T {
    fn type_hint() -> TypeHint {
        T::type_hint()
    }
}

impl<T: ParamType> ParamType for Option<T> {
    fn type_hint() -> TypeHint {
        TypeHint::optional(T::type_hint())
    }
}

impl<T: ParamType> ParamType for Vec<T> {
    fn type_hint() -> TypeHint {
        TypeHint::list(T::type_hint())
    }
}

impl<T: ParamType> ParamType for VecDeque<T> {
    fn type_hint() -> TypeHint {
        TypeHint::list(T::type_hint())
    }
}

impl<T: ParamType> ParamType for [T] {
    fn type_hint() -> TypeHint {
        TypeHint::list(T::type_hint())
    }
}

impl<T: ParamType, const N: usize> ParamType for [T; N] {
    fn type_hint() -> TypeHint {
        TypeHint::tuple(T::type_hint())
    }
}

impl<T: ParamType, S> ParamType for HashSet<T, S> {
    fn type_hint() -> TypeHint {
        TypeHint::set(T::type_hint())
    }
}

impl<T: ParamType> ParamType for BTreeSet<T> {
    fn type_hint() -> TypeHint {
        TypeHint::set(T::type_hint())
    }
}

impl<K: ParamType, V: ParamType, S> ParamType for HashMap<K, V, S> {
    fn type_hint() -> TypeHint {
        TypeHint::mapping(K::type_hint(), V::type_hint())
    }
}

impl<K: ParamType, V: ParamType> ParamType for BTreeMap<K, V> {
    fn type_hint() -> TypeHint {
        TypeHint::mapping(K::type_hint(), V::type_hint())
    }
}
