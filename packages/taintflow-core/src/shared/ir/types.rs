//! Type model of the analysed program
//!
//! Types are cheap to clone: class names and array element types are
//! reference counted.

use std::fmt;
use std::sync::Arc;

/// Root of the class hierarchy
pub const OBJECT_CLASS: &str = "java.lang.Object";
/// Immutable string class
pub const STRING_CLASS: &str = "java.lang.String";
/// Marker interfaces every array type implements
pub const SERIALIZABLE_CLASS: &str = "java.io.Serializable";
pub const CLONEABLE_CLASS: &str = "java.lang.Cloneable";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Type of the `null` constant
    Null,
    /// Class or interface type
    Ref(Arc<str>),
    /// Array with the given element type
    Array(Arc<Type>),
}

impl Type {
    pub fn class(name: &str) -> Self {
        Type::Ref(Arc::from(name))
    }

    pub fn object() -> Self {
        Self::class(OBJECT_CLASS)
    }

    pub fn string() -> Self {
        Self::class(STRING_CLASS)
    }

    pub fn array_of(element: Type) -> Self {
        Type::Array(Arc::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Boolean
                | Type::Byte
                | Type::Char
                | Type::Short
                | Type::Int
                | Type::Long
                | Type::Float
                | Type::Double
        )
    }

    /// Class, array or null type
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Ref(_) | Type::Array(_) | Type::Null)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Innermost non-array type
    pub fn array_base_type(&self) -> &Type {
        let mut current = self;
        while let Type::Array(elem) = current {
            current = elem;
        }
        current
    }

    pub fn dimensions(&self) -> usize {
        let mut dims = 0;
        let mut current = self;
        while let Type::Array(elem) = current {
            dims += 1;
            current = elem;
        }
        dims
    }

    /// `int[][]` style arrays whose innermost element is primitive
    pub fn is_primitive_array(&self) -> bool {
        self.is_array() && self.array_base_type().is_primitive()
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Ref(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        self.class_name() == Some(STRING_CLASS)
    }

    pub fn is_object(&self) -> bool {
        self.class_name() == Some(OBJECT_CLASS)
    }

    /// Types that every reference type can be stored in
    pub fn is_object_like(&self) -> bool {
        matches!(
            self.class_name(),
            Some(OBJECT_CLASS) | Some(SERIALIZABLE_CLASS) | Some(CLONEABLE_CLASS)
        )
    }

    pub fn is_primitive_or_string(&self) -> bool {
        self.is_primitive() || self.is_string()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Boolean => write!(f, "boolean"),
            Type::Byte => write!(f, "byte"),
            Type::Char => write!(f, "char"),
            Type::Short => write!(f, "short"),
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Null => write!(f, "null_type"),
            Type::Ref(name) => write!(f, "{}", name),
            Type::Array(elem) => write!(f, "{}[]", elem),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_array_helpers() {
        let t = Type::array_of(Type::array_of(Type::Int));
        assert_eq!(t.dimensions(), 2);
        assert_eq!(t.array_base_type(), &Type::Int);
        assert!(t.is_primitive_array());
        assert_eq!(t.to_string(), "int[][]");
        assert!(!Type::array_of(Type::string()).is_primitive_array());
    }

    #[test]
    fn test_classification() {
        assert!(Type::string().is_primitive_or_string());
        assert!(Type::Long.is_primitive());
        assert!(!Type::Void.is_primitive());
        assert!(Type::Null.is_reference());
        assert!(Type::class(SERIALIZABLE_CLASS).is_object_like());
    }
}
