use std::fmt;

use crate::token::TokenKind;

/// The closed set of base types the language knows about.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BaseType {
    Int,
    Bool,
    Char,
    /// No value.
    Nore,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}

impl BaseType {
    pub fn from_keyword(kind: TokenKind) -> Option<BaseType> {
        let base = match kind {
            TokenKind::Int => BaseType::Int,
            TokenKind::Bool => BaseType::Bool,
            TokenKind::Char => BaseType::Char,
            TokenKind::Nore => BaseType::Nore,
            TokenKind::I8 => BaseType::I8,
            TokenKind::I16 => BaseType::I16,
            TokenKind::I32 => BaseType::I32,
            TokenKind::I64 => BaseType::I64,
            TokenKind::U8 => BaseType::U8,
            TokenKind::U16 => BaseType::U16,
            TokenKind::U32 => BaseType::U32,
            TokenKind::U64 => BaseType::U64,
            _ => return None,
        };
        Some(base)
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseType::Int => "int",
            BaseType::Bool => "bool",
            BaseType::Char => "char",
            BaseType::Nore => "nore",
            BaseType::I8 => "i8",
            BaseType::I16 => "i16",
            BaseType::I32 => "i32",
            BaseType::I64 => "i64",
            BaseType::U8 => "u8",
            BaseType::U16 => "u16",
            BaseType::U32 => "u32",
            BaseType::U64 => "u64",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Type {
    pub base: BaseType,
    pub is_pointer: bool,
    pub is_array: bool,
}

impl Type {
    pub const INT: Type = Type::scalar(BaseType::Int);
    pub const BOOL: Type = Type::scalar(BaseType::Bool);
    pub const CHAR: Type = Type::scalar(BaseType::Char);
    pub const NORE: Type = Type::scalar(BaseType::Nore);
    pub const STRING: Type = Type::scalar(BaseType::Char).pointer();

    pub const fn scalar(base: BaseType) -> Type {
        Type {
            base,
            is_pointer: false,
            is_array: false,
        }
    }

    pub const fn pointer(self) -> Type {
        Type {
            is_pointer: true,
            ..self
        }
    }

    pub const fn array(self) -> Type {
        Type {
            is_array: true,
            ..self
        }
    }

    /// The type of an element of this pointer or array.
    pub const fn element(self) -> Type {
        Type::scalar(self.base)
    }

    pub fn is_scalar(self) -> bool {
        !self.is_pointer && !self.is_array
    }

    pub fn is_nore(self) -> bool {
        self == Type::NORE
    }

    pub fn is_indexable(self) -> bool {
        self.is_pointer || self.is_array
    }

    /// Whether this is a string-like type (`char*` or `char[]`).
    pub fn is_string(self) -> bool {
        self.base == BaseType::Char && self.is_indexable()
    }

    /// Whether a value of type `self` may be used where `to` is expected.
    pub fn is_compatible_with(self, to: Type) -> bool {
        if self == to {
            return true;
        }
        match (self, to) {
            (Type::INT, Type::CHAR) | (Type::CHAR, Type::INT) => true,
            (Type::INT, to) => to.is_scalar() && matches!(to.base, BaseType::I64 | BaseType::U64),
            _ => false,
        }
    }

    /// Compatibility in at least one direction.
    pub fn is_mutually_compatible(self, other: Type) -> bool {
        self.is_compatible_with(other) || other.is_compatible_with(self)
    }

    /// Whether an argument of type `self` is accepted by a parameter of type
    /// `param`. Arrays decay into pointers of the same base type, but only
    /// at call boundaries.
    pub fn is_passable_to(self, param: Type) -> bool {
        self.is_compatible_with(param)
            || (self.is_array && param.is_pointer && self.base == param.base)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.name())?;
        if self.is_pointer {
            f.write_str("*")?;
        }
        if self.is_array {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// Names the compiler itself knows about.
pub mod well_known {
    pub const MAIN: &str = "main";

    /// `out@io(x)`, the built-in print routine.
    pub const PRINT_MODULE: &str = "io";
    pub const PRINT_FUNCTION: &str = "out";
    pub const PRINT: &str = "io__out";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatibility() {
        let i64 = Type::scalar(BaseType::I64);
        let u64 = Type::scalar(BaseType::U64);
        let i32 = Type::scalar(BaseType::I32);

        assert!(Type::INT.is_compatible_with(Type::INT));
        assert!(Type::INT.is_compatible_with(i64));
        assert!(Type::INT.is_compatible_with(u64));
        assert!(!i64.is_compatible_with(Type::INT));
        assert!(!Type::INT.is_compatible_with(i32));
        assert!(Type::INT.is_compatible_with(Type::CHAR));
        assert!(Type::CHAR.is_compatible_with(Type::INT));
        assert!(!Type::BOOL.is_compatible_with(Type::INT));
        assert!(!Type::INT.is_compatible_with(Type::INT.pointer()));
        assert!(!Type::INT.is_compatible_with(Type::CHAR.pointer()));
        assert!(!Type::INT.is_compatible_with(i64.pointer()));
        assert!(!Type::INT.is_compatible_with(u64.array()));

        assert!(i64.is_mutually_compatible(Type::INT));
        assert!(!i32.is_mutually_compatible(Type::INT));
    }

    #[test]
    fn array_decay_only_at_call_boundary() {
        let char_array = Type::CHAR.array();
        let char_pointer = Type::CHAR.pointer();
        let int_pointer = Type::INT.pointer();

        assert!(char_array.is_passable_to(char_pointer));
        assert!(!char_array.is_passable_to(int_pointer));
        assert!(!char_array.is_compatible_with(char_pointer));
        assert!(!char_pointer.is_passable_to(char_array));
    }

    #[test]
    fn display() {
        assert_eq!(Type::INT.to_string(), "int");
        assert_eq!(Type::STRING.to_string(), "char*");
        assert_eq!(Type::CHAR.array().to_string(), "char[]");
        assert_eq!(Type::INT.pointer().element(), Type::INT);
    }
}
