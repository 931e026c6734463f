//! Data-type descriptors.

use std::fmt;

/// A structural type.
///
/// `Any` is a wildcard: it is accepted wherever another type is expected and
/// accepts every other type. `Return` and `Error` are analyzer markers and
/// are never written by users.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    String,
    Bool,
    Nil,
    Any,
    Function {
        params: Vec<DataType>,
        ret: Box<DataType>,
    },
    Builtin,
    Slice(Box<DataType>),
    Reference(Box<DataType>),
    Channel(Box<DataType>),
    /// Type of a `return` statement; marks a terminating statement.
    Return,
    /// Poison type for a binding whose initializer failed analysis.
    Error,
}

impl DataType {
    /// Map a primitive type keyword to its descriptor.
    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "int" => Some(DataType::Int),
            "string" => Some(DataType::String),
            "bool" => Some(DataType::Bool),
            "nil" => Some(DataType::Nil),
            "any" => Some(DataType::Any),
            _ => None,
        }
    }

    /// Whether a value of type `other` may be used where `self` is expected.
    pub fn accepts(&self, other: &DataType) -> bool {
        self.is_wildcard() || other.is_wildcard() || self == other
    }

    /// `any`, or the analyzer's poison type.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, DataType::Any | DataType::Error)
    }

    pub fn slice_of(elem: DataType) -> Self {
        DataType::Slice(Box::new(elem))
    }

    pub fn reference_to(elem: DataType) -> Self {
        DataType::Reference(Box::new(elem))
    }

    pub fn channel_of(elem: DataType) -> Self {
        DataType::Channel(Box::new(elem))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "int"),
            DataType::String => write!(f, "string"),
            DataType::Bool => write!(f, "bool"),
            DataType::Nil => write!(f, "nil"),
            DataType::Any => write!(f, "any"),
            DataType::Function { params, ret } => {
                write!(f, "func(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                if **ret != DataType::Nil {
                    write!(f, " {ret}")?;
                }
                Ok(())
            }
            DataType::Builtin => write!(f, "builtin"),
            DataType::Slice(elem) => write!(f, "[]{elem}"),
            DataType::Reference(elem) => write!(f, "*{elem}"),
            DataType::Channel(elem) => write!(f, "chan {elem}"),
            DataType::Return => write!(f, "return"),
            DataType::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::int(DataType::Int, "int")]
    #[case::slice(DataType::slice_of(DataType::String), "[]string")]
    #[case::reference(DataType::reference_to(DataType::Int), "*int")]
    #[case::channel(DataType::channel_of(DataType::slice_of(DataType::Bool)), "chan []bool")]
    #[case::function(
        DataType::Function { params: vec![DataType::Int, DataType::Any], ret: Box::new(DataType::Bool) },
        "func(int, any) bool"
    )]
    #[case::procedure(
        DataType::Function { params: vec![], ret: Box::new(DataType::Nil) },
        "func()"
    )]
    fn canonical_names(#[case] ty: DataType, #[case] expected: &str) {
        assert_eq!(ty.to_string(), expected);
    }

    #[test]
    fn any_is_accepted_both_ways() {
        assert!(DataType::Any.accepts(&DataType::Int));
        assert!(DataType::Int.accepts(&DataType::Any));
        assert!(DataType::Error.accepts(&DataType::String));
        assert!(!DataType::Int.accepts(&DataType::String));
    }

    #[test]
    fn structural_equality_is_not_name_based() {
        let a = DataType::slice_of(DataType::Int);
        let b = DataType::slice_of(DataType::Int);
        let c = DataType::slice_of(DataType::Any);
        assert!(a.accepts(&b));
        assert_ne!(a, c);
    }
}
