//! Operator typing rules.
//!
//! The table here is the single source of truth for which operand types an
//! operator takes. The analyzer consults it with wildcard handling layered
//! on top; the evaluator consults it with the concrete types of the values
//! it holds before computing a result.

use crate::ast::{DataType, InfixOp, PrefixOp};

/// Result type of `left op right` for concrete operand types.
pub fn infix_result(left: &DataType, op: InfixOp, right: &DataType) -> Option<DataType> {
    use DataType::{Bool, Int, String};

    match (op, left, right) {
        (InfixOp::Add, Int, Int) => Some(Int),
        (InfixOp::Add, String, String) => Some(String),
        (InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod, Int, Int) => Some(Int),
        (InfixOp::Lt | InfixOp::Gt, Int, Int) => Some(Bool),
        (InfixOp::Eq | InfixOp::NotEq, l, r) if l == r => Some(Bool),
        (InfixOp::And | InfixOp::Or, Bool, Bool) => Some(Bool),
        _ => None,
    }
}

/// Result type of `op operand` for a concrete operand type.
pub fn prefix_result(op: PrefixOp, operand: &DataType) -> Option<DataType> {
    match (op, operand) {
        (PrefixOp::Not, DataType::Bool) => Some(DataType::Bool),
        (PrefixOp::Neg, DataType::Int) => Some(DataType::Int),
        (PrefixOp::FileTest, DataType::String) => Some(DataType::Bool),
        (PrefixOp::Deref, DataType::Reference(elem)) => Some((**elem).clone()),
        (PrefixOp::Ref, ty) => Some(DataType::reference_to(ty.clone())),
        _ => None,
    }
}

/// Result type of `left op right`, treating `any` as a wildcard.
///
/// A wildcard operand takes the type of the other side, so `x + 1` with
/// `x any` is an `int`. With wildcards on both sides the result is the
/// operator's natural result type.
pub fn check_infix(left: &DataType, op: InfixOp, right: &DataType) -> Option<DataType> {
    match (left.is_wildcard(), right.is_wildcard()) {
        (true, true) => Some(wildcard_infix(op)),
        (true, false) => infix_result(right, op, right),
        (false, true) => infix_result(left, op, left),
        (false, false) => infix_result(left, op, right),
    }
}

/// Result type of `op operand`, treating `any` as a wildcard.
pub fn check_prefix(op: PrefixOp, operand: &DataType) -> Option<DataType> {
    if !operand.is_wildcard() {
        return prefix_result(op, operand);
    }
    let ty = match op {
        PrefixOp::Not | PrefixOp::FileTest => DataType::Bool,
        PrefixOp::Neg => DataType::Int,
        PrefixOp::Deref => DataType::Any,
        PrefixOp::Ref => DataType::reference_to(DataType::Any),
    };
    Some(ty)
}

fn wildcard_infix(op: InfixOp) -> DataType {
    match op {
        InfixOp::Add => DataType::Any,
        InfixOp::Sub | InfixOp::Mul | InfixOp::Div | InfixOp::Mod => DataType::Int,
        InfixOp::Lt
        | InfixOp::Gt
        | InfixOp::Eq
        | InfixOp::NotEq
        | InfixOp::And
        | InfixOp::Or => DataType::Bool,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::int_sum(DataType::Int, InfixOp::Add, DataType::Int, Some(DataType::Int))]
    #[case::concat(DataType::String, InfixOp::Add, DataType::String, Some(DataType::String))]
    #[case::mixed_sum(DataType::Int, InfixOp::Add, DataType::String, None)]
    #[case::string_minus(DataType::String, InfixOp::Sub, DataType::String, None)]
    #[case::less(DataType::Int, InfixOp::Lt, DataType::Int, Some(DataType::Bool))]
    #[case::string_less(DataType::String, InfixOp::Lt, DataType::String, None)]
    #[case::eq_slices(
        DataType::slice_of(DataType::Int),
        InfixOp::Eq,
        DataType::slice_of(DataType::Int),
        Some(DataType::Bool)
    )]
    #[case::eq_mixed(DataType::Int, InfixOp::NotEq, DataType::Bool, None)]
    #[case::and(DataType::Bool, InfixOp::And, DataType::Bool, Some(DataType::Bool))]
    #[case::int_or(DataType::Int, InfixOp::Or, DataType::Int, None)]
    fn concrete_infix(
        #[case] left: DataType,
        #[case] op: InfixOp,
        #[case] right: DataType,
        #[case] expected: Option<DataType>,
    ) {
        assert_eq!(infix_result(&left, op, &right), expected);
    }

    #[rstest]
    #[case::any_plus_int(DataType::Any, InfixOp::Add, DataType::Int, Some(DataType::Int))]
    #[case::string_plus_any(DataType::String, InfixOp::Add, DataType::Any, Some(DataType::String))]
    #[case::any_plus_any(DataType::Any, InfixOp::Add, DataType::Any, Some(DataType::Any))]
    #[case::any_less_any(DataType::Any, InfixOp::Lt, DataType::Any, Some(DataType::Bool))]
    #[case::bool_plus_any(DataType::Bool, InfixOp::Add, DataType::Any, None)]
    #[case::poison(DataType::Error, InfixOp::Mul, DataType::Int, Some(DataType::Int))]
    fn wildcard_infix_rules(
        #[case] left: DataType,
        #[case] op: InfixOp,
        #[case] right: DataType,
        #[case] expected: Option<DataType>,
    ) {
        assert_eq!(check_infix(&left, op, &right), expected);
    }

    #[rstest]
    #[case::not(PrefixOp::Not, DataType::Bool, Some(DataType::Bool))]
    #[case::not_int(PrefixOp::Not, DataType::Int, None)]
    #[case::neg(PrefixOp::Neg, DataType::Int, Some(DataType::Int))]
    #[case::neg_string(PrefixOp::Neg, DataType::String, None)]
    #[case::file_test(PrefixOp::FileTest, DataType::String, Some(DataType::Bool))]
    #[case::deref(PrefixOp::Deref, DataType::reference_to(DataType::Int), Some(DataType::Int))]
    #[case::deref_int(PrefixOp::Deref, DataType::Int, None)]
    #[case::reference(PrefixOp::Ref, DataType::Bool, Some(DataType::reference_to(DataType::Bool)))]
    #[case::neg_any(PrefixOp::Neg, DataType::Any, Some(DataType::Int))]
    fn prefix_rules(#[case] op: PrefixOp, #[case] operand: DataType, #[case] expected: Option<DataType>) {
        assert_eq!(check_prefix(op, &operand), expected);
    }
}
