//! Root values of expressions and base matching against taints

use crate::features::abstraction::Abstraction;
use crate::shared::ir::Value;

/// Value whose taint state an expression reads or writes.
///
/// Casts and unary operators are looked through; array elements collapse to
/// the array unless `keep_array_ref` is set.
pub fn select_base(val: &Value, keep_array_ref: bool) -> Value {
    match val {
        Value::ArrayRef { base, .. } if !keep_array_ref => Value::Local(base.clone()),
        Value::Cast { op, .. } | Value::Length(op) | Value::Negate(op) => {
            select_base(op, keep_array_ref)
        }
        _ => val.clone(),
    }
}

/// Like [`select_base`], but binary expressions yield both operands
pub fn select_base_list(val: &Value, keep_array_ref: bool) -> Vec<Value> {
    match val {
        Value::Binary { lhs, rhs, .. } => vec![
            select_base(lhs, keep_array_ref),
            select_base(rhs, keep_array_ref),
        ],
        _ => vec![select_base(val, keep_array_ref)],
    }
}

/// `base` denotes the root object of the taint `source`
pub fn base_matches(base: &Value, source: &Abstraction) -> bool {
    let ap = source.access_path();
    match base {
        Value::Local(l) => ap.plain_value() == Some(l),
        Value::InstanceField { base, field } => {
            ap.plain_value() == Some(base) && ap.first_field_matches(field)
        }
        Value::StaticField(field) => ap.first_field_matches(field),
        _ => false,
    }
}

/// `base` denotes exactly the tainted location, not just a prefix of it
pub fn base_matches_strict(base: &Value, source: &Abstraction) -> bool {
    if !base_matches(base, source) {
        return false;
    }
    let ap = source.access_path();
    match base {
        Value::Local(_) => ap.is_local(),
        Value::InstanceField { .. } | Value::StaticField(_) => ap.fragment_count() == 1,
        _ => false,
    }
}
