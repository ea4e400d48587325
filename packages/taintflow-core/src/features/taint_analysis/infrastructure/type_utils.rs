//! Type compatibility checks used by the flow functions
//!
//! Every check passes trivially when type checking is disabled.

use crate::features::access_path::ApRef;
use crate::shared::ir::{ClassHierarchy, Type};
use std::sync::Arc;

/// Arrays nested deeper than this are not built by the alias search
const MAX_ARRAY_DIMENSIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct TypeUtils {
    hierarchy: Arc<ClassHierarchy>,
    type_checking: bool,
}

impl TypeUtils {
    pub fn new(hierarchy: Arc<ClassHierarchy>, type_checking: bool) -> Self {
        Self {
            hierarchy,
            type_checking,
        }
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn is_type_checking(&self) -> bool {
        self.type_checking
    }

    /// A value of type `source` can be cast to `dest`; unknown sources always can
    pub fn check_cast(&self, dest: &Type, source: Option<&Type>) -> bool {
        if !self.type_checking {
            return true;
        }
        match source {
            None => true,
            Some(source) => self.hierarchy.check_cast(dest, source),
        }
    }

    /// The object denoted by `ap` can be cast to `ty`
    pub fn check_cast_ap(&self, ap: &ApRef, ty: &Type) -> bool {
        if !self.type_checking {
            return true;
        }
        let field_start = if ap.is_static_field_ref() {
            if !self.check_cast(ty, ap.first_field_type()) {
                return false;
            }
            // A primitive array has no fields to continue with
            if ty.is_primitive_array() && ap.fragment_count() > 1 {
                return false;
            }
            1
        } else {
            if !self.check_cast(ty, ap.base_type()) {
                return false;
            }
            if ty.is_primitive_array() && !ap.is_local() {
                return false;
            }
            0
        };
        match ap.fragments().get(field_start) {
            Some(fragment) => self.check_cast(ty, Some(&fragment.field().declaring_type())),
            None => true,
        }
    }

    /// The base of `ap` may be the receiver of a method declared in `dest_class`
    pub fn has_compatible_types_for_call(&self, ap: &ApRef, dest_class: &str) -> bool {
        if !self.type_checking {
            return true;
        }
        match ap.base_type() {
            Some(bt) if bt.is_primitive() => false,
            Some(bt) if bt.is_array() => Type::class(dest_class).is_object(),
            _ => self.check_cast_ap(ap, &Type::class(dest_class)),
        }
    }

    pub fn more_precise_type(&self, a: &Type, b: &Type) -> Option<Type> {
        self.hierarchy.more_precise_type(a, b)
    }

    /// Array type holding values of `ty`; `None` past the dimension limit
    pub fn build_array_or_add_dimension(ty: &Type, array_type: &Type) -> Option<Type> {
        if !ty.is_array() {
            return Some(array_type.clone());
        }
        if ty.dimensions() >= MAX_ARRAY_DIMENSIONS {
            return None;
        }
        Some(Type::array_of(ty.clone()))
    }
}
