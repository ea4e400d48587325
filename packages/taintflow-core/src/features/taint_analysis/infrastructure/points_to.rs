//! Type-based points-to approximation
//!
//! Two locations may alias when their declared types admit a common
//! object. Coarse, but sound for the strategies that only need a may-alias
//! answer.

use crate::features::taint_analysis::ports::{PointsToOracle, PtsTarget};
use crate::shared::ir::{ClassHierarchy, Type};
use std::sync::Arc;

pub struct TypeBasedPointsTo {
    hierarchy: Arc<ClassHierarchy>,
}

impl TypeBasedPointsTo {
    pub fn new(hierarchy: Arc<ClassHierarchy>) -> Self {
        Self { hierarchy }
    }

    fn target_type(target: &PtsTarget<'_>) -> Type {
        match target {
            PtsTarget::Local(l) => l.ty().clone(),
            PtsTarget::InstanceField(_, f) | PtsTarget::StaticField(f) => f.ty().clone(),
        }
    }

    fn types_overlap(&self, a: &Type, b: &Type) -> bool {
        if !a.is_reference() || !b.is_reference() {
            return false;
        }
        self.hierarchy.check_cast(a, b)
    }
}

impl PointsToOracle for TypeBasedPointsTo {
    fn may_alias(&self, a: PtsTarget<'_>, b: PtsTarget<'_>) -> bool {
        match (a, b) {
            (PtsTarget::Local(x), PtsTarget::Local(y)) if x == y => x.ty().is_reference(),
            (PtsTarget::StaticField(f), PtsTarget::StaticField(g)) if f == g => f.ty().is_reference(),
            (PtsTarget::InstanceField(x, f), PtsTarget::InstanceField(y, g)) => {
                f == g
                    && f.ty().is_reference()
                    && self.may_alias(PtsTarget::Local(x), PtsTarget::Local(y))
            }
            (a, b) => self.types_overlap(&Self::target_type(&a), &Self::target_type(&b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ir::{ClassInfo, Field, Local, LocalId};

    fn oracle() -> TypeBasedPointsTo {
        let mut h = ClassHierarchy::new();
        h.add_class(
            "Box",
            ClassInfo {
                super_class: Some(Arc::from("java.lang.Object")),
                ..Default::default()
            },
        );
        h.add_class(
            "Cup",
            ClassInfo {
                super_class: Some(Arc::from("java.lang.Object")),
                ..Default::default()
            },
        );
        TypeBasedPointsTo::new(Arc::new(h))
    }

    #[test]
    fn test_locals_of_unrelated_types_do_not_alias() {
        let pts = oracle();
        let a = Local::new(LocalId(1), "a", Type::class("Box"));
        let b = Local::new(LocalId(2), "b", Type::class("Box"));
        let c = Local::new(LocalId(3), "c", Type::class("Cup"));
        let o = Local::new(LocalId(4), "o", Type::object());
        assert!(pts.may_alias(PtsTarget::Local(&a), PtsTarget::Local(&b)));
        assert!(!pts.may_alias(PtsTarget::Local(&a), PtsTarget::Local(&c)));
        assert!(pts.may_alias(PtsTarget::Local(&c), PtsTarget::Local(&o)));
    }

    #[test]
    fn test_primitives_never_alias() {
        let pts = oracle();
        let i = Local::new(LocalId(1), "i", Type::Int);
        assert!(!pts.may_alias(PtsTarget::Local(&i), PtsTarget::Local(&i)));
    }

    #[test]
    fn test_field_targets_need_the_same_field() {
        let pts = oracle();
        let a = Local::new(LocalId(1), "a", Type::class("Box"));
        let b = Local::new(LocalId(2), "b", Type::class("Box"));
        let f = Field::instance("Box", "f", Type::object());
        let g = Field::instance("Box", "g", Type::object());
        assert!(pts.may_alias(
            PtsTarget::InstanceField(&a, &f),
            PtsTarget::InstanceField(&b, &f)
        ));
        assert!(!pts.may_alias(
            PtsTarget::InstanceField(&a, &f),
            PtsTarget::InstanceField(&b, &g)
        ));
    }
}
