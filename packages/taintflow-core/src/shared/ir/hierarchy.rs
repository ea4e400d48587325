//! Class hierarchy and assignment compatibility
//!
//! Unknown classes are treated as direct subclasses of `java.lang.Object`.

use super::types::{Type, OBJECT_CLASS};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub super_class: Option<Arc<str>>,
    pub interfaces: Vec<Arc<str>>,
    pub is_interface: bool,
    /// Library classes can be excluded from analysis
    pub is_library: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    classes: FxHashMap<Arc<str>, ClassInfo>,
    /// Direct subtypes (subclasses and implementors)
    children: FxHashMap<Arc<str>, Vec<Arc<str>>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_class(&mut self, name: &str, info: ClassInfo) {
        let name: Arc<str> = Arc::from(name);
        if let Some(sup) = &info.super_class {
            self.children.entry(sup.clone()).or_default().push(name.clone());
        }
        for iface in &info.interfaces {
            self.children
                .entry(iface.clone())
                .or_default()
                .push(name.clone());
        }
        self.classes.insert(name, info);
    }

    pub fn class(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn is_library_class(&self, name: &str) -> bool {
        self.classes.get(name).map(|c| c.is_library).unwrap_or(false)
    }

    pub fn super_class_of(&self, name: &str) -> Option<&Arc<str>> {
        self.classes.get(name).and_then(|c| c.super_class.as_ref())
    }

    /// True if `child` is `parent` or transitively extends/implements it
    pub fn is_subtype(&self, child: &str, parent: &str) -> bool {
        if child == parent || parent == OBJECT_CLASS {
            return true;
        }
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut stack: Vec<&str> = vec![child];
        while let Some(current) = stack.pop() {
            if current == parent {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(info) = self.classes.get(current) {
                if let Some(sup) = &info.super_class {
                    stack.push(sup);
                }
                stack.extend(info.interfaces.iter().map(|i| i.as_ref()));
            }
        }
        false
    }

    /// All transitive subtypes of `name`, including itself
    pub fn subtypes_of(&self, name: &str) -> Vec<Arc<str>> {
        let mut result = vec![Arc::from(name)];
        let mut seen: FxHashSet<Arc<str>> = result.iter().cloned().collect();
        let mut idx = 0;
        while idx < result.len() {
            if let Some(children) = self.children.get(result[idx].as_ref()) {
                for c in children {
                    if seen.insert(c.clone()) {
                        result.push(c.clone());
                    }
                }
            }
            idx += 1;
        }
        result
    }

    /// Whether a value of type `child` may be stored in a variable of type `parent`
    pub fn can_store_type(&self, child: &Type, parent: &Type) -> bool {
        if child == parent {
            return true;
        }
        match (child, parent) {
            (Type::Null, p) => p.is_reference(),
            (c, p) if c.is_reference() && p.is_object() => true,
            (Type::Ref(c), Type::Ref(p)) => self.is_subtype(c, p),
            (Type::Array(c), Type::Array(p)) => {
                if c.is_primitive() || p.is_primitive() {
                    c == p
                } else {
                    self.can_store_type(c, p)
                }
            }
            (Type::Array(_), p) => p.is_object_like(),
            _ => false,
        }
    }

    /// Picks the more specific of two types, `None` if they are incompatible
    pub fn more_precise_type(&self, a: &Type, b: &Type) -> Option<Type> {
        if a == b {
            return Some(a.clone());
        }
        if a.is_object_like() && b.is_reference() {
            return Some(b.clone());
        }
        if b.is_object_like() && a.is_reference() {
            return Some(a.clone());
        }
        if a.is_primitive() && b.is_primitive() {
            return None;
        }
        if self.can_store_type(b, a) {
            return Some(b.clone());
        }
        if self.can_store_type(a, b) {
            return Some(a.clone());
        }
        match (a, b) {
            (Type::Array(ea), Type::Array(eb)) => {
                self.more_precise_type(ea, eb).map(Type::array_of)
            }
            // An array and its element type are accepted, keeping the array
            (Type::Array(ea), other) if self.more_precise_type(ea, other).is_some() => {
                Some(a.clone())
            }
            (other, Type::Array(eb)) if self.more_precise_type(other, eb).is_some() => {
                Some(b.clone())
            }
            _ => None,
        }
    }

    /// A cast between two types is feasible if either can hold the other
    pub fn check_cast(&self, dest: &Type, source: &Type) -> bool {
        if dest == source {
            return true;
        }
        if dest.is_primitive() && source.is_primitive() {
            return true;
        }
        self.can_store_type(dest, source) || self.can_store_type(source, dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> ClassHierarchy {
        let mut h = ClassHierarchy::new();
        h.add_class(
            "Animal",
            ClassInfo {
                super_class: Some(Arc::from(OBJECT_CLASS)),
                ..Default::default()
            },
        );
        h.add_class(
            "Dog",
            ClassInfo {
                super_class: Some(Arc::from("Animal")),
                ..Default::default()
            },
        );
        h.add_class(
            "Car",
            ClassInfo {
                super_class: Some(Arc::from(OBJECT_CLASS)),
                ..Default::default()
            },
        );
        h
    }

    #[test]
    fn test_can_store_type() {
        let h = hierarchy();
        assert!(h.can_store_type(&Type::class("Dog"), &Type::class("Animal")));
        assert!(!h.can_store_type(&Type::class("Animal"), &Type::class("Dog")));
        assert!(h.can_store_type(&Type::Null, &Type::class("Dog")));
        assert!(h.can_store_type(&Type::array_of(Type::class("Dog")), &Type::object()));
        assert!(!h.can_store_type(&Type::Int, &Type::object()));
    }

    #[test]
    fn test_more_precise_type() {
        let h = hierarchy();
        assert_eq!(
            h.more_precise_type(&Type::class("Animal"), &Type::class("Dog")),
            Some(Type::class("Dog"))
        );
        assert_eq!(
            h.more_precise_type(&Type::object(), &Type::class("Car")),
            Some(Type::class("Car"))
        );
        assert_eq!(h.more_precise_type(&Type::class("Car"), &Type::class("Dog")), None);
        assert_eq!(h.more_precise_type(&Type::Int, &Type::Long), None);
    }

    #[test]
    fn test_subtypes_and_casts() {
        let h = hierarchy();
        let subs = h.subtypes_of("Animal");
        assert!(subs.iter().any(|s| s.as_ref() == "Dog"));
        assert!(h.check_cast(&Type::class("Dog"), &Type::class("Animal")));
        assert!(!h.check_cast(&Type::class("Car"), &Type::class("Dog")));
    }
}
