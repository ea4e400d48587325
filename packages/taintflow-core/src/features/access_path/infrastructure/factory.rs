//! Access path factory
//!
//! The only way to build an [`AccessPath`]. Every construction runs the
//! canonicalization pipeline, in order:
//! 1. cut the first field (mapping a path through a field reference)
//! 2. same-field reduction
//! 3. type narrowing against the declared types
//! 4. `this$N` chain reduction
//! 5. recursive-structure folding with base registration
//! 6. truncation to the configured maximum length
//!
//! Results are interned, so structurally equal paths share one allocation.

use super::base_register::{BasePattern, BaseRegister};
use super::reduction::{same_field_reduction, this_chain_reduction};
use crate::config::{AccessPathConfig, InfoflowConfig};
use crate::features::access_path::domain::{AccessPath, AccessPathFragment, ApRef, ArrayTaintType};
use crate::shared::ir::{ClassHierarchy, Local, Type, Value};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::warn;

/// Parameters of a single access path construction
#[derive(Debug, Clone)]
pub struct AccessPathRequest {
    pub value: Option<Value>,
    pub value_type: Option<Type>,
    pub fragments: Vec<AccessPathFragment>,
    pub taint_sub_fields: bool,
    pub cut_first_field: bool,
    pub reduce_bases: bool,
    pub array_taint_type: ArrayTaintType,
    pub can_have_immutable_aliases: bool,
}

impl AccessPathRequest {
    pub fn new(value: Option<Value>) -> Self {
        Self {
            value,
            value_type: None,
            fragments: Vec::new(),
            taint_sub_fields: true,
            cut_first_field: false,
            reduce_bases: true,
            array_taint_type: ArrayTaintType::ContentsAndLength,
            can_have_immutable_aliases: false,
        }
    }

    pub fn of(value: &Value) -> Self {
        Self::new(Some(value.clone()))
    }

    pub fn value_type(mut self, ty: Option<Type>) -> Self {
        self.value_type = ty;
        self
    }

    pub fn fragments(mut self, fragments: Vec<AccessPathFragment>) -> Self {
        self.fragments = fragments;
        self
    }

    pub fn taint_sub_fields(mut self, taint_sub_fields: bool) -> Self {
        self.taint_sub_fields = taint_sub_fields;
        self
    }

    pub fn cut_first_field(mut self, cut: bool) -> Self {
        self.cut_first_field = cut;
        self
    }

    pub fn reduce_bases(mut self, reduce: bool) -> Self {
        self.reduce_bases = reduce;
        self
    }

    pub fn array_taint_type(mut self, array_taint_type: ArrayTaintType) -> Self {
        self.array_taint_type = array_taint_type;
        self
    }

    pub fn can_have_immutable_aliases(mut self, can: bool) -> Self {
        self.can_have_immutable_aliases = can;
        self
    }
}

#[derive(Debug)]
pub struct AccessPathFactory {
    config: AccessPathConfig,
    type_checking: bool,
    hierarchy: Arc<ClassHierarchy>,
    base_register: BaseRegister,
    /// Keyed by path plus cut-off flag, which equality ignores
    interned: DashMap<(AccessPath, bool), ApRef>,
    empty: ApRef,
}

impl AccessPathFactory {
    pub fn new(config: &InfoflowConfig, hierarchy: Arc<ClassHierarchy>) -> Self {
        Self {
            config: config.access_path.clone(),
            type_checking: config.enable_type_checking,
            hierarchy,
            base_register: BaseRegister::new(),
            interned: DashMap::new(),
            empty: Arc::new(AccessPath::empty()),
        }
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &AccessPathConfig {
        &self.config
    }

    /// Path of the zero fact
    pub fn empty(&self) -> ApRef {
        self.empty.clone()
    }

    /// Path rooted at `val` with its declared type
    pub fn create(&self, val: &Value, taint_sub_fields: bool) -> Option<ApRef> {
        self.create_with(AccessPathRequest::of(val).taint_sub_fields(taint_sub_fields))
    }

    /// Path rooted at `val` with an explicit base type and array taint kind
    pub fn create_typed(
        &self,
        val: &Value,
        value_type: Option<Type>,
        taint_sub_fields: bool,
        array_taint_type: ArrayTaintType,
    ) -> Option<ApRef> {
        self.create_with(
            AccessPathRequest::of(val)
                .value_type(value_type)
                .taint_sub_fields(taint_sub_fields)
                .array_taint_type(array_taint_type),
        )
    }

    /// Full canonicalization pipeline; `None` means the path is infeasible
    pub fn create_with(&self, req: AccessPathRequest) -> Option<ApRef> {
        if let Some(v) = &req.value {
            if !v.can_contain_value() {
                warn!("Access paths cannot be rooted in {}", v);
                return None;
            }
        }
        if req.value.is_none() && req.fragments.is_empty() {
            return None;
        }

        let value_type = if self.type_checking { req.value_type } else { None };
        let mut taint_sub_fields = req.taint_sub_fields;

        let (value, mut base_type, mut fragments): (Option<Local>, Option<Type>, Vec<AccessPathFragment>) =
            match &req.value {
                Some(Value::InstanceField { base, field }) => {
                    let mut frags = Vec::with_capacity(req.fragments.len() + 1);
                    frags.push(AccessPathFragment::new(field.clone()));
                    frags.extend(req.fragments.iter().cloned());
                    (Some(base.clone()), Some(base.ty().clone()), frags)
                }
                Some(Value::StaticField(field)) => {
                    let mut frags = Vec::with_capacity(req.fragments.len() + 1);
                    frags.push(AccessPathFragment::new(field.clone()));
                    frags.extend(req.fragments.iter().cloned());
                    (None, None, frags)
                }
                Some(Value::ArrayRef { base, .. }) | Some(Value::Local(base)) => {
                    let ty = value_type.clone().unwrap_or_else(|| base.ty().clone());
                    (Some(base.clone()), Some(ty), req.fragments.clone())
                }
                Some(_) => return None,
                None => (None, value_type.clone(), req.fragments.clone()),
            };
        let is_static_root = value.is_none();

        if self.config.access_path_length == 0 {
            fragments.clear();
        }

        if req.cut_first_field && !fragments.is_empty() {
            fragments.remove(0);
        }

        if self.config.use_same_field_reduction && fragments.len() > 1 {
            fragments = same_field_reduction(fragments);
        }

        if self.type_checking {
            if let Some(v) = &value {
                if base_type.as_ref() != Some(v.ty()) {
                    let narrowed = match &base_type {
                        Some(bt) => self.hierarchy.more_precise_type(bt, v.ty())?,
                        None => v.ty().clone(),
                    };
                    let narrowed = match fragments.first() {
                        Some(first) if !narrowed.is_array() => self
                            .hierarchy
                            .more_precise_type(&narrowed, &first.field().declaring_type())?,
                        _ => narrowed,
                    };
                    base_type = Some(narrowed);
                }
            }
            for i in 0..fragments.len().saturating_sub(1) {
                let cur = fragments[i].ty().clone();
                if cur.is_array() {
                    continue;
                }
                let next_owner = fragments[i + 1].field().declaring_type();
                let narrowed = self.hierarchy.more_precise_type(&cur, &next_owner)?;
                if narrowed != cur {
                    fragments[i] = fragments[i].copy_with_new_type(narrowed);
                }
            }
        }

        // Primitive arrays cannot have fields
        if let Some(v) = &value {
            if let Some(elem) = v.ty().element_type() {
                if !elem.is_reference() && !fragments.is_empty() {
                    return None;
                }
            }
        }

        if self.config.use_this_chain_reduction && req.reduce_bases && !fragments.is_empty() {
            fragments = this_chain_reduction(base_type.as_ref(), fragments);
        }

        let mut recursive_cut_off = false;
        if self.config.use_recursive_access_paths && req.reduce_bases && !fragments.is_empty() {
            recursive_cut_off = self.fold_recursive_chains(
                if is_static_root { 1 } else { 0 },
                base_type.as_ref(),
                &mut fragments,
            );
        }

        let max_len = self.config.access_path_length;
        let cut_off_approximation = if fragments.len() > max_len {
            fragments.truncate(max_len);
            taint_sub_fields = true;
            true
        } else {
            recursive_cut_off
        };

        if let Some(bt) = &base_type {
            if bt.is_primitive() && !fragments.is_empty() {
                warn!("Primitive types cannot have fields: base type {}", bt);
                return None;
            }
        }
        if fragments.len() > 1 {
            if let Some(bad) = fragments[..fragments.len() - 1]
                .iter()
                .find(|f| f.field().ty().is_primitive())
            {
                warn!("Primitive field {} cannot have sub-fields", bad.field());
                return None;
            }
        }
        if value.is_none() && fragments.is_empty() {
            return None;
        }

        Some(self.intern(AccessPath {
            value,
            base_type,
            fragments,
            taint_sub_fields,
            cut_off_approximation,
            array_taint_type: req.array_taint_type,
            can_have_immutable_aliases: req.can_have_immutable_aliases,
        }))
    }

    /// Cuts `f_i..f_j` whenever `f_j` leads back to the type reached before `f_i`
    fn fold_recursive_chains(
        &self,
        start: usize,
        base_type: Option<&Type>,
        fragments: &mut Vec<AccessPathFragment>,
    ) -> bool {
        let mut folded = false;
        let mut ei = start;
        while ei < fragments.len() {
            let ei_type = if ei == 0 {
                base_type.cloned()
            } else {
                Some(fragments[ei - 1].ty().clone())
            };
            if let Some(ei_type) = ei_type.filter(|t| !t.is_object()) {
                let mut ej = ei;
                while ej < fragments.len() {
                    let fj = &fragments[ej];
                    if fj.ty() == &ei_type || fj.field().ty() == &ei_type {
                        self.base_register.register(&ei_type, &fragments[ei..=ej]);
                        fragments.drain(ei..=ej);
                        folded = true;
                    } else {
                        ej += 1;
                    }
                }
            }
            ei += 1;
        }
        folded
    }

    /// Registered recursive patterns for a type
    pub fn bases_for_type(&self, ty: &Type) -> Vec<BasePattern> {
        self.base_register.bases_for(ty)
    }

    pub fn base_register(&self) -> &BaseRegister {
        &self.base_register
    }

    /// Rebases `original` onto `val`, keeping its fields and flags
    pub fn copy_with_new_value(&self, original: &ApRef, val: &Value) -> Option<ApRef> {
        self.copy_with_new_value_full(
            original,
            val,
            original.base_type().cloned(),
            false,
            true,
            original.array_taint_type(),
        )
    }

    pub fn copy_with_new_value_typed(
        &self,
        original: &ApRef,
        val: &Value,
        new_type: Option<Type>,
        cut_first_field: bool,
    ) -> Option<ApRef> {
        self.copy_with_new_value_full(
            original,
            val,
            new_type,
            cut_first_field,
            true,
            original.array_taint_type(),
        )
    }

    /// Returns `original` itself when the copy would not change anything
    pub fn copy_with_new_value_full(
        &self,
        original: &ApRef,
        val: &Value,
        new_type: Option<Type>,
        cut_first_field: bool,
        reduce_bases: bool,
        array_taint_type: ArrayTaintType,
    ) -> Option<ApRef> {
        if let (Some(base), Value::Local(l)) = (original.plain_value(), val) {
            if base == l
                && original.base_type() == new_type.as_ref()
                && original.array_taint_type() == array_taint_type
                && !cut_first_field
            {
                return Some(original.clone());
            }
        }

        let new_ap = self.create_with(
            AccessPathRequest::of(val)
                .value_type(new_type)
                .fragments(original.fragments().to_vec())
                .taint_sub_fields(original.taint_sub_fields())
                .cut_first_field(cut_first_field)
                .reduce_bases(reduce_bases)
                .array_taint_type(array_taint_type)
                .can_have_immutable_aliases(original.can_have_immutable_aliases()),
        )?;
        if *new_ap == **original {
            Some(original.clone())
        } else {
            Some(new_ap)
        }
    }

    /// Appends `to_append` behind the fields of `original`
    pub fn append_fields(
        &self,
        original: &ApRef,
        to_append: &[AccessPathFragment],
        taint_sub_fields: bool,
    ) -> Option<ApRef> {
        if to_append.is_empty() {
            return Some(original.clone());
        }
        let mut fragments = original.fragments().to_vec();
        fragments.extend(to_append.iter().cloned());
        self.create_with(
            AccessPathRequest::new(original.plain_value().map(|l| Value::Local(l.clone())))
                .value_type(original.base_type().cloned())
                .fragments(fragments)
                .taint_sub_fields(taint_sub_fields)
                .array_taint_type(original.array_taint_type()),
        )
    }

    pub fn merge(&self, ap1: &ApRef, ap2: &ApRef) -> Option<ApRef> {
        self.append_fields(ap1, ap2.fragments(), ap2.taint_sub_fields())
    }

    /// `original` without its last field; sub-fields become tainted
    pub fn drop_last_field(&self, original: &ApRef) -> Option<ApRef> {
        let fragments = original.fragments();
        if fragments.is_empty() {
            return Some(original.clone());
        }
        self.create_with(
            AccessPathRequest::new(original.plain_value().map(|l| Value::Local(l.clone())))
                .value_type(original.base_type().cloned())
                .fragments(fragments[..fragments.len() - 1].to_vec())
                .taint_sub_fields(true)
                .array_taint_type(original.array_taint_type()),
        )
    }

    /// Builds a path from explicit parts, bypassing base folding
    ///
    /// Used by alias queries to re-expand a registered recursive pattern.
    pub fn expand_with_base(
        &self,
        original: &ApRef,
        insert_at: usize,
        base: &[AccessPathFragment],
    ) -> Option<ApRef> {
        let mut fragments = original.fragments()[..insert_at].to_vec();
        fragments.extend(base.iter().cloned());
        fragments.extend(original.fragments()[insert_at..].iter().cloned());
        self.create_with(
            AccessPathRequest::new(original.plain_value().map(|l| Value::Local(l.clone())))
                .value_type(original.base_type().cloned())
                .fragments(fragments)
                .taint_sub_fields(original.taint_sub_fields())
                .reduce_bases(false)
                .array_taint_type(original.array_taint_type())
                .can_have_immutable_aliases(original.can_have_immutable_aliases()),
        )
    }

    /// Returns the canonical shared instance for `ap`
    pub fn intern(&self, ap: AccessPath) -> ApRef {
        if ap.is_empty() {
            return self.empty.clone();
        }
        let cut = ap.cut_off_approximation;
        let key = (ap, cut);
        if let Some(existing) = self.interned.get(&key) {
            return existing.value().clone();
        }
        let shared = Arc::new(key.0.clone());
        self.interned.entry(key).or_insert(shared).value().clone()
    }

    pub fn interned_count(&self) -> usize {
        self.interned.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ir::{Field, LocalId, ProgramBuilder};

    fn factory_with(config: InfoflowConfig) -> AccessPathFactory {
        let mut pb = ProgramBuilder::new();
        pb.class("Node", None);
        pb.class("Obj", None);
        pb.class("Data", None);
        let program = pb.build();
        AccessPathFactory::new(&config, program.shared_hierarchy())
    }

    fn factory() -> AccessPathFactory {
        factory_with(InfoflowConfig::default())
    }

    #[test]
    fn test_local_path() {
        let f = factory();
        let x = Local::new(LocalId(1), "x", Type::class("Obj"));
        let ap = f.create(&Value::local(&x), true).unwrap();
        assert!(ap.is_local());
        assert!(ap.taint_sub_fields());
        assert_eq!(ap.base_type(), Some(&Type::class("Obj")));
        assert!(!ap.is_cut_off_approximation());
    }

    #[test]
    fn test_interning_shares_instances() {
        let f = factory();
        let x = Local::new(LocalId(1), "x", Type::class("Obj"));
        let a = f.create(&Value::local(&x), true).unwrap();
        let b = f.create(&Value::local(&x), true).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_constants_cannot_be_roots() {
        let f = factory();
        assert!(f.create(&Value::int(3), true).is_none());
    }

    #[test]
    fn test_truncation_sets_flags() {
        let f = factory_with(InfoflowConfig::default().with_access_path_length(2));
        let o = Local::new(LocalId(1), "o", Type::class("Obj"));
        let a = Field::instance("Obj", "a", Type::class("Obj2"));
        let b = Field::instance("Obj2", "b", Type::class("Obj3"));
        let c = Field::instance("Obj3", "c", Type::class("Obj4"));
        let ap = f
            .create_with(
                AccessPathRequest::of(&Value::field(&o, &a))
                    .fragments(vec![AccessPathFragment::new(b), AccessPathFragment::new(c)])
                    .taint_sub_fields(false),
            )
            .unwrap();
        assert_eq!(ap.fragment_count(), 2);
        assert!(ap.taint_sub_fields());
        assert!(ap.is_cut_off_approximation());
    }

    #[test]
    fn test_recursive_chain_is_folded() {
        let f = factory();
        let node = Type::class("Node");
        let n = Local::new(LocalId(1), "n", node.clone());
        let next = Field::instance("Node", "next", node.clone());
        let data = Field::instance("Node", "data", Type::class("Data"));
        let ap = f
            .create_with(
                AccessPathRequest::of(&Value::field(&n, &next)).fragments(vec![
                    AccessPathFragment::new(next.clone()),
                    AccessPathFragment::new(data.clone()),
                ]),
            )
            .unwrap();
        assert_eq!(ap.fragment_count(), 1);
        assert_eq!(ap.first_field(), Some(&data));
        assert!(ap.is_cut_off_approximation());
        assert_eq!(f.bases_for_type(&node).len(), 1);
    }

    #[test]
    fn test_primitive_base_with_fields_is_dropped() {
        let f = factory();
        let i = Local::new(LocalId(1), "i", Type::Int);
        let g = Field::instance("Obj", "g", Type::class("Data"));
        let ap = f.create_with(
            AccessPathRequest::of(&Value::local(&i)).fragments(vec![AccessPathFragment::new(g)]),
        );
        assert!(ap.is_none());
    }

    #[test]
    fn test_copy_with_new_value_preserves_identity() {
        let f = factory();
        let x = Local::new(LocalId(1), "x", Type::class("Obj"));
        let y = Local::new(LocalId(2), "y", Type::class("Obj"));
        let ap = f.create(&Value::local(&x), true).unwrap();
        let same = f.copy_with_new_value(&ap, &Value::local(&x)).unwrap();
        assert!(Arc::ptr_eq(&ap, &same));
        let moved = f.copy_with_new_value(&ap, &Value::local(&y)).unwrap();
        assert_eq!(moved.plain_value(), Some(&y));
    }

    #[test]
    fn test_zero_length_drops_fields() {
        let config = InfoflowConfig::default()
            .with_access_path_length(0)
            .with_static_field_tracking(crate::config::StaticFieldTrackingMode::None);
        let f = factory_with(config);
        let o = Local::new(LocalId(1), "o", Type::class("Obj"));
        let a = Field::instance("Obj", "a", Type::class("Data"));
        let ap = f.create(&Value::field(&o, &a), true).unwrap();
        assert!(ap.is_local());
    }
}
