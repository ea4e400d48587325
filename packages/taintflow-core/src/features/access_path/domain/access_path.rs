//! Access path value type
//!
//! A base local followed by a bounded chain of field dereferences. Instances
//! are only produced by the `AccessPathFactory`, which enforces the
//! canonical form and interns every path it hands out.

use crate::shared::ir::{Field, Local, Type, Value};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to an interned access path
pub type ApRef = Arc<AccessPath>;

/// Which part of an array value is tainted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayTaintType {
    Contents,
    Length,
    ContentsAndLength,
}

/// One field dereference together with the type the analysis propagates for it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccessPathFragment {
    field: Field,
    ty: Type,
}

impl AccessPathFragment {
    /// Fragment typed with the declared field type
    pub fn new(field: Field) -> Self {
        let ty = field.ty().clone();
        Self { field, ty }
    }

    pub fn with_type(field: Field, ty: Type) -> Self {
        Self { field, ty }
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn copy_with_new_type(&self, ty: Type) -> Self {
        Self {
            field: self.field.clone(),
            ty,
        }
    }
}

impl fmt::Display for AccessPathFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field.name())
    }
}

#[derive(Debug, Clone)]
pub struct AccessPath {
    pub(crate) value: Option<Local>,
    pub(crate) base_type: Option<Type>,
    pub(crate) fragments: Vec<AccessPathFragment>,
    pub(crate) taint_sub_fields: bool,
    /// Truncated or recursion-folded; not part of the identity
    pub(crate) cut_off_approximation: bool,
    pub(crate) array_taint_type: ArrayTaintType,
    pub(crate) can_have_immutable_aliases: bool,
}

impl AccessPath {
    /// The path of the zero fact
    pub(crate) fn empty() -> Self {
        Self {
            value: None,
            base_type: None,
            fragments: Vec::new(),
            taint_sub_fields: true,
            cut_off_approximation: false,
            array_taint_type: ArrayTaintType::ContentsAndLength,
            can_have_immutable_aliases: false,
        }
    }

    pub fn plain_value(&self) -> Option<&Local> {
        self.value.as_ref()
    }

    pub fn base_type(&self) -> Option<&Type> {
        self.base_type.as_ref()
    }

    pub fn fragments(&self) -> &[AccessPathFragment] {
        &self.fragments
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn first_fragment(&self) -> Option<&AccessPathFragment> {
        self.fragments.first()
    }

    pub fn first_field(&self) -> Option<&Field> {
        self.fragments.first().map(|f| f.field())
    }

    pub fn first_field_type(&self) -> Option<&Type> {
        self.fragments.first().map(|f| f.ty())
    }

    pub fn last_field(&self) -> Option<&Field> {
        self.fragments.last().map(|f| f.field())
    }

    /// Type of the last field, or the base type for field-less paths
    pub fn last_field_type(&self) -> Option<&Type> {
        match self.fragments.last() {
            Some(f) => Some(f.ty()),
            None => self.base_type.as_ref(),
        }
    }

    pub fn taint_sub_fields(&self) -> bool {
        self.taint_sub_fields
    }

    pub fn is_cut_off_approximation(&self) -> bool {
        self.cut_off_approximation
    }

    pub fn array_taint_type(&self) -> ArrayTaintType {
        self.array_taint_type
    }

    pub fn can_have_immutable_aliases(&self) -> bool {
        self.can_have_immutable_aliases
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none() && self.fragments.is_empty()
    }

    pub fn is_local(&self) -> bool {
        self.value.is_some() && self.fragments.is_empty()
    }

    pub fn is_instance_field_ref(&self) -> bool {
        self.value.is_some() && !self.fragments.is_empty()
    }

    pub fn is_static_field_ref(&self) -> bool {
        self.value.is_none() && !self.fragments.is_empty()
    }

    pub fn is_field_ref(&self) -> bool {
        !self.fragments.is_empty()
    }

    /// Type that decides whether the tainted root is primitive
    pub fn root_type(&self) -> Option<&Type> {
        if self.is_static_field_ref() {
            self.first_field_type()
        } else {
            self.base_type.as_ref()
        }
    }

    pub fn first_field_matches(&self, field: &Field) -> bool {
        self.first_field() == Some(field)
    }

    /// Whether `val` is a prefix of this path
    pub fn starts_with(&self, val: &Value) -> bool {
        match val {
            Value::Local(l) => self.value.as_ref() == Some(l),
            Value::StaticField(f) => self.is_static_field_ref() && self.first_field_matches(f),
            Value::InstanceField { base, field } => {
                self.value.as_ref() == Some(base) && self.first_field_matches(field)
            }
            _ => false,
        }
    }

    /// Everything tainted by `other` is also tainted by `self`
    pub fn entails(&self, other: &AccessPath) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if self.value.is_some() != other.value.is_some() {
            return false;
        }
        if self.value.is_some() && self.value != other.value {
            return false;
        }
        if !self.taint_sub_fields && other.taint_sub_fields {
            return false;
        }
        if self.array_taint_type != ArrayTaintType::ContentsAndLength
            && self.array_taint_type != other.array_taint_type
        {
            return false;
        }
        if self.fragments.len() > other.fragments.len() {
            return false;
        }
        if !self.taint_sub_fields && self.fragments.len() != other.fragments.len() {
            return false;
        }
        self.fragments
            .iter()
            .zip(other.fragments.iter())
            .all(|(a, b)| a.field() == b.field())
    }

    /// Structural equality of the rooted value, ignoring types and flags
    pub fn has_same_root_and_fields(&self, other: &AccessPath) -> bool {
        self.value == other.value
            && self.fragments.len() == other.fragments.len()
            && self
                .fragments
                .iter()
                .zip(other.fragments.iter())
                .all(|(a, b)| a.field() == b.field())
    }

    /// Locals, field refs and array refs can carry taint
    pub fn can_contain_value(val: &Value) -> bool {
        val.can_contain_value()
    }
}

impl PartialEq for AccessPath {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.base_type == other.base_type
            && self.fragments == other.fragments
            && self.taint_sub_fields == other.taint_sub_fields
            && self.array_taint_type == other.array_taint_type
            && self.can_have_immutable_aliases == other.can_have_immutable_aliases
    }
}

impl Eq for AccessPath {}

impl Hash for AccessPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.base_type.hash(state);
        self.fragments.hash(state);
        self.taint_sub_fields.hash(state);
        self.array_taint_type.hash(state);
        self.can_have_immutable_aliases.hash(state);
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "<<zero>>");
        }
        if let Some(v) = &self.value {
            match &self.base_type {
                Some(t) => write!(f, "{}({})", v, t)?,
                None => write!(f, "{}", v)?,
            }
        }
        for (i, frag) in self.fragments.iter().enumerate() {
            if i == 0 && self.value.is_none() {
                write!(f, "{}", frag.field())?;
            } else {
                write!(f, ".{}", frag)?;
            }
        }
        if self.taint_sub_fields {
            write!(f, " *")?;
        }
        match self.array_taint_type {
            ArrayTaintType::ContentsAndLength => write!(f, " <+length>"),
            ArrayTaintType::Length => write!(f, " <length>"),
            ArrayTaintType::Contents => Ok(()),
        }
    }
}
