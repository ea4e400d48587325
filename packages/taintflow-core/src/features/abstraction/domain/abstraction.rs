//! Taint fact propagated by the solvers
//!
//! An `Abstraction` is immutable once it is wrapped in an `Arc` and handed
//! to a solver. Derivations allocate a new fact that points back at its
//! predecessor; the predecessor chain plus the neighbor sets form the
//! provenance DAG walked by the source finder.
//!
//! Equality and hashing are local: the access path, the source context and
//! the sub-states participate, provenance does not.

use super::source_context::SourceContext;
use super::sub_states::{ActivationState, ExceptionState, ImplicitState, UnitContainer};
use crate::features::access_path::ApRef;
use crate::shared::ir::{MethodId, StmtId};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to a published fact
pub type AbsRef = Arc<Abstraction>;

pub struct Abstraction {
    access_path: ApRef,
    source_context: Option<Arc<SourceContext>>,
    activation: ActivationState,
    turn_unit: Option<StmtId>,
    exception: ExceptionState,
    implicit: ImplicitState,
    depends_on_cut_ap: bool,

    // Provenance
    predecessor: Option<AbsRef>,
    current_stmt: Option<StmtId>,
    corresponding_call_site: Option<StmtId>,
    path_length: usize,
    neighbors: Mutex<Vec<AbsRef>>,

    hash: OnceCell<u64>,
}

impl Abstraction {
    /// The zero fact of one analysis run
    pub fn zero(empty: ApRef) -> Self {
        Self::bare(empty, None, ExceptionState::Normal, false)
    }

    /// Fact created at a source statement
    pub fn new_source(context: SourceContext, exception_thrown: bool, is_implicit: bool) -> Self {
        let ap = Arc::clone(context.access_path());
        let stmt = context.stmt();
        let exception = if exception_thrown {
            ExceptionState::Thrown
        } else {
            ExceptionState::Normal
        };
        let mut abs = Self::bare(ap, Some(Arc::new(context)), exception, is_implicit);
        abs.current_stmt = Some(stmt);
        abs
    }

    fn bare(
        access_path: ApRef,
        source_context: Option<Arc<SourceContext>>,
        exception: ExceptionState,
        is_implicit: bool,
    ) -> Self {
        Self {
            access_path,
            source_context,
            activation: ActivationState::Active,
            turn_unit: None,
            exception,
            implicit: ImplicitState {
                is_implicit,
                postdominators: Vec::new(),
            },
            depends_on_cut_ap: false,
            predecessor: None,
            current_stmt: None,
            corresponding_call_site: None,
            path_length: 0,
            neighbors: Mutex::new(Vec::new()),
            hash: OnceCell::new(),
        }
    }

    /// Copy of `this` with `this` as predecessor and fresh provenance fields
    fn derive_copy(this: &AbsRef) -> Self {
        Self {
            access_path: Arc::clone(&this.access_path),
            source_context: this.source_context.clone(),
            activation: this.activation,
            turn_unit: this.turn_unit,
            exception: this.exception,
            implicit: this.implicit.clone(),
            depends_on_cut_ap: this.depends_on_cut_ap,
            predecessor: Some(Arc::clone(this)),
            current_stmt: None,
            corresponding_call_site: None,
            path_length: this.path_length + 1,
            neighbors: Mutex::new(Vec::new()),
            hash: OnceCell::new(),
        }
    }

    fn derive_mutable(this: &AbsRef, ap: Option<ApRef>, stmt: Option<StmtId>) -> Option<Self> {
        let ap = ap?;
        if this.access_path == ap && this.current_stmt == stmt {
            let mut abs = Self::derive_copy(this);
            abs.current_stmt = stmt;
            return Some(abs);
        }

        let mut abs = Self::derive_copy(this);
        abs.current_stmt = stmt;
        if !ap.is_empty() {
            abs.implicit.postdominators.clear();
        }
        if !abs.activation.is_active() {
            abs.depends_on_cut_ap |= ap.is_cut_off_approximation();
        }
        abs.access_path = ap;
        abs.source_context = None;
        // A turn unit only bounds the path that was handed over
        abs.turn_unit = None;
        Some(abs)
    }

    /// Successor fact with a new access path at `stmt`.
    ///
    /// Returns `this` itself when nothing changes. A `None` path yields no
    /// successor.
    pub fn derive_new_abstraction(
        this: &AbsRef,
        ap: Option<ApRef>,
        stmt: Option<StmtId>,
    ) -> Option<AbsRef> {
        let implicit = this.implicit.is_implicit;
        Self::derive_new_abstraction_implicit(this, ap, stmt, implicit)
    }

    pub fn derive_new_abstraction_implicit(
        this: &AbsRef,
        ap: Option<ApRef>,
        stmt: Option<StmtId>,
        is_implicit: bool,
    ) -> Option<AbsRef> {
        if let Some(ap) = &ap {
            if this.access_path == *ap
                && this.current_stmt == stmt
                && this.implicit.is_implicit == is_implicit
            {
                return Some(Arc::clone(this));
            }
        }
        Self::derive_definitely_new(this, ap, stmt, is_implicit).map(Arc::new)
    }

    /// Always allocates; the caller may adjust the result before publishing it
    pub fn derive_definitely_new(
        this: &AbsRef,
        ap: Option<ApRef>,
        stmt: Option<StmtId>,
        is_implicit: bool,
    ) -> Option<Self> {
        let mut abs = Self::derive_mutable(this, ap, stmt)?;
        abs.implicit.is_implicit = is_implicit;
        Some(abs)
    }

    /// Alias that becomes active at `activation_unit`.
    ///
    /// Without flow-sensitive aliasing every fact is active and `this` is
    /// returned unchanged.
    pub fn derive_inactive_abstraction(
        this: &AbsRef,
        activation_unit: StmtId,
        flow_sensitive_aliasing: bool,
    ) -> AbsRef {
        if !flow_sensitive_aliasing || !this.activation.is_active() {
            return Arc::clone(this);
        }
        let Some(mut abs) = Self::derive_mutable(this, Some(Arc::clone(&this.access_path)), None)
        else {
            return Arc::clone(this);
        };
        abs.implicit.postdominators.clear();
        abs.activation = ActivationState::Inactive { activation_unit };
        abs.depends_on_cut_ap |= abs.access_path.is_cut_off_approximation();
        Arc::new(abs)
    }

    pub fn active_copy(this: &AbsRef) -> AbsRef {
        if this.activation.is_active() {
            return Arc::clone(this);
        }
        let mut abs = Self::derive_copy(this);
        abs.source_context = None;
        abs.activation = ActivationState::Active;
        Arc::new(abs)
    }

    /// Fact handed from the alias search to the forward analysis at
    /// `turn_unit`. A later backward search for the same path stops there.
    pub fn derive_with_turn_unit(this: &AbsRef, turn_unit: StmtId) -> AbsRef {
        if this.turn_unit == Some(turn_unit) {
            return Arc::clone(this);
        }
        let mut abs = Self::derive_copy(this);
        abs.source_context = None;
        abs.current_stmt = this.current_stmt;
        abs.turn_unit = Some(turn_unit);
        Arc::new(abs)
    }

    pub fn derive_on_throw(this: &AbsRef, throw_stmt: StmtId) -> AbsRef {
        let mut abs = Self::derive_copy(this);
        abs.current_stmt = Some(throw_stmt);
        abs.source_context = None;
        abs.exception = ExceptionState::Thrown;
        Arc::new(abs)
    }

    pub fn derive_on_catch(this: &AbsRef, ap: Option<ApRef>) -> Option<AbsRef> {
        let mut abs = Self::derive_mutable(this, ap, None)?;
        abs.exception = ExceptionState::Normal;
        Some(Arc::new(abs))
    }

    /// Enters the conditional at `conditional_unit` whose postdominator is `postdom`.
    ///
    /// Conditional facts have an empty access path and are always implicit,
    /// which keeps them apart from the zero fact.
    pub fn derive_conditional_enter(
        this: &AbsRef,
        empty: &ApRef,
        postdom: UnitContainer,
        conditional_unit: StmtId,
    ) -> Option<AbsRef> {
        if this.implicit.postdominators.contains(&postdom) {
            return Some(Arc::clone(this));
        }
        let mut abs = Self::derive_mutable(this, Some(Arc::clone(empty)), Some(conditional_unit))?;
        abs.implicit.is_implicit = true;
        abs.implicit.postdominators.insert(0, postdom);
        Some(Arc::new(abs))
    }

    /// Conditional fact passed into a callee invoked inside a tainted branch
    pub fn derive_conditional_call(
        this: &AbsRef,
        empty: &ApRef,
        call_site: StmtId,
    ) -> Option<AbsRef> {
        let mut abs = Self::derive_mutable(this, Some(Arc::clone(empty)), Some(call_site))?;
        abs.implicit.is_implicit = true;
        abs.implicit.postdominators.clear();
        Some(Arc::new(abs))
    }

    pub fn drop_top_postdominator(this: &AbsRef) -> AbsRef {
        if this.implicit.postdominators.is_empty() {
            return Arc::clone(this);
        }
        let mut abs = Self::derive_copy(this);
        abs.source_context = None;
        abs.implicit.postdominators.remove(0);
        Arc::new(abs)
    }

    /// Re-attaches a source context dropped by earlier derivations
    pub fn inject_source_context(this: &AbsRef, context: Arc<SourceContext>) -> AbsRef {
        if this.source_context.as_ref() == Some(&context) {
            return Arc::clone(this);
        }
        let mut abs = Self::derive_copy(this);
        abs.predecessor = None;
        abs.source_context = Some(context);
        abs.current_stmt = this.current_stmt;
        Arc::new(abs)
    }

    /// Records the call site a return edge went through.
    ///
    /// Freshly derived facts are updated in place; a shared one is copied.
    pub fn with_corresponding_call_site(mut this: AbsRef, call_site: StmtId) -> AbsRef {
        if let Some(abs) = Arc::get_mut(&mut this) {
            abs.corresponding_call_site = Some(call_site);
            return this;
        }
        let mut abs = Self::derive_copy(&this);
        abs.predecessor = this.predecessor.clone();
        abs.path_length = this.path_length;
        abs.current_stmt = this.current_stmt;
        abs.corresponding_call_site = Some(call_site);
        Arc::new(abs)
    }

    /// Adds a fact that reached the same state along a different path.
    ///
    /// With `merge_neighbors`, a neighbor with the same predecessor,
    /// statement and call site as an existing one is rejected.
    pub fn add_neighbor(&self, other: &AbsRef, merge_neighbors: bool) -> bool {
        if std::ptr::eq(self, Arc::as_ptr(other)) {
            return false;
        }
        let mut neighbors = self.neighbors.lock();
        for nb in neighbors.iter() {
            if Arc::ptr_eq(nb, other) {
                return false;
            }
            if merge_neighbors
                && same_predecessor(nb, other)
                && nb.current_stmt == other.current_stmt
                && nb.corresponding_call_site == other.corresponding_call_site
            {
                return false;
            }
        }
        neighbors.push(Arc::clone(other));
        true
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.lock().len()
    }

    pub fn neighbors(&self) -> Vec<AbsRef> {
        self.neighbors.lock().clone()
    }

    pub fn access_path(&self) -> &ApRef {
        &self.access_path
    }

    pub fn source_context(&self) -> Option<&Arc<SourceContext>> {
        self.source_context.as_ref()
    }

    pub fn activation(&self) -> ActivationState {
        self.activation
    }

    pub fn is_abstraction_active(&self) -> bool {
        self.activation.is_active()
    }

    pub fn activation_unit(&self) -> Option<StmtId> {
        self.activation.activation_unit()
    }

    pub fn turn_unit(&self) -> Option<StmtId> {
        self.turn_unit
    }

    pub fn exception(&self) -> ExceptionState {
        self.exception
    }

    pub fn exception_thrown(&self) -> bool {
        self.exception.is_thrown()
    }

    pub fn implicit(&self) -> &ImplicitState {
        &self.implicit
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit.is_implicit
    }

    pub fn top_postdominator(&self) -> Option<&UnitContainer> {
        self.implicit.top()
    }

    pub fn is_top_postdominator_unit(&self, unit: StmtId) -> bool {
        self.top_postdominator()
            .map_or(false, |top| top.unit == Some(unit))
    }

    pub fn is_top_postdominator_method(&self, method: MethodId) -> bool {
        self.top_postdominator()
            .map_or(false, |top| top.method == Some(method))
    }

    pub fn depends_on_cut_ap(&self) -> bool {
        self.depends_on_cut_ap
    }

    pub fn predecessor(&self) -> Option<&AbsRef> {
        self.predecessor.as_ref()
    }

    pub fn current_stmt(&self) -> Option<StmtId> {
        self.current_stmt
    }

    pub fn corresponding_call_site(&self) -> Option<StmtId> {
        self.corresponding_call_site
    }

    pub fn path_length(&self) -> usize {
        self.path_length
    }

    /// Equality of everything except the access path and provenance
    pub fn local_equals(&self, other: &Abstraction) -> bool {
        self.source_context == other.source_context
            && self.activation == other.activation
            && self.turn_unit == other.turn_unit
            && self.exception == other.exception
            && self.implicit == other.implicit
            && self.depends_on_cut_ap == other.depends_on_cut_ap
    }

    /// `self` covers every location `other` taints
    pub fn entails(&self, other: &Abstraction) -> bool {
        self.access_path.entails(&other.access_path) && self.local_equals(other)
    }

    fn compute_hash(&self) -> u64 {
        let mut hasher = rustc_hash::FxHasher::default();
        self.source_context.hash(&mut hasher);
        self.access_path.hash(&mut hasher);
        self.activation.hash(&mut hasher);
        self.turn_unit.hash(&mut hasher);
        self.exception.hash(&mut hasher);
        self.implicit.hash(&mut hasher);
        self.depends_on_cut_ap.hash(&mut hasher);
        hasher.finish()
    }
}

fn same_predecessor(a: &Abstraction, b: &Abstraction) -> bool {
    match (&a.predecessor, &b.predecessor) {
        (Some(pa), Some(pb)) => Arc::ptr_eq(pa, pb),
        (None, None) => true,
        _ => false,
    }
}

impl PartialEq for Abstraction {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.hash_value() == other.hash_value()
            && self.access_path == other.access_path
            && self.local_equals(other)
    }
}

impl Eq for Abstraction {}

impl Abstraction {
    fn hash_value(&self) -> u64 {
        *self.hash.get_or_init(|| self.compute_hash())
    }
}

impl Hash for Abstraction {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

// Long predecessor chains would otherwise be dropped recursively.
impl Drop for Abstraction {
    fn drop(&mut self) {
        let mut next = self.predecessor.take();
        while let Some(pred) = next {
            match Arc::try_unwrap(pred) {
                Ok(mut inner) => next = inner.predecessor.take(),
                Err(_) => break,
            }
        }
    }
}

impl fmt::Debug for Abstraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Abstraction")
            .field("access_path", &format_args!("{}", self.access_path))
            .field("activation", &self.activation)
            .field("turn_unit", &self.turn_unit)
            .field("exception", &self.exception)
            .field("implicit", &self.implicit)
            .field("current_stmt", &self.current_stmt)
            .field("path_length", &self.path_length)
            .finish()
    }
}

impl fmt::Display for Abstraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.activation.is_active() {
            write!(f, "_")?;
        }
        write!(f, "{} | ", self.access_path)?;
        if self.turn_unit.is_none() {
            if let Some(unit) = self.activation.activation_unit() {
                write!(f, "{}", unit)?;
            }
        }
        if let Some(turn) = self.turn_unit {
            write!(f, "{}", turn)?;
        }
        write!(f, ">>")
    }
}
