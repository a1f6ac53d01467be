//! The constraint solver: unification with backtracking over disjunctions.
//!
//! The solver drains the constraint worklist, extending a substitution as
//! it goes. Equality decomposes structurally; conformance applies the
//! binding-operator qualifier rules; member and construction constraints
//! resolve against scope tables, deferring while their owner is still a
//! variable; disjunctions fork, exploring each branch over a clone of the
//! remaining state and adopting the first viable one.
//!
//! Failures inside a speculative branch abort only that branch. At the top
//! level, a failed constraint becomes a diagnostic and solving continues,
//! so a single error does not hide the rest of the program.

use std::collections::{BTreeMap, VecDeque};

use veld_ast::{BindOp, ScopeTable, SymbolTable};
use veld_diag::{Category, Diagnostic};
use veld_types::{
    BuiltinKind, QualSet, ScopeId, Substitution, TypeId, TypeKind, TypeStore, TypeVarId,
};

use crate::trace::{SolveAction, SolveStep};
use crate::{
    member_scope_of, span_to_location, Constraint, ConstraintKind, Provenance,
};

/// A failed constraint, carrying everything needed to report it.
#[derive(Debug, Clone)]
pub(crate) struct SolveFailure {
    category: Category,
    message: String,
    /// Secondary anchor, e.g. where a rejected overload alternative failed.
    note: Option<(Provenance, String)>,
    hint: Option<String>,
    provenance: Provenance,
}

impl SolveFailure {
    fn new(category: Category, message: String, provenance: Provenance) -> Self {
        Self {
            category,
            message,
            note: None,
            hint: None,
            provenance,
        }
    }

    fn with_note(mut self, provenance: Provenance, message: String) -> Self {
        self.note = Some((provenance, message));
        self
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Mutable solving state, cloned per explored disjunction branch.
#[derive(Clone)]
struct SolveState {
    worklist: VecDeque<Constraint>,
    subst: Substitution,
    /// Consecutive deferrals; when it exceeds the worklist length, no
    /// productive work remains and deferred constraints start failing.
    deferrals: usize,
}

enum StepOutcome {
    Continue,
    Deferred,
    /// A disjunction branch ran the rest of the worklist to completion.
    Adopted(Substitution),
}

pub struct Solver<'a> {
    store: &'a mut TypeStore,
    scopes: &'a ScopeTable,
    symbols: &'a SymbolTable,
    builtin_members: &'a BTreeMap<BuiltinKind, ScopeId>,
    diags: &'a mut Vec<Diagnostic>,
    max_branches: usize,
    branches_explored: usize,
    trace: Option<Vec<SolveStep>>,
}

impl<'a> Solver<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: &'a mut TypeStore,
        scopes: &'a ScopeTable,
        symbols: &'a SymbolTable,
        builtin_members: &'a BTreeMap<BuiltinKind, ScopeId>,
        diags: &'a mut Vec<Diagnostic>,
        max_branches: usize,
        trace_enabled: bool,
    ) -> Self {
        Self {
            store,
            scopes,
            symbols,
            builtin_members,
            diags,
            max_branches,
            branches_explored: 0,
            trace: trace_enabled.then(Vec::new),
        }
    }

    pub fn take_trace(&mut self) -> Vec<SolveStep> {
        self.trace.take().unwrap_or_default()
    }

    fn has_errors(&self) -> bool {
        self.diags.iter().any(Diagnostic::is_error)
    }

    /// Solve the constraint list into a substitution.
    ///
    /// Never fails outright: unresolvable constraints become diagnostics
    /// and solving continues with the rest of the worklist.
    pub fn solve(&mut self, constraints: Vec<Constraint>) -> Substitution {
        let state = SolveState {
            worklist: constraints.into(),
            subst: Substitution::new(),
            deferrals: 0,
        };
        self.run(state, false)
            .expect("non-speculative solving reports failures as diagnostics")
    }

    fn run(
        &mut self,
        mut state: SolveState,
        speculative: bool,
    ) -> Result<Substitution, SolveFailure> {
        while let Some(constraint) = state.worklist.pop_front() {
            match self.step(&mut state, constraint, speculative) {
                Ok(StepOutcome::Continue) => state.deferrals = 0,
                Ok(StepOutcome::Deferred) => {}
                Ok(StepOutcome::Adopted(subst)) => return Ok(subst),
                Err(failure) => {
                    if speculative {
                        return Err(failure);
                    }
                    self.report(&failure);
                    state.deferrals = 0;
                }
            }
        }
        Ok(state.subst)
    }

    fn step(
        &mut self,
        state: &mut SolveState,
        constraint: Constraint,
        speculative: bool,
    ) -> Result<StepOutcome, SolveFailure> {
        match constraint.kind {
            ConstraintKind::Equal(a, b) => {
                self.unify(state, a, b, &constraint.provenance, false)?;
                Ok(StepOutcome::Continue)
            }
            ConstraintKind::Conforms { rvalue, lvalue, op } => {
                self.conforms(state, rvalue, lvalue, op, &constraint.provenance)?;
                Ok(StepOutcome::Continue)
            }
            ConstraintKind::Specialize {
                ty,
                general,
                bindings,
            } => {
                self.specialize(state, ty, general, bindings, &constraint.provenance)?;
                Ok(StepOutcome::Continue)
            }
            ConstraintKind::Member { owner, member, ty } => {
                self.member(state, owner, member, ty, constraint.provenance)
            }
            ConstraintKind::Construction { callee, fun } => {
                self.construction(state, callee, fun, constraint.provenance)
            }
            ConstraintKind::Disjunction(branches) => {
                self.fork(state, branches, constraint.provenance, speculative)
            }
        }
    }

    // -- Disjunctions -------------------------------------------------------

    /// Explore each branch over a clone of the remaining state.
    ///
    /// Every branch is run to completion of the whole worklist, so a viable
    /// branch yields a full solution. First viable wins; a second viable
    /// branch makes the disjunction ambiguous (reported at the top level,
    /// silently first-wins inside an outer speculation).
    fn fork(
        &mut self,
        state: &mut SolveState,
        branches: Vec<Constraint>,
        provenance: Provenance,
        speculative: bool,
    ) -> Result<StepOutcome, SolveFailure> {
        self.push_step(
            SolveAction::Fork,
            String::new(),
            String::new(),
            format!("{} alternatives", branches.len()),
        );
        let mut viable: Vec<Substitution> = Vec::new();
        let mut first_failure: Option<SolveFailure> = None;
        let mut budget_hit = false;

        for branch in &branches {
            if self.branches_explored >= self.max_branches {
                budget_hit = true;
                break;
            }
            self.branches_explored += 1;

            let mut child = state.clone();
            child.worklist.push_front(branch.clone());
            match self.run(child, true) {
                Ok(subst) => {
                    viable.push(subst);
                    // Two viable branches already decide ambiguity; later
                    // branches cannot change the (first-wins) pick.
                    if viable.len() == 2 {
                        break;
                    }
                }
                Err(failure) => {
                    if first_failure.is_none() {
                        first_failure = Some(failure);
                    }
                }
            }
        }

        match viable.len() {
            0 => {
                if budget_hit {
                    Err(SolveFailure::new(
                        Category::SolverBudget,
                        "type checking gave up: too many alternatives to explore".to_string(),
                        provenance,
                    )
                    .with_hint("annotate intermediate bindings to prune the search"))
                } else {
                    let mut failure = SolveFailure::new(
                        Category::NoViableOverload,
                        format!(
                            "no alternative satisfies the {}",
                            provenance.reason.describe()
                        ),
                        provenance,
                    );
                    if let Some(cause) = first_failure {
                        failure = failure.with_note(cause.provenance, cause.message);
                    }
                    Err(failure)
                }
            }
            1 => Ok(StepOutcome::Adopted(
                viable.into_iter().next().expect("one viable branch"),
            )),
            _ => {
                // Error-typed operands make every alternative trivially
                // viable; suppress the ambiguity once an error is already
                // on record so it does not cascade.
                if !speculative && !self.has_errors() {
                    self.diags.push(
                        Diagnostic::error(
                            Category::AmbiguousConstraint,
                            format!(
                                "ambiguous {}: more than one alternative type-checks",
                                provenance.reason.describe()
                            ),
                        )
                        .at(span_to_location(provenance.span)),
                    );
                }
                Ok(StepOutcome::Adopted(
                    viable.into_iter().next().expect("at least one branch"),
                ))
            }
        }
    }

    // -- Unification --------------------------------------------------------

    fn mismatch(&self, a: TypeId, b: TypeId, provenance: &Provenance) -> SolveFailure {
        SolveFailure::new(
            Category::ConstraintMismatch,
            format!(
                "mismatched types in {}: `{}` vs `{}`",
                provenance.reason.describe(),
                self.store.display(a),
                self.store.display(b),
            ),
            provenance.clone(),
        )
    }

    fn unify(
        &mut self,
        state: &mut SolveState,
        a: TypeId,
        b: TypeId,
        provenance: &Provenance,
        ignore_top_quals: bool,
    ) -> Result<(), SolveFailure> {
        let a = state.subst.walk_compress(self.store, a);
        let b = state.subst.walk_compress(self.store, b);
        if a == b {
            self.push_typed_step(SolveAction::Identity, a, b, "already equal");
            return Ok(());
        }

        let ka = self.store.kind(a).clone();
        let kb = self.store.kind(b).clone();
        match (&ka, &kb) {
            (TypeKind::Error, _) | (_, TypeKind::Error) => {
                self.push_typed_step(SolveAction::Absorb, a, b, "error type absorbs");
                Ok(())
            }
            (TypeKind::Var(va), _) => self.bind(state, *va, b, provenance),
            (_, TypeKind::Var(vb)) => self.bind(state, *vb, a, provenance),
            _ => {
                let qa = self.store.quals(a);
                let qb = self.store.quals(b);
                if !ignore_top_quals && !qa.is_empty() && !qb.is_empty() && qa != qb {
                    self.push_typed_step(SolveAction::Error, a, b, "qualifier mismatch");
                    return Err(self.mismatch(a, b, provenance));
                }
                self.unify_shapes(state, a, b, &ka, &kb, provenance)
            }
        }
    }

    fn unify_shapes(
        &mut self,
        state: &mut SolveState,
        a: TypeId,
        b: TypeId,
        ka: &TypeKind,
        kb: &TypeKind,
        provenance: &Provenance,
    ) -> Result<(), SolveFailure> {
        match (ka, kb) {
            (TypeKind::Builtin(x), TypeKind::Builtin(y)) if x == y => Ok(()),
            (TypeKind::Placeholder { .. }, TypeKind::Placeholder { .. })
            | (TypeKind::Nominal(_), TypeKind::Nominal(_)) => {
                if self.store.unqualified_lookup(a) == self.store.unqualified_lookup(b) {
                    Ok(())
                } else {
                    Err(self.mismatch(a, b, provenance))
                }
            }
            (TypeKind::Meta(x), TypeKind::Meta(y)) => {
                self.push_typed_step(SolveAction::Decompose, a, b, "metatypes unify inside");
                self.unify(state, *x, *y, provenance, false)
            }
            (TypeKind::Fun(f), TypeKind::Fun(g)) => {
                // Generic signatures are opened before matching so every use
                // site infers its own instantiation.
                if !f.placeholders.is_empty() || !g.placeholders.is_empty() {
                    let a2 = self.open_generic(state, a);
                    let b2 = self.open_generic(state, b);
                    return self.unify(state, a2, b2, provenance, false);
                }
                if f.params.len() != g.params.len() {
                    return Err(self.mismatch(a, b, provenance));
                }
                for ((la, _), (lb, _)) in f.params.iter().zip(g.params.iter()) {
                    if la != lb {
                        return Err(self.mismatch(a, b, provenance));
                    }
                }
                self.push_typed_step(SolveAction::Decompose, a, b, "functions unify pointwise");
                let params: Vec<(TypeId, TypeId)> = f
                    .params
                    .iter()
                    .zip(g.params.iter())
                    .map(|((_, pa), (_, pb))| (*pa, *pb))
                    .collect();
                for (pa, pb) in params {
                    self.unify(state, pa, pb, provenance, false)?;
                }
                self.unify(state, f.codomain, g.codomain, provenance, false)
            }
            (
                TypeKind::BoundGeneric {
                    base: base_a,
                    bindings: bind_a,
                },
                TypeKind::BoundGeneric {
                    base: base_b,
                    bindings: bind_b,
                },
            ) => {
                if self.store.unqualified_lookup(*base_a) != self.store.unqualified_lookup(*base_b)
                {
                    return Err(self.mismatch(a, b, provenance));
                }
                self.unify_binding_lists(state, bind_a.clone(), bind_b.clone(), provenance)
            }
            (
                TypeKind::OpenedNominal {
                    base: base_a,
                    openings,
                },
                TypeKind::BoundGeneric {
                    base: base_b,
                    bindings,
                },
            )
            | (
                TypeKind::BoundGeneric {
                    base: base_b,
                    bindings,
                },
                TypeKind::OpenedNominal {
                    base: base_a,
                    openings,
                },
            ) => {
                if self.store.unqualified_lookup(*base_a) != self.store.unqualified_lookup(*base_b)
                {
                    return Err(self.mismatch(a, b, provenance));
                }
                self.unify_binding_lists(state, openings.clone(), bindings.clone(), provenance)
            }
            (
                TypeKind::OpenedNominal {
                    base: base_a,
                    openings: open_a,
                },
                TypeKind::OpenedNominal {
                    base: base_b,
                    openings: open_b,
                },
            ) => {
                if self.store.unqualified_lookup(*base_a) != self.store.unqualified_lookup(*base_b)
                {
                    return Err(self.mismatch(a, b, provenance));
                }
                self.unify_binding_lists(state, open_a.clone(), open_b.clone(), provenance)
            }
            (TypeKind::OpenedNominal { base, .. }, TypeKind::Nominal(_))
            | (TypeKind::Nominal(_), TypeKind::OpenedNominal { base, .. }) => {
                let nominal = if matches!(ka, TypeKind::Nominal(_)) { a } else { b };
                if self.store.unqualified_lookup(*base)
                    == self.store.unqualified_lookup(nominal)
                {
                    Ok(())
                } else {
                    Err(self.mismatch(a, b, provenance))
                }
            }
            _ => Err(self.mismatch(a, b, provenance)),
        }
    }

    /// Unify two sorted placeholder-keyed binding lists on their common keys.
    fn unify_binding_lists(
        &mut self,
        state: &mut SolveState,
        left: Vec<(TypeId, TypeId)>,
        right: Vec<(TypeId, TypeId)>,
        provenance: &Provenance,
    ) -> Result<(), SolveFailure> {
        let right_map: BTreeMap<TypeId, TypeId> = right.into_iter().collect();
        for (ph, value_left) in left {
            if let Some(value_right) = right_map.get(&ph) {
                self.unify(state, value_left, *value_right, provenance, false)?;
            }
        }
        Ok(())
    }

    /// Bind a variable, opening generic function types and checking occurs.
    fn bind(
        &mut self,
        state: &mut SolveState,
        var: TypeVarId,
        target: TypeId,
        provenance: &Provenance,
    ) -> Result<(), SolveFailure> {
        let mut target = state.subst.reify(self.store, target);
        if let TypeKind::Var(v) = self.store.kind(target) {
            if *v == var {
                return Ok(());
            }
        }
        if matches!(self.store.kind(target), TypeKind::Fun(_))
            && !self.store.unbound_placeholders(target).is_empty()
        {
            let opened = self.store.open(target, &mut BTreeMap::new());
            self.push_typed_step(SolveAction::Open, target, opened, "opened generic signature");
            target = opened;
        }
        if state.subst.occurs(self.store, var, target) {
            self.push_typed_step(SolveAction::OccursCheck, target, target, "occurs check failed");
            return Err(SolveFailure::new(
                Category::ConstraintMismatch,
                format!(
                    "cannot construct the infinite type `${}` = `{}`",
                    var.0,
                    self.store.display(target)
                ),
                provenance.clone(),
            ));
        }
        if self.trace.is_some() {
            let rendered = self.store.display(target);
            self.push_step(SolveAction::Bind, format!("${}", var.0), rendered, String::new());
        }
        state.subst.bind(var, target);
        state.deferrals = 0;
        Ok(())
    }

    /// Reify and, if unbound placeholders remain, open with fresh variables.
    fn open_generic(&mut self, state: &mut SolveState, id: TypeId) -> TypeId {
        let reified = state.subst.reify(self.store, id);
        if self.store.unbound_placeholders(reified).is_empty() {
            reified
        } else {
            let opened = self.store.open(reified, &mut BTreeMap::new());
            self.push_typed_step(SolveAction::Open, reified, opened, "opened generic type");
            opened
        }
    }

    /// Attempt a unification, rolling the substitution back on failure.
    fn try_unify(&mut self, state: &mut SolveState, a: TypeId, b: TypeId, provenance: &Provenance) -> bool {
        let snapshot = state.subst.clone();
        match self.unify(state, a, b, provenance, true) {
            Ok(()) => true,
            Err(_) => {
                state.subst = snapshot;
                false
            }
        }
    }

    // -- Conformance --------------------------------------------------------

    /// `rvalue` must be admissible for `lvalue` under the binding operator.
    fn conforms(
        &mut self,
        state: &mut SolveState,
        rvalue: TypeId,
        lvalue: TypeId,
        op: Option<BindOp>,
        provenance: &Provenance,
    ) -> Result<(), SolveFailure> {
        let r = state.subst.walk_compress(self.store, rvalue);
        let l = state.subst.walk_compress(self.store, lvalue);
        if matches!(self.store.kind(r), TypeKind::Error)
            || matches!(self.store.kind(l), TypeKind::Error)
        {
            return Ok(());
        }
        // With an unresolved side there is nothing to check qualifiers
        // against yet; binding the variable is the conformance.
        if matches!(self.store.kind(r), TypeKind::Var(_))
            || matches!(self.store.kind(l), TypeKind::Var(_))
        {
            return self.unify(state, r, l, provenance, true);
        }

        let rq = self.store.quals(r);
        let lq = self.store.quals(l);
        match op {
            Some(BindOp::Copy) | None => {
                if op.is_some() && !rq.is_empty() && !rq.is_valid_combination() {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!("invalid qualifier combination `{rq}`"),
                        provenance.clone(),
                    ));
                }
                if self.try_unify(state, r, l, provenance) || self.subtype(state, r, l) {
                    Ok(())
                } else {
                    Err(self.mismatch(r, l, provenance))
                }
            }
            Some(BindOp::Move) => {
                if !rq.is_empty() && !rq.contains(QualSet::VAL) {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!("cannot move out of a non-value binding `{}`", self.store.display(r)),
                        provenance.clone(),
                    ));
                }
                if !lq.is_empty() && !lq.contains(QualSet::VAL) {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!("cannot move into a non-value binding `{}`", self.store.display(l)),
                        provenance.clone(),
                    ));
                }
                if self.try_unify(state, r, l, provenance) {
                    Ok(())
                } else {
                    Err(self.mismatch(r, l, provenance))
                }
            }
            Some(BindOp::Ref) => {
                if !lq.is_empty() && !lq.contains(QualSet::REF) {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!(
                            "cannot bind a reference to `{}`: the target is not `@ref`",
                            self.store.display(l)
                        ),
                        provenance.clone(),
                    )
                    .with_hint("declare the target with a `@ref` qualifier set"));
                }
                if self.try_unify(state, r, l, provenance) {
                    Ok(())
                } else {
                    Err(self.mismatch(r, l, provenance))
                }
            }
        }
    }

    /// The subtype relation used by conformance: `Nothing` is the bottom
    /// and `Anything` the top of the lattice.
    fn subtype(&mut self, state: &mut SolveState, r: TypeId, l: TypeId) -> bool {
        let r = state.subst.walk(self.store, r);
        let l = state.subst.walk(self.store, l);
        matches!(self.store.kind(r), TypeKind::Builtin(BuiltinKind::Nothing))
            || matches!(self.store.kind(l), TypeKind::Builtin(BuiltinKind::Anything))
    }

    /// Close `general` under explicit specialization arguments, then unify.
    ///
    /// Runs after equality constraints so the general type's placeholders
    /// are structurally visible when it reifies (annotation equalities have
    /// already routed placeholders into parameter variables by then).
    fn specialize(
        &mut self,
        state: &mut SolveState,
        ty: TypeId,
        general: TypeId,
        bindings: Vec<(TypeId, TypeId)>,
        provenance: &Provenance,
    ) -> Result<(), SolveFailure> {
        let reified = state.subst.reify(self.store, general);
        let map: BTreeMap<TypeId, TypeId> = bindings.into_iter().collect();
        let closed = self.store.close(reified, &map);
        self.unify(state, ty, closed, provenance, false)
    }

    // -- Member and construction --------------------------------------------

    fn defer(
        &mut self,
        state: &mut SolveState,
        kind: ConstraintKind,
        provenance: Provenance,
        what: &str,
    ) -> Result<StepOutcome, SolveFailure> {
        state.deferrals += 1;
        if state.deferrals > state.worklist.len() + 1 {
            return Err(SolveFailure::new(
                Category::ConstraintMismatch,
                format!("cannot determine the type this {what} applies to"),
                provenance,
            ));
        }
        self.push_step(
            SolveAction::Defer,
            String::new(),
            String::new(),
            format!("{what} owner unresolved"),
        );
        state.worklist.push_back(Constraint::new(kind, provenance));
        Ok(StepOutcome::Deferred)
    }

    fn member(
        &mut self,
        state: &mut SolveState,
        owner: TypeId,
        member: String,
        ty: TypeId,
        provenance: Provenance,
    ) -> Result<StepOutcome, SolveFailure> {
        let o = state.subst.walk_compress(self.store, owner);
        match self.store.kind(o).clone() {
            TypeKind::Error => {
                let error = self.store.error();
                if let TypeKind::Var(v) = *self.store.kind(state.subst.walk(self.store, ty)) {
                    state.subst.bind(v, error);
                }
                Ok(StepOutcome::Continue)
            }
            TypeKind::Var(_) => self.defer(
                state,
                ConstraintKind::Member { owner: o, member, ty },
                provenance,
                "member access",
            ),
            TypeKind::Meta(inner) => {
                let inner = state.subst.walk_compress(self.store, inner);
                if matches!(self.store.kind(inner), TypeKind::Var(_)) {
                    return self.defer(
                        state,
                        ConstraintKind::Member { owner: o, member, ty },
                        provenance,
                        "member access",
                    );
                }
                // Static access: no receiver to apply.
                self.resolve_member(state, inner, o, member, ty, provenance, false)
            }
            _ => self.resolve_member(state, o, o, member, ty, provenance, true),
        }
    }

    /// Look `member` up in the member scope of `subject` and queue the
    /// candidate constraints. `receiver` is the owner value methods bind
    /// their self parameter against.
    #[allow(clippy::too_many_arguments)]
    fn resolve_member(
        &mut self,
        state: &mut SolveState,
        subject: TypeId,
        receiver: TypeId,
        member: String,
        ty: TypeId,
        provenance: Provenance,
        apply_receiver: bool,
    ) -> Result<StepOutcome, SolveFailure> {
        let Some((scope, map)) = member_scope_of(self.store, self.builtin_members, subject) else {
            return Err(SolveFailure::new(
                Category::ConstraintMismatch,
                format!(
                    "type `{}` has no members",
                    self.store.display(subject)
                ),
                provenance,
            ));
        };

        let candidates = self.scopes.lookup_local(scope, &member);
        let mut branches = Vec::new();
        for sym in candidates {
            let symbol = self.symbols.symbol(*sym);
            let Some(sym_ty) = symbol.ty else { continue };
            let adjusted = self.close_open(state, sym_ty, &map);
            let kind = if symbol.is_method && apply_receiver {
                // Methods are curried `(Self) -> inner`; equate the
                // receiver-applied view with the candidate in one equality.
                let applied = self.store.fun(vec![(None, receiver)], ty, Vec::new());
                ConstraintKind::Equal(applied, adjusted)
            } else {
                ConstraintKind::Equal(ty, adjusted)
            };
            branches.push(Constraint::new(kind, provenance.clone()));
        }

        if branches.is_empty() {
            return Err(SolveFailure::new(
                Category::ConstraintMismatch,
                format!(
                    "type `{}` has no member named `{member}`",
                    self.store.display(subject)
                ),
                provenance,
            ));
        }
        if branches.len() == 1 {
            state.worklist.push_front(branches.pop().expect("one branch"));
        } else {
            state
                .worklist
                .push_front(Constraint::new(ConstraintKind::Disjunction(branches), provenance));
        }
        Ok(StepOutcome::Continue)
    }

    fn construction(
        &mut self,
        state: &mut SolveState,
        callee: TypeId,
        fun: TypeId,
        provenance: Provenance,
    ) -> Result<StepOutcome, SolveFailure> {
        let c = state.subst.walk_compress(self.store, callee);
        match self.store.kind(c).clone() {
            TypeKind::Error => Ok(StepOutcome::Continue),
            TypeKind::Var(_) => self.defer(
                state,
                ConstraintKind::Construction { callee: c, fun },
                provenance,
                "construction",
            ),
            TypeKind::Meta(inner) => {
                let inner = state.subst.walk_compress(self.store, inner);
                if matches!(self.store.kind(inner), TypeKind::Var(_)) {
                    return self.defer(
                        state,
                        ConstraintKind::Construction { callee: c, fun },
                        provenance,
                        "construction",
                    );
                }
                let Some((scope, map)) = member_scope_of(self.store, self.builtin_members, inner)
                else {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!(
                            "type `{}` cannot be constructed",
                            self.store.display(inner)
                        ),
                        provenance,
                    ));
                };

                let candidates = self.scopes.lookup_local(scope, "new");
                let mut branches = Vec::new();
                for sym in candidates {
                    let Some(sym_ty) = self.symbols.symbol(*sym).ty else {
                        continue;
                    };
                    let adjusted = self.close_open(state, sym_ty, &map);
                    branches.push(Constraint::new(
                        ConstraintKind::Equal(fun, adjusted),
                        provenance.clone(),
                    ));
                }
                if branches.is_empty() {
                    return Err(SolveFailure::new(
                        Category::ConstraintMismatch,
                        format!(
                            "type `{}` has no constructor",
                            self.store.display(inner)
                        ),
                        provenance,
                    ));
                }
                if branches.len() == 1 {
                    state.worklist.push_front(branches.pop().expect("one branch"));
                } else {
                    state.worklist.push_front(Constraint::new(
                        ConstraintKind::Disjunction(branches),
                        provenance,
                    ));
                }
                Ok(StepOutcome::Continue)
            }
            _ => Err(SolveFailure::new(
                Category::ConstraintMismatch,
                format!(
                    "expression of type `{}` is not a type and cannot be constructed",
                    self.store.display(c)
                ),
                provenance,
            )),
        }
    }

    /// Close a candidate signature with the owner's specialization map, then
    /// open whatever generic parameters remain.
    fn close_open(
        &mut self,
        state: &mut SolveState,
        sym_ty: TypeId,
        map: &BTreeMap<TypeId, TypeId>,
    ) -> TypeId {
        let closed = if map.is_empty() {
            sym_ty
        } else {
            self.store.close(sym_ty, map)
        };
        self.open_generic(state, closed)
    }

    // -- Reporting and tracing ----------------------------------------------

    fn report(&mut self, failure: &SolveFailure) {
        let mut diag = Diagnostic::error(failure.category, failure.message.clone())
            .at(span_to_location(failure.provenance.span));
        if let Some((provenance, message)) = &failure.note {
            diag = diag.with_note(span_to_location(provenance.span), message.clone());
        }
        if let Some(hint) = &failure.hint {
            diag = diag.with_hint(hint.clone());
        }
        self.diags.push(diag);
    }

    fn push_typed_step(&mut self, action: SolveAction, left: TypeId, right: TypeId, detail: &str) {
        if self.trace.is_some() {
            let left = self.store.display(left);
            let right = self.store.display(right);
            self.push_step(action, left, right, detail.to_string());
        }
    }

    fn push_step(&mut self, action: SolveAction, left: String, right: String, detail: String) {
        if let Some(steps) = &mut self.trace {
            steps.push(SolveStep {
                step: steps.len(),
                action,
                left,
                right,
                detail,
            });
        }
    }
}
