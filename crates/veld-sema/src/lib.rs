//! Semantic analysis for Veld: constraint generation, solving, and dispatch.
//!
//! This crate implements the typing pipeline that runs between name binding
//! and IR lowering:
//!
//! - [`generate`] walks the AST, assigns a fresh type variable to every
//!   expression whose type is not syntactically fixed, and emits constraints
//!   encoding the language semantics.
//! - [`solve`] unifies the constraint set into a substitution, exploring
//!   disjunctions (overloads, constructor calls) with backtracking.
//! - [`dispatch`] reifies solved types back into the AST and resolves every
//!   identifier to a unique declaration symbol.
//!
//! Constraints carry provenance so that when solving fails, the diagnostic
//! can point at the source construct that generated the constraint.

pub mod dispatch;
pub mod generate;
pub mod solve;
pub mod trace;

use std::collections::BTreeMap;

use veld_ast::{BindOp, Module, Span, Symbol};
use veld_types::ScopeId;
use veld_types::{BuiltinKind, QualSet, TypeId, TypeStore};

// Re-export for convenience.
pub use veld_diag::{Category, Diagnostic, DiagnosticError, Severity, SourceLocation};
pub use veld_types::Substitution;

pub fn span_to_location(span: Span) -> SourceLocation {
    SourceLocation {
        file_id: span.file.0,
        start: span.start,
        end: span.end,
    }
}

// ---------------------------------------------------------------------------
// Provenance: why a constraint exists
// ---------------------------------------------------------------------------

/// Tracks the origin of a constraint for error reporting.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub span: Span,
    pub reason: Reason,
}

impl Provenance {
    pub fn new(span: Span, reason: Reason) -> Self {
        Self { span, reason }
    }
}

/// The semantic anchor a constraint was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// A declaration's type must match its annotation.
    Annotation,
    /// A function's inferred codomain must match the declared one.
    Codomain,
    /// A constructor's codomain is the enclosing type.
    ConstructorCodomain,
    /// An initial or assigned rvalue must conform to the lvalue.
    Rvalue,
    /// A call argument must conform to the parameter.
    CallArgument(usize),
    /// A parameter default must conform to the parameter type.
    ParamDefault,
    /// The callee must be a function or a constructible type.
    Callee,
    /// Both operands of a binary operator constrain the operator method.
    BinaryOperator,
    /// An identifier takes the type of the declaration it refers to.
    Identifier,
    /// A member access constrains the owner's member.
    Select,
    /// A subscript dispatches to the `[]` member.
    Subscript,
    /// An `if` condition must be boolean.
    Condition,
    /// Both `if` branches must agree.
    IfBranches,
    /// A returned value must match the codomain.
    ReturnValue,
    /// An explicit specialization argument.
    Specialization,
}

impl Reason {
    /// Short noun phrase used in diagnostic messages.
    pub fn describe(self) -> &'static str {
        match self {
            Reason::Annotation => "type annotation",
            Reason::Codomain => "return type",
            Reason::ConstructorCodomain => "constructor return type",
            Reason::Rvalue => "bound value",
            Reason::CallArgument(_) => "call argument",
            Reason::ParamDefault => "default value",
            Reason::Callee => "callee",
            Reason::BinaryOperator => "operator operand",
            Reason::Identifier => "identifier",
            Reason::Select => "member access",
            Reason::Subscript => "subscript",
            Reason::Condition => "condition",
            Reason::IfBranches => "if branches",
            Reason::ReturnValue => "returned value",
            Reason::Specialization => "specialization argument",
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// A typing constraint over semantic types.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub provenance: Provenance,
}

#[derive(Debug, Clone)]
pub enum ConstraintKind {
    /// The two types must unify.
    Equal(TypeId, TypeId),
    /// The rvalue must be admissible for the lvalue under the binding
    /// operator's qualifier rules (or plain subsumption when no operator
    /// context exists).
    Conforms {
        rvalue: TypeId,
        lvalue: TypeId,
        op: Option<BindOp>,
    },
    /// `ty` must unify with `general` closed under the explicit
    /// specialization `bindings` (placeholder, argument). Applied by the
    /// solver once `general` has been resolved far enough for its
    /// placeholders to be structurally visible.
    Specialize {
        ty: TypeId,
        general: TypeId,
        bindings: Vec<(TypeId, TypeId)>,
    },
    /// `owner` must have a member `member` whose type unifies with `ty`.
    Member {
        owner: TypeId,
        member: String,
        ty: TypeId,
    },
    /// `callee` must be the metatype of a nominal with a constructor of
    /// type `fun`.
    Construction { callee: TypeId, fun: TypeId },
    /// Exactly one branch must be satisfiable.
    Disjunction(Vec<Constraint>),
}

impl Constraint {
    pub fn new(kind: ConstraintKind, provenance: Provenance) -> Self {
        Self { kind, provenance }
    }

    /// Solve-order weight. Annotation-derived equalities first: they route
    /// placeholders into declaration signatures, and identifier equalities
    /// must not instantiate a generic signature before that has happened
    /// (declarations may appear after their uses). Disjunctions go last so
    /// their branches see a maximally bound substitution.
    fn rank(&self) -> u8 {
        match self.kind {
            ConstraintKind::Equal(..) => match self.provenance.reason {
                Reason::Annotation | Reason::Codomain | Reason::ConstructorCodomain => 0,
                _ => 1,
            },
            ConstraintKind::Conforms { .. } => 2,
            ConstraintKind::Specialize { .. } | ConstraintKind::Member { .. } => 3,
            ConstraintKind::Construction { .. } => 4,
            ConstraintKind::Disjunction(..) => 5,
        }
    }
}

/// Append-only constraint accumulator, drained by the solver.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Drain all constraints in solve order. The sort is stable, so
    /// same-rank constraints keep source order and solving stays
    /// deterministic.
    pub fn drain(&mut self) -> Vec<Constraint> {
        let mut constraints = std::mem::take(&mut self.constraints);
        constraints.sort_by_key(Constraint::rank);
        constraints
    }
}

// ---------------------------------------------------------------------------
// Compiler context
// ---------------------------------------------------------------------------

/// Process-scoped state shared by the semantic passes: the type store, the
/// constraint accumulator, the diagnostic sink, and the builtin member
/// scopes installed into the module under analysis.
pub struct CompilerContext {
    pub store: TypeStore,
    pub constraints: ConstraintSet,
    pub diags: Vec<Diagnostic>,
    /// Member scope per builtin type, installed by
    /// [`CompilerContext::install_builtins`].
    pub builtin_members: BTreeMap<BuiltinKind, ScopeId>,
    /// Explored-branch budget for disjunction solving.
    pub max_branches: usize,
    /// Capture a step-by-step solver trace.
    pub trace_solver: bool,
    pub solver_trace: Vec<trace::SolveStep>,
}

impl CompilerContext {
    pub fn new() -> Self {
        Self {
            store: TypeStore::new(),
            constraints: ConstraintSet::new(),
            diags: Vec::new(),
            builtin_members: BTreeMap::new(),
            max_branches: 4096,
            trace_solver: false,
            solver_trace: Vec::new(),
        }
    }

    pub fn diagnose(&mut self, diag: Diagnostic) {
        self.diags.push(diag);
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(Diagnostic::is_error)
    }

    /// Populate the module's root scope with the builtin types and their
    /// operator methods.
    ///
    /// Every builtin gets a metatype symbol (`Int`, `Bool`, ...) in the root
    /// scope and a member scope holding its operators as curried methods:
    /// `Int.+ : (Int) -> (Int) -> Int`, comparison operators yielding
    /// `Bool`, and so on. Must run before the module's AST is built, so the
    /// name binder (or a test) can resolve builtin names.
    pub fn install_builtins(&mut self, module: &mut Module) {
        for kind in BuiltinKind::ALL {
            let member_scope = module.scopes.push_scope(None);
            self.builtin_members.insert(kind, member_scope);

            let unqualified = self.store.builtin(kind, QualSet::empty());
            let meta = self.store.meta(unqualified);
            module.define(
                module.root_scope,
                Symbol {
                    name: kind.name().to_string(),
                    scope: module.root_scope,
                    overloadable: false,
                    is_method: false,
                    ty: Some(meta),
                },
            );

            for (op, codomain) in builtin_operators(kind) {
                let codomain_ty = self.store.builtin(codomain, QualSet::default_value());
                let rhs = self.store.builtin(kind, QualSet::empty());
                let inner = self.store.fun(vec![(None, rhs)], codomain_ty, Vec::new());
                let method = self
                    .store
                    .fun(vec![(None, unqualified)], inner, Vec::new());
                module.define(
                    member_scope,
                    Symbol {
                        name: op.to_string(),
                        scope: member_scope,
                        overloadable: true,
                        is_method: true,
                        ty: Some(method),
                    },
                );
            }
        }
    }
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Operator methods declared on each builtin, as (name, codomain) pairs.
/// The operand type is the builtin itself.
fn builtin_operators(kind: BuiltinKind) -> Vec<(&'static str, BuiltinKind)> {
    let arith = |k| {
        vec![
            ("+", k),
            ("-", k),
            ("*", k),
            ("/", k),
            ("%", k),
            ("<", BuiltinKind::Bool),
            ("<=", BuiltinKind::Bool),
            (">", BuiltinKind::Bool),
            (">=", BuiltinKind::Bool),
            ("==", BuiltinKind::Bool),
            ("!=", BuiltinKind::Bool),
        ]
    };
    match kind {
        BuiltinKind::Int => arith(BuiltinKind::Int),
        BuiltinKind::Float => arith(BuiltinKind::Float),
        BuiltinKind::Bool => vec![
            ("and", BuiltinKind::Bool),
            ("or", BuiltinKind::Bool),
            ("==", BuiltinKind::Bool),
            ("!=", BuiltinKind::Bool),
        ],
        BuiltinKind::String => vec![
            ("+", BuiltinKind::String),
            ("==", BuiltinKind::Bool),
            ("!=", BuiltinKind::Bool),
        ],
        BuiltinKind::Anything | BuiltinKind::Nothing => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Type-check a module.
///
/// Runs the redeclaration check, constraint generation, the solver, and the
/// dispatcher, in that order. On success every expression node carries a
/// reified type and every identifier a unique symbol. On failure all
/// accumulated diagnostics are returned; the AST is still annotated as far
/// as solving got, with `Error` types on ill-typed nodes.
pub fn type_check(module: &mut Module, ctx: &mut CompilerContext) -> Result<(), DiagnosticError> {
    check_redeclarations(module, &mut ctx.diags);
    generate::run(module, ctx);

    let constraints = ctx.constraints.drain();
    let substitution = {
        let mut solver = solve::Solver::new(
            &mut ctx.store,
            &module.scopes,
            &module.symbols,
            &ctx.builtin_members,
            &mut ctx.diags,
            ctx.max_branches,
            ctx.trace_solver,
        );
        let substitution = solver.solve(constraints);
        ctx.solver_trace = solver.take_trace();
        substitution
    };

    dispatch::run(module, ctx, &substitution);

    if ctx.has_errors() {
        Err(DiagnosticError::new(std::mem::take(&mut ctx.diags)))
    } else {
        Ok(())
    }
}

/// Flag name collisions the name binder let through.
///
/// Overloadable symbols (functions) may share a name within a scope; mixing
/// them with a non-overloadable symbol is an invalid redeclaration, and two
/// non-overloadable symbols are a duplicate declaration.
fn check_redeclarations(module: &Module, diags: &mut Vec<Diagnostic>) {
    for (_, scope) in module.scopes.iter() {
        for (name, syms) in &scope.symbols {
            if syms.len() < 2 {
                continue;
            }
            let non_overloadable = syms
                .iter()
                .filter(|sym| !module.symbols.symbol(**sym).overloadable)
                .count();
            if non_overloadable == 0 {
                continue;
            }
            let category = if non_overloadable == syms.len() {
                Category::DuplicateDeclaration
            } else {
                Category::InvalidRedeclaration
            };
            diags.push(Diagnostic::error(
                category,
                format!("`{name}` is declared more than once in this scope"),
            ));
        }
    }
}

/// The member scope of a type, with the placeholder substitution member
/// types must be closed with. Shared by the solver (member and construction
/// constraints) and the dispatcher (operator rewriting).
pub(crate) fn member_scope_of(
    store: &TypeStore,
    builtin_members: &BTreeMap<BuiltinKind, ScopeId>,
    ty: TypeId,
) -> Option<(ScopeId, BTreeMap<TypeId, TypeId>)> {
    use veld_types::TypeKind;
    match store.kind(ty) {
        TypeKind::Builtin(kind) => builtin_members
            .get(kind)
            .map(|scope| (*scope, BTreeMap::new())),
        TypeKind::Nominal(nominal) => Some((nominal.member_scope, BTreeMap::new())),
        TypeKind::OpenedNominal { base, openings } => {
            let (scope, _) = member_scope_of(store, builtin_members, *base)?;
            Some((scope, openings.iter().copied().collect()))
        }
        TypeKind::BoundGeneric { base, bindings } => {
            let (scope, _) = member_scope_of(store, builtin_members, *base)?;
            Some((scope, bindings.iter().copied().collect()))
        }
        _ => None,
    }
}


#[cfg(test)]
mod prop_tests;
