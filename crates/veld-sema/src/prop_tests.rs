//! Property tests for the type store and the solver using proptest.
//!
//! These stress invariants that must hold for ANY input types, not just
//! hand-picked examples:
//!
//! 1. Interning is canonical: equal structure means equal handle
//! 2. Reification is idempotent: reify(reify(t)) == reify(t)
//! 3. Unification is reflexive: solving `t = t` never errors
//! 4. Occurs check: no substitution ever maps a variable into itself
//! 5. Opening then closing with the inverse bindings round-trips
//! 6. Disjunction exploration is deterministic: first viable wins

use std::collections::BTreeMap;

use proptest::prelude::*;

use veld_ast::{FileId, Module, Span};
use veld_types::{BuiltinKind, DeclId, QualSet, Substitution, TypeId, TypeKind, TypeStore};

use crate::solve::Solver;
use crate::{Constraint, ConstraintKind, Provenance, Reason};

fn prov() -> Provenance {
    Provenance::new(Span::new(FileId(0), 0, 1), Reason::Identifier)
}

// ---------------------------------------------------------------------------
// Type recipes: buildable descriptions of types
// ---------------------------------------------------------------------------

/// A structural description of a type, built into a [`TypeStore`] on use.
/// Variables are drawn from a shared pool so the same index names the same
/// inference variable.
#[derive(Debug, Clone)]
enum TyRecipe {
    Bool,
    Int,
    Float,
    Str,
    Var(u8),
    Fun(Vec<TyRecipe>, Box<TyRecipe>),
    Meta(Box<TyRecipe>),
}

fn build(store: &mut TypeStore, vars: &mut Vec<TypeId>, recipe: &TyRecipe) -> TypeId {
    match recipe {
        TyRecipe::Bool => store.builtin(BuiltinKind::Bool, QualSet::empty()),
        TyRecipe::Int => store.builtin(BuiltinKind::Int, QualSet::empty()),
        TyRecipe::Float => store.builtin(BuiltinKind::Float, QualSet::empty()),
        TyRecipe::Str => store.builtin(BuiltinKind::String, QualSet::empty()),
        TyRecipe::Var(index) => {
            while vars.len() <= *index as usize {
                let fresh = store.fresh_var();
                vars.push(fresh);
            }
            vars[*index as usize]
        }
        TyRecipe::Fun(params, codomain) => {
            let params = params
                .iter()
                .map(|param| (None, build(store, vars, param)))
                .collect();
            let codomain = build(store, vars, codomain);
            store.fun(params, codomain, Vec::new())
        }
        TyRecipe::Meta(inner) => {
            let inner = build(store, vars, inner);
            store.meta(inner)
        }
    }
}

fn arb_ground() -> impl Strategy<Value = TyRecipe> {
    let leaf = prop_oneof![
        Just(TyRecipe::Bool),
        Just(TyRecipe::Int),
        Just(TyRecipe::Float),
        Just(TyRecipe::Str),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (prop::collection::vec(inner.clone(), 0..3), inner.clone())
                .prop_map(|(params, codomain)| TyRecipe::Fun(params, Box::new(codomain))),
            inner.prop_map(|t| TyRecipe::Meta(Box::new(t))),
        ]
    })
}

fn arb_recipe() -> impl Strategy<Value = TyRecipe> {
    let leaf = prop_oneof![
        Just(TyRecipe::Bool),
        Just(TyRecipe::Int),
        Just(TyRecipe::Float),
        Just(TyRecipe::Str),
        (0u8..4).prop_map(TyRecipe::Var),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            (prop::collection::vec(inner.clone(), 0..3), inner.clone())
                .prop_map(|(params, codomain)| TyRecipe::Fun(params, Box::new(codomain))),
            inner.prop_map(|t| TyRecipe::Meta(Box::new(t))),
        ]
    })
}

/// Solve constraints against an empty module, returning the substitution
/// and accumulated diagnostics.
fn solve(
    store: &mut TypeStore,
    constraints: Vec<Constraint>,
) -> (Substitution, Vec<veld_diag::Diagnostic>) {
    let module = Module::new("props");
    let builtin_members = BTreeMap::new();
    let mut diags = Vec::new();
    let subst = {
        let mut solver = Solver::new(
            store,
            &module.scopes,
            &module.symbols,
            &builtin_members,
            &mut diags,
            4096,
            false,
        );
        solver.solve(constraints)
    };
    (subst, diags)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Building the same ground structure twice interns to the same handle.
    #[test]
    fn interning_is_canonical(recipe in arb_ground()) {
        let mut store = TypeStore::new();
        let mut vars = Vec::new();
        let first = build(&mut store, &mut vars, &recipe);
        let second = build(&mut store, &mut vars, &recipe);
        prop_assert_eq!(first, second);
    }

    /// Applying the substitution to fixpoint is idempotent.
    #[test]
    fn reify_is_idempotent(recipe in arb_recipe(), targets in prop::collection::vec(arb_ground(), 4)) {
        let mut store = TypeStore::new();
        let mut vars = Vec::new();
        let ty = build(&mut store, &mut vars, &recipe);

        let mut subst = Substitution::new();
        for (var, target) in vars.clone().into_iter().zip(targets.iter()) {
            let TypeKind::Var(v) = *store.kind(var) else { unreachable!() };
            let target = build(&mut store, &mut vars, target);
            subst.bind(v, target);
        }

        let once = subst.reify(&mut store, ty);
        let twice = subst.reify(&mut store, once);
        prop_assert_eq!(once, twice);
    }

    /// Unifying a type with itself always succeeds.
    #[test]
    fn unification_is_reflexive(recipe in arb_recipe()) {
        let mut store = TypeStore::new();
        let mut vars = Vec::new();
        let ty = build(&mut store, &mut vars, &recipe);
        let (_, diags) = solve(
            &mut store,
            vec![Constraint::new(ConstraintKind::Equal(ty, ty), prov())],
        );
        prop_assert!(diags.is_empty(), "reflexive unification failed: {diags:?}");
    }

    /// After solving, both sides of a successful equality reify to the same
    /// handle, and no binding maps a variable into itself.
    #[test]
    fn unification_is_consistent(left in arb_recipe(), right in arb_recipe()) {
        let mut store = TypeStore::new();
        let mut vars = Vec::new();
        let a = build(&mut store, &mut vars, &left);
        let b = build(&mut store, &mut vars, &right);
        let (subst, diags) = solve(
            &mut store,
            vec![Constraint::new(ConstraintKind::Equal(a, b), prov())],
        );
        if diags.is_empty() {
            let ra = subst.reify(&mut store, a);
            let rb = subst.reify(&mut store, b);
            prop_assert_eq!(ra, rb);
        }
        for (var, target) in subst.bindings() {
            prop_assert!(
                !subst.occurs(&store, *var, *target),
                "binding ${} is cyclic",
                var.0
            );
        }
    }

    /// Binding a variable into a structure containing itself is rejected.
    #[test]
    fn occurs_check_rejects_infinite_types(params in prop::collection::vec(arb_ground(), 0..3)) {
        let mut store = TypeStore::new();
        let mut vars = Vec::new();
        let var = build(&mut store, &mut vars, &TyRecipe::Var(0));
        let mut fun_params = vec![(None, var)];
        for param in &params {
            let built = build(&mut store, &mut vars, param);
            fun_params.push((None, built));
        }
        let int = store.builtin(BuiltinKind::Int, QualSet::empty());
        let cyclic = store.fun(fun_params, int, Vec::new());

        let (subst, diags) = solve(
            &mut store,
            vec![Constraint::new(ConstraintKind::Equal(var, cyclic), prov())],
        );
        prop_assert!(!diags.is_empty(), "occurs check did not fire");
        prop_assert!(subst.is_empty());
    }

    /// Opening a generic function and closing with the inverse bindings
    /// yields the original.
    #[test]
    fn open_close_round_trips(use_ph in prop::collection::vec(any::<bool>(), 1..4)) {
        let mut store = TypeStore::new();
        let ph = store.placeholder("T", DeclId(0));
        let int = store.builtin(BuiltinKind::Int, QualSet::empty());
        let params: Vec<(Option<String>, TypeId)> = use_ph
            .iter()
            .map(|&p| (None, if p { ph } else { int }))
            .collect();
        let generic = store.fun(params, ph, vec![ph]);

        let mut bindings = BTreeMap::new();
        let opened = store.open(generic, &mut bindings);

        let mut inverse = Substitution::new();
        for (ph, var) in &bindings {
            let TypeKind::Var(v) = *store.kind(*var) else { unreachable!() };
            inverse.bind(v, *ph);
        }
        let closed = inverse.reify(&mut store, opened);

        let TypeKind::Fun(original) = store.kind(generic).clone() else { unreachable!() };
        let TypeKind::Fun(round_tripped) = store.kind(closed).clone() else {
            panic!("closing a function yields a function");
        };
        prop_assert_eq!(original.params, round_tripped.params);
        prop_assert_eq!(original.codomain, round_tripped.codomain);
    }

    /// The same disjunction solved twice picks the same branch: first
    /// viable in source order.
    #[test]
    fn disjunction_choice_is_deterministic(seed in any::<u8>()) {
        let _ = seed;
        let mut results = Vec::new();
        for _ in 0..2 {
            let mut store = TypeStore::new();
            let var = store.fresh_var();
            let TypeKind::Var(v) = *store.kind(var) else { unreachable!() };
            let int = store.builtin(BuiltinKind::Int, QualSet::empty());
            let bool_ty = store.builtin(BuiltinKind::Bool, QualSet::empty());
            let branches = vec![
                Constraint::new(ConstraintKind::Equal(var, int), prov()),
                Constraint::new(ConstraintKind::Equal(var, bool_ty), prov()),
            ];
            let (subst, diags) = solve(
                &mut store,
                vec![Constraint::new(ConstraintKind::Disjunction(branches), prov())],
            );
            // Both branches are viable: ambiguity is reported, the first
            // branch is adopted.
            prop_assert!(!diags.is_empty());
            let bound = subst.lookup(v).expect("variable was bound");
            prop_assert_eq!(bound, int);
            results.push(bound);
        }
        prop_assert_eq!(results[0], results[1]);
    }
}
