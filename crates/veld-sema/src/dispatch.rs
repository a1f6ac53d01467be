//! Dispatcher: reify solved types into the AST and pick declaration symbols.
//!
//! Runs after the solver. Every node type slot is rewritten to the
//! substitution fixpoint (rebuilt through the store, so reified types stay
//! interned), every identifier is resolved to exactly one symbol via the
//! specialization check, and binary expressions are rewritten into explicit
//! `lhs.op(rhs)` call form so downstream passes see a uniform invocation
//! shape.

use std::collections::BTreeMap;

use veld_ast::{
    Arg, BindOp, Block, Decl, Expr, ExprKind, Ident, Lit, Module, ScopeTable, Span, Stmt,
    SymbolTable,
};
use veld_diag::{Category, Diagnostic};
use veld_types::{
    BuiltinKind, ScopeId, Substitution, SymbolId, TypeId, TypeKind, TypeStore,
};

use crate::{member_scope_of, span_to_location, CompilerContext};

/// Run the dispatcher over a solved module.
pub fn run(module: &mut Module, ctx: &mut CompilerContext, subst: &Substitution) {
    // Symbol types first: identifier dispatch compares against them.
    for idx in 0..module.symbols.len() {
        let id = SymbolId(idx as u32);
        if let Some(ty) = module.symbols.symbol(id).ty {
            let reified = subst.reify(&mut ctx.store, ty);
            module.symbols.symbol_mut(id).ty = Some(reified);
        }
    }

    let decls = &mut module.decls;
    let mut dispatcher = Dispatcher {
        store: &mut ctx.store,
        scopes: &module.scopes,
        symbols: &module.symbols,
        builtin_members: &ctx.builtin_members,
        subst,
        diags: &mut ctx.diags,
    };
    for decl in decls.iter_mut() {
        dispatcher.visit_decl(decl);
    }
}

struct Dispatcher<'a> {
    store: &'a mut TypeStore,
    scopes: &'a ScopeTable,
    symbols: &'a SymbolTable,
    builtin_members: &'a BTreeMap<BuiltinKind, ScopeId>,
    subst: &'a Substitution,
    diags: &'a mut Vec<Diagnostic>,
}

impl Dispatcher<'_> {
    fn reify_slot(&mut self, slot: &mut Option<TypeId>) {
        if let Some(ty) = *slot {
            *slot = Some(self.subst.reify(self.store, ty));
        }
    }

    fn has_errors(&self) -> bool {
        self.diags.iter().any(Diagnostic::is_error)
    }

    fn visit_decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Prop(prop) => {
                self.reify_slot(&mut prop.ty);
                if let Some((_, value)) = &mut prop.init {
                    self.visit_expr(value);
                }
            }
            Decl::Fun(fun) => {
                self.reify_slot(&mut fun.ty);
                for param in &mut fun.params {
                    self.reify_slot(&mut param.ty);
                    if let Some(default) = &mut param.default {
                        self.visit_expr(default);
                    }
                }
                if let Some(body) = &mut fun.body {
                    self.visit_block(body);
                }
            }
            Decl::Nominal(nominal) => {
                self.reify_slot(&mut nominal.ty);
                for member in &mut nominal.members {
                    self.visit_decl(member);
                }
            }
        }
    }

    fn visit_block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Decl(decl) => self.visit_decl(decl),
                Stmt::Bind { lvalue, rvalue, .. } => {
                    self.visit_expr(rvalue);
                    self.visit_expr(lvalue);
                }
                Stmt::Return { value, .. } => {
                    if let Some(value) = value {
                        self.visit_expr(value);
                    }
                }
                Stmt::Expr(expr) => self.visit_expr(expr),
            }
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr) {
        match &mut expr.kind {
            ExprKind::Lit(_) | ExprKind::Ident(_) => {}
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
            }
            ExprKind::Call { callee, args } | ExprKind::Subscript { callee, args } => {
                for arg in args.iter_mut() {
                    self.visit_expr(&mut arg.value);
                }
                self.visit_expr(callee);
            }
            ExprKind::Select { owner, .. } => {
                if let Some(owner) = owner {
                    self.visit_expr(owner);
                }
            }
            ExprKind::Lambda { params, body, .. } => {
                for param in params.iter_mut() {
                    self.reify_slot(&mut param.ty);
                    if let Some(default) = &mut param.default {
                        self.visit_expr(default);
                    }
                }
                self.visit_block(body);
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(condition);
                self.visit_block(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_block(else_branch);
                }
            }
        }

        self.reify_slot(&mut expr.ty);
        if let Some(ty) = expr.ty {
            if !self.store.free_vars(ty).is_empty() {
                if !self.has_errors() {
                    self.diags.push(
                        Diagnostic::error(
                            Category::ConstraintMismatch,
                            "could not infer the type of this expression",
                        )
                        .at(span_to_location(expr.span)),
                    );
                }
                expr.ty = Some(self.store.error());
            }
        }

        self.dispatch(expr);
        self.rewrite_binary(expr);
    }

    // -- Identifier dispatch -------------------------------------------------

    fn dispatch(&mut self, expr: &mut Expr) {
        let node_ty = expr.ty;
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Ident(ident) => self.dispatch_ident(ident, node_ty, span),
            ExprKind::Select { owner, member } => {
                let owner_ty = match owner {
                    Some(owner) => owner.ty,
                    // Static access: the selected member's own type names
                    // the subject.
                    None => node_ty,
                };
                let has_receiver = owner.is_some();
                self.dispatch_member(member, owner_ty, node_ty, has_receiver, span);
            }
            _ => {}
        }
    }

    fn dispatch_ident(&mut self, ident: &mut Ident, node_ty: Option<TypeId>, span: Span) {
        let Some(node_ty) = node_ty else { return };
        if matches!(self.store.kind(node_ty), TypeKind::Error) {
            return;
        }
        let candidates = self.scopes.lookup(ident.scope, &ident.name, self.symbols);
        if candidates.is_empty() {
            return;
        }

        let chosen = if matches!(self.store.kind(node_ty), TypeKind::Fun(_)) {
            let mut pool = candidates;
            // A lone metatype symbol under a function-typed use is a
            // constructor invocation: dispatch among the type's `new`
            // members instead.
            if pool.len() == 1 {
                if let Some(redirected) = self.constructor_pool(pool[0]) {
                    pool = redirected;
                }
            }
            let mut filtered = Vec::new();
            for sym in pool {
                if self.candidate_matches(node_ty, sym) {
                    filtered.push(sym);
                }
            }
            match filtered.len() {
                0 => {
                    self.diags.push(
                        Diagnostic::error(
                            Category::NoViableOverload,
                            format!(
                                "no overload of `{}` has type `{}`",
                                ident.name,
                                self.store.display(node_ty)
                            ),
                        )
                        .at(span_to_location(span)),
                    );
                    None
                }
                1 => Some(filtered[0]),
                _ => {
                    self.diags.push(
                        Diagnostic::error(
                            Category::AmbiguousConstraint,
                            format!("ambiguous reference to `{}`", ident.name),
                        )
                        .at(span_to_location(span)),
                    );
                    Some(filtered[0])
                }
            }
        } else {
            if candidates.len() > 1 {
                self.diags.push(
                    Diagnostic::error(
                        Category::AmbiguousConstraint,
                        format!("ambiguous reference to `{}`", ident.name),
                    )
                    .at(span_to_location(span)),
                );
            }
            Some(candidates[0])
        };
        ident.symbol = chosen;
    }

    /// When `sym` is the metatype of a nominal with constructors, the
    /// constructor symbols to dispatch among instead.
    fn constructor_pool(&self, sym: SymbolId) -> Option<Vec<SymbolId>> {
        let sym_ty = self.symbols.symbol(sym).ty?;
        let TypeKind::Meta(inner) = *self.store.kind(sym_ty) else {
            return None;
        };
        let (scope, _) = member_scope_of(self.store, self.builtin_members, inner)?;
        let ctors = self.scopes.lookup_local(scope, "new");
        if ctors.is_empty() {
            None
        } else {
            Some(ctors.to_vec())
        }
    }

    fn candidate_matches(&self, node_ty: TypeId, sym: SymbolId) -> bool {
        let symbol = self.symbols.symbol(sym);
        let Some(cand) = symbol.ty else { return false };
        let mut bindings = BTreeMap::new();
        if self.specializes(node_ty, cand, &mut bindings) {
            return true;
        }
        // A method used through a receiver carries the applied (inner)
        // signature; retry against the candidate with the self parameter
        // unwrapped.
        if symbol.is_method {
            if let TypeKind::Fun(fun) = self.store.kind(cand) {
                let mut bindings = BTreeMap::new();
                return self.specializes(node_ty, fun.codomain, &mut bindings);
            }
        }
        false
    }

    /// Whether `concrete` is an instance of `candidate`, treating the
    /// candidate's placeholders as bindable and qualifiers loosely.
    fn specializes(
        &self,
        concrete: TypeId,
        candidate: TypeId,
        bindings: &mut BTreeMap<TypeId, TypeId>,
    ) -> bool {
        if concrete == candidate {
            return true;
        }
        if matches!(self.store.kind(concrete), TypeKind::Error) {
            return true;
        }
        match self.store.kind(candidate).clone() {
            TypeKind::Placeholder { .. } => {
                let key = self.store.unqualified_lookup(candidate);
                match bindings.get(&key) {
                    Some(bound) => {
                        self.store.unqualified_lookup(*bound)
                            == self.store.unqualified_lookup(concrete)
                    }
                    None => {
                        bindings.insert(key, concrete);
                        true
                    }
                }
            }
            TypeKind::Fun(cand_fun) => {
                let TypeKind::Fun(conc_fun) = self.store.kind(concrete).clone() else {
                    return false;
                };
                if conc_fun.params.len() != cand_fun.params.len() {
                    return false;
                }
                for ((conc_label, _), (cand_label, _)) in
                    conc_fun.params.iter().zip(cand_fun.params.iter())
                {
                    if conc_label != cand_label {
                        return false;
                    }
                }
                for ((_, conc_param), (_, cand_param)) in
                    conc_fun.params.iter().zip(cand_fun.params.iter())
                {
                    if !self.specializes(*conc_param, *cand_param, bindings) {
                        return false;
                    }
                }
                self.specializes(conc_fun.codomain, cand_fun.codomain, bindings)
            }
            TypeKind::Meta(cand_inner) => {
                let TypeKind::Meta(conc_inner) = *self.store.kind(concrete) else {
                    return false;
                };
                self.specializes(conc_inner, cand_inner, bindings)
            }
            TypeKind::BoundGeneric {
                base: cand_base,
                bindings: cand_map,
            } => {
                let TypeKind::BoundGeneric {
                    base: conc_base,
                    bindings: conc_map,
                } = self.store.kind(concrete).clone()
                else {
                    return false;
                };
                if self.store.unqualified_lookup(conc_base)
                    != self.store.unqualified_lookup(cand_base)
                {
                    return false;
                }
                let conc_map: BTreeMap<TypeId, TypeId> = conc_map.into_iter().collect();
                for (ph, cand_value) in cand_map {
                    if let Some(conc_value) = conc_map.get(&ph) {
                        if !self.specializes(*conc_value, cand_value, bindings) {
                            return false;
                        }
                    }
                }
                true
            }
            _ => {
                self.store.unqualified_lookup(concrete)
                    == self.store.unqualified_lookup(candidate)
            }
        }
    }

    /// Resolve the symbol of a `Select` member.
    fn dispatch_member(
        &mut self,
        member: &mut Ident,
        owner_ty: Option<TypeId>,
        node_ty: Option<TypeId>,
        has_receiver: bool,
        span: Span,
    ) {
        let (Some(owner_ty), Some(node_ty)) = (owner_ty, node_ty) else {
            return;
        };
        if matches!(self.store.kind(owner_ty), TypeKind::Error)
            || matches!(self.store.kind(node_ty), TypeKind::Error)
        {
            return;
        }
        let subject = match *self.store.kind(owner_ty) {
            TypeKind::Meta(inner) => inner,
            _ => owner_ty,
        };
        let is_static = !has_receiver || matches!(self.store.kind(owner_ty), TypeKind::Meta(_));
        let Some((scope, _)) = member_scope_of(self.store, self.builtin_members, subject) else {
            return;
        };
        let candidates = self.scopes.lookup_local(scope, &member.name).to_vec();
        if candidates.is_empty() {
            return;
        }

        let applied = if is_static {
            None
        } else {
            Some(self.store.fun(vec![(None, owner_ty)], node_ty, Vec::new()))
        };
        let mut filtered = Vec::new();
        for sym in candidates {
            let symbol = self.symbols.symbol(sym);
            let Some(cand) = symbol.ty else { continue };
            let mut bindings = BTreeMap::new();
            let matched = match (symbol.is_method, applied) {
                (true, Some(applied)) => self.specializes(applied, cand, &mut bindings),
                _ => self.specializes(node_ty, cand, &mut bindings),
            };
            if matched {
                filtered.push(sym);
            }
        }

        match filtered.len() {
            0 => {
                if !self.has_errors() {
                    self.diags.push(
                        Diagnostic::error(
                            Category::NoViableOverload,
                            format!("no member `{}` matches this use", member.name),
                        )
                        .at(span_to_location(span)),
                    );
                }
            }
            1 => member.symbol = Some(filtered[0]),
            _ => {
                self.diags.push(
                    Diagnostic::error(
                        Category::AmbiguousConstraint,
                        format!("ambiguous reference to member `{}`", member.name),
                    )
                    .at(span_to_location(span)),
                );
                member.symbol = Some(filtered[0]);
            }
        }
    }

    // -- Binary rewriting ----------------------------------------------------

    /// Rewrite `lhs op rhs` into `lhs.op(rhs)` call form, carrying the
    /// resolved method symbol and types over.
    fn rewrite_binary(&mut self, expr: &mut Expr) {
        let (chosen, member_scope, method_ty) = {
            let ExprKind::Binary { op, lhs, rhs } = &expr.kind else {
                return;
            };
            let (Some(owner_ty), Some(rhs_ty), Some(result_ty)) = (lhs.ty, rhs.ty, expr.ty)
            else {
                return;
            };
            if matches!(self.store.kind(owner_ty), TypeKind::Error)
                || matches!(self.store.kind(result_ty), TypeKind::Error)
            {
                return;
            }
            let Some((scope, _)) = member_scope_of(self.store, self.builtin_members, owner_ty)
            else {
                return;
            };
            let expected = self.store.fun(vec![(None, rhs_ty)], result_ty, Vec::new());
            let applied = self.store.fun(vec![(None, owner_ty)], expected, Vec::new());

            let mut chosen = None;
            for sym in self.scopes.lookup_local(scope, op.name()) {
                let symbol = self.symbols.symbol(*sym);
                let Some(cand) = symbol.ty else { continue };
                let mut bindings = BTreeMap::new();
                let matched = if symbol.is_method {
                    self.specializes(applied, cand, &mut bindings)
                } else {
                    self.specializes(expected, cand, &mut bindings)
                };
                if matched {
                    chosen = Some(*sym);
                    break;
                }
            }
            let Some(chosen) = chosen else { return };
            (chosen, scope, expected)
        };

        let span = expr.span;
        let ExprKind::Binary { op, lhs, rhs } =
            std::mem::replace(&mut expr.kind, ExprKind::Lit(Lit::Bool(false)))
        else {
            unreachable!("checked above");
        };
        let mut member = Ident::new(op.name(), member_scope, span);
        member.symbol = Some(chosen);
        let select = Expr {
            kind: ExprKind::Select {
                owner: Some(lhs),
                member,
            },
            span,
            ty: Some(method_ty),
        };
        expr.kind = ExprKind::Call {
            callee: Box::new(select),
            args: vec![Arg {
                label: None,
                op: BindOp::Copy,
                value: *rhs,
            }],
        };
    }
}
