//! Constraint generation: AST traversal emitting typing constraints.
//!
//! A single leaves-before-parents pass. Every expression whose type is not
//! syntactically fixed gets a fresh type variable; declarations additionally
//! get their symbol types assigned so later identifier uses can constrain
//! against them. Two sub-passes run per declaration list: a declaration
//! pre-pass that synthesizes symbol types (so forward references work), then
//! the constraint walk proper.

use std::collections::BTreeMap;

use veld_ast::{
    Annot, AnnotKind, Arg, BindOp, Block, Decl, Expr, ExprKind, FunDecl, FunKind, Ident, Lit,
    Module, NominalDecl, PropDecl, ScopeTable, Span, Stmt, SymbolTable,
};
use veld_diag::{Category, Diagnostic};
use veld_types::{BuiltinKind, NominalType, QualSet, SymbolId, TypeId, TypeKind, TypeStore};

use crate::{
    span_to_location, CompilerContext, Constraint, ConstraintKind, ConstraintSet, Provenance,
    Reason,
};

/// Run constraint generation over a module.
pub fn run(module: &mut Module, ctx: &mut CompilerContext) {
    let decls = &mut module.decls;
    let mut creator = ConstraintCreator {
        store: &mut ctx.store,
        constraints: &mut ctx.constraints,
        diags: &mut ctx.diags,
        scopes: &module.scopes,
        symbols: &mut module.symbols,
        codomains: Vec::new(),
        selves: Vec::new(),
    };
    for decl in decls.iter_mut() {
        creator.declare_decl(decl, None);
    }
    for decl in decls.iter_mut() {
        creator.visit_decl(decl);
    }
}

/// The generic context a nominal declaration provides to its members.
struct NominalCtx {
    self_ty: TypeId,
    placeholders: Vec<TypeId>,
}

struct ConstraintCreator<'a> {
    store: &'a mut TypeStore,
    constraints: &'a mut ConstraintSet,
    diags: &'a mut Vec<Diagnostic>,
    scopes: &'a ScopeTable,
    symbols: &'a mut SymbolTable,
    /// Codomain variables of enclosing functions, innermost last.
    codomains: Vec<TypeId>,
    /// `Self` types of enclosing nominal declarations, innermost last.
    selves: Vec<TypeId>,
}

impl ConstraintCreator<'_> {
    fn push(&mut self, kind: ConstraintKind, span: Span, reason: Reason) {
        self.constraints
            .push(Constraint::new(kind, Provenance::new(span, reason)));
    }

    /// The symbol's semantic type, assigning a fresh variable on first use.
    fn symbol_type(&mut self, sym: SymbolId) -> TypeId {
        if let Some(ty) = self.symbols.symbol(sym).ty {
            return ty;
        }
        let var = self.store.fresh_var();
        self.symbols.symbol_mut(sym).ty = Some(var);
        var
    }

    fn nothing(&mut self) -> TypeId {
        self.store.builtin(BuiltinKind::Nothing, QualSet::empty())
    }

    // -- Declaration pre-pass -----------------------------------------------

    fn declare_decl(&mut self, decl: &mut Decl, enclosing: Option<&NominalCtx>) {
        match decl {
            Decl::Prop(prop) => {
                let var = self.store.fresh_var();
                prop.ty = Some(var);
                self.symbols.symbol_mut(prop.sym).ty = Some(var);
            }
            Decl::Fun(fun) => self.declare_fun(fun, enclosing),
            Decl::Nominal(nominal) => self.declare_nominal(nominal),
        }
    }

    fn declare_nominal(&mut self, decl: &mut NominalDecl) {
        let mut placeholders = Vec::with_capacity(decl.placeholders.len());
        for name in &decl.placeholders {
            let ph = self.store.placeholder(name.clone(), decl.decl_id);
            placeholders.push(ph);
            let meta = self.store.meta(ph);
            if let Some(sym) = self
                .scopes
                .lookup_local(decl.member_scope, name)
                .first()
                .copied()
            {
                self.symbols.symbol_mut(sym).ty = Some(meta);
            }
        }

        let nominal_ty = self.store.nominal(
            NominalType {
                kind: decl.kind,
                name: decl.name.clone(),
                decl: decl.decl_id,
                member_scope: decl.member_scope,
                placeholders: placeholders.clone(),
            },
            QualSet::empty(),
        );
        let meta = self.store.meta(nominal_ty);
        decl.ty = Some(meta);
        self.symbols.symbol_mut(decl.sym).ty = Some(meta);

        let self_ty = self.self_type(nominal_ty, &placeholders);
        let ctx = NominalCtx {
            self_ty,
            placeholders,
        };
        for member in &mut decl.members {
            self.declare_decl(member, Some(&ctx));
        }
    }

    /// The `Self` type inside a nominal: the nominal itself, or a bound
    /// generic mapping every placeholder to itself so opening a member
    /// signature re-binds the specialization arguments.
    fn self_type(&mut self, nominal_ty: TypeId, placeholders: &[TypeId]) -> TypeId {
        if placeholders.is_empty() {
            nominal_ty
        } else {
            let bindings = placeholders.iter().map(|ph| (*ph, *ph)).collect();
            self.store.bound_generic(nominal_ty, bindings)
        }
    }

    fn declare_fun(&mut self, decl: &mut FunDecl, enclosing: Option<&NominalCtx>) {
        let mut placeholders = Vec::new();
        if !matches!(decl.kind, FunKind::Regular) {
            if let Some(ctx) = enclosing {
                placeholders.extend(ctx.placeholders.iter().copied());
            }
        }
        for name in &decl.placeholders {
            let ph = self.store.placeholder(name.clone(), decl.decl_id);
            placeholders.push(ph);
            let meta = self.store.meta(ph);
            if let Some(sym) = self.scopes.lookup_local(decl.scope, name).first().copied() {
                self.symbols.symbol_mut(sym).ty = Some(meta);
            }
        }

        let mut params = Vec::with_capacity(decl.params.len());
        for param in &mut decl.params {
            let var = self.store.fresh_var();
            param.ty = Some(var);
            self.symbols.symbol_mut(param.sym).ty = Some(var);
            params.push((param.label.clone(), var));
        }
        let codomain = self.store.fresh_var();

        let fun_ty = match decl.kind {
            FunKind::Method | FunKind::Destructor => {
                let self_ty = enclosing
                    .map(|ctx| ctx.self_ty)
                    .unwrap_or_else(|| self.store.error());
                let inner = self.store.fun(params, codomain, Vec::new());
                self.store.fun(vec![(None, self_ty)], inner, placeholders)
            }
            FunKind::Regular | FunKind::Constructor => {
                self.store.fun(params, codomain, placeholders)
            }
        };
        decl.ty = Some(fun_ty);
        self.symbols.symbol_mut(decl.sym).ty = Some(fun_ty);
    }

    /// The codomain variable synthesized for a function declaration.
    fn codomain_of(&self, decl: &FunDecl) -> TypeId {
        let fun_ty = decl.ty.expect("function declared before visit");
        let TypeKind::Fun(outer) = self.store.kind(fun_ty) else {
            unreachable!("function declarations carry function types");
        };
        match decl.kind {
            FunKind::Method | FunKind::Destructor => {
                let TypeKind::Fun(inner) = self.store.kind(outer.codomain) else {
                    unreachable!("methods are curried");
                };
                inner.codomain
            }
            FunKind::Regular | FunKind::Constructor => outer.codomain,
        }
    }

    // -- Constraint walk ----------------------------------------------------

    fn visit_decl(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Prop(prop) => self.visit_prop(prop),
            Decl::Fun(fun) => self.visit_fun(fun),
            Decl::Nominal(nominal) => self.visit_nominal(nominal),
        }
    }

    fn visit_prop(&mut self, decl: &mut PropDecl) {
        let ty = decl.ty.expect("property declared before visit");
        if let Some(annot) = &decl.annot {
            let realized = self.realize(annot);
            self.push(
                ConstraintKind::Equal(ty, realized),
                annot.span,
                Reason::Annotation,
            );
        }
        if let Some((op, value)) = &mut decl.init {
            let op = *op;
            self.visit_expr(value);
            let rvalue = value.ty.expect("visited expression has a type");
            let span = value.span;
            self.push(
                ConstraintKind::Conforms {
                    rvalue,
                    lvalue: ty,
                    op: Some(op),
                },
                span,
                Reason::Rvalue,
            );
        }
    }

    fn visit_fun(&mut self, decl: &mut FunDecl) {
        for param in &mut decl.params {
            let ty = param.ty.expect("parameter declared before visit");
            if let Some(annot) = &param.annot {
                let realized = self.realize(annot);
                self.push(
                    ConstraintKind::Equal(ty, realized),
                    annot.span,
                    Reason::Annotation,
                );
            }
            if let Some(default) = &mut param.default {
                self.visit_expr(default);
                let rvalue = default.ty.expect("visited expression has a type");
                let span = default.span;
                self.push(
                    ConstraintKind::Conforms {
                        rvalue,
                        lvalue: ty,
                        op: Some(BindOp::Copy),
                    },
                    span,
                    Reason::ParamDefault,
                );
            }
        }

        let codomain = self.codomain_of(decl);
        match decl.kind {
            FunKind::Constructor => {
                let self_ty = self
                    .selves
                    .last()
                    .copied()
                    .unwrap_or_else(|| self.store.error());
                self.push(
                    ConstraintKind::Equal(codomain, self_ty),
                    decl.span,
                    Reason::ConstructorCodomain,
                );
            }
            FunKind::Destructor => {
                let nothing = self.nothing();
                self.push(
                    ConstraintKind::Equal(codomain, nothing),
                    decl.span,
                    Reason::Codomain,
                );
            }
            FunKind::Regular | FunKind::Method => {
                let (declared, span) = match &decl.codomain {
                    Some(annot) => (self.realize(annot), annot.span),
                    None => (self.nothing(), decl.span),
                };
                self.push(
                    ConstraintKind::Equal(codomain, declared),
                    span,
                    Reason::Codomain,
                );
            }
        }

        if let Some(body) = &mut decl.body {
            self.codomains.push(codomain);
            self.visit_block(body);
            self.codomains.pop();
        }
    }

    fn visit_nominal(&mut self, decl: &mut NominalDecl) {
        let meta = decl.ty.expect("nominal declared before visit");
        let TypeKind::Meta(nominal_ty) = *self.store.kind(meta) else {
            unreachable!("nominal declarations carry metatypes");
        };
        let TypeKind::Nominal(nominal) = self.store.kind(nominal_ty).clone() else {
            unreachable!("nominal metatype wraps a nominal");
        };
        let self_ty = self.self_type(nominal_ty, &nominal.placeholders);
        self.selves.push(self_ty);
        for member in &mut decl.members {
            self.visit_decl(member);
        }
        self.selves.pop();
    }

    fn visit_block(&mut self, block: &mut Block) {
        for stmt in &mut block.stmts {
            self.visit_stmt(stmt);
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Decl(decl) => {
                // Locals cannot be forward-referenced, so declaring at the
                // statement keeps ids dense without a separate pre-pass.
                self.declare_decl(decl, None);
                self.visit_decl(decl);
            }
            Stmt::Bind {
                lvalue,
                op,
                rvalue,
                span,
            } => {
                let (op, span) = (*op, *span);
                self.visit_expr(rvalue);
                self.visit_expr(lvalue);
                let rvalue_ty = rvalue.ty.expect("visited expression has a type");
                let lvalue_ty = lvalue.ty.expect("visited expression has a type");
                self.push(
                    ConstraintKind::Conforms {
                        rvalue: rvalue_ty,
                        lvalue: lvalue_ty,
                        op: Some(op),
                    },
                    span,
                    Reason::Rvalue,
                );
            }
            Stmt::Return { value, span } => {
                let span = *span;
                let codomain = self.codomains.last().copied();
                if let Some(value) = value {
                    self.visit_expr(value);
                    if let Some(codomain) = codomain {
                        let value_ty = value.ty.expect("visited expression has a type");
                        let value_span = value.span;
                        self.push(
                            ConstraintKind::Equal(value_ty, codomain),
                            value_span,
                            Reason::ReturnValue,
                        );
                    }
                } else if let Some(codomain) = codomain {
                    let nothing = self.nothing();
                    self.push(
                        ConstraintKind::Equal(codomain, nothing),
                        span,
                        Reason::ReturnValue,
                    );
                }
            }
            Stmt::Expr(expr) => self.visit_expr(expr),
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr) {
        if matches!(expr.kind, ExprKind::Ident(_)) {
            let ty = self.visit_ident_expr(expr);
            expr.ty = Some(ty);
            return;
        }
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Lit(lit) => {
                let kind = match lit {
                    Lit::Bool(_) => BuiltinKind::Bool,
                    Lit::Int(_) => BuiltinKind::Int,
                    Lit::Float(_) => BuiltinKind::Float,
                    Lit::String(_) => BuiltinKind::String,
                };
                expr.ty = Some(self.store.builtin(kind, QualSet::default_value()));
            }
            ExprKind::Ident(_) => unreachable!("identifiers are handled above"),
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.visit_expr(lhs);
                self.visit_expr(rhs);
                let rhs_param = self.store.fresh_var();
                let result = self.store.fresh_var();
                let method = self.store.fun(vec![(None, rhs_param)], result, Vec::new());
                expr.ty = Some(result);

                let rhs_ty = rhs.ty.expect("visited expression has a type");
                let lhs_ty = lhs.ty.expect("visited expression has a type");
                self.push(
                    ConstraintKind::Conforms {
                        rvalue: rhs_ty,
                        lvalue: rhs_param,
                        op: Some(BindOp::Copy),
                    },
                    rhs.span,
                    Reason::BinaryOperator,
                );
                self.push(
                    ConstraintKind::Member {
                        owner: lhs_ty,
                        member: op.name().to_string(),
                        ty: method,
                    },
                    span,
                    Reason::BinaryOperator,
                );
            }
            ExprKind::Call { callee, args } => {
                let (fun, codomain) = self.visit_invocation(callee, args);
                expr.ty = Some(codomain);
                let callee_ty = callee.ty.expect("visited expression has a type");
                let provenance = Provenance::new(callee.span, Reason::Callee);
                let branches = vec![
                    Constraint::new(ConstraintKind::Equal(callee_ty, fun), provenance.clone()),
                    Constraint::new(
                        ConstraintKind::Construction {
                            callee: callee_ty,
                            fun,
                        },
                        provenance.clone(),
                    ),
                ];
                self.constraints
                    .push(Constraint::new(ConstraintKind::Disjunction(branches), provenance));
            }
            ExprKind::Subscript { callee, args } => {
                let (fun, codomain) = self.visit_invocation(callee, args);
                expr.ty = Some(codomain);
                let callee_ty = callee.ty.expect("visited expression has a type");
                self.push(
                    ConstraintKind::Member {
                        owner: callee_ty,
                        member: "[]".to_string(),
                        ty: fun,
                    },
                    span,
                    Reason::Subscript,
                );
            }
            ExprKind::Select { owner, member } => {
                let var = self.store.fresh_var();
                expr.ty = Some(var);
                let owner_ty = match owner {
                    Some(owner) => {
                        self.visit_expr(owner);
                        owner.ty.expect("visited expression has a type")
                    }
                    // Static access: the implicit owner is the metatype of
                    // the selected member's own type.
                    None => self.store.meta(var),
                };
                self.push(
                    ConstraintKind::Member {
                        owner: owner_ty,
                        member: member.name.clone(),
                        ty: var,
                    },
                    span,
                    Reason::Select,
                );
            }
            ExprKind::Lambda {
                params,
                codomain,
                body,
            } => {
                let mut param_tys = Vec::with_capacity(params.len());
                for param in params.iter_mut() {
                    let var = self.store.fresh_var();
                    param.ty = Some(var);
                    self.symbols.symbol_mut(param.sym).ty = Some(var);
                    param_tys.push((param.label.clone(), var));
                }
                for param in params.iter() {
                    if let Some(annot) = &param.annot {
                        let realized = self.realize(annot);
                        let ty = param.ty.expect("assigned above");
                        self.push(
                            ConstraintKind::Equal(ty, realized),
                            annot.span,
                            Reason::Annotation,
                        );
                    }
                }
                let codomain_var = self.store.fresh_var();
                if let Some(annot) = codomain {
                    let realized = self.realize(annot);
                    self.push(
                        ConstraintKind::Equal(codomain_var, realized),
                        annot.span,
                        Reason::Codomain,
                    );
                }
                let fun = self.store.fun(param_tys, codomain_var, Vec::new());
                expr.ty = Some(fun);

                self.codomains.push(codomain_var);
                self.visit_block(body);
                self.codomains.pop();
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(condition);
                let bool_ty = self.store.builtin(BuiltinKind::Bool, QualSet::default_value());
                let condition_ty = condition.ty.expect("visited expression has a type");
                self.push(
                    ConstraintKind::Equal(condition_ty, bool_ty),
                    condition.span,
                    Reason::Condition,
                );

                self.visit_block(then_branch);
                match else_branch {
                    Some(else_branch) => {
                        self.visit_block(else_branch);
                        let then_ty = self.block_value_type(then_branch);
                        let else_ty = self.block_value_type(else_branch);
                        self.push(
                            ConstraintKind::Equal(then_ty, else_ty),
                            span,
                            Reason::IfBranches,
                        );
                        expr.ty = Some(then_ty);
                    }
                    None => {
                        expr.ty = Some(self.nothing());
                    }
                }
            }
        }
    }

    /// The value type of a block: its trailing expression, or `Nothing`.
    fn block_value_type(&mut self, block: &Block) -> TypeId {
        match block.trailing_expr().and_then(|expr| expr.ty) {
            Some(ty) => ty,
            None => self.nothing(),
        }
    }

    /// Shared by calls and subscripts: visit arguments and callee, emit
    /// per-argument conformance against a function type mirroring the
    /// argument labels, and return `(fun, codomain)`.
    fn visit_invocation(&mut self, callee: &mut Expr, args: &mut [Arg]) -> (TypeId, TypeId) {
        for arg in args.iter_mut() {
            self.visit_expr(&mut arg.value);
        }
        self.visit_expr(callee);

        let mut params = Vec::with_capacity(args.len());
        for (index, arg) in args.iter().enumerate() {
            let param = self.store.fresh_var();
            params.push((arg.label.clone(), param));
            let rvalue = arg.value.ty.expect("visited expression has a type");
            self.push(
                ConstraintKind::Conforms {
                    rvalue,
                    lvalue: param,
                    op: Some(arg.op),
                },
                arg.value.span,
                Reason::CallArgument(index),
            );
        }
        let codomain = self.store.fresh_var();
        let fun = self.store.fun(params, codomain, Vec::new());
        (fun, codomain)
    }

    /// Emit constraints for an identifier expression and return its type.
    fn visit_ident_expr(&mut self, expr: &mut Expr) -> TypeId {
        let span = expr.span;
        let ExprKind::Ident(ident) = &expr.kind else {
            unreachable!("caller matched an identifier");
        };
        let found = self
            .scopes
            .lookup(ident.scope, &ident.name, self.symbols);
        if found.is_empty() {
            self.diags.push(
                Diagnostic::error(
                    Category::UndefinedSymbol,
                    format!("undefined symbol `{}`", ident.name),
                )
                .at(span_to_location(span)),
            );
            return self.store.error();
        }

        let specializations = ident.specializations.clone();
        let var = self.store.fresh_var();
        let provenance = Provenance::new(span, Reason::Identifier);
        let mut branches = Vec::with_capacity(found.len());
        for sym in found {
            let sym_ty = self.symbol_type(sym);
            let kind = if specializations.is_empty() {
                ConstraintKind::Equal(var, sym_ty)
            } else {
                // Specialization arguments are applied by the solver, once
                // the symbol's placeholders have become structurally
                // visible through the substitution.
                match self.specialization_bindings(sym_ty, &specializations, span) {
                    Some(bindings) => ConstraintKind::Specialize {
                        ty: var,
                        general: sym_ty,
                        bindings,
                    },
                    None => continue,
                }
            };
            branches.push(Constraint::new(kind, provenance.clone()));
        }
        if branches.is_empty() {
            return self.store.error();
        }
        if branches.len() == 1 {
            self.constraints.push(branches.pop().expect("one branch"));
        } else {
            self.constraints
                .push(Constraint::new(ConstraintKind::Disjunction(branches), provenance));
        }
        var
    }

    /// Validate explicit specialization arguments against a symbol's
    /// generic parameters and realize them. `None` means the symbol is not
    /// generic at all (diagnosed); unknown names are diagnosed and skipped.
    fn specialization_bindings(
        &mut self,
        sym_ty: TypeId,
        specializations: &BTreeMap<String, Annot>,
        span: Span,
    ) -> Option<Vec<(TypeId, TypeId)>> {
        let inner = match *self.store.kind(sym_ty) {
            TypeKind::Meta(inner) => inner,
            _ => sym_ty,
        };
        let placeholders = self.store.unbound_placeholders(inner);
        if placeholders.is_empty() {
            self.diags.push(
                Diagnostic::error(
                    Category::NonGenericType,
                    "specialization arguments applied to a non-generic type",
                )
                .at(span_to_location(span))
                .with_hint("remove the `<...>` arguments"),
            );
            return None;
        }
        let by_name: BTreeMap<String, TypeId> = placeholders
            .iter()
            .filter_map(|ph| match self.store.kind(*ph) {
                TypeKind::Placeholder { name, .. } => Some((name.clone(), *ph)),
                _ => None,
            })
            .collect();

        let mut bindings = Vec::new();
        for (name, annot) in specializations {
            match by_name.get(name) {
                Some(ph) => {
                    let realized = self.realize(annot);
                    bindings.push((*ph, realized));
                }
                None => {
                    self.diags.push(
                        Diagnostic::error(
                            Category::SuperfluousSpecialization,
                            format!("`{name}` does not name a generic parameter"),
                        )
                        .at(span_to_location(annot.span)),
                    );
                }
            }
        }
        Some(bindings)
    }

    /// Apply explicit specialization arguments to a symbol's type at
    /// realization time. Annotations only name nominal types, whose
    /// placeholders are structurally present, so closing works immediately.
    fn specialized(
        &mut self,
        sym_ty: TypeId,
        specializations: &BTreeMap<String, Annot>,
        span: Span,
    ) -> TypeId {
        let Some(bindings) = self.specialization_bindings(sym_ty, specializations, span) else {
            return self.store.error();
        };
        let (inner, is_meta) = match *self.store.kind(sym_ty) {
            TypeKind::Meta(inner) => (inner, true),
            _ => (sym_ty, false),
        };
        let map: BTreeMap<TypeId, TypeId> = bindings.into_iter().collect();
        let closed = self.store.close(inner, &map);
        if is_meta {
            self.store.meta(closed)
        } else {
            closed
        }
    }

    /// Resolve a syntactic annotation to a semantic type.
    fn realize(&mut self, annot: &Annot) -> TypeId {
        match &annot.kind {
            AnnotKind::Named(ident) => {
                let realized = self.realize_named(ident);
                let quals = annot.quals.unwrap_or_else(QualSet::default_value);
                self.store.with_quals(realized, quals)
            }
            AnnotKind::Fun { params, codomain } => {
                let params = params
                    .iter()
                    .map(|(label, annot)| (label.clone(), self.realize(annot)))
                    .collect();
                let codomain = self.realize(codomain);
                let fun = self.store.fun(params, codomain, Vec::new());
                match annot.quals {
                    Some(quals) => self.store.with_quals(fun, quals),
                    None => fun,
                }
            }
        }
    }

    fn realize_named(&mut self, ident: &Ident) -> TypeId {
        let found = self
            .scopes
            .lookup(ident.scope, &ident.name, self.symbols);
        let Some(first) = found.first().copied() else {
            self.diags.push(
                Diagnostic::error(
                    Category::UndefinedSymbol,
                    format!("undefined symbol `{}`", ident.name),
                )
                .at(span_to_location(ident.span)),
            );
            return self.store.error();
        };
        let sym_ty = self.symbol_type(first);
        if !matches!(self.store.kind(sym_ty), TypeKind::Meta(_)) {
            self.diags.push(
                Diagnostic::error(
                    Category::InvalidTypeIdentifier,
                    format!("`{}` does not name a type", ident.name),
                )
                .at(span_to_location(ident.span)),
            );
            return self.store.error();
        }
        let resolved = if ident.specializations.is_empty() {
            sym_ty
        } else {
            self.specialized(sym_ty, &ident.specializations, ident.span)
        };
        match *self.store.kind(resolved) {
            TypeKind::Meta(inner) => inner,
            _ => resolved,
        }
    }
}
