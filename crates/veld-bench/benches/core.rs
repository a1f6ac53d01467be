//! Micro-benchmarks for the semantic core: type interning and end-to-end
//! constraint solving over synthetic modules.

use std::hint::black_box;

use divan::{AllocProfiler, Bencher};
use veld_ast::{
    Arg, BindOp, Decl, Expr, ExprKind, FileId, FunDecl, FunKind, Ident, Lit, Module, ParamDecl,
    PropDecl, Span, Symbol,
};
use veld_sema::{type_check, CompilerContext};
use veld_types::{BuiltinKind, QualSet, ScopeId, TypeStore};

#[global_allocator]
static ALLOC: AllocProfiler = AllocProfiler::system();

fn main() {
    divan::main();
}

#[divan::bench(args = [64, 256, 1024])]
fn intern_function_types(bencher: Bencher, count: usize) {
    bencher.bench(|| {
        let mut store = TypeStore::new();
        let int = store.builtin(BuiltinKind::Int, QualSet::default_value());
        for i in 0..count {
            let label = format!("p{}", i % 8);
            black_box(store.fun(vec![(Some(label), int)], int, Vec::new()));
        }
        store.len()
    });
}

#[divan::bench(args = [8, 32, 128])]
fn solve_overloaded_calls(bencher: Bencher, calls: usize) {
    bencher.bench(|| {
        let (mut module, mut ctx) = overload_module(calls);
        let _ = black_box(type_check(&mut module, &mut ctx));
        module.symbols.len()
    });
}

fn s() -> Span {
    Span::new(FileId(0), 0, 1)
}

/// `fun mono(x: Int) -> Int`, `fun mono(x: Bool) -> Bool`, then `calls`
/// bindings alternating between the two overloads.
fn overload_module(calls: usize) -> (Module, CompilerContext) {
    let mut module = Module::new("bench");
    let mut ctx = CompilerContext::new();
    ctx.install_builtins(&mut module);
    let root = module.root_scope;

    for annot_name in ["Int", "Bool"] {
        let decl = monomorphic_fun(&mut module, root, "mono", annot_name);
        module.decls.push(Decl::Fun(decl));
    }

    for index in 0..calls {
        let value = if index % 2 == 0 {
            Expr::new(ExprKind::Lit(Lit::Int(index as i64)), s())
        } else {
            Expr::new(ExprKind::Lit(Lit::Bool(true)), s())
        };
        let call = Expr::new(
            ExprKind::Call {
                callee: Box::new(Expr::new(
                    ExprKind::Ident(Ident::new("mono", root, s())),
                    s(),
                )),
                args: vec![Arg {
                    label: Some("x".to_string()),
                    op: BindOp::Copy,
                    value,
                }],
            },
            s(),
        );
        let name = format!("b{index}");
        let sym = module.define(
            root,
            Symbol {
                name: name.clone(),
                scope: root,
                overloadable: false,
                is_method: false,
                ty: None,
            },
        );
        module.decls.push(Decl::Prop(PropDecl {
            name,
            sym,
            annot: None,
            init: Some((BindOp::Copy, call)),
            span: s(),
            ty: None,
        }));
    }

    (module, ctx)
}

fn monomorphic_fun(module: &mut Module, scope: ScopeId, name: &str, annot_name: &str) -> FunDecl {
    let sym = module.define(
        scope,
        Symbol {
            name: name.to_string(),
            scope,
            overloadable: true,
            is_method: false,
            ty: None,
        },
    );
    let fun_scope = module.scopes.push_scope(Some(scope));
    let param_sym = module.define(
        fun_scope,
        Symbol {
            name: "x".to_string(),
            scope: fun_scope,
            overloadable: false,
            is_method: false,
            ty: None,
        },
    );
    let annot = |scope| veld_ast::Annot {
        quals: None,
        kind: veld_ast::AnnotKind::Named(Ident::new(annot_name, scope, s())),
        span: s(),
    };
    FunDecl {
        name: name.to_string(),
        sym,
        kind: FunKind::Regular,
        placeholders: Vec::new(),
        params: vec![ParamDecl {
            name: "x".to_string(),
            sym: param_sym,
            label: Some("x".to_string()),
            annot: Some(annot(fun_scope)),
            default: None,
            span: s(),
            ty: None,
        }],
        codomain: Some(annot(fun_scope)),
        body: None,
        decl_id: module.alloc_decl_id(),
        scope: fun_scope,
        span: s(),
        ty: None,
    }
}
