//! AST node definitions and source spans for Veld.
//!
//! The tree this crate defines is what the parser and name binder hand to
//! semantic analysis: nodes carry source spans, identifiers carry the scope
//! they were resolved in, and scope-delimiting nodes reference entries in
//! the module's scope and symbol tables. Type slots (`ty` fields) start
//! empty and are written by the semantic passes.

use std::collections::BTreeMap;

use veld_types::{DeclId, NominalKind, QualSet, ScopeId, SymbolId, TypeId};

// ---------------------------------------------------------------------------
// Source locations
// ---------------------------------------------------------------------------

/// Identifies a source file in the compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

/// A byte offset range within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Span {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Create a span that covers both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        debug_assert_eq!(
            self.file, other.file,
            "cannot merge spans from different files"
        );
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// A synthetic span for compiler-generated nodes.
    pub fn synthetic() -> Self {
        Self {
            file: FileId(u32::MAX),
            start: 0,
            end: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Binding operators
// ---------------------------------------------------------------------------

/// How an rvalue is transferred into an lvalue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindOp {
    /// Duplicate the value; the lvalue gets its own storage.
    Copy,
    /// Transfer ownership; both sides must be value-qualified.
    Move,
    /// Alias the rvalue; the lvalue must be reference-qualified.
    Ref,
}

impl BindOp {
    pub fn name(self) -> &'static str {
        match self {
            BindOp::Copy => "copy",
            BindOp::Move => "move",
            BindOp::Ref => "ref",
        }
    }
}

impl std::fmt::Display for BindOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Scopes and symbols
// ---------------------------------------------------------------------------

/// A lexical scope: a parent link and the symbols declared inside.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub symbols: BTreeMap<String, Vec<SymbolId>>,
}

/// All scopes of a module, indexed by [`ScopeId`].
#[derive(Debug, Clone, Default)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
}

impl ScopeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            parent,
            symbols: BTreeMap::new(),
        });
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &Scope)> {
        self.scopes
            .iter()
            .enumerate()
            .map(|(idx, scope)| (ScopeId(idx as u32), scope))
    }

    pub fn define(&mut self, scope: ScopeId, name: impl Into<String>, symbol: SymbolId) {
        self.scopes[scope.0 as usize]
            .symbols
            .entry(name.into())
            .or_default()
            .push(symbol);
    }

    /// Symbols declared directly in `scope` under `name`.
    pub fn lookup_local(&self, scope: ScopeId, name: &str) -> &[SymbolId] {
        self.scopes[scope.0 as usize]
            .symbols
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve `name` from `scope` outward.
    ///
    /// Gathers candidates scope by scope toward the root. A scope that
    /// contributes a non-overloadable symbol shadows everything further out,
    /// so gathering stops there; overloadable symbols keep accumulating with
    /// overloads from enclosing scopes.
    pub fn lookup(&self, scope: ScopeId, name: &str, symbols: &SymbolTable) -> Vec<SymbolId> {
        let mut found = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            let entries = self.lookup_local(id, name);
            found.extend_from_slice(entries);
            if entries
                .iter()
                .any(|sym| !symbols.symbol(*sym).overloadable)
            {
                break;
            }
            current = self.scope(id).parent;
        }
        found
    }
}

/// A declared name the semantic passes can dispatch to.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    /// The scope the symbol is declared in.
    pub scope: ScopeId,
    /// Whether other symbols may share this name in the same scope.
    pub overloadable: bool,
    pub is_method: bool,
    /// The symbol's semantic type. Pre-bound for builtins; assigned during
    /// constraint generation for user declarations.
    pub ty: Option<TypeId>,
}

/// All symbols of a module, indexed by [`SymbolId`].
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Type annotations
// ---------------------------------------------------------------------------

/// A syntactic type annotation, resolved to a semantic type during
/// constraint generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Annot {
    /// Explicit qualifiers, if written. `None` takes the context default.
    pub quals: Option<QualSet>,
    pub kind: AnnotKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotKind {
    /// A named type, possibly specialized: `Int`, `Box<T = Int>`.
    Named(Ident),
    /// A function signature: `(x: Int) -> Bool`.
    Fun {
        params: Vec<(Option<String>, Annot)>,
        codomain: Box<Annot>,
    },
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// A use of a declared name.
///
/// `scope` is written by the name binder; `symbol` stays empty until the
/// dispatcher picks the unique declaration this use refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub scope: ScopeId,
    /// Explicit specialization arguments: `poly<T = Int>`.
    pub specializations: BTreeMap<String, Annot>,
    pub symbol: Option<SymbolId>,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, scope: ScopeId, span: Span) -> Self {
        Self {
            name: name.into(),
            scope,
            specializations: BTreeMap::new(),
            symbol: None,
            span,
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Binary operators, dispatched as method calls on the left operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    /// The member name the operator dispatches to.
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// A call or subscript argument: optional label, binding operator, value.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub label: Option<String>,
    pub op: BindOp,
    pub value: Expr,
}

/// An expression node with its span and semantic type slot.
///
/// `ty` is written twice: the constraint generator stores a type variable
/// (or a syntactically fixed type), and the dispatcher overwrites it with
/// the reified solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: Option<TypeId>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Lit(Lit),
    Ident(Ident),
    /// `lhs op rhs`; rewritten to `lhs.op(rhs)` call form by the dispatcher.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    /// `owner.member`; `owner` is `None` for static access inside a type.
    Select {
        owner: Option<Box<Expr>>,
        member: Ident,
    },
    /// `callee[args]`; sugar for the `[]` member.
    Subscript {
        callee: Box<Expr>,
        args: Vec<Arg>,
    },
    Lambda {
        params: Vec<ParamDecl>,
        codomain: Option<Annot>,
        body: Block,
    },
    If {
        condition: Box<Expr>,
        then_branch: Block,
        else_branch: Option<Block>,
    },
}

// ---------------------------------------------------------------------------
// Statements and blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Decl(Decl),
    /// `lvalue op rvalue`.
    Bind {
        lvalue: Expr,
        op: BindOp,
        rvalue: Expr,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
}

/// A braced statement list with its own scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub scope: ScopeId,
    pub span: Span,
}

impl Block {
    /// The trailing expression, if the block ends in one. Its type is the
    /// block's value type.
    pub fn trailing_expr(&self) -> Option<&Expr> {
        match self.stmts.last() {
            Some(Stmt::Expr(expr)) => Some(expr),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Prop(PropDecl),
    Fun(FunDecl),
    Nominal(NominalDecl),
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Prop(decl) => decl.span,
            Decl::Fun(decl) => decl.span,
            Decl::Nominal(decl) => decl.span,
        }
    }
}

/// A property or local binding: `let name[: Annot] [op value]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PropDecl {
    pub name: String,
    pub sym: SymbolId,
    pub annot: Option<Annot>,
    pub init: Option<(BindOp, Expr)>,
    pub span: Span,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunKind {
    Regular,
    Method,
    Constructor,
    Destructor,
}

/// A function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub name: String,
    pub sym: SymbolId,
    /// The call-site label. Usually the parameter name; `None` for
    /// positional-only parameters.
    pub label: Option<String>,
    pub annot: Option<Annot>,
    pub default: Option<Expr>,
    pub span: Span,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunDecl {
    pub name: String,
    pub sym: SymbolId,
    pub kind: FunKind,
    /// Generic parameter names, e.g. `<T, U>`.
    pub placeholders: Vec<String>,
    pub params: Vec<ParamDecl>,
    pub codomain: Option<Annot>,
    pub body: Option<Block>,
    pub decl_id: DeclId,
    /// The function's inner scope (parameters and placeholders live here).
    pub scope: ScopeId,
    pub span: Span,
    pub ty: Option<TypeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NominalDecl {
    pub name: String,
    pub sym: SymbolId,
    pub kind: NominalKind,
    pub placeholders: Vec<String>,
    pub members: Vec<Decl>,
    pub decl_id: DeclId,
    /// Scope holding member symbols and placeholder symbols.
    pub member_scope: ScopeId,
    pub span: Span,
    pub ty: Option<TypeId>,
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// A compilation unit: top-level declarations plus the scope and symbol
/// tables the name binder produced for it.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub decls: Vec<Decl>,
    pub root_scope: ScopeId,
    pub scopes: ScopeTable,
    pub symbols: SymbolTable,
    next_decl: u32,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let mut scopes = ScopeTable::new();
        let root_scope = scopes.push_scope(None);
        Self {
            name: name.into(),
            decls: Vec::new(),
            root_scope,
            scopes,
            symbols: SymbolTable::new(),
            next_decl: 0,
        }
    }

    pub fn alloc_decl_id(&mut self) -> DeclId {
        let id = DeclId(self.next_decl);
        self.next_decl += 1;
        id
    }

    /// Declare a symbol in `scope` and register it under its name.
    pub fn define(&mut self, scope: ScopeId, symbol: Symbol) -> SymbolId {
        let name = symbol.name.clone();
        let id = self.symbols.push(symbol);
        self.scopes.define(scope, name, id);
        id
    }
}
