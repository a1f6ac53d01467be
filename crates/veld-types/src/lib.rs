//! Semantic type representations for Veld.
//!
//! This crate defines the types manipulated by the semantic analyzer: the
//! interning arena ([`TypeStore`]), qualifier sets, the open/close lifecycle
//! used to instantiate generics, and the substitution table produced by the
//! constraint solver. Syntactic type annotations live in `veld-ast`; the
//! types here are what those annotations resolve to.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Handle to an interned type in a [`TypeStore`].
///
/// Handle equality is semantic identity: structurally equal non-variable
/// types intern to the same handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Unique identifier for a type variable during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVarId(pub u32);

/// Identifies a declaration node in the AST.
///
/// Types never navigate into declarations; the id only gives nominal types
/// and placeholders a stable identity tied to their declaring node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Identifies a lexical scope in the module's scope table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

/// Identifies a declared symbol in the module's symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

// ---------------------------------------------------------------------------
// Qualifiers
// ---------------------------------------------------------------------------

/// A set of type qualifiers, stored as a bitset.
///
/// Qualifiers describe the memory and mutation regime of a value:
/// constant/mutable, stack/shared, value/reference. An empty set means the
/// qualifiers are unconstrained (synthesized types start this way).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct QualSet(u8);

impl QualSet {
    pub const CST: QualSet = QualSet(1 << 0);
    pub const MUT: QualSet = QualSet(1 << 1);
    pub const STK: QualSet = QualSet(1 << 2);
    pub const SHD: QualSet = QualSet(1 << 3);
    pub const VAL: QualSet = QualSet(1 << 4);
    pub const REF: QualSet = QualSet(1 << 5);

    /// The qualifier combinations the language accepts on a concrete value.
    pub const VALID_COMBINATIONS: [QualSet; 5] = [
        QualSet(Self::CST.0 | Self::STK.0 | Self::VAL.0),
        QualSet(Self::CST.0 | Self::STK.0 | Self::REF.0),
        QualSet(Self::MUT.0 | Self::STK.0 | Self::VAL.0),
        QualSet(Self::MUT.0 | Self::STK.0 | Self::REF.0),
        QualSet(Self::MUT.0 | Self::SHD.0 | Self::VAL.0),
    ];

    pub const fn empty() -> Self {
        QualSet(0)
    }

    /// Default qualifiers for literals and unannotated bindings.
    pub const fn default_value() -> Self {
        QualSet(Self::CST.0 | Self::STK.0 | Self::VAL.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: QualSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: QualSet) -> QualSet {
        QualSet(self.0 | other.0)
    }

    /// Whether this set is one of the accepted combinations.
    pub fn is_valid_combination(self) -> bool {
        Self::VALID_COMBINATIONS.contains(&self)
    }
}

impl std::ops::BitOr for QualSet {
    type Output = QualSet;

    fn bitor(self, rhs: QualSet) -> QualSet {
        self.union(rhs)
    }
}

impl fmt::Display for QualSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::CST, "cst"),
            (Self::MUT, "mut"),
            (Self::STK, "stk"),
            (Self::SHD, "shd"),
            (Self::VAL, "val"),
            (Self::REF, "ref"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    write!(f, " ")?;
                }
                write!(f, "@{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Type kinds
// ---------------------------------------------------------------------------

/// Built-in scalar types plus the top and bottom of the subtyping lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinKind {
    Bool,
    Int,
    Float,
    String,
    /// Top: every type conforms to `Anything`.
    Anything,
    /// Bottom: `Nothing` conforms to every type; the codomain of functions
    /// that return no value.
    Nothing,
}

impl BuiltinKind {
    pub const ALL: [BuiltinKind; 6] = [
        BuiltinKind::Bool,
        BuiltinKind::Int,
        BuiltinKind::Float,
        BuiltinKind::String,
        BuiltinKind::Anything,
        BuiltinKind::Nothing,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BuiltinKind::Bool => "Bool",
            BuiltinKind::Int => "Int",
            BuiltinKind::Float => "Float",
            BuiltinKind::String => "String",
            BuiltinKind::Anything => "Anything",
            BuiltinKind::Nothing => "Nothing",
        }
    }
}

/// Which flavor of user-declared nominal type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NominalKind {
    Struct,
    Interface,
    Union,
}

/// A user-declared aggregate, interface, or sum type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NominalType {
    pub kind: NominalKind,
    pub name: String,
    pub decl: DeclId,
    /// Scope holding the type's member symbols.
    pub member_scope: ScopeId,
    /// Placeholder types declared by this nominal, in declaration order.
    pub placeholders: Vec<TypeId>,
}

/// A function or method signature.
///
/// Methods are represented curried: `(Self) -> (params) -> codomain`, with
/// the outer function taking the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunType {
    /// Parameters as (call-site label, type) pairs.
    pub params: Vec<(Option<String>, TypeId)>,
    pub codomain: TypeId,
    /// Placeholder types this signature quantifies over. Empty once opened.
    pub placeholders: Vec<TypeId>,
}

/// The closed sum of type shapes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Absorbing placeholder for ill-typed nodes. Unifies with anything.
    Error,
    /// Unknown discovered during inference. Never interned.
    Var(TypeVarId),
    /// A generic parameter awaiting instantiation.
    Placeholder { name: String, owner: DeclId },
    Nominal(NominalType),
    Fun(FunType),
    /// A generic type with a (possibly partial) substitution. Bindings are
    /// sorted by placeholder id for canonical interning.
    BoundGeneric {
        base: TypeId,
        bindings: Vec<(TypeId, TypeId)>,
    },
    /// A nominal mid-inference: placeholders mapped to fresh variables so
    /// nominal identity survives unification. Openings are sorted by
    /// placeholder id.
    OpenedNominal {
        base: TypeId,
        openings: Vec<(TypeId, TypeId)>,
    },
    /// The type of a type. Naming a type in a value position yields its
    /// metatype; constructing a value calls through it.
    Meta(TypeId),
    Builtin(BuiltinKind),
}

/// A qualified type: qualifier set plus shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ty {
    pub quals: QualSet,
    pub kind: TypeKind,
}

// ---------------------------------------------------------------------------
// Type store: arena plus interner
// ---------------------------------------------------------------------------

/// Arena and interner for semantic types.
///
/// All non-variable types are hash-consed: structurally equal types share a
/// single slot, so `TypeId` equality is semantic identity. Type variables
/// are never interned; every [`TypeStore::fresh_var`] call allocates a new
/// slot with a monotonically increasing variable id.
pub struct TypeStore {
    types: Vec<Ty>,
    interned: HashMap<Ty, TypeId>,
    next_var: u32,
    error: TypeId,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = Self {
            types: Vec::new(),
            interned: HashMap::new(),
            next_var: 0,
            error: TypeId(0),
        };
        store.error = store.intern(Ty {
            quals: QualSet::empty(),
            kind: TypeKind::Error,
        });
        store
    }

    fn intern(&mut self, ty: Ty) -> TypeId {
        debug_assert!(
            !matches!(ty.kind, TypeKind::Var(_)),
            "type variables are never interned"
        );
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn ty(&self, id: TypeId) -> &Ty {
        &self.types[id.0 as usize]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.types[id.0 as usize].kind
    }

    pub fn quals(&self, id: TypeId) -> QualSet {
        self.types[id.0 as usize].quals
    }

    // -- Factories ----------------------------------------------------------

    /// The canonical error type.
    pub fn error(&self) -> TypeId {
        self.error
    }

    /// Allocate a fresh type variable. Never interned.
    pub fn fresh_var(&mut self) -> TypeId {
        let var = TypeVarId(self.next_var);
        self.next_var += 1;
        let id = TypeId(self.types.len() as u32);
        self.types.push(Ty {
            quals: QualSet::empty(),
            kind: TypeKind::Var(var),
        });
        id
    }

    pub fn builtin(&mut self, kind: BuiltinKind, quals: QualSet) -> TypeId {
        self.intern(Ty {
            quals,
            kind: TypeKind::Builtin(kind),
        })
    }

    pub fn placeholder(&mut self, name: impl Into<String>, owner: DeclId) -> TypeId {
        self.intern(Ty {
            quals: QualSet::empty(),
            kind: TypeKind::Placeholder {
                name: name.into(),
                owner,
            },
        })
    }

    pub fn nominal(&mut self, nominal: NominalType, quals: QualSet) -> TypeId {
        self.intern(Ty {
            quals,
            kind: TypeKind::Nominal(nominal),
        })
    }

    pub fn fun(
        &mut self,
        params: Vec<(Option<String>, TypeId)>,
        codomain: TypeId,
        placeholders: Vec<TypeId>,
    ) -> TypeId {
        self.intern(Ty {
            quals: QualSet::empty(),
            kind: TypeKind::Fun(FunType {
                params,
                codomain,
                placeholders,
            }),
        })
    }

    pub fn meta(&mut self, inner: TypeId) -> TypeId {
        self.intern(Ty {
            quals: QualSet::empty(),
            kind: TypeKind::Meta(inner),
        })
    }

    /// Intern a bound generic. Bindings are sorted by placeholder id so that
    /// the same substitution always interns to the same handle.
    pub fn bound_generic(&mut self, base: TypeId, bindings: Vec<(TypeId, TypeId)>) -> TypeId {
        let mut bindings = bindings;
        bindings.sort_by_key(|(ph, _)| *ph);
        bindings.dedup_by_key(|(ph, _)| *ph);
        self.intern(Ty {
            quals: self.types[base.0 as usize].quals,
            kind: TypeKind::BoundGeneric { base, bindings },
        })
    }

    pub fn opened_nominal(&mut self, base: TypeId, openings: Vec<(TypeId, TypeId)>) -> TypeId {
        let mut openings = openings;
        openings.sort_by_key(|(ph, _)| *ph);
        self.intern(Ty {
            quals: self.types[base.0 as usize].quals,
            kind: TypeKind::OpenedNominal { base, openings },
        })
    }

    /// Re-intern a type with a different qualifier set. Variables carry no
    /// qualifiers and the error type stays a singleton; both pass through.
    pub fn with_quals(&mut self, id: TypeId, quals: QualSet) -> TypeId {
        let ty = self.ty(id);
        if ty.quals == quals {
            return id;
        }
        if matches!(ty.kind, TypeKind::Var(_) | TypeKind::Error) {
            return id;
        }
        let kind = ty.kind.clone();
        self.intern(Ty { quals, kind })
    }

    /// Strip qualifiers, yielding the unqualified interned variant.
    pub fn unqualified(&mut self, id: TypeId) -> TypeId {
        self.with_quals(id, QualSet::empty())
    }

    /// Like [`TypeStore::unqualified`] but without interning: returns the
    /// already-interned unqualified variant, or `id` itself when none
    /// exists. Lets read-only code compare types modulo qualifiers.
    pub fn unqualified_lookup(&self, id: TypeId) -> TypeId {
        let ty = self.ty(id);
        if ty.quals.is_empty() {
            return id;
        }
        let key = Ty {
            quals: QualSet::empty(),
            kind: ty.kind.clone(),
        };
        self.interned.get(&key).copied().unwrap_or(id)
    }

    // -- Queries ------------------------------------------------------------

    /// Placeholders reachable from `id` that no binding has substituted yet.
    pub fn unbound_placeholders(&self, id: TypeId) -> BTreeSet<TypeId> {
        let mut set = BTreeSet::new();
        self.collect_unbound(id, &mut set);
        set
    }

    fn collect_unbound(&self, id: TypeId, out: &mut BTreeSet<TypeId>) {
        match self.kind(id) {
            TypeKind::Placeholder { .. } => {
                out.insert(self.unqualified_lookup(id));
            }
            TypeKind::Nominal(nominal) => {
                out.extend(nominal.placeholders.iter().copied());
            }
            TypeKind::Fun(fun) => {
                out.extend(fun.placeholders.iter().copied());
                for (_, param) in &fun.params {
                    self.collect_unbound(*param, out);
                }
                self.collect_unbound(fun.codomain, out);
            }
            TypeKind::BoundGeneric { base, bindings } => {
                let mut base_set = BTreeSet::new();
                self.collect_unbound(*base, &mut base_set);
                for (ph, _) in bindings {
                    base_set.remove(ph);
                }
                out.extend(base_set);
                for (_, value) in bindings {
                    self.collect_unbound(*value, out);
                }
            }
            TypeKind::Meta(inner) => self.collect_unbound(*inner, out),
            TypeKind::OpenedNominal { .. }
            | TypeKind::Var(_)
            | TypeKind::Error
            | TypeKind::Builtin(_) => {}
        }
    }

    /// Free type variables reachable from `id`, without substitution.
    pub fn free_vars(&self, id: TypeId) -> BTreeSet<TypeVarId> {
        let mut set = BTreeSet::new();
        self.collect_free_vars(id, &mut set);
        set
    }

    fn collect_free_vars(&self, id: TypeId, out: &mut BTreeSet<TypeVarId>) {
        match self.kind(id) {
            TypeKind::Var(v) => {
                out.insert(*v);
            }
            TypeKind::Fun(fun) => {
                for (_, param) in &fun.params {
                    self.collect_free_vars(*param, out);
                }
                self.collect_free_vars(fun.codomain, out);
            }
            TypeKind::BoundGeneric { bindings, .. } => {
                for (_, value) in bindings {
                    self.collect_free_vars(*value, out);
                }
            }
            TypeKind::OpenedNominal { openings, .. } => {
                for (_, value) in openings {
                    self.collect_free_vars(*value, out);
                }
            }
            TypeKind::Meta(inner) => self.collect_free_vars(*inner, out),
            TypeKind::Error
            | TypeKind::Placeholder { .. }
            | TypeKind::Nominal(_)
            | TypeKind::Builtin(_) => {}
        }
    }

    // -- Open / close -------------------------------------------------------

    /// Replace in-scope placeholders with fresh type variables.
    ///
    /// `bindings` accumulates the placeholder-to-variable map so that nested
    /// openings of the same placeholder reuse one variable. Function types
    /// open recursively and come back monomorphic; nominal types are wrapped
    /// in an opened nominal rather than rewritten, preserving their identity
    /// through unification.
    pub fn open(&mut self, id: TypeId, bindings: &mut BTreeMap<TypeId, TypeId>) -> TypeId {
        match self.kind(id).clone() {
            TypeKind::Error | TypeKind::Builtin(_) => id,
            // Opening a variable is the identity: any placeholder hiding
            // behind it is revealed by reifying before opening.
            TypeKind::Var(_) => id,
            TypeKind::Placeholder { .. } => {
                // Binding maps are keyed by the unqualified placeholder; a
                // qualified occurrence still opens to the same variable.
                let key = self.unqualified_lookup(id);
                bindings.get(&key).copied().unwrap_or(id)
            }
            TypeKind::Fun(fun) => {
                for ph in &fun.placeholders {
                    if !bindings.contains_key(ph) {
                        let fresh = self.fresh_var();
                        bindings.insert(*ph, fresh);
                    }
                }
                let params = fun
                    .params
                    .iter()
                    .map(|(label, param)| (label.clone(), self.open(*param, bindings)))
                    .collect();
                let codomain = self.open(fun.codomain, bindings);
                self.fun(params, codomain, Vec::new())
            }
            TypeKind::Nominal(nominal) => {
                if nominal.placeholders.is_empty() {
                    return id;
                }
                let mut openings = Vec::with_capacity(nominal.placeholders.len());
                for ph in &nominal.placeholders {
                    let var = match bindings.get(ph) {
                        Some(var) => *var,
                        None => {
                            let fresh = self.fresh_var();
                            bindings.insert(*ph, fresh);
                            fresh
                        }
                    };
                    openings.push((*ph, var));
                }
                self.opened_nominal(id, openings)
            }
            TypeKind::BoundGeneric { base, bindings: bg } => {
                let rewritten = bg
                    .iter()
                    .map(|(ph, value)| {
                        let value = match self.kind(*value) {
                            TypeKind::Placeholder { .. } => {
                                bindings.get(value).copied().unwrap_or(*value)
                            }
                            _ => self.open(*value, bindings),
                        };
                        (*ph, value)
                    })
                    .collect();
                self.bound_generic(base, rewritten)
            }
            TypeKind::Meta(inner) => {
                let opened = self.open(inner, bindings);
                self.meta(opened)
            }
            TypeKind::OpenedNominal { .. } => id,
        }
    }

    /// Substitute placeholders with concrete types.
    ///
    /// The inverse of [`TypeStore::open`]. Nominal types become bound
    /// generics rather than being rewritten, so call sites keep the
    /// specialization arguments for member lookup after dispatch.
    pub fn close(&mut self, id: TypeId, bindings: &BTreeMap<TypeId, TypeId>) -> TypeId {
        if bindings.is_empty() {
            return id;
        }
        match self.kind(id).clone() {
            TypeKind::Error | TypeKind::Builtin(_) | TypeKind::Var(_) => id,
            TypeKind::Placeholder { .. } => {
                let quals = self.quals(id);
                let key = self.unqualified_lookup(id);
                match bindings.get(&key) {
                    Some(value) if quals.is_empty() => *value,
                    Some(value) => self.with_quals(*value, quals),
                    None => id,
                }
            }
            TypeKind::Fun(fun) => {
                let params = fun
                    .params
                    .iter()
                    .map(|(label, param)| (label.clone(), self.close(*param, bindings)))
                    .collect();
                let codomain = self.close(fun.codomain, bindings);
                let placeholders = fun
                    .placeholders
                    .iter()
                    .filter(|ph| !bindings.contains_key(ph))
                    .copied()
                    .collect();
                self.fun(params, codomain, placeholders)
            }
            TypeKind::Nominal(nominal) => {
                let bound: Vec<(TypeId, TypeId)> = nominal
                    .placeholders
                    .iter()
                    .filter_map(|ph| bindings.get(ph).map(|value| (*ph, *value)))
                    .collect();
                if bound.is_empty() {
                    id
                } else {
                    self.bound_generic(id, bound)
                }
            }
            TypeKind::BoundGeneric { base, bindings: bg } => {
                let mut rewritten: Vec<(TypeId, TypeId)> = bg
                    .iter()
                    .map(|(ph, value)| (*ph, self.close(*value, bindings)))
                    .collect();
                // Placeholders of the base left unbound so far may close now.
                let base_set = self.unbound_placeholders(base);
                for ph in base_set {
                    if !rewritten.iter().any(|(bound_ph, _)| *bound_ph == ph) {
                        if let Some(value) = bindings.get(&ph) {
                            rewritten.push((ph, *value));
                        }
                    }
                }
                self.bound_generic(base, rewritten)
            }
            TypeKind::Meta(inner) => {
                let closed = self.close(inner, bindings);
                self.meta(closed)
            }
            TypeKind::OpenedNominal { .. } => id,
        }
    }

    // -- Display ------------------------------------------------------------

    /// Render a type for diagnostics. Variables print as `$n`, metatypes as
    /// `T.Type`, bound generics as `Name<T = Int>`.
    pub fn display(&self, id: TypeId) -> String {
        let ty = self.ty(id);
        let mut out = String::new();
        if !ty.quals.is_empty() {
            out.push_str(&format!("{} ", ty.quals));
        }
        out.push_str(&self.display_kind(&ty.kind));
        out
    }

    fn display_kind(&self, kind: &TypeKind) -> String {
        match kind {
            TypeKind::Error => "<error>".to_string(),
            TypeKind::Var(v) => format!("${}", v.0),
            TypeKind::Placeholder { name, .. } => name.clone(),
            TypeKind::Builtin(b) => b.name().to_string(),
            TypeKind::Nominal(n) => n.name.clone(),
            TypeKind::Meta(inner) => format!("{}.Type", self.display(*inner)),
            TypeKind::Fun(fun) => {
                let params = fun
                    .params
                    .iter()
                    .map(|(label, ty)| match label {
                        Some(label) => format!("{label}: {}", self.display(*ty)),
                        None => self.display(*ty),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({params}) -> {}", self.display(fun.codomain))
            }
            TypeKind::BoundGeneric { base, bindings } => {
                let args = bindings
                    .iter()
                    .map(|(ph, value)| {
                        format!("{} = {}", self.display(*ph), self.display(*value))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{args}>", self.display_kind(&self.ty(*base).kind))
            }
            TypeKind::OpenedNominal { base, openings } => {
                let args = openings
                    .iter()
                    .map(|(ph, value)| {
                        format!("{} = {}", self.display(*ph), self.display(*value))
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{args}>", self.display_kind(&self.ty(*base).kind))
            }
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Maps type variables to their resolved types.
///
/// Bindings chain: a variable may map to another variable. [`Substitution::walk`]
/// follows chains to the representative; [`Substitution::reify`] additionally
/// rebuilds composite types through the store so results stay interned.
/// Append-only while the solver runs; snapshots are taken by cloning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Substitution {
    map: BTreeMap<TypeVarId, TypeId>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn bind(&mut self, var: TypeVarId, ty: TypeId) {
        self.map.insert(var, ty);
    }

    pub fn lookup(&self, var: TypeVarId) -> Option<TypeId> {
        self.map.get(&var).copied()
    }

    pub fn bindings(&self) -> &BTreeMap<TypeVarId, TypeId> {
        &self.map
    }

    /// Follow variable chains to the representative type.
    pub fn walk(&self, store: &TypeStore, id: TypeId) -> TypeId {
        let mut current = id;
        while let TypeKind::Var(v) = store.kind(current) {
            match self.map.get(v) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }

    /// [`Substitution::walk`] with path compression: every variable on the
    /// chain is re-pointed at the representative.
    pub fn walk_compress(&mut self, store: &TypeStore, id: TypeId) -> TypeId {
        let mut chain = Vec::new();
        let mut current = id;
        while let TypeKind::Var(v) = store.kind(current) {
            match self.map.get(v) {
                Some(next) => {
                    chain.push(*v);
                    current = *next;
                }
                None => break,
            }
        }
        for var in chain {
            self.map.insert(var, current);
        }
        current
    }

    /// Apply the substitution to fixpoint, rebuilding composite types.
    ///
    /// Opened nominals whose placeholders have resolved collapse into bound
    /// generics; this is the canonical post-solve form. Idempotent.
    pub fn reify(&self, store: &mut TypeStore, id: TypeId) -> TypeId {
        let walked = self.walk(store, id);
        match store.kind(walked).clone() {
            TypeKind::Error
            | TypeKind::Var(_)
            | TypeKind::Placeholder { .. }
            | TypeKind::Nominal(_)
            | TypeKind::Builtin(_) => walked,
            TypeKind::Fun(fun) => {
                let params = fun
                    .params
                    .iter()
                    .map(|(label, param)| (label.clone(), self.reify(store, *param)))
                    .collect();
                let codomain = self.reify(store, fun.codomain);
                let quals = store.quals(walked);
                let id = store.fun(params, codomain, fun.placeholders.clone());
                store.with_quals(id, quals)
            }
            TypeKind::Meta(inner) => {
                let inner = self.reify(store, inner);
                store.meta(inner)
            }
            TypeKind::BoundGeneric { base, bindings } => {
                let bindings = bindings
                    .iter()
                    .map(|(ph, value)| (*ph, self.reify(store, *value)))
                    .collect();
                store.bound_generic(base, bindings)
            }
            TypeKind::OpenedNominal { base, openings } => {
                let bindings: Vec<(TypeId, TypeId)> = openings
                    .iter()
                    .map(|(ph, value)| (*ph, self.reify(store, *value)))
                    .collect();
                store.bound_generic(base, bindings)
            }
        }
    }

    /// Whether `var` occurs in `ty` after substitution. Used for the occurs
    /// check before binding.
    pub fn occurs(&self, store: &TypeStore, var: TypeVarId, id: TypeId) -> bool {
        let walked = self.walk(store, id);
        match store.kind(walked) {
            TypeKind::Var(v) => *v == var,
            TypeKind::Fun(fun) => {
                fun.params
                    .iter()
                    .any(|(_, param)| self.occurs(store, var, *param))
                    || self.occurs(store, var, fun.codomain)
            }
            TypeKind::Meta(inner) => self.occurs(store, var, *inner),
            TypeKind::BoundGeneric { bindings, .. } => bindings
                .iter()
                .any(|(_, value)| self.occurs(store, var, *value)),
            TypeKind::OpenedNominal { openings, .. } => openings
                .iter()
                .any(|(_, value)| self.occurs(store, var, *value)),
            TypeKind::Error
            | TypeKind::Placeholder { .. }
            | TypeKind::Nominal(_)
            | TypeKind::Builtin(_) => false,
        }
    }
}
