//! Diagnostics for the Veld semantic passes.
//!
//! Every failure in `veld-sema` is reported through the types here: a
//! [`Diagnostic`] pairs a [`Category`] (which fixes the stable code) with a
//! message, an optional primary location, secondary [`Note`]s (for example
//! the constraint a failed overload resolution traces back to), and an
//! optional hint. Rendering against source text is the driver's job; the
//! `Display` impl is a plain-text fallback for logs and tests. Inference
//! variables must never appear in any of these messages.

use std::fmt;

// ---------------------------------------------------------------------------
// Severity and categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// What went wrong, semantically. The category determines the stable
/// diagnostic code reported to tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// The same name is declared twice where one declaration is allowed.
    DuplicateDeclaration,
    /// A redeclaration mixes overloadable and non-overloadable symbols.
    InvalidRedeclaration,
    /// An identifier used as a type annotation does not name a type.
    InvalidTypeIdentifier,
    /// Specialization arguments applied to a non-generic type.
    NonGenericType,
    /// A specialization argument names no placeholder of the type.
    SuperfluousSpecialization,
    /// A referenced name has no declaration in any accessible scope.
    UndefinedSymbol,
    /// A typing constraint failed: the involved types cannot be reconciled.
    ConstraintMismatch,
    /// Several alternatives satisfy a constraint or dispatch equally well.
    AmbiguousConstraint,
    /// No overload of a callee accepts the call as written.
    NoViableOverload,
    /// The solver gave up after exhausting its exploration budget.
    SolverBudget,
}

impl Category {
    /// Every category, in code order: `ALL[i]` carries code `E000{i+1}`.
    pub const ALL: [Category; 10] = [
        Category::DuplicateDeclaration,
        Category::InvalidRedeclaration,
        Category::InvalidTypeIdentifier,
        Category::NonGenericType,
        Category::SuperfluousSpecialization,
        Category::UndefinedSymbol,
        Category::ConstraintMismatch,
        Category::AmbiguousConstraint,
        Category::NoViableOverload,
        Category::SolverBudget,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::DuplicateDeclaration => "duplicate_declaration",
            Category::InvalidRedeclaration => "invalid_redeclaration",
            Category::InvalidTypeIdentifier => "invalid_type_identifier",
            Category::NonGenericType => "non_generic_type",
            Category::SuperfluousSpecialization => "superfluous_specialization",
            Category::UndefinedSymbol => "undefined_symbol",
            Category::ConstraintMismatch => "constraint_mismatch",
            Category::AmbiguousConstraint => "ambiguous_constraint",
            Category::NoViableOverload => "no_viable_overload",
            Category::SolverBudget => "solver_budget",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::DuplicateDeclaration => "E0001",
            Category::InvalidRedeclaration => "E0002",
            Category::InvalidTypeIdentifier => "E0003",
            Category::NonGenericType => "E0004",
            Category::SuperfluousSpecialization => "E0005",
            Category::UndefinedSymbol => "E0006",
            Category::ConstraintMismatch => "E0007",
            Category::AmbiguousConstraint => "E0008",
            Category::NoViableOverload => "E0009",
            Category::SolverBudget => "E0010",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::DuplicateDeclaration => "A name is declared more than once in a scope.",
            Category::InvalidRedeclaration => {
                "A declaration conflicts with an existing non-overloadable one."
            }
            Category::InvalidTypeIdentifier => {
                "An identifier in type position does not refer to a type."
            }
            Category::NonGenericType => "Specialization arguments given to a non-generic type.",
            Category::SuperfluousSpecialization => {
                "A specialization argument matches no generic parameter."
            }
            Category::UndefinedSymbol => "A referenced variable, function, or type is undefined.",
            Category::ConstraintMismatch => "Expression types cannot be reconciled.",
            Category::AmbiguousConstraint => "More than one interpretation type-checks.",
            Category::NoViableOverload => "No overload accepts the provided arguments.",
            Category::SolverBudget => "Type checking gave up before exploring every alternative.",
        }
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Where a diagnostic points in the source, as byte offsets.
///
/// Deliberately independent of `veld-ast`'s span type; producers convert
/// at the boundary so this crate stays leaf-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file_id: u32,
    pub start: u32,
    pub end: u32,
}

/// A secondary location attached to a diagnostic, carrying its own short
/// message (e.g. "the first rejected alternative failed here").
#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub location: SourceLocation,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A single reported problem. The stable code is derived from the
/// category; there is no way to construct a diagnostic whose code and
/// category disagree.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: Category,
    /// What went wrong, in terms of the program, not the solver.
    pub message: String,
    /// Primary location. Absent for module-level problems with no single
    /// anchor (e.g. a duplicate declaration pair).
    pub location: Option<SourceLocation>,
    pub notes: Vec<Note>,
    /// A suggested way out, when one is known.
    pub hint: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: Severity, category: Category, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            location: None,
            notes: Vec::new(),
            hint: None,
        }
    }

    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, category, message)
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, category, message)
    }

    /// The stable code, derived from the category.
    pub fn code(&self) -> &'static str {
        self.category.code()
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_note(mut self, location: SourceLocation, message: impl Into<String>) -> Self {
        self.notes.push(Note {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag} {}: {}", self.code(), self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {}", note.message)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {hint}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregate error
// ---------------------------------------------------------------------------

/// Everything the semantic passes reported for a module, in emission
/// order. This is the error side of `type_check`'s result.
#[derive(Debug, Clone, thiserror::Error)]
#[error(
    "semantic analysis produced {} diagnostic(s), first: {}",
    .diagnostics.len(),
    .diagnostics.first().map(|d| d.message.clone()).unwrap_or_default()
)]
pub struct DiagnosticError {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_attaches_location_notes_and_hint() {
        let primary = SourceLocation {
            file_id: 1,
            start: 4,
            end: 9,
        };
        let secondary = SourceLocation {
            file_id: 1,
            start: 20,
            end: 24,
        };
        let diag = Diagnostic::error(
            Category::NoViableOverload,
            "no overload of `f` accepts these arguments",
        )
        .at(primary)
        .with_note(secondary, "the first rejected alternative failed here")
        .with_hint("check the declared overloads");

        assert!(diag.is_error());
        assert_eq!(diag.code(), "E0009");
        assert_eq!(diag.location, Some(primary));
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.notes[0].location, secondary);
        assert!(diag.hint.is_some());
    }

    #[test]
    fn display_renders_code_notes_and_hint() {
        let loc = SourceLocation {
            file_id: 0,
            start: 0,
            end: 4,
        };
        let diag = Diagnostic::error(Category::UndefinedSymbol, "undefined symbol `frob`")
            .at(loc)
            .with_note(loc, "nearest scope searched from here")
            .with_hint("fix the spelling");
        assert_eq!(
            diag.to_string(),
            "error E0006: undefined symbol `frob`\
             \n  note: nearest scope searched from here\
             \n  hint: fix the spelling"
        );

        let warn = Diagnostic::warning(Category::ConstraintMismatch, "suspicious conversion");
        assert!(warn.to_string().starts_with("warning E0007:"));
        assert!(!warn.is_error());
    }

    #[test]
    fn codes_follow_declaration_order() {
        for (index, category) in Category::ALL.iter().enumerate() {
            assert_eq!(
                category.code(),
                format!("E{:04}", index + 1),
                "code out of order for {}",
                category.as_str()
            );
            assert!(!category.description().is_empty());
        }
    }

    #[test]
    fn aggregate_error_counts_and_keeps_order() {
        let err = DiagnosticError::new(vec![
            Diagnostic::error(Category::ConstraintMismatch, "first problem"),
            Diagnostic::error(Category::UndefinedSymbol, "second problem"),
        ]);
        assert_eq!(err.diagnostics().len(), 2);
        assert!(err.to_string().contains("2 diagnostic(s)"));
        assert!(err.to_string().contains("first problem"));
        let owned = err.into_diagnostics();
        assert_eq!(owned[1].category, Category::UndefinedSymbol);
    }
}
