//! Out-of-band diagnostics collected while rendering.
//!
//! These cover template problems the external type checker cannot see
//! (missing pipes, unresolvable references, conflicting declarations).
//! They are collected, never thrown; a template with problems still
//! renders a best-effort type-check block.

use source_map::Span;

/// The severity of a collected diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

/// Codes for all out-of-band diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OobCode {
    /// `missing-pipe`: a pipe name that resolves to nothing in scope.
    MissingPipe,
    /// `missing-reference-target`: a reference export name with no match.
    MissingReferenceTarget,
    /// `duplicate-template-variable`
    DuplicateTemplateVariable,
    /// `conflicting-let-declaration`
    ConflictingLetDeclaration,
    /// `let-used-before-definition`
    LetUsedBeforeDefinition,
    /// `illegal-write-to-let`
    IllegalWriteToLet,
    /// `illegal-track-access`: a `track` expression reading something
    /// other than the loop item, `$index`, or component members.
    IllegalTrackAccess,
    /// `split-two-way-binding`: input and change event consumed by
    /// different entities.
    SplitTwoWayBinding,
}

impl OobCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OobCode::MissingPipe => "missing-pipe",
            OobCode::MissingReferenceTarget => "missing-reference-target",
            OobCode::DuplicateTemplateVariable => "duplicate-template-variable",
            OobCode::ConflictingLetDeclaration => "conflicting-let-declaration",
            OobCode::LetUsedBeforeDefinition => "let-used-before-definition",
            OobCode::IllegalWriteToLet => "illegal-write-to-let",
            OobCode::IllegalTrackAccess => "illegal-track-access",
            OobCode::SplitTwoWayBinding => "split-two-way-binding",
        }
    }

    pub fn default_severity(&self) -> Severity {
        match self {
            OobCode::DuplicateTemplateVariable | OobCode::SplitTwoWayBinding => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl std::fmt::Display for OobCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collected diagnostic, positioned in the template's own coordinates.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: OobCode,
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    fn new(code: OobCode, message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: code.default_severity(),
            code,
            message: message.into(),
            span,
        }
    }

    /// This diagnostic with its span shifted into an outer coordinate
    /// space.
    pub fn shifted(mut self, offset: u32) -> Self {
        self.span = self.span.map(|s| s.shift(offset));
        self
    }
}

/// Collects out-of-band diagnostics for one template render.
#[derive(Debug, Default)]
pub struct OobRecorder {
    diagnostics: Vec<Diagnostic>,
}

impl OobRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing_pipe(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::MissingPipe,
            format!("no pipe named `{name}` is available in this scope"),
            span,
        ));
    }

    pub fn missing_reference_target(&mut self, name: &str, value: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::MissingReferenceTarget,
            format!("reference `#{name}` targets `{value}`, which no directive on this node exports"),
            span,
        ));
    }

    pub fn duplicate_template_variable(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::DuplicateTemplateVariable,
            format!("template variable `{name}` is declared more than once"),
            span,
        ));
    }

    pub fn conflicting_let_declaration(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::ConflictingLetDeclaration,
            format!("`@let {name}` conflicts with another declaration in the same scope"),
            span,
        ));
    }

    pub fn let_used_before_definition(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::LetUsedBeforeDefinition,
            format!("`{name}` is read before its `@let` declaration"),
            span,
        ));
    }

    pub fn illegal_write_to_let(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::IllegalWriteToLet,
            format!("cannot assign to `@let` declaration `{name}`"),
            span,
        ));
    }

    pub fn illegal_track_access(&mut self, name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::IllegalTrackAccess,
            format!(
                "`track` may only read `{name}` if it is the loop item, `$index`, or a component member"
            ),
            span,
        ));
    }

    pub fn split_two_way_binding(&mut self, input_name: &str, span: Option<Span>) {
        self.diagnostics.push(Diagnostic::new(
            OobCode::SplitTwoWayBinding,
            format!(
                "the two-way binding for `{input_name}` resolves its input and its change event to different targets"
            ),
            span,
        ));
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
