//! Code-text emitter that records source mappings as it appends.
//!
//! Everything the transpiler generates flows through [`ExpressionBuilder`]:
//! each append can anchor a mapping at the builder's current length, and
//! splicing one finished [`Expression`] into another re-bases the spliced
//! mappings by the current buffer length. That splice is the only
//! re-basing mechanism in the crate; offsets and lengths are bytes,
//! additive, with no normalization.

use smol_str::SmolStr;
use source_map::{MappingFlags, SourceMapping, Span};
use std::fmt;

/// Mapping usable for type queries, navigation and diagnostics.
pub const MAP_FULL: MappingFlags = MappingFlags::TYPES
    .union(MappingFlags::SEMANTIC)
    .union(MappingFlags::DIAGNOSTICS);

/// Mapping usable for navigation and diagnostics, but not type queries.
pub const MAP_NAV: MappingFlags = MappingFlags::SEMANTIC.union(MappingFlags::DIAGNOSTICS);

/// Mapping for declarations whose diagnostics are reported elsewhere.
pub const MAP_TYPES_ONLY: MappingFlags = MappingFlags::TYPES;

/// A synthetic identifier in the generated code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    /// The name used in the generated code, e.g. `_t3`.
    pub name: SmolStr,
    /// The name the symbol had in the template, when it stands in for one.
    pub source_name: Option<SmolStr>,
    /// Where that symbol was declared in the template.
    pub source_span: Option<Span>,
}

impl Identifier {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            source_name: None,
            source_span: None,
        }
    }

    pub fn with_source(
        name: impl Into<SmolStr>,
        source_name: Option<SmolStr>,
        source_span: Option<Span>,
    ) -> Self {
        Self {
            name: name.into(),
            source_name,
            source_span,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One record renaming a generated identifier back to its template name,
/// anchored at the source offset of the template symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMapping {
    pub source_offset: u32,
    pub generated_name: SmolStr,
    pub source_name: SmolStr,
}

/// A finished fragment of generated code together with its mappings.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    code: String,
    mappings: Vec<SourceMapping>,
    name_mappings: Vec<NameMapping>,
}

impl Expression {
    /// Builds an expression with a builder closure.
    pub fn build(f: impl FnOnce(&mut ExpressionBuilder)) -> Expression {
        let mut builder = ExpressionBuilder::new();
        f(&mut builder);
        builder.finish()
    }

    /// An expression of plain code with no mappings.
    pub fn from_code(code: impl Into<String>) -> Expression {
        Expression {
            code: code.into(),
            mappings: Vec::new(),
            name_mappings: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn mappings(&self) -> &[SourceMapping] {
        &self.mappings
    }

    pub fn name_mappings(&self) -> &[NameMapping] {
        &self.name_mappings
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<SourceMapping>, Vec<NameMapping>) {
        (self.code, self.mappings, self.name_mappings)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code)
    }
}

/// A finished statement; a statement is an expression the renderer has
/// already terminated.
#[derive(Debug, Clone)]
pub struct Statement(Expression);

impl Statement {
    pub fn build(f: impl FnOnce(&mut ExpressionBuilder)) -> Statement {
        Statement(Expression::build(f))
    }

    pub fn expression(&self) -> &Expression {
        &self.0
    }
}

/// Accumulates generated text and mapping records.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    code: String,
    mappings: Vec<SourceMapping>,
    name_mappings: Vec<NameMapping>,
    ignore_diagnostics: bool,
    reverse_types: bool,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current generated length in bytes.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.code.len() as u32
    }

    /// Whether appends are currently stripped of diagnostic capability.
    pub fn is_ignore_diagnostics(&self) -> bool {
        self.ignore_diagnostics
    }

    fn effective_flags(&self, requested: MappingFlags) -> MappingFlags {
        let mut flags = if self.ignore_diagnostics {
            requested & MappingFlags::REVERSE_TYPES
        } else {
            requested
        };
        if self.reverse_types {
            flags |= MappingFlags::REVERSE_TYPES;
        }
        flags
    }

    /// Appends literal text without a mapping.
    pub fn append(&mut self, text: &str) -> &mut Self {
        self.code.push_str(text);
        self
    }

    /// Appends text, recording a mapping anchored at the current length
    /// when a span is supplied.
    pub fn append_mapped(
        &mut self,
        text: &str,
        span: Option<Span>,
        flags: MappingFlags,
    ) -> &mut Self {
        if let Some(span) = span {
            let generated = Span::at(self.offset(), text.len() as u32);
            self.mappings
                .push(SourceMapping::new(span, generated, self.effective_flags(flags)));
        }
        self.code.push_str(text);
        self
    }

    /// Appends an identifier, mapping it at `span` and recording a rename
    /// entry when the identifier stands in for a template symbol.
    pub fn append_identifier(
        &mut self,
        id: &Identifier,
        span: Option<Span>,
        flags: MappingFlags,
    ) -> &mut Self {
        if let (Some(source_name), Some(span)) = (&id.source_name, span) {
            if !self.ignore_diagnostics {
                self.name_mappings.push(NameMapping {
                    source_offset: span.start.into(),
                    generated_name: id.name.clone(),
                    source_name: source_name.clone(),
                });
            }
        }
        self.append_mapped(&id.name, span, flags)
    }

    /// Splices a finished expression: its buffer is appended and every
    /// spliced mapping's generated offset is re-based by the current
    /// length. An ambient ignore strips everything but reverse-types from
    /// the spliced flags.
    pub fn append_expr(&mut self, expr: &Expression) -> &mut Self {
        let base = self.offset();
        for mapping in &expr.mappings {
            let mut flags = if self.ignore_diagnostics {
                mapping.flags & MappingFlags::REVERSE_TYPES
            } else {
                mapping.flags
            };
            if self.reverse_types {
                flags |= MappingFlags::REVERSE_TYPES;
            }
            self.mappings
                .push(SourceMapping::new(mapping.source, mapping.generated.shift(base), flags));
        }
        if !self.ignore_diagnostics {
            self.name_mappings.extend(expr.name_mappings.iter().cloned());
        }
        self.code.push_str(&expr.code);
        self
    }

    /// Splices a statement followed by a newline.
    pub fn append_statement(&mut self, statement: &Statement) -> &mut Self {
        self.append_expr(statement.expression());
        self.new_line();
        self
    }

    /// Runs `f` and maps everything it appended to `span`.
    pub fn with_span(
        &mut self,
        span: Option<Span>,
        flags: MappingFlags,
        f: impl FnOnce(&mut Self),
    ) {
        match span {
            Some(span) => {
                let start = self.offset();
                f(self);
                self.map_from(start, span, flags);
            }
            None => f(self),
        }
    }

    /// Maps the region appended since `start` to `span`. Used when the
    /// mapped region is produced by recursive emission rather than one
    /// append.
    pub fn map_from(&mut self, start: u32, span: Span, flags: MappingFlags) {
        let generated = Span::new(start, self.offset());
        self.mappings
            .push(SourceMapping::new(span, generated, self.effective_flags(flags)));
    }

    /// Strips diagnostic capability from every mapping recorded inside
    /// `f`. Scoped: the previous state is restored afterwards, so nested
    /// uses cannot leave the flag stuck.
    pub fn with_ignore_diagnostics(&mut self, f: impl FnOnce(&mut Self)) {
        let previous = std::mem::replace(&mut self.ignore_diagnostics, true);
        f(self);
        self.ignore_diagnostics = previous;
    }

    /// Adds reverse-type capability to every mapping recorded inside `f`.
    pub fn with_reverse_types(&mut self, f: impl FnOnce(&mut Self)) {
        let previous = std::mem::replace(&mut self.reverse_types, true);
        f(self);
        self.reverse_types = previous;
    }

    /// Wraps `f`'s output in `{ … }`.
    pub fn code_block(&mut self, f: impl FnOnce(&mut Self)) {
        self.append("{\n");
        f(self);
        self.append("}");
    }

    /// A non-wrapping grouping for top-level statement sequences.
    pub fn statements(&mut self, f: impl FnOnce(&mut Self)) {
        f(self);
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.append("\n")
    }

    pub fn finish(self) -> Expression {
        Expression {
            code: self.code,
            mappings: self.mappings,
            name_mappings: self.name_mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn span(start: u32, end: u32) -> Span {
        Span::new(start, end)
    }

    #[test]
    fn test_append_mapped_anchors_at_current_length() {
        let expr = Expression::build(|b| {
            b.append("var x = ");
            b.append_mapped("userName", Some(span(10, 18)), MAP_FULL);
            b.append(";");
        });
        assert_eq!(expr.code(), "var x = userName;");
        assert_eq!(expr.mappings().len(), 1);
        let mapping = expr.mappings()[0];
        assert_eq!(mapping.source, span(10, 18));
        assert_eq!(mapping.generated, span(8, 16));
        assert_eq!(mapping.flags, MAP_FULL);
    }

    #[test]
    fn test_splice_rebases_generated_offsets() {
        let inner = Expression::build(|b| {
            b.append_mapped("value", Some(span(5, 10)), MAP_FULL);
        });
        let outer = Expression::build(|b| {
            b.append("(");
            b.append_expr(&inner);
            b.append(")");
        });
        assert_eq!(outer.code(), "(value)");
        assert_eq!(outer.mappings()[0].generated, span(1, 6));
        assert_eq!(outer.mappings()[0].source, span(5, 10));
    }

    #[test]
    fn test_ignore_diagnostics_is_scoped_and_nested() {
        let expr = Expression::build(|b| {
            b.with_ignore_diagnostics(|b| {
                b.append_mapped("a", Some(span(0, 1)), MAP_FULL);
                b.with_ignore_diagnostics(|b| {
                    b.append_mapped("b", Some(span(1, 2)), MAP_FULL);
                });
                b.append_mapped("c", Some(span(2, 3)), MAP_FULL);
            });
            b.append_mapped("d", Some(span(3, 4)), MAP_FULL);
        });
        let flags: Vec<_> = expr.mappings().iter().map(|m| m.flags).collect();
        assert_eq!(
            flags,
            vec![
                MappingFlags::empty(),
                MappingFlags::empty(),
                MappingFlags::empty(),
                MAP_FULL
            ]
        );
    }

    #[test]
    fn test_ignored_splice_keeps_only_reverse_types() {
        let inner = Expression::build(|b| {
            b.with_reverse_types(|b| {
                b.append_mapped("x", Some(span(0, 1)), MAP_FULL);
            });
            b.append_mapped("y", Some(span(1, 2)), MAP_FULL);
        });
        let outer = Expression::build(|b| {
            b.with_ignore_diagnostics(|b| {
                b.append_expr(&inner);
            });
        });
        assert_eq!(outer.mappings()[0].flags, MappingFlags::REVERSE_TYPES);
        assert_eq!(outer.mappings()[1].flags, MappingFlags::empty());
    }

    #[test]
    fn test_with_span_covers_block_output() {
        let expr = Expression::build(|b| {
            b.append("head ");
            b.with_span(Some(span(100, 110)), MAP_FULL, |b| {
                b.append("middle");
            });
        });
        let mapping = expr.mappings()[0];
        assert_eq!(mapping.generated, span(5, 11));
        assert_eq!(mapping.source, span(100, 110));
    }

    #[test]
    fn test_identifier_rename_recorded() {
        let id = Identifier::with_source("_t1", Some("item".into()), Some(span(7, 11)));
        let expr = Expression::build(|b| {
            b.append_identifier(&id, id.source_span, MAP_FULL);
        });
        assert_eq!(expr.code(), "_t1");
        assert_eq!(
            expr.name_mappings(),
            &[NameMapping {
                source_offset: 7,
                generated_name: "_t1".into(),
                source_name: "item".into(),
            }]
        );
    }

    #[test]
    fn test_code_block_wraps_output() {
        let expr = Expression::build(|b| {
            b.code_block(|b| {
                b.append("x;");
                b.new_line();
            });
        });
        assert_eq!(expr.code(), "{\nx;\n}");
    }
}
