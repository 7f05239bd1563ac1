//! Raw markup model handed in by the host front-end, and attribute-name
//! classification.
//!
//! The raw model mirrors what a markup parser produces: elements with
//! attributes still carrying their binding sigils (`[x]`, `(y)`, `[(z)]`,
//! `#ref`, `let-v`, `*dir`), plus already-parsed expression payloads.
//! Classification of those names happens here; everything that does not
//! parse as a binding form degrades to a plain text attribute.

use crate::expr::{Expr, Stmt};
use crate::meta::DirectiveId;
use smol_str::SmolStr;
use source_map::Span;

/// A node of the raw markup tree.
#[derive(Debug)]
pub enum RawNode {
    Element(RawElement),
    /// Plain text. Produces no type-check code.
    Text(RawText),
    /// An interpolation region, `{{ expr }}`.
    Interpolation(RawInterpolation),
    /// A content-projection / expansion-form pass-through container.
    Content(RawContent),
    If(RawIfBlock),
    For(RawForBlock),
    Switch(RawSwitchBlock),
    Let(RawLetBlock),
}

/// An element (or template tag) as parsed from markup.
#[derive(Debug)]
pub struct RawElement {
    pub tag_name: SmolStr,
    /// Whether this is a template container tag rather than a real element.
    pub is_template_tag: bool,
    pub attributes: Vec<RawAttribute>,
    /// Directives the host matched against the element itself.
    pub directives: Vec<DirectiveId>,
    /// Directives the host matched against the structural shorthand, when
    /// one of the attributes is a `*`-binding.
    pub template_directives: Vec<DirectiveId>,
    pub children: Vec<RawNode>,
    /// Span of the start tag name.
    pub start_span: Span,
}

/// One attribute as written, sigils and all.
#[derive(Debug)]
pub struct RawAttribute {
    /// The full source name, e.g. `[(value)]` or `*ngIf`.
    pub name: SmolStr,
    /// Span of the name in the template.
    pub key_span: Span,
    pub value: Option<RawAttrValue>,
    pub value_span: Option<Span>,
    /// Span of the whole attribute.
    pub source_span: Span,
}

/// The parsed payload of an attribute value.
#[derive(Debug)]
pub enum RawAttrValue {
    /// A static text value.
    Text(SmolStr),
    /// A binding expression.
    Expr(Expr),
    /// An event-handler body.
    Handler(Vec<Stmt>),
    /// A structural-directive binding list (`*dir="let x of items"`).
    Bindings(Vec<TemplateBinding>),
}

/// One entry of a structural-directive binding list.
#[derive(Debug)]
pub enum TemplateBinding {
    /// `key: expr` — an input binding on the synthetic template.
    Expression {
        key: SmolStr,
        key_span: Option<Span>,
        value: Option<Expr>,
        span: Span,
    },
    /// `let name = ctx_key` — a variable on the synthetic template,
    /// reading `ctx_key` (or the implicit value) off the template context.
    Variable(RawVariable),
}

/// A template-scope variable before normalization.
#[derive(Debug, Clone)]
pub struct RawVariable {
    pub name: SmolStr,
    pub key_span: Option<Span>,
    /// The context key the variable reads, `None` for the implicit value.
    pub value: Option<SmolStr>,
    pub value_span: Option<Span>,
}

#[derive(Debug)]
pub struct RawText {
    pub value: SmolStr,
    pub span: Span,
}

#[derive(Debug)]
pub struct RawInterpolation {
    pub expression: Option<Expr>,
    pub span: Span,
}

#[derive(Debug)]
pub struct RawContent {
    pub children: Vec<RawNode>,
    pub span: Span,
}

#[derive(Debug)]
pub struct RawIfBlock {
    pub name_span: Span,
    pub branches: Vec<RawIfBranch>,
}

#[derive(Debug)]
pub struct RawIfBranch {
    pub name_span: Span,
    /// `None` for the final `else` branch.
    pub expression: Option<Expr>,
    /// `@if (expr; as alias)`.
    pub alias: Option<RawVariable>,
    pub children: Vec<RawNode>,
}

#[derive(Debug)]
pub struct RawForBlock {
    pub name_span: Span,
    pub item: Option<RawVariable>,
    /// Aliases for the implicit loop variables, keyed by the implicit name
    /// (`$index`, `$first`, …) in `value`.
    pub context_variables: Vec<RawVariable>,
    pub expression: Option<Expr>,
    pub track_by: Option<Expr>,
    pub children: Vec<RawNode>,
    pub empty: Option<RawForEmpty>,
}

#[derive(Debug)]
pub struct RawForEmpty {
    pub name_span: Span,
    pub children: Vec<RawNode>,
}

#[derive(Debug)]
pub struct RawSwitchBlock {
    pub name_span: Span,
    pub expression: Option<Expr>,
    pub cases: Vec<RawSwitchCase>,
}

#[derive(Debug)]
pub struct RawSwitchCase {
    pub name_span: Span,
    /// `None` for the default case.
    pub expression: Option<Expr>,
    pub children: Vec<RawNode>,
}

#[derive(Debug)]
pub struct RawLetBlock {
    pub name_span: Span,
    pub declaration: Option<RawLetDeclaration>,
}

#[derive(Debug)]
pub struct RawLetDeclaration {
    pub name: SmolStr,
    pub name_span: Option<Span>,
    pub value: Option<Expr>,
    pub source_span: Span,
}

/// The flavor of a classified property binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyBindingKind {
    Property,
    Attribute,
    Class,
    Style,
    Animation,
}

/// The flavor of a classified event binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBindingKind {
    Regular,
    Animation,
}

/// What an attribute name parsed as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    /// A plain attribute with a static value.
    Regular,
    /// `[name]`, `bind-name`, `[attr.name]`, `[class.name]`, …
    PropertyBinding(PropertyBindingKind),
    /// `[(name)]` or `bindon-name`.
    TwoWayBinding,
    /// `(name)` or `on-name`.
    Event(EventBindingKind),
    /// `#name` or `ref-name`.
    Reference,
    /// `let-name` on a template tag.
    Let,
    /// `*name` structural shorthand.
    TemplateBindings,
}

/// The result of classifying one attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub kind: AttributeKind,
    /// The name with sigils stripped.
    pub name: SmolStr,
    /// Byte offset of `name` within the raw attribute name.
    pub name_offset: u32,
}

impl AttributeInfo {
    fn new(kind: AttributeKind, name: &str, name_offset: u32) -> Self {
        Self {
            kind,
            name: SmolStr::new(name),
            name_offset,
        }
    }

    fn regular(name: &str) -> Self {
        Self::new(AttributeKind::Regular, name, 0)
    }

    /// Classifies an attribute name. Never fails; names that do not parse
    /// as a binding form are regular attributes.
    pub fn parse(raw: &str) -> AttributeInfo {
        if let Some(rest) = raw.strip_prefix('*') {
            if rest.is_empty() {
                return Self::regular(raw);
            }
            return Self::new(AttributeKind::TemplateBindings, rest, 1);
        }
        if let Some(rest) = raw.strip_prefix('#') {
            if rest.is_empty() {
                return Self::regular(raw);
            }
            return Self::new(AttributeKind::Reference, rest, 1);
        }
        if let Some(rest) = raw.strip_prefix("ref-") {
            return Self::new(AttributeKind::Reference, rest, 4);
        }
        if let Some(rest) = raw.strip_prefix("let-") {
            return Self::new(AttributeKind::Let, rest, 4);
        }
        if let Some(inner) = delimited(raw, "[(", ")]") {
            return Self::new(AttributeKind::TwoWayBinding, inner, 2);
        }
        if let Some(rest) = raw.strip_prefix("bindon-") {
            return Self::new(AttributeKind::TwoWayBinding, rest, 7);
        }
        if let Some(inner) = delimited(raw, "[", "]") {
            return Self::property(inner, 1);
        }
        if let Some(rest) = raw.strip_prefix("bind-") {
            return Self::property(rest, 5);
        }
        if let Some(inner) = delimited(raw, "(", ")") {
            return Self::event(inner, 1);
        }
        if let Some(rest) = raw.strip_prefix("on-") {
            return Self::event(rest, 3);
        }
        if let Some(rest) = raw.strip_prefix('@') {
            if rest.is_empty() {
                return Self::regular(raw);
            }
            return Self::new(
                AttributeKind::PropertyBinding(PropertyBindingKind::Animation),
                rest,
                1,
            );
        }
        Self::regular(raw)
    }

    fn property(name: &str, base_offset: u32) -> Self {
        let (kind, name, extra) = if let Some(rest) = name.strip_prefix("attr.") {
            (PropertyBindingKind::Attribute, rest, 5)
        } else if let Some(rest) = name.strip_prefix("class.") {
            (PropertyBindingKind::Class, rest, 6)
        } else if let Some(rest) = name.strip_prefix("style.") {
            (PropertyBindingKind::Style, rest, 6)
        } else if let Some(rest) = name.strip_prefix("animate.") {
            (PropertyBindingKind::Animation, rest, 8)
        } else if let Some(rest) = name.strip_prefix('@') {
            (PropertyBindingKind::Animation, rest, 1)
        } else {
            (PropertyBindingKind::Property, name, 0)
        };
        Self::new(
            AttributeKind::PropertyBinding(kind),
            name,
            base_offset + extra,
        )
    }

    fn event(name: &str, base_offset: u32) -> Self {
        let (kind, name, extra) = if let Some(rest) = name.strip_prefix("animate.") {
            (EventBindingKind::Animation, rest, 8)
        } else if let Some(rest) = name.strip_prefix('@') {
            (EventBindingKind::Animation, rest, 1)
        } else {
            (EventBindingKind::Regular, name, 0)
        };
        Self::new(AttributeKind::Event(kind), name, base_offset + extra)
    }
}

/// Returns the text between `open` and `close` when `raw` is wrapped in
/// exactly that pair and the inside is non-empty.
fn delimited<'a>(raw: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let inner = raw.strip_prefix(open)?.strip_suffix(close)?;
    if inner.is_empty() {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(raw: &str) -> (AttributeKind, String, u32) {
        let info = AttributeInfo::parse(raw);
        (info.kind, info.name.to_string(), info.name_offset)
    }

    #[test]
    fn test_property_forms() {
        assert_eq!(
            parse("[value]"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Property),
                "value".into(),
                1
            )
        );
        assert_eq!(
            parse("bind-value"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Property),
                "value".into(),
                5
            )
        );
        assert_eq!(
            parse("[attr.role]"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Attribute),
                "role".into(),
                6
            )
        );
        assert_eq!(
            parse("[class.active]"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Class),
                "active".into(),
                7
            )
        );
        assert_eq!(
            parse("[style.width]"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Style),
                "width".into(),
                7
            )
        );
        assert_eq!(
            parse("[@fade]"),
            (
                AttributeKind::PropertyBinding(PropertyBindingKind::Animation),
                "fade".into(),
                2
            )
        );
    }

    #[test]
    fn test_event_forms() {
        assert_eq!(
            parse("(click)"),
            (
                AttributeKind::Event(EventBindingKind::Regular),
                "click".into(),
                1
            )
        );
        assert_eq!(
            parse("on-click"),
            (
                AttributeKind::Event(EventBindingKind::Regular),
                "click".into(),
                3
            )
        );
        assert_eq!(
            parse("(@fade.done)"),
            (
                AttributeKind::Event(EventBindingKind::Animation),
                "fade.done".into(),
                2
            )
        );
    }

    #[test]
    fn test_two_way_forms() {
        assert_eq!(
            parse("[(value)]"),
            (AttributeKind::TwoWayBinding, "value".into(), 2)
        );
        assert_eq!(
            parse("bindon-value"),
            (AttributeKind::TwoWayBinding, "value".into(), 7)
        );
    }

    #[test]
    fn test_reference_variable_and_structural_forms() {
        assert_eq!(parse("#input"), (AttributeKind::Reference, "input".into(), 1));
        assert_eq!(
            parse("ref-input"),
            (AttributeKind::Reference, "input".into(), 4)
        );
        assert_eq!(parse("let-item"), (AttributeKind::Let, "item".into(), 4));
        assert_eq!(
            parse("*ngIf"),
            (AttributeKind::TemplateBindings, "ngIf".into(), 1)
        );
    }

    #[test]
    fn test_malformed_names_degrade_to_regular() {
        assert_eq!(parse("[value"), (AttributeKind::Regular, "[value".into(), 0));
        assert_eq!(parse("[]"), (AttributeKind::Regular, "[]".into(), 0));
        assert_eq!(parse("#"), (AttributeKind::Regular, "#".into(), 0));
        assert_eq!(parse("title"), (AttributeKind::Regular, "title".into(), 0));
    }
}
