//! The normalized, directive-resolved template AST.
//!
//! Nodes are stored in an arena owned by [`TemplateAst`] and refer to each
//! other by [`NodeId`]. Symbols declared in the template (variables,
//! references, `@let` declarations) carry an [`EntityId`] so the renderer
//! and resolver can track them without holding pointers into the tree, and
//! a [`Reference`] points back at its owning node by id rather than by an
//! owning link.

use crate::expr::{Expr, Stmt};
use crate::meta::DirectiveId;
use indexmap::IndexMap;
use smol_str::SmolStr;
use source_map::Span;

/// The suffix appended to a property name to form the change event of a
/// two-way binding.
pub const OUTPUT_CHANGE_SUFFIX: &str = "Change";

/// Index of a node in the template arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Build-time-unique id of a bound attribute, event or text attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttrId(pub u32);

/// Build-time-unique id of a template-declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u32);

/// A node of the normalized template tree.
#[derive(Debug)]
pub enum Node {
    Element(Element),
    Template(Template),
    BoundText(BoundText),
    Content(Content),
    If(IfBlock),
    IfBranch(IfBranch),
    For(ForBlock),
    ForEmpty(ForEmpty),
    Switch(SwitchBlock),
    SwitchCase(SwitchCase),
    Let(LetBlock),
}

/// A native element (or web component).
#[derive(Debug)]
pub struct Element {
    pub tag_name: SmolStr,
    pub directives: Vec<DirectiveId>,
    pub inputs: IndexMap<SmolStr, BoundAttribute>,
    pub outputs: IndexMap<SmolStr, BoundEvent>,
    pub attributes: IndexMap<SmolStr, TextAttribute>,
    pub references: IndexMap<SmolStr, Reference>,
    pub children: Vec<NodeId>,
    pub start_span: Option<Span>,
}

/// An embedded template: a template container tag, or the result of
/// desugaring a structural-directive shorthand.
#[derive(Debug)]
pub struct Template {
    /// The original tag name for desugared shorthands, `None` for an
    /// explicit template tag.
    pub tag_name: Option<SmolStr>,
    pub directives: Vec<DirectiveId>,
    pub inputs: IndexMap<SmolStr, BoundAttribute>,
    pub outputs: IndexMap<SmolStr, BoundEvent>,
    pub attributes: IndexMap<SmolStr, TextAttribute>,
    pub references: IndexMap<SmolStr, Reference>,
    pub variables: IndexMap<SmolStr, Variable>,
    pub children: Vec<NodeId>,
    pub start_span: Option<Span>,
}

/// An interpolation region.
#[derive(Debug)]
pub struct BoundText {
    pub expression: Option<Expr>,
    pub span: Span,
}

/// A pass-through container (content projection, expansion forms).
#[derive(Debug)]
pub struct Content {
    pub children: Vec<NodeId>,
}

/// An `@if` block and its chained branches.
#[derive(Debug)]
pub struct IfBlock {
    pub name_span: Option<Span>,
    pub branches: Vec<NodeId>,
}

/// One branch of an `@if` block; the final `else` has no expression.
#[derive(Debug)]
pub struct IfBranch {
    pub name_span: Option<Span>,
    pub expression: Option<Expr>,
    pub expression_alias: Option<Variable>,
    pub children: Vec<NodeId>,
}

/// An `@for` block.
#[derive(Debug)]
pub struct ForBlock {
    pub name_span: Option<Span>,
    pub item: Option<Variable>,
    /// Implicit loop variables, keyed by their implicit name (`$index`, …).
    pub context_variables: IndexMap<SmolStr, Variable>,
    pub expression: Option<Expr>,
    pub track_by: Option<Expr>,
    pub empty: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// The `@empty` section of an `@for` block.
#[derive(Debug)]
pub struct ForEmpty {
    pub name_span: Option<Span>,
    pub children: Vec<NodeId>,
}

/// An `@switch` block.
#[derive(Debug)]
pub struct SwitchBlock {
    pub name_span: Option<Span>,
    pub expression: Option<Expr>,
    pub cases: Vec<NodeId>,
}

/// One `@case` (or `@default`, with no expression) of an `@switch` block.
#[derive(Debug)]
pub struct SwitchCase {
    pub name_span: Option<Span>,
    pub expression: Option<Expr>,
    pub children: Vec<NodeId>,
}

/// An `@let` block.
#[derive(Debug)]
pub struct LetBlock {
    pub name_span: Option<Span>,
    pub declaration: Option<LetDeclaration>,
}

/// The declaration carried by an `@let` block.
#[derive(Debug)]
pub struct LetDeclaration {
    pub id: EntityId,
    pub name: SmolStr,
    pub name_span: Option<Span>,
    pub value: Option<Expr>,
    pub source_span: Span,
}

/// The flavor of a bound attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `[property]="expr"`.
    Property,
    /// `[attr.name]="expr"`.
    Attribute,
    /// `[class.name]="expr"`.
    Class,
    /// `[style.name]="expr"`.
    Style,
    /// `[@name]="expr"`.
    Animation,
    /// Reserved for hosts that do not expand two-way bindings themselves;
    /// the builder always expands `[(x)]` into a `Property` input plus a
    /// `TwoWay` event.
    TwoWay,
}

/// The flavor of a bound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Regular,
    Animation,
    /// The synthetic change event of an expanded two-way binding.
    TwoWay,
}

/// A bound attribute (property/attribute/class/style/animation binding).
#[derive(Debug)]
pub struct BoundAttribute {
    pub id: AttrId,
    pub name: SmolStr,
    pub key_span: Option<Span>,
    pub kind: BindingKind,
    pub value: Option<Expr>,
    pub source_span: Span,
    /// Whether this binding came from a structural-directive binding list.
    pub is_structural: bool,
}

/// A bound event.
#[derive(Debug)]
pub struct BoundEvent {
    pub id: AttrId,
    pub name: SmolStr,
    pub key_span: Option<Span>,
    pub kind: EventKind,
    pub handler: Vec<Stmt>,
    pub target: Option<SmolStr>,
    pub source_span: Span,
}

/// A plain attribute with a static value.
#[derive(Debug)]
pub struct TextAttribute {
    pub id: AttrId,
    pub name: SmolStr,
    pub key_span: Option<Span>,
    pub value: SmolStr,
    pub value_span: Option<Span>,
    pub source_span: Span,
}

/// A template-scope variable.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: EntityId,
    pub name: SmolStr,
    /// The context key the variable reads, `None` for the implicit value.
    pub value: Option<SmolStr>,
    pub key_span: Option<Span>,
    pub value_span: Option<Span>,
}

/// A local reference (`#name`).
#[derive(Debug, Clone)]
pub struct Reference {
    pub id: EntityId,
    pub name: SmolStr,
    pub key_span: Option<Span>,
    /// The export-as name the reference asks for, empty for the default.
    pub value: SmolStr,
    pub value_span: Option<Span>,
    /// The node the reference is declared on. Non-owning; used only for
    /// scope lookup.
    pub owner: NodeId,
}

/// A variable name declared more than once on the same template, noted
/// during normalization and surfaced later as an out-of-band diagnostic.
#[derive(Debug, Clone)]
pub struct DuplicateVariable {
    pub name: SmolStr,
    pub span: Option<Span>,
}

/// The arena-backed template tree for one transpilation request.
#[derive(Debug, Default)]
pub struct TemplateAst {
    pub(crate) nodes: Vec<Node>,
    pub(crate) roots: Vec<NodeId>,
    pub(crate) duplicate_variables: Vec<DuplicateVariable>,
}

impl TemplateAst {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Variables that were declared more than once on a single template.
    pub fn duplicate_variables(&self) -> &[DuplicateVariable] {
        &self.duplicate_variables
    }
}
