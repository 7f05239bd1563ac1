//! Normalized template AST and binding resolver.
//!
//! The host front-end parses markup and expressions; this crate takes that
//! raw, already-parsed model and normalizes it into a directive-resolved
//! template AST:
//! - classifying attributes into property/attribute/class/style/animation
//!   bindings, events, references, template variables and structural
//!   binding lists,
//! - expanding two-way bindings into their property/event pair,
//! - desugaring structural-directive shorthands into embedded templates,
//! - and answering scope queries over the result (`BoundTarget`).
//!
//! Nodes live in an arena and refer to each other through ids, so symbols
//! can point back at their owning node without ownership cycles.

mod ast;
mod bind;
mod build;
mod expr;
mod markup;
mod meta;

pub use ast::{
    AttrId, BindingKind, BoundAttribute, BoundEvent, BoundText, Content, DuplicateVariable,
    Element, EntityId, EventKind, ForBlock, ForEmpty, IfBlock, IfBranch, LetBlock, LetDeclaration,
    Node, NodeId, Reference, SwitchBlock, SwitchCase, Template, TemplateAst, TextAttribute,
    Variable, OUTPUT_CHANGE_SUFFIX,
};
pub use bind::{BoundTarget, ReferenceTarget, ScopeId, TemplateEntity};
pub use build::{build_template_ast, FOR_LOOP_CONTEXT_VARIABLES};
pub use expr::{Expr, ObjectEntry, Stmt};
pub use markup::{
    AttributeInfo, AttributeKind, EventBindingKind, PropertyBindingKind, RawAttrValue,
    RawAttribute, RawContent, RawElement, RawForBlock, RawForEmpty, RawIfBlock, RawIfBranch,
    RawInterpolation, RawLetBlock, RawLetDeclaration, RawNode, RawSwitchBlock, RawSwitchCase,
    RawText, RawVariable, TemplateBinding,
};
pub use meta::{
    DirectiveId, DirectiveMeta, DirectiveProperty, PipeId, PipeMeta, Registry, TemplateGuard,
    TemplateGuardKind,
};
