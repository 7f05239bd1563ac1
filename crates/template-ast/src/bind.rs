//! Read-only scope queries over a built template AST.
//!
//! `BoundTarget` answers the three questions the renderer keeps asking:
//! which directives apply to a node, what a reference resolves to, and
//! what entity a bare identifier read inside an expression refers to.
//! All queries are total; absence is `None`, never an error.

use crate::ast::*;
use crate::meta::{DirectiveId, PipeId, Registry};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Index of a lexical scope within one `BoundTarget`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

/// A template-local symbol an expression identifier can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEntity {
    /// A template or block variable, with the node that declares it.
    Variable { id: EntityId, declarer: NodeId },
    /// A local reference, with the node it is declared on.
    Reference { id: EntityId, node: NodeId },
    /// An `@let` declaration, with its block node.
    Let { id: EntityId, node: NodeId },
}

impl TemplateEntity {
    pub fn id(&self) -> EntityId {
        match self {
            TemplateEntity::Variable { id, .. }
            | TemplateEntity::Reference { id, .. }
            | TemplateEntity::Let { id, .. } => *id,
        }
    }
}

/// What a reference resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceTarget {
    /// A directive on the owning node, captured through an `exportAs` name
    /// or, for blank references, the node's component.
    Directive(DirectiveId),
    /// The owning node itself.
    Node(NodeId),
}

#[derive(Debug, Default)]
struct ScopeData {
    parent: Option<ScopeId>,
    symbols: IndexMap<SmolStr, TemplateEntity>,
}

/// The binding resolver for one template.
pub struct BoundTarget<'a> {
    ast: &'a TemplateAst,
    registry: &'a Registry,
    scopes: Vec<ScopeData>,
    /// The scope a template/branch/loop/case node introduces for its
    /// children.
    node_scopes: FxHashMap<NodeId, ScopeId>,
}

impl<'a> BoundTarget<'a> {
    /// Builds the scope chain for a template.
    pub fn new(ast: &'a TemplateAst, registry: &'a Registry) -> Self {
        let mut target = Self {
            ast,
            registry,
            scopes: vec![ScopeData::default()],
            node_scopes: FxHashMap::default(),
        };
        target.collect(ast.roots(), ScopeId(0));
        target
    }

    pub fn ast(&self) -> &'a TemplateAst {
        self.ast
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The scope of the template roots.
    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    /// The scope a node introduces for its children, if it introduces one.
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.node_scopes.get(&node).copied()
    }

    /// The set of directives matched on a node.
    pub fn directives_of(&self, node: NodeId) -> &[DirectiveId] {
        match self.ast.node(node) {
            Node::Element(el) => &el.directives,
            Node::Template(t) => &t.directives,
            _ => &[],
        }
    }

    /// Resolves a reference to a directive on its owning node, or to the
    /// node itself. A non-blank value names an `exportAs`; the first
    /// matching directive in the node's stable order wins.
    pub fn reference_target(&self, reference: &Reference) -> Option<ReferenceTarget> {
        let directives = self.directives_of(reference.owner);
        if !reference.value.trim().is_empty() {
            let export_as = reference.value.trim();
            return directives
                .iter()
                .find(|id| {
                    self.registry
                        .directive(**id)
                        .export_as
                        .iter()
                        .any(|name| name == export_as)
                })
                .map(|id| ReferenceTarget::Directive(*id));
        }
        directives
            .iter()
            .find(|id| self.registry.directive(**id).is_component)
            .map(|id| ReferenceTarget::Directive(*id))
            .or(Some(ReferenceTarget::Node(reference.owner)))
    }

    /// Resolves a bare identifier read to a template-local symbol by
    /// walking the scope chain outward from `scope`.
    pub fn expression_target(&self, name: &str, scope: ScopeId) -> Option<TemplateEntity> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = &self.scopes[id.0 as usize];
            if let Some(entity) = data.symbols.get(name) {
                return Some(*entity);
            }
            current = data.parent;
        }
        None
    }

    /// Looks a pipe up by name.
    pub fn pipe_by_name(&self, name: &str) -> Option<PipeId> {
        self.registry.pipe_by_name(name)
    }

    fn child_scope(&mut self, parent: ScopeId, owner: Option<NodeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            symbols: IndexMap::new(),
        });
        if let Some(owner) = owner {
            self.node_scopes.insert(owner, id);
        }
        id
    }

    fn declare(&mut self, scope: ScopeId, name: &SmolStr, entity: TemplateEntity) {
        // First declaration wins; duplicates were noted during build.
        self.scopes[scope.0 as usize]
            .symbols
            .entry(name.clone())
            .or_insert(entity);
    }

    fn collect(&mut self, nodes: &[NodeId], scope: ScopeId) {
        let ast = self.ast;
        for &id in nodes {
            match ast.node(id) {
                Node::Element(el) => {
                    for reference in el.references.values() {
                        self.declare(
                            scope,
                            &reference.name,
                            TemplateEntity::Reference {
                                id: reference.id,
                                node: id,
                            },
                        );
                    }
                    self.collect(&el.children, scope);
                }
                Node::Template(t) => {
                    // References on a template are visible to its siblings;
                    // its variables only inside it.
                    for reference in t.references.values() {
                        self.declare(
                            scope,
                            &reference.name,
                            TemplateEntity::Reference {
                                id: reference.id,
                                node: id,
                            },
                        );
                    }
                    let child = self.child_scope(scope, Some(id));
                    for variable in t.variables.values() {
                        self.declare(
                            child,
                            &variable.name,
                            TemplateEntity::Variable {
                                id: variable.id,
                                declarer: id,
                            },
                        );
                    }
                    self.collect(&t.children, child);
                }
                Node::BoundText(_) => {}
                Node::Content(content) => {
                    self.collect(&content.children, scope);
                }
                Node::If(block) => {
                    self.collect(&block.branches, scope);
                }
                Node::IfBranch(branch) => {
                    let child = self.child_scope(scope, Some(id));
                    if let Some(alias) = &branch.expression_alias {
                        self.declare(
                            child,
                            &alias.name,
                            TemplateEntity::Variable {
                                id: alias.id,
                                declarer: id,
                            },
                        );
                    }
                    self.collect(&branch.children, child);
                }
                Node::For(block) => {
                    let child = self.child_scope(scope, Some(id));
                    if let Some(item) = &block.item {
                        self.declare(
                            child,
                            &item.name,
                            TemplateEntity::Variable {
                                id: item.id,
                                declarer: id,
                            },
                        );
                    }
                    for variable in block.context_variables.values() {
                        self.declare(
                            child,
                            &variable.name,
                            TemplateEntity::Variable {
                                id: variable.id,
                                declarer: id,
                            },
                        );
                    }
                    self.collect(&block.children, child);
                    // The empty section renders in the outer scope.
                    if let Some(empty) = block.empty {
                        self.collect(&[empty], scope);
                    }
                }
                Node::ForEmpty(empty) => {
                    self.collect(&empty.children, scope);
                }
                Node::Switch(block) => {
                    self.collect(&block.cases, scope);
                }
                Node::SwitchCase(case) => {
                    let child = self.child_scope(scope, Some(id));
                    self.collect(&case.children, child);
                }
                Node::Let(block) => {
                    if let Some(decl) = &block.declaration {
                        self.declare(
                            scope,
                            &decl.name,
                            TemplateEntity::Let {
                                id: decl.id,
                                node: id,
                            },
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_template_ast;
    use crate::expr::Expr;
    use crate::markup::*;
    use crate::meta::{DirectiveMeta, Registry};
    use source_map::Span;

    fn span(start: u32, end: u32) -> Span {
        Span::new(start, end)
    }

    fn reference_attr(name: &str, value: &str) -> RawAttribute {
        RawAttribute {
            name: name.into(),
            key_span: span(10, 10 + name.len() as u32),
            value: if value.is_empty() {
                None
            } else {
                Some(RawAttrValue::Text(value.into()))
            },
            value_span: None,
            source_span: span(10, 20),
        }
    }

    fn element_with(
        attrs: Vec<RawAttribute>,
        directives: Vec<DirectiveId>,
        children: Vec<RawNode>,
    ) -> RawNode {
        RawNode::Element(RawElement {
            tag_name: "div".into(),
            is_template_tag: false,
            attributes: attrs,
            directives,
            template_directives: vec![],
            children,
            start_span: span(1, 4),
        })
    }

    #[test]
    fn test_reference_target_prefers_export_as_match() {
        let mut registry = Registry::new();
        let plain = registry.add_directive(DirectiveMeta {
            type_name: "PlainDir".into(),
            ..DirectiveMeta::default()
        });
        let exported = registry.add_directive(DirectiveMeta {
            type_name: "ExportedDir".into(),
            export_as: vec!["menu".into()],
            ..DirectiveMeta::default()
        });

        let ast = build_template_ast(vec![element_with(
            vec![reference_attr("#m", "menu")],
            vec![plain, exported],
            vec![],
        )]);
        let target = BoundTarget::new(&ast, &registry);

        let Node::Element(el) = ast.node(ast.roots()[0]) else {
            panic!("expected element");
        };
        assert_eq!(
            target.reference_target(&el.references["m"]),
            Some(ReferenceTarget::Directive(exported))
        );
    }

    #[test]
    fn test_blank_reference_falls_back_to_component_then_node() {
        let mut registry = Registry::new();
        let component = registry.add_directive(DirectiveMeta {
            type_name: "CardComponent".into(),
            is_component: true,
            ..DirectiveMeta::default()
        });

        let ast = build_template_ast(vec![
            element_with(vec![reference_attr("#a", "")], vec![component], vec![]),
            element_with(vec![reference_attr("#b", "")], vec![], vec![]),
        ]);
        let target = BoundTarget::new(&ast, &registry);

        let Node::Element(first) = ast.node(ast.roots()[0]) else {
            panic!("expected element");
        };
        let Node::Element(second) = ast.node(ast.roots()[1]) else {
            panic!("expected element");
        };
        assert_eq!(
            target.reference_target(&first.references["a"]),
            Some(ReferenceTarget::Directive(component))
        );
        assert_eq!(
            target.reference_target(&second.references["b"]),
            Some(ReferenceTarget::Node(ast.roots()[1]))
        );
    }

    #[test]
    fn test_unresolvable_export_as_has_no_target() {
        let registry = Registry::new();
        let ast = build_template_ast(vec![element_with(
            vec![reference_attr("#m", "missing")],
            vec![],
            vec![],
        )]);
        let target = BoundTarget::new(&ast, &registry);
        let Node::Element(el) = ast.node(ast.roots()[0]) else {
            panic!("expected element");
        };
        assert_eq!(target.reference_target(&el.references["m"]), None);
    }

    #[test]
    fn test_expression_target_walks_scope_chain() {
        let registry = Registry::new();
        // @for (item of items) { <div #inner>…</div> }
        let ast = build_template_ast(vec![RawNode::For(RawForBlock {
            name_span: span(0, 4),
            item: Some(RawVariable {
                name: "item".into(),
                key_span: Some(span(6, 10)),
                value: None,
                value_span: None,
            }),
            context_variables: vec![],
            expression: Some(Expr::read("items", span(14, 19))),
            track_by: None,
            children: vec![element_with(vec![reference_attr("#inner", "")], vec![], vec![])],
            empty: None,
        })]);
        let target = BoundTarget::new(&ast, &registry);

        let for_id = ast.roots()[0];
        let loop_scope = target.scope_of(for_id).expect("loop scope");

        // Both the loop variable and the inner reference resolve inside the
        // loop scope, the implicit `$index` too; unknown names do not.
        assert!(matches!(
            target.expression_target("item", loop_scope),
            Some(TemplateEntity::Variable { .. })
        ));
        assert!(matches!(
            target.expression_target("$index", loop_scope),
            Some(TemplateEntity::Variable { .. })
        ));
        assert!(matches!(
            target.expression_target("inner", loop_scope),
            Some(TemplateEntity::Reference { .. })
        ));
        assert_eq!(target.expression_target("component_field", loop_scope), None);

        // The loop variable is invisible outside the loop.
        assert_eq!(target.expression_target("item", target.root_scope()), None);
    }
}
