//! Normalization of the raw markup model into the template AST.
//!
//! Classification is best-effort: anything that does not parse as a
//! binding form ends up as a plain text attribute, and nothing here ever
//! fails outright.

use crate::ast::*;
use crate::expr::{Expr, Stmt};
use crate::markup::*;
use indexmap::IndexMap;
use smol_str::SmolStr;
use source_map::Span;

/// The implicit loop variables of an `@for` block and their types.
pub const FOR_LOOP_CONTEXT_VARIABLES: &[(&str, &str)] = &[
    ("$index", "number"),
    ("$first", "boolean"),
    ("$last", "boolean"),
    ("$even", "boolean"),
    ("$odd", "boolean"),
    ("$count", "number"),
];

/// Builds the normalized template AST from raw markup roots.
pub fn build_template_ast(roots: Vec<RawNode>) -> TemplateAst {
    let mut builder = Builder::default();
    let root_ids = builder.lower_nodes(roots);
    builder.ast.roots = root_ids;
    builder.ast
}

#[derive(Default)]
struct Builder {
    ast: TemplateAst,
    next_attr: u32,
    next_entity: u32,
}

impl Builder {
    fn attr_id(&mut self) -> AttrId {
        let id = AttrId(self.next_attr);
        self.next_attr += 1;
        id
    }

    fn entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.ast.nodes.len() as u32);
        self.ast.nodes.push(node);
        id
    }

    /// Reserves an arena slot so symbols can point at a node before it is
    /// fully constructed.
    fn reserve(&mut self) -> NodeId {
        self.alloc(Node::Content(Content { children: vec![] }))
    }

    fn set(&mut self, id: NodeId, node: Node) {
        self.ast.nodes[id.0 as usize] = node;
    }

    fn lower_nodes(&mut self, nodes: Vec<RawNode>) -> Vec<NodeId> {
        nodes.into_iter().filter_map(|n| self.lower(n)).collect()
    }

    fn lower(&mut self, node: RawNode) -> Option<NodeId> {
        match node {
            RawNode::Element(el) => Some(self.lower_element(el)),
            // Plain text produces no type-check code.
            RawNode::Text(_) => None,
            RawNode::Interpolation(interp) => Some(self.alloc(Node::BoundText(BoundText {
                expression: interp.expression,
                span: interp.span,
            }))),
            RawNode::Content(content) => {
                let children = self.lower_nodes(content.children);
                Some(self.alloc(Node::Content(Content { children })))
            }
            RawNode::If(block) => Some(self.lower_if(block)),
            RawNode::For(block) => Some(self.lower_for(block)),
            RawNode::Switch(block) => Some(self.lower_switch(block)),
            RawNode::Let(block) => Some(self.lower_let(block)),
        }
    }

    fn lower_element(&mut self, el: RawElement) -> NodeId {
        // The outer node is the element itself, the template container, or
        // the synthetic template a structural shorthand desugars into.
        // Either way it is where references end up, so reserve it first.
        let outer = self.reserve();

        let mut inputs = IndexMap::new();
        let mut outputs = IndexMap::new();
        let mut attributes = IndexMap::new();
        let mut references = IndexMap::new();
        let mut variables: IndexMap<SmolStr, Variable> = IndexMap::new();
        let mut shorthand: Option<Shorthand> = None;

        for attr in el.attributes {
            let info = AttributeInfo::parse(&attr.name);
            match info.kind {
                AttributeKind::Regular => {
                    self.insert_text_attribute(&mut attributes, info.name, attr);
                }
                AttributeKind::PropertyBinding(kind) => {
                    let id = self.attr_id();
                    inputs.insert(
                        info.name.clone(),
                        BoundAttribute {
                            id,
                            name: info.name,
                            key_span: Some(attr.key_span),
                            kind: binding_kind(kind),
                            value: expr_value(attr.value),
                            source_span: attr.source_span,
                            is_structural: false,
                        },
                    );
                }
                AttributeKind::TwoWayBinding => {
                    let value = expr_value(attr.value);
                    let input_id = self.attr_id();
                    inputs.insert(
                        info.name.clone(),
                        BoundAttribute {
                            id: input_id,
                            name: info.name.clone(),
                            key_span: Some(attr.key_span),
                            kind: BindingKind::Property,
                            value: value.clone(),
                            source_span: attr.source_span,
                            is_structural: false,
                        },
                    );
                    let event_name: SmolStr =
                        format!("{}{}", info.name, OUTPUT_CHANGE_SUFFIX).into();
                    let event_id = self.attr_id();
                    outputs.insert(
                        event_name.clone(),
                        BoundEvent {
                            id: event_id,
                            name: event_name,
                            key_span: Some(attr.key_span),
                            kind: EventKind::TwoWay,
                            handler: two_way_handler(value),
                            target: None,
                            source_span: attr.source_span,
                        },
                    );
                }
                AttributeKind::Event(kind) => {
                    let id = self.attr_id();
                    outputs.insert(
                        info.name.clone(),
                        BoundEvent {
                            id,
                            name: info.name,
                            key_span: Some(attr.key_span),
                            kind: match kind {
                                EventBindingKind::Regular => EventKind::Regular,
                                EventBindingKind::Animation => EventKind::Animation,
                            },
                            handler: handler_value(attr.value),
                            target: None,
                            source_span: attr.source_span,
                        },
                    );
                }
                AttributeKind::Reference => {
                    let id = self.entity_id();
                    let key_span = name_span(&attr, &info);
                    references.insert(
                        info.name.clone(),
                        Reference {
                            id,
                            name: info.name,
                            key_span: Some(key_span),
                            value: text_value(&attr.value),
                            value_span: attr.value_span,
                            owner: outer,
                        },
                    );
                }
                AttributeKind::Let if el.is_template_tag => {
                    let id = self.entity_id();
                    let key_span = name_span(&attr, &info);
                    let variable = Variable {
                        id,
                        name: info.name.clone(),
                        value: Some(text_value(&attr.value)).filter(|v| !v.is_empty()),
                        key_span: Some(key_span),
                        value_span: attr.value_span,
                    };
                    if variables.insert(info.name.clone(), variable).is_some() {
                        self.ast.duplicate_variables.push(DuplicateVariable {
                            name: info.name,
                            span: Some(key_span),
                        });
                    }
                }
                // `let-` outside a template container has no meaning.
                AttributeKind::Let => {
                    self.insert_text_attribute(&mut attributes, info.name, attr);
                }
                AttributeKind::TemplateBindings => {
                    if shorthand.is_none() {
                        shorthand = Some(Shorthand {
                            template_name: info.name,
                            key_span: attr.key_span,
                            name_offset: info.name_offset,
                            bindings: match attr.value {
                                Some(RawAttrValue::Bindings(b)) => b,
                                _ => vec![],
                            },
                        });
                    }
                }
            }
        }

        let children = self.lower_nodes(el.children);

        if el.is_template_tag {
            self.set(
                outer,
                Node::Template(Template {
                    tag_name: None,
                    directives: el.directives,
                    inputs,
                    outputs,
                    attributes,
                    references,
                    variables,
                    children,
                    start_span: Some(el.start_span),
                }),
            );
            return outer;
        }

        if let Some(shorthand) = shorthand {
            // Desugar: the synthetic template wraps the element, taking
            // over the shorthand's bindings, variables and the references.
            let inner = self.alloc(Node::Element(Element {
                tag_name: el.tag_name.clone(),
                directives: el.directives,
                inputs,
                outputs,
                attributes,
                references: IndexMap::new(),
                children,
                start_span: Some(el.start_span),
            }));
            let shorthand_span = shorthand.key_span;
            let (template_inputs, template_vars) = self.lower_shorthand(shorthand);
            self.set(
                outer,
                Node::Template(Template {
                    tag_name: Some(el.tag_name),
                    directives: el.template_directives,
                    inputs: template_inputs,
                    outputs: IndexMap::new(),
                    attributes: IndexMap::new(),
                    references,
                    variables: template_vars,
                    children: vec![inner],
                    start_span: Some(shorthand_span),
                }),
            );
            return outer;
        }

        self.set(
            outer,
            Node::Element(Element {
                tag_name: el.tag_name,
                directives: el.directives,
                inputs,
                outputs,
                attributes,
                references,
                children,
                start_span: Some(el.start_span),
            }),
        );
        outer
    }

    fn lower_shorthand(
        &mut self,
        shorthand: Shorthand,
    ) -> (IndexMap<SmolStr, BoundAttribute>, IndexMap<SmolStr, Variable>) {
        let mut inputs = IndexMap::new();
        let mut variables = IndexMap::new();
        let mut has_default_binding = false;

        for binding in shorthand.bindings {
            match binding {
                TemplateBinding::Expression {
                    key,
                    key_span,
                    value,
                    span,
                } => {
                    if key == shorthand.template_name {
                        has_default_binding = true;
                    }
                    let id = self.attr_id();
                    inputs.insert(
                        key.clone(),
                        BoundAttribute {
                            id,
                            name: key,
                            key_span: key_span.or(Some(shorthand.key_span)),
                            kind: BindingKind::Property,
                            value,
                            source_span: span,
                            is_structural: true,
                        },
                    );
                }
                TemplateBinding::Variable(raw) => {
                    let id = self.entity_id();
                    let key_span = raw.key_span;
                    let variable = Variable {
                        id,
                        name: raw.name.clone(),
                        value: raw.value,
                        key_span,
                        value_span: raw.value_span,
                    };
                    if variables.insert(raw.name.clone(), variable).is_some() {
                        self.ast.duplicate_variables.push(DuplicateVariable {
                            name: raw.name,
                            span: key_span,
                        });
                    }
                }
            }
        }

        // The shorthand itself is an input of the template even when no
        // explicit binding named after it is present.
        if !has_default_binding {
            let name_span = Span::at(
                u32::from(shorthand.key_span.start) + shorthand.name_offset,
                shorthand.template_name.len() as u32,
            );
            let id = self.attr_id();
            inputs.insert(
                shorthand.template_name.clone(),
                BoundAttribute {
                    id,
                    name: shorthand.template_name,
                    key_span: Some(name_span),
                    kind: BindingKind::Property,
                    value: None,
                    source_span: name_span,
                    is_structural: true,
                },
            );
        }

        (inputs, variables)
    }

    fn lower_if(&mut self, block: RawIfBlock) -> NodeId {
        let branches = block
            .branches
            .into_iter()
            .map(|branch| {
                let alias = branch.alias.map(|raw| self.to_variable(raw));
                let children = self.lower_nodes(branch.children);
                self.alloc(Node::IfBranch(IfBranch {
                    name_span: Some(branch.name_span),
                    expression: branch.expression,
                    expression_alias: alias,
                    children,
                }))
            })
            .collect();
        self.alloc(Node::If(IfBlock {
            name_span: Some(block.name_span),
            branches,
        }))
    }

    fn lower_for(&mut self, block: RawForBlock) -> NodeId {
        let item = block.item.map(|raw| self.to_variable(raw));

        // Context variables are keyed by the implicit name they alias;
        // unaliased implicits are still visible under their own names.
        let mut context_variables = IndexMap::new();
        for raw in block.context_variables {
            let key = raw.value.clone().unwrap_or_else(|| raw.name.clone());
            let variable = self.to_variable(raw);
            context_variables.insert(key, variable);
        }
        for (name, _) in FOR_LOOP_CONTEXT_VARIABLES {
            if !context_variables.contains_key(*name) {
                let id = self.entity_id();
                context_variables.insert(
                    SmolStr::new(name),
                    Variable {
                        id,
                        name: SmolStr::new(name),
                        value: Some(SmolStr::new(name)),
                        key_span: None,
                        value_span: None,
                    },
                );
            }
        }

        let children = self.lower_nodes(block.children);
        let empty = block.empty.map(|empty| {
            let children = self.lower_nodes(empty.children);
            self.alloc(Node::ForEmpty(ForEmpty {
                name_span: Some(empty.name_span),
                children,
            }))
        });
        self.alloc(Node::For(ForBlock {
            name_span: Some(block.name_span),
            item,
            context_variables,
            expression: block.expression,
            track_by: block.track_by,
            empty,
            children,
        }))
    }

    fn lower_switch(&mut self, block: RawSwitchBlock) -> NodeId {
        let cases = block
            .cases
            .into_iter()
            .map(|case| {
                let children = self.lower_nodes(case.children);
                self.alloc(Node::SwitchCase(SwitchCase {
                    name_span: Some(case.name_span),
                    expression: case.expression,
                    children,
                }))
            })
            .collect();
        self.alloc(Node::Switch(SwitchBlock {
            name_span: Some(block.name_span),
            expression: block.expression,
            cases,
        }))
    }

    fn lower_let(&mut self, block: RawLetBlock) -> NodeId {
        let declaration = block.declaration.map(|decl| LetDeclaration {
            id: self.entity_id(),
            name: decl.name,
            name_span: decl.name_span,
            value: decl.value,
            source_span: decl.source_span,
        });
        self.alloc(Node::Let(LetBlock {
            name_span: Some(block.name_span),
            declaration,
        }))
    }

    fn to_variable(&mut self, raw: RawVariable) -> Variable {
        Variable {
            id: self.entity_id(),
            name: raw.name,
            value: raw.value,
            key_span: raw.key_span,
            value_span: raw.value_span,
        }
    }

    fn insert_text_attribute(
        &mut self,
        attributes: &mut IndexMap<SmolStr, TextAttribute>,
        name: SmolStr,
        attr: RawAttribute,
    ) {
        let id = self.attr_id();
        attributes.insert(
            name.clone(),
            TextAttribute {
                id,
                name,
                key_span: Some(attr.key_span),
                value: text_value(&attr.value),
                value_span: attr.value_span,
                source_span: attr.source_span,
            },
        );
    }
}

#[derive(Debug)]
struct Shorthand {
    template_name: SmolStr,
    key_span: Span,
    name_offset: u32,
    bindings: Vec<TemplateBinding>,
}

fn binding_kind(kind: PropertyBindingKind) -> BindingKind {
    match kind {
        PropertyBindingKind::Property => BindingKind::Property,
        PropertyBindingKind::Attribute => BindingKind::Attribute,
        PropertyBindingKind::Class => BindingKind::Class,
        PropertyBindingKind::Style => BindingKind::Style,
        PropertyBindingKind::Animation => BindingKind::Animation,
    }
}

fn expr_value(value: Option<RawAttrValue>) -> Option<Expr> {
    match value {
        Some(RawAttrValue::Expr(expr)) => Some(expr),
        _ => None,
    }
}

fn handler_value(value: Option<RawAttrValue>) -> Vec<Stmt> {
    match value {
        Some(RawAttrValue::Handler(stmts)) => stmts,
        Some(RawAttrValue::Expr(expr)) => vec![Stmt::Expr(expr)],
        _ => vec![],
    }
}

fn text_value(value: &Option<RawAttrValue>) -> SmolStr {
    match value {
        Some(RawAttrValue::Text(text)) => text.clone(),
        _ => SmolStr::default(),
    }
}

/// The span of the bare name inside a sigiled attribute name.
fn name_span(attr: &RawAttribute, info: &AttributeInfo) -> Span {
    Span::at(
        u32::from(attr.key_span.start) + info.name_offset,
        info.name.len() as u32,
    )
}

/// The event side of a two-way expansion: an assignment of `$event` into
/// the bound expression.
fn two_way_handler(value: Option<Expr>) -> Vec<Stmt> {
    match value {
        Some(expr) => {
            let span = expr.span();
            vec![Stmt::Expr(Expr::Assignment {
                target: Box::new(expr),
                value: Box::new(Expr::read("$event", span)),
                span,
            })]
        }
        None => vec![],
    }
}
