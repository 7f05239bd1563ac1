//! The scope renderer: turns a bound template into the statements of a
//! type-check block.
//!
//! Rendering is two-phase, the way the op queue keeps it: walking the
//! template queues one op per construct (directive instance, binding
//! check, event handler, nested scope), and executing the queue emits the
//! statements. Ops execute on demand and memoize their result, so an op
//! early in the queue can depend on one that appears later; an op that
//! transitively depends on itself resolves to the `null!` inference
//! placeholder instead of looping.

use crate::emit::{
    Expression, ExpressionBuilder, Identifier, Statement, MAP_FULL, MAP_NAV, MAP_TYPES_ONLY,
};
use crate::env::{Environment, TypeCheckConfig};
use crate::expression::ExprMode;
use crate::oob::{Diagnostic, OobRecorder};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use source_map::{MappingFlags, SourceMapping, Span};
use template_ast::{
    AttrId, BindingKind, BoundEvent, BoundTarget, DirectiveId, EntityId, EventKind, NodeId,
    Reference, ReferenceTarget, ScopeId, Variable, FOR_LOOP_CONTEXT_VARIABLES,
    OUTPUT_CHANGE_SUFFIX,
};

use crate::emit::NameMapping;
use template_ast::{Expr, Node};

pub(crate) const ANY_EXPRESSION: &str = "null as any";
pub(crate) const EVENT_PARAMETER: &str = "$event";
const INFER_IDENTIFIER: &str = "null!";
const TEMPLATE_GUARD_PREFIX: &str = "ngTemplateGuard_";
const TEMPLATE_CONTEXT_GUARD: &str = "ngTemplateContextGuard";
const IMPLICIT_CONTEXT_KEY: &str = "$implicit";

/// Attribute names whose DOM property differs from the attribute name.
const ATTR_TO_PROP: &[(&str, &str)] = &[
    ("class", "className"),
    ("for", "htmlFor"),
    ("formaction", "formAction"),
    ("innerHtml", "innerHTML"),
    ("readonly", "readOnly"),
    ("tabindex", "tabIndex"),
];

/// The generated code and mappings for one template.
#[derive(Debug)]
pub struct TranspiledTemplate {
    pub generated_code: String,
    pub source_mappings: Vec<SourceMapping>,
    pub name_mappings: Vec<NameMapping>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Renders the type-check block for one bound template.
///
/// The environment is shared across a component's templates so directive
/// and pipe aliases are allocated once; everything else is per call.
pub fn transpile_template(
    env: &mut Environment,
    bound: &BoundTarget<'_>,
    component_type_name: &str,
    template_id: u32,
) -> TranspiledTemplate {
    let mut oob = OobRecorder::new();
    for duplicate in bound.ast().duplicate_variables() {
        oob.duplicate_template_variable(&duplicate.name, duplicate.span);
    }

    let mut renderer = Renderer {
        env,
        oob: &mut oob,
        bound,
        scopes: Vec::new(),
        next_id: 1,
        transpiled_attrs: FxHashSet::default(),
    };
    let root = renderer.scope_for_nodes(None, None, bound.ast().roots(), None);
    let statements = renderer.render(root);

    let block = Expression::build(|b| {
        b.append(&format!(
            "function _tcb_{template_id}(this: {component_type_name}) "
        ));
        b.code_block(|b| {
            for statement in &statements {
                b.append_statement(statement);
            }
        });
        b.new_line();
    });
    tracing::debug!(
        template_id,
        statements = statements.len(),
        "rendered type-check block"
    );

    let (generated_code, source_mappings, name_mappings) = block.into_parts();
    TranspiledTemplate {
        generated_code,
        source_mappings,
        name_mappings,
        diagnostics: oob.into_diagnostics(),
    }
}

/// One queued code-generation operation.
pub(crate) enum TcbOp {
    Element {
        node: NodeId,
    },
    TemplateVariable {
        template: NodeId,
        variable: Variable,
    },
    TemplateContext,
    TemplateBody {
        template: NodeId,
    },
    LetDeclaration {
        node: NodeId,
    },
    BoundText {
        node: NodeId,
    },
    DirectiveCtor {
        node: NodeId,
        dir: DirectiveId,
    },
    DirectiveCtorCircularFallback {
        dir: DirectiveId,
    },
    DirectiveInputs {
        node: NodeId,
        dir: DirectiveId,
    },
    DirectiveOutputs {
        node: NodeId,
        dir: DirectiveId,
    },
    UnclaimedInputs {
        node: NodeId,
        claimed: FxHashSet<SmolStr>,
    },
    UnclaimedOutputs {
        node: NodeId,
        claimed: FxHashSet<SmolStr>,
    },
    Reference {
        host: NodeId,
        reference: Reference,
        target: ReferenceTarget,
    },
    InvalidReference,
    If {
        node: NodeId,
    },
    Switch {
        node: NodeId,
    },
    ForOf {
        node: NodeId,
    },
    BlockVariable {
        variable: Variable,
        initializer: Option<Expr>,
    },
    BlockImplicitVariable {
        variable: Variable,
        type_text: &'static str,
    },
}

impl TcbOp {
    /// Optional ops only declare things; they execute solely when another
    /// op depends on them, unless the config retains all declarations.
    fn optional(&self) -> bool {
        matches!(
            self,
            TcbOp::Element { .. }
                | TcbOp::TemplateContext
                | TcbOp::DirectiveCtor { .. }
                | TcbOp::Reference { .. }
                | TcbOp::InvalidReference
                | TcbOp::BlockImplicitVariable { .. }
        )
    }

    fn circular_fallback(&self) -> FallbackSlot {
        match self {
            TcbOp::DirectiveCtor { dir, .. } => {
                FallbackSlot::Op(Box::new(TcbOp::DirectiveCtorCircularFallback { dir: *dir }))
            }
            _ => FallbackSlot::Infer,
        }
    }
}

pub(crate) enum FallbackSlot {
    /// Resolve circular references to `null!` so the checker infers the
    /// least narrow type.
    Infer,
    /// Extra code generation that breaks the cycle.
    Op(Box<TcbOp>),
}

enum OpSlot {
    Pending(TcbOp),
    InProgress(FallbackSlot),
    Done(Option<Identifier>),
}

enum VarSlot {
    Op(usize),
    Resolved(Identifier),
}

struct LetRecord {
    op: usize,
    entity: EntityId,
    name_span: Option<Span>,
}

pub(crate) struct ScopeFrame {
    parent: Option<usize>,
    guard: Option<Expression>,
    pub(crate) binder_scope: ScopeId,
    ops: Vec<OpSlot>,
    statements: Vec<Statement>,
    element_ops: FxHashMap<NodeId, usize>,
    directive_ops: FxHashMap<(NodeId, DirectiveId), usize>,
    reference_ops: FxHashMap<EntityId, usize>,
    template_ctx_ops: FxHashMap<NodeId, usize>,
    var_ops: FxHashMap<EntityId, VarSlot>,
    let_ops: FxHashMap<SmolStr, LetRecord>,
    declared_names: Vec<SmolStr>,
}

/// How the `$event` parameter of a generated handler is typed.
enum EventParam {
    /// Leave the parameter untyped so the checker infers it.
    Infer,
    /// An explicit `any`.
    Any,
    /// An explicit type name.
    Typed(&'static str),
}

pub(crate) struct Renderer<'r, 'a> {
    pub(crate) env: &'r mut Environment,
    pub(crate) oob: &'r mut OobRecorder,
    pub(crate) bound: &'r BoundTarget<'a>,
    pub(crate) scopes: Vec<ScopeFrame>,
    next_id: u32,
    transpiled_attrs: FxHashSet<AttrId>,
}

/// A bound attribute resolved against one directive's inputs.
struct TcbBoundAttr<'a> {
    id: AttrId,
    key_span: Option<Span>,
    field_name: SmolStr,
    value: CtorValue<'a>,
    is_text: bool,
}

enum CtorValue<'a> {
    Expr(&'a Expr),
    /// A valueless structural binding, checked as the empty string.
    StructuralEmpty,
    Missing,
    Text(&'a SmolStr),
}

enum CtorInput {
    Bound(Expression),
    Unset,
}

impl<'r, 'a> Renderer<'r, 'a> {
    fn allocate_id(&mut self, source_name: Option<SmolStr>, span: Option<Span>) -> Identifier {
        let id = Identifier::with_source(format!("_t{}", self.next_id), source_name, span);
        self.next_id += 1;
        id
    }

    fn allocate_for_variable(&mut self, variable: &Variable) -> Identifier {
        self.allocate_id(Some(variable.name.clone()), variable.key_span)
    }

    fn push_op(&mut self, scope: usize, op: TcbOp) -> usize {
        self.scopes[scope].ops.push(OpSlot::Pending(op));
        self.scopes[scope].ops.len() - 1
    }

    fn add_statement(&mut self, scope: usize, statement: Statement) {
        self.scopes[scope].statements.push(statement);
    }

    fn add_statement_expr(&mut self, scope: usize, expr: Expression) {
        self.add_statement(
            scope,
            Statement::build(|b| {
                b.append_expr(&expr);
                b.append(";");
            }),
        );
    }

    fn add_paren_statement(&mut self, scope: usize, expr: &Expression) {
        self.add_statement(
            scope,
            Statement::build(|b| {
                b.append("(");
                b.append_expr(expr);
                b.append(");");
            }),
        );
    }

    /// Builds a scope, registering variable ops for the scoped node and
    /// queueing ops for the children.
    pub(crate) fn scope_for_nodes(
        &mut self,
        parent: Option<usize>,
        scoped_node: Option<NodeId>,
        children: &[NodeId],
        guard: Option<Expression>,
    ) -> usize {
        let binder_scope = scoped_node
            .and_then(|n| self.bound.scope_of(n))
            .or_else(|| parent.map(|p| self.scopes[p].binder_scope))
            .unwrap_or_else(|| self.bound.root_scope());
        let index = self.scopes.len();
        self.scopes.push(ScopeFrame {
            parent,
            guard,
            binder_scope,
            ops: Vec::new(),
            statements: Vec::new(),
            element_ops: FxHashMap::default(),
            directive_ops: FxHashMap::default(),
            reference_ops: FxHashMap::default(),
            template_ctx_ops: FxHashMap::default(),
            var_ops: FxHashMap::default(),
            let_ops: FxHashMap::default(),
            declared_names: Vec::new(),
        });

        if let Some(node) = scoped_node {
            let ast = self.bound.ast();
            match ast.node(node) {
                Node::Template(t) => {
                    for variable in t.variables.values() {
                        self.register_variable(
                            index,
                            variable,
                            TcbOp::TemplateVariable {
                                template: node,
                                variable: variable.clone(),
                            },
                        );
                    }
                }
                Node::IfBranch(branch) => {
                    if let (Some(expr), Some(alias)) =
                        (&branch.expression, &branch.expression_alias)
                    {
                        self.register_variable(
                            index,
                            alias,
                            TcbOp::BlockVariable {
                                variable: alias.clone(),
                                initializer: Some(expr.clone()),
                            },
                        );
                    }
                }
                Node::For(block) => {
                    // The loop initializer is declared by the `for` head;
                    // pre-resolve it so children can reference it.
                    if let Some(item) = &block.item {
                        let id = self.allocate_for_variable(item);
                        self.scopes[index].var_ops.insert(item.id, VarSlot::Resolved(id));
                        self.scopes[index].declared_names.push(item.name.clone());
                    }
                    for (key, variable) in &block.context_variables {
                        let Some(type_text) = for_loop_variable_type(key) else {
                            continue;
                        };
                        self.register_variable(
                            index,
                            variable,
                            TcbOp::BlockImplicitVariable {
                                variable: variable.clone(),
                                type_text,
                            },
                        );
                    }
                }
                _ => {}
            }
        }

        for &child in children {
            self.append_node(index, child);
        }

        // `@let` declarations conflict with any variable or reference that
        // shares their name in this scope.
        let names = std::mem::take(&mut self.scopes[index].declared_names);
        for name in &names {
            let span = self.scopes[index].let_ops.get(name).map(|r| r.name_span);
            if let Some(span) = span {
                self.oob.conflicting_let_declaration(name, span);
            }
        }
        self.scopes[index].declared_names = names;

        index
    }

    fn register_variable(&mut self, scope: usize, variable: &Variable, op: TcbOp) {
        let index = self.push_op(scope, op);
        self.scopes[scope]
            .var_ops
            .insert(variable.id, VarSlot::Op(index));
        self.scopes[scope].declared_names.push(variable.name.clone());
    }

    fn append_node(&mut self, scope: usize, node: NodeId) {
        let ast = self.bound.ast();
        match ast.node(node) {
            Node::Element(el) => {
                let index = self.push_op(scope, TcbOp::Element { node });
                self.scopes[scope].element_ops.insert(node, index);
                self.append_directives_and_inputs(scope, node, true);
                self.append_outputs(scope, node, true);
                for &child in &el.children {
                    self.append_node(scope, child);
                }
                self.append_references(scope, node);
            }
            Node::Template(_) => {
                // Template children render in a child scope.
                self.append_directives_and_inputs(scope, node, false);
                self.append_outputs(scope, node, false);
                let index = self.push_op(scope, TcbOp::TemplateContext);
                self.scopes[scope].template_ctx_ops.insert(node, index);
                if self.env.config.check_template_bodies {
                    self.push_op(scope, TcbOp::TemplateBody { template: node });
                }
                self.append_references(scope, node);
            }
            Node::BoundText(_) => {
                self.push_op(scope, TcbOp::BoundText { node });
            }
            Node::Content(content) => {
                for &child in &content.children {
                    self.append_node(scope, child);
                }
            }
            Node::If(_) => {
                self.push_op(scope, TcbOp::If { node });
            }
            Node::Switch(_) => {
                self.push_op(scope, TcbOp::Switch { node });
            }
            Node::For(block) => {
                self.push_op(scope, TcbOp::ForOf { node });
                // The empty section renders in this scope, not the loop's.
                if self.env.config.check_control_flow_bodies {
                    if let Some(empty) = block.empty {
                        if let Node::ForEmpty(section) = ast.node(empty) {
                            for &child in &section.children {
                                self.append_node(scope, child);
                            }
                        }
                    }
                }
            }
            Node::Let(block) => {
                if let Some(decl) = &block.declaration {
                    let index = self.push_op(scope, TcbOp::LetDeclaration { node });
                    if self.scopes[scope].let_ops.contains_key(&decl.name) {
                        self.oob
                            .conflicting_let_declaration(&decl.name, decl.name_span);
                    } else {
                        self.scopes[scope].let_ops.insert(
                            decl.name.clone(),
                            LetRecord {
                                op: index,
                                entity: decl.id,
                                name_span: decl.name_span,
                            },
                        );
                    }
                }
            }
            // Reached through their parent blocks, never directly.
            Node::IfBranch(_) | Node::ForEmpty(_) | Node::SwitchCase(_) => {}
        }
    }

    fn append_directives_and_inputs(&mut self, scope: usize, node: NodeId, is_element: bool) {
        let bound = self.bound;
        let directives = bound.directives_of(node).to_vec();
        let mut claimed: FxHashSet<SmolStr> = FxHashSet::default();

        if directives.is_empty() {
            if is_element {
                self.push_op(scope, TcbOp::UnclaimedInputs { node, claimed });
            }
            return;
        }
        for &dir in &directives {
            let index = self.push_op(scope, TcbOp::DirectiveCtor { node, dir });
            self.scopes[scope].directive_ops.insert((node, dir), index);
            self.push_op(scope, TcbOp::DirectiveInputs { node, dir });
        }
        if is_element {
            for &dir in &directives {
                claimed.extend(bound.registry().directive(dir).inputs.keys().cloned());
            }
            self.push_op(scope, TcbOp::UnclaimedInputs { node, claimed });
        }
    }

    fn append_outputs(&mut self, scope: usize, node: NodeId, is_element: bool) {
        let bound = self.bound;
        let directives = bound.directives_of(node).to_vec();
        let mut claimed: FxHashSet<SmolStr> = FxHashSet::default();

        if directives.is_empty() {
            if is_element {
                self.push_op(scope, TcbOp::UnclaimedOutputs { node, claimed });
            }
            return;
        }
        for &dir in &directives {
            self.push_op(scope, TcbOp::DirectiveOutputs { node, dir });
        }
        if is_element {
            for &dir in &directives {
                claimed.extend(bound.registry().directive(dir).outputs.keys().cloned());
            }
            self.push_op(scope, TcbOp::UnclaimedOutputs { node, claimed });
        }
    }

    fn append_references(&mut self, scope: usize, node: NodeId) {
        let ast = self.bound.ast();
        let references = match ast.node(node) {
            Node::Element(el) => &el.references,
            Node::Template(t) => &t.references,
            _ => return,
        };
        for reference in references.values() {
            let target = self.bound.reference_target(reference);
            let index = match target {
                None => {
                    self.oob.missing_reference_target(
                        &reference.name,
                        &reference.value,
                        reference.key_span,
                    );
                    self.push_op(scope, TcbOp::InvalidReference)
                }
                Some(target) => self.push_op(
                    scope,
                    TcbOp::Reference {
                        host: node,
                        reference: reference.clone(),
                        target,
                    },
                ),
            };
            self.scopes[scope].reference_ops.insert(reference.id, index);
            self.scopes[scope].declared_names.push(reference.name.clone());
        }
    }

    /// Executes every op in the scope and takes its statements.
    pub(crate) fn render(&mut self, scope: usize) -> Vec<Statement> {
        let skip_optional = !self.env.config.retain_unreferenced_declarations;
        for index in 0..self.scopes[scope].ops.len() {
            self.execute_op(scope, index, skip_optional);
        }
        std::mem::take(&mut self.scopes[scope].statements)
    }

    fn execute_op(&mut self, scope: usize, index: usize, skip_optional: bool) -> Option<Identifier> {
        match &self.scopes[scope].ops[index] {
            OpSlot::Done(result) => return result.clone(),
            OpSlot::InProgress(FallbackSlot::Infer) => {
                return Some(Identifier::new(INFER_IDENTIFIER))
            }
            OpSlot::InProgress(FallbackSlot::Op(_)) => {
                let slot = std::mem::replace(
                    &mut self.scopes[scope].ops[index],
                    OpSlot::InProgress(FallbackSlot::Infer),
                );
                let OpSlot::InProgress(FallbackSlot::Op(op)) = slot else {
                    unreachable!();
                };
                let result = self.run_op(scope, *op);
                self.scopes[scope].ops[index] = OpSlot::Done(result.clone());
                return result;
            }
            OpSlot::Pending(op) => {
                if skip_optional && op.optional() {
                    return None;
                }
            }
        }
        let fallback = match &self.scopes[scope].ops[index] {
            OpSlot::Pending(op) => op.circular_fallback(),
            _ => unreachable!(),
        };
        let slot = std::mem::replace(
            &mut self.scopes[scope].ops[index],
            OpSlot::InProgress(fallback),
        );
        let OpSlot::Pending(op) = slot else {
            unreachable!();
        };
        let result = self.run_op(scope, op);
        self.scopes[scope].ops[index] = OpSlot::Done(result.clone());
        result
    }

    /// Resolves a template entity to its identifier, walking parent scopes
    /// and executing the declaring op if needed.
    pub(crate) fn resolve_entity(&mut self, scope: usize, entity: EntityId) -> Option<Identifier> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(slot) = self.scopes[s].var_ops.get(&entity) {
                match slot {
                    VarSlot::Resolved(id) => return Some(id.clone()),
                    VarSlot::Op(index) => {
                        let index = *index;
                        return self.execute_op(s, index, false);
                    }
                }
            }
            if let Some(&index) = self.scopes[s].reference_ops.get(&entity) {
                return self.execute_op(s, index, false);
            }
            let let_op = self.scopes[s]
                .let_ops
                .values()
                .find(|record| record.entity == entity)
                .map(|record| record.op);
            if let Some(index) = let_op {
                return self.execute_op(s, index, false);
            }
            current = self.scopes[s].parent;
        }
        None
    }

    fn resolve_node(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(&index) = self.scopes[s].template_ctx_ops.get(&node) {
                return self.execute_op(s, index, false);
            }
            if let Some(&index) = self.scopes[s].element_ops.get(&node) {
                return self.execute_op(s, index, false);
            }
            current = self.scopes[s].parent;
        }
        None
    }

    fn resolve_directive(
        &mut self,
        scope: usize,
        node: NodeId,
        dir: DirectiveId,
    ) -> Option<Identifier> {
        let mut current = Some(scope);
        while let Some(s) = current {
            if let Some(&index) = self.scopes[s].directive_ops.get(&(node, dir)) {
                return self.execute_op(s, index, false);
            }
            current = self.scopes[s].parent;
        }
        None
    }

    /// Whether an entity is declared directly in `scope` (not a parent).
    pub(crate) fn is_local_entity(&self, scope: usize, entity: EntityId) -> bool {
        let frame = &self.scopes[scope];
        frame.var_ops.contains_key(&entity)
            || frame.reference_ops.contains_key(&entity)
            || frame.let_ops.values().any(|record| record.entity == entity)
    }

    /// All template guards narrowing this scope, parents first.
    fn scope_guards(&self, scope: usize) -> Option<Expression> {
        let frame = &self.scopes[scope];
        let parent_guards = frame.parent.and_then(|p| self.scope_guards(p));
        match (&frame.guard, parent_guards) {
            (None, parent) => parent,
            (Some(own), None) => Some(own.clone()),
            (Some(own), Some(parent)) => Some(Expression::build(|b| {
                b.append_expr(&parent);
                b.append(" && ");
                b.append_expr(own);
            })),
        }
    }

    fn run_op(&mut self, scope: usize, op: TcbOp) -> Option<Identifier> {
        match op {
            TcbOp::Element { node } => self.op_element(scope, node),
            TcbOp::TemplateVariable { template, variable } => {
                self.op_template_variable(scope, template, &variable)
            }
            TcbOp::TemplateContext => self.op_template_context(scope),
            TcbOp::TemplateBody { template } => self.op_template_body(scope, template),
            TcbOp::LetDeclaration { node } => self.op_let_declaration(scope, node),
            TcbOp::BoundText { node } => self.op_bound_text(scope, node),
            TcbOp::DirectiveCtor { node, dir } => self.op_directive_ctor(scope, node, dir),
            TcbOp::DirectiveCtorCircularFallback { dir } => {
                self.op_directive_ctor_fallback(scope, dir)
            }
            TcbOp::DirectiveInputs { node, dir } => self.op_directive_inputs(scope, node, dir),
            TcbOp::DirectiveOutputs { node, dir } => self.op_directive_outputs(scope, node, dir),
            TcbOp::UnclaimedInputs { node, claimed } => {
                self.op_unclaimed_inputs(scope, node, &claimed)
            }
            TcbOp::UnclaimedOutputs { node, claimed } => {
                self.op_unclaimed_outputs(scope, node, &claimed)
            }
            TcbOp::Reference {
                host,
                reference,
                target,
            } => self.op_reference(scope, host, &reference, target),
            TcbOp::InvalidReference => self.op_invalid_reference(scope),
            TcbOp::If { node } => {
                self.render_if(scope, node);
                None
            }
            TcbOp::Switch { node } => self.op_switch(scope, node),
            TcbOp::ForOf { node } => self.op_for_of(scope, node),
            TcbOp::BlockVariable {
                variable,
                initializer,
            } => self.op_block_variable(scope, &variable, initializer.as_ref()),
            TcbOp::BlockImplicitVariable {
                variable,
                type_text,
            } => self.op_block_implicit_variable(scope, &variable, type_text),
        }
    }

    fn op_element(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::Element(el) = ast.node(node) else {
            return None;
        };
        let id = self.allocate_id(None, el.start_span);
        let initializer =
            Expression::from_code(format!("document.createElement(\"{}\")", el.tag_name));
        // Only used for type inference of the element; diagnostics against
        // it are reported through the individual bindings.
        let statement = ts_create_variable(&id, &initializer, MAP_TYPES_ONLY, false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_template_variable(
        &mut self,
        scope: usize,
        template: NodeId,
        variable: &Variable,
    ) -> Option<Identifier> {
        let ctx = self.resolve_node(scope, template)?;
        let id = self.allocate_for_variable(variable);
        let context_key = variable
            .value
            .clone()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| SmolStr::new(IMPLICIT_CONTEXT_KEY));
        let key_flags = if variable.value_span != variable.key_span {
            MAP_FULL
        } else {
            MAP_NAV
        };
        let value_span = variable.value_span;
        let statement = Statement::build(|b| {
            b.append("var ");
            b.append_identifier(&id, id.source_span, MAP_FULL);
            b.append(" = ");
            b.append(&ctx.name);
            if is_js_identifier(&context_key) {
                b.append(".");
                b.append_mapped(&context_key, value_span, key_flags);
            } else {
                b.append("[\"");
                b.append_mapped(&context_key.replace('"', "\\\""), value_span, key_flags);
                b.append("\"]");
            }
            b.append(";");
        });
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_template_context(&mut self, scope: usize) -> Option<Identifier> {
        // Narrowed by template context guards, hence `any` to start with.
        let id = self.allocate_id(None, None);
        let statement = Statement::build(|b| {
            b.append(&format!("var {id} = null! as any;"));
        });
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_template_body(&mut self, scope: usize, template: NodeId) -> Option<Identifier> {
        let bound = self.bound;
        let ast = bound.ast();
        let Node::Template(t) = ast.node(template) else {
            return None;
        };

        // Directives on the template may contribute guard expressions that
        // narrow types inside the body.
        let mut directive_guards: Vec<Expression> = Vec::new();
        let directives = bound.directives_of(template).to_vec();
        for dir in directives {
            let Some(instance) = self.resolve_directive(scope, template, dir) else {
                continue;
            };
            let meta = bound.registry().directive(dir);
            for guard in &meta.template_guards {
                let Some(input) = t.inputs.get(&guard.input_name) else {
                    continue;
                };
                // Already checked by the type-constructor invocation.
                let value = self.tcb_expression(input.value.as_ref(), scope);
                let ignored = Expression::build(|b| {
                    b.with_ignore_diagnostics(|b| {
                        b.append_expr(&value);
                    })
                });
                match guard.kind {
                    template_ast::TemplateGuardKind::Binding => directive_guards.push(ignored),
                    template_ast::TemplateGuardKind::Invocation => {
                        let guard_span = input.value.as_ref().map(|e| e.span());
                        let head = format!(
                            "{}.{}{}",
                            meta.type_name, TEMPLATE_GUARD_PREFIX, guard.input_name
                        );
                        let instance = instance.clone();
                        directive_guards.push(Expression::build(|b| {
                            b.append_mapped(&head, guard_span, MAP_NAV);
                            b.append(&format!("({instance}, "));
                            b.append_expr(&ignored);
                            b.append(")");
                        }));
                    }
                }
            }
            if meta.has_context_guard && self.env.config.apply_template_context_guards {
                if let Some(ctx) = self.resolve_node(scope, template) {
                    let call = format!(
                        "{}.{}({}, {})",
                        meta.type_name, TEMPLATE_CONTEXT_GUARD, instance, ctx
                    );
                    let span = t.start_span;
                    directive_guards.push(Expression::build(|b| {
                        b.append_mapped(&call, span, MAP_NAV);
                    }));
                }
            }
        }

        let guard = if directive_guards.is_empty() {
            None
        } else {
            Some(Expression::build(|b| {
                for (i, g) in directive_guards.iter().rev().enumerate() {
                    if i > 0 {
                        b.append(" && ");
                    }
                    b.append_expr(g);
                }
            }))
        };

        let body_scope = self.scope_for_nodes(Some(scope), Some(template), &t.children, guard.clone());
        let statements = self.render(body_scope);
        if statements.is_empty() {
            // No point rendering the scope block for an empty template.
            return None;
        }

        let ctx = self.resolve_node(scope, template);
        let start_span = t.start_span;
        let statement = Statement::build(|b| {
            if let Some(guard) = &guard {
                b.append("if (");
                b.append_expr(guard);
                b.append(") ");
            }
            b.code_block(|b| {
                if let Some(ctx) = &ctx {
                    b.append_mapped(&ctx.name, start_span, MAP_NAV);
                    b.append(";");
                    b.new_line();
                }
                for statement in &statements {
                    b.append_statement(statement);
                }
            });
        });
        self.add_statement(scope, statement);
        None
    }

    fn op_let_declaration(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::Let(block) = ast.node(node) else {
            return None;
        };
        let decl = block.declaration.as_ref()?;
        let id = self.allocate_id(Some(decl.name.clone()), decl.name_span);
        let value = self.tcb_expression(decl.value.as_ref(), scope);
        let statement = ts_create_variable(&id, &value, MAP_FULL, true);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_bound_text(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::BoundText(text) = ast.node(node) else {
            return None;
        };
        if let Some(expression) = &text.expression {
            let expr = self.tcb_expression(Some(expression), scope);
            self.add_statement(
                scope,
                Statement::build(|b| {
                    b.append("\"\" + ");
                    b.append_expr(&expr);
                    b.append(";");
                }),
            );
        }
        None
    }

    fn op_directive_ctor(
        &mut self,
        scope: usize,
        node: NodeId,
        dir: DirectiveId,
    ) -> Option<Identifier> {
        let bound = self.bound;
        let start_span = container_start_span(bound.ast(), node);
        let id = self.allocate_id(None, start_span);
        let config = self.env.config.clone();

        let mut inputs: indexmap::IndexMap<SmolStr, CtorInput> = indexmap::IndexMap::new();
        for attr in self.get_bound_attributes(node, dir) {
            if !config.check_type_of_attributes && attr.is_text {
                continue;
            }
            // A field already bound wins; a duplicate key would be invalid
            // in the constructor call.
            if inputs.contains_key(&attr.field_name) {
                continue;
            }
            let expression = self.translate_input(&attr.value, scope);
            let expression = widen_binding(expression, &config);
            inputs.insert(attr.field_name.clone(), CtorInput::Bound(expression));
        }
        let meta = bound.registry().directive(dir);
        for property in meta.inputs.values() {
            if !inputs.contains_key(&property.field_name) {
                inputs.insert(property.field_name.clone(), CtorInput::Unset);
            }
        }

        let ctor = self.env.type_ctor_for(dir);
        let call = Expression::build(|b| {
            b.append(&ctor.name);
            b.append("({");
            for (i, (field, input)) in inputs.iter().enumerate() {
                if i > 0 {
                    b.append(", ");
                }
                b.append(&format!("\"{field}\": "));
                match input {
                    CtorInput::Bound(expr) => {
                        b.append_expr(expr);
                    }
                    CtorInput::Unset => {
                        b.append(ANY_EXPRESSION);
                    }
                }
            }
            b.append("})");
        });
        // The invocation exists purely for inference; its spans serve
        // reverse type queries, never diagnostics.
        let type_ctor = Expression::build(|b| {
            b.with_ignore_diagnostics(|b| {
                b.with_reverse_types(|b| {
                    b.append_expr(&call);
                });
            });
        });
        let statement = ts_create_variable(&id, &type_ctor, MappingFlags::empty(), false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_directive_ctor_fallback(&mut self, scope: usize, dir: DirectiveId) -> Option<Identifier> {
        // Infers the widest type for the directive so self-referential
        // bindings can resolve.
        let id = self.allocate_id(None, None);
        let ctor = self.env.type_ctor_for(dir);
        let initializer = Expression::from_code(format!("{}(null!)", ctor.name));
        let statement = ts_create_variable(&id, &initializer, MAP_FULL, false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_directive_inputs(
        &mut self,
        scope: usize,
        node: NodeId,
        dir: DirectiveId,
    ) -> Option<Identifier> {
        let config = self.env.config.clone();
        let mut dir_id: Option<Identifier> = None;

        for attr in self.get_bound_attributes(node, dir) {
            let expression = self.translate_input(&attr.value, scope);
            let widened = widen_binding(expression, &config);
            // Each binding expression surfaces diagnostics exactly once;
            // later re-emissions keep only navigation value.
            let first_emission = self.transpiled_attrs.insert(attr.id);
            let expr = if first_emission {
                widened
            } else {
                Expression::build(|b| {
                    b.with_ignore_diagnostics(|b| {
                        b.append_expr(&widened);
                    })
                })
            };

            if dir_id.is_none() {
                dir_id = self.resolve_directive(scope, node, dir);
            }
            let Some(instance) = dir_id.clone() else {
                continue;
            };
            let field = attr.field_name.clone();
            let key_span = attr.key_span;
            let target = Expression::build(|b| {
                b.append(&instance.name);
                if is_js_identifier(&field) {
                    b.append(".");
                    b.append_mapped(&field, key_span, MAP_FULL);
                } else {
                    b.append("[\"");
                    b.append_mapped(&field, key_span, MAP_FULL);
                    b.append("\"]");
                }
            });
            let mut assignment = Expression::build(|b| {
                b.with_span(key_span, MAP_NAV, |b| {
                    b.append_expr(&target);
                });
                b.append(" = ");
                b.append_expr(&expr);
            });
            if !config.check_type_of_attributes && attr.is_text {
                let inner = assignment;
                assignment = Expression::build(|b| {
                    b.with_ignore_diagnostics(|b| {
                        b.append_expr(&inner);
                    })
                });
            }
            self.add_statement_expr(scope, assignment);
        }
        None
    }

    fn op_directive_outputs(
        &mut self,
        scope: usize,
        node: NodeId,
        dir: DirectiveId,
    ) -> Option<Identifier> {
        let bound = self.bound;
        let ast = bound.ast();
        let outputs = match ast.node(node) {
            Node::Element(el) => &el.outputs,
            Node::Template(t) => &t.outputs,
            _ => return None,
        };
        let meta = bound.registry().directive(dir);
        let config = self.env.config.clone();
        let mut dir_id: Option<Identifier> = None;

        for output in outputs.values() {
            if output.kind == EventKind::Animation || !meta.outputs.contains_key(&output.name) {
                continue;
            }
            if config.check_type_of_output_events {
                if let Some(input_name) = output.name.strip_suffix(OUTPUT_CHANGE_SUFFIX) {
                    self.check_split_two_way(input_name, output, node);
                }
            }
            let field = meta.outputs[&output.name].field_name.clone();
            if dir_id.is_none() {
                dir_id = self.resolve_directive(scope, node, dir);
            }
            let Some(instance) = dir_id.clone() else {
                continue;
            };
            let key_span = output.key_span;
            let output_field = Expression::build(|b| {
                b.append(&instance.name);
                b.append_mapped(&format!("[\"{field}\"]"), key_span, MAP_NAV);
            });
            if config.check_type_of_output_events {
                // `subscribe` lets the output's payload type flow into the
                // handler's `$event` parameter.
                let handler = self.create_event_handler(output, scope, EventParam::Infer);
                self.add_statement(
                    scope,
                    Statement::build(|b| {
                        b.append_expr(&output_field);
                        b.append(".subscribe(");
                        b.append_expr(&handler);
                        b.append(");");
                    }),
                );
            } else {
                self.add_statement_expr(scope, output_field);
                let handler = self.create_event_handler(output, scope, EventParam::Any);
                self.add_statement_expr(scope, handler);
            }
        }
        None
    }

    fn op_unclaimed_inputs(
        &mut self,
        scope: usize,
        node: NodeId,
        claimed: &FxHashSet<SmolStr>,
    ) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::Element(el) = ast.node(node) else {
            return None;
        };
        let config = self.env.config.clone();
        let mut el_id: Option<Identifier> = None;

        for binding in el.inputs.values() {
            let is_property = matches!(binding.kind, BindingKind::Property | BindingKind::TwoWay);
            if is_property && claimed.contains(&binding.name) {
                continue;
            }
            let expr = widen_binding(
                self.tcb_expression(binding.value.as_ref(), scope),
                &config,
            );
            if config.check_type_of_dom_bindings && is_property {
                if binding.name != "style" && binding.name != "class" {
                    if el_id.is_none() {
                        el_id = self.resolve_node(scope, node);
                    }
                    let Some(element) = el_id.clone() else {
                        continue;
                    };
                    let property = attr_to_prop(&binding.name);
                    let key_span = binding.key_span;
                    self.add_statement(
                        scope,
                        Statement::build(|b| {
                            b.append(&element.name);
                            b.append("[\"");
                            b.append_mapped(property, key_span, MAP_NAV);
                            b.append("\"] = ");
                            b.append_expr(&expr);
                            b.append(";");
                        }),
                    );
                } else {
                    self.add_paren_statement(scope, &expr);
                }
            } else {
                // Animation, attribute, class and style bindings only
                // validate the value expression itself.
                self.add_paren_statement(scope, &expr);
            }
        }
        None
    }

    fn op_unclaimed_outputs(
        &mut self,
        scope: usize,
        node: NodeId,
        claimed: &FxHashSet<SmolStr>,
    ) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::Element(el) = ast.node(node) else {
            return None;
        };
        let config = self.env.config.clone();
        let mut el_id: Option<Identifier> = None;

        for output in el.outputs.values() {
            if claimed.contains(&output.name) {
                continue;
            }
            if config.check_type_of_output_events {
                if let Some(input_name) = output.name.strip_suffix(OUTPUT_CHANGE_SUFFIX) {
                    if self.check_split_two_way(input_name, output, node) {
                        continue;
                    }
                }
            }
            if output.kind == EventKind::Animation {
                let param = if config.check_type_of_animation_events {
                    EventParam::Typed("AnimationEvent")
                } else {
                    EventParam::Any
                };
                let handler = self.create_event_handler(output, scope, param);
                self.add_statement_expr(scope, handler);
            } else if config.check_type_of_dom_events {
                // `addEventListener` gives the checker the element's event
                // map to infer an accurate `$event` type from.
                let handler = self.create_event_handler(output, scope, EventParam::Infer);
                if el_id.is_none() {
                    el_id = self.resolve_node(scope, node);
                }
                let Some(element) = el_id.clone() else {
                    continue;
                };
                let name = output.name.clone();
                let key_span = output.key_span;
                self.add_statement(
                    scope,
                    Statement::build(|b| {
                        b.append(&element.name);
                        b.append(".addEventListener(\"");
                        b.append_mapped(&name, key_span, MAP_NAV);
                        b.append("\", ");
                        b.append_expr(&handler);
                        b.append(");");
                    }),
                );
            } else {
                let handler = self.create_event_handler(output, scope, EventParam::Any);
                self.add_statement_expr(scope, handler);
            }
        }
        None
    }

    fn op_reference(
        &mut self,
        scope: usize,
        host: NodeId,
        reference: &Reference,
        target: ReferenceTarget,
    ) -> Option<Identifier> {
        let ast = self.bound.ast();
        let id = self.allocate_id(Some(reference.name.clone()), reference.key_span);
        let config = self.env.config.clone();
        let target_id = match target {
            ReferenceTarget::Directive(dir) => self.resolve_directive(scope, host, dir),
            ReferenceTarget::Node(node) => self.resolve_node(scope, node),
        }?;

        let is_element_target = matches!(
            target,
            ReferenceTarget::Node(n) if matches!(ast.node(n), Node::Element(_))
        );
        let is_template_target = matches!(
            target,
            ReferenceTarget::Node(n) if matches!(ast.node(n), Node::Template(_))
        );
        let reference_expr = Expression::build(|b| {
            b.append_mapped(&target_id.name, reference.value_span, MAP_FULL);
        });
        let initializer = Expression::build(|b| {
            if (is_element_target && !config.check_type_of_dom_references)
                || !config.check_type_of_non_dom_references
            {
                b.append_expr(&reference_expr);
                b.append(" as any");
            } else if is_template_target {
                // A template reference has no useful inferred type of its
                // own; pin it to the template-ref shape.
                b.append("(");
                b.append_expr(&reference_expr);
                b.append(" as any as TemplateRef<any>)");
            } else {
                b.append_expr(&reference_expr);
            }
        });
        let statement = ts_create_variable(&id, &initializer, MAP_FULL, false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_invalid_reference(&mut self, scope: usize) -> Option<Identifier> {
        // Usages of the broken reference resolve to `any`; the problem
        // itself was recorded out-of-band.
        let id = self.allocate_id(None, None);
        let statement =
            ts_create_variable(&id, &Expression::from_code(ANY_EXPRESSION), MAP_FULL, false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn render_if(&mut self, scope: usize, if_node: NodeId) {
        let mut expression_scopes: FxHashMap<NodeId, usize> = FxHashMap::default();
        if let Some(statement) = self.generate_if_branch(scope, if_node, 0, &mut expression_scopes)
        {
            self.add_statement(scope, statement);
        }
    }

    fn generate_if_branch(
        &mut self,
        scope: usize,
        if_node: NodeId,
        index: usize,
        expression_scopes: &mut FxHashMap<NodeId, usize>,
    ) -> Option<Statement> {
        let ast = self.bound.ast();
        let Node::If(block) = ast.node(if_node) else {
            return None;
        };
        let &branch_id = block.branches.get(index)?;
        let Node::IfBranch(branch) = ast.node(branch_id) else {
            return None;
        };
        let check_bodies = self.env.config.check_control_flow_bodies;

        // A final `else` renders as a bare block.
        if branch.expression.is_none() {
            let guard = if check_bodies {
                self.generate_branch_guard(if_node, index, expression_scopes)
            } else {
                None
            };
            let children: &[NodeId] = if check_bodies { &branch.children } else { &[] };
            let branch_scope = self.scope_for_nodes(Some(scope), None, children, guard);
            let statements = self.render(branch_scope);
            return Some(Statement::build(|b| {
                b.code_block(|b| {
                    for statement in &statements {
                        b.append_statement(statement);
                    }
                });
            }));
        }

        // The expression is processed in the parent scope, but the alias
        // variable lives in a dedicated scope the body inherits from.
        let outer = self.scope_for_nodes(Some(scope), Some(branch_id), &[], None);
        for statement in self.render(outer) {
            self.add_statement(scope, statement);
        }
        expression_scopes.insert(branch_id, outer);

        let mut expression = self.tcb_expression(branch.expression.as_ref(), scope);
        if let Some(alias) = &branch.expression_alias {
            if let Some(alias_id) = self.resolve_entity(outer, alias.id) {
                let checked = expression;
                expression = Expression::build(|b| {
                    b.append("(");
                    b.with_ignore_diagnostics(|b| {
                        b.append_expr(&checked);
                    });
                    b.append(") && ");
                    b.append(&alias_id.name);
                });
            }
        }

        let body_guard = if check_bodies {
            self.generate_branch_guard(if_node, index, expression_scopes)
        } else {
            None
        };
        let children: &[NodeId] = if check_bodies { &branch.children } else { &[] };
        let body_scope = self.scope_for_nodes(Some(outer), None, children, body_guard);
        let body_statements = self.render(body_scope);
        let else_statement = self.generate_if_branch(scope, if_node, index + 1, expression_scopes);

        Some(Statement::build(|b| {
            b.append("if (");
            b.append_expr(&expression);
            b.append(") ");
            b.code_block(|b| {
                for statement in &body_statements {
                    b.append_statement(statement);
                }
            });
            if let Some(else_statement) = &else_statement {
                b.new_line();
                b.append("else ");
                b.statements(|b| {
                    b.append_statement(else_statement);
                });
            }
        }))
    }

    /// Event listeners run outside the narrowing of the `if` chain, so the
    /// branch conditions are replayed as a guard: every earlier branch
    /// negated, the branch's own expression as-is.
    fn generate_branch_guard(
        &mut self,
        if_node: NodeId,
        index: usize,
        expression_scopes: &FxHashMap<NodeId, usize>,
    ) -> Option<Expression> {
        let ast = self.bound.ast();
        let Node::If(block) = ast.node(if_node) else {
            return None;
        };
        let mut guard: Option<Expression> = None;
        for i in 0..=index {
            let Some(&branch_id) = block.branches.get(i) else {
                break;
            };
            let Node::IfBranch(branch) = ast.node(branch_id) else {
                continue;
            };
            let Some(expr_ast) = &branch.expression else {
                continue;
            };
            let Some(&expr_scope) = expression_scopes.get(&branch_id) else {
                continue;
            };

            // Re-emitted purely for narrowing; the expression was already
            // checked as the branch condition.
            let raw = self.tcb_expression(Some(expr_ast), expr_scope);
            let mut expression = Expression::build(|b| {
                b.with_ignore_diagnostics(|b| {
                    b.append_expr(&raw);
                })
            });
            if let Some(alias) = &branch.expression_alias {
                if let Some(alias_id) = self.resolve_entity(expr_scope, alias.id) {
                    let inner = expression;
                    expression = Expression::build(|b| {
                        b.with_ignore_diagnostics(|b| {
                            b.append("(");
                            b.append_expr(&inner);
                            b.append(") && ");
                            b.append(&alias_id.name);
                        });
                    });
                }
            }
            let comparison = if i == index {
                expression
            } else {
                Expression::build(|b| {
                    b.append("!(");
                    b.append_expr(&expression);
                    b.append(")");
                })
            };
            guard = Some(match guard {
                None => comparison,
                Some(existing) => Expression::build(|b| {
                    b.append_expr(&existing);
                    b.append(" && ");
                    b.append_expr(&comparison);
                }),
            });
        }
        guard
    }

    fn op_switch(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::Switch(block) = ast.node(node) else {
            return None;
        };
        let check_bodies = self.env.config.check_control_flow_bodies;
        let switch_expr = self.tcb_expression(block.expression.as_ref(), scope);

        let mut cases: Vec<(Option<Expression>, Vec<Statement>)> = Vec::new();
        for &case_id in &block.cases {
            let Node::SwitchCase(case) = ast.node(case_id) else {
                continue;
            };
            let guard = if check_bodies {
                self.generate_switch_guard(node, case_id, scope, &switch_expr)
            } else {
                None
            };
            let children: &[NodeId] = if check_bodies { &case.children } else { &[] };
            let clause_scope = self.scope_for_nodes(Some(scope), None, children, guard);
            let case_expr = case
                .expression
                .as_ref()
                .map(|e| self.tcb_expression(Some(e), clause_scope));
            let statements = self.render(clause_scope);
            cases.push((case_expr, statements));
        }

        let statement = Statement::build(|b| {
            b.append("switch (");
            b.append_expr(&switch_expr);
            b.append(") ");
            b.code_block(|b| {
                for (case_expr, statements) in &cases {
                    match case_expr {
                        Some(expr) => {
                            b.append("case ");
                            b.append_expr(expr);
                            b.append(":");
                        }
                        None => {
                            b.append("default:");
                        }
                    }
                    b.new_line();
                    for statement in statements {
                        b.append_statement(statement);
                    }
                    b.append("break;");
                    b.new_line();
                }
            });
        });
        self.add_statement(scope, statement);
        None
    }

    /// Narrowing guard for one `@case`: a comparison against the subject,
    /// or for `@default` the negation of every other case.
    fn generate_switch_guard(
        &mut self,
        switch_node: NodeId,
        case_id: NodeId,
        scope: usize,
        switch_expr: &Expression,
    ) -> Option<Expression> {
        let ast = self.bound.ast();
        let Node::Switch(block) = ast.node(switch_node) else {
            return None;
        };
        let Node::SwitchCase(case) = ast.node(case_id) else {
            return None;
        };

        if let Some(case_expr) = &case.expression {
            let value = self.tcb_expression(Some(case_expr), scope);
            return Some(Expression::build(|b| {
                b.with_ignore_diagnostics(|b| {
                    b.append_expr(switch_expr);
                    b.append(" === ");
                    b.append_expr(&value);
                });
            }));
        }

        let mut guard: Option<Expression> = None;
        for &other_id in &block.cases {
            let Node::SwitchCase(other) = ast.node(other_id) else {
                continue;
            };
            let Some(other_expr) = &other.expression else {
                continue;
            };
            let value = self.tcb_expression(Some(other_expr), scope);
            let comparison = Expression::build(|b| {
                b.with_ignore_diagnostics(|b| {
                    b.append_expr(switch_expr);
                    b.append(" !== ");
                    b.append_expr(&value);
                });
            });
            guard = Some(match guard {
                None => comparison,
                Some(existing) => Expression::build(|b| {
                    b.append_expr(&existing);
                    b.append(" && ");
                    b.append_expr(&comparison);
                }),
            });
        }
        guard
    }

    fn op_for_of(&mut self, scope: usize, node: NodeId) -> Option<Identifier> {
        let ast = self.bound.ast();
        let Node::For(block) = ast.node(node) else {
            return None;
        };
        let check_bodies = self.env.config.check_control_flow_bodies;
        let children: &[NodeId] = if check_bodies { &block.children } else { &[] };
        let loop_scope = self.scope_for_nodes(Some(scope), Some(node), children, None);

        let item_id = block
            .item
            .as_ref()
            .and_then(|item| self.resolve_entity(loop_scope, item.id));
        let expression = self.tcb_expression(block.expression.as_ref(), loop_scope);
        let track = self.translate_for_track(block, loop_scope);
        let statements = self.render(loop_scope);

        let statement = Statement::build(|b| {
            b.append("for (const ");
            match &item_id {
                Some(id) => {
                    b.append_identifier(id, id.source_span, MAP_FULL);
                }
                None => {
                    b.append("__error");
                }
            }
            // Loops over nullable collections are common; assert away the
            // null rather than reject them.
            b.append(" of (");
            b.append_expr(&expression);
            b.append(")!) ");
            b.code_block(|b| {
                for statement in &statements {
                    b.append_statement(statement);
                }
                b.append("(");
                b.append_expr(&track);
                b.append(");");
                b.new_line();
            });
        });
        self.add_statement(scope, statement);
        None
    }

    fn translate_for_track(
        &mut self,
        block: &template_ast::ForBlock,
        loop_scope: usize,
    ) -> Expression {
        let mut allowed: Vec<EntityId> = Vec::new();
        if let Some(item) = &block.item {
            allowed.push(item.id);
        }
        if let Some(index_var) = block.context_variables.get("$index") {
            allowed.push(index_var.id);
        }
        let mut builder = ExpressionBuilder::new();
        match &block.track_by {
            Some(expr) => {
                self.emit_expr(
                    expr,
                    loop_scope,
                    &mut builder,
                    &ExprMode::ForTrack { allowed: &allowed },
                );
            }
            None => {
                builder.append("undefined");
            }
        }
        builder.finish()
    }

    fn op_block_variable(
        &mut self,
        scope: usize,
        variable: &Variable,
        initializer: Option<&Expr>,
    ) -> Option<Identifier> {
        let value = self.tcb_expression(initializer, scope);
        let id = self.allocate_for_variable(variable);
        let statement = ts_create_variable(&id, &value, MAP_FULL, false);
        self.add_statement(scope, statement);
        Some(id)
    }

    fn op_block_implicit_variable(
        &mut self,
        scope: usize,
        variable: &Variable,
        type_text: &'static str,
    ) -> Option<Identifier> {
        let id = self.allocate_for_variable(variable);
        let statement = ts_declare_variable(&id, &Expression::from_code(type_text), MAP_FULL);
        self.add_statement(scope, statement);
        Some(id)
    }

    /// Bound attributes of `node` matched against one directive's inputs.
    fn get_bound_attributes(&self, node: NodeId, dir: DirectiveId) -> Vec<TcbBoundAttr<'a>> {
        let bound = self.bound;
        let ast = bound.ast();
        let meta = bound.registry().directive(dir);
        let (inputs, attributes) = match ast.node(node) {
            Node::Element(el) => (&el.inputs, &el.attributes),
            Node::Template(t) => (&t.inputs, &t.attributes),
            _ => return Vec::new(),
        };

        let mut result = Vec::new();
        for attr in inputs.values() {
            if !matches!(attr.kind, BindingKind::Property | BindingKind::TwoWay) {
                continue;
            }
            let Some(property) = meta.inputs.get(&attr.name) else {
                continue;
            };
            let value = match &attr.value {
                Some(expr) => CtorValue::Expr(expr),
                None if attr.is_structural => CtorValue::StructuralEmpty,
                None => CtorValue::Missing,
            };
            result.push(TcbBoundAttr {
                id: attr.id,
                key_span: attr.key_span,
                field_name: property.field_name.clone(),
                value,
                is_text: false,
            });
        }
        for attr in attributes.values() {
            let Some(property) = meta.inputs.get(&attr.name) else {
                continue;
            };
            result.push(TcbBoundAttr {
                id: attr.id,
                key_span: attr.key_span,
                field_name: property.field_name.clone(),
                value: CtorValue::Text(&attr.value),
                is_text: true,
            });
        }
        result
    }

    fn translate_input(&mut self, value: &CtorValue<'_>, scope: usize) -> Expression {
        match value {
            CtorValue::Expr(expr) => self.tcb_expression(Some(expr), scope),
            CtorValue::StructuralEmpty => Expression::from_code("\"\""),
            CtorValue::Missing => Expression::from_code("undefined"),
            CtorValue::Text(text) => {
                Expression::from_code(format!("\"{}\"", escape_literal(text)))
            }
        }
    }

    /// Flags two-way bindings whose input and change event resolve to
    /// different consumers. Returns true when the problem was reported.
    fn check_split_two_way(&mut self, input_name: &str, output: &BoundEvent, node: NodeId) -> bool {
        let bound = self.bound;
        let ast = bound.ast();
        let inputs = match ast.node(node) {
            Node::Element(el) => &el.inputs,
            Node::Template(t) => &t.inputs,
            _ => return false,
        };
        let Some(input) = inputs.get(input_name) else {
            return false;
        };
        // Only the two halves of one source binding count.
        if input.source_span != output.source_span {
            return false;
        }
        let directives = bound.directives_of(node);
        let input_consumer = directives.iter().find(|d| {
            bound
                .registry()
                .directive(**d)
                .inputs
                .contains_key(input_name)
        });
        let Some(input_consumer) = input_consumer else {
            return false;
        };
        let output_consumer = directives.iter().find(|d| {
            bound
                .registry()
                .directive(**d)
                .outputs
                .contains_key(&output.name)
        });
        match output_consumer {
            Some(consumer) if consumer == input_consumer => false,
            _ => {
                self.oob.split_two_way_binding(
                    input_name,
                    output.key_span.or(Some(output.source_span)),
                );
                true
            }
        }
    }

    /// Builds the `($event): any => { … }` handler for an event binding,
    /// replaying the scope's narrowing guards inside the body.
    fn create_event_handler(
        &mut self,
        event: &BoundEvent,
        scope: usize,
        param: EventParam,
    ) -> Expression {
        let handlers: Vec<Expression> = event
            .handler
            .iter()
            .map(|template_ast::Stmt::Expr(expr)| self.tcb_handler_expression(expr, scope))
            .collect();
        let guards = self.scope_guards(scope);

        let handler = Expression::build(|b| {
            b.append("(");
            b.append(EVENT_PARAMETER);
            match param {
                EventParam::Infer => {}
                EventParam::Any => {
                    b.append(": any");
                }
                EventParam::Typed(type_name) => {
                    b.append(": ");
                    b.append(type_name);
                }
            }
            b.append("): any => ");
            b.code_block(|b| {
                let emit_handlers = |b: &mut ExpressionBuilder| {
                    for handler in &handlers {
                        b.append_expr(handler);
                        b.append(";");
                        b.new_line();
                    }
                };
                match &guards {
                    Some(guards) => {
                        b.append("if (");
                        b.append_expr(guards);
                        b.append(") ");
                        b.code_block(emit_handlers);
                        b.new_line();
                    }
                    None => emit_handlers(b),
                }
            });
        });

        // The handler of a two-way binding re-emits the binding expression,
        // and directive/element pairs can both claim an event; map each
        // handler for diagnostics at most once.
        let already_mapped = match event.kind {
            EventKind::TwoWay => true,
            _ => !self.transpiled_attrs.insert(event.id),
        };
        if already_mapped {
            Expression::build(|b| {
                b.with_ignore_diagnostics(|b| {
                    b.append_expr(&handler);
                })
            })
        } else {
            handler
        }
    }
}

/// `var <id> = <initializer>;` (or `const`), with the identifier mapped to
/// its source span.
fn ts_create_variable(
    id: &Identifier,
    initializer: &Expression,
    id_flags: MappingFlags,
    is_const: bool,
) -> Statement {
    Statement::build(|b| {
        b.append(if is_const { "const " } else { "var " });
        b.append_identifier(id, id.source_span, id_flags);
        b.append(" = ");
        b.append_expr(initializer);
        b.append(";");
    })
}

/// `var <id> = null! as <type>;` — a declaration with an explicit type.
/// The `null!` initializer sidesteps strict initialization checks without
/// narrowing the declared type.
fn ts_declare_variable(id: &Identifier, type_expr: &Expression, id_flags: MappingFlags) -> Statement {
    Statement::build(|b| {
        b.append("var ");
        b.append_identifier(id, id.source_span, id_flags);
        b.append(" = null! as ");
        b.append_expr(type_expr);
        b.append(";");
    })
}

pub(crate) fn widen_binding(expr: Expression, config: &TypeCheckConfig) -> Expression {
    if !config.check_type_of_input_bindings {
        return Expression::build(|b| {
            b.append("((");
            b.append_expr(&expr);
            b.append(") as any)");
        });
    }
    if !config.strict_null_input_bindings {
        // Literals must not be widened; a non-null assertion would erase
        // their literal types.
        let code = expr.code();
        if code.starts_with('[') || code.starts_with('{') || code.starts_with("([") || code.starts_with("({") {
            return expr;
        }
        return Expression::build(|b| {
            b.append_expr(&expr);
            b.append("!");
        });
    }
    expr
}

pub(crate) fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

pub(crate) fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn attr_to_prop(name: &str) -> &str {
    ATTR_TO_PROP
        .iter()
        .find(|(attr, _)| *attr == name)
        .map(|(_, prop)| *prop)
        .unwrap_or(name)
}

fn container_start_span(ast: &template_ast::TemplateAst, node: NodeId) -> Option<Span> {
    match ast.node(node) {
        Node::Element(el) => el.start_span,
        Node::Template(t) => t.start_span,
        _ => None,
    }
}

fn for_loop_variable_type(name: &str) -> Option<&'static str> {
    FOR_LOOP_CONTEXT_VARIABLES
        .iter()
        .find(|(var, _)| *var == name)
        .map(|(_, ty)| *ty)
}
