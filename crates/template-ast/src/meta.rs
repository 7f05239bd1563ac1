//! Directive and pipe metadata supplied by the host registry.
//!
//! Name resolution and selector matching are external concerns; the raw
//! markup model arrives with directive ids already attached to each node,
//! and this registry holds what the transpiler needs to know about them.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Identifies a directive within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirectiveId(pub u32);

/// Identifies a pipe within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(pub u32);

/// A directive's declared input or output.
#[derive(Debug, Clone)]
pub struct DirectiveProperty {
    /// The class field backing the binding, which may differ from the
    /// binding name (`@Input("alias") field`).
    pub field_name: SmolStr,
}

impl DirectiveProperty {
    pub fn new(field_name: impl Into<SmolStr>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }
}

/// How a directive narrows the type of a template it is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateGuardKind {
    /// The bound input expression itself is the guard.
    Binding,
    /// The directive declares a static guard function that is invoked with
    /// the directive instance and the bound expression.
    Invocation,
}

/// A template guard declared by a directive for one of its inputs.
#[derive(Debug, Clone)]
pub struct TemplateGuard {
    pub input_name: SmolStr,
    pub kind: TemplateGuardKind,
}

/// Everything the transpiler needs to know about one directive.
#[derive(Debug, Clone, Default)]
pub struct DirectiveMeta {
    /// The directive's type name as visible to the type checker.
    pub type_name: SmolStr,
    /// Generic parameter names, empty for non-generic directives.
    pub generic_params: Vec<SmolStr>,
    /// Whether the directive is a component.
    pub is_component: bool,
    /// Binding name → declared input, in declaration order.
    pub inputs: IndexMap<SmolStr, DirectiveProperty>,
    /// Binding name → declared output, in declaration order.
    pub outputs: IndexMap<SmolStr, DirectiveProperty>,
    /// Names under which template references can capture this directive.
    pub export_as: Vec<SmolStr>,
    /// Template guards declared for inputs.
    pub template_guards: Vec<TemplateGuard>,
    /// Whether the directive declares a template context guard.
    pub has_context_guard: bool,
}

impl DirectiveMeta {
    /// Whether the directive's type has generic parameters.
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// Everything the transpiler needs to know about one pipe.
#[derive(Debug, Clone)]
pub struct PipeMeta {
    /// The name the pipe is used under in expressions.
    pub name: SmolStr,
    /// The pipe's type name as visible to the type checker.
    pub type_name: SmolStr,
}

/// The resolved directive/pipe registry for one transpilation request.
#[derive(Debug, Default)]
pub struct Registry {
    directives: Vec<DirectiveMeta>,
    pipes: Vec<PipeMeta>,
    pipes_by_name: FxHashMap<SmolStr, PipeId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a directive and returns its id.
    pub fn add_directive(&mut self, meta: DirectiveMeta) -> DirectiveId {
        let id = DirectiveId(self.directives.len() as u32);
        self.directives.push(meta);
        id
    }

    /// Registers a pipe and returns its id.
    pub fn add_pipe(&mut self, meta: PipeMeta) -> PipeId {
        let id = PipeId(self.pipes.len() as u32);
        self.pipes_by_name.insert(meta.name.clone(), id);
        self.pipes.push(meta);
        id
    }

    pub fn directive(&self, id: DirectiveId) -> &DirectiveMeta {
        &self.directives[id.0 as usize]
    }

    pub fn pipe(&self, id: PipeId) -> &PipeMeta {
        &self.pipes[id.0 as usize]
    }

    /// Looks a pipe up by the name it is used under in expressions.
    pub fn pipe_by_name(&self, name: &str) -> Option<PipeId> {
        self.pipes_by_name.get(name).copied()
    }
}
