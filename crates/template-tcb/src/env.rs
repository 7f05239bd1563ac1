//! Per-run environment: strictness configuration and deduplicated
//! allocation of directive type-constructor and pipe instance aliases.

use crate::emit::{Identifier, Statement};
use indexmap::IndexMap;
use smol_str::SmolStr;
use template_ast::{DirectiveId, PipeId, Registry};

/// Strictness switches for one transpilation run.
///
/// Everything defaults to the strict configuration; hosts relax individual
/// checks to match their project settings.
#[derive(Debug, Clone)]
pub struct TypeCheckConfig {
    /// Check the types of expressions bound to directive inputs.
    pub check_type_of_input_bindings: bool,
    /// Keep `null`/`undefined` in input binding types; when off, bindings
    /// are wrapped in a non-null assertion.
    pub strict_null_input_bindings: bool,
    /// Check static attribute values bound to directive inputs.
    pub check_type_of_attributes: bool,
    /// Check property bindings against the DOM element type.
    pub check_type_of_dom_bindings: bool,
    /// Infer `$event` types for directive outputs via `subscribe`.
    pub check_type_of_output_events: bool,
    /// Give animation events a typed `$event` parameter.
    pub check_type_of_animation_events: bool,
    /// Infer `$event` types for DOM events via `addEventListener`.
    pub check_type_of_dom_events: bool,
    /// Type references to DOM elements; when off they are pinned to `any`.
    pub check_type_of_dom_references: bool,
    /// Type references to directives and templates.
    pub check_type_of_non_dom_references: bool,
    /// Check pipe `transform` calls against the pipe type.
    pub check_type_of_pipes: bool,
    /// Use the strict ternary form for safe-navigation operators.
    pub strict_safe_navigation_types: bool,
    /// Keep literal types for array/object literals in bindings.
    pub strict_literal_types: bool,
    /// Descend into embedded template bodies.
    pub check_template_bodies: bool,
    /// Descend into control-flow block bodies.
    pub check_control_flow_bodies: bool,
    /// Apply directive template context guards to narrow context types.
    pub apply_template_context_guards: bool,
    /// Render declarations even when nothing references them, so editor
    /// features can find a node for every template construct.
    pub retain_unreferenced_declarations: bool,
}

impl Default for TypeCheckConfig {
    fn default() -> Self {
        Self {
            check_type_of_input_bindings: true,
            strict_null_input_bindings: true,
            check_type_of_attributes: true,
            check_type_of_dom_bindings: true,
            check_type_of_output_events: true,
            check_type_of_animation_events: true,
            check_type_of_dom_events: true,
            check_type_of_dom_references: true,
            check_type_of_non_dom_references: true,
            check_type_of_pipes: true,
            strict_safe_navigation_types: true,
            strict_literal_types: true,
            check_template_bodies: true,
            check_control_flow_bodies: true,
            apply_template_context_guards: true,
            retain_unreferenced_declarations: true,
        }
    }
}

/// Tracks which directive type constructors and pipe instances the current
/// run has referenced, and renders their declarations.
///
/// Aliases are allocated lazily in first-use order, so repeated runs over
/// unchanged input number them identically.
#[derive(Debug)]
pub struct Environment {
    pub config: TypeCheckConfig,
    ctor_aliases: IndexMap<DirectiveId, Identifier>,
    pipe_aliases: IndexMap<PipeId, Identifier>,
}

impl Environment {
    pub fn new(config: TypeCheckConfig) -> Self {
        Self {
            config,
            ctor_aliases: IndexMap::new(),
            pipe_aliases: IndexMap::new(),
        }
    }

    /// The type-constructor alias for a directive, allocating `_ctor<N>`
    /// on first use.
    pub fn type_ctor_for(&mut self, directive: DirectiveId) -> Identifier {
        let next = self.ctor_aliases.len() + 1;
        self.ctor_aliases
            .entry(directive)
            .or_insert_with(|| Identifier::new(format!("_ctor{next}")))
            .clone()
    }

    /// The instance alias for a pipe, allocating `_pipe<N>` on first use.
    pub fn pipe_instance(&mut self, pipe: PipeId) -> Identifier {
        let next = self.pipe_aliases.len() + 1;
        self.pipe_aliases
            .entry(pipe)
            .or_insert_with(|| Identifier::new(format!("_pipe{next}")))
            .clone()
    }

    /// Renders one declaration per referenced directive, in allocation
    /// order. Call only after all references for the run have been made.
    ///
    /// Generic directives get a generic function whose parameter is a pick
    /// of the declared input fields, so the checker infers type parameters
    /// from the inputs actually bound at a usage site. Non-generic
    /// directives (and generics with no usable input fields) get a trivial
    /// constant function.
    pub fn directive_statements(&self, registry: &Registry) -> Vec<Statement> {
        self.ctor_aliases
            .iter()
            .map(|(id, alias)| {
                let meta = registry.directive(*id);
                let fields = dedup_field_names(meta);
                Statement::build(|b| {
                    if meta.is_generic() && !fields.is_empty() {
                        let params = meta.generic_params.join(", ");
                        let ty = format!("{}<{}>", meta.type_name, params);
                        let picks = fields
                            .iter()
                            .map(|f| format!("\"{f}\""))
                            .collect::<Vec<_>>()
                            .join(" | ");
                        b.append(&format!(
                            "declare function {alias}<{params}>(init: Pick<{ty}, {picks}>): {ty};"
                        ));
                    } else if meta.is_generic() {
                        // No input fields to infer from; give up on the
                        // type parameters rather than fail the template.
                        let args = vec!["any"; meta.generic_params.len()].join(", ");
                        b.append(&format!(
                            "declare const {alias}: (init: any) => {}<{args}>;",
                            meta.type_name
                        ));
                    } else {
                        b.append(&format!(
                            "declare const {alias}: (init: any) => {};",
                            meta.type_name
                        ));
                    }
                })
            })
            .collect()
    }

    /// Renders one declaration per referenced pipe, in allocation order.
    pub fn pipe_statements(&self, registry: &Registry) -> Vec<Statement> {
        self.pipe_aliases
            .iter()
            .map(|(id, alias)| {
                let meta = registry.pipe(*id);
                Statement::build(|b| {
                    b.append(&format!("declare const {alias}: {};", meta.type_name));
                })
            })
            .collect()
    }
}

/// Declared input field names, deduplicated, in declaration order.
fn dedup_field_names(meta: &template_ast::DirectiveMeta) -> Vec<SmolStr> {
    let mut seen = Vec::new();
    for property in meta.inputs.values() {
        if !seen.contains(&property.field_name) {
            seen.push(property.field_name.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use template_ast::{DirectiveMeta, DirectiveProperty, PipeMeta};

    fn registry_with_generic_and_plain() -> (Registry, DirectiveId, DirectiveId) {
        let mut registry = Registry::new();
        let mut inputs = indexmap::IndexMap::new();
        inputs.insert("ngForOf".into(), DirectiveProperty::new("ngForOf"));
        inputs.insert("ngForTrackBy".into(), DirectiveProperty::new("ngForTrackBy"));
        let generic = registry.add_directive(DirectiveMeta {
            type_name: "NgForOf".into(),
            generic_params: vec!["T".into()],
            inputs,
            ..DirectiveMeta::default()
        });
        let plain = registry.add_directive(DirectiveMeta {
            type_name: "TooltipDirective".into(),
            ..DirectiveMeta::default()
        });
        (registry, generic, plain)
    }

    #[test]
    fn test_aliases_are_stable_and_unique() {
        let (_registry, generic, plain) = registry_with_generic_and_plain();
        let mut env = Environment::new(TypeCheckConfig::default());

        let first = env.type_ctor_for(generic);
        let second = env.type_ctor_for(plain);
        let again = env.type_ctor_for(generic);

        assert_eq!(first.name, "_ctor1");
        assert_eq!(second.name, "_ctor2");
        assert_eq!(again.name, "_ctor1");
    }

    #[test]
    fn test_directive_declarations_in_allocation_order() {
        let (registry, generic, plain) = registry_with_generic_and_plain();
        let mut env = Environment::new(TypeCheckConfig::default());
        env.type_ctor_for(plain);
        env.type_ctor_for(generic);

        let statements = env.directive_statements(&registry);
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].expression().code(),
            "declare const _ctor1: (init: any) => TooltipDirective;"
        );
        assert_eq!(
            statements[1].expression().code(),
            "declare function _ctor2<T>(init: Pick<NgForOf<T>, \"ngForOf\" | \"ngForTrackBy\">): NgForOf<T>;"
        );
    }

    #[test]
    fn test_generic_without_input_fields_falls_back_to_any() {
        let mut registry = Registry::new();
        let dir = registry.add_directive(DirectiveMeta {
            type_name: "Marker".into(),
            generic_params: vec!["T".into(), "U".into()],
            ..DirectiveMeta::default()
        });
        let mut env = Environment::new(TypeCheckConfig::default());
        env.type_ctor_for(dir);

        let statements = env.directive_statements(&registry);
        assert_eq!(
            statements[0].expression().code(),
            "declare const _ctor1: (init: any) => Marker<any, any>;"
        );
    }

    #[test]
    fn test_pipe_aliases_and_declarations() {
        let mut registry = Registry::new();
        let lower = registry.add_pipe(PipeMeta {
            name: "lowercase".into(),
            type_name: "LowerCasePipe".into(),
        });
        let date = registry.add_pipe(PipeMeta {
            name: "date".into(),
            type_name: "DatePipe".into(),
        });
        let mut env = Environment::new(TypeCheckConfig::default());
        assert_eq!(env.pipe_instance(lower).name, "_pipe1");
        assert_eq!(env.pipe_instance(date).name, "_pipe2");
        assert_eq!(env.pipe_instance(lower).name, "_pipe1");

        let statements = env.pipe_statements(&registry);
        assert_eq!(
            statements[0].expression().code(),
            "declare const _pipe1: LowerCasePipe;"
        );
        assert_eq!(
            statements[1].expression().code(),
            "declare const _pipe2: DatePipe;"
        );
    }
}
