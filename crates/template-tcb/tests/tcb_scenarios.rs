//! Scenario tests for the rendered type-check blocks.
//!
//! Each test builds a small raw markup tree the way the host front-end
//! would, renders it, and asserts on the generated code and mappings.

use indexmap::IndexMap;
use source_map::{MappingFlags, Span};
use template_ast::{
    build_template_ast, BoundTarget, DirectiveId, DirectiveMeta, DirectiveProperty, Expr, PipeMeta,
    RawAttrValue, RawAttribute, RawElement, RawForBlock, RawIfBlock, RawIfBranch,
    RawInterpolation, RawNode, RawVariable, Registry, Stmt, TemplateBinding,
};
use template_tcb::{transpile_template, Environment, OobCode, TranspiledTemplate, TypeCheckConfig};

fn span(start: u32, end: u32) -> Span {
    Span::new(start, end)
}

fn expr_attr(name: &str, key_span: Span, expr: Expr) -> RawAttribute {
    let value_span = expr.span();
    RawAttribute {
        name: name.into(),
        key_span,
        value: Some(RawAttrValue::Expr(expr)),
        value_span: Some(value_span),
        source_span: key_span.cover(value_span),
    }
}

fn handler_attr(name: &str, key_span: Span, stmts: Vec<Stmt>) -> RawAttribute {
    RawAttribute {
        name: name.into(),
        key_span,
        value: Some(RawAttrValue::Handler(stmts)),
        value_span: None,
        source_span: key_span,
    }
}

fn text_attr(name: &str, key_span: Span, value: &str) -> RawAttribute {
    RawAttribute {
        name: name.into(),
        key_span,
        value: Some(RawAttrValue::Text(value.into())),
        value_span: None,
        source_span: key_span,
    }
}

fn element(
    tag: &str,
    start_span: Span,
    attributes: Vec<RawAttribute>,
    directives: Vec<DirectiveId>,
    children: Vec<RawNode>,
) -> RawNode {
    RawNode::Element(RawElement {
        tag_name: tag.into(),
        is_template_tag: false,
        attributes,
        directives,
        template_directives: vec![],
        children,
        start_span,
    })
}

fn interpolation(expr: Expr, span: Span) -> RawNode {
    RawNode::Interpolation(RawInterpolation {
        expression: Some(expr),
        span,
    })
}

fn transpile(roots: Vec<RawNode>, registry: &Registry) -> (TranspiledTemplate, Environment) {
    let ast = build_template_ast(roots);
    let bound = BoundTarget::new(&ast, registry);
    let mut env = Environment::new(TypeCheckConfig::default());
    let result = transpile_template(&mut env, &bound, "TestComponent", 1);
    (result, env)
}

#[test]
fn test_property_binding_on_plain_element() {
    let registry = Registry::new();
    let roots = vec![element(
        "input",
        span(1, 6),
        vec![expr_attr(
            "[value]",
            span(7, 14),
            Expr::read("userName", span(16, 24)),
        )],
        vec![],
        vec![],
    )];
    let ast = build_template_ast(roots);
    let bound = BoundTarget::new(&ast, &registry);
    let mut env = Environment::new(TypeCheckConfig::default());
    let result = transpile_template(&mut env, &bound, "UserCard", 1);

    insta::assert_snapshot!(result.generated_code, @r###"
function _tcb_1(this: UserCard) {
var _t1 = document.createElement("input");
_t1["value"] = this.userName;
}
"###);

    // No directive matched, so no type-constructor invocation.
    assert!(!result.generated_code.contains("_ctor"));

    // The right-hand side carries a type-capable mapping at exactly the
    // binding's value span.
    let value_mappings: Vec<_> = result
        .source_mappings
        .iter()
        .filter(|m| m.source == span(16, 24) && m.flags.contains(MappingFlags::TYPES))
        .collect();
    assert_eq!(value_mappings.len(), 1);
    let mapping = value_mappings[0];
    let generated = &result.generated_code
        [u32::from(mapping.generated.start) as usize..u32::from(mapping.generated.end) as usize];
    assert_eq!(generated, "this.userName");
}

#[test]
fn test_one_ctor_declaration_two_invocations() {
    let mut registry = Registry::new();
    let mut inputs = IndexMap::new();
    inputs.insert("tip".into(), DirectiveProperty::new("tip"));
    let tooltip = registry.add_directive(DirectiveMeta {
        type_name: "TooltipDirective".into(),
        inputs,
        ..DirectiveMeta::default()
    });

    let roots = vec![
        element(
            "div",
            span(1, 4),
            vec![expr_attr("[tip]", span(5, 10), Expr::read("first", span(12, 17)))],
            vec![tooltip],
            vec![],
        ),
        element(
            "div",
            span(30, 33),
            vec![expr_attr("[tip]", span(34, 39), Expr::read("second", span(41, 47)))],
            vec![tooltip],
            vec![],
        ),
    ];
    let (result, env) = transpile(roots, &registry);

    // One declaration in the environment, two invocations of its alias.
    assert_eq!(env.directive_statements(&registry).len(), 1);
    assert_eq!(result.generated_code.matches("_ctor1({").count(), 2);
    assert!(!result.generated_code.contains("_ctor2"));

    // The inputs are checked through instance assignments as well.
    assert!(result.generated_code.contains(".tip = this.first;"));
    assert!(result.generated_code.contains(".tip = this.second;"));
}

#[test]
fn test_structural_shorthand_renders_nested_scope() {
    let mut registry = Registry::new();
    let mut inputs = IndexMap::new();
    inputs.insert("ngForOf".into(), DirectiveProperty::new("ngForOf"));
    let ng_for = registry.add_directive(DirectiveMeta {
        type_name: "NgForOf".into(),
        generic_params: vec!["T".into()],
        inputs,
        ..DirectiveMeta::default()
    });

    // <div *ngFor="let item of items">{{item.name}}</div>
    let shorthand = RawAttribute {
        name: "*ngFor".into(),
        key_span: span(5, 11),
        value: Some(RawAttrValue::Bindings(vec![
            TemplateBinding::Variable(RawVariable {
                name: "item".into(),
                key_span: Some(span(17, 21)),
                value: None,
                value_span: None,
            }),
            TemplateBinding::Expression {
                key: "ngForOf".into(),
                key_span: Some(span(22, 24)),
                value: Some(Expr::read("items", span(25, 30))),
                span: span(22, 30),
            },
        ])),
        value_span: Some(span(13, 30)),
        source_span: span(5, 31),
    };
    let item_read = Expr::PropertyRead {
        receiver: Some(Box::new(Expr::read("item", span(34, 38)))),
        name: "name".into(),
        name_span: span(39, 43),
        span: span(34, 43),
        safe: false,
    };
    let roots = vec![RawNode::Element(RawElement {
        tag_name: "div".into(),
        is_template_tag: false,
        attributes: vec![shorthand],
        directives: vec![],
        template_directives: vec![ng_for],
        children: vec![interpolation(item_read, span(32, 45))],
        start_span: span(1, 4),
    })];
    let (result, _env) = transpile(roots, &registry);
    let code = &result.generated_code;

    // Exactly one nested scope block, opened by the template body.
    assert_eq!(code.matches("{\n_t2;\n").count(), 1);

    // The loop variable is declared from the template context before any
    // statement that references it.
    let declaration = code.find("var _t3 = _t2.$implicit;").expect("declaration");
    let usage = code.find("\"\" + _t3.name;").expect("usage");
    assert!(declaration < usage);

    // The synthetic variable is renamable back to `item`.
    assert!(result
        .name_mappings
        .iter()
        .any(|m| m.generated_name == "_t3" && m.source_name == "item"));
}

#[test]
fn test_two_way_binding_checks_both_sides() {
    let mut registry = Registry::new();
    let mut inputs = IndexMap::new();
    inputs.insert("value".into(), DirectiveProperty::new("value"));
    let mut outputs = IndexMap::new();
    outputs.insert("valueChange".into(), DirectiveProperty::new("valueChange"));
    let model = registry.add_directive(DirectiveMeta {
        type_name: "ModelDirective".into(),
        inputs,
        outputs,
        ..DirectiveMeta::default()
    });

    let roots = vec![element(
        "input",
        span(1, 6),
        vec![expr_attr(
            "[(value)]",
            span(7, 16),
            Expr::read("userName", span(18, 26)),
        )],
        vec![model],
        vec![],
    )];
    let (result, _env) = transpile(roots, &registry);
    let code = &result.generated_code;

    // Property side: inferred through the ctor and assigned to the field.
    assert!(code.contains("_ctor1({\"value\": this.userName})"));
    assert!(code.contains(".value = this.userName;"));

    // Event side: a subscribe call whose handler assigns `$event` back.
    assert!(code.contains("[\"valueChange\"].subscribe(($event): any => {"));
    assert!(code.contains("this.userName = $event;"));

    // The binding expression surfaces diagnostics exactly once.
    let diagnostic_mappings = result
        .source_mappings
        .iter()
        .filter(|m| {
            m.source == span(18, 26)
                && m.flags.contains(MappingFlags::TYPES)
                && m.flags.contains(MappingFlags::DIAGNOSTICS)
        })
        .count();
    assert_eq!(diagnostic_mappings, 1);
}

#[test]
fn test_dom_event_uses_add_event_listener() {
    let registry = Registry::new();
    let handler = Expr::Call {
        callee: Box::new(Expr::read("onClick", span(16, 23))),
        args: vec![Expr::read("$event", span(24, 30))],
        span: span(16, 31),
        safe: false,
    };
    let roots = vec![element(
        "button",
        span(1, 7),
        vec![handler_attr("(click)", span(8, 15), vec![Stmt::Expr(handler)])],
        vec![],
        vec![],
    )];
    let (result, _env) = transpile(roots, &registry);
    assert!(result
        .generated_code
        .contains("_t1.addEventListener(\"click\", ($event): any => {"));
    assert!(result.generated_code.contains("this.onClick($event);"));
}

#[test]
fn test_reference_captures_exported_directive() {
    let mut registry = Registry::new();
    let menu = registry.add_directive(DirectiveMeta {
        type_name: "MenuDirective".into(),
        export_as: vec!["menu".into()],
        ..DirectiveMeta::default()
    });

    let roots = vec![
        element(
            "div",
            span(1, 4),
            vec![text_attr("#m", span(5, 7), "menu")],
            vec![menu],
            vec![],
        ),
        interpolation(Expr::read("m", span(20, 21)), span(18, 23)),
    ];
    let (result, _env) = transpile(roots, &registry);
    let code = &result.generated_code;

    // The capture aliases the directive instance, and the interpolation
    // reads the capture.
    assert!(code.contains("var _t3 = _t2;"));
    assert!(code.contains("\"\" + _t3;"));
}

#[test]
fn test_missing_reference_target_degrades_to_any() {
    let registry = Registry::new();
    let roots = vec![element(
        "div",
        span(1, 4),
        vec![text_attr("#m", span(5, 7), "missing")],
        vec![],
        vec![],
    )];
    let (result, _env) = transpile(roots, &registry);

    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == OobCode::MissingReferenceTarget));
    // The invalid reference still declares a variable, pinned to any.
    assert!(result.generated_code.contains("= null as any;"));
}

#[test]
fn test_missing_pipe_is_collected_not_fatal() {
    let registry = Registry::new();
    let piped = Expr::Pipe {
        input: Box::new(Expr::read("title", span(3, 8))),
        name: "unknown".into(),
        name_span: span(11, 18),
        args: vec![],
        span: span(3, 18),
    };
    let roots = vec![interpolation(piped, span(1, 20))];
    let (result, _env) = transpile(roots, &registry);

    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == OobCode::MissingPipe));
    // The rest of the expression still renders and checks.
    assert!(result
        .generated_code
        .contains("(null as any).transform(this.title)"));
}

#[test]
fn test_pipe_alias_allocated_once() {
    let mut registry = Registry::new();
    registry.add_pipe(PipeMeta {
        name: "lowercase".into(),
        type_name: "LowerCasePipe".into(),
    });

    let pipe_at = |input_span: Span, name_span: Span, span_all: Span| Expr::Pipe {
        input: Box::new(Expr::read("title", input_span)),
        name: "lowercase".into(),
        name_span,
        args: vec![],
        span: span_all,
    };
    let roots = vec![
        interpolation(pipe_at(span(3, 8), span(11, 20), span(3, 20)), span(1, 22)),
        interpolation(pipe_at(span(33, 38), span(41, 50), span(33, 50)), span(31, 52)),
    ];
    let (result, env) = transpile(roots, &registry);

    assert_eq!(result.generated_code.matches("_pipe1.transform(").count(), 2);
    assert_eq!(env.pipe_statements(&registry).len(), 1);
}

#[test]
fn test_if_else_renders_branch_blocks() {
    let registry = Registry::new();
    let roots = vec![RawNode::If(RawIfBlock {
        name_span: span(0, 3),
        branches: vec![
            RawIfBranch {
                name_span: span(0, 3),
                expression: Some(Expr::read("loggedIn", span(5, 13))),
                alias: None,
                children: vec![interpolation(Expr::read("user", span(18, 22)), span(16, 24))],
            },
            RawIfBranch {
                name_span: span(27, 32),
                expression: None,
                alias: None,
                children: vec![interpolation(Expr::read("guest", span(36, 41)), span(34, 43))],
            },
        ],
    })];
    let (result, _env) = transpile(roots, &registry);
    let code = &result.generated_code;

    assert!(code.contains("if (this.loggedIn) {\n\"\" + this.user;\n}"));
    assert!(code.contains("else {\n\"\" + this.guest;\n}"));
}

#[test]
fn test_for_block_loops_and_checks_track() {
    let registry = Registry::new();
    let track = Expr::PropertyRead {
        receiver: Some(Box::new(Expr::read("item", span(30, 34)))),
        name: "id".into(),
        name_span: span(35, 37),
        span: span(30, 37),
        safe: false,
    };
    let body = Expr::PropertyRead {
        receiver: Some(Box::new(Expr::read("item", span(42, 46)))),
        name: "name".into(),
        name_span: span(47, 51),
        span: span(42, 51),
        safe: false,
    };
    let roots = vec![RawNode::For(RawForBlock {
        name_span: span(0, 4),
        item: Some(RawVariable {
            name: "item".into(),
            key_span: Some(span(6, 10)),
            value: None,
            value_span: None,
        }),
        context_variables: vec![],
        expression: Some(Expr::read("items", span(14, 19))),
        track_by: Some(track),
        children: vec![interpolation(body, span(40, 53))],
        empty: None,
    })];
    let (result, _env) = transpile(roots, &registry);
    let code = &result.generated_code;

    assert!(code.contains("for (const _t1 of (this.items)!) {"));
    // Implicit loop variables are declared with their known types.
    assert!(code.contains("= null! as number;"));
    assert!(code.contains("= null! as boolean;"));
    // The track expression is checked at the end of the loop body.
    assert!(code.contains("(_t1.id);"));
    assert!(result.diagnostics.is_empty());
}

#[test]
fn test_for_track_rejects_other_template_symbols() {
    let registry = Registry::new();
    let roots = vec![RawNode::For(RawForBlock {
        name_span: span(0, 4),
        item: Some(RawVariable {
            name: "item".into(),
            key_span: Some(span(6, 10)),
            value: None,
            value_span: None,
        }),
        context_variables: vec![],
        expression: Some(Expr::read("items", span(14, 19))),
        track_by: Some(Expr::read("$first", span(28, 34))),
        children: vec![],
        empty: None,
    })];
    let (result, _env) = transpile(roots, &registry);

    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.code == OobCode::IllegalTrackAccess));
}

#[test]
fn test_determinism_across_runs() {
    let mut registry = Registry::new();
    let mut inputs = IndexMap::new();
    inputs.insert("tip".into(), DirectiveProperty::new("tip"));
    let tooltip = registry.add_directive(DirectiveMeta {
        type_name: "TooltipDirective".into(),
        inputs,
        ..DirectiveMeta::default()
    });

    let build = || {
        vec![element(
            "div",
            span(1, 4),
            vec![
                expr_attr("[tip]", span(5, 10), Expr::read("note", span(12, 16))),
                text_attr("#t", span(18, 20), ""),
            ],
            vec![tooltip],
            vec![interpolation(Expr::read("t", span(25, 26)), span(23, 28))],
        )]
    };
    let (first, _) = transpile(build(), &registry);
    let (second, _) = transpile(build(), &registry);

    assert_eq!(first.generated_code, second.generated_code);
    assert_eq!(first.source_mappings, second.source_mappings);
}
