//! Tests for the synthesized component file: mapping re-basing, coverage,
//! the bidirectional query surface and the shared environment.

use indexmap::IndexMap;
use source_map::{ByteOffset, MappingFlags, Span};
use template_ast::{
    build_template_ast, BoundTarget, DirectiveMeta, DirectiveProperty, Expr, RawAttrValue,
    RawAttribute, RawElement, RawInterpolation, RawNode, Registry, TemplateAst,
};
use template_tcb::{
    transpile_component_file, ComponentFileInput, SourceId, TemplateOrigin, TemplateUnit,
    TypeCheckConfig,
};

fn span(start: u32, end: u32) -> Span {
    Span::new(start, end)
}

/// `<h1>{{title}}</h1>` with template-relative spans.
fn heading_template() -> TemplateAst {
    build_template_ast(vec![RawNode::Element(RawElement {
        tag_name: "h1".into(),
        is_template_tag: false,
        attributes: vec![],
        directives: vec![],
        template_directives: vec![],
        children: vec![RawNode::Interpolation(RawInterpolation {
            expression: Some(Expr::read("title", span(6, 11))),
            span: span(4, 13),
        })],
        start_span: span(1, 3),
    })])
}

/// `<div [tip]="note"></div>` with template-relative spans.
fn tooltip_template(registry: &mut Registry) -> TemplateAst {
    let mut inputs = IndexMap::new();
    inputs.insert("tip".into(), DirectiveProperty::new("tip"));
    let tooltip = registry.add_directive(DirectiveMeta {
        type_name: "TooltipDirective".into(),
        inputs,
        ..DirectiveMeta::default()
    });
    build_template_ast(vec![RawNode::Element(RawElement {
        tag_name: "div".into(),
        is_template_tag: false,
        attributes: vec![RawAttribute {
            name: "[tip]".into(),
            key_span: span(5, 10),
            value: Some(RawAttrValue::Expr(Expr::read("note", span(12, 16)))),
            value_span: Some(span(12, 16)),
            source_span: span(5, 17),
        }],
        directives: vec![tooltip],
        template_directives: vec![],
        children: vec![],
        start_span: span(1, 4),
    })])
}

const TEMPLATE_TEXT: &str = "<h1>{{title}}</h1>";

#[test]
fn test_inline_template_coverage_is_exact() {
    let registry = Registry::new();
    let ast = heading_template();
    let bound = BoundTarget::new(&ast, &registry);

    let prefix = "class Card { title = \"\"; } // ";
    let component_source = format!("{prefix}{TEMPLATE_TEXT}");
    let start = prefix.len() as u32;
    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: &component_source,
            component_type_name: "Card",
            templates: vec![TemplateUnit {
                bound: &bound,
                origin: TemplateOrigin::Inline {
                    start,
                    len: TEMPLATE_TEXT.len() as u32,
                },
            }],
        },
    )
    .unwrap();

    // The generated file embeds the component source, then the block.
    assert!(result.generated_code.starts_with(component_source.as_str()));
    assert!(result.generated_code.contains("function _tcb_1(this: Card) {"));

    // Union of the component file's mapped source ranges covers the whole
    // file, with no gaps.
    let mappings = result.mappings_for(SourceId(0)).unwrap();
    let mut spans: Vec<Span> = mappings
        .source_map
        .mappings()
        .iter()
        .map(|m| m.source)
        .collect();
    spans.sort_by_key(|s| (s.start, s.end));
    let mut cursor = 0u32;
    for s in &spans {
        assert!(u32::from(s.start) <= cursor, "gap before {:?}", s);
        cursor = cursor.max(u32::from(s.end));
    }
    assert_eq!(cursor, component_source.len() as u32);
}

#[test]
fn test_inline_mapping_round_trip() {
    let registry = Registry::new();
    let ast = heading_template();
    let bound = BoundTarget::new(&ast, &registry);

    let prefix = "class Card { title = \"\"; } // ";
    let component_source = format!("{prefix}{TEMPLATE_TEXT}");
    let start = prefix.len() as u32;
    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: &component_source,
            component_type_name: "Card",
            templates: vec![TemplateUnit {
                bound: &bound,
                origin: TemplateOrigin::Inline {
                    start,
                    len: TEMPLATE_TEXT.len() as u32,
                },
            }],
        },
    )
    .unwrap();

    let types = |flags: MappingFlags| flags.contains(MappingFlags::TYPES);
    // `title` sits at template offset 6, so file offset start + 6; every
    // offset inside it round-trips through the generated code.
    for delta in 0..5u32 {
        let source = ByteOffset::from(start + 6 + delta);
        let generated = result
            .generated_offset_for(SourceId(0), source, types)
            .expect("generated offset");
        assert_eq!(
            result.source_offset_for(SourceId(0), generated, types),
            Some(source)
        );
    }
}

#[test]
fn test_external_template_keeps_own_coordinates() {
    let registry = Registry::new();
    let ast = heading_template();
    let bound = BoundTarget::new(&ast, &registry);

    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: "class Card { title = \"\"; }",
            component_type_name: "Card",
            templates: vec![TemplateUnit {
                bound: &bound,
                origin: TemplateOrigin::External { file: SourceId(7) },
            }],
        },
    )
    .unwrap();

    let types = |flags: MappingFlags| flags.contains(MappingFlags::TYPES);
    let generated = result
        .generated_offset_for(SourceId(7), ByteOffset::from(6), types)
        .expect("generated offset");
    // Back-projection lands in the template file's own coordinates.
    assert_eq!(
        result.source_position_for(generated, types),
        Some((SourceId(7), ByteOffset::from(6)))
    );
}

#[test]
fn test_environment_shared_across_templates() {
    let mut registry = Registry::new();
    let first_ast = tooltip_template(&mut registry);
    // The second template reuses the registry and its directive.
    let second_ast = build_template_ast(vec![RawNode::Element(RawElement {
        tag_name: "span".into(),
        is_template_tag: false,
        attributes: vec![RawAttribute {
            name: "[tip]".into(),
            key_span: span(6, 11),
            value: Some(RawAttrValue::Expr(Expr::read("hint", span(13, 17)))),
            value_span: Some(span(13, 17)),
            source_span: span(6, 18),
        }],
        directives: vec![template_ast::DirectiveId(0)],
        template_directives: vec![],
        children: vec![],
        start_span: span(1, 5),
    })]);
    let first = BoundTarget::new(&first_ast, &registry);
    let second = BoundTarget::new(&second_ast, &registry);

    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: "class Card { note = \"\"; hint = \"\"; }",
            component_type_name: "Card",
            templates: vec![
                TemplateUnit {
                    bound: &first,
                    origin: TemplateOrigin::External { file: SourceId(1) },
                },
                TemplateUnit {
                    bound: &second,
                    origin: TemplateOrigin::External { file: SourceId(2) },
                },
            ],
        },
    )
    .unwrap();
    let code = &result.generated_code;

    // One shared declaration, one invocation per template.
    assert_eq!(code.matches("declare const _ctor1:").count(), 1);
    assert!(!code.contains("_ctor2"));
    assert_eq!(code.matches("_ctor1({").count(), 2);
    assert!(code.contains("function _tcb_1(this: Card)"));
    assert!(code.contains("function _tcb_2(this: Card)"));
}

#[test]
fn test_diagnostics_filter_excludes_inference_mappings() {
    let mut registry = Registry::new();
    let ast = tooltip_template(&mut registry);
    let bound = BoundTarget::new(&ast, &registry);

    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: "class Card { note = \"\"; }",
            component_type_name: "Card",
            templates: vec![TemplateUnit {
                bound: &bound,
                origin: TemplateOrigin::External { file: SourceId(1) },
            }],
        },
    )
    .unwrap();
    let code = &result.generated_code;

    // Inside the type-constructor call the expression maps for reverse
    // type queries only, never diagnostics.
    let ctor_call = code.find("_ctor1({\"tip\": this.note})").expect("ctor call");
    let inside_ctor = ByteOffset::from((ctor_call + "_ctor1({\"tip\": ".len()) as u32);
    let diagnostics = |flags: MappingFlags| flags.contains(MappingFlags::DIAGNOSTICS);
    assert_eq!(
        result.source_offset_for(SourceId(1), inside_ctor, diagnostics),
        None
    );
    assert!(result
        .source_offset_for(SourceId(1), inside_ctor, |_| true)
        .is_some());

    // The assignment-shaped check carries the diagnostics mapping.
    let assignment = code.find(".tip = this.note;").expect("assignment");
    let value_offset = ByteOffset::from((assignment + ".tip = ".len()) as u32);
    assert_eq!(
        result.source_offset_for(SourceId(1), value_offset, diagnostics),
        Some(ByteOffset::from(12))
    );
}

#[test]
fn test_no_templates_yields_no_artifact() {
    let result = transpile_component_file(
        TypeCheckConfig::default(),
        &ComponentFileInput {
            component_file: SourceId(0),
            component_source: "class Card {}",
            component_type_name: "Card",
            templates: vec![],
        },
    );
    assert!(result.is_err());
}

#[test]
fn test_component_file_output_is_deterministic() {
    let build = || {
        let mut registry = Registry::new();
        let ast = tooltip_template(&mut registry);
        (registry, ast)
    };
    let (first_registry, first_ast) = build();
    let (second_registry, second_ast) = build();
    let first_bound = BoundTarget::new(&first_ast, &first_registry);
    let second_bound = BoundTarget::new(&second_ast, &second_registry);

    let run = |bound: &BoundTarget<'_>| {
        transpile_component_file(
            TypeCheckConfig::default(),
            &ComponentFileInput {
                component_file: SourceId(0),
                component_source: "class Card { note = \"\"; }",
                component_type_name: "Card",
                templates: vec![TemplateUnit {
                    bound,
                    origin: TemplateOrigin::External { file: SourceId(1) },
                }],
            },
        )
        .unwrap()
    };
    let first = run(&first_bound);
    let second = run(&second_bound);

    assert_eq!(first.generated_code, second.generated_code);
    let first_mappings = first.mappings_for(SourceId(1)).unwrap();
    let second_mappings = second.mappings_for(SourceId(1)).unwrap();
    assert_eq!(
        first_mappings.source_map.mappings(),
        second_mappings.source_map.mappings()
    );
}
