//! Assembly of one component's templates into a single synthesized file.
//!
//! All templates of a component share one [`Environment`], so a directive
//! used by several templates gets a single type-constructor declaration.
//! Every template's mappings are re-based into the final blob: generated
//! offsets shift by the template block's position, and inline templates
//! additionally shift source offsets by the template's start inside the
//! component file.

use crate::emit::NameMapping;
use crate::env::{Environment, TypeCheckConfig};
use crate::oob::Diagnostic;
use crate::tcb::{transpile_template, TranspiledTemplate};
use indexmap::IndexMap;
use smol_str::SmolStr;
use source_map::{ByteOffset, MappingFlags, SourceMap, SourceMapping, Span};
use template_ast::BoundTarget;
use thiserror::Error;

/// Identifies one source unit (the component file or an external template
/// file) contributing to a synthesized file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub u32);

/// Where a template's markup lives.
#[derive(Debug, Clone, Copy)]
pub enum TemplateOrigin {
    /// Inside the component file, starting at `start` with `len` bytes.
    Inline { start: u32, len: u32 },
    /// In its own file; mappings stay in that file's coordinates.
    External { file: SourceId },
}

/// One template to include in the synthesized file.
pub struct TemplateUnit<'a> {
    pub bound: &'a BoundTarget<'a>,
    pub origin: TemplateOrigin,
}

/// Everything needed to synthesize a component's check file.
pub struct ComponentFileInput<'a> {
    pub component_file: SourceId,
    pub component_source: &'a str,
    pub component_type_name: &'a str,
    pub templates: Vec<TemplateUnit<'a>>,
}

/// The error for a request that cannot produce an artifact at all.
/// Anything less than this degrades to omissions and collected
/// diagnostics instead.
#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("no templates were supplied for component `{component}`")]
    NoTemplate { component: String },
}

/// Mappings, diagnostics and renames for one contributing source file.
#[derive(Debug, Default)]
pub struct FileMappings {
    pub source_map: SourceMap,
    pub diagnostics: Vec<Diagnostic>,
    /// Source offset → (generated name → template name), ordered by
    /// offset.
    pub name_maps: IndexMap<u32, IndexMap<SmolStr, SmolStr>>,
}

/// The merged artifact for one component file.
#[derive(Debug)]
pub struct TranspiledComponentFile {
    pub generated_code: String,
    pub file_mappings: IndexMap<SourceId, FileMappings>,
}

impl TranspiledComponentFile {
    pub fn mappings_for(&self, file: SourceId) -> Option<&FileMappings> {
        self.file_mappings.get(&file)
    }

    /// Projects a generated offset back to a source offset in `file`,
    /// among mappings accepted by `filter`.
    pub fn source_offset_for(
        &self,
        file: SourceId,
        generated: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<ByteOffset> {
        self.file_mappings
            .get(&file)?
            .source_map
            .source_offset_for(generated, filter)
    }

    /// Projects a source offset in `file` to a generated offset.
    pub fn generated_offset_for(
        &self,
        file: SourceId,
        source: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<ByteOffset> {
        self.file_mappings
            .get(&file)?
            .source_map
            .generated_offset_for(source, filter)
    }

    /// Finds the source file and offset a generated offset projects to.
    pub fn source_position_for(
        &self,
        generated: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool + Copy,
    ) -> Option<(SourceId, ByteOffset)> {
        self.file_mappings.iter().find_map(|(file, mappings)| {
            mappings
                .source_map
                .source_offset_for(generated, filter)
                .map(|offset| (*file, offset))
        })
    }
}

/// Synthesizes the check file for one component: the component's own
/// source, the shared environment declarations, then one type-check block
/// per template.
pub fn transpile_component_file(
    config: TypeCheckConfig,
    input: &ComponentFileInput<'_>,
) -> Result<TranspiledComponentFile, TranspileError> {
    if input.templates.is_empty() {
        return Err(TranspileError::NoTemplate {
            component: input.component_type_name.to_string(),
        });
    }

    let mut env = Environment::new(config);
    let transpiled: Vec<TranspiledTemplate> = input
        .templates
        .iter()
        .enumerate()
        .map(|(index, unit)| {
            transpile_template(
                &mut env,
                unit.bound,
                input.component_type_name,
                index as u32 + 1,
            )
        })
        .collect();
    tracing::debug!(
        templates = transpiled.len(),
        component = input.component_type_name,
        "assembling transpiled component file"
    );

    let mut generated = String::from(input.component_source);
    let mut collected: IndexMap<SourceId, CollectedFile> = IndexMap::new();
    collected.insert(input.component_file, CollectedFile::default());

    // The component's own text maps onto itself, split around the inline
    // template ranges so the whole file ends up covered.
    let mut inline_ranges: Vec<Span> = input
        .templates
        .iter()
        .filter_map(|unit| match unit.origin {
            TemplateOrigin::Inline { start, len } => Some(Span::at(start, len)),
            TemplateOrigin::External { .. } => None,
        })
        .collect();
    inline_ranges.sort_by_key(|span| span.start);
    let component_len = input.component_source.len() as u32;
    let component_data = collected.get_mut(&input.component_file).unwrap();
    let mut cursor = 0u32;
    for range in &inline_ranges {
        let start = u32::from(range.start);
        if start > cursor {
            component_data
                .mappings
                .push(identity_mapping(cursor, start - cursor));
        }
        cursor = u32::from(range.end);
    }
    if component_len > cursor {
        component_data
            .mappings
            .push(identity_mapping(cursor, component_len - cursor));
    }

    // Environment declarations come before the blocks that call them.
    generated.push('\n');
    let registry = input.templates[0].bound.registry();
    for statement in env
        .directive_statements(registry)
        .iter()
        .chain(env.pipe_statements(registry).iter())
    {
        generated.push_str(statement.expression().code());
        generated.push('\n');
    }

    for (unit, template) in input.templates.iter().zip(&transpiled) {
        let base = generated.len() as u32;
        generated.push_str(&template.generated_code);
        let block_len = template.generated_code.len() as u32;

        let (file, source_shift) = match unit.origin {
            TemplateOrigin::Inline { start, .. } => (input.component_file, start),
            TemplateOrigin::External { file } => (file, 0),
        };
        let data = collected.entry(file).or_default();
        for mapping in &template.source_mappings {
            data.mappings.push(mapping.offset_by(base, source_shift));
        }
        // A whole-template fallback mapping, so every template byte lands
        // somewhere in its block even between fine-grained mappings.
        if let TemplateOrigin::Inline { start, len } = unit.origin {
            data.mappings.push(SourceMapping::new(
                Span::at(start, len),
                Span::at(base, block_len),
                MappingFlags::SEMANTIC,
            ));
        }
        for diagnostic in &template.diagnostics {
            data.diagnostics.push(diagnostic.clone().shifted(source_shift));
        }
        for name_mapping in &template.name_mappings {
            data.name_mappings.push(NameMapping {
                source_offset: name_mapping.source_offset + source_shift,
                generated_name: name_mapping.generated_name.clone(),
                source_name: name_mapping.source_name.clone(),
            });
        }
    }

    let file_mappings: IndexMap<SourceId, FileMappings> = collected
        .into_iter()
        .map(|(file, data)| (file, data.into_file_mappings()))
        .collect();

    let result = TranspiledComponentFile {
        generated_code: generated,
        file_mappings,
    };
    #[cfg(debug_assertions)]
    verify_mappings(&result, input);
    Ok(result)
}

#[derive(Default)]
struct CollectedFile {
    mappings: Vec<SourceMapping>,
    diagnostics: Vec<Diagnostic>,
    name_mappings: Vec<NameMapping>,
}

impl CollectedFile {
    fn into_file_mappings(self) -> FileMappings {
        let mut name_maps: IndexMap<u32, IndexMap<SmolStr, SmolStr>> = IndexMap::new();
        let mut sorted = self.name_mappings;
        sorted.sort_by_key(|m| m.source_offset);
        for mapping in sorted {
            name_maps
                .entry(mapping.source_offset)
                .or_default()
                .insert(mapping.generated_name, mapping.source_name);
        }
        FileMappings {
            source_map: SourceMap::new(self.mappings),
            diagnostics: self.diagnostics,
            name_maps,
        }
    }
}

fn identity_mapping(start: u32, len: u32) -> SourceMapping {
    let span = Span::at(start, len);
    SourceMapping::new(span, span, MappingFlags::full())
}

/// Debug-only consistency pass: a source range with type capability must
/// correspond to exactly one generated range, and the component file must
/// be covered without gaps.
#[cfg(debug_assertions)]
fn verify_mappings(result: &TranspiledComponentFile, input: &ComponentFileInput<'_>) {
    use rustc_hash::FxHashMap;

    for (file, mappings) in &result.file_mappings {
        let mut type_targets: FxHashMap<(ByteOffset, ByteOffset), Vec<Span>> = FxHashMap::default();
        for mapping in mappings.source_map.mappings() {
            if mapping.flags.contains(MappingFlags::TYPES) && !mapping.source.is_empty() {
                type_targets
                    .entry((mapping.source.start, mapping.source.end))
                    .or_default()
                    .push(mapping.generated);
            }
        }
        for ((start, end), generated) in &type_targets {
            let mut distinct = generated.clone();
            distinct.sort_by_key(|span| (span.start, span.end));
            distinct.dedup();
            assert!(
                distinct.len() == 1,
                "source range {:?}..{:?} of file {:?} maps to {} generated ranges",
                start,
                end,
                file,
                distinct.len()
            );
        }
    }

    // Coverage of the component file itself.
    if let Some(mappings) = result.file_mappings.get(&input.component_file) {
        let mut covered: Vec<Span> = mappings
            .source_map
            .mappings()
            .iter()
            .map(|m| m.source)
            .filter(|s| !s.is_empty())
            .collect();
        covered.sort_by_key(|span| (span.start, span.end));
        let mut cursor = 0u32;
        for span in &covered {
            let start = u32::from(span.start);
            assert!(
                start <= cursor,
                "component file coverage gap at {}..{}",
                cursor,
                start
            );
            cursor = cursor.max(u32::from(span.end));
        }
        assert!(
            cursor >= input.component_source.len() as u32,
            "component file coverage ends at {} of {}",
            cursor,
            input.component_source.len()
        );
    }
}
