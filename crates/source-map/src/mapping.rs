//! Mapping records between source templates and generated type-check code.

use crate::{ByteOffset, Span};
use bitflags::bitflags;
use text_size::TextSize;

bitflags! {
    /// Capabilities of a single source mapping.
    ///
    /// A mapping may participate in some editor features but not others; a
    /// mapping without `DIAGNOSTICS` still supports navigation, but must be
    /// skipped when projecting type-check diagnostics back onto the template.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct MappingFlags: u8 {
        /// Usable for type queries (hover, go-to-type-definition).
        const TYPES = 1 << 0;
        /// Usable for navigation and semantic highlighting.
        const SEMANTIC = 1 << 1;
        /// Usable when projecting type-check diagnostics back to the source.
        const DIAGNOSTICS = 1 << 2;
        /// Usable for reverse type queries, i.e. finding the generated
        /// inference site for a source position.
        const REVERSE_TYPES = 1 << 3;
    }
}

impl MappingFlags {
    /// Flags for a mapping that participates in every feature.
    pub fn full() -> Self {
        Self::TYPES | Self::SEMANTIC | Self::DIAGNOSTICS
    }

    /// Whether diagnostics projected through this mapping must be dropped.
    #[inline]
    pub fn ignores_diagnostics(self) -> bool {
        !self.contains(Self::DIAGNOSTICS)
    }
}

/// One `(source span) ↔ (generated span)` correspondence record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceMapping {
    /// The span in the original source file.
    pub source: Span,
    /// The span in the generated output.
    pub generated: Span,
    /// Which features this mapping participates in.
    pub flags: MappingFlags,
}

impl SourceMapping {
    /// Creates a new mapping record.
    pub fn new(source: Span, generated: Span, flags: MappingFlags) -> Self {
        Self {
            source,
            generated,
            flags,
        }
    }

    /// Returns this mapping with both sides shifted into an outer coordinate
    /// space.
    pub fn offset_by(self, generated_offset: u32, source_offset: u32) -> Self {
        Self {
            source: self.source.shift(source_offset),
            generated: self.generated.shift(generated_offset),
            flags: self.flags,
        }
    }

    /// The ordering key: `(source start, source length)`.
    #[inline]
    pub fn sort_key(&self) -> (ByteOffset, u32) {
        (self.source.start, self.source.len())
    }
}

impl PartialOrd for SourceMapping {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceMapping {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A queryable set of mappings for one source file, sorted by
/// `(source offset, source length)`.
///
/// Lookups take a filter over a mapping's capability flags so that callers
/// can restrict a projection to mappings usable for the feature at hand,
/// e.g. excluding non-`DIAGNOSTICS` mappings when projecting type errors.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    mappings: Vec<SourceMapping>,
}

impl SourceMap {
    /// Creates a source map from a list of mappings, sorting them into the
    /// canonical order.
    pub fn new(mut mappings: Vec<SourceMapping>) -> Self {
        mappings.sort();
        Self { mappings }
    }

    /// Returns the number of mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Returns true if there are no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Returns the mappings in canonical order.
    pub fn mappings(&self) -> &[SourceMapping] {
        &self.mappings
    }

    /// Finds the source offset corresponding to a generated offset, among
    /// mappings accepted by `filter`.
    pub fn source_offset_for(
        &self,
        generated: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<ByteOffset> {
        let mapping = self.mapping_for_generated(generated, filter)?;
        let delta = u32::from(generated - mapping.generated.start);
        // Clamp into the source span; generated text may be longer than the
        // source region it was derived from.
        let delta = delta.min(mapping.source.len());
        Some(mapping.source.start + TextSize::from(delta))
    }

    /// Finds the generated offset corresponding to a source offset, among
    /// mappings accepted by `filter`.
    pub fn generated_offset_for(
        &self,
        source: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<ByteOffset> {
        let mapping = self.mapping_for_source(source, filter)?;
        let delta = u32::from(source - mapping.source.start);
        let delta = delta.min(mapping.generated.len());
        Some(mapping.generated.start + TextSize::from(delta))
    }

    /// Finds the innermost mapping whose generated span contains `generated`.
    pub fn mapping_for_generated(
        &self,
        generated: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<&SourceMapping> {
        // Mappings are sorted by source position, so the generated side is
        // searched linearly; the innermost (shortest) match wins.
        self.mappings
            .iter()
            .filter(|m| m.generated.contains(generated) && filter(m.flags))
            .min_by_key(|m| m.generated.len())
    }

    /// Finds the innermost mapping whose source span contains `source`.
    pub fn mapping_for_source(
        &self,
        source: ByteOffset,
        filter: impl Fn(MappingFlags) -> bool,
    ) -> Option<&SourceMapping> {
        self.mappings
            .iter()
            .filter(|m| m.source.contains(source) && filter(m.flags))
            .min_by_key(|m| m.source.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping(source: (u32, u32), generated: (u32, u32), flags: MappingFlags) -> SourceMapping {
        SourceMapping::new(
            Span::new(source.0, source.1),
            Span::new(generated.0, generated.1),
            flags,
        )
    }

    #[test]
    fn test_sorted_by_source_key() {
        let map = SourceMap::new(vec![
            mapping((20, 25), (0, 5), MappingFlags::full()),
            mapping((0, 5), (10, 15), MappingFlags::full()),
        ]);
        assert_eq!(map.mappings()[0].source.start, ByteOffset::from(0));
        assert_eq!(map.mappings()[1].source.start, ByteOffset::from(20));
    }

    #[test]
    fn test_bidirectional_lookup() {
        let map = SourceMap::new(vec![mapping((10, 15), (100, 105), MappingFlags::full())]);
        assert_eq!(
            map.source_offset_for(ByteOffset::from(102), |_| true),
            Some(ByteOffset::from(12))
        );
        assert_eq!(
            map.generated_offset_for(ByteOffset::from(12), |_| true),
            Some(ByteOffset::from(102))
        );
        assert_eq!(map.source_offset_for(ByteOffset::from(99), |_| true), None);
    }

    #[test]
    fn test_filter_excludes_non_diagnostic_mappings() {
        let map = SourceMap::new(vec![mapping(
            (10, 15),
            (100, 105),
            MappingFlags::TYPES | MappingFlags::SEMANTIC,
        )]);
        let diagnostics = |flags: MappingFlags| flags.contains(MappingFlags::DIAGNOSTICS);
        assert_eq!(map.source_offset_for(ByteOffset::from(102), diagnostics), None);
        assert_eq!(
            map.source_offset_for(ByteOffset::from(102), |_| true),
            Some(ByteOffset::from(12))
        );
    }

    #[test]
    fn test_innermost_mapping_wins() {
        let map = SourceMap::new(vec![
            mapping((0, 50), (0, 50), MappingFlags::full()),
            mapping((10, 15), (10, 15), MappingFlags::full()),
        ]);
        let hit = map
            .mapping_for_generated(ByteOffset::from(12), |_| true)
            .unwrap();
        assert_eq!(hit.source, Span::new(10u32, 15u32));
    }

    #[test]
    fn test_lookup_clamps_into_shorter_source_span() {
        // Generated text longer than the source region it came from.
        let map = SourceMap::new(vec![mapping((10, 12), (100, 110), MappingFlags::full())]);
        assert_eq!(
            map.source_offset_for(ByteOffset::from(108), |_| true),
            Some(ByteOffset::from(12))
        );
    }
}
