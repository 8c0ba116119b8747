//! Cell selection criteria.
//!
//! Every criterion is optional and an absent criterion always matches; the
//! present ones are combined with logical AND.

use regex::Regex;

use notebox_shared::{CellType, OutputType, Result};

use crate::cell::Cell;

/// A conjunction of cell predicates.
///
/// ```
/// use notebox_core::CellFilter;
/// use notebox_shared::CellType;
///
/// let setup = CellFilter::new()
///     .tags(["setup"])
///     .cell_type(CellType::Code)
///     .not_tags(["skip"]);
/// assert!(!setup.is_unconstrained());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CellFilter {
    tags: Option<Vec<String>>,
    not_tags: Option<Vec<String>>,
    cell_types: Option<Vec<CellType>>,
    source: Option<String>,
    source_match: Option<Regex>,
    output_types: Option<Vec<OutputType>>,
    empty: Option<bool>,
}

impl CellFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cells carrying any of `tags`. An empty list matches nothing.
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .get_or_insert_with(Vec::new)
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Cells carrying none of `tags`.
    pub fn not_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_tags
            .get_or_insert_with(Vec::new)
            .extend(tags.into_iter().map(Into::into));
        self
    }

    /// Cells of this type (cumulative with other calls).
    pub fn cell_type(mut self, cell_type: CellType) -> Self {
        self.cell_types.get_or_insert_with(Vec::new).push(cell_type);
        self
    }

    pub fn cell_types(mut self, types: impl IntoIterator<Item = CellType>) -> Self {
        self.cell_types.get_or_insert_with(Vec::new).extend(types);
        self
    }

    /// Cells whose source equals `source` exactly.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Cells whose source matches `pattern` at its start.
    pub fn source_match(mut self, pattern: &str) -> Result<Self> {
        self.source_match = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Code cells with at least one output of `output_type` (cumulative).
    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_types.get_or_insert_with(Vec::new).push(output_type);
        self
    }

    pub fn output_types(mut self, types: impl IntoIterator<Item = OutputType>) -> Self {
        self.output_types.get_or_insert_with(Vec::new).extend(types);
        self
    }

    /// Cells whose source is (or is not) empty.
    pub fn empty(mut self, empty: bool) -> Self {
        self.empty = Some(empty);
        self
    }

    /// Whether no criterion is set, i.e. every cell matches.
    pub fn is_unconstrained(&self) -> bool {
        self.tags.is_none()
            && self.not_tags.is_none()
            && self.cell_types.is_none()
            && self.source.is_none()
            && self.source_match.is_none()
            && self.output_types.is_none()
            && self.empty.is_none()
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        self.tags.as_deref().is_none_or(|tags| cell.has_any_tag(tags))
            && self
                .not_tags
                .as_deref()
                .is_none_or(|tags| !cell.has_any_tag(tags))
            && self
                .cell_types
                .as_deref()
                .is_none_or(|types| cell.is_type(types))
            && self.source.as_deref().is_none_or(|s| cell.is_source(s))
            && self
                .source_match
                .as_ref()
                .is_none_or(|re| cell.matches_source(re))
            && self
                .output_types
                .as_deref()
                .is_none_or(|types| cell.has_output_type(types))
            && self.empty.is_none_or(|empty| cell.is_empty() == empty)
    }
}

#[cfg(test)]
mod tests {
    use notebox_shared::Output;

    use super::*;

    fn cells() -> Vec<Cell> {
        vec![
            Cell::code("import os").with_tags(["setup"]),
            Cell::code("x = compute()").with_tags(["setup", "slow"]),
            Cell::markdown("# Results").with_tags(["report"]),
            Cell::code("")
                .with_outputs(vec![Output::error("ValueError", "bad", vec![])])
                .unwrap(),
            Cell::raw("raw text"),
        ]
    }

    fn matching(filter: &CellFilter) -> Vec<usize> {
        cells()
            .iter()
            .enumerate()
            .filter(|(_, c)| filter.matches(c))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn unconstrained_matches_everything() {
        let filter = CellFilter::new();
        assert!(filter.is_unconstrained());
        assert_eq!(matching(&filter), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn tags_intersect_and_exclude() {
        assert_eq!(matching(&CellFilter::new().tags(["setup"])), vec![0, 1]);
        assert_eq!(
            matching(&CellFilter::new().tags(["setup"]).not_tags(["slow"])),
            vec![0]
        );
        assert_eq!(matching(&CellFilter::new().not_tags(["setup"])), vec![2, 3, 4]);
        assert_eq!(
            matching(&CellFilter::new().tags(Vec::<String>::new())),
            Vec::<usize>::new()
        );
    }

    #[test]
    fn type_source_and_output_criteria() {
        assert_eq!(
            matching(&CellFilter::new().cell_types([CellType::Markdown, CellType::Raw])),
            vec![2, 4]
        );
        assert_eq!(matching(&CellFilter::new().source("raw text")), vec![4]);
        assert_eq!(
            matching(&CellFilter::new().source_match(r"x\s*=").unwrap()),
            vec![1]
        );
        assert_eq!(
            matching(&CellFilter::new().output_type(OutputType::Error)),
            vec![3]
        );
        assert_eq!(matching(&CellFilter::new().empty(true)), vec![3]);
        assert_eq!(matching(&CellFilter::new().empty(false)).len(), 4);
    }

    #[test]
    fn source_match_is_anchored_at_start() {
        let filter = CellFilter::new().source_match("os").unwrap();
        assert!(matching(&filter).is_empty());
    }

    #[test]
    fn bad_pattern_is_reported() {
        assert!(CellFilter::new().source_match("(unclosed").is_err());
    }
}
