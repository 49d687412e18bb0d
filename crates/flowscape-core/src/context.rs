//! Per-case logging context

use crate::case::Case;
use tracing::{info_span, Span};

/// Span and label of one case, passed to every stage of its pipeline
#[derive(Debug, Clone)]
pub struct CaseContext {
    span: Span,
    label: String,
}

impl CaseContext {
    /// Context whose span carries the case's city group, type, region and
    /// encoded parameters
    #[must_use]
    pub fn for_case(case: &Case) -> Self {
        let params = case.parameters();
        let region = case.region_label();
        let span = info_span!(
            "case",
            city_group = %params.city_group,
            case_type = %case.case_type(),
            region = %region,
            params = %params.encode(),
        );
        Self {
            span,
            label: case.label(),
        }
    }

    /// Context for work outside any case
    #[must_use]
    pub fn detached(label: impl Into<String>) -> Self {
        Self {
            span: Span::current(),
            label: label.into(),
        }
    }

    #[inline]
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}
