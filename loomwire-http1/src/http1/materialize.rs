use bytes::Bytes;

use super::buffer::{FrozenBuffer, Span};
use super::types::HeaderTable;
use crate::error::ParseError;

/// Frozen (field, value) spans waiting for the header section to end.
#[derive(Debug, Default)]
pub struct PendingSpans {
    spans: Vec<Span>,
}

impl PendingSpans {
    pub fn push(&mut self, span: Span) {
        self.spans.push(span);
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Every field has claimed exactly one value.
    pub fn is_paired(&self) -> bool {
        self.spans.len() % 2 == 0
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    fn pairs(&self) -> impl Iterator<Item = (Span, Span)> + '_ {
        self.spans.chunks_exact(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Header section after its backing buffer stopped growing.
#[derive(Debug, Clone)]
pub struct MaterializedHead {
    pub first_token: Bytes,
    pub headers: HeaderTable,
}

pub fn materialize_head(
    head: &FrozenBuffer,
    first_token: Span,
    pending: &PendingSpans,
) -> Result<MaterializedHead, ParseError> {
    if !pending.is_paired() {
        return Err(ParseError::Defect(format!(
            "{} pending header spans cannot form field/value pairs",
            pending.len()
        )));
    }

    let mut headers = HeaderTable::new();
    for (field, value) in pending.pairs() {
        let name = head.view(field)?;
        let value = head.view(value)?;
        if let Some(previous) = headers.insert(name.clone(), value) {
            tracing::debug!(
                name = %String::from_utf8_lossy(&name),
                previous = %String::from_utf8_lossy(&previous),
                "repeated header replaces earlier value"
            );
        }
    }

    Ok(MaterializedHead {
        first_token: head.view(first_token)?,
        headers,
    })
}
