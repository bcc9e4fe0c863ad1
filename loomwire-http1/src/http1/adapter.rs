//! Stitches tokenizer fragments back into whole fields.
//!
//! Every callback carries one fragment of some field. Whether that fragment
//! starts a new field or continues the previous one is decided solely by the
//! type of the previous callback: the same type means continuation, a
//! different type means a new span. Header names and values are kept as
//! spans into the head buffer until the header section ends, when the
//! materializer turns them into views in one pass.

use bytes::Bytes;
use http::{Method, StatusCode};

use super::buffer::{BackingBuffer, Span};
use super::materialize::{MaterializedHead, PendingSpans, materialize_head};
use super::tokenizer::Callbacks;
use super::types::{Callback, HeadInfo, MessageKind, MessageParts, StartToken};
use crate::error::ParseError;

/// Whether the current callback continues the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    FirstCall,
    AfterFirst,
}

#[derive(Debug)]
enum HeadRegion {
    Open(BackingBuffer),
    Frozen(MaterializedHead),
}

#[derive(Debug)]
enum BodyRegion {
    Open(BackingBuffer),
    Frozen(Bytes),
}

/// A message still being accumulated.
#[derive(Debug)]
pub struct Draft {
    start: Option<StartToken>,
    info: Option<HeadInfo>,
    head: HeadRegion,
    body: BodyRegion,
}

impl Draft {
    pub fn new() -> Self {
        Self {
            start: None,
            info: None,
            head: HeadRegion::Open(BackingBuffer::new()),
            body: BodyRegion::Open(BackingBuffer::new()),
        }
    }

    pub fn into_parts(self) -> Result<MessageParts, ParseError> {
        let start = self
            .start
            .ok_or_else(|| ParseError::Defect("message has no start line".to_string()))?;
        let head = self
            .info
            .ok_or_else(|| ParseError::Defect("message has no header section".to_string()))?;
        let HeadRegion::Frozen(materialized) = self.head else {
            return Err(ParseError::Defect("header section was never materialized".to_string()));
        };
        let body = match self.body {
            BodyRegion::Frozen(body) => body,
            BodyRegion::Open(_) => {
                return Err(ParseError::Defect("body was never finalized".to_string()));
            }
        };

        Ok(MessageParts {
            start,
            head,
            first_token: materialized.first_token,
            headers: materialized.headers,
            body,
        })
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::new()
    }
}

/// Token callback adapter: the span bookkeeping for one message.
#[derive(Debug)]
pub struct Accumulator {
    kind: MessageKind,
    last: Callback,
    state: CallState,
    first_token: Span,
    field: Span,
    value: Span,
    pending: PendingSpans,
    draft: Option<Draft>,
    complete: bool,
}

impl Accumulator {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            kind,
            last: Callback::None,
            state: CallState::FirstCall,
            first_token: Span::default(),
            field: Span::default(),
            value: Span::default(),
            pending: PendingSpans::default(),
            draft: Some(Draft::new()),
            complete: false,
        }
    }

    /// Resets every field and starts a fresh draft, dropping any previous one.
    pub fn reset(&mut self) {
        let kind = self.kind;
        let discarded = std::mem::replace(self, Self::new(kind));
        if discarded.draft.is_some() && discarded.last != Callback::None {
            tracing::debug!(
                last = %discarded.last,
                complete = discarded.complete,
                "discarding message that was never extracted"
            );
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn has_draft(&self) -> bool {
        self.draft.is_some()
    }

    pub fn last_callback(&self) -> Callback {
        self.last
    }

    /// Moves the finished draft out, leaving the slot empty.
    pub fn take_draft(&mut self) -> Option<Draft> {
        if !self.complete {
            return None;
        }
        self.draft.take()
    }

    fn violation(&self, event: Callback) -> ParseError {
        ParseError::ProtocolViolation {
            event,
            previous: self.last,
        }
    }

    /// Checks that a callback can land in the current message at all.
    fn open(&self, event: Callback) -> Result<(), ParseError> {
        if self.draft.is_none() {
            return Err(ParseError::NotInitialized);
        }
        if self.complete {
            return Err(self.violation(event));
        }
        Ok(())
    }

    fn append_head(&mut self, event: Callback, fragment: &[u8]) -> Result<usize, ParseError> {
        let previous = self.last;
        match self.draft.as_mut().map(|draft| &mut draft.head) {
            Some(HeadRegion::Open(buffer)) => Ok(buffer.append(fragment)),
            Some(HeadRegion::Frozen(_)) => Err(ParseError::ProtocolViolation { event, previous }),
            None => Err(ParseError::NotInitialized),
        }
    }

    fn transition(&mut self, event: Callback) {
        self.state = if self.last == event {
            CallState::AfterFirst
        } else {
            CallState::FirstCall
        };
    }

    fn on_first_token(
        &mut self,
        event: Callback,
        start: StartToken,
        fragment: &[u8],
    ) -> Result<(), ParseError> {
        self.open(event)?;
        if event != self.kind.first_token() {
            return Err(self.violation(event));
        }
        match self.last {
            Callback::None => {}
            last if last == event => {}
            _ => return Err(self.violation(event)),
        }

        self.transition(event);
        let offset = self.append_head(event, fragment)?;
        match self.state {
            CallState::FirstCall => {
                self.first_token = Span::new(offset, fragment.len());
                if let Some(draft) = self.draft.as_mut() {
                    draft.start = Some(start);
                }
            }
            CallState::AfterFirst => self.first_token.extend(fragment.len()),
        }

        self.last = event;
        Ok(())
    }
}

impl Callbacks for Accumulator {
    fn on_url(&mut self, method: &Method, fragment: &[u8]) -> Result<(), ParseError> {
        tracing::trace!(len = fragment.len(), "url fragment");
        self.on_first_token(Callback::Url, StartToken::Method(method.clone()), fragment)
    }

    fn on_status(&mut self, status: StatusCode, fragment: &[u8]) -> Result<(), ParseError> {
        tracing::trace!(len = fragment.len(), status = status.as_u16(), "status fragment");
        self.on_first_token(Callback::Status, StartToken::Status(status), fragment)
    }

    fn on_header_field(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        tracing::trace!(len = fragment.len(), "header field fragment");
        let event = Callback::HeaderField;
        self.open(event)?;
        match self.last {
            Callback::HeaderField => {}
            last if last == self.kind.first_token() => {}
            Callback::HeaderValue => self.pending.push(self.value),
            _ => return Err(self.violation(event)),
        }

        self.transition(event);
        let offset = self.append_head(event, fragment)?;
        match self.state {
            CallState::FirstCall => self.field = Span::new(offset, fragment.len()),
            CallState::AfterFirst => self.field.extend(fragment.len()),
        }

        self.last = event;
        Ok(())
    }

    fn on_header_value(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        tracing::trace!(len = fragment.len(), "header value fragment");
        let event = Callback::HeaderValue;
        self.open(event)?;
        match self.last {
            Callback::HeaderValue => {}
            Callback::HeaderField => self.pending.push(self.field),
            _ => return Err(self.violation(event)),
        }

        self.transition(event);
        let offset = self.append_head(event, fragment)?;
        match self.state {
            CallState::FirstCall => self.value = Span::new(offset, fragment.len()),
            CallState::AfterFirst => self.value.extend(fragment.len()),
        }

        self.last = event;
        Ok(())
    }

    fn on_headers_complete(&mut self, head: HeadInfo) -> Result<(), ParseError> {
        let event = Callback::HeadersComplete;
        self.open(event)?;
        match self.last {
            Callback::HeaderValue => {
                self.pending.push(self.value);
                if !self.pending.is_paired() {
                    return Err(ParseError::Defect(format!(
                        "{} pending header spans at headers-complete",
                        self.pending.len()
                    )));
                }
            }
            last if last == self.kind.first_token() => {}
            _ => return Err(self.violation(event)),
        }

        let draft = self.draft.as_mut().ok_or(ParseError::NotInitialized)?;
        let region = std::mem::replace(&mut draft.head, HeadRegion::Open(BackingBuffer::new()));
        let HeadRegion::Open(buffer) = region else {
            return Err(ParseError::Defect("header section materialized twice".to_string()));
        };
        let materialized = materialize_head(&buffer.freeze(), self.first_token, &self.pending)?;
        tracing::debug!(
            headers = materialized.headers.len(),
            version = ?head.version,
            keep_alive = head.keep_alive,
            "header section materialized"
        );
        draft.head = HeadRegion::Frozen(materialized);
        draft.info = Some(head);

        self.pending.clear();
        self.state = CallState::FirstCall;
        self.last = event;
        Ok(())
    }

    fn on_body(&mut self, fragment: &[u8]) -> Result<(), ParseError> {
        tracing::trace!(len = fragment.len(), "body fragment");
        let event = Callback::Body;
        self.open(event)?;
        if !matches!(self.last, Callback::HeadersComplete | Callback::Body) {
            return Err(self.violation(event));
        }

        self.transition(event);
        let draft = self.draft.as_mut().ok_or(ParseError::NotInitialized)?;
        match &mut draft.body {
            BodyRegion::Open(buffer) => {
                buffer.append(fragment);
            }
            BodyRegion::Frozen(_) => {
                return Err(ParseError::Defect("body appended after it was finalized".to_string()));
            }
        }

        self.last = event;
        Ok(())
    }

    fn on_message_complete(&mut self) -> Result<(), ParseError> {
        let event = Callback::MessageComplete;
        self.open(event)?;
        if !matches!(self.last, Callback::HeadersComplete | Callback::Body) {
            return Err(self.violation(event));
        }

        let draft = self.draft.as_mut().ok_or(ParseError::NotInitialized)?;
        let region = std::mem::replace(&mut draft.body, BodyRegion::Frozen(Bytes::new()));
        if let BodyRegion::Open(buffer) = region {
            draft.body = BodyRegion::Frozen(buffer.freeze().into_bytes());
        }
        if let BodyRegion::Frozen(body) = &draft.body {
            tracing::debug!(body = body.len(), "message complete");
        }

        self.pending.clear();
        self.complete = true;
        self.state = CallState::FirstCall;
        self.last = event;
        Ok(())
    }
}
