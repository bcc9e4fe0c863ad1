use std::marker::PhantomData;

use super::adapter::Accumulator;
use super::tokenizer::Tokenizer;
use super::types::{HttpMessage, Limits, Request, Response};
use crate::config::ParserConfig;
use crate::error::ParseError;

pub type RequestParser = ParseSession<Request>;
pub type ResponseParser = ParseSession<Response>;

/// One connection's parser, reused for each message on it.
///
/// A session accepts exactly one message between calls to [`init`]. Feed it
/// chunks with [`parse`] (or [`feed`]) until [`complete`] reports true, then
/// move the message out with [`result`].
///
/// [`init`]: ParseSession::init
/// [`parse`]: ParseSession::parse
/// [`feed`]: ParseSession::feed
/// [`complete`]: ParseSession::complete
/// [`result`]: ParseSession::result
#[derive(Debug)]
pub struct ParseSession<M: HttpMessage> {
    tokenizer: Tokenizer,
    adapter: Accumulator,
    error: Option<ParseError>,
    _message: PhantomData<fn() -> M>,
}

impl<M: HttpMessage> ParseSession<M> {
    /// Creates a session that is already initialized for its first message.
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_config(config: &ParserConfig) -> Self {
        Self::with_limits(config.limits)
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            tokenizer: Tokenizer::new(M::KIND, limits),
            adapter: Accumulator::new(M::KIND),
            error: None,
            _message: PhantomData,
        }
    }

    /// Prepares the session for a new message.
    ///
    /// A message that was never extracted is discarded.
    pub fn init(&mut self) {
        self.tokenizer.reset();
        self.adapter.reset();
        self.error = None;
    }

    /// Feeds one chunk; true iff the whole chunk was consumed without error.
    ///
    /// After a `false` return the current message is lost; call
    /// [`init`](Self::init) before feeding the next one.
    pub fn parse(&mut self, chunk: &[u8]) -> bool {
        matches!(self.feed(chunk), Ok(consumed) if consumed == chunk.len())
    }

    /// Feeds one chunk and returns how many bytes belong to the current
    /// message.
    ///
    /// Consumption stops once the message is complete; the rest of the chunk
    /// is the start of the next message on the connection. An empty chunk
    /// signals end of stream, which completes a close-delimited body.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<usize, ParseError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if !self.adapter.has_draft() {
            return Err(self.fail(ParseError::NotInitialized));
        }
        if chunk.is_empty() {
            self.flush_eof();
            return match &self.error {
                Some(err) => Err(err.clone()),
                None => Ok(0),
            };
        }

        self.tokenizer
            .execute(chunk, &mut self.adapter)
            .map_err(|err| self.fail(err))
    }

    pub fn complete(&self) -> bool {
        self.adapter.is_complete()
    }

    pub fn error(&self) -> Option<&ParseError> {
        self.error.as_ref()
    }

    /// Signals end of stream, then moves the finished message out.
    ///
    /// Returns `None` while the message is incomplete, leaving it in place,
    /// and after it has already been taken.
    pub fn result(&mut self) -> Option<M> {
        if self.error.is_none() && self.adapter.has_draft() {
            self.flush_eof();
        }

        let draft = self.adapter.take_draft()?;
        match draft.into_parts().and_then(M::from_parts) {
            Ok(message) => Some(message),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Hands end of stream to the tokenizer. A message cut short is left in
    /// place since more bytes may still arrive.
    fn flush_eof(&mut self) {
        match self.tokenizer.execute(&[], &mut self.adapter) {
            Ok(_) => {}
            Err(ParseError::Syntax(err)) => {
                tracing::debug!(error = %err, "message incomplete at end of stream");
            }
            Err(err) => {
                self.fail(err);
            }
        }
    }

    fn fail(&mut self, err: ParseError) -> ParseError {
        let last = self.adapter.last_callback();
        if err.is_defect() || err.is_protocol_violation() {
            tracing::warn!(error = %err, %last, "http message rejected");
        } else {
            tracing::debug!(error = %err, %last, "http message rejected");
        }
        self.error = Some(err.clone());
        err
    }
}

impl<M: HttpMessage> Default for ParseSession<M> {
    fn default() -> Self {
        Self::new()
    }
}
