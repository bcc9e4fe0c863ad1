//! Incremental HTTP/1.x tokenizer.
//!
//! The tokenizer recognizes the message grammar one byte at a time and
//! reports fields through [`Callbacks`]. It does not keep message text: a
//! field that is still open when a chunk ends is reported up to the end of
//! that chunk and continued by the next one, so a single field may arrive as
//! any number of fragments, including empty ones.
//!
//! Guarantees the adapter relies on:
//! - the first-token callback (`on_url` / `on_status`) fires at least once
//!   per message, with an empty fragment when the reason phrase is missing;
//! - every header-field run is followed by at least one header-value
//!   callback, with an empty fragment for an empty value;
//! - consumption stops after `on_message_complete`, leaving any following
//!   bytes for the next message.

use http::{Method, StatusCode, Version};

use super::types::{HeadInfo, Limits, MessageKind, SyntaxError, SyntaxErrorKind};
use crate::error::ParseError;

const MAX_TOKEN_BYTES: usize = 32;
const MAX_FRAMING_NAME_BYTES: usize = 17;
const MAX_FRAMING_VALUE_BYTES: usize = 256;

/// Receiver of tokenizer events. Returning an error aborts the current chunk.
pub trait Callbacks {
    fn on_url(&mut self, method: &Method, fragment: &[u8]) -> Result<(), ParseError>;
    fn on_status(&mut self, status: StatusCode, fragment: &[u8]) -> Result<(), ParseError>;
    fn on_header_field(&mut self, fragment: &[u8]) -> Result<(), ParseError>;
    fn on_header_value(&mut self, fragment: &[u8]) -> Result<(), ParseError>;
    fn on_headers_complete(&mut self, head: HeadInfo) -> Result<(), ParseError>;
    fn on_body(&mut self, fragment: &[u8]) -> Result<(), ParseError>;
    fn on_message_complete(&mut self) -> Result<(), ParseError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Method,
    UrlStart,
    Url,
    RequestVersion,
    ResponseVersion,
    StatusCode,
    ReasonStart,
    Reason,
    LineLf,
    FieldStart,
    Field,
    ValueStart,
    Value,
    ValueLf,
    HeadersLf,
    BodyIdentity { remaining: u64 },
    BodyUntilEof,
    ChunkSize,
    ChunkExtension,
    ChunkSizeLf,
    ChunkData { remaining: u64 },
    ChunkDataCr,
    ChunkDataLf,
    TrailerStart,
    Trailer,
    TrailerEndLf,
    Done,
    Dead,
}

impl State {
    fn is_head(self) -> bool {
        matches!(
            self,
            Self::Start
                | Self::Method
                | Self::UrlStart
                | Self::Url
                | Self::RequestVersion
                | Self::ResponseVersion
                | Self::StatusCode
                | Self::ReasonStart
                | Self::Reason
                | Self::LineLf
                | Self::FieldStart
                | Self::Field
                | Self::ValueStart
                | Self::Value
                | Self::ValueLf
                | Self::HeadersLf
        )
    }

    fn carries_text(self) -> bool {
        matches!(self, Self::Url | Self::Reason | Self::Field | Self::Value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyMode {
    NoBody,
    ContentLength(u64),
    Chunked,
    CloseDelimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramingHeader {
    ContentLength,
    TransferEncoding,
    Connection,
    Other,
}

#[derive(Debug, Default)]
struct Framing {
    content_length: Option<u64>,
    chunked: bool,
    connection_close: bool,
    connection_keep_alive: bool,
}

#[derive(Debug)]
pub struct Tokenizer {
    kind: MessageKind,
    limits: Limits,
    state: State,
    consumed: usize,
    head_bytes: usize,
    body_bytes: u64,
    scratch: Vec<u8>,
    method: Option<Method>,
    status: Option<StatusCode>,
    version: Version,
    header: FramingHeader,
    header_name: Vec<u8>,
    name_overflow: bool,
    header_value: Vec<u8>,
    framing: Framing,
    chunk_size: u64,
    chunk_digits: usize,
    failed: Option<ParseError>,
}

impl Tokenizer {
    pub fn new(kind: MessageKind, limits: Limits) -> Self {
        Self {
            kind,
            limits,
            state: State::Start,
            consumed: 0,
            head_bytes: 0,
            body_bytes: 0,
            scratch: Vec::new(),
            method: None,
            status: None,
            version: Version::HTTP_11,
            header: FramingHeader::Other,
            header_name: Vec::new(),
            name_overflow: false,
            header_value: Vec::new(),
            framing: Framing::default(),
            chunk_size: 0,
            chunk_digits: 0,
            failed: None,
        }
    }

    /// Prepares for the next message, keeping kind and limits.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind, self.limits);
    }

    /// The current message has been fully tokenized.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feeds `data` and returns how many bytes were consumed.
    ///
    /// An empty `data` signals end of stream, which completes a response
    /// whose body is delimited by connection close.
    pub fn execute<C: Callbacks>(
        &mut self,
        data: &[u8],
        callbacks: &mut C,
    ) -> Result<usize, ParseError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        if data.is_empty() {
            return self.finish(callbacks).map(|()| 0);
        }

        let result = self.run(data, callbacks);
        if let Err(err) = &result {
            self.poison(err);
        }
        result
    }

    /// End of stream. An `UnexpectedEof` here leaves the tokenizer usable,
    /// since the caller may still have bytes to deliver.
    fn finish<C: Callbacks>(&mut self, callbacks: &mut C) -> Result<(), ParseError> {
        match self.state {
            State::Start | State::Done => Ok(()),
            State::BodyUntilEof => {
                self.state = State::Done;
                let result = callbacks.on_message_complete();
                if let Err(err) = &result {
                    self.poison(err);
                }
                result
            }
            _ => Err(self.error(SyntaxErrorKind::UnexpectedEof, 0)),
        }
    }

    fn poison(&mut self, err: &ParseError) {
        self.state = State::Dead;
        self.failed = Some(err.clone());
    }

    fn run<C: Callbacks>(&mut self, data: &[u8], callbacks: &mut C) -> Result<usize, ParseError> {
        let mut mark = self.state.carries_text().then_some(0);
        let mut p = 0;

        while p < data.len() {
            let byte = data[p];

            if self.state.is_head() {
                self.head_bytes += 1;
                if self.head_bytes > self.limits.max_header_bytes {
                    return Err(self.error(SyntaxErrorKind::HeaderTooLarge, p));
                }
            }

            match self.state {
                State::Start => match (byte, self.kind) {
                    (b'\r' | b'\n', _) => {}
                    (_, MessageKind::Request) => {
                        self.state = State::Method;
                        self.push_token(byte, p, SyntaxErrorKind::InvalidMethod)?;
                    }
                    (_, MessageKind::Response) => {
                        self.state = State::ResponseVersion;
                        self.push_scratch(byte, p, SyntaxErrorKind::InvalidVersion)?;
                    }
                },
                State::Method => {
                    if byte == b' ' {
                        let method = Method::from_bytes(&self.scratch)
                            .map_err(|_| self.error(SyntaxErrorKind::InvalidMethod, p))?;
                        self.method = Some(method);
                        self.scratch.clear();
                        self.state = State::UrlStart;
                    } else {
                        self.push_token(byte, p, SyntaxErrorKind::InvalidMethod)?;
                    }
                }
                State::UrlStart => {
                    if !is_url_byte(byte) {
                        return Err(self.error(SyntaxErrorKind::InvalidUrl, p));
                    }
                    mark = Some(p);
                    self.state = State::Url;
                }
                State::Url => {
                    if byte == b' ' {
                        self.emit(callbacks, &data[mark.unwrap_or(p)..p])?;
                        mark = None;
                        self.state = State::RequestVersion;
                    } else if !is_url_byte(byte) {
                        return Err(self.error(SyntaxErrorKind::InvalidUrl, p));
                    }
                }
                State::RequestVersion => match byte {
                    b'\r' => {
                        self.take_version(p)?;
                        self.state = State::LineLf;
                    }
                    b'\n' => {
                        self.take_version(p)?;
                        self.state = State::FieldStart;
                    }
                    _ => self.push_scratch(byte, p, SyntaxErrorKind::InvalidVersion)?,
                },
                State::ResponseVersion => {
                    if byte == b' ' {
                        self.take_version(p)?;
                        self.state = State::StatusCode;
                    } else {
                        self.push_scratch(byte, p, SyntaxErrorKind::InvalidVersion)?;
                    }
                }
                State::StatusCode => match byte {
                    b'0'..=b'9' => self.push_scratch(byte, p, SyntaxErrorKind::InvalidStatus)?,
                    b' ' => {
                        self.take_status(p)?;
                        self.state = State::ReasonStart;
                    }
                    b'\r' | b'\n' => {
                        let status = self.take_status(p)?;
                        callbacks.on_status(status, &[])?;
                        self.state = line_end_state(byte);
                    }
                    _ => return Err(self.error(SyntaxErrorKind::InvalidStatus, p)),
                },
                State::ReasonStart => match byte {
                    b'\r' | b'\n' => {
                        callbacks.on_status(self.status_code()?, &[])?;
                        self.state = line_end_state(byte);
                    }
                    _ if is_text_byte(byte) => {
                        mark = Some(p);
                        self.state = State::Reason;
                    }
                    _ => return Err(self.error(SyntaxErrorKind::InvalidStatus, p)),
                },
                State::Reason => match byte {
                    b'\r' | b'\n' => {
                        self.emit(callbacks, &data[mark.unwrap_or(p)..p])?;
                        mark = None;
                        self.state = line_end_state(byte);
                    }
                    _ if is_text_byte(byte) => {}
                    _ => return Err(self.error(SyntaxErrorKind::InvalidStatus, p)),
                },
                State::LineLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidSeparator, p));
                    }
                    self.state = State::FieldStart;
                }
                State::FieldStart => match byte {
                    b'\r' => self.state = State::HeadersLf,
                    b'\n' => self.headers_complete(callbacks, p)?,
                    _ if is_token_byte(byte) => {
                        self.header_name.clear();
                        self.name_overflow = false;
                        self.track_name(byte);
                        mark = Some(p);
                        self.state = State::Field;
                    }
                    _ => return Err(self.error(SyntaxErrorKind::InvalidHeaderName, p)),
                },
                State::Field => match byte {
                    b':' => {
                        self.emit(callbacks, &data[mark.unwrap_or(p)..p])?;
                        mark = None;
                        self.header = self.classify_name();
                        self.header_value.clear();
                        self.state = State::ValueStart;
                    }
                    _ if is_token_byte(byte) => self.track_name(byte),
                    _ => return Err(self.error(SyntaxErrorKind::InvalidHeaderName, p)),
                },
                State::ValueStart => match byte {
                    b' ' | b'\t' => {}
                    b'\r' | b'\n' => {
                        callbacks.on_header_value(&[])?;
                        self.finish_value(p)?;
                        self.state = if byte == b'\r' {
                            State::ValueLf
                        } else {
                            State::FieldStart
                        };
                    }
                    _ if is_text_byte(byte) => {
                        self.track_value(byte);
                        mark = Some(p);
                        self.state = State::Value;
                    }
                    _ => return Err(self.error(SyntaxErrorKind::InvalidHeaderValue, p)),
                },
                State::Value => match byte {
                    b'\r' | b'\n' => {
                        self.emit(callbacks, &data[mark.unwrap_or(p)..p])?;
                        mark = None;
                        self.finish_value(p)?;
                        self.state = if byte == b'\r' {
                            State::ValueLf
                        } else {
                            State::FieldStart
                        };
                    }
                    _ if is_text_byte(byte) => self.track_value(byte),
                    _ => return Err(self.error(SyntaxErrorKind::InvalidHeaderValue, p)),
                },
                State::ValueLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidSeparator, p));
                    }
                    self.state = State::FieldStart;
                }
                State::HeadersLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidSeparator, p));
                    }
                    self.headers_complete(callbacks, p)?;
                }
                State::BodyIdentity { remaining } => {
                    let take = take_len(remaining, data.len() - p);
                    self.count_body(take, p)?;
                    callbacks.on_body(&data[p..p + take])?;
                    p += take;
                    let remaining = remaining - take as u64;
                    if remaining == 0 {
                        self.complete(callbacks)?;
                    } else {
                        self.state = State::BodyIdentity { remaining };
                    }
                    continue;
                }
                State::BodyUntilEof => {
                    let take = data.len() - p;
                    self.count_body(take, p)?;
                    callbacks.on_body(&data[p..])?;
                    p += take;
                    continue;
                }
                State::ChunkSize => match byte {
                    b'\r' | b'\n' | b';' | b' ' | b'\t' if self.chunk_digits == 0 => {
                        return Err(self.error(SyntaxErrorKind::InvalidChunkSize, p));
                    }
                    b'\r' => self.state = State::ChunkSizeLf,
                    b'\n' => self.chunk_size_done(),
                    b';' | b' ' | b'\t' => self.state = State::ChunkExtension,
                    _ => {
                        let digit = hex_value(byte)
                            .ok_or_else(|| self.error(SyntaxErrorKind::InvalidChunkSize, p))?;
                        self.chunk_size = self
                            .chunk_size
                            .checked_mul(16)
                            .and_then(|size| size.checked_add(u64::from(digit)))
                            .ok_or_else(|| self.error(SyntaxErrorKind::InvalidChunkSize, p))?;
                        self.chunk_digits += 1;
                    }
                },
                State::ChunkExtension => match byte {
                    b'\r' => self.state = State::ChunkSizeLf,
                    b'\n' => self.chunk_size_done(),
                    _ => {}
                },
                State::ChunkSizeLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidSeparator, p));
                    }
                    self.chunk_size_done();
                }
                State::ChunkData { remaining } => {
                    let take = take_len(remaining, data.len() - p);
                    self.count_body(take, p)?;
                    callbacks.on_body(&data[p..p + take])?;
                    p += take;
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        State::ChunkDataCr
                    } else {
                        State::ChunkData { remaining }
                    };
                    continue;
                }
                State::ChunkDataCr => match byte {
                    b'\r' => self.state = State::ChunkDataLf,
                    b'\n' => self.state = State::ChunkSize,
                    _ => return Err(self.error(SyntaxErrorKind::InvalidChunkTerminator, p)),
                },
                State::ChunkDataLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidChunkTerminator, p));
                    }
                    self.state = State::ChunkSize;
                }
                State::TrailerStart => match byte {
                    b'\r' => self.state = State::TrailerEndLf,
                    b'\n' => self.complete(callbacks)?,
                    _ => self.state = State::Trailer,
                },
                State::Trailer => {
                    if byte == b'\n' {
                        self.state = State::TrailerStart;
                    }
                }
                State::TrailerEndLf => {
                    if byte != b'\n' {
                        return Err(self.error(SyntaxErrorKind::InvalidChunkTerminator, p));
                    }
                    self.complete(callbacks)?;
                }
                State::Done => break,
                State::Dead => {
                    return Err(ParseError::Defect("tokenizer resumed after failure".to_string()));
                }
            }

            p += 1;
        }

        if let Some(start) = mark {
            if self.state.carries_text() {
                self.emit(callbacks, &data[start..p])?;
            }
        }

        self.consumed += p;
        Ok(p)
    }

    /// Reports a text fragment for whichever field the tokenizer is inside.
    fn emit<C: Callbacks>(&self, callbacks: &mut C, fragment: &[u8]) -> Result<(), ParseError> {
        match self.state {
            State::Url => {
                let method = self.method.as_ref().ok_or_else(|| {
                    ParseError::Defect("url fragment before the method".to_string())
                })?;
                callbacks.on_url(method, fragment)
            }
            State::Reason => callbacks.on_status(self.status_code()?, fragment),
            State::Field => callbacks.on_header_field(fragment),
            State::Value => callbacks.on_header_value(fragment),
            other => Err(ParseError::Defect(format!(
                "text fragment emitted in state {other:?}"
            ))),
        }
    }

    fn headers_complete<C: Callbacks>(
        &mut self,
        callbacks: &mut C,
        p: usize,
    ) -> Result<(), ParseError> {
        let body = self.body_mode();
        if let BodyMode::ContentLength(length) = body {
            if length > self.limits.max_body_bytes as u64 {
                return Err(self.error(SyntaxErrorKind::BodyTooLarge, p));
            }
        }

        let keep_alive = body != BodyMode::CloseDelimited
            && if self.version <= Version::HTTP_10 {
                self.framing.connection_keep_alive
            } else {
                !self.framing.connection_close
            };

        callbacks.on_headers_complete(HeadInfo {
            version: self.version,
            keep_alive,
        })?;

        match body {
            BodyMode::NoBody => self.complete(callbacks)?,
            BodyMode::ContentLength(remaining) => {
                self.state = State::BodyIdentity { remaining };
            }
            BodyMode::Chunked => {
                self.chunk_size = 0;
                self.chunk_digits = 0;
                self.state = State::ChunkSize;
            }
            BodyMode::CloseDelimited => self.state = State::BodyUntilEof,
        }
        Ok(())
    }

    fn body_mode(&self) -> BodyMode {
        if self.kind == MessageKind::Response
            && self.status.is_some_and(|status| status_has_no_body(status.as_u16()))
        {
            return BodyMode::NoBody;
        }
        if self.framing.chunked {
            return BodyMode::Chunked;
        }
        match (self.framing.content_length, self.kind) {
            (Some(0), _) => BodyMode::NoBody,
            (Some(length), _) => BodyMode::ContentLength(length),
            (None, MessageKind::Request) => BodyMode::NoBody,
            (None, MessageKind::Response) => BodyMode::CloseDelimited,
        }
    }

    fn complete<C: Callbacks>(&mut self, callbacks: &mut C) -> Result<(), ParseError> {
        self.state = State::Done;
        tracing::trace!(consumed = self.consumed, "message tokenized");
        callbacks.on_message_complete()
    }

    fn chunk_size_done(&mut self) {
        let size = std::mem::take(&mut self.chunk_size);
        self.chunk_digits = 0;
        self.state = if size == 0 {
            State::TrailerStart
        } else {
            State::ChunkData { remaining: size }
        };
    }

    fn count_body(&mut self, take: usize, p: usize) -> Result<(), ParseError> {
        self.body_bytes += take as u64;
        if self.body_bytes > self.limits.max_body_bytes as u64 {
            return Err(self.error(SyntaxErrorKind::BodyTooLarge, p));
        }
        Ok(())
    }

    fn push_token(&mut self, byte: u8, p: usize, kind: SyntaxErrorKind) -> Result<(), ParseError> {
        if !is_token_byte(byte) {
            return Err(self.error(kind, p));
        }
        self.push_scratch(byte, p, kind)
    }

    fn push_scratch(
        &mut self,
        byte: u8,
        p: usize,
        kind: SyntaxErrorKind,
    ) -> Result<(), ParseError> {
        if self.scratch.len() >= MAX_TOKEN_BYTES {
            return Err(self.error(kind, p));
        }
        self.scratch.push(byte);
        Ok(())
    }

    fn take_version(&mut self, p: usize) -> Result<(), ParseError> {
        self.version = parse_version(&self.scratch)
            .ok_or_else(|| self.error(SyntaxErrorKind::InvalidVersion, p))?;
        self.scratch.clear();
        Ok(())
    }

    fn take_status(&mut self, p: usize) -> Result<StatusCode, ParseError> {
        if self.scratch.len() != 3 {
            return Err(self.error(SyntaxErrorKind::InvalidStatus, p));
        }
        let status = StatusCode::from_bytes(&self.scratch)
            .map_err(|_| self.error(SyntaxErrorKind::InvalidStatus, p))?;
        self.scratch.clear();
        self.status = Some(status);
        Ok(status)
    }

    fn status_code(&self) -> Result<StatusCode, ParseError> {
        self.status
            .ok_or_else(|| ParseError::Defect("reason phrase before the status code".to_string()))
    }

    fn track_name(&mut self, byte: u8) {
        if self.header_name.len() < MAX_FRAMING_NAME_BYTES {
            self.header_name.push(byte.to_ascii_lowercase());
        } else {
            self.name_overflow = true;
        }
    }

    fn classify_name(&self) -> FramingHeader {
        if self.name_overflow {
            return FramingHeader::Other;
        }
        match self.header_name.as_slice() {
            b"content-length" => FramingHeader::ContentLength,
            b"transfer-encoding" => FramingHeader::TransferEncoding,
            b"connection" => FramingHeader::Connection,
            _ => FramingHeader::Other,
        }
    }

    fn track_value(&mut self, byte: u8) {
        if self.header != FramingHeader::Other && self.header_value.len() < MAX_FRAMING_VALUE_BYTES
        {
            self.header_value.push(byte.to_ascii_lowercase());
        }
    }

    fn finish_value(&mut self, p: usize) -> Result<(), ParseError> {
        let header = std::mem::replace(&mut self.header, FramingHeader::Other);
        let value = std::mem::take(&mut self.header_value);
        let text = String::from_utf8_lossy(&value);
        match header {
            FramingHeader::ContentLength => {
                let length = parse_content_length(text.trim())
                    .ok_or_else(|| self.error(SyntaxErrorKind::InvalidContentLength, p))?;
                if self.framing.content_length.is_some_and(|seen| seen != length) {
                    return Err(self.error(SyntaxErrorKind::InvalidContentLength, p));
                }
                self.framing.content_length = Some(length);
            }
            FramingHeader::TransferEncoding => {
                if has_token(&text, "chunked") {
                    self.framing.chunked = true;
                }
            }
            FramingHeader::Connection => {
                self.framing.connection_close |= has_token(&text, "close");
                self.framing.connection_keep_alive |= has_token(&text, "keep-alive");
            }
            FramingHeader::Other => {}
        }
        Ok(())
    }

    fn error(&self, kind: SyntaxErrorKind, p: usize) -> ParseError {
        ParseError::Syntax(SyntaxError {
            kind,
            offset: self.consumed + p,
        })
    }
}

fn line_end_state(byte: u8) -> State {
    if byte == b'\r' {
        State::LineLf
    } else {
        State::FieldStart
    }
}

fn take_len(remaining: u64, available: usize) -> usize {
    usize::try_from(remaining).map_or(available, |remaining| remaining.min(available))
}

fn parse_version(raw: &[u8]) -> Option<Version> {
    match raw {
        b"HTTP/1.1" => Some(Version::HTTP_11),
        b"HTTP/1.0" => Some(Version::HTTP_10),
        b"HTTP/0.9" => Some(Version::HTTP_09),
        _ => None,
    }
}

fn parse_content_length(text: &str) -> Option<u64> {
    if text.is_empty() || !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    text.parse().ok()
}

fn has_token(value: &str, token: &str) -> bool {
    value.split(',').any(|item| item.trim() == token)
}

fn status_has_no_body(status_code: u16) -> bool {
    status_code / 100 == 1 || status_code == 204 || status_code == 304
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

fn is_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
                | b'`' | b'|' | b'~'
        )
}

fn is_url_byte(byte: u8) -> bool {
    byte > b' ' && byte != 0x7f
}

fn is_text_byte(byte: u8) -> bool {
    byte == b'\t' || (byte >= b' ' && byte != 0x7f)
}
