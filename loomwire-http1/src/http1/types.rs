use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::{Method, StatusCode, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ParseError;

/// Field-name to value table of one message.
///
/// Names are stored exactly as the tokenizer reported them. A repeated name
/// replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    entries: HashMap<Bytes, Bytes>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.entries.get(name.as_ref()).map(|value| value.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_ref(), value.as_ref()))
    }

    pub(crate) fn insert(&mut self, name: Bytes, value: Bytes) -> Option<Bytes> {
        self.entries.insert(name, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
}

impl MessageKind {
    /// Callback type that opens a message of this kind.
    pub fn first_token(self) -> Callback {
        match self {
            Self::Request => Callback::Url,
            Self::Response => Callback::Status,
        }
    }
}

/// Tokenizer callback types, as tracked by the adapter state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    None,
    Url,
    Status,
    HeaderField,
    HeaderValue,
    HeadersComplete,
    Body,
    MessageComplete,
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Url => "url",
            Self::Status => "status",
            Self::HeaderField => "header-field",
            Self::HeaderValue => "header-value",
            Self::HeadersComplete => "headers-complete",
            Self::Body => "body",
            Self::MessageComplete => "message-complete",
        };
        f.write_str(name)
    }
}

/// Opening token identity captured at the start of the first-token span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartToken {
    Method(Method),
    Status(StatusCode),
}

/// What the tokenizer knows once the header section is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadInfo {
    pub version: Version,
    pub keep_alive: bool,
}

/// Everything a finished message is assembled from.
#[derive(Debug)]
pub struct MessageParts {
    pub start: StartToken,
    pub head: HeadInfo,
    pub first_token: Bytes,
    pub headers: HeaderTable,
    pub body: Bytes,
}

/// A message the session can assemble.
pub trait HttpMessage: Sized {
    const KIND: MessageKind;

    fn from_parts(parts: MessageParts) -> Result<Self, ParseError>;
}

/// Immutable request produced by a [`RequestParser`](crate::RequestParser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    version: Version,
    keep_alive: bool,
    url: Bytes,
    headers: HeaderTable,
    body: Bytes,
}

impl Request {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &[u8] {
        &self.url
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn header(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl HttpMessage for Request {
    const KIND: MessageKind = MessageKind::Request;

    fn from_parts(parts: MessageParts) -> Result<Self, ParseError> {
        let StartToken::Method(method) = parts.start else {
            return Err(ParseError::Defect("request assembled from a status line".to_string()));
        };
        Ok(Self {
            method,
            version: parts.head.version,
            keep_alive: parts.head.keep_alive,
            url: parts.first_token,
            headers: parts.headers,
            body: parts.body,
        })
    }
}

/// Immutable response produced by a [`ResponseParser`](crate::ResponseParser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    version: Version,
    keep_alive: bool,
    reason: Bytes,
    headers: HeaderTable,
    body: Bytes,
}

impl Response {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase exactly as received; empty when the status line had none.
    pub fn reason(&self) -> &[u8] {
        &self.reason
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn header(&self, name: impl AsRef<[u8]>) -> Option<&[u8]> {
        self.headers.get(name)
    }

    pub fn headers(&self) -> &HeaderTable {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }
}

impl HttpMessage for Response {
    const KIND: MessageKind = MessageKind::Response;

    fn from_parts(parts: MessageParts) -> Result<Self, ParseError> {
        let StartToken::Status(status) = parts.start else {
            return Err(ParseError::Defect("response assembled from a request line".to_string()));
        };
        Ok(Self {
            status,
            version: parts.head.version,
            keep_alive: parts.head.keep_alive,
            reason: parts.first_token,
            headers: parts.headers,
            body: parts.body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub max_header_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at byte {offset}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxErrorKind {
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid request target")]
    InvalidUrl,
    #[error("invalid http version")]
    InvalidVersion,
    #[error("invalid status code")]
    InvalidStatus,
    #[error("invalid line separator")]
    InvalidSeparator,
    #[error("invalid header name")]
    InvalidHeaderName,
    #[error("invalid header value")]
    InvalidHeaderValue,
    #[error("invalid content-length")]
    InvalidContentLength,
    #[error("invalid chunk size")]
    InvalidChunkSize,
    #[error("invalid chunk terminator")]
    InvalidChunkTerminator,
    #[error("header section too large")]
    HeaderTooLarge,
    #[error("body too large")]
    BodyTooLarge,
    #[error("unexpected end of stream")]
    UnexpectedEof,
}
