mod config;
mod error;
mod http1;

pub use config::ParserConfig;
pub use error::{ConfigError, ParseError};

pub use http1::{
    Callback, Callbacks, HeadInfo, HeaderTable, Limits, MessageKind, ParseSession, Request,
    RequestParser, Response, ResponseParser, SyntaxError, SyntaxErrorKind, Tokenizer,
};
