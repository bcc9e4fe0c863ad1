mod adapter;
mod buffer;
mod materialize;
mod session;
mod tokenizer;
mod types;

pub use session::{ParseSession, RequestParser, ResponseParser};
pub use tokenizer::{Callbacks, Tokenizer};
pub use types::{
    Callback, HeadInfo, HeaderTable, Limits, MessageKind, Request, Response, SyntaxError,
    SyntaxErrorKind,
};
