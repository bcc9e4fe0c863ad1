use assert_matches::assert_matches;
use loomwire_http1::{
    ConfigError, Limits, ParseError, ParserConfig, RequestParser, SyntaxError, SyntaxErrorKind,
};
use tempfile::tempdir;

#[test]
fn save_then_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("parser.toml");
    let config = ParserConfig {
        limits: Limits {
            max_header_bytes: 2048,
            max_body_bytes: 4096,
        },
    };

    config.save(&path).unwrap();
    let loaded = ParserConfig::load(&path).unwrap();

    assert_eq!(loaded, config);
}

#[test]
fn missing_file_gives_defaults() {
    let dir = tempdir().unwrap();
    let config = ParserConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, ParserConfig::default());
    assert_eq!(config.limits.max_header_bytes, 64 * 1024);
    assert_eq!(config.limits.max_body_bytes, 10 * 1024 * 1024);
}

#[test]
fn missing_file_fails_strict_load() {
    let dir = tempdir().unwrap();
    let err = ParserConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert_matches!(err, ConfigError::Io(_));
}

#[test]
fn invalid_toml_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("parser.toml");
    std::fs::write(&path, "[limits]\nmax_header_bytes = \"lots\"\n").unwrap();

    let err = ParserConfig::load_or_default(&path).unwrap_err();
    assert_matches!(err, ConfigError::Toml(_));
}

#[test]
fn loaded_limits_reach_the_parser() {
    let config = ParserConfig::from_toml_str("[limits]\nmax_body_bytes = 3\n").unwrap();
    let mut parser = RequestParser::with_config(&config);

    assert!(parser.parse(b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n"));
    assert!(!parser.parse(b"4\r\nabcd\r\n0\r\n\r\n"));

    assert_matches!(
        parser.error(),
        Some(ParseError::Syntax(SyntaxError {
            kind: SyntaxErrorKind::BodyTooLarge,
            ..
        }))
    );
}
