use assert_matches::assert_matches;
use http::{Method, StatusCode, Version};
use loomwire_http1::{ParseError, RequestParser, ResponseParser, SyntaxError, SyntaxErrorKind};

fn feed_in_reads(parser: &mut RequestParser, input: &[u8], read_size: usize) {
    for chunk in input.chunks(read_size) {
        assert!(parser.parse(chunk), "chunk rejected: {:?}", parser.error());
    }
}

fn feed_response_in_reads(parser: &mut ResponseParser, input: &[u8], read_size: usize) {
    for chunk in input.chunks(read_size) {
        assert!(parser.parse(chunk), "chunk rejected: {:?}", parser.error());
    }
}

#[test]
fn get_request_in_five_byte_chunks() {
    let mut parser = RequestParser::new();
    parser.init();

    feed_in_reads(
        &mut parser,
        b"GET /a HTTP/1.1\r\nHost: x.com\r\nAccept: */*\r\n\r\n",
        5,
    );

    assert!(parser.complete());
    let request = parser.result().unwrap();
    assert_eq!(request.method(), &Method::GET);
    assert_eq!(request.url(), b"/a");
    assert_eq!(request.version(), Version::HTTP_11);
    assert!(request.keep_alive());
    assert_eq!(request.headers().len(), 2);
    assert_eq!(request.header("Host"), Some(&b"x.com"[..]));
    assert_eq!(request.header("Accept"), Some(&b"*/*"[..]));
    assert!(request.body().is_empty());

    let mut names: Vec<&[u8]> = request.headers().iter().map(|(name, _)| name).collect();
    names.sort();
    assert_eq!(names, [&b"Accept"[..], &b"Host"[..]]);
}

#[test]
fn bare_get_in_five_byte_chunks() {
    let mut parser = RequestParser::new();
    parser.init();

    feed_in_reads(&mut parser, b"GET / HTTP/1.1\r\n\r\n", 5);

    assert!(parser.complete());
    let request = parser.result().unwrap();
    assert_eq!(request.method(), &Method::GET);
    assert_eq!(request.url(), b"/");
    assert!(request.headers().is_empty());
    assert!(request.body().is_empty());
}

#[test]
fn request_with_long_header_and_trailing_bytes() {
    let input = b"PUT /test.com/test1 HTTP/1.1\r\nHost: test.com\r\nContent-Length: 40\r\nField-1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA: BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB\r\n\r\n0123456789012345678901234567890123456789\r\n";
    let mut parser = RequestParser::new();

    for chunk in input.chunks(10) {
        if parser.complete() {
            break;
        }
        parser.parse(chunk);
    }

    let request = parser.result().unwrap();
    assert_eq!(request.method(), &Method::PUT);
    assert_eq!(request.url(), b"/test.com/test1");
    assert_eq!(request.header("Content-Length"), Some(&b"40"[..]));
    assert_eq!(
        request.header("Field-1AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"),
        Some(&b"BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB"[..])
    );
    assert_eq!(request.body(), b"0123456789012345678901234567890123456789");
}

#[test]
fn request_without_body_has_empty_body() {
    let mut parser = RequestParser::new();
    feed_in_reads(
        &mut parser,
        b"GET / HTTP/1.1\r\nHost: test.com\r\nField-1CCCCCCCCCAAAAAAAAAAAAAAAAAAAAA: BBBBBBBBBBBBBCCCCCCCCCCCCCCCBBBBBBBBBBBBBBBBB\r\n\r\n",
        10,
    );

    let request = parser.result().unwrap();
    assert_eq!(request.url(), b"/");
    assert_eq!(request.header("Host"), Some(&b"test.com"[..]));
    assert_eq!(
        request.header("Field-1CCCCCCCCCAAAAAAAAAAAAAAAAAAAAA"),
        Some(&b"BBBBBBBBBBBBBCCCCCCCCCCCCCCCBBBBBBBBBBBBBBBBB"[..])
    );
    assert!(request.body().is_empty());
}

#[test]
fn request_without_headers() {
    let mut parser = RequestParser::new();
    feed_in_reads(&mut parser, b"GET / HTTP/1.1\r\n\r\n", 10);

    let request = parser.result().unwrap();
    assert!(parser.complete());
    assert_eq!(request.url(), b"/");
    assert!(request.headers().is_empty());
    assert!(request.body().is_empty());
}

#[test]
fn response_without_headers_completes_at_eof() {
    let mut parser = ResponseParser::new();
    feed_response_in_reads(&mut parser, b"HTTP/1.1 200 OK\r\n\r\n", 10);
    assert!(!parser.complete());

    let response = parser.result().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.reason(), b"OK");
    assert!(!response.keep_alive());
    assert!(response.body().is_empty());
}

#[test]
fn response_with_date_header() {
    let mut parser = ResponseParser::new();
    feed_response_in_reads(
        &mut parser,
        b"HTTP/1.1 200 OK\r\nDate: Mon, 18 Jul 2016 16:06:00 GMT\r\n\r\n",
        10,
    );

    let response = parser.result().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.header("Date"),
        Some(&b"Mon, 18 Jul 2016 16:06:00 GMT"[..])
    );
    assert!(response.body().is_empty());
}

#[test]
fn response_with_date_header_and_hello_body() {
    let mut parser = ResponseParser::new();
    feed_response_in_reads(
        &mut parser,
        b"HTTP/1.1 200 OK\r\nDate: Mon, 18 Jul 2016 16:06:00 GMT\r\n\r\nHello",
        10,
    );
    assert!(!parser.complete());

    let response = parser.result().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.header("Date"),
        Some(&b"Mon, 18 Jul 2016 16:06:00 GMT"[..])
    );
    assert_eq!(response.body(), b"Hello");
}

#[test]
fn close_delimited_response_body() {
    let mut parser = ResponseParser::new();
    feed_response_in_reads(
        &mut parser,
        b"HTTP/1.1 200 OK\r\nDate: Mon, 18 Jul 2016 16:06:00 GMT\r\n\r\nJKGjhd dfsgfbsdhladksgmhdsjkf\nfsdafnghdjg\nfsdafas\r\n",
        10,
    );

    let response = parser.result().unwrap();
    assert_eq!(
        response.body(),
        b"JKGjhd dfsgfbsdhladksgmhdsjkf\nfsdafnghdjg\nfsdafas\r\n"
    );
}

#[test]
fn response_with_content_length_completes_without_eof() {
    let mut parser = ResponseParser::new();
    feed_response_in_reads(
        &mut parser,
        b"HTTP/1.1 200 OK\r\nDate: Mon\r\nContent-Length: 5\r\n\r\nHello",
        4,
    );

    assert!(parser.complete());
    let response = parser.result().unwrap();
    assert_eq!(response.header("Date"), Some(&b"Mon"[..]));
    assert_eq!(response.body(), b"Hello");
    assert!(response.keep_alive());
}

#[test]
fn chunked_request_body_is_decoded() {
    let mut parser = RequestParser::new();
    feed_in_reads(
        &mut parser,
        b"POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n",
        3,
    );

    let request = parser.result().unwrap();
    assert_eq!(request.body(), b"Wikipedia");
    assert_eq!(request.header("Transfer-Encoding"), Some(&b"chunked"[..]));
}

#[test]
fn session_is_reused_after_init() {
    let mut parser = RequestParser::new();

    for path in ["/one", "/two", "/three"] {
        parser.init();
        let raw = format!("GET {path} HTTP/1.1\r\nHost: a\r\n\r\n");
        feed_in_reads(&mut parser, raw.as_bytes(), 7);
        let request = parser.result().unwrap();
        assert_eq!(request.url(), path.as_bytes());
        assert_eq!(request.headers().len(), 1);
    }
}

#[test]
fn message_outlives_session() {
    let request = {
        let mut parser = RequestParser::new();
        feed_in_reads(&mut parser, b"POST /keep HTTP/1.1\r\nContent-Length: 3\r\n\r\nabc", 2);
        parser.result().unwrap()
    };

    assert_eq!(request.url(), b"/keep");
    assert_eq!(request.into_body(), &b"abc"[..]);
}

#[test]
fn pipelined_messages_are_split_by_feed() {
    let input = b"GET /first HTTP/1.1\r\n\r\nGET /second HTTP/1.1\r\n\r\n";
    let mut parser = RequestParser::new();

    let consumed = parser.feed(input).unwrap();
    assert!(parser.complete());
    assert_eq!(parser.result().unwrap().url(), b"/first");

    parser.init();
    let rest = &input[consumed..];
    assert_eq!(parser.feed(rest).unwrap(), rest.len());
    assert_eq!(parser.result().unwrap().url(), b"/second");
}

#[test]
fn parse_reports_false_when_chunk_holds_next_message() {
    let mut parser = RequestParser::new();

    assert!(!parser.parse(b"GET /a HTTP/1.1\r\n\r\nGET"));
    assert!(parser.complete());
    assert!(parser.error().is_none());
}

#[test]
fn malformed_request_reports_offset() {
    let mut parser = RequestParser::new();

    assert!(parser.parse(b"GET / HTTP/1.1\r\n"));
    assert!(!parser.parse(b"Host : x\r\n\r\n"));

    assert_matches!(
        parser.error(),
        Some(ParseError::Syntax(SyntaxError {
            kind: SyntaxErrorKind::InvalidHeaderName,
            offset: 20,
        }))
    );
    assert!(parser.result().is_none());
}

#[test]
fn feeding_without_init_after_result_fails() {
    let mut parser = RequestParser::new();
    feed_in_reads(&mut parser, b"GET / HTTP/1.1\r\n\r\n", 64);
    assert!(parser.result().is_some());

    assert!(!parser.parse(b"GET / HTTP/1.1\r\n\r\n"));
    assert_matches!(parser.error(), Some(ParseError::NotInitialized));
}

#[test]
fn init_discards_unextracted_message() {
    let mut parser = RequestParser::new();
    feed_in_reads(&mut parser, b"GET /lost HTTP/1.1\r\n\r\n", 64);
    assert!(parser.complete());

    parser.init();
    assert!(!parser.complete());
    assert!(parser.result().is_none());

    feed_in_reads(&mut parser, b"GET /kept HTTP/1.1\r\n\r\n", 64);
    assert_eq!(parser.result().unwrap().url(), b"/kept");
}
