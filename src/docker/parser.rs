//! Line-oriented decoder for engine API responses.
//!
//! The engine answers with HTTP/1.1 framed JSON, almost always using chunked transfer
//! encoding. Lines are fed one at a time, exactly as read from the socket (line
//! terminator included), and the decoder walks through
//!
//! ```text
//! Headers -> Length -> Content -> EndContent -> Length ... | Err
//! ```
//!
//! A chunk is assumed to arrive as a single line: the engine terminates every JSON
//! document with a newline, so the chunk payload and the line coincide. Streaming
//! requests (the event feed) hand out every chunk as soon as it is complete; all other
//! requests accumulate the chunks and hand out the body once the stream ends.
//!
//! # Example
//!
//! ```rust
//! use container_telemetry::docker::ResponseParser;
//!
//! let mut parser = ResponseParser::new(false);
//! for line in ["HTTP/1.1 200 OK\r\n", "Transfer-Encoding: chunked\r\n", "\r\n",
//!              "4\r\n", "test", "\r\n", "0\r\n", "\r\n"] {
//!     assert!(parser.feed_line(line).unwrap().is_none());
//! }
//! assert_eq!(parser.finish().as_deref(), Some("test"));
//! ```

use super::ParseError;

const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Decoder states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Headers,
    Length,
    Content,
    EndContent,
    Err,
}

#[derive(Debug)]
pub struct ResponseParser {
    state: ParseState,
    streaming: bool,
    content_length: Option<usize>,
    chunk_length: usize,
    response: String,
}

impl ResponseParser {
    pub fn new(streaming: bool) -> Self {
        Self {
            state: ParseState::Headers,
            streaming,
            content_length: None,
            chunk_length: 0,
            response: String::new(),
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Feeds one received line into the decoder.
    ///
    /// Returns `Ok(Some(document))` when a streaming request completed a chunk. Once an
    /// error was returned the decoder stays in [`ParseState::Err`] and ignores every
    /// further line.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::ChunkSize`] for a chunk size line that is not hexadecimal
    /// and [`ParseError::ChunkLength`] for content that does not match the announced
    /// length.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<String>, ParseError> {
        match self.state {
            ParseState::Headers => {
                let line = chomp(line);
                if line.is_empty() {
                    self.state = match self.content_length {
                        Some(len) if len > 0 => ParseState::Content,
                        _ => ParseState::Length,
                    };
                } else if let Some(len) = parse_content_length(line) {
                    log::trace!("content-length={}", len);
                    self.content_length = Some(len);
                }
                Ok(None)
            }
            ParseState::Length => {
                let line = chomp(line);
                match usize::from_str_radix(line, 16) {
                    Ok(0) => {
                        self.chunk_length = 0;
                        self.state = ParseState::EndContent;
                        Ok(None)
                    }
                    Ok(len) => {
                        self.chunk_length = len;
                        self.state = ParseState::Content;
                        Ok(None)
                    }
                    Err(_) => {
                        self.state = ParseState::Err;
                        Err(ParseError::ChunkSize(line.to_owned()))
                    }
                }
            }
            ParseState::Content => self.content(line),
            ParseState::EndContent => {
                if chomp(line).is_empty() {
                    self.state = ParseState::Length;
                }
                Ok(None)
            }
            ParseState::Err => Ok(None),
        }
    }

    fn content(&mut self, line: &str) -> Result<Option<String>, ParseError> {
        let expected = if self.chunk_length > 0 {
            self.chunk_length
        } else {
            self.content_length.unwrap_or(0)
        };

        // Either the line is exactly the chunk, or the chunk is followed directly by
        // its CRLF trailer, which then also finishes the chunk.
        let (chunk, next) = if line.len() == expected {
            (line, ParseState::EndContent)
        } else if line.len() > expected
            && line.is_char_boundary(expected)
            && chomp(&line[expected..]).is_empty()
        {
            (&line[..expected], ParseState::Length)
        } else {
            self.state = ParseState::Err;
            return Err(ParseError::ChunkLength {
                expected,
                actual: line.len(),
            });
        };

        self.state = next;
        if self.streaming {
            return Ok(Some(chunk.to_owned()));
        }
        self.response.push_str(chunk);
        Ok(None)
    }

    /// Consumes the decoder at end of stream and returns the accumulated body, if any.
    ///
    /// Streaming decoders and decoders in the error state never produce a body.
    pub fn finish(self) -> Option<String> {
        if self.streaming || self.state == ParseState::Err || self.response.is_empty() {
            return None;
        }
        Some(self.response)
    }
}

fn chomp(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

fn parse_content_length(line: &str) -> Option<usize> {
    let (name, value) = line.split_once(':')?;
    if !name.trim().eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
        return None;
    }
    value.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHUNKED_HEADERS: [&str; 4] = [
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: application/json\r\n",
        "Transfer-Encoding: chunked\r\n",
        "\r\n",
    ];

    fn feed_all(parser: &mut ResponseParser, lines: &[&str]) -> Vec<String> {
        lines
            .iter()
            .filter_map(|line| parser.feed_line(line).unwrap())
            .collect()
    }

    #[test]
    fn test_chunk_round_trip() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        assert_eq!(parser.state(), ParseState::Length);

        let out = feed_all(&mut parser, &["4", "test", "0", ""]);
        assert!(out.is_empty());
        assert_eq!(parser.finish().as_deref(), Some("test"));
    }

    #[test]
    fn test_chunked_json_with_newline_terminated_chunks() {
        let body = "{\"a\":1}\n";
        let size = format!("{:x}\r\n", body.len());
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &[&size, body, "\r\n", "0\r\n", "\r\n"]);
        assert_eq!(parser.state(), ParseState::Length);
        assert_eq!(parser.finish().as_deref(), Some("{\"a\":1}\n"));
    }

    #[test]
    fn test_multiple_chunks_accumulate() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &["3\r\n", "[1,", "\r\n", "2\r\n", "2]", "\r\n"]);
        assert_eq!(parser.finish().as_deref(), Some("[1,2]"));
    }

    #[test]
    fn test_chunk_followed_by_trailer_on_same_line() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &["4\r\n", "test\r\n"]);
        assert_eq!(parser.state(), ParseState::Length);
        feed_all(&mut parser, &["0\r\n", "\r\n"]);
        assert_eq!(parser.finish().as_deref(), Some("test"));
    }

    #[test]
    fn test_content_length_response() {
        let body = "{\"message\":\"No such container\"}\n";
        let header = format!("Content-Length: {}\r\n", body.len());
        let mut parser = ResponseParser::new(false);
        feed_all(
            &mut parser,
            &["HTTP/1.1 404 Not Found\r\n", &header, "\r\n"],
        );
        assert_eq!(parser.state(), ParseState::Content);
        feed_all(&mut parser, &[body]);
        assert_eq!(parser.state(), ParseState::EndContent);
        assert_eq!(parser.finish().as_deref(), Some(body));
    }

    #[test]
    fn test_content_length_header_is_case_insensitive() {
        assert_eq!(parse_content_length("content-length: 12"), Some(12));
        assert_eq!(parse_content_length("Content-Length:7"), Some(7));
        assert_eq!(parse_content_length("Content-Type: json"), None);
        assert_eq!(parse_content_length("Content-Length: abc"), None);
    }

    #[test]
    fn test_bad_chunk_size_is_terminal() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        let err = parser.feed_line("4zz\r\n").unwrap_err();
        assert!(matches!(err, ParseError::ChunkSize(ref s) if s == "4zz"));
        assert_eq!(parser.state(), ParseState::Err);

        // nothing is parsed after the error
        assert!(parser.feed_line("4\r\n").unwrap().is_none());
        assert_eq!(parser.state(), ParseState::Err);
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_chunk_length_mismatch_is_an_error() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &["a\r\n"]);
        let err = parser.feed_line("short").unwrap_err();
        assert!(matches!(
            err,
            ParseError::ChunkLength {
                expected: 10,
                actual: 5
            }
        ));
        assert_eq!(parser.state(), ParseState::Err);
    }

    #[test]
    fn test_streaming_emits_each_chunk() {
        let first = "{\"status\":\"start\"}\n";
        let second = "{\"status\":\"die\"}\n";
        let mut parser = ResponseParser::new(true);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        let out = feed_all(
            &mut parser,
            &[
                &format!("{:x}\r\n", first.len()),
                first,
                "\r\n",
                &format!("{:x}\r\n", second.len()),
                second,
                "\r\n",
            ],
        );
        assert_eq!(out, vec![first.to_owned(), second.to_owned()]);
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_end_content_waits_for_blank_line() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &["4\r\n", "test"]);
        assert_eq!(parser.state(), ParseState::EndContent);
        feed_all(&mut parser, &["garbage\r\n"]);
        assert_eq!(parser.state(), ParseState::EndContent);
        feed_all(&mut parser, &["\r\n"]);
        assert_eq!(parser.state(), ParseState::Length);
    }

    #[test]
    fn test_empty_response_has_no_body() {
        let mut parser = ResponseParser::new(false);
        feed_all(&mut parser, &CHUNKED_HEADERS);
        feed_all(&mut parser, &["0\r\n", "\r\n"]);
        assert!(parser.finish().is_none());
    }
}
