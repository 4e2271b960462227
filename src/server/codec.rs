//! Request/response framing for the stdio protocol.
//!
//! Each request is one JSON object per line. The decoder skips blank
//! lines and turns unparseable ones into [`Inbound::Malformed`] so the
//! server can answer them; only an oversized line is a framing error.

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Maximum accepted request line: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Request {
    /// Caller-chosen correlation id, echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// Operation name, e.g. `session/start`.
    pub method: String,
    /// Operation parameters.
    #[serde(default)]
    pub params: Value,
}

/// One decoded input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A well-formed request.
    Request(Request),
    /// A line that is not a request envelope, with the parse error.
    Malformed(String),
}

/// One response line: the request id and either a result or an error.
#[derive(Debug, Serialize)]
pub struct Response {
    id: Value,
    #[serde(flatten)]
    body: ResponseBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ResponseBody {
    Result(Value),
    Error { kind: &'static str, message: String },
}

impl Response {
    /// Response for `id` carrying `result`, or the error's kind and message.
    #[must_use]
    pub fn new(id: Value, result: Result<Value>) -> Self {
        let body = match result {
            Ok(value) => ResponseBody::Result(value),
            Err(err) => ResponseBody::Error {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        Self { id, body }
    }

    /// Error response that cannot be tied to a request id.
    #[must_use]
    pub fn uncorrelated(err: AppError) -> Self {
        Self::new(Value::Null, Err(err))
    }
}

/// Codec turning input lines into [`Inbound`] and [`Response`] into lines.
#[derive(Debug)]
pub struct RequestCodec {
    lines: LinesCodec,
}

impl RequestCodec {
    /// Codec with the [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_LINE_BYTES),
        }
    }

    fn next_line(
        &mut self,
        src: &mut BytesMut,
        eof: bool,
    ) -> std::result::Result<Option<String>, LinesCodecError> {
        if eof {
            self.lines.decode_eof(src)
        } else {
            self.lines.decode(src)
        }
    }

    fn decode_lines(&mut self, src: &mut BytesMut, eof: bool) -> Result<Option<Inbound>> {
        loop {
            let Some(line) = self.next_line(src, eof).map_err(framing_error)? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(match serde_json::from_str::<Request>(&line) {
                Ok(request) => Inbound::Request(request),
                Err(err) => Inbound::Malformed(err.to_string()),
            }));
        }
    }
}

impl Default for RequestCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for RequestCodec {
    type Item = Inbound;
    type Error = AppError;

    /// Next non-blank line, `Ok(None)` while buffering, or
    /// `AppError::Protocol` when a line exceeds [`MAX_LINE_BYTES`].
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        self.decode_lines(src, false)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        self.decode_lines(src, true)
    }
}

impl Encoder<Response> for RequestCodec {
    type Error = AppError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<()> {
        let line = serde_json::to_string(&item)
            .map_err(|err| AppError::Protocol(format!("failed to encode response: {err}")))?;
        self.lines.encode(line, dst).map_err(framing_error)
    }
}

fn framing_error(err: LinesCodecError) -> AppError {
    match err {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Protocol(format!("line too long: exceeded {MAX_LINE_BYTES} bytes"))
        }
        LinesCodecError::Io(err) => err.into(),
    }
}
