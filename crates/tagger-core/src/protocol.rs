//! Line-oriented request/response protocol on stdin/stdout.
//!
//! Each non-blank input line is one JSON request `{"mode": ..., "arg": ...}`
//! and produces exactly one JSON response line. Errors never end the loop.

use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::{ColorAnalyzer, ToneAnalyzer};
use crate::config::AnalysisConfig;
use crate::embedding::Embedder;
use crate::output::JsonLinesWriter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub arg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Vector {
        vector: Vec<f32>,
    },
    DominantColor {
        #[serde(rename = "dominantColor")]
        dominant_color: String,
    },
    Tone {
        tone: String,
    },
    Error {
        error: String,
    },
}

impl Response {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    EncodeImage,
    EncodeText,
    DominantColor,
    CalculateTone,
}

impl Mode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "encode-image" => Some(Self::EncodeImage),
            "encode-text" => Some(Self::EncodeText),
            "dominant-color" => Some(Self::DominantColor),
            "calculate-tone" => Some(Self::CalculateTone),
            _ => None,
        }
    }
}

/// Reads requests, dispatches them, writes responses.
pub struct RequestLoop<'a, E: Embedder> {
    embedder: &'a mut E,
    color: ColorAnalyzer,
    tone: ToneAnalyzer,
}

impl<'a, E: Embedder> RequestLoop<'a, E> {
    pub fn new(embedder: &'a mut E, analysis: &AnalysisConfig) -> Self {
        Self {
            embedder,
            color: ColorAnalyzer::new(analysis),
            tone: ToneAnalyzer::new(analysis),
        }
    }

    /// Serve until `input` reaches EOF. Returns the number of responses written.
    ///
    /// Only I/O failures on the streams themselves end the loop early.
    pub fn run<R: BufRead, W: Write>(&mut self, mut input: R, output: W) -> io::Result<usize> {
        let mut writer = JsonLinesWriter::new(output);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let response = match std::str::from_utf8(&buf) {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(line.trim()),
                Err(e) => {
                    tracing::debug!("Request line is not UTF-8: {e}");
                    Response::error(format!("invalid UTF-8 in request: {e}"))
                }
            };
            writer.write(&response)?;
        }
        tracing::debug!("Input closed after {} responses", writer.items_written());
        Ok(writer.items_written())
    }

    /// Parse and answer a single request line.
    pub fn handle_line(&mut self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.dispatch(request),
            Err(e) => {
                tracing::debug!("Malformed request: {e}");
                Response::error(e.to_string())
            }
        }
    }

    pub fn dispatch(&mut self, request: Request) -> Response {
        let Request { mode, arg } = request;
        let mode_name = mode.as_deref().unwrap_or("null");
        let Some(parsed) = Mode::parse(mode_name) else {
            return Response::error(format!("unknown mode: {mode_name}"));
        };
        let Some(arg) = arg else {
            return Response::error(format!("missing arg for mode: {mode_name}"));
        };

        match parsed {
            Mode::EncodeImage => match self.embedder.encode_image(Path::new(&arg)) {
                Ok(vector) => Response::Vector { vector },
                Err(e) => {
                    tracing::warn!("encode-image failed: {e}");
                    Response::error(e.to_string())
                }
            },
            Mode::EncodeText => match self.embedder.encode_text(&arg) {
                Ok(vector) => Response::Vector { vector },
                Err(e) => {
                    tracing::warn!("encode-text failed: {e}");
                    Response::error(e.to_string())
                }
            },
            Mode::DominantColor => Response::DominantColor {
                dominant_color: self.color.dominant_color(Path::new(&arg)),
            },
            Mode::CalculateTone => Response::Tone {
                tone: self.tone.calculate_tone(Path::new(&arg)),
            },
        }
    }
}
