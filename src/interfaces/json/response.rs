use crate::error::{EngineError, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;

/// The per-command response envelope: `{"ok": ...}` on success,
/// `{"error": {"message", "status"}}` on failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Value),
    Error(ErrorBody),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
}

impl Response {
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(value) => Response::Ok(value),
            Err(error) => Response::Error(ErrorBody {
                status: http_status(&error),
                message: error.to_string(),
            }),
        }
    }
}

/// The HTTP-equivalent status for each error class.
pub fn http_status(error: &EngineError) -> u16 {
    match error {
        EngineError::Unauthorized => 403,
        EngineError::NotFound(_) => 404,
        EngineError::InvalidTransition => 400,
        EngineError::Conflict(_) => 409,
        EngineError::Validation(_) => 422,
        EngineError::Json(_) => 400,
        _ => 500,
    }
}

/// Writes responses as JSON lines.
pub struct ResponseWriter<W: Write> {
    out: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn write(&mut self, response: &Response) -> Result<()> {
        serde_json::to_writer(&mut self.out, response)?;
        writeln!(self.out)?;
        Ok(())
    }
}
