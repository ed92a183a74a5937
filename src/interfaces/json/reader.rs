use super::command::Command;
use crate::error::{EngineError, Result};
use std::io::Read;

/// Reads commands from a JSON-lines source.
///
/// Wraps `serde_json`'s streaming deserializer, so whitespace between values
/// (including newlines) is insignificant and large scripts are never fully
/// buffered.
pub struct CommandReader<R: Read> {
    source: R,
}

impl<R: Read> CommandReader<R> {
    /// Creates a new `CommandReader` from any `Read` source (e.g. File,
    /// Stdin).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads and deserializes commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        serde_json::Deserializer::from_reader(self.source)
            .into_iter::<Command>()
            .map(|result| result.map_err(EngineError::from))
    }
}
