use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    /// Echo of what the player typed
    Input,
    SceneTitle,
    SceneText,
    /// A listed option
    Choice,
    /// The option the player took
    ChoiceTaken,
    Status,
    System,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub kind: LineKind,
    pub text: String,
}

/// Append-only transcript of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLog {
    lines: Vec<OutputLine>,
}

impl OutputLog {
    pub fn push(&mut self, kind: LineKind, text: impl Into<String>) {
        self.lines.push(OutputLine {
            kind,
            text: text.into(),
        });
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    /// Lines appended at or after position `start`.
    pub fn since(&self, start: usize) -> &[OutputLine] {
        self.lines.get(start..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
