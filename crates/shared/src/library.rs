//! Library import report

use serde::{Deserialize, Serialize};

/// Result of importing a JSON file or a ZIP game pack.
///
/// `success` is true iff at least one game was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub success: bool,
    pub count: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ImportReport {
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            success: false,
            count: 0,
            errors,
            warnings: Vec::new(),
        }
    }
}
