use std::time::SystemTime;

/// One pass/fail assertion made by a VU.
///
/// Insertion order is irrelevant, only the tallies per check name matter.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckRecord {
    pub name: String,
    pub passed: bool,
    pub vu_index: usize,
    /// Informational checks are findings reported for awareness. They never count as failures.
    pub informational: bool,
    pub timestamp: SystemTime,
}

impl CheckRecord {
    pub fn new(name: impl Into<String>, passed: bool, vu_index: usize) -> Self {
        Self {
            name: name.into(),
            passed,
            vu_index,
            informational: false,
            timestamp: SystemTime::now(),
        }
    }

    pub fn informational(mut self) -> Self {
        self.informational = true;
        self
    }
}
