use serde::{Deserialize, Serialize};

/// Wizard steps of the document workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStep {
    Upload = 1,
    Extract = 2,
    Generate = 3,
    Download = 4,
}

impl ProcessingStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(ProcessingStep::Upload),
            2 => Some(ProcessingStep::Extract),
            3 => Some(ProcessingStep::Generate),
            4 => Some(ProcessingStep::Download),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProcessingStep::Upload => "Upload",
            ProcessingStep::Extract => "Extract",
            ProcessingStep::Generate => "Generate",
            ProcessingStep::Download => "Download",
        }
    }
}
