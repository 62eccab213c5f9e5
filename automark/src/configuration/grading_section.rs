use crate::grader::score::Mode as GradingMode;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone, Copy)]
#[serde(deny_unknown_fields)]
pub struct GradingSection {
    #[serde(default)]
    mode: GradingMode,
}

impl GradingSection {
    pub fn new(mode: GradingMode) -> Self {
        Self { mode }
    }
    pub fn get_grading_mode(&self) -> GradingMode {
        self.mode
    }
}
