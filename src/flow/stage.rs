use std::fmt;

use crate::error::FailureOrigin;

/// Where an invocation is in its lifecycle.
///
/// `Created → InputValidated → PromptRendered → ModelInvoked →
/// OutputValidated → Completed`, or `Failed` from any stage before
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowStage {
    Created,
    InputValidated,
    PromptRendered,
    ModelInvoked,
    OutputValidated,
    Completed,
    Failed(FailureOrigin),
}

impl FlowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::InputValidated => "input_validated",
            Self::PromptRendered => "prompt_rendered",
            Self::ModelInvoked => "model_invoked",
            Self::OutputValidated => "output_validated",
            Self::Completed => "completed",
            Self::Failed(FailureOrigin::Input) => "failed_input",
            Self::Failed(FailureOrigin::Render) => "failed_render",
            Self::Failed(FailureOrigin::Model) => "failed_model",
            Self::Failed(FailureOrigin::Output) => "failed_output",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }

    /// The stage a failure at this point is attributed to.
    pub(crate) fn failure_origin(&self) -> FailureOrigin {
        match self {
            Self::Created => FailureOrigin::Input,
            Self::InputValidated => FailureOrigin::Render,
            Self::PromptRendered => FailureOrigin::Model,
            Self::ModelInvoked | Self::OutputValidated | Self::Completed => FailureOrigin::Output,
            Self::Failed(origin) => *origin,
        }
    }
}

impl fmt::Display for FlowStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
