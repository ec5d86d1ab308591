use siteswap_core::RemoteError;

use crate::{SwapPhase, WorkflowStep};

/// Failure classes an operator has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A required path was missing before anything changed remotely.
    Precondition,
    /// The target already existed and the operator declined to proceed.
    Collision,
    /// A single remote operation failed mid-sequence.
    TransientOperation,
    /// Connection lost or login rejected.
    FatalTransport,
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{step}: {message}")]
    Precondition { step: WorkflowStep, message: String },

    #[error("{step}: declined by operator")]
    Declined { step: WorkflowStep },

    #[error("{step} failed: {source}")]
    Transient {
        step: WorkflowStep,
        phase: SwapPhase,
        source: RemoteError,
        guidance: Vec<String>,
    },

    #[error("{step} aborted, transport failure: {source}")]
    FatalTransport {
        step: WorkflowStep,
        phase: SwapPhase,
        source: RemoteError,
        guidance: Vec<String>,
    },

    #[error("{step} failed inside the swap window ({phase}); remote site is degraded: {source}")]
    Degraded {
        step: WorkflowStep,
        phase: SwapPhase,
        source: RemoteError,
        guidance: Vec<String>,
    },

    #[error("{step} cannot run while the swap is {phase}")]
    OutOfOrder { step: WorkflowStep, phase: SwapPhase },
}

impl WorkflowError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Precondition { .. } | Self::OutOfOrder { .. } => ErrorClass::Precondition,
            Self::Declined { .. } => ErrorClass::Collision,
            Self::Transient { .. } => ErrorClass::TransientOperation,
            Self::FatalTransport { .. } => ErrorClass::FatalTransport,
            Self::Degraded { source, .. } if source.is_fatal_transport() => {
                ErrorClass::FatalTransport
            }
            Self::Degraded { .. } => ErrorClass::TransientOperation,
        }
    }

    pub fn step(&self) -> WorkflowStep {
        match self {
            Self::Precondition { step, .. }
            | Self::Declined { step }
            | Self::Transient { step, .. }
            | Self::FatalTransport { step, .. }
            | Self::Degraded { step, .. }
            | Self::OutOfOrder { step, .. } => *step,
        }
    }

    /// Manual recovery instructions for whatever was already changed remotely.
    pub fn guidance(&self) -> &[String] {
        match self {
            Self::Transient { guidance, .. }
            | Self::FatalTransport { guidance, .. }
            | Self::Degraded { guidance, .. } => guidance,
            Self::Precondition { .. } | Self::Declined { .. } | Self::OutOfOrder { .. } => &[],
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// True when the run stopped before changing anything remotely.
    pub fn left_remote_untouched(&self) -> bool {
        match self {
            Self::Precondition { .. } | Self::Declined { .. } | Self::OutOfOrder { .. } => true,
            Self::Transient { phase, .. } | Self::FatalTransport { phase, .. } => {
                *phase == SwapPhase::Untouched
            }
            Self::Degraded { .. } => false,
        }
    }
}
