//! Install progress state machine
//!
//! Tracks which stage of the install sequence is running so a failure can
//! be reported against the stage it happened in. Stages only move forward.
//!
//! ```text
//! NotStarted
//!     ↓
//! Acknowledgements       (.Xmodmap, system updated, ~/.local/bin)
//!     ↓
//! ProbingEnvironment
//!     ↓
//! ElevatingPrivileges
//!     ↓
//! NativePackages
//!     ↓
//! InputDevice            (uinput, udev rules, input group)
//!     ↓
//! CloningKeymapper
//!     ↓
//! BackingUpConfig
//!     ↓
//! DeployingFiles
//!     ↓
//! PythonEnvironment
//!     ↓
//! DesktopIntegration
//!     ↓
//! DesktopTweaks
//!     ↓
//! Finishing
//!     ↓
//! Completed
//!
//! (Any running stage can transition to Failed)
//! ```

use std::fmt;
use thiserror::Error;

/// Install stages in sequential order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InstallStage {
    NotStarted = 0,
    Acknowledgements = 1,
    ProbingEnvironment = 2,
    ElevatingPrivileges = 3,
    NativePackages = 4,
    InputDevice = 5,
    CloningKeymapper = 6,
    /// Last stage before the config folder is replaced
    BackingUpConfig = 7,
    DeployingFiles = 8,
    PythonEnvironment = 9,
    DesktopIntegration = 10,
    DesktopTweaks = 11,
    Finishing = 12,
    Completed = 13,
    Failed = 255,
}

impl InstallStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Stages that modify the user's config folder
    #[inline]
    pub const fn touches_user_config(self) -> bool {
        matches!(self, Self::DeployingFiles | Self::PythonEnvironment)
    }

    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::Acknowledgements),
            Self::Acknowledgements => Some(Self::ProbingEnvironment),
            Self::ProbingEnvironment => Some(Self::ElevatingPrivileges),
            Self::ElevatingPrivileges => Some(Self::NativePackages),
            Self::NativePackages => Some(Self::InputDevice),
            Self::InputDevice => Some(Self::CloningKeymapper),
            Self::CloningKeymapper => Some(Self::BackingUpConfig),
            Self::BackingUpConfig => Some(Self::DeployingFiles),
            Self::DeployingFiles => Some(Self::PythonEnvironment),
            Self::PythonEnvironment => Some(Self::DesktopIntegration),
            Self::DesktopIntegration => Some(Self::DesktopTweaks),
            Self::DesktopTweaks => Some(Self::Finishing),
            Self::Finishing => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::Acknowledgements => "Confirming prerequisites",
            Self::ProbingEnvironment => "Probing environment",
            Self::ElevatingPrivileges => "Elevating privileges",
            Self::NativePackages => "Installing native packages",
            Self::InputDevice => "Configuring input device access",
            Self::CloningKeymapper => "Cloning keymapper",
            Self::BackingUpConfig => "Backing up config",
            Self::DeployingFiles => "Deploying Toshy files",
            Self::PythonEnvironment => "Setting up Python environment",
            Self::DesktopIntegration => "Installing desktop integration",
            Self::DesktopTweaks => "Applying desktop tweaks",
            Self::Finishing => "Finishing",
            Self::Completed => "Install complete",
            Self::Failed => "Install failed",
        }
    }

    /// Every stage in order, excluding Failed
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::NotStarted,
            Self::Acknowledgements,
            Self::ProbingEnvironment,
            Self::ElevatingPrivileges,
            Self::NativePackages,
            Self::InputDevice,
            Self::CloningKeymapper,
            Self::BackingUpConfig,
            Self::DeployingFiles,
            Self::PythonEnvironment,
            Self::DesktopIntegration,
            Self::DesktopTweaks,
            Self::Finishing,
            Self::Completed,
        ]
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Invalid stage transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstallTransitionError {
    #[error("Cannot skip from {from} to {to}")]
    SkippedStage { from: InstallStage, to: InstallStage },

    #[error("Cannot go backwards from {from} to {to}")]
    BackwardTransition { from: InstallStage, to: InstallStage },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: InstallStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: InstallStage },
}

impl From<InstallTransitionError> for crate::error::SetupError {
    fn from(err: InstallTransitionError) -> Self {
        crate::error::SetupError::General(err.to_string())
    }
}

/// Current stage of one install run, with the stages it skipped
#[derive(Debug, Clone)]
pub struct InstallProgress {
    current: InstallStage,
    failed_at: Option<InstallStage>,
    skipped: Vec<InstallStage>,
}

impl Default for InstallProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallProgress {
    pub fn new() -> Self {
        Self {
            current: InstallStage::NotStarted,
            failed_at: None,
            skipped: Vec::new(),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> InstallStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<InstallStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == InstallStage::Completed
    }

    /// Stages entered but intentionally not run (e.g. `--skip-native`)
    pub fn skipped(&self) -> &[InstallStage] {
        &self.skipped
    }

    /// Move to `target`, which must be the immediate next stage
    pub fn transition_to(&mut self, target: InstallStage) -> Result<InstallStage, InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        if target == self.current {
            return Err(InstallTransitionError::AlreadyAtStage { stage: target });
        }
        if target == InstallStage::Failed {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }
        if target.order() < self.current.order() {
            return Err(InstallTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }
        if self.current.next() != Some(target) {
            return Err(InstallTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        tracing::debug!("Install stage: {} -> {}", self.current, target);
        self.current = target;
        Ok(target)
    }

    /// Enter `stage` without doing its work
    pub fn skip(&mut self, stage: InstallStage) -> Result<(), InstallTransitionError> {
        self.transition_to(stage)?;
        tracing::info!("Skipping stage: {}", stage);
        self.skipped.push(stage);
        Ok(())
    }

    /// Record a failure in the current stage
    pub fn fail(&mut self) -> Result<(), InstallTransitionError> {
        if self.current.is_terminal() {
            return Err(InstallTransitionError::FromTerminalState { from: self.current });
        }
        self.failed_at = Some(self.current);
        self.current = InstallStage::Failed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_sequential() {
        let stages = InstallStage::all_stages();
        for pair in stages.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert!(pair[0].order() < pair[1].order());
        }
        assert_eq!(InstallStage::Completed.next(), None);
    }

    #[test]
    fn test_cannot_skip_or_go_back() {
        let mut progress = InstallProgress::new();
        assert_eq!(
            progress.transition_to(InstallStage::NativePackages),
            Err(InstallTransitionError::SkippedStage {
                from: InstallStage::NotStarted,
                to: InstallStage::NativePackages
            })
        );

        progress.transition_to(InstallStage::Acknowledgements).unwrap();
        progress.transition_to(InstallStage::ProbingEnvironment).unwrap();
        assert!(matches!(
            progress.transition_to(InstallStage::Acknowledgements),
            Err(InstallTransitionError::BackwardTransition { .. })
        ));
    }

    #[test]
    fn test_skip_records_stage() {
        let mut progress = InstallProgress::new();
        for stage in &InstallStage::all_stages()[1..4] {
            progress.transition_to(*stage).unwrap();
        }
        progress.skip(InstallStage::NativePackages).unwrap();
        assert_eq!(progress.skipped(), &[InstallStage::NativePackages]);
        assert_eq!(progress.current_stage(), InstallStage::NativePackages);
    }

    #[test]
    fn test_fail_is_terminal() {
        let mut progress = InstallProgress::new();
        progress.transition_to(InstallStage::Acknowledgements).unwrap();
        progress.fail().unwrap();

        assert_eq!(progress.failed_at(), Some(InstallStage::Acknowledgements));
        assert!(progress.fail().is_err());
        assert!(progress.transition_to(InstallStage::ProbingEnvironment).is_err());
    }

    #[test]
    fn test_config_touching_stages() {
        assert!(InstallStage::DeployingFiles.touches_user_config());
        assert!(!InstallStage::BackingUpConfig.touches_user_config());
    }
}
