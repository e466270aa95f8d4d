/// Phases a single deployment run moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    GroupCreating,
    GroupReady,
    DeploymentSubmitting,
    DeploymentComplete,
    Cleanup,
    Done,
}

impl LifecyclePhase {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::GroupCreating => "GROUP_CREATING",
            Self::GroupReady => "GROUP_READY",
            Self::DeploymentSubmitting => "DEPLOYMENT_SUBMITTING",
            Self::DeploymentComplete => "DEPLOYMENT_COMPLETE",
            Self::Cleanup => "CLEANUP",
            Self::Done => "DONE",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: LifecyclePhase,
    pub to: LifecyclePhase,
}

pub fn next_phase(
    current: LifecyclePhase,
    requested: LifecyclePhase,
) -> Result<LifecyclePhase, InvalidTransition> {
    use LifecyclePhase::{
        Cleanup, DeploymentComplete, DeploymentSubmitting, Done, GroupCreating, GroupReady, Idle,
    };

    let allowed = matches!(
        (current, requested),
        (Idle, GroupCreating)
            | (GroupCreating, GroupReady)
            | (GroupReady, DeploymentSubmitting)
            | (DeploymentSubmitting, DeploymentComplete)
            | (DeploymentComplete, Cleanup)
            | (GroupCreating | GroupReady | DeploymentSubmitting, Cleanup)
            | (Cleanup, Done)
    );

    if allowed {
        Ok(requested)
    } else {
        Err(InvalidTransition {
            from: current,
            to: requested,
        })
    }
}

/// Records the phase trail of one run.
#[derive(Debug, Clone)]
pub struct LifecycleTracker {
    history: Vec<LifecyclePhase>,
}

impl Default for LifecycleTracker {
    fn default() -> Self {
        Self {
            history: vec![LifecyclePhase::Idle],
        }
    }
}

impl LifecycleTracker {
    pub fn current(&self) -> LifecyclePhase {
        self.history
            .last()
            .copied()
            .unwrap_or(LifecyclePhase::Idle)
    }

    pub fn advance(&mut self, requested: LifecyclePhase) -> Result<(), InvalidTransition> {
        let from = self.current();
        let to = next_phase(from, requested)?;
        tracing::debug!(
            from = from.as_label(),
            to = to.as_label(),
            "lifecycle transition"
        );
        self.history.push(to);
        Ok(())
    }

    pub fn history(&self) -> &[LifecyclePhase] {
        &self.history
    }
}
