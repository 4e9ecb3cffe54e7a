//! Task and job definitions.

mod register;
mod relay;

pub use register::RegisterJob;
pub use relay::RelayJob;

/// Tasks served by the job-dispatch subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    /// Forward an activity to a subscriber inbox.
    Relay,
    /// Answer a subscription request.
    Register,
}

impl Task {
    /// Every task the dispatcher registers.
    pub const ALL: [Self; 2] = [Self::Relay, Self::Register];

    /// Task name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Relay => "relay",
            Self::Register => "register",
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_names() {
        assert_eq!(Task::Relay.to_string(), "relay");
        assert_eq!(Task::Register.to_string(), "register");
        assert_eq!(Task::ALL.len(), 2);
    }
}
