/// The run state of the target, as last observed by polling.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum TargetRunState {
    /// The state is currently unknown. This is always the case before the first poll.
    #[default]
    Unknown,
    /// The core is running.
    Running,
    /// The core is halted.
    Halted,
    /// The core is halted, and executing the Debug RAM on behalf of the debugger.
    DebugRunning,
    /// A halt was requested, but the core has not halted yet.
    HaltPending,
}

impl TargetRunState {
    /// Decode the `haltnot` and `interrupt` bits of a debug module status read.
    pub fn decode(haltnot: bool, interrupt: bool) -> Self {
        match (haltnot, interrupt) {
            (true, true) => Self::DebugRunning,
            (true, false) => Self::Halted,
            (false, true) => Self::HaltPending,
            (false, false) => Self::Running,
        }
    }

    /// The state after observing `observed`.
    ///
    /// A pending halt is no state change, the previous state is kept.
    pub fn update(self, observed: TargetRunState) -> Self {
        match observed {
            Self::HaltPending => self,
            other => other,
        }
    }

    /// Returns `true` if the core is currently halted.
    pub fn is_halted(&self) -> bool {
        self == &Self::Halted
    }

    /// Returns `true` if the core is currently running.
    pub fn is_running(&self) -> bool {
        self == &Self::Running
    }
}

#[cfg(test)]
mod test {
    use super::TargetRunState;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test_case(true, true, TargetRunState::DebugRunning)]
    #[test_case(true, false, TargetRunState::Halted)]
    #[test_case(false, true, TargetRunState::HaltPending)]
    #[test_case(false, false, TargetRunState::Running)]
    fn decode(haltnot: bool, interrupt: bool, expected: TargetRunState) {
        assert_eq!(TargetRunState::decode(haltnot, interrupt), expected);
    }

    #[test_case(TargetRunState::Unknown)]
    #[test_case(TargetRunState::Running)]
    #[test_case(TargetRunState::Halted)]
    #[test_case(TargetRunState::DebugRunning)]
    fn halt_pending_keeps_previous(previous: TargetRunState) {
        assert_eq!(previous.update(TargetRunState::HaltPending), previous);
    }

    #[test]
    fn other_states_replace_previous() {
        assert_eq!(
            TargetRunState::Running.update(TargetRunState::Halted),
            TargetRunState::Halted
        );
        assert_eq!(
            TargetRunState::Halted.update(TargetRunState::Running),
            TargetRunState::Running
        );
    }
}
