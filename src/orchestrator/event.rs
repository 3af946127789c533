//! Progress events emitted while a run executes.

/// Progress of a run, delivered to the observer passed to
/// [`StepRunner::with_observer`](super::StepRunner::with_observer).
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::StepEvent;
///
/// fn on_event(event: &StepEvent) {
///     match event {
///         StepEvent::Started { step } => println!("{}...", step),
///         StepEvent::Failed { step, exit_code, .. } => {
///             println!("{} failed ({})", step, exit_code)
///         }
///         other => println!("{}", other.description()),
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepEvent {
    /// A step is about to have its precondition checked.
    Started {
        /// Step name.
        step: String,
    },

    /// The precondition held; the action was not run.
    Skipped {
        /// Step name.
        step: String,
    },

    /// The action is running.
    Running {
        /// Step name.
        step: String,
    },

    /// The action finished successfully.
    Succeeded {
        /// Step name.
        step: String,
    },

    /// A fatal step failed; the run is about to abort.
    Failed {
        /// Step name.
        step: String,
        /// Exit code the run will terminate with.
        exit_code: i32,
        /// Error message.
        message: String,
    },

    /// A non-fatal step failed; the run continues.
    Warned {
        /// Step name.
        step: String,
        /// Error message.
        message: String,
    },

    /// Every step was skipped or succeeded.
    Completed {
        /// Number of steps that ran.
        succeeded: usize,
        /// Number of steps skipped.
        skipped: usize,
    },

    /// The run stopped early.
    Aborted {
        /// The step that stopped it.
        step: String,
        /// Exit code of the run.
        exit_code: i32,
    },
}

impl StepEvent {
    /// Short description of the event kind.
    ///
    /// ```rust
    /// use llms_bootstrap::StepEvent;
    ///
    /// let event = StepEvent::Skipped { step: "Install pigz".to_string() };
    /// assert_eq!(event.description(), "Already satisfied");
    /// ```
    pub fn description(&self) -> &'static str {
        match self {
            Self::Started { .. } => "Checking",
            Self::Skipped { .. } => "Already satisfied",
            Self::Running { .. } => "Running",
            Self::Succeeded { .. } => "Done",
            Self::Failed { .. } => "Failed",
            Self::Warned { .. } => "Failed, continuing",
            Self::Completed { .. } => "Bootstrap complete",
            Self::Aborted { .. } => "Bootstrap aborted",
        }
    }

    /// Whether this is the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Aborted { .. })
    }
}
