use std::fmt;

/// Lifecycle state of a tracked container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerState {
    #[default]
    Unknown,
    Created,
    Running,
    Paused,
    Stopped,
    Exited,
    Deleted,
}

impl ContainerState {
    const ALL: [ContainerState; 7] = [
        ContainerState::Unknown,
        ContainerState::Created,
        ContainerState::Running,
        ContainerState::Paused,
        ContainerState::Stopped,
        ContainerState::Exited,
        ContainerState::Deleted,
    ];

    /// Parses a state as reported by the engine. Unrecognised strings map to
    /// [`ContainerState::Unknown`].
    pub fn parse(src: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str().eq_ignore_ascii_case(src))
            .unwrap_or_default()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerState::Unknown => "unknown",
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Stopped => "stopped",
            ContainerState::Exited => "exited",
            ContainerState::Deleted => "deleted",
        }
    }

    pub fn is_running(self) -> bool {
        self == ContainerState::Running
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event codes published on the engine's event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerEvent {
    Create,
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
    Kill,
    Die,
    Destroy,
    Oom,
    Rm,
    Attach,
    Commit,
    Copy,
    Detach,
    ExecCreate,
    ExecDetach,
    ExecStart,
    Export,
    HealthStatus,
    Rename,
    Resize,
    Top,
    Update,
}

impl ContainerEvent {
    const ALL: [ContainerEvent; 24] = [
        ContainerEvent::Create,
        ContainerEvent::Start,
        ContainerEvent::Stop,
        ContainerEvent::Restart,
        ContainerEvent::Pause,
        ContainerEvent::Unpause,
        ContainerEvent::Kill,
        ContainerEvent::Die,
        ContainerEvent::Destroy,
        ContainerEvent::Oom,
        ContainerEvent::Rm,
        ContainerEvent::Attach,
        ContainerEvent::Commit,
        ContainerEvent::Copy,
        ContainerEvent::Detach,
        ContainerEvent::ExecCreate,
        ContainerEvent::ExecDetach,
        ContainerEvent::ExecStart,
        ContainerEvent::Export,
        ContainerEvent::HealthStatus,
        ContainerEvent::Rename,
        ContainerEvent::Resize,
        ContainerEvent::Top,
        ContainerEvent::Update,
    ];

    /// Parses an event status string, ignoring case. Returns `None` for statuses
    /// that are not part of the vocabulary (e.g. `exec_start: sh`).
    pub fn parse(src: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|ev| ev.as_str().eq_ignore_ascii_case(src))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContainerEvent::Create => "create",
            ContainerEvent::Start => "start",
            ContainerEvent::Stop => "stop",
            ContainerEvent::Restart => "restart",
            ContainerEvent::Pause => "pause",
            ContainerEvent::Unpause => "unpause",
            ContainerEvent::Kill => "kill",
            ContainerEvent::Die => "die",
            ContainerEvent::Destroy => "destroy",
            ContainerEvent::Oom => "oom",
            ContainerEvent::Rm => "rm",
            ContainerEvent::Attach => "attach",
            ContainerEvent::Commit => "commit",
            ContainerEvent::Copy => "copy",
            ContainerEvent::Detach => "detach",
            ContainerEvent::ExecCreate => "exec_create",
            ContainerEvent::ExecDetach => "exec_detach",
            ContainerEvent::ExecStart => "exec_start",
            ContainerEvent::Export => "export",
            ContainerEvent::HealthStatus => "health_status",
            ContainerEvent::Rename => "rename",
            ContainerEvent::Resize => "resize",
            ContainerEvent::Top => "top",
            ContainerEvent::Update => "update",
        }
    }

    /// The lifecycle state this event moves a container into, if any.
    ///
    /// Events without a target state only carry metadata (e.g. a rename).
    pub fn target_state(self) -> Option<ContainerState> {
        use ContainerEvent::*;
        match self {
            Create => Some(ContainerState::Created),
            Start | Restart | Unpause => Some(ContainerState::Running),
            Pause => Some(ContainerState::Paused),
            Stop => Some(ContainerState::Stopped),
            Kill | Die | Oom | Rm => Some(ContainerState::Exited),
            Destroy => Some(ContainerState::Deleted),
            Attach | Commit | Copy | Detach | ExecCreate | ExecDetach | ExecStart | Export
            | HealthStatus | Rename | Resize | Top | Update => None,
        }
    }
}

impl fmt::Display for ContainerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
