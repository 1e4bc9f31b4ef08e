use std::fmt;

/// Block 运行时状态
///
/// 每个条目按线性顺序推进，`Failed` 可由任意非终止状态进入。
/// `Destroyed` 与 `Failed` 为终止状态，条目不会被复用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Void,
    Creating,
    Created,
    Starting,
    Started,
    Stopping,
    Stopped,
    Destroying,
    Destroyed,
    Failed,
}

impl State {
    /// 线性推进中的下一个状态
    pub fn successor(self) -> Option<State> {
        match self {
            State::Void => Some(State::Creating),
            State::Creating => Some(State::Created),
            State::Created => Some(State::Starting),
            State::Starting => Some(State::Started),
            State::Started => Some(State::Stopping),
            State::Stopping => Some(State::Stopped),
            State::Stopped => Some(State::Destroying),
            State::Destroying => Some(State::Destroyed),
            State::Destroyed | State::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, State::Destroyed | State::Failed)
    }

    /// 是否持有存活实例
    pub fn is_live(self) -> bool {
        matches!(
            self,
            State::Starting | State::Started | State::Stopping | State::Stopped
        )
    }

    pub fn can_transition_to(self, to: State) -> bool {
        if to == State::Failed {
            return !self.is_terminal();
        }
        self.successor() == Some(to)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Void => "VOID",
            State::Creating => "CREATING",
            State::Created => "CREATED",
            State::Starting => "STARTING",
            State::Started => "STARTED",
            State::Stopping => "STOPPING",
            State::Stopped => "STOPPED",
            State::Destroying => "DESTROYING",
            State::Destroyed => "DESTROYED",
            State::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// 生命周期阶段
///
/// 启动阶段依次为 `Create` 到 `Start`，关闭阶段为 `Stop`、`Dispose`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Create,
    Logger,
    Context,
    Service,
    Configure,
    Parameterize,
    Initialize,
    Start,
    Stop,
    Dispose,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Create => "CREATE",
            Stage::Logger => "LOGGER",
            Stage::Context => "CONTEXT",
            Stage::Service => "SERVICE",
            Stage::Configure => "CONFIGURE",
            Stage::Parameterize => "PARAMETERIZE",
            Stage::Initialize => "INITIALIZE",
            Stage::Start => "START",
            Stage::Stop => "STOP",
            Stage::Dispose => "DISPOSE",
        };
        f.write_str(name)
    }
}

/// 应用阶段，同时决定依赖图的遍历方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// 沿依赖边正向遍历，提供者先于使用者
    Startup,
    /// 沿反向边遍历，使用者先于提供者
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Startup => write!(f, "Startup"),
            Phase::Shutdown => write!(f, "Shutdown"),
        }
    }
}
