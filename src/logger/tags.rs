/// Log tags identifying the subsystem that emitted a line

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Journal,
    Market,
    Detector,
    Mode,
    Policy,
    Scoring,
    Planner,
    Exit,
    Cycle,
    Observer,
    Signals,
    Other(String),
}

impl LogTag {
    /// Key used by `--debug <key>` flags
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::Other(s) => s.to_lowercase(),
            other => other.to_plain_string().to_lowercase(),
        }
    }

    /// Uncolored label written to the log file
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Config => "CONFIG",
            LogTag::Journal => "JOURNAL",
            LogTag::Market => "MARKET",
            LogTag::Detector => "DETECTOR",
            LogTag::Mode => "MODE",
            LogTag::Policy => "POLICY",
            LogTag::Scoring => "SCORING",
            LogTag::Planner => "PLANNER",
            LogTag::Exit => "EXIT",
            LogTag::Cycle => "CYCLE",
            LogTag::Observer => "OBSERVER",
            LogTag::Signals => "SIGNALS",
            LogTag::Other(s) => return s.to_uppercase(),
        }
        .to_string()
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
