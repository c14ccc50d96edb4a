// -------------------------------------------------------------------------------------------------
// ---- LogLevel -----------------------------------------------------------------------------------

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// `EnvFilter` directive for this level. Below `trace`, the bus and
    /// WebSocket libraries are held at `warn` so frame-level chatter from
    /// them does not drown the gateway's own logs.
    pub fn filter_directive(self) -> String {
        match self {
            LogLevel::Trace => "trace".to_string(),
            level => format!(
                "{},zbus=warn,tungstenite=warn,tokio_tungstenite=warn",
                level.as_str()
            ),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// -------------------------------------------------------------------------------------------------
// ---- Tests --------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_lets_everything_through() {
        assert_eq!(LogLevel::Trace.filter_directive(), "trace");
    }

    #[test]
    fn other_levels_quiet_dependencies() {
        let directive = LogLevel::Debug.filter_directive();
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("zbus=warn"));
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }
}

// -------------------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------
