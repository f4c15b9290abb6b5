use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Arguments which configure the logging of a binary.
#[derive(clap::Args, Debug, Clone)]
pub struct LogArgs {
    /// The log verbosity. Directives of a RUST_LOG environment variable
    /// take precedence.
    #[clap(
        long = "log.level",
        value_enum,
        default_value_t = LogLevel::Info,
        env = "SQLFLOW_LOG_LEVEL",
        global = true
    )]
    pub level: LogLevel,
    /// The format of log lines. Defaults to `text` if stderr is a terminal,
    /// and `json` otherwise.
    #[clap(long = "log.format", value_enum, env = "SQLFLOW_LOG_FORMAT", global = true)]
    pub format: Option<LogFormat>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// Newline-delimited JSON objects.
    Json,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Install a global tracing subscriber which writes to stderr.
pub fn init_logging(args: &LogArgs) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from(args.level).into())
        .from_env_lossy();

    let format = args.format.unwrap_or_else(|| {
        if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    });

    let builder = tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().flatten_event(true).with_current_span(true).init(),
    }
}
