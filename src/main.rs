use std::{env, io::Write, process::ExitCode, sync::LazyLock};

use {
    anyhow::Context,
    jiff::{Timestamp, Zoned, tz::TimeZone},
};

mod args;
mod calendar;
mod candidates;
mod cmd;
mod datetime;
mod logger;
mod parse;
mod point;
mod schedule;
mod style;

static TZ: LazyLock<TimeZone> = LazyLock::new(|| TimeZone::system());

static NOW: LazyLock<Zoned> = LazyLock::new(|| {
    let ts = match read_env_cadence_now() {
        Ok(Some(ts)) => {
            log::trace!(
                "setting current time to `{ts}` from `CADENCE_NOW` \
                 environment variable",
            );
            ts
        }
        Ok(None) => {
            let now = Timestamp::now();
            log::trace!(
                "`CADENCE_NOW` environment variable not set, using \
                 current time `{now}`",
            );
            now
        }
        Err(err) => {
            let now = Timestamp::now();
            log::warn!(
                "reading `CADENCE_NOW` failed, using current time \
                 `{now}`: {err:#}",
            );
            now
        }
    };
    ts.to_zoned(TZ.clone())
});

fn main() -> ExitCode {
    let err = match run() {
        Ok(code) => return code,
        Err(err) => err,
    };
    if let Some(help) = err.root_cause().downcast_ref::<args::Help>() {
        return print_to_stdout(help);
    }
    if let Some(version) = err.root_cause().downcast_ref::<args::Version>() {
        return print_to_stdout(version);
    }
    // A broken pipe means whoever was reading our output went away, which
    // is a normal way for a Unix pipeline to end. The Rust runtime ignores
    // SIGPIPE, so it shows up as an I/O error instead.
    for cause in err.chain() {
        if let Some(err) = cause.downcast_ref::<std::io::Error>() {
            if err.kind() == std::io::ErrorKind::BrokenPipe {
                return ExitCode::SUCCESS;
            }
        }
        // `serde_json::to_writer` wraps I/O errors in its own error type.
        if let Some(err) = cause.downcast_ref::<serde_json::Error>() {
            if err.io_error_kind() == Some(std::io::ErrorKind::BrokenPipe) {
                return ExitCode::SUCCESS;
            }
        }
    }
    let mut stderr = std::io::stderr().lock();
    let _ = if env::var("RUST_BACKTRACE").map_or(false, |v| v == "1")
        && env::var("RUST_LIB_BACKTRACE").map_or(true, |v| v == "1")
    {
        writeln!(stderr, "{err:?}")
    } else {
        writeln!(stderr, "{err:#}")
    };
    ExitCode::from(2)
}

fn run() -> anyhow::Result<ExitCode> {
    let level = env::var("CADENCE_LOG").unwrap_or_else(|_| String::new());
    let level = match &*level {
        "" | "off" => log::LevelFilter::Off,
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        unk => anyhow::bail!("unrecognized log level '{unk}'"),
    };
    log::set_max_level(level);
    // The logger starts out without a time zone so that anything logged
    // while `TZ` is being resolved is stamped in UTC.
    let logger = logger::Logger::init()?;
    logger.set_time_zone(TZ.clone());
    cmd::run(&mut lexopt::Parser::from_env())
}

/// Writes `-h/--help` or `--version` output to stdout.
fn print_to_stdout(msg: &dyn std::fmt::Display) -> ExitCode {
    match writeln!(std::io::stdout(), "{msg}") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::from(2),
    }
}

fn read_env_cadence_now() -> anyhow::Result<Option<Timestamp>> {
    let Some(val) = env::var_os("CADENCE_NOW") else { return Ok(None) };
    let Some(val) = val.to_str() else {
        anyhow::bail!(
            "`CADENCE_NOW` environment variable is not valid UTF-8: {val:?}"
        )
    };
    val.parse::<Timestamp>()
        .context(
            "`CADENCE_NOW` environment variable is not a valid \
             RFC 3339 timestamp",
        )
        .map(Some)
}
