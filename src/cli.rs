use std::net::SocketAddr;
use std::process;

use chrono_tz::Tz;
use getopts::{Matches, Options};
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug)]
pub struct Args {
    pub address: SocketAddr,
    pub timezone: Tz,
    pub max_occurrences: u16,
    pub timeout: Duration,
    pub enable_cache: bool,
    pub cache_ttl: Duration,
}

fn opts() -> Options {
    let mut opts = Options::new();
    opts.optflag(
        "h",
        "help",
        concat!("Print the help output of ", env!("CARGO_PKG_NAME")),
    );
    opts.optopt(
        "a",
        "address",
        "Socket address (IP and port) to listen on [Default: 127.0.0.1:8080]",
        "SOCKET_ADDRESS",
    );
    opts.optopt(
        "z",
        "timezone",
        "Time zone the year boundary and all-day events are anchored to [Default: Europe/Berlin]",
        "TZ",
    );
    opts.optopt(
        "m",
        "max-occurrences",
        "Maximum number of occurrences expanded per recurring event [Default: 1000]",
        "COUNT",
    );
    opts.optopt(
        "T",
        "timeout",
        "Timeout for downloading a feed [Default: 30]",
        "SECONDS",
    );
    opts.optflag(
        "c",
        "enable-cache",
        "Enable caching of parsed calendars [Default: false]",
    );
    opts.optopt(
        "t",
        "cache-ttl",
        "Time-to-live for cached calendars [Default: 3600]",
        "SECONDS",
    );
    opts
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Options(#[from] getopts::Fail),
    #[error("Provided value for option '{name}' is invalid: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

fn get_value<T>(matches: &Matches, name: &'static str, default: T) -> Result<T, CliError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    matches
        .opt_get_default(name, default)
        .map_err(|err| CliError::InvalidValue {
            name,
            reason: err.to_string(),
        })
}

/// Parses `args` without exiting. `None` means help was requested.
pub fn try_parse(args: Vec<String>) -> Result<Option<Args>, CliError> {
    let matches = opts().parse(args)?;

    if matches.opt_present("help") {
        return Ok(None);
    }

    Ok(Some(Args {
        address: get_value(&matches, "address", SocketAddr::from(([127, 0, 0, 1], 8080)))?,
        timezone: get_value(&matches, "timezone", chrono_tz::Europe::Berlin)?,
        max_occurrences: get_value(&matches, "max-occurrences", 1000)?,
        timeout: Duration::from_secs(get_value(&matches, "timeout", 30)?),
        enable_cache: matches.opt_present("enable-cache"),
        cache_ttl: Duration::from_secs(get_value(&matches, "cache-ttl", 3600)?),
    }))
}

pub fn parse(args: Vec<String>) -> Args {
    match try_parse(args) {
        Ok(Some(args)) => args,
        Ok(None) => {
            let opts = opts();
            println!("{}", opts.usage(&opts.short_usage(env!("CARGO_PKG_NAME"))));
            process::exit(0);
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
