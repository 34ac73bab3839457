use std::path::PathBuf;

use clap::{Arg, ArgAction, Command, value_parser};

pub(super) const CHECKPOINT: &str = "checkpoint";
pub(super) const COMMIT_INTERVAL_MILLIS: &str = "commit-interval-millis";
pub(super) const SET: &str = "set";

pub(super) fn root_cli() -> Command {
    Command::new("pullsource")
        .about("Polls an HTTP API and writes every new record as a JSON line to stdout")
        .long_about(
            "Polls an HTTP API and writes every new record as a JSON line to stdout.\n\
             Settings are read from PULLSOURCE_* environment variables, \
             e.g. PULLSOURCE_HTTP_REQUEST_URL sets http.request.url, and from --set.",
        )
        .arg(
            Arg::new(CHECKPOINT)
                .long(CHECKPOINT)
                .value_name("PATH")
                .help("File holding the committed offset")
                .default_value("pullsource-offset.json")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(COMMIT_INTERVAL_MILLIS)
                .long(COMMIT_INTERVAL_MILLIS)
                .value_name("MILLIS")
                .help("How often the acknowledged offset is committed to the checkpoint file")
                .default_value("5000")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new(SET)
                .short('s')
                .long(SET)
                .value_name("KEY=VALUE")
                .help("Setting, takes precedence over the environment")
                .action(ArgAction::Append),
        )
}
