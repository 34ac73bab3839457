//! Configuration of the polling core, read from the host's string settings. Keys that are not
//! listed here belong to the collaborators and are ignored.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;
use crate::Result;
use crate::filter::RecordFilter;
use crate::offset::OffsetMap;
use crate::sorter::RecordSorter;
use crate::source::ParseErrorPolicy;
use crate::throttler::Throttler;

pub const POLL_INTERVAL_MILLIS: &str = "poll.interval.millis";
pub const POLL_CATCHUP_INTERVAL_MILLIS: &str = "poll.catchup.interval.millis";
pub const POLL_SLEEP_INTERVAL_MILLIS: &str = "poll.sleep.interval.millis";
pub const POLL_INITIAL_OFFSET: &str = "poll.initial.offset";
pub const RECORD_SORTER: &str = "record.sorter";
pub const RECORD_FILTER: &str = "record.filter";
pub const RESPONSE_PARSE_SKIP_ERRORS: &str = "response.parse.skip.errors";

const DEFAULT_POLL_INTERVAL_MILLIS: u64 = 60_000;
const DEFAULT_SLEEP_INTERVAL_MILLIS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// Minimum time between two polls (tail interval for the adaptable throttler).
    pub poll_interval: Duration,
    /// Shorter interval used while the offset lags behind. Enables the adaptable throttler.
    pub catchup_interval: Option<Duration>,
    /// Pause after a poll that found nothing new.
    pub sleep_interval: Duration,
    /// Offset used when the checkpoint store has nothing.
    pub initial_offset: OffsetMap,
    pub sorter: RecordSorter,
    pub filter: RecordFilter,
    pub parse_error_policy: ParseErrorPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MILLIS),
            catchup_interval: None,
            sleep_interval: Duration::from_millis(DEFAULT_SLEEP_INTERVAL_MILLIS),
            initial_offset: OffsetMap::new(),
            sorter: RecordSorter::default(),
            filter: RecordFilter::default(),
            parse_error_policy: ParseErrorPolicy::default(),
        }
    }
}

impl SourceConfig {
    pub fn load(
        settings: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let settings: HashMap<String, String> = settings
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .collect();
        let defaults = SourceConfig::default();

        let millis = |key: &str| -> Result<Option<Duration>> {
            settings
                .get(key)
                .map(|v| {
                    v.trim().parse::<u64>().map(Duration::from_millis).map_err(|e| {
                        Error::Config(format!("{key}: expected milliseconds, got {v:?}: {e}"))
                    })
                })
                .transpose()
        };

        let initial_offset = match settings.get(POLL_INITIAL_OFFSET) {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str::<OffsetMap>(raw)
                .map_err(|e| Error::Config(format!("{POLL_INITIAL_OFFSET}: {e}")))?,
            _ => defaults.initial_offset,
        };

        Ok(SourceConfig {
            poll_interval: millis(POLL_INTERVAL_MILLIS)?.unwrap_or(defaults.poll_interval),
            catchup_interval: millis(POLL_CATCHUP_INTERVAL_MILLIS)?,
            sleep_interval: millis(POLL_SLEEP_INTERVAL_MILLIS)?.unwrap_or(defaults.sleep_interval),
            initial_offset,
            sorter: parse_or(&settings, RECORD_SORTER, defaults.sorter)?,
            filter: parse_or(&settings, RECORD_FILTER, defaults.filter)?,
            parse_error_policy: parse_or(
                &settings,
                RESPONSE_PARSE_SKIP_ERRORS,
                defaults.parse_error_policy,
            )?,
        })
    }

    pub fn throttler(&self) -> Throttler {
        match self.catchup_interval {
            Some(catchup) => Throttler::adaptable(self.poll_interval, catchup),
            None => Throttler::fixed(self.poll_interval),
        }
    }
}

fn parse_or<T>(settings: &HashMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr<Err = Error>,
{
    match settings.get(key) {
        Some(v) => v.trim().parse(),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offset::{KEY, OffsetValue};

    #[test]
    fn test_load_defaults() {
        let config = SourceConfig::load(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, SourceConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.sleep_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_load_all_keys() {
        let config = SourceConfig::load([
            (POLL_INTERVAL_MILLIS, "5000"),
            (POLL_CATCHUP_INTERVAL_MILLIS, "100"),
            (POLL_SLEEP_INTERVAL_MILLIS, "250"),
            (POLL_INITIAL_OFFSET, r#"{"key": "k0", "offsetIndex": "3"}"#),
            (RECORD_SORTER, "desc"),
            (RECORD_FILTER, "passthrough"),
            (RESPONSE_PARSE_SKIP_ERRORS, "true"),
            ("http.request.url", "ignored by the core"),
        ])
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_millis(5000));
        assert_eq!(config.catchup_interval, Some(Duration::from_millis(100)));
        assert_eq!(config.sleep_interval, Duration::from_millis(250));
        assert_eq!(
            config.initial_offset.get(KEY),
            Some(&OffsetValue::from("k0"))
        );
        assert_eq!(config.sorter, RecordSorter::Desc);
        assert_eq!(config.filter, RecordFilter::Passthrough);
        assert_eq!(config.parse_error_policy, ParseErrorPolicy::Skip);
    }

    #[test]
    fn test_load_invalid_values() {
        let err = SourceConfig::load([(POLL_INTERVAL_MILLIS, "soon")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = SourceConfig::load([(POLL_INITIAL_OFFSET, "[1, 2]")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = SourceConfig::load([(RESPONSE_PARSE_SKIP_ERRORS, "maybe")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
