//! Collects the string settings shared by the core and the HTTP collaborators.

use std::collections::HashMap;

const ENV_PREFIX: &str = "PULLSOURCE_";
/// Environment variables with the prefix that are not settings.
const ENV_RESERVED: &[&str] = &["PULLSOURCE_DEBUG"];

/// `PULLSOURCE_POLL_INTERVAL_MILLIS=10` becomes `poll.interval.millis=10`, `--set` entries are
/// applied on top.
pub(crate) fn load(
    env: impl IntoIterator<Item = (String, String)>,
    overrides: impl IntoIterator<Item = impl AsRef<str>>,
) -> Result<HashMap<String, String>, String> {
    let mut settings: HashMap<String, String> = env
        .into_iter()
        .filter(|(name, _)| !ENV_RESERVED.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            name.strip_prefix(ENV_PREFIX)
                .map(|key| (key.to_lowercase().replace('_', "."), value))
        })
        .collect();

    for entry in overrides {
        let entry = entry.as_ref();
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| format!("expected KEY=VALUE, got {entry:?}"))?;
        settings.insert(key.trim().to_string(), value.to_string());
    }
    Ok(settings)
}
