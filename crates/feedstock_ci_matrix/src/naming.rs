//! Deterministic, length-bounded names for the emitted configs.

use feedstock_ci_types::NormalizedKey;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::config::ConfigBody;

/// Names of at least this length get a hashed short form.
pub const SHORT_NAME_THRESHOLD: usize = 49;
/// Number of characters of the full name kept in the short form.
pub const SHORT_NAME_PREFIX_LEN: usize = 35;
/// Number of hex digits of the hash appended to the short form.
pub const SHORT_NAME_HASH_LEN: usize = 10;

/// CI providers derive marker file names from the config name using this
/// prefix; together they must stay below [`MAX_FILE_NAME_LEN`].
pub const BUILD_DONE_PREFIX: &str = "conda-forge-build-done-";
/// Upper bound for file names derived from a config name.
pub const MAX_FILE_NAME_LEN: usize = 250;

/// The variable part of a config name: every top-level loop variable
/// (except `target_platform`) followed by its first value, in key order.
///
/// Everything that is not ASCII alphanumeric becomes an underscore so that the
/// name is safe to use as a file name.
pub fn package_key(body: &ConfigBody, top_level_loop_vars: &BTreeSet<NormalizedKey>) -> String {
    let key: String = top_level_loop_vars
        .iter()
        .filter(|key| key.as_str() != "target_platform")
        .filter_map(|key| {
            let value = body.get(key)?.first()?;
            Some(format!("{}{}", key.as_str(), value))
        })
        .collect();

    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// The hashed short form of `name`, or `name` itself if it is short enough.
pub fn short_config_name(name: &str) -> String {
    if name.len() < SHORT_NAME_THRESHOLD {
        return name.to_string();
    }

    let hash = hex::encode(Sha256::digest(name.as_bytes()));
    let prefix: String = name.chars().take(SHORT_NAME_PREFIX_LEN).collect();
    format!("{prefix}_h{}", &hash[..SHORT_NAME_HASH_LEN])
}

/// Returns `(config_name, short_config_name)` for a config of the platform
/// with the given prefix (e.g. `linux_64`).
///
/// The short form replaces the full name when file names derived from it
/// would get too long.
pub fn config_names(
    prefix: &str,
    body: &ConfigBody,
    top_level_loop_vars: &BTreeSet<NormalizedKey>,
) -> (String, String) {
    let config_name = format!("{prefix}_{}", package_key(body, top_level_loop_vars));
    let short_name = short_config_name(&config_name);

    if BUILD_DONE_PREFIX.len() + config_name.len() >= MAX_FILE_NAME_LEN {
        tracing::debug!("shortening config name {config_name} to {short_name}");
        (short_name.clone(), short_name)
    } else {
        (config_name, short_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigValue;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn body(entries: &[(&str, &str)]) -> ConfigBody {
        let mut body = ConfigBody::default();
        for (key, value) in entries {
            body.variables
                .insert((*key).into(), ConfigValue::List(vec![(*value).into()]));
        }
        body
    }

    fn loop_vars(keys: &[&str]) -> BTreeSet<NormalizedKey> {
        keys.iter().map(|&k| k.into()).collect()
    }

    #[rstest]
    #[case(&[("python", "3.10.* *_cpython")], &["python"], "python3_10_____cpython")]
    #[case(&[("python", "3.9"), ("numpy", "1.21")], &["python", "numpy"], "numpy1_21python3_9")]
    #[case(&[("target_platform", "linux-64")], &["target_platform"], "")]
    #[case(&[("python", "3.9")], &["python", "not_present"], "python3_9")]
    fn test_package_key(
        #[case] entries: &[(&str, &str)],
        #[case] keys: &[&str],
        #[case] expected: &str,
    ) {
        assert_eq!(package_key(&body(entries), &loop_vars(keys)), expected);
    }

    #[test]
    fn test_short_names() {
        assert_eq!(short_config_name("linux_64_python3_9"), "linux_64_python3_9");

        let long = "linux_64_c_compiler_version12cuda_compiler_version11_8python3_10";
        let short = short_config_name(long);
        assert_eq!(short.len(), SHORT_NAME_PREFIX_LEN + 2 + SHORT_NAME_HASH_LEN);
        assert!(short.starts_with(&long[..SHORT_NAME_PREFIX_LEN]));
        // stable for identical input
        assert_eq!(short, short_config_name(long));
        assert_ne!(short, short_config_name(&format!("{long}x")));
    }

    #[test]
    fn test_overlong_names_are_replaced() {
        let value = "x".repeat(240);
        let long = body(&[("python", value.as_str())]);
        let (name, short) = config_names("linux_64", &long, &loop_vars(&["python"]));
        assert_eq!(name, short);
        assert!(name.len() < SHORT_NAME_THRESHOLD);

        let plain = body(&[("python", "3.9")]);
        let (name, short) = config_names("linux_64", &plain, &loop_vars(&["python"]));
        assert_eq!(name, "linux_64_python3_9");
        assert_eq!(short, name);
    }
}
