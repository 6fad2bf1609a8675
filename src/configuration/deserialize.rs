pub mod duration {
    use crate::time::timeunit::parse_duration;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDuration {
        Millis(u64),
        Text(String),
    }

    /// Accepts either a human duration (`"1m30s"`) or a plain number of milliseconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        match RawDuration::deserialize(deserializer)? {
            RawDuration::Millis(millis) => Ok(Duration::from_millis(millis)),
            RawDuration::Text(text) => parse_duration(&text).map_err(D::Error::custom),
        }
    }
}

pub mod optional_duration {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "super::duration")] Duration);

        Option::<Wrapper>::deserialize(deserializer).map(|v| v.map(|Wrapper(d)| d))
    }
}

pub mod concurrency_limit {
    use crate::configuration::constants::common::MAX_CONCURRENCY_LIMIT;
    use serde::{Deserialize, Deserializer};

    /// Clamps to `1..=MAX_CONCURRENCY_LIMIT`, a zero limit would mean no limit at all.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        usize::deserialize(deserializer).map(|limit| limit.clamp(1, MAX_CONCURRENCY_LIMIT))
    }
}

pub mod http_method {
    use hyper::Method;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::str::FromStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Method, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Method::from_str(value.to_uppercase().as_str()).map_err(D::Error::custom)
    }
}

pub mod base64_property {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        base64::decode(value).map_err(D::Error::custom)
    }
}
