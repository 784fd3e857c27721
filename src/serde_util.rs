//! Conversions between durations, tick counts and the integer types the server expects.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

use crate::{
    bson::Bson,
    bson_util::get_u64,
    error::{Error, Result},
};

/// The number of 100-nanosecond ticks in one millisecond.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

const NANOS_PER_TICK: u64 = 100;

/// Converts a tick count to the value sent as `maxTimeMS`, rounding any sub-millisecond remainder
/// up. Non-positive tick counts convert to zero.
pub fn ticks_to_max_time_ms(ticks: i64) -> Result<i32> {
    if ticks <= 0 {
        return Ok(0);
    }
    let millis = ticks / TICKS_PER_MILLISECOND + i64::from(ticks % TICKS_PER_MILLISECOND != 0);
    i32::try_from(millis).map_err(|_| {
        Error::invalid_argument(format!(
            "maxTime of {millis}ms does not fit in a 32-bit integer"
        ))
    })
}

/// Converts a tick count to a `Duration`. Negative tick counts are rejected.
pub fn duration_from_ticks(ticks: i64) -> Result<Duration> {
    let ticks = u64::try_from(ticks).map_err(|_| {
        Error::invalid_argument(format!("duration of {ticks} ticks must not be negative"))
    })?;
    Ok(Duration::from_nanos(ticks.saturating_mul(NANOS_PER_TICK)))
}

/// Converts a `Duration` to the value sent as `maxTimeMS`, rounding any sub-millisecond
/// remainder up.
pub fn duration_to_max_time_ms(duration: Duration) -> Result<i32> {
    let nanos = duration.as_nanos();
    let per_tick = u128::from(NANOS_PER_TICK);
    let ticks = nanos / per_tick + u128::from(nanos % per_tick != 0);
    let ticks = i64::try_from(ticks).map_err(|_| {
        Error::invalid_argument(format!("maxTime of {duration:?} is out of range"))
    })?;
    ticks_to_max_time_ms(ticks)
}

pub(crate) mod duration_option_as_int_seconds {
    use super::*;

    pub(crate) fn serialize<S: Serializer>(
        val: &Option<Duration>,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        match val {
            Some(duration) if duration.as_secs() > i32::MAX as u64 => {
                serializer.serialize_i64(duration.as_secs() as i64)
            }
            Some(duration) => serializer.serialize_i32(duration.as_secs() as i32),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(
        deserializer: D,
    ) -> std::result::Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

pub(crate) fn serialize_duration_option_as_int_millis<S: Serializer>(
    val: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match val {
        Some(duration) if duration.as_millis() > i32::MAX as u128 => {
            serializer.serialize_i64(duration.as_millis() as i64)
        }
        Some(duration) => serializer.serialize_i32(duration.as_millis() as i32),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_duration_option_from_u64_millis<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<u64>::deserialize(deserializer)?;
    Ok(millis.map(Duration::from_millis))
}

#[allow(clippy::trivially_copy_pass_by_ref)]
pub(crate) fn serialize_u32_option_as_i32<S: Serializer>(
    val: &Option<u32>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match val {
        Some(ref val) => bson::serde_helpers::serialize_u32_as_i32(val, serializer),
        None => serializer.serialize_none(),
    }
}

pub(crate) fn deserialize_u64_from_bson_number<'de, D>(
    deserializer: D,
) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let bson = Bson::deserialize(deserializer)?;
    get_u64(&bson)
        .ok_or_else(|| serde::de::Error::custom(format!("could not deserialize u64 from {bson:?}")))
}
