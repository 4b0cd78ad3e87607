use std::borrow::Cow;

use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::*;

const HASH: &str = "hash";
const MAX_AD_TIME: &str = "max_ad_time_secs";
const SKIP_THRESHOLDS: &str = "video_skip_thresholds_secs";
const END_CARD_DURATIONS: &str = "ec_durs_secs";
const MAIN_AD: &str = "main_ad";
const END_CARD: &str = "end_card";

const SKIP_MIN: &str = "min";
const SKIP_AFTER: &str = "after";

const STATIC_DURATION: &str = "static";
const INTERACTIVE_DURATION: &str = "interactive";
const MIN_STATIC_DURATION: &str = "min_static";
const MIN_INTERACTIVE_DURATION: &str = "min_interactive";

const MIN_NEXT_ACTION: &str = "min_next_action_secs";
const COUNTDOWN_DELAY: &str = "cd_delay_secs";
const SHOW_COUNTDOWN: &str = "show_cd";

/// A typed value that can be read out of an untyped JSON field
pub(crate) trait RawValue: Sized {
    fn from_raw(value: &Value) -> Option<Self>;
}

impl RawValue for f64 {
    fn from_raw(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl RawValue for String {
    fn from_raw(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

// Booleans also arrive as the integers 0 and 1.
impl RawValue for bool {
    fn from_raw(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(*flag),
            Value::Number(number) => match number.as_u64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            _ => None,
        }
    }
}

/// Read `key` from `object`, keeping it only if it has the right type and passes `is_valid`
pub(crate) fn read_valid<T: RawValue>(
    object: &Map<String, Value>,
    key: &str,
    is_valid: impl Fn(&T) -> bool,
) -> Option<T> {
    let raw = object.get(key)?;
    let value = T::from_raw(raw).filter(|value| is_valid(value));
    if value.is_none() {
        debug!("Ignoring invalid value for `{}`: {}", key, raw);
    }
    value
}

/// Read `key` from `object`, falling back to `default` when it is absent or invalid
pub(crate) fn validated<T: RawValue>(
    object: &Map<String, Value>,
    key: &str,
    is_valid: impl Fn(&T) -> bool,
    default: T,
) -> T {
    read_valid(object, key, is_valid).unwrap_or(default)
}

fn non_negative(value: &f64) -> bool {
    value.is_finite() && *value >= 0.0
}

/// Seconds field: any finite value >= 0
fn seconds(object: &Map<String, Value>, key: &str, default: f64) -> f64 {
    validated(object, key, non_negative, default)
}

/// Borrow `value` as an object; anything else reads as an empty object
fn fields(value: &Value) -> Cow<'_, Map<String, Value>> {
    match value {
        Value::Object(object) => Cow::Borrowed(object),
        Value::Null => Cow::Owned(Map::new()),
        other => {
            debug!("Expected an object, found {}", other);
            Cow::Owned(Map::new())
        }
    }
}

/// Decode a single skip threshold (`{"min": .., "after": ..}`)
pub fn decode_skip_threshold(value: &Value, kind: ExperienceKind) -> VastSkipThreshold {
    let object = fields(value);
    let default = VastSkipThreshold::defaults(kind);

    VastSkipThreshold {
        skip_min: seconds(&object, SKIP_MIN, default.skip_min),
        skip_after: seconds(&object, SKIP_AFTER, default.skip_after),
    }
}

/// Decode the end card duration block (`ec_durs_secs`)
pub fn decode_end_card_durations(value: &Value, kind: ExperienceKind) -> EndCardDurations {
    let object = fields(value);
    let default = EndCardDurations::defaults(kind);

    EndCardDurations {
        static_end_card_experience_duration: seconds(
            &object,
            STATIC_DURATION,
            default.static_end_card_experience_duration,
        ),
        interactive_end_card_experience_duration: seconds(
            &object,
            INTERACTIVE_DURATION,
            default.interactive_end_card_experience_duration,
        ),
        min_static_end_card_duration: seconds(
            &object,
            MIN_STATIC_DURATION,
            default.min_static_end_card_duration,
        ),
        min_interactive_end_card_duration: seconds(
            &object,
            MIN_INTERACTIVE_DURATION,
            default.min_interactive_end_card_duration,
        ),
    }
}

/// Decode the settings of one stage (`main_ad` or `end_card`)
pub fn decode_ad_settings(value: &Value, kind: ExperienceKind) -> AdSettings {
    let object = fields(value);
    let default = AdSettings::defaults(kind);

    AdSettings {
        min_time_until_next_action: seconds(
            &object,
            MIN_NEXT_ACTION,
            default.min_time_until_next_action,
        ),
        countdown_timer_delay: seconds(&object, COUNTDOWN_DELAY, default.countdown_timer_delay),
        show_countdown_timer: validated(
            &object,
            SHOW_COUNTDOWN,
            |_| true,
            default.show_countdown_timer,
        ),
    }
}

/// Decode the threshold list
///
/// An absent, empty or malformed list yields the single default threshold.
fn decode_skip_thresholds(
    object: &Map<String, Value>,
    kind: ExperienceKind,
) -> Vec<VastSkipThreshold> {
    let defaults = || vec![VastSkipThreshold::defaults(kind)];

    let Some(raw) = object.get(SKIP_THRESHOLDS) else {
        return defaults();
    };

    let Some(items) = raw.as_array().filter(|items| !items.is_empty()) else {
        debug!("Using default skip thresholds, got {}", raw);
        return defaults();
    };

    items
        .iter()
        .map(|item| item.is_object().then(|| decode_skip_threshold(item, kind)))
        .collect::<Option<Vec<_>>>()
        .unwrap_or_else(|| {
            debug!("Using default skip thresholds, list contains non-object entries");
            defaults()
        })
}

/// Decode a complete settings payload
///
/// This never fails: every field that is missing, has the wrong type or is out of
/// range falls back to its default for `kind`. The end card always falls back to
/// the non-rewarded defaults.
pub fn decode_settings(value: &Value, kind: ExperienceKind) -> CreativeExperienceSettings {
    let object = fields(value);
    let null = Value::Null;

    let settings_hash = read_valid::<String>(&object, HASH, |_| true);
    let max_ad_experience_time =
        seconds(&object, MAX_AD_TIME, default_max_ad_experience_time(kind));
    let vast_skip_thresholds = decode_skip_thresholds(&object, kind);
    let end_card_durations =
        decode_end_card_durations(object.get(END_CARD_DURATIONS).unwrap_or(&null), kind);
    let main_ad = decode_ad_settings(object.get(MAIN_AD).unwrap_or(&null), kind);
    let end_card =
        decode_ad_settings(object.get(END_CARD).unwrap_or(&null), ExperienceKind::NonRewarded);

    CreativeExperienceSettings::new(
        settings_hash,
        max_ad_experience_time,
        vast_skip_thresholds,
        end_card_durations,
        main_ad,
        end_card,
    )
}

/// Parse JSON text and decode it; only malformed JSON is an error
pub fn decode_str(json: &str, kind: ExperienceKind) -> Result<CreativeExperienceSettings> {
    let value: Value = serde_json::from_str(json)?;
    Ok(decode_settings(&value, kind))
}

/// Parse JSON bytes and decode them; only malformed JSON is an error
pub fn decode_slice(json: &[u8], kind: ExperienceKind) -> Result<CreativeExperienceSettings> {
    let value: Value = serde_json::from_slice(json)?;
    Ok(decode_settings(&value, kind))
}

// Plain serde deserialization uses the non-rewarded defaults.
macro_rules! lenient_deserialize {
    ($model:ty, $decode:ident) => {
        impl<'de> Deserialize<'de> for $model {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let value = Value::deserialize(deserializer)?;
                Ok($decode(&value, ExperienceKind::NonRewarded))
            }
        }
    };
}

lenient_deserialize!(VastSkipThreshold, decode_skip_threshold);
lenient_deserialize!(EndCardDurations, decode_end_card_durations);
lenient_deserialize!(AdSettings, decode_ad_settings);
lenient_deserialize!(CreativeExperienceSettings, decode_settings);
