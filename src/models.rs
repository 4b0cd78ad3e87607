use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::ExperienceError;

/// Selects which default table applies when a settings field is missing or invalid
///
/// The flag comes from the caller that requested the ad, never from the payload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExperienceKind {
    #[default]
    NonRewarded,
    Rewarded,
}

impl From<bool> for ExperienceKind {
    fn from(is_rewarded: bool) -> Self {
        if is_rewarded {
            ExperienceKind::Rewarded
        } else {
            ExperienceKind::NonRewarded
        }
    }
}

/// Represents a single VAST skip rule
///
/// Once a video is at least `skip_min` seconds long, it becomes skippable
/// `skip_after` seconds into playback.
#[derive(Debug, Serialize, PartialEq, Clone, Copy)]
pub struct VastSkipThreshold {
    /// Minimum video duration for this rule to apply
    #[serde(rename = "min")]
    pub skip_min: f64,

    /// Seconds of playback before the skip action is offered
    #[serde(rename = "after")]
    pub skip_after: f64,
}

impl VastSkipThreshold {
    pub fn new(skip_min: f64, skip_after: f64) -> Self {
        Self { skip_min, skip_after }
    }

    pub fn defaults(kind: ExperienceKind) -> Self {
        match kind {
            ExperienceKind::NonRewarded => Self::new(16.0, 5.0),
            ExperienceKind::Rewarded => Self::new(0.0, 30.0),
        }
    }
}

impl Default for VastSkipThreshold {
    fn default() -> Self {
        Self::defaults(ExperienceKind::NonRewarded)
    }
}

/// Durations governing end card auto-advance and minimum dwell time
#[derive(Debug, Serialize, PartialEq, Clone, Copy)]
pub struct EndCardDurations {
    /// Time a static end card adds to the experience
    #[serde(rename = "static")]
    pub static_end_card_experience_duration: f64,

    /// Time an interactive end card adds to the experience
    #[serde(rename = "interactive")]
    pub interactive_end_card_experience_duration: f64,

    /// Minimum time a static end card stays on screen
    #[serde(rename = "min_static")]
    pub min_static_end_card_duration: f64,

    /// Minimum time an interactive end card stays on screen
    #[serde(rename = "min_interactive")]
    pub min_interactive_end_card_duration: f64,
}

impl EndCardDurations {
    pub fn new(
        static_end_card_experience_duration: f64,
        interactive_end_card_experience_duration: f64,
        min_static_end_card_duration: f64,
        min_interactive_end_card_duration: f64,
    ) -> Self {
        Self {
            static_end_card_experience_duration,
            interactive_end_card_experience_duration,
            min_static_end_card_duration,
            min_interactive_end_card_duration,
        }
    }

    pub fn defaults(kind: ExperienceKind) -> Self {
        match kind {
            ExperienceKind::NonRewarded => Self::new(0.0, 0.0, 0.0, 0.0),
            ExperienceKind::Rewarded => Self::new(5.0, 10.0, 0.0, 0.0),
        }
    }
}

impl Default for EndCardDurations {
    fn default() -> Self {
        Self::defaults(ExperienceKind::NonRewarded)
    }
}

/// Settings for one stage of the experience (main ad or end card)
#[derive(Debug, Serialize, PartialEq, Clone, Copy)]
pub struct AdSettings {
    /// Minimum time before the next action (skip or close) is enabled
    #[serde(rename = "min_next_action_secs")]
    pub min_time_until_next_action: f64,

    /// Delay before the countdown timer appears
    #[serde(rename = "cd_delay_secs")]
    pub countdown_timer_delay: f64,

    /// Whether the countdown timer is shown at all
    #[serde(rename = "show_cd")]
    pub show_countdown_timer: bool,
}

impl AdSettings {
    pub fn new(
        min_time_until_next_action: f64,
        countdown_timer_delay: f64,
        show_countdown_timer: bool,
    ) -> Self {
        Self {
            min_time_until_next_action,
            countdown_timer_delay,
            show_countdown_timer,
        }
    }

    pub fn defaults(kind: ExperienceKind) -> Self {
        match kind {
            ExperienceKind::NonRewarded => Self::new(0.0, 0.0, true),
            ExperienceKind::Rewarded => Self::new(30.0, 0.0, true),
        }
    }
}

impl Default for AdSettings {
    fn default() -> Self {
        Self::defaults(ExperienceKind::NonRewarded)
    }
}

/// Position of the main ad in [`CreativeExperienceSettings::ad_settings`]
pub const MAIN_AD_INDEX: usize = 0;

/// Position of the end card in [`CreativeExperienceSettings::ad_settings`]
pub const END_CARD_INDEX: usize = 1;

/// Complete timing configuration for an ad experience
///
/// Built once per decoded payload and never mutated. A newer payload for the same
/// ad unit replaces the whole value.
#[derive(Debug, PartialEq, Clone)]
pub struct CreativeExperienceSettings {
    settings_hash: Option<String>,
    max_ad_experience_time: f64,
    vast_skip_thresholds: Vec<VastSkipThreshold>,
    end_card_durations: EndCardDurations,
    ad_settings: [AdSettings; 2],
}

impl CreativeExperienceSettings {
    /// Create settings from already validated parts
    ///
    /// An empty threshold list is replaced with the single non-rewarded default
    /// threshold so there is always at least one rule.
    pub fn new(
        settings_hash: Option<String>,
        max_ad_experience_time: f64,
        vast_skip_thresholds: Vec<VastSkipThreshold>,
        end_card_durations: EndCardDurations,
        main_ad: AdSettings,
        end_card: AdSettings,
    ) -> Self {
        let vast_skip_thresholds = if vast_skip_thresholds.is_empty() {
            vec![VastSkipThreshold::default()]
        } else {
            vast_skip_thresholds
        };

        Self {
            settings_hash,
            max_ad_experience_time,
            vast_skip_thresholds,
            end_card_durations,
            ad_settings: [main_ad, end_card],
        }
    }

    /// Settings used when nothing was received for the given kind of ad
    ///
    /// The end card keeps the non-rewarded defaults even for rewarded ads.
    pub fn defaults(kind: ExperienceKind) -> Self {
        Self::new(
            None,
            default_max_ad_experience_time(kind),
            vec![VastSkipThreshold::defaults(kind)],
            EndCardDurations::defaults(kind),
            AdSettings::defaults(kind),
            AdSettings::defaults(ExperienceKind::NonRewarded),
        )
    }

    pub fn settings_hash(&self) -> Option<&str> {
        self.settings_hash.as_deref()
    }

    /// Upper bound on the whole experience; 0 means unbounded
    pub fn max_ad_experience_time(&self) -> f64 {
        self.max_ad_experience_time
    }

    pub fn vast_skip_thresholds(&self) -> &[VastSkipThreshold] {
        &self.vast_skip_thresholds
    }

    pub fn end_card_durations(&self) -> &EndCardDurations {
        &self.end_card_durations
    }

    /// Per-stage settings; index 0 is the main ad, index 1 the end card
    pub fn ad_settings(&self) -> &[AdSettings; 2] {
        &self.ad_settings
    }

    pub fn main_ad(&self) -> &AdSettings {
        &self.ad_settings[MAIN_AD_INDEX]
    }

    pub fn end_card(&self) -> &AdSettings {
        &self.ad_settings[END_CARD_INDEX]
    }
}

impl Default for CreativeExperienceSettings {
    fn default() -> Self {
        Self::defaults(ExperienceKind::NonRewarded)
    }
}

pub(crate) fn default_max_ad_experience_time(kind: ExperienceKind) -> f64 {
    match kind {
        ExperienceKind::NonRewarded => 0.0,
        ExperienceKind::Rewarded => 30.0,
    }
}

/// Canonical wire form, matching the keys accepted by the decoder
#[derive(Serialize)]
struct WireSettings<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<&'a str>,
    max_ad_time_secs: f64,
    video_skip_thresholds_secs: &'a [VastSkipThreshold],
    ec_durs_secs: &'a EndCardDurations,
    main_ad: &'a AdSettings,
    end_card: &'a AdSettings,
}

impl Serialize for CreativeExperienceSettings {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireSettings {
            hash: self.settings_hash(),
            max_ad_time_secs: self.max_ad_experience_time,
            video_skip_thresholds_secs: &self.vast_skip_thresholds,
            ec_durs_secs: &self.end_card_durations,
            main_ad: self.main_ad(),
            end_card: self.end_card(),
        }
        .serialize(serializer)
    }
}

/// Kind of end card following a video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndCardType {
    None,
    Static,
    Interactive,
}

impl EndCardType {
    pub fn is_present(self) -> bool {
        self != EndCardType::None
    }
}

impl fmt::Display for EndCardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndCardType::None => "none",
            EndCardType::Static => "static",
            EndCardType::Interactive => "interactive",
        };
        f.write_str(name)
    }
}

impl FromStr for EndCardType {
    type Err = ExperienceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(EndCardType::None),
            "static" => Ok(EndCardType::Static),
            "interactive" => Ok(EndCardType::Interactive),
            other => Err(ExperienceError::InvalidArgument(format!(
                "unknown end card type: {other}"
            ))),
        }
    }
}

/// What is being rendered, used to pick the right formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdType {
    /// Any non-video creative
    Other,
    /// A VAST video, optionally followed by an end card
    Vast { video_duration: f64, end_card: EndCardType },
}

impl AdType {
    pub fn vast(video_duration: f64, end_card: EndCardType) -> Self {
        AdType::Vast { video_duration, end_card }
    }

    /// Number of stages in the experience; the end card only counts when one exists
    pub fn stage_count(&self) -> usize {
        match self {
            AdType::Vast { end_card, .. } if end_card.is_present() => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewarded_defaults_keep_non_rewarded_end_card() {
        let settings = CreativeExperienceSettings::defaults(ExperienceKind::Rewarded);

        assert_eq!(settings.max_ad_experience_time(), 30.0);
        assert_eq!(settings.vast_skip_thresholds(), &[VastSkipThreshold::new(0.0, 30.0)]);
        assert_eq!(settings.end_card_durations(), &EndCardDurations::new(5.0, 10.0, 0.0, 0.0));
        assert_eq!(settings.main_ad(), &AdSettings::new(30.0, 0.0, true));
        assert_eq!(settings.end_card(), &AdSettings::default());
    }

    #[test]
    fn test_new_replaces_empty_thresholds() {
        let settings = CreativeExperienceSettings::new(
            Some("abc".to_string()),
            0.0,
            Vec::new(),
            EndCardDurations::default(),
            AdSettings::default(),
            AdSettings::default(),
        );

        assert_eq!(settings.vast_skip_thresholds(), &[VastSkipThreshold::new(16.0, 5.0)]);
        assert_eq!(settings.ad_settings().len(), 2);
        assert_eq!(settings.settings_hash(), Some("abc"));
    }

    #[test]
    fn test_stage_count() {
        assert_eq!(AdType::Other.stage_count(), 1);
        assert_eq!(AdType::vast(30.0, EndCardType::None).stage_count(), 1);
        assert_eq!(AdType::vast(30.0, EndCardType::Static).stage_count(), 2);
        assert_eq!(AdType::vast(30.0, EndCardType::Interactive).stage_count(), 2);
    }

    #[test]
    fn test_end_card_type_from_str() {
        assert_eq!("Static".parse::<EndCardType>().unwrap(), EndCardType::Static);
        assert_eq!("interactive".parse::<EndCardType>().unwrap(), EndCardType::Interactive);
        assert_eq!(EndCardType::None.to_string(), "none");
        assert!("video".parse::<EndCardType>().is_err());
    }

    #[test]
    fn test_serialize_omits_missing_hash() {
        let json = serde_json::to_value(CreativeExperienceSettings::default()).unwrap();

        assert!(json.get("hash").is_none());
        assert_eq!(json["main_ad"]["show_cd"], serde_json::Value::Bool(true));
        assert_eq!(json["video_skip_thresholds_secs"][0]["min"], 16.0);
    }
}
