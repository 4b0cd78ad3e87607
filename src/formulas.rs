use crate::models::{AdType, CreativeExperienceSettings, EndCardType, MAIN_AD_INDEX};

impl CreativeExperienceSettings {
    /// Value to show on the countdown for stage `index` (0 = main ad, 1 = end card)
    ///
    /// `elapsed_time` is measured from the start of the whole experience. Returns 0 for
    /// a stage that does not exist for `ad_type`.
    pub fn countdown_time(&self, ad_type: AdType, index: isize, elapsed_time: f64) -> f64 {
        let stage_count = ad_type.stage_count().min(self.ad_settings().len());
        let Ok(index) = usize::try_from(index) else {
            return 0.0;
        };
        if index >= stage_count {
            return 0.0;
        }

        let elapsed_time = elapsed_time.max(0.0);
        let next_action = self.stage_time_until_next_action(ad_type, index);

        let is_last_stage = index == stage_count - 1;
        if !is_last_stage || self.max_ad_experience_time() <= 0.0 {
            return next_action;
        }

        let close_after = match ad_type {
            AdType::Vast {
                video_duration,
                end_card,
            } => self.close_after_duration(video_duration, end_card),
            AdType::Other => self.max_ad_experience_time(),
        };

        (close_after - elapsed_time).max(next_action)
    }

    /// Time after which the whole experience closes on its own
    pub fn close_after_duration(&self, video_duration: f64, end_card: EndCardType) -> f64 {
        let total = video_duration.max(0.0) + self.end_card_experience_duration(end_card);

        if self.max_ad_experience_time() > 0.0 {
            total.min(self.max_ad_experience_time())
        } else {
            total
        }
    }

    /// Seconds into a video of `duration` after which skipping is allowed
    ///
    /// Uses the threshold with the largest `skip_min` not above `duration`, in any list
    /// order. A video shorter than every threshold must be watched to the end.
    pub fn time_until_next_action_for_video(&self, duration: f64) -> f64 {
        let duration = duration.max(0.0);

        let threshold = self
            .vast_skip_thresholds()
            .iter()
            .filter(|threshold| threshold.skip_min <= duration)
            .max_by(|a, b| a.skip_min.total_cmp(&b.skip_min));

        match threshold {
            Some(threshold) => threshold.skip_after.min(duration),
            None => duration,
        }
    }

    /// Minimum time an end card of the given type stays on screen
    pub fn time_until_next_action_for_end_card(&self, end_card: EndCardType) -> f64 {
        let durations = self.end_card_durations();
        match end_card {
            EndCardType::None => 0.0,
            EndCardType::Static => durations.min_static_end_card_duration,
            EndCardType::Interactive => durations.min_interactive_end_card_duration,
        }
    }

    fn end_card_experience_duration(&self, end_card: EndCardType) -> f64 {
        let durations = self.end_card_durations();
        match end_card {
            EndCardType::None => 0.0,
            EndCardType::Static => durations.static_end_card_experience_duration,
            EndCardType::Interactive => durations.interactive_end_card_experience_duration,
        }
    }

    fn stage_time_until_next_action(&self, ad_type: AdType, index: usize) -> f64 {
        match ad_type {
            AdType::Vast { video_duration, .. } if index == MAIN_AD_INDEX => {
                self.time_until_next_action_for_video(video_duration)
            }
            AdType::Vast { end_card, .. } => self.time_until_next_action_for_end_card(end_card),
            AdType::Other => self.ad_settings()[index].min_time_until_next_action,
        }
    }
}
