use std::time::Duration;

/// Estimates how long the narration collaborator takes to speak a message.
///
/// Used to simulate narration where no speech engine is attached. The core
/// never waits on this; it only reacts to `narration_finished`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NarrationPacer {
    instant: bool,
    words_per_minute: u32,
    rate: f32,
    minimum: Duration,
}

impl Default for NarrationPacer {
    fn default() -> Self {
        Self {
            instant: false,
            words_per_minute: 160,
            rate: 0.9,
            minimum: Duration::from_secs(1),
        }
    }
}

const MIN_RATE: f32 = 0.1;

impl NarrationPacer {
    /// Non-finite rates fall back to 1.0; rates below 0.1 are raised to 0.1.
    #[must_use]
    pub fn new(words_per_minute: u32, rate: f32, minimum: Duration) -> Self {
        Self {
            instant: false,
            words_per_minute: words_per_minute.max(1),
            rate: if rate.is_finite() { rate.max(MIN_RATE) } else { 1.0 },
            minimum,
        }
    }

    /// Pacer that treats every message as spoken instantly.
    #[must_use]
    pub fn instant() -> Self {
        Self {
            instant: true,
            words_per_minute: u32::MAX,
            rate: 1.0,
            minimum: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn duration_for(&self, text: &str) -> Duration {
        let words = text.split_whitespace().count();
        if self.instant || words == 0 {
            return Duration::ZERO;
        }
        #[allow(clippy::cast_precision_loss)]
        let minutes = words as f64 / (f64::from(self.words_per_minute) * f64::from(self.rate));
        Duration::try_from_secs_f64(minutes * 60.0)
            .unwrap_or(Duration::MAX)
            .max(self.minimum)
    }

    /// Like `duration_for`, but never longer than `timeout` when one is set.
    #[must_use]
    pub fn capped(&self, text: &str, timeout: Option<Duration>) -> Duration {
        let natural = self.duration_for(text);
        timeout.map_or(natural, |cap| natural.min(cap))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_takes_no_time() {
        assert_eq!(NarrationPacer::default().duration_for("   "), Duration::ZERO);
    }

    #[test]
    fn short_text_takes_at_least_the_minimum() {
        let pacer = NarrationPacer::default();
        assert_eq!(pacer.duration_for("Go!"), Duration::from_secs(1));
    }

    #[test]
    fn slower_rate_takes_longer() {
        let text = "word ".repeat(144);
        let normal = NarrationPacer::new(144, 1.0, Duration::ZERO).duration_for(&text);
        let slow = NarrationPacer::new(144, 0.5, Duration::ZERO).duration_for(&text);
        assert_eq!(normal, Duration::from_secs(60));
        assert_eq!(slow, Duration::from_secs(120));
    }

    #[test]
    fn timeout_caps_duration() {
        let text = "word ".repeat(500);
        let pacer = NarrationPacer::default();
        let cap = Duration::from_millis(250);
        assert_eq!(pacer.capped(&text, Some(cap)), cap);
        assert_eq!(pacer.capped(&text, None), pacer.duration_for(&text));
    }

    #[test]
    fn tiny_rate_is_clamped_instead_of_overflowing() {
        let text = "word ".repeat(60);
        let tiny = NarrationPacer::new(60, 1e-30, Duration::ZERO).duration_for(&text);
        let floor = NarrationPacer::new(60, MIN_RATE, Duration::ZERO).duration_for(&text);
        assert_eq!(tiny, floor);
        let secs = floor.as_secs_f64();
        assert!((599.0..=601.0).contains(&secs), "{secs}");
    }

    #[test]
    fn degenerate_settings_fall_back() {
        assert_eq!(
            NarrationPacer::new(0, f32::NAN, Duration::ZERO).duration_for("word"),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn instant_pacer_never_waits() {
        assert_eq!(
            NarrationPacer::instant().duration_for("a long sentence with words"),
            Duration::ZERO
        );
    }
}
