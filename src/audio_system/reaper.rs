/// Effect reaper
///
/// Retires finished voices on a fixed tick. At most one voice is evicted per
/// tick so a burst of effects ending together doesn't stall a frame.
use std::time::Duration;

use super::registry::VoiceRegistry;
use super::EffectId;

#[derive(Debug, Clone)]
pub struct Reaper {
    interval: Duration,
    elapsed: Duration,
}

impl Reaper {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Advance the timer by `dt`; sweeps once when the interval has elapsed.
    ///
    /// Returns the id of the evicted voice, if any.
    pub fn update(&mut self, dt: Duration, registry: &mut VoiceRegistry) -> Option<EffectId> {
        self.elapsed += dt;
        if self.elapsed < self.interval {
            return None;
        }
        self.elapsed = Duration::ZERO;
        Self::sweep(registry)
    }

    /// Evict the first finished voice, in id order
    pub fn sweep(registry: &mut VoiceRegistry) -> Option<EffectId> {
        registry.reap_one()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::registry::IdPolicy;
    use crate::messaging::EventBus;

    const TICK: Duration = Duration::from_millis(100);

    fn empty_registry() -> VoiceRegistry {
        VoiceRegistry::new(IdPolicy::default(), 1.0, EventBus::new())
    }

    #[test]
    fn test_timer_waits_for_interval() {
        let mut reaper = Reaper::new(TICK);
        let mut registry = empty_registry();

        assert_eq!(reaper.update(Duration::from_millis(60), &mut registry), None);
        assert_eq!(reaper.elapsed, Duration::from_millis(60));

        reaper.update(Duration::from_millis(60), &mut registry);
        // Fired and reset
        assert_eq!(reaper.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_runs_from_first_update() {
        let mut reaper = Reaper::new(TICK);
        let mut registry = empty_registry();
        assert_eq!(reaper.interval(), TICK);

        reaper.update(Duration::from_millis(30), &mut registry);
        assert_eq!(reaper.elapsed, Duration::from_millis(30));

        // A long frame fires once and does not carry the excess over
        reaper.update(Duration::from_secs(5), &mut registry);
        assert_eq!(reaper.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_sweep_on_empty_registry() {
        let mut registry = empty_registry();
        assert_eq!(Reaper::sweep(&mut registry), None);
    }
}
