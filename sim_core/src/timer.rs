//! Timer/Cooldown - reusable readiness gates

use crate::sim::Simulation;
use crate::types::TimerId;
use std::time::Duration;

/// A readiness gate with a fixed duration.
///
/// The ready-at time lives in the simulation's timer table so several
/// cooldowns (or a spell and a proc) can share one timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cooldown {
    pub timer: TimerId,
    pub duration: Duration,
}

impl Cooldown {
    pub fn new(timer: TimerId, duration: Duration) -> Self {
        Cooldown { timer, duration }
    }

    pub fn is_ready(&self, sim: &Simulation) -> bool {
        sim.timer_ready_at(self.timer) <= sim.now()
    }

    /// Time at which the cooldown becomes ready
    pub fn ready_at(&self, sim: &Simulation) -> Duration {
        sim.timer_ready_at(self.timer)
    }

    pub fn time_to_ready(&self, sim: &Simulation) -> Duration {
        self.ready_at(sim).saturating_sub(sim.now())
    }

    /// Start the cooldown from the current time
    pub fn use_cooldown(&self, sim: &mut Simulation) {
        let ready_at = sim.now().saturating_add(self.duration);
        sim.set_timer_ready_at(self.timer, ready_at);
    }

    /// Make the cooldown ready immediately
    pub fn reset(&self, sim: &mut Simulation) {
        let now = sim.now();
        sim.set_timer_ready_at(self.timer, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_gates_until_duration_elapses() {
        let mut sim = Simulation::new(Default::default());
        let cd = Cooldown::new(sim.new_timer(), Duration::from_secs(6));
        assert!(cd.is_ready(&sim));

        cd.use_cooldown(&mut sim);
        assert!(!cd.is_ready(&sim));
        assert_eq!(cd.time_to_ready(&sim), Duration::from_secs(6));

        sim.advance_to(Duration::from_secs(6));
        assert!(cd.is_ready(&sim));
    }

    #[test]
    fn test_shared_timer() {
        let mut sim = Simulation::new(Default::default());
        let timer = sim.new_timer();
        let long = Cooldown::new(timer, Duration::from_secs(30));
        let short = Cooldown::new(timer, Duration::from_secs(2));
        long.use_cooldown(&mut sim);
        assert!(!short.is_ready(&sim));
        short.reset(&mut sim);
        assert!(long.is_ready(&sim));
    }
}
