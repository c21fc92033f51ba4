//! Simulated acoustic channel with range limit and packet loss.

use bluesim_env::{Channel, Environment, Event, Fish, FishId, Source};
use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Channel parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Planar reach of a transmission (mm)
    pub range_mm: f64,

    /// Probability that an in-range receiver misses a transmission (0.0 - 1.0)
    pub loss_rate: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            range_mm: 700.0,
            loss_rate: 0.1,
        }
    }
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Calls to `transmit`
    pub transmissions: u64,
    /// Inbox deliveries
    pub deliveries: u64,
    /// In-range receivers that lost the packet
    pub drops: u64,
}

/// Broadcast channel: every fish within range hears a transmission unless
/// the seeded loss roll says otherwise.
pub struct SimChannel<E, F> {
    config: ChannelConfig,
    env: Arc<E>,
    fish: Vec<Arc<F>>,
    rng: Mutex<ChaCha8Rng>,
    /// Events delivered since the last drain
    delivered: Mutex<Vec<Event>>,
    transmissions: AtomicU64,
    deliveries: AtomicU64,
    drops: AtomicU64,
}

impl<E, F> SimChannel<E, F>
where
    E: Environment,
    F: Fish,
{
    /// Creates a channel over the given population.
    pub fn new(config: ChannelConfig, env: Arc<E>, fish: Vec<Arc<F>>, seed: u64) -> Self {
        Self {
            config: ChannelConfig {
                loss_rate: config.loss_rate.clamp(0.0, 1.0),
                ..config
            },
            env,
            fish,
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
            delivered: Mutex::new(Vec::new()),
            transmissions: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            drops: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            transmissions: self.transmissions.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            drops: self.drops.load(Ordering::Relaxed),
        }
    }

    fn in_range(&self, id: FishId, origin: &Vector2<f64>) -> bool {
        match self.env.kinematics(id) {
            Ok(state) => (state.position.xy() - origin).norm() <= self.config.range_mm,
            Err(_) => false,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E, F> Channel for SimChannel<E, F>
where
    E: Environment,
    F: Fish,
{
    fn transmit(&self, source: Source, event: Event, position: Vector2<f64>, is_observer: bool) {
        self.transmissions.fetch_add(1, Ordering::Relaxed);

        let mut reached = 0u64;
        let mut lost = 0u64;
        {
            let mut rng = lock(&self.rng);
            for (index, fish) in self.fish.iter().enumerate() {
                let id = FishId(index);
                if source == Source::Fish(id) || !self.in_range(id, &position) {
                    continue;
                }
                if rng.gen::<f64>() < self.config.loss_rate {
                    lost += 1;
                    continue;
                }
                fish.enqueue(event.clone(), position);
                reached += 1;
            }
        }

        self.deliveries.fetch_add(reached, Ordering::Relaxed);
        self.drops.fetch_add(lost, Ordering::Relaxed);

        // Observer instructions are not swarm traffic
        if reached > 0 && !is_observer {
            lock(&self.delivered).push(event);
        }
    }

    fn drain_delivered(&self) -> Vec<Event> {
        std::mem::take(&mut *lock(&self.delivered))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::SimFish;
    use crate::environment::SimEnvironment;
    use bluesim_env::{Kinematics, Opcode};
    use nalgebra::Vector3;

    fn channel(loss_rate: f64) -> (Vec<Arc<SimFish>>, SimChannel<SimEnvironment, SimFish>) {
        // Fish at x = 0, 500, 1000
        let env = Arc::new(SimEnvironment::new(
            [0.0, 500.0, 1000.0]
                .into_iter()
                .map(|x| Kinematics::at_rest(Vector3::new(x, 0.0, 0.0), 0.0))
                .collect(),
        ));
        let fish: Vec<Arc<SimFish>> = (0..3).map(|i| Arc::new(SimFish::new(FishId(i)))).collect();
        let config = ChannelConfig {
            range_mm: 600.0,
            loss_rate,
        };
        let channel = SimChannel::new(config, env, fish.clone(), 7);
        (fish, channel)
    }

    #[test]
    fn test_range_limits_delivery() {
        let (fish, channel) = channel(0.0);

        let event = Event::hop_count(FishId(0), 1, 0);
        channel.transmit(Source::Fish(FishId(0)), event, Vector2::new(0.0, 0.0), false);

        // Sender excluded, fish 2 out of range
        assert_eq!(fish[0].pending(), 0);
        assert_eq!(fish[1].pending(), 1);
        assert_eq!(fish[2].pending(), 0);

        let delivered = channel.drain_delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].opcode, Opcode::HopCount);
        assert!(channel.drain_delivered().is_empty());
    }

    #[test]
    fn test_observer_transmissions_not_logged() {
        let (fish, channel) = channel(0.0);

        let event = Event::new(Opcode::StartLeaderElection);
        channel.transmit(Source::Observer, event, Vector2::new(500.0, 0.0), true);

        assert!(fish.iter().all(|f| f.pending() == 1));
        assert!(channel.drain_delivered().is_empty());
        assert_eq!(channel.stats().deliveries, 3);
    }

    #[test]
    fn test_total_loss_delivers_nothing() {
        let (fish, channel) = channel(1.0);

        let event = Event::info_internal(FishId(1), "north", 1);
        channel.transmit(Source::Fish(FishId(1)), event, Vector2::new(500.0, 0.0), false);

        assert!(fish.iter().all(|f| f.pending() == 0));
        assert!(channel.drain_delivered().is_empty());
        assert_eq!(
            channel.stats(),
            ChannelStats {
                transmissions: 1,
                deliveries: 0,
                drops: 2
            }
        );
    }
}
