//! Time series of fish state, written once per tick by the observer.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Everything sampled from one fish on one tick.
#[derive(Debug, Clone, Default)]
pub struct FishSample {
    /// Global position (mm)
    pub position: Vector3<f64>,
    /// Orientation as reported by the fish (rad)
    pub orientation: f64,
    /// Speed as reported by the fish, if any
    pub speed: Option<f64>,
    /// Distance to every other fish, in fish order
    pub distances: Vec<f64>,
    /// Distance to each currently sensed neighbour
    pub neighbor_spacing: Vec<f64>,
}

/// Per-fish series.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FishTrack {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub orientation: Vec<f64>,
    /// Planar speed normalised by the configured maximum; from the 2nd sample
    pub lin_speed: Vec<f64>,
    /// Angular speed normalised by π; from the 2nd sample
    pub ang_speed: Vec<f64>,
    /// Distances to all other fish; from the 2nd sample, aligned with speeds
    pub neighbor_distances: Vec<Vec<f64>>,
}

/// Swarm trajectories and aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecorder {
    /// Seconds per tick
    period_secs: f64,
    /// Divisor applied to linear speed (mm/s)
    speed_normalization: f64,
    pub fish: Vec<FishTrack>,
    /// Mean neighbour spacing, one entry per tick that had neighbour pairs
    pub avg_dist: Vec<f64>,
    /// Mean reported speed, aligned with `avg_dist`
    pub avg_speed: Vec<f64>,
}

impl StateRecorder {
    pub fn new(num_fish: usize, period_secs: f64, speed_normalization: f64) -> Self {
        Self {
            period_secs,
            speed_normalization,
            fish: vec![FishTrack::default(); num_fish],
            avg_dist: Vec::new(),
            avg_speed: Vec::new(),
        }
    }

    /// Number of ticks recorded.
    pub fn len(&self) -> usize {
        self.fish.first().map_or(0, |t| t.x.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends one tick. `samples` must hold one entry per fish.
    pub fn record(&mut self, samples: &[FishSample]) {
        let mut spacing_sum = 0.0;
        let mut pairs = 0usize;
        let mut total_speed = 0.0;

        for (track, sample) in self.fish.iter_mut().zip(samples) {
            track.x.push(sample.position.x);
            track.y.push(sample.position.y);
            track.orientation.push(sample.orientation);

            if let (Some(&prev_x), Some(&prev_y), Some(&prev_o)) = (
                track.x.iter().rev().nth(1),
                track.y.iter().rev().nth(1),
                track.orientation.iter().rev().nth(1),
            ) {
                let moved = ((sample.position.x - prev_x).powi(2)
                    + (sample.position.y - prev_y).powi(2))
                .sqrt();
                let speed = moved / self.period_secs;
                track.lin_speed.push(speed / self.speed_normalization);

                let turn = (sample.orientation - prev_o) / self.period_secs;
                track.ang_speed.push(turn / PI);

                track.neighbor_distances.push(sample.distances.clone());
            }

            spacing_sum += sample.neighbor_spacing.iter().sum::<f64>();
            pairs += sample.neighbor_spacing.len();
            total_speed += sample.speed.unwrap_or(0.0);
        }

        // No neighbour pairs: no meaningful mean for this tick
        if pairs > 0 {
            self.avg_dist.push(spacing_sum / pairs as f64);
            self.avg_speed.push(total_speed / self.fish.len() as f64);
        }
    }
}
