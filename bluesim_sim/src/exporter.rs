//! JSON exporter for offline analysis and plotting.
//!
//! Exports the trajectories and study samples of a finished run.

use crate::network::ChannelStats;
use crate::runner::{RunMode, ScenarioResult};

use bluesim_core::{StateRecorder, StudyLog};
use bluesim_env::EnvError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// "lockstep" or "realtime"
    pub mode: String,

    /// Ticks per second
    pub clock_freq: f64,

    /// Ticks executed
    pub ticks: u64,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,

    pub channel: ChannelStats,

    pub is_instructed: bool,

    /// Where the last instruction was aimed (mm)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_instructed: Option<[f64; 2]>,

    pub trajectories: StateRecorder,

    pub study: StudyLog,
}

impl SimExport {
    /// Creates an export from a finished run.
    pub fn from_result(result: &ScenarioResult, clock_freq: f64) -> Self {
        let mode = match result.mode {
            RunMode::Lockstep => "lockstep",
            RunMode::Realtime => "realtime",
        };
        Self {
            scenario: result.scenario.name().to_string(),
            seed: result.seed,
            mode: mode.to_string(),
            clock_freq,
            ticks: result.total_ticks,
            passed: result.passed,
            failure_reason: result.failure_reason.clone(),
            channel: result.channel,
            is_instructed: result.is_instructed,
            last_instructed: result.last_instructed.map(|p| [p.x, p.y]),
            trajectories: result.recorder.clone(),
            study: result.study.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, EnvError> {
        serde_json::to_string_pretty(self).map_err(EnvError::serialization)
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), EnvError> {
        let json = self.to_json()?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ScenarioRunner;
    use crate::scenarios::ScenarioId;
    use crate::world::SimConfig;

    fn export() -> SimExport {
        let config = SimConfig {
            num_fish: 3,
            duration_secs: 30.0,
            ..Default::default()
        };
        let result = ScenarioRunner::new(config).run(ScenarioId::HopCount).unwrap();
        SimExport::from_result(&result, 1.0)
    }

    #[test]
    fn test_export_fields() {
        let export = export();

        assert_eq!(export.scenario, "hop_count");
        assert_eq!(export.mode, "lockstep");
        assert_eq!(export.ticks, 30);
        assert_eq!(export.trajectories.fish.len(), 3);
        assert_eq!(export.study.hop_count.len(), 2);
        assert!(export.is_instructed);
        assert!(export.last_instructed.is_some());
    }

    #[test]
    fn test_write_and_read_back() {
        let export = export();
        let path = std::env::temp_dir().join(format!("bluesim_export_{}.json", std::process::id()));

        export.write_to_file(&path).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["scenario"], "hop_count");
        assert_eq!(value["trajectories"]["fish"][0]["x"].as_array().unwrap().len(), 30);
        assert_eq!(value["study"]["hop_count"].as_array().unwrap().len(), 2);
        assert!(value.get("failure_reason").is_none());
    }

    #[test]
    fn test_write_to_missing_dir_fails() {
        let export = export();
        let path = std::env::temp_dir().join("bluesim_missing_dir").join("nested").join("out.json");

        assert!(matches!(export.write_to_file(path), Err(EnvError::Io(_))));
    }
}
