//! Batch runner - many independent trials, aggregated in trial order

use super::Simulation;
use crate::config::FightConfig;
use crate::error::{ConfigError, SimError};
use crate::metrics::{BatchResult, TrialResult};
use rayon::prelude::*;
use tracing::info;

fn build_simulation<F>(config: &FightConfig, build: &F) -> Result<Simulation, ConfigError>
where
    F: Fn(&mut Simulation) -> Result<(), ConfigError>,
{
    let mut sim = Simulation::new(config.clone());
    build(&mut sim)?;
    Ok(sim)
}

/// Run `config.iterations` trials in parallel.
///
/// Every worker builds its own simulation with `build` and reuses it across
/// the trials it runs; trial `i` is seeded with `seed + i`, so the aggregate
/// does not depend on how trials are spread over threads. A failing build
/// aborts the whole batch before any result is reported.
pub fn run_batch<F>(config: &FightConfig, build: F) -> Result<BatchResult, SimError>
where
    F: Fn(&mut Simulation) -> Result<(), ConfigError> + Sync + Send,
{
    config.validate()?;
    if config.iterations == 0 {
        return Err(SimError::NoTrials);
    }
    // Surface configuration errors with their original context
    build_simulation(config, &build)?;

    info!(iterations = config.iterations, seed = config.seed, "starting batch");
    let trials: Vec<TrialResult> = (0..config.iterations)
        .into_par_iter()
        .map_init(
            || build_simulation(config, &build),
            |sim, index| match sim {
                Ok(sim) => Ok(sim.run_single_trial(config.seed.wrapping_add(index as u64))),
                Err(e) => Err(ConfigError::Validation(e.to_string())),
            },
        )
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let result = BatchResult::from_trials(&trials);
    info!(mean_dps = result.dps.mean, stdev = result.dps.stdev, "batch finished");
    Ok(result)
}

/// Run the batch on the calling thread with a single simulation
pub fn run_batch_sequential<F>(config: &FightConfig, build: F) -> Result<BatchResult, SimError>
where
    F: Fn(&mut Simulation) -> Result<(), ConfigError>,
{
    config.validate()?;
    if config.iterations == 0 {
        return Err(SimError::NoTrials);
    }
    let mut sim = build_simulation(config, &build)?;
    let trials: Vec<TrialResult> = (0..config.iterations)
        .map(|index| sim.run_single_trial(config.seed.wrapping_add(index as u64)))
        .collect();
    Ok(BatchResult::from_trials(&trials))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_iterations_rejected() {
        let config = FightConfig {
            iterations: 0,
            ..Default::default()
        };
        let result = run_batch(&config, |_| Ok(()));
        assert!(matches!(result, Err(SimError::NoTrials)));
    }

    #[test]
    fn test_build_error_aborts_batch() {
        let config = FightConfig {
            iterations: 4,
            ..Default::default()
        };
        let result = run_batch(&config, |_| Err(ConfigError::Validation("broken content".to_string())));
        match result {
            Err(SimError::Build(ConfigError::Validation(msg))) => assert_eq!(msg, "broken content"),
            other => panic!("expected build error, got {:?}", other.map(|r| r.iterations)),
        }
    }

    #[test]
    fn test_empty_build_runs() {
        let config = FightConfig {
            iterations: 3,
            duration_secs: 10.0,
            ..Default::default()
        };
        let result = run_batch(&config, |_| Ok(())).unwrap();
        assert_eq!(result.iterations, 3);
        assert_eq!(result.dps.mean, 0.0);
        assert!((result.duration.mean - 10.0).abs() < 1e-9);
    }
}
