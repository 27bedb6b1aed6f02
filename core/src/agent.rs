//! Policies that drive a run through the action interface.
//!
//! RULE: a policy only ever picks from `valid_actions()`. Combat is
//! resolved by the policy too, since the engine does not simulate it.

use crate::{
    error::SimResult,
    orchestrator::{Action, Observation, RunOrchestrator},
};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// The contract every driver must fulfil.
pub trait Policy {
    /// Stable name for logs and run summaries.
    fn name(&self) -> &'static str;

    /// Pick one of `obs.valid_actions`. `None` stops the drive.
    fn choose(&mut self, obs: &Observation) -> Option<Action>;
}

/// Always the first listed action. Fights cost no HP.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstChoicePolicy;

impl Policy for FirstChoicePolicy {
    fn name(&self) -> &'static str {
        "first"
    }

    fn choose(&mut self, obs: &Observation) -> Option<Action> {
        obs.valid_actions.first().cloned()
    }
}

/// Uniform over the valid actions, reproducible from its own seed.
/// Fights cost a random share of current HP, never the whole of it.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: Pcg64Mcg,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self { rng: Pcg64Mcg::seed_from_u64(seed) }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose(&mut self, obs: &Observation) -> Option<Action> {
        if obs.valid_actions.is_empty() {
            return None;
        }
        let i = self.rng.gen_range(0..obs.valid_actions.len());
        match &obs.valid_actions[i] {
            Action::ResolveCombat { .. } => {
                let loss = self.rng.gen_range(0..=obs.hp / 4);
                Some(Action::ResolveCombat { hp_after: (obs.hp - loss).max(1) })
            }
            other => Some(other.clone()),
        }
    }
}

/// Step `run` with `policy` until it completes, the policy stops, or
/// `max_steps` actions were taken. Returns the number of steps.
pub fn drive(run: &mut RunOrchestrator, policy: &mut dyn Policy, max_steps: usize) -> SimResult<usize> {
    let mut steps = 0;
    while steps < max_steps && !run.is_complete() {
        let obs = run.observe();
        let Some(action) = policy.choose(&obs) else {
            break;
        };
        run.step(action)?;
        steps += 1;
    }
    log::info!(
        "floor={} agent: {} policy stopped after {steps} steps",
        run.state().floor,
        policy.name()
    );
    Ok(steps)
}
