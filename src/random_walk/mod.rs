use std::collections::HashMap;

use rand::Rng;

use crate::error::{Error, Result};
use crate::solver::monte_carlo::{self, Evaluation, EvaluationConfig};
use crate::solver::Episode;

// Seven states -3..=3; the walk starts in the middle and ends at either edge.
pub type State = i32;

pub const START: State = 0;
pub const WIN: State = 3;
pub const LOSE: State = -3;

// Probability of stepping up from each state.
pub type Policy = HashMap<State, f64>;

pub fn initial_policy() -> Policy {
    (LOSE..=WIN).map(|state| (state, 0.5)).collect()
}

pub fn initial_state_values() -> HashMap<State, f64> {
    ((LOSE + 1)..WIN).map(|state| (state, 0.5)).collect()
}

// Probability of reaching WIN from every non-terminal state when both directions are
// equally likely.
pub fn true_state_values() -> HashMap<State, f64> {
    ((LOSE + 1)..WIN)
        .map(|state| (state, (state - LOSE) as f64 / (WIN - LOSE) as f64))
        .collect()
}

// Walks from START until a terminal state is reached.
// Reward is 1 for ending at WIN and 0 for ending at LOSE; the trajectory holds every
// non-terminal state visited, in order.
pub fn random_walk<R: Rng + ?Sized>(policy: &Policy, rng: &mut R) -> Result<Episode<State>> {
    let mut state = START;
    let mut history = Vec::new();

    loop {
        if state == WIN {
            return Ok(Episode {
                reward: 1.0,
                trajectory: history,
            });
        } else if state == LOSE {
            return Ok(Episode {
                reward: 0.0,
                trajectory: history,
            });
        }
        history.push(state);

        let up_probability = *policy
            .get(&state)
            .ok_or_else(|| Error::InvalidState(format!("no policy for state {}", state)))?;
        if !(up_probability > 0.0 && up_probability < 1.0) {
            return Err(Error::InvalidParameter(format!(
                "step probability at state {} must be in (0, 1), got {}",
                state, up_probability
            )));
        }

        if rng.gen::<f64>() < up_probability {
            state += 1;
        } else {
            state -= 1;
        }
    }
}

// Estimates the state values of the policy with fixed-α Monte Carlo.
pub fn evaluate<R: Rng + ?Sized>(
    policy: &Policy,
    config: &EvaluationConfig,
    rng: &mut R,
) -> Result<Evaluation<State>> {
    monte_carlo::fixed_alpha_evaluation(
        initial_state_values(),
        |rng| random_walk(policy, rng),
        config,
        rng,
    )
}
