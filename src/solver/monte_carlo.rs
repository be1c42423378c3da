use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use rand::Rng;

use crate::error::{Error, Result};
use crate::solver::*;

#[derive(Clone, Debug)]
pub struct ControlConfig {
    // Probability of taking a random exploratory action.
    pub epsilon: f64,
    // Constant step size.
    pub alpha: f64,
    pub episodes: u64,
}

impl Default for ControlConfig {
    fn default() -> ControlConfig {
        ControlConfig {
            epsilon: 0.1,
            alpha: 0.01,
            episodes: 1_000_000,
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<()> {
        check_alpha(self.alpha)?;
        check_episodes(self.episodes)?;
        if !(0.0..=1.0).contains(&self.epsilon) {
            return Err(Error::InvalidParameter(format!(
                "epsilon must be in [0, 1], got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct EvaluationConfig {
    pub alpha: f64,
    pub episodes: u64,
    // A copy of the state values is kept after every episode index divisible by this.
    pub snapshot_every: u64,
}

impl Default for EvaluationConfig {
    fn default() -> EvaluationConfig {
        EvaluationConfig {
            alpha: 0.01,
            episodes: 10_000,
            snapshot_every: 1000,
        }
    }
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<()> {
        check_alpha(self.alpha)?;
        check_episodes(self.episodes)?;
        if self.snapshot_every == 0 {
            return Err(Error::InvalidParameter(
                "snapshot_every must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_alpha(alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "alpha must be in (0, 1], got {}",
            alpha
        )))
    }
}

fn check_episodes(episodes: u64) -> Result<()> {
    if episodes == 0 {
        return Err(Error::InvalidParameter(
            "episodes must be positive".to_string(),
        ));
    }
    Ok(())
}

// Learned action values and the greedy policy over them.
#[derive(Clone, Debug)]
pub struct Control<S: Eq + Hash, A: Eq + Hash> {
    pub action_values: HashMap<(S, A), f64>,
    pub policy: HashMap<S, A>,
    pub actions: Vec<A>,
    pub epsilon: f64,
}

impl<S, A> Control<S, A>
where
    S: Eq + Hash + Clone,
    A: Eq + Hash + Copy,
{
    // Acts epsilon-greedily, the way the policy behaved during training.
    pub fn act<R: Rng + ?Sized>(&self, state: &S, rng: &mut R) -> A {
        epsilon_greedy_action(state, &self.actions, &self.action_values, self.epsilon, rng)
    }

    pub fn greedy(&self, state: &S) -> A {
        match self.policy.get(state) {
            Some(action) => *action,
            None => greedy_action(state, &self.actions, &self.action_values),
        }
    }
}

fn log_progress(episode: u64, episodes: u64) {
    if episodes >= 10 && (episode + 1) % (episodes / 10) == 0 {
        log::debug!("{} / {} episodes", episode + 1, episodes);
    }
}

// Constant-α Monte Carlo control.
// Generates episodes from an ε-greedy policy over the current action values, and after each
// episode moves every visited state-action pair towards the episode reward:
//   Q(S, A) ← Q(S, A) + α∙[G - Q(S, A)]
// `play` simulates one episode, asking the given policy for every action.
pub fn constant_alpha_control<S, A, R, Play>(
    states: &[S],
    actions: &[A],
    mut play: Play,
    config: &ControlConfig,
    rng: &mut R,
) -> Result<Control<S, A>>
where
    S: Eq + Hash + Debug + Clone,
    A: Eq + Hash + Debug + Copy,
    R: Rng + ?Sized,
    Play: FnMut(&mut R, &dyn Fn(&S, &mut R) -> A) -> Episode<(S, A)>,
{
    config.validate()?;
    if actions.is_empty() {
        return Err(Error::InvalidParameter("no actions to choose from".to_string()));
    }

    let mut action_values: HashMap<(S, A), f64> = states
        .iter()
        .flat_map(|state| actions.iter().map(move |action| ((state.clone(), *action), 0.0)))
        .collect();

    // The first episode follows a random deterministic policy.
    let soft_policy: HashMap<S, A> = states
        .iter()
        .map(|state| (state.clone(), random_action(actions, rng)))
        .collect();

    log::info!(
        "running constant-alpha control over {} states ({} episodes)",
        states.len(),
        config.episodes
    );
    for episode in 0..config.episodes {
        let outcome = if episode == 0 {
            let policy = |state: &S, rng: &mut R| match soft_policy.get(state) {
                Some(action) => *action,
                None => random_action(actions, rng),
            };
            play(&mut *rng, &policy)
        } else {
            let policy = |state: &S, rng: &mut R| {
                epsilon_greedy_action(state, actions, &action_values, config.epsilon, rng)
            };
            play(&mut *rng, &policy)
        };

        // Every visit is updated with the final reward.
        for (state, action) in outcome.trajectory {
            let value = action_values
                .get_mut(&(state.clone(), action))
                .ok_or_else(|| Error::InvalidState(format!("{:?} with action {:?}", state, action)))?;
            *value += config.alpha * (outcome.reward - *value);
        }
        log_progress(episode, config.episodes);
    }

    let policy = states
        .iter()
        .map(|state| (state.clone(), greedy_action(state, actions, &action_values)))
        .collect();

    Ok(Control {
        action_values,
        policy,
        actions: actions.to_vec(),
        epsilon: config.epsilon,
    })
}

#[derive(Clone, Debug)]
pub struct Evaluation<S: Eq + Hash> {
    pub state_values: HashMap<S, f64>,
    // Snapshots of the state values taken during training.
    pub history: Vec<HashMap<S, f64>>,
}

// Fixed-α Monte Carlo evaluation of the policy `walk` plays with.
// Every visited state moves towards the episode reward:
//   V(S) ← V(S) + α∙[G - V(S)]
pub fn fixed_alpha_evaluation<S, R, Walk>(
    initial_values: HashMap<S, f64>,
    mut walk: Walk,
    config: &EvaluationConfig,
    rng: &mut R,
) -> Result<Evaluation<S>>
where
    S: Eq + Hash + Debug + Clone,
    R: Rng + ?Sized,
    Walk: FnMut(&mut R) -> Result<Episode<S>>,
{
    config.validate()?;

    let mut state_values = initial_values;
    let mut history = Vec::new();

    log::info!(
        "running fixed-alpha evaluation over {} states ({} episodes)",
        state_values.len(),
        config.episodes
    );
    for episode in 0..config.episodes {
        let outcome = walk(&mut *rng)?;
        for state in outcome.trajectory {
            let value = state_values
                .get_mut(&state)
                .ok_or_else(|| Error::InvalidState(format!("{:?}", state)))?;
            *value += config.alpha * (outcome.reward - *value);
        }

        if episode % config.snapshot_every == 0 {
            history.push(state_values.clone());
        }
        log_progress(episode, config.episodes);
    }

    Ok(Evaluation {
        state_values,
        history,
    })
}

// Mean reward over a number of simulated episodes.
pub fn average_reward<T, R, Play>(mut play: Play, games: u64, rng: &mut R) -> Result<f64>
where
    R: Rng + ?Sized,
    Play: FnMut(&mut R) -> Result<Episode<T>>,
{
    check_episodes(games)?;
    let mut total_reward = 0.0;
    for _ in 0..games {
        total_reward += play(&mut *rng)?.reward;
    }
    Ok(total_reward / games as f64)
}
