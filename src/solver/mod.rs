use std::collections::HashMap;
use std::hash::Hash;

use rand::prelude::*;

pub mod monte_carlo;

// A finished episode: the total reward and everything visited on the way, in order.
#[derive(Clone, Debug, PartialEq)]
pub struct Episode<T> {
    pub reward: f64,
    pub trajectory: Vec<T>,
}

pub fn random_action<A: Copy, R: Rng + ?Sized>(actions: &[A], rng: &mut R) -> A {
    actions[rng.gen_range(0..actions.len())]
}

// Returns the first action with the strictly largest value.
// Missing state-action pairs count as zero.
pub fn greedy_action<S, A>(state: &S, actions: &[A], action_values: &HashMap<(S, A), f64>) -> A
where
    S: Eq + Hash + Clone,
    A: Eq + Hash + Copy,
{
    let mut best_action = actions[0];
    let mut best_value = f64::NEG_INFINITY;
    for action in actions {
        let value = *action_values
            .get(&(state.clone(), *action))
            .unwrap_or(&0.0);
        if value > best_value {
            best_action = *action;
            best_value = value;
        }
    }
    best_action
}

// Takes a random exploratory action with `epsilon` probability, and the greedy one otherwise.
pub fn epsilon_greedy_action<S, A, R>(
    state: &S,
    actions: &[A],
    action_values: &HashMap<(S, A), f64>,
    epsilon: f64,
    rng: &mut R,
) -> A
where
    S: Eq + Hash + Clone,
    A: Eq + Hash + Copy,
    R: Rng + ?Sized,
{
    if rng.gen::<f64>() < epsilon {
        random_action(actions, rng)
    } else {
        greedy_action(state, actions, action_values)
    }
}
