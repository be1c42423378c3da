use rand::Rng;

use crate::coin_bet::*;
use crate::error::{Error, Result};

// Undiscounted: the game always ends in ruin or at the goal.
const DISCOUNT: f64 = 1.0;

// Two action values closer than this are treated as equal when choosing a bet,
// so rounding noise cannot flip the greedy choice between iterations.
pub const TIE_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct PolicyIterationConfig {
    pub heads_probability: f64,
    // Cap on evaluation + improvement rounds.
    pub max_iterations: usize,
    // Evaluation stops once no state value changes by more than this in a sweep.
    pub tolerance: f64,
}

impl Default for PolicyIterationConfig {
    fn default() -> PolicyIterationConfig {
        PolicyIterationConfig {
            heads_probability: 0.4,
            max_iterations: 100_000,
            tolerance: 1e-13,
        }
    }
}

impl PolicyIterationConfig {
    pub fn validate(&self) -> Result<HeadsProbability> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if !(self.tolerance >= 0.0) || !self.tolerance.is_finite() {
            return Err(Error::InvalidParameter(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        HeadsProbability::new(self.heads_probability)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    // Improvement left the policy unchanged after this many rounds.
    Converged { iterations: usize },
    // Iteration cap was reached while the policy was still changing.
    NotConverged { iterations: usize },
}

#[derive(Clone, Debug)]
pub struct Solution {
    pub policy: Policy,
    pub state_values: StateValues,
    pub action_values: ActionValues,
    pub status: Status,
}

impl Solution {
    pub fn is_converged(&self) -> bool {
        matches!(self.status, Status::Converged { .. })
    }

    pub fn into_converged(self) -> Result<Solution> {
        match self.status {
            Status::Converged { .. } => Ok(self),
            Status::NotConverged { iterations } => Err(Error::ConvergenceFailure { iterations }),
        }
    }
}

// The Bellman equation linking the state-value function to the action-value function:
//   q(c, b) = (1 - p)∙γ∙V(c - b) + p∙(𝟙[c + b = GOAL] + V(c + b))
pub fn action_bellman_equation(
    capital: Capital,
    bet: Bet,
    state_values: &StateValues,
    heads_probability: HeadsProbability,
) -> Result<f64> {
    check_bet(capital, bet)?;
    let p = heads_probability.value();
    Ok((1.0 - p) * DISCOUNT * state_values.value(capital - bet)?
        + p * (indicator(capital + bet, GOAL) + state_values.value(capital + bet)?))
}

// Computes the action value of every legal (capital, bet) pair from the state values.
pub fn generate_action_value_function(
    state_values: &StateValues,
    heads_probability: HeadsProbability,
) -> Result<ActionValues> {
    let mut action_values = ActionValues::zeros();
    for capital in 1..GOAL {
        for bet in calculate_actions(capital)? {
            action_values.set(
                capital,
                bet,
                action_bellman_equation(capital, bet, state_values, heads_probability)?,
            );
        }
    }
    Ok(action_values)
}

// Iterates the state values of a fixed policy until they stop changing.
// Returns the converged state values together with the action values derived from them.
pub fn evaluate_policy(
    policy: &Policy,
    mut state_values: StateValues,
    mut action_values: ActionValues,
    heads_probability: HeadsProbability,
    tolerance: f64,
) -> Result<(StateValues, ActionValues)> {
    let mut sweeps = 0u64;
    loop {
        sweeps += 1;

        // Terminal capitals are not covered by the policy and keep their value.
        let mut updated_state_values = state_values.clone();
        for (capital, bet) in policy.iter() {
            updated_state_values.set(capital, action_values.value(capital, bet)?);
        }

        let max_delta = updated_state_values.max_delta(&state_values);
        action_values = generate_action_value_function(&updated_state_values, heads_probability)?;
        state_values = updated_state_values;

        if max_delta <= tolerance {
            log::debug!(
                "policy evaluated in {} sweeps (last change {:e})",
                sweeps,
                max_delta
            );
            return Ok((state_values, action_values));
        }
    }
}

// Picks the bet with the largest action value for every capital.
// Ties go to the smallest bet. A larger bet has to win by more than TIE_TOLERANCE,
// not just compare greater, so rounding noise cannot flip the policy between sweeps.
pub fn improve_policy(action_values: &ActionValues) -> Result<Policy> {
    let mut bets = Vec::with_capacity(GOAL - 1);
    for capital in 1..GOAL {
        let mut best_bet = None;
        let mut best_value = f64::NEG_INFINITY;
        for bet in calculate_actions(capital)? {
            let value = action_values.value(capital, bet)?;
            if best_bet.is_none() || value > best_value + TIE_TOLERANCE {
                best_bet = Some(bet);
                best_value = value;
            }
        }
        match best_bet {
            Some(bet) => bets.push(bet),
            None => return Err(Error::InvalidState(format!("no bets at capital {}", capital))),
        }
    }
    Policy::from_bets(bets)
}

// Policy iteration starting from a random policy.
pub fn policy_iteration<R: Rng + ?Sized>(
    config: &PolicyIterationConfig,
    rng: &mut R,
) -> Result<Solution> {
    policy_iteration_from(Policy::random(rng), config)
}

// Alternates policy evaluation and greedy improvement until the policy stops changing
// or the iteration cap is reached.
pub fn policy_iteration_from(
    initial_policy: Policy,
    config: &PolicyIterationConfig,
) -> Result<Solution> {
    let heads_probability = config.validate()?;
    log::info!(
        "running policy iteration (p = {}, max iterations = {})",
        heads_probability.value(),
        config.max_iterations
    );

    let mut state_values = StateValues::zeros();
    let mut policy = initial_policy;
    // Evaluation hands back action values derived from the state values it returns,
    // so the table stays in step with `state_values` across iterations.
    let mut action_values = generate_action_value_function(&state_values, heads_probability)?;

    for iteration in 1..=config.max_iterations {
        let (evaluated_state_values, evaluated_action_values) = evaluate_policy(
            &policy,
            state_values,
            action_values,
            heads_probability,
            config.tolerance,
        )?;
        state_values = evaluated_state_values;
        action_values = evaluated_action_values;

        let improved_policy = improve_policy(&action_values)?;
        let changed = improved_policy
            .iter()
            .zip(policy.iter())
            .filter(|((_, new_bet), (_, old_bet))| new_bet != old_bet)
            .count();
        log::debug!("iteration {}: {} bets changed", iteration, changed);

        if changed == 0 {
            log::info!("converged to optimal policy in {} iterations", iteration);
            return Ok(Solution {
                policy,
                state_values,
                action_values,
                status: Status::Converged {
                    iterations: iteration,
                },
            });
        }

        policy = improved_policy;
    }

    log::warn!(
        "policy did not converge within {} iterations",
        config.max_iterations
    );
    Ok(Solution {
        policy,
        state_values,
        action_values,
        status: Status::NotConverged {
            iterations: config.max_iterations,
        },
    })
}

// Solves the Gambler's Problem and keeps the results.
#[derive(Clone, Debug)]
pub struct GamblerPolicyIteration {
    pub policy: Policy,
    pub value_function: StateValues,
    pub action_value_function: ActionValues,
    pub status: Status,
}

impl GamblerPolicyIteration {
    pub fn new(heads_probability: f64) -> Result<GamblerPolicyIteration> {
        let config = PolicyIterationConfig {
            heads_probability,
            ..PolicyIterationConfig::default()
        };
        GamblerPolicyIteration::with_config(&config, &mut rand::thread_rng())
    }

    pub fn with_config<R: Rng + ?Sized>(
        config: &PolicyIterationConfig,
        rng: &mut R,
    ) -> Result<GamblerPolicyIteration> {
        let solution = policy_iteration(config, rng)?;
        Ok(GamblerPolicyIteration {
            policy: solution.policy,
            value_function: solution.state_values,
            action_value_function: solution.action_values,
            status: solution.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn heads(p: f64) -> HeadsProbability {
        HeadsProbability::new(p).unwrap()
    }

    fn solve(p: f64) -> Solution {
        let config = PolicyIterationConfig {
            heads_probability: p,
            ..PolicyIterationConfig::default()
        };
        policy_iteration_from(Policy::cautious(), &config).unwrap()
    }

    fn evaluate(policy: &Policy, p: f64) -> StateValues {
        let state_values = StateValues::zeros();
        let action_values = generate_action_value_function(&state_values, heads(p)).unwrap();
        evaluate_policy(policy, state_values, action_values, heads(p), 1e-13)
            .unwrap()
            .0
    }

    #[test]
    fn bellman_terminal_reward_test() {
        let state_values = StateValues::zeros();
        // Betting everything at 50 only pays off on heads.
        assert_abs_diff_eq!(
            action_bellman_equation(50, 50, &state_values, heads(0.4)).unwrap(),
            0.4
        );
        assert_abs_diff_eq!(
            action_bellman_equation(50, 49, &state_values, heads(0.4)).unwrap(),
            0.0
        );
    }

    #[test]
    fn bellman_rejects_illegal_bets() {
        let state_values = StateValues::zeros();
        assert_eq!(
            action_bellman_equation(60, 41, &state_values, heads(0.4)),
            Err(Error::IllegalBet { capital: 60, bet: 41 })
        );
        assert!(matches!(
            action_bellman_equation(0, 1, &state_values, heads(0.4)),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn action_value_table_is_total() {
        let action_values =
            generate_action_value_function(&StateValues::zeros(), heads(0.4)).unwrap();
        let expected: usize = (1..GOAL).map(|c| c.min(GOAL - c)).sum();
        assert_eq!(action_values.len(), expected);
        for capital in 1..GOAL {
            for bet in calculate_actions(capital).unwrap() {
                assert!(action_values.value(capital, bet).is_ok());
            }
            assert!(action_values.value(capital, 0).is_err());
        }
    }

    #[test]
    fn evaluation_is_consistent() {
        let p = 0.4;
        let state_values = StateValues::zeros();
        let action_values = generate_action_value_function(&state_values, heads(p)).unwrap();
        let (state_values, action_values) =
            evaluate_policy(&Policy::bold(), state_values, action_values, heads(p), 1e-13)
                .unwrap();

        // Returned action values are derived from the returned state values.
        assert_eq!(
            action_values,
            generate_action_value_function(&state_values, heads(p)).unwrap()
        );
        // Terminal capitals keep their value.
        assert_eq!(state_values.value(0), Ok(0.0));
        assert_eq!(state_values.value(GOAL), Ok(0.0));
        // Bold play at 50 wins with a single heads.
        assert_abs_diff_eq!(state_values.value(50).unwrap(), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(state_values.value(25).unwrap(), 0.16, epsilon = 1e-12);
    }

    #[test]
    fn improvement_breaks_ties_by_smallest_bet() {
        // With all values zero every bet at 50 only differs by the terminal reward.
        let action_values =
            generate_action_value_function(&StateValues::zeros(), heads(0.4)).unwrap();
        let policy = improve_policy(&action_values).unwrap();
        assert_eq!(policy.bet(50), Ok(50));
        assert_eq!(policy.bet(1), Ok(1));
        assert_eq!(policy.bet(30), Ok(1));
        assert_eq!(policy.bet(70), Ok(30));
    }

    #[test]
    fn improvement_is_monotone() {
        let p = 0.4;
        let mut rng = StdRng::seed_from_u64(42);
        let policy = Policy::random(&mut rng);

        let old_values = evaluate(&policy, p);
        let action_values = generate_action_value_function(&old_values, heads(p)).unwrap();
        let improved = improve_policy(&action_values).unwrap();
        let new_values = evaluate(&improved, p);

        for capital in 0..=GOAL {
            assert!(
                new_values.value(capital).unwrap() >= old_values.value(capital).unwrap() - 1e-9,
                "value regressed at capital {}",
                capital
            );
        }
    }

    #[test]
    fn fair_coin_test() {
        let solution = solve(0.5);
        assert!(solution.is_converged());
        for capital in 0..=GOAL {
            assert_abs_diff_eq!(
                solution.state_values.goal_probability(capital).unwrap(),
                capital as f64 / GOAL as f64,
                epsilon = 1e-3
            );
        }
    }

    #[test]
    fn unfair_coin_test() {
        let solution = solve(0.4);
        match solution.status {
            Status::Converged { iterations } => assert!(iterations < 100),
            Status::NotConverged { .. } => panic!("policy iteration did not converge"),
        }

        let policy = &solution.policy;
        assert_eq!(policy.bet(1), Ok(1));
        assert_eq!(policy.bet(12), Ok(12));
        assert_eq!(policy.bet(25), Ok(25));
        assert_eq!(policy.bet(50), Ok(50));
        assert_eq!(policy.bet(51), Ok(1));
        assert_eq!(policy.bet(75), Ok(25));
        assert_eq!(policy.bet(99), Ok(1));

        let state_values = &solution.state_values;
        assert_abs_diff_eq!(state_values.value(25).unwrap(), 0.16, epsilon = 1e-9);
        assert_abs_diff_eq!(state_values.value(50).unwrap(), 0.4, epsilon = 1e-9);
        assert_abs_diff_eq!(state_values.value(75).unwrap(), 0.64, epsilon = 1e-9);
    }

    #[test]
    fn random_start_converges() {
        let mut rng = StdRng::seed_from_u64(1);
        let solution = policy_iteration(&PolicyIterationConfig::default(), &mut rng)
            .unwrap()
            .into_converged()
            .unwrap();
        assert_eq!(solution.policy, solve(0.4).policy);
    }

    #[test]
    fn boundary_values_test() {
        let solution = solve(0.4);
        assert_eq!(solution.state_values.goal_probability(0), Ok(0.0));
        assert_eq!(solution.state_values.goal_probability(GOAL), Ok(1.0));
        for capital in 1..GOAL {
            let v = solution.state_values.value(capital).unwrap();
            assert!(v > 0.0 && v < 1.0);
        }
    }

    #[test]
    fn fixed_point_test() {
        let p = 0.4;
        let solution = solve(p);
        let (state_values, action_values) = evaluate_policy(
            &solution.policy,
            solution.state_values.clone(),
            solution.action_values.clone(),
            heads(p),
            1e-13,
        )
        .unwrap();
        let policy = improve_policy(&action_values).unwrap();

        assert_eq!(policy, solution.policy);
        assert!(state_values.max_delta(&solution.state_values) < 1e-12);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let config = PolicyIterationConfig {
            max_iterations: 1,
            ..PolicyIterationConfig::default()
        };
        let solution = policy_iteration_from(Policy::cautious(), &config).unwrap();
        assert_eq!(solution.status, Status::NotConverged { iterations: 1 });
        assert_eq!(
            solution.into_converged().unwrap_err(),
            Error::ConvergenceFailure { iterations: 1 }
        );
    }

    #[test]
    fn invalid_config_test() {
        for config in &[
            PolicyIterationConfig {
                heads_probability: 1.0,
                ..PolicyIterationConfig::default()
            },
            PolicyIterationConfig {
                max_iterations: 0,
                ..PolicyIterationConfig::default()
            },
            PolicyIterationConfig {
                tolerance: -1.0,
                ..PolicyIterationConfig::default()
            },
        ] {
            assert!(matches!(
                policy_iteration_from(Policy::cautious(), config),
                Err(Error::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn gambler_policy_iteration_test() {
        let gambler = GamblerPolicyIteration::new(0.4).unwrap();
        assert!(matches!(gambler.status, Status::Converged { .. }));
        assert_eq!(gambler.policy.bet(50), Ok(50));
        assert_abs_diff_eq!(gambler.value_function.value(50).unwrap(), 0.4, epsilon = 1e-9);
        assert_eq!(
            gambler.action_value_function,
            generate_action_value_function(&gambler.value_function, heads(0.4)).unwrap()
        );

        assert!(matches!(
            GamblerPolicyIteration::new(1.0),
            Err(Error::InvalidParameter(_))
        ));
    }

    proptest! {
        #[test]
        fn bellman_property(
            values in prop::collection::vec(0.0f64..1.0, GOAL + 1),
            p in 0.01f64..0.99,
            capital in 1usize..GOAL,
            bet_seed in 0usize..1000,
        ) {
            let bet = 1 + bet_seed % capital.min(GOAL - capital);
            let state_values = StateValues::from_values(values.clone()).unwrap();
            let expected = (1.0 - p) * values[capital - bet]
                + p * (indicator(capital + bet, GOAL) + values[capital + bet]);
            let actual = action_bellman_equation(capital, bet, &state_values, heads(p)).unwrap();
            prop_assert!((actual - expected).abs() < 1e-12);
        }
    }
}
