use rand::Rng;

use crate::coin_bet::*;
use crate::error::Result;
use crate::solver::Episode;

// Plays the coin-flip game until the gambler is ruined or reaches the goal.
// Starts from `initial_capital`, or from a random capital when none is given.
// Reward is 1 for reaching the goal and 0 for ruin; the trajectory is the (capital, bet) history.
pub fn play_game<S, R>(
    strategy: &S,
    heads_probability: HeadsProbability,
    initial_capital: Option<Capital>,
    rng: &mut R,
) -> Result<Episode<(Capital, Bet)>>
where
    S: Fn(Capital) -> Bet + ?Sized,
    R: Rng + ?Sized,
{
    let mut capital = match initial_capital {
        Some(capital) => {
            calculate_actions(capital)?;
            capital
        }
        None => rng.gen_range(1..GOAL),
    };

    let mut betting_history = Vec::new();
    loop {
        let bet = strategy(capital);
        check_bet(capital, bet)?;
        betting_history.push((capital, bet));

        if rng.gen::<f64>() < heads_probability.value() {
            capital += bet;
        } else {
            capital -= bet;
        }

        if capital == GOAL {
            return Ok(Episode {
                reward: 1.0,
                trajectory: betting_history,
            });
        }
        if capital == 0 {
            return Ok(Episode {
                reward: 0.0,
                trajectory: betting_history,
            });
        }
    }
}

pub fn play_games<S, R>(
    games: usize,
    strategy: &S,
    heads_probability: HeadsProbability,
    initial_capital: Option<Capital>,
    rng: &mut R,
) -> Result<Vec<Episode<(Capital, Bet)>>>
where
    S: Fn(Capital) -> Bet + ?Sized,
    R: Rng + ?Sized,
{
    (0..games)
        .map(|_| play_game(strategy, heads_probability, initial_capital, rng))
        .collect()
}

// Betting strategy that follows the policy.
pub fn strategy(policy: &Policy) -> impl Fn(Capital) -> Bet + '_ {
    move |capital| policy.bet(capital).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin_bet::policy_iteration::{policy_iteration_from, PolicyIterationConfig};
    use crate::error::Error;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn bold_game_test() {
        let mut rng = StdRng::seed_from_u64(13);
        let policy = Policy::bold();
        let heads = HeadsProbability::new(0.4).unwrap();
        let episode = play_game(&strategy(&policy), heads, Some(50), &mut rng).unwrap();

        // A single flip decides the game.
        assert_eq!(episode.trajectory, vec![(50, 50)]);
        assert!(episode.reward == 0.0 || episode.reward == 1.0);
    }

    #[test]
    fn history_is_consistent() {
        let mut rng = StdRng::seed_from_u64(13);
        let heads = HeadsProbability::new(0.48).unwrap();
        let games = play_games(200, &|_| 1, heads, None, &mut rng).unwrap();
        assert_eq!(games.len(), 200);
        for game in games {
            for pair in game.trajectory.windows(2) {
                let ((capital, bet), (next_capital, _)) = (pair[0], pair[1]);
                assert!(next_capital == capital + bet || next_capital == capital - bet);
            }
            let (capital, bet) = *game.trajectory.last().unwrap();
            if game.reward == 1.0 {
                assert_eq!(capital + bet, GOAL);
            } else {
                assert_eq!(capital - bet, 0);
            }
        }
    }

    #[test]
    fn illegal_strategy_test() {
        let mut rng = StdRng::seed_from_u64(13);
        let heads = HeadsProbability::new(0.4).unwrap();
        assert_eq!(
            play_game(&|c| c + 1, heads, Some(10), &mut rng),
            Err(Error::IllegalBet { capital: 10, bet: 11 })
        );
        assert!(matches!(
            play_game(&|_| 1, heads, Some(0), &mut rng),
            Err(Error::InvalidState(_))
        ));
    }

    #[test]
    fn optimal_policy_win_rate() {
        let mut rng = StdRng::seed_from_u64(17);
        let config = PolicyIterationConfig::default();
        let solution = policy_iteration_from(Policy::cautious(), &config).unwrap();
        let heads = HeadsProbability::new(config.heads_probability).unwrap();

        let games = play_games(10_000, &strategy(&solution.policy), heads, Some(50), &mut rng)
            .unwrap();
        let win_rate = games.iter().map(|g| g.reward).sum::<f64>() / games.len() as f64;
        assert!((win_rate - 0.4).abs() < 0.03);
    }
}
