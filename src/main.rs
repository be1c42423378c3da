use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use tabular_rl::blackjack::{self, Deck};
use tabular_rl::coin_bet::policy_iteration::{
    GamblerPolicyIteration, PolicyIterationConfig, Status,
};
use tabular_rl::coin_bet::{self, simulation, HeadsProbability};
use tabular_rl::random_walk;
use tabular_rl::solver::monte_carlo::{average_reward, ControlConfig, EvaluationConfig};
use tabular_rl::solver::Episode;
use tabular_rl::Result;

#[derive(Parser, Debug)]
#[command(about = "Tabular reinforcement learning exercises")]
struct Args {
    /// Seed for every random draw; random when omitted.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solves the Gambler's Problem with policy iteration.
    Gambler {
        #[arg(long, default_value_t = 0.4)]
        heads_probability: f64,
        #[arg(long, default_value_t = 100_000)]
        max_iterations: usize,
        #[arg(long, default_value_t = 1e-13)]
        tolerance: f64,
        /// Games to simulate with the solved policy from capital 50.
        #[arg(long, default_value_t = 10_000)]
        games: usize,
    },
    /// Learns a Blackjack policy with constant-alpha Monte Carlo control.
    Blackjack {
        #[arg(long, default_value_t = 0.1)]
        epsilon: f64,
        #[arg(long, default_value_t = 0.01)]
        alpha: f64,
        #[arg(long, default_value_t = 1_000_000)]
        episodes: u64,
        #[arg(long, default_value_t = 100_000)]
        games: u64,
    },
    /// Evaluates the equiprobable seven-state random walk with fixed-alpha Monte Carlo.
    RandomWalk {
        #[arg(long, default_value_t = 0.01)]
        alpha: f64,
        #[arg(long, default_value_t = 10_000)]
        episodes: u64,
        #[arg(long, default_value_t = 1000)]
        snapshot_every: u64,
    },
}

fn run_gambler(config: PolicyIterationConfig, games: usize, rng: &mut StdRng) -> Result<()> {
    let gambler = GamblerPolicyIteration::with_config(&config, rng)?;
    match gambler.status {
        Status::Converged { iterations } => {
            println!("Converged to optimal policy in {} iterations.", iterations)
        }
        Status::NotConverged { iterations } => {
            println!("No convergence after {} iterations.", iterations)
        }
    }

    println!("{}", coin_bet::render_state_values(&gambler.value_function)?);
    println!("{}", coin_bet::render_policy(&gambler.policy)?);
    println!("{}", coin_bet::render_policy_table(&gambler.policy));

    let heads = HeadsProbability::new(config.heads_probability)?;
    let episodes = simulation::play_games(
        games,
        &simulation::strategy(&gambler.policy),
        heads,
        Some(50),
        rng,
    )?;
    let wins = episodes.iter().filter(|e| e.reward > 0.0).count();
    println!(
        "Won {} of {} games from capital 50 (expected {:.4}).",
        wins,
        games,
        gambler.value_function.goal_probability(50)?
    );
    Ok(())
}

fn run_blackjack(config: ControlConfig, games: u64, rng: &mut StdRng) -> Result<()> {
    let deck = Deck::standard();
    let control = blackjack::learn_policy(&deck, &config, rng)?;
    println!("{}", blackjack::render_policy(&control.policy));

    let optimal_returns = average_reward(
        |rng: &mut StdRng| {
            Ok(blackjack::play_game_with_strategy(
                &deck,
                &|state: &blackjack::State, _: &mut StdRng| control.greedy(state),
                rng,
            ))
        },
        games,
        rng,
    )?;
    let naive_returns = average_reward(
        |rng: &mut StdRng| {
            Ok(blackjack::play_game_with_strategy(
                &deck,
                &|state: &blackjack::State, _: &mut StdRng| {
                    blackjack::stick_at_20_policy(state)
                },
                rng,
            ))
        },
        games,
        rng,
    )?;
    let strategyless_returns = average_reward(
        |rng: &mut StdRng| {
            Ok(Episode::<()> {
                reward: blackjack::play_game_without_strategy(&deck, rng).reward(),
                trajectory: vec![],
            })
        },
        games,
        rng,
    )?;
    println!("Average returns without strategy: {}", strategyless_returns);
    println!("Average naive returns: {}", naive_returns);
    println!("Average optimal returns: {}", optimal_returns);
    Ok(())
}

fn run_random_walk(config: EvaluationConfig, rng: &mut StdRng) -> Result<()> {
    let evaluation = random_walk::evaluate(&random_walk::initial_policy(), &config, rng)?;
    let true_values = random_walk::true_state_values();

    let mut states: Vec<_> = evaluation.state_values.keys().copied().collect();
    states.sort();
    for state in states {
        println!(
            "{:>3}: {:.4} (true {:.4})",
            state, evaluation.state_values[&state], true_values[&state]
        );
    }
    println!("Kept {} snapshots.", evaluation.history.len());
    Ok(())
}

fn main() {
    let args = Args::parse();
    tabular_rl::init_logging(if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let result = match args.command {
        Command::Gambler {
            heads_probability,
            max_iterations,
            tolerance,
            games,
        } => run_gambler(
            PolicyIterationConfig {
                heads_probability,
                max_iterations,
                tolerance,
            },
            games,
            &mut rng,
        ),
        Command::Blackjack {
            epsilon,
            alpha,
            episodes,
            games,
        } => run_blackjack(
            ControlConfig {
                epsilon,
                alpha,
                episodes,
            },
            games,
            &mut rng,
        ),
        Command::RandomWalk {
            alpha,
            episodes,
            snapshot_every,
        } => run_random_walk(
            EvaluationConfig {
                alpha,
                episodes,
                snapshot_every,
            },
            &mut rng,
        ),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
