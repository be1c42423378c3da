use thiserror::Error;

use crate::coin_bet::{Bet, Capital};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    // State outside the enumerated state space, or a terminal state where
    // actions are required.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Illegal bet {bet} at capital {capital}")]
    IllegalBet { capital: Capital, bet: Bet },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Policy did not converge within {iterations} iterations")]
    ConvergenceFailure { iterations: usize },

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
