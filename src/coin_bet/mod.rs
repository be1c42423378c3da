use std::ops::RangeInclusive;

use nalgebra::{DMatrix, DVector};
use plotlib::{
    page::Page,
    repr::Plot,
    style::{PointMarker, PointStyle},
    view::ContinuousView,
};
use prettytable::{Cell, Row, Table};
use rand::Rng;

use crate::error::{Error, Result};

pub mod policy_iteration;
pub mod simulation;

pub type Capital = usize;
pub type Bet = usize;

// Capital at which the gambler wins. Capital 0 is ruin.
pub const GOAL: Capital = 100;

const MAX_BET: Bet = GOAL / 2;

// Probability that the coin lands heads, i.e. that the gambler wins the bet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeadsProbability(f64);

impl HeadsProbability {
    pub fn new(probability: f64) -> Result<HeadsProbability> {
        if probability.is_finite() && probability > 0.0 && probability < 1.0 {
            Ok(HeadsProbability(probability))
        } else {
            Err(Error::InvalidParameter(format!(
                "heads probability must be in (0, 1), got {}",
                probability
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

pub fn is_terminal(capital: Capital) -> bool {
    capital == 0 || capital == GOAL
}

fn check_capital(capital: Capital) -> Result<()> {
    if capital > GOAL {
        return Err(Error::InvalidState(format!(
            "capital {} is outside 0..={}",
            capital, GOAL
        )));
    }
    Ok(())
}

// Returns all bets the gambler can make with the given capital.
// You can bet at most what you have, and never more than is needed to reach the goal.
pub fn calculate_actions(capital: Capital) -> Result<RangeInclusive<Bet>> {
    check_capital(capital)?;
    if is_terminal(capital) {
        return Err(Error::InvalidState(format!(
            "capital {} is terminal and has no bets",
            capital
        )));
    }
    Ok(1..=capital.min(GOAL - capital))
}

pub fn check_bet(capital: Capital, bet: Bet) -> Result<()> {
    if calculate_actions(capital)?.contains(&bet) {
        Ok(())
    } else {
        Err(Error::IllegalBet { capital, bet })
    }
}

pub fn indicator(x: Capital, target: Capital) -> f64 {
    if x == target {
        1.0
    } else {
        0.0
    }
}

// Value of every capital 0..=GOAL.
// Terminal capitals carry no continuation value: the goal reward is paid on the
// transition into GOAL, so both stay at their initial value.
#[derive(Clone, Debug, PartialEq)]
pub struct StateValues {
    values: DVector<f64>,
}

impl StateValues {
    pub fn zeros() -> StateValues {
        StateValues {
            values: DVector::zeros(GOAL + 1),
        }
    }

    pub fn from_values(values: Vec<f64>) -> Result<StateValues> {
        if values.len() != GOAL + 1 {
            return Err(Error::InvalidParameter(format!(
                "expected {} state values, got {}",
                GOAL + 1,
                values.len()
            )));
        }
        if let Some((capital, value)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(Error::InvalidParameter(format!(
                "state value at capital {} is not finite: {}",
                capital, value
            )));
        }
        Ok(StateValues {
            values: DVector::from_vec(values),
        })
    }

    pub fn value(&self, capital: Capital) -> Result<f64> {
        check_capital(capital)?;
        Ok(self.values[capital])
    }

    // Probability of eventually reaching the goal from the given capital.
    pub fn goal_probability(&self, capital: Capital) -> Result<f64> {
        if capital == GOAL {
            return Ok(1.0);
        }
        self.value(capital)
    }

    pub(crate) fn set(&mut self, capital: Capital, value: f64) {
        self.values[capital] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capital, f64)> + '_ {
        self.values.iter().copied().enumerate()
    }

    // Largest absolute difference between the two tables.
    pub fn max_delta(&self, other: &StateValues) -> f64 {
        (&self.values - &other.values).amax()
    }

    // Divides all values by the largest one.
    pub fn normalised(&self) -> Result<StateValues> {
        let max_value = self
            .values
            .iter()
            .fold(f64::NEG_INFINITY, |a, b| a.max(*b));
        if !(max_value > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "cannot normalise state values with maximum {}",
                max_value
            )));
        }
        Ok(StateValues {
            values: &self.values / max_value,
        })
    }
}

// Value of every (capital, bet) pair with a legal bet.
// Rows are capitals, columns are bets; cells of illegal pairs are never read.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionValues {
    values: DMatrix<f64>,
}

impl ActionValues {
    pub(crate) fn zeros() -> ActionValues {
        ActionValues {
            values: DMatrix::zeros(GOAL + 1, MAX_BET + 1),
        }
    }

    pub fn value(&self, capital: Capital, bet: Bet) -> Result<f64> {
        check_bet(capital, bet)?;
        Ok(self.values[(capital, bet)])
    }

    pub(crate) fn set(&mut self, capital: Capital, bet: Bet, value: f64) {
        self.values[(capital, bet)] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capital, Bet, f64)> + '_ {
        (1..GOAL).flat_map(move |capital| {
            (1..=capital.min(GOAL - capital))
                .map(move |bet| (capital, bet, self.values[(capital, bet)]))
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }
}

// Deterministic policy: a single bet for every non-terminal capital.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    // Bet for capital `i + 1`.
    bets: Vec<Bet>,
}

impl Policy {
    pub fn from_bets(bets: Vec<Bet>) -> Result<Policy> {
        if bets.len() != GOAL - 1 {
            return Err(Error::InvalidParameter(format!(
                "expected {} bets, got {}",
                GOAL - 1,
                bets.len()
            )));
        }
        for (i, bet) in bets.iter().enumerate() {
            check_bet(i + 1, *bet)?;
        }
        Ok(Policy { bets })
    }

    // Picks a uniformly random legal bet for every capital.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Policy {
        Policy {
            bets: (1..GOAL)
                .map(|capital| rng.gen_range(1..=capital.min(GOAL - capital)))
                .collect(),
        }
    }

    // Always bets 1.
    pub fn cautious() -> Policy {
        Policy {
            bets: vec![1; GOAL - 1],
        }
    }

    // Always bets the largest legal amount.
    pub fn bold() -> Policy {
        Policy {
            bets: (1..GOAL).map(|capital| capital.min(GOAL - capital)).collect(),
        }
    }

    pub fn bet(&self, capital: Capital) -> Result<Bet> {
        calculate_actions(capital)?;
        Ok(self.bets[capital - 1])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Capital, Bet)> + '_ {
        self.bets.iter().enumerate().map(|(i, bet)| (i + 1, *bet))
    }
}

fn render_points(values: Vec<(f64, f64)>, y_max: f64, y_label: &str) -> Result<String> {
    let s1 = Plot::new(values).point_style(PointStyle::new().marker(PointMarker::Circle));
    let v = ContinuousView::new()
        .add(s1)
        .x_range(0.0, GOAL as f64)
        .y_range(0.0, y_max)
        .x_label("Capital")
        .y_label(y_label);
    Page::single(&v)
        .dimensions(100, 50)
        .to_text()
        .map_err(|e| Error::Render(e.to_string()))
}

pub fn render_state_values(state_values: &StateValues) -> Result<String> {
    let values = (1..GOAL)
        .map(|capital| (capital as f64, state_values.values[capital]))
        .collect();
    render_points(values, 1.0, "Value")
}

pub fn render_policy(policy: &Policy) -> Result<String> {
    let values = policy
        .iter()
        .map(|(capital, bet)| (capital as f64, bet as f64))
        .collect();
    render_points(values, MAX_BET as f64, "Bet")
}

// Tabulates the policy ten capitals per row.
pub fn render_policy_table(policy: &Policy) -> String {
    let mut table = Table::new();

    let mut header = vec![Cell::new("")];
    for column in 0..10 {
        header.push(Cell::new(&format!("+{}", column)));
    }
    table.add_row(Row::new(header));

    for row in 0..10 {
        let mut cells = vec![Cell::new(&format!("{}", row * 10))];
        for column in 0..10 {
            let capital = row * 10 + column;
            match policy.bet(capital) {
                Ok(bet) => cells.push(Cell::new(&format!("{}", bet))),
                Err(_) => cells.push(Cell::new("")),
            }
        }
        table.add_row(Row::new(cells));
    }
    table.to_string()
}
