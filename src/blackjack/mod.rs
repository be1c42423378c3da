use std::collections::HashMap;

use prettytable::{Cell, Row, Table};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::solver::monte_carlo::{self, Control, ControlConfig};
use crate::solver::Episode;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Card {
    Ace,
    Value(u32),
    Face,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Action {
    Hit,
    Stick,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    Loss,
    Draw,
    Win,
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Hand {
    // Value counts usable ace as 11.
    value: u32,
    usable_ace: bool,
}

// What the player sees when deciding.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct State {
    pub dealer: Card,
    pub player_sum: u32,
    pub usable_ace: bool,
}

// Cards are drawn uniformly with replacement.
#[derive(Clone, Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Action {
    // Greedy ties go to the first action, so the player only hits when it is strictly better.
    pub const ALL: [Action; 2] = [Action::Stick, Action::Hit];
}

impl Outcome {
    pub fn reward(&self) -> f64 {
        match self {
            Outcome::Loss => -1.0,
            Outcome::Draw => 0.0,
            Outcome::Win => 1.0,
        }
    }
}

impl Hand {
    pub fn from_cards(cards: &[Card]) -> Hand {
        cards
            .iter()
            .fold(Hand::default(), |hand, card| hand.add_card(*card))
    }

    fn add_card(&self, card: Card) -> Hand {
        let mut hand = *self;
        match card {
            Card::Ace => {
                if !hand.usable_ace && hand.value <= 10 {
                    hand.usable_ace = true;
                    hand.value += 11;
                } else {
                    hand.value += 1;
                }
            }
            Card::Value(v) => hand.value += v,
            Card::Face => hand.value += 10,
        }

        if hand.value > 21 && hand.usable_ace {
            hand.value -= 10;
            hand.usable_ace = false;
        }
        hand
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn usable_ace(&self) -> bool {
        self.usable_ace
    }
}

impl Deck {
    pub fn new(cards: Vec<Card>) -> Result<Deck> {
        if cards.is_empty() {
            return Err(Error::InvalidParameter("deck has no cards".to_string()));
        }
        if let Some(card) = cards
            .iter()
            .find(|card| matches!(card, Card::Value(v) if !(2..=10).contains(v)))
        {
            return Err(Error::InvalidParameter(format!("invalid card {:?}", card)));
        }
        Ok(Deck { cards })
    }

    // One of each rank: 2 to 10, three face cards and an ace.
    pub fn standard() -> Deck {
        let cards = (2..=10)
            .map(Card::Value)
            .chain(std::iter::repeat(Card::Face).take(3))
            .chain(std::iter::once(Card::Ace))
            .collect();
        Deck { cards }
    }

    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Card {
        self.cards[rng.gen_range(0..self.cards.len())]
    }

    // Distinct cards in the deck, in deck order.
    pub fn distinct_cards(&self) -> Vec<Card> {
        let mut cards = Vec::new();
        for card in &self.cards {
            if !cards.contains(card) {
                cards.push(*card);
            }
        }
        cards
    }
}

impl Default for Deck {
    fn default() -> Deck {
        Deck::standard()
    }
}

pub fn victory_condition(player_score: u32, dealer_score: u32) -> Outcome {
    if player_score > 21 {
        Outcome::Loss
    } else if dealer_score > 21 {
        Outcome::Win
    } else if player_score == dealer_score {
        Outcome::Draw
    } else if player_score > dealer_score {
        Outcome::Win
    } else {
        Outcome::Loss
    }
}

// Deals two cards each; the dealer's first card is the one the player sees.
fn deal<R: Rng + ?Sized>(deck: &Deck, rng: &mut R) -> (Hand, Card, Hand) {
    let player = Hand::default()
        .add_card(deck.draw(rng))
        .add_card(deck.draw(rng));
    let dealer_card = deck.draw(rng);
    let dealer = Hand::default()
        .add_card(dealer_card)
        .add_card(deck.draw(rng));
    (player, dealer_card, dealer)
}

// Dealer takes cards until they reach 17.
fn finish_dealer<R: Rng + ?Sized>(deck: &Deck, mut dealer: Hand, rng: &mut R) -> Hand {
    while dealer.value <= 16 {
        dealer = dealer.add_card(deck.draw(rng));
    }
    dealer
}

// Plays a single game, asking the strategy for every decision while the player is below 21.
// Returns the game reward (-1/0/1) and the visited state-action pairs.
pub fn play_game_with_strategy<R, P>(
    deck: &Deck,
    strategy: &P,
    rng: &mut R,
) -> Episode<(State, Action)>
where
    R: Rng + ?Sized,
    P: Fn(&State, &mut R) -> Action + ?Sized,
{
    let (mut player, dealer_card, dealer) = deal(deck, rng);

    let mut history = Vec::new();
    while player.value < 21 {
        let state = State {
            dealer: dealer_card,
            player_sum: player.value,
            usable_ace: player.usable_ace,
        };
        let action = strategy(&state, rng);
        history.push((state, action));
        match action {
            Action::Hit => player = player.add_card(deck.draw(rng)),
            Action::Stick => break,
        }
    }

    let dealer = finish_dealer(deck, dealer, rng);
    Episode {
        reward: victory_condition(player.value, dealer.value).reward(),
        trajectory: history,
    }
}

// The player keeps hitting until reaching 21 or going bust.
pub fn play_game_without_strategy<R: Rng + ?Sized>(deck: &Deck, rng: &mut R) -> Outcome {
    let (mut player, _, dealer) = deal(deck, rng);
    while player.value < 21 {
        player = player.add_card(deck.draw(rng));
    }
    let dealer = finish_dealer(deck, dealer, rng);
    victory_condition(player.value, dealer.value)
}

// A policy that only sticks on 20 or higher.
pub fn stick_at_20_policy(state: &State) -> Action {
    if state.player_sum < 20 {
        Action::Hit
    } else {
        Action::Stick
    }
}

// Every state the player can decide in: all dealer cards, sums 4 to 21, with and without
// a usable ace.
pub fn all_states(deck: &Deck) -> Vec<State> {
    let mut states = Vec::new();
    for dealer in deck.distinct_cards() {
        for player_sum in 4..=21 {
            for usable_ace in &[true, false] {
                states.push(State {
                    dealer,
                    player_sum,
                    usable_ace: *usable_ace,
                });
            }
        }
    }
    states
}

// Learns a policy with constant-α Monte Carlo control.
pub fn learn_policy<R: Rng + ?Sized>(
    deck: &Deck,
    config: &ControlConfig,
    rng: &mut R,
) -> Result<Control<State, Action>> {
    monte_carlo::constant_alpha_control(
        &all_states(deck),
        &Action::ALL,
        |rng, policy| play_game_with_strategy(deck, policy, rng),
        config,
        rng,
    )
}

pub fn render_policy(policy: &HashMap<State, Action>) -> String {
    let all_cards: Vec<Card> = (2..=10)
        .map(Card::Value)
        .chain([Card::Ace, Card::Face].iter().copied())
        .collect();

    let mut table = Table::new();

    // Header.
    let mut header = Vec::new();
    header.push(Cell::new(""));
    header.push(Cell::new("Ace?"));
    for dealer_card in all_cards.iter() {
        header.push(match dealer_card {
            Card::Ace => Cell::new("A"),
            Card::Value(v) => Cell::new(&format!("{}", v)),
            Card::Face => Cell::new("F"),
        });
    }
    table.add_row(Row::new(header));

    for usable_ace in &[false, true] {
        for player_sum in 11..=21 {
            let mut cells = Vec::new();
            cells.push(Cell::new(&format!("{}", player_sum)));
            cells.push(Cell::new(if *usable_ace { "Y" } else { "N" }));
            for dealer_card in all_cards.iter() {
                let state = State {
                    dealer: *dealer_card,
                    player_sum,
                    usable_ace: *usable_ace,
                };

                match policy.get(&state) {
                    Some(Action::Hit) => cells.push(Cell::new("H")),
                    Some(Action::Stick) => cells.push(Cell::new("S")),
                    None => cells.push(Cell::new("")),
                }
            }
            table.add_row(Row::new(cells));
        }
    }
    table.to_string()
}
