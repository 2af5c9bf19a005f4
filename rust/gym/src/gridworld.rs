use super::*;
use itertools::Itertools;
use ndarray::Array1;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub const LEFT: Discrete = 0;
pub const DOWN: Discrete = 1;
pub const RIGHT: Discrete = 2;
pub const UP: Discrete = 3;

const START: char = 'A';
const WALL: char = '#';

/// Grid world described by a textual map, FrozenLake style.
///
/// `A` marks start cells, `#` walls. Every other character is a cell kind with
/// its own reward. Acting in a cell of an exit kind collects its reward and
/// ends the episode by moving to a hidden terminal state.
#[derive(Debug, Clone)]
pub struct GridWorld {
    cells: Vec<Vec<char>>,
    rewards: HashMap<char, f64>,
    exits: HashSet<char>,
    slip: f64,
    gamma: f64,
    horizon: Option<usize>,
}

impl GridWorld {
    pub fn new(map: &[&str]) -> Result<Self> {
        let cells = map.iter().map(|r| r.chars().collect_vec()).collect_vec();
        let cols = cells.first().map_or(0, |r| r.len());
        if cols == 0 || cells.iter().any(|r| r.len() != cols) {
            return Err(Error::InvalidMap("map must be a non-empty rectangle".into()));
        }
        if !cells.iter().flatten().any(|&c| c == START) {
            return Err(Error::InvalidMap(format!("no '{START}' start cell")));
        }

        Ok(Self {
            cells,
            rewards: HashMap::new(),
            exits: HashSet::new(),
            slip: 0.,
            gamma: 0.99,
            horizon: None,
        })
    }

    pub fn reward(mut self, kind: char, reward: f64) -> Self {
        self.rewards.insert(kind, reward);
        self
    }

    pub fn exit(mut self, kind: char) -> Self {
        self.exits.insert(kind);
        self
    }

    /// Probability of sliding to one of the two perpendicular directions.
    pub fn slip(mut self, slip: f64) -> Self {
        self.slip = slip;
        self
    }

    pub fn gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn horizon(mut self, horizon: Option<usize>) -> Self {
        self.horizon = horizon;
        self
    }

    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells[0].len()
    }

    /// Number of states: one per cell plus the terminal state.
    pub fn n_s(&self) -> usize {
        self.rows() * self.cols() + 1
    }

    pub fn state(&self, row: usize, col: usize) -> Discrete {
        row * self.cols() + col
    }

    pub fn kind(&self, s: Discrete) -> Option<char> {
        let (row, col) = (s / self.cols(), s % self.cols());
        self.cells.get(row).and_then(|r| r.get(col)).copied()
    }

    fn cell_reward(&self, kind: char) -> f64 {
        self.rewards.get(&kind).copied().unwrap_or(0.)
    }

    fn target(&self, row: usize, col: usize, action: Discrete) -> Discrete {
        let (r, c) = (row as isize, col as isize);
        let (nr, nc) = match action {
            LEFT => (r, c - 1),
            DOWN => (r + 1, c),
            RIGHT => (r, c + 1),
            _ => (r - 1, c),
        };
        let inside = nr >= 0 && nc >= 0 && (nr as usize) < self.rows() && (nc as usize) < self.cols();
        if inside && self.cells[nr as usize][nc as usize] != WALL {
            self.state(nr as usize, nc as usize)
        } else {
            self.state(row, col)
        }
    }

    pub fn transitions(&self) -> Transitions {
        let terminal = self.n_s() - 1;
        let mut transitions = Transitions::new();
        for (row, col) in itertools::iproduct!(0..self.rows(), 0..self.cols()) {
            let kind = self.cells[row][col];
            let s = self.state(row, col);
            let reward = self.cell_reward(kind);
            for a in 0..4 {
                let outcomes = if kind == WALL {
                    vec![(s, 1.)]
                } else if self.exits.contains(&kind) {
                    vec![(terminal, 1.)]
                } else {
                    let (left, right) = ((a + 3) % 4, (a + 1) % 4);
                    vec![
                        (self.target(row, col, a), 1. - self.slip),
                        (self.target(row, col, left), self.slip / 2.),
                        (self.target(row, col, right), self.slip / 2.),
                    ]
                };
                let ts = outcomes
                    .into_iter()
                    .filter(|(_, p)| *p > 0.)
                    .map(|(next_state, probability)| Transition {
                        next_state,
                        probability,
                        reward,
                        done: next_state == terminal,
                    })
                    .collect();
                transitions.insert((s, a), ts);
            }
        }

        transitions
    }

    pub fn build(&self) -> Result<(MdpSpec, RewardTable)> {
        let starts = self
            .cells
            .iter()
            .flatten()
            .positions(|&c| c == START)
            .collect_vec();
        let mut d0 = Array1::zeros(self.n_s());
        for &s in &starts {
            d0[s] = 1. / starts.len() as f64;
        }

        MdpSpec::from_transitions(
            self.n_s(),
            4,
            self.gamma,
            &self.transitions(),
            d0,
            self.horizon,
        )
    }

    pub fn make_env(&self, name: &str) -> Result<TabularEnv> {
        let (spec, reward) = self.build()?;
        Ok(TabularEnv::new(name, Arc::new(spec), reward))
    }

    /// Draws a deterministic policy as arrows, one map row per line.
    pub fn render_policy(&self, actions: &[Discrete]) -> String {
        self.cells
            .iter()
            .enumerate()
            .map(|(row, cells)| {
                cells
                    .iter()
                    .enumerate()
                    .map(|(col, &kind)| {
                        if kind == WALL || self.exits.contains(&kind) {
                            return kind;
                        }
                        match actions.get(self.state(row, col)) {
                            Some(&LEFT) => '<',
                            Some(&DOWN) => 'v',
                            Some(&RIGHT) => '>',
                            Some(&UP) => '^',
                            _ => '?',
                        }
                    })
                    .collect::<String>()
            })
            .join("\n")
    }
}
