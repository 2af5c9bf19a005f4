extern crate float_eq;
extern crate pirl_gym;
extern crate rand;
extern crate rstest;

use float_eq::*;
use pirl_gym::*;
use rand::prelude::*;
use rstest::rstest;

fn random_episodes(env: &mut TabularEnv, seed: u64, episodes: usize) -> Vec<Vec<(Discrete, f64)>> {
    env.seed(seed);
    let mut rng = StdRng::seed_from_u64(seed);
    (0..episodes)
        .map(|_| {
            let mut steps = vec![(env.reset(), 0.)];
            loop {
                let action = rng.gen_range(0..env.n_a());
                let si = env.step(action).unwrap();
                steps.push((si.observation, si.reward));
                if si.done() {
                    break;
                }
            }
            steps
        })
        .collect()
}

#[rstest]
fn dynamics_are_well_formed(#[values(
    "pirl/GridWorld-Simple-v0",
    "pirl/GridWorld-Simple-Deterministic-v0",
    "pirl/GridWorld-Jungle-Soda-v0",
    "pirl/GridWorld-Jungle-Water-v0",
    "pirl/GridWorld-Jungle-9x9-Soda-v0",
    "pirl/GridWorld-Jungle-9x9-Water-v0",
    "pirl/GridWorld-Jungle-9x9-Liquid-v0"
)] name: &str) {
    let env = make(name).unwrap();
    let n_s = env.n_s();
    assert_eq!(env.n_a(), 4);
    assert_eq!(env.horizon(), Some(100));

    for row in env.transition_rows().rows() {
        assert_float_eq!(row.sum(), 1., abs <= 1e-12);
    }
    assert_float_eq!(env.initial_states().sum(), 1., abs <= 1e-12);

    let terminals: Vec<_> = (0..n_s).filter(|&s| env.terminal()[s]).collect();
    assert_eq!(terminals, vec![n_s - 1]);
    assert_eq!(env.initial_states()[n_s - 1], 0.);
}

#[rstest]
#[case("pirl/GridWorld-Simple-v0")]
#[case("pirl/GridWorld-Jungle-Soda-v0")]
#[case("pirl/GridWorld-Jungle-9x9-Liquid-v0")]
fn seeded_episodes_replay(#[case] name: &str) {
    let mut a = make(name).unwrap();
    let mut b = make(name).unwrap();

    let first = random_episodes(&mut a, 42, 5);
    assert_eq!(first, random_episodes(&mut b, 42, 5));
    assert_eq!(first, random_episodes(&mut a, 42, 5));

    for episode in &first {
        assert!(episode.len() <= 101);
        let (start, _) = episode[0];
        assert!(a.initial_states()[start] > 0.);
    }
}

#[test]
fn finished_episode_must_be_reset() {
    let mut env = make("pirl/GridWorld-Simple-Deterministic-v0").unwrap();
    assert!(matches!(env.step(0), Err(Error::EpisodeFinished)));

    env.reset();
    for action in [gridworld::DOWN, gridworld::DOWN, gridworld::RIGHT, gridworld::RIGHT] {
        let si = env.step(action).unwrap();
        assert!(!si.done());
    }
    let si = env.step(gridworld::UP).unwrap();
    assert!(si.terminated);
    assert_eq!(si.reward, 1.);
    assert!(matches!(env.step(gridworld::UP), Err(Error::EpisodeFinished)));

    assert_eq!(env.reset(), 0);
}

#[test]
fn out_of_range_action_is_rejected() {
    let mut env = make("pirl/GridWorld-Simple-v0").unwrap();
    env.reset();
    assert!(matches!(
        env.step(4),
        Err(Error::InvalidAction { action: 4, n_a: 4 })
    ));
}

#[test]
fn truncation_at_horizon() {
    let mut env = make("pirl/GridWorld-Simple-Deterministic-v0").unwrap();
    env.reset();
    for t in 1..=100 {
        let si = env.step(gridworld::LEFT).unwrap();
        assert_eq!(si.observation, 0);
        assert_eq!(si.truncated, t == 100);
        assert!(!si.terminated);
    }
}
