use super::*;

const STEP_COST: f64 = -0.1;
const JUNGLE_COST: f64 = -1.;
const HORIZON: Option<usize> = Some(100);

const SIMPLE_MAP: [&str; 3] = ["A..", ".J.", "..G"];

const JUNGLE_MAP: [&str; 4] = ["A.JW", ".JJ.", "....", "D..."];

const JUNGLE_9X9_MAP: [&str; 9] = [
    "A....JJJW",
    ".##..JJJ.",
    "..#......",
    "JJ...##..",
    "JJ.......",
    "....JJJ..",
    "D#..JJJ..",
    "..#......",
    "W.....##D",
];

#[derive(Debug, Clone, Copy)]
enum Drink {
    Soda,
    Water,
    Liquid,
}

impl Drink {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Soda" => Some(Self::Soda),
            "Water" => Some(Self::Water),
            "Liquid" => Some(Self::Liquid),
            _ => None,
        }
    }

    /// Rewards for soda (`D`) and water (`W`) cells.
    fn rewards(self) -> (f64, f64) {
        match self {
            Self::Soda => (1., 0.),
            Self::Water => (0., 1.),
            Self::Liquid => (1., 1.),
        }
    }
}

pub fn registered_names() -> Vec<String> {
    let mut names = vec![
        "pirl/GridWorld-Simple-v0".to_string(),
        "pirl/GridWorld-Simple-Deterministic-v0".to_string(),
    ];
    names.extend(["Soda", "Water"].map(|k| format!("pirl/GridWorld-Jungle-{k}-v0")));
    names.extend(["Soda", "Water", "Liquid"].map(|k| format!("pirl/GridWorld-Jungle-9x9-{k}-v0")));
    names
}

fn simple(slip: f64) -> Result<GridWorld> {
    Ok(GridWorld::new(&SIMPLE_MAP)?
        .reward('A', STEP_COST)
        .reward('.', STEP_COST)
        .reward('J', JUNGLE_COST)
        .reward('G', 1.)
        .exit('G')
        .slip(slip)
        .horizon(HORIZON))
}

fn jungle(map: &[&str], drink: Drink) -> Result<GridWorld> {
    let (soda, water) = drink.rewards();
    Ok(GridWorld::new(map)?
        .reward('A', STEP_COST)
        .reward('.', STEP_COST)
        .reward('J', JUNGLE_COST)
        .reward('D', soda)
        .reward('W', water)
        .exit('D')
        .exit('W')
        .slip(0.1)
        .horizon(HORIZON))
}

/// Resolves a registered environment name to its grid world description.
pub fn grid_world(name: &str) -> Result<GridWorld> {
    let unknown = || Error::UnknownEnvironment(name.to_string());
    let id = name
        .strip_prefix("pirl/GridWorld-")
        .and_then(|s| s.strip_suffix("-v0"))
        .ok_or_else(unknown)?;

    match id {
        "Simple" => simple(0.2),
        "Simple-Deterministic" => simple(0.),
        _ => {
            if let Some(drink) = id.strip_prefix("Jungle-9x9-").and_then(Drink::parse) {
                jungle(&JUNGLE_9X9_MAP, drink)
            } else {
                match id.strip_prefix("Jungle-").and_then(Drink::parse) {
                    Some(Drink::Liquid) | None => Err(unknown()),
                    Some(drink) => jungle(&JUNGLE_MAP, drink),
                }
            }
        }
    }
}

pub fn make(name: &str) -> Result<TabularEnv> {
    let env = grid_world(name)?.make_env(name)?;
    tracing::debug!(name, n_s = env.n_s(), n_a = env.n_a(), "made environment");
    Ok(env)
}
