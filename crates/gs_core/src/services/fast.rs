//! Deterministic placeholder game simulation.
//!
//! Used when `SimulationSettings::skip_game_simulation` is set: synthesizes
//! plausible scores and minimal stat lines without running the play-by-play
//! engine, so the database stays consistent at full throughput. The same
//! matchup always produces the same result: the random stream is seeded
//! from a version-stable hash of the pairing.

use fxhash::hash64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::db::standings::PlayerGameStats;

use super::{GameSimulator, SimulatedGame};

/// Zero-dependency simulator producing deterministic placeholder results.
#[derive(Debug, Clone, Copy, Default)]
pub struct FastGameSimulator;

impl FastGameSimulator {
    fn quarterback_line(team_id: u32, rng: &mut ChaCha8Rng) -> PlayerGameStats {
        let attempts = rng.gen_range(24..=42);
        let completions = rng.gen_range(attempts / 2..=attempts * 3 / 4);
        PlayerGameStats {
            player_id: team_id * 100 + 1,
            team_id,
            position: "QB".to_string(),
            pass_attempts: attempts,
            pass_completions: completions,
            pass_yards: completions * rng.gen_range(9..=13),
            pass_tds: rng.gen_range(0..=4),
            interceptions_thrown: rng.gen_range(0..=2),
            ..Default::default()
        }
    }

    fn running_back_line(team_id: u32, rng: &mut ChaCha8Rng) -> PlayerGameStats {
        let carries = rng.gen_range(12..=26);
        PlayerGameStats {
            player_id: team_id * 100 + 2,
            team_id,
            position: "RB".to_string(),
            rush_attempts: carries,
            rush_yards: carries * rng.gen_range(3..=5),
            rush_tds: rng.gen_range(0..=2),
            receptions: rng.gen_range(1..=5),
            receiving_yards: rng.gen_range(5..=45),
            ..Default::default()
        }
    }
}

impl GameSimulator for FastGameSimulator {
    fn simulate_one_game(&self, home_id: u32, away_id: u32) -> anyhow::Result<SimulatedGame> {
        let mut rng = ChaCha8Rng::seed_from_u64(hash64(&(home_id, away_id)));

        // Field-goal/touchdown mixes produce football-shaped scores
        let mut home_score = rng.gen_range(0..=5) * 7 + rng.gen_range(0..=3) * 3;
        let mut away_score = rng.gen_range(0..=5) * 7 + rng.gen_range(0..=3) * 3;

        // Regulation ties go to overtime and always resolve, so brackets
        // never stall on an undecided game
        let mut overtime = false;
        if home_score == away_score {
            overtime = true;
            if rng.gen_bool(0.5) {
                home_score += 3;
            } else {
                away_score += 3;
            }
        }

        let player_stats = vec![
            Self::quarterback_line(home_id, &mut rng),
            Self::running_back_line(home_id, &mut rng),
            Self::quarterback_line(away_id, &mut rng),
            Self::running_back_line(away_id, &mut rng),
        ];

        Ok(SimulatedGame {
            home_score,
            away_score,
            overtime,
            player_stats,
        })
    }
}
