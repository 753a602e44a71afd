//! Game registry: game-type id -> configuration + constructor
//!
//! Built once at startup and handed to the arena service. Tests build their
//! own registries with fake games.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use super::book::{MatchBook, Player};
use super::chess::ChessGame;
use super::coin_flip::{CoinFlip, CoinFlipRules};
use super::rps::{RockPaperScissors, RpsRules};
use super::tictactoe::TicTacToe;
use super::GameRules;

/// Builds a game from a fresh book and the match seed
pub type GameFactory = Arc<dyn Fn(MatchBook, u64) -> Box<dyn GameRules> + Send + Sync>;

/// Static configuration of one game type
#[derive(Debug, Clone, Serialize)]
pub struct GameConfig {
    pub id: String,
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    /// Per player, smallest currency unit
    pub entry_fee: u64,
    /// Per externally submitted move; zero disables it
    pub move_fee: u64,
    pub win_condition: String,
    pub max_rounds: u32,
    pub turn_based: bool,
}

impl GameConfig {
    fn validate(&self) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidConfig {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(invalid("id and name must be non-empty"));
        }
        if self.min_players != 2 || self.max_players != 2 {
            return Err(invalid("matches are always between exactly two players"));
        }
        if self.max_rounds == 0 {
            return Err(invalid("max_rounds must be at least 1"));
        }
        Ok(())
    }
}

/// Fee and limit settings applied to the built-in games
#[derive(Debug, Clone, Copy)]
pub struct StandardGames {
    pub entry_fee: u64,
    pub move_fee: u64,
    pub chess_max_plies: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Unknown game type: {0}")]
    UnknownGame(String),

    #[error("Invalid configuration for {id}: {reason}")]
    InvalidConfig { id: String, reason: String },

    #[error("Game type already registered: {0}")]
    Duplicate(String),
}

struct Entry {
    config: GameConfig,
    factory: GameFactory,
}

/// Registry of playable game types
#[derive(Default)]
pub struct GameRegistry {
    games: HashMap<String, Entry>,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rock-paper-scissors, coin flip, tic-tac-toe and chess
    pub fn standard(settings: StandardGames) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        let config = |id: &str, name: &str, max_rounds: u32, turn_based: bool, win: String| {
            GameConfig {
                id: id.to_string(),
                name: name.to_string(),
                min_players: 2,
                max_players: 2,
                entry_fee: settings.entry_fee,
                move_fee: settings.move_fee,
                win_condition: win,
                max_rounds,
                turn_based,
            }
        };

        registry.register(
            config("rps", "Rock Paper Scissors", 9, false, "First to 5 round wins".into()),
            |book, _seed| Box::new(RockPaperScissors::new(book, RpsRules)),
        )?;
        registry.register(
            config("coinflip", "Coin Flip", 5, false, "First to 3 correct calls".into()),
            |book, seed| Box::new(CoinFlip::new(book, CoinFlipRules::new(seed))),
        )?;
        registry.register(
            config("tictactoe", "Tic-Tac-Toe", 3, true, "First to win 2 boards".into()),
            |book, _seed| Box::new(TicTacToe::new(book)),
        )?;

        let max_plies = settings.chess_max_plies;
        registry.register(
            config(
                "chess",
                "Chess",
                1,
                true,
                "Checkmate or resignation; stalemate and draws split nothing".into(),
            ),
            move |book, seed| Box::new(ChessGame::new(book, seed, max_plies)),
        )?;

        Ok(registry)
    }

    pub fn register<F>(&mut self, config: GameConfig, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(MatchBook, u64) -> Box<dyn GameRules> + Send + Sync + 'static,
    {
        config.validate()?;
        let id = normalize_id(&config.id);
        if self.games.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }

        let config = GameConfig { id: id.clone(), ..config };
        self.games.insert(
            id,
            Entry {
                config,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    pub fn config(&self, id: &str) -> Option<&GameConfig> {
        self.games.get(&normalize_id(id)).map(|e| &e.config)
    }

    /// Configured games, sorted by id
    pub fn configs(&self) -> Vec<&GameConfig> {
        let mut configs: Vec<&GameConfig> = self.games.values().map(|e| &e.config).collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }

    /// Instantiate the state machine for a new match
    pub fn create_game(
        &self,
        id: &str,
        match_id: Uuid,
        players: [Player; 2],
        seed: u64,
    ) -> Result<Box<dyn GameRules>, RegistryError> {
        let entry = self
            .games
            .get(&normalize_id(id))
            .ok_or_else(|| RegistryError::UnknownGame(id.to_string()))?;

        let book = MatchBook::new(
            match_id,
            entry.config.id.clone(),
            players,
            entry.config.max_rounds,
        );
        Ok((entry.factory)(book, seed))
    }
}

/// `Tic-Tac-Toe`, `tic_tac_toe` and `tictactoe` name the same game
pub fn normalize_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snapshot::GameDetail;

    fn standard() -> GameRegistry {
        GameRegistry::standard(StandardGames {
            entry_fee: 100,
            move_fee: 0,
            chess_max_plies: 50,
        })
        .unwrap()
    }

    fn players() -> [Player; 2] {
        [Player::new("a", "A"), Player::new("b", "B")]
    }

    #[test]
    fn test_standard_games_are_registered() {
        let registry = standard();
        let ids: Vec<&str> = registry.configs().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["chess", "coinflip", "rps", "tictactoe"]);

        let chess = registry.config("chess").unwrap();
        assert_eq!(chess.max_rounds, 1);
        assert!(chess.turn_based);
        assert!(!registry.config("rps").unwrap().turn_based);
        assert_eq!(registry.config("rps").unwrap().max_rounds, 9);
    }

    #[test]
    fn test_lookup_normalizes_ids() {
        let registry = standard();
        assert!(registry.config("Tic-Tac-Toe").is_some());
        assert!(registry.config("coin_flip").is_some());
    }

    #[test]
    fn test_unknown_game_is_an_error_not_a_default() {
        let registry = standard();
        let err = registry
            .create_game("checkers", Uuid::new_v4(), players(), 1)
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::UnknownGame("checkers".to_string()));
    }

    #[test]
    fn test_create_game_builds_matching_variant() {
        let registry = standard();
        let game = registry
            .create_game("tictactoe", Uuid::new_v4(), players(), 1)
            .unwrap();
        assert!(matches!(game.public_state().detail, GameDetail::TicTacToe { .. }));
        assert_eq!(game.book().max_rounds(), 3);
        assert_eq!(game.book().game(), "tictactoe");
    }

    #[test]
    fn test_malformed_config_is_rejected() {
        let mut registry = GameRegistry::new();
        let config = GameConfig {
            id: "crowd".to_string(),
            name: "Crowd".to_string(),
            min_players: 2,
            max_players: 4,
            entry_fee: 0,
            move_fee: 0,
            win_condition: String::new(),
            max_rounds: 3,
            turn_based: false,
        };
        let err = registry
            .register(config, |book, _| Box::new(TicTacToe::new(book)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidConfig { .. }));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = standard();
        let config = registry.config("rps").unwrap().clone();
        let err = registry
            .register(config, |book, _| Box::new(TicTacToe::new(book)))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("rps".to_string()));
    }
}
