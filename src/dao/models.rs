use serde::{Deserialize, Serialize};

/// Representation of a player profile stored in persistence and shared across layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Display name, unique among stored players.
    pub name: String,
    /// Fastest completed trial in seconds, `None` until the first success.
    #[serde(default)]
    pub best_time: Option<f64>,
    /// Number of completed trials.
    #[serde(default)]
    pub attempts: u32,
}

impl PlayerEntity {
    /// Check the record invariants a well-formed document always satisfies.
    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("player name must not be blank".into());
        }

        if let Some(best) = self.best_time {
            if !best.is_finite() || best < 0.0 {
                return Err(format!(
                    "player `{}` has an invalid best time {best}",
                    self.name
                ));
            }
            if self.attempts == 0 {
                return Err(format!(
                    "player `{}` has a best time but no attempts",
                    self.name
                ));
            }
        }

        Ok(())
    }
}
