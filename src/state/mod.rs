pub mod clock;
pub mod events;
pub mod player;
pub mod session;
pub mod trial;

pub use self::events::{EventHub, TrialEvent};
pub use self::player::{DEFAULT_PLAYER_NAME, LoadedStore, PlayerRecord, PlayerStore};
pub use self::session::{Session, SubmitOutcome};
pub use self::trial::{ArmedTrial, TrialEngine, TrialOutcome, TrialPhase};
