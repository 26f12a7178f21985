// Persisted rows: counters and the teams they tag
pub mod sequence_counter;
pub mod team;
pub use sequence_counter::{Entity as SequenceCounter, Model as SequenceCounterModel};
pub use team::{Entity as Team, Model as TeamModel, RegistrationStatus};
