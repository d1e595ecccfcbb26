pub mod births;
pub mod construction;
pub mod demographics;
pub mod ledger;
pub mod security;
pub mod workforce;

pub use births::BirthSystem;
pub use construction::ConstructionSystem;
pub use demographics::DemographicSystem;
pub use ledger::{ResourceLedgerSystem, UpkeepSystem};
pub use security::SecuritySystem;
pub use workforce::WorkforceSystem;
