mod ledger;
mod sim;

pub use ledger::{ClientError, Ledger, LedgerEntity, Receipt};
pub use sim::{SimConfig, SimEntity, SimLedger};
