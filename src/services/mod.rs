pub mod ledger;
pub mod availability;
pub mod reports;
