pub mod fake_ledger;
pub mod fake_listing;
