//! Route modules, one per resource family.

pub mod dashboard;
pub mod jurisdictions;
pub mod regression;
pub mod rulepacks;
pub mod statute;
