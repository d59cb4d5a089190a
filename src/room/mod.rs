// Room view state: the reconciliation engine and the action dispatcher.

pub mod actions;
pub mod engine;
