//! Cairn Core
//!
//! Building blocks shared by Cairn resource handlers: the resource model, the
//! provider contract, desired-state parameter reconciliation and the
//! convergence waiter used while remote resources settle.

pub mod differ;
pub mod parameter;
pub mod provider;
pub mod resource;
pub mod waiter;
