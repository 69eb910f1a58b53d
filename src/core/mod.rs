//! Core business logic - framework-agnostic operations over the inventory.
//!
//! Nothing in here knows about HTTP; the `api` module is a thin layer on top.

pub mod advisor;
pub mod generator;
pub mod ledger;
pub mod locks;
pub mod product;
pub mod report;
pub mod supplier;
