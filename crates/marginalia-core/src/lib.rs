//! Marginalia Core: shared kernel for the commerce core.
//!
//! This crate defines the records, ports and error types that every bounded
//! context depends on. It contains no infrastructure code: the relational
//! store and the payment collaborator are reached only through the traits in
//! [`store`] and [`gateway`].

pub mod actor;
pub mod clock;
pub mod codes;
pub mod command;
pub mod error;
pub mod gateway;
pub mod model;
pub mod store;
