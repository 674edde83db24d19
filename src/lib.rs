//! Loyalty-program membership and reward-point ledger for airline passengers.
//!
//! [`domain::MembershipLedger`] holds members, their point balances and the tier derived from
//! them. The [`commands::MetricsReporter`] forwards scenario-run outcomes to a
//! [`ports::metrics::MetricsPort`] sink.

pub mod adapters;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;

pub use domain::{LedgerError, Member, MembershipLedger, Tier};
