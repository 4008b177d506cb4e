//! Tradedesk Library
//!
//! Core components for the tradedesk brokerage-monitoring server: the trading
//! safety gate, order tracking persistence, and the order lifecycle reconciler
//! that keeps the local store consistent with an eventually-consistent
//! upstream brokerage.

pub mod application;
pub mod config;
pub mod domain;
pub mod gate;
pub mod infrastructure;
pub mod persistence;
