//! Employee shift rostering.
//!
//! A catalog of employees, periods and days becomes a boolean constraint
//! model (`constraints`), is handed to a solver backend (`solver`), and the
//! returned valuation is materialized into a validated `Roster` (`roster`)
//! that can be exported as CSV or JSON (`export`).

pub mod api;
pub mod config;
#[cfg(feature = "console")]
pub mod console;
pub mod constraints;
pub mod demo_data;
pub mod domain;
pub mod dto;
pub mod error;
pub mod export;
pub mod model;
pub mod preferences;
pub mod roster;
pub mod solver;
