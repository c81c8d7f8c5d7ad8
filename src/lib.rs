//! tradewallet: user wallets and simulated stock trading over HTTP
//!
//! Cash balances and share holdings are kept consistent per user: every
//! mutation for one user runs inside that user's exclusion domain, and a
//! trade either fully settles or is compensated back.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod domain;
pub mod persistence;
pub mod rate_limit;

#[cfg(test)]
mod test_support;
