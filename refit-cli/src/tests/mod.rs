//! Shared test harness modules for the refit CLI.
#![expect(
    clippy::panic,
    reason = "Tests assert panic branches to surface unexpected CLI outcomes"
)]

use super::*;
use crate::run::{RunConfig, config_from_layers_for_test};

mod commands;
mod helpers;
mod unit;
