// ABOUTME: Unified error handling re-exported from account-core
// ABOUTME: Keeps `crate::errors` paths stable for server modules
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.
// Copyright ©2025 Async-IO.org

pub use account_core::action_result::ActionResult;
pub use account_core::errors::*;
