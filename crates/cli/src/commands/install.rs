// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `cilo install` — one-time privileged host-resolver integration.

use crate::exit_error::ExitError;
use crate::resolver::host::{self, HostClass};

pub async fn run(suffix: &str) -> Result<(), ExitError> {
    let class = HostClass::detect();
    host::install(class, suffix)
        .await
        .map_err(|e| ExitError::generic(format!("{e} (does this need sudo?)")))?;
    println!(".{suffix} queries now delegate to the cilo resolver");
    Ok(())
}
