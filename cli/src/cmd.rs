// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reporting fatal errors and choosing the exit status

use std::process::exit;

const NAME: &str = env!("CARGO_BIN_NAME");

/// Why the command failed
#[derive(Debug)]
pub enum CmdError {
    /// Incorrect command-line arguments
    Usage(String),
    /// Everything else
    Failure(anyhow::Error),
}

/// Print `cmd_error` to stderr and exit with the status it calls for.
pub fn fatal(cmd_error: CmdError) -> ! {
    let (exit_code, message) = match cmd_error {
        CmdError::Usage(message) => (2, message),
        CmdError::Failure(error) => (1, format!("{error:#}")),
    };
    eprintln!("{NAME}: {message}");
    exit(exit_code);
}
