//! Log output for the binary.

use std::io::Write;

use env_logger::{Builder, Env, Target};

use crate::CliError;

/// Install a logger writing `[LEVEL] message` lines to stdout.
///
/// The filter defaults to `info` and honours `RUST_LOG`.
pub(crate) fn init_logging() -> Result<(), CliError> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .try_init()?;
    Ok(())
}
