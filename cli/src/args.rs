//! Bits shared across the four binaries' argument handling: every driver
//! takes `-d <channel> [-t baseline.xml] config.toml [input.mmax-dir]
//! input.xml`, so the tracing setup and positional-splitting logic live
//! here once instead of four times.

use std::path::PathBuf;

use anyhow::Result;

/// Splits the trailing positional arguments into an optional MMAX markable
/// directory and the mandatory NIST XML testset path, matching
/// `docent.cpp`'s `args.size() == 2` / `== 3` branch.
pub fn split_inputs(inputs: &[PathBuf]) -> Result<(Option<&PathBuf>, &PathBuf)> {
    match inputs {
        [xml] => Ok((None, xml)),
        [mmax, xml] => Ok((Some(mmax), xml)),
        other => anyhow::bail!("expected `[input.mmax-dir] input.xml`, got {} positional arguments", other.len()),
    }
}

/// Installs a `tracing-subscriber` `fmt` subscriber at `info`, raised to
/// `debug` for `channel` when `-d channel` was given.
pub fn init_tracing(debug_channel: Option<&str>) {
    use tracing_subscriber::EnvFilter;

    let filter = match debug_channel {
        Some(channel) => EnvFilter::new(format!("info,{channel}=debug")),
        None => EnvFilter::new("info"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
