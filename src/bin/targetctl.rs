//! targetctl - switch the pursued ball color
//!
//! Writes one token into the target side-channel file; the follower daemon's
//! poller picks it up within a poll interval. Run it locally or over SSH
//! from the viewer machine.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;

use ball_follower::{target, TargetSpec};

#[derive(Parser, Debug)]
#[command(
    name = "targetctl",
    about = "Switch the ball follower's pursued target"
)]
struct Args {
    /// Target token: green, pink, yellow, or all
    target: String,

    /// Target side-channel file shared with followerd
    #[arg(long, default_value = "target.txt", env = "FOLLOWER_TARGET_PATH")]
    file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let spec = TargetSpec::parse(&args.target).ok_or_else(|| {
        anyhow!(
            "invalid target {:?}; expected one of: green, pink, yellow, all",
            args.target
        )
    })?;

    target::write_target_file(&args.file, spec)?;
    println!("target set to {} ({})", spec.token(), args.file.display());
    Ok(())
}
