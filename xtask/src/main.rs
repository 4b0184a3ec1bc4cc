//! Developer tasks for the rust-ibpp workspace.
//!
//! Run with `cargo xtask <command>`. `ci` runs formatting, lints, the test
//! suite against the in-memory server and an MSRV build of the published
//! crates. `fuzz` drives the decoder targets under `fuzz/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Crates built on the minimum supported toolchain.
const PUBLISHED: [&str; 3] = ["ibpp-protocol", "ibpp-types", "ibpp-client"];

#[derive(Parser)]
#[command(name = "xtask", about = "Developer tasks for rust-ibpp")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy, tests and the MSRV build
    Ci,
    /// Check formatting, or apply it with --fix
    Fmt {
        #[arg(long)]
        fix: bool,
    },
    /// Clippy on every target, warnings denied
    Clippy,
    /// Run the test suite
    Test {
        /// Only this package
        #[arg(short, long)]
        package: Option<String>,
    },
    /// Build the published crates with the workspace `rust-version`
    Msrv,
    /// Run a decoder fuzz target (cargo-fuzz, nightly)
    Fuzz {
        /// Target name, or every target for `--smoke`
        target: Option<String>,
        /// Seconds per target
        #[arg(long, default_value = "60")]
        max_time: u64,
        /// Run every target briefly
        #[arg(long)]
        smoke: bool,
        /// Print the target names
        #[arg(long)]
        list: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh, false)?;
            clippy(&sh)?;
            test(&sh, None)?;
            msrv(&sh)?;
            println!("\n✅ All CI checks passed!");
        }
        Command::Fmt { fix } => fmt(&sh, fix)?,
        Command::Clippy => clippy(&sh)?,
        Command::Test { package } => test(&sh, package.as_deref())?,
        Command::Msrv => msrv(&sh)?,
        Command::Fuzz {
            target,
            max_time,
            smoke,
            list,
        } => {
            let targets = fuzz_targets(&sh.current_dir())?;
            if list {
                targets.iter().for_each(|t| println!("{t}"));
            } else if smoke {
                for t in &targets {
                    fuzz(&sh, t, max_time.min(10))?;
                }
            } else {
                let Some(target) = target else {
                    bail!("name a fuzz target, one of: {}", targets.join(", "));
                };
                if !targets.contains(&target) {
                    bail!("unknown fuzz target {target}, expected one of: {}", targets.join(", "));
                }
                fuzz(&sh, &target, max_time)?;
            }
        }
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest
        .parent()
        .map(Path::to_path_buf)
        .context("xtask must live one level below the workspace root")
}

fn fmt(sh: &Shell, fix: bool) -> Result<()> {
    if fix {
        cmd!(sh, "cargo fmt --all").run()?;
    } else {
        cmd!(sh, "cargo fmt --all -- --check").run()?;
    }
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    Ok(())
}

fn test(sh: &Shell, package: Option<&str>) -> Result<()> {
    match package {
        Some(pkg) => cmd!(sh, "cargo test -p {pkg}").run()?,
        None => cmd!(sh, "cargo test --workspace").run()?,
    }
    Ok(())
}

fn msrv(sh: &Shell) -> Result<()> {
    let manifest = sh.read_file("Cargo.toml")?;
    let version = rust_version(&manifest).context("workspace Cargo.toml has no rust-version")?;
    let toolchain = format!("+{version}");
    println!("Building published crates with Rust {version}...");
    for krate in PUBLISHED {
        cmd!(sh, "cargo {toolchain} check -p {krate}").run()?;
    }
    Ok(())
}

/// `rust-version` from the `[workspace.package]` table.
fn rust_version(manifest: &str) -> Option<&str> {
    manifest
        .lines()
        .filter_map(|line| line.trim().strip_prefix("rust-version"))
        .filter_map(|rest| rest.trim_start().strip_prefix('='))
        .map(|value| value.trim().trim_matches('"'))
        .next()
}

fn fuzz_targets(root: &Path) -> Result<Vec<String>> {
    let dir = root.join("fuzz/fuzz_targets");
    let mut targets = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let stem = path
            .file_stem()
            .filter(|_| path.extension().is_some_and(|ext| ext == "rs"));
        targets.extend(stem.map(|s| s.to_string_lossy().into_owned()));
    }
    targets.sort();
    Ok(targets)
}

fn fuzz(sh: &Shell, target: &str, max_time: u64) -> Result<()> {
    println!("Fuzzing {target} for {max_time}s...");
    let limit = format!("-max_total_time={max_time}");
    cmd!(sh, "cargo +nightly fuzz run {target} -- {limit}").run()?;
    Ok(())
}
