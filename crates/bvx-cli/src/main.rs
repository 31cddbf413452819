//! 🚀 bvx-cli — the front door to the benchmark vault.
//!
//! 🎬 *[narrator voice]* "It all started with a bucket named `bm.0.1`..."
//! 📦 Thin on purpose: parse args, load config, set up logging, call into `bvx`,
//! print a table. Everything interesting happens in the library. 🦆

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bvx::app_config::{AppConfig, load_config};
use bvx::progress::human_size;
use bvx::{BenchmarkStorage, CopyMode, TaggingPolicy, Version};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use tracing::error;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "bvx.toml";

/// 🪣 Versioned benchmark snapshots on S3-compatible object stores.
#[derive(Debug, Parser)]
#[command(name = "bvx", version, about)]
struct Cli {
    /// 🔧 TOML config file. Defaults to ./bvx.toml when it exists, env vars (BVX_*) otherwise.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 📜 Every benchmark in the public registry.
    Benchmarks,
    /// 🔢 Versions of one benchmark, oldest first.
    Versions { benchmark: String },
    /// 📋 Objects of one version (latest by default).
    Objects {
        benchmark: String,
        #[arg(long)]
        version: Option<Version>,
    },
    /// 🏗️ Cut a new version from the latest one.
    CreateVersion {
        benchmark: String,
        /// Defaults to the latest version with its minor bumped.
        #[arg(long)]
        version: Option<Version>,
        #[arg(long, default_value = "all")]
        policy: TaggingPolicy,
        #[arg(long, default_value = "copy")]
        mode: CopyMode,
    },
    /// 🧹 Bring the overview markers in line with the version containers.
    Reconcile {
        benchmark: String,
        /// Also remove markers with no container behind them.
        #[arg(long)]
        cleanup: bool,
    },
    /// 🔍 Context diff of two versions, as anonymous readers see them.
    Diff {
        benchmark: String,
        #[arg(long)]
        version1: Version,
        #[arg(long)]
        version2: Version,
    },
    /// 📥 Download one version (latest by default) into a directory.
    Download {
        benchmark: String,
        #[arg(long)]
        version: Option<Version>,
        #[arg(long)]
        dest: PathBuf,
    },
    /// #️⃣ Compare local files against one version's MD5 ETags (latest by default).
    Checksum {
        benchmark: String,
        #[arg(long)]
        version: Option<Version>,
        #[arg(long)]
        dir: PathBuf,
    },
    /// 📜 Print a policy document.
    Policy {
        #[command(subcommand)]
        kind: PolicyCommand,
    },
}

#[derive(Debug, Subcommand)]
enum PolicyCommand {
    /// 🌍 Anonymous read-only access to one container.
    Readonly { container: String },
    /// 🔑 Scoped access token for one benchmark.
    Token { benchmark: String },
}

/// 🔧 `--config` must exist if given. Without it, `bvx.toml` is used when present.
fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config_file = match explicit {
        Some(path) => {
            let exists = path.try_exists().with_context(|| {
                format!("💀 Couldn't check whether the config file exists: '{}'", path.display())
            })?;
            if !exists {
                anyhow::bail!(
                    "💀 Configuration file not found: '{}'. Relative paths are resolved from the \
                     current directory; an absolute path removes the guesswork.",
                    path.display()
                );
            }
            Some(path)
        }
        None => Some(Path::new(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    load_config(config_file).context("💀 In bvx-cli we couldn't load the configuration")
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

async fn run(cli: Cli) -> Result<()> {
    // -- 📜 policies are pure functions of a name; no config, no network
    if let Command::Policy { kind } = &cli.command {
        let document = match kind {
            PolicyCommand::Readonly { container } => bvx::policy::readonly_policy(container)?,
            PolicyCommand::Token { benchmark } => bvx::policy::access_token_policy(benchmark)?,
        };
        println!("{}", document.to_json());
        return Ok(());
    }

    let app_config = resolve_config(cli.config.as_deref())?;
    let store_config = &app_config.store;

    match cli.command {
        Command::Benchmarks => {
            let store = bvx::storage::connect(store_config)
                .await
                .context("💀 Couldn't connect to the object store")?;
            let mut table = new_table(vec!["benchmark"]);
            for name in bvx::catalog::list_benchmarks(&store).await? {
                table.add_row(vec![name]);
            }
            println!("{table}");
        }
        Command::Versions { benchmark } => {
            let storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let versions = storage.catalog().list_versions().await?;
            let mut table = new_table(vec!["version"]);
            for version in &versions.numeric {
                table.add_row(vec![version.to_string()]);
            }
            for other in &versions.other {
                table.add_row(vec![other.clone()]);
            }
            println!("{table}");
        }
        Command::Objects { benchmark, version } => {
            let mut storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let versioner = storage.versioner_mut();
            let current = versioner.set_current_version(version).await?;
            versioner.list_objects().await?;
            let mut table = new_table(vec!["object", "size", "last modified", "hash"]);
            for record in versioner.files().into_iter().flat_map(|files| files.values()) {
                table.add_row(vec![
                    Cell::new(&record.name),
                    Cell::new(human_size(record.size.into())).set_alignment(CellAlignment::Right),
                    Cell::new(record.last_modified.to_rfc3339()),
                    Cell::new(&record.hash),
                ]);
            }
            println!("📋 {benchmark} {current}");
            println!("{table}");
        }
        Command::CreateVersion {
            benchmark,
            version,
            policy,
            mode,
        } => {
            let mut storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let report = storage
                .versioner_mut()
                .create_new_version(version, policy, mode)
                .await
                .with_context(|| format!("💀 Creating a new version of '{benchmark}' failed"))?;
            println!(
                "✅ {benchmark} {} created: {} eligible, {} copied",
                report.version, report.eligible, report.copied
            );
        }
        Command::Reconcile { benchmark, cleanup } => {
            let storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let report = storage.catalog().reconcile_overview(cleanup).await?;
            let mut table = new_table(vec!["marker", "change"]);
            for added in &report.added {
                table.add_row(vec![added.as_str(), "added"]);
            }
            for removed in &report.removed {
                table.add_row(vec![removed.as_str(), "removed"]);
            }
            println!("{table}");
        }
        Command::Diff {
            benchmark,
            version1,
            version2,
        } => {
            let diff = bvx::comparison::diff_versions(store_config, &benchmark, version1, version2)
                .await
                .with_context(|| format!("💀 Couldn't diff {benchmark} {version1} against {version2}"))?;
            print!("{diff}");
        }
        Command::Download {
            benchmark,
            version,
            dest,
        } => {
            let mut storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let versioner = storage.versioner_mut();
            let current = versioner.set_current_version(version).await?;
            let report = versioner
                .download_objects(&dest)
                .await
                .with_context(|| format!("💀 Download into '{}' failed", dest.display()))?;
            println!(
                "📥 {} object(s) of {benchmark} {current} written to {}",
                report.downloaded,
                dest.display()
            );
            for name in &report.mismatched {
                println!("⚠️  MD5 checksum failed for {name}");
            }
        }
        Command::Checksum {
            benchmark,
            version,
            dir,
        } => {
            let mut storage = BenchmarkStorage::open(store_config, &benchmark)
                .await
                .with_context(|| format!("💀 Couldn't open benchmark '{benchmark}'"))?;
            let versioner = storage.versioner_mut();
            let current = versioner.set_current_version(version).await?;
            let failed = versioner.checksum_objects(&dir).await?;
            if failed.is_empty() {
                println!("✅ every file in {} matches {benchmark} {current}", dir.display());
            } else {
                let mut table = new_table(vec!["failed checksum"]);
                for name in failed {
                    table.add_row(vec![name]);
                }
                println!("{table}");
            }
        }
        Command::Policy { .. } => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing, because println! debugging is a lifestyle choice we're moving past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
                || cause_str.contains("dispatch failure")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: the object store isn't answering. Check `store.endpoint` and `store.secure` \
                in your config (or BVX_STORE__ENDPOINT), and that MinIO/S3 is actually running. \
                With Docker, `docker ps` tells you if it's up."
            );
        }

        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_clap_agrees_with_itself() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn the_one_where_create_version_gets_its_defaults() {
        let the_cli = Cli::try_parse_from(["bvx", "create-version", "bm"]).expect("💀 parse");
        match the_cli.command {
            Command::CreateVersion {
                benchmark,
                version,
                policy,
                mode,
            } => {
                assert_eq!(benchmark, "bm");
                assert_eq!(version, None);
                assert_eq!(policy, TaggingPolicy::All);
                assert_eq!(mode, CopyMode::Copy);
            }
            other => panic!("💀 expected create-version, got {other:?}"),
        }
    }

    #[test]
    fn the_one_where_bad_flags_bounce_at_the_door() {
        assert!(Cli::try_parse_from(["bvx", "create-version", "bm", "--policy", "some"]).is_err());
        assert!(Cli::try_parse_from(["bvx", "create-version", "bm", "--mode", "bogus"]).is_err());
        assert!(Cli::try_parse_from(["bvx", "diff", "bm", "--version1", "0.x", "--version2", "0.2"]).is_err());

        let the_cli = Cli::try_parse_from(["bvx", "diff", "bm", "--version1", "0.1", "--version2", "0.2"])
            .expect("💀 parse");
        assert!(matches!(
            the_cli.command,
            Command::Diff { version1, version2, .. }
                if version1 == Version::new(0, 1) && version2 == Version::new(0, 2)
        ));
    }

    #[test]
    fn the_one_where_a_missing_config_file_is_named_and_shamed() {
        let the_err = resolve_config(Some(Path::new("/definitely/not/here/bvx.toml")))
            .expect_err("💀 a missing explicit config must fail");
        assert!(the_err.to_string().contains("/definitely/not/here/bvx.toml"));
    }
}
