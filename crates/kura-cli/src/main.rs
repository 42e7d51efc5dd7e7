//! kura - command-line access to the virtual filesystem.
//!
//! Loads the mountpoint configuration, mounts everything, then runs one
//! operation against the VFS.
//!
//! ## Usage
//!
//! ```bash
//! kura mounts --all
//! kura ls home:/docs --sort size --desc
//! kura cat home:/docs/readme.md
//! kura cp home:/a.txt tmp:/a.txt
//! kura find home:/ '*.md'
//! ```
//!
//! Without a config file, `home` maps to the current directory and `tmp`
//! is an in-memory scratch mount.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use kura_vfs::{
    AdapterKind, AdapterRegistry, Download, FileIconResolver, FileRecord, Filesystem, Identity,
    ListOptions, MountpointConfig, Options, Representation, SortBy, SortDirection, Vfs, VfsConfig,
    human_size,
};

/// Log filter when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "kura")]
#[command(about = "Virtual filesystem over pluggable storage adapters")]
struct Args {
    /// Config file (default: platform config dir, kura/vfs.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Fail if any mountpoint fails to mount
    #[arg(long, global = true)]
    stop_on_error: bool,

    /// Group membership used for mountpoint visibility (repeatable)
    #[arg(long = "group", global = true)]
    groups: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List mountpoints
    Mounts {
        /// Include unmounted mountpoints
        #[arg(short, long)]
        all: bool,
    },
    /// List a directory
    Ls {
        path: String,
        /// Show entries starting with '.'
        #[arg(short = 'a', long)]
        all: bool,
        /// filename, mime, size, mtime, ctime or atime
        #[arg(long, default_value = "filename")]
        sort: String,
        #[arg(long)]
        desc: bool,
        /// Powers of 1000 instead of 1024
        #[arg(long)]
        si: bool,
    },
    /// Print a file
    Cat { path: String },
    /// Copy a file
    Cp { from: String, to: String },
    /// Move or rename a file
    Mv { from: String, to: String },
    /// Delete a file or directory
    Rm { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Create a file or bump its modification time
    Touch { path: String },
    /// Show metadata as JSON
    Stat { path: String },
    /// Find entries by name
    Find { root: String, pattern: String },
    /// Print the URL a file can be fetched from
    Url { path: String },
    /// Save a file to the host
    Get {
        path: String,
        /// Output file (default: the file's own name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    let icons = config.icon_resolver()?;

    if config.network.is_some() {
        tracing::warn!("no HTTP transport is built in; system mountpoints use the null adapter");
    }

    let username = std::env::var("USER").unwrap_or_default();
    let fs = Filesystem::new(config, AdapterRegistry::new())
        .with_identity(Identity::new(username, args.groups.clone()));
    fs.mount_all(args.stop_on_error).await?;
    let vfs = Vfs::new(Arc::new(fs));

    run(&vfs, &icons, args.command).await
}

fn load_config(path: Option<&std::path::Path>) -> Result<VfsConfig> {
    if let Some(path) = path {
        return VfsConfig::load(path).with_context(|| format!("loading {}", path.display()));
    }
    match VfsConfig::default_path() {
        Some(path) if path.exists() => {
            tracing::debug!(path = %path.display(), "loading config");
            Ok(VfsConfig::load(&path)?)
        }
        _ => default_config(),
    }
}

fn default_config() -> Result<VfsConfig> {
    let cwd = std::env::current_dir().context("reading current directory")?;
    Ok(VfsConfig {
        mountpoints: vec![
            MountpointConfig::new("home", AdapterKind::Local)
                .with_label("Home")
                .with_source(cwd.to_string_lossy()),
            MountpointConfig::new("tmp", AdapterKind::Memory).with_label("Temporary"),
        ],
        ..VfsConfig::default()
    })
}

async fn run(vfs: &Vfs, icons: &FileIconResolver, command: Command) -> Result<()> {
    match command {
        Command::Mounts { all } => {
            for mount in vfs.filesystem().get_mounts(all) {
                let state = if mount.mounted { "mounted" } else { "-" };
                println!(
                    "{:<12} {:<8} {:<8} {}",
                    mount.root, mount.adapter, state, mount.label
                );
            }
        }
        Command::Ls {
            path,
            all,
            sort,
            desc,
            si,
        } => {
            let Some(sort_by) = SortBy::from_str(&sort) else {
                bail!("unknown sort key: {sort}");
            };
            let dir = if desc {
                SortDirection::Desc
            } else {
                SortDirection::Asc
            };
            let options = ListOptions::new().with_hidden(all).sorted(sort_by, dir);
            for entry in vfs.list(&path, options).await? {
                print_entry(&entry, icons, si);
            }
        }
        Command::Cat { path } => {
            let bytes = vfs.read(&path, Representation::Binary, Options::new()).await?;
            std::io::stdout().write_all(&bytes.into_bytes())?;
        }
        Command::Cp { from, to } => check(vfs.copy(&from, &to, Options::new()).await?, "copy")?,
        Command::Mv { from, to } => check(vfs.rename(&from, &to, Options::new()).await?, "rename")?,
        Command::Rm { path } => check(vfs.delete(&path, Options::new()).await?, "delete")?,
        Command::Mkdir { path } => check(vfs.mkdir(&path, Options::new()).await?, "mkdir")?,
        Command::Touch { path } => check(vfs.touch(&path, Options::new()).await?, "touch")?,
        Command::Stat { path } => {
            let record = vfs.stat(&path, Options::new()).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Find { root, pattern } => {
            for entry in vfs.search(&root, &pattern, ListOptions::new()).await? {
                println!("{}", entry.path);
            }
        }
        Command::Url { path } => match vfs.url(&path, Options::new()).await? {
            Some(url) => println!("{url}"),
            None => bail!("{path} has no URL"),
        },
        Command::Get { path, output } => match vfs.download(&path, Options::new()).await? {
            Download::Url(url) => println!("{url}"),
            Download::Content {
                filename, bytes, ..
            } => {
                let target = output.unwrap_or_else(|| PathBuf::from(filename));
                std::fs::write(&target, bytes)
                    .with_context(|| format!("writing {}", target.display()))?;
                eprintln!("saved {}", target.display());
            }
        },
    }
    Ok(())
}

fn check(ok: bool, op: &str) -> Result<()> {
    if !ok {
        bail!("{op} was not performed by the adapter");
    }
    Ok(())
}

fn print_entry(entry: &FileRecord, icons: &FileIconResolver, si: bool) {
    let size = if entry.is_directory {
        String::new()
    } else if si {
        human_size(entry.size, true)
    } else {
        entry.human_size.clone()
    };
    let suffix = if entry.is_directory { "/" } else { "" };
    println!(
        "{:<24} {:>10}  {}{}",
        icons.resolve(entry),
        size,
        entry.filename,
        suffix
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["kura", "--group", "staff", "ls", "home:/", "-a", "--desc"]);
        assert_eq!(args.groups, vec!["staff"]);
        match args.command {
            Command::Ls { path, all, desc, .. } => {
                assert_eq!(path, "home:/");
                assert!(all);
                assert!(desc);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(DEFAULT_LOG_FILTER, "info");
        assert!(DEFAULT_LOG_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_default_config() {
        let config = default_config().unwrap();
        let names: Vec<_> = config.mountpoints.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["home", "tmp"]);
        assert!(config.mountpoints[0].source.is_some());
    }

    #[tokio::test]
    async fn test_run_against_memory_mount() {
        let config = VfsConfig {
            mountpoints: vec![MountpointConfig::new("tmp", AdapterKind::Memory)],
            ..VfsConfig::default()
        };
        let fs = Filesystem::new(config, AdapterRegistry::new());
        fs.mount_all(true).await.unwrap();
        let vfs = Vfs::from(fs);
        let icons = FileIconResolver::new(Vec::<(String, String)>::new()).unwrap();

        run(&vfs, &icons, Command::Touch { path: "tmp:/a".into() })
            .await
            .unwrap();
        run(&vfs, &icons, Command::Mkdir { path: "tmp:/d".into() })
            .await
            .unwrap();
        assert!(vfs.exists("tmp:/a", Options::new()).await.unwrap());
        assert!(run(&vfs, &icons, Command::Url { path: "tmp:/a".into() })
            .await
            .is_err());
    }
}
