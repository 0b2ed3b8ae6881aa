use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{Context, Result};
use env_logger::Env;
use structopt::StructOpt;
use treesync::{
    apply::{Applier, ApplyPolicy},
    invert::invert,
    run::run,
    sync::{local::LocalPeer, peer::JsonLinesPeer},
};
use treesync_core::{
    codec::{parse_lines, to_lines},
    config::SyncConfig,
};

#[derive(StructOpt, Debug)]
#[structopt(name = "treesync")]
enum Opt {
    /// Fully synchronize target with source, then replicate source changes
    Mirror {
        #[structopt(parse(from_os_str))]
        source: PathBuf,

        #[structopt(parse(from_os_str))]
        target: PathBuf,

        #[structopt(name = "--exit-after-sync", long)]
        exit_after_sync: bool,
    },
    /// Print changesets of source changes as json lines
    Watch {
        #[structopt(parse(from_os_str))]
        source: PathBuf,
    },
    /// Print the changeset which leads to root (final state) from events
    Invert {
        #[structopt(parse(from_os_str))]
        root: PathBuf,

        /// Json lines events file, stdin if absent
        #[structopt(parse(from_os_str))]
        events: Option<PathBuf>,
    },
    /// Apply a json lines changeset on root
    Apply {
        #[structopt(parse(from_os_str))]
        root: PathBuf,

        /// Json lines changeset file, stdin if absent
        #[structopt(parse(from_os_str))]
        changeset: Option<PathBuf>,

        #[structopt(name = "--replay", long)]
        replay: bool,
    },
}

fn read_input(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => {
            fs::read_to_string(path).context(format!("Read input file {}", path.display()))
        }
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Read standard input")?;
            Ok(input)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let opt = Opt::from_args();
    let config = SyncConfig::from_env().context("Read config")?;
    let stop_signal = Arc::new(AtomicBool::new(false));

    match opt {
        Opt::Mirror {
            source,
            target,
            exit_after_sync,
        } => {
            let policy = if config.replay {
                ApplyPolicy::Replay
            } else {
                ApplyPolicy::Strict
            };
            let peer = LocalPeer::new(&target, policy);
            run(&source, config, peer, exit_after_sync, stop_signal)?;
        }
        Opt::Watch { source } => {
            let peer = JsonLinesPeer::new(io::stdout());
            run(&source, config, peer, false, stop_signal)?;
        }
        Opt::Invert { root, events } => {
            let events = parse_lines(&read_input(&events)?).context("Parse events")?;
            let inverted = invert(&root, &events).context("Invert events")?;
            print!("{}", to_lines(&inverted).context("Serialize changeset")?);
        }
        Opt::Apply {
            root,
            changeset,
            replay,
        } => {
            let changeset = parse_lines(&read_input(&changeset)?).context("Parse changeset")?;
            let policy = if replay {
                ApplyPolicy::Replay
            } else {
                ApplyPolicy::Strict
            };
            Applier::new(&root, policy)
                .apply(&changeset)
                .context("Apply changeset")?;
            log::info!("Applied {} events", changeset.len());
        }
    }

    log::info!("Exit application");
    Ok(())
}
