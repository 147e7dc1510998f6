mod args;

use crate::args::Args;
use clap::Parser;
use env_logger::Env;
use std::thread;
use std::time::Duration;
use uploadd::acl::ConfigAcl;
use uploadd::archive::ArchiveState;
use uploadd::config;
use uploadd::policy::UploadPolicy;
use uploadd::processor::{SpoolDirs, UploadProcessor};
use uploadd::queue::{JournalQueue, LogNotifier};
use uploadd_common::errors::*;

fn main() -> Result<()> {
    let args = Args::parse();

    let logging = match args.verbose {
        0 => "info",
        1 => "uploadd=debug,uploadd_common=debug,info",
        2 => "debug",
        _ => "trace",
    };

    env_logger::init_from_env(Env::default().default_filter_or(logging));

    let config = config::load(args.config.as_deref())?;
    if args.check_config {
        println!("{:#?}", config);
        return Ok(());
    }

    let state = ArchiveState::load(&config.state_file)?;
    let acl = ConfigAcl::new(&config.acl);

    let mut policy = UploadPolicy::new(state.series.clone(), config.archive.clone());
    policy.partner_archive = config.partner_archive.clone();
    policy.accept_sources = config.accept_sources;
    policy.accept_binaries = config.accept_binaries;
    policy.auto_approve = config.auto_approve;

    let dirs = SpoolDirs::new(&config.spool_dir);
    dirs.ensure()?;
    let processor = UploadProcessor::new(dirs, policy, &state, &acl);

    let mut queue = JournalQueue::new(&config.journal);
    let notifier = LogNotifier;

    loop {
        let processed = processor.process_all(&mut queue, &notifier)?;
        if processed > 0 {
            info!("Processed {} uploads", processed);
        }
        if args.once {
            break;
        }
        debug!("Sleeping until next spool scan...");
        thread::sleep(Duration::from_secs(config.scan_interval));
    }

    Ok(())
}
