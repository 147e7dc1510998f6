use crate::args::*;
use clap::Parser;
use colored::*;
use env_logger::Env;
use serde::Serialize;
use std::io;
use std::io::prelude::*;
use std::str::FromStr;
use uploadd::acl::{AclPolicy, AllowAll, ConfigAcl};
use uploadd::archive::ArchiveState;
use uploadd::changes::ChangesFile;
use uploadd::files::{classify_row, UploadFile};
use uploadd::policy::UploadPolicy;
use uploadd::queue::{LogNotifier, MemoryQueue};
use uploadd::upload::{NascentUpload, PipelineContext};
use uploadd_common::errors::*;
use uploadd_common::{Archive, ArchiveKind, UploadStatus};

pub mod args;

fn print_json<S: Serialize>(x: &S) -> Result<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer_pretty(&mut stdout, &x)?;
    stdout.write_all(b"\n")?;
    Ok(())
}

fn check(args: &Args, check: &Check) -> Result<UploadStatus> {
    let state = ArchiveState::load(&check.state)?;

    let kind = ArchiveKind::from_str(&check.archive_kind)
        .map_err(|_| format_err!("Unknown archive kind: {:?}", check.archive_kind))?;
    let mut policy = UploadPolicy::new(
        state.series.clone(),
        Archive::new(check.archive_kind.clone(), kind),
    );
    policy.partner_archive = check.partner_archive.clone();

    // only consult the configured upload rights when the caller names a
    // signer, an unsigned dry run checks everything else
    let config = uploadd_common::config::load(args.config.as_ref())?;
    let config_acl = ConfigAcl::new(&config.acl);
    let acl: &dyn AclPolicy = if check.signer.is_some() {
        &config_acl
    } else {
        &AllowAll
    };

    let mut upload = NascentUpload::from_changes_path(&check.changes, check.signer.clone())?;
    let mut ctx = PipelineContext {
        policy,
        publications: &state,
        acl,
        verify_payloads: false,
    };
    upload.process(&mut ctx);

    let mut queue = MemoryQueue::new();
    let status = upload.finish(&ctx, &mut queue, &LogNotifier);

    for warning in upload.issues.warnings() {
        println!("{} {}", "warning:".yellow(), warning);
    }
    for rejection in upload.issues.rejections() {
        println!("{} {}", "rejected:".red(), rejection);
    }

    if check.json {
        print_json(&queue.entries)?;
    }

    println!(
        "{} {} {} -> {}/{}-{}",
        status.fancy(),
        upload.changes.source,
        upload.changes.version,
        ctx.policy.archive.name,
        ctx.policy.series.name,
        ctx.policy.pocket,
    );

    Ok(status)
}

#[derive(Debug, Serialize)]
struct InspectRow {
    filename: String,
    variant: &'static str,
    package: Option<String>,
    version: Option<String>,
    architecture: Option<String>,
    component: String,
    section: String,
    priority: Option<String>,
}

fn inspect_row(file: &UploadFile) -> InspectRow {
    let variant = match file {
        UploadFile::Source(_) => "source",
        UploadFile::Deb(_) => "deb",
        UploadFile::Udeb(_) => "udeb",
        UploadFile::Ddeb(_) => "ddeb",
        UploadFile::Custom(_) => "custom",
    };
    match file {
        UploadFile::Source(source) => InspectRow {
            filename: source.filename.clone(),
            variant,
            package: Some(source.package.clone()),
            version: Some(source.version.clone()),
            architecture: None,
            component: source.component.clone(),
            section: source.section.clone(),
            priority: None,
        },
        UploadFile::Deb(binary) | UploadFile::Udeb(binary) | UploadFile::Ddeb(binary) => {
            InspectRow {
                filename: binary.filename.clone(),
                variant,
                package: Some(binary.package.clone()),
                version: Some(binary.version.clone()),
                architecture: Some(binary.architecture.clone()),
                component: binary.component.clone(),
                section: binary.section.clone(),
                priority: Some(binary.priority.to_string()),
            }
        }
        UploadFile::Custom(custom) => InspectRow {
            filename: custom.filename.clone(),
            variant,
            package: None,
            version: None,
            architecture: None,
            component: custom.component.clone(),
            section: custom.section.clone(),
            priority: None,
        },
    }
}

fn inspect(inspect: &Inspect) -> Result<()> {
    let changes = ChangesFile::load(&inspect.changes, None)?;

    let mut rows = Vec::new();
    for row in &changes.files {
        let mut issues = Vec::new();
        match classify_row(row, &mut issues) {
            Ok(file) => rows.push(inspect_row(&file)),
            Err(err) => println!("{} {:#}", "unclassifiable:".red(), err),
        }
    }

    if inspect.json {
        return print_json(&rows);
    }

    println!(
        "{} {} -> {} [{}]",
        changes.source.bold(),
        changes.version,
        changes.suite,
        changes.architectures.join(" ")
    );
    for row in rows {
        let mut details = vec![format!("{}/{}", row.component, row.section)];
        if let Some(architecture) = &row.architecture {
            details.push(architecture.clone());
        }
        if let Some(priority) = &row.priority {
            details.push(priority.clone());
        }
        println!("  {:<8} {} ({})", row.variant, row.filename, details.join(", "));
    }

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let logging = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    env_logger::init_from_env(Env::default().default_filter_or(logging));

    if args.color {
        debug!("Bypass tty detection and always use colors");
        colored::control::set_override(true);
    }

    match &args.subcommand {
        SubCommand::Check(check_args) => {
            let status = check(&args, check_args)?;
            if status != UploadStatus::Accepted {
                std::process::exit(1);
            }
        }
        SubCommand::Inspect(inspect_args) => inspect(inspect_args)?,
        SubCommand::Completions(completions) => gen_completions(completions)?,
    }

    Ok(())
}
