//! Run command - expand a macro and execute, explain or dry-run it

use std::sync::Arc;

use anyhow::{Context, bail};

use mus::audit::{JsonlSink, RecordContext};
use mus::config::Config;
use mus::engine::{Engine, Macro, Prepared, RunOptions};
use mus::output::{DryRunJob, DryRunReport, JobOutcome, OutputMode};
use mus::paths;
use mus::script_log;
use mus::store::TemplateStore;

use crate::cli::RunArgs;

/// Expand a macro and run (or describe) its jobs
pub fn run(args: &RunArgs, output_mode: OutputMode) -> anyhow::Result<()> {
    let config = Config::load()?;
    let store = TemplateStore::new(&config.macro_dir);

    let raw = match &args.load {
        Some(name) => store.load(name)?,
        None if args.raw.is_empty() => bail!("no macro given; pass one or use --load <NAME>"),
        None => args.raw.join(" "),
    };

    let context = RecordContext::detect(&config);
    let sink = Arc::new(JsonlSink::new(&config.history, context.clone()));
    let mut engine = Engine::with_default_hooks(sink);
    let dry_run = args.dry_run || args.dry_run_extra;
    if config.script_log && !dry_run {
        script_log::register(engine.hooks_mut(), paths::script_log(), context);
    }

    let mac = engine.create_macro(&raw)?;

    if let Some(name) = &args.save {
        store.save(name, mac.template.raw())?;
    }

    if args.explain {
        for line in mac.template.explain() {
            println!("{line}");
        }
        println!("{}", mac.template.render_syntax());
        return Ok(());
    }

    let max_jobs = args.max_jobs.and_then(|n| usize::try_from(n).ok()).filter(|&n| n > 0);

    if dry_run {
        return dry(&engine, &mac, args, max_jobs, output_mode);
    }

    let options = RunOptions {
        threads: args.threads.unwrap_or_else(|| config.threads()),
        max_jobs,
        force: args.force,
    };
    log::debug!("running with {} thread(s)", options.threads);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start runtime")?;
    let report = runtime.block_on(engine.run(&mac, &options))?;
    report.render(output_mode);
    Ok(())
}

fn dry(
    engine: &Engine,
    mac: &Macro,
    args: &RunArgs,
    max_jobs: Option<usize>,
    output_mode: OutputMode,
) -> anyhow::Result<()> {
    let mut report = DryRunReport {
        jobs: Vec::new(),
        skipped: Vec::new(),
        extended: args.dry_run_extra,
    };
    for prepared in engine.prepare_jobs(mac, args.force)? {
        if max_jobs.is_some_and(|max| report.jobs.len() >= max) {
            break;
        }
        match prepared? {
            Prepared::Run(job) => report.jobs.push(DryRunJob::from_job(&job)),
            Prepared::Skipped { job, reason } => report.skipped.push(JobOutcome::skipped(&job, &reason)),
        }
    }
    report.render(output_mode);
    Ok(())
}
