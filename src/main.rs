use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info};
use mapreduce_reduce::{apps::App, utils, LocalJob, ReduceTask};

#[derive(Parser, Debug)]
#[command(about = "Runs the reduce phase of a MapReduce job over intermediate files.")]
struct Args {
    #[arg(short, long, help = "Name of the MapReduce job.")]
    job: String,
    #[arg(short = 'm', long, help = "Number of map tasks that wrote intermediates.")]
    n_map: u32,
    #[arg(
        short,
        long,
        help = "Reduce task to run. Every task in [0, n-reduce) runs when omitted."
    )]
    reduce: Option<u32>,
    #[arg(
        short = 'n',
        long,
        default_value_t = 1,
        help = "Number of reduce tasks. Only used without --reduce."
    )]
    n_reduce: u32,
    #[arg(
        short,
        long,
        default_value = ".",
        help = "Directory holding the intermediate files."
    )]
    work_dir: PathBuf,
    #[arg(
        short,
        long,
        help = "Output file with --reduce, output directory without it. Defaults to the work dir."
    )]
    out: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = App::Count)]
    app: App,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let reducef = args.app.reduce_fn();

    if let Some(reduce_task) = args.reduce {
        let out_file = args
            .out
            .unwrap_or_else(|| args.work_dir.join(utils::merge_name(&args.job, reduce_task)));
        let task = ReduceTask::new(args.job.as_str(), reduce_task, args.n_map, out_file)
            .work_dir(&args.work_dir);

        let summary = task
            .spawn(Arc::new(reducef))
            .await
            .with_context(|| format!("reduce task {reduce_task} did not complete"))?
            .map_err(|e| {
                error!("reduce task {reduce_task} failed in {} stage: {e}", e.stage());
                e
            })?;
        info!("wrote {} keys to {}.", summary.keys, summary.out_file.display());
        return Ok(());
    }

    let out_dir = args.out.unwrap_or_else(|| args.work_dir.clone());
    let job = LocalJob::new(args.job.as_str(), args.n_map, args.n_reduce)
        .work_dir(&args.work_dir)
        .out_dir(out_dir);

    let results = job.reduce_all(reducef).await;
    let mut failed = 0;
    for (reduce_task, result) in results.iter().enumerate() {
        match result {
            Ok(summary) => info!(
                "reduce task {reduce_task}: {} keys -> {}.",
                summary.keys,
                summary.out_file.display()
            ),
            Err(e) => {
                failed += 1;
                match e.stage() {
                    Some(stage) => error!("reduce task {reduce_task} failed in {stage} stage: {e}"),
                    None => error!("reduce task {reduce_task} failed: {e}"),
                }
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} reduce tasks failed", results.len());
    }
    Ok(())
}
