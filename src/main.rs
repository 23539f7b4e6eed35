use anyhow::{Context, Result};
use iam_role_report::{
    cli::{CommandLineArgs, GlobalArgs},
    workflow::{self, determine_exit_code, RunOptions},
    AwsConnector, CsvReportFile,
};
use tokio::runtime::Builder;
use tracing_core::metadata::LevelFilter;
use tracing_subscriber::{
    self, fmt, prelude::__tracing_subscriber_SubscriberExt, registry, util::SubscriberInitExt,
};

fn main() -> anyhow::Result<()> {
    color_backtrace::install();
    let args = CommandLineArgs::parse_args();
    setup_logging(&args.global_args);

    // Profiles and roles are processed one at a time
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;
    let exit_code = runtime.block_on(async_main(args))?;
    std::process::exit(exit_code);
}

fn setup_logging(global_args: &GlobalArgs) {
    let level = LevelFilter::from_level(global_args.log_level());
    let all_targets = !global_args.quiet && global_args.verbose > 2;

    let filter = if all_targets {
        // Include the AWS SDK's own logging
        tracing_subscriber::filter::Targets::new().with_default(LevelFilter::TRACE)
    } else {
        tracing_subscriber::filter::Targets::new()
            .with_default(LevelFilter::ERROR)
            .with_target("iam_role_report", level)
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false)
        .without_time();
    registry().with(fmt_layer).with(filter).init();
}

async fn async_main(args: CommandLineArgs) -> Result<i32> {
    let report_args = &args.report_args;
    let source = report_args.profile_source()?;
    let connector =
        AwsConnector::new(report_args.region.clone()).with_max_attempts(report_args.max_attempts);
    let mut sink =
        CsvReportFile::for_today(&report_args.output_dir()).keep_existing(report_args.append);
    let options = RunOptions {
        title: report_args.title.clone(),
        progress: args.global_args.use_progress(),
    };

    let summary = workflow::run(&options, &source, &connector, &mut sink).await?;

    println!("\nThe report has been saved to: {}", sink.path().display());
    Ok(determine_exit_code(&summary, report_args.strict))
}
