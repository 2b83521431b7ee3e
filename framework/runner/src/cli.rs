use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone)]
#[command(about, long_about = None)]
pub struct DirstressScenarioCli {
    /// A connection string for the service to test
    #[clap(short, long)]
    pub connection_string: Option<String>,

    /// The number of VUs to run.
    ///
    /// Defaults to 1.
    #[clap(long)]
    pub vus: Option<usize>,

    /// Assign a behaviour to a number of VUs. Specify the behaviour and number of VUs to assign
    /// it to in the format `behaviour:count`. For example `--behaviour=heavy:5`.
    ///
    /// Specifying the count is optional and will default to 1.
    ///
    /// You can specify multiple behaviours by using the flag multiple times. For example `--behaviour=light:5 --behaviour=heavy:5`.
    ///
    /// For however many VUs you assign to behaviours in total, it must be less than or equal to the total number of VUs for this scenario.
    /// If it is less than the total number of VUs then the remaining VUs will be assigned the default behaviour.
    ///
    /// If the configuration is invalid then the scenario will fail to start.
    #[clap(long, short, value_parser = parse_vu_behaviour)]
    pub behaviour: Vec<(String, usize)>,

    /// The number of seconds to run the scenario for
    #[clap(long)]
    pub duration: Option<u64>,

    /// Run this test as a soak test, ignoring any configured duration and continuing to run until stopped
    #[clap(long, default_value = "false")]
    pub soak: bool,

    /// Do not show a progress bar on the CLI.
    ///
    /// A "Test in progress" line is logged periodically instead, which is easier to follow in CI logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// The reporter to use.
    #[arg(long, value_enum, default_value_t = ReporterOpt::InMemory)]
    pub reporter: ReporterOpt,

    /// Directory that the `json-lines` reporter writes into.
    #[arg(long, default_value = "reports")]
    pub report_dir: PathBuf,

    /// Set the ID of this run
    ///
    /// If not set, a random ID is used.
    #[arg(long, short)]
    pub run_id: Option<String>,

    /// Append the summary of this run, as one JSON line, to this file.
    #[arg(long)]
    pub summary_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReporterOpt {
    /// Keep results in memory and print a summary table at the end of the run.
    InMemory,
    /// Stream every check and timing sample to a JSON lines file in `--report-dir`.
    JsonLines,
    /// Discard records. The run summary is still produced.
    Noop,
}

pub fn parse_vu_behaviour(s: &str) -> anyhow::Result<(String, usize)> {
    let mut parts = s.split(':');
    let name = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(anyhow::anyhow!("No name specified for behaviour"))?;

    let count = match parts.next() {
        Some(count) => count
            .trim()
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid VU count for behaviour [{}]: {}", name, e))?,
        None => 1,
    };

    Ok((name, count))
}
