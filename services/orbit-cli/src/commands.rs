use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use chrono::Local;
use clap::Args;
use orbit_assess::config::ConfigError;
use orbit_assess::error::AppError;
use orbit_assess::pipeline::batch::{random_subset, read_designation_list, BatchEntry};
use orbit_assess::pipeline::engine::StatusBand;
use orbit_assess::pipeline::quality::summarize;
use orbit_assess::pipeline::record::{ElementSet, EpochTag};
use orbit_assess::{
    BatchReport, BatchSettings, Designation, MpcDesignationCodec, QualityClassifier,
    RawResult, ResultInterpreter, StatusCode,
};
use serde::Serialize;
use serde_json::Value;

use crate::infra::{bootstrap, create_output, load_config, read_json};

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// Designations in unpacked form, e.g. "2006 WU224" or "C/2019 Y4"
    #[arg(required = true)]
    pub(crate) designations: Vec<String>,
    /// Print the full assessment state as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// Designations to assess in addition to any --file entries
    pub(crate) designations: Vec<String>,
    /// File with one designation per line; '#' starts a comment
    #[arg(long)]
    pub(crate) file: Option<PathBuf>,
    /// Assess only a random subset of this many designations
    #[arg(long)]
    pub(crate) random: Option<usize>,
    /// Override the configured worker count
    #[arg(long)]
    pub(crate) workers: Option<usize>,
    /// Write the full report as JSON to this path
    #[arg(long)]
    pub(crate) json: Option<PathBuf>,
    /// Write one CSV row per designation to this path
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RefreshArgs {
    /// Designations whose stored orbit should be re-classified
    #[arg(required = true)]
    pub(crate) designations: Vec<String>,
}

#[derive(Args, Debug)]
pub(crate) struct InterpretArgs {
    /// Fitter that produced the payload: extension, iod or comet
    #[arg(long)]
    pub(crate) origin: String,
    /// Designation the payload belongs to
    #[arg(long)]
    pub(crate) designation: String,
    /// JSON payload as written by the fitter
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Treat the run as completed (IOD and comet fitters only)
    #[arg(long)]
    pub(crate) completed: bool,
}

#[derive(Args, Debug)]
pub(crate) struct QualityArgs {
    /// JSON object keyed by epoch (eq0dict.. or mid_epoch..) holding element sets
    #[arg(long)]
    pub(crate) input: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct PackArgs {
    /// Designations in unpacked form
    #[arg(required = true)]
    pub(crate) designations: Vec<String>,
    /// Print JSON instead of tab-separated columns
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_assess(args: AssessArgs) -> Result<(), AppError> {
    let pipeline = bootstrap()?;
    let runner = pipeline.runner(BatchSettings::from(&pipeline.config.pipeline));
    let report = runner.run_sequential(&args.designations, &runner.signal());

    if args.json {
        let stdout = std::io::stdout();
        serde_json::to_writer_pretty(stdout.lock(), &report.entries)?;
        println!();
        return Ok(());
    }

    for entry in &report.entries {
        render_entry(entry);
    }
    Ok(())
}

pub(crate) async fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        designations,
        file,
        random,
        workers,
        json,
        csv,
    } = args;

    if workers == Some(0) {
        return Err(ConfigError::InvalidWorkers.into());
    }

    let pipeline = bootstrap()?;
    let mut inputs = designations;
    if let Some(path) = &file {
        inputs.extend(read_designation_list(BufReader::new(File::open(path)?))?);
    }
    if let Some(count) = random {
        inputs = random_subset(&inputs, count, &mut rand::thread_rng());
    }
    if inputs.is_empty() {
        println!("No designations to assess.");
        return Ok(());
    }

    let mut settings = BatchSettings::from(&pipeline.config.pipeline);
    if let Some(workers) = workers {
        settings.workers = workers;
    }
    let runner = pipeline.runner(settings);
    let signal = runner.signal();
    let report = runner.run(inputs, &signal).await;

    render_report(&report);

    if let Some(path) = json {
        let mut writer = create_output(&path)?;
        report.write_json(&mut writer)?;
        writer.flush()?;
        println!("JSON report written to {}", path.display());
    }
    if let Some(path) = csv {
        report.write_csv(create_output(&path)?)?;
        println!("CSV report written to {}", path.display());
    }
    Ok(())
}

pub(crate) fn run_refresh(args: RefreshArgs) -> Result<(), AppError> {
    let pipeline = bootstrap()?;
    for input in &args.designations {
        let entry = match Designation::parse(input, &MpcDesignationCodec) {
            Ok(designation) => {
                BatchEntry::from_assessment(input.as_str(), pipeline.engine.refresh_quality(&designation), 1)
            }
            Err(err) => BatchEntry::invalid(input.as_str(), &err),
        };
        render_entry(&entry);
    }
    Ok(())
}

pub(crate) fn run_interpret(args: InterpretArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let designation = Designation::parse(&args.designation, &MpcDesignationCodec)?;
    let payload = read_json(&args.input)?;
    let raw = RawResult::with_completion(args.completed, payload);

    let interpreter = ResultInterpreter::new(config.observations);
    let outcome = interpreter.interpret_labelled(&designation, &raw, &args.origin)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

pub(crate) fn run_quality(args: QualityArgs) -> Result<(), AppError> {
    let config = load_config()?;
    let value = read_json(&args.input)?;

    let elements: BTreeMap<EpochTag, ElementSet> = EpochTag::ordered()
        .into_iter()
        .filter_map(|tag| {
            value
                .get(tag.raw_key())
                .or_else(|| value.get(tag.label()))
                .and_then(Value::as_object)
                .map(|set| (tag, set.clone()))
        })
        .collect();
    let summary = summarize(&elements);
    let classifier = QualityClassifier::new(config.quality);

    for (tag, finding) in &summary {
        println!("{:<16} {}", tag.label(), finding);
    }
    match classifier.classify(&summary) {
        Ok(verdict) => println!("Verdict: {}", verdict.label()),
        Err(err) => println!("Verdict: unclassified ({err})"),
    }
    Ok(())
}

pub(crate) fn run_codes() {
    println!("Code  Band          Description");
    for band in StatusBand::ordered() {
        for code in StatusCode::ALL.into_iter().filter(|code| code.band() == band) {
            println!("{}   {:<13} {}", code, band.label(), code.description());
        }
    }
}

#[derive(Serialize)]
struct PackedView<'a> {
    unpacked: &'a str,
    packed: &'a str,
    fitter_name: &'a str,
    orbit_class: &'static str,
}

pub(crate) fn run_pack(args: PackArgs) -> Result<(), AppError> {
    let designations = args
        .designations
        .iter()
        .map(|input| Designation::parse(input, &MpcDesignationCodec))
        .collect::<Result<Vec<_>, _>>()?;

    if args.json {
        let views: Vec<PackedView<'_>> = designations
            .iter()
            .map(|designation| PackedView {
                unpacked: designation.unpacked(),
                packed: designation.packed(),
                fitter_name: designation.fitter_name(),
                orbit_class: designation.orbit_class().label(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
        return Ok(());
    }

    for designation in &designations {
        println!(
            "{}\t{}\t{}\t{}",
            designation.unpacked(),
            designation.packed(),
            designation.fitter_name(),
            designation.orbit_class().label()
        );
    }
    Ok(())
}

fn render_entry(entry: &BatchEntry) {
    println!(
        "{:<20} {}  {:<12} {}",
        entry.label(),
        entry.status,
        entry.status.band().label(),
        entry.status.description()
    );
    for line in &entry.state.diagnostics {
        println!("    - {line}");
    }
}

fn render_report(report: &BatchReport) {
    let summary = report.summary();
    println!(
        "Batch {} ({} designation(s), generated {})",
        summary.run_id,
        summary.total,
        Local::now().format("%Y-%m-%d %H:%M")
    );
    println!("============================================================");
    for band in &summary.bands {
        println!("{} ({})", band.band_label, band.count);
        for code in &band.codes {
            println!("  {} {} ({})", code.code, code.description, code.count);
            println!("      {}", code.designations.join(", "));
        }
    }
    if !summary.failures.is_empty() {
        println!("Failures");
        for failure in &summary.failures {
            println!("  {:<26} {}", failure.failure_label, failure.count);
        }
    }
    println!("{}", report.summary_line());
}
