use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pen_segmenter::fixtures::{
    ExpectationDiff, FixtureCatalog, FixtureExpectations, FixtureProcessor, FixtureSummary,
    PenFixture,
};
use pen_segmenter::report::{self, SegmentRow};
use pen_segmenter::testing::SyntheticTrace;
use pen_segmenter::{AppConfig, Project, Run, SegmentExtent, SegmentId, Series, Stroke};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "pen_cli",
    about = "Deterministic segmentation harness for pen digitizer traces"
)]
struct Cli {
    /// Override directory containing fixture assets (defaults to ./fixtures)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// JSON configuration file; defaults are used when missing
    #[arg(long)]
    config: Option<PathBuf>,
    /// Debug-level logging on stderr
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Segment a fixture and optionally compare against expectations
    Segment {
        #[arg(long)]
        fixture: String,
        #[arg(long)]
        expect: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Promote every Series and its Runs to segments and report them
        #[arg(long)]
        segments: bool,
        /// Include one row per sample
        #[arg(long)]
        samples: bool,
    },
    /// Segment every fixture that has expectations
    Verify,
    /// List available fixtures on disk
    DumpFixtures,
    /// Generate a synthetic fixture
    Synth {
        #[arg(long, default_value_t = 1)]
        seed: u64,
        #[arg(long, default_value_t = 2)]
        words: usize,
        #[arg(long, default_value_t = 3)]
        letters: usize,
        /// Save as <name>.pen.json (+ expectations) in the fixture directory
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    pen_segmenter::init_logging(cli.verbose);

    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Segment {
            fixture,
            expect,
            output,
            segments,
            samples,
        } => run_segment(&catalog, config, &fixture, expect, output, segments, samples),
        Commands::Verify => run_verify(&catalog, config),
        Commands::DumpFixtures => run_dump(&catalog),
        Commands::Synth {
            seed,
            words,
            letters,
            name,
        } => run_synth(&catalog, config, seed, words, letters, name),
    }
}

fn run_segment(
    catalog: &FixtureCatalog,
    config: AppConfig,
    fixture: &str,
    override_expect: Option<PathBuf>,
    output_path: Option<PathBuf>,
    with_segments: bool,
    with_samples: bool,
) -> Result<ExitCode> {
    let data = catalog.load(fixture, override_expect)?;
    let mut project = FixtureProcessor::new(config).run(&data)?;
    if with_segments {
        promote_series(&mut project)?;
    }
    let summary = FixtureSummary::of(&project);

    let payload = SegmentReportPayload {
        fixture: &data.metadata.name,
        summary,
        temporal_resolution: project.output().temporal_resolution,
        series: project.series(),
        runs: project.runs(),
        strokes: project.strokes(),
        segment_levels: with_segments.then(|| report::segment_levels(&project)),
        samples: with_samples.then(|| report::sample_rows(&project)),
    };
    let json = serde_json::to_string_pretty(&payload)?;
    if let Some(path) = output_path {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    match data.expectations {
        Some(expectations) => match expectations.verify(&summary) {
            Ok(()) => Ok(ExitCode::from(0)),
            Err(diff) => {
                emit_diff(&data.metadata.name, &diff)?;
                Ok(ExitCode::from(2))
            }
        },
        None => Ok(ExitCode::from(0)),
    }
}

/// One segment per Series, with one child per Run
fn promote_series(project: &mut Project) -> Result<Vec<SegmentId>> {
    let series: Vec<Series> = project.series().to_vec();
    let mut created = Vec::with_capacity(series.len());
    for s in series {
        let id = project.create_segment(
            &format!("series {}", s.id),
            SegmentId::ROOT,
            SegmentExtent::Samples(s.start_ix..=s.end_ix),
        )?;
        project.segment_runs(id)?;
        created.push(id);
    }
    Ok(created)
}

fn run_verify(catalog: &FixtureCatalog, config: AppConfig) -> Result<ExitCode> {
    let processor = FixtureProcessor::new(config);
    let mut failed = false;

    for metadata in catalog.discover()? {
        if metadata.expect_path.is_none() {
            continue;
        }
        let data = catalog.load(&metadata.name, None)?;
        let project = processor.run(&data)?;
        let summary = FixtureSummary::of(&project);

        let verdict = match &data.expectations {
            Some(expectations) => expectations.verify(&summary),
            None => Ok(()),
        };
        let status = if verdict.is_ok() { "ok" } else { "mismatch" };
        println!(
            "{}",
            serde_json::json!({ "fixture": metadata.name, "status": status, "summary": summary })
        );
        if let Err(diff) = verdict {
            emit_diff(&metadata.name, &diff)?;
            failed = true;
        }
    }

    Ok(ExitCode::from(if failed { 2 } else { 0 }))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let fixtures = catalog.discover()?;
    if fixtures.is_empty() {
        println!("No fixtures found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for metadata in fixtures {
        if let Some(expect) = metadata.expect_path {
            println!("{} -> {}", metadata.name, expect.display());
        } else {
            println!("{}", metadata.name);
        }
    }
    Ok(ExitCode::from(0))
}

fn run_synth(
    catalog: &FixtureCatalog,
    config: AppConfig,
    seed: u64,
    words: usize,
    letters: usize,
    name: Option<String>,
) -> Result<ExitCode> {
    let trace = SyntheticTrace::new(seed)
        .words(words)
        .letters_per_word(letters);
    let fixture = PenFixture::from_trace(&trace);

    match name {
        Some(name) => {
            let project = Project::load(&name, fixture.samples.clone(), config)?;
            let expect = FixtureExpectations::for_summary(&name, &FixtureSummary::of(&project));
            let path = catalog.save(&name, &fixture, Some(&expect))?;
            println!("{}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&fixture)?),
    }
    Ok(ExitCode::from(0))
}

fn emit_diff(fixture: &str, diff: &ExpectationDiff) -> Result<()> {
    let mut json = diff.to_json();
    json["fixture"] = serde_json::Value::from(fixture);
    eprintln!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[derive(Serialize)]
struct SegmentReportPayload<'a> {
    fixture: &'a str,
    summary: FixtureSummary,
    temporal_resolution: f64,
    series: &'a [Series],
    runs: &'a [Run],
    strokes: &'a [Stroke],
    #[serde(skip_serializing_if = "Option::is_none")]
    segment_levels: Option<Vec<Vec<SegmentRow>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    samples: Option<Vec<report::SampleRow>>,
}
