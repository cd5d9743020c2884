use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine;
use clap::{Args, Parser, Subcommand};
use ecgai::infer::{HttpTransport, InferenceClient};
use ecgai::render::{render, render_report_sheet, LabelFont};
use ecgai::report::{DiagnosticReport, Language};
use ecgai::waveform::{decode, EcgSchema, Lead};
use ecgai::{logging, Config, EcgPipeline, ModelConfig, PipelineError};
use serde::Serialize;

const EXIT_ENTERED_IN_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_UNAVAILABLE: i32 = 3;

#[derive(Debug, Parser)]
#[command(
    name = "ecgai",
    version,
    about = "AI-assisted 12-lead ECG interpretation (STEMI and rhythm)",
    long_about = "ecgai decodes a resting or annotated ECG XML export, runs the ST-elevation\n\
        and rhythm models on a KServe v2 inference server, and prints a calibrated,\n\
        coded report.\n\n\
        EXAMPLES:\n\
        \n  ecgai analyze record.xml                     Analyse a resting ECG export\n\
        \n  ecgai analyze --schema aecg --lang zh-TW a.xml  Annotated ECG, Chinese report\n\
        \n  ecgai render record.xml -o trace.png          Plot the 12-lead sheet only\n\
        \n  ecgai status                                  Check the inference server"
)]
struct Cli {
    /// Increase verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// TOML configuration file (ECGAI_* variables override it)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pipeline on one record
    Analyze(AnalyzeArgs),
    /// Plot a record on ECG paper without inference
    Render(RenderArgs),
    /// Decode a record and list its leads
    Decode(DecodeArgs),
    /// Check server and model readiness
    Status,
}

#[derive(Debug, Args, Clone)]
struct RecordArgs {
    /// ECG XML export
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Record encoding: resting (muse) or annotated (aecg, hl7)
    #[arg(long, default_value = "resting")]
    schema: EcgSchema,
}

#[derive(Debug, Args, Clone)]
struct AnalyzeArgs {
    #[command(flatten)]
    record: RecordArgs,

    /// Report language: en or zh-TW (default from configuration)
    #[arg(long)]
    lang: Option<Language>,

    /// Write the rendered ECG to this PNG
    #[arg(long, value_name = "FILE")]
    image: Option<PathBuf>,

    /// Write the ECG plus narrative sheet to this PNG
    #[arg(long, value_name = "FILE")]
    sheet: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Include the PNG as base64 in the JSON output
    #[arg(long, requires = "json")]
    embed_image: bool,
}

#[derive(Debug, Args, Clone)]
struct RenderArgs {
    #[command(flatten)]
    record: RecordArgs,

    /// Output PNG
    #[arg(short = 'o', long = "out", value_name = "FILE")]
    out: PathBuf,
}

#[derive(Debug, Args, Clone)]
struct DecodeArgs {
    #[command(flatten)]
    record: RecordArgs,

    /// Print the lead summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    file: &'a Path,
    language: Language,
    #[serde(flatten)]
    report: &'a DiagnosticReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_png_base64: Option<String>,
}

#[derive(Serialize)]
struct DecodeOutput<'a> {
    file: &'a Path,
    schema: EcgSchema,
    samples: BTreeMap<Lead, usize>,
    missing: Vec<&'static str>,
    machine_statements: &'a [String],
}

/// Any failure talking to the inference server exits with
/// `EXIT_UNAVAILABLE`, whether or not it is a readiness failure.
fn exit_code(err: &PipelineError) -> i32 {
    match err {
        PipelineError::Format(_) => EXIT_ENTERED_IN_ERROR,
        PipelineError::Inference { .. } => EXIT_UNAVAILABLE,
        PipelineError::Configuration(_) => EXIT_USAGE,
    }
}

fn read_record(path: &Path) -> Result<Vec<u8>, i32> {
    fs::read(path).map_err(|e| {
        eprintln!("error: cannot read '{}': {e}", path.display());
        EXIT_USAGE
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), i32> {
    fs::write(path, bytes).map_err(|e| {
        eprintln!("error: cannot write '{}': {e}", path.display());
        EXIT_USAGE
    })
}

fn run_analyze(config: &Config, args: &AnalyzeArgs) -> Result<(), i32> {
    let bytes = read_record(&args.record.input)?;
    let language = args.lang.unwrap_or(config.report.language);

    let pipeline = EcgPipeline::connect(config).map_err(|e| {
        eprintln!("error [{}]: {e}", e.kind());
        exit_code(&e)
    })?;
    let report = pipeline.run(&bytes, args.record.schema, language).map_err(|e| {
        eprintln!("error [{}]: {e}", e.kind());
        exit_code(&e)
    })?;

    if let Some(path) = &args.image {
        write_file(path, &report.image)?;
    }
    if let Some(path) = &args.sheet {
        let font = config.load_font().unwrap_or_else(|e| {
            log::warn!("{e}; sheet text in the bundled font");
            LabelFont::bundled().ok()
        });
        match render_report_sheet(&report.image, &report.narrative, font.as_ref()) {
            Ok(sheet) => write_file(path, &sheet)?,
            Err(e) => {
                log::warn!("report sheet failed, writing the bare trace instead: {e}");
                write_file(path, &report.image)?;
            }
        }
    }

    if args.json {
        let output = AnalyzeOutput {
            file: &args.record.input,
            language,
            report: &report,
            image_png_base64: args
                .embed_image
                .then(|| base64::engine::general_purpose::STANDARD.encode(&report.image)),
        };
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: {e}");
                return Err(EXIT_USAGE);
            }
        }
    } else {
        println!("{}", report.narrative);
    }
    Ok(())
}

fn run_render(config: &Config, args: &RenderArgs) -> Result<(), i32> {
    let bytes = read_record(&args.record.input)?;
    let record = decode(&bytes, args.record.schema).map_err(|e| {
        eprintln!("error [format]: {e}");
        EXIT_ENTERED_IN_ERROR
    })?;
    let options = config.render_options().map_err(|e| {
        eprintln!("error: {e}");
        EXIT_USAGE
    })?;
    let rendered = render(&record.samples, &options).map_err(|e| {
        eprintln!("error: {e}");
        EXIT_USAGE
    })?;
    for lead in &rendered.missing {
        eprintln!("warning: lead {lead} not drawn");
    }
    write_file(&args.out, &rendered.png)
}

fn run_decode(args: &DecodeArgs) -> Result<(), i32> {
    let bytes = read_record(&args.record.input)?;
    let record = decode(&bytes, args.record.schema).map_err(|e| {
        eprintln!("error [format]: {e}");
        EXIT_ENTERED_IN_ERROR
    })?;

    let output = DecodeOutput {
        file: &args.record.input,
        schema: args.record.schema,
        samples: record
            .samples
            .iter()
            .map(|(lead, values)| (lead, values.len()))
            .collect(),
        missing: record.samples.missing().into_iter().map(|lead| lead.name()).collect(),
        machine_statements: &record.machine_statements,
    };

    if args.json {
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: {e}");
                return Err(EXIT_USAGE);
            }
        }
        return Ok(());
    }

    println!("{} ({})", output.file.display(), output.schema);
    for (lead, count) in &output.samples {
        println!("  {:<4} {count} samples", lead.name());
    }
    if !output.missing.is_empty() {
        println!("  missing: {}", output.missing.join(", "));
    }
    for statement in output.machine_statements {
        println!("  device: {statement}");
    }
    Ok(())
}

fn model_status(config: &Config, model: &ModelConfig) -> bool {
    let timeout = config.inference.timeout_secs.map(Duration::from_secs);
    let transport = match HttpTransport::new(&config.inference.url, timeout) {
        Ok(transport) => transport,
        Err(e) => {
            println!("{:<16} error: {e}", model.name);
            return false;
        }
    };
    let client = match InferenceClient::connect(transport, model.spec()) {
        Ok(client) => client,
        Err(e) => {
            println!("{:<16} NOT READY: {e}", model.name);
            return false;
        }
    };
    match client.metadata() {
        Ok(meta) => {
            let names = |tensors: &[ecgai::infer::TensorMetadata]| {
                tensors
                    .iter()
                    .map(|t| format!("{}:{}{:?}", t.name, t.datatype, t.shape))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            println!(
                "{:<16} ready  inputs [{}]  outputs [{}]",
                model.name,
                names(&meta.inputs),
                names(&meta.outputs)
            );
        }
        Err(e) => println!("{:<16} ready  (metadata unavailable: {e})", model.name),
    }
    true
}

fn run_status(config: &Config) -> Result<(), i32> {
    println!("endpoint {}", config.inference.url);
    let stemi = model_status(config, &config.stemi);
    let rhythm = model_status(config, &config.rhythm);
    if !rhythm {
        eprintln!("warning: reports will omit rhythm analysis");
    }
    if stemi {
        Ok(())
    } else {
        Err(EXIT_UNAVAILABLE)
    }
}

fn run_cli() -> i32 {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error [configuration]: {e}");
            return EXIT_USAGE;
        }
    };

    let result = match &cli.command {
        Command::Analyze(args) => run_analyze(&config, args),
        Command::Render(args) => run_render(&config, args),
        Command::Decode(args) => run_decode(args),
        Command::Status => run_status(&config),
    };
    match result {
        Ok(()) => 0,
        Err(code) => code,
    }
}

fn main() {
    std::process::exit(run_cli());
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecgai::infer::{InferError, ReadinessStage};
    use ecgai::ConfigError;

    #[test]
    fn every_inference_failure_exits_unavailable() {
        let inference = |source| PipelineError::Inference {
            model: "ecg_stemi_by".into(),
            source,
        };
        let protocol = inference(InferError::Protocol("bad tensor".into()));
        assert_eq!(exit_code(&protocol), EXIT_UNAVAILABLE);
        let transport = inference(InferError::Transport("reset".into()));
        assert_eq!(exit_code(&transport), EXIT_UNAVAILABLE);
        assert_eq!(
            exit_code(&inference(InferError::ServiceUnavailable {
                model: "ecg_stemi_by".into(),
                stage: ReadinessStage::Server,
                reason: "connection refused".into(),
            })),
            EXIT_UNAVAILABLE
        );
        assert_eq!(
            exit_code(&PipelineError::Configuration(ConfigError::Invalid("threshold".into()))),
            EXIT_USAGE
        );
    }

    #[test]
    fn cli_parses_verbose_flag() {
        let cli = Cli::try_parse_from(["ecgai", "-vvv", "status"]).unwrap();
        assert_eq!(cli.verbose, 3);
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn analyze_accepts_schema_aliases() {
        let cli = Cli::try_parse_from([
            "ecgai", "analyze", "--schema", "hl7", "--lang", "zh", "--json", "r.xml",
        ])
        .unwrap();
        match cli.command {
            Command::Analyze(args) => {
                assert_eq!(args.record.schema, EcgSchema::Annotated);
                assert_eq!(args.lang, Some(Language::TraditionalChinese));
                assert!(args.json);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn embed_image_requires_json() {
        assert!(Cli::try_parse_from(["ecgai", "analyze", "--embed-image", "r.xml"]).is_err());
    }

    #[test]
    fn render_requires_output() {
        assert!(Cli::try_parse_from(["ecgai", "render", "r.xml"]).is_err());
        let cli = Cli::try_parse_from(["ecgai", "render", "r.xml", "-o", "out.png"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Render(ref args) if args.out == Path::new("out.png")
        ));
    }

    #[test]
    fn decode_prints_json_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.xml");
        fs::write(
            &path,
            "<RestingECG><Waveform><LeadData><LeadID>V1</LeadID>\
             <LeadAmplitudeUnitsPerBit>4.88</LeadAmplitudeUnitsPerBit>\
             <WaveFormData>AQACAA==</WaveFormData></LeadData></Waveform></RestingECG>",
        )
        .unwrap();
        let args = DecodeArgs {
            record: RecordArgs {
                input: path,
                schema: EcgSchema::Resting,
            },
            json: true,
        };
        assert_eq!(run_decode(&args), Ok(()));
    }

    #[test]
    fn unreadable_record_is_usage_error() {
        let args = DecodeArgs {
            record: RecordArgs {
                input: PathBuf::from("/nonexistent/record.xml"),
                schema: EcgSchema::Resting,
            },
            json: false,
        };
        assert_eq!(run_decode(&args), Err(EXIT_USAGE));
    }
}
