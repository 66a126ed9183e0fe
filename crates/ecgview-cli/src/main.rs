mod render;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ecgview_client::{ApiClient, AsyncReporter, Config, ReportEvent};
use ecgview_lib::{
    api::{EcgData, LeadResultRow, LoadEcgResponse, PatientInfo},
    extract_window,
    plot::{figure_from_segments, PlotBackend},
    summary::{interpretation_summary, lead_overview, LeadOverview},
    AxisDeviation, AxisVector, Lead, NullReporter, Reporter, ReviewSession, SelectionMode,
    TimeSeries, Window,
};
use env_logger::Env;
use log::{info, warn};
use render::{write_table_csv, write_vector_image, PngBackend};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const PLOT_MAX_POINTS: usize = 2000;

#[derive(Parser)]
#[command(
    name = "ecgview",
    version,
    about = "ECG review tool: beat/flat selection, baseline correction and electrical axis"
)]
struct Cli {
    /// Config file (defaults to $ECGVIEW_CONFIG or the per-user config)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend base URL, overriding config and $ECGVIEW_SERVER
    #[arg(long, global = true)]
    server: Option<String>,
    /// Log filter, e.g. info or ecgview_lib=debug
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List patients known to the backend, one JSON object per line
    Patients,
    /// Fetch a patient's record and print a per-lead overview
    Load {
        #[arg(long)]
        patient: String,
    },
    /// Select a beat and a flat segment, correct the peaks and compute the axis
    Analyze(AnalyzeArgs),
    /// Print result vectors stored for a patient
    Results {
        #[arg(long)]
        patient: String,
    },
    /// Delete a patient and their stored results
    Delete {
        #[arg(long)]
        patient: String,
    },
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Patient to load from the backend
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    patient: Option<String>,
    /// Local JSON record: a load_ecg_data response or a bare ecg_data object
    #[arg(long)]
    input: Option<PathBuf>,
    /// Beat window in seconds, MIN,MAX
    #[arg(long, value_parser = parse_window, allow_hyphen_values = true)]
    beat: Window,
    /// Flat (isoelectric) window in seconds, MIN,MAX
    #[arg(long, value_parser = parse_window, allow_hyphen_values = true)]
    flat: Window,
    /// Narrow the beat to its QRS complex (leads I-III), MIN,MAX
    #[arg(long, value_parser = parse_window, allow_hyphen_values = true)]
    qrs: Option<Window>,
    /// Do not post results or request the vector graph
    #[arg(long)]
    offline: bool,
    /// Write the backend's axis diagram PNG here
    #[arg(long)]
    vector_image: Option<PathBuf>,
    /// Write the corrected-peak table as CSV
    #[arg(long)]
    table_csv: Option<PathBuf>,
    /// Draw the selected beat segments to a PNG
    #[arg(long)]
    plot: Option<PathBuf>,
    /// Include the plain-language interpretation summary
    #[arg(long)]
    summary: bool,
}

fn parse_window(text: &str) -> Result<Window, String> {
    let (lo, hi) = text
        .split_once(',')
        .ok_or_else(|| format!("expected MIN,MAX, got '{}'", text))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid bound '{}': {}", s.trim(), e))
    };
    Window::new(parse(lo)?, parse(hi)?).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::resolve(cli.config.as_deref())?;
    if let Some(server) = cli.server {
        config.server.base_url = server;
    }
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let client = ApiClient::from_config(&config);
    match cli.command {
        Commands::Patients => cmd_patients(&client)?,
        Commands::Load { patient } => cmd_load(&client, &patient)?,
        Commands::Analyze(args) => cmd_analyze(&client, &args)?,
        Commands::Results { patient } => {
            let rows = client
                .result_vectors(&patient)
                .with_context(|| format!("fetching result vectors for patient {}", patient))?;
            println!("{}", serde_json::to_string(&rows)?);
        }
        Commands::Delete { patient } => {
            let message = client
                .delete_patient(&patient)
                .with_context(|| format!("deleting patient {}", patient))?;
            println!("{}", message);
        }
    }
    Ok(())
}

fn cmd_patients(client: &ApiClient) -> Result<()> {
    let patients = client.patients().context("listing patients")?;
    for patient in patients {
        println!("{}", serde_json::to_string(&patient)?);
    }
    Ok(())
}

#[derive(Serialize)]
struct LoadOverview {
    patient_info: Option<PatientInfo>,
    samples: usize,
    span: Option<(f64, f64)>,
    leads: Vec<LeadOverview>,
}

fn cmd_load(client: &ApiClient, patient: &str) -> Result<()> {
    let record = client
        .load_ecg(patient)
        .with_context(|| format!("loading ECG for patient {}", patient))?;
    let series = TimeSeries::from_wire(&record.ecg_data).context("invalid ECG record")?;
    let span = series.span();
    let leads = match span {
        Some((lo, hi)) => {
            let whole = Window::new(lo, hi)?;
            lead_overview(&extract_window(&series, &Lead::ALL, &whole))
        }
        None => Vec::new(),
    };
    let overview = LoadOverview {
        patient_info: record.patient_info,
        samples: series.len(),
        span,
        leads,
    };
    println!("{}", serde_json::to_string(&overview)?);
    Ok(())
}

fn read_record(path: &Path) -> Result<LoadEcgResponse> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    if value.get("ecg_data").is_some() {
        return serde_json::from_value(value)
            .with_context(|| format!("parsing ECG record {}", path.display()));
    }
    let ecg_data: EcgData = serde_json::from_value(value)
        .with_context(|| format!("parsing ecg_data {}", path.display()))?;
    Ok(LoadEcgResponse {
        success: true,
        patient_info: None,
        ecg_data,
    })
}

#[derive(Serialize)]
struct VectorGraphSummary {
    magnitude: f64,
    angle: f64,
    diagnose: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeReport {
    anonymous_id: String,
    seq: u64,
    rows: Vec<LeadResultRow>,
    axis: Option<AxisVector>,
    deviation: Option<String>,
    deviation_source: Option<&'static str>,
    vector_graph: Option<VectorGraphSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

fn run_selections<R: Reporter>(session: &mut ReviewSession<R>, args: &AnalyzeArgs) -> Result<()> {
    session.select(SelectionMode::Beat, args.beat)?;
    session.select(SelectionMode::Flat, args.flat)?;
    if let Some(qrs) = args.qrs {
        session.select(SelectionMode::Qrs, qrs)?;
    }
    Ok(())
}

fn cmd_analyze(client: &ApiClient, args: &AnalyzeArgs) -> Result<()> {
    let record = match (&args.input, &args.patient) {
        (Some(path), _) => read_record(path)?,
        (None, Some(patient)) => client
            .load_ecg(patient)
            .with_context(|| format!("loading ECG for patient {}", patient))?,
        (None, None) => bail!("either --patient or --input is required"),
    };
    let series = TimeSeries::from_wire(&record.ecg_data).context("invalid ECG record")?;
    let patient = record.patient_info.unwrap_or_default();
    let anonymous_id = patient
        .identifier()
        .map(str::to_string)
        .or_else(|| args.patient.clone())
        .unwrap_or_else(|| "Unknown".into());
    info!(
        "reviewing {} ({} samples, {} leads)",
        anonymous_id,
        series.len(),
        series.leads().count()
    );

    let report = if args.offline {
        let mut session = ReviewSession::new(series, anonymous_id, NullReporter);
        run_selections(&mut session, args)?;
        build_report(&session, &patient, args)?
    } else {
        let (reporter, events) = AsyncReporter::new(client.clone());
        let mut session = ReviewSession::new(series, anonymous_id, reporter);
        run_selections(&mut session, args)?;
        session.reporter().join_all();
        // failures were already logged by the reporter
        for event in events.try_iter() {
            if let ReportEvent::VectorGraph {
                seq,
                outcome: Ok(response),
            } = event
            {
                session.apply_vector_graph(seq, response);
            }
        }
        build_report(&session, &patient, args)?
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

fn build_report<R: Reporter>(
    session: &ReviewSession<R>,
    patient: &PatientInfo,
    args: &AnalyzeArgs,
) -> Result<AnalyzeReport> {
    let output = session.last_output().ok_or_else(|| {
        anyhow!("no result: the beat and flat windows must both contain samples")
    })?;
    let graph = session.vector_graph();
    let (deviation, source) = match (session.deviation(), output.axis) {
        (Some(deviation), _) => (Some(deviation), Some("server")),
        (None, Some(axis)) => (
            Some(AxisDeviation::for_components(axis.dx, axis.dy)),
            Some("local"),
        ),
        (None, None) => (None, None),
    };

    if let Some(path) = &args.table_csv {
        write_table_csv(path, &output.rows)?;
    }
    if let Some(path) = &args.plot {
        if let Some(beat) = session.effective_beat() {
            let fig = figure_from_segments("Selected Beat", beat, PLOT_MAX_POINTS);
            PngBackend::new(path).draw(&fig)?;
        }
    }
    if let Some(path) = &args.vector_image {
        match graph {
            Some(graph) => write_vector_image(path, &graph.image)?,
            None => warn!("no vector graph available; {} not written", path.display()),
        }
    }

    let summary = match (args.summary, output.axis, deviation) {
        (true, Some(axis), Some(deviation)) => {
            let (magnitude, angle) = match graph {
                Some(g) => (g.magnitude, g.angle),
                None => {
                    let local = axis.hexaxial();
                    (local.magnitude, local.angle)
                }
            };
            Some(interpretation_summary(patient, magnitude, angle, deviation))
        }
        (true, _, _) => {
            warn!("axis unavailable; no interpretation summary");
            None
        }
        _ => None,
    };

    Ok(AnalyzeReport {
        anonymous_id: session.anonymous_id().to_string(),
        seq: output.seq,
        rows: output.rows.clone(),
        axis: output.axis,
        deviation: deviation.map(|d| d.label().to_string()),
        deviation_source: source,
        vector_graph: graph.map(|g| VectorGraphSummary {
            magnitude: g.magnitude,
            angle: g.angle,
            diagnose: g.diagnose.clone(),
        }),
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_windows() {
        let window = parse_window("-0.1, 0.25").unwrap();
        assert_eq!((window.x_min, window.x_max), (-0.1, 0.25));
        assert!(parse_window("0.3").is_err());
        assert!(parse_window("0.5,0.2").is_err());
        assert!(parse_window("a,b").is_err());
    }
}
