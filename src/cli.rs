//! Command-line front end.
//!
//! Stands in for the interactive form: collects the six attributes, runs
//! the pipeline and renders history, statistics and exports.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use crate::adapters::{csv, ModelLoader, SqliteRecordStore};
use crate::application::{AnalyticsService, Persistence, PredictionPipeline};
use crate::config::AppConfig;
use crate::domain::{format_cost, PatientInput, PredictionRecord};
use crate::ports::{RecordStore, SortOrder};
use crate::{InsuranceError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "insurance-cost",
    about = "Estimate medical insurance charges and review past predictions",
    version
)]
pub struct Cli {
    /// SQLite database file (overrides INSURANCE_DB_PATH)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Model artifact file or directory (overrides INSURANCE_MODEL_PATH)
    #[arg(long, global = true)]
    pub model: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Estimate the insurance cost for one patient.
    Predict(PredictArgs),

    /// List stored predictions.
    History(HistoryArgs),

    /// Summary statistics over stored predictions.
    Stats(StatsArgs),

    /// Write stored predictions as CSV.
    Export(ExportArgs),

    /// Delete every stored prediction.
    Clear(ClearArgs),

    /// Create or upgrade the database schema.
    Migrate,
}

#[derive(Debug, Args)]
pub struct PredictArgs {
    /// Age in years (18-100)
    #[arg(long)]
    pub age: u32,

    /// male | female
    #[arg(long)]
    pub sex: String,

    /// Body mass index (10.0-60.0)
    #[arg(long)]
    pub bmi: f64,

    /// Number of children (0-5)
    #[arg(long, default_value_t = 0)]
    pub children: u32,

    /// yes | no
    #[arg(long)]
    pub smoker: String,

    /// southwest | southeast | northwest | northeast
    #[arg(long)]
    pub region: String,

    /// Show the estimate without storing it
    #[arg(long)]
    pub no_save: bool,
}

#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Maximum rows to show (defaults to INSURANCE_HISTORY_LIMIT)
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Oldest first
    #[arg(long)]
    pub ascending: bool,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Emit the full summary, including chart series, as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Output file; stdout when omitted
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Confirm the irreversible delete
    #[arg(long)]
    pub yes: bool,
}

/// Execute a parsed command line, writing user-facing output to `out`.
///
/// # Errors
/// Returns the first error raised by the command.
pub fn run<W: Write>(cli: Cli, config: &AppConfig, out: &mut W) -> Result<()> {
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let model_path = cli.model.unwrap_or_else(|| config.model_path.clone());

    match cli.command {
        Commands::Predict(args) => run_predict(args, &model_path, &db_path, out),
        Commands::History(args) => {
            run_history(args, config.history_limit, &open_store(&db_path)?, out)
        }
        Commands::Stats(args) => run_stats(args, Arc::new(open_store(&db_path)?), out),
        Commands::Export(args) => run_export(args, &open_store(&db_path)?, out),
        Commands::Clear(args) => run_clear(args, &open_store(&db_path)?, out),
        Commands::Migrate => run_migrate(&open_store(&db_path)?, out),
    }
}

fn open_store(path: &Path) -> Result<SqliteRecordStore> {
    Ok(SqliteRecordStore::new(path)?)
}

fn run_predict<W: Write>(args: PredictArgs, model_path: &Path, db_path: &Path, out: &mut W) -> Result<()> {
    let input = PatientInput::parse(
        args.age,
        &args.sex,
        args.bmi,
        args.children,
        &args.smoker,
        &args.region,
    )?;
    let bundle = ModelLoader::new().load(model_path)?;

    // A store that cannot be opened must not hide the estimate; the reason
    // is reported after it.
    let mut unavailable = None;
    let store = if args.no_save {
        None
    } else {
        match open_store(db_path) {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                tracing::warn!("Prediction store unavailable: {e}");
                unavailable = Some(e.to_string());
                None
            }
        }
    };
    let pipeline = PredictionPipeline::from_bundle(bundle, store);

    let mut outcome = pipeline.estimate_and_record(&input)?;
    if let Some(reason) = unavailable {
        outcome.persistence = Persistence::Failed(reason);
    }

    writeln!(
        out,
        "Estimated medical insurance cost: ₹ {}",
        outcome.estimate.display_cost()
    )?;
    match outcome.persistence {
        Persistence::Saved(record) => writeln!(out, "Saved as record #{}", record.id)?,
        Persistence::Failed(reason) => writeln!(out, "Warning: prediction not saved: {reason}")?,
        Persistence::Skipped => writeln!(out, "Not saved (--no-save)")?,
    }
    Ok(())
}

fn write_record_table<W: Write>(out: &mut W, records: &[PredictionRecord]) -> Result<()> {
    writeln!(
        out,
        "{:>5}  {:<19}  {:>3}  {:<6}  {:>5}  {:>8}  {:<6}  {:<9}  {:>12}",
        "id", "date_time", "age", "sex", "bmi", "children", "smoker", "region", "cost"
    )?;
    for r in records {
        writeln!(
            out,
            "{:>5}  {:<19}  {:>3}  {:<6}  {:>5.1}  {:>8}  {:<6}  {:<9}  {:>12}",
            r.id,
            r.date_time,
            r.age,
            r.sex.as_str(),
            r.bmi,
            r.children,
            r.smoker.as_str(),
            r.region.as_str(),
            format_cost(r.predicted_cost)
        )?;
    }
    Ok(())
}

fn run_history<W: Write>(
    args: HistoryArgs,
    default_limit: usize,
    store: &SqliteRecordStore,
    out: &mut W,
) -> Result<()> {
    let limit = args.limit.unwrap_or(default_limit);

    let (records, total) = if args.ascending {
        let all = store.query_all(SortOrder::Ascending)?;
        let total = all.len();
        (
            all.into_iter().skip(args.offset).take(limit).collect::<Vec<_>>(),
            total,
        )
    } else {
        let page = store.query_page(args.offset, limit)?;
        (page.items, page.total_count)
    };

    if total == 0 {
        writeln!(out, "No predictions stored yet.")?;
        return Ok(());
    }
    write_record_table(out, &records)?;
    writeln!(out, "Showing {} of {} predictions", records.len(), total)?;
    Ok(())
}

fn run_stats<W: Write>(args: StatsArgs, store: Arc<SqliteRecordStore>, out: &mut W) -> Result<()> {
    let summary = AnalyticsService::new(store).summary()?;

    if args.json {
        writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        return Ok(());
    }

    let money = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("₹ {}", format_cost(v)));
    writeln!(out, "Total predictions: {}", summary.count)?;
    writeln!(out, "Average cost:      {}", money(summary.mean_cost))?;
    writeln!(out, "Highest cost:      {}", money(summary.max_cost))?;
    for (title, counts) in [
        ("Sex", &summary.by_sex),
        ("Smoker", &summary.by_smoker),
        ("Region", &summary.by_region),
    ] {
        let parts: Vec<String> = counts.iter().map(|(k, v)| format!("{k}={v}")).collect();
        writeln!(out, "{title:<8} {}", parts.join(", "))?;
    }
    Ok(())
}

fn run_export<W: Write>(args: ExportArgs, store: &SqliteRecordStore, out: &mut W) -> Result<()> {
    let records = store.query_all(SortOrder::Ascending)?;

    match args.out {
        Some(path) => {
            let file = File::create(&path)?;
            csv::write_records(BufWriter::new(file), &records)?;
            tracing::info!("Exported {} predictions to {:?}", records.len(), path);
            writeln!(out, "Exported {} predictions to {}", records.len(), path.display())?;
        }
        None => csv::write_records(out, &records)?,
    }
    Ok(())
}

fn run_clear<W: Write>(args: ClearArgs, store: &SqliteRecordStore, out: &mut W) -> Result<()> {
    if !args.yes {
        return Err(InsuranceError::Validation(
            "Refusing to delete all predictions without --yes".to_string(),
        ));
    }
    let removed = store.count()?;
    store.delete_all()?;
    writeln!(out, "Deleted {removed} predictions")?;
    Ok(())
}

fn run_migrate<W: Write>(store: &SqliteRecordStore, out: &mut W) -> Result<()> {
    let columns = store.table_columns()?;
    writeln!(out, "Schema ready: {}", columns.join(", "))?;
    writeln!(out, "Records: {}", store.count()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const MODEL_JSON: &str = r#"{
        "format_version": 1,
        "feature_names": ["age", "sex", "bmi", "children", "smoker", "region"],
        "coefficients": [100.0, 0.0, 10.0, 0.0, 20000.0, 0.0],
        "intercept": 450.0,
        "preprocessing": { "kind": "ordinal" }
    }"#;

    struct Env {
        _dir: tempfile::TempDir,
        config: AppConfig,
    }

    fn setup() -> Env {
        let dir = tempdir().expect("Should create temp dir");
        let model_dir = dir.path().join("models");
        fs::create_dir(&model_dir).expect("Should create model dir");
        fs::write(model_dir.join("model.json"), MODEL_JSON).expect("Should write model");

        let config = AppConfig {
            db_path: dir.path().join("predictions.db"),
            model_path: model_dir,
            ..AppConfig::default()
        };
        Env { _dir: dir, config }
    }

    fn exec(env: &Env, args: &[&str]) -> Result<String> {
        let mut argv = vec!["insurance-cost"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).expect("Should parse args");
        let mut out = Vec::new();
        run(cli, &env.config, &mut out)?;
        Ok(String::from_utf8(out).expect("Should be utf-8"))
    }

    const PREDICT: [&str; 12] = [
        "predict", "--age", "25", "--sex", "male", "--bmi", "25", "--smoker", "no", "--region",
        "southwest", "--children=0",
    ];

    #[test]
    fn test_predict_saves_and_history_lists() {
        let env = setup();
        let output = exec(&env, &PREDICT).expect("Should predict");
        assert!(output.contains("₹ 3,200.00"));
        assert!(output.contains("Saved as record #1"));

        let history = exec(&env, &["history"]).expect("Should list");
        assert!(history.contains("southwest"));
        assert!(history.contains("Showing 1 of 1"));
    }

    #[test]
    fn test_predict_no_save_leaves_store_empty() {
        let env = setup();
        let mut args = PREDICT.to_vec();
        args.push("--no-save");
        let output = exec(&env, &args).expect("Should predict");
        assert!(output.contains("3,200.00"));
        assert!(output.contains("Not saved (--no-save)"));
        assert!(!output.contains("Saved as record"));

        let history = exec(&env, &["history"]).expect("Should list");
        assert!(history.contains("No predictions stored yet."));
    }

    #[test]
    fn test_unopenable_database_still_shows_estimate() {
        let mut env = setup();
        env.config.db_path = env.config.db_path.with_file_name("missing_dir").join("predictions.db");

        let output = exec(&env, &PREDICT).expect("Estimate should still be shown");
        assert!(output.contains("Estimated medical insurance cost: ₹ 3,200.00"));
        assert!(output.contains("Warning: prediction not saved:"));
        assert!(!output.contains("Saved as record"));
    }

    #[test]
    fn test_history_with_huge_offset() {
        let env = setup();
        exec(&env, &PREDICT).expect("Should predict");

        let offset = usize::MAX.to_string();
        let history = exec(&env, &["history", "--offset", &offset]).expect("Should list");
        assert!(history.contains("Showing 0 of 1 predictions"));

        let ascending = exec(&env, &["history", "--ascending", "--offset", &offset])
            .expect("Should list");
        assert!(ascending.contains("Showing 0 of 1 predictions"));
    }

    #[test]
    fn test_invalid_category_rejected() {
        let env = setup();
        let err = exec(
            &env,
            &[
                "predict", "--age", "25", "--sex", "other", "--bmi", "25", "--smoker", "no",
                "--region", "southwest",
            ],
        )
        .expect_err("Should fail");
        assert!(matches!(err, InsuranceError::InvalidCategory(_)));
    }

    #[test]
    fn test_missing_model_is_a_load_error() {
        let mut env = setup();
        env.config.model_path = env.config.model_path.join("absent.json");
        let err = exec(&env, &PREDICT).expect_err("Should fail");
        assert!(matches!(err, InsuranceError::ModelLoad(_)));
    }

    #[test]
    fn test_stats_export_and_clear() {
        let env = setup();
        exec(&env, &PREDICT).expect("Should predict");

        let stats = exec(&env, &["stats"]).expect("Should summarize");
        assert!(stats.contains("Total predictions: 1"));
        assert!(stats.contains("Smoker   no=1"));

        let json = exec(&env, &["stats", "--json"]).expect("Should summarize");
        let value: serde_json::Value = serde_json::from_str(&json).expect("Should be JSON");
        assert_eq!(value["count"], 1);

        let csv_text = exec(&env, &["export"]).expect("Should export");
        assert!(csv_text.starts_with("id,age,sex,bmi,children,smoker,region,predicted_cost,date_time\n"));
        assert!(csv_text.contains(",3200.00,"));

        assert!(matches!(
            exec(&env, &["clear"]),
            Err(InsuranceError::Validation(_))
        ));
        let cleared = exec(&env, &["clear", "--yes"]).expect("Should clear");
        assert!(cleared.contains("Deleted 1 predictions"));

        let stats = exec(&env, &["stats"]).expect("Should summarize");
        assert!(stats.contains("Average cost:      n/a"));
    }

    #[test]
    fn test_migrate_reports_schema() {
        let env = setup();
        let output = exec(&env, &["migrate"]).expect("Should migrate");
        assert!(output.contains(
            "Schema ready: id, age, sex, bmi, children, smoker, region, predicted_cost, date_time"
        ));
        assert!(output.contains("Records: 0"));
    }
}
