use anyhow::{bail, Result};
use clap::Parser;
use nl2sql_refiner::config::{DbConfig, LlmConfig};
use nl2sql_refiner::db::connect_options;
use nl2sql_refiner::schema::SchemaDescriptor;
use nl2sql_refiner::{LlmClient, Pipeline, PostgresSource, SessionContext};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Answer analytics questions over your data with corrected, read-only SQL")]
struct Args {
    /// The question in natural language
    question: String,

    /// SQLite database file, opened read-only
    #[arg(long, conflicts_with_all = ["csv", "excel", "database_url"])]
    sqlite: Option<PathBuf>,

    /// CSV file, loaded as `uploaded_table`
    #[arg(long, conflicts_with_all = ["excel", "database_url"])]
    csv: Option<PathBuf>,

    /// Excel workbook (.xlsx, .xls); the first sheet is loaded as `uploaded_table`
    #[arg(long, conflicts_with = "database_url")]
    excel: Option<PathBuf>,

    /// Postgres URL; without any source flag, DB_* environment variables are used
    #[arg(long)]
    database_url: Option<String>,

    /// DeepSeek API key (or set DEEPSEEK_API_KEY env var)
    #[arg(long)]
    api_key: Option<String>,

    /// Skip the narrative analysis of the results
    #[arg(long)]
    skip_analysis: bool,

    /// Print extracted entities and value matches
    #[arg(long)]
    show_entities: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let llm_config = LlmConfig::from_env(args.api_key.clone())?;
    let max_turns = llm_config.max_turns;
    let llm = Arc::new(LlmClient::new(llm_config)?);

    let descriptor = match (&args.sqlite, &args.csv, &args.excel, &args.database_url) {
        (Some(path), _, _, _) => SchemaDescriptor::from_sqlite(path).await?,
        (_, Some(path), _, _) => SchemaDescriptor::from_csv(path).await?,
        (_, _, Some(path), _) => SchemaDescriptor::from_excel(path).await?,
        (_, _, _, Some(url)) => {
            SchemaDescriptor::from_source(Arc::new(PostgresSource::connect(url).await?)).await?
        }
        (None, None, None, None) => {
            let options = connect_options(&DbConfig::from_env()?);
            SchemaDescriptor::from_source(Arc::new(PostgresSource::connect_with(options).await?))
                .await?
        }
    };
    info!("Schema loaded from {} source", descriptor.source.name());

    let mut pipeline = Pipeline::new(llm);
    if args.skip_analysis {
        pipeline = pipeline.without_analysis();
    }

    let mut ctx = SessionContext::new(max_turns);
    let report = pipeline
        .run(
            &args.question,
            &descriptor.schema,
            descriptor.source.as_ref(),
            &mut ctx,
        )
        .await?;

    println!("\n=== Generated SQL ===\n{}", report.generated_sql);

    if args.show_entities {
        println!("\n=== Extracted Entities ({:?}) ===", report.correction.extraction.outcome);
        for entity in &report.correction.extraction.entities {
            println!("{}|{}|{}", entity.table, entity.column, entity.value);
        }
        println!("\n=== Value Matches ===");
        for m in &report.correction.matches {
            println!("{} -> {} ({})", m.original_value, m.matched_value, m.score);
        }
    }

    if report.correction.refinement.was_rewritten() {
        println!("\n=== Refined SQL ===\n{}", report.final_sql());
    }

    if !report.execution.success {
        let message = report.execution.error.clone().unwrap_or_default();
        error!("SQL execution failed: {}", message);
        bail!("SQL execution failed: {}", message);
    }

    println!(
        "\n=== Results ({} rows) ===\n{}",
        report.execution.row_count(),
        report.execution.formatted
    );

    if let Some(analysis) = &report.analysis {
        println!("\n=== Analysis ===\n{}", analysis.text);
    }

    Ok(())
}
