use anyhow::{Context, Result};
use serde_json::json;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt::format::Format, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use photogeo_processor::exif_parser::{embedded_exif, flatten_metadata};
use photogeo_processor::{
    Database, IngestRequest, Ingestor, LocalFetcher, PhotoRecord, RecordSummary, SearchQuery, Settings,
};

const HELP: &str = "\
photogeo - photo GPS extraction and budgeted JPEG storage

USAGE:
  photogeo [--config PATH] <COMMAND> [ARGS]

COMMANDS:
  inspect <FILE>                            Print resolved location, timestamp and metadata
  compress <FILE> <OUT> [--budget BYTES]    Re-encode as JPEG under a byte budget
  ingest <PATH> --key KEY [--lon X --lat Y] Store a photo from the source directory
  scan <FOLDER> [--key KEY]                 Ingest every supported image in a folder
  search --key KEY | --lon X --lat Y [--radius METERS]
  show <ID>                                 Print a stored record
  export <ID> <OUT>                         Write a stored record's JPEG
  config [--write]                          Print effective settings, or save them
";

fn init_tracing(default_level: &str) {
    let console_fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .event_format(Format::default().compact().with_target(false));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(console_fmt)
        .init();
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn finish(args: pico_args::Arguments) -> Result<()> {
    let rest: Vec<OsString> = args.finish();
    if !rest.is_empty() {
        anyhow::bail!("unexpected arguments: {:?}\n\n{HELP}", rest);
    }
    Ok(())
}

fn open_store(settings: &Settings) -> Result<Database> {
    let db = Database::new();
    let loaded = db
        .load_from_disk(&settings.store_path)
        .with_context(|| format!("Failed to load record store {}", settings.store_path.display()))?;
    if !loaded {
        tracing::info!(path = %settings.store_path.display(), "starting with an empty record store");
    }
    Ok(db)
}

fn save_store(db: &Database, settings: &Settings) -> Result<()> {
    db.save_to_disk(&settings.store_path)
        .with_context(|| format!("Failed to save record store {}", settings.store_path.display()))
}

fn inspect(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let file: PathBuf = args.free_from_str().context("inspect needs a file")?;
    finish(args)?;

    let bytes = std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
    let resolution = settings.pipeline().resolve_location_and_timestamp(&bytes, None);
    print_json(&json!({
        "file": file,
        "location": resolution.location,
        "captured_at": resolution.captured_at,
        "metadata": flatten_metadata(&bytes),
    }))
}

fn compress(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let budget: Option<usize> = args.opt_value_from_str("--budget")?;
    let input: PathBuf = args.free_from_str().context("compress needs an input file")?;
    let output: PathBuf = args.free_from_str().context("compress needs an output file")?;
    finish(args)?;

    let bytes = std::fs::read(&input).with_context(|| format!("Failed to read {}", input.display()))?;
    let exif = embedded_exif(&bytes);
    let budget = budget.unwrap_or(settings.max_image_size_bytes);
    let result = settings
        .compressor()
        .compress_to_budget(&bytes, budget, exif.as_deref())
        .with_context(|| format!("Failed to compress {}", input.display()))?;
    std::fs::write(&output, &result.bytes).with_context(|| format!("Failed to write {}", output.display()))?;

    print_json(&json!({
        "output": output,
        "size_bytes": result.bytes.len(),
        "budget_bytes": budget,
        "within_budget": result.bytes.len() <= budget,
        "exif_preserved": exif.is_some(),
        "result": result,
    }))
}

fn ingest(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let key: String = args.value_from_str("--key")?;
    let lon: Option<f64> = args.opt_value_from_str("--lon")?;
    let lat: Option<f64> = args.opt_value_from_str("--lat")?;
    let path: String = args.free_from_str().context("ingest needs a path relative to the source directory")?;
    finish(args)?;

    let db = open_store(settings)?;
    let ingestor = Ingestor::new(settings, LocalFetcher::new(&settings.source_base_path), db.clone());
    let record = ingestor.ingest(&IngestRequest { key, path, lon, lat })?;
    save_store(&db, settings)?;
    print_json(&record.summary())
}

fn scan(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let key: Option<String> = args.opt_value_from_str("--key")?;
    let folder: PathBuf = args.free_from_str().context("scan needs a folder")?;
    finish(args)?;

    let db = open_store(settings)?;
    let ingestor = Ingestor::new(settings, LocalFetcher::new(&folder), db.clone());
    let stats = ingestor.scan_folder(&folder, key.as_deref())?;
    save_store(&db, settings)?;
    println!("{stats}");
    Ok(())
}

fn search(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let query = SearchQuery {
        key: args.opt_value_from_str("--key")?,
        lon: args.opt_value_from_str("--lon")?,
        lat: args.opt_value_from_str("--lat")?,
        radius_m: args.opt_value_from_str("--radius")?,
    };
    finish(args)?;

    let db = open_store(settings)?;
    let ingestor = Ingestor::new(settings, LocalFetcher::new(&settings.source_base_path), db);
    let records = ingestor.search(&query)?;

    let center = query.lon.zip(query.lat).and_then(|(lon, lat)| photogeo_processor::GeoCoordinate::new(lon, lat));
    let summaries: Vec<RecordSummary> = records
        .iter()
        .map(|r: &PhotoRecord| {
            let mut summary = r.summary();
            if query.key.is_none() {
                summary.distance_m = center.map(|c| c.distance_m(&r.location));
            }
            summary
        })
        .collect();
    print_json(&summaries)
}

fn show(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let id: String = args.free_from_str().context("show needs a record id")?;
    finish(args)?;

    let db = open_store(settings)?;
    let ingestor = Ingestor::new(settings, LocalFetcher::new(&settings.source_base_path), db);
    print_json(&ingestor.get(&id)?.summary())
}

fn export(mut args: pico_args::Arguments, settings: &Settings) -> Result<()> {
    let id: String = args.free_from_str().context("export needs a record id")?;
    let output: PathBuf = args.free_from_str().context("export needs an output file")?;
    finish(args)?;

    let db = open_store(settings)?;
    let ingestor = Ingestor::new(settings, LocalFetcher::new(&settings.source_base_path), db);
    let record = ingestor.get(&id)?;
    std::fs::write(&output, &record.data).with_context(|| format!("Failed to write {}", output.display()))?;

    print_json(&json!({
        "id": record.id,
        "output": output,
        "mime_type": record.mime_type,
        "size_bytes": record.data.len(),
    }))
}

fn config(mut args: pico_args::Arguments, settings: &Settings, config_path: &Path) -> Result<()> {
    let write = args.contains("--write");
    finish(args)?;

    if write {
        settings.save_to(config_path)?;
        tracing::info!(path = %config_path.display(), "settings saved");
    }
    print_json(&json!({
        "config_path": config_path,
        "settings": settings,
    }))
}

fn main() -> Result<()> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let config_path: PathBuf = args
        .opt_value_from_str("--config")?
        .unwrap_or_else(photogeo_processor::utils::get_config_path);
    let settings = Settings::load_from(&config_path)?;
    init_tracing(&settings.log_level);

    let Some(command) = args.subcommand()? else {
        print!("{HELP}");
        return Ok(());
    };

    match command.as_str() {
        "inspect" => inspect(args, &settings),
        "compress" => compress(args, &settings),
        "ingest" => ingest(args, &settings),
        "scan" => scan(args, &settings),
        "search" => search(args, &settings),
        "show" => show(args, &settings),
        "export" => export(args, &settings),
        "config" => config(args, &settings, &config_path),
        other => anyhow::bail!("unknown command '{other}'\n\n{HELP}"),
    }
}
