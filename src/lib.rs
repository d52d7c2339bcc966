pub mod cache;
pub mod cli;
pub mod compile;
pub mod config;
pub mod convert;
pub mod error;
pub mod io_utils;
pub mod mapper;
pub mod samples;
pub mod shape;
pub mod source;
pub mod table;
pub mod throughput;
pub mod value;

pub use error::MapError;
pub use mapper::{MapAll, Mapper, MapperOptions};
pub use shape::{Fields, Mappable};
pub use source::RowSource;
pub use value::Value;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::MapperConfig,
    convert::{Converter, ConverterTable, NamedConverters},
    samples::{Statement, TEN_COLUMNS, TenColumnRecord},
    source::CsvSource,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("rowmap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Trace(args) => handle_trace(&args),
        Commands::Map(args) => handle_map(&args),
        Commands::Bench(args) => {
            let mapper = load_mapper(args.config.as_deref())?;
            throughput::execute(&args, &mapper)
        }
    }
}

fn load_mapper(config: Option<&Path>) -> Result<Mapper> {
    let config = match config {
        Some(path) => {
            MapperConfig::load(path).with_context(|| format!("Loading config from {path:?}"))?
        }
        None => MapperConfig::default(),
    };
    let converters = ConverterTable::from_settings(&config.conversions);
    let delimiter = config.conversions.list_delimiter;
    let named = NamedConverters::new().with(
        "orders",
        Converter::new(move |value: &Value| {
            Ok(value
                .as_display()
                .split(delimiter)
                .map(|order| order.trim().to_string())
                .filter(|order| !order.is_empty())
                .collect::<Vec<_>>())
        }),
    );
    Ok(Mapper::with_options(MapperOptions {
        converters: Some(converters),
        named_converters: Some(named),
        unconfigured: config.unconfigured,
    }))
}

fn handle_trace(args: &cli::TraceArgs) -> Result<()> {
    let mapper = load_mapper(args.config.as_deref())?;
    mapper
        .configure::<Statement>()
        .context("Configuring the statement shape")?;
    mapper
        .configure::<TenColumnRecord>()
        .context("Configuring the ten-column shape")?;

    let headers = vec!["shape".to_string(), "binding".to_string()];
    let mut rows = Vec::new();
    for (shape, trace) in mapper.cache().traces() {
        for line in trace.lines() {
            rows.push(vec![shape.clone(), line.to_string()]);
        }
    }
    table::print_table(&headers, &rows);
    info!(
        "Compiled {} shape(s) in {} compilation(s)",
        mapper.cache().len(),
        mapper.cache().compilations()
    );
    Ok(())
}

fn handle_map(args: &cli::MapArgs) -> Result<()> {
    let mapper = load_mapper(args.config.as_deref())?;
    mapper
        .configure::<TenColumnRecord>()
        .context("Configuring the ten-column shape")?;
    info!("Mapping rows of {:?}", args.input);

    let mut source = CsvSource::from_path(&args.input, args.delimiter)?;
    let limit = args.limit.unwrap_or(usize::MAX);
    let mut rows = Vec::new();
    for (idx, record) in mapper
        .map_all::<TenColumnRecord, _>(&mut source)
        .take(limit)
        .enumerate()
    {
        let record = record.with_context(|| format!("Mapping data row {}", idx + 1))?;
        rows.push(record.values.to_vec());
    }

    let headers = TEN_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    info!("Mapped {} row(s) from {:?}", rows.len(), args.input);
    Ok(())
}
