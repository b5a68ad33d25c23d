use std::{env, fs, path::PathBuf};

use headless::{
    models::{ItemDateRange, StructQueryParam},
    registry::SchemaRegistry,
    EngineType, HeadlessConfig, SqlBuilder,
};

fn usage() {
    eprintln!("Usage: print_sql <schema_dir> <request_json> [source_table]");
    eprintln!("Example: cargo run --example print_sql -- examples/schema examples/requests/pv_per_uv_by_city.json");
}

fn main() -> anyhow::Result<()> {
    headless::logging::init();

    let mut args = env::args().skip(1).collect::<Vec<_>>();
    if args.len() < 2 {
        usage();
        std::process::exit(1);
    }

    let schema_dir = PathBuf::from(args.remove(0));
    let request_path = PathBuf::from(args.remove(0));
    let source = args
        .first()
        .cloned()
        .unwrap_or_else(|| "select * from s2_pv_uv_statis".to_string());

    let registry = SchemaRegistry::load_from_dir(schema_dir)?;
    let request_str = fs::read_to_string(request_path)?;
    let request = StructQueryParam::from_json(&request_str)?;
    let available = env::var("AVAILABLE_RANGE").ok().and_then(|range| {
        range
            .split_once("..")
            .map(|(start, end)| ItemDateRange::new(start, end))
    });

    let builder = SqlBuilder::new(&HeadlessConfig::load_default());
    let clauses = builder.build(&registry, &request, available.as_ref())?;
    println!(
        "{}",
        builder.wrap_source(&clauses, &source, EngineType::Mysql, Some("8.0.32"))
    );
    Ok(())
}
