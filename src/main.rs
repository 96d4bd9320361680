use anyhow::{anyhow, Context};
use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use navo_query::apis::registry::format_registry_row;
use navo_query::constants::get_supported_service_types;
use navo_query::coords::{CoordList, RadiusArg};
use navo_query::display::{render_table, table_to_json};
use navo_query::{
    logging, observability, Config, ConeOptions, RegistryFilter, ServiceDescriptor, ServiceSet,
    VoClient, VoTable,
};

#[derive(Parser)]
#[command(name = "navo_query")]
#[command(about = "Query Virtual Observatory cone, image, spectral, TAP and registry services")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $NAVO_CONFIG, then ./navo.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of text tables
    #[arg(long, global = true)]
    json: bool,

    /// Print Prometheus metrics on exit
    #[arg(long, global = true)]
    metrics: bool,

    /// Directory for the rolling JSON log file
    #[arg(long, global = true, default_value = "logs")]
    log_dir: String,

    /// Rows shown per table in text output
    #[arg(long, global = true)]
    max_rows: Option<usize>,

    /// Merge the per-service, per-position results into one table
    #[arg(long, global = true)]
    stack: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simple Cone Search around one or more positions
    Cone {
        /// Position: "ra,dec", "hh:mm:ss +dd:mm:ss" or an object name (repeatable)
        #[arg(long = "coords", short = 'c', required = true, allow_hyphen_values = true)]
        coords: Vec<String>,
        /// Radius in degrees, or a comma-separated list with one per position
        #[arg(long, short = 'r')]
        radius: RadiusArg,
        /// Service access URL (repeatable); omitted means ask the registry
        #[arg(long = "service", short = 's')]
        services: Vec<String>,
        #[arg(long)]
        max_services: Option<usize>,
        /// Registry keyword filter used when no service is given
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        waveband: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Simple Image Access search
    Image {
        #[arg(long = "service", short = 's', required = true)]
        services: Vec<String>,
        #[arg(long = "coords", short = 'c', required = true, allow_hyphen_values = true)]
        coords: Vec<String>,
        #[arg(long, short = 'r')]
        radius: Option<RadiusArg>,
        /// FITS, JPEG, PNG, GRAPHICS or ALL
        #[arg(long, short = 'f')]
        format: Option<String>,
    },
    /// Simple Spectral Access search
    Spectra {
        #[arg(long = "service", short = 's', required = true)]
        services: Vec<String>,
        #[arg(long = "coords", short = 'c', required = true, allow_hyphen_values = true)]
        coords: Vec<String>,
        #[arg(long, short = 'r')]
        radius: Option<RadiusArg>,
        #[arg(long, short = 'f')]
        format: Option<String>,
    },
    /// Synchronous ADQL query against a TAP service
    Tap {
        /// TAP base URL
        #[arg(long, short = 's')]
        service: String,
        /// ADQL text
        #[arg(long, short = 'q')]
        query: String,
        #[arg(long)]
        maxrec: Option<u64>,
    },
    /// Find services in the RegTAP registry
    Registry {
        #[arg(long, short = 't', value_parser = PossibleValuesParser::new(get_supported_service_types()))]
        service_type: Option<String>,
        #[arg(long, short = 'k')]
        keyword: Option<String>,
        #[arg(long, short = 'w')]
        waveband: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        order_by: Option<String>,
        /// Join constraints with OR instead of AND
        #[arg(long)]
        any: bool,
    },
    /// Resolve an object name to coordinates
    Resolve { name: String },
}

fn service_set(urls: Vec<String>) -> ServiceSet {
    ServiceSet(urls.into_iter().map(ServiceDescriptor::new).collect())
}

fn coord_list(coords: Vec<String>) -> CoordList {
    CoordList::from(coords)
}

/// How results are written to stdout.
#[derive(Clone, Copy)]
struct Output {
    json: bool,
    stack: bool,
    max_rows: Option<usize>,
}

fn print_tables(tables: Vec<VoTable>, out: Output) -> anyhow::Result<()> {
    let tables = if out.stack && tables.len() > 1 {
        vec![VoTable::vstack(tables)?]
    } else {
        tables
    };
    if out.json {
        let values: Vec<_> = tables.iter().map(table_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }
    for (index, table) in tables.iter().enumerate() {
        println!("=== result {} of {} ===", index + 1, tables.len());
        print!("{}", render_table(table, out.max_rows));
        println!();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(&cli.log_dir);

    if cli.metrics {
        observability::init().map_err(|e| anyhow!("failed to install metrics recorder: {}", e))?;
    }

    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let client = VoClient::new(config)?;
    info!(command = ?std::env::args().nth(1), "navo_query starting");

    let out = Output {
        json: cli.json,
        stack: cli.stack,
        max_rows: cli.max_rows,
    };

    match cli.command {
        Commands::Cone {
            coords,
            radius,
            services,
            max_services,
            keyword,
            waveband,
            source,
        } => {
            let services = (!services.is_empty()).then(|| service_set(services));
            let options = ConeOptions {
                max_services,
                registry: RegistryFilter {
                    keyword,
                    waveband,
                    source,
                    ..RegistryFilter::default()
                },
            };
            let tables = client
                .cone()
                .query_with(coord_list(coords), radius, services, &options)
                .await?;
            print_tables(tables, out)?;
        }
        Commands::Image {
            services,
            coords,
            radius,
            format,
        } => {
            let tables = client
                .image()
                .query(service_set(services), coord_list(coords), radius, format.as_deref())
                .await?;
            let tables: Vec<VoTable> = tables.into_iter().map(|t| t.into_inner()).collect();
            print_tables(tables, out)?;
        }
        Commands::Spectra {
            services,
            coords,
            radius,
            format,
        } => {
            let tables = client
                .spectra()
                .query(service_set(services), coord_list(coords), radius, format.as_deref())
                .await?;
            print_tables(tables, out)?;
        }
        Commands::Tap {
            service,
            query,
            maxrec,
        } => {
            let table = client
                .tap()
                .query_with(&ServiceDescriptor::new(service), &query, maxrec)
                .await?;
            print_tables(vec![table], out)?;
        }
        Commands::Registry {
            service_type,
            keyword,
            waveband,
            source,
            order_by,
            any,
        } => {
            let filter = RegistryFilter {
                service_type,
                keyword,
                waveband,
                source,
                order_by,
                logic: if any { " or " } else { " and " }.to_string(),
            };
            let table = client.registry().query(&filter).await?;
            if out.json {
                print_tables(vec![table], out)?;
            } else {
                if table.is_empty() {
                    warn!("registry returned no services");
                }
                for row in table.iter_rows() {
                    println!("{}", format_registry_row(&row));
                }
                println!("Found {} services", table.len());
            }
        }
        Commands::Resolve { name } => {
            let resolver = client
                .resolver()
                .ok_or_else(|| anyhow!("no name resolver configured"))?;
            let position = resolver.resolve(&name).await?;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&position)?);
            } else {
                println!("{}: ra={} dec={}", name, position.ra_deg, position.dec_deg);
            }
        }
    }

    if cli.metrics {
        if let Some(rendered) = observability::render() {
            println!("{}", rendered);
        }
    }
    Ok(())
}
