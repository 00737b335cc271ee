use cdefgen::cli::{Args, initialize};
use cdefgen::{request, synthesize_header};
use clap::Parser;
use std::io::Write as _;
use tracing::{error, info};

fn main() {
    let args = Args::parse();
    let config = match initialize(&args) {
        Ok(Some(config)) => config,
        Ok(None) => return,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    cdefgen_core::logging::init(config.verbose);
    config.validate();

    if let Err(e) = run(&args, &config) {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(
    args: &Args,
    config: &cdefgen_core::config::Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(request) = request(args, config) else {
        return Err("no header given".into());
    };
    let declarations = synthesize_header(config, &request)?;
    match &args.output {
        Some(path) => {
            declarations.materialize(path)?;
            info!("Wrote {} declarations to {}", declarations.len(), path.display());
        }
        None => std::io::stdout().lock().write_all(declarations.to_string().as_bytes())?,
    }
    Ok(())
}
