use crate::cli::args::DiscoveryArgs;
use crate::exit_codes::{INTERNAL_ERROR, NO_ENGINES, SUCCESS};
use anyhow::Result;
use ucicheck_core::discover_engines;

pub fn run(args: DiscoveryArgs) -> Result<i32> {
    let includes = args.includes();
    let engines = match discover_engines(&args.dir, &includes, &args.exclude) {
        Ok(found) => found,
        Err(e) => {
            eprintln!("Config error: {e}");
            return Ok(INTERNAL_ERROR);
        }
    };
    if engines.is_empty() {
        eprintln!("No engines found in {}", args.dir.display());
        return Ok(NO_ENGINES);
    }
    for path in &engines {
        println!("{}", path.display());
    }
    Ok(SUCCESS)
}
