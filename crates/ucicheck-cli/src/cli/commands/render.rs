use crate::cli::args::RenderArgs;
use crate::exit_codes::SUCCESS;
use anyhow::{Context, Result};
use ucicheck_core::report::{read_json, render_markdown, write_markdown};

pub fn run(args: RenderArgs) -> Result<i32> {
    let reports = read_json(&args.json)
        .with_context(|| format!("failed to load report {}", args.json.display()))?;
    match &args.md {
        Some(out) => {
            write_markdown(&reports, out, args.detail_max_len)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Markdown report: {}", out.display());
        }
        None => print!("{}", render_markdown(&reports, args.detail_max_len)),
    }
    Ok(SUCCESS)
}
