use super::args::*;

pub mod list;
pub mod render;
pub mod run;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args),
        Command::List(args) => list::run(args),
        Command::Render(args) => render::run(args),
    }
}
