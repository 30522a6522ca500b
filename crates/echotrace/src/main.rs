use clap::Parser;

mod app;
mod cmd;
mod report;

fn main() -> anyhow::Result<()> {
    let args = cmd::Args::parse();
    app::run(&args)
}
