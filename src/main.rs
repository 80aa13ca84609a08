mod app;
mod cli;
mod device;
mod output;
mod prelude;
mod query;
mod setter;
mod window;

use tracing_subscriber::EnvFilter;

use crate::{
    cli::Args,
    device::{InverterApi, gateway::Gateway},
    prelude::*,
};

fn main() -> Result {
    // Logs go to stderr: stdout carries nothing but the JSON output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::load()?;
    let mut gateway = Gateway::connect(&args.connection)?;

    // The session must be closed on every exit path before the process
    // reports its status.
    let run_result = app::run(&mut gateway, &args);
    let disconnect_result = gateway.disconnect();

    let output = run_result?;
    disconnect_result?;

    output.write(args.output.as_deref())
}
