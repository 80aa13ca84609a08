//! The invocation pipeline: setters first, then the settle delay, then the
//! queries, aggregated into one [`Output`].

use chrono::Local;

use crate::{cli::Args, device, device::InverterApi, output::Output, prelude::*, query, setter};

/// Run one full invocation against an open device connection.
///
/// Setters go first so that queries in the same invocation observe the new
/// state; a settle delay bridges the device's propagation time when
/// anything was set. Every failure aborts the remaining work, there is no
/// partial output.
pub fn run<A: InverterApi + ?Sized>(api: &mut A, args: &Args) -> Result<Output> {
    let mut output = Output::default();

    output.set = setter::run_setters(api, &args.set_commands())?;

    if !args.query.is_empty() {
        if output.set.is_some() {
            device::wait_until_applied(args.connection.kind());
        }
        let now = Local::now();
        let collected = query::run_queries(api, &args.query, &now)?;
        if !collected.is_empty() {
            output.query = Some(collected);
        }
    }

    Ok(output)
}
