use delroute_core::{CancellationToken, Cid, Client, Iter};

use crate::cli::ProvidersArgs;
use crate::error::CliError;
use crate::output;

pub async fn run(
    args: &ProvidersArgs,
    endpoint: &str,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let key = Cid::parse(&args.cid)?;

    let mut builder = Client::builder(endpoint);
    if args.batch_only {
        builder = builder.with_batch_results_only();
    }
    let client = builder.build()?;

    let mut providers = client.find_providers(&key, cancel).await?;
    let mut count = 0usize;
    while let Some(record) = providers.next().await {
        output::write_json_line(&record?)?;
        count += 1;
    }

    tracing::info!(cid = %key, count, "lookup finished");
    Ok(())
}
