use serde::Serialize;

use delroute_core::{AdvisoryTtl, CancellationToken, Cid, Client, Multiaddr};

use crate::cli::ProvideArgs;
use crate::config;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ProvideOutput {
    advisory_ttl: AdvisoryTtl,
}

pub async fn run(
    args: &ProvideArgs,
    endpoint: &str,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let keys = args
        .cids
        .iter()
        .map(|raw| Cid::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;
    let ttl = AdvisoryTtl::parse(&args.ttl)?;
    let addrs = args
        .addrs
        .iter()
        .map(|raw| {
            raw.parse::<Multiaddr>()
                .map_err(|error| CliError::Config(format!("invalid multiaddr '{raw}': {error}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Without a seed the client reports the missing identity itself.
    let mut builder = Client::builder(endpoint);
    if let Some(keypair) = config::identity_from_env()? {
        let peer_id = keypair.public().to_peer_id();
        tracing::debug!(%peer_id, "loaded signing identity");
        builder = builder.with_identity(keypair).with_provider_info(peer_id, addrs);
    }
    let client = builder.build()?;

    let advisory = client
        .provide_bitswap(&keys, ttl.as_duration(), cancel)
        .await?;
    output::write_json_line(&ProvideOutput {
        advisory_ttl: AdvisoryTtl::new(advisory),
    })
}
