//! `dm ping` command implementation

use crate::error::Result;
use dm_common::types::ClusterEndpoint;
use dm_engine::TransferService;

/// Check connectivity and print the cluster identity
pub async fn run(service: &TransferService, endpoint: &ClusterEndpoint) -> Result<()> {
    let client = service.connect(endpoint)?;
    client.ping().await?;
    let info = client.cluster_info().await?;

    println!("Connected to {}", endpoint);
    println!("  URL:      {}", endpoint.base_url());
    println!("  Cluster:  {} ({})", info.cluster_name, info.cluster_uuid);
    println!(
        "  Version:  {} {}",
        info.distribution.as_deref().unwrap_or("unknown"),
        info.version
    );
    if let Some(lucene) = &info.lucene_version {
        println!("  Lucene:   {}", lucene);
    }

    Ok(())
}
