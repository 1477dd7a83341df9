//! Replaying index settings, mappings and aliases onto a target

use crate::cluster::ClusterClient;
use crate::error::{ClusterContext, ClusterError, Result, TransferError};
use dm_common::types::{AliasDefinition, IndexDescriptor, TransferOptions};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// What happened when the target index was created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    /// The index was already there; documents are written into it as-is
    AlreadyExisted,
    /// Neither settings nor mappings were requested
    Skipped,
}

/// Copies index metadata according to the operation's include flags
#[derive(Debug, Clone, Copy)]
pub struct IndexReplicator {
    include_settings: bool,
    include_mappings: bool,
    include_aliases: bool,
}

impl IndexReplicator {
    pub fn new(options: &TransferOptions) -> Self {
        Self {
            include_settings: options.include_settings,
            include_mappings: options.include_mappings,
            include_aliases: options.include_aliases,
        }
    }

    /// Read the requested metadata of `index` from the source
    ///
    /// Settings and mappings failures are fatal. Alias lookups only fail the
    /// operation when the source is unreachable.
    pub async fn capture(&self, source: &dyn ClusterClient, index: &str) -> Result<IndexDescriptor> {
        let mut descriptor = IndexDescriptor::new(index);

        if self.include_settings {
            descriptor.settings = source
                .get_settings(index)
                .await
                .during(|| format!("Reading settings of index {index}"))?;
        }

        if self.include_mappings {
            descriptor.mappings = source
                .get_mappings(index)
                .await
                .during(|| format!("Reading mappings of index {index}"))?;
        }

        if self.include_aliases {
            descriptor.aliases = match source.get_aliases(index).await {
                Ok(aliases) => aliases,
                Err(e) if e.is_connectivity() => {
                    return Err(TransferError::from_cluster(
                        e,
                        format!("Reading aliases of index {index}"),
                    ))
                }
                Err(e) => {
                    let fault = TransferError::NonFatalMetadata(format!(
                        "Could not read aliases of index {index}: {e}"
                    ));
                    warn!(index = %index, error = %fault, "Skipping alias replication");
                    BTreeMap::new()
                }
            };
        }

        Ok(descriptor)
    }

    /// Create the target index from the requested parts of `descriptor`
    pub async fn create_index(
        &self,
        target: &dyn ClusterClient,
        descriptor: &IndexDescriptor,
    ) -> Result<IndexCreation> {
        let settings = descriptor.settings.as_ref().filter(|_| self.include_settings);
        let mappings = descriptor.mappings.as_ref().filter(|_| self.include_mappings);
        if settings.is_none() && mappings.is_none() {
            return Ok(IndexCreation::Skipped);
        }

        let index = &descriptor.name;
        match target.create_index(index, settings, mappings).await {
            Ok(()) => {
                info!(index = %index, "Created target index");
                Ok(IndexCreation::Created)
            }
            Err(ClusterError::IndexAlreadyExists(_)) => {
                let fault = TransferError::NonFatalMetadata(format!(
                    "index {index} already exists on target"
                ));
                warn!(index = %index, error = %fault, "Writing into existing index");
                Ok(IndexCreation::AlreadyExisted)
            }
            Err(e) => Err(TransferError::from_cluster(
                e,
                format!("Creating index {index} on target"),
            )),
        }
    }

    /// Create each alias on the target index; returns how many succeeded
    ///
    /// A failing alias is logged and skipped.
    pub async fn replicate_aliases(
        &self,
        target: &dyn ClusterClient,
        index: &str,
        aliases: &BTreeMap<String, AliasDefinition>,
    ) -> usize {
        if !self.include_aliases || aliases.is_empty() {
            return 0;
        }

        let mut created = 0;
        for (alias, definition) in aliases {
            match target.put_alias(index, alias, definition).await {
                Ok(()) => {
                    debug!(index = %index, alias = %alias, "Created alias");
                    created += 1;
                }
                Err(e) => {
                    let fault = TransferError::NonFatalMetadata(format!(
                        "Failed to create alias {alias} on index {index}: {e}"
                    ));
                    warn!(index = %index, alias = %alias, error = %fault, "Alias not replicated");
                }
            }
        }

        info!(index = %index, created, total = aliases.len(), "Replicated aliases");
        created
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cluster::{FaultPoint, MemoryCluster};
    use serde_json::json;

    fn source() -> MemoryCluster {
        let cluster = MemoryCluster::named("source");
        cluster.seed_index(
            "logs",
            Some(json!({"index": {"number_of_shards": "2"}})),
            Some(json!({"properties": {"msg": {"type": "text"}}})),
        );
        cluster.seed_alias(
            "logs",
            "logs-read",
            AliasDefinition {
                search_routing: Some("1".into()),
                ..Default::default()
            },
        );
        cluster
    }

    #[tokio::test]
    async fn test_capture_and_create() {
        let source = source();
        let target = MemoryCluster::named("target");
        let replicator = IndexReplicator::new(&TransferOptions::default());

        let descriptor = replicator.capture(&source, "logs").await.unwrap();
        assert_eq!(descriptor.aliases.len(), 1);

        let created = replicator.create_index(&target, &descriptor).await.unwrap();
        assert_eq!(created, IndexCreation::Created);
        assert_eq!(target.descriptor("logs").unwrap().settings, descriptor.settings);

        let again = replicator.create_index(&target, &descriptor).await.unwrap();
        assert_eq!(again, IndexCreation::AlreadyExisted);
    }

    #[tokio::test]
    async fn test_flags_limit_what_is_copied() {
        let source = source();
        let options = TransferOptions {
            include_settings: false,
            include_mappings: false,
            include_aliases: false,
            ..Default::default()
        };
        let replicator = IndexReplicator::new(&options);

        let descriptor = replicator.capture(&source, "logs").await.unwrap();
        assert_eq!(descriptor, IndexDescriptor::new("logs"));

        let target = MemoryCluster::named("target");
        assert_eq!(
            replicator.create_index(&target, &descriptor).await.unwrap(),
            IndexCreation::Skipped
        );
        assert_eq!(target.stats().create_index_calls, 0);
    }

    #[tokio::test]
    async fn test_other_create_failures_are_fatal() {
        let source = source();
        let target = MemoryCluster::named("target");
        target.fail_on(FaultPoint::CreateIndex);
        let replicator = IndexReplicator::new(&TransferOptions::default());

        let descriptor = replicator.capture(&source, "logs").await.unwrap();
        let err = replicator.create_index(&target, &descriptor).await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Creating index logs on target"));
    }

    #[tokio::test]
    async fn test_alias_failures_do_not_stop_the_rest() {
        let target = MemoryCluster::named("target");
        target.seed_index("logs", None, None);
        // an index named like the alias makes that alias invalid
        target.seed_index("clash", None, None);

        let mut aliases = BTreeMap::new();
        aliases.insert("clash".to_string(), AliasDefinition::default());
        aliases.insert("logs-read".to_string(), AliasDefinition::default());

        let replicator = IndexReplicator::new(&TransferOptions::default());
        let created = replicator.replicate_aliases(&target, "logs", &aliases).await;

        assert_eq!(created, 1);
        assert!(target.descriptor("logs").unwrap().aliases.contains_key("logs-read"));
    }

    #[tokio::test]
    async fn test_alias_read_failure_is_tolerated() {
        let source = source();
        source.fail_on(FaultPoint::GetAliases);
        let replicator = IndexReplicator::new(&TransferOptions::default());

        let descriptor = replicator.capture(&source, "logs").await.unwrap();
        assert!(descriptor.aliases.is_empty());
        assert!(descriptor.settings.is_some());
    }

    #[tokio::test]
    async fn test_settings_and_mappings_read_failures_are_fatal() {
        let replicator = IndexReplicator::new(&TransferOptions::default());

        let no_settings = source();
        no_settings.fail_on(FaultPoint::GetSettings);
        let err = replicator.capture(&no_settings, "logs").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Reading settings of index logs"));

        let no_mappings = source();
        no_mappings.fail_on(FaultPoint::GetMappings);
        let err = replicator.capture(&no_mappings, "logs").await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("Reading mappings of index logs"));
    }
}
