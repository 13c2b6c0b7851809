use crate::config::ComputeConfig;
use crate::core::naming::GroupNamingConvention;
use crate::core::retry::{retry_until, RetryPolicy};
use crate::domain::compute::{NodeMetadata, NodeStatus, Template};
use crate::domain::ports::ComputeServiceAdapter;
use crate::utils::error::{CloudError, NodeFailure, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;

/// Creates `count` nodes named into `group`, waits for them when the template
/// asks to, and reports partial failures with both sets.
pub async fn create_nodes_in_group<A>(
    adapter: &A,
    naming: &GroupNamingConvention,
    config: &ComputeConfig,
    group: &str,
    count: usize,
    template: &Template,
) -> Result<Vec<NodeMetadata>>
where
    A: ComputeServiceAdapter,
{
    naming.validate_group(group)?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let existing: HashSet<String> = adapter
        .list_nodes()
        .await?
        .iter()
        .map(|n| adapter.to_node_metadata(n).name)
        .collect();
    let names = naming.next_names(group, count, &existing)?;

    tracing::info!(group, count, hardware = %template.hardware.id, image = %template.image.id, "creating nodes");

    let policy = config.node_running_policy();
    let policy = &policy;
    let tasks: Vec<_> = names
        .into_iter()
        .map(|name| async move {
            let mut node_id = None;
            let outcome = create_one(adapter, group, &name, template, policy, &mut node_id).await;
            (name, node_id, outcome)
        })
        .collect();
    let outcomes: Vec<(String, Option<String>, Result<NodeMetadata>)> = stream::iter(tasks)
        .buffer_unordered(config.max_concurrent_operations.max(1))
        .collect()
        .await;

    let mut successful = Vec::new();
    let mut failures = Vec::new();
    for (name, node_id, outcome) in outcomes {
        match outcome {
            Ok(node) => successful.push(node),
            Err(e) => {
                tracing::error!(node = %name, id = ?node_id, error = %e, "node creation failed");
                failures.push(NodeFailure {
                    name,
                    node_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    if failures.is_empty() {
        tracing::info!(group, created = successful.len(), "nodes created");
        Ok(successful)
    } else {
        Err(CloudError::RunNodes {
            group: group.to_string(),
            successful,
            failures,
        })
    }
}

async fn create_one<A>(
    adapter: &A,
    group: &str,
    name: &str,
    template: &Template,
    policy: &RetryPolicy,
    node_id: &mut Option<String>,
) -> Result<NodeMetadata>
where
    A: ComputeServiceAdapter,
{
    tracing::debug!(node = name, ">> creating node");
    let created = adapter
        .create_node_with_group_encoded_into_name(group, name, template)
        .await?;
    tracing::debug!(node = name, id = %created.node_id, "<< created node");
    *node_id = Some(created.node_id.clone());

    let mut node = if template.options.block_until_running {
        wait_for_running(adapter, &created.node_id, policy).await?
    } else {
        adapter.to_node_metadata(&created.node)
    };

    if let Some(credentials) = created.credentials {
        node.credentials = Some(credentials);
    }
    if node.group.is_none() {
        node.group = Some(group.to_string());
    }
    Ok(node)
}

pub async fn wait_for_running<A>(adapter: &A, id: &str, policy: &RetryPolicy) -> Result<NodeMetadata>
where
    A: ComputeServiceAdapter,
{
    let description = format!("node {} to be running", id);
    retry_until(policy, &description, || async move {
        let Some(node) = adapter.get_node(id).await? else {
            return Ok(None);
        };
        let node = adapter.to_node_metadata(&node);
        match node.status {
            NodeStatus::Running => Ok(Some(node)),
            NodeStatus::Error | NodeStatus::Terminated => Err(CloudError::illegal_state(format!(
                "node {} entered status {} while starting",
                id, node.status
            ))),
            _ => Ok(None),
        }
    })
    .await
}

/// Waits until the node is gone or reports `Terminated`.
pub async fn wait_for_terminated<A>(adapter: &A, id: &str, policy: &RetryPolicy) -> Result<()>
where
    A: ComputeServiceAdapter,
{
    let description = format!("node {} to be terminated", id);
    retry_until(policy, &description, || async move {
        match adapter.get_node(id).await? {
            None => Ok(Some(())),
            Some(node) if adapter.to_node_metadata(&node).status == NodeStatus::Terminated => Ok(Some(())),
            Some(_) => Ok(None),
        }
    })
    .await
}
