use crate::config::ComputeConfig;
use crate::core::create_nodes::{self, wait_for_terminated};
use crate::core::naming::GroupNamingConvention;
use crate::domain::compute::{Hardware, Image, NodeMetadata, Template};
use crate::domain::location::Location;
use crate::domain::ports::{ComputeService, ComputeServiceAdapter, NodePredicate};
use crate::domain::template::TemplateBuilder;
use crate::utils::error::Result;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// Portable compute service over any provider adapter.
pub struct AdapterComputeService<A> {
    adapter: A,
    naming: GroupNamingConvention,
    config: ComputeConfig,
}

#[derive(Debug, Clone, Copy)]
enum NodeAction {
    Reboot,
    Resume,
    Suspend,
}

impl<A: ComputeServiceAdapter> AdapterComputeService<A> {
    pub fn new(adapter: A, config: ComputeConfig) -> Self {
        Self {
            adapter,
            naming: GroupNamingConvention::new(config.max_name_attempts),
            config,
        }
    }

    pub fn with_naming(mut self, naming: GroupNamingConvention) -> Self {
        self.naming = naming;
        self
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    async fn apply(&self, action: NodeAction, id: &str) -> Result<()> {
        tracing::debug!(node = id, ?action, ">> node action");
        match action {
            NodeAction::Reboot => self.adapter.reboot_node(id).await?,
            NodeAction::Resume => self.adapter.resume_node(id).await?,
            NodeAction::Suspend => self.adapter.suspend_node(id).await?,
        }
        tracing::debug!(node = id, ?action, "<< node action");
        Ok(())
    }

    /// Runs `op` over every matching node, bounded by the configured concurrency.
    /// Failures are logged and left out of the returned set.
    async fn for_each_matching<'a, F, Fut>(
        &'a self,
        filter: NodePredicate<'_>,
        op: F,
    ) -> Result<Vec<NodeMetadata>>
    where
        F: Fn(NodeMetadata) -> Fut,
        Fut: Future<Output = Result<NodeMetadata>> + Send + 'a,
    {
        let matching: Vec<NodeMetadata> = self.list_nodes().await?.into_iter().filter(|n| filter(n)).collect();
        let tasks: Vec<Fut> = matching.into_iter().map(op).collect();
        let outcomes: Vec<Result<NodeMetadata>> = stream::iter(tasks)
            .buffer_unordered(self.config.max_concurrent_operations.max(1))
            .collect()
            .await;

        let mut done = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(node) => done.push(node),
                Err(e) => tracing::warn!(error = %e, "bulk node operation failed"),
            }
        }
        Ok(done)
    }

    async fn act_on_matching(&self, action: NodeAction, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        self.for_each_matching(filter, |node| async move {
            self.apply(action, &node.id).await?;
            let refreshed = self.get_node_metadata(&node.id).await?;
            Ok(refreshed.unwrap_or(node))
        })
        .await
    }
}

#[async_trait]
impl<A: ComputeServiceAdapter> ComputeService for AdapterComputeService<A> {
    async fn list_hardware_profiles(&self) -> Result<Vec<Hardware>> {
        let hardware = self.adapter.list_hardware_profiles().await?;
        Ok(hardware.iter().map(|h| self.adapter.to_hardware(h)).collect())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let images = self.adapter.list_images().await?;
        Ok(images.iter().map(|i| self.adapter.to_image(i)).collect())
    }

    async fn list_assignable_locations(&self) -> Result<Vec<Location>> {
        let locations = self.adapter.list_locations().await?;
        Ok(locations.iter().map(|l| self.adapter.to_location(l)).collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeMetadata>> {
        let nodes = self.adapter.list_nodes().await?;
        Ok(nodes
            .iter()
            .map(|n| {
                let mut node = self.adapter.to_node_metadata(n);
                if node.group.is_none() {
                    node.group = self.naming.group_in_unique_name_or_none(&node.name);
                }
                node
            })
            .collect())
    }

    async fn list_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        Ok(self.list_nodes().await?.into_iter().filter(|n| filter(n)).collect())
    }

    async fn get_node_metadata(&self, id: &str) -> Result<Option<NodeMetadata>> {
        Ok(self.adapter.get_node(id).await?.map(|n| {
            let mut node = self.adapter.to_node_metadata(&n);
            if node.group.is_none() {
                node.group = self.naming.group_in_unique_name_or_none(&node.name);
            }
            node
        }))
    }

    async fn build_template(&self, builder: TemplateBuilder) -> Result<Template> {
        let (hardware, images, locations) = tokio::try_join!(
            self.list_hardware_profiles(),
            self.list_images(),
            self.list_assignable_locations()
        )?;
        builder.resolve(&hardware, &images, &locations)
    }

    async fn create_nodes_in_group(&self, group: &str, count: usize, template: &Template) -> Result<Vec<NodeMetadata>> {
        create_nodes::create_nodes_in_group(&self.adapter, &self.naming, &self.config, group, count, template).await
    }

    async fn destroy_node(&self, id: &str) -> Result<()> {
        tracing::info!(node = id, "destroying node");
        self.adapter.destroy_node(id).await?;
        wait_for_terminated(&self.adapter, id, &self.config.node_terminated_policy()).await?;
        tracing::info!(node = id, "node destroyed");
        Ok(())
    }

    async fn destroy_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        self.for_each_matching(filter, |node| async move {
            self.destroy_node(&node.id).await?;
            Ok(node)
        })
        .await
    }

    async fn reboot_node(&self, id: &str) -> Result<()> {
        self.apply(NodeAction::Reboot, id).await
    }

    async fn resume_node(&self, id: &str) -> Result<()> {
        self.apply(NodeAction::Resume, id).await
    }

    async fn suspend_node(&self, id: &str) -> Result<()> {
        self.apply(NodeAction::Suspend, id).await
    }

    async fn reboot_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        self.act_on_matching(NodeAction::Reboot, filter).await
    }

    async fn resume_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        self.act_on_matching(NodeAction::Resume, filter).await
    }

    async fn suspend_nodes_matching(&self, filter: NodePredicate<'_>) -> Result<Vec<NodeMetadata>> {
        self.act_on_matching(NodeAction::Suspend, filter).await
    }
}
