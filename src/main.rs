use anyhow::Context;
use clap::Parser;
use polycloud::config::cli::{self, BlobCommand, Cli, Command, ComputeCommand};
use polycloud::core::context::{self, ContextBuilder};
use polycloud::domain::blob::Blob;
use polycloud::domain::compute::NodeMetadata;
use polycloud::utils::error::{CloudError, ErrorCategory};
use polycloud::utils::render::{render, OutputFormat, Tabular};
use polycloud::utils::{logger, validation::Validate};
use polycloud::{BlobStore, ComputeService};
use serde::Serialize;
use std::io::Write;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logger::init_logger(logger::LogFormat::from_env(), cli.verbose);
    tracing::debug!("CLI arguments: {:?}", cli);

    if let Err(e) = run(cli).await {
        let code = match e.downcast_ref::<CloudError>() {
            Some(err) => {
                tracing::error!("❌ {} (Category: {:?})", err, err.category());
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 {}", err.recovery_suggestion());
                exit_code(err.category())
            }
            None => {
                eprintln!("❌ {:#}", e);
                1
            }
        };
        std::process::exit(code);
    }
}

fn exit_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Provider => 1,
        ErrorCategory::Configuration => 2,
        ErrorCategory::Authorization => 3,
        ErrorCategory::NotFound => 4,
        ErrorCategory::Conflict => 5,
        ErrorCategory::Timeout => 6,
        ErrorCategory::Network => 7,
    }
}

fn print<T: Tabular + Serialize>(items: &[T], format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render(items, format)?);
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Providers = cli.command {
        return print(context::providers(), cli.format);
    }

    let config = cli.load_config()?;
    config.validate()?;
    let builder = ContextBuilder::from_config(&config)?;
    tracing::info!("🚀 Using provider {}", builder.metadata().id);

    match cli.command {
        Command::Providers => Ok(()),
        Command::Blob(command) => run_blob(builder.build_blob_store()?.as_ref(), command, cli.format).await,
        Command::Compute(command) => {
            run_compute(builder.build_compute_service()?.as_ref(), command, cli.format).await
        }
    }
}

async fn run_blob(store: &dyn BlobStore, command: BlobCommand, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        BlobCommand::Containers => {
            let page = store.list().await?;
            print(&page.items, format)
        }
        BlobCommand::List {
            container,
            dir,
            recursive,
            marker,
            max_results,
            details,
        } => {
            let options = cli::list_options(dir.as_deref(), recursive, marker.as_deref(), max_results, details);
            let page = store.list_container(&container, &options).await?;
            print(&page.items, format)?;
            if let Some(next) = page.next_marker {
                eprintln!("more results follow; continue with --marker {}", next);
            }
            Ok(())
        }
        BlobCommand::CreateContainer { container } => {
            if store.create_container_in_location(None, &container).await? {
                println!("✅ created container {}", container);
            } else {
                println!("container {} already exists", container);
            }
            Ok(())
        }
        BlobCommand::DeleteContainer { container } => {
            store.delete_container(&container).await?;
            println!("✅ deleted container {}", container);
            Ok(())
        }
        BlobCommand::Mkdir { container, directory } => {
            store.create_directory(&container, &directory).await?;
            println!("✅ created directory {}/{}", container, directory);
            Ok(())
        }
        BlobCommand::Put {
            container,
            name,
            file,
            content_type,
        } => {
            let payload = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file))?;
            let mut blob = Blob::builder(&name).payload(payload);
            if let Some(content_type) = content_type {
                blob = blob.content_type(content_type);
            }
            let etag = store.put_blob(&container, blob.build()).await?;
            println!("{}", etag);
            Ok(())
        }
        BlobCommand::Get {
            container,
            name,
            output,
            range,
        } => {
            let options = cli::get_options(range.as_deref())?;
            let blob = store
                .get_blob(&container, &name, &options)
                .await?
                .ok_or_else(|| CloudError::KeyNotFound {
                    container: container.clone(),
                    key: name.clone(),
                })?;
            match output {
                Some(path) => tokio::fs::write(&path, &blob.payload)
                    .await
                    .with_context(|| format!("writing {}", path))?,
                None => std::io::stdout().write_all(&blob.payload)?,
            }
            Ok(())
        }
        BlobCommand::Rm { container, name } => {
            store.remove_blob(&container, &name).await?;
            Ok(())
        }
        BlobCommand::Count { container } => {
            println!("{}", store.count_blobs(&container).await?);
            Ok(())
        }
    }
}

async fn run_compute(
    service: &dyn ComputeService,
    command: ComputeCommand,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match command {
        ComputeCommand::Hardware => print(&service.list_hardware_profiles().await?, format),
        ComputeCommand::Images => print(&service.list_images().await?, format),
        ComputeCommand::Locations => print(&service.list_assignable_locations().await?, format),
        ComputeCommand::Nodes { group } => {
            let nodes = match group {
                Some(group) => {
                    let in_group = |n: &NodeMetadata| n.group.as_deref() == Some(group.as_str());
                    service.list_nodes_matching(&in_group).await?
                }
                None => service.list_nodes().await?,
            };
            print(&nodes, format)
        }
        ComputeCommand::Create {
            group,
            count,
            template,
        } => {
            let template = service.build_template(template.to_builder()).await?;
            tracing::info!(
                "📦 creating {} node(s) in {} with hardware {} and image {}",
                count,
                group,
                template.hardware.id,
                template.image.id
            );
            match service.create_nodes_in_group(&group, count, &template).await {
                Ok(nodes) => print(&nodes, format),
                Err(CloudError::RunNodes {
                    group,
                    successful,
                    failures,
                }) => {
                    print(&successful, format)?;
                    for failure in &failures {
                        match &failure.node_id {
                            Some(id) => eprintln!("❌ {} ({}): {}", failure.name, id, failure.reason),
                            None => eprintln!("❌ {}: {}", failure.name, failure.reason),
                        }
                    }
                    Err(CloudError::RunNodes {
                        group,
                        successful,
                        failures,
                    }
                    .into())
                }
                Err(e) => Err(e.into()),
            }
        }
        ComputeCommand::Destroy { id } => {
            service.destroy_node(&id).await?;
            println!("✅ destroyed {}", id);
            Ok(())
        }
        ComputeCommand::DestroyGroup { group } => {
            let in_group = |n: &NodeMetadata| n.group.as_deref() == Some(group.as_str());
            let destroyed = service.destroy_nodes_matching(&in_group).await?;
            print(&destroyed, format)
        }
        ComputeCommand::Reboot { id } => {
            service.reboot_node(&id).await?;
            Ok(())
        }
        ComputeCommand::Resume { id } => {
            service.resume_node(&id).await?;
            Ok(())
        }
        ComputeCommand::Suspend { id } => {
            service.suspend_node(&id).await?;
            Ok(())
        }
    }
}
