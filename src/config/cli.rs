use crate::config::ProviderConfig;
use crate::domain::blob::{ByteRange, GetOptions, ListContainerOptions};
use crate::domain::compute::{OsFamily, TemplateOptions};
use crate::domain::template::TemplateBuilder;
use crate::utils::error::{CloudError, Result};
use crate::utils::render::OutputFormat;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "polycloud")]
#[command(about = "Blob storage and compute across cloud providers", version)]
pub struct Cli {
    /// Path to a TOML provider configuration
    #[arg(short, long)]
    pub config: Option<String>,

    /// Provider id, overriding the configuration file
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Endpoint, overriding the provider default
    #[arg(long)]
    pub endpoint: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the providers this build knows about
    Providers,
    /// Blob store operations
    #[command(subcommand)]
    Blob(BlobCommand),
    /// Compute operations
    #[command(subcommand)]
    Compute(ComputeCommand),
}

#[derive(Subcommand, Debug)]
pub enum BlobCommand {
    /// List containers
    Containers,
    /// List the contents of a container
    List {
        container: String,
        #[arg(long)]
        dir: Option<String>,
        #[arg(short, long)]
        recursive: bool,
        #[arg(long)]
        marker: Option<String>,
        #[arg(long)]
        max_results: Option<usize>,
        /// Fetch full metadata for each blob
        #[arg(long)]
        details: bool,
    },
    CreateContainer {
        container: String,
    },
    DeleteContainer {
        container: String,
    },
    Mkdir {
        container: String,
        directory: String,
    },
    /// Upload a local file
    Put {
        container: String,
        name: String,
        file: String,
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Download a blob to a file, or stdout
    Get {
        container: String,
        name: String,
        #[arg(short, long)]
        output: Option<String>,
        /// Byte range such as `0-99`, `100-` or `-20`
        #[arg(long)]
        range: Option<String>,
    },
    Rm {
        container: String,
        name: String,
    },
    Count {
        container: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ComputeCommand {
    Hardware,
    Images,
    Locations,
    /// List nodes, optionally only one group
    Nodes {
        #[arg(short, long)]
        group: Option<String>,
    },
    /// Create nodes in a group
    Create {
        group: String,
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,
        #[command(flatten)]
        template: TemplateArgs,
    },
    Destroy {
        id: String,
    },
    /// Destroy every node in a group
    DestroyGroup {
        group: String,
    },
    Reboot {
        id: String,
    },
    Resume {
        id: String,
    },
    Suspend {
        id: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct TemplateArgs {
    #[arg(long)]
    pub hardware_id: Option<String>,
    #[arg(long)]
    pub image_id: Option<String>,
    #[arg(long)]
    pub location_id: Option<String>,
    #[arg(long)]
    pub os_family: Option<String>,
    #[arg(long)]
    pub os_version_matches: Option<String>,
    #[arg(long)]
    pub image_name_matches: Option<String>,
    #[arg(long)]
    pub min_cores: Option<f64>,
    #[arg(long)]
    pub min_ram: Option<u32>,
    #[arg(long)]
    pub min_disk: Option<f64>,
    #[arg(long, conflicts_with = "biggest")]
    pub fastest: bool,
    #[arg(long)]
    pub biggest: bool,
    /// Return as soon as the provider accepts the nodes
    #[arg(long)]
    pub no_wait: bool,
    #[arg(long)]
    pub tag: Vec<String>,
}

impl TemplateArgs {
    pub fn to_builder(&self) -> TemplateBuilder {
        let mut builder = TemplateBuilder::new();
        if let Some(id) = &self.hardware_id {
            builder = builder.hardware_id(id);
        }
        if let Some(id) = &self.image_id {
            builder = builder.image_id(id);
        }
        if let Some(id) = &self.location_id {
            builder = builder.location_id(id);
        }
        if let Some(family) = &self.os_family {
            builder = builder.os_family(OsFamily::parse(family));
        }
        if let Some(pattern) = &self.os_version_matches {
            builder = builder.os_version_matches(pattern);
        }
        if let Some(pattern) = &self.image_name_matches {
            builder = builder.image_name_matches(pattern);
        }
        if let Some(cores) = self.min_cores {
            builder = builder.min_cores(cores);
        }
        if let Some(ram) = self.min_ram {
            builder = builder.min_ram(ram);
        }
        if let Some(disk) = self.min_disk {
            builder = builder.min_disk(disk);
        }
        if self.fastest {
            builder = builder.fastest();
        } else if self.biggest {
            builder = builder.biggest();
        }
        let options = self
            .tag
            .iter()
            .fold(TemplateOptions::default(), |options, tag| options.tag(tag))
            .block_until_running(!self.no_wait);
        builder.options(options)
    }
}

impl Cli {
    /// The configuration file if given, else an empty config; flags win.
    pub fn load_config(&self) -> Result<ProviderConfig> {
        let mut config = match &self.config {
            Some(path) => ProviderConfig::from_file(path).map_err(|e| CloudError::ConfigError {
                message: format!("Failed to load config file '{}': {}", path, e),
            })?,
            None => ProviderConfig::new(""),
        };
        if let Some(provider) = &self.provider {
            config.provider.name = provider.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.provider.endpoint = Some(endpoint.clone());
        }
        if config.provider.name.is_empty() {
            return Err(CloudError::ConfigValidationError {
                field: "provider.name".to_string(),
                message: "Pass --provider or a --config file naming one".to_string(),
            });
        }
        Ok(config)
    }
}

pub fn list_options(
    dir: Option<&str>,
    recursive: bool,
    marker: Option<&str>,
    max_results: Option<usize>,
    details: bool,
) -> ListContainerOptions {
    let mut options = match dir {
        Some(dir) => ListContainerOptions::in_directory(dir),
        None => ListContainerOptions::default(),
    };
    options.recursive = recursive;
    if let Some(marker) = marker {
        options = options.with_marker(marker);
    }
    if let Some(max) = max_results {
        options = options.max_results(max);
    }
    if details {
        options = options.with_details();
    }
    options
}

pub fn get_options(range: Option<&str>) -> Result<GetOptions> {
    match range {
        None => Ok(GetOptions::default()),
        Some(value) => ByteRange::parse(value)
            .map(|r| GetOptions::default().range(r))
            .ok_or_else(|| CloudError::invalid_argument(format!("{} is not a byte range", value))),
    }
}
