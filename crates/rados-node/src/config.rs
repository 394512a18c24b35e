//! Node configuration: a single flat record assembled from defaults, an optional
//! TOML file, environment variables, and CLI flags (in increasing precedence), plus
//! the persisted-configuration guard that rejects a restart against a reshaped
//! cluster.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};

/// The fully resolved configuration a node runs with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub user_bearer_token: String,
    pub cluster_bearer_token: String,
    pub max_object_size_bytes: u64,
    pub object_folder: PathBuf,
    pub node_id: u32,
    pub node_hosts: Vec<String>,
    pub placement_groups: Vec<Vec<u32>>,
    pub use_production_logger: bool,
}

impl Config {
    /// The subset of fields that identify this node's place in the cluster.
    /// Persisted at first start; a later start with a different identity refuses
    /// to serve, guarding against accidental re-sharding of an existing data
    /// directory.
    fn cluster_identity(&self) -> ClusterIdentity {
        ClusterIdentity {
            node_id: self.node_id,
            node_hosts: self.node_hosts.clone(),
            placement_groups: self.placement_groups.clone(),
        }
    }

    /// Path of the persisted-configuration snapshot: a sibling of the blob-store
    /// directory rather than inside it, so the startup sweep never has to
    /// special-case it.
    pub fn persisted_configuration_path(&self) -> PathBuf {
        self.object_folder
            .parent()
            .map(|parent| parent.join("persistedConfiguration.json"))
            .unwrap_or_else(|| self.object_folder.join("persistedConfiguration.json"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct ClusterIdentity {
    node_id: u32,
    node_hosts: Vec<String>,
    placement_groups: Vec<Vec<u32>>,
}

/// A minimal distributed object store node.
#[derive(Parser, Debug)]
#[command(name = "rados-node", version, about)]
struct Cli {
    /// Optional TOML configuration file, layered under environment and CLI overrides.
    #[arg(long, env = "RADOS_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    #[arg(long, env = "RADOS_PORT")]
    port: Option<u16>,

    #[arg(long, env = "RADOS_USER_BEARER_TOKEN")]
    user_bearer_token: Option<String>,

    #[arg(long, env = "RADOS_CLUSTER_BEARER_TOKEN")]
    cluster_bearer_token: Option<String>,

    #[arg(long, env = "RADOS_MAX_OBJECT_SIZE_BYTES")]
    max_object_size_bytes: Option<u64>,

    #[arg(long, env = "RADOS_OBJECT_FOLDER")]
    object_folder: Option<PathBuf>,

    #[arg(long, env = "RADOS_NODE_ID")]
    node_id: Option<u32>,

    /// Comma-separated list of peer hosts, ordered by node id (e.g. `node0:5000,node1:5000`).
    #[arg(long, env = "RADOS_NODE_HOSTS", value_delimiter = ',')]
    node_hosts: Option<Vec<String>>,

    /// Placement groups as `0-1-2,1-2-0` (one `-`-joined node-id tuple per group).
    #[arg(long, env = "RADOS_PLACEMENT_GROUPS", value_delimiter = ',')]
    placement_groups: Option<Vec<String>>,

    #[arg(long, env = "RADOS_USE_PRODUCTION_LOGGER")]
    use_production_logger: Option<bool>,
}

/// Defaults applied before the file/env/CLI layers, matching `config::Config`'s
/// builder pattern: these are the lowest-precedence source.
#[derive(Serialize)]
struct Defaults {
    port: u16,
    user_bearer_token: String,
    cluster_bearer_token: String,
    max_object_size_bytes: u64,
    object_folder: String,
    use_production_logger: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            port: 5000,
            user_bearer_token: String::new(),
            cluster_bearer_token: String::new(),
            max_object_size_bytes: 64 * 1024 * 1024,
            object_folder: "data".to_string(),
            use_production_logger: false,
        }
    }
}

/// Load the configuration from defaults, an optional TOML file, environment
/// variables (`RADOS_*`), and CLI flags, in that increasing precedence order.
pub fn load() -> anyhow::Result<Config> {
    let cli = Cli::parse();

    let mut builder = config::Config::builder()
        .add_source(config::Config::try_from(&Defaults::default())?);

    if let Some(path) = &cli.config_file {
        builder = builder.add_source(config::File::from(path.as_path()));
    }
    builder = builder.add_source(config::Environment::with_prefix("RADOS").separator("_"));

    let layered = builder.build()?;

    let port = cli.port.unwrap_or(layered.get("port")?);
    let user_bearer_token: String = cli
        .user_bearer_token
        .unwrap_or(layered.get("user_bearer_token")?);
    let cluster_bearer_token: String = cli
        .cluster_bearer_token
        .unwrap_or(layered.get("cluster_bearer_token")?);
    let max_object_size_bytes = cli
        .max_object_size_bytes
        .unwrap_or(layered.get("max_object_size_bytes")?);
    let object_folder: PathBuf = cli
        .object_folder
        .unwrap_or_else(|| PathBuf::from(layered.get::<String>("object_folder").unwrap_or_else(|_| "data".into())));
    let use_production_logger = cli
        .use_production_logger
        .unwrap_or(layered.get("use_production_logger")?);

    let node_id = cli
        .node_id
        .ok_or_else(|| anyhow::anyhow!("node_id must be set (--node-id or RADOS_NODE_ID)"))?;
    let node_hosts = cli
        .node_hosts
        .ok_or_else(|| anyhow::anyhow!("node_hosts must be set (--node-hosts or RADOS_NODE_HOSTS)"))?;
    let placement_groups = cli
        .placement_groups
        .ok_or_else(|| anyhow::anyhow!("placement_groups must be set (--placement-groups or RADOS_PLACEMENT_GROUPS)"))?
        .iter()
        .map(|group| parse_placement_group(group))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(Config {
        port,
        user_bearer_token,
        cluster_bearer_token,
        max_object_size_bytes,
        object_folder,
        node_id,
        node_hosts,
        placement_groups,
        use_production_logger,
    })
}

fn parse_placement_group(group: &str) -> anyhow::Result<Vec<u32>> {
    group
        .split('-')
        .map(|id| id.parse::<u32>().map_err(|err| anyhow::anyhow!("invalid node id {id:?}: {err}")))
        .collect()
}

/// Read-compare-or-write the cluster-identity subset of `config` against
/// `persistedConfiguration.json`. Errors out if a previously persisted identity
/// disagrees with the one this process was started with.
pub fn guard_persisted_configuration(config: &Config) -> anyhow::Result<()> {
    let path = config.persisted_configuration_path();
    let current = config.cluster_identity();

    if path.exists() {
        let contents = std::fs::read_to_string(&path)
            .map_err(|err| anyhow::anyhow!("reading persisted configuration at {}: {err}", path.display()))?;
        let persisted: ClusterIdentity = serde_json::from_str(&contents)
            .map_err(|err| anyhow::anyhow!("parsing persisted configuration at {}: {err}", path.display()))?;

        if persisted != current {
            anyhow::bail!(
                "cluster identity at {} does not match this node's configuration; \
                 refusing to start against a possibly reshaped data directory",
                path.display()
            );
        }
    } else {
        write_persisted_configuration(&path, &current)?;
    }

    Ok(())
}

fn write_persisted_configuration(path: &Path, identity: &ClusterIdentity) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(identity)?;
    std::fs::write(path, contents)
        .map_err(|err| anyhow::anyhow!("writing persisted configuration at {}: {err}", path.display()))?;
    Ok(())
}
