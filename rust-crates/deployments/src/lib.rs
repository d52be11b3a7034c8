use anyhow::{
    Context,
    Result,
    anyhow,
};
use generated_bindings::{
    Felt,
    contract_tag,
    parse_felt,
};
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use url::Url;

pub const DEFAULT_MANIFEST_DIR: &str = ".";
pub const DEFAULT_DEV_RPC_URL: &str = "http://localhost:5050";
pub const DEFAULT_DEV_TORII_URL: &str = "http://localhost:8080";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Dev,
    Sepolia,
    Mainnet,
}

impl DeploymentEnv {
    pub fn profile_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Sepolia => "sepolia",
            DeploymentEnv::Mainnet => "mainnet",
        }
    }

    pub fn manifest_file_name(self) -> String {
        format!("manifest_{}.json", self.profile_name())
    }

    /// Katana and Torii defaults; public networks have no sensible default.
    pub fn default_endpoints(self) -> Option<(&'static str, &'static str)> {
        match self {
            DeploymentEnv::Dev => Some((DEFAULT_DEV_RPC_URL, DEFAULT_DEV_TORII_URL)),
            DeploymentEnv::Sepolia | DeploymentEnv::Mainnet => None,
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Katana (dev)",
            DeploymentEnv::Sepolia => "Sepolia",
            DeploymentEnv::Mainnet => "Mainnet",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldManifest {
    pub address: String,
    #[serde(default)]
    pub seed: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContractManifest {
    pub address: String,
    pub tag: String,
    #[serde(default)]
    pub systems: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelManifest {
    pub tag: String,
    #[serde(default)]
    pub selector: Option<String>,
}

/// The subset of a Dojo deployment manifest the client needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    pub world: WorldManifest,
    #[serde(default)]
    pub contracts: Vec<ContractManifest>,
    #[serde(default)]
    pub models: Vec<ModelManifest>,
}

impl Manifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to parse Dojo manifest JSON")
    }

    pub fn world_address(&self) -> Result<Felt> {
        parse_felt(&self.world.address)
            .with_context(|| format!("invalid world address {}", self.world.address))
    }

    pub fn contract(&self, tag: &str) -> Option<&ContractManifest> {
        self.contracts.iter().find(|contract| contract.tag == tag)
    }

    pub fn contract_address(&self, namespace: &str, contract_name: &str) -> Result<Felt> {
        let tag = contract_tag(namespace, contract_name);
        let contract = self
            .contract(&tag)
            .ok_or_else(|| anyhow!("contract {tag} is not part of the manifest"))?;
        parse_felt(&contract.address)
            .with_context(|| format!("invalid address for contract {tag}"))
    }

    pub fn has_model(&self, tag: &str) -> bool {
        self.models.iter().any(|model| model.tag == tag)
    }
}

#[derive(Clone, Debug)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub digest: String,
    pub manifest: Manifest,
}

impl LoadedManifest {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest = Manifest::from_slice(&bytes)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            digest: compute_digest(&bytes),
            manifest,
        })
    }

    pub fn digest_preview(&self) -> &str {
        let end = self.digest.len().min(12);
        &self.digest[..end]
    }
}

pub fn compute_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn resolve_manifest_path(env: DeploymentEnv, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => Path::new(DEFAULT_MANIFEST_DIR).join(env.manifest_file_name()),
    }
}

/// Keypair used for automated flows instead of a keystore.
#[derive(Clone)]
pub struct MasterAccount {
    pub address: Felt,
    pub private_key: Felt,
}

impl fmt::Debug for MasterAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterAccount")
            .field("address", &generated_bindings::felt_to_hex(&self.address))
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Raw inputs for [`DojoConfig::resolve`], typically CLI flags backed by env vars.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub manifest_path: Option<PathBuf>,
    pub rpc_url: Option<String>,
    pub torii_url: Option<String>,
    pub master_address: Option<String>,
    pub master_private_key: Option<String>,
}

#[derive(Clone, Debug)]
pub struct DojoConfig {
    pub env: DeploymentEnv,
    pub rpc_url: Url,
    pub torii_url: Url,
    pub manifest: LoadedManifest,
    pub master_account: Option<MasterAccount>,
}

impl DojoConfig {
    pub fn resolve(env: DeploymentEnv, overrides: ConfigOverrides) -> Result<Self> {
        let defaults = env.default_endpoints();
        let rpc_url = overrides
            .rpc_url
            .or_else(|| defaults.map(|(rpc, _)| rpc.to_string()))
            .ok_or_else(|| anyhow!("No RPC URL configured for {env}; pass --rpc-url"))?;
        let torii_url = overrides
            .torii_url
            .or_else(|| defaults.map(|(_, torii)| torii.to_string()))
            .ok_or_else(|| {
                anyhow!("No Torii URL configured for {env}; pass --torii-url")
            })?;
        let rpc_url =
            Url::parse(&rpc_url).with_context(|| format!("invalid RPC URL {rpc_url}"))?;
        let torii_url = Url::parse(&torii_url)
            .with_context(|| format!("invalid Torii URL {torii_url}"))?;

        let manifest_path = resolve_manifest_path(env, overrides.manifest_path.as_deref());
        let manifest = LoadedManifest::load(&manifest_path)?;

        let master_account =
            match (overrides.master_address, overrides.master_private_key) {
                (Some(address), Some(private_key)) => Some(MasterAccount {
                    address: parse_felt(&address)
                        .context("invalid master account address")?,
                    private_key: parse_felt(&private_key)
                        .context("invalid master account private key")?,
                }),
                (None, None) => None,
                _ => {
                    return Err(anyhow!(
                        "Master account needs both an address and a private key"
                    ));
                }
            };

        Ok(Self {
            env,
            rpc_url,
            torii_url,
            manifest,
            master_account,
        })
    }

    pub fn world_address(&self) -> Result<Felt> {
        self.manifest.manifest.world_address()
    }
}
