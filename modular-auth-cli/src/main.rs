use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use modular_auth::{
    AuthorizationRequest, CompiledArtifact, EthSigner, IdentityDeriver, PolicyMerkleTree, SessionParams,
};
use modular_auth_types::{Felt, Policy};
use serde::Deserialize;
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing_subscriber::EnvFilter;

/// Offline tooling for modular account authorization: class identifiers, deployment addresses,
/// policy trees and session-key commitments.
///
/// Every command prints its result as JSON. With `--output`, the result is also merged into a
/// results file under the command's name.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Results file to merge into (eg, session.sepolia.json).
    #[arg(long, global = true, env = "MODULAR_AUTH_OUTPUT")]
    output: Option<PathBuf>,

    /// Log filter (eg, debug, modular_auth=trace). Falls back to RUST_LOG, then `warn`.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Class identifier of a compiled artifact.
    ClassHash {
        /// Compiled class JSON.
        artifact: PathBuf,
    },

    /// Deterministic deployment address.
    Address {
        #[arg(long)]
        class_hash: Felt,

        #[arg(long, default_value = "0")]
        salt: Felt,

        /// Deploying account; zero for self-deployment.
        #[arg(long, default_value = "0")]
        deployer: Felt,

        /// Constructor arguments, comma separated.
        #[arg(long, value_delimiter = ',')]
        args: Vec<Felt>,
    },

    /// Root and proofs of a policy set.
    PolicyTree {
        /// JSON list of `{"target": .., "entrypoint": ..}` or `{"target": .., "selector": ..}`.
        policies: PathBuf,
    },

    /// Session-key commitment for a grantor, optionally signed.
    Commitment {
        #[arg(long)]
        account: Felt,

        #[arg(long)]
        validator_class: Felt,

        #[arg(long)]
        grantor: Felt,

        #[arg(long)]
        session_key: Felt,

        /// Unix timestamp.
        #[arg(long)]
        expiry: u64,

        #[arg(long, default_value = "0")]
        policy_root: Felt,

        /// Hex, decimal, or a short string such as SN_MAIN.
        #[arg(long, env = "MODULAR_AUTH_CHAIN_ID", default_value = "SN_SEPOLIA", value_parser = parse_chain_id)]
        chain_id: Felt,

        /// Ethereum private key (hex string, 0x...) to sign the commitment with.
        #[arg(long, env = "PKEY", hide_env_values = true)]
        private_key: Option<String>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::ClassHash { .. } => "class-hash",
            Command::Address { .. } => "address",
            Command::PolicyTree { .. } => "policy-tree",
            Command::Commitment { .. } => "commitment",
        }
    }
}

#[derive(Deserialize)]
struct PolicyEntry {
    target: Felt,
    #[serde(default)]
    selector: Option<Felt>,
    #[serde(default)]
    entrypoint: Option<String>,
}

impl PolicyEntry {
    fn into_policy(self) -> Result<Policy> {
        match (self.selector, self.entrypoint) {
            (Some(selector), None) => Ok(Policy::new(self.target, selector)),
            (None, Some(name)) => Ok(Policy::from_entrypoint(self.target, &name)),
            _ => Err(anyhow!(
                "policy for {} needs exactly one of `selector` or `entrypoint`",
                self.target
            )),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref())?;

    let result = run(&cli.command)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let Some(path) = &cli.output {
        write_results_json(path, cli.command.name(), result)?;
        tracing::info!(path = %path.display(), "results written");
    }
    Ok(())
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log level `{level}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn run(command: &Command) -> Result<Value> {
    let deriver = IdentityDeriver::new();
    match command {
        Command::ClassHash { artifact } => {
            let raw = fs::read(artifact).with_context(|| format!("failed reading {}", artifact.display()))?;
            let artifact_json = CompiledArtifact::from_slice(&raw)?;
            let class_hash = deriver.class_identifier(&artifact_json)?;
            Ok(json!({
                "artifact": artifact.display().to_string(),
                "compiler_version": artifact_json.compiler_version,
                "class_hash": class_hash,
            }))
        }

        Command::Address {
            class_hash,
            salt,
            deployer,
            args,
        } => {
            let address = deriver.deployed_address_from(*deployer, *class_hash, *salt, args);
            Ok(json!({
                "class_hash": class_hash,
                "salt": salt,
                "deployer": deployer,
                "constructor_args": args,
                "address": address,
            }))
        }

        Command::PolicyTree { policies } => {
            let raw = fs::read_to_string(policies)
                .with_context(|| format!("failed reading {}", policies.display()))?;
            let entries: Vec<PolicyEntry> = serde_json::from_str(&raw)
                .with_context(|| format!("failed parsing JSON in {}", policies.display()))?;
            let policies = entries
                .into_iter()
                .map(PolicyEntry::into_policy)
                .collect::<Result<Vec<_>>>()?;
            let tree = PolicyMerkleTree::new(policies)?;

            let mut proofs = Vec::with_capacity(tree.len());
            for policy in tree.policies() {
                proofs.push(json!({
                    "target": policy.target,
                    "selector": policy.selector,
                    "proof": tree.proof(policy)?,
                }));
            }
            Ok(json!({
                "root": tree.root(),
                "depth": tree.depth(),
                "policies": proofs,
            }))
        }

        Command::Commitment {
            account,
            validator_class,
            grantor,
            session_key,
            expiry,
            policy_root,
            chain_id,
            private_key,
        } => {
            let mut request = AuthorizationRequest::new(SessionParams {
                account: *account,
                validator_class: *validator_class,
                session_key: *session_key,
                expiry: *expiry,
                policy_root: *policy_root,
                chain_id: *chain_id,
            });
            let commitment = request.request_signing_round(*grantor)?;

            let mut result = json!({
                "account": account,
                "grantor": grantor,
                "chain_id": chain_id,
                "commitment": commitment,
            });
            if let Some(key) = private_key {
                let signer = EthSigner::from_slice(&decode_private_key(key)?)?;
                request.sign_with(&signer)?;
                result["signer_address"] = json!(signer.address());
                result["signature"] = json!(request.signature());
            }
            Ok(result)
        }
    }
}

fn parse_chain_id(text: &str) -> std::result::Result<Felt, String> {
    let numeric = text.starts_with("0x") || text.chars().all(|c| c.is_ascii_digit());
    if numeric {
        text.parse::<Felt>().map_err(|e| e.to_string())
    } else {
        Felt::from_short_string(text).map_err(|e| e.to_string())
    }
}

fn decode_private_key(text: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(text.trim().trim_start_matches("0x")).context("private key is not valid hex")?;
    if bytes.len() != 32 {
        bail!("private key must be 32 bytes, got {}", bytes.len());
    }
    Ok(bytes)
}

fn write_results_json(path: &Path, key: &str, result: Value) -> Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string());

    let existing = if path.exists() {
        fs::read_to_string(path).with_context(|| format!("failed reading {}", path.display()))?
    } else {
        String::new()
    };

    let mut root: Value = if existing.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&existing).with_context(|| format!("failed parsing JSON in {}", path.display()))?
    };
    // Ensure root object
    if !root.is_object() {
        root = json!({});
    }

    // root.results keyed by command name
    if root.get("results").and_then(Value::as_object).is_none() {
        root["results"] = json!({});
    }

    // root.updated_at / root.results[key]
    root["updated_at"] = json!(now);
    root["results"][key] = result;

    write_json_atomic(path, &root)
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.exists() {
        fs::create_dir_all(parent).with_context(|| format!("failed creating directory {}", parent.display()))?;
    }

    let serialised = serde_json::to_string_pretty(value).context("failed serialising results JSON")?;
    let tmp_path = tmp_path_for(path);
    fs::write(&tmp_path, serialised.as_bytes())
        .with_context(|| format!("failed writing temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed replacing {}", path.display()))?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_parsing() {
        assert_eq!(parse_chain_id("SN_SEPOLIA").unwrap(), Felt::short_string("SN_SEPOLIA"));
        assert_eq!(parse_chain_id("0x534e5f4d41494e").unwrap(), Felt::short_string("SN_MAIN"));
        assert_eq!(parse_chain_id("7").unwrap(), Felt::from(7u64));
        assert!(parse_chain_id("a chain id that is much too long for one felt").is_err());
    }

    #[test]
    fn test_policy_entry_needs_one_selector_source() {
        let entries: Vec<PolicyEntry> = serde_json::from_str(
            r#"[
                {"target": "0x5", "entrypoint": "transfer"},
                {"target": "0x5", "selector": "0x9"},
                {"target": "0x5"},
                {"target": "0x5", "selector": "0x9", "entrypoint": "transfer"}
            ]"#,
        )
        .unwrap();
        let results: Vec<_> = entries.into_iter().map(PolicyEntry::into_policy).collect();
        assert_eq!(
            results[0].as_ref().unwrap(),
            &Policy::from_entrypoint(Felt::from(5u64), "transfer")
        );
        assert_eq!(results[1].as_ref().unwrap(), &Policy::new(Felt::from(5u64), Felt::from(9u64)));
        assert!(results[2].is_err());
        assert!(results[3].is_err());
    }

    #[test]
    fn test_decode_private_key() {
        let key = format!("0x{}", "11".repeat(32));
        assert_eq!(decode_private_key(&key).unwrap(), vec![0x11u8; 32]);
        assert!(decode_private_key("0x1234").is_err());
        assert!(decode_private_key("not hex").is_err());
    }

    #[test]
    fn test_commitment_command_signs_with_key() {
        let command = Command::Commitment {
            account: Felt::from(0x123u64),
            validator_class: Felt::from(0x234u64),
            grantor: Felt::from(0x456u64),
            session_key: Felt::from(0x1u64),
            expiry: 2,
            policy_root: Felt::from(0x3u64),
            chain_id: Felt::from(0x4u64),
            private_key: Some("11".repeat(32)),
        };
        let result = run(&command).unwrap();
        assert!(result["commitment"].is_string());
        assert_eq!(result["signature"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_results_file_merges_commands() {
        let dir = std::env::temp_dir().join(format!("modular-auth-cli-{}", std::process::id()));
        let path = dir.join("results.json");
        let _ = fs::remove_file(&path);

        write_results_json(&path, "class-hash", json!({"class_hash": "0x1"})).unwrap();
        write_results_json(&path, "address", json!({"address": "0x2"})).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(root["results"]["class-hash"]["class_hash"], "0x1");
        assert_eq!(root["results"]["address"]["address"], "0x2");
        assert!(root["updated_at"].is_string());
        assert!(!tmp_path_for(&path).exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_results_file_replaces_non_object_root() {
        let dir = std::env::temp_dir().join(format!("modular-auth-cli-array-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("results.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        write_results_json(&path, "address", json!({"address": "0x2"})).unwrap();

        let root: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!(root.is_object());
        assert_eq!(root["results"]["address"]["address"], "0x2");

        let _ = fs::remove_dir_all(&dir);
    }
}
