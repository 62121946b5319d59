use core::time::Duration;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use snowlease::{
    CUSTOM_EPOCH, GeneratorConfig, Identity, LeaseSnowflakeId, SlotOrder, SnowflakeId,
    WorkerKeyFormat,
};

/// Command line for the `snowlease` binary.
///
/// Every `run` option falls back to an environment variable of the same name
/// in SCREAMING_SNAKE_CASE, and `.env` is loaded before parsing.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "snowlease",
    version,
    about = "Snowflake IDs with worker ids leased from a shared registry"
)]
pub struct CliArgs {
    /// Emit logs as JSON lines instead of human-readable text.
    ///
    /// Environment variable: `LOG_JSON`
    #[arg(long, env = "LOG_JSON", global = true, default_value_t = false)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lease a worker id, keep it alive, and print IDs as JSON lines.
    Run(RunArgs),
    /// Decode IDs into their timestamp, worker id and sequence.
    Decode(DecodeArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// In-process registry. Only useful for a single process.
    Memory,
    /// Redis (or any server speaking `SET NX PX` and `GETEX`).
    Redis,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Number of worker slots to scan, `0..MAX_WORKERS`.
    ///
    /// Must not exceed the 10-bit worker field (1024).
    ///
    /// Environment variable: `MAX_WORKERS`
    #[arg(long, env = "MAX_WORKERS", default_value_t = 1024)]
    pub max_workers: u64,

    /// Lease lifetime without renewal, in seconds.
    ///
    /// Environment variable: `LEASE_TTL_SECS`
    #[arg(long, env = "LEASE_TTL_SECS", default_value_t = 12)]
    pub lease_ttl_secs: u64,

    /// How long before expiry each renewal happens, in seconds.
    ///
    /// Environment variable: `SAFETY_MARGIN_SECS`
    #[arg(long, env = "SAFETY_MARGIN_SECS", default_value_t = 2)]
    pub safety_margin_secs: u64,

    /// Upper bound on a single registry call, in milliseconds.
    ///
    /// Environment variable: `REGISTRY_TIMEOUT_MS`
    #[arg(long, env = "REGISTRY_TIMEOUT_MS", default_value_t = 1000)]
    pub registry_timeout_ms: u64,

    /// Prefix of the lease keys: `{KEY_NAMESPACE}/worker/{slot}`.
    ///
    /// Environment variable: `KEY_NAMESPACE`
    #[arg(long, env = "KEY_NAMESPACE", default_value = snowlease::DEFAULT_NAMESPACE)]
    pub key_namespace: String,

    /// Value written into the lease. Must be unique per running process;
    /// defaults to hostname, pid and a random suffix.
    ///
    /// Environment variable: `IDENTITY`
    #[arg(long, env = "IDENTITY")]
    pub identity: Option<String>,

    /// Start the slot scan at a random offset instead of slot 0.
    ///
    /// Environment variable: `RANDOM_SLOTS`
    #[arg(long, env = "RANDOM_SLOTS", default_value_t = false)]
    pub random_slots: bool,

    /// Which registry to lease from.
    ///
    /// Environment variable: `REGISTRY`
    #[arg(long, env = "REGISTRY", value_enum, default_value_t = RegistryKind::Memory)]
    pub registry: RegistryKind,

    /// Connection string for `--registry redis`.
    ///
    /// Environment variable: `REDIS_URL`
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    /// Pause between emitted IDs, in milliseconds.
    ///
    /// Environment variable: `EMIT_INTERVAL_MS`
    #[arg(long, env = "EMIT_INTERVAL_MS", default_value_t = 1000)]
    pub emit_interval_ms: u64,

    /// Stop after this many IDs. Runs until interrupted when unset.
    ///
    /// Environment variable: `COUNT`
    #[arg(long, env = "COUNT")]
    pub count: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DecodeArgs {
    /// IDs to decode, decimal or `0x`-prefixed hex.
    #[arg(required = true, value_parser = parse_id)]
    pub ids: Vec<u64>,

    /// Epoch the IDs were generated against, in Unix milliseconds.
    #[arg(long, default_value_t = CUSTOM_EPOCH.as_millis() as u64)]
    pub epoch_millis: u64,

    /// Also print the bit layout table of each ID to stderr.
    #[arg(long, default_value_t = false)]
    pub layout: bool,
}

pub fn parse_id(raw: &str) -> Result<u64, String> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|err| format!("`{raw}` is not a 64-bit id: {err}"))
}

/// Validated settings for `snowlease run`.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub generator: GeneratorConfig,
    pub identity: Identity,
    pub registry: RegistryKind,
    pub redis_url: String,
    pub emit_interval: Duration,
    pub count: Option<u64>,
}

impl TryFrom<RunArgs> for NodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        let max_workers = LeaseSnowflakeId::max_workers();

        if args.max_workers == 0 {
            bail!("MAX_WORKERS must be greater than 0");
        }

        if args.max_workers > max_workers {
            bail!(
                "MAX_WORKERS ({}) exceeds available worker id space (max = {})",
                args.max_workers,
                max_workers
            );
        }

        if args.safety_margin_secs >= args.lease_ttl_secs {
            bail!(
                "SAFETY_MARGIN_SECS ({}) must be smaller than LEASE_TTL_SECS ({})",
                args.safety_margin_secs,
                args.lease_ttl_secs
            );
        }

        if args.emit_interval_ms == 0 {
            bail!("EMIT_INTERVAL_MS must be greater than 0");
        }

        if matches!(args.identity.as_deref(), Some("")) {
            bail!("IDENTITY must not be empty");
        }

        let generator = GeneratorConfig::default()
            .with_max_workers(args.max_workers)
            .with_lease_ttl(Duration::from_secs(args.lease_ttl_secs))
            .with_safety_margin(Duration::from_secs(args.safety_margin_secs))
            .with_registry_timeout(Duration::from_millis(args.registry_timeout_ms))
            .with_key_format(WorkerKeyFormat::new(args.key_namespace))
            .with_slot_order(if args.random_slots {
                SlotOrder::RandomOffset
            } else {
                SlotOrder::Ascending
            });
        generator
            .validate::<LeaseSnowflakeId>()
            .context("invalid lease configuration")?;

        Ok(Self {
            generator,
            identity: args.identity.map_or_else(Identity::host_pid, Identity::new),
            registry: args.registry,
            redis_url: args.redis_url,
            emit_interval: Duration::from_millis(args.emit_interval_ms),
            count: args.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(extra: &[&str]) -> RunArgs {
        let argv = ["snowlease", "run"].iter().chain(extra);
        match CliArgs::try_parse_from(argv).unwrap().command {
            Command::Run(args) => args,
            Command::Decode(_) => unreachable!(),
        }
    }

    #[test]
    fn defaults_build_a_valid_node() {
        let config = NodeConfig::try_from(run_args(&["--identity", "node-a"])).unwrap();
        assert_eq!(config.generator.max_workers, 1024);
        assert_eq!(config.generator.keepalive_period(), Duration::from_secs(10));
        assert_eq!(config.identity.as_str(), "node-a");
        assert_eq!(config.registry, RegistryKind::Memory);
        assert_eq!(config.count, None);
    }

    #[test]
    fn rejects_out_of_range_workers() {
        assert!(NodeConfig::try_from(run_args(&["--max-workers", "0"])).is_err());
        assert!(NodeConfig::try_from(run_args(&["--max-workers", "1025"])).is_err());
    }

    #[test]
    fn rejects_margin_not_below_ttl() {
        let args = run_args(&["--lease-ttl-secs", "5", "--safety-margin-secs", "5"]);
        assert!(NodeConfig::try_from(args).is_err());
    }

    #[test]
    fn rejects_registry_timeout_not_below_margin() {
        let args = run_args(&["--safety-margin-secs", "1", "--registry-timeout-ms", "1000"]);
        assert!(NodeConfig::try_from(args).is_err());
    }

    #[test]
    fn namespace_and_slot_order_flow_into_generator_config() {
        let config = NodeConfig::try_from(run_args(&[
            "--key-namespace",
            "/billing/",
            "--random-slots",
            "--registry",
            "redis",
        ]))
        .unwrap();
        assert_eq!(config.generator.key_format.key(3), "/billing/worker/3");
        assert_eq!(config.generator.slot_order, SlotOrder::RandomOffset);
        assert_eq!(config.registry, RegistryKind::Redis);
    }

    #[test]
    fn decode_accepts_decimal_and_hex() {
        let args = CliArgs::try_parse_from(["snowlease", "decode", "42", "0x2A", "--layout"])
            .unwrap();
        match args.command {
            Command::Decode(decode) => {
                assert_eq!(decode.ids, [42, 42]);
                assert!(decode.layout);
            }
            Command::Run(_) => unreachable!(),
        }
        assert!(parse_id("0xZZ").is_err());
        assert!(CliArgs::try_parse_from(["snowlease", "decode"]).is_err());
    }
}
