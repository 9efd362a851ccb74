use std::path::PathBuf;

use anyhow::{Context, bail};
use triage_core::AlertRunner;
use triage_core::config::{Config, ObservabilityConfig, VaultConfig};
#[cfg(feature = "vault-age")]
use triage_core::vault::AgeVaultProvider;
use triage_core::vault::{EnvVaultProvider, VaultProvider};
use triage_slack::{SlackApi, http_client};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let overrides = Overrides::parse(std::env::args().skip(1))?;
    let config_path = overrides.config_path();
    let mut config = Config::load(&config_path)?;
    overrides.apply(&mut config);

    let _telemetry = init_subscriber(&config.observability);
    tracing::debug!(path = %config_path.display(), "configuration loaded");
    config.validate()?;

    let vault = open_vault(&config.vault)?;
    let http = http_client()?;
    let slack = &config.slack;
    let runner = AlertRunner::new(&config, vault.as_ref(), |token| {
        SlackApi::new(http.clone(), token)
            .with_base_url(slack.api_base.clone())
            .with_page_limit(slack.page_limit)
    });

    match runner.run().await {
        Ok(report) => {
            tracing::debug!(?report, "run report");
            Ok(())
        }
        Err(e) => {
            if let Some(path) = e.secret_path() {
                tracing::error!(
                    secret_path = path,
                    backend = %config.vault.backend,
                    "credential lookup failed"
                );
            }
            Err(e).context("triage run aborted")
        }
    }
}

/// Command-line overrides for ad hoc runs. Scheduled runs pass none.
#[derive(Debug, Default, PartialEq, Eq)]
struct Overrides {
    config: Option<PathBuf>,
    dry_run: bool,
    vault_backend: Option<String>,
    vault_key: Option<PathBuf>,
    vault_path: Option<PathBuf>,
}

impl Overrides {
    fn parse(args: impl IntoIterator<Item = String>) -> anyhow::Result<Self> {
        let mut overrides = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--dry-run" => overrides.dry_run = true,
                "--config" => overrides.config = Some(flag_value(&mut args, &arg)?.into()),
                "--vault" => overrides.vault_backend = Some(flag_value(&mut args, &arg)?),
                "--vault-key" => overrides.vault_key = Some(flag_value(&mut args, &arg)?.into()),
                "--vault-path" => overrides.vault_path = Some(flag_value(&mut args, &arg)?.into()),
                other => bail!("unrecognized argument: {other}"),
            }
        }
        Ok(overrides)
    }

    /// `--config`, then `TRIAGE_CONFIG`, then the bundled default.
    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var_os("TRIAGE_CONFIG").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Layer flags over file and environment settings.
    fn apply(self, config: &mut Config) {
        if self.dry_run {
            config.runner.dry_run = true;
        }
        if let Some(backend) = self.vault_backend {
            config.vault.backend = backend;
        }
        if let Some(path) = self.vault_key {
            config.vault.key_path = Some(path);
        }
        if let Some(path) = self.vault_path {
            config.vault.vault_path = Some(path);
        }
    }
}

fn flag_value(args: &mut impl Iterator<Item = String>, flag: &str) -> anyhow::Result<String> {
    args.next()
        .with_context(|| format!("{flag} requires a value"))
}

fn open_vault(vault: &VaultConfig) -> anyhow::Result<Box<dyn VaultProvider>> {
    match vault.backend.as_str() {
        "env" => Ok(Box::new(EnvVaultProvider)),
        #[cfg(feature = "vault-age")]
        "age" => {
            let (Some(key), Some(path)) = (&vault.key_path, &vault.vault_path) else {
                bail!("vault.key_path and vault.vault_path are required for the age backend");
            };
            Ok(Box::new(AgeVaultProvider::open(key, path)?))
        }
        #[cfg(not(feature = "vault-age"))]
        "age" => bail!("age backend requires the vault-age feature"),
        other => bail!("unknown vault backend: {other}"),
    }
}

/// Flushes exported spans when the run ends.
#[derive(Default)]
struct TelemetryGuard {
    #[cfg(feature = "otel")]
    provider: Option<opentelemetry_sdk::trace::SdkTracerProvider>,
}

#[cfg(feature = "otel")]
impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to flush OTLP spans: {e}");
        }
    }
}

fn init_subscriber(observability: &ObservabilityConfig) -> TelemetryGuard {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer());

    #[cfg(feature = "otel")]
    {
        if observability.exporter == "otlp" {
            match otlp_provider(&observability.endpoint) {
                Ok(provider) => {
                    use opentelemetry::trace::TracerProvider as _;

                    let tracer = provider.tracer("triage");
                    registry
                        .with(tracing_opentelemetry::layer().with_tracer(tracer))
                        .init();
                    return TelemetryGuard {
                        provider: Some(provider),
                    };
                }
                Err(e) => eprintln!("OTLP export disabled, logging to stdout only: {e:#}"),
            }
        }
    }

    #[cfg(not(feature = "otel"))]
    let _ = observability;

    registry.init();
    TelemetryGuard::default()
}

#[cfg(feature = "otel")]
fn otlp_provider(endpoint: &str) -> anyhow::Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry_otlp::WithExportConfig as _;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .context("failed to build OTLP span exporter")?;
    Ok(opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name("triage")
                .build(),
        )
        .build())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serial_test::serial;

    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|a| (*a).to_owned()).collect()
    }

    #[test]
    fn no_arguments_means_no_overrides() {
        assert_eq!(Overrides::parse(args(&[])).unwrap(), Overrides::default());
    }

    #[test]
    fn parses_every_flag() {
        let overrides = Overrides::parse(args(&[
            "--config",
            "/etc/triage.toml",
            "--dry-run",
            "--vault",
            "age",
            "--vault-key",
            "/run/age.key",
            "--vault-path",
            "/run/secrets.age",
        ]))
        .unwrap();
        assert_eq!(
            overrides,
            Overrides {
                config: Some("/etc/triage.toml".into()),
                dry_run: true,
                vault_backend: Some("age".into()),
                vault_key: Some("/run/age.key".into()),
                vault_path: Some("/run/secrets.age".into()),
            }
        );
    }

    #[test]
    fn flag_without_value_is_rejected() {
        let err = Overrides::parse(args(&["--vault-key"])).unwrap_err();
        assert_eq!(err.to_string(), "--vault-key requires a value");
    }

    #[test]
    fn unknown_argument_is_rejected() {
        let err = Overrides::parse(args(&["--verbose"])).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized argument: --verbose");
    }

    #[test]
    fn flags_win_over_loaded_settings() {
        let mut config = Config::default();
        config.vault.key_path = Some("/from/config.key".into());
        config.vault.vault_path = Some("/from/config.age".into());

        Overrides {
            dry_run: true,
            vault_backend: Some("age".into()),
            vault_key: Some("/from/flag.key".into()),
            ..Overrides::default()
        }
        .apply(&mut config);

        assert!(config.runner.dry_run);
        assert_eq!(config.vault.backend, "age");
        assert_eq!(config.vault.key_path.as_deref(), Some(Path::new("/from/flag.key")));
        assert_eq!(config.vault.vault_path.as_deref(), Some(Path::new("/from/config.age")));
    }

    #[test]
    fn empty_overrides_leave_config_untouched() {
        let mut config = Config::default();
        config.runner.dry_run = true;
        Overrides::default().apply(&mut config);
        assert!(config.runner.dry_run);
        assert_eq!(config.vault.backend, "env");
        assert!(config.vault.key_path.is_none());
    }

    #[test]
    #[serial]
    fn config_path_precedence() {
        unsafe { std::env::set_var("TRIAGE_CONFIG", "/etc/triage/prod.toml") };
        let from_env = Overrides::default().config_path();
        let from_flag = Overrides {
            config: Some("/tmp/adhoc.toml".into()),
            ..Overrides::default()
        }
        .config_path();
        unsafe { std::env::remove_var("TRIAGE_CONFIG") };
        let fallback = Overrides::default().config_path();

        assert_eq!(from_env, PathBuf::from("/etc/triage/prod.toml"));
        assert_eq!(from_flag, PathBuf::from("/tmp/adhoc.toml"));
        assert_eq!(fallback, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn env_backend_opens() {
        assert!(open_vault(&VaultConfig::default()).is_ok());
    }

    #[test]
    fn unknown_vault_backend_is_rejected() {
        let vault = VaultConfig {
            backend: "ssm".into(),
            ..VaultConfig::default()
        };
        let err = open_vault(&vault).err().unwrap();
        assert_eq!(err.to_string(), "unknown vault backend: ssm");
    }

    #[cfg(feature = "vault-age")]
    #[test]
    fn age_backend_needs_both_paths() {
        let vault = VaultConfig {
            backend: "age".into(),
            key_path: Some("/run/age.key".into()),
            vault_path: None,
        };
        let err = open_vault(&vault).err().unwrap();
        assert!(err.to_string().contains("vault.vault_path"));
    }

    #[cfg(feature = "vault-age")]
    #[test]
    fn age_backend_reports_unreadable_identity() {
        let vault = VaultConfig {
            backend: "age".into(),
            key_path: Some("/nonexistent/age.key".into()),
            vault_path: Some("/nonexistent/secrets.age".into()),
        };
        let err = open_vault(&vault).err().unwrap();
        assert!(format!("{err:#}").contains("/nonexistent/age.key"));
    }

    #[cfg(not(feature = "vault-age"))]
    #[test]
    fn age_backend_without_feature_is_rejected() {
        let vault = VaultConfig {
            backend: "age".into(),
            ..VaultConfig::default()
        };
        let err = open_vault(&vault).err().unwrap();
        assert!(err.to_string().contains("vault-age"));
    }
}
