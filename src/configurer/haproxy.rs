//! HAProxy configurer.
//!
//! # Responsibilities
//! - Render the base template plus one `listen` block per external port
//! - Stage, syntax-check and atomically activate the result
//! - Trigger a graceful reload so established connections survive
//!
//! # Design Decisions
//! - The base template is read once at startup; an unreadable template is fatal
//! - Applies are serialized so two callers never share the staging file
//! - The staging file sits next to the live file, keeping the rename atomic

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, PoisonError};

use crate::config::LoadBalancerConfig;
use crate::configurer::{ConfigureError, RouterConfigurer};
use crate::routing::RoutingTableSnapshot;

/// Render the full configuration text for `snapshot`.
///
/// Ports come out ascending and backends sorted by (address, port), so equal
/// snapshots always produce byte-identical output.
pub fn render_config(base: &str, snapshot: &RoutingTableSnapshot) -> String {
    let mut out = String::with_capacity(base.len() + snapshot.len() * 128);
    out.push_str(base);
    if !base.is_empty() && !base.ends_with('\n') {
        out.push('\n');
    }

    for (port, backends) in snapshot.iter() {
        // Writing into a String cannot fail.
        let _ = write!(
            out,
            "\nlisten listen_cfg_{port}\n  mode tcp\n  bind :{port}\n"
        );
        for backend in backends {
            let _ = writeln!(
                out,
                "  server server_{}_{} {}:{}",
                backend.address, backend.port, backend.address, backend.port
            );
        }
    }

    out
}

pub struct HaProxyConfigurer {
    base_config: String,
    config_path: PathBuf,
    validate_command: Vec<String>,
    reload_command: Vec<String>,
    apply_lock: Mutex<()>,
}

impl HaProxyConfigurer {
    /// Read the base template and build the configurer.
    pub fn new(config: &LoadBalancerConfig) -> Result<Self, ConfigureError> {
        let base_config = fs::read_to_string(&config.base_config_path).map_err(|source| {
            ConfigureError::BaseConfig {
                path: config.base_config_path.clone(),
                source,
            }
        })?;

        tracing::info!(
            base_config = %config.base_config_path.display(),
            config = %config.config_path.display(),
            "HAProxy configurer ready"
        );

        Ok(Self {
            base_config,
            config_path: config.config_path.clone(),
            validate_command: config.validate_command.clone(),
            reload_command: config.reload_command.clone(),
            apply_lock: Mutex::new(()),
        })
    }

    pub fn render(&self, snapshot: &RoutingTableSnapshot) -> String {
        render_config(&self.base_config, snapshot)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn staging_path(&self) -> PathBuf {
        let mut path = self.config_path.clone().into_os_string();
        path.push(".tmp");
        PathBuf::from(path)
    }

    fn validate(&self, staged: &Path) -> Result<(), ConfigureError> {
        if self.validate_command.is_empty() {
            return Ok(());
        }

        let (status, output) = run_command(&self.validate_command, Some(staged))?;
        if status {
            Ok(())
        } else {
            Err(ConfigureError::Invalid {
                path: staged.to_path_buf(),
                output,
            })
        }
    }

    fn reload(&self) -> Result<(), ConfigureError> {
        if self.reload_command.is_empty() {
            return Ok(());
        }

        let (status, output) = run_command(&self.reload_command, None)?;
        if status {
            Ok(())
        } else {
            Err(ConfigureError::Reload { output })
        }
    }
}

impl RouterConfigurer for HaProxyConfigurer {
    fn configure(&self, snapshot: &RoutingTableSnapshot) -> Result<(), ConfigureError> {
        let _guard = self.apply_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let rendered = self.render(snapshot);
        let staged = self.staging_path();

        fs::write(&staged, rendered.as_bytes()).map_err(|source| ConfigureError::Write {
            path: staged.clone(),
            source,
        })?;

        if let Err(e) = self.validate(&staged) {
            discard(&staged);
            return Err(e);
        }

        if let Err(source) = fs::rename(&staged, &self.config_path) {
            discard(&staged);
            return Err(ConfigureError::Swap {
                path: self.config_path.clone(),
                source,
            });
        }

        tracing::debug!(
            path = %self.config_path.display(),
            ports = snapshot.len(),
            "configuration activated"
        );

        self.reload()
    }
}

fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged) {
        tracing::warn!(path = %staged.display(), error = %e, "failed to remove staged configuration");
    }
}

/// Run `argv` (plus an optional trailing path) and return whether it succeeded
/// together with its combined, trimmed output.
fn run_command(argv: &[String], extra: Option<&Path>) -> Result<(bool, String), ConfigureError> {
    let Some((program, args)) = argv.split_first() else {
        return Ok((true, String::new()));
    };

    let mut command = Command::new(program);
    command.args(args);
    if let Some(path) = extra {
        command.arg(path);
    }

    let output = command.output().map_err(|source| ConfigureError::Command {
        command: argv.join(" "),
        source,
    })?;

    let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stdout));
    Ok((output.status.success(), text.trim().to_string()))
}
