//! psu-cli - drive an instrument session from the command line

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use application::Instrument;
use domain::control::Access;
use domain::{AdapterKind, InstrumentError};
use infrastructure::SessionConfig;

/// One operation against the connected instrument
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List the model's controls
    List,
    /// Read a control
    Get { control: String },
    /// Validate and write a control
    Set { control: String, value: String },
    /// Send a raw query and print the reply
    Ask { command: String },
    /// Send a raw command without reading a reply
    Write { command: String },
    /// Drain and print the device error queue
    Errors,
    /// Clear the device error queue
    Clear,
    /// Print the identification string
    Id,
}

/// Command-line values that take precedence over the configuration files
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub simulate: bool,
    pub port: Option<String>,
    pub host: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl Overrides {
    pub fn apply(&self, config: &mut SessionConfig) -> Result<()> {
        let transports = [self.simulate, self.port.is_some(), self.host.is_some()];
        if transports.iter().filter(|set| **set).count() > 1 {
            bail!("--simulate, --port and --host are mutually exclusive");
        }

        if self.simulate {
            config.adapter = AdapterKind::Simulated;
            config.adapter_config = serde_json::Value::Null;
        }
        if let Some(port) = &self.port {
            config.adapter = AdapterKind::Serial;
            config.adapter_config = json!({ "port": port });
        }
        if let Some(host) = &self.host {
            config.adapter = AdapterKind::Tcp;
            config.adapter_config = match split_host_port(host)? {
                (h, Some(port)) => json!({ "host": h, "port": port }),
                (h, None) => json!({ "host": h }),
            };
        }
        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms == 0 {
                bail!("--timeout-ms must be greater than zero");
            }
            config.timeout_ms = Some(timeout_ms);
        }
        Ok(())
    }
}

/// Run `command` and return what should be printed
pub async fn execute(instrument: &mut Instrument, command: &Command) -> Result<String> {
    info!(instrument = %instrument.name(), ?command, "Executing command");
    let output = match command {
        Command::List => {
            let lines: Vec<String> = instrument
                .controls()
                .iter()
                .map(|control| {
                    format!(
                        "{:<10} {:<12} {:<6} {}",
                        control.name(),
                        access_label(control.access()),
                        control.value_type().as_str(),
                        control.docs()
                    )
                })
                .collect();
            lines.join("\n")
        }
        Command::Get { control } => instrument.get(control).await?.to_string(),
        Command::Set { control, value } => {
            instrument.control(control)?.set_from_input(value).await?;
            match instrument.last_commanded(control) {
                Some(applied) => format!("{} = {}", control, applied),
                None => format!("{} set", control),
            }
        }
        Command::Ask { command } => instrument.ask(command).await?,
        Command::Write { command } => {
            instrument.write(command).await?;
            String::new()
        }
        Command::Errors => match instrument.check_errors().await {
            Ok(()) => "No device errors".to_string(),
            Err(InstrumentError::Device(faults)) => faults
                .iter()
                .map(|fault| fault.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => return Err(e.into()),
        },
        Command::Clear => {
            instrument.clear_errors().await?;
            "Device errors cleared".to_string()
        }
        Command::Id => instrument.id().await?,
    };
    Ok(output)
}

/// Split `host`, `host:port`, `[v6]` or `[v6]:port`. A bare IPv6 literal
/// (more than one colon, no brackets) carries no port.
fn split_host_port(host: &str) -> Result<(&str, Option<u16>)> {
    let parse_port = |p: &str| {
        p.parse::<u16>()
            .with_context(|| format!("Invalid port in --host '{}'", host))
    };

    if let Some(rest) = host.strip_prefix('[') {
        let (addr, tail) = rest
            .split_once(']')
            .with_context(|| format!("Missing ']' in --host '{}'", host))?;
        return match tail {
            "" => Ok((addr, None)),
            _ => match tail.strip_prefix(':') {
                Some(p) => Ok((addr, Some(parse_port(p)?))),
                None => bail!("Unexpected text after ']' in --host '{}'", host),
            },
        };
    }

    match host.split_once(':') {
        Some((h, p)) if !p.contains(':') => Ok((h, Some(parse_port(p)?))),
        _ => Ok((host, None)),
    }
}

fn access_label(access: Access) -> &'static str {
    match access {
        Access::Control => "read/write",
        Access::Measurement => "read-only",
        Access::Setting => "write-only",
    }
}
