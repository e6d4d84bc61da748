//! Opening the panel's ports
//!
//! Best-effort only: a host without ufw or firewalld gets a warning, and a
//! failing firewall command never fails an install.

use declarative::{Invocation, Runner};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum FirewallWarning {
    #[error("no supported firewall (ufw or firewalld) found; open port(s) {0} manually")]
    NoFirewall(String),

    #[error("{tool} could not open {port}/tcp: {message}")]
    Command {
        tool: FirewallTool,
        port: u16,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallTool {
    Ufw,
    Firewalld,
}

impl FirewallTool {
    /// First supported tool for which `exists` returns true
    pub fn detect(exists: impl Fn(&str) -> bool) -> Option<Self> {
        if exists("ufw") {
            Some(Self::Ufw)
        } else if exists("firewall-cmd") {
            Some(Self::Firewalld)
        } else {
            None
        }
    }

    fn program(&self) -> &'static str {
        match self {
            Self::Ufw => "ufw",
            Self::Firewalld => "firewall-cmd",
        }
    }

    /// Whether `port` is already allowed
    pub fn is_open(&self, port: u16, runner: &dyn Runner) -> bool {
        match self {
            Self::Ufw => {
                let rule = format!("{port}/tcp");
                runner
                    .run_capture(&Invocation::new("ufw").arg("status"))
                    .map(|out| {
                        out.lines().any(|line| {
                            line.split_whitespace().next() == Some(rule.as_str())
                                && line.contains("ALLOW")
                        })
                    })
                    .unwrap_or(false)
            }
            Self::Firewalld => runner
                .run_status(
                    &Invocation::new("firewall-cmd").arg(format!("--query-port={port}/tcp")),
                )
                .unwrap_or(false),
        }
    }

    fn allow(&self, port: u16) -> Invocation {
        match self {
            Self::Ufw => Invocation::new("ufw").args(["allow".to_string(), format!("{port}/tcp")]),
            Self::Firewalld => Invocation::new("firewall-cmd")
                .args(["--permanent".to_string(), format!("--add-port={port}/tcp")]),
        }
    }

    /// Allow each port; firewalld is reloaded once at the end
    pub fn open(&self, ports: &[u16], runner: &dyn Runner) -> Result<(), FirewallWarning> {
        for &port in ports {
            runner
                .run_checked(&self.allow(port))
                .map_err(|e| FirewallWarning::Command {
                    tool: *self,
                    port,
                    message: format!("{e:#}"),
                })?;
            log::info!("{} allowed {}/tcp", self, port);
        }

        if *self == Self::Firewalld && !ports.is_empty() {
            runner
                .run_checked(&Invocation::new("firewall-cmd").arg("--reload"))
                .map_err(|e| FirewallWarning::Command {
                    tool: *self,
                    port: ports[0],
                    message: format!("{e:#}"),
                })?;
        }
        Ok(())
    }
}

impl fmt::Display for FirewallTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Comma-separated port list for messages
pub fn port_list(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
