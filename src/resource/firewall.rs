//! Firewall step

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};

use crate::firewall::{FirewallTool, FirewallWarning, port_list};

/// The panel's ports are allowed by whichever firewall the host runs
pub struct FirewallPorts {
    ports: Vec<u16>,
    detect: fn(&str) -> bool,
}

impl FirewallPorts {
    pub fn new(ports: Vec<u16>, detect: fn(&str) -> bool) -> Self {
        Self { ports, detect }
    }

    fn tool(&self) -> Option<FirewallTool> {
        FirewallTool::detect(self.detect)
    }
}

impl Resource for FirewallPorts {
    fn id(&self) -> String {
        "firewall".to_string()
    }

    fn description(&self) -> String {
        format!("Open port(s) {}", port_list(&self.ports))
    }

    fn resource_type(&self) -> &'static str {
        "firewall"
    }

    fn current_state(&self, ctx: &ApplyContext) -> Result<ResourceState> {
        let Some(tool) = self.tool() else {
            return Ok(ResourceState::Unknown);
        };
        let closed: Vec<u16> = self
            .ports
            .iter()
            .copied()
            .filter(|port| !tool.is_open(*port, ctx.runner))
            .collect();
        Ok(if closed.is_empty() {
            ResourceState::Present { details: None }
        } else {
            ResourceState::Modified {
                from: format!("closed {}", port_list(&closed)),
                to: "open".to_string(),
            }
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present { details: None }
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let Some(tool) = self.tool() else {
            return Err(FirewallWarning::NoFirewall(port_list(&self.ports)).into());
        };
        tool.open(&self.ports, ctx.runner)?;
        Ok(ApplyResult::Modified)
    }
}
