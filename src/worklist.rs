//! Turns a scan configuration into the ordered items a run will process.

use serde::{Deserialize, Serialize};

use crate::ports;
use crate::types::Endpoint;

/// Anything the controller can walk over.
pub trait WorkItem: Clone + Send + Sync + 'static {
    /// Identifier exposed as `currentItemId` while the item is in flight.
    fn item_id(&self) -> String;
}

impl WorkItem for Endpoint {
    fn item_id(&self) -> String {
        self.id.clone()
    }
}

impl WorkItem for u16 {
    fn item_id(&self) -> String {
        self.to_string()
    }
}

/// Which ports a port scan covers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum PortSelection {
    /// The well-known table.
    #[default]
    Common,
    /// Inclusive `"start-end"`.
    Range(String),
    /// Comma-separated `"a,b,c"`.
    Custom(String),
}

/// Endpoints of `project_id`, in storage order.
pub fn build_http_worklist(endpoints: &[Endpoint], project_id: &str) -> Vec<Endpoint> {
    endpoints
        .iter()
        .filter(|ep| ep.project_id == project_id)
        .cloned()
        .collect()
}

pub fn build_port_worklist(selection: &PortSelection) -> Vec<u16> {
    match selection {
        PortSelection::Common => ports::common_ports(),
        PortSelection::Range(r) => ports::parse_port_range(r),
        PortSelection::Custom(list) => ports::parse_port_list(list),
    }
}
