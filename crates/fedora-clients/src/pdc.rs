//! Critical-path lookup in the Product Definition Center

use serde_json::Value;
use url::form_urlencoded;

use crate::error::{ClientError, ClientResult};

/// Default PDC component-branches endpoint
pub const PDC_COMPONENT_BRANCHES: &str =
    "https://pdc.fedoraproject.org/rest_api/v1/component-branches/";

/// Query builder for the component-branches endpoint
#[derive(Debug, Clone)]
pub struct Pdc {
    pub endpoint: String,
    /// Dist-git branch, `master` for rawhide
    pub branch: String,
}

impl Default for Pdc {
    fn default() -> Self {
        Pdc {
            endpoint: PDC_COMPONENT_BRANCHES.to_string(),
            branch: "master".to_string(),
        }
    }
}

impl Pdc {
    pub fn new(endpoint: &str, branch: &str) -> Self {
        Pdc {
            endpoint: endpoint.to_string(),
            branch: branch.to_string(),
        }
    }

    pub fn critpath_url(&self, package: &str) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("name", &self.branch)
            .append_pair("global_component", package)
            .finish();
        format!("{}?{}", self.endpoint, query)
    }
}

/// Extract the critical-path flag of the `rpm` component from a
/// component-branches response.
pub fn critical_path(response: &Value) -> ClientResult<bool> {
    let results = response
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| shape_error("missing results array"))?;

    results
        .iter()
        .find(|r| r.get("type").and_then(Value::as_str) == Some("rpm"))
        .and_then(|r| r.get("critical_path"))
        .and_then(Value::as_bool)
        .ok_or_else(|| shape_error("no rpm component with a critical_path flag"))
}

fn shape_error(reason: &str) -> ClientError {
    ClientError::UnexpectedShape {
        source_name: "pdc".to_string(),
        reason: reason.to_string(),
    }
}
