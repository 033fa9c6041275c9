//! Loading configuration objects from multi-document YAML files
//!
//! A cluster config file holds every object of a cluster separated by
//! `---`. Documents are matched on `kind`; documents that are not YAML
//! mappings or carry another kind are skipped.

use std::collections::BTreeMap;
use std::path::Path;

use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{AWSIamConfig, Cluster, MicrovmDatacenterConfig, MicrovmMachineConfig, OIDCConfig};
use crate::{Error, Result, YAML_SEPARATOR};

/// Decode every document of kind `T` in `content`
///
/// An empty result is not an error here.
pub fn parse_all<T>(content: &str) -> Result<Vec<T>>
where
    T: Resource<DynamicType = ()> + DeserializeOwned,
{
    let kind = T::kind(&()).to_string();
    let mut objects = Vec::new();

    for document in split_documents(content) {
        let value: serde_yaml::Value = match serde_yaml::from_str(document) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "skipping unparseable document");
                continue;
            }
        };
        let doc_kind = value.get("kind").and_then(serde_yaml::Value::as_str);
        if doc_kind != Some(kind.as_str()) {
            continue;
        }
        let object = serde_yaml::from_value::<T>(value).map_err(|e| {
            Error::serialization_for_kind(kind.as_str(), format!("unable to decode {kind}: {e}"))
        })?;
        objects.push(object);
    }

    Ok(objects)
}

/// Decode the first document of kind `T` in `content`
pub fn parse_one<T>(content: &str) -> Result<T>
where
    T: Resource<DynamicType = ()> + DeserializeOwned,
{
    parse_all::<T>(content)?
        .into_iter()
        .next()
        .ok_or_else(|| missing(&T::kind(&())))
}

/// Decode an optional document of kind `T`
pub fn parse_optional<T>(content: &str) -> Result<Option<T>>
where
    T: Resource<DynamicType = ()> + DeserializeOwned,
{
    Ok(parse_all::<T>(content)?.into_iter().next())
}

/// Decode the cluster object
pub fn parse_cluster(content: &str) -> Result<Cluster> {
    parse_one(content)
}

/// Decode the datacenter config
pub fn parse_datacenter_config(content: &str) -> Result<MicrovmDatacenterConfig> {
    parse_one(content)
}

/// Decode every machine config, keyed by name
///
/// Later documents with a duplicate name replace earlier ones.
pub fn parse_machine_configs(content: &str) -> Result<BTreeMap<String, MicrovmMachineConfig>> {
    let configs = parse_all::<MicrovmMachineConfig>(content)?;
    if configs.is_empty() {
        return Err(missing(&MicrovmMachineConfig::kind(&())));
    }
    Ok(configs
        .into_iter()
        .map(|config| (config.name_any(), config))
        .collect())
}

/// Decode the OIDC config, if present
pub fn parse_oidc_config(content: &str) -> Result<Option<OIDCConfig>> {
    parse_optional(content)
}

/// Decode the AWS IAM config, if present
pub fn parse_aws_iam_config(content: &str) -> Result<Option<AWSIamConfig>> {
    parse_optional(content)
}

/// Read a config file into memory
pub fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path.display().to_string(), e))
}

/// Load the cluster object from a file
pub fn get_cluster(path: &Path) -> Result<Cluster> {
    parse_cluster(&read_file(path)?)
}

/// Load the datacenter config from a file
pub fn get_datacenter_config(path: &Path) -> Result<MicrovmDatacenterConfig> {
    parse_datacenter_config(&read_file(path)?)
}

/// Load the machine configs from a file
pub fn get_machine_configs(path: &Path) -> Result<BTreeMap<String, MicrovmMachineConfig>> {
    parse_machine_configs(&read_file(path)?)
}

fn split_documents(content: &str) -> impl Iterator<Item = &str> {
    content
        .split(YAML_SEPARATOR)
        .map(|doc| doc.strip_prefix("---\n").unwrap_or(doc))
        .filter(|doc| !doc.trim().is_empty())
}

fn missing(kind: &str) -> Error {
    Error::serialization_for_kind(kind, format!("unable to find {kind} in config file"))
}
