//! Diff command

use std::path::PathBuf;

use clap::Args;
use serde_json::json;

use microvm_capi::{
    change_diff, needs_new_control_plane_template, needs_new_etcd_template,
    needs_new_workload_template,
};
use microvm_common::spec::ClusterSpec;

use super::load_spec;
use crate::Result;

#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Cluster config currently applied
    #[arg(long)]
    pub current_cluster_config: PathBuf,

    /// Bundle release currently applied
    #[arg(long)]
    pub current_bundle: PathBuf,

    /// Desired cluster config
    #[arg(long, env = "MICROVM_CLUSTER_CONFIG")]
    pub new_cluster_config: PathBuf,

    /// Desired bundle release
    #[arg(long, env = "MICROVM_BUNDLE")]
    pub new_bundle: PathBuf,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: DiffArgs) -> Result<()> {
    let current = load_spec(&args.current_cluster_config, &args.current_bundle)?;
    let new = load_spec(&args.new_cluster_config, &args.new_bundle)?;
    let report = diff_report(&current, &new);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", format_report(&report));
    }
    Ok(())
}

/// Upgrade decisions between two specs as a JSON document
pub fn diff_report(current: &ClusterSpec, new: &ClusterSpec) -> serde_json::Value {
    let component = change_diff(current, new).map(|diff| {
        json!({
            "componentName": diff.component_name,
            "oldVersion": diff.old_version,
            "newVersion": diff.new_version,
        })
    });
    json!({
        "controlPlaneTemplate": needs_new_control_plane_template(current, new),
        "workloadTemplate": needs_new_workload_template(current, new),
        "etcdTemplate": needs_new_etcd_template(current, new),
        "componentChange": component,
    })
}

fn format_report(report: &serde_json::Value) -> String {
    let flag = |key: &str| {
        if report[key].as_bool().unwrap_or(false) {
            "regenerate"
        } else {
            "keep"
        }
    };
    let mut out = format!(
        "control plane template: {}\nworkload template: {}\netcd template: {}\n",
        flag("controlPlaneTemplate"),
        flag("workloadTemplate"),
        flag("etcdTemplate"),
    );
    match report["componentChange"].as_object() {
        Some(change) => out.push_str(&format!(
            "{}: {} -> {}\n",
            change["componentName"].as_str().unwrap_or_default(),
            change["oldVersion"].as_str().unwrap_or_default(),
            change["newVersion"].as_str().unwrap_or_default(),
        )),
        None => out.push_str("provider version unchanged\n"),
    }
    out
}
