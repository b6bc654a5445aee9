// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime detection: containers, compose projects, networks,
//! volumes and host configuration.

use serde_json::{json, Map, Value};

use crate::cmd::{self, LIST_TIMEOUT, PROBE_TIMEOUT, UNIT_TIMEOUT};

pub(crate) async fn detect_docker() -> Value {
    let mut info = json!({
        "installed": false,
        "running": false,
        "version": null,
        "containers": [],
        "networks": [],
        "volumes": [],
        "compose_projects": {},
        "standalone_containers": [],
        "container_count": 0,
        "network_count": 0,
        "volume_count": 0,
        "compose_project_count": 0,
        "standalone_container_count": 0,
        "host_config": {
            "config_path": "/etc/docker",
            "config_exists": false,
            "daemon_json_exists": false,
            "daemon_json_path": "/etc/docker/daemon.json",
        },
    });

    if !cmd::on_path("docker").await {
        return info;
    }
    info["installed"] = json!(true);

    let version = cmd::run("docker", &["--version"], PROBE_TIMEOUT).await;
    if version.success() {
        info["version"] = json!(version.stdout.trim());
    }

    if !cmd::unit_active("docker").await {
        return info;
    }
    info["running"] = json!(true);

    // The socket may only be reachable through sudo when the agent user is
    // not in the docker group.
    let needs_sudo = {
        let plain = cmd::run("docker", &["ps", "-q"], UNIT_TIMEOUT).await;
        if plain.success() {
            false
        } else {
            cmd::run_sudo("docker", &["ps", "-q"], UNIT_TIMEOUT).await.success()
        }
    };

    info["host_config"] = detect_host_config().await;

    let mut containers = Vec::new();
    let mut compose_projects = Map::new();
    let mut standalone = Vec::new();

    let ps = docker(
        needs_sudo,
        &[
            "ps",
            "-a",
            "--format",
            "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}|{{.State}}",
        ],
        LIST_TIMEOUT,
    )
    .await;
    if !ps.success() {
        tracing::debug!(stderr = %ps.stderr.trim(), "container listing failed");
    } else {
        for line in ps.stdout.lines() {
            let Some(listing) = parse_ps_line(line) else {
                continue;
            };

            let inspect = docker(needs_sudo, &["inspect", &listing.id], PROBE_TIMEOUT).await;
            let mut details = if inspect.success() {
                parse_inspect(&inspect.stdout)
            } else {
                ContainerDetails::default()
            };

            // Standalone containers: go looking for the Dockerfile behind
            // their bind mounts.
            if details.compose_project.is_none() && details.dockerfile_path.is_none() {
                details.dockerfile_path = find_dockerfile_in_mounts(&details.volumes).await;
            }

            if let Some(project) = &details.compose_project {
                let entry = compose_projects.entry(project.clone()).or_insert_with(|| {
                    json!({
                        "name": project,
                        "working_dir": details.working_dir,
                        "compose_file": details.compose_file,
                        "containers": [],
                    })
                });
                if let Some(names) = entry["containers"].as_array_mut() {
                    names.push(json!(listing.name));
                }
            } else if let Some(dockerfile) = &details.dockerfile_path {
                standalone.push(json!({
                    "name": listing.name,
                    "image": listing.image,
                    "dockerfile_path": dockerfile,
                    "volumes": details.volumes,
                }));
            }

            let is_standalone = details.compose_project.is_none();
            containers.push(json!({
                "id": listing.id,
                "name": listing.name,
                "image": listing.image,
                "status": listing.status,
                "state": listing.state,
                "volumes": details.volumes,
                "compose_project": details.compose_project,
                "compose_file": details.compose_file,
                "working_dir": details.working_dir,
                "networks": details.networks,
                "is_standalone": is_standalone,
                "dockerfile_path": details.dockerfile_path,
            }));
        }
    }

    let networks = detect_networks(needs_sudo).await;
    let volumes = detect_volumes(needs_sudo).await;

    info["container_count"] = json!(containers.len());
    info["network_count"] = json!(networks.len());
    info["volume_count"] = json!(volumes.len());
    info["compose_project_count"] = json!(compose_projects.len());
    info["standalone_container_count"] = json!(standalone.len());
    info["containers"] = Value::Array(containers);
    info["networks"] = Value::Array(networks);
    info["volumes"] = Value::Array(volumes);
    info["compose_projects"] = Value::Object(compose_projects);
    info["standalone_containers"] = Value::Array(standalone);

    info
}

async fn docker(
    needs_sudo: bool,
    args: &[&str],
    timeout: std::time::Duration,
) -> pba_adapters::ExecResult {
    if needs_sudo {
        cmd::run_sudo("docker", args, timeout).await
    } else {
        cmd::run("docker", args, timeout).await
    }
}

async fn detect_host_config() -> Value {
    let mut config = json!({
        "config_path": "/etc/docker",
        "config_exists": false,
        "daemon_json_exists": false,
        "daemon_json_path": "/etc/docker/daemon.json",
    });
    if tokio::fs::metadata("/etc/docker").await.is_ok() {
        config["config_exists"] = json!(true);
    }
    if tokio::fs::metadata("/etc/docker/daemon.json").await.is_ok() {
        config["daemon_json_exists"] = json!(true);
    }
    config
}

async fn detect_networks(needs_sudo: bool) -> Vec<Value> {
    let result = docker(
        needs_sudo,
        &[
            "network",
            "ls",
            "--format",
            "{{.ID}}|{{.Name}}|{{.Driver}}|{{.Scope}}",
        ],
        PROBE_TIMEOUT,
    )
    .await;
    if !result.success() {
        return Vec::new();
    }
    result
        .stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 4 {
                return None;
            }
            Some(json!({
                "id": parts[0],
                "name": parts[1],
                "driver": parts[2],
                "scope": parts[3],
            }))
        })
        .collect()
}

async fn detect_volumes(needs_sudo: bool) -> Vec<Value> {
    let result = docker(
        needs_sudo,
        &[
            "volume",
            "ls",
            "--format",
            "{{.Name}}|{{.Driver}}|{{.Mountpoint}}",
        ],
        PROBE_TIMEOUT,
    )
    .await;
    if !result.success() {
        return Vec::new();
    }
    result
        .stdout
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 2 {
                return None;
            }
            let mountpoint = if parts.len() >= 3 && !parts[2].is_empty() {
                parts[2].to_string()
            } else {
                format!("/var/lib/docker/volumes/{}", parts[0])
            };
            Some(json!({
                "name": parts[0],
                "driver": parts[1],
                "mountpoint": mountpoint,
            }))
        })
        .collect()
}

async fn find_dockerfile_in_mounts(volumes: &[Value]) -> Option<String> {
    for volume in volumes {
        if volume["type"].as_str() != Some("bind") {
            continue;
        }
        let Some(source) = volume["source"].as_str() else {
            continue;
        };

        for dir in [source.to_string(), parent_dir(source)] {
            let candidate = format!("{}/Dockerfile", dir);
            if tokio::fs::metadata(&candidate)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return Some(candidate);
            }
        }
    }
    None
}

fn parent_dir(path: &str) -> String {
    std::path::Path::new(path)
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| path.to_string())
}

// ── Output parsing ───────────────────────────────────────────────────

pub(crate) struct ContainerListing {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
}

/// Parse one `docker ps --format '{{.ID}}|…'` line.
pub(crate) fn parse_ps_line(line: &str) -> Option<ContainerListing> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 5 {
        return None;
    }
    Some(ContainerListing {
        id: parts[0].to_string(),
        name: parts[1].to_string(),
        image: parts[2].to_string(),
        status: parts[3].to_string(),
        state: parts[4].to_string(),
    })
}

#[derive(Default)]
pub(crate) struct ContainerDetails {
    pub volumes: Vec<Value>,
    pub compose_project: Option<String>,
    pub compose_file: Option<String>,
    pub working_dir: Option<String>,
    pub networks: Vec<String>,
    pub dockerfile_path: Option<String>,
}

/// Extract mounts, compose labels and networks from `docker inspect` JSON.
pub(crate) fn parse_inspect(inspect_json: &str) -> ContainerDetails {
    let mut details = ContainerDetails::default();

    let Ok(parsed) = serde_json::from_str::<Vec<Value>>(inspect_json) else {
        return details;
    };
    let Some(container) = parsed.first() else {
        return details;
    };

    if let Some(mounts) = container["Mounts"].as_array() {
        for mount in mounts {
            match mount["Type"].as_str() {
                Some("bind") => {
                    if let Some(source) = mount["Source"].as_str() {
                        details.volumes.push(json!({
                            "type": "bind",
                            "source": source,
                            "destination": mount["Destination"],
                            "mode": mount["Mode"],
                        }));
                    }
                }
                Some("volume") => {
                    details.volumes.push(json!({
                        "type": "volume",
                        "name": mount["Name"],
                        "source": mount["Source"],
                        "destination": mount["Destination"],
                    }));
                }
                _ => {}
            }
        }
    }

    let labels = &container["Config"]["Labels"];
    details.compose_project = labels["com.docker.compose.project"]
        .as_str()
        .map(str::to_string);
    details.working_dir = labels["com.docker.compose.project.working_dir"]
        .as_str()
        .map(str::to_string);
    details.compose_file = labels["com.docker.compose.project.config_files"]
        .as_str()
        .map(str::to_string);
    details.dockerfile_path = labels["dockerfile"]
        .as_str()
        .or_else(|| labels["build.context"].as_str())
        .map(str::to_string);

    if let Some(networks) = container["NetworkSettings"]["Networks"].as_object() {
        details.networks = networks.keys().cloned().collect();
    }

    details
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;
