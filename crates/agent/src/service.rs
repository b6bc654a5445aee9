// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-manager registration: systemd on POSIX, SCM on Windows.

use anyhow::Context;

const SERVICE_NAME: &str = "phpborg-agent";

#[cfg(unix)]
pub(crate) async fn install() -> anyhow::Result<()> {
    let exec_path = std::env::current_exe().context("failed to get executable path")?;
    let exec_path = tokio::fs::canonicalize(&exec_path)
        .await
        .context("failed to resolve executable path")?;

    let unit = format!(
        r#"[Unit]
Description=phpBorg Backup Agent
After=network.target

[Service]
Type=simple
ExecStart={}
Restart=always
RestartSec=10
User=root
WorkingDirectory=/

# Logging
StandardOutput=journal
StandardError=journal
SyslogIdentifier={}

[Install]
WantedBy=multi-user.target
"#,
        exec_path.display(),
        SERVICE_NAME
    );

    let unit_path = format!("/etc/systemd/system/{}.service", SERVICE_NAME);
    std::fs::write(&unit_path, unit)
        .with_context(|| format!("failed to write service file {}", unit_path))?;

    systemctl(&["daemon-reload"]).await?;
    systemctl(&["enable", SERVICE_NAME]).await?;

    println!("Service file created: {}", unit_path);
    println!("Start with: systemctl start {}", SERVICE_NAME);
    Ok(())
}

#[cfg(unix)]
pub(crate) async fn uninstall() -> anyhow::Result<()> {
    // Stop and disable are best-effort; the unit may not be running.
    let _ = tokio::process::Command::new("systemctl")
        .args(["stop", SERVICE_NAME])
        .status()
        .await;
    let _ = tokio::process::Command::new("systemctl")
        .args(["disable", SERVICE_NAME])
        .status()
        .await;

    let unit_path = format!("/etc/systemd/system/{}.service", SERVICE_NAME);
    match std::fs::remove_file(&unit_path) {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error).with_context(|| format!("failed to remove {}", unit_path));
        }
    }

    let _ = tokio::process::Command::new("systemctl")
        .args(["daemon-reload"])
        .status()
        .await;
    Ok(())
}

#[cfg(unix)]
async fn systemctl(args: &[&str]) -> anyhow::Result<()> {
    let status = tokio::process::Command::new("systemctl")
        .args(args)
        .status()
        .await
        .with_context(|| format!("failed to run systemctl {}", args.join(" ")))?;
    anyhow::ensure!(status.success(), "systemctl {} failed", args.join(" "));
    Ok(())
}

#[cfg(windows)]
pub(crate) async fn install() -> anyhow::Result<()> {
    let exec_path = std::env::current_exe().context("failed to get executable path")?;
    let bin_path = format!("\"{}\"", exec_path.display());

    sc(&[
        "create",
        SERVICE_NAME,
        "binPath=",
        &bin_path,
        "start=",
        "auto",
        "DisplayName=",
        "phpBorg Backup Agent",
    ])
    .await?;
    // Restart on failure with a 10-second backoff.
    sc(&[
        "failure",
        SERVICE_NAME,
        "reset=",
        "86400",
        "actions=",
        "restart/10000",
    ])
    .await?;
    Ok(())
}

#[cfg(windows)]
pub(crate) async fn uninstall() -> anyhow::Result<()> {
    let _ = tokio::process::Command::new("sc.exe")
        .args(["stop", SERVICE_NAME])
        .status()
        .await;
    sc(&["delete", SERVICE_NAME]).await
}

#[cfg(windows)]
async fn sc(args: &[&str]) -> anyhow::Result<()> {
    let status = tokio::process::Command::new("sc.exe")
        .args(args)
        .status()
        .await
        .with_context(|| format!("failed to run sc {}", args.join(" ")))?;
    anyhow::ensure!(status.success(), "sc {} failed", args.join(" "));
    Ok(())
}
