use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use super::ScreenshotSource;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// Replaced with the output file in a capture command's arguments.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Grabs the screen by shelling out to the platform's capture tool and
/// writing `{dir}/{uuid}.png`.
#[derive(Debug, Clone)]
pub struct CommandScreenshotter {
    dir: PathBuf,
    program: OsString,
    args: Vec<String>,
}

impl CommandScreenshotter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let (program, args) = platform_command();
        Self::with_command(dir, program, args)
    }

    /// `args` may contain [`PATH_PLACEHOLDER`].
    pub fn with_command(
        dir: impl Into<PathBuf>,
        program: impl Into<OsString>,
        args: Vec<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            program: program.into(),
            args,
        }
    }

    async fn run_command(&self, path: &Path) -> Result<()> {
        let target = path.to_string_lossy();
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| arg.replace(PATH_PLACEHOLDER, &target))
            .collect();

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("failed to spawn {:?}", self.program))?;

        if !output.status.success() {
            bail!(
                "{:?} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ScreenshotSource for CommandScreenshotter {
    async fn capture(&self) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;

        let path = self.dir.join(format!("{}.png", Uuid::new_v4()));
        self.run_command(&path).await?;

        let check_path = path.clone();
        let dimensions = tokio::task::spawn_blocking(move || image::image_dimensions(&check_path))
            .await
            .context("screenshot validation worker join failed")?;

        match dimensions {
            Ok((width, height)) => {
                log_debug!("screenshot {} ({width}x{height})", path.display());
                Ok(path)
            }
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&path).await {
                    log_warn!("failed to remove invalid screenshot {}: {remove_err}", path.display());
                }
                Err(anyhow::Error::new(err)
                    .context(format!("screenshot {} is not a readable image", path.display())))
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn platform_command() -> (OsString, Vec<String>) {
    (
        "screencapture".into(),
        vec!["-x".into(), "-t".into(), "png".into(), PATH_PLACEHOLDER.into()],
    )
}

#[cfg(target_os = "windows")]
fn platform_command() -> (OsString, Vec<String>) {
    // Captures the monitor under the mouse cursor.
    let script = format!(
        "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; \
         $b = [System.Windows.Forms.Screen]::FromPoint([System.Windows.Forms.Cursor]::Position).Bounds; \
         $bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
         $g = [System.Drawing.Graphics]::FromImage($bmp); \
         $g.CopyFromScreen($b.Left, $b.Top, 0, 0, $bmp.Size); \
         $bmp.Save('{PATH_PLACEHOLDER}', [System.Drawing.Imaging.ImageFormat]::Png)"
    );
    (
        "powershell".into(),
        vec!["-NoProfile".into(), "-NonInteractive".into(), "-Command".into(), script],
    )
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_command() -> (OsString, Vec<String>) {
    if std::env::var_os("WAYLAND_DISPLAY").is_some() {
        ("grim".into(), vec![PATH_PLACEHOLDER.into()])
    } else {
        (
            "import".into(),
            vec!["-window".into(), "root".into(), PATH_PLACEHOLDER.into()],
        )
    }
}
