//! Command-line interface definitions for the `mooring` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `mooring` binary.
#[derive(Debug, Parser)]
#[command(
    name = "mooring",
    about = "Attach and detach Scaleway block volumes, waiting for the control plane to converge",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Attach a volume and record the attachment.
    #[command(name = "attach", about = "Attach a volume and record the attachment")]
    Attach(AttachmentArgs),
    /// Check whether a recorded attachment still exists.
    #[command(
        name = "status",
        about = "Check whether a recorded attachment still exists"
    )]
    Status(AttachmentArgs),
    /// Stop the instance, detach the volume, and forget the attachment.
    #[command(
        name = "detach",
        about = "Stop the instance, detach the volume, and forget the attachment"
    )]
    Detach(AttachmentArgs),
}

/// Identifies one volume attachment.
#[derive(Clone, Debug, Args)]
pub(crate) struct AttachmentArgs {
    /// Device name requested for the volume (for example `/dev/sdh`).
    ///
    /// Together with the instance and volume IDs it determines the
    /// attachment identity recorded in the state file.
    #[arg(long, value_name = "DEVICE")]
    pub(crate) device_name: String,
    /// Instance that receives the volume.
    #[arg(long, value_name = "ID")]
    pub(crate) instance_id: String,
    /// Volume to attach.
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: String,
    /// Detach even when the platform reports the volume busy.
    #[arg(long)]
    pub(crate) force_detach: bool,
    /// On detach, forget the attachment without contacting the platform.
    #[arg(long)]
    pub(crate) skip_destroy: bool,
}
