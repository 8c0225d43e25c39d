//! Pseudo filesystem mount plans and the backends that carry them out

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::error::{Error, Result};
use crate::runner::Runner;
use crate::sink::LogSink;

/// How a source is attached at its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountKind {
    /// A fresh mount of the named filesystem type (`mount -t <type>`)
    Typed(String),
    /// A plain bind mount
    Bind,
    /// A recursive bind mount, including submounts (`mount --rbind`)
    RecursiveBind,
}

/// A single mount to establish inside a chroot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Device, filesystem name or host directory
    pub source: PathBuf,
    /// Mount point, created before mounting if absent
    pub target: PathBuf,
    /// Mount flavour
    pub kind: MountKind,
    /// Mount points that may appear beneath `target` as a side effect of
    /// mounting it. Each one that exists at teardown is unmounted first.
    pub nested: Vec<PathBuf>,
}

impl MountSpec {
    /// Mount filesystem `fstype` from `source` at `target`
    pub fn typed(
        fstype: impl Into<String>,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: MountKind::Typed(fstype.into()),
            nested: Vec::new(),
        }
    }

    /// Bind `source` at `target`
    pub fn bind(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: MountKind::Bind,
            nested: Vec::new(),
        }
    }

    /// Recursively bind `source` at `target`
    pub fn rbind(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            kind: MountKind::RecursiveBind,
            ..Self::bind(source, target)
        }
    }

    /// Record a mount point that may appear beneath the target
    pub fn with_nested(mut self, path: impl Into<PathBuf>) -> Self {
        self.nested.push(path.into());
        self
    }
}

/// Ordered mounts for one chrooted invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    entries: Vec<MountSpec>,
}

impl MountPlan {
    /// The fixed pseudo filesystem template for `root`:
    /// `proc` at `<root>/proc`, host `/sys` at `<root>/sys`, host `/dev` at
    /// `<root>/dev`, the last one possibly growing `<root>/dev/pts`.
    pub fn pseudo_filesystems(root: &Path) -> Self {
        Self {
            entries: vec![
                MountSpec::typed("proc", "proc", root.join("proc")),
                MountSpec::rbind("/sys", root.join("sys")),
                MountSpec::rbind("/dev", root.join("dev")).with_nested(root.join("dev").join("pts")),
            ],
        }
    }

    /// Build a plan from arbitrary entries, mounted in the given order
    pub fn new(entries: Vec<MountSpec>) -> Self {
        Self { entries }
    }

    /// Entries in mount order
    pub fn iter(&self) -> impl Iterator<Item = &MountSpec> {
        self.entries.iter()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the plan mounts nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Backend able to establish and detach mounts
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Establish `spec`; its target directory already exists
    async fn mount(&self, spec: &MountSpec) -> Result<()>;

    /// Lazily and forcibly detach whatever is mounted at `target`
    async fn unmount(&self, target: &Path) -> Result<()>;
}

#[async_trait]
impl<M: Mounter + ?Sized> Mounter for Arc<M> {
    async fn mount(&self, spec: &MountSpec) -> Result<()> {
        (**self).mount(spec).await
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        (**self).unmount(target).await
    }
}

#[async_trait]
impl<M: Mounter + ?Sized> Mounter for Box<M> {
    async fn mount(&self, spec: &MountSpec) -> Result<()> {
        (**self).mount(spec).await
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        (**self).unmount(target).await
    }
}

/// Mounts through the `mount(2)` and `umount2(2)` syscalls
#[cfg(target_os = "linux")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallMounter;

#[cfg(target_os = "linux")]
#[async_trait]
impl Mounter for SyscallMounter {
    async fn mount(&self, spec: &MountSpec) -> Result<()> {
        use nix::mount::{MsFlags, mount};

        let (fstype, flags) = match &spec.kind {
            MountKind::Typed(fstype) => (Some(fstype.as_str()), MsFlags::empty()),
            MountKind::Bind => (None, MsFlags::MS_BIND),
            MountKind::RecursiveBind => (None, MsFlags::MS_BIND | MsFlags::MS_REC),
        };
        mount(
            Some(spec.source.as_path()),
            spec.target.as_path(),
            fstype,
            flags,
            None::<&str>,
        )?;
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        use nix::mount::{MntFlags, umount2};

        umount2(target, MntFlags::MNT_DETACH | MntFlags::MNT_FORCE)?;
        Ok(())
    }
}

/// Mounts by running the `mount` and `umount` helpers through a runner, so
/// their output is streamed and logged like any other command
#[derive(Debug, Clone)]
pub struct CommandMounter<R> {
    runner: R,
}

impl<R> CommandMounter<R> {
    /// Create a mounter running helpers through `runner`
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// The `mount` invocation establishing `spec`
    pub fn mount_command(spec: &MountSpec) -> CommandSpec {
        let mut cmd = CommandSpec::new("mount");
        match &spec.kind {
            MountKind::Typed(fstype) => cmd.arg("-t").arg(fstype),
            MountKind::Bind => cmd.arg("--bind"),
            MountKind::RecursiveBind => cmd.arg("--rbind"),
        };
        cmd.arg(&spec.source).arg(&spec.target);
        cmd
    }

    /// The lazy, forced `umount` invocation for `target`
    pub fn unmount_command(target: &Path) -> CommandSpec {
        CommandSpec::builder("umount").arg("-lf").arg(target).build()
    }
}

#[async_trait]
impl<R: Runner> Mounter for CommandMounter<R> {
    async fn mount(&self, spec: &MountSpec) -> Result<()> {
        self.runner.run(Self::mount_command(spec)).await?;
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> Result<()> {
        self.runner.run(Self::unmount_command(target)).await?;
        Ok(())
    }
}

/// Mounts that were successfully established, in mount order.
///
/// [`MountStack::unwind`] detaches them in reverse. Unwinding is async, so it
/// cannot happen on drop; a stack dropped while still holding mounts logs an
/// error naming them.
#[derive(Debug, Default)]
pub struct MountStack {
    mounted: Vec<MountSpec>,
}

impl MountStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a mount that succeeded
    pub fn push(&mut self, spec: MountSpec) {
        self.mounted.push(spec);
    }

    /// Mount points currently held, in mount order
    pub fn targets(&self) -> Vec<&Path> {
        self.mounted.iter().map(|spec| spec.target.as_path()).collect()
    }

    /// Returns true if nothing is mounted
    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }

    /// Unmount everything in strict reverse order.
    ///
    /// Every mount is attempted even after a failure. Failures are logged to
    /// `sink` as warnings; the first one is returned.
    pub async fn unwind<M: Mounter + ?Sized>(&mut self, mounter: &M, sink: &dyn LogSink) -> Result<()> {
        let mut first_error = None;

        while let Some(spec) = self.mounted.pop() {
            for nested in spec.nested.iter().rev() {
                if nested.exists() {
                    detach(mounter, sink, nested, &mut first_error).await;
                }
            }
            detach(mounter, sink, &spec.target, &mut first_error).await;
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn detach<M: Mounter + ?Sized>(
    mounter: &M,
    sink: &dyn LogSink,
    target: &Path,
    first_error: &mut Option<Error>,
) {
    match mounter.unmount(target).await {
        Ok(()) => sink.debug(&format!("Unmounted {}", target.display())),
        Err(e) => {
            let err = Error::unmount_failed(target, e);
            sink.warning(&err.to_string());
            first_error.get_or_insert(err);
        }
    }
}

impl Drop for MountStack {
    fn drop(&mut self) {
        if !self.mounted.is_empty() {
            tracing::error!(
                targets = ?self.targets(),
                "mount stack dropped before unwinding; mounts leaked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_filesystem_plan() {
        let plan = MountPlan::pseudo_filesystems(Path::new("/srv/root"));
        let entries: Vec<_> = plan.iter().collect();

        assert_eq!(plan.len(), 3);
        assert_eq!(entries[0].kind, MountKind::Typed("proc".into()));
        assert_eq!(entries[0].target, PathBuf::from("/srv/root/proc"));
        assert_eq!(entries[1].kind, MountKind::RecursiveBind);
        assert_eq!(entries[1].source, PathBuf::from("/sys"));
        assert_eq!(entries[2].source, PathBuf::from("/dev"));
        assert_eq!(entries[2].nested, vec![PathBuf::from("/srv/root/dev/pts")]);
    }

    #[test]
    fn test_mount_commands() {
        let plan = MountPlan::pseudo_filesystems(Path::new("/r"));
        let commands: Vec<String> = plan
            .iter()
            .map(|spec| CommandMounter::<()>::mount_command(spec).to_string())
            .collect();

        assert_eq!(
            commands,
            vec![
                "mount -t proc proc /r/proc",
                "mount --rbind /sys /r/sys",
                "mount --rbind /dev /r/dev",
            ]
        );
        assert_eq!(
            CommandMounter::<()>::unmount_command(Path::new("/r/dev/pts")).to_string(),
            "umount -lf /r/dev/pts"
        );
    }

    #[test]
    fn test_bind_mount_command() {
        let spec = MountSpec::bind("/var/cache", "/r/var/cache");
        assert_eq!(
            CommandMounter::<()>::mount_command(&spec).to_string(),
            "mount --bind /var/cache /r/var/cache"
        );
    }
}
