//! Chrooted execution with pseudo filesystems mounted for its duration
//!
//! An invocation moves through these phases:
//!
//! ```text
//! READY -> MOUNTING -> MOUNTED -> EXECUTING -> UNMOUNTING -> DONE
//!              \-- mount error --> UNMOUNTING (completed mounts only)
//! ```
//!
//! Once mounting has begun, teardown always runs. The error reported is the
//! first one from mounting or executing; an unmount failure surfaces only
//! when everything before it succeeded.

use std::path::Path;
use std::sync::Arc;

use crate::command::{CommandLine, CommandSpec};
use crate::error::{Error, Result};
use crate::fs::ensure_directory;
use crate::mount::{MountPlan, MountStack, Mounter};
use crate::runner::{CapturedOutput, Runner};
use crate::sink::LogSink;

/// Runs commands inside a chroot through an inner runner
#[derive(Clone)]
pub struct ChrootExecutor<R, M> {
    runner: R,
    mounter: M,
    sink: Arc<dyn LogSink>,
}

impl<R, M> ChrootExecutor<R, M>
where
    R: Runner,
    M: Mounter,
{
    /// Create an executor running commands through `runner` and mounting
    /// with `mounter`; mount bookkeeping is logged to `sink`
    pub fn new(runner: R, mounter: M, sink: Arc<dyn LogSink>) -> Self {
        Self {
            runner,
            mounter,
            sink,
        }
    }

    /// Get a reference to the inner runner
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run `spec` chrooted into `root`.
    ///
    /// With `mount_pseudo_fs`, `/proc`, `/sys` and `/dev` are mounted into
    /// `root` first and detached again afterwards, whatever the outcome.
    pub async fn run_chrooted(
        &self,
        root: &Path,
        spec: CommandSpec,
        mount_pseudo_fs: bool,
    ) -> Result<CapturedOutput> {
        if !mount_pseudo_fs {
            return self.execute(root, spec).await;
        }
        self.run_with_mounts(root, &MountPlan::pseudo_filesystems(root), spec)
            .await
    }

    /// Run `spec` chrooted into `root` with the mounts of `plan` in place
    pub async fn run_with_mounts(
        &self,
        root: &Path,
        plan: &MountPlan,
        spec: CommandSpec,
    ) -> Result<CapturedOutput> {
        let mut mounted = MountStack::new();

        let outcome = match self.mount_all(plan, &mut mounted).await {
            Ok(()) => self.execute(root, spec).await,
            Err(err) => {
                self.sink.warning(&err.to_string());
                Err(err)
            }
        };

        let teardown = mounted.unwind(&self.mounter, self.sink.as_ref()).await;

        match (outcome, teardown) {
            (Err(err), _) => Err(err),
            (Ok(_), Err(err)) => Err(err),
            (Ok(output), Ok(())) => Ok(output),
        }
    }

    async fn mount_all(&self, plan: &MountPlan, mounted: &mut MountStack) -> Result<()> {
        for spec in plan.iter() {
            ensure_directory(&spec.target).map_err(|e| Error::mount_failed(&spec.target, e))?;
            self.mounter
                .mount(spec)
                .await
                .map_err(|e| Error::mount_failed(&spec.target, e))?;
            self.sink.debug(&format!(
                "Mounted {} at {}",
                spec.source.display(),
                spec.target.display()
            ));
            mounted.push(spec.clone());
        }
        Ok(())
    }

    async fn execute(&self, root: &Path, spec: CommandSpec) -> Result<CapturedOutput> {
        self.sink.debug("Execute chrooted command ...");
        self.runner.run(chroot_command(root, &spec)).await
    }
}

/// Rewrite `spec` into the shell command `chroot <root> <spec>`.
///
/// A shell script is spliced in verbatim, so only its first simple command
/// runs inside the chroot: `a && b` becomes `chroot <root> a && b` and `b`
/// runs on the host with the caller's privileges. To run a whole script
/// inside, make the chrooted command a shell, e.g. `sh -c '...'`.
pub fn chroot_command(root: &Path, spec: &CommandSpec) -> CommandSpec {
    let script = format!(
        "chroot {} {}",
        shell_words::quote(&root.to_string_lossy()),
        spec
    );
    spec.with_line(CommandLine::Shell(script))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chroot_command_wraps_shell_string() {
        let spec = CommandSpec::shell("apt-get update");
        let wrapped = chroot_command(Path::new("/srv/root"), &spec);

        assert!(wrapped.is_shell());
        assert_eq!(wrapped.to_string(), "chroot /srv/root apt-get update");
    }

    #[test]
    fn test_chroot_command_only_prefixes_first_command() {
        // The second command is outside the chroot.
        let spec = CommandSpec::shell("touch /marker && touch /host-marker");
        let wrapped = chroot_command(Path::new("/srv/root"), &spec);
        assert_eq!(
            wrapped.to_string(),
            "chroot /srv/root touch /marker && touch /host-marker"
        );

        // Wrapping in a shell keeps the whole script inside.
        let mut inner = CommandSpec::new("sh");
        inner.arg("-c").arg("apt-get update && apt-get -y upgrade");
        let wrapped = chroot_command(Path::new("/srv/root"), &inner);
        assert_eq!(
            wrapped.to_string(),
            "chroot /srv/root sh -c 'apt-get update && apt-get -y upgrade'"
        );
    }

    #[test]
    fn test_chroot_command_quotes_argv_and_root() {
        let spec = CommandSpec::builder("echo")
            .arg("a b")
            .current_dir("/")
            .build();
        let wrapped = chroot_command(Path::new("/srv/my root"), &spec);

        assert_eq!(wrapped.to_string(), "chroot '/srv/my root' echo 'a b'");
        assert_eq!(wrapped.get_current_dir(), Some(Path::new("/")));
    }
}
