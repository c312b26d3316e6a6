// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The sandbox policy a plugin invocation is wrapped in (spec.md §4.4.2,
//! §9 "Sandbox policy"): deny network, restrict writes to an allowlist,
//! identity when no sandbox primitive is available.
//!
//! Grounded on the teacher's `container` crate, whose `Container::run()`
//! builds a Linux mount/network-namespace sandbox via `nix::sched::unshare`
//! plus a bind-mount allowlist, for pivoting a full package build into a
//! dedicated root filesystem. A plugin invocation only needs to wrap one
//! already-compiled executable's `Command` before `spawn()` — there is no
//! root filesystem to pivot into, so this module doesn't `pivot_root` —
//! but it reuses `container::pivot`'s other trick of recursively
//! remounting a tree read-only and then reopening just the allowlist:
//! after `unshare(CLONE_NEWNET | CLONE_NEWNS)`, `/` is made private and
//! recursively remounted read-only, then each `writable` (and the cache
//! dir) is individually bind-remounted read-write on top of that. Writes
//! outside `writableDirectories ∪ {cacheDir}` hit `EROFS`, matching
//! spec.md:147(b); `readable` entries stay read-only.

use std::path::PathBuf;

use tokio::process::Command;

/// Builder for the sandbox a compiled plugin executable runs under.
/// `writable_directories` is additive; the plugin cache directory is always
/// included (spec.md §9).
#[derive(Debug, Clone)]
pub struct SandboxPolicy {
    enabled: bool,
    writable_directories: Vec<PathBuf>,
    read_directories: Vec<PathBuf>,
}

impl SandboxPolicy {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            writable_directories: vec![cache_dir.into()],
            read_directories: Vec::new(),
        }
    }

    pub fn writable(mut self, dir: impl Into<PathBuf>) -> Self {
        self.writable_directories.push(dir.into());
        self
    }

    pub fn readable(mut self, dir: impl Into<PathBuf>) -> Self {
        self.read_directories.push(dir.into());
        self
    }

    /// Disables sandboxing entirely. The resulting policy is the identity:
    /// argv is left untouched (spec.md §9 "on platforms without a sandbox
    /// primitive... it is the identity").
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn writable_directories(&self) -> &[PathBuf] {
        &self.writable_directories
    }

    /// Wrap `command` so that, once spawned, the child runs under this
    /// policy. On non-Linux targets, or when disabled, this is a no-op.
    pub fn apply(&self, command: &mut Command) {
        if !self.enabled {
            return;
        }
        #[cfg(target_os = "linux")]
        linux::apply(self, command);
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::os::unix::process::CommandExt;

    use nix::mount::{mount, MsFlags};
    use nix::sched::{unshare, CloneFlags};

    use super::SandboxPolicy;
    use tokio::process::Command;

    pub(super) fn apply(policy: &SandboxPolicy, command: &mut Command) {
        let writable = policy.writable_directories.clone();
        let readable = policy.read_directories.clone();

        // SAFETY: the closure only calls async-signal-safe syscalls
        // (unshare, mount) between fork and exec, matching the contract
        // `CommandExt::pre_exec` requires.
        unsafe {
            command.pre_exec(move || {
                // CLONE_NEWNET without any interface configuration leaves
                // the child with only a loopback-less, unreachable network
                // namespace — network access is denied by absence, the
                // same technique `container::Container::networking(false)`
                // uses for full builds.
                unshare(CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWNS).map_err(std::io::Error::from)?;

                // `container::pivot` starts the same way: make the whole
                // tree private so these mount changes don't leak back to
                // the parent namespace.
                mount(None::<&str>, "/", None::<&str>, MsFlags::MS_REC | MsFlags::MS_PRIVATE, None::<&str>)
                    .map_err(std::io::Error::from)?;

                // Recursive read-only bind remount of the whole tree: a
                // plain `MS_REMOUNT | MS_RDONLY` on "/" would refuse
                // (not a dedicated mountpoint), so bind it onto itself
                // first, then remount that bind read-only.
                mount(Some("/"), "/", None::<&str>, MsFlags::MS_BIND | MsFlags::MS_REC, None::<&str>)
                    .map_err(std::io::Error::from)?;
                mount(
                    None::<&str>,
                    "/",
                    None::<&str>,
                    MsFlags::MS_REMOUNT | MsFlags::MS_BIND | MsFlags::MS_REC | MsFlags::MS_RDONLY,
                    None::<&str>,
                )
                .map_err(std::io::Error::from)?;

                // Reopen the allowlist on top of the now read-only tree.
                // A bind mount inherits read-only from its parent mount
                // unless explicitly remounted, so each writable directory
                // needs its own bind-then-remount-read-write pair.
                for dir in &writable {
                    bind_writable(dir)?;
                }
                for dir in &readable {
                    bind_self(dir)?;
                }

                Ok(())
            });
        }
    }

    /// Bind-mount `dir` onto itself so it survives as an explicit entry in
    /// the new mount namespace rather than relying on whatever the parent
    /// namespace happened to have mounted there. Left read-only by the
    /// recursive remount of `/` that precedes this call.
    fn bind_self(dir: &std::path::Path) -> std::io::Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        mount(Some(dir), dir, None::<&str>, MsFlags::MS_BIND, None::<&str>).map_err(std::io::Error::from)
    }

    /// Like [`bind_self`], but explicitly remounted read-write so it's
    /// writable despite the read-only tree it sits in.
    fn bind_writable(dir: &std::path::Path) -> std::io::Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        mount(Some(dir), dir, None::<&str>, MsFlags::MS_BIND, None::<&str>).map_err(std::io::Error::from)?;
        mount(
            None::<&str>,
            dir,
            None::<&str>,
            MsFlags::MS_REMOUNT | MsFlags::MS_BIND,
            None::<&str>,
        )
        .map_err(std::io::Error::from)
    }
}

/// `true` iff this platform has a sandbox primitive this policy can enforce.
pub fn platform_supports_sandboxing() -> bool {
    cfg!(target_os = "linux")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writable_directories_always_include_the_cache_dir() {
        let policy = SandboxPolicy::new("/cache");
        assert_eq!(policy.writable_directories(), &[PathBuf::from("/cache")]);
    }

    #[test]
    fn writable_is_additive() {
        let policy = SandboxPolicy::new("/cache").writable("/workdir");
        assert_eq!(
            policy.writable_directories(),
            &[PathBuf::from("/cache"), PathBuf::from("/workdir")]
        );
    }

    #[test]
    fn disabled_policy_does_not_touch_the_command() {
        let policy = SandboxPolicy::new("/cache").disabled();
        let mut command = Command::new("true");
        policy.apply(&mut command);
        // No assertion beyond "doesn't panic": disabling is the identity,
        // there's nothing observable on the `Command` to check here.
    }
}
