//! Fixtures for pipeline tests: server archives, deployment trees and a
//! recording process controller.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::SimpleFileOptions;

use crate::process::{ControlFuture, ProcessController};

/// Builds an in-memory zip archive.
#[derive(Default)]
pub struct ZipFixture {
    entries: Vec<(String, Option<Vec<u8>>, Option<u32>)>,
}

impl ZipFixture {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive shaped like a server distribution: an executable, a
    /// properties file and a default world directory.
    pub fn server_distribution(version: &str) -> Self {
        Self::new()
            .file_with_mode("bedrock_server", b"#!/bin/sh\n".as_slice(), 0o755)
            .file("server.properties", format!("server-name=Dedicated Server\n# {version}\n"))
            .file("worlds/Bedrock level/level.dat", "vanilla")
    }

    /// Add a file with default permissions.
    pub fn file(mut self, name: &str, content: impl Into<Vec<u8>>) -> Self {
        self.entries.push((name.to_string(), Some(content.into()), None));
        self
    }

    /// Add a file with explicit Unix permission bits.
    pub fn file_with_mode(mut self, name: &str, content: impl Into<Vec<u8>>, mode: u32) -> Self {
        self.entries.push((name.to_string(), Some(content.into()), Some(mode)));
        self
    }

    /// Add an explicit directory entry.
    pub fn dir(mut self, name: &str) -> Self {
        self.entries.push((name.to_string(), None, None));
        self
    }

    /// Serialise the archive.
    pub fn build(self) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content, mode) in self.entries {
            let mut options = SimpleFileOptions::default();
            if let Some(mode) = mode {
                options = options.unix_permissions(mode);
            }
            match content {
                Some(content) => {
                    writer.start_file(name, options).expect("start zip entry");
                    writer.write_all(&content).expect("write zip entry");
                }
                None => {
                    writer.add_directory(name, options).expect("add zip directory");
                }
            }
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

/// Create `<root>/<name>/worlds/<world>/level.dat` with `content` and return
/// the deployment directory.
pub fn deployment_with_world(root: &Path, name: &str, world: &str, content: &str) -> PathBuf {
    let deployment = root.join(name);
    let world_dir = deployment.join("worlds").join(world);
    std::fs::create_dir_all(&world_dir).expect("create world fixture");
    std::fs::write(world_dir.join("level.dat"), content).expect("write level.dat fixture");
    deployment
}

/// Point `<root>/<pointer>` at `target` with a symlink.
pub fn link_pointer(target: &Path, pointer: &Path) {
    #[cfg(unix)]
    std::os::unix::fs::symlink(target, pointer).expect("create pointer fixture");
    #[cfg(windows)]
    std::os::windows::fs::symlink_dir(target, pointer).expect("create pointer fixture");
}

/// Process controller that records every call.
///
/// Clones share the same call log, so a test can keep one handle while the
/// orchestrator borrows another.
#[derive(Clone, Default)]
pub struct RecordingController {
    calls: Arc<Mutex<Vec<String>>>,
    running: bool,
}

impl RecordingController {
    /// Controller that reports a running process.
    pub fn running() -> Self {
        Self {
            calls: Arc::default(),
            running: true,
        }
    }

    /// Calls so far, e.g. `["is_running", "request_shutdown", "kill", "start:/srv/Latest"]`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log").clone()
    }

    /// Record an event from outside the controller, such as a pointer swap.
    pub fn record(&self, event: impl Into<String>) {
        self.calls.lock().expect("call log").push(event.into());
    }
}

impl ProcessController for RecordingController {
    fn is_running(&mut self) -> ControlFuture<'_, bool> {
        self.record("is_running");
        let running = self.running;
        Box::pin(async move { Ok(running) })
    }

    fn request_shutdown(&mut self) -> ControlFuture<'_, ()> {
        self.record("request_shutdown");
        Box::pin(async { Ok(()) })
    }

    fn kill(&mut self, _grace: Duration) -> ControlFuture<'_, ()> {
        self.record("kill");
        self.running = false;
        Box::pin(async { Ok(()) })
    }

    fn start(&mut self, active: &Path) -> ControlFuture<'_, ()> {
        self.record(format!("start:{}", active.display()));
        self.running = true;
        Box::pin(async { Ok(()) })
    }
}
