//! Synchronous lifecycle hooks and the plugin contract

use std::fmt;

use log::{info, trace};

/// Ordered list of argument-less listeners for one lifecycle event
pub struct SyncHook {
    name: &'static str,
    taps: Vec<Tap>,
}

struct Tap {
    name: String,
    callback: Box<dyn FnMut()>,
}

impl SyncHook {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            taps: Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Register a listener; listeners run in registration order
    pub fn tap<F>(&mut self, name: impl Into<String>, callback: F)
    where
        F: FnMut() + 'static,
    {
        self.taps.push(Tap {
            name: name.into(),
            callback: Box::new(callback),
        });
    }

    /// Run every listener before returning
    pub fn call(&mut self) {
        for tap in &mut self.taps {
            trace!("Calling '{}' listener of hook '{}'", tap.name, self.name);
            (tap.callback)();
        }
    }

    pub fn len(&self) -> usize {
        self.taps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }
}

impl fmt::Debug for SyncHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let taps: Vec<_> = self.taps.iter().map(|tap| tap.name.as_str()).collect();
        f.debug_struct("SyncHook")
            .field("name", &self.name)
            .field("taps", &taps)
            .finish()
    }
}

/// Hooks exposed to plugins.
///
/// `run` fires before any module is read, `emit` after every asset is
/// rendered but before anything is written, `done` after the last write.
#[derive(Debug)]
pub struct CompilerHooks {
    pub run: SyncHook,
    pub emit: SyncHook,
    pub done: SyncHook,
}

impl Default for CompilerHooks {
    fn default() -> Self {
        Self {
            run: SyncHook::new("run"),
            emit: SyncHook::new("emit"),
            done: SyncHook::new("done"),
        }
    }
}

pub trait Plugin {
    fn name(&self) -> &str;

    /// Register listeners. Called once, when the compiler is created.
    fn apply(&self, hooks: &mut CompilerHooks);
}

impl fmt::Debug for dyn Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Plugin({})", self.name())
    }
}

/// Logs each lifecycle transition
#[derive(Debug, Default, Clone, Copy)]
pub struct ProgressPlugin;

impl Plugin for ProgressPlugin {
    fn name(&self) -> &str {
        "progress"
    }

    fn apply(&self, hooks: &mut CompilerHooks) {
        hooks.run.tap(self.name(), || info!("Build started"));
        hooks.emit.tap(self.name(), || info!("Writing assets"));
        hooks.done.tap(self.name(), || info!("Build finished"));
    }
}
