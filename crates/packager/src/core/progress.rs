//! Progress tracking and reporting for export and import

use std::sync::Arc;

/// Progress callback for package operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while exporting or reconciling a package
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    DocumentWritten {
        destination: String,
    },
    FileEmbedded {
        entry: String,
        index: usize,
        total: usize,
    },
    FileExtracted {
        entry: String,
    },
    ModStarted {
        name: String,
        index: usize,
        total: usize,
    },
    ModReused {
        name: String,
        version: String,
    },
    ModExtracted {
        name: String,
        version: String,
    },
    ModDownloaded {
        name: String,
        version: String,
    },
    ModUnresolved {
        name: String,
        reason: String,
    },
    ModpackCreated {
        name: String,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_document_written(&self, _destination: &str) {}
    fn on_file_embedded(&self, _entry: &str, _index: usize, _total: usize) {}
    fn on_file_extracted(&self, _entry: &str) {}
    fn on_mod_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn on_mod_reused(&self, _name: &str, _version: &str) {}
    fn on_mod_extracted(&self, _name: &str, _version: &str) {}
    fn on_mod_downloaded(&self, _name: &str, _version: &str) {}
    fn on_mod_unresolved(&self, _name: &str, _reason: &str) {}
    fn on_modpack_created(&self, _name: &str) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DocumentWritten { destination } => self.on_document_written(&destination),
            ProgressEvent::FileEmbedded { entry, index, total } => {
                self.on_file_embedded(&entry, index, total)
            }
            ProgressEvent::FileExtracted { entry } => self.on_file_extracted(&entry),
            ProgressEvent::ModStarted { name, index, total } => {
                self.on_mod_started(&name, index, total)
            }
            ProgressEvent::ModReused { name, version } => self.on_mod_reused(&name, &version),
            ProgressEvent::ModExtracted { name, version } => self.on_mod_extracted(&name, &version),
            ProgressEvent::ModDownloaded { name, version } => {
                self.on_mod_downloaded(&name, &version)
            }
            ProgressEvent::ModUnresolved { name, reason } => self.on_mod_unresolved(&name, &reason),
            ProgressEvent::ModpackCreated { name } => self.on_modpack_created(&name),
        })
    }
}

/// Simple console progress reporter implementation
#[derive(Debug, Default)]
pub struct ConsoleProgressReporter {
    pub verbose: bool,
}

impl ConsoleProgressReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn on_document_written(&self, destination: &str) {
        println!("Package written: {}", destination);
    }

    fn on_file_embedded(&self, entry: &str, index: usize, total: usize) {
        if self.verbose {
            println!("[{}/{}] embedded {}", index + 1, total, entry);
        }
    }

    fn on_mod_started(&self, name: &str, index: usize, total: usize) {
        if self.verbose {
            println!("[{}/{}] resolving {}", index + 1, total, name);
        }
    }

    fn on_mod_reused(&self, name: &str, version: &str) {
        println!("= {} {} (already installed)", name, version);
    }

    fn on_mod_extracted(&self, name: &str, version: &str) {
        println!("+ {} {} (from package)", name, version);
    }

    fn on_mod_downloaded(&self, name: &str, version: &str) {
        println!("+ {} {} (downloaded)", name, version);
    }

    fn on_mod_unresolved(&self, name: &str, reason: &str) {
        println!("! {} could not be installed: {}", name, reason);
    }

    fn on_modpack_created(&self, name: &str) {
        if self.verbose {
            println!("Modpack created: {}", name);
        }
    }
}

/// Progress reporter that ignores every event
#[derive(Debug, Default)]
pub struct NullProgressReporter;

impl ProgressReporter for NullProgressReporter {}

/// Send an event to an optional callback
pub(crate) fn emit(callback: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ProgressReporter for Recorder {
        fn on_mod_unresolved(&self, name: &str, reason: &str) {
            self.seen.lock().unwrap().push(format!("{name}: {reason}"));
        }
    }

    #[test]
    fn test_reporter_receives_routed_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let callback = Recorder { seen: seen.clone() }.into_callback();

        callback(ProgressEvent::ModReused {
            name: "bob".to_string(),
            version: "1.0.0.0".to_string(),
        });
        callback(ProgressEvent::ModUnresolved {
            name: "bob".to_string(),
            reason: "offline".to_string(),
        });

        assert_eq!(*seen.lock().unwrap(), vec!["bob: offline".to_string()]);
    }
}
