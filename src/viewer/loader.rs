//! Background text loading with "latest request wins".

use std::sync::mpsc;
use std::sync::Arc;

use crate::net::{FetchError, Fetcher};

/// Called from the loader thread once a result is ready.
pub type Wakeup = Arc<dyn Fn() + Send + Sync>;

struct Loaded {
    generation: u64,
    result: Result<String, FetchError>,
}

/// Runs one fetch at a time on a background thread. Starting a new load
/// supersedes the previous one; its result is discarded whenever it lands.
pub struct Loader {
    fetcher: Arc<dyn Fetcher>,
    generation: u64,
    rx: Option<mpsc::Receiver<Loaded>>,
    wakeup: Option<Wakeup>,
}

impl Loader {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            generation: 0,
            rx: None,
            wakeup: None,
        }
    }

    pub fn set_wakeup(&mut self, wakeup: Option<Wakeup>) {
        self.wakeup = wakeup;
    }

    /// Start loading `url`. Returns the generation of this request.
    pub fn start(&mut self, url: String) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);

        let fetcher = Arc::clone(&self.fetcher);
        let wakeup = self.wakeup.clone();
        std::thread::spawn(move || {
            log::debug!("fetching {url} (request {generation})");
            let result = fetcher.fetch_text(&url);
            // The receiver is gone if a newer request replaced it.
            let _ = tx.send(Loaded { generation, result });
            if let Some(wakeup) = wakeup {
                wakeup();
            }
        });
        generation
    }

    /// Forget the in-flight request, if any.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.rx = None;
    }

    pub fn is_pending(&self) -> bool {
        self.rx.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Result of the current request, once available.
    pub fn poll(&mut self) -> Option<Result<String, FetchError>> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(loaded) if loaded.generation == self.generation => {
                self.rx = None;
                Some(loaded.result)
            }
            Ok(loaded) => {
                log::debug!("discarding stale load {}", loaded.generation);
                None
            }
            Err(mpsc::TryRecvError::Empty) => None,
            Err(mpsc::TryRecvError::Disconnected) => {
                self.rx = None;
                Some(Err(FetchError::new("loader thread ended without a result")))
            }
        }
    }
}
