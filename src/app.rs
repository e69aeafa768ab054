//! Shared application context: settings, sources, topics, prompt, dedup state,
//! the rolling corpus, and the analysis/fan-out plumbing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::activity::ActivityLog;
use crate::analyze::{BulkAnalyzer, Dispatcher, DynBackend};
use crate::config::{state, PersistedState, Settings, SettingsHandle};
use crate::corpus::{RollingCorpus, SharedCorpus};
use crate::guard::CycleGuard;
use crate::history::{History, ReplyPane};
use crate::ingest::seen::SeenSet;
use crate::ingest::sources::{default_feeds, load_sources_from};
use crate::ingest::types::FeedFetcher;
use crate::notify::Notifier;
use crate::prompt::PromptTemplate;
use crate::shutdown::Shutdown;
use crate::sink::{spawn_sink, FanOut};

/// Maximum number of topics kept.
pub const MAX_TOPICS: usize = 10;

/// Startup inputs for [`Sentinel::start`].
pub struct SentinelConfig {
    pub settings: Settings,
    pub sources: Vec<String>,
    pub topics: Vec<String>,
    pub prompt: PromptTemplate,
    pub rolling_path: PathBuf,
    pub active_profile: String,
    pub data_source_file: String,
}

impl SentinelConfig {
    pub fn new(rolling_path: impl Into<PathBuf>) -> Self {
        Self {
            settings: Settings::default(),
            sources: default_feeds(),
            topics: Vec::new(),
            prompt: PromptTemplate::default(),
            rolling_path: rolling_path.into(),
            active_profile: String::new(),
            data_source_file: String::new(),
        }
    }

    /// Overlay persisted state. Invalid settings or an unreadable prompt/source
    /// file are logged and skipped.
    pub fn with_persisted(mut self, st: PersistedState, log: &ActivityLog) -> Self {
        match st.settings.validate() {
            Ok(()) => self.settings = st.settings,
            Err(e) => log.warn(format!("Persisted settings rejected, using defaults: {e:#}")),
        }
        self.topics = clean_topics(st.topics);
        self.active_profile = st.active_profile;

        if !st.prompt_file.is_empty() {
            match PromptTemplate::load(Path::new(&st.prompt_file)) {
                Ok(p) => self.prompt = p,
                Err(e) => log.warn(format!("Failed to load prompt: {e:#}")),
            }
        }
        if !st.data_source_file.is_empty() {
            match load_sources_from(Path::new(&st.data_source_file)) {
                Ok(v) => {
                    self.sources = v;
                    self.data_source_file = st.data_source_file;
                }
                Err(e) => log.warn(format!("Failed to load data sources: {e:#}")),
            }
        }
        self
    }
}

fn clean_topics(topics: Vec<String>) -> Vec<String> {
    topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_TOPICS)
        .collect()
}

pub struct Sentinel {
    pub settings: SettingsHandle,
    pub log: ActivityLog,
    pub history: Arc<History>,
    pub reply: Arc<ReplyPane>,
    pub shutdown: Shutdown,
    pub corpus: SharedCorpus,
    pub seen: Mutex<SeenSet>,
    pub fetcher: Arc<dyn FeedFetcher>,
    pub dispatcher: Dispatcher,
    pub bulk: BulkAnalyzer,
    pub fetch_guard: CycleGuard,
    sources: RwLock<Vec<String>>,
    topics: RwLock<Vec<String>>,
    prompt: RwLock<PromptTemplate>,
    active_profile: RwLock<String>,
    data_source_file: RwLock<String>,
}

impl Sentinel {
    /// Build the context and spawn the sink task. Must run inside a tokio runtime.
    ///
    /// `notifier` receives the live settings handle so it can pick up webhook
    /// changes without a restart.
    pub fn start<N>(
        cfg: SentinelConfig,
        fetcher: Arc<dyn FeedFetcher>,
        backend: DynBackend,
        notifier: N,
        log: ActivityLog,
    ) -> (Arc<Self>, JoinHandle<()>)
    where
        N: FnOnce(&SettingsHandle) -> Arc<dyn Notifier>,
    {
        let settings = SettingsHandle::new(cfg.settings);
        let notifier = notifier(&settings);
        let shutdown = Shutdown::new();
        let history = Arc::new(History::default());
        let reply = Arc::new(ReplyPane::default());

        let (tx, rx) = mpsc::unbounded_channel();
        let sink = spawn_sink(rx, reply.clone(), history.clone(), shutdown.clone());
        let fanout = FanOut::new(tx, notifier, shutdown.clone(), log.clone());
        let dispatcher = Dispatcher::new(backend, fanout, log.clone(), shutdown.clone());

        let corpus = RollingCorpus::open(cfg.rolling_path, Utc::now()).shared();
        let bulk = BulkAnalyzer::new(
            corpus.clone(),
            settings.clone(),
            dispatcher.clone(),
            log.clone(),
            shutdown.clone(),
        );

        if !cfg.prompt.mentions_chunk() {
            log.warn("Prompt template has no {CHUNK} placeholder; feed items will not be sent.");
        }

        let sentinel = Arc::new(Self {
            settings,
            log,
            history,
            reply,
            shutdown,
            corpus,
            seen: Mutex::new(SeenSet::default()),
            fetcher,
            dispatcher,
            bulk,
            fetch_guard: CycleGuard::new(),
            sources: RwLock::new(cfg.sources),
            topics: RwLock::new(clean_topics(cfg.topics)),
            prompt: RwLock::new(cfg.prompt),
            active_profile: RwLock::new(cfg.active_profile),
            data_source_file: RwLock::new(cfg.data_source_file),
        });
        (sentinel, sink)
    }

    pub fn sources(&self) -> Vec<String> {
        read(&self.sources).clone()
    }

    pub fn set_sources(&self, sources: Vec<String>) {
        self.log.info(format!("{} data sources loaded.", sources.len()));
        *write(&self.sources) = sources;
    }

    /// Replace the source list from a file and remember the path.
    pub fn load_sources(&self, path: &Path) -> Result<usize> {
        match load_sources_from(path) {
            Ok(v) => {
                let n = v.len();
                self.set_sources(v);
                *write(&self.data_source_file) = path.display().to_string();
                Ok(n)
            }
            Err(e) => {
                self.log.warn(format!("Failed to load data sources: {e:#}"));
                Err(e)
            }
        }
    }

    pub fn topics(&self) -> Vec<String> {
        read(&self.topics).clone()
    }

    pub fn set_topics(&self, topics: Vec<String>) {
        *write(&self.topics) = clean_topics(topics);
    }

    pub fn prompt(&self) -> PromptTemplate {
        read(&self.prompt).clone()
    }

    pub fn set_prompt(&self, prompt: PromptTemplate) {
        if !prompt.mentions_chunk() {
            self.log.warn("Prompt template has no {CHUNK} placeholder; feed items will not be sent.");
        }
        *write(&self.prompt) = prompt;
    }

    pub fn load_prompt(&self, path: &Path) -> Result<()> {
        match PromptTemplate::load(path) {
            Ok(p) => {
                self.set_prompt(p);
                self.log.info(format!("Loaded prompt file: {}", path.display()));
                Ok(())
            }
            Err(e) => {
                self.log.warn(format!("Failed to load prompt: {e:#}"));
                Err(e)
            }
        }
    }

    pub fn persisted_state(&self) -> PersistedState {
        PersistedState {
            active_profile: read(&self.active_profile).clone(),
            topics: self.topics(),
            settings: self.settings.snapshot(),
            data_source_file: read(&self.data_source_file).clone(),
            prompt_file: read(&self.prompt)
                .source()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn save_state(&self, path: &Path) -> Result<()> {
        match state::save(path, &self.persisted_state()) {
            Ok(()) => {
                self.log.info("App state saved.");
                Ok(())
            }
            Err(e) => {
                self.log.warn(format!("Failed to save app state: {e:#}"));
                Err(e)
            }
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}
