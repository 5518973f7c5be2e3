use anyhow::Result;
use sonar_core::{Conversation, ProjectBrain, Settings, Snippet, UsageStats};
use sonar_llm::LlmClient;
use sonar_observe::Observer;
use sonar_store::Store;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The one mutable state bag for the whole process.
///
/// Exactly one instance exists; every command handler receives it by
/// mutable reference and mutates it in place so changes are visible to
/// subsequent turns. There is no module-level state.
pub struct SessionContext {
    /// Project root all paths resolve against. `cd` moves it, but only to
    /// directories inside the original root.
    pub root: PathBuf,
    pub settings: Settings,
    pub conversation: Conversation,
    pub brain: ProjectBrain,
    pub snippets: BTreeMap<String, Snippet>,
    pub usage: UsageStats,
    pub last_error: Option<String>,
    /// When set, confirmation prompts (except destructive deletes) are
    /// skipped. Toggled from the input box with BackTab.
    pub auto_run: bool,
    pub store: Store,
    pub observer: Observer,
    pub client: Box<dyn LlmClient>,
    /// Set by `quit`/`exit`; the loop stops at the next iteration.
    pub quit: bool,
}

impl SessionContext {
    pub fn new(
        root: PathBuf,
        store: Store,
        observer: Observer,
        client: Box<dyn LlmClient>,
    ) -> Result<Self> {
        let settings = store.load_settings();
        let snippets = store.load_snippets();
        let brain = store.load_brain(&root);
        Ok(Self {
            root,
            settings,
            conversation: Conversation::new(),
            brain,
            snippets,
            usage: UsageStats::default(),
            last_error: None,
            auto_run: false,
            store,
            observer,
            client,
            quit: false,
        })
    }

    pub fn save_settings(&self) -> Result<()> {
        self.store.save_settings(&self.settings)
    }
}
