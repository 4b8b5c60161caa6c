//! Main egui application: composes the panels and drives the chat session.

use std::cell::{OnceCell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use egui::{self, CentralPanel, RichText, SidePanel, TopBottomPanel};
use futures::StreamExt;
use wasm_bindgen_futures::spawn_local;

use copilot_core::catalog::{default_model, missing_models, ModelCatalog};
use copilot_core::config_store::{load_config, save_config};
use copilot_core::event_bus::EventBus;
use copilot_core::indexer::{build_index, locked_embedding_model, IndexBuildRequest};
use copilot_core::ingest::{parse_uploads, parse_url_list, UploadedFile};
use copilot_core::ports::{ChatPort, IndexStore, RetrievalPort, StoragePort};
use copilot_core::retrieval::IndexedRetrieval;
use copilot_core::session::{ChatSession, GenerationMode, Generators};
use copilot_platform::download::{download_text, TRANSCRIPT_FILENAME};
use copilot_platform::web::fetch_pages;
use copilot_platform::{open_storage, MemoryStorage, OllamaClient, StorageIndexStore};
use copilot_types::config::{CopilotConfig, RetrievalConfig, StorageBackendType};
use copilot_types::event::SessionEvent;
use copilot_types::model::ModelEntry;
use copilot_types::{CopilotError, Result};
use copilot_ui::panels::index_builder::IndexBuilderAction;
use copilot_ui::panels::models::ModelsAction;
use copilot_ui::panels::settings::{SaveFeedback, SettingsAction};
use copilot_ui::panels::sidebar::{SidebarAction, SidebarView};
use copilot_ui::panels::{chat, index_builder, models, settings, sidebar};
use copilot_ui::state::{NoticeLevel, UiState, View};
use copilot_ui::theme;

/// Optional hardware notes served next to index.html
const CATALOG_URL: &str = "model_catalog.json";

// ─── Storage handle ──────────────────────────────────────────

/// Storage that answers from memory until the configured backend has opened.
pub(crate) struct DeferredStorage {
    fallback: MemoryStorage,
    opened: OnceCell<Rc<dyn StoragePort>>,
}

impl DeferredStorage {
    pub(crate) fn new() -> Self {
        Self {
            fallback: MemoryStorage::new(),
            opened: OnceCell::new(),
        }
    }

    pub(crate) fn install(&self, storage: Rc<dyn StoragePort>) {
        if self.opened.set(storage).is_err() {
            log::warn!("storage backend already installed");
        }
    }

    fn current(&self) -> &dyn StoragePort {
        match self.opened.get() {
            Some(storage) => storage.as_ref(),
            None => &self.fallback,
        }
    }
}

#[async_trait(?Send)]
impl StoragePort for DeferredStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.current().get(key).await
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.current().set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.current().delete(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.current().list_keys(prefix).await
    }

    fn backend_name(&self) -> &str {
        self.current().backend_name()
    }
}

/// Results of background tasks, applied on the next frame
#[derive(Default)]
struct Inbox {
    config: Option<CopilotConfig>,
    models: Option<Vec<ModelEntry>>,
    indexes: Option<Vec<String>>,
    catalog: Option<ModelCatalog>,
    locked_model: Option<Option<String>>,
    rebuilt_index: Option<String>,
    build_finished: bool,
}

// ─── Pure helpers ────────────────────────────────────────────

/// Retrieval is used when the index toggle is on or the session holds uploads.
pub(crate) fn generation_mode(settings: &RetrievalConfig, uploaded: usize) -> GenerationMode {
    if settings.use_index || uploaded > 0 {
        GenerationMode::RetrievalAugmented
    } else {
        GenerationMode::Plain
    }
}

/// The persisted index the session should search, if any.
pub(crate) fn active_index(settings: &RetrievalConfig) -> Option<String> {
    if settings.use_index {
        settings.index_name.clone()
    } else {
        None
    }
}

pub(crate) fn to_upload(file: egui::DroppedFile) -> Option<UploadedFile> {
    match file.bytes {
        Some(bytes) => Some(UploadedFile::new(file.name, bytes.to_vec())),
        None => {
            log::warn!("Dropped file '{}' arrived without contents", file.name);
            None
        }
    }
}

fn make_retrieval(
    ollama: &Rc<OllamaClient>,
    store: &Rc<StorageIndexStore>,
    config: &CopilotConfig,
) -> IndexedRetrieval {
    IndexedRetrieval::new(
        ollama.clone(),
        ollama.clone(),
        store.clone(),
        config.llm.embed_model.clone(),
        config.retrieval.clone(),
    )
}

// ─── Application ─────────────────────────────────────────────

pub struct CopilotApp {
    ui_state: UiState,
    config: CopilotConfig,
    event_bus: EventBus,
    session: Rc<RefCell<ChatSession>>,
    ollama: Rc<OllamaClient>,
    retrieval: Rc<IndexedRetrieval>,
    storage: Rc<DeferredStorage>,
    index_store: Rc<StorageIndexStore>,
    catalog: ModelCatalog,
    inbox: Rc<RefCell<Inbox>>,
    /// Files dropped on the index builder page
    builder_files: Vec<UploadedFile>,
    locked_model: Option<String>,
    building: bool,
    /// Engine invalidation waiting for the session to become free
    stale_engine: bool,
    show_settings: bool,
    save_feedback: Option<SaveFeedback>,
    first_frame: bool,
}

impl CopilotApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let config = CopilotConfig::default();
        let event_bus = EventBus::new();
        let session = ChatSession::new(config.chat.clone(), config.llm.model.clone(), event_bus.clone());

        let storage = Rc::new(DeferredStorage::new());
        let index_store = Rc::new(StorageIndexStore::new(storage.clone()));
        let ollama = Rc::new(OllamaClient::new(config.llm.clone()));
        let retrieval = Rc::new(make_retrieval(&ollama, &index_store, &config));

        let mut ui_state = UiState::new();
        ui_state.sync_transcript(session.transcript());
        ui_state.prompt_draft = session.context_prompt().to_string();
        ui_state.index_form.embedding_model = config.llm.embed_model.clone();

        let app = Self {
            ui_state,
            config,
            event_bus,
            session: Rc::new(RefCell::new(session)),
            ollama,
            retrieval,
            storage,
            index_store,
            catalog: ModelCatalog::builtin(),
            inbox: Rc::new(RefCell::new(Inbox::default())),
            builder_files: Vec::new(),
            locked_model: None,
            building: false,
            stale_engine: false,
            show_settings: false,
            save_feedback: None,
            first_frame: true,
        };

        app.startup(cc.egui_ctx.clone());
        app.fetch_catalog(cc.egui_ctx.clone());
        app
    }

    /// Open storage, restore config, list indexes, then make sure the
    /// configured models are installed.
    fn startup(&self, ctx: egui::Context) {
        let storage = self.storage.clone();
        let index_store = self.index_store.clone();
        let inbox = self.inbox.clone();
        let bus = self.event_bus.clone();

        spawn_local(async move {
            let config = restore_config(&storage).await;
            inbox.borrow_mut().config = Some(config.clone());

            match index_store.list_indexes().await {
                Ok(names) => inbox.borrow_mut().indexes = Some(names),
                Err(e) => log::warn!("Could not list indexes: {}", e),
            }
            ctx.request_repaint();

            let ollama = OllamaClient::new(config.llm.clone());
            let installed = match ollama.list_models().await {
                Ok(models) => models,
                Err(e) => {
                    bus.emit(SessionEvent::Error {
                        message: format!("Ollama is not reachable at {}: {}", ollama.base_url(), e),
                    });
                    ctx.request_repaint();
                    return;
                }
            };

            let required = [config.llm.model.as_str(), config.llm.embed_model.as_str()];
            let missing = missing_models(&installed, &required);
            let mut models = installed;
            if !missing.is_empty() {
                for name in &missing {
                    pull_with_progress(&ollama, name, &bus, &ctx).await;
                }
                if let Ok(refreshed) = ollama.list_models().await {
                    models = refreshed;
                }
            }
            inbox.borrow_mut().models = Some(models);
            ctx.request_repaint();
        });
    }

    fn fetch_catalog(&self, ctx: egui::Context) {
        let inbox = self.inbox.clone();
        spawn_local(async move {
            let json = match fetch_text(CATALOG_URL).await {
                Ok(json) => json,
                Err(e) => {
                    log::info!("No model catalog at {}: {}", CATALOG_URL, e);
                    return;
                }
            };
            match ModelCatalog::from_json(&json) {
                Ok(extra) => {
                    inbox.borrow_mut().catalog = Some(ModelCatalog::builtin().merge(extra));
                    ctx.request_repaint();
                }
                Err(e) => log::warn!("Ignoring malformed model catalog: {}", e),
            }
        });
    }

    // ─── Session access ──────────────────────────────────────

    /// Run `f` on the session unless a turn currently holds it.
    fn with_session<R>(&mut self, f: impl FnOnce(&mut ChatSession) -> R) -> Option<R> {
        match self.session.try_borrow_mut() {
            Ok(mut session) => Some(f(&mut session)),
            Err(_) => {
                self.ui_state.notify(CopilotError::Busy.to_string(), NoticeLevel::Error);
                None
            }
        }
    }

    /// Push every config-derived setting into the session.
    fn sync_session(&mut self) {
        let model = self.config.llm.model.clone();
        let chat = self.config.chat.clone();
        let index = active_index(&self.config.retrieval);
        let synced = self.with_session(|s| {
            s.set_model(model);
            s.apply_config(&chat);
            s.set_context_prompt(chat.context_prompt.clone());
            s.select_index(index);
            s.invalidate_engine();
            // A fresh conversation shows the restored greeting
            (s.transcript().len() == 1).then(|| s.transcript().to_vec())
        });
        match synced {
            Some(Some(transcript)) => self.ui_state.sync_transcript(&transcript),
            Some(None) => {}
            None => self.stale_engine = true,
        }
    }

    fn rebuild_clients(&mut self) {
        self.ollama = Rc::new(OllamaClient::new(self.config.llm.clone()));
        self.retrieval = Rc::new(make_retrieval(&self.ollama, &self.index_store, &self.config));
    }

    fn persist_config(&self) {
        let storage = self.storage.clone();
        let config = self.config.clone();
        let bus = self.event_bus.clone();
        spawn_local(async move {
            match save_config(&*storage, &config).await {
                Ok(()) => log::info!("Config saved to {}", storage.backend_name()),
                Err(e) => bus.emit(SessionEvent::Error {
                    message: format!("Could not save settings: {}", e),
                }),
            }
        });
    }

    // ─── Per-frame bookkeeping ───────────────────────────────

    fn apply_inbox(&mut self) {
        let inbox = std::mem::take(&mut *self.inbox.borrow_mut());

        if let Some(config) = inbox.config {
            self.config = config;
            self.rebuild_clients();
            self.sync_session();
            self.ui_state.prompt_draft = self.config.chat.context_prompt.clone();
            self.ui_state.index_form.embedding_model = self.config.llm.embed_model.clone();
        }
        if let Some(models) = inbox.models {
            self.adopt_models(models);
        }
        if let Some(indexes) = inbox.indexes {
            self.ui_state.indexes = indexes;
        }
        if let Some(catalog) = inbox.catalog {
            self.catalog = catalog;
        }
        if let Some(locked) = inbox.locked_model {
            if let Some(model) = &locked {
                self.ui_state.index_form.embedding_model = model.clone();
            }
            self.locked_model = locked;
        }
        if let Some(name) = inbox.rebuilt_index {
            self.builder_files.clear();
            self.ui_state.index_form.files.clear();
            self.ui_state.index_form.urls.clear();
            if active_index(&self.config.retrieval).as_deref() == Some(name.as_str()) {
                self.stale_engine = true;
            }
        }
        if inbox.build_finished {
            self.building = false;
        }

        if self.stale_engine {
            if let Ok(mut session) = self.session.try_borrow_mut() {
                session.invalidate_engine();
                self.stale_engine = false;
            }
        }
    }

    /// Keep the chat model valid for what is installed.
    fn adopt_models(&mut self, models: Vec<ModelEntry>) {
        if let Some(model) = default_model(&models, &self.config.llm.model) {
            if model != self.config.llm.model {
                log::info!("Model {} is not installed, using {}", self.config.llm.model, model);
                self.config.llm.model = model.clone();
                self.with_session(|s| s.set_model(model));
            }
        }
        self.ui_state.models = models;
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }
        let files: Vec<UploadedFile> = dropped.into_iter().filter_map(to_upload).collect();

        if self.ui_state.view == View::IndexBuilder {
            self.ui_state
                .index_form
                .files
                .extend(files.iter().map(|f| f.name.clone()));
            self.builder_files.extend(files);
            return;
        }

        let (documents, errors) = parse_uploads(&files);
        for e in errors {
            self.ui_state.notify(e.to_string(), NoticeLevel::Error);
        }
        if !documents.is_empty() {
            self.with_session(|s| s.add_documents(documents));
        }
    }

    // ─── Chat ────────────────────────────────────────────────

    /// Run one turn in the background; the session streams into the EventBus.
    fn dispatch_message(&self, text: String, ctx: &egui::Context) {
        let session = self.session.clone();
        let chat = self.ollama.clone();
        let retrieval = self.retrieval.clone();
        let bus = self.event_bus.clone();
        let mode = generation_mode(&self.config.retrieval, self.ui_state.uploaded_count);
        let ctx = ctx.clone();

        spawn_local(async move {
            let Ok(mut session) = session.try_borrow_mut() else {
                bus.emit(SessionEvent::Error {
                    message: CopilotError::Busy.to_string(),
                });
                ctx.request_repaint();
                return;
            };
            let chat: &dyn ChatPort = &*chat;
            let retrieval: &dyn RetrievalPort = &*retrieval;
            let generators = Generators {
                chat,
                retrieval: Some(retrieval),
            };
            if let Err(e) = session.run_turn(&text, mode, generators).await {
                log::warn!("Turn ended with error: {}", e);
            }
            ctx.request_repaint();
        });
    }

    fn export_transcript(&mut self) {
        let text = match self.session.try_borrow() {
            Ok(session) => session.export_transcript(),
            Err(_) => {
                self.ui_state.notify(CopilotError::Busy.to_string(), NoticeLevel::Error);
                return;
            }
        };
        match download_text(TRANSCRIPT_FILENAME, &text) {
            Ok(()) => self
                .ui_state
                .notify(format!("Saved {}", TRANSCRIPT_FILENAME), NoticeLevel::Success),
            Err(e) => self.ui_state.notify(e.to_string(), NoticeLevel::Error),
        }
    }

    fn handle_sidebar(&mut self, action: SidebarAction, ctx: &egui::Context) {
        match action {
            SidebarAction::SelectModel(model) => {
                let name = model.clone();
                if self.with_session(|s| s.set_model(name)).is_some() {
                    self.config.llm.model = model;
                    self.persist_config();
                }
            }
            SidebarAction::SetUseIndex(use_index) => {
                let mut settings = self.config.retrieval.clone();
                settings.use_index = use_index;
                let index = active_index(&settings);
                if self.with_session(|s| s.select_index(index)).is_some() {
                    self.config.retrieval = settings;
                    self.persist_config();
                }
            }
            SidebarAction::SelectIndex(name) => {
                let mut settings = self.config.retrieval.clone();
                settings.index_name = name;
                let index = active_index(&settings);
                if self.with_session(|s| s.select_index(index)).is_some() {
                    self.config.retrieval = settings;
                    self.persist_config();
                }
            }
            SidebarAction::SaveContextPrompt(prompt) => {
                let draft = prompt.clone();
                if self.with_session(|s| s.set_context_prompt(draft)) == Some(true) {
                    self.config.chat.context_prompt = prompt;
                    self.persist_config();
                }
            }
            SidebarAction::ResetChat => {
                self.with_session(|s| s.reset());
            }
            SidebarAction::ExportTranscript => self.export_transcript(),
            SidebarAction::Navigate(view) => {
                self.ui_state.view = view;
                if view != View::Chat {
                    self.refresh_lists(ctx);
                }
            }
        }
    }

    // ─── Models & indexes ────────────────────────────────────

    fn refresh_lists(&self, ctx: &egui::Context) {
        let ollama = self.ollama.clone();
        let index_store = self.index_store.clone();
        let inbox = self.inbox.clone();
        let ctx = ctx.clone();
        spawn_local(async move {
            refresh_into(&ollama, &index_store, &inbox).await;
            ctx.request_repaint();
        });
    }

    fn handle_models(&mut self, action: ModelsAction, ctx: &egui::Context) {
        let ollama = self.ollama.clone();
        let index_store = self.index_store.clone();
        let inbox = self.inbox.clone();
        let bus = self.event_bus.clone();
        let ctx = ctx.clone();

        match action {
            ModelsAction::Refresh => self.refresh_lists(&ctx),
            ModelsAction::Pull(name) => {
                if name.is_empty() {
                    return;
                }
                self.ui_state.pull_name.clear();
                spawn_local(async move {
                    pull_with_progress(&ollama, &name, &bus, &ctx).await;
                    refresh_into(&ollama, &index_store, &inbox).await;
                    ctx.request_repaint();
                });
            }
            ModelsAction::Delete(name) => {
                spawn_local(async move {
                    match ollama.delete_model(&name).await {
                        Ok(()) => bus.emit(SessionEvent::Notice {
                            message: format!("Deleted model '{}'", name),
                        }),
                        Err(e) => bus.emit(SessionEvent::Error {
                            message: format!("Could not delete '{}': {}", name, e),
                        }),
                    }
                    refresh_into(&ollama, &index_store, &inbox).await;
                    ctx.request_repaint();
                });
            }
        }
    }

    fn handle_index_builder(&mut self, action: IndexBuilderAction, ctx: &egui::Context) {
        match action {
            IndexBuilderAction::ClearFiles => {
                self.builder_files.clear();
                self.ui_state.index_form.files.clear();
            }
            IndexBuilderAction::TargetChanged(name) => {
                let store = self.index_store.clone();
                let inbox = self.inbox.clone();
                let ctx = ctx.clone();
                spawn_local(async move {
                    let locked = match locked_embedding_model(&*store, &name).await {
                        Ok(model) => model,
                        Err(e) => {
                            log::warn!("Could not read index '{}': {}", name, e);
                            None
                        }
                    };
                    inbox.borrow_mut().locked_model = Some(locked);
                    ctx.request_repaint();
                });
            }
            IndexBuilderAction::Build => self.start_index_build(ctx),
        }
    }

    fn start_index_build(&mut self, ctx: &egui::Context) {
        if self.building {
            return;
        }
        let (documents, errors) = parse_uploads(&self.builder_files);
        for e in errors {
            self.ui_state.notify(e.to_string(), NoticeLevel::Error);
        }

        let form = &self.ui_state.index_form;
        let urls = parse_url_list(&form.urls);
        let mut request = IndexBuildRequest {
            mode: form.mode,
            name: form.name.clone(),
            embedding_model: form.embedding_model.clone(),
            documents,
        };
        let timeout_ms = self.config.llm.request_timeout_ms();
        self.building = true;

        let store = self.index_store.clone();
        let embedder = self.ollama.clone();
        let settings = self.config.retrieval.clone();
        let inbox = self.inbox.clone();
        let bus = self.event_bus.clone();
        let ctx = ctx.clone();

        spawn_local(async move {
            if !urls.is_empty() {
                let (pages, failures) = fetch_pages(&urls, timeout_ms).await;
                for (url, e) in failures {
                    bus.emit(SessionEvent::Error {
                        message: format!("Failed to load {}: {}", url, e),
                    });
                }
                request.documents.extend(pages);
            }
            match build_index(request, &*store, &*embedder, &settings).await {
                Ok(report) => {
                    bus.emit(SessionEvent::Notice {
                        message: report.summary(),
                    });
                    inbox.borrow_mut().rebuilt_index = Some(report.name);
                }
                Err(e) => bus.emit(SessionEvent::Error {
                    message: e.to_string(),
                }),
            }
            if let Ok(names) = store.list_indexes().await {
                inbox.borrow_mut().indexes = Some(names);
            }
            inbox.borrow_mut().build_finished = true;
            ctx.request_repaint();
        });
    }
}

impl eframe::App for CopilotApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.first_frame {
            theme::apply_theme(ctx);
            self.first_frame = false;
        }

        self.apply_inbox();

        let events = self.event_bus.drain();
        if !events.is_empty() {
            self.ui_state.process_events(events);
            ctx.request_repaint();
        }
        if self.ui_state.is_busy() || self.ui_state.is_pulling() || self.building {
            ctx.request_repaint();
        }

        self.handle_dropped_files(ctx);

        // ── Top bar ──────────────────────────────────────────
        TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new("Jetson Copilot")
                        .strong()
                        .color(theme::ACCENT)
                        .size(16.0),
                );
                ui.separator();
                ui.label(
                    RichText::new(format!(
                        "Model: {} | Storage: {} | {}",
                        self.config.llm.model,
                        self.storage.backend_name(),
                        self.ui_state.status_text
                    ))
                    .color(theme::TEXT_SECONDARY)
                    .small(),
                );
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.selectable_label(self.show_settings, "Settings").clicked() {
                        self.show_settings = !self.show_settings;
                    }
                });
            });
        });

        // ── Settings side panel ──────────────────────────────
        if self.show_settings {
            let mut settings_action = SettingsAction::None;
            SidePanel::right("settings_panel")
                .min_width(280.0)
                .max_width(350.0)
                .show(ctx, |ui| {
                    settings_action =
                        settings::settings_panel(ui, &mut self.config, self.save_feedback.as_ref());
                });
            match settings_action {
                SettingsAction::SaveClicked => {
                    self.rebuild_clients();
                    self.sync_session();
                    self.persist_config();
                    self.save_feedback = Some(SaveFeedback {
                        message: "Settings saved".to_string(),
                        success: true,
                    });
                }
                SettingsAction::Changed => self.save_feedback = None,
                SettingsAction::None => {}
            }
        }

        // ── Sidebar ──────────────────────────────────────────
        let view = SidebarView {
            model: &self.config.llm.model,
            use_index: self.config.retrieval.use_index,
            index_name: self.config.retrieval.index_name.as_deref(),
            context_prompt: &self.config.chat.context_prompt,
        };
        let mut sidebar_actions = Vec::new();
        SidePanel::left("sidebar")
            .min_width(260.0)
            .max_width(340.0)
            .show(ctx, |ui| {
                sidebar_actions = sidebar::sidebar_panel(ui, &mut self.ui_state, &view);
            });
        for action in sidebar_actions {
            self.handle_sidebar(action, ctx);
        }

        // ── Main content ─────────────────────────────────────
        let page = self.ui_state.view;
        let mut submitted = None;
        let mut models_action = None;
        let mut builder_action = None;
        CentralPanel::default().show(ctx, |ui| match page {
            View::Chat => submitted = chat::chat_panel(ui, &mut self.ui_state),
            View::Models => models_action = models::models_panel(ui, &mut self.ui_state, &self.catalog),
            View::IndexBuilder => {
                builder_action = index_builder::index_builder_panel(
                    ui,
                    &mut self.ui_state,
                    self.locked_model.as_deref(),
                    self.building,
                )
            }
        });

        if let Some(text) = submitted {
            self.dispatch_message(text, ctx);
        }
        if let Some(action) = models_action {
            self.handle_models(action, ctx);
        }
        if let Some(action) = builder_action {
            self.handle_index_builder(action, ctx);
        }
    }
}

// ─── Background task bodies ──────────────────────────────────

/// Open the configured backend and read the saved config from it.
async fn restore_config(storage: &DeferredStorage) -> CopilotConfig {
    let auto_storage = match open_storage(&StorageBackendType::Auto).await {
        Ok(auto_storage) => auto_storage,
        Err(e) => {
            log::warn!("No persistent storage: {}", e);
            return CopilotConfig::default();
        }
    };

    let config = match load_config(auto_storage.as_ref()).await {
        Ok(Some(config)) => {
            log::info!("Config restored from {}", auto_storage.backend_name());
            config
        }
        Ok(None) => CopilotConfig::default(),
        Err(e) => {
            log::warn!("Ignoring unreadable config: {}", e);
            CopilotConfig::default()
        }
    };

    let backend = match config.storage.backend {
        StorageBackendType::Auto => auto_storage,
        ref other => match open_storage(other).await {
            Ok(storage) => storage,
            Err(e) => {
                log::warn!("Configured storage unavailable ({}), keeping {}", e, auto_storage.backend_name());
                auto_storage
            }
        },
    };
    storage.install(backend);
    config
}

/// Stream a model download into `PullProgress` events. Returns whether it finished.
async fn pull_with_progress(ollama: &OllamaClient, name: &str, bus: &EventBus, ctx: &egui::Context) -> bool {
    log::info!("Pulling model {}", name);
    let mut progress = ollama.pull_model(name);
    while let Some(item) = progress.next().await {
        match item {
            Ok(status) => bus.emit(SessionEvent::PullProgress {
                model: name.to_string(),
                fraction: status.fraction(),
                status: status.status,
            }),
            Err(e) => {
                bus.emit(SessionEvent::Error {
                    message: format!("Failed to pull '{}': {}", name, e),
                });
                ctx.request_repaint();
                return false;
            }
        }
        ctx.request_repaint();
    }
    true
}

async fn refresh_into(ollama: &OllamaClient, store: &StorageIndexStore, inbox: &RefCell<Inbox>) {
    match ollama.list_models().await {
        Ok(models) => inbox.borrow_mut().models = Some(models),
        Err(e) => log::warn!("Could not list models: {}", e),
    }
    match store.list_indexes().await {
        Ok(names) => inbox.borrow_mut().indexes = Some(names),
        Err(e) => log::warn!("Could not list indexes: {}", e),
    }
}

async fn fetch_text(url: &str) -> Result<String> {
    let response = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| CopilotError::Network(e.to_string()))?;
    if !response.ok() {
        return Err(CopilotError::Network(format!("HTTP {}", response.status())));
    }
    response
        .text()
        .await
        .map_err(|e| CopilotError::Network(e.to_string()))
}
