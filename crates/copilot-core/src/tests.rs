#[cfg(test)]
mod tests {
    use crate::catalog::*;
    use crate::config_store::*;
    use crate::event_bus::EventBus;
    use crate::indexer::*;
    use crate::ingest::*;
    use crate::memory::*;
    use crate::ports::*;
    use crate::retrieval::*;
    use crate::session::*;
    use crate::stream_buffer::*;
    use copilot_types::config::{ChatConfig, CopilotConfig, RetrievalConfig};
    use copilot_types::document::Document;
    use copilot_types::event::SessionEvent;
    use copilot_types::index::{BuildMode, IndexChunk, IndexMetadata};
    use copilot_types::message::*;
    use copilot_types::model::{ModelEntry, PullStatus};
    use copilot_types::{CopilotError, Result};

    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::pin::Pin;
    use std::rc::Rc;
    use async_trait::async_trait;
    use futures::executor::block_on;
    use futures::stream::{self, Stream, StreamExt};

    // ─── Mocks ───────────────────────────────────────────────

    fn deltas(chunks: &[&str]) -> Vec<LlmStreamEvent> {
        chunks.iter().map(|c| LlmStreamEvent::Delta(c.to_string())).collect()
    }

    /// Chat port that replays a fixed event script and records requests
    struct ScriptedChat {
        script: Vec<LlmStreamEvent>,
        requests: RefCell<Vec<ChatRequest>>,
    }

    impl ScriptedChat {
        fn replying(chunks: &[&str]) -> Self {
            let mut script = deltas(chunks);
            script.push(LlmStreamEvent::Done);
            Self { script, requests: RefCell::new(Vec::new()) }
        }

        fn failing_after(chunks: &[&str], message: &str) -> Self {
            let mut script = deltas(chunks);
            script.push(LlmStreamEvent::Error(message.to_string()));
            Self { script, requests: RefCell::new(Vec::new()) }
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.borrow().last().cloned().expect("no request sent")
        }
    }

    #[async_trait(?Send)]
    impl ChatPort for ScriptedChat {
        fn stream_chat(&self, req: ChatRequest) -> ChunkStream {
            self.requests.borrow_mut().push(req);
            Box::pin(stream::iter(self.script.clone()))
        }

        async fn list_models(&self) -> Result<Vec<ModelEntry>> {
            Ok(vec![])
        }

        fn pull_model(&self, _name: &str) -> Pin<Box<dyn Stream<Item = Result<PullStatus>>>> {
            Box::pin(stream::empty())
        }

        async fn delete_model(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    const VOCAB: [&str; 4] = ["jetson", "orin", "power", "camera"];

    /// Embeds text as keyword counts over a tiny vocabulary
    struct KeywordEmbedder {
        calls: Cell<usize>,
    }

    impl KeywordEmbedder {
        fn new() -> Self {
            Self { calls: Cell::new(0) }
        }
    }

    fn keyword_vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB.iter().map(|w| lower.matches(w).count() as f32).collect()
    }

    #[async_trait(?Send)]
    impl EmbeddingPort for KeywordEmbedder {
        async fn embed(&self, _model: &str, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.set(self.calls.get() + 1);
            Ok(inputs.iter().map(|t| keyword_vector(t)).collect())
        }
    }

    #[derive(Default)]
    struct MemoryIndexStore {
        indexes: RefCell<HashMap<String, VectorIndex>>,
    }

    #[async_trait(?Send)]
    impl IndexStore for MemoryIndexStore {
        async fn list_indexes(&self) -> Result<Vec<String>> {
            let mut names: Vec<String> = self.indexes.borrow().keys().cloned().collect();
            names.sort();
            Ok(names)
        }

        async fn load(&self, name: &str) -> Result<Option<VectorIndex>> {
            Ok(self.indexes.borrow().get(name).cloned())
        }

        async fn save(&self, name: &str, index: &VectorIndex) -> Result<()> {
            self.indexes.borrow_mut().insert(name.to_string(), index.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapStorage {
        data: RefCell<HashMap<String, Vec<u8>>>,
    }

    #[async_trait(?Send)]
    impl StoragePort for MapStorage {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.borrow().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
            self.data.borrow_mut().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.data.borrow_mut().remove(key);
            Ok(())
        }

        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
            Ok(self.data.borrow().keys().filter(|k| k.starts_with(prefix)).cloned().collect())
        }

        fn backend_name(&self) -> &str {
            "map"
        }
    }

    /// Retrieval port whose engines echo a fixed reply and record prompts
    struct RecordingRetrieval {
        builds: Cell<usize>,
        prompts: Rc<RefCell<Vec<String>>>,
        reply: Vec<&'static str>,
        fail_build: bool,
    }

    impl RecordingRetrieval {
        fn new(reply: Vec<&'static str>) -> Self {
            Self {
                builds: Cell::new(0),
                prompts: Rc::new(RefCell::new(Vec::new())),
                reply,
                fail_build: false,
            }
        }
    }

    struct EchoEngine {
        prompts: Rc<RefCell<Vec<String>>>,
        reply: Vec<&'static str>,
    }

    #[async_trait(?Send)]
    impl ChatEngine for EchoEngine {
        async fn stream_chat(
            &self,
            query: &str,
            memory: &RollingMemory,
            context_prompt: &str,
        ) -> Result<ChunkStream> {
            self.prompts.borrow_mut().push(context_prompt.to_string());
            memory.put(Message::user(query));
            Ok(Box::pin(stream::iter(deltas(&self.reply))))
        }
    }

    #[async_trait(?Send)]
    impl RetrievalPort for RecordingRetrieval {
        async fn build_engine(
            &self,
            _model: &str,
            _index_name: Option<&str>,
            _uploaded: &[Document],
        ) -> Result<Rc<dyn ChatEngine>> {
            self.builds.set(self.builds.get() + 1);
            if self.fail_build {
                return Err(CopilotError::Index("index missing".to_string()));
            }
            Ok(Rc::new(EchoEngine {
                prompts: self.prompts.clone(),
                reply: self.reply.clone(),
            }))
        }
    }

    fn session_with(threshold: usize, greeting: &str) -> (ChatSession, EventBus) {
        let bus = EventBus::new();
        let config = ChatConfig {
            flush_threshold: threshold,
            greeting: greeting.to_string(),
            ..ChatConfig::default()
        };
        (ChatSession::new(config, "llama3:latest", bus.clone()), bus)
    }

    fn plain(chat: &dyn ChatPort) -> Generators<'_> {
        Generators { chat, retrieval: None }
    }

    fn flushes(events: &[SessionEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::Flush { committed } => Some(committed.clone()),
                _ => None,
            })
            .collect()
    }

    fn run_buffer(threshold: usize, chunks: &[&str]) -> (Vec<String>, String) {
        let mut buffer = StreamBuffer::new(threshold);
        let mut seen = Vec::new();
        let stream = stream::iter(deltas(chunks));
        block_on(drain_stream(stream, &mut buffer, |c| seen.push(c.to_string()))).unwrap();
        (seen, buffer.into_committed())
    }

    // ─── EventBus Tests ──────────────────────────────────────

    #[test]
    fn test_event_bus_emit_and_drain() {
        let bus = EventBus::new();
        assert!(!bus.has_pending());
        bus.emit(SessionEvent::TurnStart { turn_id: 1 });
        bus.emit(SessionEvent::ContextPromptUpdated);
        assert_eq!(bus.pending_count(), 2);
        assert_eq!(bus.drain().len(), 2);
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_event_bus_clone_shares_queue() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();
        bus1.emit(SessionEvent::TurnEnd { turn_id: 3 });
        assert!(bus2.has_pending());
        assert_eq!(bus2.drain().len(), 1);
        assert!(!bus1.has_pending());
    }

    // ─── StreamBuffer Tests ──────────────────────────────────

    #[test]
    fn test_buffer_small_chunks_single_flush() {
        let (events, committed) = run_buffer(20, &["Hi", " there", "!"]);
        assert_eq!(events, vec!["Hi there!"]);
        assert_eq!(committed, "Hi there!");
    }

    #[test]
    fn test_buffer_threshold_crossing() {
        let (events, committed) = run_buffer(5, &["ab", "cd", "ef", "gh"]);
        assert_eq!(events, vec!["abcdef", "abcdefgh"]);
        assert_eq!(committed, "abcdefgh");
    }

    #[test]
    fn test_buffer_coalesces_single_char_chunks() {
        let seven = ["a"; 7];
        let (events, _) = run_buffer(3, &seven);
        assert_eq!(events.len(), 3);

        let six = ["a"; 6];
        let (events, _) = run_buffer(3, &six);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_buffer_completeness_for_any_threshold() {
        let chunks = ["The ", "Jetson ", "Orin", " has ", "", "a GPU", "."];
        let expected: String = chunks.concat();
        for threshold in [0, 1, 2, 5, 20, 1000] {
            let (events, committed) = run_buffer(threshold, &chunks);
            assert_eq!(committed, expected, "threshold {}", threshold);
            assert_eq!(events.last().unwrap(), &expected);
            // Each snapshot extends the previous one
            for pair in events.windows(2) {
                assert!(pair[1].starts_with(&pair[0]));
                assert!(pair[1].len() > pair[0].len());
            }
        }
    }

    #[test]
    fn test_buffer_threshold_zero_flushes_every_nonempty_chunk() {
        let (events, _) = run_buffer(0, &["a", "", "b", "c"]);
        assert_eq!(events, vec!["a", "ab", "abc"]);
    }

    #[test]
    fn test_buffer_counts_characters_not_bytes() {
        let mut buffer = StreamBuffer::new(3);
        assert!(buffer.push("éé").is_none());
        assert_eq!(buffer.push("é"), Some("ééé"));
        assert_eq!(buffer.flush_count(), 1);
        assert!(buffer.pending().is_empty());
    }

    #[test]
    fn test_buffer_finish_without_pending_is_noop() {
        let mut buffer = StreamBuffer::new(2);
        assert!(buffer.finish().is_none());
        buffer.push("ab");
        assert!(buffer.finish().is_none());
        assert_eq!(buffer.flush_count(), 1);
    }

    #[test]
    fn test_drain_stops_at_done() {
        let mut buffer = StreamBuffer::new(100);
        let events = vec![
            LlmStreamEvent::Delta("kept".to_string()),
            LlmStreamEvent::Done,
            LlmStreamEvent::Delta("ignored".to_string()),
        ];
        block_on(drain_stream(stream::iter(events), &mut buffer, |_| {})).unwrap();
        assert_eq!(buffer.committed(), "kept");
    }

    #[test]
    fn test_drain_error_flushes_remainder_then_fails() {
        let mut buffer = StreamBuffer::new(100);
        let mut seen = Vec::new();
        let mut events = deltas(&["par", "tial"]);
        events.push(LlmStreamEvent::Error("connection reset".to_string()));
        let result = block_on(drain_stream(stream::iter(events), &mut buffer, |c| {
            seen.push(c.to_string())
        }));
        assert!(matches!(result, Err(CopilotError::GenerationStream(ref m)) if m == "connection reset"));
        assert_eq!(seen, vec!["partial"]);
    }

    // ─── RollingMemory Tests ─────────────────────────────────

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_memory_window_respects_budget_and_starts_with_user() {
        let memory = RollingMemory::new(4);
        memory.put(Message::user("aaaa"));
        memory.put(Message::assistant("bbbbbbbb"));
        memory.put(Message::user("cc"));
        memory.put(Message::assistant("dddd"));

        let window = memory.get();
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["cc", "dddd"]);
        assert_eq!(memory.all().len(), 4);
        assert_eq!(memory.token_count(), 5);
    }

    #[test]
    fn test_memory_oversized_message_yields_empty_window() {
        let memory = RollingMemory::new(1);
        memory.put(Message::user("this is far too long"));
        assert!(memory.get().is_empty());
        assert_eq!(memory.len(), 1);
    }

    #[test]
    fn test_memory_clones_share_buffer_and_strip_avatars() {
        let memory = RollingMemory::new(4096);
        let handle = memory.clone();
        handle.put(Message::user("hello"));
        assert_eq!(memory.len(), 1);
        assert!(memory.all()[0].avatar.is_none());
        assert_eq!(memory.token_limit(), 4096);
    }

    // ─── Retrieval Tests ─────────────────────────────────────

    #[test]
    fn test_split_text_prefers_whitespace() {
        let chunks = split_text("one two three four five six", 10, 0);
        assert_eq!(chunks, vec!["one two", "three", "four five", "six"]);
    }

    #[test]
    fn test_split_text_overlap() {
        let chunks = split_text("abcdefghij", 4, 2);
        assert_eq!(chunks, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_split_text_short_and_blank() {
        assert_eq!(split_text("  short  ", 1024, 200), vec!["short"]);
        assert!(split_text("   ", 1024, 200).is_empty());
        assert!(split_text("", 10, 2).is_empty());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_fill_context() {
        assert_eq!(fill_context("Docs:\n{context_str}\nEnd", "X"), "Docs:\nX\nEnd");
        assert_eq!(fill_context("no placeholder", "X"), "no placeholder");
    }

    fn chunk(doc_id: &str, text: &str) -> IndexChunk {
        IndexChunk {
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            metadata: Default::default(),
            embedding: keyword_vector(text),
        }
    }

    #[test]
    fn test_vector_index_top_k_orders_by_similarity() {
        let mut index = VectorIndex::new(IndexMetadata::new("embed"));
        index.extend(vec![
            chunk("d1", "camera setup"),
            chunk("d2", "orin power modes"),
            chunk("d2", "jetson orin power"),
        ]);
        assert_eq!(index.document_count(), 2);

        let hits = index.top_k(&keyword_vector("orin power"), 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk.text, "orin power modes");
        assert!(hits[0].score >= hits[1].score);
        assert!(hits.iter().all(|h| h.chunk.doc_id == "d2"));

        let merged = index.merged_with(vec![chunk("d3", "camera")]);
        assert_eq!(merged.len(), 4);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_embed_documents_chunks_and_keeps_metadata() {
        let embedder = KeywordEmbedder::new();
        let settings = RetrievalConfig { chunk_size: 10, chunk_overlap: 0, ..RetrievalConfig::default() };
        let docs = vec![
            Document::new("one two three four").with_meta("filename", "a.txt"),
            Document::new("   "),
        ];
        let chunks = block_on(embed_documents(&docs, &embedder, "embed", &settings)).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.doc_id == docs[0].id));
        assert_eq!(chunks[0].metadata.get("filename").map(String::as_str), Some("a.txt"));
        // Blank documents are skipped without an embedding call
        assert_eq!(embedder.calls.get(), 1);
    }

    #[test]
    fn test_context_engine_fills_prompt_and_records_memory() {
        let chat = Rc::new(ScriptedChat::replying(&["Use ", "nvpmodel."]));
        let embedder = Rc::new(KeywordEmbedder::new());
        let mut index = VectorIndex::new(IndexMetadata::new("embed"));
        index.extend(vec![chunk("d1", "Jetson Orin power modes"), chunk("d2", "Camera guide")]);

        let engine = ContextChatEngine::new(chat.clone(), embedder, index, "llama3:latest", 1);
        let memory = RollingMemory::new(4096);
        memory.put(Message::user("earlier"));
        memory.put(Message::assistant("reply"));

        let stream = block_on(engine.stream_chat("orin power?", &memory, "Ctx: {context_str}")).unwrap();
        let events: Vec<LlmStreamEvent> = block_on(stream.collect());
        assert_eq!(events.last(), Some(&LlmStreamEvent::Done));

        let req = chat.last_request();
        assert_eq!(req.model, "llama3:latest");
        assert_eq!(req.messages[0].role, Role::System);
        assert_eq!(req.messages[0].content, "Ctx: Jetson Orin power modes");
        assert_eq!(req.messages[1].content, "earlier");
        assert_eq!(req.messages.last().unwrap().content, "orin power?");
        assert_eq!(req.messages.len(), 4);

        let stored = memory.all();
        assert_eq!(stored.len(), 4);
        assert_eq!(stored[2].content, "orin power?");
        assert_eq!(stored[3].role, Role::Assistant);
        assert_eq!(stored[3].content, "Use nvpmodel.");
    }

    #[test]
    fn test_context_engine_failed_stream_records_no_answer() {
        let chat = Rc::new(ScriptedChat::failing_after(&["Use "], "boom"));
        let engine = ContextChatEngine::new(
            chat,
            Rc::new(KeywordEmbedder::new()),
            VectorIndex::new(IndexMetadata::new("embed")),
            "llama3:latest",
            2,
        );
        let memory = RollingMemory::new(4096);
        let stream = block_on(engine.stream_chat("q", &memory, "{context_str}")).unwrap();
        let events: Vec<LlmStreamEvent> = block_on(stream.collect());
        assert_eq!(events.last(), Some(&LlmStreamEvent::Error("boom".to_string())));
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.all()[0].role, Role::User);
    }

    #[test]
    fn test_indexed_retrieval_requires_index_or_uploads() {
        let retrieval = IndexedRetrieval::new(
            Rc::new(ScriptedChat::replying(&[])),
            Rc::new(KeywordEmbedder::new()),
            Rc::new(MemoryIndexStore::default()),
            "embed",
            RetrievalConfig::default(),
        );
        let err = block_on(retrieval.build_engine("m", None, &[])).err().unwrap();
        assert!(matches!(err, CopilotError::CollaboratorUnavailable(_)));

        let err = block_on(retrieval.build_engine("m", Some("missing"), &[])).err().unwrap();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_indexed_retrieval_merges_uploads_into_index() {
        let chat = Rc::new(ScriptedChat::replying(&["ok"]));
        let store = Rc::new(MemoryIndexStore::default());
        let mut base = VectorIndex::new(IndexMetadata::new("embed"));
        base.extend(vec![chunk("d1", "Jetson Orin power")]);
        block_on(store.save("docs", &base)).unwrap();

        let retrieval = IndexedRetrieval::new(
            chat.clone(),
            Rc::new(KeywordEmbedder::new()),
            store,
            "embed",
            RetrievalConfig { similarity_top_k: 1, ..RetrievalConfig::default() },
        );
        let uploads = vec![Document::new("camera camera wiring")];
        let engine = block_on(retrieval.build_engine("llama3:latest", Some("docs"), &uploads)).unwrap();

        let memory = RollingMemory::new(4096);
        let stream = block_on(engine.stream_chat("camera?", &memory, "{context_str}")).unwrap();
        let _: Vec<LlmStreamEvent> = block_on(stream.collect());
        assert_eq!(chat.last_request().messages[0].content, "camera camera wiring");
    }

    // ─── Ingest Tests ────────────────────────────────────────

    #[test]
    fn test_parse_text_upload() {
        let docs = parse_upload("notes.txt", "hello jetson".as_bytes()).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "hello jetson");
        assert_eq!(docs[0].filename(), Some("notes.txt"));
    }

    #[test]
    fn test_parse_unknown_extension_is_lossy_text() {
        let docs = parse_upload("data.log", &[b'o', b'k', 0xff]).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.starts_with("ok"));
    }

    #[test]
    fn test_parse_markdown_sections() {
        let md = "intro\n# A\nalpha\n```\n# not a heading\n```\n## B\nbeta\n";
        let docs = parse_upload("guide.md", md.as_bytes()).unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, vec!["intro", "# A\nalpha\n```\n# not a heading\n```", "## B\nbeta"]);
        assert!(docs.iter().all(|d| d.filename() == Some("guide.md")));
    }

    fn docx(document_xml: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::write::FileOptions;
        use zip::CompressionMethod;

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_parse_docx_paragraphs() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Flashing the </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>Orin</w:t></w:r></w:p>
    <w:p><w:r><w:t>Step</w:t><w:tab/><w:t>1 &amp; 2</w:t></w:r></w:p>
    <w:p/>
  </w:body>
</w:document>"#;
        let docs = parse_upload("Setup Guide.DOCX", &docx(xml)).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "Flashing the Orin\nStep\t1 & 2");
        assert_eq!(docs[0].filename(), Some("Setup Guide.DOCX"));
    }

    #[test]
    fn test_parse_docx_without_text() {
        let xml = r#"<w:document xmlns:w="urn:w"><w:body><w:p/></w:body></w:document>"#;
        let err = parse_upload("blank.docx", &docx(xml)).unwrap_err();
        assert!(matches!(err, CopilotError::Ingest(ref m) if m.contains("blank.docx")));
    }

    #[test]
    fn test_parse_damaged_binary_uploads() {
        let pdf = parse_upload("manual.pdf", b"this is not a pdf").unwrap_err();
        assert!(matches!(pdf, CopilotError::Ingest(ref m) if m.starts_with("manual.pdf:")));

        let docx = parse_upload("notes.docx", b"PK but not a zip").unwrap_err();
        assert!(matches!(docx, CopilotError::Ingest(ref m) if m.starts_with("notes.docx:")));
    }

    #[test]
    fn test_parse_uploads_keeps_good_files() {
        let files = vec![
            UploadedFile::new("a.txt", "alpha"),
            UploadedFile::new("b.pdf", "this is not a pdf"),
            UploadedFile::new("c.txt", "gamma"),
        ];
        let (docs, errors) = parse_uploads(&files);
        assert_eq!(docs.len(), 2);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_url_list_and_scheme_check() {
        let urls = parse_url_list("  https://docs.nvidia.com/jetson \n\n http://192.168.1.5:8080/notes\nftp://x\n");
        assert_eq!(
            urls,
            vec!["https://docs.nvidia.com/jetson", "http://192.168.1.5:8080/notes", "ftp://x"]
        );
        assert!(check_url(&urls[0]).is_ok());
        assert!(check_url(&urls[1]).is_ok());
        assert!(check_url("HTTPS://Example.com").is_ok());
        assert!(matches!(check_url(&urls[2]), Err(CopilotError::Ingest(_))));
        assert!(check_url("https://").is_err());
        assert!(check_url("docs.nvidia.com").is_err());
    }

    #[test]
    fn test_html_to_text() {
        let html = r#"<!DOCTYPE html>
<html><head><title>Ignored</title><style>p { color: red }</style></head>
<body>
  <!-- nav <p>hidden</p> -->
  <h1>Jetson  Orin</h1>
  <p>Power <b>on</b> the
     board &amp; wait&nbsp;for &lt;boot&gt; &#8212; done.</p>
  <script>var x = "<p>nope</p>";</script>
  <ul><li>one</li><li>two</li></ul>
</body></html>"#;
        assert_eq!(
            html_to_text(html),
            "Jetson Orin\nPower on the board & wait for <boot> \u{2014} done.\none\ntwo"
        );
    }

    #[test]
    fn test_web_document() {
        let doc = web_document("https://example.com/a", "<p>Hello &amp; welcome</p>").unwrap();
        assert_eq!(doc.text, "Hello & welcome");
        assert_eq!(doc.metadata.get("url").map(String::as_str), Some("https://example.com/a"));

        let empty = web_document("https://example.com/b", "<script>only()</script>");
        assert!(matches!(empty, Err(CopilotError::Ingest(ref m)) if m.contains("example.com/b")));
    }

    // ─── Catalog Tests ───────────────────────────────────────

    fn model(name: &str, size: u64) -> ModelEntry {
        ModelEntry { name: name.to_string(), size }
    }

    #[test]
    fn test_catalog_builtin_and_override() {
        let builtin = ModelCatalog::builtin();
        assert_eq!(builtin.lookup("mistral:7b").ram, "12 GB");
        assert_eq!(builtin.lookup("unknown:1b").ram, "-");

        let file = ModelCatalog::from_json(r#"{"mistral:7b":{"RAM":"10 GB","Why":"fast"}}"#).unwrap();
        let merged = builtin.merge(file);
        assert_eq!(merged.lookup("mistral:7b").ram, "10 GB");
        assert_eq!(merged.lookup("mistral:7b").why, "fast");
        assert_eq!(merged.lookup("llama3:latest").ram, "16 GB");
    }

    #[test]
    fn test_catalog_from_bad_json() {
        assert!(ModelCatalog::from_json("[1,2]").is_err());
    }

    #[test]
    fn test_catalog_rows_split() {
        let models = vec![
            model("llama3:latest", 4 * 1024 * 1024),
            model("mxbai-embed-large:latest", 0),
        ];
        let (llm, embed) = catalog_rows(&models, &ModelCatalog::builtin());
        assert_eq!(llm.len(), 1);
        assert_eq!(llm[0].size_label(), "4.0");
        assert_eq!(llm[0].info.reasoning, "Strong general reasoning");
        assert_eq!(embed.len(), 1);
        assert_eq!(embed[0].size_label(), "N/A");
    }

    #[test]
    fn test_default_model_selection() {
        let models = vec![model("mxbai-embed-large:latest", 1), model("mistral:7b", 1)];
        assert_eq!(default_model(&models, "llama3:latest"), Some("mistral:7b".to_string()));
        let models = vec![model("mistral:7b", 1), model("llama3:latest", 1)];
        assert_eq!(default_model(&models, "llama3:latest"), Some("llama3:latest".to_string()));
        assert_eq!(default_model(&[], "llama3:latest"), None);
    }

    #[test]
    fn test_missing_models() {
        let installed = vec![model("llama3:latest", 1)];
        let missing = missing_models(&installed, &["llama3:latest", "mxbai-embed-large:latest"]);
        assert_eq!(missing, vec!["mxbai-embed-large:latest"]);
    }

    // ─── Indexer Tests ───────────────────────────────────────

    fn build_req(mode: BuildMode, name: &str, texts: &[&str]) -> IndexBuildRequest {
        IndexBuildRequest {
            mode,
            name: name.to_string(),
            embedding_model: "mxbai-embed-large:latest".to_string(),
            documents: texts.iter().map(|t| Document::new(*t)).collect(),
        }
    }

    #[test]
    fn test_build_new_index() {
        let store = MemoryIndexStore::default();
        let embedder = KeywordEmbedder::new();
        let report = block_on(build_index(
            build_req(BuildMode::Create, "  manuals ", &["jetson orin", "camera"]),
            &store,
            &embedder,
            &RetrievalConfig::default(),
        ))
        .unwrap();
        assert_eq!(report.name, "manuals");
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks_added, 2);
        assert_eq!(report.total_chunks, 2);
        assert!(report.elapsed_secs >= 0.0);

        let saved = block_on(store.load("manuals")).unwrap().unwrap();
        assert_eq!(saved.metadata.embedding_model, "mxbai-embed-large:latest");
        assert_eq!(block_on(store.list_indexes()).unwrap(), vec!["manuals"]);
    }

    #[test]
    fn test_build_report_summary() {
        let mut report = IndexBuildReport {
            mode: BuildMode::Create,
            name: "manuals".to_string(),
            embedding_model: "mxbai-embed-large:latest".to_string(),
            documents: 2,
            chunks_added: 5,
            total_chunks: 5,
            elapsed_secs: 1.254,
        };
        assert_eq!(
            report.summary(),
            "Index 'manuals' created successfully in 1.25 seconds (5 chunk(s) from 2 document(s), 5 in total)"
        );
        report.mode = BuildMode::Append;
        assert!(report.summary().starts_with("Index 'manuals' updated successfully in 1.25 seconds"));
    }

    #[test]
    fn test_build_rejects_bad_requests() {
        let store = MemoryIndexStore::default();
        let embedder = KeywordEmbedder::new();
        let settings = RetrievalConfig::default();
        block_on(build_index(build_req(BuildMode::Create, "x", &["a"]), &store, &embedder, &settings)).unwrap();

        let dup = block_on(build_index(build_req(BuildMode::Create, "x", &["a"]), &store, &embedder, &settings));
        assert!(dup.unwrap_err().to_string().contains("already exists"));

        let unnamed = block_on(build_index(build_req(BuildMode::Create, "  ", &["a"]), &store, &embedder, &settings));
        assert!(matches!(unnamed, Err(CopilotError::Index(_))));

        let empty = block_on(build_index(build_req(BuildMode::Create, "y", &[]), &store, &embedder, &settings));
        assert!(empty.unwrap_err().to_string().contains("at least one file"));

        let missing = block_on(build_index(build_req(BuildMode::Append, "nope", &["a"]), &store, &embedder, &settings));
        assert!(missing.unwrap_err().to_string().contains("nope"));
    }

    #[test]
    fn test_append_keeps_locked_embedding_model() {
        let store = MemoryIndexStore::default();
        let embedder = KeywordEmbedder::new();
        let settings = RetrievalConfig::default();
        let mut first = build_req(BuildMode::Create, "docs", &["jetson"]);
        first.embedding_model = "bge-m3".to_string();
        block_on(build_index(first, &store, &embedder, &settings)).unwrap();

        let report = block_on(build_index(
            build_req(BuildMode::Append, "docs", &["orin", "camera"]),
            &store,
            &embedder,
            &settings,
        ))
        .unwrap();
        assert_eq!(report.embedding_model, "bge-m3");
        assert_eq!(report.total_chunks, 3);
        assert_eq!(
            block_on(locked_embedding_model(&store, "docs")).unwrap(),
            Some("bge-m3".to_string())
        );
        assert_eq!(block_on(locked_embedding_model(&store, "none")).unwrap(), None);
    }

    // ─── Config Store Tests ──────────────────────────────────

    #[test]
    fn test_config_store_load_and_save() {
        let storage = MapStorage::default();
        assert!(block_on(load_config(&storage)).unwrap().is_none());

        let mut config = CopilotConfig::default();
        config.chat.flush_threshold = 1;
        config.retrieval.index_name = Some("manuals".to_string());
        block_on(save_config(&storage, &config)).unwrap();

        let loaded = block_on(load_config(&storage)).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_store_corrupt_value() {
        let storage = MapStorage::default();
        block_on(storage.set(CONFIG_STORAGE_KEY, b"not json")).unwrap();
        assert!(matches!(block_on(load_config(&storage)), Err(CopilotError::Serialization(_))));
    }

    // ─── ChatSession Tests ───────────────────────────────────

    #[test]
    fn test_session_starts_with_greeting() {
        let (session, _) = session_with(20, "Ask me anything");
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, Role::Assistant);
        assert_eq!(session.transcript()[0].content, "Ask me anything");
        assert_eq!(session.state, SessionState::Idle);
        assert!(session.memory().is_empty());
    }

    #[test]
    fn test_turn_with_small_chunks() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["Hi", " there", "!"]);

        let text = block_on(session.run_turn("Hello", GenerationMode::Plain, plain(&chat))).unwrap();
        assert_eq!(text, "Hi there!");

        let events = bus.drain();
        assert_eq!(flushes(&events), vec!["Hi there!"]);

        let t = session.transcript();
        assert_eq!(t.len(), 3);
        assert_eq!((t[1].role, t[1].content.as_str()), (Role::User, "Hello"));
        assert_eq!((t[2].role, t[2].content.as_str()), (Role::Assistant, "Hi there!"));
        assert_eq!(session.state, SessionState::Idle);
    }

    #[test]
    fn test_turn_flushes_at_threshold() {
        let (mut session, bus) = session_with(5, "Hi!");
        let chat = ScriptedChat::replying(&["ab", "cd", "ef", "gh"]);
        block_on(session.run_turn("go", GenerationMode::Plain, plain(&chat))).unwrap();
        assert_eq!(flushes(&bus.drain()), vec!["abcdef", "abcdefgh"]);
        assert_eq!(session.transcript().last().unwrap().content, "abcdefgh");
    }

    #[test]
    fn test_turn_event_sequence() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["ok"]);
        block_on(session.run_turn("ping", GenerationMode::Plain, plain(&chat))).unwrap();

        let events = bus.drain();
        assert!(matches!(&events[0], SessionEvent::MessageAppended { message } if message.role == Role::User));
        assert!(matches!(events[1], SessionEvent::TurnStart { turn_id: 1 }));
        assert!(matches!(&events[2], SessionEvent::Flush { committed } if committed == "ok"));
        assert!(matches!(&events[3], SessionEvent::MessageAppended { message } if message.role == Role::Assistant));
        assert!(matches!(events[4], SessionEvent::TurnEnd { turn_id: 1 }));
        assert_eq!(events.len(), 5);
    }

    #[test]
    fn test_mid_stream_failure_keeps_partial_but_appends_nothing() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::failing_after(&["Jetson ", "Orin"], "stream reset");

        let result = block_on(session.run_turn("tell me", GenerationMode::Plain, plain(&chat)));
        assert!(matches!(result, Err(CopilotError::GenerationStream(_))));

        let events = bus.drain();
        assert_eq!(flushes(&events), vec!["Jetson Orin"]);
        assert!(events.iter().any(|e| matches!(e, SessionEvent::TurnFailed { committed } if committed == "Jetson Orin")));
        assert!(events.iter().any(|e| matches!(e, SessionEvent::Error { message } if message.contains("stream reset"))));
        assert!(matches!(events.last(), Some(SessionEvent::TurnEnd { .. })));

        // greeting + user only
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].role, Role::User);
        assert!(matches!(session.state, SessionState::Error(_)));
    }

    #[test]
    fn test_export_transcript() {
        let (mut session, _) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["A"]);
        block_on(session.run_turn("Q", GenerationMode::Plain, plain(&chat))).unwrap();
        assert_eq!(session.export_transcript(), "Assistant: Hi!\n\nUser: Q\n\nAssistant: A");
    }

    #[test]
    fn test_export_lists_turns_in_order() {
        let (mut session, _) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["r"]);
        for q in ["first", "second", "third"] {
            block_on(session.run_turn(q, GenerationMode::Plain, plain(&chat))).unwrap();
        }
        let export = session.export_transcript();
        let first = export.find("User: first").unwrap();
        let second = export.find("User: second").unwrap();
        let third = export.find("User: third").unwrap();
        assert!(first < second && second < third);
        assert!(!export.contains("System"));
        assert_eq!(export.split("\n\n").count(), 7);
    }

    #[test]
    fn test_empty_submission_rejected_without_mutation() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["never"]);
        for blank in ["", "   ", "\n\t"] {
            let result = block_on(session.run_turn(blank, GenerationMode::Plain, plain(&chat)));
            assert!(matches!(result, Err(CopilotError::EmptySubmission)));
        }
        assert_eq!(session.transcript().len(), 1);
        assert!(!bus.has_pending());
        assert!(chat.requests.borrow().is_empty());
    }

    #[test]
    fn test_submit_keeps_text_as_typed() {
        let (mut session, _) = session_with(20, "Hi!");
        let snippet = "    fn main() {}\n";
        session.submit(snippet).unwrap();
        assert_eq!(session.transcript()[1].content, snippet);
        assert_eq!(session.transcript()[1].avatar, Some(Avatar::User));

        // The model sees the same text
        let chat = ScriptedChat::replying(&["ok"]);
        block_on(session.generate_response(GenerationMode::Plain, plain(&chat))).unwrap();
        let req = chat.last_request();
        assert_eq!(req.messages[2].content, snippet);
    }

    #[test]
    fn test_plain_request_assembly() {
        let (mut session, _) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["A1"]);
        block_on(session.run_turn("Q1", GenerationMode::Plain, plain(&chat))).unwrap();

        assert!(session.set_context_prompt("Be brief. {context_str}"));
        block_on(session.run_turn("Q2", GenerationMode::Plain, plain(&chat))).unwrap();

        let req = chat.last_request();
        assert_eq!(req.model, "llama3:latest");
        let shape: Vec<(Role, &str)> = req.messages.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (Role::System, "Be brief. {context_str}"),
                (Role::Assistant, "Hi!"),
                (Role::User, "Q1"),
                (Role::Assistant, "A1"),
                (Role::User, "Q2"),
            ]
        );
        assert!(req.messages.iter().all(|m| m.avatar.is_none()));
    }

    #[test]
    fn test_set_context_prompt_only_emits_on_change() {
        let (mut session, bus) = session_with(20, "Hi!");
        let current = session.context_prompt().to_string();
        assert!(!session.set_context_prompt(current));
        assert!(!bus.has_pending());
        assert!(session.set_context_prompt("new"));
        assert!(matches!(bus.drain().as_slice(), [SessionEvent::ContextPromptUpdated]));
    }

    #[test]
    fn test_reset_restores_greeting_and_is_idempotent() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["A"]);
        block_on(session.run_turn("Q", GenerationMode::Plain, plain(&chat))).unwrap();
        session.add_documents(vec![Document::new("doc")]);
        session.memory().put(Message::user("remembered"));

        session.reset();
        let once: Vec<Message> = session.transcript().to_vec();
        assert_eq!(once, vec![Message::assistant("Hi!")]);
        assert!(session.memory().is_empty());
        assert_eq!(session.memory().token_limit(), 4096);
        assert!(session.uploaded().is_empty());

        session.reset();
        assert_eq!(session.transcript(), &once[..]);
        assert!(session.memory().is_empty());
        assert!(session.uploaded().is_empty());
        assert_eq!(session.state, SessionState::Idle);

        let resets = bus
            .drain()
            .into_iter()
            .filter(|e| matches!(e, SessionEvent::Reset { .. }))
            .count();
        assert_eq!(resets, 2);
    }

    #[test]
    fn test_applied_config_carries_into_reset() {
        let (mut session, _) = session_with(20, "Hi!");
        let restored = ChatConfig {
            flush_threshold: 7,
            memory_token_limit: 512,
            greeting: "Welcome back.".to_string(),
            ..ChatConfig::default()
        };

        session.apply_config(&restored);
        assert_eq!(session.transcript(), &[Message::assistant("Welcome back.")][..]);
        assert_eq!(session.memory().token_limit(), 512);
        assert_eq!(session.flush_threshold(), 7);

        let chat = ScriptedChat::replying(&["A"]);
        block_on(session.run_turn("Q", GenerationMode::Plain, plain(&chat))).unwrap();
        session.reset();
        assert_eq!(session.transcript(), &[Message::assistant("Welcome back.")][..]);
        assert_eq!(session.memory().token_limit(), 512);
    }

    #[test]
    fn test_apply_config_keeps_ongoing_conversation() {
        let (mut session, _) = session_with(20, "Hi!");
        session.set_context_prompt("Answer in French.");
        session.submit("Q").unwrap();

        session.apply_config(&ChatConfig {
            greeting: "Hello again.".to_string(),
            ..ChatConfig::default()
        });
        assert_eq!(session.transcript()[0], Message::assistant("Hi!"));
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.context_prompt(), "Answer in French.");
    }

    #[test]
    fn test_transcript_never_empty() {
        let (mut session, _) = session_with(3, "Hi!");
        let ok = ScriptedChat::replying(&["fine"]);
        let bad = ScriptedChat::failing_after(&[], "down");
        assert!(!session.transcript().is_empty());
        block_on(session.run_turn("a", GenerationMode::Plain, plain(&ok))).unwrap();
        assert!(!session.transcript().is_empty());
        let _ = block_on(session.run_turn("b", GenerationMode::Plain, plain(&bad)));
        assert!(!session.transcript().is_empty());
        session.reset();
        assert_eq!(session.transcript().len(), 1);
        let _ = session.submit("");
        assert_eq!(session.transcript().len(), 1);
    }

    #[test]
    fn test_retrieval_turn_uses_engine_and_caches_it() {
        let (mut session, _) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["unused"]);
        let retrieval = RecordingRetrieval::new(vec!["From ", "the docs."]);
        let gens = Generators { chat: &chat, retrieval: Some(&retrieval) };

        let text = block_on(session.run_turn("What is Orin?", GenerationMode::RetrievalAugmented, gens)).unwrap();
        assert_eq!(text, "From the docs.");
        block_on(session.run_turn("And Nano?", GenerationMode::RetrievalAugmented, gens)).unwrap();

        assert_eq!(retrieval.builds.get(), 1);
        assert!(session.has_cached_engine());
        assert!(chat.requests.borrow().is_empty());
        // The engine receives the raw prompt with its placeholder
        assert!(retrieval.prompts.borrow().iter().all(|p| p.contains("{context_str}")));
        // The engine, not the session, wrote to memory
        assert_eq!(session.memory().len(), 2);
        assert_eq!(session.transcript().len(), 5);
    }

    #[test]
    fn test_engine_rebuilt_when_inputs_change() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&[]);
        let retrieval = RecordingRetrieval::new(vec!["x"]);
        let gens = Generators { chat: &chat, retrieval: Some(&retrieval) };

        block_on(session.run_turn("q1", GenerationMode::RetrievalAugmented, gens)).unwrap();
        assert_eq!(session.add_documents(vec![Document::new("new doc")]), 1);
        assert!(bus.drain().iter().any(|e| matches!(e, SessionEvent::DocumentsAdded { added: 1, total: 1 })));
        assert!(!session.has_cached_engine());

        block_on(session.run_turn("q2", GenerationMode::RetrievalAugmented, gens)).unwrap();
        session.select_index(Some("manuals".to_string()));
        block_on(session.run_turn("q3", GenerationMode::RetrievalAugmented, gens)).unwrap();
        session.set_model("mistral:7b");
        block_on(session.run_turn("q4", GenerationMode::RetrievalAugmented, gens)).unwrap();
        assert_eq!(retrieval.builds.get(), 4);

        // Unchanged selections keep the cache
        session.select_index(Some("manuals".to_string()));
        session.set_model("mistral:7b");
        assert!(session.has_cached_engine());

        session.invalidate_engine();
        assert!(!session.has_cached_engine());
    }

    #[test]
    fn test_retrieval_without_collaborator_is_unavailable() {
        let (mut session, bus) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&["x"]);
        let result = block_on(session.run_turn("q", GenerationMode::RetrievalAugmented, plain(&chat)));
        assert!(matches!(result, Err(CopilotError::CollaboratorUnavailable(_))));
        assert_eq!(session.transcript().len(), 2);
        assert!(bus.drain().iter().any(|e| matches!(e, SessionEvent::Error { .. })));
    }

    #[test]
    fn test_engine_build_failure_maps_to_unavailable() {
        let (mut session, _) = session_with(20, "Hi!");
        let chat = ScriptedChat::replying(&[]);
        let mut retrieval = RecordingRetrieval::new(vec![]);
        retrieval.fail_build = true;
        let gens = Generators { chat: &chat, retrieval: Some(&retrieval) };

        let err = block_on(session.run_turn("q", GenerationMode::RetrievalAugmented, gens)).unwrap_err();
        assert!(matches!(err, CopilotError::CollaboratorUnavailable(ref m) if m.contains("index missing")));
        assert!(!session.has_cached_engine());

        // A manual retry after the failure goes through the builder again
        let _ = block_on(session.run_turn("q", GenerationMode::RetrievalAugmented, gens));
        assert_eq!(retrieval.builds.get(), 2);
    }

    #[test]
    fn test_flush_threshold_is_configurable() {
        let (mut session, bus) = session_with(20, "Hi!");
        session.set_flush_threshold(1);
        assert_eq!(session.flush_threshold(), 1);
        let chat = ScriptedChat::replying(&["a", "b", "c"]);
        block_on(session.run_turn("q", GenerationMode::Plain, plain(&chat))).unwrap();
        assert_eq!(flushes(&bus.drain()), vec!["a", "ab", "abc"]);
    }
}
