//! Per-query state machine.
//!
//! `Received → Normalized → Routed → {ShortCircuited | Classified} →
//! Retrieved → Assembled → Generated → Returned`, or `Failed(kind)` when a
//! blocking stage fails. Only translation degrades in place; nothing is
//! retried.

use crate::config::AssistantConfig;
use crate::context::ContextAssembler;
use crate::error::PipelineError;
use crate::generator::{apology, AnswerGenerator, GeneratorSettings};
use crate::index::CorpusIndex;
use crate::intent::IntentClassifier;
use crate::models::{FailureKind, Intent, PipelineState, QaResponse, Query, QueryType};
use crate::normalizer::{NormalizedQuery, QueryNormalizer};
use crate::phrases::PhraseBook;
use crate::product::ProductCatalog;
use crate::retriever::{Retriever, RetrieverSettings};
use crate::router::{greeting_reply, out_of_scope_reply, QueryTypeRouter};
use crate::traits::{CompletionBackend, Translator, VectorIndex};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub struct AssistantPipeline<I, T, G> {
    normalizer: QueryNormalizer<T>,
    router: QueryTypeRouter,
    classifier: IntentClassifier,
    catalog: ProductCatalog,
    retriever: Retriever<I>,
    assembler: ContextAssembler,
    generator: AnswerGenerator<G>,
}

struct Outcome {
    response: QaResponse,
    error: Option<PipelineError>,
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?*state, to = ?next, "state transition");
    *state = next;
}

impl<T, G> AssistantPipeline<Arc<CorpusIndex>, T, G>
where
    T: Translator,
    G: CompletionBackend,
{
    /// Pipeline over a shared in-process index; the product table is taken
    /// from the index.
    pub fn from_index(
        index: Arc<CorpusIndex>,
        translator: T,
        generation: G,
        config: &AssistantConfig,
    ) -> Result<Self, PipelineError> {
        let catalog = index.catalog().clone();
        Self::new(index, catalog, translator, generation, config)
    }
}

impl<I, T, G> AssistantPipeline<I, T, G>
where
    I: VectorIndex,
    T: Translator,
    G: CompletionBackend,
{
    pub fn new(
        index: I,
        catalog: ProductCatalog,
        translator: T,
        generation: G,
        config: &AssistantConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        let names: Vec<String> = catalog.ids().map(|id| id.as_str().to_string()).collect();

        let normalizer = QueryNormalizer::new(translator, config.backend.translation_timeout())
            .with_protected_names(&names)?;
        let retriever = Retriever::new(
            index,
            RetrieverSettings::from_config(&config.retrieval, config.backend.retrieval_timeout()),
        );
        let generator = AnswerGenerator::new(
            generation,
            PhraseBook::with_overrides(&config.phrases.entries)?,
            GeneratorSettings {
                pivot_temperature: config.backend.pivot_temperature,
                render_temperature: config.backend.render_temperature,
                timeout: config.backend.generation_timeout(),
            },
        );

        Ok(Self {
            normalizer,
            router: QueryTypeRouter::with_product_names(&names),
            classifier: IntentClassifier::default(),
            catalog,
            retriever,
            assembler: ContextAssembler::from(&config.context),
            generator,
        })
    }

    pub fn with_classifier(mut self, classifier: IntentClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn retriever(&self) -> &Retriever<I> {
        &self.retriever
    }

    pub fn generator(&self) -> &AnswerGenerator<G> {
        &self.generator
    }

    pub fn normalizer(&self) -> &QueryNormalizer<T> {
        &self.normalizer
    }

    /// Intent and product for a normalized inquiry. Both are pure lookups,
    /// independent of each other.
    pub fn classify(&self, raw_text: &str, normalized: &NormalizedQuery) -> Query {
        let intent = self.classifier.classify_query(
            raw_text,
            normalized.source_language,
            &normalized.pivot_text,
        );
        let product_id = self
            .catalog
            .resolve_text(&normalized.pivot_text)
            .or_else(|| self.catalog.resolve_text(raw_text));

        Query {
            raw_text: raw_text.trim().to_string(),
            source_language: normalized.source_language,
            pivot_text: normalized.pivot_text.clone(),
            intent,
            product_id,
        }
    }

    /// Always produces a response; blocking failures become an apology in
    /// the user's language.
    pub async fn answer(&self, raw_text: &str) -> QaResponse {
        self.run(raw_text).await.response
    }

    /// Like [`Self::answer`] but surfaces blocking failures as errors.
    pub async fn try_answer(&self, raw_text: &str) -> Result<QaResponse, PipelineError> {
        let outcome = self.run(raw_text).await;
        match outcome.error {
            Some(error) => Err(error),
            None => Ok(outcome.response),
        }
    }

    async fn run(&self, raw_text: &str) -> Outcome {
        let request_id = Uuid::new_v4();
        let span = info_span!("query", request_id = %request_id);
        self.process(raw_text).instrument(span).await
    }

    async fn process(&self, raw_text: &str) -> Outcome {
        let mut state = PipelineState::Received;

        let normalized = self.normalizer.normalize(raw_text).await;
        advance(&mut state, PipelineState::Normalized);

        let query_type = self.router.route(raw_text, &normalized.pivot_text);
        advance(&mut state, PipelineState::Routed);

        let mut response = QaResponse {
            answer_text: String::new(),
            source_list: Vec::new(),
            intent: Intent::General,
            product_id: None,
            query_type,
            source_language: normalized.source_language,
            pivot_text: normalized.pivot_text.clone(),
            degraded: normalized.degraded,
            final_state: state,
        };

        if query_type.short_circuits() {
            response.answer_text = match query_type {
                QueryType::Greeting => greeting_reply(normalized.source_language),
                _ => out_of_scope_reply(normalized.source_language),
            }
            .to_string();
            advance(&mut state, PipelineState::ShortCircuited);
            response.final_state = state;
            info!(%query_type, "query short-circuited");
            return Outcome {
                response,
                error: None,
            };
        }

        let query = self.classify(raw_text, &normalized);
        advance(&mut state, PipelineState::Classified);
        response.intent = query.intent;
        response.product_id = query.product_id.clone();

        match self.retrieve_and_generate(&query, &mut state).await {
            Ok((answer_text, source_list)) => {
                response.answer_text = answer_text;
                response.source_list = source_list;
                advance(&mut state, PipelineState::Returned);
                response.final_state = state;
                info!(
                    intent = %query.intent,
                    product = query.product_id.as_ref().map(|p| p.as_str()),
                    sources = response.source_list.len(),
                    degraded = response.degraded,
                    "query answered"
                );
                Outcome {
                    response,
                    error: None,
                }
            }
            Err(error) => {
                // Stages only raise the backend failure kinds.
                let kind = error
                    .failure_kind()
                    .unwrap_or(FailureKind::GenerationUnavailable);
                warn!(%error, ?kind, "query failed");
                response.answer_text = apology(query.source_language).to_string();
                advance(&mut state, PipelineState::Failed(kind));
                response.final_state = state;
                Outcome {
                    response,
                    error: Some(error),
                }
            }
        }
    }

    async fn retrieve_and_generate(
        &self,
        query: &Query,
        state: &mut PipelineState,
    ) -> Result<(String, Vec<String>), PipelineError> {
        let retrieved = self.retriever.retrieve_for(query).await?;
        advance(state, PipelineState::Retrieved);

        let context = self
            .assembler
            .assemble(&retrieved, query.intent, query.product_id.as_ref());
        advance(state, PipelineState::Assembled);

        let generated = self
            .generator
            .generate(query, &context, query.source_language)
            .await?;
        advance(state, PipelineState::Generated);

        Ok((generated.answer_text, generated.source_list))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::CONTACTS_SOURCE;
    use crate::index::fixtures::{amayi, banking_index, banking_index_with_contacts, mlimi};
    use crate::intent::KeywordTable;
    use crate::models::{Language, MetadataPredicate, Passage};
    use crate::traits::Prompt;
    use crate::BackendError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Phrase-substitution translator; `fail` makes every call error.
    #[derive(Default)]
    struct FakeTranslator {
        replacements: Vec<(&'static str, &'static str)>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeTranslator {
        fn with(replacements: &[(&'static str, &'static str)]) -> Self {
            Self {
                replacements: replacements.to_vec(),
                ..Self::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Translator for FakeTranslator {
        async fn translate(
            &self,
            text: &str,
            _source: Language,
            _target: Language,
        ) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::Request("translation service down".to_string()));
            }
            Ok(self
                .replacements
                .iter()
                .fold(text.to_string(), |current, (from, to)| current.replace(from, to)))
        }
    }

    /// Answers with the context body lines as bullets; the rendering stage
    /// echoes the pivot answer after a stock English opener.
    #[derive(Default)]
    struct EchoGenerator {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompletionBackend for EchoGenerator {
        async fn complete(&self, prompt: &Prompt) -> Result<String, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(BackendError::BackendResponse {
                    backend: "chat-completions".to_string(),
                    details: "503 Service Unavailable".to_string(),
                });
            }
            if let Some((_, rest)) = prompt.user.split_once("Answer to rewrite:\n") {
                let pivot = rest.split("\n\nAnswer in").next().unwrap_or_default();
                return Ok(format!("Thank you for asking!\n{pivot}"));
            }
            let body = prompt
                .user
                .split("Customer question")
                .next()
                .unwrap_or_default();
            let bullets: Vec<String> = body
                .lines()
                .map(str::trim)
                .filter(|line| {
                    !line.is_empty()
                        && !line.starts_with('[')
                        && !line.starts_with("CONTEXT:")
                        && !line.starts_with("Product:")
                })
                .flat_map(|line| line.split(". "))
                .map(|sentence| format!("- {}", sentence.trim_end_matches('.')))
                .collect();
            Ok(bullets.join("\n"))
        }
    }

    /// Shared index that counts `nearest` calls.
    struct CountingIndex {
        inner: Arc<CorpusIndex>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn nearest(
            &self,
            query_text: &str,
            k: usize,
            predicate: Option<&MetadataPredicate>,
        ) -> Result<Vec<(String, f64)>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.nearest(query_text, k, predicate).await
        }

        fn passage(&self, passage_id: &str) -> Option<Passage> {
            self.inner.passage(passage_id)
        }

        fn passage_count(&self) -> usize {
            self.inner.passage_count()
        }
    }

    const TRANSLATIONS: &[(&str, &str)] = &[
        ("Ubwino wa", "Benefits of"),
        // Known dictionary gap: "zofunikira" comes back as "features".
        ("Zofunikira za", "Features of"),
        ("Phindu pa", "Profit on"),
        ("Moni, muli bwanji?", "Hello, how are you?"),
    ];

    fn pipeline(
        translator: FakeTranslator,
        generator: EchoGenerator,
    ) -> AssistantPipeline<CountingIndex, FakeTranslator, EchoGenerator> {
        let inner = Arc::new(banking_index());
        let catalog = inner.catalog().clone();
        let index = CountingIndex {
            inner,
            calls: AtomicUsize::new(0),
        };
        AssistantPipeline::new(index, catalog, translator, generator, &AssistantConfig::default())
            .expect("pipeline")
    }

    fn default_pipeline() -> AssistantPipeline<CountingIndex, FakeTranslator, EchoGenerator> {
        pipeline(FakeTranslator::with(TRANSLATIONS), EchoGenerator::default())
    }

    fn retrieval_calls(pipeline: &AssistantPipeline<CountingIndex, FakeTranslator, EchoGenerator>) -> usize {
        pipeline.retriever().index().calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn benefits_question_in_chichewa_gets_a_benefits_only_answer() {
        let pipeline = default_pipeline();
        let response = pipeline.answer("Ubwino wa amayi angathe account").await;

        assert_eq!(response.source_language, Language::Chichewa);
        assert_eq!(response.pivot_text, "Benefits of amayi angathe account");
        assert_eq!(response.query_type, QueryType::ProductInquiry);
        assert_eq!(response.intent, Intent::Benefits);
        assert_eq!(response.product_id, Some(amayi()));
        assert_eq!(response.final_state, PipelineState::Returned);
        assert_eq!(response.source_list, vec!["01-amayi-angathe-account.pdf"]);

        let answer = &response.answer_text;
        assert!(answer.starts_with("Zikomo pofunsa!"), "{answer}");
        assert!(answer.contains("Free monthly maintenance"), "{answer}");
        assert!(answer.contains("Free ATM card"), "{answer}");
        assert!(answer.contains("Low minimum balance"), "{answer}");
        assert!(!answer.contains("required to open"), "{answer}");
        assert!(!answer.contains("national ID"), "{answer}");
        assert!(!answer.contains("Monthly maintenance MK 200"), "{answer}");
    }

    #[tokio::test]
    async fn mistranslated_requirements_keyword_still_routes_to_requirements() {
        let pipeline = default_pipeline();
        let response = pipeline.answer("Zofunikira za mlimi loan").await;

        assert_eq!(response.pivot_text, "Features of mlimi loan");
        assert_eq!(response.intent, Intent::Requirements);
        assert_eq!(response.product_id, Some(mlimi()));
        assert!(response.answer_text.contains("Valid national ID"), "{}", response.answer_text);
        assert!(!response.answer_text.contains("Processing fee"));
        assert_eq!(response.source_list, vec!["02_mlimi_loan.pdf"]);
    }

    #[tokio::test]
    async fn missing_requirements_keyword_falls_back_to_general() {
        let classifier = IntentClassifier::new(vec![
            KeywordTable::english(),
            KeywordTable::chichewa()
                .without_keyword(Intent::Requirements, "zofunikira")
                .without_keyword(Intent::Requirements, "zofunika"),
        ]);
        let pipeline = default_pipeline().with_classifier(classifier.clone());
        let response = pipeline.answer("Zofunikira za mlimi loan").await;
        assert_eq!(response.pivot_text, "Features of mlimi loan");
        assert!(!response.degraded);
        assert_eq!(response.intent, Intent::General);
        assert_eq!(response.product_id, Some(mlimi()));

        let offline = self::pipeline(FakeTranslator::failing(), EchoGenerator::default())
            .with_classifier(classifier);
        let response = offline.answer("Zofunikira za mlimi loan").await;
        assert!(response.degraded);
        assert_eq!(response.intent, Intent::General);
    }

    #[test]
    fn mixed_keyword_queries_prefer_benefits() {
        let pipeline = default_pipeline();
        let normalized = NormalizedQuery {
            source_language: Language::Chichewa,
            pivot_text: "Tell me the benefits and requirements of mlimi loan".to_string(),
            degraded: false,
        };
        let query = pipeline.classify("Ndiuzeni benefits ndi zofunikira za mlimi loan", &normalized);
        assert_eq!(query.intent, Intent::Benefits);
        assert_eq!(query.product_id, Some(mlimi()));

        let normalized = NormalizedQuery {
            source_language: Language::English,
            pivot_text: "Requirements and benefits of amayi angathe account".to_string(),
            degraded: false,
        };
        let query = pipeline.classify("Requirements and benefits of amayi angathe account", &normalized);
        assert_eq!(query.intent, Intent::Benefits);
        assert_eq!(query.product_id, Some(amayi()));
    }

    #[tokio::test]
    async fn greetings_and_off_topic_turns_never_retrieve() {
        let pipeline = default_pipeline();

        let greeting = pipeline.answer("Moni, muli bwanji?").await;
        assert_eq!(greeting.query_type, QueryType::Greeting);
        assert_eq!(greeting.final_state, PipelineState::ShortCircuited);
        assert!(greeting.answer_text.starts_with("Zikomo pobwera!"));
        assert!(greeting.source_list.is_empty());

        let weather = pipeline.answer("What is the weather like today?").await;
        assert_eq!(weather.query_type, QueryType::OutOfScope);
        assert_eq!(weather.final_state, PipelineState::ShortCircuited);

        let math = pipeline.answer("Kodi 2 + 2 ndi zingati?").await;
        assert_eq!(math.query_type, QueryType::OutOfScope);

        assert_eq!(retrieval_calls(&pipeline), 0);
        assert_eq!(pipeline.generator().backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_queries_resolve_identically() {
        let pipeline = default_pipeline();
        let first = pipeline.answer("Phindu pa mlimi loan").await;
        let second = pipeline.answer("Phindu pa mlimi loan").await;

        assert_eq!(first.intent, Intent::Fees);
        assert_eq!(first.intent, second.intent);
        assert_eq!(first.product_id, second.product_id);
        assert_eq!(first.source_list, second.source_list);
        assert!(first.answer_text.contains("Processing fee"), "{}", first.answer_text);
    }

    #[tokio::test]
    async fn translation_outage_degrades_but_still_answers() {
        let pipeline = pipeline(FakeTranslator::failing(), EchoGenerator::default());
        let response = pipeline.answer("Ubwino wa amayi angathe account").await;

        assert!(response.degraded);
        assert_eq!(response.pivot_text, "Ubwino wa amayi angathe account");
        assert_eq!(response.intent, Intent::Benefits);
        assert_eq!(response.product_id, Some(amayi()));
        assert_eq!(response.final_state, PipelineState::Returned);
        assert!(response.answer_text.contains("Free ATM card"));
    }

    #[tokio::test]
    async fn english_queries_skip_translation_and_rendering() {
        let pipeline = default_pipeline();
        let response = pipeline.answer("What are the fees for mlimi loan?").await;

        assert_eq!(response.source_language, Language::English);
        assert_eq!(response.intent, Intent::Fees);
        assert!(response.answer_text.starts_with("- "), "{}", response.answer_text);
        assert_eq!(pipeline.normalizer().translator().calls.load(Ordering::SeqCst), 0);
        assert_eq!(pipeline.generator().backend().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generation_outage_becomes_an_apology() {
        let generator = EchoGenerator {
            fail: true,
            ..EchoGenerator::default()
        };
        let pipeline = pipeline(FakeTranslator::with(TRANSLATIONS), generator);

        let response = pipeline.answer("Ubwino wa amayi angathe account").await;
        assert_eq!(response.answer_text, apology(Language::Chichewa));
        assert_eq!(
            response.final_state,
            PipelineState::Failed(FailureKind::GenerationUnavailable)
        );
        assert!(response.source_list.is_empty());

        let error = pipeline
            .try_answer("Ubwino wa amayi angathe account")
            .await
            .expect_err("generation fails");
        assert!(matches!(error, PipelineError::GenerationUnavailable(_)));
    }

    #[tokio::test]
    async fn contact_questions_are_answered_from_the_directory() {
        let pipeline = AssistantPipeline::from_index(
            Arc::new(banking_index_with_contacts()),
            FakeTranslator::with(TRANSLATIONS),
            EchoGenerator::default(),
            &AssistantConfig::default(),
        )
        .expect("pipeline");

        let response = pipeline.answer("What is the call centre number?").await;
        assert_eq!(response.query_type, QueryType::ProductInquiry);
        assert_eq!(response.intent, Intent::General);
        assert_eq!(response.product_id, None);
        assert_eq!(response.final_state, PipelineState::Returned);
        assert_eq!(response.source_list.first().map(String::as_str), Some(CONTACTS_SOURCE));
        assert!(response.answer_text.contains("626"), "{}", response.answer_text);
    }

    #[tokio::test]
    async fn empty_corpus_becomes_an_apology() {
        let index = Arc::new(CorpusIndex::builder().build().expect("index"));
        let pipeline = AssistantPipeline::from_index(
            index,
            FakeTranslator::with(TRANSLATIONS),
            EchoGenerator::default(),
            &AssistantConfig::default(),
        )
        .expect("pipeline");

        let response = pipeline.answer("What are the fees for the savings account?").await;
        assert_eq!(response.answer_text, apology(Language::English));
        assert_eq!(response.final_state, PipelineState::Failed(FailureKind::EmptyCorpus));
        assert!(matches!(
            pipeline.try_answer("fees for savings account").await,
            Err(PipelineError::EmptyCorpus)
        ));
    }

    #[tokio::test]
    async fn concurrent_queries_share_one_index() {
        let index = Arc::new(banking_index());
        let pipeline = Arc::new(
            AssistantPipeline::from_index(
                Arc::clone(&index),
                FakeTranslator::with(TRANSLATIONS),
                EchoGenerator::default(),
                &AssistantConfig::default(),
            )
            .expect("pipeline"),
        );

        let mut tasks = tokio::task::JoinSet::new();
        for query in ["Ubwino wa amayi angathe account", "Zofunikira za mlimi loan"]
            .into_iter()
            .cycle()
            .take(8)
        {
            let pipeline = Arc::clone(&pipeline);
            tasks.spawn(async move { pipeline.answer(query).await });
        }

        let mut answered = 0;
        while let Some(joined) = tasks.join_next().await {
            let response = joined.expect("task completes");
            assert_eq!(response.final_state, PipelineState::Returned);
            answered += 1;
        }
        assert_eq!(answered, 8);
    }
}
