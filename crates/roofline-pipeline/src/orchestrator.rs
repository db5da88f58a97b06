//! Pipeline orchestration.
//!
//! A single task sequences the stages; the engine connection is the only
//! point of serialization and no two statements are ever in flight at
//! once. Stage functions return on success or raise on the first permanent
//! failure; `run_full_pipeline` converts that into a failed
//! [`PipelineMetrics`] and leaves partial tables in place, since every
//! stage is re-runnable.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};

use roofline_core::CoreError;
use roofline_core::catalog::{EntityKind, TableCatalog};
use roofline_core::config::PipelineSettings;
use roofline_core::metrics::{EntityMetrics, PipelineMetrics, StageMetrics};
use roofline_embed::{CANONICAL_DIMENSION, EmbeddingGenerator, create_provider};
use roofline_engine::EngineConnection;
use roofline_sinks::elastic::{SearchExportStats, SearchWriter};
use roofline_sinks::neo4j::{GraphWriteStats, GraphWriter};
use roofline_sinks::parquet::{LayerExportStats, ParquetWriter};

use crate::bronze::{
    BronzeValidator, LocationBronzeIngester, NeighborhoodBronzeIngester, PropertyBronzeIngester,
    WikipediaBronzeIngester,
};
use crate::error::{PipelineError, Result};
use crate::gold::{
    LocationGoldEnricher, NeighborhoodGoldEnricher, PropertyGoldEnricher, WikipediaGoldEnricher,
};
use crate::graph::{GraphBuildSummary, GraphBuilder};
use crate::silver::{
    LocationSilverTransformer, NeighborhoodSilverTransformer, PropertySilverTransformer,
    SilverGraphExtensions, WikipediaSilverTransformer,
};

/// Flags controlling a full pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub sample_size: Option<u64>,
    pub skip_bronze: bool,
    pub skip_silver: bool,
    pub skip_gold: bool,
    pub write_parquet: bool,
    pub write_search: bool,
    pub write_graph: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            sample_size: None,
            skip_bronze: false,
            skip_silver: false,
            skip_gold: false,
            write_parquet: true,
            write_search: false,
            write_graph: false,
        }
    }
}

/// Per-sink statistics from `run_writers`.
#[derive(Debug, Default)]
pub struct WriterStats {
    pub parquet: Option<LayerExportStats>,
    pub search: Option<SearchExportStats>,
    pub graph: Option<GraphWriteStats>,
}

/// Sequences the refinement stages over one engine connection.
pub struct PipelineOrchestrator {
    settings: PipelineSettings,
    engine: EngineConnection,
    embedder: Option<EmbeddingGenerator>,
    pipeline_id: String,
}

impl PipelineOrchestrator {
    /// Connect the engine and initialize the embedding provider once.
    ///
    /// A provider that requires an API key but has none configured only
    /// logs a warning: Silver embedding columns stay null and SIMILAR_TO
    /// edges are skipped. A provider declaring a dimension other than the
    /// canonical one is rejected outright.
    pub fn new(settings: PipelineSettings) -> Result<Self> {
        let engine = EngineConnection::connect(&settings.duckdb)?;
        let embedder = Self::initialize_embedder(&settings)?;
        let pipeline_id = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        info!(pipeline_id = pipeline_id.as_str(), "orchestrator initialized");
        Ok(Self {
            settings,
            engine,
            embedder,
            pipeline_id,
        })
    }

    fn initialize_embedder(settings: &PipelineSettings) -> Result<Option<EmbeddingGenerator>> {
        let api_key = settings.embedding.api_key();
        if settings.embedding.provider.requires_api_key() && api_key.is_none() {
            warn!(
                provider = settings.embedding.provider.as_str(),
                "no API key configured; embeddings disabled for this run"
            );
            return Ok(None);
        }
        let provider = create_provider(&settings.embedding, api_key)?;
        if provider.dimension() != CANONICAL_DIMENSION {
            return Err(PipelineError::Core(CoreError::DimensionMismatch {
                provider: settings.embedding.provider.as_str().to_string(),
                declared: provider.dimension(),
                required: CANONICAL_DIMENSION,
            }));
        }
        let delay = Duration::from_secs_f64(settings.processing.rate_limit_delay.max(0.0));
        Ok(Some(EmbeddingGenerator::new(provider, delay)))
    }

    #[must_use]
    pub fn engine(&self) -> &EngineConnection {
        &self.engine
    }

    #[must_use]
    pub fn pipeline_id(&self) -> &str {
        &self.pipeline_id
    }

    #[must_use]
    pub fn embeddings_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    fn verify_prerequisites(&self, stage: &str, tables: &[&str]) -> Result<()> {
        for table in tables {
            if !self.engine.table_exists(table)? {
                return Err(PipelineError::MissingPrerequisite {
                    table: (*table).to_string(),
                    stage: stage.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Abort on validation errors, except for tables that are legitimately
    /// empty (sampled runs with `sample_size=0`).
    fn enforce_validation(
        &self,
        result: &roofline_core::metadata::ValidationResult,
    ) -> Result<()> {
        for warning in &result.warnings {
            warn!(table = result.table_name.as_str(), warning = warning.as_str(), "bronze validation warning");
        }
        if !result.is_valid && result.record_count > 0 {
            let message = result.errors.join("; ");
            error!(table = result.table_name.as_str(), message = message.as_str(), "bronze validation failed");
            return Err(PipelineError::Core(CoreError::Validation {
                entity: result.entity_type.to_string(),
                message,
            }));
        }
        Ok(())
    }

    /// Ingest all four entity streams.
    pub fn run_bronze_layer(
        &self,
        sample_size: Option<u64>,
    ) -> Result<BTreeMap<EntityKind, StageMetrics>> {
        info!("running bronze layer");
        let mut metrics = BTreeMap::new();
        let validator = BronzeValidator::new(&self.engine);

        let start = Utc::now();
        let meta = PropertyBronzeIngester::new(&self.settings, &self.engine).ingest(
            TableCatalog::bronze(EntityKind::Property),
            None,
            sample_size,
        )?;
        self.enforce_validation(&validator.validate_property(meta.table_name())?)?;
        metrics.insert(
            EntityKind::Property,
            StageMetrics::new(
                "bronze",
                meta.record_count(),
                meta.record_count(),
                0,
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = NeighborhoodBronzeIngester::new(&self.settings, &self.engine).ingest(
            TableCatalog::bronze(EntityKind::Neighborhood),
            None,
            sample_size,
        )?;
        self.enforce_validation(&validator.validate_neighborhood(meta.table_name())?)?;
        metrics.insert(
            EntityKind::Neighborhood,
            StageMetrics::new(
                "bronze",
                meta.record_count(),
                meta.record_count(),
                0,
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = WikipediaBronzeIngester::new(&self.settings, &self.engine).ingest(
            TableCatalog::bronze(EntityKind::Wikipedia),
            None,
            sample_size,
        )?;
        self.enforce_validation(&validator.validate_wikipedia(meta.table_name())?)?;
        metrics.insert(
            EntityKind::Wikipedia,
            StageMetrics::new(
                "bronze",
                meta.record_count(),
                meta.record_count(),
                0,
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = LocationBronzeIngester::new(&self.settings, &self.engine).ingest(
            TableCatalog::bronze(EntityKind::Location),
            None,
            sample_size,
        )?;
        self.enforce_validation(&validator.validate_location(meta.table_name())?)?;
        metrics.insert(
            EntityKind::Location,
            StageMetrics::new(
                "bronze",
                meta.record_count(),
                meta.record_count(),
                0,
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        info!("bronze layer complete");
        Ok(metrics)
    }

    /// Standardize all four streams. Ordering: locations first (everything
    /// joins through them), then properties, neighborhoods, and Wikipedia
    /// last (it left-aggregates neighborhoods). Gold views over these
    /// tables are dropped first: dependents go before their sources.
    pub async fn run_silver_layer(&self) -> Result<BTreeMap<EntityKind, StageMetrics>> {
        info!("running silver layer");
        self.verify_prerequisites(
            "silver",
            &[
                TableCatalog::bronze(EntityKind::Property),
                TableCatalog::bronze(EntityKind::Neighborhood),
                TableCatalog::bronze(EntityKind::Wikipedia),
                TableCatalog::bronze(EntityKind::Location),
            ],
        )?;
        for entity in EntityKind::ALL {
            self.engine.drop_view(TableCatalog::gold(entity))?;
        }

        let mut metrics = BTreeMap::new();
        let embedder = self.embedder.as_ref();

        let start = Utc::now();
        let meta = LocationSilverTransformer::new(&self.engine).transform(
            TableCatalog::bronze(EntityKind::Location),
            TableCatalog::silver(EntityKind::Location),
        )?;
        metrics.insert(
            EntityKind::Location,
            StageMetrics::new(
                "silver",
                meta.input_count(),
                meta.output_count(),
                meta.dropped_count(),
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = PropertySilverTransformer::new(&self.engine, embedder)
            .transform(
                TableCatalog::bronze(EntityKind::Property),
                TableCatalog::silver(EntityKind::Property),
            )
            .await?;
        metrics.insert(
            EntityKind::Property,
            StageMetrics::new(
                "silver",
                meta.input_count(),
                meta.output_count(),
                meta.dropped_count(),
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = NeighborhoodSilverTransformer::new(&self.engine, embedder)
            .transform(
                TableCatalog::bronze(EntityKind::Neighborhood),
                TableCatalog::silver(EntityKind::Neighborhood),
            )
            .await?;
        metrics.insert(
            EntityKind::Neighborhood,
            StageMetrics::new(
                "silver",
                meta.input_count(),
                meta.output_count(),
                meta.dropped_count(),
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        let start = Utc::now();
        let meta = WikipediaSilverTransformer::new(&self.engine, embedder)
            .transform(
                TableCatalog::bronze(EntityKind::Wikipedia),
                TableCatalog::silver(EntityKind::Wikipedia),
            )
            .await?;
        metrics.insert(
            EntityKind::Wikipedia,
            StageMetrics::new(
                "silver",
                meta.input_count(),
                meta.output_count(),
                meta.dropped_count(),
                0,
                start,
                Some(Utc::now()),
            )?,
        );

        SilverGraphExtensions::new(&self.engine).apply_all()?;
        info!("silver layer complete");
        Ok(metrics)
    }

    /// Create the Gold enrichment views. Locations first, the rest follow.
    pub fn run_gold_layer(&self) -> Result<BTreeMap<EntityKind, StageMetrics>> {
        info!("running gold layer");
        self.verify_prerequisites(
            "gold",
            &[
                TableCatalog::silver(EntityKind::Property),
                TableCatalog::silver(EntityKind::Neighborhood),
                TableCatalog::silver(EntityKind::Wikipedia),
                TableCatalog::silver(EntityKind::Location),
            ],
        )?;

        let mut metrics = BTreeMap::new();
        let mut record = |entity: EntityKind,
                          meta: roofline_core::metadata::GoldMetadata,
                          start: chrono::DateTime<Utc>|
         -> Result<()> {
            metrics.insert(
                entity,
                StageMetrics::new(
                    "gold",
                    meta.input_count(),
                    meta.output_count(),
                    meta.input_count() - meta.output_count(),
                    0,
                    start,
                    Some(Utc::now()),
                )?,
            );
            Ok(())
        };

        let start = Utc::now();
        let meta = LocationGoldEnricher::new(&self.engine).enrich(
            TableCatalog::silver(EntityKind::Location),
            TableCatalog::gold(EntityKind::Location),
        )?;
        record(EntityKind::Location, meta, start)?;

        let start = Utc::now();
        let meta = PropertyGoldEnricher::new(&self.engine).enrich(
            TableCatalog::silver(EntityKind::Property),
            TableCatalog::gold(EntityKind::Property),
        )?;
        record(EntityKind::Property, meta, start)?;

        let start = Utc::now();
        let meta = NeighborhoodGoldEnricher::new(&self.engine).enrich(
            TableCatalog::silver(EntityKind::Neighborhood),
            TableCatalog::gold(EntityKind::Neighborhood),
        )?;
        record(EntityKind::Neighborhood, meta, start)?;

        let start = Utc::now();
        let meta = WikipediaGoldEnricher::new(&self.engine).enrich(
            TableCatalog::silver(EntityKind::Wikipedia),
            TableCatalog::gold(EntityKind::Wikipedia),
        )?;
        record(EntityKind::Wikipedia, meta, start)?;

        info!("gold layer complete");
        Ok(metrics)
    }

    /// Materialize graph node and relationship tables.
    pub fn run_graph_builder(&self) -> Result<GraphBuildSummary> {
        self.verify_prerequisites(
            "graph",
            &[
                TableCatalog::gold(EntityKind::Property),
                TableCatalog::gold(EntityKind::Location),
            ],
        )?;
        GraphBuilder::new(&self.engine).build_all()
    }

    /// Fan out to the enabled sinks.
    pub async fn run_writers(
        &self,
        write_parquet: bool,
        write_search: bool,
        write_graph: bool,
    ) -> Result<WriterStats> {
        let mut stats = WriterStats::default();

        if write_parquet && self.settings.output.parquet_enabled {
            let writer =
                ParquetWriter::new(self.engine.clone(), &self.settings.output.parquet_dir)?;
            stats.parquet = Some(writer.export_all_layers()?);
        }

        if write_search || self.settings.output.elasticsearch_enabled {
            let writer =
                SearchWriter::connect(self.engine.clone(), &self.settings.output.elasticsearch)
                    .await?;
            stats.search = Some(writer.index_all().await?);
        }

        if write_graph || self.settings.output.neo4j.enabled {
            let writer =
                GraphWriter::connect(self.engine.clone(), &self.settings.output.neo4j).await?;
            stats.graph = Some(writer.write_all().await?);
        }

        Ok(stats)
    }

    /// Run everything end to end, honoring skip flags.
    ///
    /// Never raises: failures are recorded into the returned metrics with
    /// `status = failed` and the offending stage's message.
    pub async fn run_full_pipeline(&self, options: RunOptions) -> PipelineMetrics {
        let mut pipeline = PipelineMetrics::new(self.pipeline_id.clone(), Utc::now());
        info!(pipeline_id = self.pipeline_id.as_str(), "starting pipeline run");

        match self.run_stages(&options, &mut pipeline).await {
            Ok(()) => {
                pipeline.complete(Utc::now());
                info!(
                    seconds = pipeline.duration_seconds().unwrap_or(0.0),
                    metrics = %serde_json::to_string(&pipeline).unwrap_or_default(),
                    "pipeline completed"
                );
            }
            Err(e) => {
                error!(stage_error = %e, kind = e.error_code(), "pipeline failed");
                pipeline.record_failure(format!("[{}] {e}", e.error_code()), Utc::now());
            }
        }
        pipeline
    }

    async fn run_stages(
        &self,
        options: &RunOptions,
        pipeline: &mut PipelineMetrics,
    ) -> Result<()> {
        let mut entities: BTreeMap<EntityKind, EntityMetrics> = EntityKind::ALL
            .into_iter()
            .map(|e| (e, EntityMetrics::new(e)))
            .collect();

        if options.skip_bronze {
            self.verify_prerequisites(
                "bronze (skipped)",
                &[
                    TableCatalog::bronze(EntityKind::Property),
                    TableCatalog::bronze(EntityKind::Neighborhood),
                    TableCatalog::bronze(EntityKind::Wikipedia),
                    TableCatalog::bronze(EntityKind::Location),
                ],
            )?;
            info!("bronze skipped; existing tables verified");
        } else {
            for (entity, stage) in self.run_bronze_layer(options.sample_size)? {
                if let Some(em) = entities.get_mut(&entity) {
                    em.bronze = Some(stage);
                }
            }
        }

        if options.skip_silver {
            self.verify_prerequisites(
                "silver (skipped)",
                &[
                    TableCatalog::silver(EntityKind::Property),
                    TableCatalog::silver(EntityKind::Neighborhood),
                    TableCatalog::silver(EntityKind::Wikipedia),
                    TableCatalog::silver(EntityKind::Location),
                ],
            )?;
            info!("silver skipped; existing tables verified");
        } else {
            for (entity, stage) in self.run_silver_layer().await? {
                if let Some(em) = entities.get_mut(&entity) {
                    em.silver = Some(stage);
                }
            }
            for entity in EntityKind::ALL {
                let table = TableCatalog::silver(entity);
                if self.engine.column_exists(table, "embedding_vector")? {
                    let count = self.engine.query_i64(&format!(
                        "SELECT COUNT(*) FROM {table} WHERE embedding_vector IS NOT NULL"
                    ))?;
                    if let Some(em) = entities.get_mut(&entity) {
                        em.embeddings_generated = u64::try_from(count).unwrap_or(0);
                    }
                }
            }
        }

        if options.skip_gold {
            self.verify_prerequisites(
                "gold (skipped)",
                &[
                    TableCatalog::gold(EntityKind::Property),
                    TableCatalog::gold(EntityKind::Neighborhood),
                    TableCatalog::gold(EntityKind::Wikipedia),
                    TableCatalog::gold(EntityKind::Location),
                ],
            )?;
            info!("gold skipped; existing views verified");
        } else {
            for (entity, stage) in self.run_gold_layer()? {
                if let Some(em) = entities.get_mut(&entity) {
                    em.gold = Some(stage);
                }
            }
        }

        if options.write_graph || self.settings.output.neo4j.enabled {
            self.run_graph_builder()?;
        }

        if options.write_parquet || options.write_search || options.write_graph {
            self.run_writers(
                options.write_parquet,
                options.write_search,
                options.write_graph,
            )
            .await?;
        }

        pipeline.entities = entities.into_values().collect();
        Ok(())
    }

    /// Record counts for every layer table that currently exists.
    pub fn table_stats(&self) -> Result<BTreeMap<String, u64>> {
        let mut stats = BTreeMap::new();
        for entity in EntityKind::ALL {
            for table in [
                TableCatalog::bronze(entity),
                TableCatalog::silver(entity),
                TableCatalog::gold(entity),
            ] {
                if self.engine.table_exists(table)? {
                    stats.insert(table.to_string(), self.engine.count_records(table)?);
                }
            }
        }
        Ok(stats)
    }
}
