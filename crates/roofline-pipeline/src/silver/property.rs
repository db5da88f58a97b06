//! Property Silver: flatten listing details, convert units, re-pack the
//! address, and attach embeddings.

use tracing::info;

use roofline_core::catalog::EntityKind;
use roofline_core::metadata::SilverMetadata;
use roofline_embed::EmbeddingGenerator;
use roofline_engine::{EngineConnection, Relation};

use crate::error::Result;
use crate::silver::{IdColumn, check_non_null, check_state_codes, materialize_with_embeddings};

const FILTER: &str =
    "listing_id IS NOT NULL AND listing_price > 0 AND property_details.square_feet > 0";

const PROJECTION: &str = "\
    listing_id,\n\
    neighborhood_id,\n\
    property_details.bedrooms AS bedrooms,\n\
    property_details.bathrooms AS bathrooms,\n\
    property_details.square_feet AS square_feet,\n\
    property_details.property_type AS property_type,\n\
    property_details.year_built AS year_built,\n\
    CAST(ROUND(COALESCE(property_details.lot_size * 43560, 0)) AS INTEGER) AS lot_size,\n\
    property_details.garage_spaces AS garage_spaces,\n\
    listing_price AS price,\n\
    price_per_sqft,\n\
    struct_pack(\n\
        street := address.street,\n\
        city := address.city,\n\
        state := address.state,\n\
        zip_code := address.zip,\n\
        location := LIST_VALUE(coordinates.longitude, coordinates.latitude)\n\
    ) AS address,\n\
    description,\n\
    features,\n\
    listing_date,\n\
    days_on_market,\n\
    virtual_tour_url,\n\
    images,\n\
    price_history,\n\
    CONCAT_WS(' ',\n\
        COALESCE(description, ''),\n\
        COALESCE(property_details.property_type, ''),\n\
        CONCAT(COALESCE(property_details.bedrooms, 0), ' bedrooms'),\n\
        CONCAT(COALESCE(property_details.bathrooms, 0), ' bathrooms'),\n\
        CONCAT(COALESCE(property_details.square_feet, 0), ' sqft')\n\
    ) AS embedding_text";

/// Transforms Bronze properties into `silver_properties`.
pub struct PropertySilverTransformer<'a> {
    engine: &'a EngineConnection,
    embedder: Option<&'a EmbeddingGenerator>,
}

impl<'a> PropertySilverTransformer<'a> {
    #[must_use]
    pub const fn new(
        engine: &'a EngineConnection,
        embedder: Option<&'a EmbeddingGenerator>,
    ) -> Self {
        Self { engine, embedder }
    }

    pub async fn transform(
        &self,
        input_table: &str,
        output_table: &str,
    ) -> Result<SilverMetadata> {
        let input_count = self.engine.count_records(input_table)?;

        let transformed = Relation::table(input_table)?
            .filter(FILTER)
            .project(PROJECTION);

        materialize_with_embeddings(
            self.engine,
            self.embedder,
            transformed,
            output_table,
            EntityKind::Property,
            IdColumn::Text("listing_id"),
            None,
        )
        .await?;

        check_non_null(self.engine, output_table, "listing_id")?;
        check_state_codes(self.engine, output_table, "address.state")?;

        let output_count = self.engine.count_records(output_table)?;
        info!(
            input = input_count,
            output = output_count,
            dropped = input_count - output_count,
            "property silver transformation complete"
        );

        Ok(SilverMetadata::new(
            input_table,
            output_table,
            input_count,
            output_count,
            EntityKind::Property,
        )?)
    }
}
