//! Typed search documents.
//!
//! Transformation rules are strict and purely field-level: engine rows
//! arrive as JSON objects (lists already arrays, timestamps already
//! ISO-8601 strings), the address struct becomes a sub-object carrying a
//! `geo_point`, and the embedding vector passes through untouched. A row
//! missing its primary key is a validation error, counted and skipped by
//! the writer.

use serde::Serialize;
use serde_json::{Map, Value};

type RowResult<T> = std::result::Result<T, String>;

/// `{lat, lon}` pair for Elasticsearch `geo_point` fields.
#[derive(Debug, Clone, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    /// Build from the pipeline's `[longitude, latitude]` arrays.
    #[must_use]
    pub fn from_lon_lat_array(value: &Value) -> Option<Self> {
        let array = value.as_array()?;
        if array.len() < 2 {
            return None;
        }
        Some(Self {
            lat: array[1].as_f64()?,
            lon: array[0].as_f64()?,
        })
    }
}

/// Address sub-document with a `geo_point` location.
#[derive(Debug, Clone, Serialize)]
pub struct AddressDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
}

impl AddressDocument {
    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self {
            street: string_field(object, "street"),
            city: string_field(object, "city"),
            state: string_field(object, "state"),
            zip_code: string_field(object, "zip_code"),
            location: object.get("location").and_then(GeoPoint::from_lon_lat_array),
        })
    }
}

fn string_field(row: &Map<String, Value>, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).map(str::to_string)
}

fn f64_field(row: &Map<String, Value>, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

fn i64_field(row: &Map<String, Value>, key: &str) -> Option<i64> {
    row.get(key).and_then(Value::as_i64)
}

fn string_array_field(row: &Map<String, Value>, key: &str) -> Vec<String> {
    row.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn embedding_field(row: &Map<String, Value>, key: &str) -> Option<Vec<f64>> {
    let array = row.get(key)?.as_array()?;
    let vector: Vec<f64> = array.iter().filter_map(Value::as_f64).collect();
    if vector.len() == array.len() && !vector.is_empty() {
        Some(vector)
    } else {
        None
    }
}

/// Document for the `properties` index. `_id` is the listing ID.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyDocument {
    pub listing_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighborhood_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_sqft: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_feet: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enriched_description: Option<String>,
    pub features: Vec<String>,
    pub amenities: Vec<String>,
    pub search_tags: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_on_market: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parking: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

impl PropertyDocument {
    pub fn from_row(row: &Map<String, Value>) -> RowResult<Self> {
        let listing_id =
            string_field(row, "listing_id").ok_or_else(|| "missing listing_id".to_string())?;
        Ok(Self {
            listing_id,
            neighborhood_id: string_field(row, "neighborhood_id"),
            property_type: string_field(row, "property_type"),
            price: f64_field(row, "price"),
            price_per_sqft: f64_field(row, "price_per_sqft"),
            bedrooms: i64_field(row, "bedrooms"),
            bathrooms: f64_field(row, "bathrooms"),
            square_feet: i64_field(row, "square_feet"),
            year_built: i64_field(row, "year_built"),
            lot_size: i64_field(row, "lot_size"),
            address: row.get("address").and_then(AddressDocument::from_value),
            description: string_field(row, "description"),
            enriched_description: string_field(row, "enriched_description"),
            features: string_array_field(row, "features"),
            amenities: string_array_field(row, "amenities"),
            search_tags: string_array_field(row, "search_tags"),
            status: string_field(row, "status").unwrap_or_else(|| "active".to_string()),
            listing_date: string_field(row, "listing_date"),
            days_on_market: i64_field(row, "days_on_market"),
            parking: row.get("parking").filter(|v| v.is_object()).cloned(),
            embedding: embedding_field(row, "embedding_vector"),
        })
    }
}

/// Document for the `neighborhoods` index. `_id` is the neighborhood ID.
#[derive(Debug, Clone, Serialize)]
pub struct NeighborhoodDocument {
    pub neighborhood_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub population: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walkability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_livability_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investment_attractiveness_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub density_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifestyle_category: Option<String>,
    pub business_facets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub amenities: Vec<String>,
    pub lifestyle_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

impl NeighborhoodDocument {
    pub fn from_row(row: &Map<String, Value>) -> RowResult<Self> {
        let neighborhood_id = string_field(row, "neighborhood_id")
            .ok_or_else(|| "missing neighborhood_id".to_string())?;
        let name = string_field(row, "name").ok_or_else(|| "missing name".to_string())?;
        Ok(Self {
            neighborhood_id,
            name,
            city: string_field(row, "city"),
            state: string_field(row, "state"),
            county: string_field(row, "county"),
            population: i64_field(row, "population"),
            walkability_score: f64_field(row, "walkability_score"),
            school_rating: f64_field(row, "school_rating"),
            overall_livability_score: f64_field(row, "overall_livability_score"),
            investment_attractiveness_score: f64_field(row, "investment_attractiveness_score"),
            density_category: string_field(row, "density_category"),
            lifestyle_category: string_field(row, "lifestyle_category"),
            business_facets: string_array_field(row, "business_facets"),
            description: string_field(row, "description"),
            amenities: string_array_field(row, "amenities"),
            lifestyle_tags: string_array_field(row, "lifestyle_tags"),
            location: row.get("location").and_then(GeoPoint::from_lon_lat_array),
            embedding: embedding_field(row, "embedding_vector"),
        })
    }
}

/// Document for the `wikipedia` index. `_id` is the page ID.
#[derive(Debug, Clone, Serialize)]
pub struct WikipediaDocument {
    pub page_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub key_topics: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article_quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_depth_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authority_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_ranking_score: Option<f64>,
    pub search_facets: Vec<String>,
    pub neighborhood_ids: Vec<String>,
    pub neighborhood_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_neighborhood_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f64>>,
}

impl WikipediaDocument {
    pub fn from_row(row: &Map<String, Value>) -> RowResult<Self> {
        let page_id = i64_field(row, "page_id").ok_or_else(|| "missing page_id".to_string())?;
        let title = string_field(row, "title").ok_or_else(|| "missing title".to_string())?;
        Ok(Self {
            page_id,
            title,
            url: string_field(row, "url"),
            short_summary: string_field(row, "short_summary"),
            long_summary: string_field(row, "long_summary"),
            city: string_field(row, "city"),
            state: string_field(row, "state"),
            key_topics: string_array_field(row, "key_topics"),
            article_quality: string_field(row, "article_quality"),
            article_quality_score: f64_field(row, "article_quality_score"),
            content_depth_category: string_field(row, "content_depth_category"),
            authority_score: f64_field(row, "authority_score"),
            search_ranking_score: f64_field(row, "search_ranking_score"),
            search_facets: string_array_field(row, "search_facets"),
            neighborhood_ids: string_array_field(row, "neighborhood_ids"),
            neighborhood_names: string_array_field(row, "neighborhood_names"),
            primary_neighborhood_name: string_field(row, "primary_neighborhood_name"),
            location: row.get("location").and_then(GeoPoint::from_lon_lat_array),
            embedding: embedding_field(row, "embedding_vector"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn property_row_becomes_document_with_geo_point() {
        let row = row(json!({
            "listing_id": "prop-1",
            "neighborhood_id": "noevalley_sanfrancisco",
            "price": 850_000.0,
            "bedrooms": 3,
            "bathrooms": 2.0,
            "square_feet": 1400,
            "address": {
                "street": "123 Main St",
                "city": "San Francisco",
                "state": "CA",
                "zip_code": "94110",
                "location": [-122.42, 37.76]
            },
            "features": ["garage", "garden"],
            "amenities": ["garage", "garden"],
            "search_tags": ["condo", "three-bedroom", "mid-range"],
            "status": "active",
            "embedding_vector": [0.1, 0.2, 0.3]
        }));

        let doc = PropertyDocument::from_row(&row).unwrap();
        assert_eq!(doc.listing_id, "prop-1");
        let address = doc.address.unwrap();
        let location = address.location.unwrap();
        assert!((location.lat - 37.76).abs() < 1e-9);
        assert!((location.lon - (-122.42)).abs() < 1e-9);
        assert_eq!(doc.embedding.unwrap().len(), 3);
        assert_eq!(doc.search_tags.len(), 3);
    }

    #[test]
    fn property_row_without_id_is_a_validation_error() {
        let row = row(json!({ "price": 100.0 }));
        assert!(PropertyDocument::from_row(&row).is_err());
    }

    #[test]
    fn null_embedding_is_omitted_not_empty() {
        let row = row(json!({ "listing_id": "p", "embedding_vector": null }));
        let doc = PropertyDocument::from_row(&row).unwrap();
        assert!(doc.embedding.is_none());
        let serialized = json!(doc);
        assert!(serialized.get("embedding").is_none());
    }

    #[test]
    fn neighborhood_document_requires_id_and_name() {
        let ok = row(json!({ "neighborhood_id": "n1", "name": "Mission" }));
        assert!(NeighborhoodDocument::from_row(&ok).is_ok());
        let missing_name = row(json!({ "neighborhood_id": "n1" }));
        assert!(NeighborhoodDocument::from_row(&missing_name).is_err());
    }

    #[test]
    fn wikipedia_document_keeps_neighborhood_fields() {
        let row = row(json!({
            "page_id": 42,
            "title": "Noe Valley",
            "neighborhood_ids": ["a", "b"],
            "neighborhood_names": ["Noe Valley", "Upper Noe"],
            "primary_neighborhood_name": "Noe Valley",
            "location": [-122.43, 37.75]
        }));
        let doc = WikipediaDocument::from_row(&row).unwrap();
        assert_eq!(doc.page_id, 42);
        assert_eq!(doc.neighborhood_ids.len(), 2);
        assert!(doc.location.is_some());
    }

    #[test]
    fn geo_point_rejects_short_arrays() {
        assert!(GeoPoint::from_lon_lat_array(&json!([1.0])).is_none());
        assert!(GeoPoint::from_lon_lat_array(&json!(null)).is_none());
        assert!(GeoPoint::from_lon_lat_array(&json!([-122.4, 37.7])).is_some());
    }
}
