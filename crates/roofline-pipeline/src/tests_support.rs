//! Shared fixtures for the pipeline unit tests.

use std::path::{Path, PathBuf};

use serde_json::json;

use roofline_core::config::PipelineSettings;
use roofline_engine::EngineConnection;

/// Settings whose source paths all live under `dir`.
pub fn settings_with_sources(dir: &Path) -> PipelineSettings {
    let mut settings = PipelineSettings::default();
    settings.data_sources.properties_files = vec![dir.join("properties.json")];
    settings.data_sources.neighborhoods_files = vec![dir.join("neighborhoods.json")];
    settings.data_sources.locations_file = dir.join("locations.json");
    settings.data_sources.wikipedia_db_path = dir.join("wikipedia.db");
    settings.duckdb.database_file = None;
    settings
}

/// Write `n` valid property listings as a JSON array.
pub fn write_properties_fixture(dir: &Path, n: usize) -> PathBuf {
    let rows: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            json!({
                "listing_id": format!("prop-{i}"),
                "neighborhood_id": "nb-0",
                "listing_price": 500_000.0 + i as f64 * 100_000.0,
                "price_per_sqft": 650.0,
                "property_details": {
                    "bedrooms": 2 + (i % 3) as i64,
                    "bathrooms": 1.5,
                    "square_feet": 900 + i as i64 * 150,
                    "property_type": if i % 2 == 0 { "Condo" } else { "Single Family" },
                    "year_built": 1960 + i as i64,
                    "lot_size": 0.12,
                    "garage_spaces": (i % 4) as i64
                },
                "address": {
                    "street": format!("{} Sanchez St", 100 + i),
                    "city": "San Francisco",
                    "state": "CA",
                    "zip": "94114"
                },
                "coordinates": { "latitude": 37.751, "longitude": -122.43 },
                "description": format!("Bright home number {i} with updated kitchen"),
                "features": ["hardwood floors", "garden"],
                "listing_date": "2024-03-01",
                "days_on_market": 12 + i as i64,
                "virtual_tour_url": format!("https://tours.example.com/prop-{i}"),
                "images": [format!("https://img.example.com/prop-{i}.jpg")],
                "price_history": [{ "date": "2024-01-01", "price": 480_000.0 + i as f64 }]
            })
        })
        .collect();
    let path = dir.join("properties.json");
    std::fs::write(&path, serde_json::to_string_pretty(&rows).unwrap()).unwrap();
    path
}

/// Property fixture containing rows that Silver must drop: a null
/// `listing_id`, a non-positive price, and a non-positive area.
pub fn write_properties_fixture_with_invalid(dir: &Path) -> PathBuf {
    let mut rows: Vec<serde_json::Value> =
        serde_json::from_str(&std::fs::read_to_string(write_properties_fixture(dir, 3)).unwrap())
            .unwrap();
    rows.push(json!({
        "listing_id": null,
        "listing_price": 400_000.0,
        "property_details": { "square_feet": 1000 },
        "address": { "city": "San Francisco", "state": "CA", "zip": "94114" },
        "coordinates": { "latitude": 37.7, "longitude": -122.4 }
    }));
    rows.push(json!({
        "listing_id": "prop-bad-price",
        "listing_price": 0.0,
        "property_details": { "square_feet": 1000 },
        "address": { "city": "San Francisco", "state": "CA", "zip": "94114" },
        "coordinates": { "latitude": 37.7, "longitude": -122.4 }
    }));
    rows.push(json!({
        "listing_id": "prop-bad-area",
        "listing_price": 700_000.0,
        "property_details": { "square_feet": 0 },
        "address": { "city": "San Francisco", "state": "CA", "zip": "94114" },
        "coordinates": { "latitude": 37.7, "longitude": -122.4 }
    }));
    let path = dir.join("properties.json");
    std::fs::write(&path, serde_json::to_string_pretty(&rows).unwrap()).unwrap();
    path
}

/// Write neighborhood records; the first two share Wikipedia page 9001 so
/// the Wikipedia Silver aggregation has a multi-neighborhood article.
pub fn write_neighborhoods_fixture(dir: &Path, n: usize) -> PathBuf {
    let names = ["Noe Valley", "Mission District", "Sugar House", "The Avenues"];
    let rows: Vec<serde_json::Value> = (0..n)
        .map(|i| {
            let name = names[i % names.len()];
            let (city, state) = if i % 4 >= 2 {
                ("Salt Lake City", "UT")
            } else {
                ("San Francisco", "CA")
            };
            json!({
                "neighborhood_id": format!("nb-{i}"),
                "name": name,
                "city": city,
                "state": state,
                "coordinates": { "latitude": 37.75 + i as f64 * 0.01, "longitude": -122.43 },
                "demographics": { "population": 12_000 + i as i64 * 9000 },
                "characteristics": { "walkability_score": 60.0 + i as f64 * 5.0, "school_rating": 7.0 + (i % 3) as f64 },
                "description": format!("{name} is a walkable neighborhood"),
                "amenities": ["parks", "cafes"],
                "lifestyle_tags": ["family-friendly"],
                "wikipedia_correlations": {
                    "primary_wiki_article": {
                        "page_id": if i < 2 { 9001 } else { 9000 + i as i64 },
                        "title": format!("{name} article"),
                        "url": "https://en.wikipedia.org/wiki/Example",
                        "confidence": 0.9
                    }
                }
            })
        })
        .collect();
    let path = dir.join("neighborhoods.json");
    std::fs::write(&path, serde_json::to_string_pretty(&rows).unwrap()).unwrap();
    path
}

/// Write the location reference covering every ZIP status and each level
/// of the hierarchy.
pub fn write_locations_fixture(dir: &Path) -> PathBuf {
    let rows = json!([
        {
            "neighborhood": "Noe Valley",
            "city": "San Francisco",
            "county": "San Francisco County",
            "state": "CA",
            "zip_code": "94114"
        },
        {
            "neighborhood": "Mission District",
            "city": "San Francisco",
            "county": "San Francisco County",
            "state": "CA",
            "zip_code": "94110"
        },
        {
            "neighborhood": "Sugar House",
            "city": "Salt Lake City",
            "county": "Salt Lake County",
            "state": "UT",
            "zip_code": "84106"
        },
        { "city": "Oakland", "county": "Alameda County", "state": "CA", "zip_code": "90001" },
        { "county": "Marin County", "state": "CA", "zip_code": "ABC" },
        { "state": "UT" }
    ]);
    let path = dir.join("locations.json");
    std::fs::write(&path, serde_json::to_string_pretty(&rows).unwrap()).unwrap();
    path
}

/// Create `bronze_wikipedia` directly in the engine, bypassing the SQLite
/// attach. Schema matches the external `articles` table. Includes a
/// duplicate `pageid` (9001) so dedup is exercised.
pub fn seed_bronze_wikipedia(engine: &EngineConnection) {
    engine
        .execute_batch(
            "CREATE TABLE bronze_wikipedia AS SELECT * FROM (VALUES \
             (9001, 'Noe Valley', 'https://en.wikipedia.org/wiki/Noe_Valley', \
              'Noe Valley is a neighborhood in central San Francisco.', \
              'geography,neighborhoods,history', 37.751, -122.432, \
              'San Francisco', 'San Francisco', 'California', 0.9, 1, \
              '2024-02-01 10:00:00', 'noe.html', 'hash-a', NULL, 25, NULL, \
              'Short Noe summary', REPEAT('Noe Valley long summary. ', 50)), \
             (9001, 'Noe Valley', 'https://en.wikipedia.org/wiki/Noe_Valley', \
              'Older crawl of the same page.', \
              'geography', 37.751, -122.432, \
              'San Francisco', 'San Francisco', 'California', 0.4, 2, \
              '2024-01-01 10:00:00', 'noe-old.html', 'hash-b', NULL, 3, NULL, \
              'Old short summary', 'Tiny.'), \
             (9002, 'Sugar House, Salt Lake City', 'https://en.wikipedia.org/wiki/Sugar_House', \
              'Sugar House is a neighborhood in Salt Lake City.', \
              'geography,utah', 40.721, -111.860, \
              'Salt Lake City', 'Salt Lake', 'Utah', 0.8, 1, \
              '2024-02-02 09:00:00', 'sugar.html', 'hash-c', NULL, 12, NULL, \
              'Short Sugar House summary', REPEAT('Sugar House long summary. ', 30)), \
             (9003, 'Golden Gate Park', 'https://en.wikipedia.org/wiki/Golden_Gate_Park', \
              'Golden Gate Park is an urban park.', \
              'parks,culture', NULL, NULL, \
              'San Francisco', 'San Francisco', 'California', 0.7, 1, \
              '2024-02-03 09:00:00', 'ggp.html', 'hash-d', NULL, 40, NULL, \
              'Short park summary', REPEAT('Golden Gate Park long summary. ', 45)) \
             ) AS t(pageid, title, url, extract, categories, latitude, longitude, \
                    best_city, best_county, best_state, relevance_score, depth, \
                    crawled_at, html_file, file_hash, image_url, links_count, \
                    infobox_data, short_summary, long_summary)",
        )
        .unwrap();
}

/// Run Bronze + Silver for locations so dependent Silver stages can join.
pub fn seed_silver_locations(engine: &EngineConnection, dir: &Path) {
    let settings = settings_with_sources(dir);
    write_locations_fixture(dir);
    crate::bronze::LocationBronzeIngester::new(&settings, engine)
        .ingest("bronze_locations", None, None)
        .unwrap();
    crate::silver::location::LocationSilverTransformer::new(engine)
        .transform("bronze_locations", "silver_locations")
        .unwrap();
}
