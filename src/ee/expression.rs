//! Expression graphs for the remote occurrence extraction.
//!
//! The extraction itself runs inside the service: each point is buffered,
//! the occurrence band is reduced over the buffered region with min/max and
//! median reducers, and the three scalars land on the output feature. This
//! module only serializes that request; nothing here touches pixels.

use crate::config::ExtractionConfig;
use crate::ee::types::FeatureCollection;
use serde_json::{json, Value};

/// Argument name bound to the mapped feature inside the per-feature body.
const FEATURE_ARG: &str = "feature";

/// Build the expression graph exporting occurrence summaries for a chunk.
///
/// Equivalent shape: `collection.map(f => f.set(minMax + median over buffer))`.
pub fn occurrence_expression(collection: &FeatureCollection, extraction: &ExtractionConfig) -> Value {
    json!({
        "result": "0",
        "values": {
            "0": invocation(
                "Collection.map",
                json!({
                    "collection": collection_node(collection),
                    "baseAlgorithm": {
                        "functionDefinitionValue": {
                            "argumentNames": [FEATURE_ARG],
                            "body": "1",
                        }
                    },
                }),
            ),
            "1": summarize_feature_node(extraction),
        }
    })
}

/// The input feature collection as a value node.
fn collection_node(collection: &FeatureCollection) -> Value {
    let features: Vec<Value> = collection
        .features
        .iter()
        .map(|f| {
            invocation(
                "Feature",
                json!({
                    "geometry": invocation(
                        "GeometryConstructors.Point",
                        json!({
                            "coordinates": constant(json!(f.coordinates)),
                            "crs": invocation("Projection", json!({ "crs": constant(json!(collection.crs)) })),
                        }),
                    ),
                    "metadata": constant(f.properties()),
                }),
            )
        })
        .collect();

    invocation("Collection", json!({ "features": features }))
}

/// Per-feature body: buffer, reduce three ways, attach the scalars.
fn summarize_feature_node(extraction: &ExtractionConfig) -> Value {
    let region = invocation(
        "Feature.geometry",
        json!({
            "feature": invocation(
                "Feature.buffer",
                json!({
                    "feature": argument_ref(FEATURE_ARG),
                    "distance": constant(json!(extraction.buffer_meters)),
                }),
            ),
        }),
    );

    let clipped = invocation(
        "Image.clip",
        json!({
            "input": invocation(
                "Image.select",
                json!({
                    "input": invocation("Image.load", json!({ "id": constant(json!(extraction.asset)) })),
                    "bandSelectors": constant(json!([extraction.band])),
                }),
            ),
            "geometry": region.clone(),
        }),
    );

    let min_max = reduce_region(&clipped, "Reducer.minMax", &region, extraction.scale_meters);
    let median = reduce_region(&clipped, "Reducer.median", &region, extraction.scale_meters);

    let band = &extraction.band;
    let mut element = argument_ref(FEATURE_ARG);
    for (property, value) in [
        (format!("{band}_min"), dictionary_get(&min_max, &format!("{band}_min"))),
        (format!("{band}_max"), dictionary_get(&min_max, &format!("{band}_max"))),
        (format!("{band}_med"), dictionary_get(&median, band)),
    ] {
        element = invocation(
            "Element.set",
            json!({
                "object": element,
                "key": constant(json!(property)),
                "value": value,
            }),
        );
    }
    element
}

fn reduce_region(image: &Value, reducer: &str, geometry: &Value, scale: f64) -> Value {
    invocation(
        "Image.reduceRegion",
        json!({
            "image": image,
            "reducer": invocation(reducer, json!({})),
            "geometry": geometry,
            "scale": constant(json!(scale)),
        }),
    )
}

fn dictionary_get(dictionary: &Value, key: &str) -> Value {
    invocation(
        "Dictionary.get",
        json!({
            "dictionary": dictionary,
            "key": constant(json!(key)),
        }),
    )
}

fn invocation(function_name: &str, arguments: Value) -> Value {
    json!({
        "functionInvocationValue": {
            "functionName": function_name,
            "arguments": arguments,
        }
    })
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn argument_ref(name: &str) -> Value {
    json!({ "argumentReference": name })
}
