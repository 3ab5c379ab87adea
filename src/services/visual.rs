//! Helpers for the PBIR `visual.json` layout.
//!
//! Formatting literals live at
//! `visual.objects.<object>[0].properties.<property>.expr.Literal.Value`.

use serde_json::{json, Map, Value};

pub fn visual_type(visual: &Value) -> Option<&str> {
    visual.pointer("/visual/visualType").and_then(Value::as_str)
}

pub fn literal_property<'a>(visual: &'a Value, object: &str, property: &str) -> Option<&'a str> {
    visual
        .get("visual")?
        .get("objects")?
        .get(object)?
        .get(0)?
        .get("properties")?
        .get(property)?
        .pointer("/expr/Literal/Value")?
        .as_str()
}

fn child_object<'a>(parent: &'a mut Value, key: &str) -> Result<&'a mut Map<String, Value>, String> {
    let map = parent
        .as_object_mut()
        .ok_or_else(|| format!("expected an object around '{key}'"))?;
    map.entry(key.to_string())
        .or_insert_with(|| json!({}))
        .as_object_mut()
        .ok_or_else(|| format!("'{key}' is not an object"))
}

/// Writes a literal, creating any missing containers on the way.
pub fn set_literal_property(
    visual: &mut Value,
    object: &str,
    property: &str,
    value: &str,
) -> Result<(), String> {
    let visual_node = visual
        .as_object_mut()
        .ok_or_else(|| "visual part is not an object".to_string())?
        .entry("visual")
        .or_insert_with(|| json!({}));
    let objects = child_object(visual_node, "objects")?;
    let slot = objects.entry(object.to_string()).or_insert_with(|| json!([]));
    let needs_seed = slot.as_array().map(|a| a.is_empty()).unwrap_or(true);
    if needs_seed {
        *slot = json!([{ "properties": {} }]);
    }
    let first = slot
        .get_mut(0)
        .ok_or_else(|| format!("'{object}' has no entries"))?;
    let properties = child_object(first, "properties")?;
    properties.insert(
        property.to_string(),
        json!({ "expr": { "Literal": { "Value": value } } }),
    );
    Ok(())
}

pub fn query_state(visual: &Value) -> Option<&Map<String, Value>> {
    visual
        .pointer("/visual/query/queryState")
        .and_then(Value::as_object)
        .filter(|m| !m.is_empty())
}

/// Projected fields of a visual paired with the filter type they map to.
pub fn projected_fields(visual: &Value) -> Vec<(Value, &'static str)> {
    let Some(state) = query_state(visual) else {
        return vec![];
    };
    let mut fields = Vec::new();
    for role in state.values() {
        let projections = role
            .get("projections")
            .and_then(Value::as_array)
            .map(|a| a.as_slice())
            .unwrap_or_default();
        for projection in projections {
            let Some(field) = projection.get("field") else {
                continue;
            };
            let kind = if field.get("Measure").is_some() {
                "Advanced"
            } else {
                "Categorical"
            };
            fields.push((field.clone(), kind));
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_literal_creates_missing_containers() {
        let mut v = json!({"visual": {"visualType": "columnChart"}});
        set_literal_property(&mut v, "labels", "show", "true").unwrap();
        assert_eq!(literal_property(&v, "labels", "show"), Some("true"));
        assert_eq!(
            v["visual"]["objects"]["labels"][0]["properties"]["show"]["expr"]["Literal"]["Value"],
            "true"
        );
    }

    #[test]
    fn set_literal_keeps_sibling_properties() {
        let mut v = json!({"visual": {"objects": {"valueAxis": [{"properties": {
            "fontSize": {"expr": {"Literal": {"Value": "9D"}}}
        }}]}}});
        set_literal_property(&mut v, "valueAxis", "show", "false").unwrap();
        assert_eq!(literal_property(&v, "valueAxis", "fontSize"), Some("9D"));
        assert_eq!(literal_property(&v, "valueAxis", "show"), Some("false"));
    }

    #[test]
    fn missing_literal_reads_as_none() {
        let v = json!({"visual": {"objects": {"labels": []}}});
        assert_eq!(literal_property(&v, "labels", "show"), None);
    }

    #[test]
    fn measures_project_as_advanced_filters() {
        let v = json!({"visual": {"query": {"queryState": {
            "Category": {"projections": [{"field": {"Column": {"Property": "Region"}}}]},
            "Y": {"projections": [{"field": {"Measure": {"Property": "Sales"}}}, {"queryRef": "x"}]}
        }}}});
        let kinds: Vec<&str> = projected_fields(&v).into_iter().map(|(_, k)| k).collect();
        assert_eq!(kinds, vec!["Categorical", "Advanced"]);
    }
}
