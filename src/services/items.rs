use crate::domain::constants::PRIVATE_ENDPOINT_MESSAGE_MAX;
use crate::domain::error::{FixError, FixResult};
use crate::domain::models::{ItemRow, PrivateEndpointRow, TableMirroringRow};
use crate::services::definition::{encode_parts, DefinitionPart};
use crate::services::fabric::{collect_pages, find_by_name_or_id, is_guid, FabricClient, ItemKind};
use serde_json::{json, Value};

fn text(row: &Value, pointer: &str) -> String {
    row.pointer(pointer)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub fn item_row(row: &Value) -> ItemRow {
    ItemRow {
        id: text(row, "/id"),
        display_name: text(row, "/displayName"),
        description: text(row, "/description"),
        properties: row.get("properties").filter(|p| !p.is_null()).cloned(),
    }
}

pub fn endpoint_row(row: &Value) -> PrivateEndpointRow {
    PrivateEndpointRow {
        id: text(row, "/id"),
        name: text(row, "/name"),
        target_private_link_resource_id: text(row, "/targetPrivateLinkResourceId"),
        target_subresource_type: text(row, "/targetSubresourceType"),
        provisioning_state: text(row, "/provisioningState"),
        connection_status: text(row, "/connectionState/status"),
        connection_description: text(row, "/connectionState/description"),
    }
}

pub fn table_mirroring_row(row: &Value) -> TableMirroringRow {
    let metric = |key: &str| {
        row.pointer(&format!("/metrics/{key}"))
            .and_then(Value::as_i64)
            .unwrap_or(0)
    };
    TableMirroringRow {
        source_schema_name: text(row, "/sourceSchemaName"),
        source_table_name: text(row, "/sourceTableName"),
        status: text(row, "/status"),
        processed_bytes: metric("processedBytes"),
        processed_rows: metric("processedRows"),
        last_sync_date_time: text(row, "/metrics/lastSyncDateTime"),
    }
}

pub fn fqdn_rows(body: &Value) -> Vec<String> {
    body.get("value")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|r| {
                    r.as_str()
                        .or_else(|| r.get("fqdn").and_then(Value::as_str))
                        .map(str::to_string)
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn create_body(name: &str, description: Option<&str>) -> FixResult<Value> {
    if name.trim().is_empty() {
        return Err(FixError::InvalidInput("item name must not be empty".into()));
    }
    let mut body = json!({ "displayName": name });
    if let Some(d) = description.filter(|d| !d.is_empty()) {
        body["description"] = Value::String(d.to_string());
    }
    Ok(body)
}

pub fn endpoint_body(
    name: &str,
    target_resource_id: &str,
    target_subresource_type: &str,
    request_message: Option<&str>,
) -> FixResult<Value> {
    let mut body = json!({
        "name": name,
        "targetPrivateLinkResourceId": target_resource_id,
        "targetSubresourceType": target_subresource_type,
    });
    if let Some(msg) = request_message {
        if msg.chars().count() > PRIVATE_ENDPOINT_MESSAGE_MAX {
            return Err(FixError::InvalidInput(format!(
                "request message is limited to {PRIVATE_ENDPOINT_MESSAGE_MAX} characters"
            )));
        }
        body["requestMessage"] = Value::String(msg.to_string());
    }
    Ok(body)
}

/// Picks the item's main definition file and parses it as JSON.
pub fn decode_definition(kind: ItemKind, parts: &[DefinitionPart]) -> FixResult<Value> {
    let file = kind.definition_file().unwrap_or_default();
    let part = parts
        .iter()
        .find(|p| p.path == file)
        .ok_or_else(|| FixError::NotFound(format!("{file} in {} definition", kind.label())))?;
    serde_json::from_slice(&part.bytes).map_err(|e| FixError::malformed(&part.path, e.to_string()))
}

pub struct Items<'a> {
    client: &'a FabricClient,
    workspace_id: String,
}

impl<'a> Items<'a> {
    pub fn new(client: &'a FabricClient, workspace: &str) -> FixResult<Self> {
        Ok(Self {
            client,
            workspace_id: client.resolve_workspace_id(workspace)?,
        })
    }

    fn item_path(&self, kind: ItemKind, id: &str) -> String {
        format!("/workspaces/{}/{}/{id}", self.workspace_id, kind.segment())
    }

    pub fn list(&self, kind: ItemKind) -> FixResult<Vec<ItemRow>> {
        Ok(self
            .client
            .list_items(&self.workspace_id, kind)?
            .iter()
            .map(item_row)
            .collect())
    }

    pub fn create(&self, kind: ItemKind, name: &str, description: Option<&str>) -> FixResult<()> {
        let body = create_body(name, description)?;
        self.client.post(
            &format!("/workspaces/{}/{}", self.workspace_id, kind.segment()),
            Some(&body),
        )?;
        tracing::info!(kind = kind.label(), name, "created item");
        Ok(())
    }

    pub fn delete(&self, kind: ItemKind, name_or_id: &str) -> FixResult<String> {
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        self.client.delete(&self.item_path(kind, &id))?;
        tracing::info!(kind = kind.label(), id, "deleted item");
        Ok(id)
    }

    /// Decoded main file, or the raw `InlineBase64` parts when `raw`.
    pub fn definition(&self, kind: ItemKind, name_or_id: &str, raw: bool) -> FixResult<Value> {
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        let parts = self.client.get_definition(&self.workspace_id, kind, &id)?;
        if raw {
            Ok(encode_parts(parts.iter()))
        } else {
            decode_definition(kind, &parts)
        }
    }

    pub fn update_definition(
        &self,
        kind: ItemKind,
        name_or_id: &str,
        content: &Value,
    ) -> FixResult<String> {
        let file = kind.definition_file().ok_or_else(|| {
            FixError::InvalidInput(format!("{} has no single definition file", kind.label()))
        })?;
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        let part = DefinitionPart {
            path: file.to_string(),
            bytes: serde_json::to_vec_pretty(content)?,
        };
        self.client
            .update_definition(&self.workspace_id, kind, &id, &[part])?;
        Ok(id)
    }

    pub fn mirroring_status(&self, name_or_id: &str) -> FixResult<String> {
        let kind = ItemKind::MirroredDatabase;
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        let body = self
            .client
            .post(&format!("{}/getMirroringStatus", self.item_path(kind, &id)), None)?
            .unwrap_or(Value::Null);
        Ok(text(&body, "/status"))
    }

    pub fn tables_mirroring_status(&self, name_or_id: &str) -> FixResult<Vec<TableMirroringRow>> {
        let kind = ItemKind::MirroredDatabase;
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        let first = self
            .client
            .post(
                &format!("{}/getTablesMirroringStatus", self.item_path(kind, &id)),
                None,
            )?
            .unwrap_or(Value::Null);
        let rows = collect_pages(first, "data", |uri| {
            Ok(self.client.post(uri, None)?.unwrap_or(Value::Null))
        })?;
        Ok(rows.iter().map(table_mirroring_row).collect())
    }

    pub fn set_mirroring(&self, name_or_id: &str, start: bool) -> FixResult<String> {
        let kind = ItemKind::MirroredDatabase;
        let id = self
            .client
            .resolve_item_id(&self.workspace_id, kind, name_or_id)?;
        let action = if start { "startMirroring" } else { "stopMirroring" };
        self.client
            .post(&format!("{}/{action}", self.item_path(kind, &id)), None)?;
        tracing::info!(id, action, "mirroring toggled");
        Ok(id)
    }

    fn endpoints_path(&self) -> String {
        format!("/workspaces/{}/managedPrivateEndpoints", self.workspace_id)
    }

    fn raw_endpoints(&self) -> FixResult<Vec<Value>> {
        self.client.list(&self.endpoints_path(), "value")
    }

    pub fn list_endpoints(&self) -> FixResult<Vec<PrivateEndpointRow>> {
        Ok(self.raw_endpoints()?.iter().map(endpoint_row).collect())
    }

    pub fn create_endpoint(
        &self,
        name: &str,
        target_resource_id: &str,
        target_subresource_type: &str,
        request_message: Option<&str>,
    ) -> FixResult<()> {
        let body = endpoint_body(name, target_resource_id, target_subresource_type, request_message)?;
        self.client.post(&self.endpoints_path(), Some(&body))?;
        tracing::info!(name, "created managed private endpoint");
        Ok(())
    }

    fn resolve_endpoint_id(&self, name_or_id: &str) -> FixResult<String> {
        if is_guid(name_or_id) {
            return Ok(name_or_id.trim().to_string());
        }
        let rows: Vec<Value> = self
            .raw_endpoints()?
            .into_iter()
            .map(|mut r| {
                if let Some(name) = r.get("name").cloned() {
                    r["displayName"] = name;
                }
                r
            })
            .collect();
        find_by_name_or_id(&rows, name_or_id)
            .map(|(id, _)| id)
            .ok_or_else(|| FixError::NotFound(format!("managed private endpoint '{name_or_id}'")))
    }

    pub fn delete_endpoint(&self, name_or_id: &str) -> FixResult<String> {
        let id = self.resolve_endpoint_id(name_or_id)?;
        self.client
            .delete(&format!("{}/{id}", self.endpoints_path()))?;
        Ok(id)
    }

    pub fn endpoint_fqdns(&self, name_or_id: &str) -> FixResult<Vec<String>> {
        let id = self.resolve_endpoint_id(name_or_id)?;
        let body = self
            .client
            .get(&format!("{}/{id}/targetFQDNs", self.endpoints_path()))?;
        Ok(fqdn_rows(&body))
    }
}
