use crate::cli::{
    Cli, Commands, CrudCommands, EndpointCommands, GraphqlCommands, ItemCommands,
    MirroredCommands, PipelineCommands,
};
use crate::domain::error::FixError;
use crate::domain::models::{GeneralConfig, ItemAction, ItemRow};
use crate::services::fabric::{FabricClient, ItemKind};
use crate::services::items::Items;
use crate::services::output::{print_one, print_out};
use crate::services::storage::audit;

fn print_items(cli: &Cli, rows: &[ItemRow]) -> anyhow::Result<()> {
    print_out(cli.json, rows, |r| {
        format!("{}\t{}\t{}", r.id, r.display_name, r.description)
    })
}

fn report_action(cli: &Cli, action: &str, item: &str, status: &str) -> anyhow::Result<()> {
    audit(
        action,
        serde_json::json!({ "item": item, "status": status }),
    );
    let out = ItemAction {
        action: action.to_string(),
        item: item.to_string(),
        status: status.to_string(),
    };
    print_one(cli.json, out, |a| format!("{}\t{}\t{}", a.action, a.item, a.status))
}

fn crud(cli: &Cli, items: &Items, kind: ItemKind, command: &CrudCommands) -> anyhow::Result<()> {
    match command {
        CrudCommands::List => print_items(cli, &items.list(kind)?)?,
        CrudCommands::Create { name, description } => {
            items.create(kind, name, description.as_deref())?;
            report_action(cli, &format!("create {}", kind.label()), name, "created")?;
        }
        CrudCommands::Delete { name } => {
            let id = items.delete(kind, name)?;
            report_action(cli, &format!("delete {}", kind.label()), &id, "deleted")?;
        }
    }
    Ok(())
}

pub fn handle_item_commands(cli: &Cli, cfg: &GeneralConfig) -> anyhow::Result<bool> {
    let Commands::Items { command } = &cli.command else {
        return Ok(false);
    };

    let workspace = cli
        .workspace
        .clone()
        .or_else(|| cfg.default_workspace.clone())
        .ok_or_else(|| {
            FixError::InvalidInput(
                "item commands need --workspace (or general.default_workspace)".to_string(),
            )
        })?;
    let client = FabricClient::from_config(cfg)?;
    let items = Items::new(&client, &workspace)?;

    match command {
        ItemCommands::DataPipeline { command } => {
            let kind = ItemKind::DataPipeline;
            match command {
                PipelineCommands::List => print_items(cli, &items.list(kind)?)?,
                PipelineCommands::Create { name, description } => {
                    items.create(kind, name, description.as_deref())?;
                    report_action(cli, "create data pipeline", name, "created")?;
                }
                PipelineCommands::Delete { name } => {
                    let id = items.delete(kind, name)?;
                    report_action(cli, "delete data pipeline", &id, "deleted")?;
                }
                PipelineCommands::Definition { name, raw } => {
                    let def = items.definition(kind, name, *raw)?;
                    print_one(cli.json, def, |d| {
                        serde_json::to_string_pretty(d).unwrap_or_default()
                    })?;
                }
            }
        }
        ItemCommands::Graphql { command } => {
            let kind = ItemKind::GraphQlApi;
            match command {
                GraphqlCommands::List => print_items(cli, &items.list(kind)?)?,
                GraphqlCommands::Create { name, description } => {
                    items.create(kind, name, description.as_deref())?;
                    report_action(cli, "create GraphQL API", name, "created")?;
                }
            }
        }
        ItemCommands::KqlQueryset { command } => {
            crud(cli, &items, ItemKind::KqlQueryset, command)?;
        }
        ItemCommands::MlExperiment { command } => {
            crud(cli, &items, ItemKind::MlExperiment, command)?;
        }
        ItemCommands::MirroredDatabase { command } => {
            let kind = ItemKind::MirroredDatabase;
            match command {
                MirroredCommands::List => print_items(cli, &items.list(kind)?)?,
                MirroredCommands::Create { name, description } => {
                    items.create(kind, name, description.as_deref())?;
                    report_action(cli, "create mirrored database", name, "created")?;
                }
                MirroredCommands::Delete { name } => {
                    let id = items.delete(kind, name)?;
                    report_action(cli, "delete mirrored database", &id, "deleted")?;
                }
                MirroredCommands::Status { name } => {
                    let status = items.mirroring_status(name)?;
                    print_one(cli.json, status, |s| s.clone())?;
                }
                MirroredCommands::TablesStatus { name } => {
                    let rows = items.tables_mirroring_status(name)?;
                    print_out(cli.json, &rows, |r| {
                        format!(
                            "{}.{}\t{}\t{}\t{}\t{}",
                            r.source_schema_name,
                            r.source_table_name,
                            r.status,
                            r.processed_rows,
                            r.processed_bytes,
                            r.last_sync_date_time
                        )
                    })?;
                }
                MirroredCommands::Start { name } => {
                    let id = items.set_mirroring(name, true)?;
                    report_action(cli, "start mirroring", &id, "started")?;
                }
                MirroredCommands::Stop { name } => {
                    let id = items.set_mirroring(name, false)?;
                    report_action(cli, "stop mirroring", &id, "stopped")?;
                }
                MirroredCommands::Definition { name, raw } => {
                    let def = items.definition(kind, name, *raw)?;
                    print_one(cli.json, def, |d| {
                        serde_json::to_string_pretty(d).unwrap_or_default()
                    })?;
                }
                MirroredCommands::UpdateDefinition { name, file } => {
                    let raw = std::fs::read_to_string(file)?;
                    let content: serde_json::Value = serde_json::from_str(&raw)
                        .map_err(|e| FixError::malformed(&file.display().to_string(), e.to_string()))?;
                    let id = items.update_definition(kind, name, &content)?;
                    report_action(cli, "update mirrored database definition", &id, "updated")?;
                }
            }
        }
        ItemCommands::PrivateEndpoint { command } => match command {
            EndpointCommands::List => {
                let rows = items.list_endpoints()?;
                print_out(cli.json, &rows, |r| {
                    format!(
                        "{}\t{}\t{}\t{}\t{}",
                        r.id, r.name, r.target_subresource_type, r.provisioning_state,
                        r.connection_status
                    )
                })?;
            }
            EndpointCommands::Create {
                name,
                target_resource_id,
                target_subresource_type,
                request_message,
            } => {
                items.create_endpoint(
                    name,
                    target_resource_id,
                    target_subresource_type,
                    request_message.as_deref(),
                )?;
                report_action(cli, "create managed private endpoint", name, "created")?;
            }
            EndpointCommands::Delete { name } => {
                let id = items.delete_endpoint(name)?;
                report_action(cli, "delete managed private endpoint", &id, "deleted")?;
            }
            EndpointCommands::Fqdns { name } => {
                let rows = items.endpoint_fqdns(name)?;
                print_out(cli.json, &rows, |f| f.clone())?;
            }
        },
    }

    Ok(true)
}
