//! "Ensure artifact" fixers over a `SemanticModel`.
//!
//! Existing artifacts are detected by fuzzy name containment, so a table
//! called "My Units Table" counts as a units group. Missing prerequisites
//! produce a `blocked` finding and no writes.

use crate::domain::error::FixResult;
use crate::domain::models::{FindingStatus, FixReport};
use crate::services::model::{SemanticModel, TableInfo};
use crate::services::templates::{
    time_intelligence_items, units_items, CALENDAR_COLUMNS, CALENDAR_DAX, CALENDAR_HIERARCHIES,
    CALENDAR_SORT_BY, CALENDAR_TABLE, LAST_REFRESH_DATA_COLUMN, LAST_REFRESH_M,
    LAST_REFRESH_MEASURE, LAST_REFRESH_MEASURE_DAX, LAST_REFRESH_MEASURE_FOLDER,
    LAST_REFRESH_TABLE, MEASURE_TABLE, MEASURE_TABLE_EXPRESSION, MEASURE_TABLE_VALUE_COLUMN,
    TIME_INTELLIGENCE_GROUP, UNITS_GROUP,
};

pub fn name_contains(tables: &[TableInfo], marker: &str) -> Vec<String> {
    let marker = marker.to_lowercase();
    tables
        .iter()
        .filter(|t| t.name.to_lowercase().contains(&marker))
        .map(|t| t.name.clone())
        .collect()
}

/// Precedence for a new calculation group: above every existing one.
pub fn next_precedence(tables: &[TableInfo]) -> i64 {
    tables
        .iter()
        .filter_map(|t| t.precedence)
        .max()
        .map(|p| p + 10)
        .unwrap_or(0)
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Records an "already exists" outcome. Returns true when the fixer should stop.
fn existing(report: &mut FixReport, matches: &[String], what: &str) -> bool {
    if matches.is_empty() {
        return false;
    }
    report.found = matches.len();
    let list = quoted(matches);
    if report.scan_only {
        report.push(
            &list,
            FindingStatus::Ok,
            format!("{what} already exists: {list}, no action needed"),
        );
    } else {
        report.push(
            &list,
            FindingStatus::Skipped,
            format!("{what} already exists: {list}, skipping creation"),
        );
    }
    report.summary = format!("{what} already exists in '{}'.", report.target);
    true
}

pub fn fix_discourage_implicit_measures(
    model: &mut dyn SemanticModel,
    scan_only: bool,
) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("discourage-implicit-measures", &name, scan_only);
    report.found = 1;
    if model.discourage_implicit_measures() {
        report.push(&name, FindingStatus::Ok, "discourageImplicitMeasures is already true");
        report.summary =
            format!("DiscourageImplicitMeasures is already set to True on '{name}'.");
        return Ok(report);
    }
    report.needing_fix = 1;
    if scan_only {
        report.push(
            &name,
            FindingStatus::NeedsFix,
            "discourageImplicitMeasures is false and would be set to true",
        );
        report.summary =
            format!("DiscourageImplicitMeasures is False on '{name}'. It would be set to True.");
        return Ok(report);
    }
    model.set_discourage_implicit_measures(true)?;
    report.fixed = 1;
    report.push(&name, FindingStatus::Fixed, "discourageImplicitMeasures set to true");
    report.summary = format!("DiscourageImplicitMeasures has been set to True on '{name}'.");
    Ok(report)
}

pub fn add_calculated_calendar(
    model: &mut dyn SemanticModel,
    scan_only: bool,
) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("calendar", &name, scan_only);
    let time_tables: Vec<String> = model
        .tables()
        .into_iter()
        .filter(|t| t.data_category.as_deref() == Some("Time"))
        .map(|t| t.name)
        .collect();
    if existing(&mut report, &time_tables, "Calendar table (dataCategory Time)") {
        return Ok(report);
    }

    report.needing_fix = 1;
    if scan_only {
        report.push(
            CALENDAR_TABLE,
            FindingStatus::NeedsFix,
            "no table with dataCategory 'Time'; a CalcCalendar table would be added",
        );
        report.summary = format!(
            "No table with DataCategory 'Time' found in '{name}'. A {CALENDAR_TABLE} table would be added."
        );
        return Ok(report);
    }

    model.add_calculated_table(CALENDAR_TABLE, CALENDAR_DAX, Some("Time"))?;
    for column in &CALENDAR_COLUMNS {
        model.add_calculated_table_column(CALENDAR_TABLE, column)?;
    }
    model.mark_as_date_table(CALENDAR_TABLE, "Date")?;
    model.save_changes()?;
    for (column, sort_by) in CALENDAR_SORT_BY {
        model.set_sort_by_column(CALENDAR_TABLE, column, sort_by)?;
    }
    for h in &CALENDAR_HIERARCHIES {
        model.add_hierarchy(CALENDAR_TABLE, h.name, h.columns, Some(h.display_folder))?;
    }

    report.fixed = 1;
    report.push(
        CALENDAR_TABLE,
        FindingStatus::Fixed,
        format!(
            "added with {} columns and {} hierarchies",
            CALENDAR_COLUMNS.len(),
            CALENDAR_HIERARCHIES.len()
        ),
    );
    report.summary = format!(
        "{CALENDAR_TABLE} table added successfully to '{name}' with {} columns and {} hierarchies.",
        CALENDAR_COLUMNS.len(),
        CALENDAR_HIERARCHIES.len()
    );
    Ok(report)
}

pub fn add_measure_table(model: &mut dyn SemanticModel, scan_only: bool) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("measure-table", &name, scan_only);
    let matches = name_contains(&model.tables(), "measure");
    if existing(&mut report, &matches, "A Measure table") {
        return Ok(report);
    }

    report.needing_fix = 1;
    if scan_only {
        report.push(
            MEASURE_TABLE,
            FindingStatus::NeedsFix,
            "no table containing 'Measure'; a Measure table would be added",
        );
        report.summary = format!(
            "No table containing 'Measure' found in '{name}'. A '{MEASURE_TABLE}' table would be added."
        );
        return Ok(report);
    }

    model.add_calculated_table(MEASURE_TABLE, MEASURE_TABLE_EXPRESSION, None)?;
    model.add_calculated_table_column(MEASURE_TABLE, &MEASURE_TABLE_VALUE_COLUMN)?;
    model.save_changes()?;
    model.set_columns_hidden(MEASURE_TABLE, true)?;

    report.fixed = 1;
    report.push(MEASURE_TABLE, FindingStatus::Fixed, "added with hidden columns");
    report.summary = format!(
        "'{MEASURE_TABLE}' table added successfully to '{name}'. Move your measures into this table to keep the model organised."
    );
    Ok(report)
}

pub fn add_last_refresh_table(
    model: &mut dyn SemanticModel,
    scan_only: bool,
) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("last-refresh", &name, scan_only);
    let matches = name_contains(&model.tables(), "refresh");
    if existing(&mut report, &matches, "A refresh table") {
        return Ok(report);
    }

    report.needing_fix = 1;
    if scan_only {
        report.push(
            LAST_REFRESH_TABLE,
            FindingStatus::NeedsFix,
            "no table containing 'Refresh'; a Last Refresh table would be added",
        );
        report.summary = format!(
            "No table containing 'Refresh' found in '{name}'. A '{LAST_REFRESH_TABLE}' table would be added."
        );
        return Ok(report);
    }

    model.add_table(LAST_REFRESH_TABLE, true)?;
    model.add_m_partition(LAST_REFRESH_TABLE, LAST_REFRESH_TABLE, LAST_REFRESH_M, "Import")?;
    model.add_data_column(LAST_REFRESH_TABLE, &LAST_REFRESH_DATA_COLUMN)?;

    let measure_target = name_contains(&model.tables(), "measure")
        .into_iter()
        .next()
        .unwrap_or_else(|| LAST_REFRESH_TABLE.to_string());
    model.add_measure(
        &measure_target,
        LAST_REFRESH_MEASURE,
        LAST_REFRESH_MEASURE_DAX,
        Some(LAST_REFRESH_MEASURE_FOLDER),
    )?;

    report.fixed = 1;
    let placement = if measure_target != LAST_REFRESH_TABLE {
        format!(" (measure placed in '{measure_target}')")
    } else {
        String::new()
    };
    report.push(
        LAST_REFRESH_TABLE,
        FindingStatus::Fixed,
        format!("added with 1 column and 1 measure{placement}"),
    );
    report.summary = format!(
        "'{LAST_REFRESH_TABLE}' table added successfully to '{name}' with 1 column and 1 measure{placement}."
    );
    Ok(report)
}

fn add_calculation_group(
    model: &mut dyn SemanticModel,
    group: &str,
    items: &[(&str, String)],
) -> FixResult<i64> {
    let precedence = next_precedence(&model.tables());
    model.add_calculation_group(group, precedence)?;
    model.rename_column(group, "Name", group)?;
    for (ordinal, (item, expression)) in items.iter().enumerate() {
        model.add_calculation_item(group, item, expression, ordinal)?;
    }
    Ok(precedence)
}

const CALC_GROUP_NOTE: &str = "Note: calculation groups can have a performance impact when used within reports.";

pub fn add_calc_group_units(model: &mut dyn SemanticModel, scan_only: bool) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("units", &name, scan_only);
    let matches = name_contains(&model.tables(), "unit");
    if existing(&mut report, &matches, "A Units calculation group") {
        return Ok(report);
    }

    report.needing_fix = 1;
    if scan_only {
        report.push(
            UNITS_GROUP,
            FindingStatus::NeedsFix,
            "no table containing 'Unit'; a Units calculation group would be added",
        );
        report.summary = format!(
            "No table containing 'Unit' found in '{name}'. A '{UNITS_GROUP}' calculation group would be added. {CALC_GROUP_NOTE}"
        );
        return Ok(report);
    }

    let items = units_items();
    let precedence = add_calculation_group(model, UNITS_GROUP, &items)?;
    report.fixed = 1;
    report.push(
        UNITS_GROUP,
        FindingStatus::Fixed,
        format!("added with {} items at precedence {precedence}", items.len()),
    );
    report.summary = format!(
        "'{UNITS_GROUP}' calculation group added successfully to '{name}' with {} items (Thousand, Million). {CALC_GROUP_NOTE}",
        items.len()
    );
    Ok(report)
}

pub fn add_calc_group_time_intelligence(
    model: &mut dyn SemanticModel,
    scan_only: bool,
) -> FixResult<FixReport> {
    let name = model.name().to_string();
    let mut report = FixReport::new("time-intelligence", &name, scan_only);
    let tables = model.tables();
    let matches = name_contains(&tables, "time intelligence");
    if existing(&mut report, &matches, "A Time Intelligence calculation group") {
        return Ok(report);
    }
    report.needing_fix = 1;

    let Some(calendar) = tables
        .iter()
        .find(|t| t.data_category.as_deref() == Some("Time"))
    else {
        report.push(
            TIME_INTELLIGENCE_GROUP,
            FindingStatus::Blocked,
            "no calendar table (dataCategory 'Time') found; add a calendar table first",
        );
        report.summary = format!(
            "Cannot add the '{TIME_INTELLIGENCE_GROUP}' calculation group: no calendar table found in '{name}'."
        );
        return Ok(report);
    };

    let date_column = calendar
        .columns
        .iter()
        .find(|c| c.is_key)
        .or_else(|| {
            calendar
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case("date"))
        })
        .map(|c| c.name.clone());
    let Some(date_column) = date_column else {
        report.push(
            &calendar.name,
            FindingStatus::Blocked,
            "cannot determine the date column; mark a date column as key or name it 'Date'",
        );
        report.summary = format!(
            "Cannot determine the date column in '{}'. Please mark a date column as IsKey or name it 'Date'.",
            calendar.name
        );
        return Ok(report);
    };

    let reference = format!("'{}'[{date_column}]", calendar.name);
    if scan_only {
        report.push(
            TIME_INTELLIGENCE_GROUP,
            FindingStatus::NeedsFix,
            format!("calculation group would be added using {reference}"),
        );
        report.summary = format!(
            "No table containing 'Time Intelligence' found in '{name}'. A '{TIME_INTELLIGENCE_GROUP}' calculation group would be added using {reference}."
        );
        return Ok(report);
    }

    let items = time_intelligence_items(&calendar.name, &date_column);
    let precedence = add_calculation_group(model, TIME_INTELLIGENCE_GROUP, &items)?;
    report.fixed = 1;
    report.push(
        TIME_INTELLIGENCE_GROUP,
        FindingStatus::Fixed,
        format!(
            "added with {} items using {reference} at precedence {precedence}",
            items.len()
        ),
    );
    report.summary = format!(
        "'{TIME_INTELLIGENCE_GROUP}' calculation group added successfully to '{name}' with {} items.",
        items.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model::BimModel;
    use serde_json::{json, Value};

    fn model(tables: Value, readonly: bool) -> BimModel {
        BimModel::from_document(
            "Sales",
            json!({"name": "Sales", "model": {"tables": tables}}),
            readonly,
        )
        .unwrap()
    }

    fn parts_with(report: &FixReport, status: FindingStatus) -> Vec<String> {
        report
            .findings
            .iter()
            .filter(|f| f.status == status)
            .map(|f| f.part.clone())
            .collect()
    }

    fn base() -> Value {
        json!([{"name": "Fact", "columns": [{"name": "Amount", "dataType": "double"}]}])
    }

    #[test]
    fn units_skip_existing_fuzzy_match_without_writing() {
        let mut m = model(json!([{"name": "My Units Table"}]), false);
        let before = m.document().unwrap();
        let r = add_calc_group_units(&mut m, false).unwrap();
        assert_eq!(r.findings[0].status, FindingStatus::Skipped);
        assert_eq!(r.fixed, 0);
        assert_eq!(m.document().unwrap(), before);
    }

    #[test]
    fn units_group_gets_precedence_above_existing_groups() {
        let mut m = model(
            json!([
                {"name": "Fact"},
                {"name": "Currency", "calculationGroup": {"precedence": 15}},
                {"name": "Scenario", "calculationGroup": {"precedence": 5}}
            ]),
            false,
        );
        add_calc_group_units(&mut m, false).unwrap();
        let units = m.tables().into_iter().find(|t| t.name == "Units").unwrap();
        assert_eq!(units.precedence, Some(25));
        assert_eq!(units.columns[0].name, "Units");
        let doc = m.document().unwrap();
        let items = &doc["model"]["tables"][3]["calculationGroup"]["calculationItems"];
        assert_eq!(items[1]["name"], "Million");
        assert_eq!(items[1]["ordinal"], 1);
        assert_eq!(doc["model"]["discourageImplicitMeasures"], true);
    }

    #[test]
    fn first_group_starts_at_zero() {
        assert_eq!(next_precedence(&model(base(), true).tables()), 0);
    }

    #[test]
    fn discourage_is_idempotent() {
        let mut m = model(base(), false);
        let r = fix_discourage_implicit_measures(&mut m, false).unwrap();
        assert_eq!(r.fixed, 1);
        let r = fix_discourage_implicit_measures(&mut m, false).unwrap();
        assert_eq!((r.needing_fix, r.fixed), (0, 0));
    }

    #[test]
    fn calendar_then_time_intelligence() {
        let mut m = model(base(), false);
        let scan = add_calc_group_time_intelligence(&mut m, false).unwrap();
        assert_eq!(scan.findings[0].status, FindingStatus::Blocked);

        let r = add_calculated_calendar(&mut m, false).unwrap();
        assert_eq!(r.fixed, 1);
        let cal = m
            .tables()
            .into_iter()
            .find(|t| t.name == CALENDAR_TABLE)
            .unwrap();
        assert_eq!(cal.data_category.as_deref(), Some("Time"));
        assert_eq!(cal.columns.len(), 20);

        let doc = m.document().unwrap();
        let cal_doc = &doc["model"]["tables"][1];
        assert_eq!(cal_doc["hierarchies"].as_array().map(Vec::len), Some(3));
        let month_mmm = cal_doc["columns"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["name"] == "Month (MMM)")
            .unwrap();
        assert_eq!(month_mmm["sortByColumn"], "Month");

        let r = add_calc_group_time_intelligence(&mut m, false).unwrap();
        assert_eq!(r.fixed, 1);
        assert!(r.findings[0].detail.contains("'CalcCalendar'[Date]"));

        let again = add_calculated_calendar(&mut m, true);
        assert!(again.is_ok());
        let again = add_calc_group_time_intelligence(&mut m, false).unwrap();
        assert_eq!(again.needing_fix, 0);
    }

    #[test]
    fn time_intelligence_falls_back_to_date_named_column() {
        let mut m = model(
            json!([{"name": "Dates", "dataCategory": "Time", "columns": [{"name": "DATE"}]}]),
            true,
        );
        let r = add_calc_group_time_intelligence(&mut m, true).unwrap();
        assert!(r.findings[0].detail.contains("'Dates'[DATE]"));
    }

    #[test]
    fn time_intelligence_blocks_without_date_column() {
        let mut m = model(
            json!([{"name": "Dates", "dataCategory": "Time", "columns": [{"name": "Day"}]}]),
            false,
        );
        let before = m.document().unwrap();
        let r = add_calc_group_time_intelligence(&mut m, false).unwrap();
        assert_eq!(r.findings[0].status, FindingStatus::Blocked);
        assert_eq!(m.document().unwrap(), before);
    }

    #[test]
    fn measure_table_hides_generated_column() {
        let mut m = model(base(), false);
        add_measure_table(&mut m, false).unwrap();
        let t = m.tables().into_iter().find(|t| t.name == "Measure").unwrap();
        assert!(t.columns.iter().all(|c| c.is_hidden));
    }

    #[test]
    fn last_refresh_measure_goes_to_measure_table_when_present() {
        let mut m = model(json!([{"name": "_Measures"}]), false);
        let r = add_last_refresh_table(&mut m, false).unwrap();
        assert!(r.summary.contains("placed in '_Measures'"));
        let doc = m.document().unwrap();
        assert_eq!(doc["model"]["tables"][0]["measures"][0]["name"], LAST_REFRESH_MEASURE);
        assert_eq!(doc["model"]["tables"][1]["isHidden"], true);
        assert_eq!(doc["model"]["tables"][1]["partitions"][0]["mode"], "import");
    }

    #[test]
    fn scan_and_fix_agree_on_what_changes() {
        let fixers: [fn(&mut dyn SemanticModel, bool) -> FixResult<FixReport>; 6] = [
            fix_discourage_implicit_measures,
            add_calculated_calendar,
            add_measure_table,
            add_last_refresh_table,
            add_calc_group_units,
            add_calc_group_time_intelligence,
        ];
        let dated = json!([
            {"name": "Fact", "columns": [{"name": "Amount", "dataType": "double"}]},
            {"name": "Dates", "dataCategory": "Time", "columns": [{"name": "Date"}]}
        ]);
        for tables in [base(), dated] {
            for fixer in fixers {
                let mut scan = model(tables.clone(), true);
                let scanned = fixer(&mut scan, true).unwrap();

                let mut fix = model(tables.clone(), false);
                let before = fix.document().unwrap();
                let fixed = fixer(&mut fix, false).unwrap();
                let changed = fix.document().unwrap() != before;

                let would = parts_with(&scanned, FindingStatus::NeedsFix);
                let did = parts_with(&fixed, FindingStatus::Fixed);
                assert_eq!(would, did, "{}", scanned.fixer);
                assert_eq!(!did.is_empty(), changed, "{}", scanned.fixer);

                let rescanned = fixer(&mut fix, true).unwrap();
                assert!(parts_with(&rescanned, FindingStatus::NeedsFix).is_empty());
            }
        }
    }

    #[test]
    fn scan_mode_never_writes() {
        let mut m = model(base(), true);
        for fixer in [
            fix_discourage_implicit_measures,
            add_calculated_calendar,
            add_measure_table,
            add_last_refresh_table,
            add_calc_group_units,
            add_calc_group_time_intelligence,
        ] {
            let r = fixer(&mut m, true).unwrap();
            assert_eq!(r.fixed, 0);
        }
    }
}
