//! Static DAX / M templates for the artifacts the model fixers add.

use crate::services::model::ColumnSpec;

pub const CALENDAR_TABLE: &str = "CalcCalendar";
pub const MEASURE_TABLE: &str = "Measure";
pub const MEASURE_TABLE_EXPRESSION: &str = "{0}";
pub const LAST_REFRESH_TABLE: &str = "Last Refresh";
pub const LAST_REFRESH_COLUMN: &str = "Last Refreshes";
pub const LAST_REFRESH_MEASURE: &str = "Last Refresh Measure";
pub const LAST_REFRESH_MEASURE_FOLDER: &str = "Meta";
pub const UNITS_GROUP: &str = "Units";
pub const TIME_INTELLIGENCE_GROUP: &str = "Time Intelligence";

pub const CALENDAR_DAX: &str = r#"VAR Today = TODAY()
VAR MonthStartFiscalYear = 10
RETURN
    ADDCOLUMNS(
        CALENDARAUTO(),
        "Year", YEAR([Date]),
        "Quarter", "Q " & QUARTER([Date]),
        "Month", MONTH([Date]),
        "Month (MMM)", FORMAT([Date], "MMM"),
        "Day", DAY([Date]),
        "Fiscal Year", YEAR([Date]) + IF(MONTH([Date]) >= MonthStartFiscalYear, 1, 0),
        "End of Month", EOMONTH([Date], 0),
        "Week of Year", WEEKNUM([Date]),
        "Weekday", WEEKDAY([Date]),
        "Is Current or Past Month", IF([Date] <= EOMONTH(TODAY(), 0), "Yes", "No"),
        "Is Before This Month", FORMAT([Date],"YYYYMM") < FORMAT(Today,"YYYYMM"),
        "Is Current Fiscal Year",
            VAR CurrentFiscalYear = YEAR(Today) + IF(MONTH(Today) >= MonthStartFiscalYear, 1, 0)
            RETURN YEAR([Date]) + IF(MONTH([Date]) >= MonthStartFiscalYear, 1, 0) = CurrentFiscalYear,
        "Is Previous Fiscal Year",
            VAR CurrentFiscalYear = YEAR(Today) + IF(MONTH(Today) >= MonthStartFiscalYear, 1, 0)
            RETURN YEAR([Date]) + IF(MONTH([Date]) >= MonthStartFiscalYear, 1, 0) = CurrentFiscalYear - 1,
        "Is Current Calendar Year", YEAR([Date]) = YEAR(Today),
        "Is Previous Calendar Year", YEAR([Date]) = YEAR(Today) - 1,
        "Is Current Month",
            YEAR([Date]) = YEAR(Today) && MONTH([Date]) = MONTH(Today),
        "Is Previous Month",
            VAR PrevMonthYear = IF(MONTH(Today) = 1, YEAR(Today) - 1, YEAR(Today))
            VAR PrevMonth = IF(MONTH(Today) = 1, 12, MONTH(Today) - 1)
            RETURN YEAR([Date]) = PrevMonthYear && MONTH([Date]) = PrevMonth,
        "Month Key", YEAR([Date]) * 100 + MONTH([Date]),
        "Relative Month", (YEAR([Date]) - YEAR(Today)) * 12 + (MONTH([Date]) - MONTH(Today))
    )"#;

const BOOL_FORMAT: &str = r#""""TRUE"";""TRUE"";""FALSE""""#;

const fn calendar_column(
    name: &'static str,
    source_column: &'static str,
    data_type: &'static str,
    format_string: Option<&'static str>,
    is_key: bool,
    summarize_by: &'static str,
    display_folder: &'static str,
) -> ColumnSpec<'static> {
    ColumnSpec {
        name,
        source_column,
        data_type,
        format_string,
        is_key,
        hidden: false,
        summarize_by,
        display_folder: Some(display_folder),
    }
}

pub const CALENDAR_COLUMNS: [ColumnSpec<'static>; 20] = [
    calendar_column("Date", "CalcCalendar.[Date]", "dateTime", Some("Short Date"), true, "none", "1. Favorites"),
    calendar_column("Month", "CalcCalendar.[Month]", "int64", Some("0"), false, "sum", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Fiscal Year", "CalcCalendar.[Fiscal Year]", "int64", Some("0"), false, "sum", "3. Fiscal Date\\2. Numbers;1. Favorites"),
    calendar_column("Year", "CalcCalendar.[Year]", "int64", Some("0"), false, "sum", "2. Calendar Date\\2. Number Columns;1. Favorites"),
    calendar_column("Month (MMM)", "CalcCalendar.[Month (MMM)]", "string", None, false, "none", "2. Calendar Date\\3. Text Columns;1. Favorites"),
    calendar_column("Day", "CalcCalendar.[Day]", "int64", Some("0"), false, "sum", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Is Before This Month", "CalcCalendar.[Is Before This Month]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Current Fiscal Year", "CalcCalendar.[Is Current Fiscal Year]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Previous Fiscal Year", "CalcCalendar.[Is Previous Fiscal Year]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Current Calendar Year", "CalcCalendar.[Is Current Calendar Year]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Previous Calendar Year", "CalcCalendar.[Is Previous Calendar Year]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Current Month", "CalcCalendar.[Is Current Month]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Is Previous Month", "CalcCalendar.[Is Previous Month]", "boolean", Some(BOOL_FORMAT), false, "none", "4. Flags"),
    calendar_column("Year Month Key", "CalcCalendar.[Month Key]", "int64", Some("0"), false, "count", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Relative Month", "CalcCalendar.[Relative Month]", "int64", Some("0"), false, "sum", "4. Flags"),
    calendar_column("Quarter", "CalcCalendar.[Quarter]", "string", None, false, "none", "2. Calendar Date\\3. Text Columns"),
    calendar_column("End of Month", "CalcCalendar.[End of Month]", "dateTime", Some("General Date"), false, "none", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Week of Year", "CalcCalendar.[Week of Year]", "int64", Some("0"), false, "sum", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Weekday", "CalcCalendar.[Weekday]", "int64", Some("0"), false, "sum", "2. Calendar Date\\2. Number Columns"),
    calendar_column("Is Current or Past Months", "CalcCalendar.[Is Current or Past Month]", "string", None, false, "none", "4. Flags"),
];

/// (column, sort by)
pub const CALENDAR_SORT_BY: [(&str, &str); 1] = [("Month (MMM)", "Month")];

pub struct HierarchyTemplate {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub display_folder: &'static str,
}

pub const CALENDAR_HIERARCHIES: [HierarchyTemplate; 3] = [
    HierarchyTemplate {
        name: "Date Hierarchy",
        columns: &["Year", "Quarter", "Month", "Day"],
        display_folder: "2. Calendar Date\\1. Hierarchy",
    },
    HierarchyTemplate {
        name: "Fiscal Date Hierarchy",
        columns: &["Fiscal Year", "Quarter", "Month", "Day"],
        display_folder: "3. Fiscal Date\\1. Hierarchy",
    },
    HierarchyTemplate {
        name: "Calendar Hierarchy",
        columns: &["Year", "Month (MMM)", "Week of Year", "Weekday"],
        display_folder: "1. Favorites",
    },
];

/// The auto-generated column of a `{0}` calculated table.
pub const MEASURE_TABLE_VALUE_COLUMN: ColumnSpec<'static> = ColumnSpec {
    name: "Value",
    source_column: "[Value]",
    data_type: "int64",
    format_string: Some("0"),
    is_key: false,
    hidden: false,
    summarize_by: "sum",
    display_folder: None,
};

pub const LAST_REFRESH_M: &str = "let\n    #\"Today\" = #table({\"Last Refreshes\"}, {{DateTime.From(DateTime.LocalNow())}})\nin\n    #\"Today\"";

pub const LAST_REFRESH_DATA_COLUMN: ColumnSpec<'static> = ColumnSpec {
    name: LAST_REFRESH_COLUMN,
    source_column: LAST_REFRESH_COLUMN,
    data_type: "string",
    format_string: None,
    is_key: false,
    hidden: false,
    summarize_by: "none",
    display_folder: None,
};

pub const LAST_REFRESH_MEASURE_DAX: &str = "\"Last Refresh: \" & MAX('Last Refresh'[Last Refreshes])";

fn scale_unless_ratio(divisor: u64) -> String {
    format!(
        "IF(\n    ISNUMBER( SELECTEDMEASURE() ),\n    IF(\n        NOT(\n            CONTAINSSTRING( SELECTEDMEASURENAME(), \"%\" )\n                || CONTAINSSTRING( SELECTEDMEASURENAME(), \"ratio\" )\n        ),\n        DIVIDE( SELECTEDMEASURE(), {divisor} ),\n        SELECTEDMEASURE()\n    ),\n    SELECTEDMEASURE()\n)"
    )
}

pub fn units_items() -> Vec<(&'static str, String)> {
    vec![
        ("Thousand", scale_unless_ratio(1_000)),
        ("Million", scale_unless_ratio(1_000_000)),
    ]
}

/// Calculation items for the time intelligence group, in ordinal order.
pub fn time_intelligence_items(calendar: &str, date: &str) -> Vec<(&'static str, String)> {
    let col = format!("'{calendar}'[{date}]");
    let all = format!("ALL( '{calendar}' )");
    let ytd = format!("DATESYTD( {col}, \"12/31\" )");
    let shifted = |period: &str| {
        format!("CALCULATE(\n    SELECTEDMEASURE(),\n    {period},\n    {all}\n)")
    };
    let ac_ytd = format!("TOTALYTD( SELECTEDMEASURE(), {ytd}, {all} )");
    let ytd_back = |years: i32| {
        format!("CALCULATE( SELECTEDMEASURE(), DATEADD( {ytd}, -{years}, YEAR ), {all} )")
    };
    let last_year = format!("CALCULATE( SELECTEDMEASURE(), SAMEPERIODLASTYEAR( {col} ), {all} )");
    let two_years = format!("CALCULATE( SELECTEDMEASURE(), DATEADD( {col}, -2, YEAR ), {all} )");
    let variance = |ac: &str, var: &str, base: &str, ret: &str| {
        format!("VAR AC =\n    {ac}\nVAR {var} =\n    {base}\nRETURN\n    {ret}")
    };

    vec![
        ("AC", "SELECTEDMEASURE()".to_string()),
        ("Y-1", shifted(&format!("SAMEPERIODLASTYEAR( {col} )"))),
        ("Y-2", shifted(&format!("DATEADD( {col}, -2, YEAR )"))),
        ("Y-3", shifted(&format!("DATEADD( {col}, -3, YEAR )"))),
        ("YTD", shifted(&ytd)),
        ("YTD-1", shifted(&format!("DATEADD( {ytd}, -1, YEAR )"))),
        ("YTD-2", shifted(&format!("DATEADD( {ytd}, -2, YEAR )"))),
        ("abs. AC vs Y-1", variance(&ac_ytd, "Y1", &ytd_back(1), "AC - Y1")),
        ("abs. AC vs Y-2", variance(&ac_ytd, "Y2", &ytd_back(2), "AC - Y2")),
        ("abs. AC vs YTD-1", variance(&ac_ytd, "Y1", &ytd_back(1), "AC - Y1")),
        ("abs. AC vs YTD-2", variance(&ac_ytd, "Y2", &ytd_back(2), "AC - Y2")),
        ("AC vs Y-1", variance(&ac_ytd, "Y1", &last_year, "DIVIDE( AC - Y1, Y1 )")),
        ("AC vs Y-2", variance(&ac_ytd, "Y2", &two_years, "DIVIDE( AC - Y2, Y2 )")),
        ("AC vs YTD-1", variance(&ac_ytd, "Y1", &ytd_back(1), "DIVIDE( AC - Y1, Y1 )")),
        ("AC vs YTD-2", variance(&ac_ytd, "Y2", &ytd_back(2), "DIVIDE( AC - Y2, Y2 )")),
        (
            "achiev. AC vs Y-1",
            variance("SELECTEDMEASURE()", "Y1", &last_year, "1 - DIVIDE( ( Y1 - AC ), Y1, 0 )"),
        ),
        (
            "achiev. AC vs Y-2",
            variance("SELECTEDMEASURE()", "Y2", &two_years, "1 - DIVIDE( ( Y2 - AC ), Y2, 0 )"),
        ),
        (
            "achiev. AC vs YTD-1",
            variance(&ac_ytd, "Y1", &ytd_back(1), "1 - DIVIDE( ( Y1 - AC ), Y1, 0 )"),
        ),
        (
            "achiev. AC vs YTD-2",
            variance(&ac_ytd, "Y2", &ytd_back(2), "1 - DIVIDE( ( Y2 - AC ), Y2, 0 )"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_has_one_key_column() {
        let keys: Vec<&str> = CALENDAR_COLUMNS
            .iter()
            .filter(|c| c.is_key)
            .map(|c| c.name)
            .collect();
        assert_eq!(keys, vec!["Date"]);
        assert!(CALENDAR_DAX.starts_with("VAR Today = TODAY()"));
    }

    #[test]
    fn hierarchies_reference_existing_columns() {
        for h in &CALENDAR_HIERARCHIES {
            for c in h.columns {
                assert!(CALENDAR_COLUMNS.iter().any(|col| col.name == *c), "{c}");
            }
        }
    }

    #[test]
    fn time_intelligence_items_are_ordered_and_never_divide_bare() {
        let items = time_intelligence_items("Cal", "Date");
        assert_eq!(items.len(), 19);
        assert_eq!(items[0].0, "AC");
        assert_eq!(items[18].0, "achiev. AC vs YTD-2");
        for (name, dax) in &items {
            assert!(!dax.contains(" / "), "{name}");
        }
        assert_eq!(
            items[1].1,
            "CALCULATE(\n    SELECTEDMEASURE(),\n    SAMEPERIODLASTYEAR( 'Cal'[Date] ),\n    ALL( 'Cal' )\n)"
        );
        assert_eq!(
            items[11].1,
            "VAR AC =\n    TOTALYTD( SELECTEDMEASURE(), DATESYTD( 'Cal'[Date], \"12/31\" ), ALL( 'Cal' ) )\nVAR Y1 =\n    CALCULATE( SELECTEDMEASURE(), SAMEPERIODLASTYEAR( 'Cal'[Date] ), ALL( 'Cal' ) )\nRETURN\n    DIVIDE( AC - Y1, Y1 )"
        );
    }

    #[test]
    fn units_skip_ratio_measures() {
        let items = units_items();
        assert_eq!(items[0].0, "Thousand");
        assert!(items[1].1.contains("DIVIDE( SELECTEDMEASURE(), 1000000 )"));
        assert!(items[0].1.contains("\"ratio\""));
    }
}
