use std::path::Path;

use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, DataType, Reader};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::CampaignRecord;

pub const DEFAULT_SHEET: &str = "Calcs";

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

/// Loads campaign records from an Excel workbook (sheet selected by name)
/// or a CSV file, chosen by extension. Rows missing any required field are
/// dropped, not repaired; the drop count is logged.
pub fn load_records(path: &Path, sheet: &str) -> anyhow::Result<Vec<CampaignRecord>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (records, dropped) = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" => load_workbook(path, sheet)?,
        "csv" => load_csv(path)?,
        other => bail!("unsupported input format {other:?}, expected .xlsx or .csv"),
    };

    if dropped > 0 {
        warn!(
            "dropped {dropped} rows missing a required field from {}",
            path.display()
        );
    }
    info!(
        "loaded {} campaign records from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

#[derive(Debug)]
struct Columns {
    date: usize,
    ctr: usize,
    cvr: usize,
    revenue: usize,
    costs: usize,
    orders: usize,
    retailer: usize,
    line_item: usize,
}

fn load_workbook(path: &Path, sheet: &str) -> anyhow::Result<(Vec<CampaignRecord>, usize)> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("sheet {sheet:?} not found in {}", path.display()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .context("workbook sheet has no header row")?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    let columns = resolve_columns(&header)?;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in rows {
        match parse_row(row, &columns) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    Ok((records, dropped))
}

fn resolve_columns(header: &[String]) -> anyhow::Result<Columns> {
    // Column names and casing must match the source sheet exactly.
    let find = |name: &str| {
        header
            .iter()
            .position(|column| column == name)
            .with_context(|| format!("required column {name:?} not found in sheet header"))
    };
    Ok(Columns {
        date: find("Date")?,
        ctr: find("CTR")?,
        cvr: find("CVR")?,
        revenue: find("Revenue")?,
        costs: find("Costs")?,
        orders: find("Orders")?,
        retailer: find("Retailer")?,
        line_item: find("Line Item")?,
    })
}

fn parse_row(row: &[Data], columns: &Columns) -> Option<CampaignRecord> {
    let record = CampaignRecord {
        date: cell_date(row.get(columns.date)?)?,
        retailer: cell_text(row.get(columns.retailer)?)?,
        line_item: cell_text(row.get(columns.line_item)?)?,
        ctr: cell_number(row.get(columns.ctr)?)?,
        cvr: cell_number(row.get(columns.cvr)?)?,
        revenue: cell_number(row.get(columns.revenue)?)?,
        costs: cell_number(row.get(columns.costs)?)?,
        orders: cell_number(row.get(columns.orders)?)?,
        asp: None,
        cpo: None,
    };
    Some(with_derived(record))
}

fn cell_number(cell: &Data) -> Option<f64> {
    let value = match cell {
        Data::Int(v) => *v as f64,
        Data::Float(v) => *v,
        Data::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Data::Int(v) => Some(v.to_string()),
        Data::Float(v) => Some(v.to_string()),
        _ => None,
    }
}

fn cell_date(cell: &Data) -> Option<NaiveDate> {
    if let Some(date) = cell.as_date() {
        return Some(date);
    }
    match cell {
        Data::String(s) => parse_date(s.trim()),
        _ => None,
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}

#[derive(Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "CTR")]
    ctr: Option<f64>,
    #[serde(rename = "CVR")]
    cvr: Option<f64>,
    #[serde(rename = "Revenue")]
    revenue: Option<f64>,
    #[serde(rename = "Costs")]
    costs: Option<f64>,
    #[serde(rename = "Orders")]
    orders: Option<f64>,
    #[serde(rename = "Retailer")]
    retailer: String,
    #[serde(rename = "Line Item")]
    line_item: String,
}

fn load_csv(path: &Path) -> anyhow::Result<(Vec<CampaignRecord>, usize)> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_csv_records(reader)
}

fn read_csv_records<R: std::io::Read>(
    mut reader: csv::Reader<R>,
) -> anyhow::Result<(Vec<CampaignRecord>, usize)> {
    let mut records = Vec::new();
    let mut dropped = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result.context("failed to parse CSV row")?;
        match csv_row_to_record(row) {
            Some(record) => records.push(record),
            None => dropped += 1,
        }
    }
    Ok((records, dropped))
}

fn csv_row_to_record(row: CsvRow) -> Option<CampaignRecord> {
    let record = CampaignRecord {
        date: parse_date(row.date.trim())?,
        retailer: non_empty(&row.retailer)?,
        line_item: non_empty(&row.line_item)?,
        ctr: finite(row.ctr)?,
        cvr: finite(row.cvr)?,
        revenue: finite(row.revenue)?,
        costs: finite(row.costs)?,
        orders: finite(row.orders)?,
        asp: None,
        cpo: None,
    };
    Some(with_derived(record))
}

// ASP and CPO stay missing when Orders is zero; no NaN or infinity may
// reach the detector.
fn with_derived(mut record: CampaignRecord) -> CampaignRecord {
    if record.orders > 0.0 {
        record.asp = Some(record.revenue / record.orders);
        record.cpo = Some(record.costs / record.orders);
    }
    record
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
