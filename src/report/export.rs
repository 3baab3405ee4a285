//! Writes the report table to a spreadsheet, falling back to CSV.

use crate::report::collect::{error_chain, REPORT_COLUMNS};
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook, XlsxError};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Days between 0001-01-01 (CE day 1) and the Unix epoch, as used by polars Date columns.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to write spreadsheet '{0}'")]
    Xlsx(PathBuf, #[source] XlsxError),

    #[error("Failed to create CSV file '{0}'")]
    CsvIo(PathBuf, #[source] std::io::Error),

    #[error("Failed to write CSV file '{0}'")]
    CsvWrite(PathBuf, #[source] PolarsError),

    #[error("Report table does not have the expected columns")]
    Frame(#[from] PolarsError),

    #[error("Date value {0} is out of range")]
    DateOutOfRange(i32),

    #[error("Spreadsheet export failed ({xlsx}) and CSV fallback failed ({csv})")]
    BothFailed { xlsx: String, csv: String },
}

/// Where the report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Spreadsheet(PathBuf),
    Csv(PathBuf),
}

impl ExportOutcome {
    pub fn path(&self) -> &Path {
        match self {
            ExportOutcome::Spreadsheet(path) | ExportOutcome::Csv(path) => path,
        }
    }
}

/// Writes the report to `path`. A `.csv` path is written as CSV directly; anything else
/// is written as `.xlsx`, and if that fails the same table goes to `path` with a `.csv`
/// extension.
pub fn write_report(df: &mut DataFrame, path: &Path) -> Result<ExportOutcome, ExportError> {
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        write_csv(df, path)?;
        return Ok(ExportOutcome::Csv(path.to_path_buf()));
    }

    let xlsx_err = match write_xlsx(df, path) {
        Ok(()) => {
            info!("Combined data saved to '{}'", path.display());
            return Ok(ExportOutcome::Spreadsheet(path.to_path_buf()));
        }
        Err(e) => e,
    };

    warn!("Error saving data to Excel: {}", error_chain(&xlsx_err));
    let csv_path = path.with_extension("csv");
    warn!("Attempting to save as CSV to '{}' instead", csv_path.display());
    match write_csv(df, &csv_path) {
        Ok(()) => Ok(ExportOutcome::Csv(csv_path)),
        Err(csv_err) => Err(ExportError::BothFailed {
            xlsx: error_chain(&xlsx_err),
            csv: error_chain(&csv_err),
        }),
    }
}

fn date_from_days(days: i32) -> Result<NaiveDate, ExportError> {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or(ExportError::DateOutOfRange(days))
}

/// Writes the `Date, Region, Temp, Prcp` table as a single worksheet. Nulls stay blank.
pub fn write_xlsx(df: &DataFrame, path: &Path) -> Result<(), ExportError> {
    let dates = df.column(REPORT_COLUMNS[0])?.date()?;
    let regions = df.column(REPORT_COLUMNS[1])?.str()?;
    let temps = df.column(REPORT_COLUMNS[2])?.f64()?;
    let prcps = df.column(REPORT_COLUMNS[3])?.f64()?;

    let xlsx = |e| ExportError::Xlsx(path.to_path_buf(), e);

    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Weather").map_err(xlsx)?;
    for (column, name) in (0u16..).zip(REPORT_COLUMNS) {
        worksheet
            .write_string_with_format(0, column, name, &header_format)
            .map_err(xlsx)?;
    }
    worksheet.set_column_width(0, 12).map_err(xlsx)?;
    worksheet.set_column_width(1, 24).map_err(xlsx)?;

    let rows = dates
        .into_iter()
        .zip(regions)
        .zip(temps)
        .zip(prcps)
        .map(|(((date, region), temp), prcp)| (date, region, temp, prcp));
    for (row, (date, region, temp, prcp)) in (1u32..).zip(rows) {
        if let Some(days) = date {
            worksheet
                .write_datetime_with_format(row, 0, &date_from_days(days)?, &date_format)
                .map_err(xlsx)?;
        }
        if let Some(region) = region {
            worksheet.write_string(row, 1, region).map_err(xlsx)?;
        }
        for (column, value) in [(2u16, temp), (3u16, prcp)] {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                worksheet.write_number(row, column, value).map_err(xlsx)?;
            }
        }
    }

    workbook.save(path).map_err(xlsx)?;
    Ok(())
}

/// Writes the table as CSV with a UTF-8 byte order mark, so spreadsheet programs pick up
/// the non-ASCII region names.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let mut file =
        std::fs::File::create(path).map_err(|e| ExportError::CsvIo(path.to_path_buf(), e))?;
    CsvWriter::new(&mut file)
        .include_bom(true)
        .include_header(true)
        .finish(df)
        .map_err(|e| ExportError::CsvWrite(path.to_path_buf(), e))?;
    info!("Combined data saved to '{}'", path.display());
    Ok(())
}
