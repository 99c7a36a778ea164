//! Module for exporting the displayed records as a report file.
//!
//! Every format uses the same five columns in the same order. Spreadsheet and PDF support
//! are cargo features; a build without them reports the format as unavailable.
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, ValidationError};
use crate::record::Record;
use crate::view::COLUMN_LABELS;

pub const REPORT_TITLE: &str = "Red Line - รายงานข้อมูล";

/// Header fill of the spreadsheet and header text color of the PDF.
const HEADER_RGB: (u8, u8, u8) = (184, 0, 0);

#[derive(Serialize, Deserialize, Debug, Clone)]
/// Struct modeling the export section of the configuration.
pub struct ExportParameters {
    /// Directory receiving exports and charts when no explicit path is given.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory holding the TTF files of the PDF font family.
    #[serde(default = "default_font_dir")]
    pub pdf_font_dir: PathBuf,
    /// Font family name, files are expected as `<name>-Regular.ttf`, `<name>-Bold.ttf`, ...
    #[serde(default = "default_font_name")]
    pub pdf_font_name: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_font_dir() -> PathBuf {
    PathBuf::from("resources/fonts")
}

fn default_font_name() -> String {
    String::from("Sarabun")
}

impl Default for ExportParameters {
    fn default() -> Self {
        ExportParameters {
            output_dir: default_output_dir(),
            pdf_font_dir: default_font_dir(),
            pdf_font_name: default_font_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xlsx,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn default_file_name(self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "RedLine_Report.xlsx",
            ExportFormat::Pdf => "RedLine_Report.pdf",
            ExportFormat::Csv => "RedLine_Report.csv",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "pdf" => Ok(ExportFormat::Pdf),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ValidationError::Invalid {
                field: "format",
                value: s.to_string(),
            }),
        }
    }
}

fn cells(record: &Record) -> [String; 5] {
    [
        record.year.to_string(),
        record.month.thai_name().to_string(),
        record.line.as_str().to_string(),
        record.measurement_type.as_str().to_string(),
        record.value.to_string(),
    ]
}

/// Writes `records` in `format` to `path`, or into the configured output directory.
///
/// `records` are exported in the order given, callers pass the displayed rows.
pub fn export(
    records: &[Record],
    format: ExportFormat,
    path: Option<&Path>,
    params: &ExportParameters,
) -> Result<PathBuf, ExportError> {
    if records.is_empty() {
        return Err(ExportError::Unavailable(String::from("ไม่มีข้อมูลให้ส่งออก (nothing to export)")));
    }
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => params.output_dir.join(format.default_file_name()),
    };
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match format {
        ExportFormat::Csv => write_csv(records, &target)?,
        ExportFormat::Xlsx => write_xlsx(records, &target)?,
        ExportFormat::Pdf => write_pdf(records, &target, params)?,
    }
    log::info!(target: "redlined::export", "Exported {} records as {} to '{}'", records.len(), format, target.display());
    Ok(target)
}

fn write_csv(records: &[Record], target: &Path) -> Result<(), ExportError> {
    let render = |err: csv::Error| ExportError::Render(err.to_string());
    let mut writer = csv::Writer::from_path(target).map_err(render)?;
    writer.write_record(&COLUMN_LABELS).map_err(render)?;
    for record in records {
        writer.write_record(&cells(record)).map_err(render)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(feature = "xlsx")]
fn write_xlsx(records: &[Record], target: &Path) -> Result<(), ExportError> {
    use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};

    const COLUMN_WIDTHS_PX: [u16; 5] = [80, 110, 100, 80, 70];
    let render = |err: XlsxError| ExportError::Render(err.to_string());

    let mut workbook = Workbook::new();
    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::White)
        .set_background_color(Color::RGB(
            (HEADER_RGB.0 as u32) << 16 | (HEADER_RGB.1 as u32) << 8 | HEADER_RGB.2 as u32,
        ));

    let worksheet = workbook.add_worksheet();
    worksheet.set_name("Report").map_err(render)?;
    for (column, label) in COLUMN_LABELS.iter().enumerate() {
        let column = column as u16;
        worksheet
            .write_string_with_format(0, column, *label, &header_format)
            .map_err(render)?;
        // Excel column units are roughly 7 pixels plus 5 pixels of padding
        let width = f64::from(COLUMN_WIDTHS_PX[column as usize].saturating_sub(5)) / 7.0;
        worksheet.set_column_width(column, width).map_err(render)?;
    }
    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        worksheet.write_number(row, 0, record.year as f64).map_err(render)?;
        worksheet.write_string(row, 1, record.month.thai_name()).map_err(render)?;
        worksheet.write_string(row, 2, record.line.as_str()).map_err(render)?;
        worksheet.write_string(row, 3, record.measurement_type.as_str()).map_err(render)?;
        worksheet.write_number(row, 4, record.value).map_err(render)?;
    }
    workbook.save(target).map_err(render)?;
    Ok(())
}

#[cfg(not(feature = "xlsx"))]
fn write_xlsx(_records: &[Record], _target: &Path) -> Result<(), ExportError> {
    Err(ExportError::Unavailable(String::from(
        "spreadsheet export is not available in this build (feature 'xlsx')",
    )))
}

#[cfg(feature = "pdf")]
fn write_pdf(records: &[Record], target: &Path, params: &ExportParameters) -> Result<(), ExportError> {
    use genpdf::elements::{FrameCellDecorator, Paragraph, TableLayout};
    use genpdf::style::{Color, Style};
    use genpdf::Element as _;

    let font_family = genpdf::fonts::from_files(&params.pdf_font_dir, &params.pdf_font_name, None).map_err(|err| {
        ExportError::Unavailable(format!(
            "PDF font '{}' not found in '{}': {}",
            params.pdf_font_name,
            params.pdf_font_dir.display(),
            err
        ))
    })?;
    let render = |err: genpdf::error::Error| ExportError::Render(err.to_string());

    let mut document = genpdf::Document::new(font_family);
    document.set_title(REPORT_TITLE);
    document.set_paper_size(genpdf::Size::new(297.0, 210.0));
    document.set_font_size(10);
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(14);
    document.set_page_decorator(decorator);

    document.push(Paragraph::new(REPORT_TITLE).styled(Style::new().bold().with_font_size(14)));
    document.push(Paragraph::new(chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()));
    document.push(genpdf::elements::Break::new(1));

    let header_style = Style::new()
        .bold()
        .with_color(Color::Rgb(HEADER_RGB.0, HEADER_RGB.1, HEADER_RGB.2));
    let mut table = TableLayout::new(vec![1, 1, 1, 1, 1]);
    table.set_cell_decorator(FrameCellDecorator::new(true, true, false));
    let mut header = table.row();
    for label in COLUMN_LABELS.iter() {
        header.push_element(Paragraph::new(*label).styled(header_style.clone()));
    }
    header.push().map_err(render)?;
    for record in records {
        let mut row = table.row();
        for cell in cells(record).iter() {
            row.push_element(Paragraph::new(cell.as_str()));
        }
        row.push().map_err(render)?;
    }
    document.push(table);
    document.render_to_file(target).map_err(render)?;
    Ok(())
}

#[cfg(not(feature = "pdf"))]
fn write_pdf(_records: &[Record], _target: &Path, _params: &ExportParameters) -> Result<(), ExportError> {
    Err(ExportError::Unavailable(String::from(
        "PDF export is not available in this build (feature 'pdf')",
    )))
}
