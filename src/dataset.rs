//! Dataset Codec
//!
//! Converts between a list of label records and a serialized byte stream
//! in one of a closed set of formats. The format is selected by explicit
//! flag or inferred from a file extension; dispatch is an explicit match
//! on the [`Format`] enum.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use calamine::Reader as _;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Header names of the two dataset fields
pub const HEADERS: [&str; 2] = ["Name", "Color"];

/// A decoded dataset record: label name and color as found in the input
pub type Record = (String, String);

/// One serialized row of the tabular dataset
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Row {
    #[serde(rename = "Name", alias = "name")]
    name: String,
    #[serde(rename = "Color", alias = "color")]
    color: String,
}

/// Supported dataset formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Csv,
    Tsv,
    Dict,
    Html,
    Xlsx,
}

impl Format {
    /// All supported formats, in help-text order
    pub const ALL: [Format; 7] = [
        Format::Json,
        Format::Yaml,
        Format::Csv,
        Format::Tsv,
        Format::Dict,
        Format::Html,
        Format::Xlsx,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Csv => "csv",
            Format::Tsv => "tsv",
            Format::Dict => "dict",
            Format::Html => "html",
            Format::Xlsx => "xlsx",
        }
    }

    /// Whether this format is a binary form, written byte-for-byte
    /// (text formats terminate output with a trailing newline)
    pub fn is_binary(self) -> bool {
        matches!(self, Format::Xlsx)
    }

    /// Infer the format from a file name's extension
    pub fn from_extension<P: AsRef<Path>>(path: P) -> Option<Format> {
        let ext = path.as_ref().extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "csv" => Some(Format::Csv),
            "tsv" => Some(Format::Tsv),
            "html" | "htm" => Some(Format::Html),
            "xlsx" => Some(Format::Xlsx),
            _ => None,
        }
    }

    /// Resolve the effective format from an explicit flag or a target path
    ///
    /// `-` denotes standard input/output and carries no extension, so an
    /// explicit flag is required there.
    ///
    /// # Errors
    /// Returns a usage-level error when the format cannot be resolved
    pub fn resolve(flag: Option<Format>, target: &str) -> Result<Format> {
        if let Some(format) = flag {
            return Ok(format);
        }
        if target == "-" {
            return Err(Error::UnresolvedFormat(target.to_string()));
        }
        Format::from_extension(target).ok_or_else(|| Error::UnresolvedFormat(target.to_string()))
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_lowercase();
        Format::ALL
            .into_iter()
            .find(|f| f.name() == lower || (lower == "yml" && *f == Format::Yaml))
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Encode label records in the given format
///
/// # Errors
/// Returns an error if serialization fails
pub fn encode(records: &[Record], format: Format) -> Result<Vec<u8>> {
    let rows: Vec<Row> = records
        .iter()
        .map(|(name, color)| Row {
            name: name.clone(),
            color: color.clone(),
        })
        .collect();

    match format {
        Format::Json => encode_json(&rows),
        Format::Yaml => Ok(encode_yaml(&rows)),
        Format::Csv => encode_delimited(&rows, b','),
        Format::Tsv => encode_delimited(&rows, b'\t'),
        Format::Dict => encode_dict(&rows),
        Format::Html => Ok(encode_html(&rows)),
        Format::Xlsx => encode_xlsx(&rows),
    }
}

/// Decode a serialized byte stream into label records
///
/// # Errors
/// Returns an error if the bytes cannot be parsed, or the format does not
/// support decoding
pub fn decode(bytes: &[u8], format: Format) -> Result<Vec<Record>> {
    let rows = match format {
        Format::Json => serde_json::from_slice::<Vec<Row>>(bytes)?,
        Format::Yaml => serde_yaml::from_slice::<Vec<Row>>(bytes)?,
        Format::Csv => decode_delimited(bytes, b',')?,
        Format::Tsv => decode_delimited(bytes, b'\t')?,
        Format::Dict => decode_dict(bytes)?,
        Format::Html => return Err(Error::DecodeUnsupported("html")),
        Format::Xlsx => decode_xlsx(bytes)?,
    };

    Ok(rows.into_iter().map(|row| (row.name, row.color)).collect())
}

fn encode_json(rows: &[Row]) -> Result<Vec<u8>> {
    let mut out = serde_json::to_vec_pretty(rows)?;
    out.push(b'\n');
    Ok(out)
}

/// One flow-style mapping per line, e.g. `- {Name: bug, Color: '#d73a4a'}`
fn encode_yaml(rows: &[Row]) -> Vec<u8> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&format!(
            "- {{{}: {}, {}: {}}}\n",
            HEADERS[0],
            yaml_scalar(&row.name),
            HEADERS[1],
            yaml_scalar(&row.color),
        ));
    }
    out.into_bytes()
}

/// Render a scalar for flow-style YAML, single-quoting where a plain
/// scalar would be ambiguous (leading `#`, special characters, numbers)
fn yaml_scalar(value: &str) -> String {
    let plain_safe = !value.is_empty()
        && value.chars().any(|c| c.is_ascii_alphabetic())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ' '))
        && !value.starts_with(' ')
        && !value.ends_with(' ')
        && !matches!(
            value.to_lowercase().as_str(),
            "true" | "false" | "null" | "yes" | "no" | "on" | "off"
        );

    if plain_safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

fn encode_delimited(rows: &[Row], delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))
}

fn decode_delimited(bytes: &[u8], delimiter: u8) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_reader(bytes);
    let mut rows = Vec::new();
    for row in reader.deserialize::<Row>() {
        rows.push(row?);
    }
    Ok(rows)
}

/// Single-line JSON object mapping label names to colors
fn encode_dict(rows: &[Row]) -> Result<Vec<u8>> {
    let map: BTreeMap<&str, &str> = rows
        .iter()
        .map(|row| (row.name.as_str(), row.color.as_str()))
        .collect();
    let mut out = serde_json::to_vec(&map)?;
    out.push(b'\n');
    Ok(out)
}

fn decode_dict(bytes: &[u8]) -> Result<Vec<Row>> {
    let map: BTreeMap<String, String> = serde_json::from_slice(bytes)?;
    Ok(map
        .into_iter()
        .map(|(name, color)| Row { name, color })
        .collect())
}

fn encode_html(rows: &[Row]) -> Vec<u8> {
    let mut out = String::from("<table>\n<thead>\n<tr>");
    for header in HEADERS {
        out.push_str(&format!("<th>{}</th>", html_escape(header)));
    }
    out.push_str("</tr>\n</thead>\n<tbody>\n");
    for row in rows {
        out.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>\n",
            html_escape(&row.name),
            html_escape(&row.color),
        ));
    }
    out.push_str("</tbody>\n</table>\n");
    out.into_bytes()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn encode_xlsx(rows: &[Row]) -> Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, header) in HEADERS.iter().enumerate() {
        worksheet.write_string(0, col as u16, *header)?;
    }
    for (idx, row) in rows.iter().enumerate() {
        let line = (idx + 1) as u32;
        worksheet.write_string(line, 0, row.name.as_str())?;
        worksheet.write_string(line, 1, row.color.as_str())?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn decode_xlsx(bytes: &[u8]) -> Result<Vec<Row>> {
    let mut workbook = calamine::Xlsx::new(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Dataset("XLSX input contains no worksheet".to_string()))??;

    let mut lines = range.rows();
    let header = lines
        .next()
        .ok_or_else(|| Error::Dataset("XLSX input contains no header row".to_string()))?;

    let column_of = |wanted: &str| {
        header
            .iter()
            .position(|cell| cell.to_string().trim().eq_ignore_ascii_case(wanted))
    };
    let name_col = column_of(HEADERS[0])
        .ok_or_else(|| Error::Dataset("XLSX input has no 'Name' column".to_string()))?;
    let color_col = column_of(HEADERS[1])
        .ok_or_else(|| Error::Dataset("XLSX input has no 'Color' column".to_string()))?;

    let mut rows = Vec::new();
    for line in lines {
        let name = line
            .get(name_col)
            .map(|cell| cell.to_string())
            .unwrap_or_default();
        let color = line
            .get(color_col)
            .map(|cell| cell.to_string())
            .unwrap_or_default();
        if name.is_empty() && color.is_empty() {
            continue;
        }
        rows.push(Row { name, color });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Record> {
        vec![
            ("bug".to_string(), "#d73a4a".to_string()),
            ("good first issue".to_string(), "#7057ff".to_string()),
        ]
    }

    fn round_trip(format: Format) {
        let records = sample();
        let bytes = encode(&records, format).unwrap();
        let decoded = decode(&bytes, format).unwrap();
        assert_eq!(decoded, records, "round trip for {}", format);
    }

    #[test]
    fn test_round_trip_json() {
        round_trip(Format::Json);
    }

    #[test]
    fn test_round_trip_yaml() {
        round_trip(Format::Yaml);
    }

    #[test]
    fn test_round_trip_csv() {
        round_trip(Format::Csv);
    }

    #[test]
    fn test_round_trip_tsv() {
        round_trip(Format::Tsv);
    }

    #[test]
    fn test_round_trip_dict() {
        round_trip(Format::Dict);
    }

    #[test]
    fn test_round_trip_xlsx() {
        round_trip(Format::Xlsx);
    }

    #[test]
    fn test_yaml_is_one_flow_line_per_record() {
        let records = vec![("alpha".to_string(), "#111111".to_string())];
        let bytes = encode(&records, Format::Yaml).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "- {Name: alpha, Color: '#111111'}\n");
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_yaml_quotes_awkward_names() {
        let records = vec![
            ("123456".to_string(), "#111111".to_string()),
            ("a: b".to_string(), "#222222".to_string()),
            ("it's".to_string(), "#333333".to_string()),
        ];
        let bytes = encode(&records, Format::Yaml).unwrap();
        let decoded = decode(&bytes, Format::Yaml).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn test_text_formats_end_with_newline() {
        let records = sample();
        for format in Format::ALL {
            if format.is_binary() {
                continue;
            }
            let bytes = encode(&records, format).unwrap();
            assert_eq!(
                bytes.last(),
                Some(&b'\n'),
                "trailing newline for {}",
                format
            );
        }
    }

    #[test]
    fn test_csv_has_header_row() {
        let bytes = encode(&sample(), Format::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("Name,Color\n"));
        assert!(text.contains("good first issue,#7057ff"));
    }

    #[test]
    fn test_dict_is_single_line() {
        let bytes = encode(&sample(), Format::Dict).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(r##""bug":"#d73a4a""##));
    }

    #[test]
    fn test_html_encode_only() {
        let bytes = encode(&sample(), Format::Html).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("<th>Name</th>"));
        assert!(text.contains("<td>bug</td>"));

        let result = decode(b"<table></table>", Format::Html);
        assert!(matches!(result, Err(Error::DecodeUnsupported("html"))));
    }

    #[test]
    fn test_decode_accepts_lowercase_field_names() {
        let json = r##"[{"name": "bug", "color": "#d73a4a"}]"##;
        let records = decode(json.as_bytes(), Format::Json).unwrap();
        assert_eq!(
            records,
            vec![("bug".to_string(), "#d73a4a".to_string())]
        );
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(Format::from_extension("labels.json"), Some(Format::Json));
        assert_eq!(Format::from_extension("labels.yaml"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("labels.YML"), Some(Format::Yaml));
        assert_eq!(Format::from_extension("labels.csv"), Some(Format::Csv));
        assert_eq!(Format::from_extension("labels.tsv"), Some(Format::Tsv));
        assert_eq!(Format::from_extension("labels.htm"), Some(Format::Html));
        assert_eq!(Format::from_extension("labels.xlsx"), Some(Format::Xlsx));
        assert_eq!(Format::from_extension("labels.dat"), None);
        assert_eq!(Format::from_extension("Makefile"), None);
    }

    #[test]
    fn test_resolve_prefers_explicit_flag() {
        let format = Format::resolve(Some(Format::Yaml), "labels.json").unwrap();
        assert_eq!(format, Format::Yaml);
    }

    #[test]
    fn test_resolve_stdout_without_flag_fails() {
        let result = Format::resolve(None, "-");
        assert!(matches!(result, Err(Error::UnresolvedFormat(_))));
    }

    #[test]
    fn test_resolve_uninferable_extension_fails() {
        let result = Format::resolve(None, "labels.dat");
        assert!(matches!(result, Err(Error::UnresolvedFormat(_))));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("YAML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("xlsx".parse::<Format>().unwrap(), Format::Xlsx);
        assert!("toml".parse::<Format>().is_err());
    }
}
