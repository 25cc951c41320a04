use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use rust_xlsxwriter::{Workbook, Worksheet};
use serde_json::{Map, Value};

use crate::prelude::*;

/// Writes the dataset as CSV, floats serialized with 3 decimal
/// places.
pub(crate) fn write_csv(
    df: &mut DataFrame,
    path: &Path,
) -> Co2setResult<()> {
    let mut writer = CsvWriter::new(File::create(path)?)
        .with_float_precision(Some(3));
    writer.finish(df)?;
    Ok(())
}

/// Writes the codebook as CSV.
pub(crate) fn write_codebook(
    df: &mut DataFrame,
    path: &Path,
) -> Co2setResult<()> {
    let mut writer = CsvWriter::new(File::create(path)?);
    writer.finish(df)?;
    Ok(())
}

fn write_sheet(
    sheet: &mut Worksheet,
    df: &DataFrame,
) -> Co2setResult<()> {
    for (idx, name) in df.get_column_names().iter().enumerate() {
        sheet.write_string(0, idx as u16, *name)?;
    }

    for (col, series) in df.get_columns().iter().enumerate() {
        let col = col as u16;

        for idx in 0..df.height() {
            let row = idx as u32 + 1;

            match series.get(idx)? {
                AnyValue::Null => {}
                AnyValue::Int64(value) => {
                    sheet.write_number(row, col, value as f64)?;
                }
                AnyValue::Float64(value) => {
                    sheet.write_number(row, col, value)?;
                }
                AnyValue::String(value) => {
                    sheet.write_string(row, col, value)?;
                }
                value => bail!(
                    "unsupported value '{value}' in column '{}'",
                    series.name()
                ),
            }
        }
    }

    Ok(())
}

/// Writes the dataset and the codebook as an XLSX workbook with a
/// `Data` and a `Metadata` sheet.
pub(crate) fn write_xlsx(
    df: &DataFrame,
    codebook: &DataFrame,
    path: &Path,
) -> Co2setResult<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Data")?;
    write_sheet(sheet, df)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Metadata")?;
    write_sheet(sheet, codebook)?;

    workbook.save(path)?;
    Ok(())
}

/// Builds the JSON rendition: one top-level entry per entity holding
/// the static columns (when present) and a `data` array of per-year
/// records. Cells without data are omitted, never written as zero.
pub(crate) fn json_value(
    df: &DataFrame,
    static_columns: &[&str],
) -> Co2setResult<Map<String, Value>> {
    let columns = df.get_column_names();
    let entities = df.column("entity")?.str()?;

    let statics: Vec<&Series> = static_columns
        .iter()
        .filter(|name| columns.contains(name))
        .map(|name| df.column(name))
        .collect::<Result<_, _>>()?;

    let dynamics: Vec<&Series> = df
        .get_columns()
        .iter()
        .filter(|series| {
            series.name() != "entity"
                && !static_columns.contains(&series.name())
        })
        .collect();

    let mut output = Map::new();

    for idx in 0..df.height() {
        let Some(entity) = entities.get(idx) else {
            bail!("row {idx} has no entity name");
        };

        if !output.contains_key(entity) {
            let mut entry = Map::new();

            for series in statics.iter() {
                if let Some(value) = cell(series, idx)? {
                    entry.insert(series.name().into(), value);
                }
            }

            entry.insert("data".into(), Value::Array(vec![]));
            output.insert(entity.into(), Value::Object(entry));
        }

        let mut record = Map::new();
        for series in dynamics.iter() {
            if let Some(value) = cell(series, idx)? {
                record.insert(series.name().into(), value);
            }
        }

        let Some(Value::Array(data)) = output
            .get_mut(entity)
            .and_then(|entry| entry.get_mut("data"))
        else {
            unreachable!("entry was just inserted");
        };

        data.push(Value::Object(record));
    }

    Ok(output)
}

/// Writes the JSON rendition of the dataset.
pub(crate) fn write_json(
    df: &DataFrame,
    static_columns: &[&str],
    path: &Path,
) -> Co2setResult<()> {
    let value = json_value(df, static_columns)?;
    serde_json::to_writer_pretty(File::create(path)?, &value)?;
    Ok(())
}

fn cell(
    series: &Series,
    idx: usize,
) -> Co2setResult<Option<Value>> {
    Ok(match series.get(idx)? {
        AnyValue::Null => None,
        AnyValue::Int64(value) => Some(Value::from(value)),
        AnyValue::Float64(value) => Some(Value::from(value)),
        AnyValue::String(value) => Some(Value::from(value)),
        value => bail!(
            "unsupported value '{value}' in column '{}'",
            series.name()
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> DataFrame {
        df!(
            "entity" => &["Kuwait", "Kuwait", "Palau"],
            "year" => &[1990i64, 1991, 1990],
            "iso_code" => &[Some("KWT"), Some("KWT"), None],
            "co2" => &[Some(350.0), Some(366.4), None],
            "co2_per_capita" => &[Some(170.0), Some(183.2), None],
        )
        .unwrap()
    }

    #[test]
    fn json_one_entry_per_entity() {
        let value =
            json_value(&dataset(), &["iso_code"]).unwrap();

        assert_eq!(value.len(), 2);
        assert!(value.contains_key("Kuwait"));
        assert!(value.contains_key("Palau"));

        let kuwait = value["Kuwait"].as_object().unwrap();
        assert_eq!(kuwait["iso_code"], Value::from("KWT"));
        assert_eq!(kuwait["data"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn json_omits_missing_cells() {
        let value =
            json_value(&dataset(), &["iso_code"]).unwrap();

        // Palau has no ISO code and no data values; only the year
        // remains in its record.
        let palau = value["Palau"].as_object().unwrap();
        assert!(!palau.contains_key("iso_code"));

        let data = palau["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);

        let record = data[0].as_object().unwrap();
        assert_eq!(record["year"], Value::from(1990));
        assert!(!record.contains_key("co2"));
        assert!(!record.contains_key("co2_per_capita"));
    }

    #[test]
    fn json_year_records_keep_column_order() {
        let value =
            json_value(&dataset(), &["iso_code"]).unwrap();

        let kuwait = value["Kuwait"].as_object().unwrap();
        let record =
            kuwait["data"].as_array().unwrap()[1].as_object().unwrap();

        let keys: Vec<&str> =
            record.keys().map(String::as_str).collect();
        assert_eq!(keys, &["year", "co2", "co2_per_capita"]);
        assert_eq!(record["co2"], Value::from(366.4));
    }

    #[test]
    fn json_without_static_columns() {
        let df = df!(
            "entity" => &["World"],
            "year" => &[1991i64],
            "co2" => &[22_000.0],
        )
        .unwrap();

        let value = json_value(&df, &["iso_code"]).unwrap();
        let world = value["World"].as_object().unwrap();

        assert!(!world.contains_key("iso_code"));
        assert_eq!(world["data"].as_array().unwrap().len(), 1);
    }
}
