use std::io::Write as _;
use std::path::PathBuf;

use csv_core::WriteResult;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum Format {
    Table,
    Jsonl,
    Csv,
}

#[derive(clap::Parser)]
#[group(id = "output::Args")]
pub struct Args {
    /// Write to this file instead of the terminal.
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
    #[arg(long, short = 'f', value_enum, default_value_t = Format::Table)]
    format: Format,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not open the specified output file at {1:?}")]
    OpenOutputFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the output file at {1:?}")]
    WriteFile(#[source] std::io::Error, PathBuf),
    #[error("could not write data to the terminal")]
    WriteStdout(#[source] std::io::Error),
    #[error("could not serialize a record to JSON")]
    SerializeJson(#[source] serde_json::Error),
    #[error("CSV headers must be written before any record")]
    LateCsvHeaders,
    #[error("could not encode a CSV field")]
    EncodeCsv,
}

impl Args {
    pub fn to_output(self) -> Result<Output, Error> {
        let io: Box<dyn std::io::Write> = match &self.output {
            None => Box::new(std::io::stdout().lock()),
            Some(path) => Box::new(std::io::BufWriter::new(
                std::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(path)
                    .map_err(|e| Error::OpenOutputFile(e, path.clone()))?,
            )),
        };
        let sink = match self.format {
            Format::Table => {
                let mut table = comfy_table::Table::new();
                table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);
                Sink::Table(table)
            }
            Format::Jsonl => Sink::Jsonl,
            Format::Csv => Sink::Csv { started: false },
        };
        Ok(Output { path: self.output, io, sink })
    }
}

/// Rows of decoded data, rendered as a table, JSON lines or CSV.
///
/// Tables are only rendered on [`Output::finish`]; the other formats stream every record as it
/// comes.
pub struct Output {
    path: Option<PathBuf>,
    io: Box<dyn std::io::Write>,
    sink: Sink,
}

enum Sink {
    Table(comfy_table::Table),
    Jsonl,
    Csv { started: bool },
}

impl Output {
    pub fn headers(&mut self, headers: &[&str]) -> Result<(), Error> {
        match &mut self.sink {
            Sink::Table(table) => {
                table.set_header(headers.to_vec());
            }
            Sink::Jsonl => {}
            Sink::Csv { started: true } => return Err(Error::LateCsvHeaders),
            Sink::Csv { started } => {
                *started = true;
                self.csv_row(headers)?;
            }
        }
        Ok(())
    }

    /// Emit one record: `row` for tables and CSV, `record` for JSON lines.
    pub fn record<R: serde::Serialize>(
        &mut self,
        row: impl FnOnce() -> Vec<String>,
        record: impl FnOnce() -> R,
    ) -> Result<(), Error> {
        match &mut self.sink {
            Sink::Table(table) => {
                table.add_row(row());
            }
            Sink::Jsonl => {
                serde_json::to_writer(&mut self.io, &record()).map_err(Error::SerializeJson)?;
                writeln!(self.io).map_err(|e| self.write_error(e))?;
            }
            Sink::Csv { started } => {
                *started = true;
                self.csv_row(&row())?;
            }
        }
        Ok(())
    }

    fn csv_row<V: AsRef<str>>(&mut self, fields: &[V]) -> Result<(), Error> {
        // Quoting at most doubles a field, plus the quotes and the delimiter.
        let longest = fields.iter().map(|f| f.as_ref().len()).max().unwrap_or(0);
        let mut buffer = vec![0; 3 + 2 * longest];
        let mut writer = csv_core::Writer::new();
        let mut line = Vec::new();
        for (index, field) in fields.iter().enumerate() {
            if index > 0 {
                let (WriteResult::InputEmpty, n) = writer.delimiter(&mut buffer) else {
                    return Err(Error::EncodeCsv);
                };
                line.extend_from_slice(&buffer[..n]);
            }
            let (WriteResult::InputEmpty, _, n) =
                writer.field(field.as_ref().as_bytes(), &mut buffer)
            else {
                return Err(Error::EncodeCsv);
            };
            line.extend_from_slice(&buffer[..n]);
        }
        let (WriteResult::InputEmpty, n) = writer.terminator(&mut buffer) else {
            return Err(Error::EncodeCsv);
        };
        line.extend_from_slice(&buffer[..n]);
        self.io.write_all(&line).map_err(|e| self.write_error(e))
    }

    fn write_error(&self, e: std::io::Error) -> Error {
        match &self.path {
            None => Error::WriteStdout(e),
            Some(p) => Error::WriteFile(e, p.clone()),
        }
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.io.flush().map_err(|e| self.write_error(e))
    }

    pub fn finish(mut self) -> Result<(), Error> {
        if let Sink::Table(table) = &self.sink {
            writeln!(self.io, "{table}").map_err(|e| self.write_error(e))?;
        }
        self.flush()
    }
}
