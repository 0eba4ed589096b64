use std::path::{Path, PathBuf};

use crate::config::{self, ApplianceConfiguration};
use crate::controls::{CompileError, Control, compile};

/// Load an appliance configuration and compile its controls.
fn load(path: &Path) -> Result<Vec<Control>, LoadError> {
    let config = ApplianceConfiguration::from_path(path).map_err(LoadError::Config)?;
    compile(&config).map_err(|e| LoadError::Compile(e, path.to_path_buf()))
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("could not load the appliance configuration")]
    Config(#[source] config::Error),
    #[error("could not compile the controls of {1:?}")]
    Compile(#[source] CompileError, PathBuf),
}

pub mod controls {
    use std::path::PathBuf;

    use crate::output;

    /// List the controls an appliance configuration compiles to.
    #[derive(clap::Parser)]
    pub struct Args {
        /// Appliance configuration JSON, bare or as returned by the cloud API.
        config: PathBuf,
        /// Only list controls whose key contains this text.
        filter: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error(transparent)]
        Load(#[from] super::LoadError),
        #[error("could not output the controls")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct ControlRecord<'a> {
        key: &'a str,
        kind: &'static str,
        read_offsets: Vec<usize>,
        write_offsets: Vec<u8>,
        writable: bool,
        options: Vec<String>,
    }

    fn join<T: ToString>(values: &[T]) -> String {
        values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let controls = super::load(&args.config)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .headers(&["Key", "Kind", "Read", "Write", "Options"])
            .map_err(Error::Output)?;
        for control in &controls {
            if let Some(filter) = &args.filter {
                if !control.key().contains(filter.as_str()) {
                    continue;
                }
            }
            let record = ControlRecord {
                key: control.key(),
                kind: control.kind(),
                read_offsets: control.read_offsets(),
                write_offsets: control.write_offsets(),
                writable: control.is_writable(),
                options: control.options(),
            };
            output
                .record(
                    || {
                        vec![
                            record.key.to_string(),
                            record.kind.to_string(),
                            join(&record.read_offsets),
                            join(&record.write_offsets),
                            join(&record.options),
                        ]
                    },
                    || &record,
                )
                .map_err(Error::Output)?;
        }
        output.finish().map_err(Error::Output)
    }
}

pub mod decode {
    use std::path::PathBuf;

    use crate::controls::{Control, Value, compile_debug};
    use crate::output;
    use crate::telegram::{CloudReportError, ReadError, Telegram};

    /// Decode state telegrams with an appliance configuration.
    #[derive(clap::Parser)]
    pub struct Args {
        config: PathBuf,
        /// Hex-encoded telegrams.
        telegrams: Vec<String>,
        /// Also decode a cloud-relayed appliance shadow document.
        #[arg(long)]
        shadow: Option<PathBuf>,
        /// Add the raw value of every telegram byte.
        #[arg(long)]
        raw: bool,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error(transparent)]
        Load(#[from] super::LoadError),
        #[error("telegram {1:?} is not valid hex")]
        Hex(#[source] hex::FromHexError, String),
        #[error("could not read the appliance shadow at {1:?}")]
        ReadShadow(#[source] std::io::Error, PathBuf),
        #[error("could not parse the appliance shadow at {1:?}")]
        Shadow(#[source] CloudReportError, PathBuf),
        #[error("could not decode {1} from telegram {2}")]
        Read(#[source] ReadError, String, usize),
        #[error("could not output the decoded values")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct Reading<'a> {
        pub telegram: usize,
        pub key: &'a str,
        pub value: Value,
    }

    /// Read every control, failing on the first one the telegram is too short for.
    pub fn read_all<'a>(
        index: usize,
        telegram: &Telegram,
        controls: &'a [Control],
    ) -> Result<Vec<Reading<'a>>, Error> {
        controls
            .iter()
            .map(|control| {
                let value = control
                    .read(telegram)
                    .map_err(|e| Error::Read(e, control.key().to_string(), index))?;
                Ok(Reading { telegram: index, key: control.key(), value })
            })
            .collect()
    }

    pub fn emit(output: &mut output::Output, reading: &Reading) -> Result<(), output::Error> {
        output.record(
            || {
                vec![
                    reading.telegram.to_string(),
                    reading.key.to_string(),
                    reading.value.to_string(),
                ]
            },
            || reading,
        )
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let controls = super::load(&args.config)?;
        let mut telegrams = args
            .telegrams
            .iter()
            .map(|text| Telegram::from_hex(text).map_err(|e| Error::Hex(e, text.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(path) = &args.shadow {
            let document =
                std::fs::read_to_string(path).map_err(|e| Error::ReadShadow(e, path.clone()))?;
            let telegram = Telegram::from_cloud_report(&document)
                .map_err(|e| Error::Shadow(e, path.clone()))?;
            telegrams.push(telegram);
        }

        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.headers(&["Telegram", "Key", "Value"]).map_err(Error::Output)?;
        for (index, telegram) in telegrams.iter().enumerate() {
            let debug = if args.raw { compile_debug(telegram.len()) } else { Vec::new() };
            for reading in read_all(index, telegram, &controls)?
                .iter()
                .chain(&read_all(index, telegram, &debug)?)
            {
                emit(&mut output, reading).map_err(Error::Output)?;
            }
        }
        output.finish().map_err(Error::Output)
    }
}

pub mod monitor {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use futures::StreamExt as _;
    use tokio::io::AsyncRead;
    use tokio_util::codec::FramedRead;
    use tracing::{debug, info};

    use super::decode::{Reading, emit, read_all};
    use crate::controls::{Control, Value};
    use crate::output;
    use crate::telegram::FragmentCodec;

    /// Reassemble and decode a capture of BLE notifications.
    ///
    /// The capture holds one hex-encoded notification per line, as received from the
    /// appliance's notification characteristic.
    #[derive(clap::Parser)]
    pub struct Args {
        config: PathBuf,
        /// Read the capture from this file rather than standard input.
        #[arg(long, short = 'i')]
        input: Option<PathBuf>,
        /// Only output values that differ from the previous telegram.
        #[arg(long)]
        changes: bool,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error(transparent)]
        Load(#[from] super::LoadError),
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not open the capture at {1:?}")]
        OpenInput(#[source] std::io::Error, PathBuf),
        #[error("could not read the notification capture")]
        Fragments(#[source] crate::telegram::FragmentCodecError),
        #[error(transparent)]
        Decode(#[from] super::decode::Error),
        #[error("could not output the decoded values")]
        Output(#[source] output::Error),
    }

    /// Decode every telegram reassembled from `capture`, handing each reading to `sink`.
    ///
    /// With `changes`, a reading is only passed on when its value differs from the last one
    /// seen for the same control. Returns the number of telegrams decoded.
    pub async fn decode_capture<R: AsyncRead + Unpin>(
        capture: R,
        controls: &[Control],
        changes: bool,
        mut sink: impl FnMut(&Reading) -> Result<(), Error>,
    ) -> Result<usize, Error> {
        let mut frames = FramedRead::new(capture, FragmentCodec::new());
        let mut previous = BTreeMap::<String, Value>::new();
        let mut count = 0;
        while let Some(telegram) = frames.next().await {
            let telegram = telegram.map_err(Error::Fragments)?;
            debug!(index = count, len = telegram.len(), "reassembled telegram");
            for reading in read_all(count, &telegram, controls)? {
                if changes && previous.get(reading.key) == Some(&reading.value) {
                    continue;
                }
                sink(&reading)?;
                previous.insert(reading.key.to_string(), reading.value);
            }
            count += 1;
        }
        Ok(count)
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let controls = super::load(&args.config)?;
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output.headers(&["Telegram", "Key", "Value"]).map_err(Error::Output)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(Error::Runtime)?;
        let count = runtime.block_on(async {
            let capture: Box<dyn AsyncRead + Unpin> = match &args.input {
                None => Box::new(tokio::io::stdin()),
                Some(path) => Box::new(
                    tokio::fs::File::open(path)
                        .await
                        .map_err(|e| Error::OpenInput(e, path.clone()))?,
                ),
            };
            decode_capture(capture, &controls, args.changes, |reading| {
                emit(&mut output, reading).map_err(Error::Output)?;
                output.flush().map_err(Error::Output)
            })
            .await
        })?;
        info!(count, "capture ended");
        output.finish().map_err(Error::Output)
    }
}

pub mod encode {
    use std::path::PathBuf;

    use crate::controls::{SetError, find};
    use crate::output;
    use crate::telegram::Telegram;
    use crate::wire::Command;

    /// Compute the commands that set a control to a value.
    #[derive(clap::Parser)]
    pub struct Args {
        config: PathBuf,
        /// Control key, or `ac.<aspect>` for a part of the climate control.
        key: String,
        value: String,
        /// Current state of the appliance, needed by controls that only write what changes.
        #[arg(long, short = 't')]
        telegram: Option<String>,
        /// Output cloud write messages for this appliance id instead of BLE frames.
        #[arg(long)]
        cloud: Option<String>,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error(transparent)]
        Load(#[from] super::LoadError),
        #[error("the appliance has no control {0:?}")]
        UnknownControl(String),
        #[error("telegram {1:?} is not valid hex")]
        Hex(#[source] hex::FromHexError, String),
        #[error("could not set {1} to {2:?}")]
        Set(#[source] SetError, String, String),
        #[error("could not serialize the cloud message")]
        SerializeJson(#[source] serde_json::Error),
        #[error("could not output the commands")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct Frame {
        command: Command,
        frame: String,
    }

    #[derive(serde::Serialize)]
    struct CloudMessage {
        topic: String,
        message: String,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let controls = super::load(&args.config)?;
        let control =
            find(&controls, &args.key).ok_or_else(|| Error::UnknownControl(args.key.clone()))?;
        let telegram = args
            .telegram
            .as_deref()
            .map(|text| Telegram::from_hex(text).map_err(|e| Error::Hex(e, text.to_string())))
            .transpose()?;
        let commands = control
            .write(&args.value, telegram.as_ref())
            .map_err(|e| Error::Set(e, args.key.clone(), args.value.clone()))?;

        let mut output = args.output.to_output().map_err(Error::Output)?;
        match &args.cloud {
            None => {
                output.headers(&["Command", "Frame"]).map_err(Error::Output)?;
                for command in commands {
                    let record = Frame { command, frame: hex::encode(command.to_frame()) };
                    output
                        .record(|| vec![command.to_string(), record.frame.clone()], || &record)
                        .map_err(Error::Output)?;
                }
            }
            Some(id) => {
                output.headers(&["Topic", "Message"]).map_err(Error::Output)?;
                for command in commands {
                    let message = serde_json::to_string(&command.cloud_message(id))
                        .map_err(Error::SerializeJson)?;
                    let record = CloudMessage { topic: Command::cloud_topic(id), message };
                    output
                        .record(|| vec![record.topic.clone(), record.message.clone()], || &record)
                        .map_err(Error::Output)?;
                }
            }
        }
        output.finish().map_err(Error::Output)
    }
}
